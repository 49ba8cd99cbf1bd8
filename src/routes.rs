use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::model::Label;

static DETAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:jobs?|job-details?|jobdetails?|postings?|vacanc(?:y|ies)|positions?)/(\d+)(?:[/?#.\-_]|$)")
        .unwrap()
});
static LISTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:search|job-search|jobsearch|listings?|openings|vacancies|jobs)/?(?:[?#]|$)")
        .unwrap()
});
static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)(?:[/?#.\-_]|$)").unwrap());

/// Label a URL by its path shape. Detail wins when both would match.
pub fn classify(url: &str) -> Option<Label> {
    let path = path_and_query(url);
    if DETAIL_RE.is_match(&path) {
        Some(Label::Detail)
    } else if LISTING_RE.is_match(&path) {
        Some(Label::Listing)
    } else {
        None
    }
}

/// First numeric path token, e.g. `/jobs/4821/senior-nurse` → `4821`.
/// Falls back to the last non-empty path segment.
pub fn job_id_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.to_string(),
    };
    if let Some(caps) = NUMERIC_RE.captures(&path) {
        return caps[1].to_string();
    }
    path.trim_end_matches('/')
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Tenant identifier: first label of the host.
pub fn subdomain_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .and_then(|h| h.split('.').next().map(str::to_string))
        .unwrap_or_default()
}

/// Resolve `href` against `base`, dropping fragments. Anchor-only, empty and
/// non-http links resolve to `None`.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:") {
        return None;
    }
    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// Key used for run-level uniqueness of enqueued URLs.
pub fn unique_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut u) => {
            u.set_fragment(None);
            let mut key = u.to_string();
            if key.ends_with('/') && u.path() != "/" {
                key.pop();
            }
            key
        }
        Err(_) => url.trim().to_string(),
    }
}

fn path_and_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => match u.query() {
            Some(q) => format!("{}?{}", u.path(), q),
            None => u.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_urls() {
        for url in [
            "https://acme.careers.example.com/jobs/4821",
            "https://acme.careers.example.com/jobs/4821/senior-nurse",
            "https://acme.careers.example.com/job-details/77?src=list",
            "https://acme.careers.example.com/en/postings/12-registered-nurse",
        ] {
            assert_eq!(classify(url), Some(Label::Detail), "{}", url);
        }
    }

    #[test]
    fn listing_urls() {
        for url in [
            "https://acme.careers.example.com/jobs/search",
            "https://acme.careers.example.com/jobs/search?page=2",
            "https://acme.careers.example.com/search?keywords=nurse",
            "https://acme.careers.example.com/jobs",
        ] {
            assert_eq!(classify(url), Some(Label::Listing), "{}", url);
        }
    }

    #[test]
    fn unknown_urls() {
        assert_eq!(classify("https://acme.careers.example.com/about-us"), None);
        assert_eq!(classify("https://acme.careers.example.com/jobs/nurse"), None);
    }

    #[test]
    fn job_id() {
        assert_eq!(job_id_from_url("https://a.example.com/jobs/4821/senior-nurse"), "4821");
        assert_eq!(job_id_from_url("https://a.example.com/en/jobs/99"), "99");
        assert_eq!(job_id_from_url("https://a.example.com/jobs/nurse-lead/"), "nurse-lead");
    }

    #[test]
    fn subdomain() {
        assert_eq!(subdomain_from_url("https://acme.careers.example.com/jobs/1"), "acme");
        assert_eq!(subdomain_from_url("https://www.globex.com/jobs/1"), "globex");
        assert_eq!(subdomain_from_url("not a url"), "");
    }

    #[test]
    fn resolve_links() {
        let base = Url::parse("https://acme.example.com/jobs/search").unwrap();
        assert_eq!(
            resolve(&base, "/jobs/12#apply").as_deref(),
            Some("https://acme.example.com/jobs/12")
        );
        assert_eq!(resolve(&base, "#"), None);
        assert_eq!(resolve(&base, ""), None);
        assert_eq!(resolve(&base, "javascript:void(0)"), None);
    }

    #[test]
    fn unique_key_strips_fragment_and_slash() {
        assert_eq!(
            unique_key("https://a.example.com/jobs/12/#top"),
            "https://a.example.com/jobs/12"
        );
        assert_eq!(unique_key("https://a.example.com/"), "https://a.example.com/");
    }
}
