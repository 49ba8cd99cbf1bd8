pub mod blocks;
pub mod extract;
pub mod sections;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

static STRIP_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel("script, style, noscript, template, iframe, svg"));
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| sel("title"));
static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| sel("body"));
static MAIN_SELS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "[class*='job-detail']",
        "[class*='jobDetail']",
        "[class*='job-description']",
        "[id*='job-detail']",
        "main",
        "[role='main']",
        "article",
        "#content",
        ".content",
    ]
    .iter()
    .map(|s| sel(s))
    .collect()
});

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "aside", "nav", "li", "ul",
    "ol", "dl", "dt", "dd", "tr", "table", "h1", "h2", "h3", "h4", "h5", "h6", "br",
    "blockquote", "pre", "form", "fieldset",
];

/// Text shorter than this is not accepted as the main content region.
const MIN_MAIN_TEXT: usize = 200;

pub(crate) fn sel(s: &str) -> Selector {
    Selector::parse(s).unwrap()
}

/// A fetched page with script/style content removed, plus the tenant's
/// company names used to reject branding text as a job title.
pub struct JobPage {
    pub url: Url,
    pub html: Html,
    pub companies: Vec<String>,
}

impl JobPage {
    /// Parse and clean `body`. `known_companies` extends the title denylist.
    pub fn parse(url: Url, body: &str, known_companies: &[String]) -> Self {
        let html = strip_non_content(Html::parse_document(body));
        let mut page = JobPage {
            url,
            html,
            companies: Vec::new(),
        };
        page.companies = page.company_names(known_companies);
        page
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    pub fn body(&self) -> ElementRef<'_> {
        self.html
            .select(&BODY_SEL)
            .next()
            .unwrap_or_else(|| self.root())
    }

    /// Text of the `<title>` element.
    pub fn title(&self) -> String {
        self.html
            .select(&TITLE_SEL)
            .next()
            .map(|t| squash(&t.text().collect::<String>()))
            .unwrap_or_default()
    }

    /// `content` of `<meta name=..>` or `<meta property=..>`.
    pub fn meta(&self, name: &str) -> Option<String> {
        let selector = Selector::parse(&format!(
            "meta[name='{name}'], meta[property='{name}'], meta[itemprop='{name}']"
        ))
        .ok()?;
        self.html
            .select(&selector)
            .filter_map(|m| m.value().attr("content"))
            .map(squash)
            .find(|c| !c.is_empty())
    }

    /// Most specific region holding the posting, falling back to `<body>`.
    pub fn main_content(&self) -> ElementRef<'_> {
        for selector in MAIN_SELS.iter() {
            for el in self.html.select(selector) {
                if block_text(el).len() >= MIN_MAIN_TEXT {
                    return el;
                }
            }
        }
        self.body()
    }

    /// Visible text of the whole body, one block per line.
    pub fn visible_text(&self) -> String {
        block_text(self.body())
    }

    /// Case-insensitive exact match against the company-name denylist.
    pub fn is_company_name(&self, candidate: &str) -> bool {
        let c = normalize_name(candidate);
        !c.is_empty() && self.companies.iter().any(|n| *n == c)
    }

    fn company_names(&self, known: &[String]) -> Vec<String> {
        let mut names: Vec<String> = known.iter().map(|n| normalize_name(n)).collect();
        let sub = crate::routes::subdomain_from_url(self.url.as_str());
        if !sub.is_empty() {
            names.push(normalize_name(&sub.replace(['-', '_'], " ")));
        }
        for meta in ["og:site_name", "application-name", "author"] {
            if let Some(v) = self.meta(meta) {
                names.push(normalize_name(&v));
            }
        }
        names.retain(|n| !n.is_empty());
        names.sort();
        names.dedup();
        names
    }
}

fn normalize_name(s: &str) -> String {
    squash(s).to_lowercase()
}

/// Drop nodes that never carry visible text. Produces a new document value.
fn strip_non_content(mut html: Html) -> Html {
    let ids: Vec<_> = html.select(&STRIP_SEL).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = html.tree.get_mut(id) {
            node.detach();
        }
    }
    html
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of an element with text nodes joined by spaces.
pub fn element_text(el: ElementRef<'_>) -> String {
    squash(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of an element with a line break at every block-level element.
pub fn block_text(el: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in el.descendants() {
        if let Some(t) = node.value().as_text() {
            let t = t.trim();
            if t.is_empty() {
                continue;
            }
            if !text.is_empty() && !text.ends_with('\n') {
                text.push(' ');
            }
            text.push_str(t);
        } else if let Some(e) = node.value().as_element() {
            if BLOCK_TAGS.contains(&e.name()) && !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
        }
    }
    text.lines()
        .map(squash)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> JobPage {
        JobPage::parse(
            Url::parse("https://acme-health.careers.example.com/jobs/12").unwrap(),
            body,
            &["Acme Health Group".to_string()],
        )
    }

    #[test]
    fn scripts_and_styles_are_removed() {
        let p = page(
            "<html><head><style>.x{color:red}</style></head><body><p>Hello</p>\
             <script>var leak = function(){};</script><p>World</p></body></html>",
        );
        let text = p.visible_text();
        assert_eq!(text, "Hello\nWorld");
    }

    #[test]
    fn block_text_breaks_lines() {
        let p = page("<body><div><h2>Duties</h2><ul><li>One</li><li>Two <b>bold</b></li></ul></div></body>");
        assert_eq!(p.visible_text(), "Duties\nOne\nTwo bold");
    }

    #[test]
    fn company_names_from_config_subdomain_and_meta() {
        let p = page(
            "<html><head><meta property='og:site_name' content='Acme Careers'></head><body></body></html>",
        );
        assert!(p.is_company_name("acme health group"));
        assert!(p.is_company_name("ACME HEALTH"));
        assert!(p.is_company_name("Acme Careers"));
        assert!(!p.is_company_name("Registered Nurse"));
    }

    #[test]
    fn main_content_falls_back_to_body() {
        let p = page("<body><main>short</main><p>Other</p></body>");
        assert_eq!(p.main_content().value().name(), "body");
    }
}
