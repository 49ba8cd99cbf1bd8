use std::sync::LazyLock;

use scraper::Selector;

use super::{accept, labels, resolve, Field, Strategy};
use crate::model::FieldHints;
use crate::parser::sections::classify_heading;
use crate::parser::{element_text, sel, JobPage};

static HEADING_SELS: LazyLock<[Selector; 3]> = LazyLock::new(|| [sel("h1"), sel("h2"), sel("h3")]);

/// Separators used by `<title>` and og:title, most specific first.
const TITLE_SEPARATORS: &[&str] = &[" | ", " :: ", " — ", " – ", " - ", " · "];

const GENERIC_TITLES: &[&str] = &[
    "careers",
    "career",
    "jobs",
    "job",
    "job details",
    "job detail",
    "job description",
    "job search",
    "search jobs",
    "search results",
    "current vacancies",
    "current opportunities",
    "vacancies",
    "opportunities",
    "join our team",
    "home",
    "apply",
    "apply now",
    "welcome",
    "menu",
];

const TITLE_CHAIN: &[Strategy] = &[
    labels::from_label,
    labels::from_free_text,
    og_title,
    document_title,
    visible_heading,
    url_slug,
];

/// Navigation and branding text, never a posting title.
pub fn is_generic(candidate: &str) -> bool {
    let lower = candidate.trim().to_lowercase();
    GENERIC_TITLES.contains(&lower.as_str())
}

pub fn extract_title(page: &JobPage, hints: &FieldHints) -> Option<String> {
    resolve(page, hints, Field::Title, TITLE_CHAIN)
}

/// First piece of a separated title that is not the company or a generic word.
fn split_title(page: &JobPage, raw: &str) -> Option<String> {
    let sep = TITLE_SEPARATORS.iter().find(|s| raw.contains(*s));
    match sep {
        Some(sep) => raw
            .split(sep)
            .find_map(|piece| accept(page, Field::Title, piece)),
        None => accept(page, Field::Title, raw),
    }
}

fn og_title(page: &JobPage, _: &FieldHints, _: Field) -> Option<String> {
    page.meta("og:title").and_then(|t| split_title(page, &t))
}

fn document_title(page: &JobPage, _: &FieldHints, _: Field) -> Option<String> {
    split_title(page, &page.title())
}

/// h1, then h2, then h3, outside site chrome and not a section heading.
fn visible_heading(page: &JobPage, _: &FieldHints, _: Field) -> Option<String> {
    let body = page.body();
    HEADING_SELS.iter().find_map(|selector| {
        body.select(selector)
            .filter(|h| {
                !h.ancestors().filter_map(scraper::ElementRef::wrap).any(|a| {
                    matches!(a.value().name(), "nav" | "header" | "footer")
                        || a.value().attr("role") == Some("navigation")
                })
            })
            .map(element_text)
            .filter(|t| classify_heading(t).is_none())
            .find_map(|t| accept(page, Field::Title, &t))
    })
}

/// `/jobs/4821/registered-nurse` → `Registered Nurse`.
fn url_slug(page: &JobPage, _: &FieldHints, _: Field) -> Option<String> {
    let segment = page
        .url
        .path_segments()?
        .rev()
        .find(|s| !s.is_empty() && !s.chars().all(|c| c.is_ascii_digit()))?;
    let segment = segment.split('.').next().unwrap_or(segment);
    let words: Vec<String> = segment
        .split(['-', '_', '+'])
        .filter(|w| !w.is_empty() && !w.chars().all(|c| c.is_ascii_digit()))
        .map(capitalize)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn title_of(url: &str, html: &str) -> Option<String> {
        let page = JobPage::parse(Url::parse(url).unwrap(), html, &["Acme Health".to_string()]);
        extract_title(&page, &FieldHints::new())
    }

    #[test]
    fn og_title_is_split() {
        let t = title_of(
            "https://acme.careers.example.com/jobs/1",
            "<head><meta property='og:title' content='Acme Health | Ward Clerk'></head><body></body>",
        );
        assert_eq!(t.as_deref(), Some("Ward Clerk"));
    }

    #[test]
    fn company_heading_is_skipped() {
        let t = title_of(
            "https://acme.careers.example.com/jobs/1",
            "<head><title>Acme Health</title></head><body><h1>ACME HEALTH</h1><h2>Pharmacist</h2></body>",
        );
        assert_eq!(t.as_deref(), Some("Pharmacist"));
    }

    #[test]
    fn chrome_and_section_headings_are_skipped() {
        let t = title_of(
            "https://acme.careers.example.com/jobs/1",
            "<body><header><h1>Careers at Acme</h1></header><h2>About the role</h2><h3>Dietitian</h3></body>",
        );
        assert_eq!(t.as_deref(), Some("Dietitian"));
    }

    #[test]
    fn slug_is_last_resort() {
        let t = title_of(
            "https://acme.careers.example.com/jobs/88/senior-radiographer",
            "<head><title>Job Details</title></head><body><h1>Acme Health</h1></body>",
        );
        assert_eq!(t.as_deref(), Some("Senior Radiographer"));
    }

    #[test]
    fn nothing_usable() {
        let t = title_of("https://acme.careers.example.com/jobs/88", "<body><h1>Careers</h1></body>");
        assert_eq!(t, None);
    }
}
