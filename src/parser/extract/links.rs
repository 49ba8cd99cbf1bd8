//! Link discovery on listing and unlabelled pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{labels, Field};
use crate::model::{FieldHints, Label};
use crate::parser::{element_text, sel, squash, JobPage};
use crate::routes;

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));
static PAGINATION_SEL: LazyLock<Selector> = LazyLock::new(|| {
    sel(".pagination a[href], .pager a[href], a[rel='next'], [class*='paging'] a[href], \
         [class*='Pagination'] a[href], nav[aria-label*='agination'] a[href], a[href*='page=']")
});

const CARD_TAGS: &[&str] = &["li", "tr", "article"];
const CARD_CLASSES: &[&str] = &["job", "card", "result", "posting", "vacancy", "listing-item", "search-item"];

/// Class-name keywords that mark a card's preview value for a field, and
/// keywords that rule a class out for that field.
const HINT_CLASSES: &[(Field, &[&str], &[&str])] = &[
    (Field::Location, &["location", "city"], &[]),
    (Field::Department, &["department", "division"], &[]),
    (Field::Category, &["category", "job-family"], &[]),
    (Field::Salary, &["salary", "pay-rate", "payrate", "compensation"], &[]),
    (Field::RefNumber, &["ref", "requisition", "job-id", "jobid"], &[]),
    (
        Field::PostedDate,
        &["posted", "post-date", "postdate", "publish"],
        &["clos", "expir", "start", "deadline", "end-date"],
    ),
    (Field::EmploymentType, &["job-type", "jobtype", "employment-type", "employment"], &[]),
    (Field::WorkType, &["work-type", "worktype", "workplace", "remote"], &[]),
    (Field::Schedule, &["schedule", "shift"], &[]),
    (Field::Entity, &["entity", "company", "organisation", "organization"], &[]),
];

const PREV_TEXTS: &[&str] = &["prev", "previous", "«", "‹", "<", "<<", "first"];

/// One job preview on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCard {
    pub url: String,
    pub title: String,
    pub hints: FieldHints,
}

/// Job previews in document order, one per unique detail URL.
pub fn job_cards(page: &JobPage) -> Vec<JobCard> {
    let mut seen_urls = HashSet::new();
    let mut seen_cards = HashSet::new();
    let mut cards = Vec::new();

    for a in page.body().select(&ANCHOR_SEL) {
        let Some(url) = detail_href(page, a) else {
            continue;
        };
        let card = card_for(page, a);
        if let Some(card) = card {
            if !seen_cards.insert(card.id()) {
                continue;
            }
        }
        if !seen_urls.insert(routes::unique_key(&url)) {
            continue;
        }
        let hints = card.map(|c| card_hints(c, a)).unwrap_or_default();
        cards.push(JobCard {
            url,
            title: element_text(a),
            hints,
        });
    }
    cards
}

fn detail_href(page: &JobPage, a: ElementRef<'_>) -> Option<String> {
    let url = routes::resolve(&page.url, a.value().attr("href")?)?;
    (routes::classify(&url) == Some(Label::Detail)).then_some(url)
}

/// Nearest ancestor that wraps this job and no other.
fn card_for<'a>(page: &JobPage, a: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let own = detail_href(page, a).map(|u| routes::job_id_from_url(&u));
    for node in a.ancestors() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        if matches!(el.value().name(), "body" | "html") {
            return None;
        }
        let class = el.value().attr("class").unwrap_or("").to_lowercase();
        let looks_like_card = CARD_TAGS.contains(&el.value().name())
            || CARD_CLASSES.iter().any(|c| class.contains(c));
        if !looks_like_card {
            continue;
        }
        let others = el
            .select(&ANCHOR_SEL)
            .filter_map(|x| detail_href(page, x))
            .any(|u| Some(routes::job_id_from_url(&u)) != own);
        return if others { None } else { Some(el) };
    }
    None
}

/// Preview values shown on the card, keyed by hint key.
fn card_hints(card: ElementRef<'_>, anchor: ElementRef<'_>) -> FieldHints {
    let mut hints = FieldHints::new();
    let title = element_text(anchor);

    for field in Field::ALL {
        let Some(key) = field.hint_key() else {
            continue;
        };
        let value = labels::lookup(card, field).or_else(|| class_value(card, anchor, field));
        if let Some(v) = value.map(|v| squash(&v)) {
            if !v.is_empty() && v != title && v.chars().count() <= field.max_len() {
                hints.insert(key.to_string(), v);
            }
        }
    }
    hints
}

fn class_value(card: ElementRef<'_>, anchor: ElementRef<'_>, field: Field) -> Option<String> {
    let (_, keywords, excludes) = HINT_CLASSES.iter().find(|(f, _, _)| *f == field)?;
    card.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.id() != card.id() && el.id() != anchor.id())
        .filter(|el| !anchor.ancestors().any(|a| a.id() == el.id()))
        .find(|el| {
            let class = el.value().attr("class").unwrap_or("").to_lowercase();
            keywords.iter().any(|k| class.contains(k)) && !excludes.iter().any(|x| class.contains(x))
        })
        .map(element_text)
        .map(|t| strip_label(&t, field))
        .filter(|t| !t.is_empty())
}

/// `Location: Sydney` → `Sydney` when the prefix is a synonym of `field`.
fn strip_label(text: &str, field: Field) -> String {
    if let Some((label, rest)) = text.split_once(':') {
        if field.synonyms().contains(&labels::normalize_label(label).as_str()) {
            return rest.trim().to_string();
        }
    }
    text.trim().to_string()
}

/// Next-page links, excluding backwards links, detail links and the page itself.
pub fn pagination_links(page: &JobPage) -> Vec<String> {
    let self_key = routes::unique_key(page.url.as_str());
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for a in page.body().select(&PAGINATION_SEL) {
        let text = element_text(a).to_lowercase();
        let rel = a.value().attr("rel").unwrap_or("").to_lowercase();
        if rel.contains("prev") || PREV_TEXTS.iter().any(|p| text == *p || text.starts_with(&format!("{p} "))) {
            continue;
        }
        let Some(url) = a.value().attr("href").and_then(|h| routes::resolve(&page.url, h)) else {
            continue;
        };
        let Ok(parsed) = url::Url::parse(&url) else {
            continue;
        };
        if parsed.host_str() != page.url.host_str() {
            continue;
        }
        let label = routes::classify(&url);
        if label == Some(Label::Detail) {
            continue;
        }
        if label != Some(Label::Listing) && parsed.path() != page.url.path() {
            continue;
        }
        let key = routes::unique_key(&url);
        if key == self_key || !seen.insert(key) {
            continue;
        }
        out.push(url);
    }
    out
}

/// Every same-host detail-shaped and listing-shaped link.
pub fn scan_links(page: &JobPage) -> (Vec<String>, Vec<String>) {
    let self_key = routes::unique_key(page.url.as_str());
    let mut seen = HashSet::new();
    let mut details = Vec::new();
    let mut listings = Vec::new();

    for a in page.body().select(&ANCHOR_SEL) {
        let Some(url) = a.value().attr("href").and_then(|h| routes::resolve(&page.url, h)) else {
            continue;
        };
        let same_host = url::Url::parse(&url)
            .map(|u| u.host_str() == page.url.host_str())
            .unwrap_or(false);
        if !same_host {
            continue;
        }
        let key = routes::unique_key(&url);
        if key == self_key || !seen.insert(key) {
            continue;
        }
        match routes::classify(&url) {
            Some(Label::Detail) => details.push(url),
            Some(Label::Listing) => listings.push(url),
            _ => {}
        }
    }
    (details, listings)
}

/// First link whose text or target mentions applying.
pub fn apply_url(page: &JobPage) -> Option<String> {
    let anchors: Vec<_> = page.body().select(&ANCHOR_SEL).collect();
    let by_text = anchors
        .iter()
        .find(|a| element_text(**a).to_lowercase().contains("apply"));
    let by_href = || {
        anchors.iter().find(|a| {
            a.value()
                .attr("href")
                .is_some_and(|h| h.to_lowercase().contains("apply"))
        })
    };
    by_text
        .or_else(by_href)
        .and_then(|a| routes::resolve(&page.url, a.value().attr("href")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(url: &str, html: &str) -> JobPage {
        JobPage::parse(Url::parse(url).unwrap(), html, &[])
    }

    fn fixture(name: &str) -> JobPage {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        page("https://acme.careers.example.com/jobs/search", &html)
    }

    #[test]
    fn listing_cards_are_deduplicated() {
        let p = fixture("listing");
        let cards = job_cards(&p);
        let urls: Vec<_> = cards.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://acme.careers.example.com/jobs/4821",
                "https://acme.careers.example.com/jobs/5120",
                "https://acme.careers.example.com/jobs/5133",
            ]
        );
        assert_eq!(cards[0].title, "Registered Nurse - Emergency");
    }

    #[test]
    fn card_previews_become_hints() {
        let cards = job_cards(&fixture("listing"));
        let first = &cards[0].hints;
        assert_eq!(first.get("location").map(String::as_str), Some("Sydney, NSW"));
        assert_eq!(first.get("department").map(String::as_str), Some("Emergency Department"));
        assert_eq!(first.get("ref").map(String::as_str), Some("REQ-2291"));
        let second = &cards[1].hints;
        assert_eq!(second.get("location").map(String::as_str), Some("Brisbane North"));
        assert!(!second.contains_key("title"));
    }

    #[test]
    fn closing_date_is_not_a_posted_date() {
        let cards = job_cards(&fixture("listing"));
        assert!(!cards[0].hints.contains_key("postedDate"));
        assert_eq!(
            cards[2].hints.get("postedDate").map(String::as_str),
            Some("Posted 10 Feb 2026")
        );
    }

    #[test]
    fn pagination_skips_previous_and_self() {
        let links = pagination_links(&fixture("listing"));
        assert_eq!(
            links,
            vec![
                "https://acme.careers.example.com/jobs/search?page=2",
                "https://acme.careers.example.com/jobs/search?page=3",
            ]
        );
    }

    #[test]
    fn empty_listing_has_no_cards() {
        let p = fixture("listing_empty");
        assert!(job_cards(&p).is_empty());
        assert!(pagination_links(&p).is_empty());
    }

    #[test]
    fn scan_finds_both_shapes() {
        let p = page(
            "https://acme.careers.example.com/",
            "<body><a href='/jobs/12'>A</a><a href='/jobs/12#top'>A again</a>\
             <a href='/jobs/search'>All jobs</a><a href='https://other.example.org/jobs/9'>X</a>\
             <a href='/about'>About</a></body>",
        );
        let (details, listings) = scan_links(&p);
        assert_eq!(details, vec!["https://acme.careers.example.com/jobs/12"]);
        assert_eq!(listings, vec!["https://acme.careers.example.com/jobs/search"]);
    }

    #[test]
    fn apply_link_by_text_then_href() {
        let p = page(
            "https://acme.careers.example.com/jobs/12",
            "<body><a href='/'>Home</a><a href='https://apply.example.org/x?id=12'>Start</a>\
             <a href='/jobs/12/go'>Apply Now</a></body>",
        );
        assert_eq!(
            apply_url(&p).as_deref(),
            Some("https://acme.careers.example.com/jobs/12/go")
        );
        let p = page(
            "https://acme.careers.example.com/jobs/12",
            "<body><a href='https://apply.example.org/x?id=12'>Start</a></body>",
        );
        assert_eq!(apply_url(&p).as_deref(), Some("https://apply.example.org/x?id=12"));
    }
}
