//! Label-adjacent value lookup and free-text `Label: value` matching.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node, Selector};

use super::{Field, LABELS};
use crate::model::FieldHints;
use crate::parser::{block_text, element_text, sel, squash, JobPage};

static LABEL_CLASS_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel("label, [class*='label'], [class*='Label'], [class*='field-name'], [class*='key']"));
static VALUE_CLASS_SEL: LazyLock<Selector> =
    LazyLock::new(|| sel("[class*='value'], [class*='Value'], [class*='field-data'], [class*='data']"));
static BOLD_SEL: LazyLock<Selector> = LazyLock::new(|| sel("strong, b, em"));
static DT_SEL: LazyLock<Selector> = LazyLock::new(|| sel("dt"));
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| sel("tr"));
static BARE_SEL: LazyLock<Selector> = LazyLock::new(|| sel("div, span, p"));

/// Labels that are not mapped to a field but still terminate a free-text value.
const EXTRA_LABELS: &[&str] = &[
    "closing date",
    "close date",
    "closes",
    "start date",
    "contact",
    "contact person",
    "benefits",
    "travel",
    "shift",
    "positions available",
    "openings",
];

/// Text longer than this is not a label.
const MAX_LABEL_LEN: usize = 40;
/// Unmapped label values longer than this are prose, not a field.
const MAX_EXTRA_VALUE_LEN: usize = 300;

/// Per-field `Label: value` regexes. The value runs to the next known label
/// followed by a colon, or to the end of the line.
static FREE_TEXT: LazyLock<HashMap<Field, Regex>> = LazyLock::new(|| {
    let mut all: Vec<&str> = LABELS
        .iter()
        .flat_map(|(_, syns)| syns.iter().copied())
        .chain(EXTRA_LABELS.iter().copied())
        .collect();
    all.sort_by_key(|s| std::cmp::Reverse(s.len()));
    let stop = alternation(&all);

    LABELS
        .iter()
        .map(|(field, syns)| {
            let mut syns = syns.to_vec();
            syns.sort_by_key(|s| std::cmp::Reverse(s.len()));
            let pattern = format!(
                r"(?im)(?:^|[\s|•·;,])(?:{})\s*:\s*(.+?)\s*(?:(?:^|[\s|•·;,])(?:{})\s*:|$)",
                alternation(&syns),
                stop
            );
            (*field, Regex::new(&pattern).unwrap())
        })
        .collect()
});

fn alternation(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

/// Lowercased label text without trailing colon or asterisk.
pub fn normalize_label(s: &str) -> String {
    squash(s)
        .trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
        .to_lowercase()
}

/// A label and the value read next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub label: String,
    pub value: String,
}

type PairScan = fn(ElementRef<'_>) -> Vec<Pair>;

/// Structural label/value patterns, in lookup order.
const SCANS: &[PairScan] = &[
    field_block_pairs,
    emphasized_pairs,
    definition_pairs,
    table_pairs,
    sibling_pairs,
];

fn is_label_text(text: &str) -> bool {
    let n = text.chars().count();
    n > 0 && n <= MAX_LABEL_LEN
}

fn pair(label: &str, value: String) -> Option<Pair> {
    let label = squash(label)
        .trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
        .to_string();
    let value = squash(&value);
    let value = value.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    if !is_label_text(&label) || value.is_empty() || value.eq_ignore_ascii_case(&label) {
        return None;
    }
    Some(Pair {
        label,
        value: value.to_string(),
    })
}

/// Element has a child element carrying the same text, so the child is the real label.
fn has_same_text_child(el: ElementRef<'_>, text: &str) -> bool {
    el.children()
        .filter_map(ElementRef::wrap)
        .any(|c| element_text(c) == text)
}

/// Text following `el` among its siblings: loose text first, then the next element.
fn following_value(el: ElementRef<'_>) -> Option<String> {
    for sib in el.next_siblings() {
        if let Some(t) = sib.value().as_text() {
            let t = squash(t);
            if !t.is_empty() && t != ":" {
                return Some(t);
            }
            continue;
        }
        if let Some(e) = ElementRef::wrap(sib) {
            if e.value().name() == "br" {
                continue;
            }
            let t = element_text(e);
            return if t.is_empty() { None } else { Some(t) };
        }
    }
    None
}

/// (a) `<div class="field"><span class="label">X</span><span class="value">Y</span></div>`
fn field_block_pairs(scope: ElementRef<'_>) -> Vec<Pair> {
    let mut out = Vec::new();
    for label_el in scope.select(&LABEL_CLASS_SEL) {
        let label = element_text(label_el);
        if !is_label_text(&label) || has_same_text_child(label_el, &label) {
            continue;
        }
        let from_parent = label_el.parent().and_then(ElementRef::wrap).and_then(|parent| {
            parent
                .select(&VALUE_CLASS_SEL)
                .find(|v| v.id() != label_el.id() && !v.ancestors().any(|a| a.id() == label_el.id()))
                .map(element_text)
                .filter(|t| !t.is_empty())
        });
        if let Some(p) = from_parent
            .or_else(|| following_value(label_el))
            .and_then(|v| pair(&label, v))
        {
            out.push(p);
        }
    }
    out
}

/// (b) `<li><strong>Location:</strong> Sydney</li>`
///
/// The emphasis must open its parent and read as a label (colon or known
/// synonym), so emphasis inside prose is never taken for one.
fn emphasized_pairs(scope: ElementRef<'_>) -> Vec<Pair> {
    let mut out = Vec::new();
    for bold in scope.select(&BOLD_SEL) {
        let label = element_text(bold);
        if !is_label_text(&label) {
            continue;
        }
        let Some(parent) = bold.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        let first = parent.children().find(|c| match c.value() {
            Node::Text(t) => !t.trim().is_empty(),
            Node::Element(_) => true,
            _ => false,
        });
        if first.map(|f| f.id()) != Some(bold.id()) {
            continue;
        }
        let rest = trailing_text(bold);
        let labelled = label.ends_with(':') || rest.starts_with(':') || Field::for_label(&label).is_some();
        if !labelled {
            continue;
        }
        if let Some(p) = pair(&label, rest) {
            out.push(p);
        }
    }
    out
}

/// Text of the siblings after `el`, up to the first line break that follows some text.
fn trailing_text(el: ElementRef<'_>) -> String {
    let mut text = String::new();
    for sib in el.next_siblings() {
        match sib.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => {
                if !text.trim().is_empty() {
                    break;
                }
            }
            Node::Element(_) => {
                if let Some(e) = ElementRef::wrap(sib) {
                    text.push(' ');
                    text.push_str(&element_text(e));
                }
            }
            _ => {}
        }
    }
    squash(&text)
}

/// (c) `<dt>Location</dt><dd>Sydney</dd>`
fn definition_pairs(scope: ElementRef<'_>) -> Vec<Pair> {
    let mut out = Vec::new();
    for dt in scope.select(&DT_SEL) {
        let dd = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|e| matches!(e.value().name(), "dd" | "dt"))
            .filter(|e| e.value().name() == "dd");
        if let Some(p) = dd.and_then(|dd| pair(&element_text(dt), element_text(dd))) {
            out.push(p);
        }
    }
    out
}

/// (d) `<tr><th>Location</th><td>Sydney</td></tr>` or a two-cell `td` row.
fn table_pairs(scope: ElementRef<'_>) -> Vec<Pair> {
    let mut out = Vec::new();
    for tr in scope.select(&TR_SEL) {
        let cells: Vec<_> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "th" | "td"))
            .collect();
        if cells.len() != 2 {
            continue;
        }
        if let Some(p) = pair(&element_text(cells[0]), element_text(cells[1])) {
            out.push(p);
        }
    }
    out
}

/// (e) A bare block whose text is a label, followed by the value block.
fn sibling_pairs(scope: ElementRef<'_>) -> Vec<Pair> {
    let mut out = Vec::new();
    for el in scope.select(&BARE_SEL) {
        let label = element_text(el);
        if !is_label_text(&label) || has_same_text_child(el, &label) {
            continue;
        }
        if !label.ends_with(':') && Field::for_label(&label).is_none() {
            continue;
        }
        if let Some(p) = following_value(el).and_then(|v| pair(&label, v)) {
            out.push(p);
        }
    }
    out
}

/// Value for the first label synonym of `field` found in `scope`.
pub fn lookup(scope: ElementRef<'_>, field: Field) -> Option<String> {
    let syns = field.synonyms();
    SCANS.iter().find_map(|scan| {
        scan(scope)
            .into_iter()
            .find(|p| syns.contains(&normalize_label(&p.label).as_str()))
            .map(|p| p.value)
    })
}

/// Cascade step: label-adjacent value, main region first.
pub fn from_label(page: &JobPage, _: &FieldHints, field: Field) -> Option<String> {
    let main = page.main_content();
    let body = page.body();
    lookup(main, field).or_else(|| {
        if main.id() == body.id() {
            None
        } else {
            lookup(body, field)
        }
    })
}

/// `Label: value` in free text.
pub fn match_free_text(text: &str, field: Field) -> Option<String> {
    let re = FREE_TEXT.get(&field)?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Cascade step: free-text pattern over the visible text.
pub fn from_free_text(page: &JobPage, _: &FieldHints, field: Field) -> Option<String> {
    match_free_text(&block_text(page.main_content()), field)
        .or_else(|| match_free_text(&page.visible_text(), field))
}

/// Label/value pairs whose label maps to no known field, keyed by label as shown.
pub fn additional_fields(scope: ElementRef<'_>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for scan in SCANS {
        for p in scan(scope) {
            if Field::for_label(&p.label).is_some() || p.value.chars().count() > MAX_EXTRA_VALUE_LEN {
                continue;
            }
            out.entry(p.label).or_insert(p.value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn find(html: &str, field: Field) -> Option<String> {
        let doc = Html::parse_document(html);
        lookup(doc.root_element(), field)
    }

    #[test]
    fn structured_field_block() {
        let html = "<div class='field'><span class='field-label'>Work Location</span>\
                    <span class='field-value'>Sydney, NSW</span></div>";
        assert_eq!(find(html, Field::Location).as_deref(), Some("Sydney, NSW"));
    }

    #[test]
    fn emphasized_label_inline_text() {
        let html = "<ul><li><strong>Department:</strong> Emergency</li></ul>";
        assert_eq!(find(html, Field::Department).as_deref(), Some("Emergency"));
    }

    #[test]
    fn emphasis_inside_prose_is_not_a_label() {
        let html = "<p>Join our <strong>team</strong> of 40 nurses caring for patients.</p>\
                    <p>The <b>location</b> is close to public transport.</p>";
        assert_eq!(find(html, Field::Department), None);
        assert_eq!(find(html, Field::Location), None);

        let html = "<p><b>Location:</b> Perth<br>Apply by Friday</p>";
        assert_eq!(find(html, Field::Location).as_deref(), Some("Perth"));
    }

    #[test]
    fn definition_and_table_pairs() {
        let html = "<dl><dt>Job Type</dt><dd>Casual</dd></dl>\
                    <table><tr><th>Category</th><td>Allied Health</td></tr></table>";
        assert_eq!(find(html, Field::EmploymentType).as_deref(), Some("Casual"));
        assert_eq!(find(html, Field::Category).as_deref(), Some("Allied Health"));
    }

    #[test]
    fn adjacent_sibling_blocks() {
        let html = "<div><div>Duration</div><div>12 months</div></div>";
        assert_eq!(find(html, Field::Duration).as_deref(), Some("12 months"));
    }

    #[test]
    fn unknown_label_does_not_match() {
        let html = "<dl><dt>Locale</dt><dd>en-AU</dd></dl>";
        assert_eq!(find(html, Field::Location), None);
    }

    #[test]
    fn free_text_stops_at_next_label() {
        let text = "Location: Brisbane Department: Surgical Services\nSalary: $70,000 - $78,000 per year";
        assert_eq!(match_free_text(text, Field::Location).as_deref(), Some("Brisbane"));
        assert_eq!(
            match_free_text(text, Field::Department).as_deref(),
            Some("Surgical Services")
        );
        assert_eq!(
            match_free_text(text, Field::Salary).as_deref(),
            Some("$70,000 - $78,000 per year")
        );
        assert_eq!(match_free_text(text, Field::Entity), None);
    }

    #[test]
    fn free_text_needs_a_colon() {
        assert_eq!(match_free_text("Our location is great", Field::Location), None);
    }

    #[test]
    fn unmapped_labels_are_collected() {
        let doc = Html::parse_document(
            "<dl><dt>Location</dt><dd>Perth</dd><dt>Closing Date</dt><dd>28 Feb 2026</dd>\
             <dt>Travel</dt><dd>Occasional</dd></dl>",
        );
        let extra = additional_fields(doc.root_element());
        assert_eq!(extra.len(), 2);
        assert_eq!(extra.get("Travel").map(String::as_str), Some("Occasional"));
        assert!(!extra.contains_key("Location"));
    }
}
