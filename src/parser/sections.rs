use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::blocks::{classify_nodes, Block};
use super::{block_text, element_text, sel, JobPage};

static SECTIONING_SEL: LazyLock<Selector> = LazyLock::new(|| {
    sel("section, [class*='section'], [class*='Section'], [class*='panel'], [class*='accordion']")
});

/// Heading text longer than this is prose, not a section title.
const MAX_HEADING_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Duties,
    Qualifications,
    Description,
}

/// Heading keywords per bucket. Checked in order, so "duties" wins over
/// "description" for "Job Description & Duties".
const HEADING_KEYWORDS: &[(Bucket, &[&str])] = &[
    (
        Bucket::Duties,
        &[
            "duties",
            "responsibilities",
            "what you will do",
            "what you'll do",
            "what you’ll do",
            "key tasks",
            "accountabilities",
            "your role",
            "the role involves",
        ],
    ),
    (
        Bucket::Qualifications,
        &[
            "qualifications",
            "requirements",
            "skills",
            "experience",
            "what you will need",
            "what you'll need",
            "what you’ll need",
            "what we're looking for",
            "who you are",
            "selection criteria",
            "education",
            "competencies",
        ],
    ),
    (
        Bucket::Description,
        &[
            "description",
            "overview",
            "summary",
            "about",
            "the opportunity",
            "introduction",
            "position purpose",
        ],
    ),
];

#[derive(Debug, Clone)]
pub struct Section {
    pub kind: Option<Bucket>,
    pub heading: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionText {
    pub description: Option<String>,
    pub qualifications: Option<String>,
    pub duties: Option<String>,
}

impl SectionText {
    fn is_empty(&self) -> bool {
        self.description.is_none() && self.qualifications.is_none() && self.duties.is_none()
    }

    fn add(&mut self, kind: Bucket, text: String) {
        if text.is_empty() {
            return;
        }
        match kind {
            Bucket::Duties => append(&mut self.duties, text),
            Bucket::Qualifications => append(&mut self.qualifications, text),
            // Several description-like sections: keep the longest.
            Bucket::Description => {
                if self.description.as_ref().map_or(true, |d| d.len() < text.len()) {
                    self.description = Some(text);
                }
            }
        }
    }
}

fn append(slot: &mut Option<String>, text: String) {
    match slot {
        Some(existing) => {
            existing.push_str("\n\n");
            existing.push_str(&text);
        }
        None => *slot = Some(text),
    }
}

pub fn classify_heading(text: &str) -> Option<Bucket> {
    if text.chars().count() > MAX_HEADING_LEN {
        return None;
    }
    let lower = text.to_lowercase();
    HEADING_KEYWORDS
        .iter()
        .find(|(_, kws)| kws.iter().any(|kw| lower.contains(kw)))
        .map(|(bucket, _)| *bucket)
}

/// Split blocks at headings. An unclassified heading nested deeper than the
/// current classified one stays inside the current section.
pub fn cluster_sections(blocks: &[Block]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current = Section {
        kind: None,
        heading: String::new(),
        blocks: Vec::new(),
    };
    let mut current_level = 0u8;

    for block in blocks {
        if let Block::Heading { level, text } = block {
            let kind = classify_heading(text);
            if kind.is_none() && current.kind.is_some() && *level > current_level {
                current.blocks.push(Block::Text(text.clone()));
                continue;
            }
            if !current.blocks.is_empty() || !current.heading.is_empty() {
                sections.push(std::mem::replace(
                    &mut current,
                    Section {
                        kind,
                        heading: text.clone(),
                        blocks: Vec::new(),
                    },
                ));
            } else {
                current.kind = kind;
                current.heading = text.clone();
            }
            current_level = *level;
            continue;
        }
        current.blocks.push(block.clone());
    }

    if !current.blocks.is_empty() || !current.heading.is_empty() {
        sections.push(current);
    }
    sections
}

/// Description, qualifications and duties of a posting.
pub fn extract_sections(page: &JobPage) -> SectionText {
    let main = page.main_content();
    let mut out = SectionText::default();

    for section in cluster_sections(&classify_nodes(main)) {
        if let Some(kind) = section.kind {
            out.add(kind, section_to_text(&section));
        }
    }

    // Sites without heading tags: titled sectioning elements.
    let secondary = scan_sectioning_elements(main);
    for (kind, text) in secondary {
        let empty = match kind {
            Bucket::Duties => out.duties.is_none(),
            Bucket::Qualifications => out.qualifications.is_none(),
            Bucket::Description => out.description.is_none(),
        };
        if empty {
            out.add(kind, text);
        }
    }

    if out.is_empty() {
        let all = block_text(main);
        if !all.is_empty() {
            out.description = Some(all);
        }
    }
    out
}

fn scan_sectioning_elements(root: ElementRef<'_>) -> Vec<(Bucket, String)> {
    let mut found = Vec::new();
    for el in root.select(&SECTIONING_SEL) {
        let Some(title) = section_title(el) else {
            continue;
        };
        let Some(kind) = classify_heading(&title) else {
            continue;
        };
        let body = block_text(el);
        let rest = body
            .strip_prefix(title.as_str())
            .unwrap_or(&body)
            .trim_start_matches(':')
            .trim()
            .to_string();
        if !rest.is_empty() {
            found.push((kind, rest));
        }
    }
    found
}

/// First child that looks like a title: a heading, bold text, or an element
/// whose class says title/heading/header/label.
fn section_title(el: ElementRef<'_>) -> Option<String> {
    let first = el.children().filter_map(ElementRef::wrap).next()?;
    let name = first.value().name();
    let class = first.value().attr("class").unwrap_or("").to_lowercase();
    let titled = matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "strong" | "b" | "legend")
        || ["title", "heading", "header", "label"].iter().any(|c| class.contains(c));
    if !titled {
        return None;
    }
    let text = element_text(first);
    let text = text.trim_end_matches(':').trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn section_to_text(section: &Section) -> String {
    section
        .blocks
        .iter()
        .map(|b| match b {
            Block::Item(t) => format!("- {}", t),
            other => other.text().to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(html: &str) -> JobPage {
        JobPage::parse(
            Url::parse("https://acme.careers.example.com/jobs/1").unwrap(),
            html,
            &[],
        )
    }

    fn kinds(html: &str) -> Vec<Option<Bucket>> {
        let p = page(html);
        cluster_sections(&classify_nodes(p.body()))
            .iter()
            .map(|s| s.kind)
            .collect()
    }

    #[test]
    fn heading_keywords() {
        assert_eq!(classify_heading("Key Responsibilities"), Some(Bucket::Duties));
        assert_eq!(classify_heading("Skills & Experience"), Some(Bucket::Qualifications));
        assert_eq!(classify_heading("About the Opportunity"), Some(Bucket::Description));
        assert_eq!(classify_heading("Benefits"), None);
    }

    #[test]
    fn sections_split_at_headings() {
        let k = kinds(
            "<body><p>Intro</p><h2>Overview</h2><p>A</p><h2>Duties</h2><ul><li>x</li></ul>\
             <h2>Requirements</h2><p>B</p><h2>Benefits</h2><p>C</p></body>",
        );
        assert_eq!(
            k,
            vec![
                None,
                Some(Bucket::Description),
                Some(Bucket::Duties),
                Some(Bucket::Qualifications),
                None
            ]
        );
    }

    #[test]
    fn unclassified_subheading_stays_in_section() {
        let k = kinds("<body><h3>Requirements</h3><h4>Must have</h4><p>RN licence</p></body>");
        assert_eq!(k, vec![Some(Bucket::Qualifications)]);
    }

    #[test]
    fn longest_description_wins() {
        let p = page(
            "<body><main><h2>Summary</h2><p>Short.</p><h2>About the role</h2>\
             <p>A much longer description of what this role is about.</p></main></body>",
        );
        let s = extract_sections(&p);
        assert_eq!(
            s.description.as_deref(),
            Some("A much longer description of what this role is about.")
        );
    }

    #[test]
    fn duties_are_bulleted() {
        let p = page("<body><h2>Responsibilities</h2><ul><li>Triage</li><li>Chart</li></ul></body>");
        let s = extract_sections(&p);
        assert_eq!(s.duties.as_deref(), Some("- Triage\n- Chart"));
    }

    #[test]
    fn sectioning_elements_without_headings() {
        let p = page(
            "<body><div class='section'><div class='section-title'>Qualifications</div>\
             <div>Current RN registration</div></div></body>",
        );
        let s = extract_sections(&p);
        assert_eq!(s.qualifications.as_deref(), Some("Current RN registration"));
    }

    #[test]
    fn whole_region_is_last_resort() {
        let p = page("<body><p>Join us.</p><p>Great team.</p></body>");
        let s = extract_sections(&p);
        assert_eq!(s.description.as_deref(), Some("Join us.\nGreat team."));
        assert_eq!(s.duties, None);
    }
}
