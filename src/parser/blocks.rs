use scraper::ElementRef;

use super::{element_text, squash};

/// Flattened view of a content region in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Item(String),
    Text(String),
}

impl Block {
    pub fn text(&self) -> &str {
        match self {
            Block::Heading { text, .. } => text,
            Block::Item(t) | Block::Text(t) => t,
        }
    }
}

const CONTAINER_TAGS: &[&str] = &[
    "div", "section", "article", "main", "header", "footer", "aside", "ul", "ol", "dl",
    "table", "thead", "tbody", "tr", "form", "fieldset", "span", "body", "html", "center",
];

const LEAF_BLOCK_TAGS: &[&str] = &["p", "dd", "dt", "td", "th", "blockquote", "pre", "address"];

/// Bold-only paragraphs longer than this are emphasis, not headings.
const MAX_PSEUDO_HEADING: usize = 80;

pub fn classify_nodes(root: ElementRef<'_>) -> Vec<Block> {
    let mut blocks = Vec::new();
    visit(root, &mut blocks);
    blocks
}

fn visit(el: ElementRef<'_>, blocks: &mut Vec<Block>) {
    for child in el.children() {
        if let Some(t) = child.value().as_text() {
            let t = squash(t);
            if !t.is_empty() {
                blocks.push(Block::Text(t));
            }
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_el.value().name();

        if let Some(level) = heading_level(name) {
            let text = element_text(child_el);
            if !text.is_empty() {
                blocks.push(Block::Heading { level, text });
            }
        } else if name == "li" {
            let text = element_text(child_el);
            if !text.is_empty() {
                blocks.push(Block::Item(text));
            }
        } else if LEAF_BLOCK_TAGS.contains(&name) {
            if let Some(text) = pseudo_heading(child_el) {
                blocks.push(Block::Heading { level: 6, text });
            } else {
                let text = element_text(child_el);
                if !text.is_empty() {
                    blocks.push(Block::Text(text));
                }
            }
        } else if CONTAINER_TAGS.contains(&name) && has_block_children(child_el) {
            visit(child_el, blocks);
        } else if name != "br" {
            if let Some(text) = pseudo_heading(child_el) {
                blocks.push(Block::Heading { level: 6, text });
            } else {
                let text = element_text(child_el);
                if !text.is_empty() {
                    blocks.push(Block::Text(text));
                }
            }
        }
    }
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn has_block_children(el: ElementRef<'_>) -> bool {
    el.children().filter_map(ElementRef::wrap).any(|c| {
        let n = c.value().name();
        heading_level(n).is_some()
            || n == "li"
            || LEAF_BLOCK_TAGS.contains(&n)
            || (CONTAINER_TAGS.contains(&n) && n != "span")
    })
}

/// `<p><strong>Responsibilities</strong></p>`: an element whose whole text sits
/// inside a single bold child.
fn pseudo_heading(el: ElementRef<'_>) -> Option<String> {
    let text = element_text(el);
    if text.is_empty() || text.chars().count() > MAX_PSEUDO_HEADING {
        return None;
    }
    let bold = el
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| matches!(c.value().name(), "strong" | "b"))?;
    let bold_text = element_text(bold);
    let trimmed = text.trim_end_matches(':').trim();
    if bold_text.trim_end_matches(':').trim() == trimmed {
        Some(trimmed.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn blocks(html: &str) -> Vec<Block> {
        let doc = Html::parse_document(html);
        classify_nodes(doc.root_element())
    }

    #[test]
    fn headings_items_and_text() {
        let b = blocks("<body><h2>About the role</h2><p>We care.</p><ul><li>One</li><li>Two</li></ul></body>");
        assert_eq!(
            b,
            vec![
                Block::Heading { level: 2, text: "About the role".into() },
                Block::Text("We care.".into()),
                Block::Item("One".into()),
                Block::Item("Two".into()),
            ]
        );
    }

    #[test]
    fn bold_paragraph_is_heading() {
        let b = blocks("<body><p><strong>Requirements:</strong></p><p><strong>Note</strong> apply soon</p></body>");
        assert_eq!(b[0], Block::Heading { level: 6, text: "Requirements".into() });
        assert_eq!(b[1], Block::Text("Note apply soon".into()));
    }

    #[test]
    fn nested_containers_are_flattened() {
        let b = blocks("<body><div><div><h3>Skills</h3><div>Rust <em>and</em> SQL</div></div></div></body>");
        assert_eq!(b[0], Block::Heading { level: 3, text: "Skills".into() });
        assert_eq!(b[1], Block::Text("Rust and SQL".into()));
    }
}
