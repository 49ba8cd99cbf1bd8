//! Evidence artifacts for pages that could not be processed.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use scraper::{ElementRef, Html};
use tracing::info;

use crate::model::ErrorEvidence;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "pre"];

/// Text children up to this length stay on the element's line.
const INLINE_TEXT: usize = 80;

/// Writes one `.html` file per unrecoverable page.
pub struct EvidenceRecorder {
    dir: PathBuf,
    enabled: bool,
}

impl EvidenceRecorder {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `evidence` for `tenant`. Returns the artifact path, or `None`
    /// when recording is switched off.
    pub fn record(&self, tenant: &str, evidence: &ErrorEvidence) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating evidence dir {}", self.dir.display()))?;

        let name = artifact_name(tenant, evidence.error_kind.as_str(), &Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string());
        let mut path = self.dir.join(&name);
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(name.replace(".html", &format!("-{}.html", n)));
            n += 1;
        }

        let content = render(evidence);
        let tmp = path.with_extension("html.tmp");
        fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("renaming to {}", path.display()))?;

        info!(kind = %evidence.error_kind, url = %evidence.url, path = %path.display(), "evidence saved");
        Ok(Some(path))
    }
}

/// `<tenant>_<error_kind>_<timestamp>.html`, with the tenant reduced to safe characters.
pub fn artifact_name(tenant: &str, kind: &str, timestamp: &str) -> String {
    let tenant: String = tenant
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    let tenant = tenant.trim_matches('-');
    let tenant = if tenant.is_empty() { "unknown" } else { tenant };
    format!("{}_{}_{}.html", tenant, kind, timestamp)
}

/// Header comment followed by the indented page markup.
pub fn render(evidence: &ErrorEvidence) -> String {
    let status = evidence
        .http_status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());
    let mut out = String::from("<!--\n");
    for (key, value) in [
        ("url", evidence.url.as_str()),
        ("error_kind", evidence.error_kind.as_str()),
        ("message", evidence.message.as_str()),
        ("http_status", status.as_str()),
        ("captured_at", evidence.captured_at.as_str()),
    ] {
        let _ = writeln!(out, "  {}: {}", key, comment_safe(value));
    }
    out.push_str("-->\n");
    if evidence.raw_content.trim().is_empty() {
        out.push_str("<!-- no content received -->\n");
    } else {
        out.push_str(&pretty_markup(&evidence.raw_content));
    }
    out
}

fn comment_safe(s: &str) -> String {
    let mut s = s.replace("--", "- -").replace('\n', " ");
    while s.contains("--") {
        s = s.replace("--", "- -");
    }
    s
}

/// Re-serialize `raw` with one element per line, indented by depth.
pub fn pretty_markup(raw: &str) -> String {
    let doc = Html::parse_document(raw);
    let mut out = String::new();
    if raw.trim_start().to_ascii_lowercase().starts_with("<!doctype") {
        out.push_str("<!DOCTYPE html>\n");
    }
    write_element(doc.root_element(), 0, &mut out);
    out
}

fn write_element(el: ElementRef<'_>, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let name = el.value().name();

    let _ = write!(out, "{}<{}", indent, name);
    for (attr, value) in el.value().attrs() {
        let _ = write!(out, " {}=\"{}\"", attr, escape(value, true));
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        out.push('\n');
        return;
    }

    if RAW_TEXT_TAGS.contains(&name) {
        let text: String = el.text().collect();
        let _ = writeln!(out, "{}</{}>", text, name);
        return;
    }

    let children: Vec<_> = el.children().collect();
    if let [only] = children.as_slice() {
        if let Some(t) = only.value().as_text() {
            let t = t.trim();
            if t.chars().count() <= INLINE_TEXT {
                let _ = writeln!(out, "{}</{}>", escape(t, false), name);
                return;
            }
        }
    }
    out.push('\n');

    for child in children {
        if let Some(t) = child.value().as_text() {
            let t = t.trim();
            if !t.is_empty() {
                let _ = writeln!(out, "{}  {}", indent, escape(t, false));
            }
        } else if let Some(c) = child.value().as_comment() {
            let _ = writeln!(out, "{}  <!--{}-->", indent, &**c);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            write_element(child_el, depth + 1, out);
        }
    }
    let _ = writeln!(out, "{}</{}>", indent, name);
}

fn escape(s: &str, attr: bool) -> String {
    let s = s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
    if attr {
        s.replace('"', "&quot;")
    } else {
        s
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorKind;

    fn evidence(kind: ErrorKind, status: Option<u16>, body: &str) -> ErrorEvidence {
        ErrorEvidence {
            url: "https://acme.careers.example.com/jobs/4821".into(),
            error_kind: kind,
            message: "Page not found (HTTP 404) -- gone".into(),
            http_status: status,
            raw_content: body.into(),
            captured_at: "2026-10-19T08:00:00+00:00".into(),
        }
    }

    #[test]
    fn name_carries_tenant_and_kind() {
        assert_eq!(
            artifact_name("acme", "not_found", "20261019T080000000Z"),
            "acme_not_found_20261019T080000000Z.html"
        );
        assert_eq!(artifact_name("a/b c", "dns_error", "t"), "a-b-c_dns_error_t.html");
        assert_eq!(artifact_name("", "tls_error", "t"), "unknown_tls_error_t.html");
    }

    #[test]
    fn header_then_indented_markup() {
        let out = render(&evidence(
            ErrorKind::NotFound,
            Some(404),
            "<!DOCTYPE html><html><head><title>Gone</title></head><body><div><p>Not here</p></div></body></html>",
        ));
        assert!(out.starts_with("<!--\n  url: https://acme.careers.example.com/jobs/4821\n"));
        assert!(out.contains("  error_kind: not_found\n"));
        assert!(out.contains("  http_status: 404\n"));
        assert!(out.contains("- - gone"));
        assert!(out.contains("<!DOCTYPE html>\n<html>\n"));
        assert!(out.contains("\n      <p>Not here</p>\n"));
        let header_end = out.find("-->").unwrap();
        assert!(!out[4..header_end].contains("--"));
    }

    #[test]
    fn transport_failure_has_no_markup() {
        let out = render(&evidence(ErrorKind::TransportTimeout, None, ""));
        assert!(out.contains("  http_status: none\n"));
        assert!(out.ends_with("<!-- no content received -->\n"));
    }

    #[test]
    fn record_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = EvidenceRecorder::new(dir.path().join("evidence"), true);
        let ev = evidence(ErrorKind::NotFound, Some(404), "<p>x</p>");

        let first = recorder.record("acme", &ev).unwrap().unwrap();
        let second = recorder.record("acme", &ev).unwrap().unwrap();
        assert_ne!(first, second);

        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("acme_not_found_"));
        assert!(name.ends_with(".html"));
        let body = std::fs::read_to_string(&first).unwrap();
        assert!(body.contains("<p>x</p>"));
        let leftovers: Vec<_> = std::fs::read_dir(recorder.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn disabled_recorder_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = EvidenceRecorder::new(dir.path().join("evidence"), false);
        let ev = evidence(ErrorKind::NotFound, Some(404), "<p>x</p>");
        assert_eq!(recorder.record("acme", &ev).unwrap(), None);
        assert!(!recorder.dir().exists());
    }
}
