pub mod labels;
pub mod links;
pub mod title;

use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;

use super::{sel, squash, JobPage};
use crate::model::{ExtractedJob, FieldHints};
use crate::normalize::{normalize_date, normalize_salary};
use crate::routes;

static TIME_SEL: LazyLock<Selector> = LazyLock::new(|| sel("time[datetime]"));
static CURRENCY_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[$£€]\s?\d[\d,]*(?:\.\d+)?\s*k?\s*(?:-|–|—|to)\s*[$£€]?\s?\d[\d,]*(?:\.\d+)?\s*k?(?:\s*(?:per|an|a|/)\s*(?:hour|hr|year|yr|annum|month|week))?")
        .unwrap()
});
static LEAKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)function\s*\(|\bvar\s+\w+\s*=|window\.|document\.|\$\(|=>|<script|</|\{\{|jquery").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Location,
    WorkType,
    Schedule,
    Salary,
    EmploymentType,
    Classification,
    Duration,
    Department,
    Category,
    Entity,
    PostedDate,
    RefNumber,
}

/// Label synonyms per field, most specific first. Matched case-insensitively
/// against whole label text with any trailing colon removed.
pub const LABELS: &[(Field, &[&str])] = &[
    (Field::Title, &["job title", "position title", "role title", "vacancy title"]),
    (
        Field::Location,
        &[
            "work location",
            "location",
            "job location",
            "city",
            "office location",
            "location(s)",
            "locations",
            "work site",
            "worksite",
        ],
    ),
    (
        Field::WorkType,
        &["work type", "workplace type", "work arrangement", "work mode", "remote type", "workplace"],
    ),
    (Field::Schedule, &["schedule", "work schedule", "shift", "hours", "working hours", "hours per week"]),
    (
        Field::Salary,
        &[
            "salary",
            "salary range",
            "pay",
            "pay rate",
            "pay range",
            "compensation",
            "remuneration",
            "hourly rate",
            "wage",
            "rate",
        ],
    ),
    (
        Field::EmploymentType,
        &["employment type", "job type", "position type", "employment status", "contract type"],
    ),
    (
        Field::Classification,
        &[
            "classification",
            "employment classification",
            "job classification",
            "flsa status",
            "exempt status",
            "grade",
            "award",
        ],
    ),
    (Field::Duration, &["duration", "contract length", "assignment length", "term", "length of assignment"]),
    (Field::Department, &["department", "division", "team", "business unit", "unit"]),
    (Field::Category, &["category", "job category", "job family", "function", "profession", "job function"]),
    (Field::Entity, &["entity", "legal entity", "company", "organization", "organisation", "employer", "agency"]),
    (
        Field::PostedDate,
        &["posted date", "date posted", "posted", "posting date", "posted on", "open date", "opening date", "published"],
    ),
    (
        Field::RefNumber,
        &[
            "reference number",
            "reference no",
            "reference",
            "ref number",
            "ref no",
            "ref #",
            "ref",
            "requisition number",
            "requisition id",
            "requisition #",
            "job reference",
            "job number",
            "job no",
            "job id",
            "req id",
            "req #",
            "vacancy number",
        ],
    ),
];

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Title,
        Field::Location,
        Field::WorkType,
        Field::Schedule,
        Field::Salary,
        Field::EmploymentType,
        Field::Classification,
        Field::Duration,
        Field::Department,
        Field::Category,
        Field::Entity,
        Field::PostedDate,
        Field::RefNumber,
    ];

    pub fn synonyms(self) -> &'static [&'static str] {
        LABELS
            .iter()
            .find(|(f, _)| *f == self)
            .map(|(_, s)| *s)
            .unwrap_or(&[])
    }

    /// Key under which a listing card carries this field. Title is never hinted.
    pub fn hint_key(self) -> Option<&'static str> {
        match self {
            Field::Title => None,
            Field::Location => Some("location"),
            Field::WorkType => Some("workType"),
            Field::Schedule => Some("schedule"),
            Field::Salary => Some("salary"),
            Field::EmploymentType => Some("employmentType"),
            Field::Classification => Some("classification"),
            Field::Duration => Some("duration"),
            Field::Department => Some("department"),
            Field::Category => Some("category"),
            Field::Entity => Some("entity"),
            Field::PostedDate => Some("postedDate"),
            Field::RefNumber => Some("ref"),
        }
    }

    /// Longer candidates are boilerplate picked up by mistake.
    pub fn max_len(self) -> usize {
        match self {
            Field::Title | Field::Location | Field::Department | Field::Category | Field::Entity => 200,
            Field::Schedule | Field::Salary => 250,
            Field::RefNumber | Field::PostedDate => 60,
            Field::WorkType | Field::EmploymentType | Field::Classification | Field::Duration => 120,
        }
    }

    /// Field whose synonym list contains `label` exactly.
    pub fn for_label(label: &str) -> Option<Field> {
        let norm = labels::normalize_label(label);
        LABELS
            .iter()
            .find(|(_, syns)| syns.iter().any(|s| *s == norm))
            .map(|(f, _)| *f)
    }
}

/// One step of a field cascade.
pub type Strategy = fn(&JobPage, &FieldHints, Field) -> Option<String>;

/// Label-adjacent lookup, then free-text "Label: value".
pub const LABEL_CHAIN: &[Strategy] = &[labels::from_label, labels::from_free_text];

const SALARY_CHAIN: &[Strategy] = &[labels::from_label, labels::from_free_text, salary_in_text];
const DATE_CHAIN: &[Strategy] = &[labels::from_label, labels::from_free_text, time_element];
const EMPLOYMENT_CHAIN: &[Strategy] = &[labels::from_label, labels::from_free_text, employment_keyword];

/// Non-empty hint for `field`, trimmed.
pub fn hint(hints: &FieldHints, field: Field) -> Option<String> {
    let key = field.hint_key()?;
    hints
        .get(key)
        .map(|v| squash(v))
        .filter(|v| !v.is_empty())
}

/// Run a field cascade: inbound hint first, then each strategy until one
/// yields a candidate that passes the field's guards.
pub fn resolve(page: &JobPage, hints: &FieldHints, field: Field, chain: &[Strategy]) -> Option<String> {
    if let Some(v) = hint(hints, field) {
        return Some(v);
    }
    chain
        .iter()
        .find_map(|strategy| strategy(page, hints, field).and_then(|v| accept(page, field, &v)))
}

/// Guard rules shared by every strategy.
pub fn accept(page: &JobPage, field: Field, candidate: &str) -> Option<String> {
    let v = squash(candidate);
    let v = v.trim_matches(|c: char| c == ':' || c == '-' || c == '|' || c.is_whitespace());
    if v.is_empty() || v.chars().count() > field.max_len() || LEAKAGE_RE.is_match(v) {
        return None;
    }
    if field == Field::Title && (page.is_company_name(v) || title::is_generic(v)) {
        return None;
    }
    Some(v.to_string())
}

fn salary_in_text(page: &JobPage, _: &FieldHints, _: Field) -> Option<String> {
    let text = super::block_text(page.main_content());
    CURRENCY_RANGE_RE
        .find(&text)
        .map(|m| m.as_str().trim().to_string())
}

fn time_element(page: &JobPage, _: &FieldHints, _: Field) -> Option<String> {
    page.main_content()
        .select(&TIME_SEL)
        .find_map(|t| t.value().attr("datetime"))
        .map(|d| d.trim().to_string())
}

/// Employment type keywords near the top of the posting.
fn employment_keyword(page: &JobPage, _: &FieldHints, _: Field) -> Option<String> {
    const KEYWORDS: &[(&str, &str)] = &[
        ("full-time", "Full-time"),
        ("full time", "Full-time"),
        ("part-time", "Part-time"),
        ("part time", "Part-time"),
        ("casual", "Casual"),
        ("temporary", "Temporary"),
        ("fixed term", "Fixed term"),
        ("fixed-term", "Fixed term"),
        ("contract", "Contract"),
        ("internship", "Internship"),
        ("permanent", "Permanent"),
    ];
    let text = super::block_text(page.main_content());
    for line in text.lines().take(8) {
        let lower = line.to_lowercase();
        for (needle, label) in KEYWORDS {
            if lower.contains(needle) {
                return Some((*label).to_string());
            }
        }
    }
    None
}

/// Build the output record for one detail page.
pub fn extract_job(page: &JobPage, hints: &FieldHints, scraped_at: String) -> ExtractedJob {
    let url = page.url.to_string();
    let job_id = routes::job_id_from_url(&url);

    let ref_number = resolve(page, hints, Field::RefNumber, LABEL_CHAIN)
        .map(|r| r.trim_start_matches('#').trim().to_string())
        .filter(|r| !r.is_empty() && *r != job_id);

    let salary_raw = resolve(page, hints, Field::Salary, SALARY_CHAIN);
    let salary = salary_raw.as_deref().map(normalize_salary).unwrap_or_default();

    let posted_date =
        resolve(page, hints, Field::PostedDate, DATE_CHAIN).map(|d| normalize_date(&d));

    let sections = super::sections::extract_sections(page);
    let full_content = Some(super::block_text(page.main_content())).filter(|t| !t.is_empty());
    let additional = labels::additional_fields(page.body());

    ExtractedJob {
        subdomain: routes::subdomain_from_url(&url),
        url,
        job_id,
        ref_number,
        title: title::extract_title(page, hints),
        location: resolve(page, hints, Field::Location, LABEL_CHAIN),
        work_type: resolve(page, hints, Field::WorkType, LABEL_CHAIN),
        schedule: resolve(page, hints, Field::Schedule, LABEL_CHAIN),
        salary_min: salary.min,
        salary_max: salary.max,
        salary_period: salary.period,
        salary_raw: salary.raw,
        employment_type: resolve(page, hints, Field::EmploymentType, EMPLOYMENT_CHAIN),
        employment_classification: resolve(page, hints, Field::Classification, LABEL_CHAIN),
        duration: resolve(page, hints, Field::Duration, LABEL_CHAIN),
        department: resolve(page, hints, Field::Department, LABEL_CHAIN),
        category: resolve(page, hints, Field::Category, LABEL_CHAIN),
        entity: resolve(page, hints, Field::Entity, LABEL_CHAIN),
        posted_date,
        description: sections.description,
        qualifications: sections.qualifications,
        duties: sections.duties,
        full_content,
        apply_url: links::apply_url(page),
        additional_fields: if additional.is_empty() { None } else { Some(additional) },
        scraped_at,
    }
}

// ── Tests ──
