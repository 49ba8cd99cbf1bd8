//! Free-text date and compensation parsing.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

static ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[T ][\d:.]+(?:Z|[+-]\d{2}:?\d{2})?)?$").unwrap());
static MDY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").unwrap());
static DMONY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[-\s/.]([a-z]{3})[a-z]*\.?[-\s/.,]+(\d{4})\b").unwrap()
});
static MONTH_DY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b").unwrap()
});
static D_MONTH_Y_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]{3,9})\.?,?\s+(\d{4})\b").unwrap()
});

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([$£€])?\s*(\d[\d,]*(?:\.\d+)?)\s*(k)?\s*(?:-|–|—|to)\s*([$£€])?\s*(\d[\d,]*(?:\.\d+)?)\s*(k)?\b").unwrap()
});
static SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([$£€])?\s*(\d[\d,]*(?:\.\d+)?)\s*(k)?\b").unwrap());

/// Two-digit years at or above this are 19xx, below it 20xx.
const CENTURY_PIVOT: i32 = 70;

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const FULL_MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Pay period keywords. The one appearing earliest in the text wins.
const PERIODS: &[(&str, &str)] = &[
    ("hour", "hourly"),
    ("/hr", "hourly"),
    (" hr", "hourly"),
    ("year", "yearly"),
    ("annum", "yearly"),
    ("annual", "yearly"),
    ("/yr", "yearly"),
    ("p.a.", "yearly"),
    ("month", "monthly"),
    ("/mo", "monthly"),
    ("week", "weekly"),
    ("/wk", "weekly"),
];

/// Normalize a free-text date to `YYYY-MM-DD`.
///
/// Already-ISO input is returned unchanged, as is anything no pattern recognises.
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() || ISO_RE.is_match(s) {
        return raw.to_string();
    }

    let parsed = parse_mdy(s)
        .or_else(|| parse_day_mon_year(s))
        .or_else(|| parse_month_day_year(s))
        .or_else(|| parse_day_month_year(s));

    match parsed {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => raw.to_string(),
    }
}

fn parse_mdy(s: &str) -> Option<NaiveDate> {
    let caps = MDY_RE.captures(s)?;
    let month = caps[1].parse().ok()?;
    let day = caps[2].parse().ok()?;
    let year = expand_year(&caps[3])?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_day_mon_year(s: &str) -> Option<NaiveDate> {
    let caps = DMONY_RE.captures(s)?;
    let day = caps[1].parse().ok()?;
    let month = month_from_abbrev(&caps[2])?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_month_day_year(s: &str) -> Option<NaiveDate> {
    MONTH_DY_RE.captures_iter(s).find_map(|caps| {
        let month = month_from_name(&caps[1])?;
        let day = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn parse_day_month_year(s: &str) -> Option<NaiveDate> {
    D_MONTH_Y_RE.captures_iter(s).find_map(|caps| {
        let day = caps[1].parse().ok()?;
        let month = month_from_name(&caps[2])?;
        let year = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn expand_year(y: &str) -> Option<i32> {
    let n: i32 = y.parse().ok()?;
    Some(match y.len() {
        2 if n >= CENTURY_PIVOT => 1900 + n,
        2 => 2000 + n,
        _ => n,
    })
}

fn month_from_abbrev(m: &str) -> Option<u32> {
    let lower = m.to_lowercase();
    MONTHS
        .iter()
        .position(|x| *x == lower)
        .map(|i| i as u32 + 1)
}

/// Full month name or its three-letter abbreviation ("Sept" is accepted too).
fn month_from_name(m: &str) -> Option<u32> {
    let lower = m.to_lowercase();
    if let Some(i) = FULL_MONTHS.iter().position(|x| *x == lower) {
        return Some(i as u32 + 1);
    }
    if lower == "sept" {
        return Some(9);
    }
    month_from_abbrev(&lower)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Salary {
    pub min: Option<String>,
    pub max: Option<String>,
    pub period: Option<String>,
    pub raw: Option<String>,
}

/// Parse a compensation string into min/max/period, keeping the raw text.
pub fn normalize_salary(raw: &str) -> Salary {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Salary::default();
    }

    let lower = trimmed.to_lowercase();
    let period = PERIODS
        .iter()
        .filter_map(|(kw, p)| lower.find(kw).map(|i| (i, *p)))
        .min_by_key(|(i, _)| *i)
        .map(|(_, p)| p.to_string());

    // Once the text shows a currency, bare numbers ("Level 2 - 3") are not pay.
    let has_currency = trimmed.contains(['$', '£', '€']);
    let marked = |caps: &Captures<'_>, groups: &[usize]| {
        !has_currency || groups.iter().any(|g| caps.get(*g).is_some())
    };

    let (min, max) = if let Some(caps) = RANGE_RE
        .captures_iter(trimmed)
        .find(|c| marked(c, &[1, 3, 4, 6]))
    {
        let a = amount(&caps[2], caps.get(3).is_some());
        let b = amount(&caps[5], caps.get(6).is_some());
        match (a, b) {
            (Some(a), Some(b)) => order(a, b),
            _ => (None, None),
        }
    } else if let Some(caps) = SINGLE_RE
        .captures_iter(trimmed)
        .find(|c| marked(c, &[1, 3]))
    {
        match amount(&caps[2], caps.get(3).is_some()) {
            Some(v) => (Some(v.clone()), Some(v)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    Salary {
        min,
        max,
        period,
        raw: Some(trimmed.to_string()),
    }
}

/// Strip thousands separators and expand a `k` suffix.
fn amount(digits: &str, thousands: bool) -> Option<String> {
    let plain = digits.replace(',', "");
    let value: f64 = plain.parse().ok()?;
    if thousands {
        let scaled = value * 1000.0;
        if scaled.fract() == 0.0 {
            Some(format!("{}", scaled as u64))
        } else {
            Some(format!("{:.2}", scaled))
        }
    } else {
        Some(plain)
    }
}

fn order(a: String, b: String) -> (Option<String>, Option<String>) {
    let av: f64 = a.parse().unwrap_or(0.0);
    let bv: f64 = b.parse().unwrap_or(0.0);
    if av <= bv {
        (Some(a), Some(b))
    } else {
        (Some(b), Some(a))
    }
}

// ── Tests ──
