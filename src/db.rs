use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::model::{ErrorEvidence, ExtractedJob, FieldHints, Label};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            tenant     TEXT NOT NULL,
            label      TEXT NOT NULL CHECK(label IN ('listing','detail','unknown')),
            visited    BOOLEAN NOT NULL DEFAULT 0,
            status     INTEGER,
            error_kind TEXT,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_tenant ON pages(tenant);

        CREATE TABLE IF NOT EXISTS page_data (
            id         INTEGER PRIMARY KEY,
            page_id    INTEGER NOT NULL REFERENCES pages(id),
            url        TEXT NOT NULL,
            label      TEXT NOT NULL,
            html       TEXT NOT NULL,
            hints      TEXT,
            status     INTEGER NOT NULL,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_label ON page_data(label);

        CREATE TABLE IF NOT EXISTS jobs (
            url                       TEXT PRIMARY KEY,
            job_id                    TEXT NOT NULL,
            ref_number                TEXT,
            subdomain                 TEXT NOT NULL,
            title                     TEXT,
            location                  TEXT,
            work_type                 TEXT,
            schedule                  TEXT,
            salary_min                TEXT,
            salary_max                TEXT,
            salary_period             TEXT,
            salary_raw                TEXT,
            employment_type           TEXT,
            employment_classification TEXT,
            duration                  TEXT,
            department                TEXT,
            category                  TEXT,
            entity                    TEXT,
            posted_date               TEXT,
            description               TEXT,
            qualifications            TEXT,
            duties                    TEXT,
            full_content              TEXT,
            apply_url                 TEXT,
            additional_fields         TEXT,
            scraped_at                TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_subdomain ON jobs(subdomain);

        CREATE TABLE IF NOT EXISTS error_evidence (
            id            INTEGER PRIMARY KEY,
            url           TEXT NOT NULL,
            tenant        TEXT NOT NULL,
            error_kind    TEXT NOT NULL,
            message       TEXT NOT NULL,
            http_status   INTEGER,
            artifact_path TEXT,
            captured_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_evidence_kind ON error_evidence(error_kind);
        ",
    )?;
    Ok(())
}

// ── Crawling ──

/// Register a URL for this run, returning its row id.
pub fn upsert_page(conn: &Connection, url: &str, tenant: &str, label: Label) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO pages (url, tenant, label) VALUES (?1, ?2, ?3)",
        rusqlite::params![url, tenant, label.as_str()],
    )?;
    let id = conn.query_row("SELECT id FROM pages WHERE url = ?1", [url], |r| r.get(0))?;
    Ok(id)
}

pub fn mark_visited(
    conn: &Connection,
    page_id: i64,
    status: Option<u16>,
    error_kind: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE pages SET visited = 1, visited_at = datetime('now'), status = ?2, error_kind = ?3
         WHERE id = ?1",
        rusqlite::params![page_id, status, error_kind],
    )?;
    Ok(())
}

pub struct PageDataRow<'a> {
    pub page_id: i64,
    pub url: &'a str,
    pub label: Label,
    pub html: &'a str,
    pub hints: &'a FieldHints,
    pub status: u16,
    pub latency_ms: i64,
}

pub fn save_page_data(conn: &Connection, row: &PageDataRow<'_>) -> Result<()> {
    let hints = if row.hints.is_empty() {
        None
    } else {
        Some(serde_json::to_string(row.hints)?)
    };
    conn.execute(
        "INSERT INTO page_data (page_id, url, label, html, hints, status, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            row.page_id,
            row.url,
            row.label.as_str(),
            row.html,
            hints,
            row.status,
            row.latency_ms,
        ],
    )?;
    Ok(())
}

const UPSERT_JOB: &str = "INSERT OR REPLACE INTO jobs
    (url, job_id, ref_number, subdomain, title, location, work_type, schedule,
     salary_min, salary_max, salary_period, salary_raw, employment_type,
     employment_classification, duration, department, category, entity, posted_date,
     description, qualifications, duties, full_content, apply_url, additional_fields, scraped_at)
    VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25,?26)";

fn insert_job(stmt: &mut rusqlite::Statement<'_>, j: &ExtractedJob) -> Result<()> {
    let additional = match &j.additional_fields {
        Some(map) => Some(serde_json::to_string(map)?),
        None => None,
    };
    stmt.execute(rusqlite::params![
        j.url, j.job_id, j.ref_number, j.subdomain, j.title, j.location, j.work_type, j.schedule,
        j.salary_min, j.salary_max, j.salary_period, j.salary_raw, j.employment_type,
        j.employment_classification, j.duration, j.department, j.category, j.entity, j.posted_date,
        j.description, j.qualifications, j.duties, j.full_content, j.apply_url, additional, j.scraped_at,
    ])?;
    Ok(())
}

/// Store one record, replacing an earlier one for the same URL.
pub fn save_job(conn: &Connection, job: &ExtractedJob) -> Result<()> {
    let mut stmt = conn.prepare_cached(UPSERT_JOB)?;
    insert_job(&mut stmt, job)
}

pub fn save_jobs(conn: &Connection, jobs: &[ExtractedJob]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(UPSERT_JOB)?;
        for j in jobs {
            insert_job(&mut stmt, j)?;
        }
    }
    tx.commit()?;
    Ok(jobs.len())
}

pub fn save_evidence(
    conn: &Connection,
    tenant: &str,
    ev: &ErrorEvidence,
    artifact_path: Option<&Path>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO error_evidence (url, tenant, error_kind, message, http_status, artifact_path, captured_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            ev.url,
            tenant,
            ev.error_kind.as_str(),
            ev.message,
            ev.http_status,
            artifact_path.map(|p| p.to_string_lossy().to_string()),
            ev.captured_at,
        ],
    )?;
    Ok(())
}

// ── Processing ──

pub struct StoredPage {
    pub url: String,
    pub html: String,
    pub hints: FieldHints,
}

/// Latest successful fetch of every detail page.
pub fn fetch_detail_pages(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredPage>> {
    let sql = format!(
        "SELECT pd.url, pd.html, pd.hints
         FROM page_data pd
         WHERE pd.label = 'detail' AND pd.status < 400
           AND pd.id = (SELECT MAX(id) FROM page_data WHERE url = pd.url)
         ORDER BY pd.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let hints: Option<String> = row.get(2)?;
            Ok(StoredPage {
                url: row.get(0)?,
                html: row.get(1)?,
                hints: hints
                    .and_then(|h| serde_json::from_str(&h).ok())
                    .unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Overview ──

pub struct JobOverviewRow {
    pub subdomain: String,
    pub job_id: String,
    pub title: String,
    pub location: String,
    pub salary: String,
    pub posted_date: String,
}

pub fn fetch_jobs(conn: &Connection, tenant: Option<&str>, limit: usize) -> Result<Vec<JobOverviewRow>> {
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let where_clause = match tenant {
        Some(t) => {
            params.push(Box::new(t.to_string()));
            " WHERE subdomain = ?1"
        }
        None => "",
    };
    let sql = format!(
        "SELECT subdomain, job_id, COALESCE(title,''), COALESCE(location,''),
                CASE WHEN salary_min IS NULL THEN COALESCE(salary_raw,'')
                     WHEN salary_min = salary_max THEN salary_min || COALESCE(' ' || salary_period,'')
                     ELSE salary_min || '-' || salary_max || COALESCE(' ' || salary_period,'') END,
                COALESCE(posted_date,'')
         FROM jobs{}
         ORDER BY subdomain, posted_date DESC, job_id
         LIMIT {}",
        where_clause, limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(JobOverviewRow {
                subdomain: row.get(0)?,
                job_id: row.get(1)?,
                title: row.get(2)?,
                location: row.get(3)?,
                salary: row.get(4)?,
                posted_date: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub pages: usize,
    pub visited: usize,
    pub fetched: usize,
    pub jobs: usize,
    pub tenants: usize,
    pub evidence: usize,
    pub by_kind: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let pages: usize = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM pages WHERE visited = 1", [], |r| r.get(0))?;
    let fetched: usize = conn.query_row("SELECT COUNT(*) FROM page_data", [], |r| r.get(0))?;
    let jobs: usize = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
    let tenants: usize =
        conn.query_row("SELECT COUNT(DISTINCT subdomain) FROM jobs", [], |r| r.get(0))?;
    let evidence: usize = conn.query_row("SELECT COUNT(*) FROM error_evidence", [], |r| r.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT error_kind, COUNT(*) FROM error_evidence GROUP BY error_kind ORDER BY COUNT(*) DESC, error_kind",
    )?;
    let by_kind = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        pages,
        visited,
        fetched,
        jobs,
        tenants,
        evidence,
        by_kind,
    })
}
