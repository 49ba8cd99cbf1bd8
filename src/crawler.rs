//! Fetch engine: bounded concurrent fetching with retries, a single writer
//! loop that owns the database, and run-level URL uniqueness.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::classify::{self, ErrorKind};
use crate::db;
use crate::evidence::EvidenceRecorder;
use crate::handlers;
use crate::model::{ErrorEvidence, PageOutcome, PageTask};
use crate::routes;
use crate::settings::Settings;

/// A fetch that never produced a response.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let message = format!("{:?}", e);
        FetchError {
            kind: classify::classify_transport(e.is_timeout(), e.is_connect(), &message),
            message: e.to_string(),
        }
    }
}

struct Fetched {
    status: u16,
    body: String,
    latency_ms: i64,
}

struct WorkerMsg {
    task: PageTask,
    page_id: i64,
    result: std::result::Result<(Fetched, PageOutcome), (FetchError, u32)>,
}

/// Crawl totals returned after completion.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub fetched: usize,
    pub jobs: usize,
    pub enqueued: usize,
    pub failed: usize,
    pub over_budget: usize,
}

/// URLs admitted this run, capped at the page budget.
pub struct Frontier {
    seen: HashSet<String>,
    max_pages: usize,
}

impl Frontier {
    pub fn new(max_pages: usize) -> Self {
        Self {
            seen: HashSet::new(),
            max_pages,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_full(&self) -> bool {
        self.seen.len() >= self.max_pages
    }

    /// `true` if `url` is new and fits the budget.
    pub fn admit(&mut self, url: &str) -> bool {
        let key = routes::unique_key(url);
        if self.seen.contains(&key) || self.is_full() {
            return false;
        }
        self.seen.insert(key)
    }
}

/// Transient kinds get another attempt until the budget runs out.
pub fn should_retry(kind: ErrorKind, attempt: u32, max_retries: u32) -> bool {
    kind.is_transient() && attempt < max_retries
}

pub fn backoff(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(attempt)))
}

pub fn build_client(settings: &Settings) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .connect_timeout(Duration::from_secs(settings.request_timeout_secs.min(10)))
        .redirect(reqwest::redirect::Policy::limited(10));
    if let Some(proxy) = settings.proxy() {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    Ok(builder.build()?)
}

/// Everything a worker needs, shared across spawned tasks.
struct Shared {
    client: reqwest::Client,
    semaphore: Semaphore,
    companies: Vec<String>,
    max_retries: u32,
    base_backoff_ms: u64,
}

/// Crawl from `seeds`, saving jobs, raw pages and evidence as results arrive.
pub async fn crawl(
    conn: &Connection,
    settings: &Settings,
    recorder: &EvidenceRecorder,
    seeds: Vec<PageTask>,
) -> Result<CrawlStats> {
    let shared = Arc::new(Shared {
        client: build_client(settings)?,
        semaphore: Semaphore::new(settings.max_concurrency),
        companies: settings.company_names.clone(),
        max_retries: settings.max_retries,
        base_backoff_ms: settings.base_backoff_ms,
    });

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}) {msg}")?
            .progress_chars("=> "),
    );

    // Workers send results, this loop owns the connection.
    let (tx, mut rx) = mpsc::channel::<WorkerMsg>(settings.max_concurrency * 2);
    let mut frontier = Frontier::new(settings.max_pages);
    let mut stats = CrawlStats::default();
    let mut in_flight = 0usize;

    for task in seeds {
        if admit(&mut frontier, &mut stats, &task) {
            let page_id = db::upsert_page(conn, &task.url, &routes::subdomain_from_url(&task.url), task.label)?;
            spawn_worker(&shared, &tx, task, page_id);
            in_flight += 1;
            pb.inc_length(1);
        }
    }

    while in_flight > 0 {
        let Some(msg) = rx.recv().await else {
            break;
        };
        in_flight -= 1;

        let follow_ups = apply(conn, recorder, &mut stats, msg)?;
        for task in follow_ups {
            if admit(&mut frontier, &mut stats, &task) {
                let page_id =
                    db::upsert_page(conn, &task.url, &routes::subdomain_from_url(&task.url), task.label)?;
                spawn_worker(&shared, &tx, task, page_id);
                in_flight += 1;
                stats.enqueued += 1;
                pb.inc_length(1);
            }
        }
        pb.set_message(format!("{} jobs", stats.jobs));
        pb.inc(1);
    }

    pb.finish_and_clear();
    if stats.over_budget > 0 {
        warn!(
            max_pages = settings.max_pages,
            dropped = stats.over_budget,
            "page budget reached, remaining links not followed"
        );
    }
    info!(
        "Crawled {} pages ({} jobs, {} failed, {} admitted)",
        stats.fetched,
        stats.jobs,
        stats.failed,
        frontier.len()
    );
    Ok(stats)
}

fn admit(frontier: &mut Frontier, stats: &mut CrawlStats, task: &PageTask) -> bool {
    if frontier.admit(&task.url) {
        return true;
    }
    if frontier.is_full() {
        stats.over_budget += 1;
    }
    false
}

fn spawn_worker(shared: &Arc<Shared>, tx: &mpsc::Sender<WorkerMsg>, task: PageTask, page_id: i64) {
    let shared = Arc::clone(shared);
    let tx = tx.clone();

    tokio::spawn(async move {
        let result = match shared.semaphore.acquire().await {
            Ok(_permit) => run_task(&shared, &task).await,
            Err(e) => Err((
                FetchError {
                    kind: ErrorKind::GenericRequestFailure,
                    message: e.to_string(),
                },
                0,
            )),
        };
        let _ = tx.send(WorkerMsg { task, page_id, result }).await;
    });
}

async fn run_task(
    shared: &Arc<Shared>,
    task: &PageTask,
) -> std::result::Result<(Fetched, PageOutcome), (FetchError, u32)> {
    let fetched = fetch_with_retry(shared, &task.url).await?;

    // Parsing is CPU-bound and the document is not Send; keep it off the async workers.
    let worker = Arc::clone(shared);
    let owned = task.clone();
    let body = fetched.body.clone();
    let status = fetched.status;
    let outcome = match tokio::task::spawn_blocking(move || {
        handlers::process_page(&owned, status, &body, &worker.companies)
    })
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => handler_panicked(task, &fetched, &e.to_string()),
    };
    Ok((fetched, outcome))
}

/// The page arrived but its handler died; keep the markup that caused it.
fn handler_panicked(task: &PageTask, fetched: &Fetched, detail: &str) -> PageOutcome {
    PageOutcome::Failed(handlers::failure(
        task,
        ErrorKind::GenericRequestFailure,
        Some(fetched.status),
        format!("handler panicked: {}", detail),
        &fetched.body,
    ))
}

async fn fetch_with_retry(shared: &Shared, url: &str) -> std::result::Result<Fetched, (FetchError, u32)> {
    let mut attempt = 0u32;
    loop {
        let kind = match fetch_one(&shared.client, url).await {
            Ok(fetched) => match classify::classify_status(fetched.status) {
                Some(kind) if should_retry(kind, attempt, shared.max_retries) => kind,
                _ => return Ok(fetched),
            },
            Err(e) if should_retry(e.kind, attempt, shared.max_retries) => e.kind,
            Err(e) => return Err((e, attempt + 1)),
        };

        let wait = backoff(shared.base_backoff_ms, attempt);
        warn!(
            "{} on {} (attempt {}/{}), backing off {:.1}s",
            kind,
            url,
            attempt + 1,
            shared.max_retries + 1,
            wait.as_secs_f64()
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

async fn fetch_one(client: &reqwest::Client, url: &str) -> std::result::Result<Fetched, FetchError> {
    let start = Instant::now();
    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(Fetched {
        status,
        body,
        latency_ms: start.elapsed().as_millis() as i64,
    })
}

/// Persist one worker result. Returns the follow-up tasks it asked for.
fn apply(
    conn: &Connection,
    recorder: &EvidenceRecorder,
    stats: &mut CrawlStats,
    msg: WorkerMsg,
) -> Result<Vec<PageTask>> {
    let WorkerMsg { task, page_id, result } = msg;
    let tenant = routes::subdomain_from_url(&task.url);

    let (fetched, outcome) = match result {
        Ok(ok) => ok,
        Err((e, attempts)) => {
            let ev = handlers::transport_failure(&task, e.kind, &e.message, attempts);
            save_failure(conn, recorder, &tenant, &ev)?;
            db::mark_visited(conn, page_id, None, Some(e.kind.as_str()))?;
            stats.failed += 1;
            return Ok(Vec::new());
        }
    };

    stats.fetched += 1;
    db::save_page_data(
        conn,
        &db::PageDataRow {
            page_id,
            url: &task.url,
            label: task.label,
            html: &fetched.body,
            hints: &task.hints,
            status: fetched.status,
            latency_ms: fetched.latency_ms,
        },
    )?;

    let mut follow_ups = Vec::new();
    let mut error_kind = None;
    match outcome {
        PageOutcome::Enqueue(tasks) => {
            debug!(url = %task.url, found = tasks.len(), "links");
            follow_ups = tasks;
        }
        PageOutcome::Emit(job) => {
            db::save_job(conn, &job)?;
            stats.jobs += 1;
        }
        PageOutcome::Failed(ev) => {
            error_kind = Some(ev.error_kind.as_str());
            save_failure(conn, recorder, &tenant, &ev)?;
            stats.failed += 1;
        }
    }
    db::mark_visited(conn, page_id, Some(fetched.status), error_kind)?;
    Ok(follow_ups)
}

fn save_failure(conn: &Connection, recorder: &EvidenceRecorder, tenant: &str, ev: &ErrorEvidence) -> Result<()> {
    warn!(kind = %ev.error_kind, url = %ev.url, "{}", ev.message);
    // A failed artifact write must not stop the run.
    let path = match recorder.record(tenant, ev) {
        Ok(path) => path,
        Err(e) => {
            warn!("could not write evidence for {}: {:#}", ev.url, e);
            None
        }
    };
    db::save_evidence(conn, tenant, ev, path.as_deref())
}

// ── Tests ──
