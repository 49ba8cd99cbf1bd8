//! Per-page dispatch: classify the response, then route it to the listing,
//! detail or default handler.

use chrono::Utc;
use tracing::{debug, trace};
use url::Url;

use crate::classify::{self, ErrorKind};
use crate::model::{ErrorEvidence, Label, PageOutcome, PageTask};
use crate::parser::extract::{extract_job, links};
use crate::parser::JobPage;
use crate::routes;

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Evidence for a page that arrived but cannot be used.
pub fn failure(task: &PageTask, kind: ErrorKind, status: Option<u16>, message: String, body: &str) -> ErrorEvidence {
    ErrorEvidence {
        url: task.url.clone(),
        error_kind: kind,
        message,
        http_status: status,
        raw_content: body.to_string(),
        captured_at: now(),
    }
}

/// Evidence for a page that never arrived, after the retry budget is spent.
pub fn transport_failure(task: &PageTask, kind: ErrorKind, message: &str, attempts: u32) -> ErrorEvidence {
    failure(
        task,
        kind,
        None,
        format!("{} after {} attempt(s): {}", kind.describe(), attempts, message),
        "",
    )
}

/// Classify one fetched page and run the handler for its label.
///
/// Never panics and never returns an error: every failure is a `Failed` outcome.
pub fn process_page(task: &PageTask, status: u16, body: &str, companies: &[String]) -> PageOutcome {
    let url = match Url::parse(&task.url) {
        Ok(u) => u,
        Err(e) => {
            let kind = classify::classify_status(status).unwrap_or(ErrorKind::GenericRequestFailure);
            let message = format!("invalid url: {}", e);
            return PageOutcome::Failed(failure(task, kind, Some(status), message, body));
        }
    };

    let page = JobPage::parse(url, body, companies);
    if let Some(kind) = classify::classify(status, &page.title(), &page.visible_text()) {
        let message = if classify::classify_status(status).is_some() {
            format!("{} (HTTP {})", kind.describe(), status)
        } else {
            format!("{} (matched page content)", kind.describe())
        };
        return PageOutcome::Failed(failure(task, kind, Some(status), message, body));
    }

    let label = match task.label {
        Label::Unknown => routes::classify(&task.url).unwrap_or(Label::Unknown),
        known => known,
    };
    match label {
        Label::Listing => handle_listing(&page),
        Label::Detail => handle_detail(task, &page),
        Label::Unknown => handle_default(&page),
    }
}

/// Detail tasks for each job card, then listing tasks for each further page.
/// A listing with no cards is a valid empty result.
pub fn handle_listing(page: &JobPage) -> PageOutcome {
    let cards = links::job_cards(page);
    let pages = links::pagination_links(page);
    debug!(url = %page.url, jobs = cards.len(), pages = pages.len(), "listing");

    let mut tasks: Vec<PageTask> = cards
        .into_iter()
        .map(|c| {
            trace!(url = %c.url, title = %c.title, hints = c.hints.len(), "card");
            PageTask::new(c.url, Label::Detail).with_hints(c.hints)
        })
        .collect();
    tasks.extend(pages.into_iter().map(|u| PageTask::new(u, Label::Listing)));
    PageOutcome::Enqueue(tasks)
}

/// One record per detail page; never enqueues.
pub fn handle_detail(task: &PageTask, page: &JobPage) -> PageOutcome {
    let job = extract_job(page, &task.hints, now());
    debug!(url = %page.url, title = ?job.title, "detail");
    PageOutcome::Emit(Box::new(job))
}

/// Permissive scan for anything that looks like a detail or listing link.
pub fn handle_default(page: &JobPage) -> PageOutcome {
    let (details, listings) = links::scan_links(page);
    debug!(url = %page.url, details = details.len(), listings = listings.len(), "default");

    let tasks = details
        .into_iter()
        .map(|u| PageTask::new(u, Label::Detail))
        .chain(listings.into_iter().map(|u| PageTask::new(u, Label::Listing)))
        .collect();
    PageOutcome::Enqueue(tasks)
}

// ── Tests ──
