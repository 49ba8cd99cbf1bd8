mod classify;
mod crawler;
mod db;
mod evidence;
mod handlers;
mod model;
mod normalize;
mod parser;
mod routes;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::evidence::EvidenceRecorder;
use crate::model::{Label, PageOutcome, PageTask};
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "career_harvester", about = "Job posting harvester for multi-tenant career sites")]
struct Cli {
    /// Settings file (default: ./harvester.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path
    #[arg(long, global = true)]
    db: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a tenant (subdomain) or a single URL
    Crawl {
        /// Tenant subdomain (e.g. "acme") or a full URL
        target: String,
        /// Max pages to fetch this run
        #[arg(short = 'n', long)]
        max_pages: Option<usize>,
        /// Max concurrent requests
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,
        /// Don't write evidence artifacts for failed pages
        #[arg(long)]
        no_evidence: bool,
        /// Directory for evidence artifacts
        #[arg(long)]
        evidence_dir: Option<PathBuf>,
        /// Route all requests through this proxy
        #[arg(long)]
        proxy_url: Option<String>,
    },
    /// Re-extract jobs from stored detail pages
    Process {
        /// Max pages to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Stored jobs table
    Jobs {
        /// Only this tenant
        #[arg(short, long)]
        tenant: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show crawl statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load_from(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Crawl {
            target,
            max_pages,
            concurrency,
            no_evidence,
            evidence_dir,
            proxy_url,
        } => {
            if let Some(n) = max_pages {
                settings.max_pages = n;
            }
            if let Some(c) = concurrency {
                settings.max_concurrency = c;
            }
            if no_evidence {
                settings.save_error_evidence = false;
            }
            if let Some(dir) = evidence_dir {
                settings.evidence_dir = dir;
            }
            if let Some(url) = proxy_url {
                settings.proxy_mode = settings::ProxyMode::Url;
                settings.proxy_url = Some(url);
            }
            settings.validate()?;

            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let recorder = EvidenceRecorder::new(&settings.evidence_dir, settings.save_error_evidence);

            let seed = seed_task(&settings, &target);
            println!("Crawling {} (max {} pages, {} concurrent)...", seed.url, settings.max_pages, settings.max_concurrency);
            let stats = crawler::crawl(&conn, &settings, &recorder, vec![seed]).await?;
            println!(
                "Done: {} pages fetched, {} jobs saved, {} failed, {} links followed.",
                stats.fetched, stats.jobs, stats.failed, stats.enqueued
            );
            if stats.failed > 0 && settings.save_error_evidence {
                println!("Evidence written to {}", recorder.dir().display());
            }
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_detail_pages(&conn, limit)?;
            if pages.is_empty() {
                println!("No stored detail pages. Run 'crawl' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &pages, &settings.company_names)?;
            counts.print();
            Ok(())
        }
        Commands::Jobs { tenant, limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_jobs(&conn, tenant.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No jobs found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<12} | {:<10} | {:<36} | {:<20} | {:<22} | {:<10}",
                "#", "Tenant", "Job ID", "Title", "Location", "Salary", "Posted"
            );
            println!("{}", "-".repeat(130));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<12} | {:<10} | {:<36} | {:<20} | {:<22} | {:<10}",
                    i + 1,
                    truncate(&r.subdomain, 12),
                    truncate(&r.job_id, 10),
                    truncate(&r.title, 36),
                    truncate(&r.location, 20),
                    truncate(&r.salary, 22),
                    truncate(&r.posted_date, 10),
                );
            }
            println!("\n{} jobs", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Pages:     {}", s.pages);
            println!("Visited:   {}", s.visited);
            println!("Fetched:   {}", s.fetched);
            println!("Jobs:      {} ({} tenants)", s.jobs, s.tenants);
            println!("Evidence:  {}", s.evidence);
            for (kind, n) in &s.by_kind {
                println!("  {:<20} {}", kind, n);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Listing seed for a subdomain, or a URL labelled by its shape.
fn seed_task(settings: &Settings, target: &str) -> PageTask {
    if target.contains("://") {
        let label = routes::classify(target).unwrap_or(Label::Unknown);
        PageTask::new(target.trim(), label)
    } else {
        PageTask::new(settings.seed_url(target), Label::Listing)
    }
}

struct ProcessCounts {
    jobs: usize,
    failed: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!("Saved {} jobs ({} pages no longer usable).", self.jobs, self.failed);
    }
}

fn process_pages(
    conn: &rusqlite::Connection,
    pages: &[db::StoredPage],
    companies: &[String],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts { jobs: 0, failed: 0 };

    for chunk in pages.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|p| {
                let task = PageTask::new(p.url.as_str(), Label::Detail).with_hints(p.hints.clone());
                handlers::process_page(&task, 200, &p.html, companies)
            })
            .collect();

        let mut jobs = Vec::new();
        for outcome in results {
            match outcome {
                PageOutcome::Emit(job) => jobs.push(*job),
                PageOutcome::Failed(ev) => {
                    tracing::debug!(url = %ev.url, kind = %ev.error_kind, "skipped");
                    counts.failed += 1;
                }
                PageOutcome::Enqueue(_) => {}
            }
        }

        counts.jobs += db::save_jobs(conn, &jobs)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_from_subdomain_or_url() {
        let s = Settings::default();
        let t = seed_task(&s, "acme");
        assert_eq!(t.url, "https://acme.careers.example.com/jobs/search");
        assert_eq!(t.label, Label::Listing);

        let t = seed_task(&s, "https://acme.careers.example.com/jobs/4821");
        assert_eq!(t.label, Label::Detail);
        let t = seed_task(&s, "https://acme.careers.example.com/");
        assert_eq!(t.label, Label::Unknown);
    }

    #[test]
    fn process_reextracts_stored_pages() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let pages = vec![
            db::StoredPage {
                url: "https://acme.careers.example.com/jobs/4821/registered-nurse".into(),
                html: std::fs::read_to_string("tests/fixtures/detail_fields.html").unwrap(),
                hints: Default::default(),
            },
            db::StoredPage {
                url: "https://acme.careers.example.com/jobs/9".into(),
                html: std::fs::read_to_string("tests/fixtures/sign_in.html").unwrap(),
                hints: Default::default(),
            },
        ];
        let counts = process_pages(&conn, &pages, &[]).unwrap();
        assert_eq!((counts.jobs, counts.failed), (1, 1));
        let rows = db::fetch_jobs(&conn, Some("acme"), 10).unwrap();
        assert_eq!(rows[0].title, "Registered Nurse - Emergency");
    }

    #[test]
    fn truncate_and_durations() {
        assert_eq!(truncate("Registered Nurse", 10), "Registe...");
        assert_eq!(truncate("Nurse", 10), "Nurse");
        assert_eq!(format_duration(std::time::Duration::from_secs(125)), "2m 5s");
    }
}
