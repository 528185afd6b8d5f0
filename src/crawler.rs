use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::{self, QueueEntry};
use crate::fetch;
use crate::induce::Pattern;

/// Pages pulled from the queue per round, per unit of concurrency.
const BATCH_FACTOR: usize = 4;

/// Crawl stats returned after completion.
pub struct CrawlStats {
    pub visited: usize,
    pub failed: usize,
    pub discovered: usize,
}

struct FetchedPage {
    entry: QueueEntry,
    body: Result<String, String>,
}

/// Drain the queue: fetch pending pages, apply `pattern` to each one and
/// enqueue every URL it finds, until nothing is pending or `limit` pages
/// have been handled.
pub async fn crawl(
    conn: &Connection,
    client: &reqwest::Client,
    pattern: &Pattern,
    limit: Option<usize>,
    concurrency: usize,
) -> Result<CrawlStats> {
    let regex = pattern.compile()?;
    let concurrency = concurrency.max(1);
    let mut stats = CrawlStats {
        visited: 0,
        failed: 0,
        discovered: 0,
    };

    let pb = match limit {
        Some(n) => ProgressBar::new(n as u64),
        None => ProgressBar::new(db::count_pending(conn)? as u64),
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}) {msg}")?
            .progress_chars("=> "),
    );

    loop {
        let handled = stats.visited + stats.failed;
        let room = limit.map_or(usize::MAX, |n| n.saturating_sub(handled));
        if room == 0 {
            break;
        }
        let batch = db::fetch_pending(conn, room.min(concurrency * BATCH_FACTOR))?;
        if batch.is_empty() {
            break;
        }

        let pages = fetch_batch(client, batch, concurrency).await;
        let results: Vec<_> = pages
            .into_par_iter()
            .map(|page| {
                let urls = page.body.map(|text| pattern.collect_urls(&regex, &text));
                (page.entry, urls)
            })
            .collect();

        for (entry, urls) in results {
            match urls {
                Ok(urls) => {
                    let new = db::enqueue(conn, &urls, Some(entry.id))?;
                    db::mark_visited(conn, entry.id)?;
                    stats.visited += 1;
                    stats.discovered += new;
                    if limit.is_none() {
                        pb.inc_length(new as u64);
                    }
                }
                Err(e) => {
                    warn!("Failed {}: {}", entry.url, e);
                    db::mark_failed(conn, entry.id, &e)?;
                    stats.failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.set_message(format!("{} new", stats.discovered));
    }

    pb.finish_and_clear();
    info!(
        "Crawled {} pages ({} failed), {} new URLs",
        stats.visited + stats.failed,
        stats.failed,
        stats.discovered
    );
    Ok(stats)
}

/// Fetch one batch concurrently; results arrive in completion order.
async fn fetch_batch(
    client: &reqwest::Client,
    batch: Vec<QueueEntry>,
    concurrency: usize,
) -> Vec<FetchedPage> {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<FetchedPage>(concurrency * 2);

    for entry in batch {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let body = match sem.acquire().await {
                Ok(_permit) => fetch::fetch_text(&client, &entry.url)
                    .await
                    .map_err(|e| format!("{:#}", e)),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(FetchedPage { entry, body }).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut pages = Vec::new();
    while let Some(page) = rx.recv().await {
        pages.push(page);
    }
    pages
}
