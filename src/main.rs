mod crawler;
mod db;
mod fetch;
mod induce;
mod settings;

use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use induce::{InduceError, ResultSet, SimilarityThreshold};

#[derive(Parser)]
#[command(name = "pattern_spider", about = "Induce link patterns from a page and crawl with them")]
struct Cli {
    /// SQLite file for result sets and the crawl queue
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a page, cluster its links and store the blocks
    Analyze {
        /// Page URL (scheme optional)
        url: String,
        /// Resource suffixes to look for, without the dot
        #[arg(short, long = "suffix", default_values_t = vec!["html".to_string()])]
        suffixes: Vec<String>,
        /// Similarity threshold in [0, 1]
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Read the page from a local file instead of fetching it
        #[arg(long)]
        file: Option<String>,
        /// Items shown per block
        #[arg(short = 'n', long)]
        display: Option<usize>,
    },
    /// Print a stored result set
    Show {
        /// Result set id (default: latest)
        #[arg(long)]
        id: Option<i64>,
        /// Emit JSON instead of the block listing
        #[arg(long)]
        json: bool,
        #[arg(short = 'n', long)]
        display: Option<usize>,
    },
    /// List stored result sets
    List,
    /// Synthesize a pattern from a block (or part of one)
    Choose {
        block: usize,
        /// First item; alone it selects just that item
        #[arg(long)]
        start: Option<usize>,
        /// Last item, inclusive; ignored without --start
        #[arg(long)]
        end: Option<usize>,
        #[arg(long)]
        id: Option<i64>,
    },
    /// Crawl from the analysed page using a block's pattern
    Crawl {
        block: usize,
        #[arg(long)]
        start: Option<usize>,
        #[arg(long)]
        end: Option<usize>,
        #[arg(long)]
        id: Option<i64>,
        /// Max pages to fetch (default: until the queue drains)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Start from this URL instead of the analysed page
        #[arg(long)]
        seed: Option<String>,
    },
    /// Show crawl queue statistics
    Queue,
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
    let mut settings = settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Analyze {
            url,
            suffixes,
            threshold,
            file,
            display,
        } => {
            let threshold =
                SimilarityThreshold::new(threshold.unwrap_or(settings.similarity_threshold))?;
            let page_url = fetch::normalize_url(&url)?;
            let host = fetch::host_of(&page_url);

            let text = match file {
                Some(path) => {
                    let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {}", path))?;
                    fetch::decode(&bytes)?
                }
                None => {
                    let client = fetch::client(&settings)?;
                    fetch::fetch_text(&client, page_url.as_str()).await?
                }
            };

            match induce::analyze(&text, &host, &suffixes, threshold) {
                Ok(result) => {
                    let id = db::save_result_set(
                        &conn,
                        page_url.as_str(),
                        &suffixes,
                        threshold.value(),
                        &result,
                    )?;
                    print_blocks(&result, display.unwrap_or(settings.display_number));
                    println!(
                        "\nStored result set #{} ({} blocks, {} links). Next: choose <block>",
                        id,
                        result.blocks.len(),
                        result.item_count()
                    );
                    Ok(())
                }
                Err(InduceError::NoCandidatesFound) => {
                    println!("Nothing matched {} on {}.", suffixes.join(", "), page_url);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Show { id, json, display } => {
            let Some(stored) = db::load_result_set(&conn, id)? else {
                println!("No result set stored. Run 'analyze' first.");
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&stored.result)?);
            } else {
                println!(
                    "#{} {} (threshold {}, suffixes {}, {})\n",
                    stored.id,
                    stored.page_url,
                    stored.threshold,
                    stored.suffixes.join(","),
                    stored.created_at
                );
                print_blocks(&stored.result, display.unwrap_or(settings.display_number));
            }
            Ok(())
        }
        Commands::List => {
            let rows = db::list_result_sets(&conn)?;
            if rows.is_empty() {
                println!("No result sets stored.");
                return Ok(());
            }
            println!("{:>4} | {:>6} | {:>6} | {:<25} | {}", "#", "Blocks", "Links", "Created", "Page");
            println!("{}", "-".repeat(80));
            for r in &rows {
                println!(
                    "{:>4} | {:>6} | {:>6} | {:<25} | {}",
                    r.id,
                    r.blocks,
                    r.items,
                    truncate(&r.created_at, 25),
                    r.page_url
                );
            }
            Ok(())
        }
        Commands::Choose { block, start, end, id } => {
            let Some(stored) = db::load_result_set(&conn, id)? else {
                bail!("No result set stored. Run 'analyze' first.");
            };
            let pattern = stored.result.pattern(block, start, end)?;
            println!("{}", pattern.regex);
            if let Some(host) = &pattern.host {
                println!("host: {}", host);
            }
            Ok(())
        }
        Commands::Crawl {
            block,
            start,
            end,
            id,
            limit,
            seed,
        } => {
            let Some(stored) = db::load_result_set(&conn, id)? else {
                bail!("No result set stored. Run 'analyze' first.");
            };
            let pattern = stored.result.pattern(block, start, end)?;
            println!("Pattern: {}", pattern.regex);

            let seed = match seed {
                Some(s) => fetch::normalize_url(&s)?.to_string(),
                None => stored.page_url.clone(),
            };
            let added = db::enqueue(&conn, &[seed], None)?;
            let pending = db::count_pending(&conn)?;
            if pending == 0 {
                println!("Queue is empty{}.", if added == 0 { " (seed already visited)" } else { "" });
                return Ok(());
            }

            let client = fetch::client(&settings)?;
            println!("Crawling ({} pending)...", pending);
            let stats = crawler::crawl(&conn, &client, &pattern, limit, settings.concurrency).await?;
            println!(
                "Done: {} visited, {} failed, {} new URLs queued.",
                stats.visited, stats.failed, stats.discovered
            );
            Ok(())
        }
        Commands::Queue => {
            let s = db::queue_stats(&conn)?;
            println!("Total:   {}", s.total);
            println!("Pending: {}", s.pending);
            println!("Visited: {}", s.visited);
            println!("Failed:  {}", s.failed);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_blocks(result: &ResultSet, display: usize) {
    for (index, block) in result.blocks.iter().enumerate() {
        println!("[{}]:", index);
        for (i, item) in block.items.iter().take(display).enumerate() {
            println!("---({}){}", i, result.display_form(item));
        }
        if block.len() > display {
            println!("{} not displayed", block.len() - display);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
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
