mod config;
mod extract;
mod fetch;
mod members;
mod normalize;
mod pipeline;
mod recency;
mod storage;

use std::time::Instant;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use crate::config::{find_category, AppConfig, CategoryConfig, CATEGORIES};
use crate::fetch::HttpFetcher;
use crate::pipeline::Pipeline;
use crate::storage::FsStore;

#[derive(Parser)]
#[command(name = "souq_scraper", about = "OpenSooq classified-ads scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape recent listings and merge member data
    Run {
        /// Scrape a single category (default: all configured categories)
        #[arg(short, long)]
        category: Option<String>,
        /// Partition date for storage keys, YYYY-MM-DD (default: yesterday)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Max listing pages per subcategory
        #[arg(short = 'n', long)]
        max_pages: Option<usize>,
    },
    /// List configured categories and their variants
    Categories,
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

    let result = match cli.command {
        Commands::Run {
            category,
            date,
            max_pages,
        } => {
            let app = AppConfig::from_env()?;
            let selected: Vec<&CategoryConfig> = match category.as_deref() {
                Some(key) => {
                    let Some(cfg) = find_category(key) else {
                        anyhow::bail!(
                            "Unknown category '{}'. Run 'categories' to list them.",
                            key
                        );
                    };
                    vec![cfg]
                }
                None => CATEGORIES.iter().collect(),
            };
            let target_date = date.unwrap_or_else(|| {
                Local::now().date_naive() - chrono::Days::new(1)
            });

            let fetcher = HttpFetcher::new()?;
            let store = FsStore::new(&app.storage_root);
            println!(
                "Scraping {} categories for {} into {}...",
                selected.len(),
                target_date,
                app.storage_root.display()
            );
            let stats = Pipeline::new(&fetcher, &store, &app.base_url, target_date)
                .run(&selected, max_pages)
                .await;
            stats.print();
            Ok(())
        }
        Commands::Categories => {
            println!(
                "{:<24} | {:<24} | {:<14} | {:<18}",
                "Key", "Landing path", "Window", "Merge policy"
            );
            println!("{}", "-".repeat(88));
            for c in &CATEGORIES {
                println!(
                    "{:<24} | {:<24} | {:<14} | {:<18}",
                    c.key,
                    c.url_path,
                    c.window.label(),
                    c.merge_policy.label()
                );
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
