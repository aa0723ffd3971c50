//! Meli-Crawler main entry point
//!
//! This is the command-line interface for the Meli-Crawler catalog crawler.

use anyhow::{bail, Context};
use clap::Parser;
use meli_crawler::api::CategoryId;
use meli_crawler::config::{load_config_with_hash, Config};
use meli_crawler::crawler::{run_crawl, CrawlContext, PartitionStrategy};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Meli-Crawler: quota-aware catalog crawler
///
/// Meli-Crawler enumerates every item of a marketplace category even when
/// the search API caps each query, by partitioning oversized categories with
/// the API's own facet filters until their distinct-item coverage is reached.
#[derive(Parser, Debug)]
#[command(name = "meli-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A quota-aware marketplace catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl only this category (e.g., MLB1384)
    #[arg(long, value_name = "ID", conflicts_with_all = ["dry_run", "stats"])]
    category: Option<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "authorize"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "authorize"])]
    stats: bool,

    /// Run the authorization flow even if a stored token exists
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    authorize: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // rejected before any network call
    let category = cli
        .category
        .as_deref()
        .map(CategoryId::parse)
        .transpose()?;

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, category, cli.authorize).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("meli_crawler=info,warn"),
            1 => EnvFilter::new("meli_crawler=debug,info"),
            2 => EnvFilter::new("meli_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Meli-Crawler Dry Run ===\n");

    println!("API:");
    println!("  Site: {}", config.api.site_id);
    println!("  API base: {}", config.api.api_base);
    println!(
        "  Auth base: {}",
        config.api.auth_base.as_deref().unwrap_or("(site default)")
    );
    println!("  Redirect URI: {}", config.api.redirect_uri);
    println!(
        "  Client id: {}",
        if config.api.client_id.is_empty() { "(missing)" } else { "(set)" }
    );

    let strategy = PartitionStrategy::from(config.crawler.partition_strategy);
    println!("\nCrawler Configuration:");
    println!("  Quota per query: {}", config.crawler.quota);
    println!(
        "  Coverage threshold: {:.1}%",
        config.crawler.coverage_threshold * 100.0
    );
    println!("  Partition strategy: {:?}", strategy);
    println!(
        "  Concurrent categories: {}",
        config.crawler.max_concurrent_categories
    );
    println!(
        "  Concurrent pages per query: {}",
        config.crawler.max_concurrent_pages
    );
    println!("  Token refresh skew: {}s", config.crawler.refresh_skew_secs);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    if config.crawler.base_categories.is_empty() {
        println!("\nBase Categories: all listed by the site");
    } else {
        println!(
            "\nBase Categories ({}):",
            config.crawler.base_categories.len()
        );
        for id in &config.crawler.base_categories {
            println!("  - {}", id);
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use meli_crawler::output::{load_statistics, print_statistics};
    use meli_crawler::storage::SqliteStorage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    match load_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No crawl runs found in database"),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    category: Option<CategoryId>,
    force_authorize: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = CrawlContext::open(&config)?;

    if force_authorize || !context.load_stored_token().await? {
        authorize(&context).await?;
    }

    match &category {
        Some(id) => tracing::info!("Crawling single category {}", id),
        None => tracing::info!("Crawling all categories of site {}", config.api.site_id),
    }

    match run_crawl(config, context, config_hash, category).await {
        Ok(summary) => {
            tracing::info!(
                "Crawl completed successfully: run {}, {} item rows on {}",
                summary.run_id,
                summary.items_persisted,
                summary.run_date
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Interactive authorization-code flow
///
/// Prints the authorization URL, reads the callback URL the browser was
/// redirected to, exchanges its code and stores the token.
async fn authorize(context: &CrawlContext) -> anyhow::Result<()> {
    let request = context
        .tokens
        .oauth()
        .authorization_url()
        .context("building authorization URL")?;

    println!("Open this URL in a browser and grant access:\n\n  {}\n", request.url);
    print!("Paste the URL you were redirected to: ");
    io::stdout().flush()?;

    let mut callback = String::new();
    io::stdin()
        .lock()
        .read_line(&mut callback)
        .context("reading callback URL")?;
    let callback = callback.trim();
    if callback.is_empty() {
        bail!("no callback URL given");
    }

    let token = context
        .tokens
        .oauth()
        .exchange_code(callback, &request.state)
        .await
        .context("exchanging authorization code")?;

    tracing::info!("Authorized (token valid until {})", token.expires_at);
    context
        .install_token(token)
        .await
        .context("storing access token")?;
    Ok(())
}
