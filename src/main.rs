use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shopmedia_sync::asset_feed::AssetFeed;
use shopmedia_sync::catalog::CatalogClient;
use shopmedia_sync::error::SyncError;
use shopmedia_sync::normalization::{code, handle};
use shopmedia_sync::remote::{build_http_client, RetryPolicy};
use shopmedia_sync::sync::{run_sync, SyncOptions, DEFAULT_BATCH_SIZE};
use shopmedia_sync::util::env as env_util;

const STORE_DOMAIN_KEYS: [&str; 2] = ["SHOPIFY_STORE_DOMAIN", "SHOPIFY_DOMAIN"];
const ADMIN_TOKEN_KEYS: [&str; 2] = ["SHOPIFY_ADMIN_TOKEN", "SHOPIFY_ACCESS_TOKEN"];
const DEFAULT_API_VERSION: &str = "2024-07";

const SNAPSHOT_KEYS: [&str; 14] = [
    "SHOPIFY_STORE_DOMAIN",
    "SHOPIFY_DOMAIN",
    "SHOPIFY_ADMIN_TOKEN",
    "SHOPIFY_ACCESS_TOKEN",
    "SHOPIFY_API_VERSION",
    "ASSET_FEED_URL",
    "ASSET_FEED_API_KEY",
    "PRODUCT_CODE_PATTERN",
    "HANDLE_TEMPLATE",
    "DRY_RUN",
    "MEDIA_BATCH_SIZE",
    "MAX_RETRY_ATTEMPTS",
    "RETRY_BACKOFF_MS",
    "HTTP_TIMEOUT_SECS",
];

#[derive(Parser, Debug)]
#[command(
    name = "shopmedia-sync",
    version,
    about = "Attach asset-feed media to catalog products, keyed by product code"
)]
struct Cli {
    /// Perform all reads but skip every attach mutation
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Validate configuration, print a masked snapshot, and exit
    #[arg(long, default_value_t = false)]
    check_config: bool,
    /// Print the final run summary as one JSON line on stdout
    #[arg(long, default_value_t = false)]
    summary_json: bool,
    /// Attachments per create-media call (default 8)
    #[arg(long)]
    batch_size: Option<usize>,
    /// Attempt budget for each remote call (default 3)
    #[arg(long)]
    max_attempts: Option<u32>,
    /// Override the code-matching pattern
    #[arg(long)]
    code_pattern: Option<String>,
    /// Override the handle template
    #[arg(long)]
    handle_template: Option<String>,
    /// Override the asset feed URL
    #[arg(long)]
    feed_url: Option<String>,
    /// Override the catalog API version
    #[arg(long)]
    api_version: Option<String>,
}

/// Everything one run needs, resolved from CLI flags over environment.
/// No Debug derive: `admin_token` must never reach a log unmasked.
struct SyncConfig {
    store_domain: String,
    admin_token: String,
    api_version: String,
    feed_url: String,
    feed_api_key: Option<String>,
    code_pattern: String,
    handle_template: String,
    dry_run: bool,
    batch_size: usize,
    max_attempts: u32,
    backoff_ms: u64,
    http_timeout_secs: u64,
}

impl SyncConfig {
    fn resolve(cli: &Cli) -> Result<Self, SyncError> {
        let domain = env_util::require_first(&STORE_DOMAIN_KEYS)?;
        let token = env_util::require_first(&ADMIN_TOKEN_KEYS)?;
        info!(domain_key = %domain.key, token_key = %token.key, "credentials resolved");

        let feed_url = match &cli.feed_url {
            Some(url) => url.clone(),
            None => env_util::require_first(&["ASSET_FEED_URL"])?.value,
        };

        let max_attempts = cli
            .max_attempts
            .unwrap_or_else(|| env_util::env_parse("MAX_RETRY_ATTEMPTS", 3u32));
        if max_attempts == 0 {
            return Err(SyncError::config("max retry attempts must be at least 1"));
        }

        Ok(Self {
            store_domain: domain.value,
            admin_token: token.value,
            api_version: cli
                .api_version
                .clone()
                .or_else(|| env_util::env_opt("SHOPIFY_API_VERSION"))
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            feed_url,
            feed_api_key: env_util::env_opt("ASSET_FEED_API_KEY"),
            code_pattern: cli
                .code_pattern
                .clone()
                .or_else(|| env_util::env_opt("PRODUCT_CODE_PATTERN"))
                .unwrap_or_else(|| code::DEFAULT_CODE_PATTERN.to_string()),
            handle_template: cli
                .handle_template
                .clone()
                .or_else(|| env_util::env_opt("HANDLE_TEMPLATE"))
                .unwrap_or_else(|| handle::DEFAULT_HANDLE_TEMPLATE.to_string()),
            dry_run: cli.dry_run || env_util::env_flag("DRY_RUN", false),
            batch_size: cli
                .batch_size
                .unwrap_or_else(|| env_util::env_parse("MEDIA_BATCH_SIZE", DEFAULT_BATCH_SIZE)),
            max_attempts,
            backoff_ms: env_util::env_parse("RETRY_BACKOFF_MS", 500u64),
            http_timeout_secs: env_util::env_parse("HTTP_TIMEOUT_SECS", 30u64),
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_ms),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --- logging -------------------------------------------------------------
    env_util::init_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run(cli).await {
        error!(error = %e, "sync run failed");
        eprintln!("shopmedia-sync: {e:#}");
        let exit = match e.downcast_ref::<SyncError>() {
            Some(SyncError::Configuration { .. }) => 2,
            _ => 1,
        };
        std::process::exit(exit);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let started = Instant::now();

    // --- configuration -------------------------------------------------------
    env_util::preflight_snapshot("shopmedia-sync", &SNAPSHOT_KEYS);
    let config = SyncConfig::resolve(&cli)?;
    let options = SyncOptions::new(
        &config.code_pattern,
        config.handle_template.clone(),
        config.batch_size,
        config.dry_run,
    )?;

    if cli.check_config {
        println!(
            "[shopmedia-sync] config OK: store={} token={} feed={} version={} pattern={} template={} batch={} attempts={} dry_run={}",
            config.store_domain,
            env_util::mask_secret(&config.admin_token),
            config.feed_url,
            config.api_version,
            config.code_pattern,
            config.handle_template,
            config.batch_size,
            config.max_attempts,
            config.dry_run
        );
        return Ok(());
    }

    // --- clients -------------------------------------------------------------
    let http = build_http_client(Duration::from_secs(config.http_timeout_secs))?;
    let retry = config.retry_policy();
    let feed = AssetFeed::new(
        http.clone(),
        config.feed_url.clone(),
        config.feed_api_key.clone(),
        retry.clone(),
    );
    let catalog = CatalogClient::new(
        http,
        &config.store_domain,
        config.admin_token.clone(),
        &config.api_version,
        retry,
    );

    // --- sync run ------------------------------------------------------------
    info!(
        feed = %config.feed_url,
        api_version = %config.api_version,
        dry_run = config.dry_run,
        batch_size = config.batch_size,
        max_attempts = config.max_attempts,
        "starting sync run"
    );
    let summary = run_sync(&feed, &catalog, &options).await?;
    if cli.summary_json {
        println!("{}", serde_json::to_string(&summary)?);
    }
    info!(
        attached = summary.attached,
        skipped_existing = summary.skipped_existing,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sync complete"
    );
    Ok(())
}
