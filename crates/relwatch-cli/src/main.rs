//! relwatch - App release reconciliation CLI
//!
//! ## Commands
//!
//! - `run`: reconcile the app table against the App Store once
//! - `lookup`: show what the App Store reports for one Apple ID
//! - `check-config`: validate settings and the Feishu connection

mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use relwatch_connectors::{
    BitableStore, FeishuClient, FeishuConfig, FeishuMessenger, ItunesLookupClient,
};
use relwatch_core::{ReconcileRunner, RunReport, TableRef};

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "relwatch")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Flip app records to released once the App Store serves them", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the app table once
    Run {
        /// Decide and report without writing records or sending messages
        #[arg(long)]
        dry_run: bool,

        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Query the App Store for one app
    Lookup {
        /// Apple ID (numeric App Store id)
        apple_id: u64,

        /// Storefront country code
        #[arg(long, default_value = "us")]
        country: String,
    },

    /// Validate settings and test the Feishu connection
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    relwatch_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run { dry_run, report } => cmd_run(dry_run, report.as_deref()).await,
        Commands::Lookup { apple_id, country } => cmd_lookup(apple_id, &country).await,
        Commands::CheckConfig => cmd_check_config().await,
    }
}

/// Feishu client plus the table coordinates behind the configured wiki link.
async fn connect(settings: &Settings) -> Result<(Arc<FeishuClient>, BitableStore, TableRef)> {
    let client = Arc::new(
        FeishuClient::new(FeishuConfig::new(&settings.app_id, &settings.app_secret))
            .context("Failed to build Feishu client")?,
    );
    let store = BitableStore::new(client.clone());
    let app_token = store
        .resolve_app_token(&settings.location.node_token)
        .await
        .context("Failed to resolve Bitable app token from wiki link")?;

    let mut table = TableRef::new(app_token, &settings.table_id);
    if let Some(view) = &settings.location.view_id {
        table = table.with_view(view);
    }
    Ok((client, store, table))
}

async fn cmd_run(dry_run: bool, report_path: Option<&Path>) -> Result<()> {
    let settings = Settings::from_env().context("Invalid configuration")?;
    if settings.is_local() {
        info!("ENV=local, notifications disabled");
    }

    let config = settings.reconcile_config(dry_run);
    config.check().context("Invalid reconciliation settings")?;

    let (client, store, table) = connect(&settings).await?;
    let lookup = ItunesLookupClient::new().context("Failed to build App Store client")?;
    let messenger = FeishuMessenger::new(client);

    let runner = ReconcileRunner::new(store, lookup, messenger, config)
        .context("Invalid reconciliation settings")?;
    let report = runner.run(&table).await.context("Reconciliation run failed")?;

    print_summary(&report);
    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        info!(path = %path.display(), "run report written");
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    let c = &report.counts;
    let mode = if report.dry_run { " [dry run]" } else { "" };
    println!("Run {} ({}ms){mode}", report.run_id, report.duration_ms());
    println!("  rows fetched:       {}", c.fetched_rows);
    println!("  main records:       {}", c.main_records);
    println!("  excluded by stage:  {}", c.excluded_by_stage);
    println!("  valid / invalid:    {} / {}", c.valid, c.invalid);
    println!("  released:           {}", c.released);
    println!("  awaiting release:   {}", c.awaiting);
    println!("  skipped:            {}", c.skipped);
    if c.failed_writes > 0 || c.failed_deliveries > 0 {
        println!("  failed writes:      {}", c.failed_writes);
        println!("  failed deliveries:  {}", c.failed_deliveries);
    }
    for outcome in report.outcomes.iter().filter(|o| o.is_released()) {
        println!(
            "  ✓ {} V{}",
            outcome.package_name,
            outcome.local_version.as_deref().unwrap_or("?")
        );
    }
}

async fn cmd_lookup(apple_id: u64, country: &str) -> Result<()> {
    let client = ItunesLookupClient::new()
        .context("Failed to build App Store client")?
        .with_country(country);
    let status = client
        .lookup(apple_id)
        .await
        .with_context(|| format!("App Store lookup failed for {apple_id}"))?;

    if !status.is_online {
        warn!(apple_id, country, "app not found in store");
    }
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn cmd_check_config() -> Result<()> {
    let settings = Settings::from_env().context("Invalid configuration")?;
    println!("Environment:   {}", settings.environment);
    println!("Wiki link:     {}", settings.wiki_url);
    println!("Wiki node:     {}", settings.location.node_token);
    println!("Table:         {}", settings.table_id);
    println!(
        "View:          {}",
        settings.location.view_id.as_deref().unwrap_or("(none)")
    );

    let channels = settings.channels();
    if channels.is_empty() {
        println!("Channels:      (none, notifications disabled)");
    }
    for channel in &channels {
        println!("Channel:       {} {:?}", channel.channel_id, channel.mention());
    }

    settings
        .reconcile_config(false)
        .check()
        .context("Invalid reconciliation settings")?;

    let (_client, store, table) = connect(&settings).await?;
    println!("App token:     {}", table.app_token);
    let tables = store
        .list_tables(&table.app_token)
        .await
        .context("Failed to list tables")?;
    println!("Connection OK, {} table(s):", tables.len());
    for t in &tables {
        let marker = if t.table_id == table.table_id { "*" } else { " " };
        println!("  {marker} {} ({})", t.name, t.table_id);
    }
    if !tables.iter().any(|t| t.table_id == table.table_id) {
        warn!(table_id = %table.table_id, "configured table not found in app");
    }
    Ok(())
}
