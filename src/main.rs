use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::{init_tracing, load_config, Config};
use database::{DbRepository, TradeStore};
use indicatif::{ProgressBar, ProgressStyle};
use ingest::{IngestOutcome, SheetFormat};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The main entry point for the FX trade dashboard backend.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional; real environment variables win.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = init_tracing(&config.log)?;

    match cli.command {
        Commands::Serve(args) => handle_serve(args, &config).await,
        Commands::Ingest(args) => handle_ingest(args, &config).await,
        Commands::Truncate(args) => handle_truncate(args, &config).await,
        Commands::Summary => handle_summary(&config).await,
        Commands::Links { action } => handle_links(action, &config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Upload, clean and explore FX trade records.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./config.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the JSON API.
    Serve(ServeArgs),
    /// Clean a CSV/XLSX file and append its valid rows to the trades table.
    Ingest(IngestArgs),
    /// Delete every stored trade.
    Truncate(TruncateArgs),
    /// Print per-day totals of the stored trades.
    Summary,
    /// Manage the stored dashboard links.
    Links {
        #[command(subcommand)]
        action: LinkCommand,
    },
}

#[derive(Parser)]
struct ServeArgs {
    /// Overrides `server.addr` (e.g. 127.0.0.1:8080).
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[derive(Parser)]
struct IngestArgs {
    /// The spreadsheet to load.
    file: PathBuf,

    /// `csv` or `xlsx`; taken from the file extension when omitted.
    #[arg(long)]
    format: Option<SheetFormat>,

    /// Clean and report without touching the database.
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON instead of tables.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct TruncateArgs {
    /// Required: confirms that every trade should be deleted.
    #[arg(long)]
    yes: bool,
}

#[derive(Subcommand)]
enum LinkCommand {
    /// List stored links, newest first.
    List,
    /// Store a new link.
    Add {
        name: String,
        /// Absolute http(s) URL.
        url: String,
    },
    /// Delete a link by id.
    Remove { id: i32 },
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn open_repository(config: &Config) -> anyhow::Result<DbRepository> {
    let url = config.database_url()?;
    let pool = database::connect(&url, &config.database)
        .await
        .context("failed to connect to the database")?;
    database::ensure_schema(&pool)
        .await
        .context("failed to create the database schema")?;
    Ok(DbRepository::new(pool).with_chunk_size(config.ingest.insert_chunk_size))
}

async fn handle_serve(args: ServeArgs, config: &Config) -> anyhow::Result<()> {
    let addr = match args.addr {
        Some(addr) => addr,
        None => config.server.addr.parse().context("invalid server.addr")?,
    };
    web_server::run_server(config, addr).await
}

async fn handle_ingest(args: IngestArgs, config: &Config) -> anyhow::Result<()> {
    let format = match args.format {
        Some(format) => format,
        None => SheetFormat::from_path(&args.file)?,
    };
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let normalizer = web_server::build_normalizer(&config.ingest)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Cleaning {}...", args.file.display()));

    let outcome = ingest::ingest_bytes(&bytes, format, &normalizer)
        .with_context(|| format!("failed to ingest {}", args.file.display()))?;

    let inserted = if args.dry_run || outcome.records.is_empty() {
        0
    } else {
        spinner.set_message(format!("Storing {} trades...", outcome.records.len()));
        let repo = open_repository(config).await?;
        repo.insert(&outcome.records).await?
    };
    spinner.finish_and_clear();

    if args.json {
        let report = serde_json::json!({
            "inserted": inserted,
            "dry_run": args.dry_run,
            "summary": outcome.summary,
            "rejected": outcome.rejected,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_ingest_report(&outcome, inserted, args.dry_run);
    }
    Ok(())
}

fn print_ingest_report(outcome: &IngestOutcome, inserted: u64, dry_run: bool) {
    let s = &outcome.summary;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Rows read", "Kept", "Dropped (invalid)", "Dropped (time out of range)", "Inserted"]);
    table.add_row(vec![
        s.rows_read.to_string(),
        s.rows_kept.to_string(),
        s.dropped_invalid.to_string(),
        s.dropped_out_of_range.to_string(),
        if dry_run { "dry run".to_string() } else { inserted.to_string() },
    ]);
    println!("{table}");

    if !s.missing_values.is_empty() {
        let mut missing = Table::new();
        missing.load_preset(UTF8_FULL).set_header(vec!["Column", "Missing values"]);
        for (field, count) in &s.missing_values {
            missing.add_row(vec![field.to_string(), count.to_string()]);
        }
        println!("{missing}");
    }

    if !outcome.rejected.is_empty() {
        let mut rejected = Table::new();
        rejected.load_preset(UTF8_FULL).set_header(vec!["Line", "Reasons"]);
        for row in &outcome.rejected {
            rejected.add_row(vec![row.line.to_string(), row.reasons().join("; ")]);
        }
        println!("{rejected}");
    }
}

async fn handle_truncate(args: TruncateArgs, config: &Config) -> anyhow::Result<()> {
    if !args.yes {
        bail!("refusing to delete every trade without --yes");
    }
    let repo = open_repository(config).await?;
    repo.truncate().await?;
    println!("All trades deleted.");
    Ok(())
}

async fn handle_summary(config: &Config) -> anyhow::Result<()> {
    let repo = open_repository(config).await?;
    let days = repo.daily_summary().await?;
    if days.is_empty() {
        println!("No trades stored.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Date", "Transactions", "Volume", "Makers", "Takers"]);
    for day in days {
        table.add_row(vec![
            day.trade_date.to_string(),
            day.transactions.to_string(),
            day.volume_total.to_string(),
            day.nb_makers.to_string(),
            day.nb_takers.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn handle_links(action: LinkCommand, config: &Config) -> anyhow::Result<()> {
    let repo = open_repository(config).await?;
    match action {
        LinkCommand::List => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(vec!["Id", "Name", "URL", "Created"]);
            for link in repo.list_links().await? {
                table.add_row(vec![
                    link.id.to_string(),
                    link.name,
                    link.url,
                    link.created_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{table}");
        }
        LinkCommand::Add { name, url } => {
            let link = repo.add_link(&name, &url).await?;
            println!("Added link #{} ({}).", link.id, link.name);
        }
        LinkCommand::Remove { id } => {
            repo.delete_link(id).await?;
            println!("Removed link #{id}.");
        }
    }
    Ok(())
}
