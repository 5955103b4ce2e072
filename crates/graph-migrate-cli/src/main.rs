//! graph-migrate CLI - move rows between PostgreSQL, MongoDB and Neo4j.

use clap::{Parser, Subcommand};
use graph_migrate::report::format_hms_millis;
use graph_migrate::typemap::convert_schema;
use graph_migrate::{
    drivers, BackendKind, Classification, ColumnMapping, Config, DataSource, EventSink, JobResult,
    MigrateError, MigrationReport, Orchestrator, SchemaDescriptor,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit code when at least one item did not migrate cleanly.
const EXIT_INCOMPLETE: u8 = 1;

#[derive(Parser)]
#[command(name = "graph-migrate")]
#[command(about = "Row-level migration between tabular, document and graph stores")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Source backend: tabular, document or graph (overrides migration.source)
    #[arg(long)]
    source: Option<BackendKind>,

    /// Target backend: tabular, document or graph (overrides migration.target)
    #[arg(long)]
    target: Option<BackendKind>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print engine events as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the items of the source catalog
    List,

    /// Show the schema of a source item and its form on the target
    Schema {
        /// Table, collection or label name
        item: String,
    },

    /// Migrate a single item
    Migrate {
        /// Source table, collection or label
        item: String,

        /// Target item name [default: same as source]
        #[arg(long)]
        target_item: Option<String>,

        /// Columns to move as source[:target] pairs, e.g. "id:user_id,name"
        #[arg(long)]
        columns: Option<String>,
    },

    /// Migrate every item of the source catalog
    MigrateAll {
        /// Write the delimited report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Test the connection to every configured backend
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?.with_backends(cli.source, cli.target)?;
    info!("Loaded configuration from {:?}", cli.config);

    match &cli.command {
        Commands::List => {
            let source = drivers::connect(config.source_kind()?, &config).await?;
            let items = source.list_items().await;
            source.close().await;
            let items = items?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in &items {
                    println!("{}", item);
                }
            }
        }

        Commands::Schema { item } => {
            let source = drivers::connect(config.source_kind()?, &config).await?;
            let schema = source.get_schema(item).await;
            source.close().await;
            let schema = schema?;
            let converted = config
                .migration
                .target
                .map(|kind| convert_schema(kind, &schema));

            if cli.output_json {
                let out = serde_json::json!({ "source": schema, "target": converted });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_schema(&schema, converted.as_ref());
            }
        }

        Commands::Migrate {
            item,
            target_item,
            columns,
        } => {
            let mapping = columns.as_deref().map(ColumnMapping::parse).transpose()?;
            let target_item = target_item.as_deref().unwrap_or(item);

            let (source, target) = connect_pair(&config).await?;
            let cancel = setup_signal_handler().await?;
            let (events, printer) = event_sink(cli.progress, config.migration.event_buffer);

            let orchestrator = Orchestrator::from_settings(source.clone(), target.clone(), &config.migration)
                .with_events(events)
                .with_cancellation(cancel);
            let result = orchestrator
                .migrate_item(item, target_item, mapping.as_ref())
                .await;

            drop(orchestrator);
            finish(printer, &source, &target).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }

            if result.cancelled {
                return Ok(ExitCode::from(MigrateError::Cancelled.exit_code()));
            }
            if !result.is_ok() {
                return Ok(ExitCode::from(EXIT_INCOMPLETE));
            }
        }

        Commands::MigrateAll { report } => {
            let (source, target) = connect_pair(&config).await?;
            let cancel = setup_signal_handler().await?;
            let (events, printer) = event_sink(cli.progress, config.migration.event_buffer);

            let orchestrator = Orchestrator::from_settings(source.clone(), target.clone(), &config.migration)
                .with_events(events)
                .with_cancellation(cancel);
            let run = orchestrator.migrate_all().await;

            drop(orchestrator);
            finish(printer, &source, &target).await;
            let run = run?;

            let summary = MigrationReport::from_run(&run);
            if let Some(path) = report {
                summary.save_csv(path)?;
            }

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                print!("{}", summary);
                println!(
                    "\n  OK: {}  Partial: {}  Fail: {}",
                    run.count(Classification::Ok),
                    run.count(Classification::Partial),
                    run.count(Classification::Fail)
                );
            }

            if run.cancelled {
                return Ok(ExitCode::from(MigrateError::Cancelled.exit_code()));
            }
            if !run.all_ok() {
                return Ok(ExitCode::from(EXIT_INCOMPLETE));
            }
        }

        Commands::HealthCheck => {
            let mut healthy = true;
            let mut checks = Vec::new();

            for kind in config.configured_backends() {
                let check = match drivers::connect(kind, &config).await {
                    Ok(ds) => {
                        let items = ds.list_items().await;
                        ds.close().await;
                        items
                    }
                    Err(e) => Err(e),
                };
                healthy &= check.is_ok();

                match check {
                    Ok(items) => checks.push(serde_json::json!({
                        "backend": kind,
                        "connected": true,
                        "items": items.len(),
                    })),
                    Err(e) => checks.push(serde_json::json!({
                        "backend": kind,
                        "connected": false,
                        "error": e.to_string(),
                    })),
                }
            }

            if cli.output_json {
                let out = serde_json::json!({ "healthy": healthy, "backends": checks });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Health Check Results:");
                for check in &checks {
                    let backend = check["backend"].as_str().unwrap_or("?");
                    if check["connected"].as_bool() == Some(true) {
                        println!("  {}: OK ({} items)", backend, check["items"]);
                    } else {
                        println!("  {}: FAILED", backend);
                        println!("    Error: {}", check["error"].as_str().unwrap_or(""));
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn connect_pair(config: &Config) -> Result<(DataSource, DataSource), MigrateError> {
    let source = drivers::connect(config.source_kind()?, config).await?;
    match drivers::connect(config.target_kind()?, config).await {
        Ok(target) => Ok((source, target)),
        Err(e) => {
            source.close().await;
            Err(e)
        }
    }
}

/// Event sink for the engine. With `--progress` every event is printed to
/// stderr as one JSON line; otherwise events only reach the log.
fn event_sink(progress: bool, buffer: usize) -> (EventSink, Option<JoinHandle<()>>) {
    if !progress {
        return (EventSink::disabled(), None);
    }

    let (events, mut rx) = EventSink::channel(buffer);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                eprintln!("{}", line);
            }
        }
    });
    (events, Some(printer))
}

/// Drain the event printer and close both connections.
async fn finish(printer: Option<JoinHandle<()>>, source: &DataSource, target: &DataSource) {
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    source.close().await;
    target.close().await;
}

fn print_schema(schema: &SchemaDescriptor, converted: Option<&SchemaDescriptor>) {
    println!(
        "{} ({}{})",
        schema.item,
        schema.backend,
        if schema.sampled { ", sampled" } else { "" }
    );
    if let Some(c) = converted {
        println!("  target: {}", c.backend);
    }
    for (i, field) in schema.fields.iter().enumerate() {
        let mapped = converted
            .and_then(|c| c.fields.get(i))
            .map(|f| format!("  -> {}", f.native_type))
            .unwrap_or_default();
        println!(
            "  {:<24} {:<10} {:<28}{}",
            field.name, field.abstract_type, field.native_type, mapped
        );
    }
}

fn print_result(result: &JobResult) {
    println!("\n{}: {}", result.item_name, result.classification);
    println!("  Records: {}", result.source_record_count);
    println!("  Migrated: {}", result.migrated_count);
    println!("  Failed: {}", result.failed_count);
    println!("  Time: {}", format_hms_millis(result.elapsed));
    if let Some(ref err) = result.error_message {
        println!("  Error: {}", err);
    }
    if result.cancelled {
        println!("  (cancelled)");
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays machine-readable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Cancel the returned token on SIGINT or SIGTERM. The engine stops between
/// rows and reports what it has done so far.
#[cfg(unix)]
async fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let mut stream = signal(kind)?;
        let token = cancel_token.clone();
        tokio::spawn(async move {
            stream.recv().await;
            eprintln!("\nReceived {}. Stopping after the current row...", name);
            token.cancel();
        });
    }

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current row...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
