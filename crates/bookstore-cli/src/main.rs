//! Bookstore CLI
//!
//! Usage:
//!   bookstore                         Run the whole checklist
//!   bookstore run --step top-author   Run selected steps (checklist order is kept)
//!   bookstore run --genre Fantasy     Override a checklist parameter
//!   bookstore steps                   List the checklist
//!
//! The connection string is read from MONGODB_URI (a `.env` file is honoured).

mod config;

use anyhow::{Context, Result};
use bookstore_mongodb::{Catalog, Connection, QueryRunner, Step};
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "bookstore")]
#[command(about = "Run the bookstore query checklist against MongoDB", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the checklist (default)
    Run(RunArgs),
    /// List the checklist steps in order
    Steps,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Only run this step; repeatable
    #[arg(long = "step", value_name = "STEP")]
    steps: Vec<Step>,

    #[command(flatten)]
    catalog: CatalogArgs,
}

/// Overrides for the checklist parameters
#[derive(Args, Default)]
struct CatalogArgs {
    /// Genre for the equality filter [default: Science Fiction]
    #[arg(long)]
    genre: Option<String>,

    /// Year for the published-after filter [default: 2015]
    #[arg(long)]
    published_after: Option<i32>,

    /// Author for the equality filter [default: F. Scott Fitzgerald]
    #[arg(long)]
    author: Option<String>,

    /// Title whose price is updated [default: Kindred]
    #[arg(long)]
    update_title: Option<String>,

    /// New price for the updated title [default: 18.99]
    #[arg(long)]
    new_price: Option<f64>,

    /// Title to delete [default: Old Man's War]
    #[arg(long)]
    delete_title: Option<String>,

    /// Year for the in-stock filter [default: 2010]
    #[arg(long)]
    in_stock_after: Option<i32>,

    /// 1-based page number [default: 2]
    #[arg(long)]
    page: Option<u64>,

    /// Books per page [default: 5]
    #[arg(long)]
    page_size: Option<u64>,

    /// Title used for the explain lookups [default: Kindred]
    #[arg(long)]
    explain_title: Option<String>,
}

impl CatalogArgs {
    fn into_catalog(self) -> Catalog {
        let defaults = Catalog::default();
        Catalog {
            genre: self.genre.unwrap_or(defaults.genre),
            published_after: self.published_after.unwrap_or(defaults.published_after),
            author: self.author.unwrap_or(defaults.author),
            update_title: self.update_title.unwrap_or(defaults.update_title),
            new_price: self.new_price.unwrap_or(defaults.new_price),
            delete_title: self.delete_title.unwrap_or(defaults.delete_title),
            in_stock_after: self.in_stock_after.unwrap_or(defaults.in_stock_after),
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
            explain_title: self.explain_title.unwrap_or(defaults.explain_title),
        }
    }
}

impl RunArgs {
    fn into_runner(self) -> QueryRunner {
        let runner = QueryRunner::new(self.catalog.into_catalog());
        if self.steps.is_empty() {
            runner
        } else {
            runner.with_steps(self.steps)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match execute(cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default()))).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error occurred: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Steps => {
            for (position, step) in Step::ALL.iter().enumerate() {
                println!("{:>2}. {:<26} {}", position + 1, step.name(), step.description());
            }
            Ok(())
        }
        Commands::Run(args) => run_checklist(args).await,
    }
}

/// Connect, run the checklist, and close the connection whatever the outcome
async fn run_checklist(args: RunArgs) -> Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    let runner = args.into_runner();
    runner.catalog().validate().context("invalid checklist parameters")?;

    let connection = Connection::open(config.require_uri()?, &config.database)
        .await
        .context("failed to connect to MongoDB")?;
    let store = connection.book_store(&config.collection);
    info!(
        database = connection.database_name(),
        collection = config.collection.as_str(),
        steps = runner.steps().len(),
        "running checklist"
    );

    let outcome = runner.run(&store).await;
    connection.close().await;
    info!("connection closed");

    match outcome {
        Ok(_) => Ok(()),
        Err(e) if e.is_connection_failure() => Err(e).context("lost connection to MongoDB"),
        Err(e) => Err(e).context("checklist aborted"),
    }
}

/// Initialize logging: warnings and errors to stderr, everything else to stdout
fn init_logging(level: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .or_else(std::io::stdout);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized
}
