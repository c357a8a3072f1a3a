//! Tablegate CLI - store and fetch tables in a Google Drive folder.
//!
//! Tables are read from and written to CSV or Parquet files; the format
//! follows the file extension.

use anyhow::{Context, Result};
use arrow_array::RecordBatch;
use arrow_csv::reader::Format;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tablegate_gateway::{
    codec, Confirm, DataGateway, DeleteOutcome, Force, GatewayConfig, StdinPrompt,
};
use tablegate_storage::gdrive::TokenStore;

/// Rows sampled when inferring a CSV schema.
const CSV_INFER_RECORDS: usize = 1000;

#[derive(Parser)]
#[command(name = "tablegate")]
#[command(about = "Tablegate - tables in a Google Drive folder")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Path to the JSON configuration.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate and store the token.
    Login,

    /// Remove the stored token.
    Logout,

    /// Upload a CSV or Parquet file as a table.
    Put {
        /// Table name.
        table: String,

        /// Source file (.csv or .parquet).
        file: PathBuf,

        /// Replace the table if it exists.
        #[arg(long)]
        overwrite: bool,
    },

    /// Download a table.
    Get {
        /// Table name.
        table: String,

        /// Write to a .csv or .parquet file instead of printing.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the structural summary of a table.
    Meta {
        /// Table name.
        table: String,
    },

    /// List all tables.
    List,

    /// Delete a table and its files.
    Delete {
        /// Table name.
        table: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("parquet") => Ok(Self::Parquet),
            _ => anyhow::bail!(
                "Unsupported file type: {} (use .csv or .parquet)",
                path.display()
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = GatewayConfig::from_file(&cli.config)
        .await
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Login => cmd_login(&config).await,

        Commands::Logout => cmd_logout(&config).await,

        Commands::Put {
            table,
            file,
            overwrite,
        } => cmd_put(&config, &table, &file, overwrite).await,

        Commands::Get { table, output } => cmd_get(&config, &table, output.as_deref()).await,

        Commands::Meta { table } => cmd_meta(&config, &table).await,

        Commands::List => cmd_list(&config).await,

        Commands::Delete { table, force } => cmd_delete(&config, &table, force).await,
    }
}

async fn connect(config: &GatewayConfig) -> Result<DataGateway> {
    DataGateway::connect(config)
        .await
        .context("Failed to connect to Google Drive")
}

/// Authenticate and verify the root folder.
async fn cmd_login(config: &GatewayConfig) -> Result<()> {
    let gateway = connect(config).await?;

    println!("Logged in.");
    println!("  Root folder: {}", gateway.root_folder_id());
    println!("  Token file: {}", config.token_file.display());

    Ok(())
}

/// Forget the stored token.
async fn cmd_logout(config: &GatewayConfig) -> Result<()> {
    TokenStore::new(&config.token_file)
        .clear()
        .await
        .context("Failed to remove token file")?;

    println!("Logged out.");
    Ok(())
}

/// Upload a file as a table.
async fn cmd_put(config: &GatewayConfig, table: &str, file: &Path, overwrite: bool) -> Result<()> {
    info!("Reading {}", file.display());
    let batch = read_table_file(file)?;

    let gateway = connect(config).await?;
    gateway
        .put(table, &batch, overwrite)
        .await
        .with_context(|| format!("Failed to store table '{}'", table))?;

    println!(
        "Table '{}' stored ({} rows, {} columns)",
        table,
        batch.num_rows(),
        batch.num_columns()
    );
    Ok(())
}

/// Download a table to stdout or a file.
async fn cmd_get(config: &GatewayConfig, table: &str, output: Option<&Path>) -> Result<()> {
    let gateway = connect(config).await?;
    let batch = gateway
        .get(table)
        .await
        .with_context(|| format!("Failed to fetch table '{}'", table))?;

    match output {
        Some(path) => {
            write_table_file(path, &batch)?;
            println!(
                "Table '{}' written to {} ({} rows)",
                table,
                path.display(),
                batch.num_rows()
            );
        }
        None => {
            println!("{}", arrow_cast::pretty::pretty_format_batches(&[batch])?);
        }
    }

    Ok(())
}

/// Print a table's structural summary.
async fn cmd_meta(config: &GatewayConfig, table: &str) -> Result<()> {
    let gateway = connect(config).await?;
    let info = gateway
        .meta(table)
        .await
        .with_context(|| format!("Failed to fetch metadata of '{}'", table))?;

    print!("{}", info);
    Ok(())
}

/// List table names.
async fn cmd_list(config: &GatewayConfig) -> Result<()> {
    let gateway = connect(config).await?;
    let tables = gateway.list().await.context("Failed to list tables")?;

    if tables.is_empty() {
        println!("No tables.");
    } else {
        for name in tables {
            println!("{}", name);
        }
    }

    Ok(())
}

/// Delete a table, asking first unless forced.
async fn cmd_delete(config: &GatewayConfig, table: &str, force: bool) -> Result<()> {
    let gateway = connect(config).await?;
    let confirm: &dyn Confirm = if force { &Force } else { &StdinPrompt };

    let outcome = gateway
        .delete(table, confirm)
        .await
        .with_context(|| format!("Failed to delete table '{}'", table))?;

    match outcome {
        DeleteOutcome::Deleted => println!("Table '{}' deleted.", table),
        DeleteOutcome::Missing => println!("Table '{}' does not exist.", table),
        DeleteOutcome::Declined => println!("Cancelled."),
    }

    Ok(())
}

/// Load a CSV (with header) or Parquet file into a single batch.
fn read_table_file(path: &Path) -> Result<RecordBatch> {
    match FileFormat::from_path(path)? {
        FileFormat::Parquet => {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(codec::decode(data)?)
        }
        FileFormat::Csv => {
            let mut file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;

            let format = Format::default().with_header(true);
            let (schema, _) = format
                .infer_schema(&mut file, Some(CSV_INFER_RECORDS))
                .context("Failed to infer CSV schema")?;
            file.rewind()?;

            let schema = Arc::new(schema);
            let reader = arrow_csv::ReaderBuilder::new(schema.clone())
                .with_format(format)
                .build(file)
                .context("Failed to open CSV reader")?;
            let batches = reader
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to parse CSV")?;

            Ok(arrow_select::concat::concat_batches(&schema, &batches)?)
        }
    }
}

/// Write a batch as CSV or Parquet.
fn write_table_file(path: &Path, batch: &RecordBatch) -> Result<()> {
    match FileFormat::from_path(path)? {
        FileFormat::Parquet => {
            std::fs::write(path, codec::encode(batch)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        FileFormat::Csv => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = arrow_csv::Writer::new(file);
            writer.write(batch).context("Failed to write CSV")?;
        }
    }
    Ok(())
}
