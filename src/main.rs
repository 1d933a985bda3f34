use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use statement_ingest::config::Settings;
use statement_ingest::query::QueryRequest;
use statement_ingest::service::StatementService;
use statement_ingest::sqlite::SqliteGateway;
use statement_ingest::write_page_csv;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "statement-ingest",
    version,
    about = "Load bank statements and query their transactions"
)]
struct Cli {
    /// SQLite database file (overrides configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one or more statement files
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List stored transactions
    Query {
        /// CPF or CNPJ, punctuation allowed
        #[arg(long)]
        document_id: Option<String>,
        /// Inclusive, YYYY-MM-DD
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Inclusive, YYYY-MM-DD
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load configuration")?;
    init_logging(&settings.log_level);

    let database = cli.database.unwrap_or(settings.database_path);
    let gateway = SqliteGateway::open(&database)
        .with_context(|| format!("Failed to open database '{}'", database.display()))?;
    let service = StatementService::with_page_size(gateway, settings.page_size);

    match cli.command {
        Command::Ingest { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to open input file '{}'", path.display()))?;
                uploads.push(bytes);
            }

            let mut failed = 0;
            for (path, result) in files.iter().zip(service.ingest_many(uploads).await) {
                match result {
                    Ok(report) => {
                        let line = serde_json::json!({
                            "file": path.display().to_string(),
                            "report": report,
                        });
                        println!("{}", line);
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::error!(file = %path.display(), error = %e, "ingestion failed");
                    }
                }
            }

            anyhow::ensure!(failed == 0, "{} of {} files failed to ingest", failed, files.len());
        }
        Command::Query {
            document_id,
            start_date,
            end_date,
            page,
            format,
        } => {
            let request = QueryRequest {
                document_id,
                start_date,
                end_date,
                page: Some(page),
            };
            let page = service.query(request).await.context("Query failed")?;

            match format {
                Format::Json => serde_json::to_writer_pretty(io::stdout(), &page)
                    .context("Failed to write output")?,
                Format::Csv => {
                    write_page_csv(&page, io::stdout()).context("Failed to write output")?
                }
            }
        }
    }

    Ok(())
}
