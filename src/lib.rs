pub mod config;
pub mod error;
pub mod ingestor;
pub mod models;
pub mod parser;
pub mod persistence;
pub mod query;
pub mod resolver;
pub mod service;
pub mod sqlite;

use std::io::{Read, Write};

use error::Result;
use ingestor::{IngestReport, Ingestor};
use persistence::PersistenceGateway;
use query::TransactionPage;

/// Ingest a statement from any reader into `gateway`
pub fn ingest_statement<R: Read, G: PersistenceGateway + ?Sized>(
    reader: R,
    gateway: &G,
) -> Result<IngestReport> {
    Ingestor::new(gateway).ingest_reader(reader)
}

const CSV_HEADER: [&str; 5] = ["id", "clientName", "documentId", "date", "amount"];

/// Write a page of transactions as CSV, one row per transaction
///
/// The header row is written even for an empty page.
pub fn write_page_csv<W: Write>(page: &TransactionPage, writer: W) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(CSV_HEADER)?;

    for transaction in &page.transactions {
        csv_writer.serialize(transaction)?;
    }

    csv_writer.flush()?;
    Ok(())
}
