use std::io::Read;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{ParseError, Result};
use crate::models::NewTransaction;
use crate::parser::{decode_statement, parse_statement};
use crate::persistence::PersistenceGateway;
use crate::resolver::ClientResolver;

/// Outcome of one upload
///
/// Line errors are part of a successful report: a file where every line was
/// rejected still yields `Ok` with `inserted_count == 0`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub inserted_count: usize,
    pub elapsed_millis: u64,
    pub line_errors: Vec<ParseError>,
    pub clients_resolved: usize,
    pub lines_read: usize,
}

/// Turns statement files into persisted transactions
///
/// # Pipeline
///
/// 1. Decode bytes and split into lines
/// 2. Parse every line, collecting records and line errors separately
/// 3. Resolve each record's client (memoized per upload)
/// 4. Write all transactions in one atomic batch
/// 5. Apply client name corrections collected in step 3
///
/// Nothing is written while parsing, so dropping the call before step 3
/// leaves the store untouched. Step 3 only creates clients that do not exist
/// yet; names of existing clients change in step 5, after the batch is
/// stored. A storage fault in step 3 or 4 aborts the upload and is returned
/// unchanged; it is never retried here. A fault in step 5 is logged and the
/// report is still returned, since the transactions are already stored.
pub struct Ingestor<'g, G: PersistenceGateway + ?Sized> {
    gateway: &'g G,
}

impl<'g, G: PersistenceGateway + ?Sized> Ingestor<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    pub fn ingest(&self, bytes: &[u8]) -> Result<IngestReport> {
        let started = Instant::now();

        let text = decode_statement(bytes);
        let batch = parse_statement(&text);

        for line_error in &batch.line_errors {
            debug!(
                line = line_error.line_number,
                kind = %line_error.kind,
                detail = %line_error.detail,
                "rejected statement line"
            );
        }

        let mut resolver = ClientResolver::new(self.gateway);
        let mut transactions = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            let client = resolver
                .resolve(&record.name, &record.document_id)
                .inspect_err(|e| {
                    error!(line = record.line_number, error = %e, "client resolution failed")
                })?;

            transactions.push(NewTransaction {
                client,
                date: record.date,
                amount: record.amount,
            });
        }

        if !transactions.is_empty() {
            self.gateway
                .insert_transactions(&transactions)
                .inspect_err(|e| {
                    error!(batch_size = transactions.len(), error = %e, "batch write failed")
                })?;
        }

        let elapsed_millis = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match resolver.apply_name_corrections() {
            Ok(0) => {}
            Ok(renamed) => debug!(renamed, "client names corrected"),
            Err(e) => warn!(error = %e, "client name correction failed after batch write"),
        }

        let report = IngestReport {
            inserted_count: transactions.len(),
            elapsed_millis,
            line_errors: batch.line_errors,
            clients_resolved: resolver.resolved_count(),
            lines_read: batch.lines_read,
        };

        info!(
            inserted = report.inserted_count,
            rejected = report.line_errors.len(),
            clients = report.clients_resolved,
            elapsed_ms = report.elapsed_millis,
            "statement ingested"
        );

        Ok(report)
    }

    /// Read a whole statement from `reader` and ingest it
    pub fn ingest_reader<R: Read>(&self, mut reader: R) -> Result<IngestReport> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.ingest(&bytes)
    }
}
