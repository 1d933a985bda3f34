use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::StorageFault;
use crate::models::{Client, ClientRef, DocumentId, NewTransaction, Transaction, TransactionId};
use crate::parser::AMOUNT_SCALE;
use crate::persistence::{page_offset, PersistenceGateway, TransactionFilter};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id INTEGER NOT NULL REFERENCES clients(id),
    date TEXT NOT NULL,
    amount_cents INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_date_id ON transactions(date, id);
CREATE INDEX IF NOT EXISTS idx_transactions_client ON transactions(client_id);
";

const FILTER_CLAUSE: &str = "(?1 IS NULL OR client_id = ?1)
    AND (?2 IS NULL OR date >= ?2)
    AND (?3 IS NULL OR date <= ?3)";

/// SQLite-backed store
///
/// Clients are unique on `document_id`, so concurrent upserts of the same id
/// collapse into one row. Each batch is written inside a single SQL
/// transaction. Amounts are kept as integer minor units.
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Open (or create) a database file, in WAL mode
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageFault> {
        let conn = Connection::open(path.as_ref())?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.as_ref().display(), journal_mode = %mode, "opened sqlite store");
        Self::init(conn)
    }

    /// Private database that disappears with the gateway
    pub fn open_in_memory() -> Result<Self, StorageFault> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageFault> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageFault> {
        self.conn.lock().map_err(|_| StorageFault::Poisoned)
    }
}

fn to_minor_units(amount: Decimal) -> Result<i64, StorageFault> {
    let mut scaled = amount;
    scaled.rescale(AMOUNT_SCALE);
    if scaled != amount || scaled.scale() != AMOUNT_SCALE {
        return Err(StorageFault::AmountOutOfRange(amount));
    }
    scaled
        .mantissa()
        .to_i64()
        .ok_or(StorageFault::AmountOutOfRange(amount))
}

fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, AMOUNT_SCALE)
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_client((id, document, name): (i64, String, String)) -> Result<Client, StorageFault> {
    let document_id = DocumentId::normalize(&document).ok_or_else(|| {
        StorageFault::CorruptRow(format!("client {} has document '{}'", id, document))
    })?;
    Ok(Client::new(ClientRef(id), document_id, name))
}

impl PersistenceGateway for SqliteGateway {
    fn upsert_client(
        &self,
        document_id: &DocumentId,
        name: &str,
    ) -> Result<ClientRef, StorageFault> {
        let conn = self.lock()?;
        let id: i64 = conn.query_row(
            "INSERT INTO clients (document_id, name) VALUES (?1, ?2)
             ON CONFLICT(document_id) DO UPDATE SET name = excluded.name
             RETURNING id",
            params![document_id.as_str(), name],
            |row| row.get(0),
        )?;
        Ok(ClientRef(id))
    }

    fn insert_transactions(
        &self,
        batch: &[NewTransaction],
    ) -> Result<Vec<TransactionId>, StorageFault> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(batch.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO transactions (client_id, date, amount_cents) VALUES (?1, ?2, ?3)",
            )?;
            for new in batch {
                stmt.execute(params![new.client.0, new.date, to_minor_units(new.amount)?])?;
                ids.push(TransactionId(tx.last_insert_rowid()));
            }
        }

        // Dropping `tx` on any earlier error rolls the whole batch back
        tx.commit()?;
        Ok(ids)
    }

    fn find_client(&self, document_id: &DocumentId) -> Result<Option<Client>, StorageFault> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, document_id, name FROM clients WHERE document_id = ?1",
                params![document_id.as_str()],
                client_from_row,
            )
            .optional()?;
        row.map(into_client).transpose()
    }

    fn clients_by_refs(&self, refs: &[ClientRef]) -> Result<Vec<Client>, StorageFault> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare_cached("SELECT id, document_id, name FROM clients WHERE id = ?1")?;

        let mut clients = Vec::with_capacity(refs.len());
        for id in refs {
            if let Some(row) = stmt.query_row(params![id.0], client_from_row).optional()? {
                clients.push(into_client(row)?);
            }
        }
        Ok(clients)
    }

    fn query_transactions(
        &self,
        filter: &TransactionFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Transaction>, u64), StorageFault> {
        let conn = self.lock()?;
        let client = filter.client.map(|c| c.0);

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM transactions WHERE {}", FILTER_CLAUSE),
            params![client, filter.start_date, filter.end_date],
            |row| row.get(0),
        )?;

        let offset = i64::try_from(page_offset(page, page_size)).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&format!(
            "SELECT id, client_id, date, amount_cents FROM transactions
             WHERE {}
             ORDER BY date ASC, id ASC
             LIMIT ?4 OFFSET ?5",
            FILTER_CLAUSE
        ))?;

        let rows = stmt
            .query_map(
                params![client, filter.start_date, filter.end_date, page_size, offset],
                |row| {
                    Ok(Transaction {
                        id: TransactionId(row.get(0)?),
                        client: ClientRef(row.get(1)?),
                        date: row.get(2)?,
                        amount: from_minor_units(row.get(3)?),
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total.max(0) as u64))
    }
}
