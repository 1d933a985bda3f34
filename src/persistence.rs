use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;

use crate::error::StorageFault;
use crate::models::{Client, ClientRef, DocumentId, NewTransaction, Transaction, TransactionId};

/// Storage-level transaction filter. All present constraints must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub client: Option<ClientRef>,
    /// Inclusive lower bound
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound
    pub end_date: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.client.map_or(true, |client| tx.client == client)
            && self.start_date.map_or(true, |start| tx.date >= start)
            && self.end_date.map_or(true, |end| tx.date <= end)
    }
}

/// Durable store behind the ingestion pipeline and the query engine
///
/// Implementations must guarantee:
///
/// - `upsert_client` is idempotent per document id: a second call with the
///   same id updates the name and returns the same `ClientRef`, even when two
///   callers race on the same id.
/// - `insert_transactions` is all-or-nothing. On error no row of the batch is
///   visible, and two concurrent batches never interleave partially.
/// - `query_transactions` returns rows ordered by date, then id, both ascending,
///   together with the total number of rows matching the filter.
pub trait PersistenceGateway: Send + Sync {
    /// Create the client or correct its name
    fn upsert_client(
        &self,
        document_id: &DocumentId,
        name: &str,
    ) -> Result<ClientRef, StorageFault>;

    /// Append a batch atomically, returning the assigned ids in batch order
    fn insert_transactions(
        &self,
        batch: &[NewTransaction],
    ) -> Result<Vec<TransactionId>, StorageFault>;

    fn find_client(&self, document_id: &DocumentId) -> Result<Option<Client>, StorageFault>;

    /// Clients for the given refs. Unknown refs are skipped.
    fn clients_by_refs(&self, refs: &[ClientRef]) -> Result<Vec<Client>, StorageFault>;

    /// One page of matching transactions plus the total match count
    ///
    /// `page` is 1-based. A page past the end yields an empty row set.
    fn query_transactions(
        &self,
        filter: &TransactionFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Transaction>, u64), StorageFault>;
}

/// Offset of the first row of a 1-based page
pub(crate) fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(page_size)
}

#[derive(Default)]
struct Tables {
    /// Indexed by `ClientRef - 1`
    clients: Vec<Client>,
    by_document: HashMap<DocumentId, ClientRef>,
    /// Insertion order, which is also id order
    transactions: Vec<Transaction>,
}

/// In-process store
///
/// A single `RwLock` over all tables gives batch atomicity and serializes
/// concurrent upserts of the same document id. Queries take the read lock and
/// run concurrently.
///
/// # Example
///
/// ```
/// use statement_ingest::models::DocumentId;
/// use statement_ingest::persistence::{InMemoryGateway, PersistenceGateway};
///
/// let store = InMemoryGateway::new();
/// let doc = DocumentId::normalize("111.444.777-35").unwrap();
///
/// let first = store.upsert_client(&doc, "Ana").unwrap();
/// let again = store.upsert_client(&doc, "Ana Souza").unwrap();
///
/// assert_eq!(first, again);
/// assert_eq!(store.client_count(), 1);
/// ```
pub struct InMemoryGateway {
    tables: RwLock<Tables>,
    /// Simulated write fault, for exercising the all-or-nothing path
    fail_writes: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `insert_transactions` fail with `StorageFault::Unavailable`
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn client_count(&self) -> usize {
        self.read().map(|t| t.clients.len()).unwrap_or(0)
    }

    pub fn transaction_count(&self) -> usize {
        self.read().map(|t| t.transactions.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageFault> {
        self.tables.read().map_err(|_| StorageFault::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageFault> {
        self.tables.write().map_err(|_| StorageFault::Poisoned)
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn upsert_client(
        &self,
        document_id: &DocumentId,
        name: &str,
    ) -> Result<ClientRef, StorageFault> {
        let mut tables = self.write()?;

        if let Some(&id) = tables.by_document.get(document_id) {
            let index = (id.0 - 1) as usize;
            tables.clients[index].name = name.to_string();
            return Ok(id);
        }

        let id = ClientRef(tables.clients.len() as i64 + 1);
        tables
            .clients
            .push(Client::new(id, document_id.clone(), name));
        tables.by_document.insert(document_id.clone(), id);
        Ok(id)
    }

    fn insert_transactions(
        &self,
        batch: &[NewTransaction],
    ) -> Result<Vec<TransactionId>, StorageFault> {
        let mut tables = self.write()?;

        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StorageFault::Unavailable(
                "writes disabled on in-memory store".to_string(),
            ));
        }

        // Validate the whole batch before writing any of it
        let client_count = tables.clients.len() as i64;
        if let Some(bad) = batch
            .iter()
            .find(|tx| tx.client.0 < 1 || tx.client.0 > client_count)
        {
            return Err(StorageFault::UnknownClient(bad.client));
        }

        let first_id = tables.transactions.len() as i64 + 1;
        let ids: Vec<TransactionId> = (0..batch.len() as i64)
            .map(|offset| TransactionId(first_id + offset))
            .collect();

        tables.transactions.extend(
            ids.iter()
                .zip(batch)
                .map(|(&id, tx)| Transaction::from_new(id, tx)),
        );

        Ok(ids)
    }

    fn find_client(&self, document_id: &DocumentId) -> Result<Option<Client>, StorageFault> {
        let tables = self.read()?;
        Ok(tables
            .by_document
            .get(document_id)
            .map(|id| tables.clients[(id.0 - 1) as usize].clone()))
    }

    fn clients_by_refs(&self, refs: &[ClientRef]) -> Result<Vec<Client>, StorageFault> {
        let tables = self.read()?;
        Ok(refs
            .iter()
            .filter(|id| id.0 >= 1)
            .filter_map(|id| tables.clients.get((id.0 - 1) as usize).cloned())
            .collect())
    }

    fn query_transactions(
        &self,
        filter: &TransactionFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Transaction>, u64), StorageFault> {
        let tables = self.read()?;

        let mut matching: Vec<&Transaction> = tables
            .transactions
            .iter()
            .filter(|tx| filter.matches(tx))
            .collect();
        matching.sort_by_key(|tx| (tx.date, tx.id));

        let total = matching.len() as u64;
        let offset = usize::try_from(page_offset(page, page_size)).unwrap_or(usize::MAX);
        let rows = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();

        Ok((rows, total))
    }
}
