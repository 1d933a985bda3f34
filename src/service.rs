use std::sync::Arc;

use futures::future::join_all;

use crate::error::{EngineError, Result};
use crate::ingestor::{IngestReport, Ingestor};
use crate::persistence::PersistenceGateway;
use crate::query::{QueryEngine, QueryRequest, TransactionPage, DEFAULT_PAGE_SIZE};

/// Shareable async front for ingestion and queries
///
/// Ingestion and queries are stateless request handlers over one shared
/// gateway. The synchronous core runs on tokio's blocking pool so an upload
/// never stalls the runtime; the gateway provides batch atomicity and
/// serializes conflicting writes.
///
/// # Example
///
/// ```no_run
/// use statement_ingest::persistence::InMemoryGateway;
/// use statement_ingest::query::QueryRequest;
/// use statement_ingest::service::StatementService;
///
/// #[tokio::main]
/// async fn main() {
///     let service = StatementService::new(InMemoryGateway::new());
///
///     let report = service
///         .ingest(b"Ana;11144477735;2024-01-10;150.00\n".to_vec())
///         .await
///         .unwrap();
///     assert_eq!(report.inserted_count, 1);
///
///     let page = service.query(QueryRequest::default()).await.unwrap();
///     assert_eq!(page.total_pages, 1);
/// }
/// ```
pub struct StatementService<G: PersistenceGateway + 'static> {
    gateway: Arc<G>,
    page_size: u32,
}

impl<G: PersistenceGateway + 'static> StatementService<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_page_size(gateway, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(gateway: G, page_size: u32) -> Self {
        Self {
            gateway: Arc::new(gateway),
            page_size: page_size.max(1),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Ingest one statement file
    pub async fn ingest(&self, bytes: Vec<u8>) -> Result<IngestReport> {
        let gateway = Arc::clone(&self.gateway);
        tokio::task::spawn_blocking(move || Ingestor::new(gateway.as_ref()).ingest(&bytes))
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?
    }

    /// Ingest unrelated files concurrently
    ///
    /// Each file is its own batch: one failing upload does not affect the
    /// others. Reports come back in input order.
    pub async fn ingest_many(&self, files: Vec<Vec<u8>>) -> Vec<Result<IngestReport>> {
        let uploads = files.into_iter().map(|bytes| self.ingest(bytes));
        join_all(uploads).await
    }

    pub async fn query(&self, request: QueryRequest) -> Result<TransactionPage> {
        let gateway = Arc::clone(&self.gateway);
        let page_size = self.page_size;
        tokio::task::spawn_blocking(move || {
            QueryEngine::with_page_size(gateway.as_ref(), page_size).query(request)
        })
        .await
        .map_err(|e| EngineError::TaskFailed(e.to_string()))?
    }

    /// Clone handle for sharing across tasks
    ///
    /// Cheap: only the `Arc` around the gateway is cloned.
    pub fn clone_handle(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            page_size: self.page_size,
        }
    }
}
