use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StorageFault, ValidationError};
use crate::models::{ClientRef, DocumentId, TransactionId};
use crate::persistence::{PersistenceGateway, TransactionFilter};

/// Transactions per page unless the engine is built with another size
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Raw query parameters as a caller sends them
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub document_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
}

/// Validated query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    pub document_id: Option<DocumentId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// 1-based
    pub page: u32,
}

impl TryFrom<QueryRequest> for QueryFilter {
    type Error = ValidationError;

    fn try_from(request: QueryRequest) -> std::result::Result<Self, Self::Error> {
        if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
            if start > end {
                return Err(ValidationError::InvalidDateRange { start, end });
            }
        }

        let page = request.page.unwrap_or(1);
        if page == 0 {
            return Err(ValidationError::InvalidPage(page));
        }

        // A blank form field means "no filter"
        let document_id = match request.document_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                DocumentId::normalize(raw)
                    .ok_or_else(|| ValidationError::InvalidDocumentId(raw.to_string()))?,
            ),
        };

        Ok(Self {
            document_id,
            start_date: request.start_date,
            end_date: request.end_date,
            page,
        })
    }
}

/// A transaction joined with its client, as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: TransactionId,
    pub client_name: String,
    pub document_id: DocumentId,
    pub date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub transactions: Vec<TransactionView>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    /// Never less than 1, even with no matches
    pub total_pages: u64,
}

/// `max(1, ceil(count / page_size))`
pub fn total_pages(count: u64, page_size: u32) -> u64 {
    count.div_ceil(u64::from(page_size.max(1))).max(1)
}

/// Filtered, paginated reads over stored transactions
///
/// Results are ordered by date, then transaction id, so pages never overlap
/// or skip rows between calls as long as nothing is written in between.
pub struct QueryEngine<'g, G: PersistenceGateway + ?Sized> {
    gateway: &'g G,
    page_size: u32,
}

impl<'g, G: PersistenceGateway + ?Sized> QueryEngine<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self::with_page_size(gateway, DEFAULT_PAGE_SIZE)
    }

    /// Engine with a custom page size; zero is raised to 1
    pub fn with_page_size(gateway: &'g G, page_size: u32) -> Self {
        Self {
            gateway,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn query(&self, request: QueryRequest) -> Result<TransactionPage> {
        let filter = QueryFilter::try_from(request)?;
        self.query_filter(&filter)
    }

    pub fn query_filter(&self, filter: &QueryFilter) -> Result<TransactionPage> {
        let client = match &filter.document_id {
            Some(document_id) => match self.gateway.find_client(document_id)? {
                Some(client) => Some(client.id),
                None => {
                    debug!(document_id = %document_id, "no client with this document id");
                    return Ok(self.empty_page(filter.page));
                }
            },
            None => None,
        };

        let storage_filter = TransactionFilter {
            client,
            start_date: filter.start_date,
            end_date: filter.end_date,
        };

        let (rows, total_count) =
            self.gateway
                .query_transactions(&storage_filter, filter.page, self.page_size)?;

        let refs: Vec<ClientRef> = rows
            .iter()
            .map(|tx| tx.client)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let clients: HashMap<ClientRef, _> = self
            .gateway
            .clients_by_refs(&refs)?
            .into_iter()
            .map(|client| (client.id, client))
            .collect();

        let mut transactions = Vec::with_capacity(rows.len());
        for tx in rows {
            let client = clients
                .get(&tx.client)
                .ok_or(StorageFault::UnknownClient(tx.client))?;
            transactions.push(TransactionView {
                id: tx.id,
                client_name: client.name.clone(),
                document_id: client.document_id.clone(),
                date: tx.date,
                amount: tx.amount,
            });
        }

        debug!(
            page = filter.page,
            returned = transactions.len(),
            total = total_count,
            "transactions queried"
        );

        Ok(TransactionPage {
            transactions,
            page: filter.page,
            page_size: self.page_size,
            total_count,
            total_pages: total_pages(total_count, self.page_size),
        })
    }

    fn empty_page(&self, page: u32) -> TransactionPage {
        TransactionPage {
            transactions: Vec::new(),
            page,
            page_size: self.page_size,
            total_count: 0,
            total_pages: 1,
        }
    }
}
