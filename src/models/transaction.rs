use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::client::ClientRef;

/// Store-assigned transaction identifier, monotonic in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TransactionId(pub i64);

/// Transaction as submitted by the ingestor, before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub client: ClientRef,
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// Persisted transaction. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub client: ClientRef,
    pub date: NaiveDate,
    pub amount: Decimal,
}

impl Transaction {
    pub fn from_new(id: TransactionId, tx: &NewTransaction) -> Self {
        Self {
            id,
            client: tx.client,
            date: tx.date,
            amount: tx.amount,
        }
    }
}
