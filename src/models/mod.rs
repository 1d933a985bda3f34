pub mod client;
pub mod document;
pub mod transaction;

pub use client::{Client, ClientRef};
pub use document::{DocumentId, DocumentKind};
pub use transaction::{NewTransaction, Transaction, TransactionId};
