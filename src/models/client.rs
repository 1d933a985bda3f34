use serde::Serialize;

use super::document::DocumentId;

/// Store-assigned client identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClientRef(pub i64);

impl std::fmt::Display for ClientRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Client entity, identified by its document id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: ClientRef,
    pub document_id: DocumentId,
    pub name: String,
}

impl Client {
    pub fn new(id: ClientRef, document_id: DocumentId, name: impl Into<String>) -> Self {
        Self {
            id,
            document_id,
            name: name.into(),
        }
    }
}
