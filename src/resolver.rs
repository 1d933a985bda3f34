use std::collections::HashMap;

use tracing::debug;

use crate::error::StorageFault;
use crate::models::{ClientRef, DocumentId};
use crate::persistence::PersistenceGateway;

/// Maps `(name, document id)` pairs of one upload to client references
///
/// The first sighting of a document id looks the client up in the store and
/// only creates it when it is missing; later sightings in the same batch are
/// served from memory. A line that spells the name differently from the
/// stored one queues a correction instead of writing it, so a batch that
/// fails to commit leaves existing names alone. The caller applies the queued
/// corrections with [`ClientResolver::apply_name_corrections`] once the batch
/// is stored. The reference never changes.
///
/// One resolver lives for exactly one ingestion call.
pub struct ClientResolver<'g, G: PersistenceGateway + ?Sized> {
    gateway: &'g G,
    resolved: HashMap<DocumentId, (ClientRef, String)>,
    pending_names: HashMap<DocumentId, String>,
}

impl<'g, G: PersistenceGateway + ?Sized> ClientResolver<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self {
            gateway,
            resolved: HashMap::new(),
            pending_names: HashMap::new(),
        }
    }

    pub fn resolve(
        &mut self,
        name: &str,
        document_id: &DocumentId,
    ) -> Result<ClientRef, StorageFault> {
        if let Some((client, known_name)) = self.resolved.get_mut(document_id) {
            if known_name.as_str() != name {
                debug!(
                    document_id = %document_id,
                    old = %known_name,
                    new = %name,
                    "client name correction queued"
                );
                *known_name = name.to_string();
                self.pending_names
                    .insert(document_id.clone(), name.to_string());
            }
            return Ok(*client);
        }

        let client = match self.gateway.find_client(document_id)? {
            Some(stored) => {
                if stored.name != name {
                    self.pending_names
                        .insert(document_id.clone(), name.to_string());
                }
                stored.id
            }
            None => self.gateway.upsert_client(document_id, name)?,
        };

        self.resolved
            .insert(document_id.clone(), (client, name.to_string()));
        Ok(client)
    }

    /// Write the queued name corrections; the latest spelling of each client wins.
    ///
    /// Returns how many clients were renamed.
    pub fn apply_name_corrections(&mut self) -> Result<usize, StorageFault> {
        let mut applied = 0;
        for (document_id, name) in self.pending_names.drain() {
            self.gateway.upsert_client(&document_id, &name)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Name corrections waiting for the batch to commit
    pub fn pending_corrections(&self) -> usize {
        self.pending_names.len()
    }

    /// Distinct clients seen so far
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}
