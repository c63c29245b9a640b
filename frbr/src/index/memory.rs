use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::FrbrResult;
use crate::index::{SearchIndex, WorkDocument};

/// In-memory search index for testing and development purposes.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    documents: Arc<Mutex<HashMap<Uuid, WorkDocument>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the indexed document for a work, if present.
    pub async fn get_document(&self, uuid: Uuid) -> Option<WorkDocument> {
        let documents = self.documents.lock().await;
        documents.get(&uuid).cloned()
    }

    /// Number of indexed documents.
    pub async fn document_count(&self) -> usize {
        let documents = self.documents.lock().await;
        documents.len()
    }
}

impl SearchIndex for MemoryIndex {
    async fn index_work(&self, document: &WorkDocument) -> FrbrResult<()> {
        let mut documents = self.documents.lock().await;
        documents.insert(document.uuid, document.clone());

        Ok(())
    }

    async fn delete_works(&self, uuids: &[Uuid]) -> FrbrResult<()> {
        let mut documents = self.documents.lock().await;
        for uuid in uuids {
            documents.remove(uuid);
        }

        Ok(())
    }
}
