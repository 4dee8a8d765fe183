use std::collections::HashMap;

use async_trait::async_trait;
use chatrs_core::{ChatRecord, ChatStore, ChatSummary};
use tokio::sync::RwLock;

/// Process-local store. Records are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    records: RwLock<HashMap<String, ChatRecord>>,
}

impl MemoryChatStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn save(&self, record: &ChatRecord) -> anyhow::Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<ChatRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self, user_id: &str) -> anyhow::Result<Vec<ChatSummary>> {
        let mut summaries: Vec<ChatSummary> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .map(ChatRecord::summary)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn remove(&self, id: &str) -> anyhow::Result<()> {
        self.records.write().await.remove(id);
        Ok(())
    }
}
