//! In-memory history store.
//!
//! Keeps each user's generated briefs in process memory. Suitable for the
//! CLI and for tests; a durable store plugs in through the same
//! [`HistoryStore`] port.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::HistoryError;
use crate::ports::HistoryStore;
use crate::schemas::FinalBrief;

#[derive(Default)]
pub struct MemoryHistoryStore {
    briefs: RwLock<HashMap<String, Vec<FinalBrief>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished brief for a user.
    pub async fn push(&self, user_id: &str, brief: FinalBrief) {
        let mut briefs = self.briefs.write().await;
        briefs.entry(user_id.to_string()).or_default().push(brief);
    }

    pub async fn len(&self, user_id: &str) -> usize {
        self.briefs.read().await.get(user_id).map_or(0, |v| v.len())
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    /// Most recent `limit` briefs, oldest first.
    async fn load_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<FinalBrief>, HistoryError> {
        let briefs = self.briefs.read().await;
        let history = briefs.get(user_id).map(|v| v.as_slice()).unwrap_or(&[]);
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }
}
