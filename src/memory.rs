//! Optional vector-memory capability.
//!
//! When no backing store is configured the pipeline proceeds with
//! empty memory; retrieval failures never propagate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored interaction used to style future drafts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub sender: String,
    pub subject: String,
    pub reply_summary: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait VectorMemory: Send + Sync {
    /// Fetch up to `k` prior examples relevant to the query text.
    /// Returns an empty list when the store is unavailable.
    async fn retrieve(&self, query: &str, k: usize) -> Vec<MemoryRecord>;

    /// Persist a record. Failures are swallowed by implementations.
    async fn write(&self, record: MemoryRecord);
}

/// The always-available fallback — remembers nothing.
pub struct NoopMemory;

#[async_trait]
impl VectorMemory for NoopMemory {
    async fn retrieve(&self, _query: &str, _k: usize) -> Vec<MemoryRecord> {
        Vec::new()
    }

    async fn write(&self, _record: MemoryRecord) {}
}
