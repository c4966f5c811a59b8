//! Logical record store contract and the in-memory backend

use super::policy::AccessPolicy;
use super::record::MemoryRecord;
use crate::error::SovraResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Persistence boundary for memory records and access policies
///
/// Backends only store and fetch; validation, access control and ranking
/// happen in [`SemanticMemoryStore`](super::SemanticMemoryStore).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a record
    async fn put_record(&self, record: MemoryRecord) -> SovraResult<()>;

    /// Fetch a record
    async fn get_record(&self, id: &str) -> SovraResult<Option<MemoryRecord>>;

    /// Remove a record, returning whether it existed
    async fn delete_record(&self, id: &str) -> SovraResult<bool>;

    /// All records
    async fn list_records(&self) -> SovraResult<Vec<MemoryRecord>>;

    /// Bump the read counters of a record; unknown ids are ignored
    async fn record_access(&self, id: &str, at: DateTime<Utc>) -> SovraResult<()>;

    /// Insert or replace a policy
    async fn put_policy(&self, policy: AccessPolicy) -> SovraResult<()>;

    /// Fetch a policy
    async fn get_policy(&self, id: &str) -> SovraResult<Option<AccessPolicy>>;

    /// Remove a policy, returning whether it existed
    async fn delete_policy(&self, id: &str) -> SovraResult<bool>;

    /// All policies
    async fn list_policies(&self) -> SovraResult<Vec<AccessPolicy>>;
}

/// Process-local backend
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, MemoryRecord>>,
    policies: RwLock<HashMap<String, AccessPolicy>>,
}

impl InMemoryRecordStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put_record(&self, record: MemoryRecord) -> SovraResult<()> {
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_record(&self, id: &str) -> SovraResult<Option<MemoryRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn delete_record(&self, id: &str) -> SovraResult<bool> {
        Ok(self.records.write().remove(id).is_some())
    }

    async fn list_records(&self) -> SovraResult<Vec<MemoryRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    async fn record_access(&self, id: &str, at: DateTime<Utc>) -> SovraResult<()> {
        if let Some(record) = self.records.write().get_mut(id) {
            record.access_count += 1;
            record.last_accessed = at;
        }
        Ok(())
    }

    async fn put_policy(&self, policy: AccessPolicy) -> SovraResult<()> {
        self.policies.write().insert(policy.id.clone(), policy);
        Ok(())
    }

    async fn get_policy(&self, id: &str) -> SovraResult<Option<AccessPolicy>> {
        Ok(self.policies.read().get(id).cloned())
    }

    async fn delete_policy(&self, id: &str) -> SovraResult<bool> {
        Ok(self.policies.write().remove(id).is_some())
    }

    async fn list_policies(&self) -> SovraResult<Vec<AccessPolicy>> {
        Ok(self.policies.read().values().cloned().collect())
    }
}
