//! In-memory store for tests and dry runs

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{PendingSource, RecordSink};
use crate::app::endpoint::LookupVariant;
use crate::app::models::{Field, FieldRecord};
use crate::errors::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    pending: Vec<String>,
    rows: BTreeMap<String, BTreeMap<Field, String>>,
    writes: Vec<FieldRecord>,
    failing: HashSet<String>,
}

/// Shared in-memory table; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose pending set is the given identifiers, in order
    pub fn with_pending<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = MemoryState {
            pending: identifiers.into_iter().map(Into::into).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Make every write for an identifier fail
    pub async fn fail_writes_for(&self, identifier: &str) {
        self.state.lock().await.failing.insert(identifier.to_string());
    }

    /// Every successful write, in order
    pub async fn written(&self) -> Vec<FieldRecord> {
        self.state.lock().await.writes.clone()
    }

    /// Current value of a field for an identifier
    pub async fn value(&self, identifier: &str, field: Field) -> Option<String> {
        self.state
            .lock()
            .await
            .rows
            .get(identifier)
            .and_then(|row| row.get(&field).cloned())
    }
}

impl PendingSource for MemoryStore {
    async fn pending(&self, variant: LookupVariant) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        let wanted = variant.persisted_fields();
        Ok(state
            .pending
            .iter()
            .filter(|id| {
                let row = state.rows.get(*id);
                wanted.iter().any(|field| {
                    row.and_then(|r| r.get(field))
                        .map(|v| v.trim().is_empty())
                        .unwrap_or(true)
                })
            })
            .cloned()
            .collect())
    }
}

impl RecordSink for MemoryStore {
    async fn update(&self, record: &FieldRecord) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let key = record.identifier.as_str().to_string();
        if state.failing.contains(&key) {
            return Err(StoreError::Write {
                identifier: key,
                reason: "simulated write failure".to_string(),
            });
        }

        let row = state.rows.entry(key).or_default();
        for (field, value) in record.filled() {
            row.insert(field, value.to_string());
        }
        state.writes.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Identifier;

    #[tokio::test]
    async fn test_pending_excludes_completed_rows() {
        let store = MemoryStore::with_pending(["11111111", "22222222"]);
        let record =
            FieldRecord::new(Identifier::parse("11111111").unwrap()).with(Field::BirthDate, "01/02/1980");
        store.update(&record).await.unwrap();

        assert_eq!(
            store.pending(LookupVariant::BirthDate).await.unwrap(),
            vec!["22222222".to_string()]
        );
        assert_eq!(store.pending(LookupVariant::FullName).await.unwrap().len(), 2);
    }

    /// Writing the same record twice leaves the same state
    #[tokio::test]
    async fn test_update_is_idempotent() {
        let store = MemoryStore::new();
        let record = FieldRecord::new(Identifier::parse("11111111").unwrap())
            .with(Field::GivenNames, "ANA")
            .with(Field::MaternalSurname, "");

        store.update(&record).await.unwrap();
        store.update(&record).await.unwrap();

        assert_eq!(
            store.value("11111111", Field::GivenNames).await.as_deref(),
            Some("ANA")
        );
        assert_eq!(store.value("11111111", Field::MaternalSurname).await, None);
        assert_eq!(store.written().await.len(), 2);
    }
}
