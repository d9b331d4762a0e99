use crate::error::IngestError;
use crate::types::ZoneRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Persistence outcome distinguishing the expected duplicate case from
/// genuine failures.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Duplicate address: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Other(#[from] IngestError),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Sink trait for persisting normalized zone records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Inserts the whole batch or nothing: a uniqueness conflict rolls the
    /// batch back and surfaces as `SinkError::Duplicate`.
    async fn bulk_insert(&self, records: &[ZoneRecord]) -> SinkResult<()>;

    /// Inserts one record; an existing address is reported as a duplicate,
    /// never overwritten.
    async fn insert_one(&self, record: &ZoneRecord) -> SinkResult<()>;
}

/// In-memory sink implementation for development/testing
pub struct InMemorySink {
    zones: Arc<Mutex<HashMap<String, ZoneRecord>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self {
            zones: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.zones.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.lock().unwrap().is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.zones.lock().unwrap().contains_key(address)
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSink for InMemorySink {
    async fn bulk_insert(&self, records: &[ZoneRecord]) -> SinkResult<()> {
        let mut zones = self.zones.lock().unwrap();

        // Check the whole batch before touching the map so a conflict
        // leaves the sink exactly as it was.
        let mut seen = std::collections::HashSet::new();
        for record in records {
            if zones.contains_key(&record.address) || !seen.insert(record.address.as_str()) {
                return Err(SinkError::Duplicate(record.address.clone()));
            }
        }

        for record in records {
            zones.insert(record.address.clone(), record.clone());
        }
        debug!("Bulk-inserted {} records", records.len());
        Ok(())
    }

    async fn insert_one(&self, record: &ZoneRecord) -> SinkResult<()> {
        let mut zones = self.zones.lock().unwrap();
        if zones.contains_key(&record.address) {
            return Err(SinkError::Duplicate(record.address.clone()));
        }
        zones.insert(record.address.clone(), record.clone());
        debug!("Inserted record for address {}", record.address);
        Ok(())
    }
}
