use tracing::{debug, error, info, warn};

use crate::sink::{RecordSink, SinkError};
use crate::types::ZoneRecord;

/// Insert phase for one file's batch. The only transition is
/// `Bulk -> PerRecord`, forced by a uniqueness conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    Bulk,
    PerRecord,
}

/// Persistence counts for one file's batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Persists one file's records, maximizing successful inserts.
///
/// Phase `Bulk` tries a single all-or-nothing insert. A duplicate address
/// anywhere in the batch forces phase `PerRecord`, where every record is
/// inserted on its own: duplicates are counted and skipped, other failures
/// are logged, and neither affects sibling records. Re-running over an
/// unchanged file therefore inserts nothing twice; every address comes
/// back as a duplicate.
pub async fn load_batch(sink: &dyn RecordSink, records: &[ZoneRecord]) -> LoadStats {
    let mut stats = LoadStats::default();
    if records.is_empty() {
        return stats;
    }

    let mut phase = LoadPhase::Bulk;
    loop {
        match phase {
            LoadPhase::Bulk => match sink.bulk_insert(records).await {
                Ok(()) => {
                    stats.loaded = records.len();
                    return stats;
                }
                Err(SinkError::Duplicate(address)) => {
                    info!(
                        "Bulk insert hit duplicate address '{}'; retrying {} records individually",
                        address,
                        records.len()
                    );
                    phase = LoadPhase::PerRecord;
                }
                Err(SinkError::Other(e)) => {
                    error!("Bulk insert failed: {e}");
                    stats.failed = records.len();
                    return stats;
                }
            },
            LoadPhase::PerRecord => {
                for record in records {
                    match sink.insert_one(record).await {
                        Ok(()) => stats.loaded += 1,
                        Err(SinkError::Duplicate(address)) => {
                            debug!("Duplicate address skipped: {address}");
                            stats.duplicates += 1;
                        }
                        Err(SinkError::Other(e)) => {
                            warn!("Failed to insert record for '{}': {e}", record.address);
                            stats.failed += 1;
                        }
                    }
                }
                return stats;
            }
        }
    }
}
