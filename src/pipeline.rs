use encoding_rs::{EUC_KR, UTF_8};
use metrics::counter;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestError, Result};
use crate::geocode::Geocoder;
use crate::loader::load_batch;
use crate::mapping::HeaderMapping;
use crate::normalize::{normalize_row, RejectReason, RowOutcome};
use crate::sink::RecordSink;
use crate::types::ZoneRecord;

/// Outcome counts for one CSV file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: String,
    pub loaded: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub failed: usize,
    /// File-fatal reason; when set, no records were attempted.
    pub skipped: Option<String>,
}

impl FileOutcome {
    fn skipped(file: String, reason: String) -> Self {
        Self {
            file,
            loaded: 0,
            duplicates: 0,
            rejected: 0,
            failed: 0,
            skipped: Some(reason),
        }
    }
}

/// Aggregated result of one complete pipeline run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn total_loaded(&self) -> usize {
        self.outcomes.iter().map(|o| o.loaded).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.outcomes.iter().map(|o| o.duplicates).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.outcomes.iter().map(|o| o.rejected).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.outcomes.iter().map(|o| o.failed).sum()
    }

    pub fn skipped_files(&self) -> usize {
        self.outcomes.iter().filter(|o| o.skipped.is_some()).count()
    }
}

/// Drives a directory of CSV files through mapping, normalization,
/// enrichment, and loading, one file and one row at a time.
///
/// The summary accumulator is owned here; no component keeps state across
/// files and no file-level failure aborts the run.
pub struct IngestPipeline {
    sink: Arc<dyn RecordSink>,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl IngestPipeline {
    pub fn new(sink: Arc<dyn RecordSink>, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self { sink, geocoder }
    }

    pub async fn run(&self, directory: &Path) -> Result<RunSummary> {
        let files = discover_csv_files(directory)?;
        if files.is_empty() {
            return Err(IngestError::NoInput(directory.display().to_string()));
        }

        info!("Found {} CSV files in {}", files.len(), directory.display());
        counter!("nugul_ingest_runs_total").increment(1);

        let mut summary = RunSummary::default();
        for file in &files {
            summary.outcomes.push(self.process_file(file).await);
        }
        Ok(summary)
    }

    #[instrument(skip(self), fields(file = %path.display()))]
    async fn process_file(&self, path: &Path) -> FileOutcome {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!("Processing {file_name}");
        counter!("nugul_files_total").increment(1);

        let text = match read_csv_text(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping file: {e}");
                counter!("nugul_files_skipped_total").increment(1);
                return FileOutcome::skipped(file_name, e.to_string());
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(e) => {
                warn!("Skipping file, unreadable header row: {e}");
                counter!("nugul_files_skipped_total").increment(1);
                return FileOutcome::skipped(file_name, format!("unreadable header row: {e}"));
            }
        };

        let mapping = HeaderMapping::resolve(headers.iter());
        if !mapping.has_address() {
            warn!("Skipping file, no header maps to an address column");
            counter!("nugul_files_skipped_total").increment(1);
            return FileOutcome::skipped(file_name, "no address-mappable column".to_string());
        }

        let mut rejected = 0;
        let mut batch = Vec::new();

        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    debug!("Malformed row: {e}");
                    rejected += 1;
                    continue;
                }
            };

            match normalize_row(&mapping, &row) {
                RowOutcome::Rejected(reason) => {
                    debug!("Row rejected: {reason}");
                    rejected += 1;
                }
                RowOutcome::Candidate(mut record) => {
                    if !record.has_valid_coordinates() {
                        self.enrich(&mut record).await;
                    }
                    if record.has_valid_coordinates() {
                        batch.push(record);
                    } else {
                        debug!(
                            "Row rejected: {} ('{}')",
                            RejectReason::MissingCoordinates,
                            record.address
                        );
                        rejected += 1;
                    }
                }
            }
        }

        let stats = load_batch(self.sink.as_ref(), &batch).await;
        counter!("nugul_records_loaded_total").increment(stats.loaded as u64);
        counter!("nugul_records_duplicate_total").increment(stats.duplicates as u64);
        counter!("nugul_rows_rejected_total").increment(rejected as u64);

        info!(
            "Finished {}: {} loaded, {} duplicates, {} rejected, {} failed",
            file_name, stats.loaded, stats.duplicates, rejected, stats.failed
        );

        FileOutcome {
            file: file_name,
            loaded: stats.loaded,
            duplicates: stats.duplicates,
            rejected,
            failed: stats.failed,
            skipped: None,
        }
    }

    /// Exactly one geocode attempt per row; any failure leaves the
    /// coordinates unset and the row falls through to rejection.
    async fn enrich(&self, record: &mut ZoneRecord) {
        let Some(geocoder) = &self.geocoder else {
            return;
        };

        match geocoder.geocode(&record.address).await {
            Ok(Some(coordinates)) => {
                debug!("Geocoded '{}'", record.address);
                record.latitude = Some(coordinates.latitude);
                record.longitude = Some(coordinates.longitude);
            }
            Ok(None) => {
                debug!("Geocoder found nothing for '{}'", record.address);
            }
            Err(e) => {
                warn!("Geocoding failed for '{}': {e}", record.address);
            }
        }
    }
}

fn discover_csv_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    // Deterministic processing order.
    files.sort();
    Ok(files)
}

/// Agencies ship either UTF-8 (often with a BOM) or legacy EUC-KR.
fn read_csv_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;

    let (text, _, had_errors) = UTF_8.decode(&bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }

    let (text, _, had_errors) = EUC_KR.decode(&bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }

    Err(IngestError::Decode {
        file: path.display().to_string(),
    })
}
