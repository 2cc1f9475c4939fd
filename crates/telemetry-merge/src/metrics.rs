use crate::engine::MergeSummary;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct MergeMetrics {
    pub registry: Registry,
    pub records_seen: IntCounter,
    pub header_skipped: IntCounter,
    pub files_merged: IntCounter,
    pub files_missing: IntCounter,
    pub rows_written: IntCounter,
    pub width_mismatches: IntCounter,
    pub header_columns: IntGauge,
}

impl MergeMetrics {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let records_seen = IntCounter::new("tm_records_seen", "Registry records processed")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let header_skipped =
            IntCounter::new("tm_header_skipped", "Registry header rows skipped by the merge")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let files_merged = IntCounter::new("tm_files_merged", "Data files merged")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let files_missing =
            IntCounter::new("tm_files_missing", "Registry records without a data file")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let rows_written = IntCounter::new("tm_rows_written", "Data rows written to output")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let width_mismatches = IntCounter::new(
            "tm_width_mismatches",
            "Rows whose column count differs from the output header",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let header_columns =
            IntGauge::new("tm_header_columns", "Columns in the merged output header")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let _ = registry.register(Box::new(records_seen.clone()));
        let _ = registry.register(Box::new(header_skipped.clone()));
        let _ = registry.register(Box::new(files_merged.clone()));
        let _ = registry.register(Box::new(files_missing.clone()));
        let _ = registry.register(Box::new(rows_written.clone()));
        let _ = registry.register(Box::new(width_mismatches.clone()));
        let _ = registry.register(Box::new(header_columns.clone()));
        Ok(Self {
            registry,
            records_seen,
            header_skipped,
            files_merged,
            files_missing,
            rows_written,
            width_mismatches,
            header_columns,
        })
    }

    pub fn observe(&self, summary: &MergeSummary) {
        self.records_seen.inc_by(summary.records_seen);
        self.files_merged.inc_by(summary.files_merged);
        self.files_missing.inc_by(summary.files_missing);
        self.rows_written.inc_by(summary.rows_written);
        self.header_skipped.inc_by(summary.header_skipped);
        self.width_mismatches.inc_by(summary.width_mismatches);
        let cols = summary.header.as_ref().map_or(0, Vec::len);
        self.header_columns.set(i64::try_from(cols).unwrap_or(i64::MAX));
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
