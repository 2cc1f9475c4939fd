//! telemetry-merge: registry-driven merge of per-device telemetry CSV files
//!
//! Each registry record points at `<data_dir>/<device_address>.csv`. Records whose file
//! exists contribute their data rows, prefixed with the record's enrichment fields, to a
//! single output. The output header is fixed by the first file found.

mod error;
pub use error::{MergeError, Result};

mod config;
pub use config::MergeConfig;

mod engine;
pub use engine::{MergeEngine, MergeSummary};

mod output;
pub use output::{output_file_name, output_path, run_timestamp};

mod run;
pub use run::{run_merge, run_merge_at, MergeOutcome};

mod metrics;
pub use metrics::MergeMetrics;

pub use device_registry::{EnrichmentVariant, RegistryRecord};
