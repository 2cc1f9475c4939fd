use crate::config::MergeConfig;
use crate::engine::{MergeEngine, MergeSummary};
use crate::error::{MergeError, Result};
use crate::output::{output_path, run_timestamp};
use device_registry::open_registry;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub output_path: PathBuf,
    pub summary: MergeSummary,
}

/// Run one merge, stamping the output with the current time.
pub fn run_merge(config: &MergeConfig) -> Result<MergeOutcome> {
    run_merge_at(config, run_timestamp())
}

pub fn run_merge_at(config: &MergeConfig, at: OffsetDateTime) -> Result<MergeOutcome> {
    config.validate()?;
    let out_path = output_path(&config.data_dir, &config.output_prefix, at)?;

    // Open the registry first so an unreadable registry leaves no stray output.
    let records = open_registry(&config.registry_path, config.variant)?;

    if out_path.exists() {
        warn!(path = %out_path.display(), "replacing existing output file");
    }
    let output_err = |source| MergeError::Output {
        path: out_path.clone(),
        source,
    };
    let file = File::create(&out_path).map_err(output_err)?;
    let mut out = BufWriter::new(file);

    let engine = MergeEngine::new(&config.data_dir, config.variant);
    let merged = engine.merge(records, &mut out).and_then(|summary| {
        out.flush().map_err(output_err)?;
        Ok(summary)
    });
    let summary = match merged {
        Ok(summary) => summary,
        Err(e) => {
            drop(out);
            discard_partial_output(&out_path);
            return Err(e);
        }
    };

    info!(
        path = %out_path.display(),
        files = summary.files_merged,
        missing = summary.files_missing,
        rows = summary.rows_written,
        "merge complete"
    );
    Ok(MergeOutcome {
        output_path: out_path,
        summary,
    })
}

// A failed run must not leave a truncated file that looks like a finished merge.
fn discard_partial_output(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "could not remove partial output");
    }
}
