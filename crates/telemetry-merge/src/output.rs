use crate::error::{MergeError, Result};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

/// Wall-clock time used to stamp a run. Falls back to UTC when the local offset
/// cannot be determined.
pub fn run_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `<prefix>_<YYYYMMDD_HHMMSS>.csv`
pub fn output_file_name(prefix: &str, at: OffsetDateTime) -> Result<String> {
    let stamp = at.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    Ok(format!("{prefix}_{stamp}.csv"))
}

pub fn output_path(data_dir: &Path, prefix: &str, at: OffsetDateTime) -> Result<PathBuf> {
    if prefix.is_empty() {
        return Err(MergeError::Config("output prefix is empty".into()));
    }
    Ok(data_dir.join(output_file_name(prefix, at)?))
}
