use crate::error::{MergeError, Result};
use device_registry::{EnrichmentVariant, RegistryRecord};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Counters collected over one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub records_seen: u64,
    pub header_skipped: u64,
    pub files_missing: u64,
    pub files_merged: u64,
    pub rows_written: u64,
    /// Output columns, once a data file has fixed them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Vec<String>>,
    /// Rows whose column count differs from the header. They are still written.
    pub width_mismatches: u64,
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    data_dir: PathBuf,
    variant: EnrichmentVariant,
}

impl MergeEngine {
    pub fn new(data_dir: impl Into<PathBuf>, variant: EnrichmentVariant) -> Self {
        Self {
            data_dir: data_dir.into(),
            variant,
        }
    }

    pub fn data_file_path(&self, rec: &RegistryRecord) -> PathBuf {
        self.data_dir.join(rec.data_file_name())
    }

    /// Merge every record's data file into `out`, in record order.
    ///
    /// Header rows and records without a data file are skipped. The first data file
    /// found fixes the output header; later files are appended under it unchecked.
    pub fn merge<I, W>(&self, records: I, out: &mut W) -> Result<MergeSummary>
    where
        I: IntoIterator<Item = device_registry::Result<RegistryRecord>>,
        W: Write,
    {
        let mut summary = MergeSummary::default();
        let mut header_written = false;

        for rec in records {
            let rec = rec?;
            summary.records_seen += 1;
            if rec.is_header() {
                summary.header_skipped += 1;
                continue;
            }

            let path = self.data_file_path(&rec);
            if !path.is_file() {
                debug!(id = %rec.id, path = %path.display(), "no data file; skipping");
                summary.files_missing += 1;
                continue;
            }
            let mut reader = open_data_file(&path)?;

            let mut first = Vec::new();
            let n = reader
                .read_until(b'\n', &mut first)
                .map_err(|source| data_err(&path, source))?;
            if n == 0 {
                warn!(path = %path.display(), "data file is empty; nothing to merge");
                summary.files_merged += 1;
                continue;
            }

            if !header_written {
                let mut header: Vec<&[u8]> = self
                    .variant
                    .field_names()
                    .iter()
                    .map(|s| s.as_bytes())
                    .collect();
                header.extend(split_fields(trim_eol(&first)));
                write_line(out, &header)?;
                info!(
                    path = %path.display(),
                    columns = header.len(),
                    "output header taken from first data file"
                );
                summary.header = Some(
                    header
                        .iter()
                        .map(|f| String::from_utf8_lossy(f).into_owned())
                        .collect(),
                );
                header_written = true;
            }

            // Data rows are opaque bytes; they are split and copied through unchanged.
            let prefix: Vec<&[u8]> = rec
                .enrichment_values(self.variant)
                .into_iter()
                .map(str::as_bytes)
                .collect();
            let expected = summary.header.as_ref().map_or(0, Vec::len);
            let mut rows = 0u64;
            let mut mismatched = false;
            let mut line = Vec::new();
            loop {
                line.clear();
                let n = reader
                    .read_until(b'\n', &mut line)
                    .map_err(|source| data_err(&path, source))?;
                if n == 0 {
                    break;
                }
                let fields = split_fields(trim_eol(&line));
                let row: Vec<&[u8]> = prefix.iter().copied().chain(fields).collect();
                if row.len() != expected {
                    summary.width_mismatches += 1;
                    if !mismatched {
                        warn!(
                            path = %path.display(),
                            expected,
                            got = row.len(),
                            "row width differs from output header"
                        );
                        mismatched = true;
                    }
                }
                write_line(out, &row)?;
                rows += 1;
            }
            debug!(id = %rec.id, path = %path.display(), rows, "merged data file");
            summary.files_merged += 1;
            summary.rows_written += rows;
        }

        Ok(summary)
    }
}

fn open_data_file(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| data_err(path, source))
}

fn data_err(path: &Path, source: std::io::Error) -> MergeError {
    MergeError::DataFile {
        path: path.to_path_buf(),
        source,
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// A blank line carries no fields.
fn split_fields(line: &[u8]) -> Vec<&[u8]> {
    if line.is_empty() {
        Vec::new()
    } else {
        line.split(|b| *b == b',').collect()
    }
}

fn write_line<W: Write>(out: &mut W, fields: &[&[u8]]) -> Result<()> {
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            out.write_all(b",").map_err(MergeError::Write)?;
        }
        out.write_all(f).map_err(MergeError::Write)?;
    }
    out.write_all(b"\n").map_err(MergeError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_registry::RegistryReader;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) {
        fs::write(dir.path().join(name), body).unwrap();
    }

    fn merge_text(
        dir: &TempDir,
        registry: &str,
        variant: EnrichmentVariant,
    ) -> (String, MergeSummary) {
        let records = RegistryReader::new(Cursor::new(registry.to_string()), variant);
        let engine = MergeEngine::new(dir.path(), variant);
        let mut out = Vec::new();
        let summary = engine.merge(records, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn test_two_devices_merged_in_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t,v\n1,10\n");
        write(&dir, "BB.csv", "t,v\n2,20\n3,30\n");
        let (text, summary) = merge_text(
            &dir,
            "id,device_address\n1,AA\n2,BB\n",
            EnrichmentVariant::Address,
        );
        assert_eq!(text, "id,device_address,t,v\n1,AA,1,10\n2,BB,2,20\n2,BB,3,30\n");
        assert_eq!(summary.files_merged, 2);
        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.width_mismatches, 0);
    }

    #[test]
    fn test_missing_file_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t,v\n1,10\n");
        let (text, summary) = merge_text(
            &dir,
            "id,device_address\n1,AA\n2,BB\n",
            EnrichmentVariant::Address,
        );
        assert_eq!(text, "id,device_address,t,v\n1,AA,1,10\n");
        assert_eq!(summary.files_missing, 1);
        assert_eq!(summary.records_seen, 2);
    }

    #[test]
    fn test_missing_first_file_does_not_fix_header() {
        let dir = TempDir::new().unwrap();
        write(&dir, "BB.csv", "x,y,z\n7,8,9\n");
        let (text, _) = merge_text(
            &dir,
            "id,device_address\n1,AA\n2,BB\n",
            EnrichmentVariant::Address,
        );
        assert_eq!(text, "id,device_address,x,y,z\n2,BB,7,8,9\n");
    }

    #[test]
    fn test_header_only_registry_gives_empty_output() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t,v\n1,10\n");
        let (text, summary) = merge_text(&dir, "id,device_address\n", EnrichmentVariant::Address);
        assert!(text.is_empty());
        assert_eq!(summary, MergeSummary::default());
    }

    #[test]
    fn test_no_matches_gives_empty_output() {
        let dir = TempDir::new().unwrap();
        let (text, summary) = merge_text(
            &dir,
            "id,device_address\n1,AA\n2,BB\n",
            EnrichmentVariant::Address,
        );
        assert!(text.is_empty());
        assert_eq!(summary.files_missing, 2);
        assert!(summary.header.is_none());
    }

    #[test]
    fn test_eui_variant() {
        let dir = TempDir::new().unwrap();
        write(&dir, "CC.csv", "x\n99\n");
        let (text, _) = merge_text(
            &dir,
            "id,device_address,device_eui\n3,CC,EUI-1\n",
            EnrichmentVariant::AddressEui,
        );
        assert_eq!(text, "id,device_address,device_eui,x\n3,CC,EUI-1,99\n");
    }

    #[test]
    fn test_header_from_first_file_without_rows() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "a,b\n");
        write(&dir, "BB.csv", "t,v\n2,20\n");
        let (text, summary) = merge_text(
            &dir,
            "id,device_address\n1,AA\n2,BB\n",
            EnrichmentVariant::Address,
        );
        assert_eq!(text, "id,device_address,a,b\n2,BB,2,20\n");
        assert_eq!(summary.files_merged, 2);
        assert_eq!(summary.rows_written, 1);
    }

    #[test]
    fn test_later_headers_ignored_and_widths_unchecked() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t,v\n1,10\n");
        write(&dir, "BB.csv", "t,v,w\n2,20,200\n");
        let (text, summary) = merge_text(
            &dir,
            "id,device_address\n1,AA\n2,BB\n",
            EnrichmentVariant::Address,
        );
        assert_eq!(text, "id,device_address,t,v\n1,AA,1,10\n2,BB,2,20,200\n");
        assert_eq!(summary.width_mismatches, 1);
        assert_eq!(
            summary.header,
            Some(vec![
                "id".to_string(),
                "device_address".to_string(),
                "t".to_string(),
                "v".to_string()
            ])
        );
    }

    #[test]
    fn test_shared_address_appends_twice() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t\n1\n");
        let (text, summary) = merge_text(
            &dir,
            "id,device_address\n1,AA\n2,AA\n",
            EnrichmentVariant::Address,
        );
        assert_eq!(text, "id,device_address,t\n1,AA,1\n2,AA,1\n");
        assert_eq!(summary.rows_written, 2);
    }

    #[test]
    fn test_crlf_data_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t,v\r\n1,10\r\n2,20");
        let (text, _) = merge_text(&dir, "id,device_address\n1,AA\n", EnrichmentVariant::Address);
        assert_eq!(text, "id,device_address,t,v\n1,AA,1,10\n1,AA,2,20\n");
    }

    #[test]
    fn test_empty_data_file_does_not_fix_header() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "");
        write(&dir, "BB.csv", "t\n5\n");
        let (text, _) = merge_text(
            &dir,
            "id,device_address\n1,AA\n2,BB\n",
            EnrichmentVariant::Address,
        );
        assert_eq!(text, "id,device_address,t\n2,BB,5\n");
    }

    #[test]
    fn test_sentinel_record_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t\n1\n");
        let records = vec![
            Ok(RegistryRecord::parse_line("id,AA", EnrichmentVariant::Address)),
            Ok(RegistryRecord::parse_line("1,AA", EnrichmentVariant::Address)),
        ];
        let engine = MergeEngine::new(dir.path(), EnrichmentVariant::Address);
        let mut out = Vec::new();
        let summary = engine.merge(records, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id,device_address,t\n1,AA,1\n");
        assert_eq!(summary.header_skipped, 1);
    }

    #[test]
    fn test_non_utf8_row_copied_through() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t,v\n1,10\n");
        fs::write(dir.path().join("BB.csv"), b"t,v\n2,\xe9t\xe9\n3,30\n").unwrap();
        let records = RegistryReader::new(
            Cursor::new("id,device_address\n1,AA\n2,BB\n".to_string()),
            EnrichmentVariant::Address,
        );
        let engine = MergeEngine::new(dir.path(), EnrichmentVariant::Address);
        let mut out = Vec::new();
        let summary = engine.merge(records, &mut out).unwrap();
        assert_eq!(
            out,
            b"id,device_address,t,v\n1,AA,1,10\n2,BB,2,\xe9t\xe9\n2,BB,3,30\n".to_vec()
        );
        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.width_mismatches, 0);
    }

    #[test]
    fn test_non_utf8_header_recorded_lossily() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("AA.csv"), b"temp\xb0C\n21\n").unwrap();
        let records = RegistryReader::new(
            Cursor::new("id,device_address\n1,AA\n".to_string()),
            EnrichmentVariant::Address,
        );
        let engine = MergeEngine::new(dir.path(), EnrichmentVariant::Address);
        let mut out = Vec::new();
        let summary = engine.merge(records, &mut out).unwrap();
        assert_eq!(out, b"id,device_address,temp\xb0C\n1,AA,21\n".to_vec());
        let header = summary.header.unwrap();
        assert_eq!(header[2], "temp\u{fffd}C");
    }

    #[test]
    fn test_summary_json_omits_unset_header() {
        let json = serde_json::to_value(MergeSummary::default()).unwrap();
        assert!(json.get("header").is_none());
        assert_eq!(json["rows_written"], 0);
    }

    #[test]
    fn test_prefix_matches_record() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AA.csv", "t,v\n1,10\n2,20\n");
        write(&dir, "BB.csv", "t,v\n3,30\n");
        let (text, _) = merge_text(
            &dir,
            "id,device_address,device_eui\n1,AA,E1\n2,BB,E2\n",
            EnrichmentVariant::AddressEui,
        );
        let rows: Vec<&str> = text.lines().skip(1).collect();
        let prefixes: Vec<String> = rows
            .iter()
            .map(|r| r.split(',').take(3).collect::<Vec<_>>().join(","))
            .collect();
        assert_eq!(prefixes, vec!["1,AA,E1", "1,AA,E1", "2,BB,E2"]);
    }
}
