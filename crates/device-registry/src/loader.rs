use crate::error::{RegistryError, Result};
use crate::types::{EnrichmentVariant, RegistryRecord};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use tracing::debug;

/// Streams registry records from a line source, one line at a time.
///
/// The first line is always treated as the header. Any later line whose `id` is the
/// header sentinel is dropped as well, and so are blank lines.
pub struct RegistryReader<R> {
    lines: Lines<R>,
    variant: EnrichmentVariant,
    line_no: usize,
}

impl<R: BufRead> RegistryReader<R> {
    pub fn new(source: R, variant: EnrichmentVariant) -> Self {
        Self {
            lines: source.lines(),
            variant,
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for RegistryReader<R> {
    type Item = Result<RegistryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(source) => {
                    return Some(Err(RegistryError::Read {
                        line: self.line_no + 1,
                        source,
                    }))
                }
            };
            self.line_no += 1;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.is_empty() {
                debug!(line = self.line_no, "skipping blank registry line");
                continue;
            }
            let rec = RegistryRecord::parse_line(line, self.variant);
            if self.line_no == 1 || rec.is_header() {
                debug!(line = self.line_no, "skipping registry header row");
                continue;
            }
            return Some(Ok(rec));
        }
    }
}

/// Open a registry file for streaming. Each call starts a fresh pass.
pub fn open_registry(
    path: impl AsRef<Path>,
    variant: EnrichmentVariant,
) -> Result<RegistryReader<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| RegistryError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RegistryReader::new(BufReader::new(file), variant))
}

/// Read a whole registry into memory, in file order.
pub fn load_registry(
    path: impl AsRef<Path>,
    variant: EnrichmentVariant,
) -> Result<Vec<RegistryRecord>> {
    open_registry(path, variant)?.collect()
}
