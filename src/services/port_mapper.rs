//! Static `port/protocol` → service name table used as a last resort.
//!
//! The table is supplied from outside the engine, typically a tab-separated
//! file with one `80/tcp<TAB>http` entry per line. Entries are kept in file
//! order and the first exact match wins.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::errors::AppError;

/// Ordered, read-only port → service lookup table.
#[derive(Debug, Clone, Default)]
pub struct PortMapper {
    entries: Vec<(String, String)>,
}

impl PortMapper {
    /// An empty table; every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(port, name)| (port.into(), name.into()))
                .collect(),
        }
    }

    /// Read a tab-separated table. Lines starting with `#` are comments.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut entries = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let record = result?;
            match (record.get(0), record.get(1)) {
                (Some(port), Some(name)) if !port.trim().is_empty() => {
                    entries.push((port.trim().to_string(), name.trim().to_string()));
                }
                _ => tracing::warn!(line = i + 1, "Skipping incomplete port mapper entry"),
            }
        }

        tracing::debug!(entries = entries.len(), "Loaded port mapper table");
        Ok(Self { entries })
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Service name for an exact `"port/protocol"` string.
    pub fn lookup(&self, port_string: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(port, _)| port == port_string)
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn first_exact_match_wins() {
        let mapper = PortMapper::from_pairs([
            ("80/tcp", "http"),
            ("80/tcp", "www-http"),
            ("53/udp", "domain"),
        ]);
        assert_eq!(mapper.lookup("80/tcp"), Some("http"));
        assert_eq!(mapper.lookup("53/udp"), Some("domain"));
        assert_eq!(mapper.lookup("53/tcp"), None);
        assert_eq!(mapper.lookup("80"), None);
    }

    #[test]
    fn reads_tab_separated_table() {
        let data = "# port\tservice\n22/tcp\tssh\n443/tcp\thttps\nbroken-line\n";
        let mapper = PortMapper::from_reader(data.as_bytes()).unwrap();
        assert_eq!(mapper.len(), 2);
        assert_eq!(mapper.lookup("443/tcp"), Some("https"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "3306/tcp\tmysql").unwrap();
        writeln!(file, "5432/tcp\tpostgresql").unwrap();
        let mapper = PortMapper::from_path(file.path()).unwrap();
        assert_eq!(mapper.lookup("5432/tcp"), Some("postgresql"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PortMapper::from_path(Path::new("/nonexistent/port_mapper.txt")).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn bundled_fixture_loads() {
        let data = include_bytes!("../../tests/fixtures/port_mapper.txt");
        let mapper = PortMapper::from_reader(&data[..]).unwrap();
        assert_eq!(mapper.lookup("22/tcp"), Some("ssh"));
        assert_eq!(mapper.lookup("8080/tcp"), Some("http-proxy"));
    }
}
