// 📂 CSV Loader - encoding / delimiter cascade
//
// Each strategy is one (encoding, delimiter) attempt. Attempts run in order
// and the first one that yields a plausible table wins:
//
//   UTF-8   ','   rejected if the header is one column containing ';'
//   UTF-8   ';'
//   Latin-1 ','   (same rejection rule)
//   Latin-1 ';'
//
// Inside an accepted attempt, rows with more fields than the header are
// skipped and counted; shorter rows are padded with empty cells.

use crate::error::{EtlError, Result};
use encoding_rs::{UTF_8, WINDOWS_1252};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How many leading records are searched when the header must be located
const HEADER_SEARCH_LIMIT: usize = 30;

// ============================================================================
// STRATEGIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceEncoding {
    Utf8,
    /// Decoded as Windows-1252, the superset browsers and portals mean by "latin-1"
    Latin1,
}

impl SourceEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Latin1 => "latin-1",
        }
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            SourceEncoding::Utf8 => UTF_8.decode_without_bom_handling_and_without_replacement(bytes),
            SourceEncoding::Latin1 => {
                let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
                Some(text)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadStrategy {
    pub encoding: SourceEncoding,
    pub delimiter: u8,
}

impl LoadStrategy {
    pub const fn new(encoding: SourceEncoding, delimiter: u8) -> Self {
        LoadStrategy { encoding, delimiter }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.encoding.label(), self.delimiter as char)
    }
}

pub const DEFAULT_CASCADE: [LoadStrategy; 4] = [
    LoadStrategy::new(SourceEncoding::Utf8, b','),
    LoadStrategy::new(SourceEncoding::Utf8, b';'),
    LoadStrategy::new(SourceEncoding::Latin1, b','),
    LoadStrategy::new(SourceEncoding::Latin1, b';'),
];

/// Where the header row sits
#[derive(Clone, Copy)]
pub enum HeaderRow {
    /// First record
    First,
    /// After a fixed number of title records
    AfterLines(usize),
    /// First record (within the leading block) accepted by the predicate
    Matching(fn(&[String]) -> bool),
}

impl fmt::Debug for HeaderRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderRow::First => write!(f, "First"),
            HeaderRow::AfterLines(n) => write!(f, "AfterLines({})", n),
            HeaderRow::Matching(_) => write!(f, "Matching(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub header: HeaderRow,
    /// Force a delimiter instead of sniffing
    pub delimiter: Option<u8>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            header: HeaderRow::First,
            delimiter: None,
        }
    }
}

impl LoadOptions {
    fn cascade(&self) -> Vec<LoadStrategy> {
        match self.delimiter {
            Some(d) => DEFAULT_CASCADE
                .iter()
                .filter(|s| s.delimiter == d)
                .copied()
                .collect(),
            None => DEFAULT_CASCADE.to_vec(),
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct CsvTable {
    pub path: PathBuf,
    pub headers: Vec<String>,
    /// Every row has exactly `headers.len()` cells
    pub rows: Vec<Vec<String>>,
    /// Rows dropped for having more fields than the header
    pub skipped_rows: usize,
    pub strategy: LoadStrategy,
}

impl CsvTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a column the layout cannot do without
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| EtlError::MissingColumn {
            column: name.to_string(),
            path: self.path.clone(),
        })
    }

    pub fn sample(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..self.rows.len().min(n)]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cell text for an optional column index; `None` for blank cells
pub fn cell<'a>(row: &'a [String], index: Option<usize>) -> Option<&'a str> {
    index
        .and_then(|i| row.get(i))
        .map(|c| c.as_str())
        .filter(|c| !c.trim().is_empty())
}

// ============================================================================
// LOADING
// ============================================================================

enum Attempt {
    Accepted(CsvTable),
    Rejected(String),
}

/// Load with the default options
pub fn load_csv(path: &Path) -> Result<CsvTable> {
    load_csv_with(path, &LoadOptions::default())
}

pub fn load_csv_with(path: &Path, options: &LoadOptions) -> Result<CsvTable> {
    let bytes = fs::read(path)?;
    let mut last_error: Option<EtlError> = None;

    for strategy in options.cascade() {
        match attempt(path, &bytes, strategy, options) {
            Ok(Attempt::Accepted(table)) => {
                debug!(
                    path = %path.display(),
                    strategy = %strategy,
                    columns = table.headers.len(),
                    rows = table.rows.len(),
                    skipped = table.skipped_rows,
                    "CSV loaded"
                );
                return Ok(table);
            }
            Ok(Attempt::Rejected(reason)) => {
                debug!(path = %path.display(), strategy = %strategy, reason = %reason, "strategy rejected");
            }
            Err(e) => {
                debug!(path = %path.display(), strategy = %strategy, error = %e, "strategy failed");
                last_error = Some(e);
            }
        }
    }

    warn!(path = %path.display(), "no load strategy succeeded");
    Err(last_error.unwrap_or_else(|| EtlError::Decode {
        path: path.to_path_buf(),
        encoding: "utf-8/latin-1",
    }))
}

fn attempt(path: &Path, bytes: &[u8], strategy: LoadStrategy, options: &LoadOptions) -> Result<Attempt> {
    let decoded = strategy.encoding.decode(bytes).ok_or_else(|| EtlError::Decode {
        path: path.to_path_buf(),
        encoding: strategy.encoding.label(),
    })?;
    let text: &str = decoded.strip_prefix('\u{feff}').unwrap_or(&*decoded);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(strategy.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records: Vec<Vec<String>> = Vec::new();
    let mut malformed = 0;
    for result in reader.records() {
        match result {
            Ok(record) => records.push(record.iter().map(|c| c.to_string()).collect()),
            Err(_) => malformed += 1,
        }
    }

    let header_index = match locate_header(&records, options.header) {
        Some(i) => i,
        None => return Err(EtlError::EmptyFile(path.to_path_buf())),
    };

    let mut rest = records.into_iter().skip(header_index);
    let mut headers = match rest.next() {
        Some(h) => h,
        None => return Err(EtlError::EmptyFile(path.to_path_buf())),
    };
    if let Some(first) = headers.first_mut() {
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }

    if strategy.delimiter != b';' && headers.len() == 1 && headers[0].contains(';') {
        return Ok(Attempt::Rejected("single column header contains ';'".to_string()));
    }

    let width = headers.len();
    let mut rows = Vec::new();
    let mut skipped_rows = malformed;
    for mut row in rest {
        if row.len() > width {
            skipped_rows += 1;
            continue;
        }
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(Attempt::Accepted(CsvTable {
        path: path.to_path_buf(),
        headers,
        rows,
        skipped_rows,
        strategy,
    }))
}

fn locate_header(records: &[Vec<String>], header: HeaderRow) -> Option<usize> {
    if records.is_empty() {
        return None;
    }

    match header {
        HeaderRow::First => Some(0),
        HeaderRow::AfterLines(n) if n < records.len() => Some(n),
        HeaderRow::AfterLines(_) => None,
        HeaderRow::Matching(accept) => Some(
            records
                .iter()
                .take(HEADER_SEARCH_LIMIT)
                .position(|r| accept(r))
                .unwrap_or(0),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_bytes(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_comma_utf8() {
        let file = write_bytes("Órgão,Valor\nSaúde,\"1.234,56\"\nEducação,10\n".as_bytes());
        let table = load_csv(file.path()).unwrap();

        assert_eq!(table.headers, vec!["Órgão", "Valor"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "1.234,56");
        assert_eq!(table.strategy, LoadStrategy::new(SourceEncoding::Utf8, b','));
    }

    #[test]
    fn test_semicolon_sniffed() {
        let file = write_bytes("Orgao;Pago;Empenhado\nSaude;10;20\n".as_bytes());
        let table = load_csv(file.path()).unwrap();

        assert_eq!(table.headers, vec!["Orgao", "Pago", "Empenhado"]);
        assert_eq!(table.strategy.delimiter, b';');
        assert_eq!(table.rows[0], vec!["Saude", "10", "20"]);
    }

    #[test]
    fn test_semicolon_with_decimal_commas_sniffed() {
        // Decimal commas in the body don't stop the ';' header from winning
        let file = write_bytes("Orgao;Valor\nSaude;1.500,00\n".as_bytes());
        let table = load_csv(file.path()).unwrap();
        assert_eq!(table.headers.len(), 2);
        assert_eq!(table.rows[0][1], "1.500,00");
    }

    #[test]
    fn test_latin1_fallback() {
        // "Órgão,Valor\nSaúde,10\n" in ISO-8859-1
        let bytes: Vec<u8> = vec![
            0xD3, b'r', b'g', 0xE3, b'o', b',', b'V', b'a', b'l', b'o', b'r', b'\n', b'S', b'a',
            0xFA, b'd', b'e', b',', b'1', b'0', b'\n',
        ];
        let file = write_bytes(&bytes);
        let table = load_csv(file.path()).unwrap();

        assert_eq!(table.strategy.encoding, SourceEncoding::Latin1);
        assert_eq!(table.headers[0], "Órgão");
        assert_eq!(table.rows[0][0], "Saúde");
    }

    #[test]
    fn test_latin1_semicolon_sniffed() {
        // "Órgão;Valor\nSaúde;1.500,00\n" in ISO-8859-1
        let mut bytes: Vec<u8> = vec![0xD3, b'r', b'g', 0xE3, b'o', b';'];
        bytes.extend_from_slice(b"Valor\nSa");
        bytes.push(0xFA);
        bytes.extend_from_slice(b"de;1.500,00\n");
        let file = write_bytes(&bytes);
        let table = load_csv(file.path()).unwrap();

        assert_eq!(table.strategy, LoadStrategy::new(SourceEncoding::Latin1, b';'));
        assert_eq!(table.headers, vec!["Órgão", "Valor"]);
        assert_eq!(table.rows[0], vec!["Saúde", "1.500,00"]);
    }

    #[test]
    fn test_long_rows_skipped_short_rows_padded() {
        let file = write_bytes(b"a,b,c\n1,2,3\n1,2,3,4\n1\n");
        let table = load_csv(file.path()).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.skipped_rows, 1);
        assert_eq!(table.rows[1], vec!["1", "", ""]);
    }

    #[test]
    fn test_bom_stripped() {
        let file = write_bytes("\u{feff}Ano,Órgão\n2024,X\n".as_bytes());
        let table = load_csv(file.path()).unwrap();
        assert_eq!(table.headers[0], "Ano");
        assert_eq!(table.column_index("Ano"), Some(0));
        assert_eq!(table.require_column("Órgão").unwrap(), 1);
        assert!(matches!(
            table.require_column("Valor"),
            Err(EtlError::MissingColumn { column, .. }) if column == "Valor"
        ));
    }

    #[test]
    fn test_skip_title_lines() {
        let file = write_bytes(b"Relatorio de despesas\nGerado em 2024\nOrgao,Pago\nX,1\n");
        let options = LoadOptions {
            header: HeaderRow::AfterLines(2),
            delimiter: None,
        };
        let table = load_csv_with(file.path(), &options).unwrap();
        assert_eq!(table.headers, vec!["Orgao", "Pago"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_header_located_by_predicate() {
        fn has_orgao(row: &[String]) -> bool {
            row.iter().any(|c| c == "Orgao")
        }
        let file = write_bytes(b"Titulo\n\nOrgao,Pago\nX,1\n");
        let options = LoadOptions {
            header: HeaderRow::Matching(has_orgao),
            delimiter: None,
        };
        let table = load_csv_with(file.path(), &options).unwrap();
        assert_eq!(table.headers, vec!["Orgao", "Pago"]);
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let file = write_bytes(b"");
        assert!(matches!(load_csv(file.path()), Err(EtlError::EmptyFile(_))));
    }

    #[test]
    fn test_cell_helper() {
        let row = vec!["a".to_string(), "  ".to_string()];
        assert_eq!(cell(&row, Some(0)), Some("a"));
        assert_eq!(cell(&row, Some(1)), None);
        assert_eq!(cell(&row, Some(5)), None);
        assert_eq!(cell(&row, None), None);
    }
}
