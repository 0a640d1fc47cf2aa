// 🚀 Pipeline Driver - state/year matrix → processor → one append per file
//
// A failing file never stops the run: its error is logged and recorded in
// the summary, and the next file starts.

use crate::categorizer::Categorizer;
use crate::columns::{detect_columns, ColumnSuggestions};
use crate::config::EtlConfig;
use crate::db;
use crate::error::{EtlError, Result};
use crate::loader::load_csv;
use crate::mapping::{self, StateMapping};
use crate::processors::{get_processor, ExtractionStats, ProcessContext, ProcessorKind};
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn};

const ANALYZE_SAMPLE_ROWS: usize = 5;

// ============================================================================
// FILE DISCOVERY
// ============================================================================

/// One candidate source file and the year it is ingested under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub year: i32,
    /// False when the name carried no year and the default was used
    pub year_from_name: bool,
}

/// Files for one state under `csv_dir`, sorted by path.
///
/// The glob is loose (`*CE*.csv` also matches `PRECE.csv`) and ignores the
/// extension's case, so the state code must also appear as its own token in
/// the file name.
pub fn discover_files(csv_dir: &Path, mapping: &StateMapping, default_year: i32) -> Result<Vec<SourceFile>> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&csv_dir.to_string_lossy()),
        mapping.file_pattern()
    );
    let token = Regex::new(&format!(r"(?:^|[^A-Za-z]){}(?:[^A-Za-z]|$)", mapping.state))?;

    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::new()
    };

    let mut paths: Vec<PathBuf> = glob::glob_with(&pattern, options)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "unreadable path while globbing");
                None
            }
        })
        .filter(|path| {
            path.file_name()
                .map(|name| token.is_match(&name.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let named_year = path
                .file_name()
                .and_then(|name| year_in_name(&name.to_string_lossy()));
            SourceFile {
                year: named_year.unwrap_or(default_year),
                year_from_name: named_year.is_some(),
                path,
            }
        })
        .collect())
}

/// First standalone `20xx` in a file name
fn year_in_name(name: &str) -> Option<i32> {
    name.split(|c: char| !c.is_ascii_digit())
        .find(|part| part.len() == 4 && part.starts_with("20"))
        .and_then(|part| part.parse().ok())
}

/// Parts of an uploaded file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadName {
    pub state: String,
    pub year: i32,
    /// Client file name kept after `{STATE}_{YEAR}_`
    pub original: Option<String>,
}

/// Parse `{STATE}_{YEAR}.csv` or `{STATE}_{YEAR}_{original}`.
///
/// Only the shape is checked; whether the state is configured and the year
/// supported is decided when the file is processed.
pub fn parse_upload_name(file_name: &str) -> Option<UploadName> {
    let mut parts = file_name.splitn(3, '_');
    let state = parts.next()?;
    let second = parts.next()?;
    let rest = parts.next();

    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }

    let year_text = match rest {
        Some(_) => second,
        None => strip_csv_extension(second)?,
    };
    if year_text.len() != 4 || !year_text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let original = match rest {
        Some(original) if !original.is_empty() && strip_csv_extension(original).is_some() => {
            Some(original.to_string())
        }
        Some(_) => return None,
        None => None,
    };

    Some(UploadName {
        state: state.to_string(),
        year: year_text.parse().ok()?,
        original,
    })
}

fn strip_csv_extension(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(4)?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (stem, ext) = name.split_at(split);
    ext.eq_ignore_ascii_case(".csv").then_some(stem)
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Processed,
    NotFound,
    Skipped,
    Failed,
}

/// What happened to one state/year unit of work
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub state: String,
    pub year: Option<i32>,
    pub path: Option<PathBuf>,
    pub processor: ProcessorKind,
    pub status: OutcomeStatus,
    pub inserted: usize,
    pub stats: ExtractionStats,
    pub error: Option<String>,
}

impl FileOutcome {
    fn new(mapping: &StateMapping, year: Option<i32>, path: Option<PathBuf>) -> Self {
        FileOutcome {
            state: mapping.state.to_string(),
            year,
            path,
            processor: ProcessorKind::for_state(mapping.state),
            status: OutcomeStatus::NotFound,
            inserted: 0,
            stats: ExtractionStats::default(),
            error: None,
        }
    }

    fn with_status(mut self, status: OutcomeStatus, error: Option<String>) -> Self {
        self.status = status;
        self.error = error;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn total_inserted(&self) -> usize {
        self.outcomes.iter().map(|o| o.inserted).sum()
    }

    /// States with at least one record inserted
    pub fn states_processed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Processed && o.inserted > 0)
            .map(|o| o.state.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.status == OutcomeStatus::Failed)
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Extraction counters summed over every processed file
    pub fn totals(&self) -> ExtractionStats {
        let mut totals = ExtractionStats::default();
        for outcome in &self.outcomes {
            totals += outcome.stats;
        }
        totals
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    config: EtlConfig,
    categorizer: Categorizer,
    conn: Connection,
}

impl Pipeline {
    /// Wrap an existing connection; the destination table is created if missing.
    pub fn new(config: EtlConfig, categorizer: Categorizer, conn: Connection) -> Result<Self> {
        config.validate()?;
        db::setup_database(&conn, &config.table_name)?;
        Ok(Pipeline {
            config,
            categorizer,
            conn,
        })
    }

    /// Open the configured database file
    pub fn open(config: EtlConfig, categorizer: Categorizer) -> Result<Self> {
        let conn = db::open_database(&config.database_path, &config.table_name)?;
        Self::new(config, categorizer, conn)
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Every configured state, every supported year found on disk.
    ///
    /// Per state and year only the first file (by path) is ingested.
    pub fn run_all(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        for mapping in mapping::all_states() {
            let files = match discover_files(&self.config.csv_dir, mapping, self.config.default_year) {
                Ok(files) => files,
                Err(e) => {
                    error!(state = mapping.state, error = %e, "file discovery failed");
                    summary.outcomes.push(
                        FileOutcome::new(mapping, None, None)
                            .with_status(OutcomeStatus::Failed, Some(e.to_string())),
                    );
                    continue;
                }
            };

            if files.is_empty() {
                warn!(
                    state = mapping.state,
                    pattern = %mapping.file_pattern(),
                    "no source file found"
                );
                summary.outcomes.push(FileOutcome::new(mapping, None, None));
                continue;
            }

            let mut seen_years = BTreeSet::new();
            for file in files {
                let year = file.year;
                if !self.config.is_supported_year(year) {
                    warn!(state = mapping.state, year, path = %file.path.display(), "year not supported, skipping");
                    summary.outcomes.push(
                        FileOutcome::new(mapping, Some(year), Some(file.path))
                            .with_status(OutcomeStatus::Skipped, Some(EtlError::UnsupportedYear(year).to_string())),
                    );
                    continue;
                }
                if !seen_years.insert(year) {
                    warn!(state = mapping.state, year, path = %file.path.display(), "another file already covers this year, skipping");
                    summary.outcomes.push(
                        FileOutcome::new(mapping, Some(year), Some(file.path))
                            .with_status(OutcomeStatus::Skipped, Some("duplicate state/year file".to_string())),
                    );
                    continue;
                }

                summary.outcomes.push(self.run_file(mapping, &file.path, year));
            }
        }

        info!(
            inserted = summary.total_inserted(),
            states = summary.states_processed(),
            failed = summary.count(OutcomeStatus::Failed),
            "run complete"
        );
        summary
    }

    /// One state and year, as triggered by an upload.
    pub fn run_state_year(&self, state: &str, year: i32) -> Result<FileOutcome> {
        let mapping = mapping::lookup(state).ok_or_else(|| EtlError::UnknownState(state.to_string()))?;
        if !self.config.is_supported_year(year) {
            return Err(EtlError::UnsupportedYear(year));
        }

        let file = discover_files(&self.config.csv_dir, mapping, self.config.default_year)?
            .into_iter()
            .find(|f| f.year == year)
            .ok_or_else(|| EtlError::FileNotFound {
                state: mapping.state.to_string(),
                year,
                pattern: mapping.file_pattern(),
            })?;

        let span = info_span!("ingest", state = mapping.state, year);
        let _enter = span.enter();

        let (inserted, stats) = self.process_file(mapping, &file.path, year)?;
        Ok(FileOutcome {
            status: OutcomeStatus::Processed,
            inserted,
            stats,
            ..FileOutcome::new(mapping, Some(year), Some(file.path))
        })
    }

    /// Upload trigger: `true` when the file was found and processed, even if
    /// it yielded no records.
    pub fn process_new_file(&self, state: &str, year: i32) -> bool {
        match self.run_state_year(state, year) {
            Ok(outcome) => {
                info!(state, year, inserted = outcome.inserted, "upload processed");
                true
            }
            Err(e) => {
                error!(state, year, error = %e, "upload processing failed");
                false
            }
        }
    }

    fn run_file(&self, mapping: &StateMapping, path: &Path, year: i32) -> FileOutcome {
        let span = info_span!("ingest", state = mapping.state, year);
        let _enter = span.enter();

        let outcome = FileOutcome::new(mapping, Some(year), Some(path.to_path_buf()));
        match self.process_file(mapping, path, year) {
            Ok((inserted, stats)) => FileOutcome {
                status: OutcomeStatus::Processed,
                inserted,
                stats,
                ..outcome
            },
            Err(e) => {
                error!(path = %path.display(), error = %e, "file failed");
                outcome.with_status(OutcomeStatus::Failed, Some(e.to_string()))
            }
        }
    }

    fn process_file(&self, mapping: &StateMapping, path: &Path, year: i32) -> Result<(usize, ExtractionStats)> {
        let processor = get_processor(ProcessorKind::for_state(mapping.state));
        info!(
            path = %path.display(),
            processor = processor.kind().name(),
            version = processor.version(),
            "processing file"
        );

        let ctx = ProcessContext::new(mapping, year, &self.categorizer);
        let extraction = processor.process(path, &ctx)?;

        if extraction.records.is_empty() {
            warn!(path = %path.display(), "no valid records in file");
        }
        let inserted = db::insert_expenses(&self.conn, &self.config.table_name, &extraction.records)?;
        info!(inserted, "records stored");

        Ok((inserted, extraction.stats))
    }
}

// ============================================================================
// STRUCTURE ANALYSIS (read-only)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfiguredColumn {
    pub slot: &'static str,
    pub name: String,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureReport {
    pub state: String,
    pub path: Option<PathBuf>,
    pub year: Option<i32>,
    pub strategy: Option<String>,
    pub headers: Vec<String>,
    pub rows: usize,
    pub configured: Vec<ConfiguredColumn>,
    /// Filled only when the configured mapping does not fully match
    pub suggestions: Option<ColumnSuggestions>,
    pub error: Option<String>,
}

impl StructureReport {
    fn empty(mapping: &StateMapping, path: Option<PathBuf>, year: Option<i32>) -> Self {
        StructureReport {
            state: mapping.state.to_string(),
            path,
            year,
            strategy: None,
            headers: Vec::new(),
            rows: 0,
            configured: Vec::new(),
            suggestions: None,
            error: None,
        }
    }

    pub fn mapping_matches(&self) -> bool {
        self.configured.iter().all(|c| c.present)
    }
}

/// Header, row count and mapping fit of every state's files. Writes nothing.
pub fn analyze(config: &EtlConfig) -> Vec<StructureReport> {
    let mut reports = Vec::new();

    for mapping in mapping::all_states() {
        let files = match discover_files(&config.csv_dir, mapping, config.default_year) {
            Ok(files) => files,
            Err(e) => {
                let mut report = StructureReport::empty(mapping, None, None);
                report.error = Some(e.to_string());
                reports.push(report);
                continue;
            }
        };

        if files.is_empty() {
            let mut report = StructureReport::empty(mapping, None, None);
            report.error = Some(format!("no file matches {}", mapping.file_pattern()));
            reports.push(report);
            continue;
        }

        for file in files {
            reports.push(analyze_file(mapping, &file));
        }
    }

    reports
}

fn analyze_file(mapping: &StateMapping, file: &SourceFile) -> StructureReport {
    let mut report = StructureReport::empty(mapping, Some(file.path.clone()), Some(file.year));

    let table = match load_csv(&file.path) {
        Ok(table) => table,
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };

    let columns = &mapping.columns;
    let slots = [
        ("organization", &columns.organization),
        ("committed_value", &columns.committed_value),
        ("paid_value", &columns.paid_value),
        ("year", &columns.year),
    ];
    report.configured = slots
        .iter()
        .filter_map(|&(slot, name)| {
            name.as_deref().map(|name| ConfiguredColumn {
                slot,
                name: name.to_string(),
                present: table.column_index(name).is_some(),
            })
        })
        .collect();

    if columns.organization.is_none() || !report.mapping_matches() {
        report.suggestions = Some(detect_columns(&table.headers, table.sample(ANALYZE_SAMPLE_ROWS)));
    }

    report.strategy = Some(table.strategy.to_string());
    report.rows = table.len();
    report.headers = table.headers;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CE_CSV: &str = "Exercício,Unidade gestora,Valor empenhado final,Valor pago final\n\
        2024,Secretaria da Saúde,\"1.500,00\",\"1.200,00\"\n\
        2024,Secretaria da Educação,,\"800,00\"\n\
        2024,Fun??o,0,0\n";

    fn pipeline_for(dir: &Path) -> Pipeline {
        let config = EtlConfig {
            csv_dir: dir.to_path_buf(),
            ..EtlConfig::default()
        };
        Pipeline::new(config, Categorizer::new(), Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_process_new_file_appends_valid_rows() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CE_2024.csv"), CE_CSV).unwrap();
        let pipeline = pipeline_for(dir.path());

        let before = db::count_for_state(pipeline.connection(), "despesas", "CE").unwrap();
        assert!(pipeline.process_new_file("CE", 2024));
        let after = db::count_for_state(pipeline.connection(), "despesas", "CE").unwrap();
        assert_eq!(after - before, 2);

        let value: f64 = pipeline
            .connection()
            .query_row(
                "SELECT value FROM despesas WHERE organization = 'Secretaria da Saúde'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(value, 1500.0);

        // Re-running appends again
        assert!(pipeline.process_new_file("CE", 2024));
        assert_eq!(db::count_for_state(pipeline.connection(), "despesas", "CE").unwrap(), 4);

        println!("✅ process_new_file test PASSED");
    }

    #[test]
    fn test_uppercase_extension_upload_is_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CE_2024.CSV"), CE_CSV).unwrap();
        let pipeline = pipeline_for(dir.path());

        let upload = parse_upload_name("CE_2024.CSV").unwrap();
        assert!(pipeline.process_new_file(&upload.state, upload.year));
        assert_eq!(db::count_for_state(pipeline.connection(), "despesas", "CE").unwrap(), 2);
    }

    #[test]
    fn test_process_new_file_rejections() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CE_2024.csv"), CE_CSV).unwrap();
        let pipeline = pipeline_for(dir.path());

        assert!(!pipeline.process_new_file("XX", 2024));
        assert!(!pipeline.process_new_file("CE", 2019));
        assert!(!pipeline.process_new_file("CE", 2023), "no 2023 file on disk");
        assert!(!pipeline.process_new_file("PE", 2024));
        assert!(matches!(
            pipeline.run_state_year("CE", 2023),
            Err(EtlError::FileNotFound { .. })
        ));
        assert_eq!(db::count_rows(pipeline.connection(), "despesas").unwrap(), 0);
    }

    #[test]
    fn test_process_new_file_true_with_zero_records() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("PE_2024.csv"), "foo,bar\n1,2\n").unwrap();
        let pipeline = pipeline_for(dir.path());

        assert!(pipeline.process_new_file("PE", 2024));
        assert_eq!(db::count_rows(pipeline.connection(), "despesas").unwrap(), 0);
    }

    #[test]
    fn test_run_all_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CE_2024.csv"), CE_CSV).unwrap();
        fs::write(dir.path().join("RO_2023.csv"), "Secretaria,Valor\nX,1\n").unwrap();
        fs::write(
            dir.path().join("despesas_RS_2019.csv"),
            "Ano,Órgão,Valor\n2019,Secretaria,\"1,00\"\n",
        )
        .unwrap();
        let pipeline = pipeline_for(dir.path());

        let summary = pipeline.run_all();

        assert_eq!(summary.total_inserted(), 2);
        assert_eq!(summary.states_processed(), 1);
        assert_eq!(summary.count(OutcomeStatus::Failed), 1);
        assert_eq!(summary.count(OutcomeStatus::Skipped), 1);
        assert_eq!(summary.count(OutcomeStatus::NotFound), 27 - 3);

        let failed = summary.failures().next().unwrap();
        assert_eq!(failed.state, "RO");
        assert!(failed.error.as_deref().unwrap().contains("DespesaEmpenhada"));

        assert_eq!(summary.totals().committed_used, 1);
        assert_eq!(summary.totals().paid_used, 1);
        assert_eq!(summary.totals().dropped, 1);
    }

    #[test]
    fn test_discover_files_requires_state_token() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["CE_2023.csv", "despesas-CE.csv", "PRECEITO_2024.csv", "CE_2024_notes.txt"] {
            fs::write(dir.path().join(name), "a\n").unwrap();
        }
        let ce = mapping::lookup("CE").unwrap();

        let files = discover_files(dir.path(), ce, 2024).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["CE_2023.csv", "despesas-CE.csv"]);
        assert_eq!(files[0].year, 2023);
        assert!(files[0].year_from_name);
        assert_eq!(files[1].year, 2024);
        assert!(!files[1].year_from_name);
    }

    #[test]
    fn test_parse_upload_name() {
        assert_eq!(
            parse_upload_name("CE_2024.csv"),
            Some(UploadName {
                state: "CE".to_string(),
                year: 2024,
                original: None
            })
        );
        assert_eq!(
            parse_upload_name("SP_2021_despesas_sp.CSV").unwrap().original.as_deref(),
            Some("despesas_sp.CSV")
        );
        assert_eq!(parse_upload_name("ce_2024.csv"), None);
        assert_eq!(parse_upload_name("CE_24.csv"), None);
        assert_eq!(parse_upload_name("CE_2024.xlsx"), None);
        assert_eq!(parse_upload_name("CE_2024_report.xlsx"), None);
        assert_eq!(parse_upload_name("CE2024.csv"), None);
    }

    #[test]
    fn test_analyze_reports_mapping_fit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CE_2024.csv"), CE_CSV).unwrap();
        fs::write(dir.path().join("PA_2024.csv"), "Órgão,Valor Empenhado,Valor Pago\nX,1,1\n").unwrap();
        let config = EtlConfig {
            csv_dir: dir.path().to_path_buf(),
            ..EtlConfig::default()
        };

        let reports = analyze(&config);
        assert_eq!(reports.len(), 27);

        let ce = reports.iter().find(|r| r.state == "CE").unwrap();
        assert_eq!(ce.rows, 3);
        assert_eq!(ce.headers.len(), 4);
        assert!(ce.error.is_none());

        let missing = reports.iter().find(|r| r.state == "AC").unwrap();
        assert!(missing.path.is_none());
        assert!(missing.error.is_some());
    }
}
