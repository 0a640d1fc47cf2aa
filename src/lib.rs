// State Expenditure ETL - Core Library
// Normalizes per-state spending CSV exports into one categorized table

pub mod amount;
pub mod categorizer;
pub mod columns;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod processors;
pub mod repair;

// Re-export commonly used types
pub use amount::{parse_amount, parse_amount_lenient, AmountStyle};
pub use categorizer::{Categorizer, CategoryDefinition, CategoryScore};
pub use columns::{detect_columns, resolve_columns, ColumnSuggestions, ResolvedColumns};
pub use config::EtlConfig;
pub use db::{
    category_totals, count_by_state, count_for_state, count_rows, insert_expenses,
    open_database, setup_database, state_year_counts, CategoryTotal, StateYearCount,
};
pub use error::{EtlError, Result};
pub use loader::{load_csv, CsvTable, LoadStrategy, SourceEncoding};
pub use mapping::{ColumnMapping, StateMapping};
pub use model::{ExpenseRecord, NOT_INFORMED, OTHER_CATEGORY};
pub use pipeline::{
    analyze, discover_files, parse_upload_name, FileOutcome, OutcomeStatus, Pipeline,
    RunSummary, StructureReport, UploadName,
};
pub use processors::{get_processor, ExtractionStats, ProcessContext, ProcessorKind, StateProcessor};
pub use repair::{repair, repair_opt};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
