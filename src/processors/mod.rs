// 🏗️ State Processor Framework
// One generic path plus bespoke processors for layouts the generic path can't read

pub mod generic;
pub mod layout;
pub mod rio_grande_do_sul;
pub mod rondonia;

use crate::categorizer::Categorizer;
use crate::error::Result;
use crate::mapping::StateMapping;
use crate::model::{ExpenseRecord, NOT_INFORMED};
use crate::repair::repair_opt;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::path::Path;

pub use generic::GenericProcessor;
pub use layout::LayoutProcessor;
pub use rio_grande_do_sul::RioGrandeDoSulProcessor;
pub use rondonia::RondoniaProcessor;

// ============================================================================
// PROCESSOR KINDS
// ============================================================================

/// Which processor handles a state. Resolved once per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorKind {
    Generic,
    DistritoFederal,
    Maranhao,
    Goias,
    MatoGrossoDoSul,
    RioDeJaneiro,
    Rondonia,
    RioGrandeDoSul,
    SaoPaulo,
}

impl ProcessorKind {
    pub fn for_state(state: &str) -> ProcessorKind {
        match state.trim().to_ascii_uppercase().as_str() {
            "DF" => ProcessorKind::DistritoFederal,
            "MA" => ProcessorKind::Maranhao,
            "GO" => ProcessorKind::Goias,
            "MS" => ProcessorKind::MatoGrossoDoSul,
            "RJ" => ProcessorKind::RioDeJaneiro,
            "RO" => ProcessorKind::Rondonia,
            "RS" => ProcessorKind::RioGrandeDoSul,
            "SP" => ProcessorKind::SaoPaulo,
            _ => ProcessorKind::Generic,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ProcessorKind::Generic => "generic",
            ProcessorKind::DistritoFederal => "distrito-federal",
            ProcessorKind::Maranhao => "maranhao",
            ProcessorKind::Goias => "goias",
            ProcessorKind::MatoGrossoDoSul => "mato-grosso-do-sul",
            ProcessorKind::RioDeJaneiro => "rio-de-janeiro",
            ProcessorKind::Rondonia => "rondonia",
            ProcessorKind::RioGrandeDoSul => "rio-grande-do-sul",
            ProcessorKind::SaoPaulo => "sao-paulo",
        }
    }
}

/// Factory: one boxed processor per kind
pub fn get_processor(kind: ProcessorKind) -> Box<dyn StateProcessor> {
    match kind {
        ProcessorKind::Generic => Box::new(GenericProcessor::new()),
        ProcessorKind::DistritoFederal => Box::new(LayoutProcessor::distrito_federal()),
        ProcessorKind::Maranhao => Box::new(LayoutProcessor::maranhao()),
        ProcessorKind::Goias => Box::new(LayoutProcessor::goias()),
        ProcessorKind::MatoGrossoDoSul => Box::new(LayoutProcessor::mato_grosso_do_sul()),
        ProcessorKind::RioDeJaneiro => Box::new(LayoutProcessor::rio_de_janeiro()),
        ProcessorKind::Rondonia => Box::new(RondoniaProcessor::new()),
        ProcessorKind::RioGrandeDoSul => Box::new(RioGrandeDoSulProcessor::new()),
        ProcessorKind::SaoPaulo => Box::new(LayoutProcessor::sao_paulo()),
    }
}

// ============================================================================
// CONTEXT & OUTPUT
// ============================================================================

/// Everything a processor needs besides the file itself
pub struct ProcessContext<'a> {
    pub mapping: &'a StateMapping,
    pub year: i32,
    pub categorizer: &'a Categorizer,
}

impl<'a> ProcessContext<'a> {
    pub fn new(mapping: &'a StateMapping, year: i32, categorizer: &'a Categorizer) -> Self {
        ProcessContext {
            mapping,
            year,
            categorizer,
        }
    }

    pub fn state(&self) -> &str {
        self.mapping.state
    }

    /// Repair, categorize and wrap one selected value.
    ///
    /// `None` when the amount breaks the record invariants.
    pub fn record(&self, organization: Option<&str>, amount: f64) -> Option<ExpenseRecord> {
        let organization = repair_opt(organization);
        let category = self.categorizer.categorize(organization.as_deref());
        let organization = organization.as_deref().unwrap_or(NOT_INFORMED);

        ExpenseRecord::new(self.state(), self.year, organization, &category, amount)
    }
}

/// Per-file counters reported in the run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Data rows the loader accepted
    pub rows_read: usize,
    /// Rows the loader rejected as malformed
    pub rows_skipped: usize,
    /// Records whose value came from the committed column (phase-tagged
    /// layouts: rows in the committed phase)
    pub committed_used: usize,
    /// Records whose value came from the paid column (phase-tagged layouts:
    /// rows in the paid phase)
    pub paid_used: usize,
    /// Rows without any positive value
    pub dropped: usize,
    /// Rows belonging to another year
    pub excluded_by_year: usize,
    /// Aggregate "Total" rows
    pub excluded_totals: usize,
}

impl AddAssign for ExtractionStats {
    fn add_assign(&mut self, other: Self) {
        self.rows_read += other.rows_read;
        self.rows_skipped += other.rows_skipped;
        self.committed_used += other.committed_used;
        self.paid_used += other.paid_used;
        self.dropped += other.dropped;
        self.excluded_by_year += other.excluded_by_year;
        self.excluded_totals += other.excluded_totals;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<ExpenseRecord>,
    pub stats: ExtractionStats,
}

// ============================================================================
// PROCESSOR TRAIT
// ============================================================================

/// StateProcessor - turns one source file into normalized records.
///
/// Implementations only read; storage is the caller's job so that a file's
/// records can be inserted in one transaction.
pub trait StateProcessor: Send + Sync {
    fn process(&self, file_path: &Path, ctx: &ProcessContext) -> Result<Extraction>;

    fn kind(&self) -> ProcessorKind;

    /// Processor version (for provenance in logs)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// SHARED ROW HELPERS
// ============================================================================

/// Which value column a row's amount comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePriority {
    /// Committed, falling back to paid
    CommittedFirst,
    /// Paid, falling back to committed
    PaidFirst,
    CommittedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Committed,
    Paid,
}

impl ValuePriority {
    pub fn select(&self, committed: Option<f64>, paid: Option<f64>) -> Option<(f64, ValueSource)> {
        let committed = committed.map(|v| (v, ValueSource::Committed));
        let paid = paid.map(|v| (v, ValueSource::Paid));
        match self {
            ValuePriority::CommittedFirst => committed.or(paid),
            ValuePriority::PaidFirst => paid.or(committed),
            ValuePriority::CommittedOnly => committed,
        }
    }
}

impl ExtractionStats {
    pub(crate) fn count_source(&mut self, source: ValueSource) {
        match source {
            ValueSource::Committed => self.committed_used += 1,
            ValueSource::Paid => self.paid_used += 1,
        }
    }
}

/// Aggregate rows ("Total", "TOTAL GERAL") start with "total" in their first
/// non-blank cell.
pub fn is_total_row(row: &[String]) -> bool {
    row.iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .map(|c| c.to_lowercase().starts_with("total"))
        .unwrap_or(false)
}
