// Rio Grande do Sul: multi-year file, one "Valor" column tagged by expense phase

use super::{Extraction, ExtractionStats, ProcessContext, ProcessorKind, StateProcessor};
use crate::amount::parse_amount;
use crate::error::Result;
use crate::loader::{cell, load_csv};
use std::path::Path;
use tracing::info;

const YEAR: &str = "Ano";
const ORGANIZATION: &str = "Órgão";
const VALUE: &str = "Valor";
const PHASE: &str = "Fase Gasto";

pub struct RioGrandeDoSulProcessor;

impl RioGrandeDoSulProcessor {
    pub fn new() -> Self {
        RioGrandeDoSulProcessor
    }
}

impl Default for RioGrandeDoSulProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StateProcessor for RioGrandeDoSulProcessor {
    fn process(&self, file_path: &Path, ctx: &ProcessContext) -> Result<Extraction> {
        let mut table = load_csv(file_path)?;
        table.headers = table
            .headers
            .iter()
            .map(|h| h.replace('\u{feff}', "").trim().to_string())
            .collect();

        let year_idx = table.require_column(YEAR)?;
        let organization_idx = table.require_column(ORGANIZATION)?;
        let value_idx = table.require_column(VALUE)?;
        let phase_idx = table.column_index(PHASE);

        let mut stats = ExtractionStats {
            rows_read: table.rows.len(),
            rows_skipped: table.skipped_rows,
            ..ExtractionStats::default()
        };
        let mut records = Vec::new();

        for row in &table.rows {
            let row_year = cell(row, Some(year_idx)).and_then(|y| y.trim().parse::<i32>().ok());
            if row_year != Some(ctx.year) {
                stats.excluded_by_year += 1;
                continue;
            }

            // Phase counts cover every row of the year, valued or not
            let phase = cell(row, phase_idx).map(str::to_lowercase).unwrap_or_default();
            if phase.contains("empenhado") {
                stats.committed_used += 1;
            } else if phase.contains("pago") {
                stats.paid_used += 1;
            }

            let record = cell(row, Some(value_idx))
                .and_then(parse_amount)
                .and_then(|amount| ctx.record(cell(row, Some(organization_idx)), amount));

            match record {
                Some(record) => records.push(record),
                None => stats.dropped += 1,
            }
        }

        info!(
            state = ctx.state(),
            year = ctx.year,
            rows = stats.rows_read,
            other_years = stats.excluded_by_year,
            committed_phase = stats.committed_used,
            paid_phase = stats.paid_used,
            records = records.len(),
            "Rio Grande do Sul rows extracted"
        );

        Ok(Extraction { records, stats })
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::RioGrandeDoSul
    }
}
