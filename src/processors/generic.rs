// Generic path: loader cascade → column resolution → committed-first selection

use super::{
    is_total_row, Extraction, ExtractionStats, ProcessContext, ProcessorKind, StateProcessor,
    ValuePriority,
};
use crate::amount::AmountStyle;
use crate::columns::{resolve_columns, ResolvedColumns};
use crate::error::Result;
use crate::loader::{cell, load_csv, CsvTable};
use std::path::Path;
use tracing::{debug, info, warn};

/// Rows inspected when sniffing bare "valor" columns
const SAMPLE_ROWS: usize = 5;

/// Row-level behaviour shared by the generic path and the fixed layouts
#[derive(Debug, Clone, Copy)]
pub struct RowPolicy {
    pub priority: ValuePriority,
    pub amount_style: AmountStyle,
    pub exclude_totals: bool,
    /// Keep only rows whose year column equals the requested year
    pub filter_year: bool,
}

impl Default for RowPolicy {
    fn default() -> Self {
        RowPolicy {
            priority: ValuePriority::CommittedFirst,
            amount_style: AmountStyle::Standard,
            exclude_totals: false,
            filter_year: false,
        }
    }
}

pub struct GenericProcessor;

impl GenericProcessor {
    pub fn new() -> Self {
        GenericProcessor
    }
}

impl Default for GenericProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StateProcessor for GenericProcessor {
    fn process(&self, file_path: &Path, ctx: &ProcessContext) -> Result<Extraction> {
        let table = load_csv(file_path)?;
        let resolved = resolve_columns(
            &table.headers,
            table.sample(SAMPLE_ROWS),
            &ctx.mapping.columns,
            ctx.state(),
        );

        Ok(extract_rows(&table, &resolved, ctx, &RowPolicy::default()))
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Generic
    }
}

/// Turn every row of a loaded table into at most one record.
pub(crate) fn extract_rows(
    table: &CsvTable,
    resolved: &ResolvedColumns,
    ctx: &ProcessContext,
    policy: &RowPolicy,
) -> Extraction {
    let index = |name: &Option<String>| name.as_deref().and_then(|n| table.column_index(n));
    let organization_idx = index(&resolved.organization);
    let committed_idx = index(&resolved.committed_value);
    let paid_idx = index(&resolved.paid_value);
    let year_idx = index(&resolved.year);

    if committed_idx.is_none() && paid_idx.is_none() {
        warn!(
            state = ctx.state(),
            path = %table.path.display(),
            "no value column resolved, file yields no records"
        );
    }
    if policy.filter_year && year_idx.is_none() {
        debug!(state = ctx.state(), "year filter requested but no year column, keeping all rows");
    }

    let mut stats = ExtractionStats {
        rows_read: table.rows.len(),
        rows_skipped: table.skipped_rows,
        ..ExtractionStats::default()
    };
    let mut records = Vec::new();

    for row in &table.rows {
        if policy.exclude_totals && is_total_row(row) {
            stats.excluded_totals += 1;
            continue;
        }

        if policy.filter_year {
            if let Some(year) = cell(row, year_idx) {
                if parse_year(year) != Some(ctx.year) {
                    stats.excluded_by_year += 1;
                    continue;
                }
            }
        }

        let committed = cell(row, committed_idx).and_then(|c| policy.amount_style.parse(c));
        let paid = cell(row, paid_idx).and_then(|c| policy.amount_style.parse(c));

        let record = policy
            .priority
            .select(committed, paid)
            .and_then(|(amount, source)| {
                ctx.record(cell(row, organization_idx), amount)
                    .map(|r| (r, source))
            });

        match record {
            Some((record, source)) => {
                stats.count_source(source);
                records.push(record);
            }
            None => stats.dropped += 1,
        }
    }

    info!(
        state = ctx.state(),
        year = ctx.year,
        records = records.len(),
        committed = stats.committed_used,
        paid = stats.paid_used,
        dropped = stats.dropped,
        "rows extracted"
    );

    Extraction { records, stats }
}

/// Year out of cells like "2024", "2.024", "2024/03" or "31/12/2024"
pub(crate) fn parse_year(cell: &str) -> Option<i32> {
    let digits: String = cell.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        return digits.parse().ok();
    }

    // Dates and year/month cells: first 20xx run of four digits
    cell.split(|c: char| !c.is_ascii_digit())
        .find(|part| part.len() == 4 && part.starts_with("20"))
        .and_then(|part| part.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::Categorizer;
    use crate::mapping;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_committed_value_preferred() {
        let file = csv_file(
            "Exercício,Unidade gestora,Valor empenhado final,Valor pago final\n\
             2024,Secretaria da Saúde,\"1.500,00\",\"1.200,00\"\n\
             2024,Secretaria da Educação,,\"800,00\"\n\
             2024,Fun??o,0,0\n",
        );
        let categorizer = Categorizer::new();
        let ctx = ProcessContext::new(mapping::lookup("CE").unwrap(), 2024, &categorizer);

        let extraction = GenericProcessor::new().process(file.path(), &ctx).unwrap();
        let records = &extraction.records;

        assert_eq!(records.len(), 2, "zero-value row must be dropped, not stored");
        assert_eq!(records[0].amount, 1500.0);
        assert_eq!(records[0].standardized_category, "Saúde");
        assert_eq!(records[1].amount, 800.0);
        assert_eq!(records[1].state, "CE");

        assert_eq!(extraction.stats.rows_read, 3);
        assert_eq!(extraction.stats.committed_used, 1);
        assert_eq!(extraction.stats.paid_used, 1);
        assert_eq!(extraction.stats.dropped, 1);
        assert!(records.iter().all(|r| r.amount > 0.0));

        println!("✅ Generic processor test PASSED");
    }

    #[test]
    fn test_missing_organization_uses_sentinel() {
        let file = csv_file("Orgao;Pago;Empenhado\n;10;\n");
        let categorizer = Categorizer::new();
        let ctx = ProcessContext::new(mapping::lookup("PA").unwrap(), 2022, &categorizer);

        let extraction = GenericProcessor::new().process(file.path(), &ctx).unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].organization, "Não informado");
        assert_eq!(extraction.records[0].standardized_category, "Other");
        assert_eq!(extraction.records[0].date.to_string(), "2022-01-01");
    }

    #[test]
    fn test_unresolvable_file_yields_zero_records() {
        let file = csv_file("foo,bar\n1,2\n");
        let categorizer = Categorizer::new();
        let ctx = ProcessContext::new(mapping::lookup("PE").unwrap(), 2024, &categorizer);

        let extraction = GenericProcessor::new().process(file.path(), &ctx).unwrap();
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.stats.dropped, 1);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2024"), Some(2024));
        assert_eq!(parse_year(" 2.024 "), Some(2024));
        assert_eq!(parse_year("2023/05"), Some(2023));
        assert_eq!(parse_year("31/12/2021"), Some(2021));
        assert_eq!(parse_year("abc"), None);
    }
}
