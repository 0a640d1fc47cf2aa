// Rondônia: fixed columns, comma-decimal values without reliable grouping

use super::{Extraction, ExtractionStats, ProcessContext, ProcessorKind, StateProcessor, ValuePriority};
use crate::amount::parse_amount_lenient;
use crate::error::Result;
use crate::loader::{cell, load_csv};
use std::path::Path;
use tracing::info;

const ORGANIZATION: &str = "Secretaria";
const COMMITTED: &str = "DespesaEmpenhada";
const PAID: &str = "DespesaPaga";

pub struct RondoniaProcessor;

impl RondoniaProcessor {
    pub fn new() -> Self {
        RondoniaProcessor
    }
}

impl Default for RondoniaProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StateProcessor for RondoniaProcessor {
    fn process(&self, file_path: &Path, ctx: &ProcessContext) -> Result<Extraction> {
        let table = load_csv(file_path)?;

        let organization_idx = table.require_column(ORGANIZATION)?;
        let committed_idx = table.require_column(COMMITTED)?;
        let paid_idx = table.require_column(PAID)?;

        let mut stats = ExtractionStats {
            rows_read: table.rows.len(),
            rows_skipped: table.skipped_rows,
            ..ExtractionStats::default()
        };
        let mut records = Vec::new();

        for row in &table.rows {
            // Short rows were padded by the loader: blank organization falls
            // back to the sentinel, blank values to nothing
            let committed = cell(row, Some(committed_idx)).and_then(parse_amount_lenient);
            let paid = cell(row, Some(paid_idx)).and_then(parse_amount_lenient);

            let selected = ValuePriority::CommittedFirst
                .select(committed, paid)
                .and_then(|(amount, source)| {
                    ctx.record(cell(row, Some(organization_idx)), amount)
                        .map(|r| (r, source))
                });

            match selected {
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
            rows = stats.rows_read,
            records = records.len(),
            committed = stats.committed_used,
            paid = stats.paid_used,
            "Rondônia rows extracted"
        );

        Ok(Extraction { records, stats })
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Rondonia
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::Categorizer;
    use crate::error::EtlError;
    use crate::mapping;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn run(content: &str, year: i32) -> Result<Extraction> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();

        let categorizer = Categorizer::new();
        let ctx = ProcessContext::new(mapping::lookup("RO").unwrap(), year, &categorizer);
        RondoniaProcessor::new().process(file.path(), &ctx)
    }

    #[test]
    fn test_rondonia_committed_then_paid() {
        let extraction = run(
            "Secretaria,DespesaEmpenhada,DespesaPaga\n\
             SESAU,\"1500,50\",\"1000,00\"\n\
             SEDUC,0,\"250,25\"\n\
             SEFIN,0,0\n\
             SEJUS,abc,\n",
            2024,
        )
        .unwrap();

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].amount, 1500.5);
        assert_eq!(extraction.records[1].amount, 250.25);
        assert_eq!(extraction.stats.committed_used, 1);
        assert_eq!(extraction.stats.paid_used, 1);
        assert_eq!(extraction.stats.dropped, 2);
    }

    #[test]
    fn test_rondonia_grouped_value_and_short_row() {
        let extraction = run(
            "Secretaria,DespesaEmpenhada,DespesaPaga\n\
             \"Secretaria de Estado da Saúde\",\"1.234.567,89\",\n\
             ,\"10,00\"\n",
            2022,
        )
        .unwrap();

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].amount, 1234567.89);
        assert_eq!(extraction.records[0].standardized_category, "Saúde");
        assert_eq!(extraction.records[1].organization, "Não informado");
        assert_eq!(extraction.records[1].date.to_string(), "2022-01-01");
    }

    #[test]
    fn test_rondonia_missing_column_fails_file() {
        let result = run("Secretaria,Valor\nX,1\n", 2024);
        assert!(matches!(result, Err(EtlError::MissingColumn { .. })));
    }
}
