// 📐 Fixed layouts - states whose exports need header or row surgery
//
//   DF  ';' delimited, paid value preferred, "Total" rows
//   MA  title block before the header, no usable column names configured
//   GO  BI export headers "Table[Column]", year column, ambiguous grouping
//   MS  two title lines, "Total" rows
//   RJ  corrupted header names ("Fun??o")
//   SP  one title line, committed value only, "Total" rows
//
// Everything after header handling is the generic row loop.

use super::generic::{extract_rows, RowPolicy};
use super::{Extraction, ProcessContext, ProcessorKind, StateProcessor, ValuePriority};
use crate::amount::AmountStyle;
use crate::columns::{resolve_columns, COMMITTED_KEYWORDS, ORGANIZATION_KEYWORDS, PAID_KEYWORDS};
use crate::error::Result;
use crate::loader::{load_csv_with, HeaderRow, LoadOptions};
use crate::mapping::ColumnMapping;
use crate::repair::repair;
use std::path::Path;
use tracing::debug;

const SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRewrite {
    Keep,
    /// "View Execucao Orcamentaria Visao Geral[Nome Orgao]" → "Nome Orgao"
    BracketSuffix,
    /// Run Text Repair over each header name
    Repair,
}

impl HeaderRewrite {
    pub fn apply(&self, header: &str) -> String {
        match self {
            HeaderRewrite::Keep => header.to_string(),
            HeaderRewrite::BracketSuffix => bracket_suffix(header),
            HeaderRewrite::Repair => repair(header),
        }
    }
}

fn bracket_suffix(header: &str) -> String {
    let trimmed = header.trim();
    match (trimmed.rfind('['), trimmed.ends_with(']')) {
        (Some(open), true) => trimmed[open + 1..trimmed.len() - 1].trim().to_string(),
        _ => header.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct LayoutProcessor {
    kind: ProcessorKind,
    load: LoadOptions,
    rewrite: HeaderRewrite,
    policy: RowPolicy,
    /// Ignore the configured names and rely on detection alone
    detect_only: bool,
}

impl LayoutProcessor {
    pub fn distrito_federal() -> Self {
        LayoutProcessor {
            kind: ProcessorKind::DistritoFederal,
            load: LoadOptions {
                header: HeaderRow::First,
                delimiter: Some(b';'),
            },
            rewrite: HeaderRewrite::Keep,
            policy: RowPolicy {
                priority: ValuePriority::PaidFirst,
                exclude_totals: true,
                ..RowPolicy::default()
            },
            detect_only: false,
        }
    }

    pub fn maranhao() -> Self {
        LayoutProcessor {
            kind: ProcessorKind::Maranhao,
            load: LoadOptions {
                header: HeaderRow::Matching(looks_like_header),
                delimiter: None,
            },
            rewrite: HeaderRewrite::Keep,
            policy: RowPolicy {
                exclude_totals: true,
                ..RowPolicy::default()
            },
            detect_only: true,
        }
    }

    pub fn goias() -> Self {
        LayoutProcessor {
            kind: ProcessorKind::Goias,
            load: LoadOptions::default(),
            rewrite: HeaderRewrite::BracketSuffix,
            policy: RowPolicy {
                amount_style: AmountStyle::Lenient,
                filter_year: true,
                ..RowPolicy::default()
            },
            detect_only: false,
        }
    }

    pub fn mato_grosso_do_sul() -> Self {
        LayoutProcessor {
            kind: ProcessorKind::MatoGrossoDoSul,
            load: LoadOptions {
                header: HeaderRow::AfterLines(2),
                delimiter: None,
            },
            rewrite: HeaderRewrite::Keep,
            policy: RowPolicy {
                exclude_totals: true,
                ..RowPolicy::default()
            },
            detect_only: false,
        }
    }

    pub fn rio_de_janeiro() -> Self {
        LayoutProcessor {
            kind: ProcessorKind::RioDeJaneiro,
            load: LoadOptions::default(),
            rewrite: HeaderRewrite::Repair,
            policy: RowPolicy {
                priority: ValuePriority::CommittedOnly,
                ..RowPolicy::default()
            },
            detect_only: false,
        }
    }

    pub fn sao_paulo() -> Self {
        LayoutProcessor {
            kind: ProcessorKind::SaoPaulo,
            load: LoadOptions {
                header: HeaderRow::AfterLines(1),
                delimiter: None,
            },
            rewrite: HeaderRewrite::Keep,
            policy: RowPolicy {
                priority: ValuePriority::CommittedOnly,
                exclude_totals: true,
                ..RowPolicy::default()
            },
            detect_only: false,
        }
    }
}

impl StateProcessor for LayoutProcessor {
    fn process(&self, file_path: &Path, ctx: &ProcessContext) -> Result<Extraction> {
        let mut table = load_csv_with(file_path, &self.load)?;

        let mapping = if self.detect_only {
            ColumnMapping::default()
        } else if self.rewrite == HeaderRewrite::Keep {
            ctx.mapping.columns.clone()
        } else {
            table.headers = table.headers.iter().map(|h| self.rewrite.apply(h)).collect();
            ctx.mapping.columns.rewritten(|n| self.rewrite.apply(n))
        };
        debug!(state = ctx.state(), layout = self.kind.name(), headers = ?table.headers, "layout headers");

        let resolved = resolve_columns(&table.headers, table.sample(SAMPLE_ROWS), &mapping, ctx.state());
        Ok(extract_rows(&table, &resolved, ctx, &self.policy))
    }

    fn kind(&self) -> ProcessorKind {
        self.kind
    }
}

/// A real header names an organizational unit and a value column
fn looks_like_header(row: &[String]) -> bool {
    let lower: Vec<String> = row.iter().map(|c| c.to_lowercase()).collect();
    let has = |keywords: &[&str]| lower.iter().any(|c| keywords.iter().any(|k| c.contains(k)));

    has(ORGANIZATION_KEYWORDS) && (has(COMMITTED_KEYWORDS) || has(PAID_KEYWORDS) || has(&["valor"]))
}
