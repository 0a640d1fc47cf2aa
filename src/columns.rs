// 🔍 Column Resolver - configured names first, keyword detection second
//
// Resolution never fails: a slot that can't be matched stays `None` and the
// processor simply yields no values from it.

use crate::mapping::ColumnMapping;
use serde::Serialize;
use tracing::{debug, info};

/// Header fragments that identify the organizational-unit column
pub const ORGANIZATION_KEYWORDS: &[&str] = &[
    "orgao", "órgão", "organ", "secretaria", "unidade", "gestora", "função", "funcao", "ação",
    "acao", "descricao", "descrição",
];

pub const COMMITTED_KEYWORDS: &[&str] = &["empenhado", "empenho"];

pub const PAID_KEYWORDS: &[&str] = &["pago", "pagamento", "valor final", "valor pago", "vlpago"];

/// Cells inspected when a bare "valor" column needs disambiguating
const SNIFF_ROWS: usize = 5;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedColumns {
    pub organization: Option<String>,
    pub committed_value: Option<String>,
    pub paid_value: Option<String>,
    pub year: Option<String>,
    /// Slots filled by keyword detection instead of the configured name
    pub detected_slots: Vec<&'static str>,
}

impl ResolvedColumns {
    pub fn has_value_column(&self) -> bool {
        self.committed_value.is_some() || self.paid_value.is_some()
    }
}

/// Every candidate per slot, in header order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSuggestions {
    pub organization: Vec<String>,
    pub committed_value: Vec<String>,
    pub paid_value: Vec<String>,
}

// ============================================================================
// DETECTION
// ============================================================================

/// Keyword-based candidates for each slot.
///
/// Committed keywords are checked before paid ones. A column named "valor"
/// with neither qualifier goes to committed when the word "empenhado" appears
/// in its first few cells, otherwise to paid.
pub fn detect_columns(headers: &[String], sample_rows: &[Vec<String>]) -> ColumnSuggestions {
    let mut suggestions = ColumnSuggestions::default();

    for (index, header) in headers.iter().enumerate() {
        let lower = header.to_lowercase();

        if contains_any(&lower, ORGANIZATION_KEYWORDS) {
            suggestions.organization.push(header.clone());
        }

        if contains_any(&lower, COMMITTED_KEYWORDS) {
            suggestions.committed_value.push(header.clone());
        } else if contains_any(&lower, PAID_KEYWORDS) {
            suggestions.paid_value.push(header.clone());
        } else if lower.contains("valor") {
            if sample_mentions_committed(sample_rows, index) {
                suggestions.committed_value.push(header.clone());
            } else {
                suggestions.paid_value.push(header.clone());
            }
        }
    }

    suggestions
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

fn sample_mentions_committed(rows: &[Vec<String>], index: usize) -> bool {
    rows.iter()
        .take(SNIFF_ROWS)
        .filter_map(|row| row.get(index))
        .any(|cell| cell.to_lowercase().contains("empenhado"))
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Resolve the physical columns for one file.
///
/// 1. A configured name present verbatim in the header is used as-is.
/// 2. A configured name missing from the header is replaced by the first
///    detected candidate for that slot.
/// 3. If organization is still unresolved, or neither value slot is, every
///    remaining empty slot is filled from detection.
///
/// The year slot is only ever taken from the configuration.
pub fn resolve_columns(
    headers: &[String],
    sample_rows: &[Vec<String>],
    mapping: &ColumnMapping,
    state: &str,
) -> ResolvedColumns {
    let present = |name: Option<&str>| {
        name.filter(|n| headers.iter().any(|h| h == n))
            .map(str::to_string)
    };

    let mut resolved = ResolvedColumns {
        organization: present(mapping.organization.as_deref()),
        committed_value: present(mapping.committed_value.as_deref()),
        paid_value: present(mapping.paid_value.as_deref()),
        year: present(mapping.year.as_deref()),
        detected_slots: Vec::new(),
    };

    let mut suggestions: Option<ColumnSuggestions> = None;
    let mut detect = || -> ColumnSuggestions {
        suggestions
            .get_or_insert_with(|| {
                debug!(state, "running column auto-detection");
                detect_columns(headers, sample_rows)
            })
            .clone()
    };

    let misses = [
        ("organization", mapping.organization.as_deref(), resolved.organization.is_none()),
        ("committed_value", mapping.committed_value.as_deref(), resolved.committed_value.is_none()),
        ("paid_value", mapping.paid_value.as_deref(), resolved.paid_value.is_none()),
    ];
    for (slot, configured, missing) in misses {
        if let (Some(name), true) = (configured, missing) {
            info!(state, slot, column = name, "configured column not in header, detecting");
            let found = detect();
            fill_slot(&mut resolved, slot, &found);
        }
    }

    if resolved.organization.is_none() || !resolved.has_value_column() {
        info!(state, "incomplete mapping, detecting all remaining columns");
        let found = detect();
        for slot in ["organization", "committed_value", "paid_value"] {
            fill_slot(&mut resolved, slot, &found);
        }
    }

    debug!(
        state,
        organization = ?resolved.organization,
        committed = ?resolved.committed_value,
        paid = ?resolved.paid_value,
        "columns resolved"
    );

    resolved
}

fn fill_slot(resolved: &mut ResolvedColumns, slot: &'static str, found: &ColumnSuggestions) {
    let (target, candidates) = match slot {
        "organization" => (&mut resolved.organization, &found.organization),
        "committed_value" => (&mut resolved.committed_value, &found.committed_value),
        "paid_value" => (&mut resolved.paid_value, &found.paid_value),
        _ => return,
    };

    if target.is_none() {
        if let Some(first) = candidates.first() {
            *target = Some(first.clone());
            resolved.detected_slots.push(slot);
        }
    }
}
