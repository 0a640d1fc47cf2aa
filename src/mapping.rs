// 🗺️ Per-state column mapping - static registry of the 27 export layouts
//
// Column names are copied from the headers each state portal actually ships,
// including their quirks (trailing non-breaking spaces in MG, U+FFFD in RJ
// and TO, BI-tool prefixes in GO). `None` means "detect automatically" or
// "not published by this state".

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::OnceLock;

// ============================================================================
// TYPES
// ============================================================================

type ColumnName = Option<Cow<'static, str>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ColumnMapping {
    pub organization: ColumnName,
    pub committed_value: ColumnName,
    pub paid_value: ColumnName,
    pub year: ColumnName,
}

impl ColumnMapping {
    pub const fn new(
        organization: Option<&'static str>,
        committed_value: Option<&'static str>,
        paid_value: Option<&'static str>,
        year: Option<&'static str>,
    ) -> Self {
        ColumnMapping {
            organization: borrowed(organization),
            committed_value: borrowed(committed_value),
            paid_value: borrowed(paid_value),
            year: borrowed(year),
        }
    }

    /// Same mapping with every configured name passed through `rewrite`,
    /// for layouts whose headers are rewritten before matching.
    pub fn rewritten(&self, rewrite: impl Fn(&str) -> String) -> ColumnMapping {
        let apply = |name: &ColumnName| name.as_deref().map(|n| Cow::Owned(rewrite(n)));
        ColumnMapping {
            organization: apply(&self.organization),
            committed_value: apply(&self.committed_value),
            paid_value: apply(&self.paid_value),
            year: apply(&self.year),
        }
    }
}

const fn borrowed(name: Option<&'static str>) -> ColumnName {
    match name {
        Some(n) => Some(Cow::Borrowed(n)),
        None => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateMapping {
    /// Two-letter uppercase code
    pub state: &'static str,
    pub name: &'static str,
    pub columns: ColumnMapping,
}

impl StateMapping {
    /// Glob (relative to the CSV directory) that finds this state's files
    pub fn file_pattern(&self) -> String {
        format!("*{}*.csv", self.state)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// All configured states, in processing order
pub fn all_states() -> &'static [StateMapping] {
    STATE_MAPPINGS
}

/// Case-insensitive lookup by state code
pub fn lookup(state: &str) -> Option<&'static StateMapping> {
    static INDEX: OnceLock<BTreeMap<&'static str, &'static StateMapping>> = OnceLock::new();

    let index = INDEX.get_or_init(|| STATE_MAPPINGS.iter().map(|m| (m.state, m)).collect());
    index.get(state.trim().to_ascii_uppercase().as_str()).copied()
}

pub fn is_configured(state: &str) -> bool {
    lookup(state).is_some()
}

const fn columns(
    organization: Option<&'static str>,
    paid_value: Option<&'static str>,
    committed_value: Option<&'static str>,
    year: Option<&'static str>,
) -> ColumnMapping {
    ColumnMapping::new(organization, committed_value, paid_value, year)
}

const fn state(state: &'static str, name: &'static str, columns: ColumnMapping) -> StateMapping {
    StateMapping { state, name, columns }
}

// Argument order below: organization, paid, committed, year
const STATE_MAPPINGS: &[StateMapping] = &[
    state("AC", "Acre", columns(Some("descricao"), Some("pago"), Some("empenhado"), None)),
    state(
        "AL",
        "Alagoas",
        columns(Some("orgao_descricao"), Some("total_pago"), Some("total_empenhado"), Some("data_final")),
    ),
    state(
        "AP",
        "Amapá",
        columns(Some("NOME_UNIDADE_GESTORA"), Some("VAL_PAGO"), Some("VAL_EMPENHADO"), Some("ANO")),
    ),
    state("AM", "Amazonas", columns(Some("Função"), Some("Pago"), Some("Empenhado"), None)),
    state(
        "BA",
        "Bahia",
        columns(Some("Órgão"), Some("Valor Pago"), Some("Valor Empenhado"), Some("Ano")),
    ),
    state(
        "CE",
        "Ceará",
        columns(
            Some("Unidade gestora"),
            Some("Valor pago final"),
            Some("Valor empenhado final"),
            Some("Exercício"),
        ),
    ),
    state("DF", "Distrito Federal", columns(Some("Unidade Gestora"), Some("Valor Final"), None, None)),
    state("ES", "Espírito Santo", columns(Some("Descricao"), Some("Pago"), Some("Empenhado"), None)),
    state(
        "GO",
        "Goiás",
        columns(
            Some("View Execucao Orcamentaria Visao Geral[Nome Orgao]"),
            Some("View Execucao Orcamentaria Visao Geral[Valor Pago]"),
            Some("View Execucao Orcamentaria Visao Geral[Valor Empenho]"),
            Some("View Execucao Orcamentaria Visao Geral[Numero Ano]"),
        ),
    ),
    state("MA", "Maranhão", columns(None, None, None, None)),
    state(
        "MT",
        "Mato Grosso",
        columns(Some("Função"), Some("Valor Pagamento"), Some("Valor Empenho"), None),
    ),
    state("MS", "Mato Grosso do Sul", columns(Some("Orgão"), Some("Pago"), Some("Empenhado"), None)),
    state(
        "MG",
        "Minas Gerais",
        columns(Some("Órgão\u{a0}"), Some("Valor Pago\u{a0}"), Some("Valor Empenhado\u{a0}"), None),
    ),
    state("PA", "Pará", columns(Some("Orgao"), Some("Pago"), Some("Empenhado"), Some("Ano"))),
    state(
        "PB",
        "Paraíba",
        columns(Some("ORGAO"), Some("VALOR PAGO"), Some("VALOR EMPENHADO"), Some("ANO")),
    ),
    state("PR", "Paraná", columns(Some("Unidade Gestora"), Some("Pago"), Some("Empenhado"), None)),
    state("PE", "Pernambuco", columns(None, None, None, None)),
    state("PI", "Piauí", columns(Some("Orgão"), Some("Pago"), Some("Empenhado"), Some("Data"))),
    state(
        "RJ",
        "Rio de Janeiro",
        columns(Some("Fun\u{FFFD}\u{FFFD}o"), None, Some("Valor Empenhado"), None),
    ),
    state(
        "RN",
        "Rio Grande do Norte",
        columns(Some("Função"), Some("Valor Pagamento"), Some("Valor Empenhado"), None),
    ),
    state("RS", "Rio Grande do Sul", columns(Some("Órgão"), Some("Valor"), None, Some("Ano"))),
    state(
        "RO",
        "Rondônia",
        columns(Some("Secretaria"), Some("DespesaPaga"), Some("DespesaEmpenhada"), None),
    ),
    state(
        "RR",
        "Roraima",
        columns(Some("desOrgao"), Some("valorPago"), Some("valorEmpenhado"), None),
    ),
    state(
        "SC",
        "Santa Catarina",
        columns(Some("nmunidadegestora"), Some("vlpago"), Some("vlempenhado"), Some("nuano")),
    ),
    state("SP", "São Paulo", columns(Some("Ação"), None, Some("Empenhado"), None)),
    state(
        "SE",
        "Sergipe",
        columns(Some("UNIDADE GOVERNAMENTAL"), Some("PAGO"), Some("EMPENHADO"), Some("ANO/MÊS")),
    ),
    state("TO", "Tocantins", columns(Some("FUN\u{FFFD}\u{FFFD}O"), Some("PAGO"), Some("EMPENHADO"), None)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_27_unique_states() {
        let states = all_states();
        assert_eq!(states.len(), 27);

        let mut codes: Vec<&str> = states.iter().map(|m| m.state).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 27, "duplicate state code in registry");
        assert!(codes.iter().all(|c| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_uppercase())));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let ce = lookup("ce").unwrap();
        assert_eq!(ce.state, "CE");
        assert_eq!(ce.columns.committed_value.as_deref(), Some("Valor empenhado final"));
        assert_eq!(ce.columns.paid_value.as_deref(), Some("Valor pago final"));
        assert!(lookup("XX").is_none());
        assert!(!is_configured(""));
    }

    #[test]
    fn test_unmapped_states_have_null_slots() {
        for code in ["MA", "PE"] {
            assert_eq!(lookup(code).unwrap().columns, ColumnMapping::default());
        }
    }

    #[test]
    fn test_rewritten_mapping() {
        let go = lookup("GO").unwrap();
        let short = go.columns.rewritten(|n| n.to_lowercase());
        assert_eq!(
            short.year.as_deref(),
            Some("view execucao orcamentaria visao geral[numero ano]")
        );
        assert_eq!(lookup("RS").unwrap().columns.rewritten(str::to_string).committed_value, None);
    }

    #[test]
    fn test_file_pattern() {
        assert_eq!(lookup("SP").unwrap().file_pattern(), "*SP*.csv");
    }
}
