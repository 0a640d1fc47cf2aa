// 🏷️ Categorizer - organization name → standardized policy area
// Weighted keyword scoring over a fixed category table (categories as data)

use crate::error::{EtlError, Result};
use crate::model::OTHER_CATEGORY;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

// ============================================================================
// CATEGORY DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    /// Standardized label stored in the destination table
    pub name: String,

    /// Points per generic keyword hit (compound hits count double)
    pub base_weight: u32,

    /// Generic keywords, matched as lowercase substrings
    #[serde(default)]
    pub keywords: Vec<String>,

    /// High-specificity multi-word phrases
    #[serde(default)]
    pub compound_keywords: Vec<String>,
}

impl CategoryDefinition {
    /// Score `text` (already lowercased) against this definition.
    pub fn score(&self, text: &str) -> CategoryScore {
        let generic_hits = self
            .keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .count();
        let compound_hits = self
            .compound_keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .count();

        // u64 with saturation: weights come from user-supplied JSON
        let weight = u64::from(self.base_weight);
        let score = weight
            .saturating_mul(generic_hits as u64)
            .saturating_add(weight.saturating_mul(2).saturating_mul(compound_hits as u64));

        CategoryScore {
            category: self.name.clone(),
            score,
            hits: generic_hits + compound_hits,
        }
    }

    fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.keywords = normalize_keywords(self.keywords);
        self.compound_keywords = normalize_keywords(self.compound_keywords);
        self
    }
}

fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

// ============================================================================
// SCORE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: u64,
    /// Distinct keywords (generic + compound) found in the text
    pub hits: usize,
}

impl CategoryScore {
    /// Ranking used to pick the winner: higher score, then more distinct
    /// hits, then the lexicographically smaller name.
    fn rank(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then(self.hits.cmp(&other.hits))
            .then_with(|| other.category.cmp(&self.category))
    }
}

// ============================================================================
// CATEGORIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct Categorizer {
    definitions: Vec<CategoryDefinition>,
}

impl Categorizer {
    /// Categorizer over the compiled-in category table
    pub fn new() -> Self {
        let definitions = BUILTIN_CATEGORIES
            .iter()
            .map(|c| CategoryDefinition {
                name: c.name.to_string(),
                base_weight: c.base_weight,
                keywords: c.keywords.iter().map(|k| k.to_string()).collect(),
                compound_keywords: c.compound_keywords.iter().map(|k| k.to_string()).collect(),
            })
            .map(CategoryDefinition::normalized)
            .collect();

        Categorizer { definitions }
    }

    /// Load definitions from a JSON array of `CategoryDefinition`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let definitions: Vec<CategoryDefinition> = serde_json::from_str(&content)?;
        Categorizer::from_definitions(definitions)
    }

    /// Build from explicit definitions. Names must be unique and non-empty,
    /// weights positive.
    pub fn from_definitions(definitions: Vec<CategoryDefinition>) -> Result<Self> {
        let definitions: Vec<CategoryDefinition> = definitions
            .into_iter()
            .map(CategoryDefinition::normalized)
            .collect();

        if definitions.is_empty() {
            return Err(EtlError::InvalidConfig("no category definitions".to_string()));
        }

        for (i, def) in definitions.iter().enumerate() {
            if def.name.is_empty() {
                return Err(EtlError::InvalidConfig(format!("category #{} has an empty name", i)));
            }
            if def.base_weight == 0 {
                return Err(EtlError::InvalidConfig(format!(
                    "category '{}' has zero base weight",
                    def.name
                )));
            }
            if definitions[..i].iter().any(|d| d.name == def.name) {
                return Err(EtlError::InvalidConfig(format!(
                    "category '{}' is defined twice",
                    def.name
                )));
            }
        }

        Ok(Categorizer { definitions })
    }

    pub fn definitions(&self) -> &[CategoryDefinition] {
        &self.definitions
    }

    pub fn category_count(&self) -> usize {
        self.definitions.len()
    }

    /// Every category with a positive score, best first
    pub fn scores(&self, organization: &str) -> Vec<CategoryScore> {
        let text = organization.to_lowercase();

        let mut scores: Vec<CategoryScore> = self
            .definitions
            .iter()
            .map(|d| d.score(&text))
            .filter(|s| s.score > 0)
            .collect();

        scores.sort_by(|a, b| b.rank(a));
        scores
    }

    /// Standardized category for an organization name; `"Other"` when the
    /// name is missing, blank or matches nothing.
    pub fn categorize(&self, organization: Option<&str>) -> String {
        let text = match organization.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return OTHER_CATEGORY.to_string(),
        };

        self.scores(text)
            .into_iter()
            .next()
            .map(|s| s.category)
            .unwrap_or_else(|| OTHER_CATEGORY.to_string())
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BUILT-IN CATEGORY TABLE
// ============================================================================
// Keyword lists keep the corrupted spellings ("educa??o", "sa�de") so that
// raw text scores the same as repaired text.

struct BuiltinCategory {
    name: &'static str,
    base_weight: u32,
    keywords: &'static [&'static str],
    compound_keywords: &'static [&'static str],
}

const BUILTIN_CATEGORIES: &[BuiltinCategory] = &[
    BuiltinCategory {
        name: "Tecnologia da Informação e Inovação",
        base_weight: 100,
        keywords: &[
            "tecnologia", "informação", "informacao", "informa��o", "informa??o", "informatica",
            "inform�tica", "inform?tica", "tic", "inovação", "inovacao", "inova��o", "inova??o",
            "ciência", "ciencia", "ci�ncia", "ci?ncia", "modernização", "modernizacao",
            "moderniza��o", "moderniza??o", "transformação digital", "transforma��o digital",
            "transforma??o digital", "secretaria de ciência", "secretaria de ci�ncia",
            "secretaria de ci?ncia", "secretaria de tecnologia",
        ],
        compound_keywords: &[
            "ciência, tecnologia", "ci�ncia, tecnologia", "ci?ncia, tecnologia",
            "tecnologia e inovação", "tecnologia e inova��o", "tecnologia e inova??o",
            "desenvolvimento, ciência, tecnologia",
            "inovação, modernização e transformação digital",
            "inova��o, moderniza��o e transforma��o digital",
            "inova??o, moderniza??o e transforma??o digital",
        ],
    },
    BuiltinCategory {
        name: "Educação",
        base_weight: 90,
        keywords: &[
            "educação", "educacao", "educa��o", "educa??o", "educac?o", "educaã§ã£o", "escola",
            "colégio", "colegio", "col�gio", "ensino", "universidade", "educacional",
            "secretaria de educação", "secretaria de educa��o", "secretaria de educa??o",
            "secretaria da educação", "secretaria da educa��o", "secretaria da educa??o",
            "fundo de educação", "fundo de educa��o", "fundo de educa??o",
            "instituto de educação", "instituto de educa��o", "instituto de educa??o",
        ],
        compound_keywords: &[
            "secretaria estadual de educação", "secretaria estadual de educa��o",
            "secretaria estadual de educa??o", "fundo estadual de educação",
            "fundo estadual de educa��o", "fundo estadual de educa??o",
            "secretaria de estado da educa��o", "secretaria de estado da educa??o",
        ],
    },
    BuiltinCategory {
        name: "Saúde",
        base_weight: 90,
        keywords: &[
            "saúde", "saude", "sa�de", "sa?de", "sauìde", "hospital", "médico", "medico",
            "m�dico", "m?dico", "medicamento", "sus", "vigilância sanitária",
            "vigilancia sanitaria", "vigil�ncia sanit�ria", "vigil?ncia sanit?ria",
            "fundo de saúde", "fundo de sa�de", "fundo de sa?de", "secretaria de saúde",
            "secretaria de sa�de", "secretaria de sa?de", "secretaria da saúde",
            "secretaria da sa�de", "secretaria da sa?de",
        ],
        compound_keywords: &[
            "fundo estadual de saúde", "fundo estadual de sa�de", "fundo estadual de sa?de",
            "secretaria estadual de saúde", "secretaria estadual de sa�de",
            "secretaria estadual de sa?de", "secretaria de estado da sa�de",
            "secretaria de estado da sa?de",
        ],
    },
    BuiltinCategory {
        name: "Segurança Pública",
        base_weight: 85,
        keywords: &[
            "segurança", "seguranca", "seguran�a", "seguran?a", "seguranã§a", "polícia",
            "policia", "pol�cia", "pol?cia", "bombeiro", "militar", "defesa civil",
            "penitenciário", "penitenciario", "penitenci�rio", "penitenci?rio", "presídio",
            "presidio", "pres�dio", "pres?dio", "fundo especial de seguran", "fundo de seguran",
            "secretaria de seguran", "departamento de seguran",
        ],
        compound_keywords: &[
            "segurança pública", "seguran�a p�blica", "seguran?a p?blica", "defesa civil",
            "fundo especial de segurança pública", "fundo especial de seguran�a p�blica",
            "fundo especial de seguran?a p?blica",
        ],
    },
    BuiltinCategory {
        name: "Infraestrutura e Transporte",
        base_weight: 80,
        keywords: &[
            "infraestrutura", "infra-estrutura", "estrada", "rodagem", "transporte", "obra",
            "mobilidade", "logística", "logistica",
        ],
        compound_keywords: &["infraestrutura e logística", "infraestrutura e transporte"],
    },
    BuiltinCategory {
        name: "Fazenda e Finanças",
        base_weight: 75,
        keywords: &[
            "fazenda", "finanças", "financas", "finan�as", "finan?as", "tributação", "tributacao",
            "tributa��o", "tributa??o", "receita", "planejamento",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Meio Ambiente",
        base_weight: 70,
        keywords: &["meio ambiente", "ambiental", "floresta", "sustentabilidade"],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Agricultura e Desenvolvimento Rural",
        base_weight: 75,
        keywords: &[
            "agricultura", "agraria", "agrária", "agr�ria", "agr?ria", "rural", "agropecuária",
            "agropecuaria", "agropecu�ria", "agropecu?ria", "desenvolvimento rural",
            "sanitária, animal", "sanit�ria, animal", "sanit?ria, animal", "vegetal",
            "fitossanitário", "fitossanit�rio", "fitossanit?rio", "pecuária", "pecuaria",
            "pecu�ria", "pecu?ria", "defesa sanitária", "defesa sanit�ria", "defesa sanit?ria",
        ],
        compound_keywords: &[
            "defesa sanitária, animal e vegetal", "defesa sanit�ria, animal e vegetal",
            "defesa sanit?ria, animal e vegetal", "sanitária, animal e vegetal",
            "sanit�ria, animal e vegetal", "sanit?ria, animal e vegetal",
        ],
    },
    BuiltinCategory {
        name: "Assistência Social",
        base_weight: 65,
        keywords: &[
            "social", "assistência", "assistencia", "assist�ncia", "assist?ncia", "cidadania",
            "família", "familia", "fam�lia", "fam?lia",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Cultura, Esporte e Turismo",
        base_weight: 70,
        keywords: &["turismo", "cultura", "esporte", "lazer"],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Habitação e Urbanismo",
        base_weight: 75,
        keywords: &[
            "habitação", "habitacao", "habita��o", "habita??o", "habitac?o", "moradia",
            "urbanismo", "cidade", "desenvolvimento urbano",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Trabalho e Emprego",
        base_weight: 75,
        keywords: &[
            "trabalho", "emprego", "qualificação", "qualificacao", "qualifica��o", "qualifica??o",
            "profissionalização", "profissionalizacao", "profissionaliza��o",
            "profissionaliza??o", "carteira assinada",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Indústria e Comércio",
        base_weight: 75,
        keywords: &[
            "indústria", "industria", "ind�stria", "ind?stria", "industrial", "comércio",
            "comercio", "com�rcio", "com?rcio", "junta comercial", "desenvolvimento econômico",
            "desenvolvimento economico", "desenvolvimento econ�mico", "desenvolvimento econ?mico",
            "empreendedorismo",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Saneamento e Recursos Hídricos",
        base_weight: 80,
        keywords: &[
            "saneamento", "água", "agua", "�gua", "?gua", "esgoto", "hídrico", "hidrico",
            "h�drico", "h?drico", "recursos hídricos", "recursos h�dricos", "recursos h?dricos",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Direitos Humanos e Igualdade",
        base_weight: 75,
        keywords: &[
            "direitos humanos", "igualdade", "diversidade", "mulher", "racial", "gênero",
            "genero", "g�nero", "g?nero",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Energia",
        base_weight: 80,
        keywords: &["energia", "energética", "energetica", "energ�tica", "energ?tica"],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Comunicação",
        base_weight: 75,
        keywords: &[
            "comunicação", "comunicacao", "comunica��o", "comunica??o", "rádio", "radio",
            "r�dio", "r?dio", "televisão", "televisao", "televis�o", "televis?o",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Administração e Gestão Pública",
        base_weight: 50,
        keywords: &[
            "administração", "administracao", "administra��o", "administra??o", "administrac?o",
            "gestão", "gestao", "gest�o", "gest?o", "servidor", "recursos humanos", "rh",
            "pessoal", "administração pública", "administra��o p�blica", "administra??o p?blica",
            "casa civil", "gabinete", "governadoria", "secretaria de administração",
            "secretaria de administra��o", "secretaria de administra??o", "administra��o geral",
            "administra??o geral",
        ],
        compound_keywords: &[
            "administração geral", "administra��o geral", "administra??o geral",
            "administrac?o geral", "administra��o geral do estado",
            "administra??o geral do estado", "casa civil",
            "secretaria de administração e previdência",
            "secretaria de administra��o e previd�ncia",
            "secretaria de administra??o e previd?ncia", "secretaria de estado da administra��o",
            "secretaria de estado da administra??o",
        ],
    },
    BuiltinCategory {
        name: "Poder Legislativo",
        base_weight: 85,
        keywords: &["legislativa", "assembleia", "câmara", "camara", "c�mara", "c?mara"],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Poder Judiciário",
        base_weight: 85,
        keywords: &[
            "judiciário", "judiciario", "judici�rio", "judici?rio", "judiciária", "judiciaria",
            "judici�ria", "judici?ria", "tribunal", "justiça", "justica", "justi�a", "justi?a",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Ministério Público e Controle",
        base_weight: 85,
        keywords: &[
            "ministério público", "ministerio publico", "minist�rio p�blico",
            "minist?rio p?blico", "mp", "controle externo",
        ],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Administração Geral",
        base_weight: 80,
        keywords: &["governadoria", "gabinete", "casa civil"],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Reserva de Contingência",
        base_weight: 90,
        keywords: &["reserva", "contingência", "contingencia", "conting�ncia", "conting?ncia"],
        compound_keywords: &[],
    },
    BuiltinCategory {
        name: "Encargos da Dívida",
        base_weight: 85,
        keywords: &[
            "dívida", "divida", "d�vida", "d?vida", "encargo", "financiamento", "amortização",
            "amortizacao", "amortiza��o", "amortiza??o",
        ],
        compound_keywords: &[],
    },
];

// ============================================================================
// TESTS
// ============================================================================
