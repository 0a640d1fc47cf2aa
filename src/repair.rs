// 🩹 Text Repair - undo encoding damage in organization names
//
// Two kinds of damage show up in the exports:
//   lost characters   "Educa??o", "Educa��o"  (decoder gave up)
//   double decoding   "EducaÃ§Ã£o"             (UTF-8 bytes read as Latin-1/CP1252)
//
// Lost characters can only be restored word by word, so those entries come
// first. Double decoding is mechanical and is derived from the accented
// alphabet once at start-up.

use encoding_rs::WINDOWS_1252;
use std::sync::OnceLock;

/// Longest chains seen in practice are triple-encoded; anything past this is
/// left as-is rather than looping.
const MAX_PASSES: usize = 8;

/// Word-level repairs for characters replaced by `?`. Each entry is also
/// applied with U+FFFD in place of `?` and in UPPER/Capitalized form.
/// Longer and more specific stems precede shorter ones.
const LOST_CHAR_WORDS: &[(&str, &str)] = &[
    ("administra??o", "administração"),
    ("administrac?o", "administração"),
    ("transforma??o", "transformação"),
    ("profissionaliza??o", "profissionalização"),
    ("moderniza??o", "modernização"),
    ("qualifica??o", "qualificação"),
    ("amortiza??o", "amortização"),
    ("comunica??o", "comunicação"),
    ("informa??o", "informação"),
    ("tributa??o", "tributação"),
    ("habita??o", "habitação"),
    ("habitac?o", "habitação"),
    ("educa??o", "educação"),
    ("educac?o", "educação"),
    ("inova??o", "inovação"),
    ("fun??es", "funções"),
    ("fun??o", "função"),
    ("func?o", "função"),
    ("a??es", "ações"),
    ("a??o", "ação"),
    ("ac?o", "ação"),
    ("?rg?os", "órgãos"),
    ("?rg?o", "órgão"),
    ("org?o", "orgão"),
    ("penitenci?ri", "penitenciári"),
    ("fitossanit?ri", "fitossanitári"),
    ("judici?ri", "judiciári"),
    ("sanit?ri", "sanitári"),
    ("minist?rio", "ministério"),
    ("previd?ncia", "previdência"),
    ("assist?ncia", "assistência"),
    ("conting?ncia", "contingência"),
    ("vigil?ncia", "vigilância"),
    ("ger?ncia", "gerência"),
    ("ag?ncia", "agência"),
    ("ci?ncia", "ciência"),
    ("inform?tica", "informática"),
    ("energ?tica", "energética"),
    ("econ?mic", "econômic"),
    ("cient?fic", "científic"),
    ("hist?ric", "históric"),
    ("t?cnic", "técnic"),
    ("pol?tica", "política"),
    ("pol?cia", "polícia"),
    ("seguran?a", "segurança"),
    ("crian?a", "criança"),
    ("finan?as", "finanças"),
    ("justi?a", "justiça"),
    ("servi?o", "serviço"),
    ("televis?o", "televisão"),
    ("gest?o", "gestão"),
    ("p?blic", "públic"),
    ("sa?de", "saúde"),
    ("m?dico", "médico"),
    ("agropecu?ria", "agropecuária"),
    ("pecu?ria", "pecuária"),
    ("agr?ria", "agrária"),
    ("ind?stria", "indústria"),
    ("com?rcio", "comércio"),
    ("h?dric", "hídric"),
    ("?gua", "água"),
    ("d?vida", "dívida"),
    ("g?nero", "gênero"),
    ("c?mara", "câmara"),
    ("r?dio", "rádio"),
    ("fam?lia", "família"),
    ("pres?dio", "presídio"),
    ("col?gio", "colégio"),
    ("tr?nsito", "trânsito"),
    // Generic suffixes last: two lost characters before "o"/"es" is "ção"/"ções"
    ("??es", "ções"),
    ("??o", "ção"),
];

/// Accented letters used in Portuguese; their double-decoded forms are
/// repaired mechanically.
const ACCENTED: &str = "áàâãéêíóôõúüçÁÀÂÃÉÊÍÓÔÕÚÜÇ";

/// Repair known mojibake in `text`, strip control characters (tab, newline
/// and carriage return survive) and trim. Applying it twice gives the same
/// result as applying it once.
pub fn repair(text: &str) -> String {
    let substituted = substitute_to_fixpoint(text);
    let printable = strip_controls(&substituted);
    substitute_to_fixpoint(&printable).trim().to_string()
}

/// Repair an optional cell, treating blank results as missing.
pub fn repair_opt(text: Option<&str>) -> Option<String> {
    text.map(repair).filter(|t| !t.is_empty())
}

fn substitute_to_fixpoint(text: &str) -> String {
    let table = replacement_table();
    let mut current = text.to_string();

    for _ in 0..MAX_PASSES {
        let mut next = current.clone();
        for (from, to) in table {
            if next.contains(from.as_str()) {
                next = next.replace(from.as_str(), to);
            }
        }
        if next == current {
            break;
        }
        current = next;
    }

    current
}

fn strip_controls(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn replacement_table() -> &'static [(String, String)] {
    static TABLE: OnceLock<Vec<(String, String)>> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

fn build_table() -> Vec<(String, String)> {
    let mut table: Vec<(String, String)> = Vec::new();
    let mut push = |from: String, to: String| {
        if from != to && !table.iter().any(|(f, _)| *f == from) {
            table.push((from, to));
        }
    };

    for (from, to) in LOST_CHAR_WORDS {
        for marker in ["?", "\u{FFFD}"] {
            let from = from.replace('?', marker);
            push(from.clone(), to.to_string());
            push(capitalize(&from), capitalize(to));
            push(from.to_uppercase(), to.to_uppercase());
        }
    }

    for letter in ACCENTED.chars() {
        let mut buf = [0u8; 4];
        let bytes = letter.encode_utf8(&mut buf).as_bytes();

        let latin1: String = bytes.iter().map(|&b| char::from(b)).collect();
        let (cp1252, _, _) = WINDOWS_1252.decode(bytes);

        push(latin1, letter.to_string());
        push(cp1252.into_owned(), letter.to_string());
    }

    table
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_characters_restored() {
        assert_eq!(repair("Educa??o"), "Educação");
        assert_eq!(repair("Fun??o"), "Função");
        assert_eq!(repair("SECRETARIA DE SA?DE"), "SECRETARIA DE SAÚDE");
        assert_eq!(repair("Secretaria de Educa\u{FFFD}\u{FFFD}o"), "Secretaria de Educação");
    }

    #[test]
    fn test_uppercase_partial_loss() {
        assert_eq!(repair("EDUCAC?O"), "EDUCAÇÃO");
    }

    #[test]
    fn test_repair_is_idempotent() {
        let once = repair("EDUCAC?O");
        assert_eq!(repair(&once), once);

        for sample in ["Fun??o", "SaÃºde", "  Secretaria\u{1} de Seguran?a P?blica ", "Ação Social"] {
            let once = repair(sample);
            assert_eq!(repair(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_double_decoded_utf8() {
        assert_eq!(repair("EducaÃ§Ã£o"), "Educação");
        assert_eq!(repair("SaÃºde"), "Saúde");
        assert_eq!(repair("GESTÃƒO"), "GESTÃO");
    }

    #[test]
    fn test_correct_text_untouched() {
        let correct = "Secretaria de Estado da Educação e Ciência";
        assert_eq!(repair(correct), correct);
        assert_eq!(repair("Qual órgão?"), "Qual órgão?");
    }

    #[test]
    fn test_controls_stripped_and_trimmed() {
        assert_eq!(repair("  Casa\u{0} Civil\u{7}  "), "Casa Civil");
        assert_eq!(repair("Linha\tum"), "Linha\tum");
    }

    #[test]
    fn test_repair_opt_blank_is_none() {
        assert_eq!(repair_opt(None), None);
        assert_eq!(repair_opt(Some("   ")), None);
        assert_eq!(repair_opt(Some("Fun??o")), Some("Função".to_string()));
    }
}
