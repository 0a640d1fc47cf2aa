// 💰 Value Normalizer - raw cell → positive amount
//
// State exports mix three conventions:
//   1.234.567,89   (Brazilian: dot thousands, comma decimal)
//   1234567,89     (comma decimal, no grouping)
//   1234567.89     (already dot-decimal)
// plus currency symbols and stray spaces. Anything that does not end up as a
// finite number strictly greater than zero is `None`.

use serde::{Deserialize, Serialize};

/// Parse a raw CSV cell into a positive amount.
///
/// Returns `None` for empty, zero, negative or unparseable input; callers
/// drop the value instead of storing a zero.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = strip_currency(raw);
    if cleaned.is_empty() {
        return None;
    }

    let has_comma = cleaned.contains(',');
    let has_dot = cleaned.contains('.');

    let normalized = if has_comma && has_dot {
        cleaned.replace('.', "").replace(',', ".")
    } else if has_comma {
        cleaned.replace(',', ".")
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok().and_then(positive)
}

/// Lenient variant for layouts with ambiguous grouping.
///
/// Every comma becomes a dot first; if more than one dot is left, all but
/// the last are treated as thousands separators and removed.
pub fn parse_amount_lenient(raw: &str) -> Option<f64> {
    let cleaned = strip_currency(raw);
    if cleaned.is_empty() {
        return None;
    }

    let substituted = cleaned.replace(',', ".");
    let collapsed = collapse_extra_dots(&substituted);

    collapsed.parse::<f64>().ok().and_then(positive)
}

/// Which parser a processor applies to its value cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AmountStyle {
    #[default]
    Standard,
    Lenient,
}

impl AmountStyle {
    pub fn parse(&self, raw: &str) -> Option<f64> {
        match self {
            AmountStyle::Standard => parse_amount(raw),
            AmountStyle::Lenient => parse_amount_lenient(raw),
        }
    }
}

fn strip_currency(raw: &str) -> String {
    raw.trim()
        .replace("R$", "")
        .replace('$', "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn collapse_extra_dots(value: &str) -> String {
    let dots = value.matches('.').count();
    if dots <= 1 {
        return value.to_string();
    }

    let mut seen = 0;
    value
        .chars()
        .filter(|&c| {
            if c != '.' {
                return true;
            }
            seen += 1;
            seen == dots
        })
        .collect()
}

fn positive(value: f64) -> Option<f64> {
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brazilian_grouping() {
        assert_eq!(parse_amount("1.234.567,89"), Some(1234567.89));
    }

    #[test]
    fn test_comma_decimal_only() {
        assert_eq!(parse_amount("1234567,89"), Some(1234567.89));
    }

    #[test]
    fn test_dot_decimal_passthrough() {
        assert_eq!(parse_amount("1234567.89"), Some(1234567.89));
        assert_eq!(parse_amount("42"), Some(42.0));
    }

    #[test]
    fn test_currency_and_spaces_stripped() {
        assert_eq!(parse_amount("  R$ 1.500,00 "), Some(1500.0));
        assert_eq!(parse_amount("$ 99.90"), Some(99.9));
        assert_eq!(parse_amount("R$\u{a0}2.000,50"), Some(2000.5));
    }

    #[test]
    fn test_rejects_empty_zero_negative_and_text() {
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("0,00"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("   "), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("-1.234,56"), None);
    }

    #[test]
    fn test_rejects_non_finite() {
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_comma_only_grouping_is_unparseable() {
        // "1,234,567" becomes "1.234.567", which is not a number
        assert_eq!(parse_amount("1,234,567"), None);
    }

    #[test]
    fn test_lenient_collapses_all_but_last_dot() {
        assert_eq!(parse_amount_lenient("1.234.567,89"), Some(1234567.89));
        assert_eq!(parse_amount_lenient("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount_lenient("1.234,5"), Some(1234.5));
        assert_eq!(parse_amount_lenient("350,75"), Some(350.75));
        assert_eq!(parse_amount_lenient("0,00"), None);
        assert_eq!(parse_amount_lenient(""), None);
    }

    #[test]
    fn test_amount_style_dispatch() {
        // Both separators: dots go, the comma becomes the decimal point
        assert_eq!(AmountStyle::Standard.parse("1,234.56"), Some(1.23456));
        assert_eq!(AmountStyle::Lenient.parse("1,234.56"), Some(1234.56));
    }
}
