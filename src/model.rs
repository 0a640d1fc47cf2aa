// 📦 Normalized expense record - the single destination shape every processor emits

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Organization placeholder when the source row has none
pub const NOT_INFORMED: &str = "Não informado";

/// Category assigned when no keyword matches
pub const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub state: String,
    pub date: NaiveDate,
    pub organization: String,
    pub standardized_category: String,
    pub amount: f64,
}

impl ExpenseRecord {
    /// Build a record, enforcing the destination invariants.
    ///
    /// Returns `None` when the amount is not strictly positive or the state is
    /// not a two-letter code. A blank organization becomes [`NOT_INFORMED`] and
    /// a blank category becomes [`OTHER_CATEGORY`].
    pub fn new(
        state: &str,
        year: i32,
        organization: &str,
        standardized_category: &str,
        amount: f64,
    ) -> Option<Self> {
        let state = normalize_state(state)?;
        if !(amount.is_finite() && amount > 0.0) {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(year, 1, 1)?;

        let organization = organization.trim();
        let organization = if organization.is_empty() {
            NOT_INFORMED
        } else {
            organization
        };

        let category = standardized_category.trim();
        let category = if category.is_empty() { OTHER_CATEGORY } else { category };

        Some(ExpenseRecord {
            state,
            date,
            organization: organization.to_string(),
            standardized_category: category.to_string(),
            amount,
        })
    }
}

/// Uppercase two-letter ASCII code, or `None`
pub fn normalize_state(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults_and_date() {
        let record = ExpenseRecord::new("ce", 2024, "  ", "", 10.0).unwrap();
        assert_eq!(record.state, "CE");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(record.organization, NOT_INFORMED);
        assert_eq!(record.standardized_category, OTHER_CATEGORY);
    }

    #[test]
    fn test_record_rejects_non_positive_amount() {
        assert!(ExpenseRecord::new("CE", 2024, "Org", "Saúde", 0.0).is_none());
        assert!(ExpenseRecord::new("CE", 2024, "Org", "Saúde", -1.0).is_none());
        assert!(ExpenseRecord::new("CE", 2024, "Org", "Saúde", f64::NAN).is_none());
    }

    #[test]
    fn test_record_rejects_bad_state() {
        assert!(ExpenseRecord::new("CEA", 2024, "Org", "Saúde", 1.0).is_none());
        assert!(ExpenseRecord::new("C1", 2024, "Org", "Saúde", 1.0).is_none());
        assert_eq!(normalize_state(" sp "), Some("SP".to_string()));
    }
}
