// 🗄️ Destination store - append-only SQLite table of normalized expenses

use crate::error::{EtlError, Result};
use crate::model::ExpenseRecord;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_TABLE: &str = "despesas";

// ============================================================================
// SETUP
// ============================================================================

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(EtlError::InvalidConfig(format!(
            "table name '{}' is not a valid identifier",
            table
        )))
    }
}

/// Open (creating parent directories) and prepare the destination database
pub fn open_database(path: &Path, table: &str) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    setup_database(&conn, table)?;
    info!(path = %path.display(), table, "database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection, table: &str) -> Result<()> {
    validate_table_name(table)?;

    // WAL is a no-op for in-memory connections
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                state TEXT NOT NULL,
                date TEXT,
                organization TEXT,
                standardized_category TEXT,
                value REAL
            )"
        ),
        [],
    )?;

    conn.execute(
        &format!("CREATE INDEX IF NOT EXISTS idx_{table}_state ON {table}(state)"),
        [],
    )?;
    conn.execute(
        &format!("CREATE INDEX IF NOT EXISTS idx_{table}_date ON {table}(date)"),
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITE
// ============================================================================

/// Append one file's records in a single transaction.
///
/// Either every record lands or none does. Existing rows are never touched;
/// re-running a file appends again.
pub fn insert_expenses(conn: &Connection, table: &str, records: &[ExpenseRecord]) -> Result<usize> {
    validate_table_name(table)?;
    if records.is_empty() {
        return Ok(0);
    }

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {table} (state, date, organization, standardized_category, value)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ))?;

        for record in records {
            stmt.execute(params![
                record.state,
                record.date.format("%Y-%m-%d").to_string(),
                record.organization,
                record.standardized_category,
                record.amount,
            ])?;
        }
    }
    tx.commit()?;

    debug!(table, inserted = records.len(), "batch committed");
    Ok(records.len())
}

// ============================================================================
// READ (summaries)
// ============================================================================

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    validate_table_name(table)?;
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_for_state(conn: &Connection, table: &str, state: &str) -> Result<i64> {
    validate_table_name(table)?;
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE state = ?1"),
        params![state.to_ascii_uppercase()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_by_state(conn: &Connection, table: &str) -> Result<Vec<(String, i64)>> {
    validate_table_name(table)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT state, COUNT(*) FROM {table} GROUP BY state ORDER BY state"
    ))?;

    let counts = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(counts)
}

/// Rows and total value per state and year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateYearCount {
    pub state: String,
    pub year: i32,
    pub records: i64,
    pub total_value: f64,
}

pub fn state_year_counts(conn: &Connection, table: &str) -> Result<Vec<StateYearCount>> {
    validate_table_name(table)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT state, CAST(substr(date, 1, 4) AS INTEGER) AS year,
                COUNT(*), COALESCE(SUM(value), 0.0)
         FROM {table}
         GROUP BY state, year
         ORDER BY state, year"
    ))?;

    let counts = stmt
        .query_map([], |row| {
            Ok(StateYearCount {
                state: row.get(0)?,
                year: row.get(1)?,
                records: row.get(2)?,
                total_value: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(counts)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub records: i64,
    pub total_value: f64,
}

/// Category totals, largest value first
pub fn category_totals(conn: &Connection, table: &str) -> Result<Vec<CategoryTotal>> {
    validate_table_name(table)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT COALESCE(standardized_category, 'Other'), COUNT(*), COALESCE(SUM(value), 0.0) AS total
         FROM {table}
         GROUP BY 1
         ORDER BY total DESC, 1"
    ))?;

    let totals = stmt
        .query_map([], |row| {
            Ok(CategoryTotal {
                category: row.get(0)?,
                records: row.get(1)?,
                total_value: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: &str, year: i32, org: &str, category: &str, amount: f64) -> ExpenseRecord {
        ExpenseRecord::new(state, year, org, category, amount).unwrap()
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn, DEFAULT_TABLE).unwrap();
        conn
    }

    #[test]
    fn test_setup_is_repeatable() {
        let conn = memory_db();
        setup_database(&conn, DEFAULT_TABLE).unwrap();
        assert_eq!(count_rows(&conn, DEFAULT_TABLE).unwrap(), 0);
    }

    #[test]
    fn test_insert_appends_and_counts() {
        let conn = memory_db();
        let records = vec![
            record("CE", 2024, "Secretaria da Saúde", "Saúde", 1500.0),
            record("CE", 2024, "Secretaria da Educação", "Educação", 800.0),
            record("SP", 2023, "Polícia Militar", "Segurança Pública", 10.0),
        ];

        assert_eq!(insert_expenses(&conn, DEFAULT_TABLE, &records).unwrap(), 3);
        assert_eq!(insert_expenses(&conn, DEFAULT_TABLE, &records[..1]).unwrap(), 1);

        assert_eq!(count_rows(&conn, DEFAULT_TABLE).unwrap(), 4);
        assert_eq!(count_for_state(&conn, DEFAULT_TABLE, "ce").unwrap(), 3);
        assert_eq!(
            count_by_state(&conn, DEFAULT_TABLE).unwrap(),
            vec![("CE".to_string(), 3), ("SP".to_string(), 1)]
        );

        let date: String = conn
            .query_row("SELECT date FROM despesas WHERE state = 'SP'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(date, "2023-01-01");

        println!("✅ Insert/count test PASSED");
    }

    #[test]
    fn test_state_year_and_category_summaries() {
        let conn = memory_db();
        insert_expenses(
            &conn,
            DEFAULT_TABLE,
            &[
                record("RS", 2023, "A", "Saúde", 100.0),
                record("RS", 2024, "B", "Saúde", 50.0),
                record("RS", 2024, "C", "Educação", 25.0),
            ],
        )
        .unwrap();

        let per_year = state_year_counts(&conn, DEFAULT_TABLE).unwrap();
        assert_eq!(per_year.len(), 2);
        assert_eq!(per_year[1].year, 2024);
        assert_eq!(per_year[1].records, 2);
        assert_eq!(per_year[1].total_value, 75.0);

        let totals = category_totals(&conn, DEFAULT_TABLE).unwrap();
        assert_eq!(totals[0].category, "Saúde");
        assert_eq!(totals[0].total_value, 150.0);
        assert_eq!(totals[1].records, 1);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let conn = memory_db();
        assert_eq!(insert_expenses(&conn, DEFAULT_TABLE, &[]).unwrap(), 0);
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("despesas").is_ok());
        assert!(validate_table_name("_raw_2024").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1abc").is_err());
        assert!(validate_table_name("despesas; DROP TABLE x").is_err());
    }

    #[test]
    fn test_open_database_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database").join("despesas_brasil.db");

        let conn = open_database(&path, DEFAULT_TABLE).unwrap();
        assert!(path.exists());
        assert_eq!(count_rows(&conn, DEFAULT_TABLE).unwrap(), 0);
    }
}
