use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result as SqlResult};
use std::path::PathBuf;

use crate::models::{Category, Transaction};
use crate::utils::now_rfc3339;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: PathBuf) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&mut self) -> SqlResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let migrations = vec![
            (
                "001_create_categories.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/001_create_categories.sql"
                )),
            ),
            (
                "002_create_transactions.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/002_create_transactions.sql"
                )),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if applied.is_none() {
                let tx = self.conn.transaction()?;
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                    params![name],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    }

    pub fn find_category_by_name(&self, name: &str) -> SqlResult<Option<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, icon, created_at FROM categories WHERE name = ?1")?;

        stmt.query_row(params![name], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                icon: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()
    }

    pub fn create_category(&self, name: &str) -> SqlResult<Category> {
        let category = Category {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            icon: None,
            created_at: now_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO categories (id, name, icon, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![category.id, category.name, category.icon, category.created_at],
        )?;
        Ok(category)
    }

    /// Atomic find-or-create keyed on exact name. The UNIQUE constraint on
    /// `categories.name` is the guard against concurrent creation: losing
    /// the insert race means the row exists, so re-read it.
    pub fn find_or_create_category(&self, name: &str) -> SqlResult<Category> {
        if let Some(existing) = self.find_category_by_name(name)? {
            return Ok(existing);
        }

        match self.create_category(name) {
            Ok(created) => Ok(created),
            Err(err) if is_unique_violation(&err) => {
                self.find_category_by_name(name)?.ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    pub fn get_categories(&self) -> SqlResult<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, icon, created_at FROM categories ORDER BY name")?;

        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                icon: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        rows.collect()
    }

    pub fn insert_transaction(&self, transaction: &Transaction) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (
                id, merchant, amount, date, description, category_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                transaction.id,
                transaction.merchant,
                transaction.amount,
                transaction.date,
                transaction.description,
                transaction.category_id,
                transaction.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_transactions(&self) -> SqlResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, merchant, amount, date, description, category_id, created_at
             FROM transactions
             ORDER BY date DESC, created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Transaction {
                id: row.get(0)?,
                merchant: row.get(1)?,
                amount: row.get(2)?,
                date: row.get(3)?,
                description: row.get(4)?,
                category_id: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        rows.collect()
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_transaction(merchant: &str, category_id: Option<String>) -> Transaction {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            merchant: merchant.to_string(),
            amount: -12.5,
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            description: None,
            category_id,
            created_at: now_rfc3339(),
        }
    }

    #[test]
    fn migrations_are_idempotent_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("penny.sqlite");

        {
            let db = Database::new(path.clone()).unwrap();
            db.create_category("Dining").unwrap();
        }

        let db = Database::new(path).unwrap();
        let categories = db.get_categories().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Dining");
    }

    #[test]
    fn find_or_create_returns_same_identity() {
        let db = Database::open_in_memory().unwrap();
        let first = db.find_or_create_category("Groceries").unwrap();
        let second = db.find_or_create_category("Groceries").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.get_categories().unwrap().len(), 1);
    }

    #[test]
    fn category_names_are_case_sensitive() {
        let db = Database::open_in_memory().unwrap();
        let lower = db.find_or_create_category("dining").unwrap();
        let upper = db.find_or_create_category("Dining").unwrap();
        assert_ne!(lower.id, upper.id);
    }

    #[test]
    fn duplicate_insert_is_reported_as_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        db.create_category("Transport").unwrap();
        let err = db.create_category("Transport").unwrap_err();
        assert!(is_unique_violation(&err));

        // The find-or-create path recovers from exactly this error.
        let recovered = db.find_or_create_category("Transport").unwrap();
        assert_eq!(recovered.name, "Transport");
    }

    #[test]
    fn transactions_round_trip_with_and_without_category() {
        let db = Database::open_in_memory().unwrap();
        let category = db.find_or_create_category("Fees").unwrap();

        let categorized = sample_transaction("Bank", Some(category.id.clone()));
        let uncategorized = sample_transaction("Corner Shop", None);
        db.insert_transaction(&categorized).unwrap();
        db.insert_transaction(&uncategorized).unwrap();

        let stored = db.get_transactions().unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|t| t.category_id.as_deref() == Some(category.id.as_str())));
        assert!(stored.iter().any(|t| t.category_id.is_none()));
    }
}
