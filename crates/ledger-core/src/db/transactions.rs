//! Transaction operations and the `LedgerStore` implementation

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, parse_datetime, row_error, Database};
use crate::error::Result;
use crate::models::{NewTransaction, TransactionView, UserProfile, DEFAULT_CATEGORY};
use crate::store::LedgerStore;

impl Database {
    /// Insert a transaction for a user
    pub fn insert_transaction(&self, user_id: i64, tx: &NewTransaction) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (
                user_id, amount, transaction_type, transaction_date,
                merchant_name, category, memo
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                tx.amount,
                tx.transaction_type,
                format_datetime(tx.date),
                tx.merchant_name,
                tx.category,
                tx.memo,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Transactions in `[start, end]`, oldest first
    pub fn list_transactions_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionView>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT amount, transaction_type, transaction_date, merchant_name, category, memo
            FROM transactions
            WHERE user_id = ? AND transaction_date BETWEEN ? AND ?
            ORDER BY transaction_date, id
            LIMIT ?
            "#,
        )?;

        let transactions = stmt
            .query_map(
                params![
                    user_id,
                    format_datetime(start),
                    format_datetime(end),
                    limit as i64
                ],
                |row| {
                    let date: String = row.get(2)?;
                    let category: Option<String> = row.get(4)?;
                    let memo: Option<String> = row.get(5)?;

                    Ok(TransactionView {
                        amount: row.get(0)?,
                        transaction_type: row.get(1)?,
                        date: parse_datetime(&date).map_err(row_error)?,
                        merchant_name: row.get(3)?,
                        category: category
                            .filter(|c| !c.trim().is_empty())
                            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                        memo: memo.unwrap_or_default(),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }
}

impl LedgerStore for Database {
    fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>> {
        Database::get_user(self, user_id)
    }

    fn transactions_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionView>> {
        self.list_transactions_between(user_id, start, end, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PreferredModel;
    use chrono::{Duration, TimeZone};

    fn new_tx(amount: f64, date: DateTime<Utc>, category: Option<&str>) -> NewTransaction {
        NewTransaction {
            amount,
            transaction_type: "debit".into(),
            date,
            merchant_name: "Corner Store".into(),
            category: category.map(str::to_string),
            memo: None,
        }
    }

    #[test]
    fn test_window_and_default_category() {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user("ari", "ari@example.com", PreferredModel::Gemini, None)
            .unwrap();
        let base = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        db.insert_transaction(user, &new_tx(5.0, base - Duration::days(40), Some("Food")))
            .unwrap();
        db.insert_transaction(user, &new_tx(7.5, base - Duration::days(2), None))
            .unwrap();
        db.insert_transaction(user, &new_tx(9.0, base - Duration::days(1), Some("Transport")))
            .unwrap();

        let window = db
            .list_transactions_between(user, base - Duration::days(30), base, 1000)
            .unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].amount, 7.5);
        assert_eq!(window[0].category, DEFAULT_CATEGORY);
        assert_eq!(window[1].category, "Transport");
        assert_eq!(window[0].memo, "");

        let limited = db
            .list_transactions_between(user, base - Duration::days(30), base, 1)
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_window_scoped_to_user() {
        let db = Database::in_memory().unwrap();
        let a = db
            .create_user("a", "a@example.com", PreferredModel::Gemini, None)
            .unwrap();
        let b = db
            .create_user("b", "b@example.com", PreferredModel::Gemini, None)
            .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        db.insert_transaction(a, &new_tx(1.0, now, None)).unwrap();
        let store: &dyn LedgerStore = &db;
        assert!(store
            .transactions_between(b, now - Duration::days(1), now, 10)
            .unwrap()
            .is_empty());
    }
}
