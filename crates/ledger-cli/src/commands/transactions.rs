//! Transaction commands

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use ledger_core::models::NewTransaction;
use ledger_core::Database;

use super::window_start;

#[allow(clippy::too_many_arguments)]
pub fn cmd_transactions_add(
    db: &Database,
    user_id: i64,
    amount: f64,
    merchant: &str,
    category: Option<&str>,
    date: Option<&str>,
    transaction_type: &str,
    memo: Option<&str>,
) -> Result<()> {
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", d))?
            .and_hms_opt(12, 0, 0)
            .context("Invalid time of day")?
            .and_utc(),
        None => Utc::now(),
    };

    let id = db
        .insert_transaction(
            user_id,
            &NewTransaction {
                amount,
                transaction_type: transaction_type.to_string(),
                date,
                merchant_name: merchant.to_string(),
                category: category.map(str::to_string),
                memo: memo.map(str::to_string),
            },
        )
        .context("Failed to add transaction")?;

    println!("✅ Added transaction {} ({:.2} at {})", id, amount, merchant);
    Ok(())
}

pub fn cmd_transactions_list(db: &Database, user_id: i64, days: i64, limit: usize) -> Result<()> {
    let end = Utc::now();
    let start = window_start(end, days)?;
    let transactions = db
        .list_transactions_between(user_id, start, end, limit)
        .context("Failed to list transactions")?;

    if transactions.is_empty() {
        println!("No transactions in the last {} days", days);
        return Ok(());
    }

    for tx in &transactions {
        println!(
            "{}  {:>10.2}  {:<24} {}",
            tx.date.format("%Y-%m-%d"),
            tx.amount,
            super::truncate(&tx.merchant_name, 24),
            tx.category
        );
    }
    println!("{} transaction(s)", transactions.len());
    Ok(())
}
