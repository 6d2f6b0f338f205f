//! Transaction summaries and prompt rendering shared by all providers

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::{AnalysisType, TransactionView};
use crate::prompts::{PromptId, PromptLibrary};

use super::types::ProviderError;

/// Per-category totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub count: usize,
    pub amount: f64,
}

/// Aggregate view of a transaction window
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionSummary {
    pub total_transactions: usize,
    pub total_amount: f64,
    pub categories: BTreeMap<String, CategoryTotal>,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
}

impl TransactionSummary {
    pub fn from_transactions(transactions: &[TransactionView]) -> Self {
        let mut summary = Self {
            total_transactions: transactions.len(),
            ..Default::default()
        };

        for tx in transactions {
            let entry = summary.categories.entry(tx.category.clone()).or_default();
            entry.count += 1;
            entry.amount += tx.amount;
            summary.total_amount += tx.amount;

            summary.date_start = Some(summary.date_start.map_or(tx.date, |d| d.min(tx.date)));
            summary.date_end = Some(summary.date_end.map_or(tx.date, |d| d.max(tx.date)));
        }

        summary
    }

    fn category_lines(&self) -> String {
        if self.categories.is_empty() {
            return "- (no transactions)".to_string();
        }
        self.categories
            .iter()
            .map(|(name, total)| {
                format!(
                    "- {}: {:.2} ({} transactions)",
                    name, total.amount, total.count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Optional inputs that only some analysis types use
#[derive(Debug, Clone, Default)]
pub struct PromptContext<'a> {
    /// Previous month's summary (`total_amount` is read from it)
    pub previous_month: Option<&'a Value>,
    /// Category -> budget goal
    pub budget_goals: Option<&'a BTreeMap<String, f64>>,
}

/// A rendered prompt ready to send
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub system: Option<String>,
    pub user: String,
}

/// Render the prompt for an analysis type over a transaction window
pub fn render_prompt(
    prompts: &Mutex<PromptLibrary>,
    analysis_type: AnalysisType,
    transactions: &[TransactionView],
    context: &PromptContext<'_>,
) -> Result<RenderedPrompt, ProviderError> {
    let summary = TransactionSummary::from_transactions(transactions);
    let vars = prompt_vars(&summary, context);

    let mut library = prompts.lock().unwrap_or_else(PoisonError::into_inner);
    let prompt = library
        .get(PromptId::for_analysis(analysis_type))
        .map_err(|e| ProviderError::Unavailable(format!("Prompt unavailable: {}", e)))?;

    Ok(RenderedPrompt {
        system: prompt.system_section().map(str::to_string),
        user: prompt.render_user(&vars),
    })
}

fn prompt_vars(
    summary: &TransactionSummary,
    context: &PromptContext<'_>,
) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("total_transactions", summary.total_transactions.to_string());
    vars.insert("total_amount", format!("{:.2}", summary.total_amount));
    vars.insert("date_start", format_date(summary.date_start));
    vars.insert("date_end", format_date(summary.date_end));
    vars.insert("category_lines", summary.category_lines());

    let previous_total = context
        .previous_month
        .and_then(|p| p.get("total_amount"))
        .and_then(Value::as_f64);
    if let Some(previous) = previous_total {
        vars.insert("previous_total", format!("{:.2}", previous));
        vars.insert("total_change", format!("{:+.2}", summary.total_amount - previous));
    } else {
        vars.insert("previous_total", String::new());
    }

    let overspent: Vec<String> = context
        .budget_goals
        .map(|goals| {
            goals
                .iter()
                .filter_map(|(category, budget)| {
                    let actual = summary.categories.get(category).map_or(0.0, |c| c.amount);
                    (actual > *budget).then(|| {
                        format!(
                            "- {}: budget {:.2}, actual {:.2} (over by {:.2})",
                            category,
                            budget,
                            actual,
                            actual - budget
                        )
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    vars.insert("overspent_lines", overspent.join("\n"));

    vars
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "n/a".to_string())
}
