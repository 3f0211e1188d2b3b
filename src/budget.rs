//! Append-only expense ledger priced from a static per-service table.
//!
//! Every cost-incurring call appends one [`Transaction`] whose cost is
//! `unit_cost * quantity`. The ledger lives in `outputs/expenses.json`
//! and is rewritten in full after each append; one writer at a time.

use crate::config::Config;
use crate::error::StudioError;
use crate::{logok, logw};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const DEFAULT_PRICES: &[(&str, f64)] = &[
    ("claude", 0.01),
    ("chatterbox", 0.0),
    ("elevenlabs", 0.0003),
    ("seedance", 0.12),
    ("kling", 0.10),
];

const RECENT_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: BTreeMap<String, f64>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            prices: DEFAULT_PRICES
                .iter()
                .map(|(service, price)| (service.to_string(), *price))
                .collect(),
        }
    }
}

impl PriceTable {
    /// Defaults overlaid with `engines.{text,tts,video}` prices from `config.json`.
    pub fn from_config(config: &Config) -> Self {
        let mut table = Self::default();
        for (name, engine) in &config.engines.text {
            if let Some(price) = engine.cost_per_request {
                table.set(name, price);
            }
        }
        for (name, engine) in &config.engines.tts {
            if let Some(price) = engine.cost_per_char {
                table.set(name, price);
            }
        }
        for (name, engine) in &config.engines.video {
            if let Some(price) = engine.cost_per_second {
                table.set(name, price);
            }
        }
        table
    }

    pub fn set(&mut self, service: &str, unit_price: f64) {
        self.prices.insert(service.to_string(), unit_price);
    }

    pub fn unit_price(&self, service: &str) -> Result<f64, StudioError> {
        self.prices
            .get(service)
            .copied()
            .ok_or_else(|| StudioError::UnknownService(service.to_string()))
    }

    pub fn estimate(&self, service: &str, quantity: f64) -> Result<f64, StudioError> {
        Ok(self.unit_price(service)? * quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub timestamp: DateTime<Local>,
    pub service: String,
    pub unit_cost: f64,
    pub quantity: f64,
    pub cost: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub monthly_spent: f64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSummary {
    pub monthly_limit: f64,
    pub monthly_spent: f64,
    pub remaining: f64,
    pub total_spent: f64,
    pub transactions: usize,
}

pub struct BudgetTracker {
    path: PathBuf,
    prices: PriceTable,
    monthly_limit: f64,
    ledger: Ledger,
}

impl BudgetTracker {
    pub async fn load(path: PathBuf, prices: PriceTable, monthly_limit: f64) -> Result<Self> {
        let ledger = if path.exists() {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read ledger {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse ledger {}", path.display()))?
        } else {
            Ledger::default()
        };
        Ok(Self {
            path,
            prices,
            monthly_limit,
            ledger,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Records one priced call and persists the ledger. Returns the computed cost.
    pub async fn append(&mut self, service: &str, quantity: f64, description: &str) -> Result<f64> {
        let unit_cost = self.prices.unit_price(service)?;
        let cost = unit_cost * quantity;

        self.ledger.transactions.push(Transaction {
            id: Uuid::new_v4(),
            timestamp: Local::now(),
            service: service.to_string(),
            unit_cost,
            quantity,
            cost,
            description: description.to_string(),
        });
        self.ledger.total_spent += cost;
        self.ledger.monthly_spent += cost;
        self.save().await?;

        tracing::debug!(service, quantity, cost, "expense recorded");
        if self.ledger.monthly_spent > self.monthly_limit {
            logw(format!(
                "Monthly budget exceeded! Spent: ${:.2} / ${:.2}",
                self.ledger.monthly_spent, self.monthly_limit
            ));
        }
        Ok(cost)
    }

    /// Sum of every recorded transaction.
    pub fn total(&self) -> f64 {
        self.ledger.transactions.iter().map(|t| t.cost).sum()
    }

    pub fn summary(&self) -> BudgetSummary {
        BudgetSummary {
            monthly_limit: self.monthly_limit,
            monthly_spent: self.ledger.monthly_spent,
            remaining: self.monthly_limit - self.ledger.monthly_spent,
            total_spent: self.total(),
            transactions: self.ledger.transactions.len(),
        }
    }

    /// Zeroes the monthly counter; history is kept.
    pub async fn reset_monthly(&mut self) -> Result<()> {
        self.ledger.monthly_spent = 0.0;
        self.save().await
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from("Date,Service,Cost,Description,Transaction ID\n");
        for t in &self.ledger.transactions {
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                t.timestamp.to_rfc3339(),
                csv_field(&t.service),
                t.cost,
                csv_field(&t.description),
                t.id
            ));
        }
        out
    }

    pub async fn export_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, self.to_csv())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        logok(format!("Expenses exported to: {}", path.display()));
        Ok(())
    }

    pub fn print_report(&self) {
        let s = self.summary();
        let over = s.monthly_spent > s.monthly_limit;
        println!("Budget Status");
        println!("{:<20} {:>12}  {}", "Metric", "Value", "Status");
        println!("{:<20} {:>12}  {}", "Monthly Limit", format!("${:.2}", s.monthly_limit), "ok");
        println!(
            "{:<20} {:>12}  {}",
            "Current Spent",
            format!("${:.2}", s.monthly_spent),
            if over { "over" } else { "ok" }
        );
        println!(
            "{:<20} {:>12}  {}",
            "Remaining",
            format!("${:.2}", s.remaining),
            if over { "over" } else { "ok" }
        );
        println!("{:<20} {:>12}", "Total Spent", format!("${:.3}", s.total_spent));
        println!("{:<20} {:>12}", "Total Transactions", s.transactions);

        let recent = self
            .ledger
            .transactions
            .iter()
            .rev()
            .take(RECENT_TRANSACTIONS)
            .collect::<Vec<_>>();
        if recent.is_empty() {
            return;
        }
        println!();
        println!("Recent Transactions");
        println!("{:<17} {:<12} {:>9}  {}", "Date", "Service", "Cost", "Description");
        for t in recent.into_iter().rev() {
            println!(
                "{:<17} {:<12} {:>9}  {}",
                t.timestamp.format("%Y-%m-%d %H:%M"),
                t.service,
                format!("${:.3}", t.cost),
                truncate_label(&t.description, 30)
            );
        }
    }

    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(&self.ledger)?;
        fs::write(&self.path, text)
            .await
            .with_context(|| format!("Failed to write ledger {}", self.path.display()))
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tracker(dir: &Path) -> BudgetTracker {
        BudgetTracker::load(dir.join("expenses.json"), PriceTable::default(), 1.0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn append_prices_from_table_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let mut budget = tracker(tmp.path()).await;

        let cost = budget.append("seedance", 10.0, "clip").await.unwrap();
        assert!((cost - 1.2).abs() < 1e-9);

        let reloaded = tracker(tmp.path()).await;
        assert_eq!(reloaded.ledger().transactions.len(), 1);
        assert_eq!(reloaded.ledger().transactions[0].service, "seedance");
        assert!((reloaded.ledger().monthly_spent - 1.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_service_is_rejected_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut budget = tracker(tmp.path()).await;
        let err = budget.append("sora", 1.0, "").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StudioError>(),
            Some(StudioError::UnknownService(_))
        ));
        assert!(!tmp.path().join("expenses.json").exists());
    }

    #[tokio::test]
    async fn reset_keeps_history() {
        let tmp = tempfile::tempdir().unwrap();
        let mut budget = tracker(tmp.path()).await;
        budget.append("claude", 3.0, "hooks").await.unwrap();
        budget.reset_monthly().await.unwrap();

        let s = budget.summary();
        assert_eq!(s.monthly_spent, 0.0);
        assert_eq!(s.transactions, 1);
        assert!((s.total_spent - 0.03).abs() < 1e-9);
        assert!((s.remaining - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn csv_quotes_descriptions() {
        let tmp = tempfile::tempdir().unwrap();
        let mut budget = tracker(tmp.path()).await;
        budget.append("claude", 1.0, "hooks, \"problem\"").await.unwrap();
        let csv = budget.to_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Date,Service,Cost,Description,Transaction ID"));
        let row = lines.next().unwrap();
        assert!(row.contains(",claude,0.01,\"hooks, \"\"problem\"\"\","));
    }

    #[test]
    fn config_prices_override_defaults() {
        let cfg = Config::from_json(
            r#"{"engines": {"tts": {"elevenlabs": {"cost_per_char": 0.001}}, "video": {"runway": {"cost_per_second": 0.5}}}}"#,
        )
        .unwrap();
        let table = PriceTable::from_config(&cfg);
        assert_eq!(table.unit_price("elevenlabs").unwrap(), 0.001);
        assert_eq!(table.unit_price("runway").unwrap(), 0.5);
        assert_eq!(table.unit_price("seedance").unwrap(), 0.12);
    }

    #[test]
    fn labels_are_truncated_on_char_boundaries() {
        assert_eq!(truncate_label("Génère", 3), "Gén...");
        assert_eq!(truncate_label("short", 30), "short");
    }
}
