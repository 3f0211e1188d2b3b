use crate::api::TextGenerator;
use crate::api::anthropic::AnthropicClient;
use crate::budget::{BudgetTracker, PriceTable};
use crate::config::{Config, Credentials};
use crate::init::{self, Layout};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Everything one invocation needs: paths, registry, credentials and an HTTP client.
pub struct Studio {
    pub layout: Layout,
    pub config: Config,
    pub credentials: Credentials,
    pub http: reqwest::Client,
}

impl Studio {
    pub async fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let layout = Layout::new(root);
        let config = Config::load(layout.config_file()).await?;
        let credentials = Credentials::load(&layout);
        Self::from_parts(layout, config, credentials).await
    }

    pub async fn from_parts(layout: Layout, config: Config, credentials: Credentials) -> Result<Self> {
        init::ensure_directories(&layout)
            .await
            .context("Failed to create output directories")?;
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            layout,
            config,
            credentials,
            http,
        })
    }

    pub fn text_generator(&self) -> Result<Box<dyn TextGenerator>> {
        let key = self.credentials.anthropic()?;
        let engine = self.config.text_engine("claude");
        Ok(Box::new(AnthropicClient::new(
            self.http.clone(),
            key,
            engine.model.as_deref(),
        )))
    }

    pub fn price_table(&self) -> PriceTable {
        PriceTable::from_config(&self.config)
    }

    pub async fn budget(&self) -> Result<BudgetTracker> {
        BudgetTracker::load(
            self.layout.ledger_file(),
            self.price_table(),
            self.config.budget.monthly_limit,
        )
        .await
    }
}
