use crate::scoring::{OverridePrecedence, ScoringOptions};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub webhook_secret: Option<String>,
    pub llm_api_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub override_precedence: OverridePrecedence,
    pub max_batch_size: usize,
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            webhook_secret: optional_var("WEBHOOK_SECRET"),
            llm_api_url: optional_var("LLM_API_URL")
                .map(|raw| {
                    let parsed = url::Url::parse(&raw)
                        .map_err(|e| anyhow::anyhow!("LLM_API_URL is not a valid URL: {}", e))?;
                    if parsed.scheme() != "http" && parsed.scheme() != "https" {
                        anyhow::bail!("LLM_API_URL must start with http:// or https://");
                    }
                    Ok(raw.trim_end_matches('/').to_string())
                })
                .transpose()?,
            llm_api_key: optional_var("LLM_API_KEY"),
            llm_model: optional_var("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            llm_timeout_secs: optional_var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|| "15".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("LLM_TIMEOUT_SECS must be a whole number of seconds"))
                .and_then(|secs: u64| {
                    if secs == 0 {
                        anyhow::bail!("LLM_TIMEOUT_SECS must be greater than zero");
                    }
                    Ok(secs)
                })?,
            override_precedence: optional_var("SCORING_OVERRIDE_PRECEDENCE")
                .map(|raw| raw.parse::<OverridePrecedence>().map_err(anyhow::Error::msg))
                .transpose()?
                .unwrap_or_default(),
            max_batch_size: optional_var("MAX_BATCH_SIZE")
                .unwrap_or_else(|| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_BATCH_SIZE must be a positive number"))
                .and_then(|size: usize| {
                    if size == 0 {
                        anyhow::bail!("MAX_BATCH_SIZE must be at least 1");
                    }
                    Ok(size)
                })?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            config.database_url.chars().take(20).collect::<String>()
        );
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Scoring override precedence: {:?}", config.override_precedence);
        tracing::debug!("Max batch size: {}", config.max_batch_size);
        if config.webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not set, webhook token validation disabled");
        }
        if config.llm_enabled() {
            tracing::info!(
                "LLM summaries enabled: model={}, timeout={}s",
                config.llm_model,
                config.llm_timeout_secs
            );
        } else {
            tracing::info!("LLM summaries disabled, using template summaries");
        }

        Ok(config)
    }

    /// LLM summaries need both an endpoint and a key.
    pub fn llm_enabled(&self) -> bool {
        self.llm_api_url.is_some() && self.llm_api_key.is_some()
    }

    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            override_precedence: self.override_precedence,
        }
    }
}
