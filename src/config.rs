//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (Reddit credentials) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::calculator::{
    DEFAULT_CONFLICT_EXIT_CODE, DEFAULT_MAX_CONCURRENT_QUERIES, DEFAULT_MC_ERROR_MARGIN,
};
use crate::engine::evaluator::EvaluatorConfig;
use crate::types::BotError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub calculator: CalculatorConfig,
    pub reddit: RedditConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub name: String,
    /// The bot's own account name, without the `u/` prefix.
    pub username: String,
    pub poll_interval_secs: u64,
    #[serde(default = "default_inbox_limit")]
    pub inbox_limit: u32,
    /// Log replies instead of posting them.
    #[serde(default)]
    pub dry_run: bool,
    /// Only answer these authors. Empty means everyone.
    #[serde(default)]
    pub allowed_authors: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalculatorConfig {
    pub path: PathBuf,
    /// Directory holding the calculator's Makefile.
    #[serde(default)]
    pub build_dir: Option<PathBuf>,
    #[serde(default)]
    pub clean_dependencies: bool,
    /// Program (and arguments) to run the calculator through.
    #[serde(default)]
    pub launcher: Vec<String>,
    #[serde(default = "default_stage1_budget")]
    pub stage1_time_budget_secs: f64,
    #[serde(default = "default_stage2_budget")]
    pub stage2_time_budget_secs: f64,
    #[serde(default = "default_mc_error_margin")]
    pub mc_error_margin: f64,
    #[serde(default = "default_conflict_exit_code")]
    pub conflict_exit_code: i32,
    /// Calculator processes one message may run at once.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedditConfig {
    pub client_id_env: String,
    pub client_secret_env: String,
    pub username_env: String,
    pub password_env: String,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

fn default_inbox_limit() -> u32 {
    25
}

fn default_stage1_budget() -> f64 {
    3.0
}

fn default_stage2_budget() -> f64 {
    5.0
}

fn default_mc_error_margin() -> f64 {
    DEFAULT_MC_ERROR_MARGIN
}

fn default_conflict_exit_code() -> i32 {
    DEFAULT_CONFLICT_EXIT_CODE
}

fn default_max_concurrent_queries() -> usize {
    DEFAULT_MAX_CONCURRENT_QUERIES
}

impl CalculatorConfig {
    /// Evaluator settings derived from this section.
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            stage1_time_budget_secs: self.stage1_time_budget_secs,
            stage2_time_budget_secs: self.stage2_time_budget_secs,
            mc_error_margin: self.mc_error_margin,
            conflict_exit_code: self.conflict_exit_code,
            max_concurrent_queries: self.max_concurrent_queries,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), BotError> {
        let calc = &self.calculator;
        // NaN slips through every comparison below.
        for (field, value) in [
            ("stage1_time_budget_secs", calc.stage1_time_budget_secs),
            ("stage2_time_budget_secs", calc.stage2_time_budget_secs),
            ("mc_error_margin", calc.mc_error_margin),
        ] {
            if !value.is_finite() {
                return Err(BotError::Config(format!(
                    "calculator.{field} must be a finite number, got {value}"
                )));
            }
        }
        if calc.stage1_time_budget_secs <= 0.0 {
            return Err(BotError::Config(
                "calculator.stage1_time_budget_secs must be positive".into(),
            ));
        }
        if calc.stage2_time_budget_secs <= calc.stage1_time_budget_secs {
            return Err(BotError::Config(format!(
                "calculator.stage2_time_budget_secs ({}) must be longer than stage 1 ({})",
                calc.stage2_time_budget_secs, calc.stage1_time_budget_secs
            )));
        }
        if calc.mc_error_margin <= 0.0 {
            return Err(BotError::Config(
                "calculator.mc_error_margin must be positive".into(),
            ));
        }
        if calc.max_concurrent_queries == 0 {
            return Err(BotError::Config(
                "calculator.max_concurrent_queries must be at least 1".into(),
            ));
        }
        if self.bot.poll_interval_secs == 0 {
            return Err(BotError::Config("bot.poll_interval_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
