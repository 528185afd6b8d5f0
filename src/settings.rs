use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub timeout_secs: u64,
    pub similarity_threshold: f64,
    /// Items printed per block before the rest is summarized.
    pub display_number: usize,
    pub concurrency: usize,
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("db_path", "data/spider.sqlite")?
        .set_default("timeout_secs", 2_i64)?
        .set_default("similarity_threshold", 0.6)?
        .set_default("display_number", 100_i64)?
        .set_default("concurrency", 10_i64)?
        .set_default("accept_invalid_certs", false)?
        .set_default("user_agent", concat!("pattern_spider/", env!("CARGO_PKG_VERSION")))?)
}

/// Defaults, then `spider.toml` if present, then `SPIDER_*` variables.
pub fn load() -> Result<Settings> {
    defaults()?
        .add_source(File::with_name("spider").required(false))
        .add_source(Environment::with_prefix("SPIDER").try_parsing(true))
        .build()
        .context("Failed to load settings")?
        .try_deserialize()
        .context("Invalid settings")
}
