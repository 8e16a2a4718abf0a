use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub workspace_dir: PathBuf,
    pub flush_interval_secs: u64,
    pub max_persist_attempts: u32,
    // Soft per-record deadline; overruns are logged, not aborted.
    pub persist_deadline_ms: u64,
    pub dead_letter_capacity: usize,
    pub sqlite_busy_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base_dir = dirs::home_dir()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let workspace_dir = base_dir.join(".vigil");

        Self {
            workspace_dir,
            flush_interval_secs: 60,
            max_persist_attempts: 5,
            persist_deadline_ms: 2000,
            dead_letter_capacity: 256,
            sqlite_busy_timeout_ms: 5000,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let workspace_dir = Self::default().workspace_dir;
        let config_path = workspace_dir.join("config.toml");

        let mut builder = Config::builder()
            .set_default("workspace_dir", workspace_dir.to_string_lossy().as_ref())?
            .set_default("flush_interval_secs", 60)?
            .set_default("max_persist_attempts", 5)?
            .set_default("persist_deadline_ms", 2000)?
            .set_default("dead_letter_capacity", 256)?
            .set_default("sqlite_busy_timeout_ms", 5000)?;

        if config_path.exists() {
            builder = builder.add_source(File::from(config_path));
        }

        builder = builder.add_source(Environment::with_prefix("VIGIL"));

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.workspace_dir.join("vigil.sqlite3")
    }
}
