use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

const DEFAULT_MODEL_URL: &str = "http://localhost:3001";
const DEFAULT_DB_PATH: &str = "data/programs.sqlite";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Runtime settings, read from `PROGRAM_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub model_url: String,
    pub db_path: PathBuf,
    pub timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_source(Environment::with_prefix("PROGRAM").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .set_default("model_url", DEFAULT_MODEL_URL)?
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .add_source(source)
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        Ok(settings.normalized())
    }

    fn normalized(mut self) -> Self {
        self.model_url = self.model_url.trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("PROGRAM")
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn defaults() {
        let s = Settings::from_source(env(&[])).unwrap();
        assert_eq!(s.model_url, DEFAULT_MODEL_URL);
        assert_eq!(s.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(s.timeout(), Duration::from_secs(180));
    }

    #[test]
    fn env_overrides() {
        let s = Settings::from_source(env(&[
            ("PROGRAM_MODEL_URL", "http://gpu-box:3001/"),
            ("PROGRAM_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(s.model_url, "http://gpu-box:3001");
        assert_eq!(s.timeout_secs, 30);
    }
}
