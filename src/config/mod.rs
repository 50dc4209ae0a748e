use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub engine: EngineConfig,
}

/// Tunables for the run engine. The acceptance threshold is deliberately a
/// configuration value, not a constant, so deployments can calibrate it to
/// their benchmark noise floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum concurrently executing sandbox validations per run.
    pub sandbox_concurrency: usize,
    /// Hard wall-clock budget per sandbox command.
    pub sandbox_timeout_secs: u64,
    /// Grace period for in-flight sandboxes after a cancellation request.
    pub teardown_grace_secs: u64,
    /// Minimum relative benchmark improvement for acceptance.
    pub improvement_threshold: f64,
    /// Measurement noise discounted from the observed delta.
    pub noise_tolerance: f64,
    /// Benchmark repetitions averaged into one measurement.
    pub bench_samples: u32,
    /// Cap on captured stdout/stderr per sandbox command.
    pub max_output_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sandbox_concurrency: 4,
            sandbox_timeout_secs: 300,
            teardown_grace_secs: 10,
            improvement_threshold: 0.05,
            noise_tolerance: 0.02,
            bench_samples: 3,
            max_output_bytes: 256 * 1024,
        }
    }
}

impl EngineConfig {
    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox_timeout_secs)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_secs(self.teardown_grace_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:optforge.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 6820,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = Self::from_conf_file()? {
            config.apply_file(file_config);
        }

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("PORT") {
            config.port = port.parse().unwrap_or(config.port);
        }

        if let Ok(n) = std::env::var("SANDBOX_CONCURRENCY") {
            if let Ok(n) = n.parse::<usize>() {
                config.engine.sandbox_concurrency = n.max(1);
            }
        }

        if let Ok(t) = std::env::var("IMPROVEMENT_THRESHOLD") {
            if let Ok(t) = t.parse::<f64>() {
                config.engine.improvement_threshold = t;
            }
        }

        Ok(config)
    }

    fn from_conf_file() -> Result<Option<FileConfig>> {
        let Ok(path) = std::env::var("OPTFORGE_CONFIG") else {
            return Ok(None);
        };
        let path = std::path::PathBuf::from(path);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file_config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(Some(file_config))
    }

    fn apply_file(&mut self, file_config: FileConfig) {
        if let Some(database_url) = file_config.database_url {
            self.database_url = database_url;
        }
        if let Some(host) = file_config.host {
            self.host = host;
        }
        if let Some(port) = file_config.port {
            self.port = port;
        }
        if let Some(engine) = file_config.engine {
            self.engine = engine;
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    database_url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    engine: Option<EngineConfig>,
}
