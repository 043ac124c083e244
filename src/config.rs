use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ees: EesConfig,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// EES-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EesConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Collection (directory walk) configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectConfig {
    /// Extra ignore patterns applied on top of the built-in defaults
    /// and the directory's own ignore file.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Maximum walk depth from the sync root (root = 0). Unset walks the
    /// whole tree.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Per-file processing limits
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Any file reported larger than this fails before its content is read.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Target chunk length in characters. A heuristic bound, not a hard one.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_enable_chunking")]
    pub enable_chunking: bool,
    /// PDF inputs larger than this are rejected before any decode attempt.
    #[serde(default = "default_max_pdf_bytes")]
    pub max_pdf_bytes: u64,
    /// Wall-clock limit for one PDF extraction.
    #[serde(default = "default_pdf_timeout_ms")]
    pub pdf_timeout_ms: u64,
    /// Cap on extracted PDF text length in characters.
    #[serde(default = "default_max_pdf_text")]
    pub max_pdf_text: usize,
}

impl ProcessingConfig {
    pub fn pdf_timeout(&self) -> Duration {
        Duration::from_millis(self.pdf_timeout_ms)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_chunk_size: default_max_chunk_size(),
            enable_chunking: default_enable_chunking(),
            max_pdf_bytes: default_max_pdf_bytes(),
            pdf_timeout_ms: default_pdf_timeout_ms(),
            max_pdf_text: default_max_pdf_text(),
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    /// Base URL of the embedding service, e.g. "https://embeddings.example.com/v1"
    pub api_url: String,
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub task_types: Vec<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10 MB
}

fn default_max_chunk_size() -> usize {
    8000
}

fn default_enable_chunking() -> bool {
    true
}

fn default_max_pdf_bytes() -> u64 {
    25 * 1024 * 1024 // 25 MB
}

fn default_pdf_timeout_ms() -> u64 {
    30_000
}

fn default_max_pdf_text() -> usize {
    1_000_000
}

fn default_api_key_env() -> String {
    "EES_EMBEDDING_API_KEY".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in EES_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("EES_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.embeddings.api_url.trim().is_empty() {
            anyhow::bail!("embeddings.api_url must not be empty");
        }

        // Check both environment variable and .env file (dotenv already loaded in Config::load)
        std::env::var(&self.embeddings.api_key_env)
            .with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable with your embedding provider API key.",
                    self.embeddings.api_key_env
                )
            })?;

        if self.processing.max_file_size == 0 {
            anyhow::bail!("processing.max_file_size must be greater than 0");
        }

        if self.processing.max_chunk_size == 0 {
            anyhow::bail!("processing.max_chunk_size must be greater than 0");
        }

        if self.processing.pdf_timeout_ms == 0 {
            anyhow::bail!("processing.pdf_timeout_ms must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.ees.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn test_config_toml() -> &'static str {
        r#"
[ees]
db_path = "./ees.db"
log_level = "debug"

[processing]
max_file_size = 1048576
max_chunk_size = 4000
enable_chunking = true

[embeddings]
api_url = "https://embeddings.example.com/v1"
model = "embed-v2"
api_key_env = "EES_EMBEDDING_API_KEY"
task_types = ["retrieval_document"]
"#
    }

    fn with_config_env(config_path: &Path, api_key: Option<&str>, f: impl FnOnce()) {
        let original_config = std::env::var("EES_CONFIG").ok();
        let original_key = std::env::var("EES_EMBEDDING_API_KEY").ok();
        std::env::set_var("EES_CONFIG", config_path.to_str().unwrap());
        match api_key {
            Some(k) => std::env::set_var("EES_EMBEDDING_API_KEY", k),
            None => std::env::remove_var("EES_EMBEDDING_API_KEY"),
        }
        f();
        std::env::remove_var("EES_CONFIG");
        std::env::remove_var("EES_EMBEDDING_API_KEY");
        if let Some(val) = original_config {
            std::env::set_var("EES_CONFIG", val);
        }
        if let Some(val) = original_key {
            std::env::set_var("EES_EMBEDDING_API_KEY", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, test_config_toml()).unwrap();
        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.ees.log_level, "debug");
            assert_eq!(config.processing.max_file_size, 1_048_576);
            assert_eq!(config.processing.max_chunk_size, 4000);
            assert_eq!(config.embeddings.model, "embed-v2");
            // Defaults fill in whatever the file omits
            assert_eq!(config.processing.pdf_timeout_ms, 30_000);
            assert_eq!(config.http_server.port, 8080);
            assert!(config.collect.max_depth.is_none());
        });
    }

    #[test]
    fn test_config_missing_api_key() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, test_config_toml()).unwrap();
        with_config_env(&config_path, None, || {
            let config = Config::load();
            assert!(config.is_err(), "Expected missing API key error");
            assert!(config.unwrap_err().to_string().contains("EES_EMBEDDING_API_KEY"));
        });
    }

    #[test]
    fn test_config_rejects_empty_api_url() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let toml = test_config_toml().replace("https://embeddings.example.com/v1", "");
        fs::write(&config_path, toml).unwrap();
        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("api_url"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("EES_CONFIG").ok();
        std::env::set_var("EES_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("EES_CONFIG");
        if let Some(v) = original {
            std::env::set_var("EES_CONFIG", v);
        }
    }
}
