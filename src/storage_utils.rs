use crate::client::DEFAULT_BASE_URL;
use crate::scanner::ScanOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub const CONFIG_NAME: &str = "config";

// CONFIGURATION STRUCTS
// Every field has a default so a partial config.json still loads.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    pub limit: usize,          // instruments per scan
    pub quote_currency: String, // e.g., "USDT"
    pub concurrency: usize,
    pub min_request_spacing_ms: u64,
    pub deadline_secs: u64,
    pub grace_ms: u64,
    pub catalog_max_age_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            limit: 20,
            quote_currency: "USDT".to_string(),
            concurrency: 10,
            min_request_spacing_ms: 25,
            deadline_secs: 30,
            grace_ms: 500,
            catalog_max_age_secs: 300,
        }
    }
}

impl ScanConfig {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            concurrency: self.concurrency.max(1),
            min_request_spacing: Duration::from_millis(self.min_request_spacing_ms),
            deadline: Duration::from_secs(self.deadline_secs),
            grace: Duration::from_millis(self.grace_ms),
        }
    }

    pub fn catalog_max_age(&self) -> Duration {
        Duration::from_secs(self.catalog_max_age_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,  // EnvFilter directive, e.g. "info" or "blofin_scanner=debug"
    pub format: String, // "plain" or "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub scan: ScanConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }

    /// Loads `config.json`, writing the defaults first if it does not exist yet.
    pub async fn load_or_init(storage: &AsyncStorageManager) -> anyhow::Result<Self> {
        if storage.exists(CONFIG_NAME) {
            return storage
                .load(CONFIG_NAME)
                .await
                .with_context(|| format!("invalid {}", storage.path_for(CONFIG_NAME).display()));
        }

        let config = Self::default();
        storage.save(CONFIG_NAME, &config).await?;
        Ok(config)
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Storage directory next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::at(base_dir).await
    }

    /// Storage rooted at an explicit directory, created if missing.
    pub async fn at<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)
                .await
                .with_context(|| format!("cannot create {}", base_dir.display()))?;
        }
        Ok(Self { base_dir })
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    /// Writes pretty JSON through a `.tmp` file and a rename, so a crash
    /// mid-write leaves the previous file intact.
    pub async fn save<T: Serialize>(&self, name: &str, data: &T) -> anyhow::Result<()> {
        let final_path = self.path_for(name);
        let tmp_path = self.base_dir.join(format!("{}.json.tmp", name));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        // serde_json validates UTF-8 itself, no need for read_to_string
        let content = fs::read(self.path_for(name)).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("blofin-scanner-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"scan":{"limit":35}}"#).unwrap();
        assert_eq!(config.scan.limit, 35);
        assert_eq!(config.scan.quote_currency, "USDT");
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.logging.format, "plain");
    }

    #[test]
    fn test_scan_options_conversion() {
        let scan = ScanConfig {
            concurrency: 0,
            min_request_spacing_ms: 40,
            ..Default::default()
        };
        let options = scan.scan_options();
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.min_request_spacing, Duration::from_millis(40));
        assert_eq!(options.deadline, Duration::from_secs(30));
        assert_eq!(scan.catalog_max_age(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_load_or_init_writes_defaults_then_reads_edits() {
        let dir = scratch_dir("init");
        let _ = fs::remove_dir_all(&dir).await;
        let storage = AsyncStorageManager::at(&dir).await.unwrap();

        let first = AppConfig::load_or_init(&storage).await.unwrap();
        assert_eq!(first, AppConfig::default());
        assert!(storage.exists(CONFIG_NAME));

        let mut edited = first.clone();
        edited.scan.limit = 50;
        storage.save(CONFIG_NAME, &edited).await.unwrap();
        let second = AppConfig::load_or_init(&storage).await.unwrap();
        assert_eq!(second.scan.limit, 50);

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_config_is_error() {
        let dir = scratch_dir("corrupt");
        let _ = fs::remove_dir_all(&dir).await;
        let storage = AsyncStorageManager::at(&dir).await.unwrap();
        fs::write(storage.path_for(CONFIG_NAME), b"{ not json").await.unwrap();

        assert!(AppConfig::load_or_init(&storage).await.is_err());

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
