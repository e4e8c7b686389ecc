use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

const DEFAULT_PORT: u16 = 3845;
const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_RETENTION_DAYS: u32 = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/usage-meter.sqlite"),
            state_dir: PathBuf::from("data/scan-state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory holding one home directory per tenant.
    pub tenants_root: PathBuf,
    /// Transcript tree inside each tenant home.
    pub projects_subdir: PathBuf,
    /// Seconds between scheduled scan cycles; 0 disables the scheduler.
    pub interval_secs: u64,
    pub retention_days: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tenants_root: PathBuf::from("tenants"),
            projects_subdir: PathBuf::from(".claude/projects"),
            interval_secs: DEFAULT_INTERVAL_SECS,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price table override. The bundled table is used when unset.
    pub table_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub storage: StorageConfig,
    pub scan: ScanConfig,
    pub pricing: PricingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl MeterConfig {
    /// Anchors relative paths at `base`, normally the config file's directory.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let anchor = |path: PathBuf| {
            if path.is_relative() {
                base.join(path)
            } else {
                path
            }
        };
        self.storage.db_path = anchor(self.storage.db_path);
        self.storage.state_dir = anchor(self.storage.state_dir);
        self.scan.tenants_root = anchor(self.scan.tenants_root);
        self.pricing.table_path = self.pricing.table_path.map(anchor);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: MeterConfig,
    pub file: PathBuf,
    pub created: bool,
}

/// Reads the config at `file`, writing the defaults there first when it
/// does not exist. Returned paths are absolute relative to the file.
pub fn load_or_create(file: &Path) -> Result<ConfigLoad> {
    let base = file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if file.exists() {
        let contents = fs::read_to_string(file)?;
        let config: MeterConfig = toml::from_str(&contents)?;
        return Ok(ConfigLoad {
            config: config.resolve_paths(&base),
            file: file.to_path_buf(),
            created: false,
        });
    }

    fs::create_dir_all(&base)?;
    let config = MeterConfig::default();
    fs::write(file, toml::to_string_pretty(&config)?)?;
    info!(path = %file.display(), "wrote default config");
    Ok(ConfigLoad {
        config: config.resolve_paths(&base),
        file: file.to_path_buf(),
        created: true,
    })
}

/// Optional `YYYY-MM-DD` bounds sent with range queries.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("conf").join("usage-meter.toml");

        let load = load_or_create(&file).expect("load");
        assert!(load.created);
        assert!(file.exists());
        assert_eq!(load.config.server.port, DEFAULT_PORT);
        assert_eq!(
            load.config.storage.db_path,
            dir.path().join("conf").join("data/usage-meter.sqlite")
        );

        let again = load_or_create(&file).expect("reload");
        assert!(!again.created);
        assert_eq!(again.config, load.config);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("usage-meter.toml");
        fs::write(
            &file,
            r#"
[scan]
tenants_root = "/srv/tenants"
retention_days = 30

[logging]
format = "json"
"#,
        )
        .expect("write config");

        let config = load_or_create(&file).expect("load").config;
        assert_eq!(config.scan.tenants_root, PathBuf::from("/srv/tenants"));
        assert_eq!(config.scan.retention_days, 30);
        assert_eq!(config.scan.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pricing.table_path, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("usage-meter.toml");
        fs::write(&file, "[server\nport = 1").expect("write config");
        assert!(load_or_create(&file).is_err());
    }
}
