use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure for node-doctor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AWS configuration
    pub aws: AwsConfig,

    /// Application under diagnosis
    pub target: TargetConfig,

    /// Diagnostic run configuration
    pub diagnostic: DiagnosticSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Instance name offered as the prompt default
    pub default_instance: String,

    /// Region offered as the prompt default
    pub default_region: String,

    /// AWS profile to load credentials from
    pub profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            default_instance: "AiFunCheckApp1".to_string(),
            default_region: "us-east-1".to_string(),
            profile: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Application directory on the instance
    pub app_dir: String,

    /// PM2 process name
    pub process_name: String,

    /// Port the application listens on
    pub app_port: u16,

    /// Health endpoint path
    pub health_path: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            app_dir: "/var/www/aifuncheckapp1".to_string(),
            process_name: "aifuncheckapp1".to_string(),
            app_port: 3000,
            health_path: "/api/health".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticSettings {
    /// Remote script timeout in seconds
    pub timeout_seconds: u64,

    /// SSH port on the instance
    pub ssh_port: u16,

    /// ssh client binary
    pub ssh_binary: String,

    /// Default report format (text, json, yaml)
    pub report_format: String,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 180,
            ssh_port: 22,
            ssh_binary: "ssh".to_string(),
            report_format: "text".to_string(),
        }
    }
}

impl DiagnosticSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable file logging
    pub file_logging: bool,

    /// Log file directory
    pub log_dir: Option<PathBuf>,

    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file_logging: false,
            log_dir: None,
            json_format: false,
        }
    }
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["text", "json", "yaml"];

impl Config {
    /// Load configuration from file, falling back to defaults
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut config = if config_file.exists() {
            let content = fs::read_to_string(&config_file)
                .await
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            Self::parse(&config_file, &content)?
        } else if config_path.is_some() {
            anyhow::bail!("Config file not found: {:?}", config_file);
        } else {
            tracing::debug!("No config file at {:?}, using defaults", config_file);
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(content)
                .with_context(|| format!("Failed to parse TOML config: {:?}", path))
        } else {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse JSON config: {:?}", path))
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(instance) = env::var("NODE_DOCTOR_INSTANCE") {
            self.aws.default_instance = instance;
        }

        if let Ok(region) = env::var("NODE_DOCTOR_REGION") {
            self.aws.default_region = region;
        }

        if let Ok(profile) = env::var("NODE_DOCTOR_AWS_PROFILE") {
            self.aws.profile = Some(profile);
        }

        if let Ok(app_dir) = env::var("NODE_DOCTOR_APP_DIR") {
            self.target.app_dir = app_dir;
        }

        if let Ok(name) = env::var("NODE_DOCTOR_PROCESS_NAME") {
            self.target.process_name = name;
        }

        if let Ok(port) = env::var("NODE_DOCTOR_APP_PORT") {
            self.target.app_port = port.parse()
                .with_context(|| "Invalid NODE_DOCTOR_APP_PORT value")?;
        }

        if let Ok(path) = env::var("NODE_DOCTOR_HEALTH_PATH") {
            self.target.health_path = path;
        }

        if let Ok(timeout) = env::var("NODE_DOCTOR_TIMEOUT") {
            self.diagnostic.timeout_seconds = timeout.parse()
                .with_context(|| "Invalid NODE_DOCTOR_TIMEOUT value")?;
        }

        if let Ok(port) = env::var("NODE_DOCTOR_SSH_PORT") {
            self.diagnostic.ssh_port = port.parse()
                .with_context(|| "Invalid NODE_DOCTOR_SSH_PORT value")?;
        }

        if let Ok(binary) = env::var("NODE_DOCTOR_SSH_BINARY") {
            self.diagnostic.ssh_binary = binary;
        }

        if let Ok(level) = env::var("NODE_DOCTOR_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }

        if let Ok(file_logging) = env::var("NODE_DOCTOR_FILE_LOGGING") {
            self.logging.file_logging = file_logging.parse()
                .with_context(|| "Invalid NODE_DOCTOR_FILE_LOGGING value (use true/false)")?;
        }

        if let Ok(json_format) = env::var("NODE_DOCTOR_JSON_LOGGING") {
            self.logging.json_format = json_format.parse()
                .with_context(|| "Invalid NODE_DOCTOR_JSON_LOGGING value (use true/false)")?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };

        fs::write(config_path, content).await
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .context("Could not determine config directory")?;

        Ok(config_dir.join("node-doctor").join("config.toml"))
    }

    /// Default directory for rolling log files
    pub fn default_log_dir() -> PathBuf {
        dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .map(|d| d.join("node-doctor").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.aws.default_instance.trim().is_empty() {
            anyhow::bail!("default_instance must not be empty");
        }

        if self.aws.default_region.trim().is_empty() {
            anyhow::bail!("default_region must not be empty");
        }

        if !self.target.app_dir.starts_with('/') {
            anyhow::bail!("app_dir must be an absolute path, got '{}'", self.target.app_dir);
        }

        if self.target.process_name.trim().is_empty() {
            anyhow::bail!("process_name must not be empty");
        }

        if self.target.app_port == 0 {
            anyhow::bail!("app_port must be greater than 0");
        }

        if !self.target.health_path.starts_with('/') {
            anyhow::bail!("health_path must start with '/', got '{}'", self.target.health_path);
        }

        if self.diagnostic.timeout_seconds == 0 {
            anyhow::bail!("timeout_seconds must be greater than 0");
        }

        if self.diagnostic.timeout_seconds > 1800 {
            tracing::warn!("timeout_seconds is set to {}s, which is unusually long", self.diagnostic.timeout_seconds);
        }

        if self.diagnostic.ssh_port == 0 {
            anyhow::bail!("ssh_port must be greater than 0");
        }

        if !VALID_FORMATS.contains(&self.diagnostic.report_format.as_str()) {
            anyhow::bail!("Invalid report format '{}'. Must be one of: {}", self.diagnostic.report_format, VALID_FORMATS.join(", "));
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level '{}'. Must be one of: {}", self.logging.level, VALID_LEVELS.join(", "));
        }

        Ok(())
    }

    /// Get list of all supported environment variables
    pub fn env_variables_help() -> Vec<(&'static str, &'static str)> {
        vec![
            ("NODE_DOCTOR_INSTANCE", "Default Lightsail instance name"),
            ("NODE_DOCTOR_REGION", "Default AWS region"),
            ("NODE_DOCTOR_AWS_PROFILE", "AWS profile to use"),
            ("NODE_DOCTOR_APP_DIR", "Application directory on the instance"),
            ("NODE_DOCTOR_PROCESS_NAME", "PM2 process name"),
            ("NODE_DOCTOR_APP_PORT", "Port the application listens on"),
            ("NODE_DOCTOR_HEALTH_PATH", "Health endpoint path"),
            ("NODE_DOCTOR_TIMEOUT", "Remote script timeout in seconds"),
            ("NODE_DOCTOR_SSH_PORT", "SSH port on the instance"),
            ("NODE_DOCTOR_SSH_BINARY", "Path to the ssh client"),
            ("NODE_DOCTOR_LOG_LEVEL", "Log level (trace/debug/info/warn/error)"),
            ("NODE_DOCTOR_FILE_LOGGING", "Enable file logging (true/false)"),
            ("NODE_DOCTOR_JSON_LOGGING", "Enable JSON log format (true/false)"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    // Tests that touch NODE_DOCTOR_* variables, or load() which reads them
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        for (name, _) in Config::env_variables_help() {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.aws.default_instance, "AiFunCheckApp1");
        assert_eq!(config.aws.default_region, "us-east-1");
        assert_eq!(config.target.app_port, 3000);
        assert_eq!(config.diagnostic.timeout(), Duration::from_secs(180));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.target.app_dir = "relative/dir".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.diagnostic.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.target.health_path = "api/health".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.diagnostic.report_format = "html".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_partial_toml() {
        let _env = env_lock();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doctor.toml");
        std::fs::write(
            &path,
            "[target]\napp_dir = \"/srv/shop\"\nprocess_name = \"shop\"\napp_port = 8080\n",
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).await.unwrap();
        assert_eq!(config.target.app_dir, "/srv/shop");
        assert_eq!(config.target.process_name, "shop");
        assert_eq!(config.target.app_port, 8080);
        // untouched sections keep their defaults
        assert_eq!(config.target.health_path, "/api/health");
        assert_eq!(config.diagnostic.timeout_seconds, 180);
    }

    #[tokio::test]
    async fn test_save_and_load_json() {
        let _env = env_lock();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doctor.json");

        let mut config = Config::default();
        config.aws.default_instance = "api-box".to_string();
        config.save(&path).await.unwrap();

        let loaded = Config::load(Some(path.as_path())).await.unwrap();
        assert_eq!(loaded.aws.default_instance, "api-box");
        assert_eq!(loaded.target, TargetConfig::default());
    }

    #[tokio::test]
    async fn test_missing_explicit_config_fails() {
        let _env = env_lock();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::load(Some(path.as_path())).await.is_err());
    }

    #[test]
    fn test_env_help_uses_prefix() {
        let vars = Config::env_variables_help();
        assert!(!vars.is_empty());
        assert!(vars.iter().all(|(name, _)| name.starts_with("NODE_DOCTOR_")));
    }

    #[test]
    fn test_env_overrides_applied() {
        let _env = env_lock();
        clear_env();
        env::set_var("NODE_DOCTOR_INSTANCE", "shop-box");
        env::set_var("NODE_DOCTOR_REGION", "eu-west-2");
        env::set_var("NODE_DOCTOR_APP_PORT", "8080");
        env::set_var("NODE_DOCTOR_TIMEOUT", "30");
        env::set_var("NODE_DOCTOR_LOG_LEVEL", "DEBUG");
        env::set_var("NODE_DOCTOR_FILE_LOGGING", "true");

        let mut config = Config::default();
        let result = config.apply_env_overrides();
        clear_env();

        assert!(result.is_ok());
        assert_eq!(config.aws.default_instance, "shop-box");
        assert_eq!(config.aws.default_region, "eu-west-2");
        assert_eq!(config.target.app_port, 8080);
        assert_eq!(config.diagnostic.timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file_logging);
        // unset variables leave defaults alone
        assert_eq!(config.target.process_name, "aifuncheckapp1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_reject_bad_values() {
        let _env = env_lock();
        clear_env();

        env::set_var("NODE_DOCTOR_APP_PORT", "abc");
        let port = Config::default().apply_env_overrides();
        env::remove_var("NODE_DOCTOR_APP_PORT");

        env::set_var("NODE_DOCTOR_FILE_LOGGING", "yes");
        let file_logging = Config::default().apply_env_overrides();
        env::remove_var("NODE_DOCTOR_FILE_LOGGING");

        let port = port.unwrap_err();
        assert!(port.to_string().contains("NODE_DOCTOR_APP_PORT"));
        let file_logging = file_logging.unwrap_err();
        assert!(file_logging.to_string().contains("NODE_DOCTOR_FILE_LOGGING"));
    }
}
