use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::provision::{ProvisionerSettings, DEFAULT_RULE_FILES_FIELD};
use crate::reload::DEFAULT_RELOAD_URL;

/// Invalid flag combinations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one of --rule-file or --rules-dir must be set")]
    NoTarget,

    #[error("--prometheus-config requires --rules-dir")]
    RegistrationWithoutRulesDir,

    #[error("--max-body-bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Rule provisioning agent configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "ruleprov")]
#[command(about = "Provision Prometheus rule files over HTTP and reload Prometheus")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "RULEPROV_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Prometheus address to reload after provisioning rule files
    #[arg(long, default_value = DEFAULT_RELOAD_URL, env = "RULEPROV_RELOAD_URL")]
    pub prometheus_reload_url: String,

    /// Reload request timeout in seconds
    #[arg(long, default_value = "10", env = "RULEPROV_RELOAD_TIMEOUT_SECS")]
    pub reload_timeout_secs: u64,

    /// File to provision rules into (serves PUT /api/v1/rules)
    #[arg(long, env = "RULEPROV_RULE_FILE")]
    pub rule_file: Option<PathBuf>,

    /// Directory for per-mixin rule files (serves PUT /api/v1/rules/{mixin})
    #[arg(long, env = "RULEPROV_RULES_DIR")]
    pub rules_dir: Option<PathBuf>,

    /// Prometheus configuration file to register per-mixin rule files in
    #[arg(long, env = "RULEPROV_PROMETHEUS_CONFIG")]
    pub prometheus_config: Option<PathBuf>,

    /// Configuration field listing rule files
    #[arg(long, default_value = DEFAULT_RULE_FILES_FIELD, env = "RULEPROV_RULE_FILES_FIELD")]
    pub rule_files_field: String,

    /// Maximum accepted rule document size in bytes
    #[arg(long, default_value = "4194304", env = "RULEPROV_MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "RULEPROV_LOG_JSON")]
    pub log_json: bool,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "RULEPROV_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,
}

impl Config {
    /// Check flag combinations that clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rule_file.is_none() && self.rules_dir.is_none() {
            return Err(ConfigError::NoTarget);
        }
        if self.prometheus_config.is_some() && self.rules_dir.is_none() {
            return Err(ConfigError::RegistrationWithoutRulesDir);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }
        Ok(())
    }

    /// Get reload timeout as Duration.
    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    /// Provisioner settings derived from the flags.
    pub fn provisioner_settings(&self) -> ProvisionerSettings {
        ProvisionerSettings {
            rule_file: self.rule_file.clone(),
            rules_dir: self.rules_dir.clone(),
            prometheus_config: self.prometheus_config.clone(),
            rule_files_field: self.rule_files_field.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            prometheus_reload_url: DEFAULT_RELOAD_URL.to_string(),
            reload_timeout_secs: 10,
            rule_file: None,
            rules_dir: None,
            prometheus_config: None,
            rule_files_field: DEFAULT_RULE_FILES_FIELD.to_string(),
            max_body_bytes: 4 * 1024 * 1024,
            log_level: "info".to_string(),
            log_json: false,
            graceful_shutdown: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.prometheus_reload_url, "http://127.0.0.1:9090/-/reload");
        assert_eq!(config.rule_files_field, "rule_files");
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::try_parse_from([
            "ruleprov",
            "--rules-dir",
            "/etc/prometheus/rules",
            "--prometheus-config",
            "/etc/prometheus/prometheus.yml",
            "--reload-timeout-secs",
            "3",
        ])
        .unwrap();

        assert_eq!(config.rules_dir, Some(PathBuf::from("/etc/prometheus/rules")));
        assert_eq!(config.reload_timeout(), Duration::from_secs(3));
        assert_eq!(config.validate(), Ok(()));

        let settings = config.provisioner_settings();
        assert_eq!(
            settings.prometheus_config,
            Some(PathBuf::from("/etc/prometheus/prometheus.yml"))
        );
    }

    #[test]
    fn test_validate() {
        assert_eq!(Config::default().validate(), Err(ConfigError::NoTarget));

        let config = Config {
            rule_file: Some(PathBuf::from("rules.yaml")),
            prometheus_config: Some(PathBuf::from("prometheus.yml")),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RegistrationWithoutRulesDir)
        );

        let config = Config {
            rule_file: Some(PathBuf::from("rules.yaml")),
            max_body_bytes: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBodyLimit));
    }
}
