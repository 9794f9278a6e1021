//! TOML-based configuration for gitorch.
//!
//! Every section is optional; an empty file yields the defaults. Secrets are
//! never stored in the file: `_env` fields name an environment variable that
//! is read at runtime via [`EngineConfig::resolve_env_vars`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How git is launched.
    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path to (or name of) the git binary.
    #[serde(default = "default_binary")]
    pub binary: PathBuf,

    /// Environment variable holding the path of an askpass helper, forwarded
    /// to git as `GIT_ASKPASS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub askpass_env: Option<String>,

    /// Resolved askpass helper path (not serialized).
    #[serde(skip)]
    pub askpass: Option<String>,

    /// Extra variables set on every git invocation.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_binary() -> PathBuf {
    PathBuf::from("git")
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            askpass_env: None,
            askpass: None,
            env: BTreeMap::new(),
        }
    }
}

impl GitConfig {
    /// The environment every git invocation starts from: the configured
    /// variables plus the resolved askpass helper.
    pub fn process_env(&self) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        if let Some(ref askpass) = self.askpass {
            env.insert("GIT_ASKPASS".into(), askpass.clone());
        }
        env
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error. `RUST_LOG`
    /// takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl EngineConfig {
    /// Load from a TOML file. Does **not** resolve environment variables.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Resolve `*_env` fields. A missing variable is logged, not fatal.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.git.askpass_env {
            self.git.askpass = resolve_optional_env(env_name, "git.askpass_env");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.git.binary.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.binary".into(),
                detail: "git binary must not be empty".into(),
            });
        }
        if let Some(key) = self
            .git
            .env
            .keys()
            .find(|k| k.is_empty() || k.contains('='))
        {
            return Err(ConfigError::InvalidValue {
                field: "git.env".into(),
                detail: format!("'{key}' is not a valid environment variable name"),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!(
                    "'{}' is not one of {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// A commented starting point for a new config file.
    pub fn sample_toml() -> &'static str {
        SAMPLE_CONFIG
    }
}

const SAMPLE_CONFIG: &str = r#"# gitorch configuration

[git]
# Path to the git binary.
binary = "git"
# Name of an environment variable holding the path of an askpass helper.
# askpass_env = "GITORCH_ASKPASS"

[git.env]
# Never prompt on the terminal.
GIT_TERMINAL_PROMPT = "0"

[logging]
# trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"
# file = "/tmp/gitorch.log"
"#;

fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config.git.binary, PathBuf::from("git"));
        assert!(config.git.env.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_sample_parses_and_validates() {
        let config = EngineConfig::from_toml(EngineConfig::sample_toml()).unwrap();
        assert_eq!(config.git.env.get("GIT_TERMINAL_PROMPT").map(String::as_str), Some("0"));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitorch.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"[git]\nbinary = \"/usr/local/bin/git\"\n[logging]\nlevel = \"debug\"\nfile = \"/tmp/g.log\"\n")
            .unwrap();

        let config = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.git.binary, PathBuf::from("/usr/local/bin/git"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/g.log")));
    }

    #[test]
    fn test_file_not_found() {
        let result = EngineConfig::load_from_file("/nonexistent/gitorch.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = EngineConfig::from_toml("[git\nbinary=");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let mut config = EngineConfig::default();
        config.logging.level = "loud".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "logging.level"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_env_name() {
        let mut config = EngineConfig::default();
        config.git.env.insert("A=B".into(), "x".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "git.env"
        ));
    }

    #[test]
    fn test_resolve_askpass() {
        std::env::set_var("TEST_GITORCH_ASKPASS", "/usr/libexec/askpass");

        let mut config = EngineConfig::from_toml("[git]\naskpass_env = \"TEST_GITORCH_ASKPASS\"\n").unwrap();
        config.resolve_env_vars().unwrap();

        let env = config.git.process_env();
        assert_eq!(env.get("GIT_ASKPASS").map(String::as_str), Some("/usr/libexec/askpass"));

        std::env::remove_var("TEST_GITORCH_ASKPASS");
    }

    #[test]
    fn test_missing_askpass_var_is_not_fatal() {
        let mut config =
            EngineConfig::from_toml("[git]\naskpass_env = \"TEST_GITORCH_UNSET_VAR\"\n").unwrap();
        config.resolve_env_vars().unwrap();
        assert!(config.git.askpass.is_none());
        assert!(!config.git.process_env().contains_key("GIT_ASKPASS"));
    }
}
