//! Router configuration loader.
//!
//! Reads `routewise.toml` from the config directory (`~/.routewise/` unless
//! `ROUTEWISE_HOME` is set) and deserializes it into [`RouterConfig`].

use std::path::{Path, PathBuf};

use routewise_types::config::RouterConfig;
use routewise_types::error::ConfigError;

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "routewise.toml";

/// Resolve the config directory.
///
/// Priority:
/// 1. `ROUTEWISE_HOME` environment variable
/// 2. `~/.routewise`
/// 3. `.routewise` in the current directory
pub fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ROUTEWISE_HOME") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".routewise");
    }

    PathBuf::from(".routewise")
}

/// Load configuration from `{config_dir}/routewise.toml`.
///
/// - Missing file: returns [`RouterConfig::default()`].
/// - Unreadable, malformed or invalid file: logs a warning and returns the default.
pub async fn load_router_config(config_dir: &Path) -> RouterConfig {
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE_NAME} found at {}, using defaults", config_path.display());
            return RouterConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RouterConfig::default();
        }
    };

    match parse_router_config(&content, &config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            RouterConfig::default()
        }
    }
}

/// Load an explicitly named config file. Every problem is an error.
pub async fn load_router_config_file(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
    parse_router_config(&content, path)
}

fn parse_router_config(content: &str, path: &Path) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Serialize a config back to TOML, e.g. for `routewise config --toml`.
pub fn render_router_config(config: &RouterConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|err| ConfigError::Invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_router_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_router_config(tmp.path()).await;
        assert_eq!(config, RouterConfig::default());
    }

    #[tokio::test]
    async fn load_router_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
max_failure_threshold = 3
default_hierarchy = ["openai", "llamacpp"]

[[providers]]
name = "openai"
capabilities = ["streaming", "vision"]
models = ["gpt-4o-mini"]
"#,
        )
        .await
        .unwrap();

        let config = load_router_config(tmp.path()).await;
        assert_eq!(config.max_failure_threshold, 3);
        assert_eq!(config.default_hierarchy, vec!["openai", "llamacpp"]);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.isolation_duration_secs, 300);
    }

    #[tokio::test]
    async fn load_router_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_router_config(tmp.path()).await;
        assert_eq!(config, RouterConfig::default());
    }

    #[tokio::test]
    async fn load_router_config_invalid_values_return_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE_NAME), "max_failure_threshold = 0")
            .await
            .unwrap();

        let config = load_router_config(tmp.path()).await;
        assert_eq!(config.max_failure_threshold, 5);
    }

    #[tokio::test]
    async fn load_router_config_file_reports_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(matches!(
            load_router_config_file(&missing).await,
            Err(ConfigError::Read { .. })
        ));

        let bad = tmp.path().join("bad.toml");
        tokio::fs::write(&bad, "max_failure_threshold = \"many\"").await.unwrap();
        assert!(matches!(
            load_router_config_file(&bad).await,
            Err(ConfigError::Parse { .. })
        ));

        let invalid = tmp.path().join("invalid.toml");
        tokio::fs::write(&invalid, "failure_history_capacity = 0").await.unwrap();
        assert!(matches!(
            load_router_config_file(&invalid).await,
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rendered_config_parses_back() {
        let config = RouterConfig::default();
        let rendered = render_router_config(&config).unwrap();
        let parsed: RouterConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
