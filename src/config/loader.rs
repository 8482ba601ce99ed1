//! Load server config and entity declarations from JSON files, with env overrides.

use crate::config::{validate_app_config, AppConfig, EntityDecl, Schema, SchemaBuilder};
use crate::error::{AppError, ConfigError};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "roost.json";

/// `ROOST_CONFIG`, else `roost.json` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::var("ROOST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn parse_app_config(json: &str) -> Result<AppConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(format!("app config: {}", e)))
}

pub fn parse_declarations(json: &str) -> Result<Vec<EntityDecl>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(format!("entity declarations: {}", e)))
}

/// `DATABASE_URL` and `ROOST_LISTEN` win over the file.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(listen) = std::env::var("ROOST_LISTEN") {
        config.listen = listen;
    }
}

pub async fn load_app_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let mut config = parse_app_config(&raw)?;
    apply_env_overrides(&mut config);
    validate_app_config(&config)?;
    tracing::debug!(path = %path.display(), provider = %config.database.provider, "app config loaded");
    Ok(config)
}

/// Schema file path; relative paths resolve against the config file's directory.
pub fn schema_path(config: &AppConfig, config_file: &Path) -> PathBuf {
    let p = PathBuf::from(&config.schema);
    if p.is_absolute() {
        return p;
    }
    config_file
        .parent()
        .map(|dir| dir.join(&p))
        .unwrap_or(p)
}

pub async fn load_declarations(path: &Path) -> Result<Vec<EntityDecl>, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_declarations(&raw)
}

/// Read the declarations named by `config` and resolve them.
pub async fn load_schema(config: &AppConfig, config_file: &Path) -> Result<Schema, AppError> {
    let decls = load_declarations(&schema_path(config, config_file)).await?;
    Ok(SchemaBuilder::new().extend(decls).initialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "database": {"provider": "sqlite", "url": "sqlite::memory:"},
        "url_prefix": "/api",
        "schema": "schema.json",
        "mounts": [{"template": "/hotels/[id]", "entity": "Hotel"}]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let config = parse_app_config(CONFIG).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.body_limit, 1024 * 1024);
        assert!(!config.optimize);
        assert!(validate_app_config(&config).is_ok());
    }

    #[test]
    fn rejects_unknown_provider() {
        let mut config = parse_app_config(CONFIG).unwrap();
        config.database.provider = "oracle".into();
        assert!(matches!(validate_app_config(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_prefix_without_slash() {
        let mut config = parse_app_config(CONFIG).unwrap();
        config.url_prefix = "api".into();
        assert!(validate_app_config(&config).is_err());
    }

    #[test]
    fn schema_path_is_relative_to_config() {
        let config = parse_app_config(CONFIG).unwrap();
        assert_eq!(
            schema_path(&config, Path::new("/etc/roost/roost.json")),
            PathBuf::from("/etc/roost/schema.json")
        );
    }

    #[test]
    fn bad_json_is_a_load_error() {
        assert!(matches!(parse_declarations("{"), Err(ConfigError::Load(_))));
    }
}
