use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Variables use the `BATCHMILL_` prefix and `__` between sections, e.g.
/// `BATCHMILL_ENGINE__MAX_CONCURRENCY=8`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("BATCHMILL_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[engine]
max_concurrency = 6
initial_concurrency = 2

[checkpoint]
backend = "memory"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.engine.max_concurrency, 6);
        assert_eq!(config.engine.initial_concurrency, Some(2));
        assert_eq!(config.engine.max_attempts, 3);
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
    }

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.engine.max_concurrency, 4);
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Fs);
    }

    #[test]
    fn test_load_config_from_str_bad_backend() {
        let toml = r#"
[checkpoint]
backend = "redis"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/batchmill.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
max_attempts = 5
merge_retry_delay_ms = 250

[checkpoint]
backend = "sqlite"
database_path = "/tmp/runs.db"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.engine.max_attempts, 5);
        assert_eq!(config.engine.merge_retry_delay_ms, 250);
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Sqlite);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "batchmill.toml",
                r#"
[engine]
max_concurrency = 2
"#,
            )?;
            jail.set_env("BATCHMILL_ENGINE__MAX_CONCURRENCY", "9");

            let config = load_config(Path::new("batchmill.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.engine.max_concurrency, 9);
            Ok(())
        });
    }
}
