use super::{types::Config, ConfigError};
use crate::checkpoint::CheckpointBackend;

/// Validate configuration
/// Currently validates:
/// - Concurrency ceiling and initial limit are at least 1
/// - Unit and merge attempts are at least 1
/// - The path for the selected checkpoint backend is set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let engine = &config.engine;

    if engine.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_concurrency must be at least 1".to_string(),
        ));
    }

    if let Some(initial) = engine.initial_concurrency {
        if initial == 0 || initial > engine.max_concurrency {
            return Err(ConfigError::ValidationError(format!(
                "engine.initial_concurrency must be between 1 and {}",
                engine.max_concurrency
            )));
        }
    }

    if engine.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_attempts must be at least 1".to_string(),
        ));
    }

    if engine.merge_max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "engine.merge_max_attempts must be at least 1".to_string(),
        ));
    }

    // Checkpoint validation
    match config.checkpoint.backend {
        CheckpointBackend::Fs if config.checkpoint.dir.as_os_str().is_empty() => {
            return Err(ConfigError::ValidationError(
                "checkpoint.dir is required when backend = \"fs\"".to_string(),
            ));
        }
        CheckpointBackend::Sqlite if config.checkpoint.database_path.as_os_str().is_empty() => {
            return Err(ConfigError::ValidationError(
                "checkpoint.database_path is required when backend = \"sqlite\"".to_string(),
            ));
        }
        _ => {}
    }

    Ok(())
}
