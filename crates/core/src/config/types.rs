use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointConfig;
use crate::orchestrator::EngineConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}
