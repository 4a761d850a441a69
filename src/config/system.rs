//! System configuration - root configuration structure.

use serde::Deserialize;

use super::bridge::BridgeConfig;
use super::planner::PlannerConfig;

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Script compiler limits.
    pub compiler: CompilerConfig,

    /// Planner defaults.
    pub planner: PlannerConfig,

    /// Command queue settings.
    pub queue: QueueConfig,

    /// Device bridge settings.
    pub bridge: BridgeConfig,
}

/// Limits applied while expanding `CALL` and `LOOP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Deepest allowed chain of nested `CALL`s.
    pub max_call_depth: usize,

    /// Largest number of commands a script may expand to.
    pub max_expanded_commands: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 32,
            max_expanded_commands: 100_000,
        }
    }
}

/// Command queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Retries granted to non-emergency commands.
    pub max_retries: u32,
}

impl QueueConfig {
    /// Upper bound accepted by validation.
    pub const MAX_RETRIES_LIMIT: u32 = 16;
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}
