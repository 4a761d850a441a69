//! Configuration module for palletizer-motion.
//!
//! Provides types for loading and validating compiler, planner, queue and
//! bridge settings from TOML. Every section and field has a default, so an
//! empty document is a valid configuration.

mod bridge;
mod loader;
mod planner;
mod system;
mod validation;

pub use bridge::BridgeConfig;
pub use loader::{load_config, parse_config};
pub use planner::PlannerConfig;
pub use system::{CompilerConfig, QueueConfig, SystemConfig};
pub use validation::validate_config;
