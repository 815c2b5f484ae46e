//! Error types for the combat core.
//!
//! Nothing in the simulation is fatal: lookups that fail are logged and the
//! calling operation degrades to a no-op. These types exist for the fallible
//! edges (data loading, snapshots, registry lookups).

use thiserror::Error;
use warband_common::{ActorId, ArchetypeId, WarbandError};

/// Simulation error types.
#[derive(Debug, Error)]
pub enum SimError {
    /// Actor not found in the registry
    #[error("actor not found: {0}")]
    ActorNotFound(ActorId),
    /// Behavior name not present in the behavior registry
    #[error("behavior not registered: {0}")]
    BehaviorNotRegistered(String),
    /// Interaction name not present in the interaction registry
    #[error("interaction not registered: {0}")]
    InteractionNotRegistered(String),
    /// Archetype not present in the catalog
    #[error("archetype not found: {0}")]
    ArchetypeNotFound(ArchetypeId),
    /// Snapshot encoding or decoding failed
    #[error("snapshot error: {0}")]
    Snapshot(#[from] WarbandError),
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// Configuration and content loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// RON parse error
    #[error("failed to parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
