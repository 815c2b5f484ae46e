//! # Warband Combat
//!
//! Real-time combat and hostile-AI simulation core.
//!
//! This crate provides:
//! - Combat resolution (hit, crit, mitigation, avoidance, healing)
//! - Threat tables with tank-switch hysteresis
//! - A stack-based behavior engine for hostile actors
//! - Spawn management (activation, respawn timers, formations, elites, rares)
//! - Social interactions layered on combat (taunts, rallies, duels)
//! - Versioned snapshots of persistent actor state
//!
//! Everything runs synchronously inside [`Simulation::tick`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod actor;
pub mod archetype;
pub mod behavior;
pub mod combat;
pub mod config;
pub mod error;
pub mod events;
pub mod faction;
pub mod hooks;
pub mod interaction;
pub mod registry;
pub mod rng;
pub mod simulation;
pub mod snapshot;
pub mod spawn;
pub mod threat;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::actor::*;
    pub use crate::archetype::*;
    pub use crate::behavior::*;
    pub use crate::combat::*;
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::faction::*;
    pub use crate::hooks::*;
    pub use crate::interaction::*;
    pub use crate::registry::*;
    pub use crate::rng::*;
    pub use crate::simulation::*;
    pub use crate::snapshot::*;
    pub use crate::spawn::*;
    pub use crate::threat::*;
    pub use crate::world::*;
}

pub use prelude::*;
