//! Loot and quest collaborator.

use serde::{Deserialize, Serialize};
use warband_common::ArchetypeId;

use crate::actor::CombatActor;

/// One item awarded for a kill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDrop {
    /// Item identifier understood by the loot collaborator
    pub item: String,
    /// Stack size
    pub quantity: u32,
}

impl LootDrop {
    /// Creates a loot drop.
    #[must_use]
    pub fn new(item: impl Into<String>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

/// Called once per hostile death.
///
/// The core does not know loot tables or quest state; it only reports kills.
pub trait KillHooks {
    /// Rolls loot for a killed hostile.
    fn on_hostile_killed(&mut self, actor: &CombatActor) -> Vec<LootDrop>;

    /// Credits kill objectives for the archetype.
    fn on_kill_objective(&mut self, archetype: &ArchetypeId);
}

/// Hooks that award nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKillHooks;

impl KillHooks for NoKillHooks {
    fn on_hostile_killed(&mut self, _actor: &CombatActor) -> Vec<LootDrop> {
        Vec::new()
    }

    fn on_kill_objective(&mut self, _archetype: &ArchetypeId) {}
}
