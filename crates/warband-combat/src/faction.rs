//! Faction relationships deciding who fights whom.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use warband_common::FactionId;

/// Relationship type between factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FactionRelation {
    /// Same side
    Allied,
    /// Cooperative but separate
    Friendly,
    /// Ignore each other
    #[default]
    Neutral,
    /// Attack on sight
    Enemy,
    /// Attack on sight
    AtWar,
}

impl FactionRelation {
    /// Checks if this relation allows cooperation.
    #[must_use]
    pub const fn allows_cooperation(self) -> bool {
        matches!(self, Self::Allied | Self::Friendly)
    }

    /// Checks if this relation is hostile.
    #[must_use]
    pub const fn is_hostile(self) -> bool {
        matches!(self, Self::Enemy | Self::AtWar)
    }
}

/// Symmetric relation table between factions.
///
/// A faction is always allied with itself; unlisted pairs are neutral.
#[derive(Debug, Clone, Default)]
pub struct FactionTable {
    relations: AHashMap<(FactionId, FactionId), FactionRelation>,
}

impl FactionTable {
    /// Creates an empty table (everything neutral).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the stock world factions.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for hostile in [FactionId::BEASTS, FactionId::BANDITS, FactionId::UNDEAD] {
            table.set(FactionId::PLAYER, hostile, FactionRelation::Enemy);
        }
        table.set(FactionId::PLAYER, FactionId::TOWNSFOLK, FactionRelation::Friendly);
        table.set(FactionId::TOWNSFOLK, FactionId::BANDITS, FactionRelation::Enemy);
        table.set(FactionId::TOWNSFOLK, FactionId::UNDEAD, FactionRelation::AtWar);
        table
    }

    fn key(a: FactionId, b: FactionId) -> (FactionId, FactionId) {
        if a.raw() <= b.raw() {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Sets the relation between two distinct factions (both directions).
    pub fn set(&mut self, a: FactionId, b: FactionId, relation: FactionRelation) {
        if a != b {
            self.relations.insert(Self::key(a, b), relation);
        }
    }

    /// Relation between two factions.
    #[must_use]
    pub fn relation(&self, a: FactionId, b: FactionId) -> FactionRelation {
        if a == b {
            return FactionRelation::Allied;
        }
        self.relations
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or_default()
    }

    /// Checks if two factions fight each other.
    #[must_use]
    pub fn is_hostile(&self, a: FactionId, b: FactionId) -> bool {
        self.relation(a, b).is_hostile()
    }

    /// Checks if two factions cooperate.
    #[must_use]
    pub fn is_allied(&self, a: FactionId, b: FactionId) -> bool {
        self.relation(a, b).allows_cooperation()
    }
}
