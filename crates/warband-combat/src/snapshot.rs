//! Versioned binary snapshots of persistent actor state.
//!
//! Only health, position and the alive flag survive a save. Threat, AI
//! stacks, buffs and timers are transient and rebuilt by play.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warband_common::{ActorId, MagicBytes, SchemaVersion, Vec3, WarbandError, WarbandResult};

use crate::registry::ActorRegistry;

/// Persistent state of one actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    /// Actor id
    pub id: ActorId,
    /// Current health
    pub health: f32,
    /// World position
    pub position: Vec3,
    /// Whether the actor was alive
    pub alive: bool,
}

/// Persistent state of every actor at one clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Schema version the snapshot was written with
    pub version: SchemaVersion,
    /// Simulation clock in seconds
    pub clock: f32,
    /// Actor states in id order
    pub actors: Vec<ActorSnapshot>,
}

impl WorldSnapshot {
    /// Captures every actor in the registry.
    #[must_use]
    pub fn capture(clock: f32, registry: &ActorRegistry) -> Self {
        let actors = registry
            .ids()
            .into_iter()
            .filter_map(|id| registry.get(id))
            .map(|a| ActorSnapshot {
                id: a.id,
                health: a.health(),
                position: a.position,
                alive: a.is_alive(),
            })
            .collect();
        Self {
            version: SchemaVersion::SNAPSHOT,
            clock,
            actors,
        }
    }

    /// Writes the saved state back onto matching actors.
    /// Returns how many actors were restored; unknown ids are skipped.
    pub fn apply(&self, registry: &mut ActorRegistry) -> usize {
        let mut restored = 0;
        for entry in &self.actors {
            match registry.get_mut(entry.id) {
                Some(actor) => {
                    actor.restore_state(entry.health, entry.position, entry.alive);
                    restored += 1;
                },
                None => warn!("Snapshot references missing actor {}", entry.id),
            }
        }
        debug!("Restored {restored}/{} actors", self.actors.len());
        restored
    }

    /// Serializes to bytes prefixed with the snapshot magic.
    pub fn to_bytes(&self) -> WarbandResult<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&MagicBytes::SNAPSHOT.0);
        let data = bincode::serialize(self).map_err(|e| WarbandError::Serialization(e.to_string()))?;
        buffer.extend(data);
        Ok(buffer)
    }

    /// Deserializes bytes written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> WarbandResult<Self> {
        let expected = MagicBytes::SNAPSHOT.0;
        if bytes.len() < 4 {
            let mut actual = [0u8; 4];
            actual[..bytes.len()].copy_from_slice(bytes);
            return Err(WarbandError::BadMagic { expected, actual });
        }
        let (magic, body) = bytes.split_at(4);
        if magic != expected.as_slice() {
            let mut actual = [0u8; 4];
            actual.copy_from_slice(magic);
            return Err(WarbandError::BadMagic { expected, actual });
        }

        let snapshot: Self =
            bincode::deserialize(body).map_err(|e| WarbandError::Serialization(e.to_string()))?;
        if !SchemaVersion::SNAPSHOT.can_read(&snapshot.version) {
            return Err(WarbandError::VersionMismatch {
                expected: SchemaVersion::SNAPSHOT.to_string(),
                actual: snapshot.version.to_string(),
            });
        }
        if !SchemaVersion::SNAPSHOT.is_compatible_with(&snapshot.version) {
            warn!(
                "Snapshot written by newer version {}, unknown fields ignored",
                snapshot.version
            );
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::CombatActor;
    use warband_common::FactionId;

    fn registry() -> (ActorRegistry, ActorId, ActorId) {
        let mut registry = ActorRegistry::new();
        let wolf = registry.spawn(
            CombatActor::hostile("wolf", FactionId::BEASTS).with_position(Vec3::new(4.0, 0.0, -2.0)),
        );
        let hero = registry.spawn(CombatActor::player("hero"));
        (registry, wolf, hero)
    }

    #[test]
    fn test_snapshot_bytes() {
        let (mut registry, wolf, _) = registry();
        registry.get_mut(wolf).expect("wolf").apply_damage(35.0);
        let snapshot = WorldSnapshot::capture(12.5, &registry);

        let bytes = snapshot.to_bytes().expect("serialize");
        assert_eq!(&bytes[0..4], b"WBSN");

        let loaded = WorldSnapshot::from_bytes(&bytes).expect("deserialize");
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.actors.len(), 2);
    }

    #[test]
    fn test_bad_magic_rejected() {
        assert!(matches!(
            WorldSnapshot::from_bytes(b"NOPE1234"),
            Err(WarbandError::BadMagic { .. })
        ));
        assert!(matches!(WorldSnapshot::from_bytes(b"WB"), Err(WarbandError::BadMagic { .. })));
    }

    #[test]
    fn test_future_major_version_rejected() {
        let (registry, _, _) = registry();
        let mut snapshot = WorldSnapshot::capture(0.0, &registry);
        snapshot.version = SchemaVersion::new(9, 0, 0);
        let bytes = snapshot.to_bytes().expect("serialize");
        assert!(matches!(
            WorldSnapshot::from_bytes(&bytes),
            Err(WarbandError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_newer_minor_version_still_loads() {
        let (registry, _, _) = registry();
        let mut snapshot = WorldSnapshot::capture(0.0, &registry);
        snapshot.version = SchemaVersion::new(1, 4, 0);
        let bytes = snapshot.to_bytes().expect("serialize");
        let loaded = WorldSnapshot::from_bytes(&bytes).expect("same major loads");
        assert_eq!(loaded.version, SchemaVersion::new(1, 4, 0));
        assert!(!SchemaVersion::SNAPSHOT.is_compatible_with(&loaded.version));
    }

    #[test]
    fn test_apply_restores_health_position_alive() {
        let (mut registry, wolf, hero) = registry();
        let snapshot = WorldSnapshot::capture(0.0, &registry);

        {
            let actor = registry.get_mut(wolf).expect("wolf");
            actor.apply_damage(500.0);
            actor.position = Vec3::new(50.0, 0.0, 50.0);
        }
        registry.get_mut(hero).expect("hero").apply_damage(30.0);

        assert_eq!(snapshot.apply(&mut registry), 2);
        let actor = registry.get(wolf).expect("wolf");
        assert!(actor.is_alive());
        assert_eq!(actor.health(), 100.0);
        assert_eq!(actor.position, Vec3::new(4.0, 0.0, -2.0));
        assert_eq!(registry.get(hero).expect("hero").health(), 100.0);
    }

    #[test]
    fn test_apply_skips_missing_actor() {
        let (mut registry, wolf, _) = registry();
        let snapshot = WorldSnapshot::capture(0.0, &registry);
        registry.despawn(wolf);
        assert_eq!(snapshot.apply(&mut registry), 1);
    }
}
