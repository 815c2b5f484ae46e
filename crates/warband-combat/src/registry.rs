//! Actor registry and spatial queries.
//!
//! The registry owns every [`CombatActor`]. Other components hold
//! [`ActorId`] handles and resolve them on each use, so a despawned actor is
//! simply "not found".

use ahash::AHashMap;
use warband_common::{planar_distance, ActorId, Vec3};

use crate::actor::{ActorKind, CombatActor};

/// Owner of all live and dead-but-not-yet-removed actors.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    actors: AHashMap<ActorId, CombatActor>,
    next_id: u64,
    player: Option<ActorId>,
}

impl ActorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actors: AHashMap::new(),
            next_id: 1,
            player: None,
        }
    }

    /// Inserts an actor and assigns its handle.
    pub fn spawn(&mut self, mut actor: CombatActor) -> ActorId {
        self.next_id = self.next_id.max(1);
        let id = ActorId::from_raw(self.next_id);
        self.next_id += 1;
        actor.id = id;
        if actor.kind == ActorKind::Player && self.player.is_none() {
            self.player = Some(id);
        }
        self.actors.insert(id, actor);
        id
    }

    /// Removes an actor, returning it if present.
    pub fn despawn(&mut self, id: ActorId) -> Option<CombatActor> {
        if self.player == Some(id) {
            self.player = None;
        }
        self.actors.remove(&id)
    }

    /// Looks up an actor.
    #[must_use]
    pub fn get(&self, id: ActorId) -> Option<&CombatActor> {
        self.actors.get(&id)
    }

    /// Looks up an actor mutably.
    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut CombatActor> {
        self.actors.get_mut(&id)
    }

    /// Checks that an actor exists and is alive.
    #[must_use]
    pub fn is_alive(&self, id: ActorId) -> bool {
        self.actors.get(&id).is_some_and(CombatActor::is_alive)
    }

    /// Checks that an actor exists.
    #[must_use]
    pub fn contains(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    /// Number of registered actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Checks if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// The player actor's handle.
    #[must_use]
    pub const fn player(&self) -> Option<ActorId> {
        self.player
    }

    /// The player's position, if a player exists.
    #[must_use]
    pub fn player_position(&self) -> Option<Vec3> {
        self.player
            .and_then(|id| self.actors.get(&id))
            .map(|a| a.position)
    }

    /// All handles in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.actors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Living hostile actors in ascending id order.
    #[must_use]
    pub fn living_hostiles(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .actors
            .values()
            .filter(|a| a.is_alive() && a.is_hostile())
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Living actors within `radius` of `position` on the ground plane, in id order.
    #[must_use]
    pub fn entities_in_radius(&self, position: Vec3, radius: f32) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .actors
            .values()
            .filter(|a| a.is_alive() && planar_distance(a.position, position) <= radius)
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Iterates all actors in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &CombatActor> {
        self.actors.values()
    }

    /// Distance between two actors, if both exist.
    #[must_use]
    pub fn distance_between(&self, a: ActorId, b: ActorId) -> Option<f32> {
        let a = self.actors.get(&a)?;
        let b = self.actors.get(&b)?;
        Some(planar_distance(a.position, b.position))
    }
}
