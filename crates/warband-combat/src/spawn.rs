//! Hostile population management.
//!
//! Areas register [`SpawnDefinition`] tables (usually loaded from RON). Each
//! definition activates once the player comes within its activation radius,
//! spawns its initial population and then keeps it topped up on a respawn
//! timer. Definitions whose anchor drifts beyond the despawn distance from the
//! player are cleared regardless of what their actors are doing.
//!
//! The director also owns two cleanup queues: summoned reinforcements that are
//! dismissed after a lifetime, and corpses that are removed from the registry
//! after a short delay.

use std::collections::BTreeMap;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warband_common::{planar_distance, point_on_circle, ActorId, AreaId, ArchetypeId, SpawnId, Vec3};

use crate::actor::Rank;
use crate::archetype::ArchetypeCatalog;
use crate::behavior::{square_loop, AIContext, BehaviorEngine, BehaviorKind, SummonRequest};
use crate::config::SpawnTuning;
use crate::error::ConfigResult;
use crate::events::{EventBus, NoticeCategory};
use crate::registry::ActorRegistry;
use crate::rng::CombatRng;
use crate::threat::ThreatLedger;
use crate::world::Terrain;

/// How a definition's actors are configured when created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpawnType {
    /// Plain archetype
    #[default]
    Default,
    /// Linked siblings that enter combat together
    Pack,
    /// Walks a waypoint loop
    Patrol,
    /// Hidden until a target comes within the trigger radius
    Ambush,
    /// Stronger leader with escorts
    Elite,
    /// Much stronger, rolls its own spawn chance, better loot
    Rare,
}

/// Placement of a group around its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Formation {
    /// Evenly spaced on a circle
    Circle {
        /// Circle radius
        radius: f32,
    },
    /// A line along the x axis, centered on the anchor
    Line {
        /// Gap between neighbors
        spacing: f32,
    },
    /// Random points inside a disc
    Scattered {
        /// Disc radius
        radius: f32,
    },
}

impl Default for Formation {
    fn default() -> Self {
        Self::Circle { radius: 3.0 }
    }
}

impl Formation {
    /// Ground-plane positions for `count` actors around `anchor`.
    pub fn positions(&self, anchor: Vec3, count: usize, rng: &mut dyn CombatRng) -> Vec<Vec3> {
        match *self {
            Self::Circle { radius } => {
                if count <= 1 {
                    return vec![anchor; count];
                }
                (0..count)
                    .map(|i| point_on_circle(anchor, radius, std::f32::consts::TAU * i as f32 / count as f32))
                    .collect()
            },
            Self::Line { spacing } => {
                let half = (count.saturating_sub(1)) as f32 * 0.5;
                (0..count)
                    .map(|i| anchor + Vec3::new((i as f32 - half) * spacing, 0.0, 0.0))
                    .collect()
            },
            Self::Scattered { radius } => (0..count)
                .map(|_| {
                    let angle = rng.angle();
                    let distance = radius * rng.next_f32().sqrt();
                    point_on_circle(anchor, distance, angle)
                })
                .collect(),
        }
    }
}

/// One spawn point of an area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnDefinition {
    /// Archetype to spawn
    pub archetype: ArchetypeId,
    /// Center of the spawn
    pub anchor: Vec3,
    /// Per-type configuration
    pub spawn_type: SpawnType,
    /// Initial population lower bound
    pub min_count: u32,
    /// Population cap
    pub max_count: u32,
    /// Placement around the anchor
    pub formation: Formation,
    /// Seconds between respawns
    pub respawn_time: f32,
    /// Player distance that activates the definition
    pub activation_radius: f32,
    /// Patrol loop (generated around the anchor if empty)
    pub patrol_path: Vec<Vec3>,
    /// Ambush trigger distance
    pub ambush_trigger_radius: f32,

    #[serde(skip)]
    alive: Vec<ActorId>,
    #[serde(skip)]
    escorts: Vec<ActorId>,
    #[serde(skip)]
    active: bool,
    #[serde(skip)]
    respawn_timer: f32,
    #[serde(skip)]
    last_spawn_at: Option<f32>,
}

impl Default for SpawnDefinition {
    fn default() -> Self {
        Self {
            archetype: ArchetypeId::new("wolf"),
            anchor: Vec3::ZERO,
            spawn_type: SpawnType::Default,
            min_count: 1,
            max_count: 1,
            formation: Formation::default(),
            respawn_time: 60.0,
            activation_radius: 80.0,
            patrol_path: Vec::new(),
            ambush_trigger_radius: 8.0,
            alive: Vec::new(),
            escorts: Vec::new(),
            active: false,
            respawn_timer: 0.0,
            last_spawn_at: None,
        }
    }
}

impl SpawnDefinition {
    /// Creates a definition for an archetype at an anchor.
    #[must_use]
    pub fn new(archetype: impl Into<ArchetypeId>, anchor: Vec3) -> Self {
        Self {
            archetype: archetype.into(),
            anchor,
            ..Self::default()
        }
    }

    /// Sets the spawn type.
    #[must_use]
    pub const fn with_type(mut self, spawn_type: SpawnType) -> Self {
        self.spawn_type = spawn_type;
        self
    }

    /// Sets the population bounds.
    #[must_use]
    pub fn with_count(mut self, min: u32, max: u32) -> Self {
        self.max_count = max.max(1);
        self.min_count = min.min(self.max_count);
        self
    }

    /// Sets the formation.
    #[must_use]
    pub const fn with_formation(mut self, formation: Formation) -> Self {
        self.formation = formation;
        self
    }

    /// Sets the respawn time.
    #[must_use]
    pub const fn with_respawn_time(mut self, seconds: f32) -> Self {
        self.respawn_time = seconds;
        self
    }

    /// Sets the activation radius.
    #[must_use]
    pub const fn with_activation_radius(mut self, radius: f32) -> Self {
        self.activation_radius = radius;
        self
    }

    /// Parses a RON list of definitions.
    pub fn table_from_ron_str(contents: &str) -> ConfigResult<Vec<Self>> {
        Ok(ron::from_str(contents)?)
    }

    /// Living actors counted against the cap.
    #[must_use]
    pub fn alive(&self) -> &[ActorId] {
        &self.alive
    }

    /// Escorts spawned alongside elites.
    #[must_use]
    pub fn escorts(&self) -> &[ActorId] {
        &self.escorts
    }

    /// Whether the player has activated the definition.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Seconds until the next respawn is allowed.
    #[must_use]
    pub const fn respawn_timer(&self) -> f32 {
        self.respawn_timer
    }

    /// Clock time of the last spawn.
    #[must_use]
    pub const fn last_spawn_at(&self) -> Option<f32> {
        self.last_spawn_at
    }

    /// Checks if a respawn is due. Call after reconciling.
    #[must_use]
    pub fn should_respawn(&self) -> bool {
        self.active && (self.alive.len() as u32) < self.max_count && self.respawn_timer <= 0.0
    }

    fn arm_timer(&mut self) {
        self.respawn_timer = self.respawn_time;
    }
}

/// World state the director reads and writes.
pub struct SpawnWorld<'a> {
    /// Simulation clock in seconds
    pub now: f32,
    /// Actor registry
    pub actors: &'a mut ActorRegistry,
    /// AI contexts
    pub ai: &'a mut BehaviorEngine,
    /// Threat ledger
    pub threat: &'a mut ThreatLedger,
    /// Archetype data
    pub catalog: &'a ArchetypeCatalog,
    /// Random source
    pub rng: &'a mut dyn CombatRng,
    /// Presentation events
    pub events: &'a EventBus,
    /// Terrain queries
    pub terrain: &'a dyn Terrain,
}

impl SpawnWorld<'_> {
    /// Removes an actor from the registry, the AI and the threat ledger.
    pub fn remove_actor(&mut self, id: ActorId) {
        self.ai.detach(id);
        self.threat.remove_actor(id);
        if self.actors.despawn(id).is_some() {
            debug!("Despawned {id}");
        }
    }
}

/// What changed during a director update.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpawnReport {
    /// Actors created
    pub spawned: Vec<ActorId>,
    /// Actors removed from the world
    pub despawned: Vec<ActorId>,
}

/// Definition an actor was spawned by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Origin {
    definition: u32,
    escort: bool,
}

/// Owner of every spawn definition.
#[derive(Debug, Default)]
pub struct SpawnDirector {
    tuning: SpawnTuning,
    definitions: BTreeMap<u32, SpawnDefinition>,
    areas: AHashMap<AreaId, Vec<SpawnId>>,
    next_id: u32,
    origins: AHashMap<ActorId, Origin>,
    summons: AHashMap<ActorId, f32>,
    corpses: AHashMap<ActorId, f32>,
}

impl SpawnDirector {
    /// Creates an empty director.
    #[must_use]
    pub fn new(tuning: SpawnTuning) -> Self {
        Self {
            tuning,
            ..Self::default()
        }
    }

    /// Tuning constants.
    #[must_use]
    pub const fn tuning(&self) -> &SpawnTuning {
        &self.tuning
    }

    /// Registers an area's definitions and returns their ids.
    ///
    /// Registering an area twice replaces nothing; the new definitions are
    /// added next to the old ones.
    pub fn register_area_spawns(&mut self, area: AreaId, definitions: Vec<SpawnDefinition>) -> Vec<SpawnId> {
        let mut ids = Vec::with_capacity(definitions.len());
        for mut def in definitions {
            if def.max_count == 0 {
                warn!("Spawn of {} in area {} has max_count 0, skipping", def.archetype, area.raw());
                continue;
            }
            def.min_count = def.min_count.min(def.max_count);
            self.next_id += 1;
            let id = SpawnId::new(self.next_id);
            self.definitions.insert(id.raw(), def);
            ids.push(id);
        }
        info!("Registered {} spawn definitions for area {}", ids.len(), area.raw());
        self.areas.entry(area).or_default().extend(ids.iter().copied());
        ids
    }

    /// Loads an area's definitions from a RON file.
    pub fn load_area_ron<P: AsRef<Path>>(&mut self, area: AreaId, path: P) -> ConfigResult<Vec<SpawnId>> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let definitions = SpawnDefinition::table_from_ron_str(&contents)?;
        info!("Loaded {} spawn definitions from {}", definitions.len(), path.display());
        Ok(self.register_area_spawns(area, definitions))
    }

    /// Removes an area's definitions and despawns their actors.
    pub fn unregister_area(&mut self, area: AreaId, world: &mut SpawnWorld<'_>) -> SpawnReport {
        let mut report = SpawnReport::default();
        let Some(ids) = self.areas.remove(&area) else {
            return report;
        };
        for id in ids {
            if let Some(mut def) = self.definitions.remove(&id.raw()) {
                for actor in def.alive.drain(..).chain(def.escorts.drain(..)) {
                    world.remove_actor(actor);
                    report.despawned.push(actor);
                }
            }
        }
        info!("Unregistered area {}", area.raw());
        report
    }

    /// Definition by id.
    #[must_use]
    pub fn definition(&self, id: SpawnId) -> Option<&SpawnDefinition> {
        self.definitions.get(&id.raw())
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Checks if no definition is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Checks if a definition is due a respawn. Unknown ids are never due.
    #[must_use]
    pub fn should_respawn(&self, id: SpawnId) -> bool {
        self.definition(id).is_some_and(SpawnDefinition::should_respawn)
    }

    /// Purges dead and missing actors from a definition, arming the respawn
    /// timer for every death found.
    pub fn reconcile(&mut self, id: SpawnId, actors: &ActorRegistry) {
        if let Some(def) = self.definitions.get_mut(&id.raw()) {
            Self::reconcile_definition(def, actors);
        }
    }

    fn reconcile_definition(def: &mut SpawnDefinition, actors: &ActorRegistry) {
        let before = def.alive.len();
        def.alive.retain(|id| actors.is_alive(*id));
        def.escorts.retain(|id| actors.is_alive(*id));
        if def.alive.len() < before {
            def.arm_timer();
        }
    }

    /// Records a death: re-arms its definition's timer and queues the corpse.
    pub fn on_actor_died(&mut self, id: ActorId) {
        for def in self.definitions.values_mut() {
            if let Some(pos) = def.alive.iter().position(|a| *a == id) {
                def.alive.remove(pos);
                def.arm_timer();
            }
            def.escorts.retain(|a| *a != id);
        }
        self.summons.remove(&id);
        self.corpses.entry(id).or_insert(self.tuning.corpse_lifetime);
    }

    /// Brings definitions back in line with actors a snapshot restored.
    ///
    /// Dead tracked actors are purged as in a normal update. Actors revived by
    /// the restore are tracked again while their definition has room; the rest
    /// are removed from the world. Returns the removed actors.
    pub fn reconcile_restored(&mut self, world: &mut SpawnWorld<'_>) -> Vec<ActorId> {
        for def in self.definitions.values_mut() {
            Self::reconcile_definition(def, world.actors);
        }

        let mut revived: Vec<(ActorId, Origin)> = self
            .origins
            .iter()
            .filter(|(id, _)| world.actors.is_alive(**id))
            .map(|(id, origin)| (*id, *origin))
            .collect();
        revived.sort_unstable_by_key(|(id, _)| *id);

        let mut removed = Vec::new();
        for (id, origin) in revived {
            let Some(def) = self.definitions.get_mut(&origin.definition) else {
                continue;
            };
            if def.alive.contains(&id) || def.escorts.contains(&id) {
                continue;
            }
            self.corpses.remove(&id);
            if origin.escort && def.active {
                def.escorts.push(id);
            } else if !origin.escort && def.active && def.alive.len() < def.max_count as usize {
                debug!("Re-tracking restored {id} for {}", def.archetype);
                def.alive.push(id);
            } else {
                debug!("Restored {id} does not fit its spawn of {}, removing", def.archetype);
                world.remove_actor(id);
                removed.push(id);
            }
        }
        self.origins.retain(|id, _| world.actors.contains(*id));
        removed
    }

    /// Living summoned reinforcements.
    #[must_use]
    pub fn summon_count(&self) -> usize {
        self.summons.len()
    }

    /// Corpses waiting for cleanup.
    #[must_use]
    pub fn corpse_count(&self) -> usize {
        self.corpses.len()
    }

    /// Maintains every definition's population and runs the cleanup queues.
    pub fn update(&mut self, dt: f32, world: &mut SpawnWorld<'_>) -> SpawnReport {
        let mut report = SpawnReport::default();
        let player = world.actors.player_position();
        let keys: Vec<u32> = self.definitions.keys().copied().collect();

        for key in keys {
            let Some(mut def) = self.definitions.remove(&key) else {
                continue;
            };
            Self::reconcile_definition(&mut def, world.actors);
            if def.active {
                def.respawn_timer = (def.respawn_timer - dt).max(0.0);
            }

            match player.map(|p| planar_distance(p, def.anchor)) {
                Some(distance) if def.active && distance > self.tuning.despawn_distance => {
                    self.deactivate(&mut def, world, &mut report);
                },
                Some(distance) if !def.active && distance <= def.activation_radius => {
                    def.active = true;
                    let count = world.rng.range_u32(def.min_count, def.max_count);
                    debug!("Activating spawn of {} with {count} actors", def.archetype);
                    self.populate(key, &mut def, count as usize, world, &mut report);
                    def.arm_timer();
                },
                _ => {
                    if def.should_respawn() {
                        self.populate(key, &mut def, 1, world, &mut report);
                        def.arm_timer();
                    }
                },
            }
            self.definitions.insert(key, def);
        }

        self.tick_cleanup(dt, world, &mut report);
        report
    }

    fn deactivate(&mut self, def: &mut SpawnDefinition, world: &mut SpawnWorld<'_>, report: &mut SpawnReport) {
        debug!("Player left spawn of {}, despawning", def.archetype);
        for actor in def.alive.drain(..).chain(def.escorts.drain(..)) {
            self.corpses.remove(&actor);
            world.remove_actor(actor);
            report.despawned.push(actor);
        }
        def.active = false;
        def.respawn_timer = 0.0;
    }

    fn populate(
        &mut self,
        key: u32,
        def: &mut SpawnDefinition,
        count: usize,
        world: &mut SpawnWorld<'_>,
        report: &mut SpawnReport,
    ) {
        let room = (def.max_count as usize).saturating_sub(def.alive.len());
        let count = count.min(room);
        if count == 0 {
            return;
        }
        if def.spawn_type == SpawnType::Rare && !world.rng.roll_below(self.tuning.rare_spawn_chance) {
            debug!("Rare spawn of {} failed its roll", def.archetype);
            return;
        }

        let positions = def.formation.positions(def.anchor, count, &mut *world.rng);
        for position in positions {
            let Some(id) = self.spawn_one(def, position, world) else {
                continue;
            };
            def.alive.push(id);
            def.last_spawn_at = Some(world.now);
            self.origins.insert(
                id,
                Origin {
                    definition: key,
                    escort: false,
                },
            );
            report.spawned.push(id);

            if def.spawn_type == SpawnType::Elite {
                let escorts = self.spawn_escorts(def, id, position, world);
                for escort in &escorts {
                    self.origins.insert(
                        *escort,
                        Origin {
                            definition: key,
                            escort: true,
                        },
                    );
                }
                report.spawned.extend(escorts.iter().copied());
                def.escorts.extend(escorts);
            }
        }

        if def.spawn_type == SpawnType::Pack {
            link_pack(world.ai, &def.alive);
        }
    }

    fn spawn_one(&self, def: &SpawnDefinition, position: Vec3, world: &mut SpawnWorld<'_>) -> Option<ActorId> {
        let catalog = world.catalog;
        let archetype = match catalog.get(&def.archetype) {
            Ok(archetype) => archetype,
            Err(e) => {
                warn!("Cannot spawn: {e}");
                return None;
            },
        };
        let mut position = position;
        position.y = world.terrain.height_at(position.x, position.z);

        let mut actor = archetype.instantiate(position);
        match def.spawn_type {
            SpawnType::Elite => {
                actor.scale_stats(
                    self.tuning.elite_health_multiplier,
                    self.tuning.elite_attack_multiplier,
                    self.tuning.elite_armor_multiplier,
                );
                actor.rank = Rank::Elite;
            },
            SpawnType::Rare => {
                actor.scale_stats(
                    self.tuning.rare_health_multiplier,
                    self.tuning.rare_attack_multiplier,
                    self.tuning.rare_armor_multiplier,
                );
                actor.rank = Rank::Rare;
                actor.loot_multiplier *= self.tuning.rare_loot_multiplier;
            },
            SpawnType::Ambush => actor.visible = false,
            _ => {},
        }
        let id = world.actors.spawn(actor);

        let mut ctx = AIContext::from_archetype(id, archetype, position);
        match def.spawn_type {
            SpawnType::Patrol => {
                ctx.default_behavior = BehaviorKind::Patrol.name().to_string();
                ctx.patrol_path = if def.patrol_path.is_empty() {
                    square_loop(def.anchor, self.tuning.patrol_loop_size)
                } else {
                    def.patrol_path.clone()
                };
            },
            SpawnType::Ambush => {
                ctx.default_behavior = BehaviorKind::Ambush.name().to_string();
                ctx.ambush_trigger_radius = def.ambush_trigger_radius;
            },
            _ => {},
        }
        world.ai.attach(ctx);
        debug!("Spawned {} as {id}", def.archetype);
        Some(id)
    }

    fn spawn_escorts(
        &self,
        def: &SpawnDefinition,
        leader: ActorId,
        center: Vec3,
        world: &mut SpawnWorld<'_>,
    ) -> Vec<ActorId> {
        let catalog = world.catalog;
        let Ok(archetype) = catalog.get(&def.archetype) else {
            return Vec::new();
        };
        let formation = Formation::Circle {
            radius: self.tuning.elite_escort_radius,
        };
        let mut escorts = Vec::new();
        for mut position in formation.positions(center, self.tuning.elite_escort_count as usize, &mut *world.rng) {
            position.y = world.terrain.height_at(position.x, position.z);
            let id = world.actors.spawn(archetype.instantiate(position));
            world.ai.attach(AIContext::from_archetype(id, archetype, position));
            escorts.push(id);
        }
        let mut party = vec![leader];
        party.extend(escorts.iter().copied());
        link_pack(world.ai, &party);
        escorts
    }

    /// Spawns minions for channeled summons.
    pub fn spawn_summons(&mut self, requests: &[SummonRequest], world: &mut SpawnWorld<'_>) -> Vec<ActorId> {
        let mut spawned = Vec::new();
        for request in requests {
            let archetype_id = request
                .archetype
                .clone()
                .or_else(|| world.actors.get(request.summoner).and_then(|a| a.archetype.clone()));
            let Some(archetype_id) = archetype_id else {
                warn!("{} summoned without an archetype", request.summoner);
                continue;
            };
            let catalog = world.catalog;
            let archetype = match catalog.get(&archetype_id) {
                Ok(archetype) => archetype,
                Err(e) => {
                    warn!("Cannot summon: {e}");
                    continue;
                },
            };
            let formation = Formation::Circle { radius: 2.0 };
            let scale = self.tuning.summon_stat_scale;
            for mut position in formation.positions(request.position, request.count as usize, &mut *world.rng) {
                position.y = world.terrain.height_at(position.x, position.z);
                let mut actor = archetype.instantiate(position);
                actor.scale_stats(scale, scale, scale);
                actor.rank = Rank::Minion;
                let id = world.actors.spawn(actor);
                world.ai.attach(AIContext::from_archetype(id, archetype, position));
                if let Some(target) = request.target.filter(|t| world.actors.is_alive(*t)) {
                    world.threat.add_threat(id, target, 1.0);
                }
                self.summons.insert(id, self.tuning.summon_lifetime);
                spawned.push(id);
            }
            world
                .events
                .notify(format!("{} summoned reinforcements", archetype.name), NoticeCategory::Spawn);
        }
        spawned
    }

    fn tick_cleanup(&mut self, dt: f32, world: &mut SpawnWorld<'_>, report: &mut SpawnReport) {
        let mut summons: Vec<ActorId> = self.summons.keys().copied().collect();
        summons.sort_unstable();
        for id in summons {
            let expired = self.summons.get_mut(&id).is_some_and(|left| {
                *left -= dt;
                *left <= 0.0
            });
            if expired || !world.actors.contains(id) {
                self.summons.remove(&id);
                if world.actors.contains(id) {
                    debug!("Dismissing summoned {id}");
                    world.remove_actor(id);
                    report.despawned.push(id);
                }
            }
        }

        let mut corpses: Vec<ActorId> = self.corpses.keys().copied().collect();
        corpses.sort_unstable();
        for id in corpses {
            if world.actors.is_alive(id) || !world.actors.contains(id) {
                self.corpses.remove(&id);
                continue;
            }
            let expired = self.corpses.get_mut(&id).is_some_and(|left| {
                *left -= dt;
                *left <= 0.0
            });
            if expired {
                self.corpses.remove(&id);
                world.remove_actor(id);
                report.despawned.push(id);
            }
        }
        self.origins.retain(|id, _| world.actors.contains(*id));
    }
}

/// Links every member of a group to the others.
fn link_pack(ai: &mut BehaviorEngine, members: &[ActorId]) {
    for &member in members {
        if let Some(ctx) = ai.context_mut(member) {
            ctx.pack = members.iter().copied().filter(|m| *m != member).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::CombatActor;
    use crate::rng::FixedRng;
    use crate::world::FlatTerrain;

    struct Harness {
        actors: ActorRegistry,
        ai: BehaviorEngine,
        threat: ThreatLedger,
        catalog: ArchetypeCatalog,
        rng: FixedRng,
        events: EventBus,
        terrain: FlatTerrain,
        now: f32,
    }

    impl Harness {
        fn new() -> Self {
            let mut actors = ActorRegistry::new();
            actors.spawn(CombatActor::player("hero"));
            Self {
                actors,
                ai: BehaviorEngine::default(),
                threat: ThreatLedger::default(),
                catalog: ArchetypeCatalog::with_defaults(),
                rng: FixedRng::always(0.5),
                events: EventBus::new(64),
                terrain: FlatTerrain::new(0.0),
                now: 0.0,
            }
        }

        fn update(&mut self, director: &mut SpawnDirector, dt: f32) -> SpawnReport {
            let mut world = SpawnWorld {
                now: self.now,
                actors: &mut self.actors,
                ai: &mut self.ai,
                threat: &mut self.threat,
                catalog: &self.catalog,
                rng: &mut self.rng,
                events: &self.events,
                terrain: &self.terrain,
            };
            let report = director.update(dt, &mut world);
            self.now += dt;
            report
        }

        fn reconcile_restored(&mut self, director: &mut SpawnDirector) -> Vec<ActorId> {
            let mut world = SpawnWorld {
                now: self.now,
                actors: &mut self.actors,
                ai: &mut self.ai,
                threat: &mut self.threat,
                catalog: &self.catalog,
                rng: &mut self.rng,
                events: &self.events,
                terrain: &self.terrain,
            };
            director.reconcile_restored(&mut world)
        }

        fn revive(&mut self, id: ActorId) {
            let actor = self.actors.get_mut(id).expect("actor");
            let (health, position) = (actor.max_health, actor.position);
            actor.restore_state(health, position, true);
        }

        fn kill(&mut self, id: ActorId) {
            let actor = self.actors.get_mut(id).expect("actor");
            let health = actor.health();
            actor.apply_damage(health);
        }
    }

    fn wolves(min: u32, max: u32) -> SpawnDefinition {
        SpawnDefinition::new("wolf", Vec3::new(10.0, 0.0, 0.0))
            .with_count(min, max)
            .with_respawn_time(10.0)
    }

    #[test]
    fn test_formation_circle_radius() {
        let mut rng = FixedRng::always(0.5);
        let positions = Formation::Circle { radius: 4.0 }.positions(Vec3::ZERO, 4, &mut rng);
        assert_eq!(positions.len(), 4);
        for p in positions {
            assert!((planar_distance(p, Vec3::ZERO) - 4.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_formation_line_centered() {
        let mut rng = FixedRng::always(0.5);
        let positions = Formation::Line { spacing: 2.0 }.positions(Vec3::ZERO, 3, &mut rng);
        assert_eq!(positions[0].x, -2.0);
        assert_eq!(positions[1].x, 0.0);
        assert_eq!(positions[2].x, 2.0);
    }

    #[test]
    fn test_formation_scattered_inside_disc() {
        let mut rng = FixedRng::sequence(vec![0.1, 0.9, 0.4, 0.3, 0.7, 0.99]);
        for p in (Formation::Scattered { radius: 5.0 }).positions(Vec3::ZERO, 3, &mut rng) {
            assert!(planar_distance(p, Vec3::ZERO) <= 5.0 + 1e-4);
        }
    }

    #[test]
    fn test_inactive_until_player_close() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(
            AreaId::new(1),
            vec![SpawnDefinition::new("wolf", Vec3::new(200.0, 0.0, 0.0)).with_activation_radius(50.0)],
        );

        let report = h.update(&mut director, 0.1);

        assert!(report.spawned.is_empty());
        assert!(!director.definition(ids[0]).expect("def").is_active());
    }

    #[test]
    fn test_activation_spawns_initial_population() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(3, 3)]);

        let report = h.update(&mut director, 0.1);

        let def = director.definition(ids[0]).expect("def");
        assert_eq!(report.spawned.len(), 3);
        assert_eq!(def.alive().len(), 3);
        assert!(def.is_active());
        assert!((def.respawn_timer() - 10.0).abs() < f32::EPSILON);
        assert_eq!(h.ai.len(), 3);
    }

    #[test]
    fn test_respawn_waits_for_timer_after_death() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(3, 3)]);
        h.update(&mut director, 0.1);

        let victim = director.definition(ids[0]).expect("def").alive()[0];
        h.kill(victim);
        director.reconcile(ids[0], &h.actors);
        assert_eq!(director.definition(ids[0]).expect("def").alive().len(), 2);
        assert!(!director.should_respawn(ids[0]));

        for _ in 0..9 {
            let report = h.update(&mut director, 1.0);
            assert!(report.spawned.is_empty());
        }
        let report = h.update(&mut director, 1.0);
        assert_eq!(report.spawned.len(), 1);
        assert_eq!(director.definition(ids[0]).expect("def").alive().len(), 3);
    }

    #[test]
    fn test_restored_actor_retracked_while_room() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(2, 2)]);
        h.update(&mut director, 0.1);
        let victim = director.definition(ids[0]).expect("def").alive()[0];
        h.kill(victim);
        h.update(&mut director, 1.0);
        assert_eq!(director.definition(ids[0]).expect("def").alive().len(), 1);

        h.revive(victim);
        let removed = h.reconcile_restored(&mut director);

        assert!(removed.is_empty());
        assert!(director.definition(ids[0]).expect("def").alive().contains(&victim));
    }

    #[test]
    fn test_restored_actor_over_cap_removed() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(2, 2)]);
        h.update(&mut director, 0.1);
        let victim = director.definition(ids[0]).expect("def").alive()[0];
        h.kill(victim);
        let mut respawned = Vec::new();
        for _ in 0..11 {
            respawned.extend(h.update(&mut director, 1.0).spawned);
        }
        assert_eq!(respawned.len(), 1);

        h.revive(victim);
        let removed = h.reconcile_restored(&mut director);

        assert_eq!(removed, vec![victim]);
        assert!(!h.actors.contains(victim));
        let def = director.definition(ids[0]).expect("def");
        assert_eq!(def.alive().len(), 2);
        assert!(def.alive().contains(&respawned[0]));
    }

    #[test]
    fn test_never_exceeds_max_count() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(2, 4)]);
        for _ in 0..100 {
            h.update(&mut director, 1.0);
            assert!(director.definition(ids[0]).expect("def").alive().len() <= 4);
        }
        assert_eq!(director.definition(ids[0]).expect("def").alive().len(), 4);
    }

    #[test]
    fn test_despawn_when_player_far() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(2, 2)]);
        let spawned = h.update(&mut director, 0.1).spawned;
        let player = h.actors.player().expect("player");
        h.actors.get_mut(player).expect("player").position = Vec3::new(500.0, 0.0, 0.0);

        let report = h.update(&mut director, 0.1);

        assert_eq!(report.despawned, spawned);
        assert!(!director.definition(ids[0]).expect("def").is_active());
        assert!(spawned.iter().all(|id| !h.actors.contains(*id)));
        assert!(h.ai.is_empty());
    }

    #[test]
    fn test_elite_spawns_escorts() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(1, 1).with_type(SpawnType::Elite)]);

        h.update(&mut director, 0.1);

        let def = director.definition(ids[0]).expect("def");
        assert_eq!(def.escorts().len(), 2);
        let leader = h.actors.get(def.alive()[0]).expect("leader");
        assert_eq!(leader.rank, Rank::Elite);
        let wolf = h.catalog.get(&ArchetypeId::new("wolf")).expect("wolf");
        assert!((leader.max_health - wolf.max_health * 3.0).abs() < 1e-3);
        assert_eq!(h.ai.context(leader.id).expect("ctx").pack.len(), 2);
    }

    #[test]
    fn test_rare_roll_gates_spawn() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(1, 1).with_type(SpawnType::Rare)]);

        h.update(&mut director, 0.1);
        assert!(director.definition(ids[0]).expect("def").alive().is_empty());

        h.rng = FixedRng::always(0.01);
        for _ in 0..11 {
            h.update(&mut director, 1.0);
        }
        let def = director.definition(ids[0]).expect("def");
        assert_eq!(def.alive().len(), 1);
        let rare = h.actors.get(def.alive()[0]).expect("rare");
        assert_eq!(rare.rank, Rank::Rare);
        assert!((rare.loot_multiplier - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_pack_members_linked() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(3, 3).with_type(SpawnType::Pack)]);

        h.update(&mut director, 0.1);

        let alive = director.definition(ids[0]).expect("def").alive().to_vec();
        for id in &alive {
            let pack = &h.ai.context(*id).expect("ctx").pack;
            assert_eq!(pack.len(), 2);
            assert!(!pack.contains(id));
        }
    }

    #[test]
    fn test_ambush_and_patrol_configuration() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(
            AreaId::new(1),
            vec![
                wolves(1, 1).with_type(SpawnType::Ambush),
                wolves(1, 1).with_type(SpawnType::Patrol),
            ],
        );
        h.update(&mut director, 0.1);

        let ambusher = director.definition(ids[0]).expect("def").alive()[0];
        assert!(!h.actors.get(ambusher).expect("ambusher").visible);
        assert_eq!(h.ai.context(ambusher).expect("ctx").default_behavior, "ambush");

        let patroller = director.definition(ids[1]).expect("def").alive()[0];
        let ctx = h.ai.context(patroller).expect("ctx");
        assert_eq!(ctx.default_behavior, "patrol");
        assert_eq!(ctx.patrol_path.len(), 4);
    }

    #[test]
    fn test_unknown_archetype_is_skipped() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        director.register_area_spawns(
            AreaId::new(1),
            vec![SpawnDefinition::new("dragon", Vec3::new(5.0, 0.0, 0.0))],
        );

        let report = h.update(&mut director, 0.1);

        assert!(report.spawned.is_empty());
    }

    #[test]
    fn test_corpse_cleanup() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let ids = director.register_area_spawns(AreaId::new(1), vec![wolves(1, 1).with_respawn_time(1000.0)]);
        h.update(&mut director, 0.1);
        let victim = director.definition(ids[0]).expect("def").alive()[0];
        h.kill(victim);
        director.on_actor_died(victim);
        assert_eq!(director.corpse_count(), 1);

        for _ in 0..21 {
            h.update(&mut director, 1.0);
        }
        assert!(!h.actors.contains(victim));
        assert_eq!(director.corpse_count(), 0);
    }

    #[test]
    fn test_summons_expire() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        let player = h.actors.player().expect("player");
        let request = SummonRequest {
            summoner: player,
            archetype: Some(ArchetypeId::new("imp")),
            count: 2,
            position: Vec3::new(3.0, 0.0, 0.0),
            target: Some(player),
        };
        let spawned = {
            let mut world = SpawnWorld {
                now: 0.0,
                actors: &mut h.actors,
                ai: &mut h.ai,
                threat: &mut h.threat,
                catalog: &h.catalog,
                rng: &mut h.rng,
                events: &h.events,
                terrain: &h.terrain,
            };
            director.spawn_summons(&[request], &mut world)
        };
        assert_eq!(spawned.len(), 2);
        assert_eq!(h.actors.get(spawned[0]).expect("imp").rank, Rank::Minion);
        assert!(h.threat.in_combat(spawned[0]));

        for _ in 0..31 {
            h.update(&mut director, 1.0);
        }
        assert_eq!(director.summon_count(), 0);
        assert!(spawned.iter().all(|id| !h.actors.contains(*id)));
    }

    #[test]
    fn test_unregister_area_despawns() {
        let mut h = Harness::new();
        let mut director = SpawnDirector::default();
        director.register_area_spawns(AreaId::new(7), vec![wolves(2, 2)]);
        h.update(&mut director, 0.1);

        let report = {
            let mut world = SpawnWorld {
                now: h.now,
                actors: &mut h.actors,
                ai: &mut h.ai,
                threat: &mut h.threat,
                catalog: &h.catalog,
                rng: &mut h.rng,
                events: &h.events,
                terrain: &h.terrain,
            };
            director.unregister_area(AreaId::new(7), &mut world)
        };

        assert_eq!(report.despawned.len(), 2);
        assert!(director.is_empty());
        assert_eq!(h.actors.len(), 1);
    }

    #[test]
    fn test_definitions_from_ron() {
        let table = SpawnDefinition::table_from_ron_str(include_str!("../data/spawns.ron")).expect("valid RON");
        assert!(table.len() >= 3);
        assert!(table.iter().any(|d| d.spawn_type == SpawnType::Pack));
    }
}
