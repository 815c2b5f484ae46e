//! Top-level simulation state and the per-tick pipeline.
//!
//! [`Simulation`] owns every component and runs them in a fixed order:
//!
//! 1. the spawn director maintains population;
//! 2. the threat ledger publishes targets from last tick's threat;
//! 3. timed buffs and damage over time advance;
//! 4. every hostile's AI runs, pack pulls included;
//! 5. reinforcement requests are fulfilled;
//! 6. deaths are processed (loot hooks, threat cleanup, respawn timers, death rattles);
//! 7. the interaction system reacts to engagements and scans for flavor;
//! 8. engagement orders from interactions pull allies into fights.

use tracing::{debug, info};
use warband_common::{ActorId, AreaId, ArchetypeId, SpawnId, Vec3};

use crate::actor::{CombatActor, DamageSchool};
use crate::archetype::ArchetypeCatalog;
use crate::behavior::{AIContext, AiEnv, BehaviorEngine};
use crate::combat::{CombatResolver, CombatScope, HealOutcome, Outcome};
use crate::config::SimConfig;
use crate::error::SimResult;
use crate::events::{EventBus, NoticeCategory, PresentationEvent};
use crate::faction::FactionTable;
use crate::hooks::{KillHooks, LootDrop, NoKillHooks};
use crate::interaction::{InteractionData, InteractionScope, InteractionSystem, TriggerOutcome};
use crate::registry::ActorRegistry;
use crate::rng::{CombatRng, SimRng};
use crate::snapshot::WorldSnapshot;
use crate::spawn::{SpawnDefinition, SpawnDirector, SpawnReport, SpawnWorld};
use crate::threat::ThreatLedger;
use crate::world::{FlatTerrain, Terrain};

/// What happened during one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    /// Actors created by the spawn director (summons included)
    pub spawned: Vec<ActorId>,
    /// Actors removed from the world
    pub despawned: Vec<ActorId>,
    /// Actors that died this tick
    pub deaths: Vec<ActorId>,
    /// Loot rolled for killed hostiles
    pub loot: Vec<(ActorId, LootDrop)>,
}

/// The combat core.
pub struct Simulation {
    config: SimConfig,
    clock: f32,
    actors: ActorRegistry,
    threat: ThreatLedger,
    factions: FactionTable,
    resolver: CombatResolver,
    catalog: ArchetypeCatalog,
    ai: BehaviorEngine,
    director: SpawnDirector,
    interactions: InteractionSystem,
    events: EventBus,
    rng: Box<dyn CombatRng>,
    terrain: Box<dyn Terrain>,
    hooks: Box<dyn KillHooks>,
    pending_deaths: Vec<ActorId>,
}

impl Simulation {
    /// Creates a simulation on flat terrain with the default catalog.
    #[must_use]
    pub fn new(mut config: SimConfig) -> Self {
        config.validate();
        let rng = SimRng::from_optional_seed(config.seed);
        Self {
            clock: 0.0,
            actors: ActorRegistry::new(),
            threat: ThreatLedger::new(config.threat.switch_margin),
            factions: FactionTable::with_defaults(),
            resolver: CombatResolver::new(config.combat.clone()),
            catalog: ArchetypeCatalog::with_defaults(),
            ai: BehaviorEngine::default(),
            director: SpawnDirector::new(config.spawn.clone()),
            interactions: InteractionSystem::new(config.interaction.clone()),
            events: EventBus::new(config.event_capacity),
            rng: Box::new(rng),
            terrain: Box::new(FlatTerrain::new(0.0)),
            hooks: Box::new(NoKillHooks),
            pending_deaths: Vec::new(),
            config,
        }
    }

    /// Replaces the random source.
    #[must_use]
    pub fn with_rng(mut self, rng: impl CombatRng + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replaces the terrain collaborator.
    #[must_use]
    pub fn with_terrain(mut self, terrain: impl Terrain + 'static) -> Self {
        self.terrain = Box::new(terrain);
        self
    }

    /// Replaces the loot and quest collaborator.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl KillHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Replaces the archetype catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: ArchetypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the faction table.
    #[must_use]
    pub fn with_factions(mut self, factions: FactionTable) -> Self {
        self.factions = factions;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Simulation clock in seconds.
    #[must_use]
    pub const fn clock(&self) -> f32 {
        self.clock
    }

    /// Actor registry.
    #[must_use]
    pub const fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    /// Mutable actor registry.
    pub fn actors_mut(&mut self) -> &mut ActorRegistry {
        &mut self.actors
    }

    /// Threat ledger.
    #[must_use]
    pub const fn threat(&self) -> &ThreatLedger {
        &self.threat
    }

    /// Mutable threat ledger.
    pub fn threat_mut(&mut self) -> &mut ThreatLedger {
        &mut self.threat
    }

    /// Behavior engine.
    #[must_use]
    pub const fn ai(&self) -> &BehaviorEngine {
        &self.ai
    }

    /// AI context of an actor.
    #[must_use]
    pub fn ai_context(&self, actor: ActorId) -> Option<&AIContext> {
        self.ai.context(actor)
    }

    /// Mutable AI context of an actor.
    pub fn ai_context_mut(&mut self, actor: ActorId) -> Option<&mut AIContext> {
        self.ai.context_mut(actor)
    }

    /// Spawn director.
    #[must_use]
    pub const fn director(&self) -> &SpawnDirector {
        &self.director
    }

    /// Interaction system.
    #[must_use]
    pub const fn interactions(&self) -> &InteractionSystem {
        &self.interactions
    }

    /// Archetype catalog.
    #[must_use]
    pub const fn catalog(&self) -> &ArchetypeCatalog {
        &self.catalog
    }

    /// Combat resolver.
    #[must_use]
    pub const fn resolver(&self) -> &CombatResolver {
        &self.resolver
    }

    /// Presentation event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Takes every pending presentation event.
    pub fn drain_events(&self) -> Vec<PresentationEvent> {
        self.events.drain()
    }

    // ========================================================================
    // Population
    // ========================================================================

    /// Adds a player-controlled actor.
    pub fn spawn_player(&mut self, actor: CombatActor) -> ActorId {
        self.actors.spawn(actor)
    }

    /// Adds a hostile actor with a default AI context homed at its position.
    pub fn spawn_hostile(&mut self, actor: CombatActor) -> ActorId {
        let home = actor.position;
        let id = self.actors.spawn(actor);
        self.ai.attach(AIContext::new(id, home));
        id
    }

    /// Adds a hostile with a custom AI context. The context's actor id is
    /// overwritten with the new id.
    pub fn spawn_hostile_with(&mut self, actor: CombatActor, mut ctx: AIContext) -> ActorId {
        let id = self.actors.spawn(actor);
        ctx.actor = id;
        self.ai.attach(ctx);
        id
    }

    /// Instantiates a catalog archetype at a position, outside any spawn definition.
    pub fn spawn_archetype(&mut self, archetype: &ArchetypeId, position: Vec3) -> SimResult<ActorId> {
        let data = self.catalog.get(archetype)?;
        let actor = data.instantiate(position);
        let id = self.actors.spawn(actor);
        self.ai.attach(AIContext::from_archetype(id, data, position));
        debug!("Spawned {archetype} as {id}");
        Ok(id)
    }

    /// Removes an actor from every component immediately.
    pub fn despawn(&mut self, actor: ActorId) {
        self.spawn_world().remove_actor(actor);
    }

    /// Registers an area's spawn definitions.
    pub fn register_area_spawns(&mut self, area: AreaId, definitions: Vec<SpawnDefinition>) -> Vec<SpawnId> {
        self.director.register_area_spawns(area, definitions)
    }

    /// Unregisters an area and despawns everything it spawned.
    pub fn unregister_area(&mut self, area: AreaId) -> SpawnReport {
        let mut world = SpawnWorld {
            now: self.clock,
            actors: &mut self.actors,
            ai: &mut self.ai,
            threat: &mut self.threat,
            catalog: &self.catalog,
            rng: &mut *self.rng,
            events: &self.events,
            terrain: &*self.terrain,
        };
        self.director.unregister_area(area, &mut world)
    }

    fn spawn_world(&mut self) -> SpawnWorld<'_> {
        SpawnWorld {
            now: self.clock,
            actors: &mut self.actors,
            ai: &mut self.ai,
            threat: &mut self.threat,
            catalog: &self.catalog,
            rng: &mut *self.rng,
            events: &self.events,
            terrain: &*self.terrain,
        }
    }

    // ========================================================================
    // Combat actions
    // ========================================================================

    /// Resolves an attack initiated outside the AI (the player, scripts).
    /// A killing blow is processed at the end of the next tick's AI phase.
    pub fn resolve_attack(
        &mut self,
        attacker: ActorId,
        defender: ActorId,
        base_damage: f32,
        school: DamageSchool,
    ) -> Outcome {
        let mut scope = CombatScope {
            actors: &mut self.actors,
            threat: &mut self.threat,
            rng: &mut *self.rng,
            events: &self.events,
            deaths: &mut self.pending_deaths,
        };
        self.resolver
            .resolve_attack(&mut scope, attacker, defender, base_damage, school)
    }

    /// Resolves a heal initiated outside the AI.
    pub fn resolve_heal(&mut self, healer: ActorId, target: ActorId, base_healing: f32) -> HealOutcome {
        let mut scope = CombatScope {
            actors: &mut self.actors,
            threat: &mut self.threat,
            rng: &mut *self.rng,
            events: &self.events,
            deaths: &mut self.pending_deaths,
        };
        self.resolver.resolve_heal(&mut scope, healer, target, base_healing)
    }

    /// Fires an interaction by name.
    pub fn trigger_interaction(
        &mut self,
        name: &str,
        source: ActorId,
        target: Option<ActorId>,
        data: &InteractionData,
    ) -> TriggerOutcome {
        let mut scope = InteractionScope {
            now: self.clock,
            actors: &mut self.actors,
            ai: &mut self.ai,
            threat: &self.threat,
            factions: &self.factions,
            rng: &mut *self.rng,
            events: &self.events,
        };
        self.interactions.trigger(name, source, target, data, &mut scope)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let dt = dt.max(0.0);
        self.clock += dt;
        let mut report = TickReport::default();

        let spawns = {
            let mut world = SpawnWorld {
                now: self.clock,
                actors: &mut self.actors,
                ai: &mut self.ai,
                threat: &mut self.threat,
                catalog: &self.catalog,
                rng: &mut *self.rng,
                events: &self.events,
                terrain: &*self.terrain,
            };
            self.director.update(dt, &mut world)
        };
        report.spawned.extend(spawns.spawned);
        report.despawned.extend(spawns.despawned);

        self.threat.commit_targets(&self.actors);

        {
            let mut scope = CombatScope {
                actors: &mut self.actors,
                threat: &mut self.threat,
                rng: &mut *self.rng,
                events: &self.events,
                deaths: &mut self.pending_deaths,
            };
            self.resolver.tick_effects(&mut scope, dt);
        }

        let outbox = {
            let mut env = AiEnv {
                now: self.clock,
                actors: &mut self.actors,
                threat: &mut self.threat,
                factions: &self.factions,
                resolver: &self.resolver,
                rng: &mut *self.rng,
                events: &self.events,
                terrain: &*self.terrain,
                tuning: &self.config.ai,
            };
            self.ai.update(&mut env, dt)
        };
        self.pending_deaths.extend(outbox.deaths);

        if !outbox.summons.is_empty() {
            let mut world = SpawnWorld {
                now: self.clock,
                actors: &mut self.actors,
                ai: &mut self.ai,
                threat: &mut self.threat,
                catalog: &self.catalog,
                rng: &mut *self.rng,
                events: &self.events,
                terrain: &*self.terrain,
            };
            report
                .spawned
                .extend(self.director.spawn_summons(&outbox.summons, &mut world));
        }

        self.process_deaths(&mut report);

        let orders = {
            let mut scope = InteractionScope {
                now: self.clock,
                actors: &mut self.actors,
                ai: &mut self.ai,
                threat: &self.threat,
                factions: &self.factions,
                rng: &mut *self.rng,
                events: &self.events,
            };
            for &(actor, target) in &outbox.engaged {
                self.interactions.on_engaged(actor, target, &mut scope);
            }
            self.interactions.update(dt, &mut scope)
        };

        if !orders.is_empty() {
            let mut env = AiEnv {
                now: self.clock,
                actors: &mut self.actors,
                threat: &mut self.threat,
                factions: &self.factions,
                resolver: &self.resolver,
                rng: &mut *self.rng,
                events: &self.events,
                terrain: &*self.terrain,
                tuning: &self.config.ai,
            };
            let late = self.ai.apply_engagements(&orders, &mut env);
            self.pending_deaths.extend(late.deaths);
        }

        report
    }

    fn process_deaths(&mut self, report: &mut TickReport) {
        let mut deaths = std::mem::take(&mut self.pending_deaths);
        deaths.sort_unstable();
        deaths.dedup();

        for id in deaths {
            let Some(actor) = self.actors.get(id).filter(|a| !a.is_alive()) else {
                continue;
            };
            if actor.is_hostile() {
                let drops = self.hooks.on_hostile_killed(actor);
                if let Some(archetype) = &actor.archetype {
                    self.hooks.on_kill_objective(archetype);
                }
                self.events
                    .notify(format!("{} has been slain", actor.name), NoticeCategory::Combat);
                for drop in drops {
                    self.events.notify(
                        format!("{} dropped {} x{}", actor.name, drop.item, drop.quantity),
                        NoticeCategory::Loot,
                    );
                    report.loot.push((id, drop));
                }
            } else {
                info!("{} died", actor.name);
            }

            self.threat.remove_actor(id);
            self.director.on_actor_died(id);
            let mut scope = InteractionScope {
                now: self.clock,
                actors: &mut self.actors,
                ai: &mut self.ai,
                threat: &self.threat,
                factions: &self.factions,
                rng: &mut *self.rng,
                events: &self.events,
            };
            self.interactions.on_death(id, &mut scope);
            report.deaths.push(id);
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Captures health, position and the alive flag of every actor.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self.clock, &self.actors)
    }

    /// Restores a snapshot onto matching actors. Threat of actors restored
    /// dead is dropped, and spawned actors brought back beyond their
    /// definition's cap are removed. Returns how many actors were restored.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) -> usize {
        let restored = snapshot.apply(&mut self.actors);
        for entry in snapshot.actors.iter().filter(|e| !e.alive) {
            self.threat.remove_actor(entry.id);
        }
        let removed = {
            let mut world = SpawnWorld {
                now: snapshot.clock,
                actors: &mut self.actors,
                ai: &mut self.ai,
                threat: &mut self.threat,
                catalog: &self.catalog,
                rng: &mut *self.rng,
                events: &self.events,
                terrain: &*self.terrain,
            };
            self.director.reconcile_restored(&mut world)
        };
        if !removed.is_empty() {
            debug!("Removed {} restored actors over their spawn cap", removed.len());
        }
        self.clock = snapshot.clock;
        info!("Restored snapshot at t={:.1}s", snapshot.clock);
        restored
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::FixedRng;
    use warband_common::FactionId;

    #[derive(Default)]
    struct CountingHooks {
        kills: std::rc::Rc<std::cell::Cell<u32>>,
    }

    impl KillHooks for CountingHooks {
        fn on_hostile_killed(&mut self, _actor: &CombatActor) -> Vec<LootDrop> {
            self.kills.set(self.kills.get() + 1);
            vec![LootDrop::new("wolf_pelt", 1)]
        }

        fn on_kill_objective(&mut self, _archetype: &ArchetypeId) {}
    }

    fn sim() -> Simulation {
        Simulation::new(SimConfig::with_seed(7)).with_rng(FixedRng::always(0.99))
    }

    #[test]
    fn test_player_kill_processed_once() {
        let kills = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut sim = sim().with_hooks(CountingHooks { kills: kills.clone() });
        let player = sim.spawn_player(CombatActor::player("hero"));
        let wolf = sim.spawn_hostile(
            CombatActor::hostile("wolf", FactionId::BEASTS).with_position(Vec3::new(1.0, 0.0, 0.0)),
        );

        let outcome = sim.resolve_attack(player, wolf, 500.0, DamageSchool::Physical);
        assert!(outcome.killed);

        let report = sim.tick(0.1);
        assert_eq!(report.deaths, vec![wolf]);
        assert_eq!(report.loot, vec![(wolf, LootDrop::new("wolf_pelt", 1))]);
        assert!(!sim.threat().in_combat(wolf));

        let report = sim.tick(0.1);
        assert!(report.deaths.is_empty());
        assert_eq!(kills.get(), 1);
    }

    #[test]
    fn test_attack_makes_hostile_engage() {
        let mut sim = sim();
        let player = sim.spawn_player(CombatActor::player("hero").with_position(Vec3::new(30.0, 0.0, 0.0)));
        let wolf = sim.spawn_hostile(CombatActor::hostile("wolf", FactionId::BEASTS));

        sim.resolve_attack(player, wolf, 5.0, DamageSchool::Physical);
        sim.tick(0.1);

        assert_eq!(sim.ai_context(wolf).expect("context").target, Some(player));
    }

    #[test]
    fn test_spawn_archetype() {
        let mut sim = sim();
        let id = sim
            .spawn_archetype(&ArchetypeId::new("wolf"), Vec3::new(5.0, 0.0, 5.0))
            .expect("wolf archetype");
        assert!(sim.actors().is_alive(id));
        assert!(sim.ai_context(id).is_some());
        assert!(sim.spawn_archetype(&ArchetypeId::new("dragon"), Vec3::ZERO).is_err());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut sim = sim();
        let player = sim.spawn_player(CombatActor::player("hero"));
        let wolf = sim.spawn_hostile(
            CombatActor::hostile("wolf", FactionId::BEASTS).with_position(Vec3::new(50.0, 0.0, 0.0)),
        );
        let saved = sim.snapshot();

        sim.resolve_attack(player, wolf, 500.0, DamageSchool::Physical);
        sim.tick(0.1);
        assert!(!sim.actors().is_alive(wolf));

        let bytes = saved.to_bytes().expect("serialize");
        let loaded = WorldSnapshot::from_bytes(&bytes).expect("deserialize");
        assert_eq!(sim.restore(&loaded), 2);
        assert!(sim.actors().is_alive(wolf));
        assert_eq!(sim.clock(), 0.0);
    }

    #[test]
    fn test_restore_keeps_spawn_cap() {
        let mut sim = sim();
        let player = sim.spawn_player(CombatActor::player("hero").with_health(1_000_000.0));
        let ids = sim.register_area_spawns(
            AreaId::new(1),
            vec![SpawnDefinition::new("wolf", Vec3::new(60.0, 0.0, 0.0))
                .with_count(2, 2)
                .with_respawn_time(5.0)],
        );
        sim.tick(1.0);
        let saved = sim.snapshot();

        let victim = sim.director().definition(ids[0]).expect("definition").alive()[0];
        assert!(sim.resolve_attack(player, victim, 100_000.0, DamageSchool::True).killed);
        for _ in 0..8 {
            sim.tick(1.0);
        }
        assert_eq!(sim.director().definition(ids[0]).expect("definition").alive().len(), 2);
        assert!(!sim.director().definition(ids[0]).expect("definition").alive().contains(&victim));

        let bytes = saved.to_bytes().expect("serialize");
        sim.restore(&WorldSnapshot::from_bytes(&bytes).expect("deserialize"));

        assert!(!sim.actors().contains(victim));
        assert_eq!(sim.director().definition(ids[0]).expect("definition").alive().len(), 2);
        assert_eq!(sim.actors().living_hostiles().len(), 2);
        for _ in 0..20 {
            sim.tick(1.0);
            assert!(sim.director().definition(ids[0]).expect("definition").alive().len() <= 2);
        }
        assert_eq!(sim.actors().living_hostiles().len(), 2);
    }

    #[test]
    fn test_despawn_clears_everything() {
        let mut sim = sim();
        let player = sim.spawn_player(CombatActor::player("hero"));
        let wolf = sim.spawn_hostile(CombatActor::hostile("wolf", FactionId::BEASTS));
        sim.threat_mut().add_threat(wolf, player, 10.0);

        sim.despawn(wolf);

        assert!(!sim.actors().contains(wolf));
        assert!(sim.ai_context(wolf).is_none());
        assert!(!sim.threat().in_combat(wolf));
    }
}
