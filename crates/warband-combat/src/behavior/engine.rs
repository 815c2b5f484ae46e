use ahash::AHashMap;
use tracing::debug;
use warband_common::{ActorId, ArchetypeId, Vec3};

use super::{AIContext, BehaviorRegistry};
use crate::combat::{CombatResolver, CombatScope};
use crate::config::AiTuning;
use crate::events::EventBus;
use crate::faction::FactionTable;
use crate::registry::ActorRegistry;
use crate::rng::CombatRng;
use crate::threat::ThreatLedger;
use crate::world::Terrain;

/// World state the AI reads and writes during one tick.
pub struct AiEnv<'a> {
    /// Simulation clock in seconds
    pub now: f32,
    /// Actor registry
    pub actors: &'a mut ActorRegistry,
    /// Threat ledger
    pub threat: &'a mut ThreatLedger,
    /// Faction relations
    pub factions: &'a FactionTable,
    /// Combat formulas
    pub resolver: &'a CombatResolver,
    /// Random source
    pub rng: &'a mut dyn CombatRng,
    /// Presentation events
    pub events: &'a EventBus,
    /// Terrain queries
    pub terrain: &'a dyn Terrain,
    /// Behavior constants
    pub tuning: &'a AiTuning,
}

/// Request for reinforcements, fulfilled by the spawn director.
#[derive(Debug, Clone, PartialEq)]
pub struct SummonRequest {
    /// Actor that channeled the summon
    pub summoner: ActorId,
    /// Archetype to summon (None = the summoner's own)
    pub archetype: Option<ArchetypeId>,
    /// Number of minions
    pub count: u32,
    /// Where to place them
    pub position: Vec3,
    /// Target the minions should attack
    pub target: Option<ActorId>,
}

/// Side effects of an AI tick, processed by the caller after the phase.
#[derive(Debug, Default)]
pub struct AiOutbox {
    /// Actors that just engaged a target (actor, target)
    pub engaged: Vec<(ActorId, ActorId)>,
    /// Pack members to pull into a fight (puller, target)
    pub pack_pulls: Vec<(ActorId, ActorId)>,
    /// Reinforcement requests
    pub summons: Vec<SummonRequest>,
    /// Actors killed during the phase
    pub deaths: Vec<ActorId>,
}

/// Everything a behavior hook can touch.
pub struct TickContext<'t, 'a> {
    /// Shared world state
    pub env: &'t mut AiEnv<'a>,
    /// Other actors' contexts (the updating actor is not in the map)
    pub peers: &'t AHashMap<ActorId, AIContext>,
    /// Behavior lookup
    pub registry: &'t BehaviorRegistry,
    /// Deferred side effects
    pub outbox: &'t mut AiOutbox,
}

impl TickContext<'_, '_> {
    /// Borrows the world as a combat scope.
    pub fn combat(&mut self) -> CombatScope<'_> {
        CombatScope {
            actors: &mut *self.env.actors,
            threat: &mut *self.env.threat,
            rng: &mut *self.env.rng,
            events: self.env.events,
            deaths: &mut self.outbox.deaths,
        }
    }
}

/// Owner of every AI context; runs them once per tick.
#[derive(Debug, Default)]
pub struct BehaviorEngine {
    registry: BehaviorRegistry,
    contexts: AHashMap<ActorId, AIContext>,
}

impl BehaviorEngine {
    /// Creates an engine over a behavior registry.
    #[must_use]
    pub fn new(registry: BehaviorRegistry) -> Self {
        Self {
            registry,
            contexts: AHashMap::new(),
        }
    }

    /// Behavior registry.
    #[must_use]
    pub const fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    /// Starts driving an actor.
    pub fn attach(&mut self, ctx: AIContext) {
        self.contexts.insert(ctx.actor, ctx);
    }

    /// Stops driving an actor, dropping its context.
    pub fn detach(&mut self, actor: ActorId) -> Option<AIContext> {
        self.contexts.remove(&actor)
    }

    /// Context of an actor.
    #[must_use]
    pub fn context(&self, actor: ActorId) -> Option<&AIContext> {
        self.contexts.get(&actor)
    }

    /// Mutable context of an actor.
    pub fn context_mut(&mut self, actor: ActorId) -> Option<&mut AIContext> {
        self.contexts.get_mut(&actor)
    }

    /// Number of driven actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Checks if no actor is driven.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Driven actors in id order.
    #[must_use]
    pub fn ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.contexts.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Runs every context once, in id order, then pulls pack members in.
    pub fn update(&mut self, env: &mut AiEnv<'_>, dt: f32) -> AiOutbox {
        let mut outbox = AiOutbox::default();

        for id in self.ids() {
            if !env.actors.contains(id) {
                debug!("Dropping AI context of despawned {id}");
                self.contexts.remove(&id);
                continue;
            }
            let Some(mut ctx) = self.contexts.remove(&id) else {
                continue;
            };
            {
                let mut tc = TickContext {
                    env: &mut *env,
                    peers: &self.contexts,
                    registry: &self.registry,
                    outbox: &mut outbox,
                };
                ctx.update(&mut tc, dt);
            }
            self.contexts.insert(id, ctx);
        }

        let pulls = std::mem::take(&mut outbox.pack_pulls);
        let orders: Vec<(ActorId, ActorId)> = pulls
            .iter()
            .flat_map(|&(puller, target)| {
                self.contexts
                    .get(&puller)
                    .map(|ctx| ctx.pack.iter().map(move |&member| (member, target)).collect::<Vec<_>>())
                    .unwrap_or_default()
            })
            .collect();
        self.apply_engagements_into(&orders, env, &mut outbox);
        outbox.pack_pulls = pulls;
        outbox
    }

    /// Pulls idle actors into fights (alerts, calls for help, pack pulls).
    ///
    /// Each order is (actor, target). Actors that already have a target, are
    /// dead, or are evading ignore the order.
    pub fn apply_engagements(&mut self, orders: &[(ActorId, ActorId)], env: &mut AiEnv<'_>) -> AiOutbox {
        let mut outbox = AiOutbox::default();
        self.apply_engagements_into(orders, env, &mut outbox);
        outbox
    }

    fn apply_engagements_into(&mut self, orders: &[(ActorId, ActorId)], env: &mut AiEnv<'_>, outbox: &mut AiOutbox) {
        for &(actor, target) in orders {
            if !env.actors.is_alive(actor) || !env.actors.is_alive(target) {
                continue;
            }
            let Some(mut ctx) = self.contexts.remove(&actor) else {
                continue;
            };
            {
                let mut tc = TickContext {
                    env: &mut *env,
                    peers: &self.contexts,
                    registry: &self.registry,
                    outbox: &mut *outbox,
                };
                ctx.join_fight(target, &mut tc);
            }
            self.contexts.insert(actor, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{BuffSource, CombatActor};
    use crate::archetype::{AbilityKind, AbilitySpec};
    use crate::behavior::BehaviorKind;
    use crate::config::CombatTuning;
    use crate::rng::FixedRng;
    use crate::world::FlatTerrain;
    use warband_common::FactionId;

    struct Harness {
        now: f32,
        actors: ActorRegistry,
        threat: ThreatLedger,
        factions: FactionTable,
        resolver: CombatResolver,
        rng: FixedRng,
        events: EventBus,
        terrain: FlatTerrain,
        tuning: AiTuning,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                now: 0.0,
                actors: ActorRegistry::new(),
                threat: ThreatLedger::default(),
                factions: FactionTable::with_defaults(),
                resolver: CombatResolver::new(CombatTuning::default()),
                rng: FixedRng::always(0.99),
                events: EventBus::new(256),
                terrain: FlatTerrain::new(0.0),
                tuning: AiTuning::default(),
            }
        }

        fn env(&mut self) -> AiEnv<'_> {
            AiEnv {
                now: self.now,
                actors: &mut self.actors,
                threat: &mut self.threat,
                factions: &self.factions,
                resolver: &self.resolver,
                rng: &mut self.rng,
                events: &self.events,
                terrain: &self.terrain,
                tuning: &self.tuning,
            }
        }

        fn tick(&mut self, engine: &mut BehaviorEngine, dt: f32) -> AiOutbox {
            self.threat.commit_targets(&self.actors);
            let outbox = {
                let mut env = self.env();
                engine.update(&mut env, dt)
            };
            self.now += dt;
            outbox
        }

        fn wolf_at(&mut self, x: f32) -> ActorId {
            self.actors.spawn(
                CombatActor::hostile("wolf", FactionId::BEASTS).with_position(Vec3::new(x, 0.0, 0.0)),
            )
        }

        fn player_at(&mut self, x: f32) -> ActorId {
            self.actors
                .spawn(CombatActor::player("hero").with_position(Vec3::new(x, 0.0, 0.0)))
        }
    }

    fn current(engine: &BehaviorEngine, id: ActorId) -> BehaviorKind {
        engine.context(id).expect("context").current()
    }

    #[test]
    fn test_engages_hostile_in_aggro_range() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        let player = h.player_at(5.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO));

        let outbox = h.tick(&mut engine, 0.1);

        assert_eq!(current(&engine, wolf), BehaviorKind::Attack);
        assert_eq!(engine.context(wolf).expect("context").target, Some(player));
        assert_eq!(outbox.engaged, vec![(wolf, player)]);
    }

    #[test]
    fn test_out_of_range_stays_idle() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        h.player_at(40.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO));

        let outbox = h.tick(&mut engine, 0.1);

        assert_eq!(current(&engine, wolf), BehaviorKind::Idle);
        assert!(outbox.engaged.is_empty());
    }

    #[test]
    fn test_unknown_default_behavior_falls_back_to_idle() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO).with_default_behavior("dance"));

        h.tick(&mut engine, 0.1);

        assert_eq!(current(&engine, wolf), BehaviorKind::Idle);
    }

    #[test]
    fn test_flee_at_low_health_and_recover() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        h.actors.get_mut(wolf).expect("wolf").apply_damage(81.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO).with_flee_health_fraction(0.2));

        h.tick(&mut engine, 0.1);
        assert_eq!(current(&engine, wolf), BehaviorKind::Flee);
        let speed = h.actors.get(wolf).expect("wolf").effective_speed();
        assert!((speed - 6.0).abs() < 1e-5);

        h.actors.get_mut(wolf).expect("wolf").restore_full_health();
        h.tick(&mut engine, 0.1);
        assert_ne!(current(&engine, wolf), BehaviorKind::Flee);
        let speed = h.actors.get(wolf).expect("wolf").effective_speed();
        assert!((speed - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_flee_threshold_above_recover_point_keeps_fleeing() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        h.actors.get_mut(wolf).expect("wolf").apply_damage(45.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO).with_flee_health_fraction(0.6));

        for _ in 0..6 {
            h.tick(&mut engine, 0.5);
            assert_eq!(current(&engine, wolf), BehaviorKind::Flee);
        }
        let ctx = engine.context(wolf).expect("context");
        assert!((ctx.flee_recover_fraction(&h.tuning) - 0.7).abs() < 1e-5);

        h.actors.get_mut(wolf).expect("wolf").apply_healing(20.0);
        h.tick(&mut engine, 0.5);
        assert_ne!(current(&engine, wolf), BehaviorKind::Flee);
    }

    #[test]
    fn test_flee_exhausts_after_max_duration() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        h.actors.get_mut(wolf).expect("wolf").apply_damage(90.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO).with_flee_health_fraction(0.2));

        for _ in 0..12 {
            h.tick(&mut engine, 1.0);
        }

        let ctx = engine.context(wolf).expect("context");
        assert!(ctx.flee_exhausted);
        assert!(!ctx.is_in(BehaviorKind::Flee));
    }

    #[test]
    fn test_leash_evades_home_and_heals() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(50.0);
        let player = h.player_at(52.0);
        h.actors.get_mut(wolf).expect("wolf").apply_damage(30.0);
        h.threat.add_threat(wolf, player, 10.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO));

        h.tick(&mut engine, 0.5);
        assert_eq!(engine.context(wolf).expect("context").target, Some(player));
        h.tick(&mut engine, 0.5);
        assert_eq!(current(&engine, wolf), BehaviorKind::ReturnHome);
        assert!(!h.threat.in_combat(wolf));

        for _ in 0..40 {
            h.tick(&mut engine, 0.5);
        }
        assert_eq!(current(&engine, wolf), BehaviorKind::Idle);
        let actor = h.actors.get(wolf).expect("wolf");
        assert!((actor.health() - actor.max_health).abs() < f32::EPSILON);
        assert!(actor.position.length() <= 1.0 + 1e-3);
    }

    #[test]
    fn test_chase_then_attack() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        let player = h.player_at(10.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO));

        h.tick(&mut engine, 0.5);
        h.tick(&mut engine, 0.5);
        assert_eq!(current(&engine, wolf), BehaviorKind::Chase);

        for _ in 0..10 {
            h.tick(&mut engine, 0.5);
        }
        assert_eq!(current(&engine, wolf), BehaviorKind::Attack);
        let distance = h.actors.distance_between(wolf, player).expect("both exist");
        assert!(distance <= 2.5);
        assert!(h.actors.get(player).expect("player").health() < 100.0);
    }

    #[test]
    fn test_pack_pull_brings_sibling() {
        let mut h = Harness::new();
        let a = h.wolf_at(0.0);
        let b = h.wolf_at(30.0);
        let player = h.player_at(5.0);
        let mut engine = BehaviorEngine::default();
        let mut ctx_a = AIContext::new(a, Vec3::ZERO);
        ctx_a.pack = vec![b];
        let mut ctx_b = AIContext::new(b, Vec3::new(30.0, 0.0, 0.0));
        ctx_b.pack = vec![a];
        engine.attach(ctx_a);
        engine.attach(ctx_b);

        let outbox = h.tick(&mut engine, 0.1);

        assert_eq!(outbox.pack_pulls, vec![(a, player)]);
        assert_eq!(engine.context(b).expect("context").target, Some(player));
        assert_eq!(current(&engine, b), BehaviorKind::Attack);
    }

    #[test]
    fn test_stack_never_holds_duplicates() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        let registry = BehaviorRegistry::standard();
        let peers = AHashMap::new();
        let mut outbox = AiOutbox::default();
        let mut ctx = AIContext::new(wolf, Vec3::ZERO);
        {
            let mut env = h.env();
            let mut tc = TickContext {
                env: &mut env,
                peers: &peers,
                registry: &registry,
                outbox: &mut outbox,
            };
            ctx.push(BehaviorKind::Idle, &mut tc);
            ctx.push(BehaviorKind::Flee, &mut tc);
            ctx.push(BehaviorKind::Defensive, &mut tc);
            ctx.push(BehaviorKind::Flee, &mut tc);
        }

        let kinds: Vec<BehaviorKind> = ctx.stack().iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![BehaviorKind::Idle, BehaviorKind::Flee]);
        let actor = h.actors.get(wolf).expect("wolf");
        assert!(!actor.has_buff_from(BuffSource::Defensive));
        assert!(actor.has_buff_from(BuffSource::Flee));
    }

    #[test]
    fn test_ambush_springs_after_delay() {
        let mut h = Harness::new();
        let bandit = h.wolf_at(0.0);
        let player = h.player_at(20.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(bandit, Vec3::ZERO).with_default_behavior("ambush"));

        h.tick(&mut engine, 0.25);
        assert_eq!(current(&engine, bandit), BehaviorKind::Ambush);
        assert!(!h.actors.get(bandit).expect("bandit").visible);

        h.actors.get_mut(player).expect("player").position = Vec3::new(5.0, 0.0, 0.0);
        h.tick(&mut engine, 0.25);
        assert_eq!(current(&engine, bandit), BehaviorKind::Ambush);

        for _ in 0..3 {
            h.tick(&mut engine, 0.25);
        }
        assert_eq!(current(&engine, bandit), BehaviorKind::Attack);
        assert!(h.actors.get(bandit).expect("bandit").visible);
    }

    #[test]
    fn test_guard_drops_target_outside_post() {
        let mut h = Harness::new();
        let guard = h.wolf_at(0.0);
        let player = h.player_at(10.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(guard, Vec3::ZERO).with_default_behavior("guard"));

        h.tick(&mut engine, 0.1);
        assert_eq!(current(&engine, guard), BehaviorKind::Guard);
        assert_eq!(engine.context(guard).expect("context").target, Some(player));

        h.actors.get_mut(player).expect("player").position = Vec3::new(30.0, 0.0, 0.0);
        h.tick(&mut engine, 0.1);
        assert_eq!(current(&engine, guard), BehaviorKind::Guard);
        assert_eq!(engine.context(guard).expect("context").target, None);
    }

    #[test]
    fn test_guard_radius_follows_tuning_unless_overridden() {
        let mut h = Harness::new();
        h.tuning.guard_radius = 5.0;
        let guard = h.wolf_at(0.0);
        let sentry = h.wolf_at(0.5);
        let player = h.player_at(10.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(guard, Vec3::ZERO).with_default_behavior("guard"));
        engine.attach(
            AIContext::new(sentry, Vec3::new(0.5, 0.0, 0.0))
                .with_default_behavior("guard")
                .with_guard_radius(12.0),
        );

        h.tick(&mut engine, 0.1);

        assert_eq!(current(&engine, guard), BehaviorKind::Guard);
        assert_eq!(engine.context(guard).expect("context").target, None);
        assert_eq!(engine.context(sentry).expect("context").target, Some(player));
    }

    #[test]
    fn test_summon_channel_requests_reinforcements_once() {
        let mut h = Harness::new();
        let cultist = h.wolf_at(0.0);
        h.player_at(1.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(
            AIContext::new(cultist, Vec3::ZERO).with_abilities(vec![AbilitySpec::new(AbilityKind::Summon, 1.0)]),
        );

        let mut summons = Vec::new();
        for _ in 0..16 {
            summons.extend(h.tick(&mut engine, 1.0).summons);
        }

        assert_eq!(summons.len(), 1);
        assert_eq!(summons[0].summoner, cultist);
        assert_eq!(summons[0].count, h.tuning.summon_count);
        assert_eq!(engine.context(cultist).expect("context").summon_charges, 0);
    }

    #[test]
    fn test_despawned_actor_context_dropped() {
        let mut h = Harness::new();
        let wolf = h.wolf_at(0.0);
        let mut engine = BehaviorEngine::default();
        engine.attach(AIContext::new(wolf, Vec3::ZERO));
        h.actors.despawn(wolf);

        h.tick(&mut engine, 0.1);

        assert!(engine.is_empty());
    }
}
