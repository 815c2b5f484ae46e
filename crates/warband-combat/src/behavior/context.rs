use tracing::{debug, warn};
use warband_common::{planar_distance, ActorId, ArchetypeId, Vec3};

use super::{steering, BehaviorKind, BehaviorState, TickContext, Transition};
use crate::archetype::{AbilitySpec, Archetype};
use crate::config::AiTuning;

/// Role of an actor inside a hunting pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackRole {
    /// Charges the target
    Alpha,
    /// Attacks from the side
    Flanker,
    /// Hangs back behind the alpha
    Support,
}

/// One entry of the behavior stack.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorFrame {
    /// Behavior of this frame
    pub kind: BehaviorKind,
    /// Scratch state of this activation
    pub state: BehaviorState,
}

/// Per-actor AI state.
///
/// The top of the stack is the single active behavior; frames below it are
/// suspended and resume on `Pop`. A behavior appears at most once on the stack.
#[derive(Debug, Clone)]
pub struct AIContext {
    /// Driven actor
    pub actor: ActorId,
    stack: Vec<BehaviorFrame>,
    /// Current target handle (resolved through the registry on use)
    pub target: Option<ActorId>,
    /// Position the actor evades back to
    pub home: Vec3,
    /// Maximum distance from home while engaged
    pub leash_range: f32,
    /// Perception radius
    pub aggro_range: f32,
    /// Health fraction that triggers fleeing (0 = never)
    pub flee_health_fraction: f32,
    /// Behavior used once engaged
    pub combat_behavior: String,
    /// Behavior used out of combat
    pub default_behavior: String,
    /// Patrol loop (empty = generated on demand)
    pub patrol_path: Vec<Vec3>,
    /// Linked siblings pulled into fights together
    pub pack: Vec<ActorId>,
    /// Role while pack hunting
    pub pack_role: Option<PackRole>,
    /// Archetype abilities
    pub abilities: Vec<AbilitySpec>,
    /// Archetype used by the summon ability
    pub summon_archetype: Option<ArchetypeId>,
    /// Summons left before the next evade
    pub summon_charges: u32,
    /// Distance at which an ambush springs
    pub ambush_trigger_radius: f32,
    /// Radius a guard protects around home (None = the configured default)
    pub guard_radius: Option<f32>,
    /// Clock time of the last special ability
    pub last_ability_at: Option<f32>,
    /// Seconds until the next auto attack
    pub attack_timer: f32,
    /// Last place the target was seen
    pub last_known_target_pos: Option<Vec3>,
    /// Set when a flee ran out of time; cleared once health recovers
    pub flee_exhausted: bool,
}

impl AIContext {
    /// Creates a context with default ranges.
    #[must_use]
    pub fn new(actor: ActorId, home: Vec3) -> Self {
        Self {
            actor,
            stack: Vec::new(),
            target: None,
            home,
            leash_range: 40.0,
            aggro_range: 15.0,
            flee_health_fraction: 0.0,
            combat_behavior: BehaviorKind::Attack.name().to_string(),
            default_behavior: BehaviorKind::Idle.name().to_string(),
            patrol_path: Vec::new(),
            pack: Vec::new(),
            pack_role: None,
            abilities: Vec::new(),
            summon_archetype: None,
            summon_charges: 1,
            ambush_trigger_radius: 8.0,
            guard_radius: None,
            last_ability_at: None,
            attack_timer: 0.0,
            last_known_target_pos: None,
            flee_exhausted: false,
        }
    }

    /// Creates a context from an archetype's AI profile.
    #[must_use]
    pub fn from_archetype(actor: ActorId, archetype: &Archetype, home: Vec3) -> Self {
        Self {
            leash_range: archetype.leash_range,
            aggro_range: archetype.aggro_range,
            flee_health_fraction: archetype.flee_health_fraction,
            combat_behavior: archetype.combat_behavior.clone(),
            default_behavior: archetype.default_behavior.clone(),
            abilities: archetype.abilities.clone(),
            summon_archetype: archetype.summon.clone(),
            ..Self::new(actor, home)
        }
    }

    /// Sets aggro and leash ranges.
    #[must_use]
    pub const fn with_ranges(mut self, aggro_range: f32, leash_range: f32) -> Self {
        self.aggro_range = aggro_range;
        self.leash_range = leash_range;
        self
    }

    /// Sets the flee threshold.
    #[must_use]
    pub const fn with_flee_health_fraction(mut self, fraction: f32) -> Self {
        self.flee_health_fraction = fraction;
        self
    }

    /// Sets the combat behavior name.
    #[must_use]
    pub fn with_combat_behavior(mut self, name: impl Into<String>) -> Self {
        self.combat_behavior = name.into();
        self
    }

    /// Sets the out-of-combat behavior name.
    #[must_use]
    pub fn with_default_behavior(mut self, name: impl Into<String>) -> Self {
        self.default_behavior = name.into();
        self
    }

    /// Overrides the guard radius.
    #[must_use]
    pub const fn with_guard_radius(mut self, radius: f32) -> Self {
        self.guard_radius = Some(radius);
        self
    }

    /// Radius this actor guards, falling back to the tuning default.
    #[must_use]
    pub fn guard_radius_or(&self, tuning: &AiTuning) -> f32 {
        self.guard_radius.unwrap_or(tuning.guard_radius)
    }

    /// Health fraction above which a flee ends. Always above this actor's
    /// own flee threshold, so a flee cannot end and restart on the same health.
    #[must_use]
    pub fn flee_recover_fraction(&self, tuning: &AiTuning) -> f32 {
        tuning
            .flee_recover_fraction
            .max(self.flee_health_fraction + tuning.flee_recover_margin)
    }

    /// Sets the patrol loop.
    #[must_use]
    pub fn with_patrol_path(mut self, path: Vec<Vec3>) -> Self {
        self.patrol_path = path;
        self
    }

    /// Sets the abilities.
    #[must_use]
    pub fn with_abilities(mut self, abilities: Vec<AbilitySpec>) -> Self {
        self.abilities = abilities;
        self
    }

    /// Active behavior (`idle` before the first update).
    #[must_use]
    pub fn current(&self) -> BehaviorKind {
        self.stack.last().map_or(BehaviorKind::Idle, |f| f.kind)
    }

    /// Behavior stack, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[BehaviorFrame] {
        &self.stack
    }

    /// Checks if a behavior is anywhere on the stack.
    #[must_use]
    pub fn is_in(&self, kind: BehaviorKind) -> bool {
        self.stack.iter().any(|f| f.kind == kind)
    }

    /// Runs one AI tick: global interrupts first, then the active behavior.
    pub fn update(&mut self, tc: &mut TickContext<'_, '_>, dt: f32) {
        if self.stack.is_empty() {
            let default = self.default_behavior.clone();
            self.apply(Transition::Named(default), tc);
        }

        if self.run_interrupts(tc) {
            return;
        }

        let kind = self.current();
        let mut state = self
            .stack
            .last_mut()
            .map(|f| std::mem::take(&mut f.state))
            .unwrap_or_default();
        let transition = super::update(kind, self, &mut state, tc, dt);
        if let Some(frame) = self.stack.last_mut() {
            if frame.kind == kind {
                frame.state = state;
            }
        }
        if let Some(transition) = transition {
            self.apply(transition, tc);
        }
    }

    /// Global interrupts in priority order. Returns true if one fired.
    fn run_interrupts(&mut self, tc: &mut TickContext<'_, '_>) -> bool {
        let Some(actor) = tc.env.actors.get(self.actor) else {
            return true;
        };

        // dead: unwind to idle
        if !actor.is_alive() {
            self.target = None;
            if self.stack.len() != 1 || self.current() != BehaviorKind::Idle {
                self.reset(BehaviorKind::Idle, tc);
            }
            return true;
        }

        // low health: flee
        let fraction = actor.health_fraction();
        let position = actor.position;
        if fraction > self.flee_health_fraction {
            self.flee_exhausted = false;
        } else if self.flee_health_fraction > 0.0 && !self.is_in(BehaviorKind::Flee) && !self.flee_exhausted {
            debug!("{} flees at {:.0}% health", self.actor, fraction * 100.0);
            self.push(BehaviorKind::Flee, tc);
            return true;
        }

        // threat detection and engagement
        if self.target.is_some_and(|t| !tc.env.actors.is_alive(t)) {
            self.target = None;
        }
        let ledger = tc
            .env
            .threat
            .current_target(self.actor)
            .filter(|t| tc.env.actors.is_alive(*t));
        let kind = self.current();
        match kind {
            BehaviorKind::ReturnHome => {},
            BehaviorKind::Flee | BehaviorKind::Guard | BehaviorKind::Ambush => {
                if self.target.is_none() && kind != BehaviorKind::Ambush {
                    self.target = ledger;
                }
            },
            _ if self.target.is_none() => {
                let found = ledger.or_else(|| {
                    if kind.accepts_aggro() {
                        steering::nearest_threat(tc, self.actor, self.aggro_range)
                    } else {
                        None
                    }
                });
                if let Some(target) = found {
                    self.engage(target, tc);
                    return true;
                }
            },
            _ => {
                if ledger.is_some() {
                    self.target = ledger;
                }
            },
        }

        // leash
        let engaged = self.target.is_some() || tc.env.threat.in_combat(self.actor);
        if engaged && kind != BehaviorKind::ReturnHome && planar_distance(position, self.home) > self.leash_range {
            debug!("{} leashed back home", self.actor);
            self.reset(BehaviorKind::ReturnHome, tc);
            return true;
        }

        false
    }

    /// Records an engagement without changing behavior.
    pub(crate) fn mark_engaged(&mut self, target: ActorId, tc: &mut TickContext<'_, '_>) {
        self.target = Some(target);
        self.last_known_target_pos = tc.env.actors.get(target).map(|a| a.position);
        tc.outbox.engaged.push((self.actor, target));
        if !self.pack.is_empty() {
            tc.outbox.pack_pulls.push((self.actor, target));
        }
    }

    /// Engages a target and switches to the combat behavior.
    pub(crate) fn engage(&mut self, target: ActorId, tc: &mut TickContext<'_, '_>) {
        debug!("{} engages {target}", self.actor);
        self.mark_engaged(target, tc);
        let combat = self.combat_behavior.clone();
        self.apply(Transition::Named(combat), tc);
    }

    /// Joins a fight started by someone else (no further pulls).
    pub(crate) fn join_fight(&mut self, target: ActorId, tc: &mut TickContext<'_, '_>) {
        let kind = self.current();
        if self.target.is_some() || kind == BehaviorKind::ReturnHome || kind == BehaviorKind::Flee {
            return;
        }
        if !tc.env.actors.is_alive(self.actor) {
            return;
        }
        self.target = Some(target);
        self.last_known_target_pos = tc.env.actors.get(target).map(|a| a.position);
        if kind != BehaviorKind::Guard {
            let combat = self.combat_behavior.clone();
            self.apply(Transition::Named(combat), tc);
        }
    }

    /// Transition used when a top-level combat behavior loses its target.
    pub(crate) fn disengage(&mut self, tc: &mut TickContext<'_, '_>) -> Transition {
        self.target = None;
        self.last_known_target_pos = None;
        let far = tc
            .env
            .actors
            .get(self.actor)
            .is_some_and(|a| planar_distance(a.position, self.home) > tc.env.tuning.home_tolerance);
        if far {
            Transition::Switch(BehaviorKind::ReturnHome)
        } else {
            tc.env.threat.clear(self.actor);
            Transition::Named(self.default_behavior.clone())
        }
    }

    /// Applies a transition.
    pub fn apply(&mut self, transition: Transition, tc: &mut TickContext<'_, '_>) {
        match transition {
            Transition::Switch(kind) => self.switch(kind, tc),
            Transition::Push(kind) => self.push(kind, tc),
            Transition::Pop => self.pop(tc),
            Transition::Named(name) => {
                let kind = match tc.registry.resolve(&name) {
                    Ok(kind) => kind,
                    Err(e) => {
                        warn!("{}: {e}, falling back to idle", self.actor);
                        BehaviorKind::Idle
                    },
                };
                self.switch(kind, tc);
            },
        }
    }

    /// Replaces the active behavior.
    pub fn switch(&mut self, kind: BehaviorKind, tc: &mut TickContext<'_, '_>) {
        if let Some(pos) = self.stack.iter().position(|f| f.kind == kind) {
            self.unwind_to(pos + 1, tc);
            return;
        }
        self.pop_frame(tc);
        self.push_frame(kind, tc);
    }

    /// Suspends the active behavior and runs `kind` on top.
    ///
    /// If `kind` is already on the stack, the frames above it are finished
    /// and it resumes instead.
    pub fn push(&mut self, kind: BehaviorKind, tc: &mut TickContext<'_, '_>) {
        if let Some(pos) = self.stack.iter().position(|f| f.kind == kind) {
            self.unwind_to(pos + 1, tc);
            return;
        }
        self.push_frame(kind, tc);
    }

    /// Finishes the active behavior and resumes the one below (idle if none).
    pub fn pop(&mut self, tc: &mut TickContext<'_, '_>) {
        self.pop_frame(tc);
        if self.stack.is_empty() {
            self.push_frame(BehaviorKind::Idle, tc);
        }
    }

    /// Finishes every behavior and starts `kind`.
    pub fn reset(&mut self, kind: BehaviorKind, tc: &mut TickContext<'_, '_>) {
        self.unwind_to(0, tc);
        self.push_frame(kind, tc);
    }

    fn unwind_to(&mut self, len: usize, tc: &mut TickContext<'_, '_>) {
        while self.stack.len() > len {
            self.pop_frame(tc);
        }
    }

    fn pop_frame(&mut self, tc: &mut TickContext<'_, '_>) {
        if let Some(frame) = self.stack.pop() {
            super::exit(frame.kind, self, tc);
        }
    }

    fn push_frame(&mut self, kind: BehaviorKind, tc: &mut TickContext<'_, '_>) {
        debug!("{} -> {kind}", self.actor);
        let state = super::enter(kind, self, tc);
        self.stack.push(BehaviorFrame { kind, state });
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;
    use warband_common::FactionId;

    use super::*;
    use crate::actor::CombatActor;
    use crate::behavior::{AiEnv, AiOutbox, BehaviorRegistry};
    use crate::combat::CombatResolver;
    use crate::config::{AiTuning, CombatTuning};
    use crate::events::EventBus;
    use crate::faction::FactionTable;
    use crate::registry::ActorRegistry;
    use crate::rng::FixedRng;
    use crate::threat::ThreatLedger;
    use crate::world::FlatTerrain;

    struct World {
        actors: ActorRegistry,
        threat: ThreatLedger,
        factions: FactionTable,
        resolver: CombatResolver,
        rng: FixedRng,
        events: EventBus,
        terrain: FlatTerrain,
        tuning: AiTuning,
        registry: BehaviorRegistry,
    }

    impl World {
        fn new() -> Self {
            Self {
                actors: ActorRegistry::new(),
                threat: ThreatLedger::default(),
                factions: FactionTable::with_defaults(),
                resolver: CombatResolver::new(CombatTuning::default()),
                rng: FixedRng::always(0.99),
                events: EventBus::new(64),
                terrain: FlatTerrain::new(0.0),
                tuning: AiTuning::default(),
                registry: BehaviorRegistry::standard(),
            }
        }

        fn spawn(&mut self, actor: CombatActor, x: f32) -> ActorId {
            self.actors.spawn(actor.with_position(Vec3::new(x, 0.0, 0.0)))
        }

        fn step(&mut self, ctx: &mut AIContext) -> AiOutbox {
            let mut env = AiEnv {
                now: 0.0,
                actors: &mut self.actors,
                threat: &mut self.threat,
                factions: &self.factions,
                resolver: &self.resolver,
                rng: &mut self.rng,
                events: &self.events,
                terrain: &self.terrain,
                tuning: &self.tuning,
            };
            let peers = AHashMap::new();
            let mut outbox = AiOutbox::default();
            let mut tc = TickContext {
                env: &mut env,
                peers: &peers,
                registry: &self.registry,
                outbox: &mut outbox,
            };
            ctx.update(&mut tc, 0.5);
            outbox
        }
    }

    #[test]
    fn test_death_overrides_flee_and_engage() {
        let mut world = World::new();
        let wolf = world.spawn(CombatActor::hostile("wolf", FactionId::BEASTS), 0.0);
        let player = world.spawn(CombatActor::player("hero"), 3.0);
        let mut ctx = AIContext::new(wolf, Vec3::ZERO).with_flee_health_fraction(0.3);

        world.step(&mut ctx);
        assert_eq!(ctx.current(), BehaviorKind::Attack);
        assert_eq!(ctx.target, Some(player));

        world.actors.get_mut(wolf).expect("wolf").apply_damage(1000.0);
        let outbox = world.step(&mut ctx);

        assert_eq!(ctx.current(), BehaviorKind::Idle);
        assert_eq!(ctx.stack().len(), 1);
        assert_eq!(ctx.target, None);
        assert!(outbox.engaged.is_empty());
    }

    #[test]
    fn test_flee_preempts_engagement() {
        let mut world = World::new();
        let wolf = world.spawn(CombatActor::hostile("wolf", FactionId::BEASTS), 0.0);
        world.spawn(CombatActor::player("hero"), 4.0);
        world.actors.get_mut(wolf).expect("wolf").apply_damage(90.0);
        let mut ctx = AIContext::new(wolf, Vec3::ZERO).with_flee_health_fraction(0.2);

        let outbox = world.step(&mut ctx);

        assert_eq!(ctx.current(), BehaviorKind::Flee);
        assert_eq!(ctx.target, None);
        assert!(outbox.engaged.is_empty());
    }

    #[test]
    fn test_engagement_then_leash_on_next_tick() {
        let mut world = World::new();
        let wolf = world.spawn(CombatActor::hostile("wolf", FactionId::BEASTS), 50.0);
        let player = world.spawn(CombatActor::player("hero"), 52.0);
        let mut ctx = AIContext::new(wolf, Vec3::ZERO);

        let outbox = world.step(&mut ctx);
        assert_eq!(ctx.current(), BehaviorKind::Attack);
        assert_eq!(outbox.engaged, vec![(wolf, player)]);

        world.step(&mut ctx);
        assert_eq!(ctx.current(), BehaviorKind::ReturnHome);
        assert_eq!(ctx.target, None);
    }

    #[test]
    fn test_flee_recover_point_stays_above_threshold() {
        let tuning = AiTuning::default();
        let timid = AIContext::new(ActorId::NULL, Vec3::ZERO).with_flee_health_fraction(0.2);
        let skittish = AIContext::new(ActorId::NULL, Vec3::ZERO).with_flee_health_fraction(0.8);

        assert!((timid.flee_recover_fraction(&tuning) - 0.5).abs() < 1e-6);
        assert!((skittish.flee_recover_fraction(&tuning) - 0.9).abs() < 1e-6);
    }
}
