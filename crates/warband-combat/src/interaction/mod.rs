//! Social flavor layered on top of combat.
//!
//! Interactions never change how attacks resolve. They speak lines, hand out
//! short buffs and debuffs, pull idle allies into fights and run duels. Each
//! fires through [`InteractionSystem::trigger`], which checks the per-actor
//! cooldown window and the interaction's eligibility before applying it.
//! A per-tick scan samples a few living hostiles and rolls the interactions
//! that fit their situation.

mod definitions;
mod duel;
mod history;

pub use definitions::{InteractionDefinition, InteractionKind, InteractionRegistry};
pub use duel::{AggroSuppression, Duel};
pub use history::{HistoryEntry, InteractionHistory};

use tracing::{debug, warn};
use warband_common::{ActorId, InstanceId};

use crate::actor::{Buff, BuffSource, Stat};
use crate::behavior::{BehaviorEngine, PackRole};
use crate::config::InteractionTuning;
use crate::events::{EventBus, TextCategory};
use crate::faction::FactionTable;
use crate::registry::ActorRegistry;
use crate::rng::CombatRng;
use crate::threat::ThreatLedger;

/// World state interactions read and write.
pub struct InteractionScope<'a> {
    /// Simulation clock in seconds
    pub now: f32,
    /// Actor registry
    pub actors: &'a mut ActorRegistry,
    /// AI contexts (duels adjust aggro ranges)
    pub ai: &'a mut BehaviorEngine,
    /// Threat ledger, read only
    pub threat: &'a ThreatLedger,
    /// Faction relations
    pub factions: &'a FactionTable,
    /// Random source
    pub rng: &'a mut dyn CombatRng,
    /// Presentation events
    pub events: &'a EventBus,
}

/// Optional payload of a trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionData {
    /// Line to speak instead of the stock one
    pub line: Option<String>,
}

/// Result of [`InteractionSystem::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// No interaction with that name
    NotRegistered,
    /// Fired by the same actor within the cooldown window
    OnCooldown,
    /// The actor's situation does not fit
    Ineligible,
    /// Applied instantly
    Fired,
    /// Applied and tracked while its duration runs
    Started(InstanceId),
}

impl TriggerOutcome {
    /// Checks if the interaction took effect.
    #[must_use]
    pub const fn fired(self) -> bool {
        matches!(self, Self::Fired | Self::Started(_))
    }
}

/// A running interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionInstance {
    /// Instance id
    pub id: InstanceId,
    /// Definition name
    pub name: String,
    /// Interaction kind
    pub kind: InteractionKind,
    /// Actor that fired it
    pub source: ActorId,
    /// Actor it was aimed at
    pub target: Option<ActorId>,
    /// Clock time it started
    pub started_at: f32,
    /// Seconds left
    pub remaining: f32,
    /// Duel state of a challenge
    pub duel: Option<Duel>,
}

/// Living hostile allies of `source` within `radius`, in id order.
pub(crate) fn allies_near(scope: &InteractionScope<'_>, source: ActorId, radius: f32) -> Vec<ActorId> {
    let Some(me) = scope.actors.get(source) else {
        return Vec::new();
    };
    scope
        .actors
        .entities_in_radius(me.position, radius)
        .into_iter()
        .filter(|id| *id != source)
        .filter(|id| {
            scope
                .actors
                .get(*id)
                .is_some_and(|a| a.is_hostile() && scope.factions.is_allied(me.faction, a.faction))
        })
        .collect()
}

/// Registry, cooldown history and running instances.
#[derive(Debug)]
pub struct InteractionSystem {
    registry: InteractionRegistry,
    tuning: InteractionTuning,
    history: InteractionHistory,
    instances: Vec<InteractionInstance>,
    aggro: AggroSuppression,
    next_instance: u64,
    engagements: Vec<(ActorId, ActorId)>,
    now: f32,
}

impl Default for InteractionSystem {
    fn default() -> Self {
        Self::new(InteractionTuning::default())
    }
}

impl InteractionSystem {
    /// Creates a system with the stock interactions.
    #[must_use]
    pub fn new(tuning: InteractionTuning) -> Self {
        Self {
            registry: InteractionRegistry::standard(&tuning),
            history: InteractionHistory::new(tuning.history_len),
            tuning,
            instances: Vec::new(),
            aggro: AggroSuppression::new(),
            next_instance: 0,
            engagements: Vec::new(),
            now: 0.0,
        }
    }

    /// Interaction registry.
    #[must_use]
    pub const fn registry(&self) -> &InteractionRegistry {
        &self.registry
    }

    /// Cooldown history.
    #[must_use]
    pub const fn history(&self) -> &InteractionHistory {
        &self.history
    }

    /// Running instances.
    #[must_use]
    pub fn instances(&self) -> &[InteractionInstance] {
        &self.instances
    }

    /// Aggro ranges held down by running duels.
    #[must_use]
    pub const fn aggro_suppression(&self) -> &AggroSuppression {
        &self.aggro
    }

    /// Running duel involving an actor.
    #[must_use]
    pub fn active_duel(&self, actor: ActorId) -> Option<&Duel> {
        self.instances
            .iter()
            .filter_map(|i| i.duel.as_ref())
            .find(|d| d.involves(actor) && !d.is_resolved())
    }

    /// Checks if `actor` fired `name` within the last `window` seconds.
    #[must_use]
    pub fn has_recent_interaction(&self, actor: ActorId, name: &str, window: f32) -> bool {
        self.history.has_recent(actor, name, window, self.now)
    }

    /// Engagement orders produced since the last drain, as (ally, target).
    pub fn take_engagements(&mut self) -> Vec<(ActorId, ActorId)> {
        std::mem::take(&mut self.engagements)
    }

    /// Fires an interaction by name.
    pub fn trigger(
        &mut self,
        name: &str,
        source: ActorId,
        target: Option<ActorId>,
        data: &InteractionData,
        scope: &mut InteractionScope<'_>,
    ) -> TriggerOutcome {
        self.now = scope.now;
        let def = match self.registry.get(name) {
            Ok(def) => def.clone(),
            Err(e) => {
                warn!("{e}");
                return TriggerOutcome::NotRegistered;
            },
        };
        if def.cooldown > 0.0 && self.has_recent_interaction(source, name, def.cooldown) {
            return TriggerOutcome::OnCooldown;
        }
        if !self.can_trigger(def.kind, source, target, scope) {
            return TriggerOutcome::Ineligible;
        }

        self.history.record(source, name, scope.now);
        debug!("{source} fires {name}");
        let line = data.line.as_deref().unwrap_or(def.kind.line());
        if let Some(position) = scope.actors.get(source).map(|a| a.position) {
            scope.events.combat_text(line, TextCategory::Speech, position);
        }
        let duel = self.apply(&def, source, target, scope);

        if !def.is_tracked() {
            return TriggerOutcome::Fired;
        }
        self.next_instance += 1;
        let id = InstanceId::new(self.next_instance);
        self.instances.push(InteractionInstance {
            id,
            name: def.name.clone(),
            kind: def.kind,
            source,
            target,
            started_at: scope.now,
            remaining: def.duration,
            duel,
        });
        TriggerOutcome::Started(id)
    }

    /// Checks if an actor's situation fits an interaction.
    #[must_use]
    pub fn can_trigger(
        &self,
        kind: InteractionKind,
        source: ActorId,
        target: Option<ActorId>,
        scope: &InteractionScope<'_>,
    ) -> bool {
        let Some(actor) = scope.actors.get(source) else {
            return false;
        };
        if kind == InteractionKind::DeathRattle {
            return !actor.is_alive() && actor.is_hostile();
        }
        if !actor.is_alive() {
            return false;
        }
        let in_combat = scope.threat.in_combat(source);
        let target_alive = target.is_some_and(|t| scope.actors.is_alive(t));
        let fraction = actor.health_fraction();
        let t = &self.tuning;

        match kind {
            InteractionKind::Taunt | InteractionKind::CombatDialogue => in_combat,
            InteractionKind::Rally => {
                in_combat
                    && allies_near(scope, source, t.ally_radius)
                        .into_iter()
                        .filter(|a| scope.threat.in_combat(*a))
                        .count()
                        >= 2
            },
            InteractionKind::Alert => target_alive,
            InteractionKind::CallForHelp => {
                fraction <= t.call_for_help_health && !self.idle_allies(scope, source, t.help_radius).is_empty()
            },
            InteractionKind::FleeWarning => fraction <= t.flee_warning_health,
            InteractionKind::Intimidate => in_combat && target_alive && actor.rank.is_notable(),
            InteractionKind::IdleChatter => !in_combat && !allies_near(scope, source, t.ally_radius).is_empty(),
            InteractionKind::CoordinatedAttack => {
                in_combat
                    && target_alive
                    && scope
                        .ai
                        .context(source)
                        .is_some_and(|ctx| ctx.pack_role == Some(PackRole::Alpha) && !ctx.pack.is_empty())
            },
            InteractionKind::Challenge => {
                in_combat
                    && target_alive
                    && actor.rank.is_notable()
                    && self.active_duel(source).is_none()
                    && target.is_some_and(|other| self.active_duel(other).is_none())
            },
            InteractionKind::DeathRattle => false,
        }
    }

    fn idle_allies(&self, scope: &InteractionScope<'_>, source: ActorId, radius: f32) -> Vec<ActorId> {
        allies_near(scope, source, radius)
            .into_iter()
            .filter(|a| !scope.threat.in_combat(*a))
            .collect()
    }

    fn buff_all(scope: &mut InteractionScope<'_>, actors: &[ActorId], buff: Buff) {
        for id in actors {
            if let Some(actor) = scope.actors.get_mut(*id) {
                actor.add_buff(buff);
            }
        }
    }

    fn apply(
        &mut self,
        def: &InteractionDefinition,
        source: ActorId,
        target: Option<ActorId>,
        scope: &mut InteractionScope<'_>,
    ) -> Option<Duel> {
        let t = &self.tuning;
        match def.kind {
            InteractionKind::Taunt
            | InteractionKind::FleeWarning
            | InteractionKind::CombatDialogue
            | InteractionKind::IdleChatter => {},
            InteractionKind::Rally => {
                let mut rallied: Vec<ActorId> = allies_near(scope, source, def.radius)
                    .into_iter()
                    .filter(|a| scope.threat.in_combat(*a))
                    .collect();
                rallied.push(source);
                let buff = Buff::timed(BuffSource::Rally, Stat::AttackPower, t.rally_factor, t.rally_duration);
                Self::buff_all(scope, &rallied, buff);
            },
            InteractionKind::DeathRattle => {
                let avengers = allies_near(scope, source, def.radius);
                let buff = Buff::timed(
                    BuffSource::Vengeance,
                    Stat::AttackPower,
                    t.vengeance_factor,
                    t.vengeance_duration,
                );
                Self::buff_all(scope, &avengers, buff);
            },
            InteractionKind::Intimidate => {
                if let Some(victim) = target {
                    let debuff = Buff::timed(
                        BuffSource::Intimidated,
                        Stat::AttackPower,
                        t.intimidate_factor,
                        t.intimidate_duration,
                    );
                    Self::buff_all(scope, &[victim], debuff);
                }
            },
            InteractionKind::Alert | InteractionKind::CallForHelp => {
                let foe = target.or_else(|| scope.threat.current_target(source));
                if let Some(foe) = foe {
                    for ally in self.idle_allies(scope, source, def.radius) {
                        self.engagements.push((ally, foe));
                    }
                }
            },
            InteractionKind::CoordinatedAttack => {
                if let (Some(foe), Some(ctx)) = (target, scope.ai.context(source)) {
                    let pack: Vec<ActorId> = ctx.pack.clone();
                    for member in pack.into_iter().filter(|m| scope.actors.is_alive(*m)) {
                        self.engagements.push((member, foe));
                    }
                }
            },
            InteractionKind::Challenge => {
                let opponent = target?;
                let tuning = self.tuning.clone();
                return Some(Duel::begin(source, opponent, &tuning, &mut self.aggro, scope));
            },
        }
        None
    }

    /// Alerts allies when an actor engages.
    pub fn on_engaged(&mut self, actor: ActorId, target: ActorId, scope: &mut InteractionScope<'_>) {
        let chance = self
            .registry
            .of_kind(InteractionKind::Alert)
            .map_or(0.0, |d| d.chance);
        if scope.rng.roll_below(chance) {
            self.trigger(
                InteractionKind::Alert.name(),
                actor,
                Some(target),
                &InteractionData::default(),
                scope,
            );
        }
    }

    /// Ends duels the actor was part of and plays its death rattle.
    pub fn on_death(&mut self, actor: ActorId, scope: &mut InteractionScope<'_>) {
        self.now = scope.now;
        let tuning = self.tuning.clone();
        for instance in &mut self.instances {
            if let Some(duel) = instance.duel.as_mut().filter(|d| d.involves(actor)) {
                duel.end(&tuning, &mut self.aggro, scope);
                instance.remaining = 0.0;
            }
        }
        self.instances.retain(|i| i.remaining > 0.0);
        self.trigger(
            InteractionKind::DeathRattle.name(),
            actor,
            None,
            &InteractionData::default(),
            scope,
        );
        self.history.forget(actor);
    }

    /// Advances instances, then scans a random sample of living hostiles.
    /// Returns the engagement orders produced so far.
    pub fn update(&mut self, dt: f32, scope: &mut InteractionScope<'_>) -> Vec<(ActorId, ActorId)> {
        self.now = scope.now;
        self.tick_instances(dt, scope);

        let mut candidates = scope.actors.living_hostiles();
        let mut sampled = Vec::with_capacity(self.tuning.sample_size);
        while sampled.len() < self.tuning.sample_size && !candidates.is_empty() {
            let pick = scope.rng.index(candidates.len());
            sampled.push(candidates.swap_remove(pick));
        }
        for actor in sampled {
            self.scan(actor, scope);
        }
        self.take_engagements()
    }

    fn tick_instances(&mut self, dt: f32, scope: &mut InteractionScope<'_>) {
        let tuning = self.tuning.clone();
        let mut instances = std::mem::take(&mut self.instances);
        for instance in &mut instances {
            instance.remaining -= dt;
            if let Some(duel) = instance.duel.as_mut() {
                if instance.remaining <= 0.0 || duel.has_casualty(scope) {
                    duel.end(&tuning, &mut self.aggro, scope);
                    instance.remaining = 0.0;
                }
            }
        }
        instances.retain(|i| i.remaining > 0.0);
        self.instances = instances;
    }

    fn scan(&mut self, actor: ActorId, scope: &mut InteractionScope<'_>) {
        let Some(fraction) = scope.actors.get(actor).map(|a| a.health_fraction()) else {
            return;
        };
        let in_combat = scope.threat.in_combat(actor);
        let target = scope.threat.current_target(actor);
        let t = &self.tuning;

        let mut kinds = Vec::new();
        if fraction <= t.flee_warning_health {
            kinds.push(InteractionKind::FleeWarning);
        } else if fraction <= t.call_for_help_health {
            kinds.push(InteractionKind::CallForHelp);
        }
        if in_combat {
            kinds.extend([
                InteractionKind::CoordinatedAttack,
                InteractionKind::Challenge,
                InteractionKind::Intimidate,
                InteractionKind::Rally,
                InteractionKind::Taunt,
                InteractionKind::CombatDialogue,
            ]);
        } else {
            kinds.push(InteractionKind::IdleChatter);
        }

        for kind in kinds {
            let chance = self.registry.of_kind(kind).map_or(0.0, |d| d.chance);
            if !scope.rng.roll_below(chance) {
                continue;
            }
            let outcome = self.trigger(kind.name(), actor, target, &InteractionData::default(), scope);
            if outcome.fired() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{CombatActor, Rank};
    use crate::behavior::AIContext;
    use crate::rng::FixedRng;
    use warband_common::{FactionId, Vec3};

    struct Harness {
        now: f32,
        actors: ActorRegistry,
        ai: BehaviorEngine,
        threat: ThreatLedger,
        factions: FactionTable,
        rng: FixedRng,
        events: EventBus,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                now: 0.0,
                actors: ActorRegistry::new(),
                ai: BehaviorEngine::default(),
                threat: ThreatLedger::default(),
                factions: FactionTable::with_defaults(),
                rng: FixedRng::always(0.99),
                events: EventBus::new(256),
            }
        }

        fn scope(&mut self) -> InteractionScope<'_> {
            InteractionScope {
                now: self.now,
                actors: &mut self.actors,
                ai: &mut self.ai,
                threat: &self.threat,
                factions: &self.factions,
                rng: &mut self.rng,
                events: &self.events,
            }
        }

        fn bandit_at(&mut self, x: f32) -> ActorId {
            let id = self.actors.spawn(
                CombatActor::hostile("bandit", FactionId::BANDITS).with_position(Vec3::new(x, 0.0, 0.0)),
            );
            self.ai.attach(AIContext::new(id, Vec3::new(x, 0.0, 0.0)));
            id
        }

        fn trigger(&mut self, system: &mut InteractionSystem, name: &str, source: ActorId, target: Option<ActorId>) -> TriggerOutcome {
            let mut scope = self.scope();
            system.trigger(name, source, target, &InteractionData::default(), &mut scope)
        }
    }

    #[test]
    fn test_unknown_interaction() {
        let mut h = Harness::new();
        let bandit = h.bandit_at(0.0);
        let mut system = InteractionSystem::default();
        assert_eq!(h.trigger(&mut system, "serenade", bandit, None), TriggerOutcome::NotRegistered);
    }

    #[test]
    fn test_cooldown_window_per_actor() {
        let mut h = Harness::new();
        let a = h.bandit_at(0.0);
        let b = h.bandit_at(1.0);
        let player = h.actors.spawn(CombatActor::player("hero"));
        h.threat.add_threat(a, player, 5.0);
        h.threat.add_threat(b, player, 5.0);
        let mut system = InteractionSystem::default();

        assert_eq!(h.trigger(&mut system, "taunt", a, Some(player)), TriggerOutcome::Fired);
        h.now = 5.0;
        assert_eq!(h.trigger(&mut system, "taunt", a, Some(player)), TriggerOutcome::OnCooldown);
        assert_eq!(h.trigger(&mut system, "taunt", b, Some(player)), TriggerOutcome::Fired);
        h.now = 10.5;
        assert_eq!(h.trigger(&mut system, "taunt", a, Some(player)), TriggerOutcome::Fired);
    }

    #[test]
    fn test_taunt_requires_combat() {
        let mut h = Harness::new();
        let bandit = h.bandit_at(0.0);
        let mut system = InteractionSystem::default();
        assert_eq!(h.trigger(&mut system, "taunt", bandit, None), TriggerOutcome::Ineligible);
        assert!(system.history().entries(bandit).is_empty());
    }

    #[test]
    fn test_alert_pulls_idle_allies() {
        let mut h = Harness::new();
        let a = h.bandit_at(0.0);
        let b = h.bandit_at(5.0);
        let c = h.bandit_at(100.0);
        let player = h.actors.spawn(CombatActor::player("hero"));
        let mut system = InteractionSystem::default();

        assert!(h.trigger(&mut system, "alert", a, Some(player)).fired());

        let orders = system.take_engagements();
        assert_eq!(orders, vec![(b, player)]);
        assert!(!orders.contains(&(c, player)));
    }

    #[test]
    fn test_rally_needs_two_allies_in_combat() {
        let mut h = Harness::new();
        let a = h.bandit_at(0.0);
        let b = h.bandit_at(2.0);
        let c = h.bandit_at(4.0);
        let player = h.actors.spawn(CombatActor::player("hero"));
        h.threat.add_threat(a, player, 1.0);
        h.threat.add_threat(b, player, 1.0);
        let mut system = InteractionSystem::default();

        assert_eq!(h.trigger(&mut system, "rally", a, None), TriggerOutcome::Ineligible);

        h.threat.add_threat(c, player, 1.0);
        assert!(h.trigger(&mut system, "rally", a, None).fired());
        for id in [a, b, c] {
            assert!(h.actors.get(id).expect("bandit").has_buff_from(BuffSource::Rally));
        }
        assert_eq!(system.instances().len(), 1);
    }

    #[test]
    fn test_death_rattle_buffs_allies() {
        let mut h = Harness::new();
        let a = h.bandit_at(0.0);
        let b = h.bandit_at(3.0);
        h.actors.get_mut(a).expect("a").apply_damage(1000.0);
        let mut system = InteractionSystem::default();

        {
            let mut scope = h.scope();
            system.on_death(a, &mut scope);
        }

        assert!(h.actors.get(b).expect("b").has_buff_from(BuffSource::Vengeance));
    }

    fn duel_setup(h: &mut Harness) -> (ActorId, ActorId, ActorId) {
        let captain = h.actors.spawn(
            CombatActor::hostile("captain", FactionId::BANDITS).with_rank(Rank::Elite),
        );
        h.ai.attach(AIContext::new(captain, Vec3::ZERO));
        let ally = h.bandit_at(5.0);
        let player = h.actors.spawn(CombatActor::player("hero").with_position(Vec3::new(2.0, 0.0, 0.0)));
        h.threat.add_threat(captain, player, 10.0);
        (captain, ally, player)
    }

    #[test]
    fn test_duel_suppresses_and_restores_aggro_on_expiry() {
        let mut h = Harness::new();
        let (captain, ally, player) = duel_setup(&mut h);
        let mut system = InteractionSystem::default();

        let outcome = h.trigger(&mut system, "challenge", captain, Some(player));
        assert!(matches!(outcome, TriggerOutcome::Started(_)));
        assert!((h.ai.context(ally).expect("ally").aggro_range - 3.75).abs() < 1e-5);
        assert!(h.actors.get(captain).expect("captain").has_buff_from(BuffSource::Duel));

        for _ in 0..21 {
            let mut scope = h.scope();
            system.tick_instances(1.0, &mut scope);
        }

        assert!((h.ai.context(ally).expect("ally").aggro_range - 15.0).abs() < 1e-5);
        assert!(system.active_duel(captain).is_none());
        let captain = h.actors.get(captain).expect("captain");
        assert!(!captain.has_buff_from(BuffSource::Duel));
        assert!(captain.has_buff_from(BuffSource::Victory));
    }

    #[test]
    fn test_duel_restores_once_on_death() {
        let mut h = Harness::new();
        let (captain, ally, player) = duel_setup(&mut h);
        let mut system = InteractionSystem::default();
        assert!(h.trigger(&mut system, "challenge", captain, Some(player)).fired());

        h.actors.get_mut(player).expect("player").apply_damage(1000.0);
        {
            let mut scope = h.scope();
            system.tick_instances(0.1, &mut scope);
        }
        assert!((h.ai.context(ally).expect("ally").aggro_range - 15.0).abs() < 1e-5);

        h.ai.context_mut(ally).expect("ally").aggro_range = 9.0;
        for _ in 0..30 {
            let mut scope = h.scope();
            system.tick_instances(1.0, &mut scope);
        }
        assert!((h.ai.context(ally).expect("ally").aggro_range - 9.0).abs() < 1e-5);
        assert!(system.instances().is_empty());
    }

    #[test]
    fn test_overlapping_duels_restore_original_aggro() {
        let mut h = Harness::new();
        let first = h.actors.spawn(CombatActor::hostile("captain", FactionId::BANDITS).with_rank(Rank::Elite));
        h.ai.attach(AIContext::new(first, Vec3::ZERO));
        let second = h.actors.spawn(
            CombatActor::hostile("captain", FactionId::BANDITS)
                .with_rank(Rank::Elite)
                .with_position(Vec3::new(3.0, 0.0, 0.0)),
        );
        h.ai.attach(AIContext::new(second, Vec3::new(3.0, 0.0, 0.0)));
        let ally = h.bandit_at(5.0);
        let p1 = h.actors.spawn(CombatActor::player("hero").with_position(Vec3::new(-2.0, 0.0, 0.0)));
        let p2 = h.actors.spawn(CombatActor::player("squire").with_position(Vec3::new(6.0, 0.0, 0.0)));
        h.threat.add_threat(first, p1, 10.0);
        h.threat.add_threat(second, p2, 10.0);
        let mut system = InteractionSystem::default();

        assert!(matches!(h.trigger(&mut system, "challenge", first, Some(p1)), TriggerOutcome::Started(_)));
        for _ in 0..5 {
            let mut scope = h.scope();
            system.tick_instances(1.0, &mut scope);
        }
        h.now = 5.0;
        assert!(matches!(h.trigger(&mut system, "challenge", second, Some(p2)), TriggerOutcome::Started(_)));
        assert!((h.ai.context(ally).expect("ally").aggro_range - 3.75).abs() < 1e-5);
        assert_eq!(system.aggro_suppression().holds(ally), 2);
        assert_eq!(system.aggro_suppression().original_range(ally), Some(15.0));

        // the first duel ends while the second still holds the ally
        for _ in 0..15 {
            let mut scope = h.scope();
            system.tick_instances(1.0, &mut scope);
        }
        assert_eq!(system.instances().len(), 1);
        assert!((h.ai.context(ally).expect("ally").aggro_range - 3.75).abs() < 1e-5);
        assert!((h.ai.context(second).expect("second").aggro_range - 15.0).abs() < 1e-5);

        for _ in 0..40 {
            let mut scope = h.scope();
            system.tick_instances(1.0, &mut scope);
        }
        assert!(system.instances().is_empty());
        for id in [first, second, ally] {
            assert!((h.ai.context(id).expect("context").aggro_range - 15.0).abs() < 1e-5);
        }
        assert_eq!(system.aggro_suppression().holds(ally), 0);
    }

    #[test]
    fn test_normal_rank_cannot_challenge() {
        let mut h = Harness::new();
        let bandit = h.bandit_at(0.0);
        let player = h.actors.spawn(CombatActor::player("hero"));
        h.threat.add_threat(bandit, player, 1.0);
        let mut system = InteractionSystem::default();
        assert_eq!(
            h.trigger(&mut system, "challenge", bandit, Some(player)),
            TriggerOutcome::Ineligible
        );
    }

    #[test]
    fn test_scan_fires_flee_warning() {
        let mut h = Harness::new();
        let bandit = h.bandit_at(0.0);
        h.actors.get_mut(bandit).expect("bandit").apply_damage(80.0);
        h.rng = FixedRng::always(0.0);
        let mut system = InteractionSystem::default();

        {
            let mut scope = h.scope();
            system.update(0.1, &mut scope);
        }

        assert!(system.has_recent_interaction(bandit, "flee_warning", 10.0));
    }
}
