//! Combat resolution.
//!
//! Attacks resolve in a fixed order:
//! 1. Hit roll: `0.95 - 0.02 * max(0, level gap) + 0.01 * hit rating`, clamped
//! 2. Crit roll: 5% + 0.05% per agility (or an actor override), doubling damage
//! 3. Mitigation: armor for physical, per-school resistance for magic
//! 4. Physical only: block (shield, halves and ends), then dodge, then parry
//! 5. Floor to an integer
//!
//! The `roll_*` functions are pure; the `resolve_*` functions apply the result
//! to health, threat and combat text through a [`CombatScope`].

use tracing::debug;
use warband_common::ActorId;

use crate::actor::{CombatActor, DamageSchool, DotTick, Stat};
use crate::config::CombatTuning;
use crate::events::{EventBus, TextCategory};
use crate::registry::ActorRegistry;
use crate::rng::CombatRng;
use crate::threat::ThreatLedger;

// ============================================================================
// Outcomes
// ============================================================================

/// Kind of attack outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// No-op: attacker or defender missing or dead
    None,
    /// Attack missed
    Miss,
    /// Defender dodged
    Dodge,
    /// Defender parried
    Parry,
    /// Defender blocked part of the damage
    Block,
    /// Clean hit
    Hit,
}

/// Result of one attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// What happened
    pub kind: OutcomeKind,
    /// Damage after mitigation, floored
    pub final_damage: u32,
    /// Whether the crit roll succeeded
    pub is_crit: bool,
    /// Whether the damage killed the defender
    pub killed: bool,
}

impl Outcome {
    /// Neutral outcome returned for invalid targets.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            kind: OutcomeKind::None,
            final_damage: 0,
            is_crit: false,
            killed: false,
        }
    }

    const fn avoided(kind: OutcomeKind, is_crit: bool) -> Self {
        Self {
            kind,
            final_damage: 0,
            is_crit,
            killed: false,
        }
    }

    /// True for every outcome except the no-op.
    #[must_use]
    pub fn is_definitive(&self) -> bool {
        self.kind != OutcomeKind::None
    }

    /// True if damage was dealt (hit or block).
    #[must_use]
    pub fn landed(&self) -> bool {
        matches!(self.kind, OutcomeKind::Hit | OutcomeKind::Block)
    }
}

/// Result of one heal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealOutcome {
    /// Healing actually applied, floored and capped at max health
    pub final_healing: u32,
    /// Whether the crit roll succeeded
    pub is_crit: bool,
    /// False for the no-op (missing or dead healer/target)
    pub applied: bool,
}

// ============================================================================
// Scope
// ============================================================================

/// Mutable world state a resolution writes into.
pub struct CombatScope<'a> {
    /// Actor registry
    pub actors: &'a mut ActorRegistry,
    /// Threat ledger
    pub threat: &'a mut ThreatLedger,
    /// Random source
    pub rng: &'a mut dyn CombatRng,
    /// Presentation events
    pub events: &'a EventBus,
    /// Actors killed during this phase, processed at its end
    pub deaths: &'a mut Vec<ActorId>,
}

// ============================================================================
// Resolver
// ============================================================================

/// Combat formulas over a tuning table.
#[derive(Debug, Clone, Default)]
pub struct CombatResolver {
    tuning: CombatTuning,
}

impl CombatResolver {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(tuning: CombatTuning) -> Self {
        Self { tuning }
    }

    /// Tuning table.
    #[must_use]
    pub const fn tuning(&self) -> &CombatTuning {
        &self.tuning
    }

    /// Chance for `attacker` to hit `defender`.
    #[must_use]
    pub fn hit_chance(&self, attacker: &CombatActor, defender: &CombatActor) -> f32 {
        let t = &self.tuning;
        let gap = defender.level.saturating_sub(attacker.level) as f32;
        (t.base_hit_chance - t.level_hit_penalty * gap + attacker.hit_rating * t.hit_rating_coefficient)
            .clamp(t.min_hit_chance, t.max_hit_chance)
    }

    /// Crit chance of an actor.
    #[must_use]
    pub fn crit_chance(&self, actor: &CombatActor) -> f32 {
        actor
            .crit_override
            .unwrap_or(self.tuning.base_crit_chance + actor.agility * self.tuning.agility_crit_coefficient)
            .clamp(0.0, 1.0)
    }

    /// Fraction of damage removed by the defender's armor or resistance.
    #[must_use]
    pub fn mitigation(&self, defender: &CombatActor, school: DamageSchool) -> f32 {
        let t = &self.tuning;
        let reduction = match school {
            DamageSchool::True => 0.0,
            DamageSchool::Physical => {
                let armor = defender.effective(Stat::Armor).max(0.0);
                armor / (armor + t.armor_constant + t.armor_level_coefficient * defender.level as f32)
            },
            magic => {
                let res = defender.resistance(magic).max(0.0);
                res / (res + t.resistance_constant)
            },
        };
        if reduction.is_finite() {
            reduction.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Rolls an attack without applying it.
    pub fn roll_attack(
        &self,
        attacker: &CombatActor,
        defender: &CombatActor,
        base_damage: f32,
        school: DamageSchool,
        rng: &mut dyn CombatRng,
    ) -> Outcome {
        if !attacker.is_alive() || !defender.is_alive() {
            return Outcome::none();
        }

        let hit = self.hit_chance(attacker, defender);
        if rng.roll_below(1.0 - hit) {
            return Outcome::avoided(OutcomeKind::Miss, false);
        }

        let is_crit = rng.roll_below(self.crit_chance(attacker));
        let mut damage = base_damage.max(0.0);
        if is_crit {
            damage *= self.tuning.crit_multiplier;
        }
        damage *= 1.0 - self.mitigation(defender, school);

        let mut kind = OutcomeKind::Hit;
        if school == DamageSchool::Physical {
            if defender.has_shield && rng.roll_below(defender.block_chance) {
                damage *= 1.0 - self.tuning.block_reduction;
                kind = OutcomeKind::Block;
            } else if rng.roll_below(defender.dodge_chance) {
                return Outcome::avoided(OutcomeKind::Dodge, is_crit);
            } else if rng.roll_below(defender.parry_chance) {
                return Outcome::avoided(OutcomeKind::Parry, is_crit);
            }
        }

        Outcome {
            kind,
            final_damage: floor_amount(damage),
            is_crit,
            killed: false,
        }
    }

    /// Rolls a heal without applying it. Returns (amount, crit).
    pub fn roll_heal(&self, healer: &CombatActor, base_healing: f32, rng: &mut dyn CombatRng) -> (u32, bool) {
        let is_crit = rng.roll_below(self.crit_chance(healer));
        let mut amount = base_healing.max(0.0);
        if is_crit {
            amount *= self.tuning.crit_heal_multiplier;
        }
        (floor_amount(amount), is_crit)
    }

    /// Resolves and applies an attack.
    ///
    /// Missing or dead participants yield [`Outcome::none`] with no side effects.
    pub fn resolve_attack(
        &self,
        scope: &mut CombatScope<'_>,
        attacker: ActorId,
        defender: ActorId,
        base_damage: f32,
        school: DamageSchool,
    ) -> Outcome {
        let mut outcome = {
            let (Some(a), Some(d)) = (scope.actors.get(attacker), scope.actors.get(defender)) else {
                return Outcome::none();
            };
            self.roll_attack(a, d, base_damage, school, &mut *scope.rng)
        };
        if !outcome.is_definitive() {
            return outcome;
        }

        let Some(target) = scope.actors.get_mut(defender) else {
            return Outcome::none();
        };
        if outcome.final_damage > 0 {
            outcome.killed = target.apply_damage(outcome.final_damage as f32).killed;
        }
        let position = target.position;
        let defender_hostile = target.is_hostile();

        if outcome.kind != OutcomeKind::Miss && defender_hostile {
            scope.threat.add_threat(
                defender,
                attacker,
                outcome.final_damage as f32 * self.tuning.threat_per_damage,
            );
        }

        let (text, category) = match outcome.kind {
            OutcomeKind::Miss => ("Miss".to_string(), TextCategory::Miss),
            OutcomeKind::Dodge => ("Dodge".to_string(), TextCategory::Dodge),
            OutcomeKind::Parry => ("Parry".to_string(), TextCategory::Parry),
            OutcomeKind::Block => (format!("{} (blocked)", outcome.final_damage), TextCategory::Block),
            _ if outcome.is_crit => (format!("{}!", outcome.final_damage), TextCategory::CriticalDamage),
            _ => (outcome.final_damage.to_string(), TextCategory::Damage),
        };
        scope.events.combat_text(text, category, position);

        if outcome.killed {
            debug!("{attacker} killed {defender}");
            scope.deaths.push(defender);
        }
        outcome
    }

    /// Resolves and applies a heal.
    ///
    /// Healing threat (half the healing) is split evenly across every hostile
    /// in combat with the healer's faction.
    pub fn resolve_heal(
        &self,
        scope: &mut CombatScope<'_>,
        healer: ActorId,
        target: ActorId,
        base_healing: f32,
    ) -> HealOutcome {
        let (amount, is_crit, faction) = {
            let (Some(h), Some(t)) = (scope.actors.get(healer), scope.actors.get(target)) else {
                return HealOutcome::default();
            };
            if !h.is_alive() || !t.is_alive() {
                return HealOutcome::default();
            }
            let (amount, is_crit) = self.roll_heal(h, base_healing, &mut *scope.rng);
            (amount, is_crit, h.faction)
        };

        let Some(t) = scope.actors.get_mut(target) else {
            return HealOutcome::default();
        };
        let healed = floor_amount(t.apply_healing(amount as f32));
        let position = t.position;

        let engaged = scope.threat.engaged_with_faction(faction, scope.actors);
        if !engaged.is_empty() && healed > 0 {
            let share = healed as f32 * self.tuning.healing_threat_factor / engaged.len() as f32;
            for hostile in engaged {
                scope.threat.add_threat(hostile, healer, share);
            }
        }

        let text = if is_crit {
            format!("+{healed}!")
        } else {
            format!("+{healed}")
        };
        scope.events.combat_text(text, TextCategory::Heal, position);

        HealOutcome {
            final_healing: healed,
            is_crit,
            applied: true,
        }
    }

    /// Applies one damage-over-time tick. Mitigated but never avoided.
    pub fn apply_periodic_damage(&self, scope: &mut CombatScope<'_>, target: ActorId, tick: DotTick) -> Outcome {
        let Some(t) = scope.actors.get_mut(target) else {
            return Outcome::none();
        };
        if !t.is_alive() {
            return Outcome::none();
        }
        let damage = floor_amount(tick.amount.max(0.0) * (1.0 - self.mitigation(t, tick.school)));
        let killed = damage > 0 && t.apply_damage(damage as f32).killed;
        let position = t.position;
        let hostile = t.is_hostile();

        if hostile && scope.actors.contains(tick.source) {
            scope
                .threat
                .add_threat(target, tick.source, damage as f32 * self.tuning.threat_per_damage);
        }
        scope
            .events
            .combat_text(damage.to_string(), TextCategory::Periodic, position);
        if killed {
            scope.deaths.push(target);
        }
        Outcome {
            kind: OutcomeKind::Hit,
            final_damage: damage,
            is_crit: false,
            killed,
        }
    }

    /// Expires timed buffs and applies due damage-over-time ticks.
    pub fn tick_effects(&self, scope: &mut CombatScope<'_>, dt: f32) {
        for id in scope.actors.ids() {
            let due = match scope.actors.get_mut(id) {
                Some(actor) => {
                    actor.tick_buffs(dt);
                    actor.take_due_dots(dt)
                },
                None => continue,
            };
            for tick in due {
                self.apply_periodic_damage(scope, id, tick);
            }
        }
    }
}

fn floor_amount(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u32
    } else {
        0
    }
}
