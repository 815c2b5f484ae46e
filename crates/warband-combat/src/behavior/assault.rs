//! Melee and ranged combat plus archetype special abilities.

use warband_common::{planar_direction, planar_distance, ActorId};

use super::steering::{allies_within, distance_between, face, move_toward, position_of, try_swing};
use super::{AIContext, BehaviorKind, TickContext, Transition};
use crate::actor::{Buff, BuffSource, DamageOverTime, DamageSchool, Stat};
use crate::archetype::{AbilityKind, AbilitySpec};
use crate::combat::Outcome;
use crate::events::TextCategory;

pub(super) fn update_attack(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> Option<Transition> {
    let Some(target) = ctx.target.filter(|t| tc.env.actors.is_alive(*t)) else {
        return Some(ctx.disengage(tc));
    };
    let reach = {
        let me = tc.env.actors.get(ctx.actor)?;
        me.attack_range + me.collision_radius
    };
    let distance = distance_between(tc, ctx.actor, target)?;
    if distance > reach + tc.env.tuning.attack_leeway {
        return Some(Transition::Switch(BehaviorKind::Chase));
    }
    if let Some(pos) = position_of(tc, target) {
        face(tc, ctx.actor, pos);
        ctx.last_known_target_pos = Some(pos);
    }
    if let Some(transition) = try_ability(ctx, tc) {
        return Some(transition);
    }
    swing_with_on_hit(ctx, tc, dt);
    None
}

pub(super) fn update_kite(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> Option<Transition> {
    let Some(target) = ctx.target.filter(|t| tc.env.actors.is_alive(*t)) else {
        return Some(ctx.disengage(tc));
    };
    let (my_pos, range) = {
        let me = tc.env.actors.get(ctx.actor)?;
        (me.position, me.attack_range)
    };
    let target_pos = position_of(tc, target)?;
    let distance = planar_distance(my_pos, target_pos);
    let min_range = tc.env.tuning.kite_min_range.min(range * 0.5);

    if distance < min_range {
        let away = planar_direction(target_pos, my_pos);
        let dest = my_pos + away * (min_range - distance + 1.0);
        move_toward(tc, ctx.actor, dest, 0.0, dt);
    } else if distance > range {
        move_toward(tc, ctx.actor, target_pos, range * 0.9, dt);
    }
    face(tc, ctx.actor, target_pos);
    ctx.last_known_target_pos = Some(target_pos);

    if let Some(transition) = try_ability(ctx, tc) {
        return Some(transition);
    }
    swing_with_on_hit(ctx, tc, dt);
    None
}

/// Auto attack, then roll on-hit abilities if it landed.
pub(super) fn swing_with_on_hit(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> Option<Outcome> {
    let outcome = try_swing(ctx, tc, dt)?;
    if outcome.landed() && !outcome.killed {
        on_hit_abilities(ctx, tc);
    }
    Some(outcome)
}

fn ability_ready(ctx: &AIContext, tc: &TickContext<'_, '_>) -> bool {
    ctx.last_ability_at
        .map_or(true, |at| tc.env.now - at >= tc.env.tuning.ability_cooldown)
}

/// Rolls the first eligible self-triggered ability. Shares one cooldown.
pub(super) fn try_ability(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> Option<Transition> {
    if ctx.abilities.is_empty() || !ability_ready(ctx, tc) {
        return None;
    }
    let abilities = ctx.abilities.clone();
    for spec in abilities {
        if matches!(spec.kind, AbilityKind::PoisonStrike | AbilityKind::Cleave) {
            continue;
        }
        if !eligible(ctx, tc, spec.kind) || !tc.env.rng.roll_below(spec.chance) {
            continue;
        }
        ctx.last_ability_at = Some(tc.env.now);
        return activate(ctx, tc, spec);
    }
    None
}

fn eligible(ctx: &AIContext, tc: &TickContext<'_, '_>, kind: AbilityKind) -> bool {
    let tuning = tc.env.tuning;
    let Some(me) = tc.env.actors.get(ctx.actor) else {
        return false;
    };
    let fraction = me.health_fraction();
    match kind {
        AbilityKind::Enrage => fraction <= tuning.berserk_health_fraction && !ctx.is_in(BehaviorKind::Berserk),
        AbilityKind::ShieldWall => {
            fraction <= tuning.defensive_health_fraction && !ctx.is_in(BehaviorKind::Defensive)
        },
        AbilityKind::Mend => {
            me.healing_power > 0.0 && wounded_ally(ctx, tc, tuning.support_radius, tuning.support_heal_threshold).is_some()
        },
        AbilityKind::WarCry => !ctx.is_in(BehaviorKind::Taunt),
        AbilityKind::Summon => ctx.summon_charges > 0,
        AbilityKind::Blink => ctx
            .target
            .and_then(|t| distance_between(tc, ctx.actor, t))
            .is_some_and(|d| d > tuning.teleport_distance * 2.0),
        AbilityKind::Howl => true,
        AbilityKind::PoisonStrike | AbilityKind::Cleave => false,
    }
}

fn activate(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, spec: AbilitySpec) -> Option<Transition> {
    match spec.kind {
        AbilityKind::Enrage => Some(Transition::Switch(BehaviorKind::Berserk)),
        AbilityKind::ShieldWall => Some(Transition::Push(BehaviorKind::Defensive)),
        AbilityKind::Mend => Some(Transition::Push(BehaviorKind::Support)),
        AbilityKind::WarCry => Some(Transition::Push(BehaviorKind::Taunt)),
        AbilityKind::Summon => Some(Transition::Push(BehaviorKind::Summon)),
        AbilityKind::Blink => Some(Transition::Push(BehaviorKind::Teleport)),
        AbilityKind::Howl => {
            howl(ctx, tc, spec.magnitude());
            None
        },
        AbilityKind::PoisonStrike | AbilityKind::Cleave => None,
    }
}

fn howl(ctx: &AIContext, tc: &mut TickContext<'_, '_>, factor: f32) {
    let tuning = tc.env.tuning;
    let Some(center) = position_of(tc, ctx.actor) else {
        return;
    };
    let mut pack = allies_within(tc, ctx.actor, center, tuning.ability_radius);
    pack.push(ctx.actor);
    for id in pack {
        if let Some(ally) = tc.env.actors.get_mut(id) {
            ally.add_buff(Buff::timed(BuffSource::Howl, Stat::AttackPower, factor, tuning.howl_duration));
        }
    }
    tc.env.events.combat_text("Howl!", TextCategory::Speech, center);
}

/// Poison and cleave roll after a landed swing, under the shared cooldown.
fn on_hit_abilities(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) {
    if !ability_ready(ctx, tc) {
        return;
    }
    let Some(target) = ctx.target else {
        return;
    };
    let abilities = ctx.abilities.clone();
    for spec in abilities {
        if !matches!(spec.kind, AbilityKind::PoisonStrike | AbilityKind::Cleave) {
            continue;
        }
        if !tc.env.rng.roll_below(spec.chance) {
            continue;
        }
        ctx.last_ability_at = Some(tc.env.now);
        match spec.kind {
            AbilityKind::PoisonStrike => poison(ctx, tc, target, spec.magnitude()),
            _ => cleave(ctx, tc, target, spec.magnitude()),
        }
        return;
    }
}

fn poison(ctx: &AIContext, tc: &mut TickContext<'_, '_>, target: ActorId, fraction: f32) {
    let tuning = tc.env.tuning;
    let interval = tc.env.resolver.tuning().dot_interval;
    let Some(power) = tc.env.actors.get(ctx.actor).map(|a| a.effective(Stat::AttackPower)) else {
        return;
    };
    let Some(victim) = tc.env.actors.get_mut(target) else {
        return;
    };
    victim.add_dot(DamageOverTime::new(
        ctx.actor,
        DamageSchool::Nature,
        power * fraction,
        interval,
        tuning.poison_ticks,
    ));
    let position = victim.position;
    tc.env.events.combat_text("Poisoned", TextCategory::Periodic, position);
}

fn cleave(ctx: &AIContext, tc: &mut TickContext<'_, '_>, target: ActorId, fraction: f32) {
    let tuning = tc.env.tuning;
    let Some(center) = position_of(tc, target) else {
        return;
    };
    let (power, school, faction) = match tc.env.actors.get(ctx.actor) {
        Some(me) => (me.effective(Stat::AttackPower) * fraction, me.damage_school, me.faction),
        None => return,
    };
    let victims: Vec<ActorId> = tc
        .env
        .actors
        .entities_in_radius(center, tuning.cleave_radius)
        .into_iter()
        .filter(|id| *id != target && *id != ctx.actor)
        .filter(|id| {
            tc.env
                .actors
                .get(*id)
                .is_some_and(|a| tc.env.factions.is_hostile(faction, a.faction))
        })
        .collect();
    let resolver = tc.env.resolver;
    for victim in victims {
        resolver.resolve_attack(&mut tc.combat(), ctx.actor, victim, power, school);
    }
}

/// Most wounded living ally (or self) under `threshold` within `radius`.
pub(super) fn wounded_ally(ctx: &AIContext, tc: &TickContext<'_, '_>, radius: f32, threshold: f32) -> Option<ActorId> {
    let center = position_of(tc, ctx.actor)?;
    let mut candidates = allies_within(tc, ctx.actor, center, radius);
    candidates.push(ctx.actor);
    candidates
        .into_iter()
        .filter_map(|id| tc.env.actors.get(id).map(|a| (id, a.health_fraction())))
        .filter(|(_, fraction)| *fraction < threshold)
        .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(id, _)| id)
}
