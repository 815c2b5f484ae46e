//! Stances and channels that buff the actor on enter and revert on exit.

use warband_common::{planar_distance, point_on_circle};

use super::assault::{swing_with_on_hit, wounded_ally};
use super::steering::{face, move_toward, position_of};
use super::{AIContext, BehaviorKind, BehaviorState, SummonRequest, TickContext, Transition};
use crate::actor::{Buff, BuffSource, Stat};
use crate::events::TextCategory;

fn buff_self(ctx: &AIContext, tc: &mut TickContext<'_, '_>, buffs: &[Buff]) {
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        for buff in buffs {
            a.add_buff(*buff);
        }
    }
}

fn shout(ctx: &AIContext, tc: &TickContext<'_, '_>, text: &str) {
    if let Some(pos) = position_of(tc, ctx.actor) {
        tc.env.events.combat_text(text, TextCategory::Speech, pos);
    }
}

/// Closes to melee range and swings. Returns false if the target is gone.
fn brawl(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> bool {
    let Some(target_pos) = ctx.target.and_then(|t| position_of(tc, t)) else {
        return false;
    };
    let reach = tc
        .env
        .actors
        .get(ctx.actor)
        .map_or(0.0, |a| a.attack_range + a.collision_radius);
    move_toward(tc, ctx.actor, target_pos, reach * 0.9, dt);
    face(tc, ctx.actor, target_pos);
    ctx.last_known_target_pos = Some(target_pos);
    swing_with_on_hit(ctx, tc, dt);
    true
}

fn source_of(kind: BehaviorKind) -> Option<BuffSource> {
    match kind {
        BehaviorKind::Berserk => Some(BuffSource::Berserk),
        BehaviorKind::Defensive => Some(BuffSource::Defensive),
        BehaviorKind::Support => Some(BuffSource::Support),
        BehaviorKind::Taunt => Some(BuffSource::Taunt),
        _ => None,
    }
}

pub(super) fn exit_stance(kind: BehaviorKind, ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) {
    let Some(source) = source_of(kind) else {
        return;
    };
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        a.remove_buffs_from(source);
    }
}

// ============================================================================
// Berserk
// ============================================================================

pub(super) fn enter_berserk(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    let tuning = tc.env.tuning;
    buff_self(ctx, tc, &[
        Buff::permanent(BuffSource::Berserk, Stat::AttackPower, tuning.berserk_attack_multiplier),
        Buff::permanent(BuffSource::Berserk, Stat::AttackInterval, tuning.berserk_interval_multiplier),
        Buff::permanent(BuffSource::Berserk, Stat::Armor, tuning.berserk_armor_multiplier),
    ]);
    shout(ctx, tc, "Enraged!");
    BehaviorState::Empty
}

pub(super) fn update_berserk(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> Option<Transition> {
    if brawl(ctx, tc, dt) {
        None
    } else {
        Some(ctx.disengage(tc))
    }
}

// ============================================================================
// Defensive
// ============================================================================

pub(super) fn enter_defensive(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    let tuning = tc.env.tuning;
    buff_self(ctx, tc, &[
        Buff::permanent(BuffSource::Defensive, Stat::Armor, tuning.defensive_armor_multiplier),
        Buff::permanent(BuffSource::Defensive, Stat::AttackPower, tuning.defensive_attack_multiplier),
    ]);
    shout(ctx, tc, "Shield Wall");
    BehaviorState::Stance {
        remaining: tuning.defensive_duration,
    }
}

pub(super) fn update_defensive(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    let BehaviorState::Stance { remaining } = state else {
        return Some(Transition::Pop);
    };
    *remaining -= dt;
    if *remaining <= 0.0 || !brawl(ctx, tc, dt) {
        return Some(Transition::Pop);
    }
    None
}

// ============================================================================
// Support
// ============================================================================

pub(super) fn enter_support(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    let factor = tc.env.tuning.support_healing_multiplier;
    buff_self(ctx, tc, &[Buff::permanent(BuffSource::Support, Stat::HealingPower, factor)]);
    BehaviorState::Support { heal_in: 0.0 }
}

pub(super) fn update_support(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    let BehaviorState::Support { heal_in } = state else {
        return Some(Transition::Pop);
    };
    let tuning = tc.env.tuning;
    let Some(patient) = wounded_ally(ctx, tc, tuning.support_radius, tuning.support_heal_threshold) else {
        return Some(Transition::Pop);
    };
    let (my_pos, power) = {
        let me = tc.env.actors.get(ctx.actor)?;
        (me.position, me.effective(Stat::HealingPower))
    };
    let patient_pos = position_of(tc, patient)?;

    *heal_in -= dt;
    if planar_distance(my_pos, patient_pos) > tuning.support_heal_range {
        move_toward(tc, ctx.actor, patient_pos, tuning.support_heal_range * 0.9, dt);
        return None;
    }
    if *heal_in <= 0.0 {
        face(tc, ctx.actor, patient_pos);
        let resolver = tc.env.resolver;
        resolver.resolve_heal(&mut tc.combat(), ctx.actor, patient, power);
        *heal_in = tuning.support_heal_interval;
    }
    None
}

// ============================================================================
// Channels
// ============================================================================

/// Advances a channel. Returns true once it completes.
fn channel(state: &mut BehaviorState, dt: f32) -> bool {
    match state {
        BehaviorState::Channel { remaining } => {
            *remaining -= dt;
            *remaining <= 0.0
        },
        _ => true,
    }
}

pub(super) fn enter_taunt(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    let tuning = tc.env.tuning;
    buff_self(ctx, tc, &[Buff::permanent(BuffSource::Taunt, Stat::Armor, tuning.taunt_armor_multiplier)]);
    shout(ctx, tc, "*roars*");
    BehaviorState::Channel {
        remaining: tuning.taunt_channel,
    }
}

pub(super) fn update_taunt(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    if !channel(state, dt) {
        return None;
    }
    let tuning = tc.env.tuning;
    let victim = match ctx.target {
        Some(t) => tc.env.actors.get_mut(t).filter(|a| a.is_alive()),
        None => None,
    };
    if let Some(victim) = victim {
        victim.add_buff(Buff::timed(
            BuffSource::Intimidated,
            Stat::AttackPower,
            tuning.taunt_debuff_factor,
            tuning.taunt_debuff_duration,
        ));
        let position = victim.position;
        tc.env.events.combat_text("Intimidated", TextCategory::Speech, position);
    }
    Some(Transition::Pop)
}

pub(super) fn enter_summon(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    let tuning = tc.env.tuning;
    shout(ctx, tc, "Come forth!");
    BehaviorState::Channel {
        remaining: tuning.summon_cast_time,
    }
}

pub(super) fn update_summon(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    if !channel(state, dt) {
        return None;
    }
    if ctx.summon_charges > 0 {
        if let Some(position) = position_of(tc, ctx.actor) {
            tc.outbox.summons.push(SummonRequest {
                summoner: ctx.actor,
                archetype: ctx.summon_archetype.clone(),
                count: tc.env.tuning.summon_count,
                position,
                target: ctx.target,
            });
            ctx.summon_charges -= 1;
        }
    }
    Some(Transition::Pop)
}

pub(super) fn enter_teleport(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    let fade = tc.env.tuning.teleport_fade;
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        a.visible = false;
    }
    BehaviorState::Channel { remaining: fade }
}

pub(super) fn update_teleport(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    if !channel(state, dt) {
        return None;
    }
    let Some(target_pos) = ctx.target.and_then(|t| position_of(tc, t)) else {
        return Some(Transition::Pop);
    };
    let distance = tc.env.tuning.teleport_distance;
    let angle = tc.env.rng.angle();
    let mut dest = point_on_circle(target_pos, distance, angle);
    dest.y = tc.env.terrain.height_at(dest.x, dest.z);
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        a.position = dest;
    }
    face(tc, ctx.actor, target_pos);
    ctx.last_known_target_pos = Some(target_pos);
    Some(Transition::Pop)
}
