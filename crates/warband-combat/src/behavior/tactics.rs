//! Guard posts, ambushes and pack hunting.

use warband_common::{perpendicular, planar_direction, planar_distance, ActorId, Vec3};

use super::assault::{swing_with_on_hit, try_ability};
use super::steering::{face, move_toward, nearest_threat, position_of, reveal};
use super::{AIContext, BehaviorState, PackRole, TickContext, Transition};

fn reach_of(tc: &TickContext<'_, '_>, actor: ActorId) -> f32 {
    tc.env
        .actors
        .get(actor)
        .map_or(0.0, |a| a.attack_range + a.collision_radius)
}

pub(super) fn update_guard(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> Option<Transition> {
    let tuning = tc.env.tuning;
    let my_pos = position_of(tc, ctx.actor)?;

    let radius = ctx.guard_radius_or(tuning);

    if ctx.target.is_none() {
        let intruder = nearest_threat(tc, ctx.actor, ctx.aggro_range.max(radius))
            .filter(|id| position_of(tc, *id).is_some_and(|p| planar_distance(p, ctx.home) <= radius));
        if let Some(intruder) = intruder {
            ctx.mark_engaged(intruder, tc);
        }
    }

    if let Some(target) = ctx.target {
        let target_pos = position_of(tc, target);
        let in_post = target_pos.is_some_and(|p| planar_distance(p, ctx.home) <= radius);
        let within_limit = planar_distance(my_pos, ctx.home) <= tuning.guard_chase_limit;
        match target_pos {
            Some(pos) if in_post && within_limit => {
                let reach = reach_of(tc, ctx.actor);
                move_toward(tc, ctx.actor, pos, reach * 0.9, dt);
                face(tc, ctx.actor, pos);
                ctx.last_known_target_pos = Some(pos);
                if let Some(transition) = try_ability(ctx, tc) {
                    return Some(transition);
                }
                swing_with_on_hit(ctx, tc, dt);
                return None;
            },
            _ => {
                ctx.target = None;
                ctx.last_known_target_pos = None;
                tc.env.threat.clear(ctx.actor);
            },
        }
    }

    let home = ctx.home;
    move_toward(tc, ctx.actor, home, tuning.home_tolerance, dt);
    None
}

pub(super) fn enter_ambush(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        a.visible = false;
    }
    BehaviorState::Ambush { spring_in: None }
}

pub(super) fn update_ambush(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    let BehaviorState::Ambush { spring_in } = state else {
        *state = enter_ambush(ctx, tc);
        return None;
    };

    match spring_in {
        None => {
            let provoked = tc
                .env
                .threat
                .current_target(ctx.actor)
                .filter(|t| tc.env.actors.is_alive(*t));
            let victim = provoked.or_else(|| nearest_threat(tc, ctx.actor, ctx.ambush_trigger_radius));
            if let Some(victim) = victim {
                ctx.target = Some(victim);
                *spring_in = Some(tc.env.tuning.ambush_delay);
            }
            None
        },
        Some(remaining) => {
            *remaining -= dt;
            if *remaining > 0.0 {
                return None;
            }
            let Some(target) = ctx.target.filter(|t| tc.env.actors.is_alive(*t)) else {
                ctx.target = None;
                *spring_in = None;
                return None;
            };
            reveal(ctx, tc);
            ctx.mark_engaged(target, tc);
            Some(Transition::Named(ctx.combat_behavior.clone()))
        },
    }
}

/// Living pack members within pack radius, with their current roles.
fn pack_roles(ctx: &AIContext, tc: &TickContext<'_, '_>, center: Vec3) -> Vec<(ActorId, Option<PackRole>)> {
    let radius = tc.env.tuning.pack_radius;
    let mut members: Vec<(ActorId, Option<PackRole>)> = ctx
        .pack
        .iter()
        .copied()
        .filter(|id| position_of(tc, *id).is_some_and(|p| planar_distance(p, center) <= radius))
        .map(|id| (id, tc.peers.get(&id).and_then(|p| p.pack_role)))
        .collect();
    members.sort_unstable_by_key(|(id, _)| *id);
    members
}

fn assign_role(ctx: &mut AIContext, tc: &TickContext<'_, '_>, members: &[(ActorId, Option<PackRole>)]) -> PackRole {
    let has_alpha = members.iter().any(|(_, r)| *r == Some(PackRole::Alpha));
    let role = match ctx.pack_role {
        Some(PackRole::Alpha) => PackRole::Alpha,
        Some(_) | None if !has_alpha => PackRole::Alpha,
        Some(role) => role,
        None => {
            let flankers = members.iter().filter(|(_, r)| *r == Some(PackRole::Flanker)).count();
            if flankers < tc.env.tuning.max_flankers {
                PackRole::Flanker
            } else {
                PackRole::Support
            }
        },
    };
    ctx.pack_role = Some(role);
    role
}

pub(super) fn update_pack_hunt(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> Option<Transition> {
    let Some(target) = ctx.target.filter(|t| tc.env.actors.is_alive(*t)) else {
        return Some(ctx.disengage(tc));
    };
    let tuning = tc.env.tuning;
    let my_pos = position_of(tc, ctx.actor)?;
    let target_pos = position_of(tc, target)?;
    let members = pack_roles(ctx, tc, my_pos);
    let role = assign_role(ctx, tc, &members);
    let reach = reach_of(tc, ctx.actor);

    let alpha_pos = members
        .iter()
        .find(|(_, r)| *r == Some(PackRole::Alpha))
        .and_then(|(id, _)| position_of(tc, *id));

    match (role, alpha_pos) {
        (PackRole::Flanker, Some(alpha)) => {
            if planar_distance(my_pos, target_pos) <= tuning.flank_distance + 0.5 {
                move_toward(tc, ctx.actor, target_pos, reach * 0.9, dt);
            } else {
                let side = if ctx.actor.raw() % 2 == 0 { 1.0 } else { -1.0 };
                let dir = planar_direction(alpha, target_pos);
                let point = target_pos + perpendicular(dir) * tuning.flank_distance * side;
                move_toward(tc, ctx.actor, point, tuning.waypoint_tolerance, dt);
            }
        },
        (PackRole::Support, Some(alpha)) => {
            let dir = planar_direction(alpha, target_pos);
            let hold = alpha - dir * tuning.support_distance;
            move_toward(tc, ctx.actor, hold, tuning.waypoint_tolerance, dt);
        },
        _ => {
            move_toward(tc, ctx.actor, target_pos, reach * 0.9, dt);
        },
    }
    face(tc, ctx.actor, target_pos);
    ctx.last_known_target_pos = Some(target_pos);

    if let Some(transition) = try_ability(ctx, tc) {
        return Some(transition);
    }
    swing_with_on_hit(ctx, tc, dt);
    None
}
