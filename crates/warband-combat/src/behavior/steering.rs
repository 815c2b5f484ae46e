//! Shared movement, perception and melee helpers.

use warband_common::{planar_direction, planar_distance, yaw_toward, ActorId, Vec3};

use super::{AIContext, TickContext};
use crate::actor::{CombatActor, Stat};
use crate::combat::Outcome;

/// Moves an actor toward `dest`, stopping `stop_at` short. Returns true once there.
pub(super) fn move_toward(tc: &mut TickContext<'_, '_>, actor: ActorId, dest: Vec3, stop_at: f32, dt: f32) -> bool {
    let terrain = tc.env.terrain;
    let Some(a) = tc.env.actors.get_mut(actor) else {
        return false;
    };
    let distance = planar_distance(a.position, dest);
    if distance <= stop_at {
        return true;
    }
    let step = (a.effective_speed() * dt).max(0.0);
    let travel = step.min(distance - stop_at);
    let dir = planar_direction(a.position, dest);
    let mut next = a.position + dir * travel;
    next.y = terrain.height_at(next.x, next.z);
    if travel > 0.0 {
        a.facing = yaw_toward(a.position, dest);
    }
    a.position = next;
    distance - travel <= stop_at + 0.001
}

/// Turns an actor toward a point.
pub(super) fn face(tc: &mut TickContext<'_, '_>, actor: ActorId, point: Vec3) {
    if let Some(a) = tc.env.actors.get_mut(actor) {
        if planar_distance(a.position, point) > 0.001 {
            a.facing = yaw_toward(a.position, point);
        }
    }
}

/// Position of a living actor.
pub(super) fn position_of(tc: &TickContext<'_, '_>, actor: ActorId) -> Option<Vec3> {
    tc.env
        .actors
        .get(actor)
        .filter(|a| a.is_alive())
        .map(|a| a.position)
}

/// Distance between two living actors.
pub(super) fn distance_between(tc: &TickContext<'_, '_>, a: ActorId, b: ActorId) -> Option<f32> {
    Some(planar_distance(position_of(tc, a)?, position_of(tc, b)?))
}

/// Checks if `other` is a visible enemy in sight of `me`.
fn is_visible_enemy(tc: &TickContext<'_, '_>, me: &CombatActor, other: &CombatActor) -> bool {
    other.id != me.id
        && other.is_alive()
        && other.visible
        && tc.env.factions.is_hostile(me.faction, other.faction)
        && tc.env.terrain.has_line_of_sight(me.position, other.position)
}

/// Nearest visible enemy within `radius`, ties broken by id.
pub(crate) fn nearest_threat(tc: &TickContext<'_, '_>, actor: ActorId, radius: f32) -> Option<ActorId> {
    let me = tc.env.actors.get(actor)?;
    tc.env
        .actors
        .entities_in_radius(me.position, radius)
        .into_iter()
        .filter_map(|id| tc.env.actors.get(id))
        .filter(|other| is_visible_enemy(tc, me, other))
        .map(|other| (other.id, planar_distance(me.position, other.position)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(id, _)| id)
}

/// Visible enemies within `radius`, in id order.
pub(super) fn threats_within(tc: &TickContext<'_, '_>, actor: ActorId, radius: f32) -> Vec<ActorId> {
    let Some(me) = tc.env.actors.get(actor) else {
        return Vec::new();
    };
    tc.env
        .actors
        .entities_in_radius(me.position, radius)
        .into_iter()
        .filter(|id| {
            tc.env
                .actors
                .get(*id)
                .is_some_and(|other| is_visible_enemy(tc, me, other))
        })
        .collect()
}

/// Living allies (same or cooperating faction) within `radius` of `center`, excluding `actor`.
pub(crate) fn allies_within(tc: &TickContext<'_, '_>, actor: ActorId, center: Vec3, radius: f32) -> Vec<ActorId> {
    let Some(me) = tc.env.actors.get(actor) else {
        return Vec::new();
    };
    tc.env
        .actors
        .entities_in_radius(center, radius)
        .into_iter()
        .filter(|id| *id != actor)
        .filter(|id| {
            tc.env
                .actors
                .get(*id)
                .is_some_and(|other| tc.env.factions.is_allied(me.faction, other.faction))
        })
        .collect()
}

/// Counts down the swing timer and auto attacks the target when ready and in range.
pub(super) fn try_swing(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> Option<Outcome> {
    ctx.attack_timer -= dt;
    let target = ctx.target?;
    if ctx.attack_timer > 0.0 {
        return None;
    }
    let (power, school, range, interval) = {
        let me = tc.env.actors.get(ctx.actor)?;
        (
            me.effective(Stat::AttackPower),
            me.damage_school,
            me.attack_range + me.collision_radius,
            me.effective(Stat::AttackInterval),
        )
    };
    if distance_between(tc, ctx.actor, target)? > range {
        return None;
    }
    let resolver = tc.env.resolver;
    let outcome = resolver.resolve_attack(&mut tc.combat(), ctx.actor, target, power, school);
    ctx.attack_timer = interval.max(0.1);
    Some(outcome)
}

/// Makes a hidden actor visible again.
pub(super) fn reveal(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) {
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        a.visible = true;
    }
}
