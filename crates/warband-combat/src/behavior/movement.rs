//! Idle, patrol, chase, flee and evade.

use warband_common::{planar_direction, planar_distance, Vec3};

use super::steering::{face, move_toward, position_of, threats_within};
use super::{AIContext, BehaviorKind, BehaviorState, TickContext, Transition};
use crate::actor::{Buff, BuffSource, Stat};

pub(super) fn enter_idle(tc: &mut TickContext<'_, '_>) -> BehaviorState {
    BehaviorState::Idle {
        timer: 0.0,
        reorient_in: tc.env.tuning.idle_reorient_interval,
    }
}

pub(super) fn update_idle(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    let BehaviorState::Idle { timer, reorient_in } = state else {
        *state = enter_idle(tc);
        return None;
    };
    *timer += dt;
    *reorient_in -= dt;
    if *reorient_in <= 0.0 {
        let yaw = tc.env.rng.angle();
        if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
            a.facing = yaw;
        }
        *reorient_in = tc.env.tuning.idle_reorient_interval;
    }
    if *timer >= tc.env.tuning.idle_timeout && !ctx.patrol_path.is_empty() {
        return Some(Transition::Switch(BehaviorKind::Patrol));
    }
    None
}

/// Square loop of half-size `size` around `center`.
pub(crate) fn square_loop(center: Vec3, size: f32) -> Vec<Vec3> {
    vec![
        center + Vec3::new(size, 0.0, size),
        center + Vec3::new(size, 0.0, -size),
        center + Vec3::new(-size, 0.0, -size),
        center + Vec3::new(-size, 0.0, size),
    ]
}

pub(super) fn enter_patrol(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    if ctx.patrol_path.is_empty() {
        ctx.patrol_path = square_loop(ctx.home, tc.env.tuning.default_patrol_size);
    }
    BehaviorState::Patrol { index: 0, dwell: 0.0 }
}

pub(super) fn update_patrol(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    let BehaviorState::Patrol { index, dwell } = state else {
        *state = enter_patrol(ctx, tc);
        return None;
    };
    if ctx.patrol_path.is_empty() {
        return Some(Transition::Switch(BehaviorKind::Idle));
    }
    if *dwell > 0.0 {
        *dwell -= dt;
        return None;
    }
    let tuning = tc.env.tuning;
    let waypoint = ctx.patrol_path[*index % ctx.patrol_path.len()];
    if move_toward(tc, ctx.actor, waypoint, tuning.waypoint_tolerance, dt) {
        *index = (*index + 1) % ctx.patrol_path.len();
        *dwell = tuning.patrol_dwell;
    }
    None
}

pub(super) fn update_chase(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    let Some(target) = ctx.target else {
        return Some(ctx.disengage(tc));
    };
    if !tc.env.actors.is_alive(target) {
        return Some(ctx.disengage(tc));
    }
    let BehaviorState::Chase { lost_for } = state else {
        *state = BehaviorState::Chase { lost_for: 0.0 };
        return None;
    };

    let me = tc.env.actors.get(ctx.actor)?;
    let them = tc.env.actors.get(target)?;
    let distance = planar_distance(me.position, them.position);
    let reach = me.attack_range + me.collision_radius;
    let pursuit = ctx.aggro_range * tc.env.tuning.pursuit_factor;
    let sighted = them.visible
        && distance <= pursuit
        && tc.env.terrain.has_line_of_sight(me.position, them.position);
    let target_pos = them.position;

    if sighted {
        *lost_for = 0.0;
        ctx.last_known_target_pos = Some(target_pos);
    } else {
        *lost_for += dt;
        if *lost_for > tc.env.tuning.chase_timeout {
            tc.env.threat.clear(ctx.actor);
            ctx.target = None;
            ctx.last_known_target_pos = None;
            return Some(Transition::Switch(BehaviorKind::Idle));
        }
    }

    if sighted && distance <= reach {
        return Some(Transition::Switch(BehaviorKind::Attack));
    }
    let dest = ctx.last_known_target_pos.unwrap_or(target_pos);
    move_toward(tc, ctx.actor, dest, reach * 0.9, dt);
    None
}

pub(super) fn enter_flee(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    let factor = tc.env.tuning.flee_speed_multiplier;
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        a.add_buff(Buff::permanent(BuffSource::Flee, Stat::MoveSpeed, factor));
    }
    BehaviorState::Flee {
        elapsed: 0.0,
        reevaluate_in: 0.0,
        heading: Vec3::ZERO,
    }
}

pub(super) fn update_flee(
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    let BehaviorState::Flee {
        elapsed,
        reevaluate_in,
        heading,
    } = state
    else {
        return Some(Transition::Pop);
    };
    let tuning = tc.env.tuning;
    let (position, fraction) = {
        let me = tc.env.actors.get(ctx.actor)?;
        (me.position, me.health_fraction())
    };

    if fraction > ctx.flee_recover_fraction(tuning) {
        return Some(Transition::Pop);
    }
    *elapsed += dt;
    if *elapsed >= tuning.flee_max_duration {
        ctx.flee_exhausted = true;
        return Some(Transition::Pop);
    }

    *reevaluate_in -= dt;
    if *reevaluate_in <= 0.0 {
        let threats: Vec<Vec3> = threats_within(tc, ctx.actor, ctx.aggro_range * tuning.flee_scan_factor)
            .into_iter()
            .filter_map(|id| position_of(tc, id))
            .collect();
        let away = if threats.is_empty() {
            Vec3::ZERO
        } else {
            let center = threats.iter().copied().sum::<Vec3>() / threats.len() as f32;
            planar_direction(center, position)
        };
        *heading = if away == Vec3::ZERO {
            planar_direction(position, ctx.home)
        } else {
            away
        };
        *reevaluate_in = tuning.flee_reevaluate_interval;
    }

    if *heading != Vec3::ZERO {
        let dest = position + *heading * 10.0;
        move_toward(tc, ctx.actor, dest, 0.0, dt);
    }
    None
}

pub(super) fn exit_flee(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) {
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        a.remove_buffs_from(BuffSource::Flee);
    }
}

pub(super) fn enter_return_home(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    ctx.target = None;
    ctx.last_known_target_pos = None;
    ctx.pack_role = None;
    tc.env.threat.clear(ctx.actor);
    BehaviorState::Empty
}

pub(super) fn update_return_home(ctx: &mut AIContext, tc: &mut TickContext<'_, '_>, dt: f32) -> Option<Transition> {
    let tolerance = tc.env.tuning.home_tolerance;
    if !move_toward(tc, ctx.actor, ctx.home, tolerance, dt) {
        return None;
    }
    if let Some(a) = tc.env.actors.get_mut(ctx.actor) {
        a.restore_full_health();
    }
    tc.env.threat.clear(ctx.actor);
    ctx.summon_charges = ctx.summon_charges.max(1);
    ctx.flee_exhausted = false;
    let home = ctx.home;
    face(tc, ctx.actor, home + Vec3::Z);
    Some(Transition::Named(ctx.default_behavior.clone()))
}
