//! Hostile AI: named behaviors driven by a per-actor state machine.
//!
//! Each behavior is a variant of [`BehaviorKind`] with three hooks (`enter`,
//! `update`, `exit`) dispatched by `match`. Behaviors keep no state of their
//! own; per-activation scratch data lives in the [`BehaviorState`] of the
//! frame on the actor's [`AIContext`] stack, and `update` answers with an
//! optional [`Transition`].

mod assault;
mod context;
mod engine;
mod movement;
mod stances;
mod steering;
mod tactics;

pub use context::{AIContext, BehaviorFrame, PackRole};
pub use engine::{AiEnv, AiOutbox, BehaviorEngine, SummonRequest, TickContext};
pub(crate) use movement::square_loop;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use warband_common::Vec3;

use crate::error::{SimError, SimResult};

/// Every registered behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// Stand still, re-orient, start patrolling after a while
    Idle,
    /// Walk a waypoint loop
    Patrol,
    /// Run to the target's last known position
    Chase,
    /// Melee the target with special abilities
    Attack,
    /// Run away from threats
    Flee,
    /// Evade back to the home position
    ReturnHome,
    /// Hold a post
    Guard,
    /// Hide until a threat comes close
    Ambush,
    /// Coordinated pack attack
    PackHunt,
    /// Ranged attack while keeping distance
    Kite,
    /// Low-health frenzy
    Berserk,
    /// Low-health shield stance
    Defensive,
    /// Heal wounded allies
    Support,
    /// Channel a taunting roar
    Taunt,
    /// Channel a summon
    Summon,
    /// Fade and reappear near the target
    Teleport,
}

impl BehaviorKind {
    /// All behaviors.
    pub const ALL: [Self; 16] = [
        Self::Idle,
        Self::Patrol,
        Self::Chase,
        Self::Attack,
        Self::Flee,
        Self::ReturnHome,
        Self::Guard,
        Self::Ambush,
        Self::PackHunt,
        Self::Kite,
        Self::Berserk,
        Self::Defensive,
        Self::Support,
        Self::Taunt,
        Self::Summon,
        Self::Teleport,
    ];

    /// Registry name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Patrol => "patrol",
            Self::Chase => "chase",
            Self::Attack => "attack",
            Self::Flee => "flee",
            Self::ReturnHome => "return_home",
            Self::Guard => "guard",
            Self::Ambush => "ambush",
            Self::PackHunt => "pack_hunt",
            Self::Kite => "kite",
            Self::Berserk => "berserk",
            Self::Defensive => "defensive",
            Self::Support => "support",
            Self::Taunt => "taunt",
            Self::Summon => "summon",
            Self::Teleport => "teleport",
        }
    }

    /// Whether the aggro scan may pull the actor into combat from this behavior.
    #[must_use]
    pub const fn accepts_aggro(self) -> bool {
        !matches!(
            self,
            Self::ReturnHome | Self::Ambush | Self::Guard | Self::Flee
        )
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Answer of a behavior's `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Replace the active behavior
    Switch(BehaviorKind),
    /// Suspend the active behavior and run another on top
    Push(BehaviorKind),
    /// Finish the active behavior and resume the one below
    Pop,
    /// Replace the active behavior with one looked up by name
    Named(String),
}

/// Name to behavior lookup, built once at startup.
#[derive(Debug, Clone)]
pub struct BehaviorRegistry {
    by_name: AHashMap<String, BehaviorKind>,
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl BehaviorRegistry {
    /// Registry with every built-in behavior under its canonical name.
    #[must_use]
    pub fn standard() -> Self {
        let by_name = BehaviorKind::ALL
            .iter()
            .map(|kind| (kind.name().to_string(), *kind))
            .collect();
        Self { by_name }
    }

    /// Adds an alias for a behavior (content-friendly names).
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, kind: BehaviorKind) -> Self {
        self.by_name.insert(alias.into(), kind);
        self
    }

    /// Looks up a behavior by name.
    pub fn resolve(&self, name: &str) -> SimResult<BehaviorKind> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SimError::BehaviorNotRegistered(name.to_string()))
    }

    /// Checks if a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Checks if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Per-activation scratch state of a behavior.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BehaviorState {
    /// No scratch state
    #[default]
    Empty,
    /// Idle timers
    Idle {
        /// Seconds spent idle
        timer: f32,
        /// Seconds until the next re-orientation
        reorient_in: f32,
    },
    /// Patrol progress
    Patrol {
        /// Current waypoint
        index: usize,
        /// Seconds left waiting at the waypoint
        dwell: f32,
    },
    /// Chase progress
    Chase {
        /// Seconds without sight of the target
        lost_for: f32,
    },
    /// Flee progress
    Flee {
        /// Seconds spent fleeing
        elapsed: f32,
        /// Seconds until the heading is recomputed
        reevaluate_in: f32,
        /// Current ground-plane heading
        heading: Vec3,
    },
    /// Ambush countdown
    Ambush {
        /// Seconds until springing (None = still waiting)
        spring_in: Option<f32>,
    },
    /// Timed stance
    Stance {
        /// Seconds left
        remaining: f32,
    },
    /// Heal cadence
    Support {
        /// Seconds until the next heal
        heal_in: f32,
    },
    /// Cast-bar style channel (taunt, summon, teleport)
    Channel {
        /// Seconds left
        remaining: f32,
    },
}

pub(crate) fn enter(kind: BehaviorKind, ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) -> BehaviorState {
    match kind {
        BehaviorKind::Idle => movement::enter_idle(tc),
        BehaviorKind::Patrol => movement::enter_patrol(ctx, tc),
        BehaviorKind::Chase => BehaviorState::Chase { lost_for: 0.0 },
        BehaviorKind::Flee => movement::enter_flee(ctx, tc),
        BehaviorKind::ReturnHome => movement::enter_return_home(ctx, tc),
        BehaviorKind::Attack | BehaviorKind::Kite | BehaviorKind::Guard => BehaviorState::Empty,
        BehaviorKind::Ambush => tactics::enter_ambush(ctx, tc),
        BehaviorKind::PackHunt => BehaviorState::Empty,
        BehaviorKind::Berserk => stances::enter_berserk(ctx, tc),
        BehaviorKind::Defensive => stances::enter_defensive(ctx, tc),
        BehaviorKind::Support => stances::enter_support(ctx, tc),
        BehaviorKind::Taunt => stances::enter_taunt(ctx, tc),
        BehaviorKind::Summon => stances::enter_summon(ctx, tc),
        BehaviorKind::Teleport => stances::enter_teleport(ctx, tc),
    }
}

pub(crate) fn update(
    kind: BehaviorKind,
    ctx: &mut AIContext,
    state: &mut BehaviorState,
    tc: &mut TickContext<'_, '_>,
    dt: f32,
) -> Option<Transition> {
    match kind {
        BehaviorKind::Idle => movement::update_idle(ctx, state, tc, dt),
        BehaviorKind::Patrol => movement::update_patrol(ctx, state, tc, dt),
        BehaviorKind::Chase => movement::update_chase(ctx, state, tc, dt),
        BehaviorKind::Flee => movement::update_flee(ctx, state, tc, dt),
        BehaviorKind::ReturnHome => movement::update_return_home(ctx, tc, dt),
        BehaviorKind::Attack => assault::update_attack(ctx, tc, dt),
        BehaviorKind::Kite => assault::update_kite(ctx, tc, dt),
        BehaviorKind::Guard => tactics::update_guard(ctx, tc, dt),
        BehaviorKind::Ambush => tactics::update_ambush(ctx, state, tc, dt),
        BehaviorKind::PackHunt => tactics::update_pack_hunt(ctx, tc, dt),
        BehaviorKind::Berserk => stances::update_berserk(ctx, tc, dt),
        BehaviorKind::Defensive => stances::update_defensive(ctx, state, tc, dt),
        BehaviorKind::Support => stances::update_support(ctx, state, tc, dt),
        BehaviorKind::Taunt => stances::update_taunt(ctx, state, tc, dt),
        BehaviorKind::Summon => stances::update_summon(ctx, state, tc, dt),
        BehaviorKind::Teleport => stances::update_teleport(ctx, state, tc, dt),
    }
}

pub(crate) fn exit(kind: BehaviorKind, ctx: &mut AIContext, tc: &mut TickContext<'_, '_>) {
    match kind {
        BehaviorKind::Flee => movement::exit_flee(ctx, tc),
        BehaviorKind::Ambush | BehaviorKind::Teleport => steering::reveal(ctx, tc),
        BehaviorKind::PackHunt => ctx.pack_role = None,
        BehaviorKind::Berserk
        | BehaviorKind::Defensive
        | BehaviorKind::Support
        | BehaviorKind::Taunt => stances::exit_stance(kind, ctx, tc),
        _ => {},
    }
}
