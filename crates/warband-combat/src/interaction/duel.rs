//! One-on-one duels started by the challenge interaction.
//!
//! A duel buffs the challenger and suppresses the aggro range of the
//! challenger's allies nearby so they stay out of it. The suppression is
//! undone exactly once, either when the window elapses or when a duelist dies.
//! Allies caught in several duels at once are tracked in [`AggroSuppression`]
//! so the range they get back is the one they had before the first duel.

use ahash::AHashMap;
use tracing::{debug, info};
use warband_common::ActorId;

use super::InteractionScope;
use crate::actor::{Buff, BuffSource, Stat};
use crate::behavior::BehaviorEngine;
use crate::config::InteractionTuning;
use crate::events::NoticeCategory;

/// Aggro ranges held down by running duels.
///
/// Each ally keeps its pre-duel range and the number of duels holding it.
/// The range is scaled when the first hold is taken and restored when the
/// last one is released.
#[derive(Debug, Default)]
pub struct AggroSuppression {
    held: AHashMap<ActorId, (f32, u32)>,
}

impl AggroSuppression {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggro range an ally had before the first duel held it.
    #[must_use]
    pub fn original_range(&self, ally: ActorId) -> Option<f32> {
        self.held.get(&ally).map(|(range, _)| *range)
    }

    /// Number of duels holding an ally's aggro down.
    #[must_use]
    pub fn holds(&self, ally: ActorId) -> u32 {
        self.held.get(&ally).map_or(0, |(_, count)| *count)
    }

    fn hold(&mut self, ally: ActorId, factor: f32, ai: &mut BehaviorEngine) -> bool {
        let Some(ctx) = ai.context_mut(ally) else {
            return false;
        };
        let entry = self.held.entry(ally).or_insert((ctx.aggro_range, 0));
        if entry.1 == 0 {
            ctx.aggro_range = entry.0 * factor;
        }
        entry.1 += 1;
        true
    }

    fn release(&mut self, ally: ActorId, ai: &mut BehaviorEngine) {
        let Some(entry) = self.held.get_mut(&ally) else {
            return;
        };
        entry.1 = entry.1.saturating_sub(1);
        if entry.1 > 0 {
            debug!("{ally} still held by {} duel(s)", entry.1);
            return;
        }
        let original = entry.0;
        self.held.remove(&ally);
        if let Some(ctx) = ai.context_mut(ally) {
            ctx.aggro_range = original;
        }
    }
}

/// State of a running duel.
#[derive(Debug, Clone, PartialEq)]
pub struct Duel {
    /// Actor that issued the challenge
    pub challenger: ActorId,
    /// Actor that was challenged
    pub opponent: ActorId,
    suppressed: Vec<ActorId>,
    resolved: bool,
}

impl Duel {
    pub(super) fn begin(
        challenger: ActorId,
        opponent: ActorId,
        tuning: &InteractionTuning,
        aggro: &mut AggroSuppression,
        scope: &mut InteractionScope<'_>,
    ) -> Self {
        let mut suppressed = Vec::new();
        if let Some(actor) = scope.actors.get_mut(challenger) {
            actor.add_buff(Buff::timed(
                BuffSource::Duel,
                Stat::AttackPower,
                tuning.duel_factor,
                tuning.duel_duration,
            ));
        }
        for ally in super::allies_near(scope, challenger, tuning.duel_radius) {
            if aggro.hold(ally, tuning.aggro_suppression, scope.ai) {
                suppressed.push(ally);
            }
        }

        let names = (
            scope.actors.get(challenger).map(|a| a.name.clone()).unwrap_or_default(),
            scope.actors.get(opponent).map(|a| a.name.clone()).unwrap_or_default(),
        );
        scope
            .events
            .notify(format!("{} challenges {} to a duel!", names.0, names.1), NoticeCategory::Duel);

        Self {
            challenger,
            opponent,
            suppressed,
            resolved: false,
        }
    }

    /// Checks if an actor is one of the duelists.
    #[must_use]
    pub fn involves(&self, actor: ActorId) -> bool {
        self.challenger == actor || self.opponent == actor
    }

    /// Allies whose aggro this duel holds down.
    #[must_use]
    pub fn suppressed(&self) -> &[ActorId] {
        &self.suppressed
    }

    /// Checks if the duel already ended.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Checks if either duelist is dead or gone.
    pub(super) fn has_casualty(&self, scope: &InteractionScope<'_>) -> bool {
        !scope.actors.is_alive(self.challenger) || !scope.actors.is_alive(self.opponent)
    }

    /// Ends the duel: restores aggro, drops the challenger buff and crowns the
    /// winner. Returns the winner. Later calls do nothing.
    pub(super) fn end(
        &mut self,
        tuning: &InteractionTuning,
        aggro: &mut AggroSuppression,
        scope: &mut InteractionScope<'_>,
    ) -> Option<ActorId> {
        if self.resolved {
            return None;
        }
        self.resolved = true;

        for ally in std::mem::take(&mut self.suppressed) {
            aggro.release(ally, scope.ai);
        }
        if let Some(actor) = scope.actors.get_mut(self.challenger) {
            actor.remove_buffs_from(BuffSource::Duel);
        }

        let fraction = |id: ActorId| {
            scope
                .actors
                .get(id)
                .filter(|a| a.is_alive())
                .map(|a| a.health_fraction())
        };
        let winner = match (fraction(self.challenger), fraction(self.opponent)) {
            (Some(c), Some(o)) if o > c => Some(self.opponent),
            (Some(_), _) => Some(self.challenger),
            (None, Some(_)) => Some(self.opponent),
            (None, None) => None,
        }?;

        let actor = scope.actors.get_mut(winner)?;
        actor.add_buff(Buff::timed(
            BuffSource::Victory,
            Stat::AttackPower,
            tuning.victory_factor,
            tuning.victory_duration,
        ));
        let message = format!("{} wins the duel", actor.name);
        info!("{message}");
        scope.events.notify(message, NoticeCategory::Duel);
        Some(winner)
    }
}
