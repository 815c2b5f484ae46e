//! Threat ledger: who each hostile wants to hit.
//!
//! Every hostile keeps a table of accumulated threat per source. Threat
//! changes recompute a *pending* choice immediately, but the target the AI
//! reads is only republished by [`ThreatLedger::commit_targets`] at the start
//! of each tick, so selection always sees the ledger as it stood at tick
//! start.

use ahash::AHashMap;
use tracing::debug;
use warband_common::{ActorId, FactionId};

use crate::registry::ActorRegistry;

#[derive(Debug, Clone, Default)]
struct ThreatTable {
    entries: AHashMap<ActorId, f32>,
    current: Option<ActorId>,
    pending: Option<ActorId>,
}

impl ThreatTable {
    fn threat(&self, source: ActorId) -> f32 {
        self.entries.get(&source).copied().unwrap_or(0.0)
    }

    /// Highest threat wins; ties go to the lower id.
    fn best(&self) -> Option<(ActorId, f32)> {
        self.entries
            .iter()
            .map(|(&id, &threat)| (id, threat))
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }

    fn select(&self, margin: f32) -> Option<ActorId> {
        let (best, best_threat) = self.best()?;
        match self.current {
            Some(current) if self.entries.contains_key(&current) => {
                if best != current && best_threat > self.threat(current) * (1.0 + margin) {
                    Some(best)
                } else {
                    Some(current)
                }
            },
            _ => Some(best),
        }
    }
}

/// Per-hostile threat tables.
#[derive(Debug, Clone)]
pub struct ThreatLedger {
    tables: AHashMap<ActorId, ThreatTable>,
    switch_margin: f32,
}

impl Default for ThreatLedger {
    fn default() -> Self {
        Self::new(0.10)
    }
}

impl ThreatLedger {
    /// Creates a ledger with the given target-switch margin (0.10 = 10%).
    #[must_use]
    pub fn new(switch_margin: f32) -> Self {
        Self {
            tables: AHashMap::new(),
            switch_margin: switch_margin.max(0.0),
        }
    }

    /// Target-switch margin.
    #[must_use]
    pub const fn switch_margin(&self) -> f32 {
        self.switch_margin
    }

    /// Adds threat from `source` on `hostile`. Threat never drops below zero.
    pub fn add_threat(&mut self, hostile: ActorId, source: ActorId, amount: f32) {
        if hostile == source || !hostile.is_valid() || !source.is_valid() {
            return;
        }
        let margin = self.switch_margin;
        let table = self.tables.entry(hostile).or_default();
        let entry = table.entries.entry(source).or_insert(0.0);
        *entry = (*entry + amount).max(0.0);
        table.pending = table.select(margin);
    }

    /// Threat of `source` on `hostile`.
    #[must_use]
    pub fn threat_of(&self, hostile: ActorId, source: ActorId) -> f32 {
        self.tables
            .get(&hostile)
            .map_or(0.0, |table| table.threat(source))
    }

    /// Target published at the last commit.
    #[must_use]
    pub fn current_target(&self, hostile: ActorId) -> Option<ActorId> {
        self.tables.get(&hostile).and_then(|table| table.current)
    }

    /// Target that the next commit would publish, ignoring liveness.
    #[must_use]
    pub fn pending_target(&self, hostile: ActorId) -> Option<ActorId> {
        self.tables.get(&hostile).and_then(|table| table.pending)
    }

    /// Drops the whole table of a hostile (combat ended).
    pub fn clear(&mut self, hostile: ActorId) {
        if self.tables.remove(&hostile).is_some() {
            debug!("Threat cleared for {hostile}");
        }
    }

    /// Removes a source from every table.
    pub fn remove_source(&mut self, source: ActorId) {
        let margin = self.switch_margin;
        for table in self.tables.values_mut() {
            if table.entries.remove(&source).is_some() {
                if table.current == Some(source) {
                    table.current = None;
                }
                table.pending = table.select(margin);
            }
        }
        self.tables.retain(|_, table| !table.entries.is_empty());
    }

    /// Removes every trace of an actor, as hostile and as source.
    pub fn remove_actor(&mut self, id: ActorId) {
        self.tables.remove(&id);
        self.remove_source(id);
    }

    /// Checks if a hostile has any threat entries.
    #[must_use]
    pub fn in_combat(&self, hostile: ActorId) -> bool {
        self.tables
            .get(&hostile)
            .is_some_and(|table| !table.entries.is_empty())
    }

    /// Hostiles with a threat table, in id order.
    #[must_use]
    pub fn hostiles(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.tables.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sources on a hostile's table, in id order.
    #[must_use]
    pub fn sources(&self, hostile: ActorId) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .tables
            .get(&hostile)
            .map(|table| table.entries.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Hostiles in combat with any member of `faction`, in id order.
    #[must_use]
    pub fn engaged_with_faction(&self, faction: FactionId, actors: &ActorRegistry) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .tables
            .iter()
            .filter(|(_, table)| {
                table
                    .entries
                    .keys()
                    .any(|source| actors.get(*source).is_some_and(|a| a.faction == faction))
            })
            .map(|(&hostile, _)| hostile)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Purges stale entries and publishes targets for this tick.
    ///
    /// Tables of dead or missing hostiles are dropped, dead or missing sources
    /// are removed, and each target is re-selected with the switch margin.
    pub fn commit_targets(&mut self, actors: &ActorRegistry) {
        let margin = self.switch_margin;
        self.tables.retain(|&hostile, table| {
            if !actors.is_alive(hostile) {
                return false;
            }
            table.entries.retain(|&source, _| actors.is_alive(source));
            if table.current.is_some_and(|c| !table.entries.contains_key(&c)) {
                table.current = None;
            }
            let next = table.select(margin);
            if next != table.current {
                debug!("{hostile} switches target to {next:?}");
            }
            table.current = next;
            table.pending = next;
            !table.entries.is_empty()
        });
    }
}
