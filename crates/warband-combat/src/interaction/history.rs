//! Per-actor record of recently fired interactions.

use std::collections::VecDeque;

use ahash::AHashMap;
use warband_common::ActorId;

/// One fired interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Interaction name
    pub name: String,
    /// Clock time it fired
    pub at: f32,
}

/// Bounded ring buffer of interactions per actor.
#[derive(Debug, Clone)]
pub struct InteractionHistory {
    capacity: usize,
    entries: AHashMap<ActorId, VecDeque<HistoryEntry>>,
}

impl InteractionHistory {
    /// Creates a history keeping `capacity` entries per actor.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: AHashMap::new(),
        }
    }

    /// Records an interaction, evicting the oldest entry when full.
    pub fn record(&mut self, actor: ActorId, name: &str, at: f32) {
        let ring = self.entries.entry(actor).or_default();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(HistoryEntry {
            name: name.to_string(),
            at,
        });
    }

    /// Checks if `actor` fired `name` within the last `window` seconds.
    #[must_use]
    pub fn has_recent(&self, actor: ActorId, name: &str, window: f32, now: f32) -> bool {
        self.entries.get(&actor).is_some_and(|ring| {
            ring.iter()
                .rev()
                .any(|e| e.name == name && now - e.at < window)
        })
    }

    /// Entries of an actor, oldest first.
    #[must_use]
    pub fn entries(&self, actor: ActorId) -> Vec<&HistoryEntry> {
        self.entries
            .get(&actor)
            .map(|ring| ring.iter().collect())
            .unwrap_or_default()
    }

    /// Forgets an actor.
    pub fn forget(&mut self, actor: ActorId) {
        self.entries.remove(&actor);
    }
}
