//! One-way presentation events.
//!
//! The core publishes floating combat text and notifications here; the
//! rendering/HUD side drains them. Nothing is ever read back.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use warband_common::Vec3;

/// Kind of floating combat text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextCategory {
    /// Regular damage number
    Damage,
    /// Critical damage number
    CriticalDamage,
    /// Healing number
    Heal,
    /// Miss
    Miss,
    /// Dodge
    Dodge,
    /// Parry
    Parry,
    /// Partial block
    Block,
    /// Damage over time tick
    Periodic,
    /// Speech bubble
    Speech,
}

/// Kind of HUD notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeCategory {
    /// Kill / loot messages
    Combat,
    /// Loot received
    Loot,
    /// Elite or rare spawned nearby
    Spawn,
    /// Duel start and result
    Duel,
}

/// Event sent to the presentation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PresentationEvent {
    /// Floating text in the world
    CombatText {
        /// Text to display
        text: String,
        /// Styling category
        category: TextCategory,
        /// World position
        position: Vec3,
    },
    /// HUD notification
    Notification {
        /// Message
        message: String,
        /// Styling category
        category: NoticeCategory,
    },
}

/// Bounded channel of presentation events.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<PresentationEvent>,
    receiver: Receiver<PresentationEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: PresentationEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Publishes floating combat text.
    pub fn combat_text(&self, text: impl Into<String>, category: TextCategory, position: Vec3) {
        self.publish(PresentationEvent::CombatText {
            text: text.into(),
            category,
            position,
        });
    }

    /// Publishes a HUD notification.
    pub fn notify(&self, message: impl Into<String>, category: NoticeCategory) {
        self.publish(PresentationEvent::Notification {
            message: message.into(),
            category,
        });
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<PresentationEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<PresentationEvent> {
        self.sender.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        bus.combat_text("42", TextCategory::Damage, Vec3::ZERO);
        bus.notify("Wolf slain", NoticeCategory::Combat);
        assert_eq!(bus.pending_count(), 2);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PresentationEvent::CombatText { .. }));
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_without_blocking() {
        let bus = EventBus::new(2);
        for i in 0..5 {
            bus.notify(format!("n{i}"), NoticeCategory::Loot);
        }
        assert_eq!(bus.pending_count(), 2);
        assert_eq!(bus.capacity(), 2);
    }
}
