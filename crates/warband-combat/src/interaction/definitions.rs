//! Interaction kinds and the registry that names them.

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::config::InteractionTuning;
use crate::error::{SimError, SimResult};

/// Every flavor interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    /// Jeer at the current target
    Taunt,
    /// Buff allies fighting nearby
    Rally,
    /// Warn nearby allies of an engagement
    Alert,
    /// Pull nearby idle allies into the fight
    CallForHelp,
    /// Last words that spur allies on
    DeathRattle,
    /// Cry out at low health
    FleeWarning,
    /// Weaken the target's resolve
    Intimidate,
    /// Banter while fighting
    CombatDialogue,
    /// Banter out of combat
    IdleChatter,
    /// Pack alpha signals the pack to strike together
    CoordinatedAttack,
    /// Time-boxed one-on-one duel
    Challenge,
}

impl InteractionKind {
    /// All interactions.
    pub const ALL: [Self; 11] = [
        Self::Taunt,
        Self::Rally,
        Self::Alert,
        Self::CallForHelp,
        Self::DeathRattle,
        Self::FleeWarning,
        Self::Intimidate,
        Self::CombatDialogue,
        Self::IdleChatter,
        Self::CoordinatedAttack,
        Self::Challenge,
    ];

    /// Registry name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Taunt => "taunt",
            Self::Rally => "rally",
            Self::Alert => "alert",
            Self::CallForHelp => "call_for_help",
            Self::DeathRattle => "death_rattle",
            Self::FleeWarning => "flee_warning",
            Self::Intimidate => "intimidate",
            Self::CombatDialogue => "combat_dialogue",
            Self::IdleChatter => "idle_chatter",
            Self::CoordinatedAttack => "coordinated_attack",
            Self::Challenge => "challenge",
        }
    }

    /// Line spoken when the interaction fires.
    #[must_use]
    pub const fn line(self) -> &'static str {
        match self {
            Self::Taunt => "Is that all you've got?",
            Self::Rally => "Stand together!",
            Self::Alert => "Intruder!",
            Self::CallForHelp => "Help me!",
            Self::DeathRattle => "Avenge... me...",
            Self::FleeWarning => "I can't hold!",
            Self::Intimidate => "You will break.",
            Self::CombatDialogue => "Die!",
            Self::IdleChatter => "Quiet night...",
            Self::CoordinatedAttack => "Now, together!",
            Self::Challenge => "Face me alone!",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionDefinition {
    /// Name used by `trigger`
    pub name: String,
    /// Behavior of the interaction
    pub kind: InteractionKind,
    /// Per-actor cooldown window in seconds
    pub cooldown: f32,
    /// Tracked duration (0 = instant)
    pub duration: f32,
    /// Chance per scan (or per hook call)
    pub chance: f32,
    /// Radius used to gather affected actors
    pub radius: f32,
}

impl InteractionDefinition {
    /// Checks if firing creates a tracked instance.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.duration > 0.0
    }
}

/// Name-to-definition lookup. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct InteractionRegistry {
    definitions: AHashMap<String, InteractionDefinition>,
}

impl InteractionRegistry {
    /// The stock interactions with constants from `tuning`.
    #[must_use]
    pub fn standard(tuning: &InteractionTuning) -> Self {
        let t = tuning;
        let defs = [
            (InteractionKind::Taunt, t.combat_cooldown, 0.0, t.taunt_chance, 0.0),
            (InteractionKind::Rally, t.combat_cooldown, t.rally_duration, t.rally_chance, t.ally_radius),
            (InteractionKind::Alert, t.combat_cooldown, 0.0, t.alert_chance, t.help_radius),
            (InteractionKind::CallForHelp, t.combat_cooldown, 0.0, t.call_for_help_chance, t.help_radius),
            (InteractionKind::DeathRattle, 0.0, t.vengeance_duration, 1.0, t.ally_radius),
            (InteractionKind::FleeWarning, t.combat_cooldown, 0.0, t.flee_warning_chance, 0.0),
            (InteractionKind::Intimidate, t.combat_cooldown, t.intimidate_duration, t.intimidate_chance, 0.0),
            (InteractionKind::CombatDialogue, t.combat_cooldown, 0.0, t.combat_dialogue_chance, 0.0),
            (InteractionKind::IdleChatter, t.chatter_cooldown, 0.0, t.idle_chatter_chance, t.ally_radius),
            (
                InteractionKind::CoordinatedAttack,
                t.combat_cooldown,
                0.0,
                t.coordinated_attack_chance,
                t.ally_radius,
            ),
            (InteractionKind::Challenge, t.duel_duration, t.duel_duration, t.challenge_chance, t.duel_radius),
        ];
        let definitions = defs
            .into_iter()
            .map(|(kind, cooldown, duration, chance, radius)| {
                let def = InteractionDefinition {
                    name: kind.name().to_string(),
                    kind,
                    cooldown,
                    duration,
                    chance,
                    radius,
                };
                (def.name.clone(), def)
            })
            .collect();
        Self { definitions }
    }

    /// Looks up a definition by name.
    pub fn get(&self, name: &str) -> SimResult<&InteractionDefinition> {
        self.definitions
            .get(name)
            .ok_or_else(|| SimError::InteractionNotRegistered(name.to_string()))
    }

    /// Looks up the definition of a kind.
    #[must_use]
    pub fn of_kind(&self, kind: InteractionKind) -> Option<&InteractionDefinition> {
        self.definitions.get(kind.name())
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Checks if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for InteractionRegistry {
    fn default() -> Self {
        Self::standard(&InteractionTuning::default())
    }
}
