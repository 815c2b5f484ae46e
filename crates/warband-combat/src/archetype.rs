//! Enemy archetypes: stat templates plus AI profile.
//!
//! Archetypes are content. The stock catalog covers the default enemy roster;
//! additional tables can be loaded from RON:
//!
//! ```ron
//! [
//!     (id: "wolf", name: "Grey Wolf", faction: (2), level: 5, max_health: 80.0,
//!      combat_behavior: "pack_hunt", abilities: [(kind: Howl, chance: 0.15)]),
//! ]
//! ```

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use warband_common::{ArchetypeId, FactionId, Vec3};

use crate::actor::{ActorKind, CombatActor, DamageSchool};
use crate::error::{ConfigResult, SimError, SimResult};

/// Archetype-specific special abilities used from the attack behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Applies a nature damage-over-time effect on hit
    PoisonStrike,
    /// Buffs nearby allies' attack power
    Howl,
    /// Splashes damage onto enemies near the target
    Cleave,
    /// Enters berserk at low health
    Enrage,
    /// Enters the defensive stance at low health
    ShieldWall,
    /// Switches to healing wounded allies
    Mend,
    /// Channels a taunting roar
    WarCry,
    /// Channels a summon of reinforcements
    Summon,
    /// Fades out and reappears next to the target
    Blink,
}

impl AbilityKind {
    /// Magnitude used when an archetype does not specify one.
    ///
    /// Poison: damage per tick as a fraction of attack power. Howl: attack
    /// multiplier. Cleave: splash fraction. Others ignore it.
    #[must_use]
    pub const fn default_magnitude(self) -> f32 {
        match self {
            Self::PoisonStrike => 0.25,
            Self::Howl => 1.2,
            Self::Cleave => 0.6,
            _ => 1.0,
        }
    }
}

/// One ability entry of an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilitySpec {
    /// Ability
    pub kind: AbilityKind,
    /// Chance per eligible swing
    pub chance: f32,
    /// Kind-specific strength
    #[serde(default)]
    pub magnitude: Option<f32>,
}

impl AbilitySpec {
    /// Creates an ability entry with the default magnitude.
    #[must_use]
    pub const fn new(kind: AbilityKind, chance: f32) -> Self {
        Self {
            kind,
            chance,
            magnitude: None,
        }
    }

    /// Effective magnitude.
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.magnitude
            .unwrap_or_else(|| self.kind.default_magnitude())
    }
}

/// Stat and AI template for one enemy type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Archetype {
    /// Catalog key
    pub id: ArchetypeId,
    /// Display name
    pub name: String,
    /// Faction of spawned actors
    pub faction: FactionId,
    /// Level
    pub level: u32,
    /// Max health
    pub max_health: f32,
    /// Attack power
    pub attack_power: f32,
    /// Healing power
    pub healing_power: f32,
    /// Armor
    pub armor: f32,
    /// Resistances per school
    pub resistances: Vec<(DamageSchool, f32)>,
    /// Auto attack school
    pub damage_school: DamageSchool,
    /// Auto attack reach
    pub attack_range: f32,
    /// Seconds between auto attacks
    pub attack_interval: f32,
    /// Hit rating
    pub hit_rating: f32,
    /// Agility
    pub agility: f32,
    /// Dodge chance
    pub dodge_chance: f32,
    /// Parry chance
    pub parry_chance: f32,
    /// Block chance (a shield is equipped when > 0)
    pub block_chance: f32,
    /// Movement speed
    pub speed: f32,
    /// Body radius
    pub collision_radius: f32,
    /// Perception radius
    pub aggro_range: f32,
    /// Maximum pursuit distance from home
    pub leash_range: f32,
    /// Health fraction that triggers fleeing (0 = never)
    pub flee_health_fraction: f32,
    /// Behavior used once engaged
    pub combat_behavior: String,
    /// Behavior used out of combat
    pub default_behavior: String,
    /// Special abilities
    pub abilities: Vec<AbilitySpec>,
    /// Archetype spawned by the summon ability
    pub summon: Option<ArchetypeId>,
    /// Loot odds multiplier
    pub loot_multiplier: f32,
}

impl Default for Archetype {
    fn default() -> Self {
        Self {
            id: ArchetypeId::new("unknown"),
            name: "Unknown".to_string(),
            faction: FactionId::NEUTRAL,
            level: 1,
            max_health: 100.0,
            attack_power: 10.0,
            healing_power: 0.0,
            armor: 0.0,
            resistances: Vec::new(),
            damage_school: DamageSchool::Physical,
            attack_range: 2.0,
            attack_interval: 2.0,
            hit_rating: 0.0,
            agility: 0.0,
            dodge_chance: 0.05,
            parry_chance: 0.0,
            block_chance: 0.0,
            speed: 4.0,
            collision_radius: 0.5,
            aggro_range: 15.0,
            leash_range: 40.0,
            flee_health_fraction: 0.0,
            combat_behavior: "attack".to_string(),
            default_behavior: "idle".to_string(),
            abilities: Vec::new(),
            summon: None,
            loot_multiplier: 1.0,
        }
    }
}

impl Archetype {
    /// Creates an archetype with default stats.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, faction: FactionId) -> Self {
        Self {
            id: ArchetypeId::new(id),
            name: name.into(),
            faction,
            ..Default::default()
        }
    }

    /// Builds a hostile actor from this template.
    #[must_use]
    pub fn instantiate(&self, position: Vec3) -> CombatActor {
        let mut actor = CombatActor::new(ActorKind::Hostile, self.name.clone(), self.faction)
            .with_archetype(self.id.clone())
            .with_level(self.level)
            .with_health(self.max_health)
            .with_position(position)
            .with_attack_power(self.attack_power)
            .with_healing_power(self.healing_power)
            .with_armor(self.armor)
            .with_damage_school(self.damage_school)
            .with_attack(self.attack_range, self.attack_interval)
            .with_hit_rating(self.hit_rating)
            .with_agility(self.agility)
            .with_avoidance(self.dodge_chance, self.parry_chance)
            .with_speed(self.speed);
        if self.block_chance > 0.0 {
            actor = actor.with_shield(self.block_chance);
        }
        for &(school, value) in &self.resistances {
            actor = actor.with_resistance(school, value);
        }
        actor.collision_radius = self.collision_radius;
        actor.loot_multiplier = self.loot_multiplier;
        actor
    }
}

/// Lookup table of archetypes.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeCatalog {
    archetypes: AHashMap<ArchetypeId, Archetype>,
}

impl ArchetypeCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the stock enemy roster.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        for archetype in default_archetypes() {
            catalog.insert(archetype);
        }
        catalog
    }

    /// Parses a RON list of archetypes.
    pub fn from_ron_str(contents: &str) -> ConfigResult<Self> {
        let list: Vec<Archetype> = ron::from_str(contents)?;
        let mut catalog = Self::new();
        for archetype in list {
            catalog.insert(archetype);
        }
        Ok(catalog)
    }

    /// Loads a RON list of archetypes from a file.
    pub fn load_ron<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_ron_str(&contents)?;
        info!("Loaded {} archetypes from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Adds or replaces an archetype.
    pub fn insert(&mut self, archetype: Archetype) {
        self.archetypes.insert(archetype.id.clone(), archetype);
    }

    /// Merges another catalog into this one, replacing duplicates.
    pub fn extend(&mut self, other: Self) {
        self.archetypes.extend(other.archetypes);
    }

    /// Looks up an archetype.
    pub fn get(&self, id: &ArchetypeId) -> SimResult<&Archetype> {
        self.archetypes
            .get(id)
            .ok_or_else(|| SimError::ArchetypeNotFound(id.clone()))
    }

    /// Number of archetypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Checks if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }
}

fn default_archetypes() -> Vec<Archetype> {
    use AbilityKind::{Blink, Cleave, Enrage, Howl, Mend, PoisonStrike, ShieldWall, Summon, WarCry};

    vec![
        Archetype {
            level: 5,
            max_health: 80.0,
            attack_power: 9.0,
            armor: 50.0,
            attack_interval: 1.6,
            agility: 40.0,
            speed: 6.0,
            flee_health_fraction: 0.15,
            combat_behavior: "pack_hunt".to_string(),
            abilities: vec![AbilitySpec::new(Howl, 0.15)],
            ..Archetype::new("wolf", "Grey Wolf", FactionId::BEASTS)
        },
        Archetype {
            level: 8,
            max_health: 180.0,
            attack_power: 16.0,
            armor: 120.0,
            attack_interval: 1.8,
            agility: 60.0,
            speed: 6.5,
            collision_radius: 0.8,
            combat_behavior: "pack_hunt".to_string(),
            abilities: vec![AbilitySpec::new(Howl, 0.2), AbilitySpec::new(Enrage, 0.3)],
            ..Archetype::new("dire_wolf", "Dire Wolf", FactionId::BEASTS)
        },
        Archetype {
            level: 6,
            max_health: 120.0,
            attack_power: 12.0,
            armor: 150.0,
            parry_chance: 0.05,
            block_chance: 0.1,
            flee_health_fraction: 0.2,
            default_behavior: "patrol".to_string(),
            abilities: vec![AbilitySpec::new(ShieldWall, 0.25), AbilitySpec::new(WarCry, 0.1)],
            ..Archetype::new("bandit", "Bandit Cutthroat", FactionId::BANDITS)
        },
        Archetype {
            level: 6,
            max_health: 90.0,
            attack_power: 11.0,
            armor: 80.0,
            attack_range: 18.0,
            attack_interval: 2.2,
            aggro_range: 20.0,
            flee_health_fraction: 0.2,
            combat_behavior: "kite".to_string(),
            abilities: vec![AbilitySpec::new(PoisonStrike, 0.2)],
            ..Archetype::new("bandit_archer", "Bandit Archer", FactionId::BANDITS)
        },
        Archetype {
            level: 7,
            max_health: 110.0,
            attack_power: 13.0,
            armor: 200.0,
            resistances: vec![(DamageSchool::Shadow, 50.0), (DamageSchool::Frost, 25.0)],
            speed: 3.5,
            abilities: vec![AbilitySpec::new(Cleave, 0.2)],
            ..Archetype::new("skeleton", "Risen Skeleton", FactionId::UNDEAD)
        },
        Archetype {
            level: 8,
            max_health: 90.0,
            attack_power: 14.0,
            healing_power: 25.0,
            damage_school: DamageSchool::Shadow,
            attack_range: 15.0,
            attack_interval: 2.5,
            flee_health_fraction: 0.15,
            combat_behavior: "kite".to_string(),
            abilities: vec![AbilitySpec::new(Mend, 0.3), AbilitySpec::new(Summon, 0.15)],
            summon: Some(ArchetypeId::new("imp")),
            ..Archetype::new("cultist", "Ashen Cultist", FactionId::UNDEAD)
        },
        Archetype {
            level: 10,
            max_health: 400.0,
            attack_power: 30.0,
            armor: 250.0,
            attack_range: 3.0,
            attack_interval: 3.0,
            speed: 3.5,
            collision_radius: 1.2,
            dodge_chance: 0.0,
            leash_range: 30.0,
            abilities: vec![
                AbilitySpec::new(Cleave, 0.3),
                AbilitySpec::new(Enrage, 0.4),
                AbilitySpec::new(WarCry, 0.1),
            ],
            loot_multiplier: 1.5,
            ..Archetype::new("ogre", "Hill Ogre", FactionId::BEASTS)
        },
        Archetype {
            level: 5,
            max_health: 50.0,
            attack_power: 8.0,
            damage_school: DamageSchool::Fire,
            resistances: vec![(DamageSchool::Fire, 100.0)],
            attack_range: 12.0,
            attack_interval: 1.8,
            speed: 5.0,
            flee_health_fraction: 0.1,
            combat_behavior: "kite".to_string(),
            abilities: vec![AbilitySpec::new(Blink, 0.2)],
            loot_multiplier: 0.5,
            ..Archetype::new("imp", "Fire Imp", FactionId::UNDEAD)
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = ArchetypeCatalog::with_defaults();
        assert_eq!(catalog.len(), 8);
        let wolf = catalog.get(&ArchetypeId::new("wolf")).expect("wolf exists");
        assert_eq!(wolf.combat_behavior, "pack_hunt");
        assert!(catalog.get(&ArchetypeId::new("dragon")).is_err());
    }

    #[test]
    fn test_instantiate_copies_stats() {
        let catalog = ArchetypeCatalog::with_defaults();
        let bandit = catalog.get(&ArchetypeId::new("bandit")).expect("bandit exists");
        let actor = bandit.instantiate(Vec3::new(1.0, 0.0, 2.0));

        assert!(actor.is_hostile());
        assert_eq!(actor.level, 6);
        assert_eq!(actor.health(), 120.0);
        assert!(actor.has_shield);
        assert_eq!(actor.archetype, Some(ArchetypeId::new("bandit")));
        assert_eq!(actor.position, Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn test_load_from_ron() {
        let catalog = ArchetypeCatalog::from_ron_str(include_str!("../data/archetypes.ron"))
            .expect("valid archetype table");
        let ghoul = catalog.get(&ArchetypeId::new("ghoul")).expect("ghoul exists");
        assert_eq!(ghoul.faction, FactionId::UNDEAD);
        assert_eq!(ghoul.abilities[0].kind, AbilityKind::PoisonStrike);
        assert_eq!(ghoul.abilities[0].magnitude(), 0.4);
        // unspecified fields fall back to defaults
        assert_eq!(ghoul.leash_range, 40.0);
    }

    #[test]
    fn test_invalid_ron_is_error() {
        assert!(ArchetypeCatalog::from_ron_str("[ (id: 5) ]").is_err());
    }
}
