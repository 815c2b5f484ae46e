//! Simulation configuration.
//!
//! Every tunable constant of the combat core lives here, grouped per
//! subsystem. Configuration can be loaded from and saved to a TOML file;
//! missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::error::ConfigResult;

/// Configuration file name.
pub const CONFIG_FILE: &str = "warband.toml";

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// RNG seed (None = seeded from entropy)
    pub seed: Option<u64>,
    /// Capacity of the presentation event channel
    pub event_capacity: usize,
    /// Combat resolution constants
    pub combat: CombatTuning,
    /// Threat ledger constants
    pub threat: ThreatTuning,
    /// Behavior constants
    pub ai: AiTuning,
    /// Spawn director constants
    pub spawn: SpawnTuning,
    /// Interaction constants
    pub interaction: InteractionTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            event_capacity: 1024,
            combat: CombatTuning::default(),
            threat: ThreatTuning::default(),
            ai: AiTuning::default(),
            spawn: SpawnTuning::default(),
            interaction: InteractionTuning::default(),
        }
    }
}

impl SimConfig {
    /// Creates a default config with a fixed seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Parses a config from TOML text.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate();
        Ok(config)
    }

    /// Serializes the config to pretty TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads a config from a path, reporting any failure.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to load config file {}: {e}", path.display());
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = self.to_toml_string()?;
        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.event_capacity = self.event_capacity.max(16);

        let combat = &mut self.combat;
        combat.base_hit_chance = combat.base_hit_chance.clamp(0.0, 1.0);
        combat.min_hit_chance = combat.min_hit_chance.clamp(0.0, 1.0);
        combat.max_hit_chance = combat.max_hit_chance.clamp(combat.min_hit_chance, 1.0);
        combat.crit_multiplier = combat.crit_multiplier.max(1.0);
        combat.block_reduction = combat.block_reduction.clamp(0.0, 1.0);
        combat.dot_interval = combat.dot_interval.max(0.1);

        self.threat.switch_margin = self.threat.switch_margin.max(0.0);

        let ai = &mut self.ai;
        ai.flee_speed_multiplier = ai.flee_speed_multiplier.max(0.1);
        ai.flee_recover_fraction = ai.flee_recover_fraction.clamp(0.0, 1.0);
        ai.flee_recover_margin = ai.flee_recover_margin.clamp(0.01, 1.0);
        ai.ability_cooldown = ai.ability_cooldown.max(0.0);

        let spawn = &mut self.spawn;
        spawn.rare_spawn_chance = spawn.rare_spawn_chance.clamp(0.0, 1.0);
        spawn.despawn_distance = spawn.despawn_distance.max(1.0);

        let interaction = &mut self.interaction;
        interaction.history_len = interaction.history_len.max(1);
        interaction.aggro_suppression = interaction.aggro_suppression.clamp(0.0, 1.0);
    }
}

/// Combat resolution constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Hit chance between equal-level actors
    pub base_hit_chance: f32,
    /// Hit chance lost per level the defender is above the attacker
    pub level_hit_penalty: f32,
    /// Hit chance gained per point of hit rating
    pub hit_rating_coefficient: f32,
    /// Lower clamp for hit chance
    pub min_hit_chance: f32,
    /// Upper clamp for hit chance
    pub max_hit_chance: f32,
    /// Crit chance without agility
    pub base_crit_chance: f32,
    /// Crit chance gained per point of agility
    pub agility_crit_coefficient: f32,
    /// Damage multiplier on a critical strike
    pub crit_multiplier: f32,
    /// Healing multiplier on a critical heal
    pub crit_heal_multiplier: f32,
    /// Flat term of the armor mitigation denominator
    pub armor_constant: f32,
    /// Per-level term of the armor mitigation denominator
    pub armor_level_coefficient: f32,
    /// Flat term of the resistance mitigation denominator
    pub resistance_constant: f32,
    /// Fraction of damage removed by a successful block
    pub block_reduction: f32,
    /// Threat generated per point of damage
    pub threat_per_damage: f32,
    /// Threat generated per point of healing, before splitting
    pub healing_threat_factor: f32,
    /// Seconds between damage-over-time ticks
    pub dot_interval: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            base_hit_chance: 0.95,
            level_hit_penalty: 0.02,
            hit_rating_coefficient: 0.01,
            min_hit_chance: 0.01,
            max_hit_chance: 1.0,
            base_crit_chance: 0.05,
            agility_crit_coefficient: 0.0005,
            crit_multiplier: 2.0,
            crit_heal_multiplier: 2.0,
            armor_constant: 400.0,
            armor_level_coefficient: 85.0,
            resistance_constant: 100.0,
            block_reduction: 0.5,
            threat_per_damage: 1.0,
            healing_threat_factor: 0.5,
            dot_interval: 1.0,
        }
    }
}

/// Threat ledger constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatTuning {
    /// Fraction by which a challenger must out-threat the current target
    pub switch_margin: f32,
}

impl Default for ThreatTuning {
    fn default() -> Self {
        Self {
            switch_margin: 0.10,
        }
    }
}

/// Behavior constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Seconds idle before starting a patrol
    pub idle_timeout: f32,
    /// Seconds between idle re-orientations
    pub idle_reorient_interval: f32,
    /// Seconds spent at each patrol waypoint
    pub patrol_dwell: f32,
    /// Half-size of the generated default patrol square
    pub default_patrol_size: f32,
    /// Distance at which a waypoint counts as reached
    pub waypoint_tolerance: f32,
    /// Seconds a chase may lose its target before giving up
    pub chase_timeout: f32,
    /// Pursuit range as a multiple of aggro range
    pub pursuit_factor: f32,
    /// Extra range before an attacker falls back to chasing
    pub attack_leeway: f32,
    /// Move speed multiplier while fleeing
    pub flee_speed_multiplier: f32,
    /// Health fraction at which a fleeing actor returns to combat
    pub flee_recover_fraction: f32,
    /// Minimum gap between an actor's flee threshold and its recovery point
    pub flee_recover_margin: f32,
    /// Seconds between flee direction re-evaluations
    pub flee_reevaluate_interval: f32,
    /// Maximum seconds spent fleeing in one go
    pub flee_max_duration: f32,
    /// Threat scan radius while fleeing, as a multiple of aggro range
    pub flee_scan_factor: f32,
    /// Distance at which an actor counts as home
    pub home_tolerance: f32,
    /// Shared cooldown between special abilities
    pub ability_cooldown: f32,
    /// Health fraction that unlocks enrage
    pub berserk_health_fraction: f32,
    /// Health fraction that unlocks shield wall
    pub defensive_health_fraction: f32,
    /// Radius for pack role search
    pub pack_radius: f32,
    /// Maximum flankers per pack
    pub max_flankers: usize,
    /// Offset of flank points from the target
    pub flank_distance: f32,
    /// Stand-off distance of pack support from the alpha
    pub support_distance: f32,
    /// Seconds between an ambush trigger and the ambusher appearing
    pub ambush_delay: f32,
    /// Default guard radius around the post
    pub guard_radius: f32,
    /// Guards never chase farther than this from their post
    pub guard_chase_limit: f32,
    /// Kiters back away when closer than this
    pub kite_min_range: f32,
    /// Seconds a defensive stance lasts
    pub defensive_duration: f32,
    /// Radius in which support looks for wounded allies
    pub support_radius: f32,
    /// Allies below this health fraction get healed
    pub support_heal_threshold: f32,
    /// Seconds between support heals
    pub support_heal_interval: f32,
    /// Maximum healing range
    pub support_heal_range: f32,
    /// Seconds a taunt roar is channeled
    pub taunt_channel: f32,
    /// Seconds a summon is channeled
    pub summon_cast_time: f32,
    /// Reinforcements per summon
    pub summon_count: u32,
    /// Seconds a teleport fade lasts
    pub teleport_fade: f32,
    /// Distance from the target a teleport lands at
    pub teleport_distance: f32,
    /// Radius of ally-affecting abilities
    pub ability_radius: f32,
    /// Seconds a howl buff lasts
    pub howl_duration: f32,
    /// Radius around the target hit by a cleave
    pub cleave_radius: f32,
    /// Ticks of a poison strike
    pub poison_ticks: u32,
    /// Attack multiplier while berserk
    pub berserk_attack_multiplier: f32,
    /// Attack interval multiplier while berserk
    pub berserk_interval_multiplier: f32,
    /// Armor multiplier while berserk
    pub berserk_armor_multiplier: f32,
    /// Armor multiplier in the defensive stance
    pub defensive_armor_multiplier: f32,
    /// Attack multiplier in the defensive stance
    pub defensive_attack_multiplier: f32,
    /// Healing multiplier in the support stance
    pub support_healing_multiplier: f32,
    /// Armor multiplier while channeling a taunt
    pub taunt_armor_multiplier: f32,
    /// Attack multiplier applied to a taunted target
    pub taunt_debuff_factor: f32,
    /// Seconds the taunt debuff lasts
    pub taunt_debuff_duration: f32,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            idle_timeout: 8.0,
            idle_reorient_interval: 4.0,
            patrol_dwell: 2.0,
            default_patrol_size: 10.0,
            waypoint_tolerance: 0.5,
            chase_timeout: 5.0,
            pursuit_factor: 2.0,
            attack_leeway: 0.5,
            flee_speed_multiplier: 1.5,
            flee_recover_fraction: 0.5,
            flee_recover_margin: 0.1,
            flee_reevaluate_interval: 1.0,
            flee_max_duration: 10.0,
            flee_scan_factor: 1.5,
            home_tolerance: 1.0,
            ability_cooldown: 6.0,
            berserk_health_fraction: 0.3,
            defensive_health_fraction: 0.4,
            pack_radius: 20.0,
            max_flankers: 2,
            flank_distance: 3.0,
            support_distance: 5.0,
            ambush_delay: 0.5,
            guard_radius: 15.0,
            guard_chase_limit: 8.0,
            kite_min_range: 5.0,
            defensive_duration: 8.0,
            support_radius: 15.0,
            support_heal_threshold: 0.6,
            support_heal_interval: 2.5,
            support_heal_range: 10.0,
            taunt_channel: 1.5,
            summon_cast_time: 3.0,
            summon_count: 2,
            teleport_fade: 0.6,
            teleport_distance: 3.0,
            ability_radius: 15.0,
            howl_duration: 10.0,
            cleave_radius: 3.0,
            poison_ticks: 5,
            berserk_attack_multiplier: 1.5,
            berserk_interval_multiplier: 0.75,
            berserk_armor_multiplier: 0.7,
            defensive_armor_multiplier: 2.0,
            defensive_attack_multiplier: 0.6,
            support_healing_multiplier: 1.25,
            taunt_armor_multiplier: 1.25,
            taunt_debuff_factor: 0.85,
            taunt_debuff_duration: 6.0,
        }
    }
}

/// Spawn director constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnTuning {
    /// Definitions farther than this from the player are despawned
    pub despawn_distance: f32,
    /// Independent chance for each rare spawn attempt
    pub rare_spawn_chance: f32,
    /// Elite health multiplier
    pub elite_health_multiplier: f32,
    /// Elite attack multiplier
    pub elite_attack_multiplier: f32,
    /// Elite armor multiplier
    pub elite_armor_multiplier: f32,
    /// Escorts spawned with each elite
    pub elite_escort_count: u32,
    /// Radius of the escort formation
    pub elite_escort_radius: f32,
    /// Rare health multiplier
    pub rare_health_multiplier: f32,
    /// Rare attack multiplier
    pub rare_attack_multiplier: f32,
    /// Rare armor multiplier
    pub rare_armor_multiplier: f32,
    /// Rare loot odds multiplier
    pub rare_loot_multiplier: f32,
    /// Half-size of generated patrol loops
    pub patrol_loop_size: f32,
    /// Stat scale of summoned reinforcements
    pub summon_stat_scale: f32,
    /// Seconds before a summoned reinforcement is dismissed
    pub summon_lifetime: f32,
    /// Seconds a corpse stays in the registry
    pub corpse_lifetime: f32,
}

impl Default for SpawnTuning {
    fn default() -> Self {
        Self {
            despawn_distance: 150.0,
            rare_spawn_chance: 0.1,
            elite_health_multiplier: 3.0,
            elite_attack_multiplier: 1.5,
            elite_armor_multiplier: 1.5,
            elite_escort_count: 2,
            elite_escort_radius: 3.0,
            rare_health_multiplier: 5.0,
            rare_attack_multiplier: 2.0,
            rare_armor_multiplier: 2.0,
            rare_loot_multiplier: 2.0,
            patrol_loop_size: 12.0,
            summon_stat_scale: 0.5,
            summon_lifetime: 30.0,
            corpse_lifetime: 20.0,
        }
    }
}

/// Interaction constants.
///
/// Trigger rates are balancing knobs, not invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionTuning {
    /// Hostiles sampled by the per-tick scan
    pub sample_size: usize,
    /// Entries kept in each actor's interaction history
    pub history_len: usize,
    /// Radius used to find allies for social interactions
    pub ally_radius: f32,
    /// Radius of call-for-help
    pub help_radius: f32,
    /// Health fraction that triggers flee warnings
    pub flee_warning_health: f32,
    /// Health fraction that triggers calls for help
    pub call_for_help_health: f32,
    /// Chance per scan of a taunt
    pub taunt_chance: f32,
    /// Chance per scan of combat dialogue
    pub combat_dialogue_chance: f32,
    /// Chance per scan of a rally
    pub rally_chance: f32,
    /// Chance per scan of idle chatter
    pub idle_chatter_chance: f32,
    /// Chance per scan of a flee warning
    pub flee_warning_chance: f32,
    /// Chance per scan of a call for help
    pub call_for_help_chance: f32,
    /// Chance per scan of an intimidation
    pub intimidate_chance: f32,
    /// Chance per scan of a challenge
    pub challenge_chance: f32,
    /// Chance per scan of a coordinated attack
    pub coordinated_attack_chance: f32,
    /// Chance that an engagement alerts nearby allies
    pub alert_chance: f32,
    /// Per-actor cooldown for chatter-like interactions
    pub chatter_cooldown: f32,
    /// Per-actor cooldown for combat interactions
    pub combat_cooldown: f32,
    /// Seconds a rally buff lasts
    pub rally_duration: f32,
    /// Seconds an intimidation debuff lasts
    pub intimidate_duration: f32,
    /// Seconds a death-rattle vengeance buff lasts
    pub vengeance_duration: f32,
    /// Seconds a duel lasts
    pub duel_duration: f32,
    /// Allies inside this radius have their aggro suppressed during a duel
    pub duel_radius: f32,
    /// Aggro range multiplier applied to suppressed allies
    pub aggro_suppression: f32,
    /// Seconds the duel victory buff lasts
    pub victory_duration: f32,
    /// Attack power multiplier of a rally
    pub rally_factor: f32,
    /// Attack power multiplier of death-rattle vengeance
    pub vengeance_factor: f32,
    /// Attack power multiplier applied to an intimidated target
    pub intimidate_factor: f32,
    /// Attack power multiplier of a duel challenger
    pub duel_factor: f32,
    /// Attack power multiplier of the duel winner
    pub victory_factor: f32,
}

impl Default for InteractionTuning {
    fn default() -> Self {
        Self {
            sample_size: 3,
            history_len: 20,
            ally_radius: 12.0,
            help_radius: 25.0,
            flee_warning_health: 0.25,
            call_for_help_health: 0.5,
            taunt_chance: 0.10,
            combat_dialogue_chance: 0.05,
            rally_chance: 0.05,
            idle_chatter_chance: 0.02,
            flee_warning_chance: 0.3,
            call_for_help_chance: 0.2,
            intimidate_chance: 0.05,
            challenge_chance: 0.02,
            coordinated_attack_chance: 0.05,
            alert_chance: 0.5,
            chatter_cooldown: 30.0,
            combat_cooldown: 10.0,
            rally_duration: 8.0,
            intimidate_duration: 6.0,
            vengeance_duration: 6.0,
            duel_duration: 20.0,
            duel_radius: 25.0,
            aggro_suppression: 0.25,
            victory_duration: 30.0,
            rally_factor: 1.1,
            vengeance_factor: 1.15,
            intimidate_factor: 0.9,
            duel_factor: 1.2,
            victory_factor: 1.1,
        }
    }
}
