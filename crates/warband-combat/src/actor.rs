//! Combat actors: the stat block shared by players, hostiles and NPCs.
//!
//! Health is private so that every mutation goes through the clamping
//! methods: it always stays within `[0, max_health]` and `alive` flips to
//! false exactly once, when health first reaches zero. Only
//! snapshot restoration brings an actor back.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use warband_common::{ActorId, ArchetypeId, FactionId, Vec3};

/// Broad role of an actor in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    /// The player character
    Player,
    /// AI-driven enemy
    Hostile,
    /// Friendly or neutral NPC
    Npc,
}

/// Power tier of a hostile actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rank {
    /// Regular spawn
    #[default]
    Normal,
    /// Buffed spawn with escorts
    Elite,
    /// Rare spawn with improved loot
    Rare,
    /// Summoned reinforcement
    Minion,
}

impl Rank {
    /// Elites and rares are "notable" for interactions such as challenges.
    #[must_use]
    pub const fn is_notable(self) -> bool {
        matches!(self, Self::Elite | Self::Rare)
    }
}

/// Damage school, deciding which mitigation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageSchool {
    /// Mitigated by armor; can be blocked, dodged and parried
    #[default]
    Physical,
    /// Fire magic
    Fire,
    /// Frost magic
    Frost,
    /// Nature magic and poisons
    Nature,
    /// Shadow magic
    Shadow,
    /// Holy magic
    Holy,
    /// Arcane magic
    Arcane,
    /// Ignores all mitigation
    True,
}

impl DamageSchool {
    /// Checks if this school is mitigated by resistances.
    #[must_use]
    pub const fn is_magical(self) -> bool {
        !matches!(self, Self::Physical | Self::True)
    }
}

/// Stats that buffs can scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    /// Base damage of auto attacks
    AttackPower,
    /// Base healing of heals
    HealingPower,
    /// Physical mitigation
    Armor,
    /// Movement speed
    MoveSpeed,
    /// Seconds between auto attacks
    AttackInterval,
}

/// Origin of a buff, used to replace and revert it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuffSource {
    /// Fleeing speed boost
    Flee,
    /// Berserk stance
    Berserk,
    /// Defensive stance
    Defensive,
    /// Support stance
    Support,
    /// Taunt roar
    Taunt,
    /// Duel challenger buff
    Duel,
    /// Duel victory buff
    Victory,
    /// Rally shout
    Rally,
    /// Pack howl
    Howl,
    /// Intimidation debuff
    Intimidated,
    /// Death-rattle vengeance
    Vengeance,
}

/// Multiplicative stat modifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    /// What applied the buff
    pub source: BuffSource,
    /// Scaled stat
    pub stat: Stat,
    /// Multiplier applied to the stat
    pub factor: f32,
    /// Seconds left (None = until removed)
    pub remaining: Option<f32>,
}

impl Buff {
    /// Creates a buff lasting until explicitly removed.
    #[must_use]
    pub const fn permanent(source: BuffSource, stat: Stat, factor: f32) -> Self {
        Self {
            source,
            stat,
            factor,
            remaining: None,
        }
    }

    /// Creates a buff that expires after `seconds`.
    #[must_use]
    pub const fn timed(source: BuffSource, stat: Stat, factor: f32, seconds: f32) -> Self {
        Self {
            source,
            stat,
            factor,
            remaining: Some(seconds),
        }
    }
}

/// Periodic damage effect such as poison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageOverTime {
    /// Actor credited with the damage
    pub source: ActorId,
    /// School of each tick
    pub school: DamageSchool,
    /// Damage per tick before mitigation
    pub damage_per_tick: f32,
    /// Seconds between ticks
    pub interval: f32,
    /// Ticks left
    pub ticks_left: u32,
    until_next: f32,
}

impl DamageOverTime {
    /// Creates a periodic damage effect.
    #[must_use]
    pub fn new(source: ActorId, school: DamageSchool, damage_per_tick: f32, interval: f32, ticks: u32) -> Self {
        Self {
            source,
            school,
            damage_per_tick,
            interval: interval.max(0.1),
            ticks_left: ticks,
            until_next: interval.max(0.1),
        }
    }
}

/// A pending damage-over-time tick, applied by the resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DotTick {
    /// Actor credited with the damage
    pub source: ActorId,
    /// Damage school
    pub school: DamageSchool,
    /// Damage before mitigation
    pub amount: f32,
}

/// Result of applying damage to an actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageApplied {
    /// Health actually removed
    pub dealt: f32,
    /// True if this damage killed the actor
    pub killed: bool,
}

/// Combat stat block for one actor.
#[derive(Debug, Clone)]
pub struct CombatActor {
    /// Registry handle (assigned on spawn)
    pub id: ActorId,
    /// Role of the actor
    pub kind: ActorKind,
    /// Archetype the actor was built from, if any
    pub archetype: Option<ArchetypeId>,
    /// Display name
    pub name: String,
    /// Faction membership
    pub faction: FactionId,
    /// Power tier
    pub rank: Rank,
    /// Character level
    pub level: u32,
    /// World position
    pub position: Vec3,
    /// Facing yaw in radians
    pub facing: f32,
    /// False while hidden (ambushers, teleport fade)
    pub visible: bool,
    /// Maximum health
    pub max_health: f32,
    /// Base damage per auto attack
    pub attack_power: f32,
    /// Base healing per heal
    pub healing_power: f32,
    /// Physical mitigation rating
    pub armor: f32,
    /// Per-school resistance ratings
    pub resistances: AHashMap<DamageSchool, f32>,
    /// School of auto attacks
    pub damage_school: DamageSchool,
    /// Auto attack reach
    pub attack_range: f32,
    /// Seconds between auto attacks
    pub attack_interval: f32,
    /// Hit rating (each point adds 1% hit chance)
    pub hit_rating: f32,
    /// Agility (adds crit chance)
    pub agility: f32,
    /// Overrides the computed crit chance when set
    pub crit_override: Option<f32>,
    /// Chance to dodge physical attacks
    pub dodge_chance: f32,
    /// Chance to parry physical attacks
    pub parry_chance: f32,
    /// Chance to block physical attacks (requires a shield)
    pub block_chance: f32,
    /// Whether an off-hand shield is equipped
    pub has_shield: bool,
    /// Body radius for spacing
    pub collision_radius: f32,
    /// Movement speed without buffs
    pub base_speed: f32,
    /// Loot odds multiplier passed to the loot collaborator
    pub loot_multiplier: f32,
    alive: bool,
    health: f32,
    buffs: Vec<Buff>,
    dots: Vec<DamageOverTime>,
}

impl CombatActor {
    /// Creates an actor with default level-1 stats.
    #[must_use]
    pub fn new(kind: ActorKind, name: impl Into<String>, faction: FactionId) -> Self {
        Self {
            id: ActorId::NULL,
            kind,
            archetype: None,
            name: name.into(),
            faction,
            rank: Rank::Normal,
            level: 1,
            position: Vec3::ZERO,
            facing: 0.0,
            visible: true,
            max_health: 100.0,
            attack_power: 10.0,
            healing_power: 0.0,
            armor: 0.0,
            resistances: AHashMap::new(),
            damage_school: DamageSchool::Physical,
            attack_range: 2.0,
            attack_interval: 2.0,
            hit_rating: 0.0,
            agility: 0.0,
            crit_override: None,
            dodge_chance: 0.0,
            parry_chance: 0.0,
            block_chance: 0.0,
            has_shield: false,
            collision_radius: 0.5,
            base_speed: 4.0,
            loot_multiplier: 1.0,
            alive: true,
            health: 100.0,
            buffs: Vec::new(),
            dots: Vec::new(),
        }
    }

    /// Creates a player actor.
    #[must_use]
    pub fn player(name: impl Into<String>) -> Self {
        Self::new(ActorKind::Player, name, FactionId::PLAYER)
    }

    /// Creates a hostile actor of the given faction.
    #[must_use]
    pub fn hostile(name: impl Into<String>, faction: FactionId) -> Self {
        Self::new(ActorKind::Hostile, name, faction)
    }

    /// Sets the level.
    #[must_use]
    pub const fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Sets max and current health.
    #[must_use]
    pub fn with_health(mut self, max_health: f32) -> Self {
        self.max_health = max_health.max(1.0);
        self.health = self.max_health;
        self
    }

    /// Sets the position.
    #[must_use]
    pub const fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the attack power.
    #[must_use]
    pub const fn with_attack_power(mut self, attack_power: f32) -> Self {
        self.attack_power = attack_power;
        self
    }

    /// Sets the healing power.
    #[must_use]
    pub const fn with_healing_power(mut self, healing_power: f32) -> Self {
        self.healing_power = healing_power;
        self
    }

    /// Sets the armor.
    #[must_use]
    pub const fn with_armor(mut self, armor: f32) -> Self {
        self.armor = armor;
        self
    }

    /// Sets one resistance.
    #[must_use]
    pub fn with_resistance(mut self, school: DamageSchool, value: f32) -> Self {
        self.resistances.insert(school, value);
        self
    }

    /// Sets the auto attack school.
    #[must_use]
    pub const fn with_damage_school(mut self, school: DamageSchool) -> Self {
        self.damage_school = school;
        self
    }

    /// Sets attack range and interval.
    #[must_use]
    pub const fn with_attack(mut self, range: f32, interval: f32) -> Self {
        self.attack_range = range;
        self.attack_interval = interval;
        self
    }

    /// Sets hit rating.
    #[must_use]
    pub const fn with_hit_rating(mut self, hit_rating: f32) -> Self {
        self.hit_rating = hit_rating;
        self
    }

    /// Sets agility.
    #[must_use]
    pub const fn with_agility(mut self, agility: f32) -> Self {
        self.agility = agility;
        self
    }

    /// Overrides the crit chance.
    #[must_use]
    pub const fn with_crit_chance(mut self, chance: f32) -> Self {
        self.crit_override = Some(chance);
        self
    }

    /// Sets dodge and parry chances.
    #[must_use]
    pub const fn with_avoidance(mut self, dodge: f32, parry: f32) -> Self {
        self.dodge_chance = dodge;
        self.parry_chance = parry;
        self
    }

    /// Equips a shield with the given block chance.
    #[must_use]
    pub const fn with_shield(mut self, block_chance: f32) -> Self {
        self.has_shield = true;
        self.block_chance = block_chance;
        self
    }

    /// Sets movement speed.
    #[must_use]
    pub const fn with_speed(mut self, speed: f32) -> Self {
        self.base_speed = speed;
        self
    }

    /// Sets the rank.
    #[must_use]
    pub const fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    /// Sets the archetype.
    #[must_use]
    pub fn with_archetype(mut self, archetype: ArchetypeId) -> Self {
        self.archetype = Some(archetype);
        self
    }

    /// Checks if the actor is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Checks if the actor is AI-driven.
    #[must_use]
    pub fn is_hostile(&self) -> bool {
        self.kind == ActorKind::Hostile
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Health as a fraction of max health.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.health / self.max_health
        }
    }

    /// Resistance rating for a school.
    #[must_use]
    pub fn resistance(&self, school: DamageSchool) -> f32 {
        self.resistances.get(&school).copied().unwrap_or(0.0)
    }

    /// Removes health. Dead actors take no damage.
    pub fn apply_damage(&mut self, amount: f32) -> DamageApplied {
        if !self.alive || amount <= 0.0 {
            return DamageApplied {
                dealt: 0.0,
                killed: false,
            };
        }
        let dealt = amount.min(self.health);
        self.health = (self.health - dealt).clamp(0.0, self.max_health);
        let killed = self.health <= 0.0;
        if killed {
            self.alive = false;
            self.dots.clear();
        }
        DamageApplied { dealt, killed }
    }

    /// Restores health, capped at max health. Returns the amount healed.
    pub fn apply_healing(&mut self, amount: f32) -> f32 {
        if !self.alive || amount <= 0.0 {
            return 0.0;
        }
        let healed = amount.min(self.max_health - self.health).max(0.0);
        self.health += healed;
        healed
    }

    /// Sets health to max (evade reset).
    pub fn restore_full_health(&mut self) {
        if self.alive {
            self.health = self.max_health;
        }
    }

    /// Overwrites persistent state from a snapshot.
    pub fn restore_state(&mut self, health: f32, position: Vec3, alive: bool) {
        self.alive = alive && health > 0.0;
        self.health = if self.alive {
            health.clamp(0.0, self.max_health)
        } else {
            0.0
        };
        self.position = position;
        self.buffs.clear();
        self.dots.clear();
    }

    /// Multiplies base health, attack and armor (elite/rare/minion scaling).
    pub fn scale_stats(&mut self, health: f32, attack: f32, armor: f32) {
        let fraction = self.health_fraction();
        self.max_health = (self.max_health * health).max(1.0);
        self.health = (self.max_health * fraction).clamp(0.0, self.max_health);
        self.attack_power *= attack;
        self.armor *= armor;
    }

    /// Base value of a stat, before buffs.
    #[must_use]
    pub const fn base_stat(&self, stat: Stat) -> f32 {
        match stat {
            Stat::AttackPower => self.attack_power,
            Stat::HealingPower => self.healing_power,
            Stat::Armor => self.armor,
            Stat::MoveSpeed => self.base_speed,
            Stat::AttackInterval => self.attack_interval,
        }
    }

    /// Stat value with every active buff applied.
    #[must_use]
    pub fn effective(&self, stat: Stat) -> f32 {
        self.buffs
            .iter()
            .filter(|b| b.stat == stat)
            .fold(self.base_stat(stat), |value, b| value * b.factor)
    }

    /// Movement speed with buffs applied.
    #[must_use]
    pub fn effective_speed(&self) -> f32 {
        self.effective(Stat::MoveSpeed)
    }

    /// Adds a buff, replacing any buff with the same source and stat.
    pub fn add_buff(&mut self, buff: Buff) {
        self.buffs
            .retain(|b| !(b.source == buff.source && b.stat == buff.stat));
        self.buffs.push(buff);
    }

    /// Removes every buff applied by a source.
    pub fn remove_buffs_from(&mut self, source: BuffSource) {
        self.buffs.retain(|b| b.source != source);
    }

    /// Checks if a buff from the source is active.
    #[must_use]
    pub fn has_buff_from(&self, source: BuffSource) -> bool {
        self.buffs.iter().any(|b| b.source == source)
    }

    /// Active buffs.
    #[must_use]
    pub fn buffs(&self) -> &[Buff] {
        &self.buffs
    }

    /// Counts down timed buffs and drops expired ones.
    pub fn tick_buffs(&mut self, dt: f32) {
        for buff in &mut self.buffs {
            if let Some(remaining) = buff.remaining.as_mut() {
                *remaining -= dt;
            }
        }
        self.buffs.retain(|b| b.remaining.map_or(true, |r| r > 0.0));
    }

    /// Applies a periodic damage effect, refreshing one from the same source and school.
    pub fn add_dot(&mut self, dot: DamageOverTime) {
        if !self.alive {
            return;
        }
        self.dots
            .retain(|d| !(d.source == dot.source && d.school == dot.school));
        self.dots.push(dot);
    }

    /// Active periodic damage effects.
    #[must_use]
    pub fn dots(&self) -> &[DamageOverTime] {
        &self.dots
    }

    /// Advances periodic effects and returns the ticks that came due.
    pub fn take_due_dots(&mut self, dt: f32) -> Vec<DotTick> {
        let mut due = Vec::new();
        for dot in &mut self.dots {
            dot.until_next -= dt;
            while dot.until_next <= 0.0 && dot.ticks_left > 0 {
                dot.ticks_left -= 1;
                dot.until_next += dot.interval;
                due.push(DotTick {
                    source: dot.source,
                    school: dot.school,
                    amount: dot.damage_per_tick,
                });
            }
        }
        self.dots.retain(|d| d.ticks_left > 0);
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wolf() -> CombatActor {
        CombatActor::hostile("Wolf", FactionId::BEASTS).with_health(50.0)
    }

    #[test]
    fn test_damage_kills_exactly_once() {
        let mut actor = wolf();
        let first = actor.apply_damage(80.0);
        assert!(first.killed);
        assert_eq!(first.dealt, 50.0);
        assert!(!actor.is_alive());
        assert_eq!(actor.health(), 0.0);

        let second = actor.apply_damage(10.0);
        assert!(!second.killed);
        assert_eq!(second.dealt, 0.0);
    }

    #[test]
    fn test_healing_capped_and_ignored_when_dead() {
        let mut actor = wolf();
        actor.apply_damage(20.0);
        assert_eq!(actor.apply_healing(100.0), 20.0);
        assert_eq!(actor.health(), 50.0);

        actor.apply_damage(50.0);
        assert_eq!(actor.apply_healing(10.0), 0.0);
        assert!(!actor.is_alive());

        let position = actor.position;
        actor.restore_state(25.0, position, true);
        assert!(actor.is_alive());
        assert_eq!(actor.health(), 25.0);
    }

    #[test]
    fn test_buffs_stack_multiplicatively_and_expire() {
        let mut actor = wolf().with_speed(4.0);
        actor.add_buff(Buff::permanent(BuffSource::Flee, Stat::MoveSpeed, 1.5));
        actor.add_buff(Buff::timed(BuffSource::Howl, Stat::MoveSpeed, 2.0, 1.0));
        assert!((actor.effective_speed() - 12.0).abs() < 0.001);

        actor.tick_buffs(1.5);
        assert!((actor.effective_speed() - 6.0).abs() < 0.001);

        actor.remove_buffs_from(BuffSource::Flee);
        assert!((actor.effective_speed() - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_same_source_buff_replaces() {
        let mut actor = wolf();
        actor.add_buff(Buff::permanent(BuffSource::Rally, Stat::AttackPower, 1.2));
        actor.add_buff(Buff::permanent(BuffSource::Rally, Stat::AttackPower, 1.5));
        assert_eq!(actor.buffs().len(), 1);
        assert!((actor.effective(Stat::AttackPower) - 15.0).abs() < 0.001);
    }

    #[test]
    fn test_dot_ticks_on_interval() {
        let mut actor = wolf();
        actor.add_dot(DamageOverTime::new(ActorId::from_raw(9), DamageSchool::Nature, 4.0, 1.0, 3));
        assert!(actor.take_due_dots(0.5).is_empty());
        assert_eq!(actor.take_due_dots(0.6).len(), 1);
        assert_eq!(actor.take_due_dots(2.5).len(), 2);
        assert!(actor.dots().is_empty());
    }

    #[test]
    fn test_scale_stats_keeps_fraction() {
        let mut actor = wolf().with_attack_power(10.0).with_armor(100.0);
        actor.apply_damage(25.0);
        actor.scale_stats(3.0, 1.5, 1.5);
        assert_eq!(actor.max_health, 150.0);
        assert_eq!(actor.health(), 75.0);
        assert_eq!(actor.attack_power, 15.0);
        assert_eq!(actor.armor, 150.0);
    }

    proptest! {
        #[test]
        fn health_stays_clamped(ops in proptest::collection::vec((any::<bool>(), 0.0f32..200.0), 0..40)) {
            let mut actor = wolf();
            for (is_damage, amount) in ops {
                if is_damage {
                    actor.apply_damage(amount);
                } else {
                    actor.apply_healing(amount);
                }
                prop_assert!(actor.health() >= 0.0);
                prop_assert!(actor.health() <= actor.max_health);
                prop_assert_eq!(actor.is_alive(), actor.health() > 0.0);
            }
        }
    }
}
