//! NPC definitions and their binary layout.
//!
//! Field order (authoritative; all integers are signed 32-bit unless
//! noted):
//!
//! ```text
//! name              string
//! sprite            string (null marker when unset)
//! level
//! max_vitals        vital_count × int        (no prefix)
//! stats             stat_count × int         (no prefix)
//! experience
//! spawn_duration
//! behavior          1 byte
//! sight_range
//! damage
//! damage_type
//! crit_chance
//! scaling_stat
//! scaling
//! attack_animation  object ref (-1 = none)
//! drops             max_npc_drops × (item ref, amount, chance)  (no prefix)
//! spells            count, then count × object id
//! spell_frequency
//! aggro_list        count, then count × object id
//! npc_vs_npc        int (0/1)
//! attack_allies     int (0/1)
//! ```

use crate::{
    ByteCursor, EntityCodec, GameLimits, GameObject, ObjectId, ObjectKind,
    ProtocolError,
};

/// How an NPC reacts to players.
///
/// Stored as a single byte. Every byte value is a valid behavior: the
/// named constants cover the ones this build knows, and any other value
/// is carried through a decode/encode cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NpcBehavior(u8);

impl NpcBehavior {
    pub const ATTACK_ON_SIGHT: Self = Self(0);
    pub const ATTACK_WHEN_ATTACKED: Self = Self(1);
    pub const FRIENDLY: Self = Self(2);
    pub const GUARD: Self = Self(3);

    pub const fn from_byte(value: u8) -> Self {
        Self(value)
    }

    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Whether this is one of the named behaviors.
    pub const fn is_known(self) -> bool {
        self.0 <= Self::GUARD.0
    }
}

impl From<u8> for NpcBehavior {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<NpcBehavior> for u8 {
    fn from(value: NpcBehavior) -> Self {
        value.0
    }
}

/// One slot of an NPC's drop table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NpcDrop {
    /// The item dropped, or `None` for an empty slot.
    pub item: Option<ObjectId>,
    pub amount: i32,
    /// Drop chance in percent.
    pub chance: i32,
}

/// An NPC definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Npc {
    pub name: String,
    pub sprite: Option<String>,
    pub level: i32,
    /// One entry per vital type; length is `GameLimits::vital_count`.
    pub max_vitals: Vec<i32>,
    /// One entry per stat type; length is `GameLimits::stat_count`.
    pub stats: Vec<i32>,
    pub experience: i32,
    /// Respawn delay in milliseconds.
    pub spawn_duration: i32,
    pub behavior: NpcBehavior,
    pub sight_range: i32,

    // Combat
    pub damage: i32,
    pub damage_type: i32,
    pub crit_chance: i32,
    pub scaling_stat: i32,
    pub scaling: i32,
    pub attack_animation: Option<ObjectId>,

    /// Exactly `GameLimits::max_npc_drops` slots.
    pub drops: Vec<NpcDrop>,

    pub spells: Vec<ObjectId>,
    pub spell_frequency: i32,

    /// NPCs this one will attack on sight.
    pub aggro_list: Vec<ObjectId>,
    pub npc_vs_npc: bool,
    pub attack_allies: bool,
}

impl Npc {
    /// Creates a blank NPC shaped for `limits`.
    pub fn new(limits: &GameLimits) -> Self {
        Self {
            name: "New Npc".to_string(),
            sprite: None,
            level: 1,
            max_vitals: vec![0; limits.vital_count],
            stats: vec![0; limits.stat_count],
            experience: 0,
            spawn_duration: 0,
            behavior: NpcBehavior::default(),
            sight_range: 0,
            damage: 0,
            damage_type: 0,
            crit_chance: 0,
            scaling_stat: 0,
            scaling: 0,
            attack_animation: None,
            drops: vec![NpcDrop::default(); limits.max_npc_drops],
            spells: Vec::new(),
            spell_frequency: 2,
            aggro_list: Vec::new(),
            npc_vs_npc: false,
            attack_allies: false,
        }
    }
}

impl GameObject for Npc {
    const KIND: ObjectKind = ObjectKind::Npc;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// Binary codec for [`Npc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NpcCodec {
    limits: GameLimits,
}

impl NpcCodec {
    pub fn new(limits: GameLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &GameLimits {
        &self.limits
    }
}

fn check_shape(
    field: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), ProtocolError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ProtocolError::ShapeMismatch {
            field,
            expected,
            actual,
        })
    }
}

impl EntityCodec for NpcCodec {
    type Entity = Npc;

    fn write(&self, npc: &Npc, c: &mut ByteCursor) -> Result<(), ProtocolError> {
        // Validate every fixed-size array up front so a bad object never
        // leaves a half-written payload behind.
        check_shape("max_vitals", self.limits.vital_count, npc.max_vitals.len())?;
        check_shape("stats", self.limits.stat_count, npc.stats.len())?;
        check_shape("drops", self.limits.max_npc_drops, npc.drops.len())?;

        c.write_string(&npc.name)?;
        c.write_opt_string(npc.sprite.as_deref())?;
        c.write_i32(npc.level);
        for &vital in &npc.max_vitals {
            c.write_i32(vital);
        }
        for &stat in &npc.stats {
            c.write_i32(stat);
        }
        c.write_i32(npc.experience);
        c.write_i32(npc.spawn_duration);
        c.write_u8(npc.behavior.into());
        c.write_i32(npc.sight_range);

        c.write_i32(npc.damage);
        c.write_i32(npc.damage_type);
        c.write_i32(npc.crit_chance);
        c.write_i32(npc.scaling_stat);
        c.write_i32(npc.scaling);
        c.write_object_ref(npc.attack_animation)?;

        for drop in &npc.drops {
            c.write_object_ref(drop.item)?;
            c.write_i32(drop.amount);
            c.write_i32(drop.chance);
        }

        c.write_count(npc.spells.len())?;
        for &spell in &npc.spells {
            c.write_object_id(spell)?;
        }
        c.write_i32(npc.spell_frequency);

        c.write_count(npc.aggro_list.len())?;
        for &target in &npc.aggro_list {
            c.write_object_id(target)?;
        }

        c.write_i32(i32::from(npc.npc_vs_npc));
        c.write_i32(i32::from(npc.attack_allies));
        Ok(())
    }

    fn read(&self, c: &mut ByteCursor) -> Result<Npc, ProtocolError> {
        let name = c.read_string()?;
        let sprite = c.read_opt_string()?;
        let level = c.read_i32()?;
        let max_vitals = (0..self.limits.vital_count)
            .map(|_| c.read_i32())
            .collect::<Result<Vec<_>, _>>()?;
        let stats = (0..self.limits.stat_count)
            .map(|_| c.read_i32())
            .collect::<Result<Vec<_>, _>>()?;
        let experience = c.read_i32()?;
        let spawn_duration = c.read_i32()?;
        let behavior = NpcBehavior::from(c.read_u8()?);
        let sight_range = c.read_i32()?;

        let damage = c.read_i32()?;
        let damage_type = c.read_i32()?;
        let crit_chance = c.read_i32()?;
        let scaling_stat = c.read_i32()?;
        let scaling = c.read_i32()?;
        let attack_animation = c.read_object_ref()?;

        let mut drops = Vec::with_capacity(self.limits.max_npc_drops);
        for _ in 0..self.limits.max_npc_drops {
            drops.push(NpcDrop {
                item: c.read_object_ref()?,
                amount: c.read_i32()?,
                chance: c.read_i32()?,
            });
        }

        let spell_count = c.read_count(4)?;
        let spells = (0..spell_count)
            .map(|_| c.read_object_id())
            .collect::<Result<Vec<_>, _>>()?;
        let spell_frequency = c.read_i32()?;

        let aggro_count = c.read_count(4)?;
        let aggro_list = (0..aggro_count)
            .map(|_| c.read_object_id())
            .collect::<Result<Vec<_>, _>>()?;

        let npc_vs_npc = c.read_i32()? != 0;
        let attack_allies = c.read_i32()? != 0;

        Ok(Npc {
            name,
            sprite,
            level,
            max_vitals,
            stats,
            experience,
            spawn_duration,
            behavior,
            sight_range,
            damage,
            damage_type,
            crit_chance,
            scaling_stat,
            scaling,
            attack_animation,
            drops,
            spells,
            spell_frequency,
            aggro_list,
            npc_vs_npc,
            attack_allies,
        })
    }
}
