//! Identity and shape types shared by every entity codec.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The stable identity of a game object within its type's registry.
///
/// Ids are non-negative. On the wire they travel as signed 32-bit
/// integers, which leaves `-1` free as the "no reference" sentinel used by
/// optional references (see [`ByteCursor::write_object_ref`]).
///
/// [`ByteCursor::write_object_ref`]: crate::ByteCursor::write_object_ref
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The largest id that fits the signed 32-bit wire encoding.
    pub const MAX: ObjectId = ObjectId(i32::MAX as u32);
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kinds of server-authoritative game objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Npc,
    Item,
    Spell,
    Animation,
    Map,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Npc => "npc",
            Self::Item => "item",
            Self::Spell => "spell",
            Self::Animation => "animation",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

/// A game object definition that can live in a registry.
///
/// Every object carries a display name; the registry keeps its derived
/// name list in sync through [`set_name`](GameObject::set_name).
pub trait GameObject: Clone + Send + Sync + 'static {
    /// Which kind of object this is. Used in logs and errors.
    const KIND: ObjectKind;

    /// The display name shown in pickers.
    fn name(&self) -> &str;

    /// Replaces the display name.
    fn set_name(&mut self, name: String);
}

// ---------------------------------------------------------------------------
// GameLimits
// ---------------------------------------------------------------------------

/// Fixed array sizes shared by encoder and decoder.
///
/// These come from the game's configuration and must be identical on the
/// server and every client: the vital, stat and drop arrays are written
/// without a count prefix, so a disagreement here shifts every field after
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLimits {
    /// Number of vital types (health, mana, ...).
    pub vital_count: usize,
    /// Number of stat types.
    pub stat_count: usize,
    /// Size of every NPC drop table.
    pub max_npc_drops: usize,
}

impl Default for GameLimits {
    fn default() -> Self {
        Self {
            vital_count: 2,
            stat_count: 5,
            max_npc_drops: 10,
        }
    }
}
