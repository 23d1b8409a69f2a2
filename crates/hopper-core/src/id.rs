use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

new_key_type! {
    /// Identifies a loose item lying in the world.
    pub struct GroundItemId;
}

/// Identifies an item type in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies a type-defining metadata entry on an item stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub u16);

/// Identifies a world (dimension) in the host simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldId(pub u32);

/// Identifies a player or other actor. Owners and members are actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A block position in a world. The unique key of every hopper and container.
///
/// Ordering is `(world, x, y, z)`, which is the iteration order of every
/// location-keyed map in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Location {
    pub fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// The region (16x16 column) containing this location.
    pub fn region(&self) -> RegionId {
        RegionId {
            world: self.world,
            x: self.x >> 4,
            z: self.z >> 4,
        }
    }
}

/// `world;x;y;z`, the textual form used by legacy link records.
impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{};{}", self.world.0, self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed location '{0}', expected world;x;y;z")]
pub struct ParseLocationError(pub String);

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseLocationError(s.to_string());
        let mut parts = s.split(';').map(str::trim);
        let world = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let x = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let y = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let z = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Location::new(WorldId(world), x, y, z))
    }
}

/// A loadable region of a world. Hoppers are loaded and unloaded a region
/// at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}
