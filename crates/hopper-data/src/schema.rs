//! Serde data file structs for hopper configuration.
//!
//! These structs define the on-disk format for item definitions and engine
//! settings. They are deserialized from RON, JSON, or TOML data files and
//! then resolved into `hopper-core` types by the loader.

use hopper_core::registry::{DEFAULT_MAX_STACK_SIZE, ItemRole};
use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// An item type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default = "default_max_stack_size")]
    pub max_stack_size: u32,
    /// Placement roles in smelting and brewing containers.
    #[serde(default)]
    pub roles: Vec<ItemRole>,
}

fn default_max_stack_size() -> u32 {
    DEFAULT_MAX_STACK_SIZE
}

// ===========================================================================
// Settings
// ===========================================================================

/// Top-level settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsData {
    #[serde(default)]
    pub starting: StartingData,
    #[serde(default)]
    pub upgrades: UpgradesData,
    #[serde(default)]
    pub drop_to_inventory: bool,
    /// Names of optional integrations to ignore even when installed.
    #[serde(default)]
    pub disabled_hooks: Vec<String>,
}

/// Values every freshly placed hopper starts with.
#[derive(Debug, Clone, Deserialize)]
pub struct StartingData {
    #[serde(default = "default_speed")]
    pub transfer_speed: f64,
    #[serde(default = "default_count")]
    pub transfer_amount: u32,
    #[serde(default = "default_speed")]
    pub suction_speed: f64,
    #[serde(default = "default_count")]
    pub suction_amount: u32,
    #[serde(default = "default_count")]
    pub suction_range: u32,
    #[serde(default = "default_count", alias = "link_capacity")]
    pub max_containers: u32,
}

impl Default for StartingData {
    fn default() -> Self {
        Self {
            transfer_speed: default_speed(),
            transfer_amount: default_count(),
            suction_speed: default_speed(),
            suction_amount: default_count(),
            suction_range: default_count(),
            max_containers: default_count(),
        }
    }
}

fn default_speed() -> f64 {
    1.0
}

fn default_count() -> u32 {
    1
}

// ===========================================================================
// Upgrade tracks
// ===========================================================================

/// One priced level of an upgrade track. `level` is seconds per action for
/// speed tracks and a whole count otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrackLevelData {
    pub level: f64,
    pub price: f64,
}

/// The six upgrade tracks. A track left empty is disabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpgradesData {
    #[serde(default)]
    pub transfer_speed: Vec<TrackLevelData>,
    #[serde(default)]
    pub transfer_amount: Vec<TrackLevelData>,
    #[serde(default)]
    pub suction_speed: Vec<TrackLevelData>,
    #[serde(default)]
    pub suction_amount: Vec<TrackLevelData>,
    #[serde(default)]
    pub suction_range: Vec<TrackLevelData>,
    #[serde(default, alias = "link_capacity")]
    pub max_containers: Vec<TrackLevelData>,
}
