//! Validated runtime configuration.
//!
//! `hopper-data` builds a [`Settings`] from files; tests and hosts without
//! configuration files use [`Settings::default`] plus explicit tracks.

use crate::fixed::Fixed64;
use crate::upgrade::{UpgradeError, UpgradeTracks};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Values every freshly placed hopper starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingValues {
    pub suction_speed: Fixed64,
    pub suction_amount: u32,
    pub suction_range: u32,
    pub transfer_speed: Fixed64,
    pub transfer_amount: u32,
    pub link_capacity: u32,
}

impl Default for StartingValues {
    fn default() -> Self {
        Self {
            suction_speed: Fixed64::ONE,
            suction_amount: 1,
            suction_range: 1,
            transfer_speed: Fixed64::ONE,
            transfer_amount: 1,
            link_capacity: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub starting: StartingValues,
    pub tracks: UpgradeTracks,
    /// Return a broken hopper's contents to the breaker instead of dropping
    /// them on the ground.
    pub drop_to_inventory: bool,
    /// Names of optional hooks the host asked to ignore.
    pub disabled_hooks: BTreeSet<String>,
}

impl Settings {
    pub fn new(starting: StartingValues, tracks: UpgradeTracks) -> Self {
        Self {
            starting,
            tracks,
            ..Self::default()
        }
    }

    /// Disable every track that cannot serve the starting values. Each
    /// disabled track is logged and returned; the rest of the settings stay
    /// usable.
    pub fn validated(mut self) -> (Self, Vec<UpgradeError>) {
        let errors = self.tracks.validate(&self.starting);
        for error in &errors {
            tracing::warn!(%error, "upgrade track disabled");
        }
        (self, errors)
    }

    pub fn hook_enabled(&self, name: &str) -> bool {
        !self.disabled_hooks.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::upgrade::{UpgradeKind, UpgradeTrack};

    #[test]
    fn defaults_match_a_fresh_install() {
        let settings = Settings::default();
        assert_eq!(settings.starting.transfer_speed, fixed(1.0));
        assert_eq!(settings.starting.link_capacity, 1);
        assert!(!settings.drop_to_inventory);
        assert!(settings.hook_enabled("stacking"));
    }

    #[test]
    fn validation_keeps_good_tracks_and_drops_bad_ones() {
        let mut tracks = test_tracks();
        let capacity = UpgradeTrack::new(UpgradeKind::LinkCapacity, [(5u32, fixed(0.0))]);
        tracks.link_capacity = Some(capacity.unwrap());
        let (settings, errors) = Settings::new(test_starting(), tracks).validated();
        assert_eq!(errors.len(), 1);
        assert!(settings.tracks.link_capacity.is_none());
        assert!(settings.tracks.transfer_speed.is_some());
    }

    #[test]
    fn disabled_hooks_are_reported() {
        let mut settings = Settings::default();
        settings.disabled_hooks.insert("stacking".to_string());
        assert!(!settings.hook_enabled("stacking"));
    }
}
