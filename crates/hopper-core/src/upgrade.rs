//! Upgrade tracks and the purchase protocol.
//!
//! Each of the six hopper attributes has an [`UpgradeTrack`]: an ordered map
//! from level key to price. Amount, range, and link-capacity tracks improve
//! as the key grows. Speed tracks hold seconds per action, so they improve as
//! the key shrinks. The [`Direction`] of a track captures that difference so
//! one purchase protocol serves all six.
//!
//! Each attribute on a hopper is an [`UpgradePair`] of `current` and
//! `ceiling`. A paid upgrade raises both; the unpaid increase/decrease
//! control only moves `current`, and never past `ceiling`.

use crate::fixed::Fixed64;
use crate::hooks::{Actor, Currency};
use crate::settings::StartingValues;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::Bound::{Excluded, Unbounded};

// ---------------------------------------------------------------------------
// Kinds and direction
// ---------------------------------------------------------------------------

/// The six independently upgradable attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    SuctionSpeed,
    SuctionAmount,
    SuctionRange,
    TransferSpeed,
    TransferAmount,
    LinkCapacity,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 6] = [
        UpgradeKind::SuctionSpeed,
        UpgradeKind::SuctionAmount,
        UpgradeKind::SuctionRange,
        UpgradeKind::TransferSpeed,
        UpgradeKind::TransferAmount,
        UpgradeKind::LinkCapacity,
    ];

    pub fn direction(self) -> Direction {
        match self {
            UpgradeKind::SuctionSpeed | UpgradeKind::TransferSpeed => Direction::Descending,
            _ => Direction::Ascending,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UpgradeKind::SuctionSpeed => "suction_speed",
            UpgradeKind::SuctionAmount => "suction_amount",
            UpgradeKind::SuctionRange => "suction_range",
            UpgradeKind::TransferSpeed => "transfer_speed",
            UpgradeKind::TransferAmount => "transfer_amount",
            UpgradeKind::LinkCapacity => "link_capacity",
        }
    }
}

impl std::fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which way along the key order a track improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Larger keys are better.
    Ascending,
    /// Smaller keys are better.
    Descending,
}

impl Direction {
    /// Whether `a` is strictly better than `b`.
    pub fn is_better<K: Ord>(self, a: &K, b: &K) -> bool {
        match self {
            Direction::Ascending => a > b,
            Direction::Descending => a < b,
        }
    }
}

/// Key types usable as upgrade levels.
pub trait LevelKey: Ord + Copy + Debug {}

impl<T: Ord + Copy + Debug> LevelKey for T {}

/// A level value independent of its key type, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelValue {
    Seconds(Fixed64),
    Count(u32),
}

// ---------------------------------------------------------------------------
// UpgradeTrack
// ---------------------------------------------------------------------------

/// An ordered `level -> price` list for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeTrack<K: Ord> {
    kind: UpgradeKind,
    levels: BTreeMap<K, Fixed64>,
}

impl<K: LevelKey> UpgradeTrack<K> {
    /// Build a track. Fails on an empty list, duplicate levels, or negative
    /// prices.
    pub fn new(
        kind: UpgradeKind,
        levels: impl IntoIterator<Item = (K, Fixed64)>,
    ) -> Result<Self, UpgradeError> {
        let mut map = BTreeMap::new();
        for (level, price) in levels {
            if price < Fixed64::ZERO {
                return Err(UpgradeError::NegativePrice { kind, level: format!("{level:?}") });
            }
            if map.insert(level, price).is_some() {
                return Err(UpgradeError::DuplicateLevel { kind, level: format!("{level:?}") });
            }
        }
        if map.is_empty() {
            return Err(UpgradeError::EmptyTrack(kind));
        }
        Ok(Self { kind, levels: map })
    }

    pub fn kind(&self) -> UpgradeKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn contains(&self, level: K) -> bool {
        self.levels.contains_key(&level)
    }

    pub fn price(&self, level: K) -> Option<Fixed64> {
        self.levels.get(&level).copied()
    }

    /// Levels from worst to best.
    pub fn levels_worst_first(&self) -> Vec<(K, Fixed64)> {
        let iter = self.levels.iter().map(|(k, p)| (*k, *p));
        match self.direction() {
            Direction::Ascending => iter.collect(),
            Direction::Descending => iter.rev().collect(),
        }
    }

    /// The best level on the track.
    pub fn best(&self) -> Option<K> {
        match self.direction() {
            Direction::Ascending => self.levels.keys().next_back().copied(),
            Direction::Descending => self.levels.keys().next().copied(),
        }
    }

    /// The key at `value`, or the nearest key worse than it.
    fn anchor(&self, value: K) -> Option<K> {
        match self.direction() {
            Direction::Ascending => self.levels.range(..=value).next_back().map(|(k, _)| *k),
            Direction::Descending => self.levels.range(value..).next().map(|(k, _)| *k),
        }
    }

    /// The nearest key strictly better than `from`.
    fn next_better(&self, from: K) -> Option<(K, Fixed64)> {
        let entry = match self.direction() {
            Direction::Ascending => self.levels.range((Excluded(from), Unbounded)).next(),
            Direction::Descending => self.levels.range(..from).next_back(),
        };
        entry.map(|(k, p)| (*k, *p))
    }

    /// The nearest key strictly worse than `from`.
    fn next_worse(&self, from: K) -> Option<K> {
        let entry = match self.direction() {
            Direction::Ascending => self.levels.range(..from).next_back(),
            Direction::Descending => self.levels.range((Excluded(from), Unbounded)).next(),
        };
        entry.map(|(k, _)| *k)
    }

    /// The paid upgrade available from `ceiling`: one step better than the
    /// track entry at (or just below) the ceiling. `None` means maxed.
    pub fn next_upgrade(&self, ceiling: K) -> Option<(K, Fixed64)> {
        self.next_better(self.anchor(ceiling).unwrap_or(ceiling))
    }

    /// One unpaid step better than `current`, bounded by `ceiling`.
    pub fn step_up(&self, current: K, ceiling: K) -> Option<K> {
        let (candidate, _) = self.next_better(self.anchor(current).unwrap_or(current))?;
        if self.direction().is_better(&candidate, &ceiling) {
            None
        } else {
            Some(candidate)
        }
    }

    /// One unpaid step worse than `current`, bounded by the worst key.
    pub fn step_down(&self, current: K) -> Option<K> {
        self.next_worse(current)
    }

    /// 1-based level number of `value` counting from the worst key.
    pub fn level_number(&self, value: K) -> Option<usize> {
        self.levels_worst_first()
            .iter()
            .position(|(k, _)| *k == value)
            .map(|i| i + 1)
    }
}

// ---------------------------------------------------------------------------
// UpgradePair
// ---------------------------------------------------------------------------

/// The `(current, ceiling)` pair of one attribute on one hopper.
///
/// Invariant: `current` is never better than `ceiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradePair<K> {
    current: K,
    ceiling: K,
}

impl<K: LevelKey> UpgradePair<K> {
    /// Both values at the same level.
    pub fn seeded(value: K) -> Self {
        Self {
            current: value,
            ceiling: value,
        }
    }

    /// Build a pair, raising the ceiling to `current` if it was worse.
    pub fn new(current: K, ceiling: K, direction: Direction) -> Self {
        let ceiling = if direction.is_better(&current, &ceiling) {
            current
        } else {
            ceiling
        };
        Self { current, ceiling }
    }

    pub fn current(&self) -> K {
        self.current
    }

    pub fn ceiling(&self) -> K {
        self.ceiling
    }

    /// Whether the invariant holds for a track running in `direction`.
    pub fn holds(&self, direction: Direction) -> bool {
        !direction.is_better(&self.current, &self.ceiling)
    }
}

// ---------------------------------------------------------------------------
// Upgrades (per hopper)
// ---------------------------------------------------------------------------

/// The six upgrade pairs carried by every hopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrades {
    pub suction_speed: UpgradePair<Fixed64>,
    pub suction_amount: UpgradePair<u32>,
    pub suction_range: UpgradePair<u32>,
    pub transfer_speed: UpgradePair<Fixed64>,
    pub transfer_amount: UpgradePair<u32>,
    pub link_capacity: UpgradePair<u32>,
}

impl Upgrades {
    /// All pairs at the configured starting values.
    pub fn seeded(starting: &StartingValues) -> Self {
        Self {
            suction_speed: UpgradePair::seeded(starting.suction_speed),
            suction_amount: UpgradePair::seeded(starting.suction_amount),
            suction_range: UpgradePair::seeded(starting.suction_range),
            transfer_speed: UpgradePair::seeded(starting.transfer_speed),
            transfer_amount: UpgradePair::seeded(starting.transfer_amount),
            link_capacity: UpgradePair::seeded(starting.link_capacity),
        }
    }

    /// `current <= ceiling` (in each track's own order) for every pair.
    pub fn all_hold(&self) -> bool {
        self.suction_speed.holds(Direction::Descending)
            && self.transfer_speed.holds(Direction::Descending)
            && self.suction_amount.holds(Direction::Ascending)
            && self.suction_range.holds(Direction::Ascending)
            && self.transfer_amount.holds(Direction::Ascending)
            && self.link_capacity.holds(Direction::Ascending)
    }

    /// Current and ceiling of one attribute, as reportable values.
    pub fn level(&self, kind: UpgradeKind) -> (LevelValue, LevelValue) {
        fn secs(p: &UpgradePair<Fixed64>) -> (LevelValue, LevelValue) {
            (LevelValue::Seconds(p.current), LevelValue::Seconds(p.ceiling))
        }
        fn count(p: &UpgradePair<u32>) -> (LevelValue, LevelValue) {
            (LevelValue::Count(p.current), LevelValue::Count(p.ceiling))
        }
        match kind {
            UpgradeKind::SuctionSpeed => secs(&self.suction_speed),
            UpgradeKind::TransferSpeed => secs(&self.transfer_speed),
            UpgradeKind::SuctionAmount => count(&self.suction_amount),
            UpgradeKind::SuctionRange => count(&self.suction_range),
            UpgradeKind::TransferAmount => count(&self.transfer_amount),
            UpgradeKind::LinkCapacity => count(&self.link_capacity),
        }
    }
}

// ---------------------------------------------------------------------------
// UpgradeTracks (global configuration)
// ---------------------------------------------------------------------------

/// Unpaid adjustment direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjust {
    Increase,
    Decrease,
}

/// A successful paid upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub kind: UpgradeKind,
    pub level: LevelValue,
    pub price: Fixed64,
}

/// The six configured tracks. A `None` track was disabled by configuration
/// validation and rejects every purchase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpgradeTracks {
    pub suction_speed: Option<UpgradeTrack<Fixed64>>,
    pub suction_amount: Option<UpgradeTrack<u32>>,
    pub suction_range: Option<UpgradeTrack<u32>>,
    pub transfer_speed: Option<UpgradeTrack<Fixed64>>,
    pub transfer_amount: Option<UpgradeTrack<u32>>,
    pub link_capacity: Option<UpgradeTrack<u32>>,
}

fn purchase_pair<K: LevelKey>(
    kind: UpgradeKind,
    track: Option<&UpgradeTrack<K>>,
    pair: &mut UpgradePair<K>,
    actor: &Actor,
    currency: &mut dyn Currency,
) -> Result<(K, Fixed64), UpgradeError> {
    let track = track.ok_or(UpgradeError::TrackDisabled(kind))?;
    let (level, price) = track.next_upgrade(pair.ceiling).ok_or(UpgradeError::Maxed(kind))?;

    let balance = currency.balance(actor);
    if balance < price {
        return Err(UpgradeError::InsufficientFunds { kind, price, balance });
    }
    currency
        .withdraw(actor, price)
        .map_err(|_| UpgradeError::InsufficientFunds { kind, price, balance })?;

    pair.current = level;
    pair.ceiling = level;
    Ok((level, price))
}

fn adjust_pair<K: LevelKey>(
    kind: UpgradeKind,
    track: Option<&UpgradeTrack<K>>,
    pair: &mut UpgradePair<K>,
    adjust: Adjust,
) -> Result<K, UpgradeError> {
    let track = track.ok_or(UpgradeError::TrackDisabled(kind))?;
    let next = match adjust {
        Adjust::Increase => track.step_up(pair.current, pair.ceiling),
        Adjust::Decrease => track.step_down(pair.current),
    }
    .ok_or(UpgradeError::AtLimit(kind))?;
    pair.current = next;
    Ok(next)
}

impl UpgradeTracks {
    /// Disable every track that does not contain its starting value.
    /// Returns one error per disabled track.
    pub fn validate(&mut self, starting: &StartingValues) -> Vec<UpgradeError> {
        fn check<K: LevelKey>(
            track: &mut Option<UpgradeTrack<K>>,
            start: K,
            kind: UpgradeKind,
            errors: &mut Vec<UpgradeError>,
        ) {
            if track.as_ref().is_some_and(|t| !t.contains(start)) {
                *track = None;
                errors.push(UpgradeError::MissingStartingLevel(kind));
            }
        }

        use UpgradeKind::*;
        let s = starting;
        let mut errors = Vec::new();
        check(&mut self.suction_speed, s.suction_speed, SuctionSpeed, &mut errors);
        check(&mut self.suction_amount, s.suction_amount, SuctionAmount, &mut errors);
        check(&mut self.suction_range, s.suction_range, SuctionRange, &mut errors);
        check(&mut self.transfer_speed, s.transfer_speed, TransferSpeed, &mut errors);
        check(&mut self.transfer_amount, s.transfer_amount, TransferAmount, &mut errors);
        check(&mut self.link_capacity, s.link_capacity, LinkCapacity, &mut errors);
        errors
    }

    /// Buy the next level of `kind`. On any error nothing is debited and
    /// `upgrades` is unchanged.
    pub fn purchase(
        &self,
        kind: UpgradeKind,
        upgrades: &mut Upgrades,
        actor: &Actor,
        currency: &mut dyn Currency,
    ) -> Result<PurchaseReceipt, UpgradeError> {
        let (level, price) = match kind {
            UpgradeKind::SuctionSpeed => {
                let (k, p) = purchase_pair(
                    kind,
                    self.suction_speed.as_ref(),
                    &mut upgrades.suction_speed,
                    actor,
                    currency,
                )?;
                (LevelValue::Seconds(k), p)
            }
            UpgradeKind::TransferSpeed => {
                let (k, p) = purchase_pair(
                    kind,
                    self.transfer_speed.as_ref(),
                    &mut upgrades.transfer_speed,
                    actor,
                    currency,
                )?;
                (LevelValue::Seconds(k), p)
            }
            UpgradeKind::SuctionAmount => {
                let (k, p) = purchase_pair(
                    kind,
                    self.suction_amount.as_ref(),
                    &mut upgrades.suction_amount,
                    actor,
                    currency,
                )?;
                (LevelValue::Count(k), p)
            }
            UpgradeKind::SuctionRange => {
                let (k, p) = purchase_pair(
                    kind,
                    self.suction_range.as_ref(),
                    &mut upgrades.suction_range,
                    actor,
                    currency,
                )?;
                (LevelValue::Count(k), p)
            }
            UpgradeKind::TransferAmount => {
                let (k, p) = purchase_pair(
                    kind,
                    self.transfer_amount.as_ref(),
                    &mut upgrades.transfer_amount,
                    actor,
                    currency,
                )?;
                (LevelValue::Count(k), p)
            }
            UpgradeKind::LinkCapacity => {
                let (k, p) = purchase_pair(
                    kind,
                    self.link_capacity.as_ref(),
                    &mut upgrades.link_capacity,
                    actor,
                    currency,
                )?;
                (LevelValue::Count(k), p)
            }
        };
        Ok(PurchaseReceipt { kind, level, price })
    }

    /// Move `current` of `kind` one step without paying.
    pub fn adjust(
        &self,
        kind: UpgradeKind,
        upgrades: &mut Upgrades,
        adjust: Adjust,
    ) -> Result<LevelValue, UpgradeError> {
        Ok(match kind {
            UpgradeKind::SuctionSpeed => {
                let level = adjust_pair(
                    kind,
                    self.suction_speed.as_ref(),
                    &mut upgrades.suction_speed,
                    adjust,
                )?;
                LevelValue::Seconds(level)
            }
            UpgradeKind::TransferSpeed => {
                let level = adjust_pair(
                    kind,
                    self.transfer_speed.as_ref(),
                    &mut upgrades.transfer_speed,
                    adjust,
                )?;
                LevelValue::Seconds(level)
            }
            UpgradeKind::SuctionAmount => {
                let level = adjust_pair(
                    kind,
                    self.suction_amount.as_ref(),
                    &mut upgrades.suction_amount,
                    adjust,
                )?;
                LevelValue::Count(level)
            }
            UpgradeKind::SuctionRange => {
                let level = adjust_pair(
                    kind,
                    self.suction_range.as_ref(),
                    &mut upgrades.suction_range,
                    adjust,
                )?;
                LevelValue::Count(level)
            }
            UpgradeKind::TransferAmount => {
                let level = adjust_pair(
                    kind,
                    self.transfer_amount.as_ref(),
                    &mut upgrades.transfer_amount,
                    adjust,
                )?;
                LevelValue::Count(level)
            }
            UpgradeKind::LinkCapacity => {
                let level = adjust_pair(
                    kind,
                    self.link_capacity.as_ref(),
                    &mut upgrades.link_capacity,
                    adjust,
                )?;
                LevelValue::Count(level)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpgradeError {
    #[error("{0} is already at its maximum level")]
    Maxed(UpgradeKind),

    #[error("{kind} upgrade costs {price}, balance is {balance}")]
    InsufficientFunds {
        kind: UpgradeKind,
        price: Fixed64,
        balance: Fixed64,
    },

    #[error("{0} cannot be adjusted further in that direction")]
    AtLimit(UpgradeKind),

    #[error("{0} upgrades are disabled by configuration")]
    TrackDisabled(UpgradeKind),

    #[error("{0} upgrade track has no levels")]
    EmptyTrack(UpgradeKind),

    #[error("{kind} upgrade track lists level {level} twice")]
    DuplicateLevel { kind: UpgradeKind, level: String },

    #[error("{kind} upgrade track has a negative price at level {level}")]
    NegativePrice { kind: UpgradeKind, level: String },

    #[error("{kind} upgrade track has an unusable entry at level {level}: {reason}")]
    InvalidLevel {
        kind: UpgradeKind,
        level: String,
        reason: &'static str,
    },

    #[error("{0} upgrade track does not contain the starting value")]
    MissingStartingLevel(UpgradeKind),

    #[error("link capacity {capacity} would be below the {links} existing links")]
    BelowLinkCount { links: usize, capacity: u32 },
}

// ===========================================================================
// Tests
// ===========================================================================
