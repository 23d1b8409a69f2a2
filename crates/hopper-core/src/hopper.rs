//! The hopper aggregate: identity, access, filters, links, upgrades, and
//! rate-limit timers.
//!
//! Fields are private so the two entity invariants hold after every
//! mutation:
//!
//! - every upgrade pair has `current` no better than `ceiling`;
//! - `links.len() <= link_capacity.current`.

use crate::filter::{Filter, FilterType};
use crate::fixed::{Fixed64, Millis};
use crate::hooks::{Actor, Currency};
use crate::id::{ActorId, ItemTypeId, Location};
use crate::rate::{ActionKind, RateLimiter};
use crate::settings::StartingValues;
use crate::upgrade::{
    Adjust, LevelValue, PurchaseReceipt, UpgradeError, UpgradeKind, UpgradeTracks, Upgrades,
};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// An output destination with its own filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub location: Location,
    pub filter: Filter,
}

impl Link {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            filter: Filter::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkToggle {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("link capacity of {capacity} reached")]
    CapacityExhausted { capacity: u32 },
    #[error("a hopper cannot link to itself")]
    SelfLink,
    #[error("no link to {0}")]
    NotLinked(Location),
    #[error("no container at {0}")]
    NoContainer(Location),
}

// ---------------------------------------------------------------------------
// HopperEntity
// ---------------------------------------------------------------------------

/// Everything needed to rebuild a hopper, before invariants are enforced.
#[derive(Debug, Clone)]
pub struct HopperParts {
    pub location: Location,
    pub owner: Option<ActorId>,
    pub members: BTreeSet<ActorId>,
    pub enabled: bool,
    pub particles_enabled: bool,
    pub input_filter: Filter,
    pub links: Vec<Link>,
    pub upgrades: Upgrades,
    pub timers: RateLimiter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopperEntity {
    location: Location,
    owner: Option<ActorId>,
    members: BTreeSet<ActorId>,
    enabled: bool,
    particles_enabled: bool,
    input_filter: Filter,
    links: Vec<Link>,
    upgrades: Upgrades,
    timers: RateLimiter,
}

impl HopperEntity {
    /// A freshly placed hopper with starting upgrades, eligible at `now`.
    pub fn new(
        location: Location,
        owner: Option<ActorId>,
        starting: &StartingValues,
        now: Millis,
    ) -> Self {
        Self {
            location,
            owner,
            members: BTreeSet::new(),
            enabled: true,
            particles_enabled: true,
            input_filter: Filter::default(),
            links: Vec::new(),
            upgrades: Upgrades::seeded(starting),
            timers: RateLimiter::starting_at(now),
        }
    }

    /// Rebuild from decoded parts. Self-links and duplicate links are
    /// dropped, and links beyond the capacity are truncated.
    pub fn from_parts(parts: HopperParts) -> Self {
        let mut seen = BTreeSet::new();
        let mut links: Vec<Link> = parts
            .links
            .into_iter()
            .filter(|l| l.location != parts.location && seen.insert(l.location))
            .collect();
        let capacity = parts.upgrades.link_capacity.current() as usize;
        if links.len() > capacity {
            tracing::warn!(
                location = %parts.location,
                links = links.len(),
                capacity,
                "truncating links beyond capacity"
            );
            links.truncate(capacity);
        }
        Self {
            location: parts.location,
            owner: parts.owner,
            members: parts.members,
            enabled: parts.enabled,
            particles_enabled: parts.particles_enabled,
            input_filter: parts.input_filter,
            links,
            upgrades: parts.upgrades,
            timers: parts.timers,
        }
    }

    // -- read accessors -----------------------------------------------------

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn owner(&self) -> Option<ActorId> {
        self.owner
    }

    pub fn members(&self) -> &BTreeSet<ActorId> {
        &self.members
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn particles_enabled(&self) -> bool {
        self.particles_enabled
    }

    pub fn input_filter(&self) -> &Filter {
        &self.input_filter
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, location: Location) -> Option<&Link> {
        self.links.iter().find(|l| l.location == location)
    }

    pub fn is_linked_to(&self, location: Location) -> bool {
        self.link(location).is_some()
    }

    pub fn upgrades(&self) -> &Upgrades {
        &self.upgrades
    }

    pub fn timers(&self) -> &RateLimiter {
        &self.timers
    }

    pub fn link_capacity(&self) -> u32 {
        self.upgrades.link_capacity.current()
    }

    /// Current seconds per action.
    pub fn speed(&self, kind: ActionKind) -> Fixed64 {
        match kind {
            ActionKind::Suction => self.upgrades.suction_speed.current(),
            ActionKind::Transfer => self.upgrades.transfer_speed.current(),
        }
    }

    /// Current units per action.
    pub fn amount(&self, kind: ActionKind) -> u32 {
        match kind {
            ActionKind::Suction => self.upgrades.suction_amount.current(),
            ActionKind::Transfer => self.upgrades.transfer_amount.current(),
        }
    }

    pub fn suction_range(&self) -> u32 {
        self.upgrades.suction_range.current()
    }

    // -- access -------------------------------------------------------------

    /// Owner, members, and admins may manage a hopper. Unclaimed hoppers are
    /// open to everyone.
    pub fn can_manage(&self, actor: &Actor) -> bool {
        actor.admin
            || match self.owner {
                None => true,
                Some(owner) => owner == actor.id || self.members.contains(&actor.id),
            }
    }

    pub fn add_member(&mut self, id: ActorId) -> bool {
        if self.owner == Some(id) {
            return false;
        }
        self.members.insert(id)
    }

    pub fn remove_member(&mut self, id: ActorId) -> bool {
        self.members.remove(&id)
    }

    /// Bind a restored hopper to its new owner and position.
    pub fn rebind(&mut self, owner: Option<ActorId>, location: Location, now: Millis) {
        self.owner = owner;
        if let Some(id) = owner {
            self.members.remove(&id);
        }
        self.location = location;
        self.links.retain(|l| l.location != location);
        self.timers = RateLimiter::starting_at(now);
    }

    // -- flags --------------------------------------------------------------

    pub fn toggle_enabled(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn toggle_particles(&mut self) -> bool {
        self.particles_enabled = !self.particles_enabled;
        self.particles_enabled
    }

    // -- input filter -------------------------------------------------------

    pub fn cycle_input_filter(&mut self) -> FilterType {
        self.input_filter.cycle()
    }

    pub fn add_input_filter_item(&mut self, item: ItemTypeId) -> bool {
        self.input_filter.add_item(item)
    }

    pub fn remove_input_filter_item(&mut self, item: ItemTypeId) -> bool {
        self.input_filter.remove_item(item)
    }

    // -- links --------------------------------------------------------------

    /// Unlink `dest` if linked, otherwise link it when capacity allows.
    pub fn toggle_link(&mut self, dest: Location) -> Result<LinkToggle, LinkError> {
        if let Some(idx) = self.links.iter().position(|l| l.location == dest) {
            self.links.remove(idx);
            return Ok(LinkToggle::Removed);
        }
        if dest == self.location {
            return Err(LinkError::SelfLink);
        }
        let capacity = self.link_capacity();
        if self.links.len() >= capacity as usize {
            return Err(LinkError::CapacityExhausted { capacity });
        }
        self.links.push(Link::new(dest));
        Ok(LinkToggle::Added)
    }

    fn link_mut(&mut self, dest: Location) -> Result<&mut Link, LinkError> {
        self.links
            .iter_mut()
            .find(|l| l.location == dest)
            .ok_or(LinkError::NotLinked(dest))
    }

    pub fn cycle_link_filter(&mut self, dest: Location) -> Result<FilterType, LinkError> {
        Ok(self.link_mut(dest)?.filter.cycle())
    }

    pub fn add_link_filter_item(
        &mut self,
        dest: Location,
        item: ItemTypeId,
    ) -> Result<bool, LinkError> {
        Ok(self.link_mut(dest)?.filter.add_item(item))
    }

    pub fn remove_link_filter_item(
        &mut self,
        dest: Location,
        item: ItemTypeId,
    ) -> Result<bool, LinkError> {
        Ok(self.link_mut(dest)?.filter.remove_item(item))
    }

    /// Drop the link to a container that no longer exists.
    pub fn remove_links_to(&mut self, dest: Location) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.location != dest);
        self.links.len() != before
    }

    // -- upgrades -----------------------------------------------------------

    pub fn purchase_upgrade(
        &mut self,
        tracks: &UpgradeTracks,
        kind: UpgradeKind,
        actor: &Actor,
        currency: &mut dyn Currency,
    ) -> Result<PurchaseReceipt, UpgradeError> {
        tracks.purchase(kind, &mut self.upgrades, actor, currency)
    }

    /// Unpaid step of `current`. Link capacity may not drop below the
    /// number of existing links.
    pub fn adjust_upgrade(
        &mut self,
        tracks: &UpgradeTracks,
        kind: UpgradeKind,
        adjust: Adjust,
    ) -> Result<LevelValue, UpgradeError> {
        let mut staged = self.upgrades;
        let level = tracks.adjust(kind, &mut staged, adjust)?;
        let capacity = staged.link_capacity.current();
        if (capacity as usize) < self.links.len() {
            return Err(UpgradeError::BelowLinkCount {
                links: self.links.len(),
                capacity,
            });
        }
        self.upgrades = staged;
        Ok(level)
    }

    // -- timers -------------------------------------------------------------

    pub fn is_eligible(&self, kind: ActionKind, now: Millis) -> bool {
        self.timers.is_eligible(kind, now)
    }

    /// Schedule the next action of `kind` from the current speed.
    pub fn record_success(&mut self, kind: ActionKind, now: Millis) {
        let speed = self.speed(kind);
        self.timers.record_success(kind, now, speed);
    }

    /// Reset timers as if the hopper had just been loaded at `now`.
    pub fn schedule_after_load(&mut self, now: Millis) {
        let suction = self.speed(ActionKind::Suction);
        let transfer = self.speed(ActionKind::Transfer);
        self.timers = RateLimiter::loaded_at(now, suction, transfer);
    }

    pub fn invariants_hold(&self) -> bool {
        self.upgrades.all_hold() && self.links.len() <= self.link_capacity() as usize
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::upgrade::UpgradePair;

    fn hopper_with_capacity(capacity: u32) -> HopperEntity {
        let mut hopper = HopperEntity::new(loc(0, 64, 0), Some(player(1).id), &test_starting(), 0);
        hopper.upgrades.link_capacity = UpgradePair::seeded(capacity);
        hopper
    }

    // -----------------------------------------------------------------------
    // Test 1: new_hopper_is_seeded_and_eligible
    // -----------------------------------------------------------------------
    #[test]
    fn new_hopper_is_seeded_and_eligible() {
        let hopper = HopperEntity::new(loc(0, 64, 0), None, &test_starting(), 500);
        assert!(hopper.is_enabled());
        assert!(hopper.particles_enabled());
        assert_eq!(hopper.amount(ActionKind::Transfer), 1);
        assert_eq!(hopper.speed(ActionKind::Suction), fixed(1.0));
        assert!(hopper.is_eligible(ActionKind::Suction, 500));
        assert!(hopper.invariants_hold());
    }

    // -----------------------------------------------------------------------
    // Test 2: link_capacity_is_enforced
    // -----------------------------------------------------------------------
    #[test]
    fn link_capacity_is_enforced() {
        let mut hopper = hopper_with_capacity(2);
        assert_eq!(hopper.toggle_link(loc(1, 64, 0)), Ok(LinkToggle::Added));
        assert_eq!(hopper.toggle_link(loc(2, 64, 0)), Ok(LinkToggle::Added));
        assert_eq!(
            hopper.toggle_link(loc(3, 64, 0)),
            Err(LinkError::CapacityExhausted { capacity: 2 })
        );

        assert_eq!(hopper.toggle_link(loc(1, 64, 0)), Ok(LinkToggle::Removed));
        assert_eq!(hopper.toggle_link(loc(3, 64, 0)), Ok(LinkToggle::Added));
        assert_eq!(hopper.links().len(), 2);
        assert!(hopper.invariants_hold());
    }

    // -----------------------------------------------------------------------
    // Test 3: self_link_is_rejected
    // -----------------------------------------------------------------------
    #[test]
    fn self_link_is_rejected() {
        let mut hopper = hopper_with_capacity(2);
        assert_eq!(hopper.toggle_link(hopper.location()), Err(LinkError::SelfLink));
    }

    // -----------------------------------------------------------------------
    // Test 4: link_filters_are_independent
    // -----------------------------------------------------------------------
    #[test]
    fn link_filters_are_independent() {
        let mut hopper = hopper_with_capacity(2);
        let a = loc(1, 64, 0);
        let b = loc(2, 64, 0);
        hopper.toggle_link(a).unwrap();
        hopper.toggle_link(b).unwrap();

        assert_eq!(hopper.cycle_link_filter(a), Ok(FilterType::Whitelist));
        assert_eq!(hopper.add_link_filter_item(a, coal()), Ok(true));
        assert_eq!(hopper.link(b).unwrap().filter.filter_type, FilterType::None);
        assert_eq!(hopper.input_filter().filter_type, FilterType::None);
        assert_eq!(
            hopper.cycle_link_filter(loc(9, 64, 0)),
            Err(LinkError::NotLinked(loc(9, 64, 0)))
        );
    }

    // -----------------------------------------------------------------------
    // Test 5: access_rules
    // -----------------------------------------------------------------------
    #[test]
    fn access_rules() {
        let mut hopper = hopper_with_capacity(1);
        let owner = player(1);
        let friend = player(2);
        let stranger = player(3);

        assert!(hopper.can_manage(&owner));
        assert!(!hopper.can_manage(&friend));
        assert!(hopper.add_member(friend.id));
        assert!(hopper.can_manage(&friend));
        assert!(!hopper.can_manage(&stranger));
        assert!(hopper.can_manage(&Actor::admin(stranger.id)));
        // The owner is never a member of their own hopper.
        assert!(!hopper.add_member(owner.id));
    }

    // -----------------------------------------------------------------------
    // Test 6: capacity_decrease_below_link_count_is_rejected
    // -----------------------------------------------------------------------
    #[test]
    fn capacity_decrease_below_link_count_is_rejected() {
        let tracks = test_tracks();
        let mut hopper = hopper_with_capacity(2);
        hopper.toggle_link(loc(1, 64, 0)).unwrap();
        hopper.toggle_link(loc(2, 64, 0)).unwrap();

        let err = hopper
            .adjust_upgrade(&tracks, UpgradeKind::LinkCapacity, Adjust::Decrease)
            .unwrap_err();
        assert_eq!(err, UpgradeError::BelowLinkCount { links: 2, capacity: 1 });
        assert_eq!(hopper.link_capacity(), 2);

        hopper.toggle_link(loc(2, 64, 0)).unwrap();
        assert_eq!(
            hopper.adjust_upgrade(&tracks, UpgradeKind::LinkCapacity, Adjust::Decrease),
            Ok(LevelValue::Count(1))
        );
        assert!(hopper.invariants_hold());
    }

    // -----------------------------------------------------------------------
    // Test 7: from_parts_repairs_links
    // -----------------------------------------------------------------------
    #[test]
    fn from_parts_repairs_links() {
        let here = loc(0, 64, 0);
        let parts = HopperParts {
            location: here,
            owner: None,
            members: BTreeSet::new(),
            enabled: true,
            particles_enabled: false,
            input_filter: Filter::default(),
            links: vec![
                Link::new(here),
                Link::new(loc(1, 64, 0)),
                Link::new(loc(1, 64, 0)),
                Link::new(loc(2, 64, 0)),
            ],
            upgrades: Upgrades::seeded(&test_starting()),
            timers: RateLimiter::default(),
        };
        let hopper = HopperEntity::from_parts(parts);
        assert_eq!(hopper.links().len(), 1);
        assert_eq!(hopper.links()[0].location, loc(1, 64, 0));
        assert!(hopper.invariants_hold());
    }

    // -----------------------------------------------------------------------
    // Test 8: success_uses_current_speed
    // -----------------------------------------------------------------------
    #[test]
    fn success_uses_current_speed() {
        let mut hopper = hopper_with_capacity(1);
        hopper.upgrades.transfer_speed = UpgradePair::seeded(fixed(0.25));
        hopper.record_success(ActionKind::Transfer, 1_000);
        assert_eq!(hopper.timers().next_time(ActionKind::Transfer), 1_250);
        assert!(hopper.is_eligible(ActionKind::Suction, 1_000));
    }

    // -----------------------------------------------------------------------
    // Test 9: rebind_moves_ownership_and_drops_self_link
    // -----------------------------------------------------------------------
    #[test]
    fn rebind_moves_ownership_and_drops_self_link() {
        let mut hopper = hopper_with_capacity(2);
        let target = loc(1, 64, 0);
        hopper.toggle_link(target).unwrap();
        hopper.add_member(player(2).id);

        hopper.rebind(Some(player(2).id), target, 10);
        assert_eq!(hopper.owner(), Some(player(2).id));
        assert!(!hopper.members().contains(&player(2).id));
        assert!(hopper.links().is_empty());
        assert_eq!(hopper.location(), target);
    }
}
