//! The hopper engine: tick driver, world-event dispatch, place/break
//! lifecycle, and the mutations the presentation layer calls.
//!
//! # Step Pipeline
//!
//! Each call to [`Engine::step`] runs three phases in order:
//!
//! 1. **Deferred drain** -- replay native moves suppressed during the
//!    previous step, re-validating each entry first.
//! 2. **Suction** -- every due hopper captures nearby ground items.
//! 3. **Transfer** -- every due hopper pushes into its linked containers.
//!
//! While paused, `step` does nothing and the deferred queue is retained.

use crate::adapter;
use crate::cache::HopperCache;
use crate::deferred::{DeferredEntry, DeferredQueue};
use crate::error::HopperError;
use crate::event::{
    DispatchTable, EventBuffer, HopperEvent, PlacedBlock, Verdict, WorldEvent, WorldEventKind,
};
use crate::filter::{Filter, FilterDecision, FilterType, TransferTally};
use crate::fixed::{Fixed64, Millis};
use crate::hooks::{Actor, Hooks};
use crate::hopper::{HopperEntity, LinkError, LinkToggle};
use crate::id::{ActorId, GroundItemId, ItemTypeId, Location, RegionId};
use crate::item::{Container, ItemStack};
use crate::persist::{Codec, EncodedRecord};
use crate::rate::ActionKind;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::store::HopperStore;
use crate::transfer;
use crate::upgrade::{Adjust, LevelValue, PurchaseReceipt, UpgradeKind};
use crate::world::World;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one call to [`Engine::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub deferred_executed: u32,
    pub deferred_dropped: u32,
    /// Hoppers whose suction fired.
    pub suctions: u32,
    /// Hoppers whose transfer fired.
    pub transfers: u32,
    pub captured: u32,
    pub moved: u32,
    pub destroyed: u32,
}

impl TickReport {
    fn absorb(&mut self, tally: &TransferTally) {
        self.moved += tally.moved;
        self.destroyed += tally.destroyed;
    }
}

/// What breaking a hopper hands back to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenHopper {
    /// The reclaimable hopper item's record.
    pub item_record: EncodedRecord,
    /// Contents returned to the breaker. Empty when contents were dropped
    /// on the ground instead.
    pub returned: Vec<ItemStack>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    registry: Registry,
    settings: Settings,
    /// The host world. Hosts mirror their own containers and ground items
    /// into it.
    pub world: World,
    cache: HopperCache,
    deferred: DeferredQueue,
    hooks: Hooks,
    dispatch: DispatchTable,
    events: EventBuffer,
    paused: bool,
    tick: u64,
    now: Millis,
}

impl Engine {
    pub fn new(
        registry: Registry,
        settings: Settings,
        store: impl HopperStore + 'static,
        mut hooks: Hooks,
    ) -> Self {
        let disabled = hooks
            .stacking
            .as_ref()
            .is_some_and(|hook| !settings.hook_enabled(hook.name()));
        if disabled {
            tracing::info!("stacking hook disabled by configuration");
            hooks.stacking = None;
        }
        Self {
            registry,
            settings,
            world: World::new(),
            cache: HopperCache::new(store),
            deferred: DeferredQueue::new(),
            hooks,
            dispatch: standard_dispatch(),
            events: EventBuffer::default(),
            paused: false,
            tick: 0,
            now: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &HopperCache {
        &self.cache
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn dispatch_table_mut(&mut self) -> &mut DispatchTable {
        &mut self.dispatch
    }

    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    /// Take every outbound event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<HopperEvent> {
        self.events.drain()
    }

    /// A snapshot of the hopper at `location`.
    pub fn hopper(&self, location: Location) -> Option<HopperEntity> {
        self.cache.get(location)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    /// Set the clock without stepping. Used by hosts that dispatch events
    /// between steps.
    pub fn set_now(&mut self, now: Millis) {
        self.now = now;
    }

    pub fn codec(&self) -> Codec<'_> {
        Codec::new(&self.registry, &self.settings.starting)
    }

    // -----------------------------------------------------------------------
    // Pause
    // -----------------------------------------------------------------------

    /// Suspend all scans. Deferred entries already queued are kept.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Advance the engine to `now`. See the module docs for the phases.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn step(&mut self, now: Millis) -> TickReport {
        if self.paused {
            return TickReport {
                tick: self.tick,
                ..TickReport::default()
            };
        }
        self.tick += 1;
        self.now = now;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        self.phase_deferred(&mut report);
        self.phase_suction(&mut report);
        self.phase_transfer(&mut report);

        tracing::debug!(
            suctions = report.suctions,
            transfers = report.transfers,
            deferred = report.deferred_executed,
            dropped = report.deferred_dropped,
            events_dropped = self.events.dropped_count(),
            "step complete"
        );
        report
    }

    /// Locations of hoppers whose `kind` action is due at `now`.
    fn due_hoppers(&self, kind: ActionKind) -> Vec<Location> {
        let hoppers = self.cache.snapshot();
        let world = &self.world;
        let now = self.now;
        let is_due = |h: &HopperEntity| {
            let loc = h.location();
            h.is_enabled()
                && h.is_eligible(kind, now)
                && world.is_available(loc)
                && match kind {
                    ActionKind::Suction => true,
                    ActionKind::Transfer => !world.is_powered(loc) && !h.links().is_empty(),
                }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            hoppers.par_iter().filter(|h| is_due(h)).map(|h| h.location()).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            hoppers.iter().filter(|h| is_due(h)).map(|h| h.location()).collect()
        }
    }

    // -----------------------------------------------------------------------
    // Phase 1: Deferred drain
    // -----------------------------------------------------------------------

    fn phase_deferred(&mut self, report: &mut TickReport) {
        for entry in self.deferred.drain() {
            match self.execute_deferred(entry) {
                Some(tally) => {
                    report.deferred_executed += 1;
                    report.absorb(&tally);
                }
                None => {
                    report.deferred_dropped += 1;
                    tracing::debug!(
                        source = %entry.source,
                        dest = %entry.dest,
                        "dropped deferred entry"
                    );
                }
            }
        }
    }

    /// Re-validate and replay one entry. `None` means it was dropped.
    fn execute_deferred(&mut self, entry: DeferredEntry) -> Option<TransferTally> {
        let initiator = entry.initiator();
        let action = entry.action();
        let mut hopper = self.cache.get(initiator)?;
        if !hopper.is_enabled()
            || self.world.is_powered(initiator)
            || !hopper.is_eligible(action, self.now)
            || !self.world.is_available(entry.source)
            || !self.world.is_available(entry.dest)
        {
            return None;
        }

        let filter = self.deferred_filter(&entry);
        let amount = hopper.amount(action);
        let registry = &self.registry;
        let tally = self.world.with_pair(entry.source, entry.dest, |src, dst| {
            adapter::transfer(src, dst, &filter, amount, registry)
        })?;

        if tally.fired() {
            hopper.record_success(action, self.now);
            self.cache.put(hopper);
            self.emit_transfer(initiator, entry.dest, &tally);
        }
        Some(tally)
    }

    /// The filter governing a replayed move: the destination hopper's input
    /// filter, else the source hopper's link filter, else no filter.
    fn deferred_filter(&self, entry: &DeferredEntry) -> Filter {
        if let Some(filter) = self.cache.with(entry.dest, |h| h.input_filter().clone()) {
            return filter;
        }
        self.cache
            .with(entry.source, |h| h.link(entry.dest).map(|l| l.filter.clone()))
            .flatten()
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Phase 2: Suction
    // -----------------------------------------------------------------------

    fn phase_suction(&mut self, report: &mut TickReport) {
        for location in self.due_hoppers(ActionKind::Suction) {
            let (captured, destroyed) = self.suction(location);
            if captured + destroyed > 0 {
                report.suctions += 1;
                report.captured += captured;
                report.destroyed += destroyed;
            }
        }
    }

    /// Capture ground items around the hopper at `location`. Returns
    /// `(captured, destroyed)`.
    fn suction(&mut self, location: Location) -> (u32, u32) {
        let Some(mut hopper) = self.cache.get(location) else {
            return (0, 0);
        };
        // Stored ranges are any u32; the box saturates instead of overflowing.
        let half_extent = Fixed64::saturating_from_num(hopper.suction_range())
            .saturating_add(Fixed64::from_num(0.5));
        let nearby = self.world.ground_items_near(location, half_extent);

        let mut budget = hopper.amount(ActionKind::Suction);
        let mut captured = 0;
        let mut destroyed: BTreeMap<ItemTypeId, u32> = BTreeMap::new();

        for id in nearby {
            if budget == 0 {
                break;
            }
            let Some(item) = self.world.ground_item(id) else {
                continue;
            };
            let item_type = item.stack.item_type;
            let take = self.hooks.ground_amount(id, item).min(budget);
            if take == 0 {
                continue;
            }

            match hopper.input_filter().decide(item_type) {
                FilterDecision::Reject => continue,
                FilterDecision::Destroy => {
                    self.reduce_ground_item(id, take);
                    *destroyed.entry(item_type).or_default() += take;
                    budget -= take;
                }
                FilterDecision::Pass => {
                    let mut incoming = Some(item.stack.split_off(take));
                    let Some(container) = self.world.container_mut(location) else {
                        break;
                    };
                    let moved =
                        transfer::transfer_slot(&mut incoming, container, take, &self.registry);
                    if moved > 0 {
                        self.reduce_ground_item(id, moved);
                        captured += moved;
                        budget -= moved;
                    }
                }
            }
        }

        let destroyed_total: u32 = destroyed.values().sum();
        if captured + destroyed_total > 0 {
            hopper.record_success(ActionKind::Suction, self.now);
            let particles = hopper.particles_enabled();
            self.cache.put(hopper);
            self.events.push(HopperEvent::SuctionCompleted {
                hopper: location,
                captured,
                destroyed: destroyed_total,
            });
            for (item_type, count) in destroyed {
                self.events.push(HopperEvent::ItemsDestroyed {
                    hopper: location,
                    item_type,
                    count,
                });
            }
            if particles {
                self.events.push(HopperEvent::Particles { hopper: location });
            }
        }
        (captured, destroyed_total)
    }

    /// Remove `by` units from a ground item, through the stacking hook when
    /// one is installed. The item is despawned at zero.
    fn reduce_ground_item(&mut self, id: GroundItemId, by: u32) {
        let Some(item) = self.world.ground_item_mut(id) else {
            return;
        };
        let remaining = match self.hooks.stacking.as_mut() {
            Some(hook) => {
                let remaining = hook.get_stack_count(id, item).saturating_sub(by);
                if remaining > 0 {
                    hook.set_stack_count(id, item, remaining);
                }
                remaining
            }
            None => {
                item.stack.count = item.stack.count.saturating_sub(by);
                item.stack.count
            }
        };
        if remaining == 0 {
            self.world.remove_ground_item(id);
        }
    }

    // -----------------------------------------------------------------------
    // Phase 3: Transfer
    // -----------------------------------------------------------------------

    fn phase_transfer(&mut self, report: &mut TickReport) {
        for location in self.due_hoppers(ActionKind::Transfer) {
            let tally = self.transfer_from(location);
            if tally.fired() {
                report.transfers += 1;
                report.absorb(&tally);
            }
        }
    }

    /// Push from the hopper at `location` into its links: hopper slots in
    /// order, then links in order, until the transfer amount is spent.
    fn transfer_from(&mut self, location: Location) -> TransferTally {
        let mut total = TransferTally::default();
        let Some(mut hopper) = self.cache.get(location) else {
            return total;
        };
        let Some(slot_count) = self.world.container(location).map(Container::size) else {
            return total;
        };
        let amount = hopper.amount(ActionKind::Transfer);
        let links = hopper.links().to_vec();
        let mut per_dest: BTreeMap<Location, TransferTally> = BTreeMap::new();

        'slots: for slot in 0..slot_count {
            for link in &links {
                let budget = amount.saturating_sub(total.consumed());
                if budget == 0 {
                    break 'slots;
                }
                if !self.world.is_available(link.location) {
                    continue;
                }
                let registry = &self.registry;
                let step = self.world.with_pair(location, link.location, |src, dst| {
                    if dst.is_full(registry) {
                        return TransferTally::default();
                    }
                    let Some(cell) = src.slots.get_mut(slot) else {
                        return TransferTally::default();
                    };
                    let step = link.filter.apply_to_slot(cell, budget, |s, b| {
                        adapter::insert_into(dst, s, b, registry)
                    });
                    src.normalize();
                    step
                });
                let Some(step) = step else {
                    continue;
                };
                if step.fired() {
                    per_dest.entry(link.location).or_default().absorb(step);
                    total.absorb(step);
                }
                let empty = self
                    .world
                    .container(location)
                    .is_none_or(|c| c.get(slot).is_none());
                if empty {
                    break;
                }
            }
        }

        if total.fired() {
            hopper.record_success(ActionKind::Transfer, self.now);
            self.cache.put(hopper);
            for (dest, tally) in per_dest {
                self.emit_transfer(location, dest, &tally);
            }
        }
        total
    }

    fn emit_transfer(&mut self, hopper: Location, dest: Location, tally: &TransferTally) {
        if tally.moved > 0 {
            self.events.push(HopperEvent::TransferCompleted {
                hopper,
                dest,
                moved: tally.moved,
            });
        }
        if let (true, Some(item_type)) = (tally.destroyed > 0, tally.destroyed_type) {
            self.events.push(HopperEvent::ItemsDestroyed {
                hopper,
                item_type,
                count: tally.destroyed,
            });
        }
    }

    // -----------------------------------------------------------------------
    // World events
    // -----------------------------------------------------------------------

    /// Route a host event through the dispatch table. Kinds without a
    /// handler are allowed.
    pub fn dispatch(&mut self, event: &WorldEvent) -> Result<Verdict, HopperError> {
        match self.dispatch.handler(event.kind()) {
            Some(handler) => handler(self, event),
            None => Ok(Verdict::Allow),
        }
    }

    /// Suppress a native move touching a hopper, queueing it for the next
    /// step when the initiating hopper could act now.
    fn handle_native_move(&mut self, source: Location, dest: Location) -> Verdict {
        let source_is_hopper = self.cache.contains(source);
        let dest_is_hopper = self.cache.contains(dest);
        if !source_is_hopper && !dest_is_hopper {
            return Verdict::Allow;
        }
        if self.paused {
            return Verdict::Cancel;
        }

        let entry = DeferredEntry {
            source,
            dest,
            is_suction_side: dest_is_hopper,
            is_transfer_side: source_is_hopper,
        };
        let now = self.now;
        let ready = self
            .cache
            .with(entry.initiator(), |h| h.is_enabled() && h.is_eligible(entry.action(), now))
            .unwrap_or(false);
        if ready {
            self.deferred.push(entry);
        }
        Verdict::Cancel
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    fn require_build(&self, actor: &Actor, location: Location) -> Result<(), HopperError> {
        if self.hooks.access.can_build(actor, location) {
            Ok(())
        } else {
            Err(HopperError::AccessDenied {
                actor: actor.id,
                location,
            })
        }
    }

    /// Place a hopper. A record from a broken hopper restores its upgrades,
    /// filters, and links under the new owner and location.
    pub fn place_hopper(
        &mut self,
        actor: &Actor,
        location: Location,
        record: Option<&EncodedRecord>,
    ) -> Result<(), HopperError> {
        self.require_build(actor, location)?;

        let restored = match record {
            Some(bytes) => self
                .codec()
                .decode_bytes(bytes, self.now)
                .map_err(crate::store::StoreError::from)?,
            None => None,
        };
        let hopper = match restored {
            Some(mut hopper) => {
                hopper.rebind(Some(actor.id), location, self.now);
                hopper
            }
            None => HopperEntity::new(location, Some(actor.id), &self.settings.starting, self.now),
        };

        self.world.place_container(location, Container::hopper());
        self.cache.put(hopper);
        self.cache.save(location, &self.codec())?;
        tracing::info!(%location, owner = %actor.id, "hopper placed");
        self.events.push(HopperEvent::HopperPlaced {
            hopper: location,
            owner: Some(actor.id),
        });
        Ok(())
    }

    /// Place any non-hopper container.
    pub fn place_container(
        &mut self,
        actor: &Actor,
        location: Location,
        container: Container,
    ) -> Result<(), HopperError> {
        self.require_build(actor, location)?;
        self.world.place_container(location, container);
        Ok(())
    }

    /// Break a hopper. `actor` is `None` for explosions and other world
    /// modifications, which bypass access checks.
    pub fn break_hopper(
        &mut self,
        actor: Option<&Actor>,
        location: Location,
    ) -> Result<BrokenHopper, HopperError> {
        let hopper = self.cache.get(location).ok_or(HopperError::EntityNotFound(location))?;
        if let Some(actor) = actor {
            self.require_build(actor, location)?;
            if !hopper.can_manage(actor) {
                return Err(HopperError::AccessDenied {
                    actor: actor.id,
                    location,
                });
            }
        }

        let item_record = self
            .codec()
            .encode_bytes(&hopper)
            .map_err(crate::store::StoreError::from)?;
        self.cache.delete(location)?;
        self.deferred.discard_touching(location);

        let contents = self
            .world
            .remove_container(location)
            .map(|mut c| c.take_all())
            .unwrap_or_default();
        let returned = if actor.is_some() && self.settings.drop_to_inventory {
            contents
        } else {
            self.world.drop_at(location, contents);
            Vec::new()
        };

        tracing::info!(%location, "hopper broken");
        self.events.push(HopperEvent::HopperBroken { hopper: location });
        self.unlink_everywhere(location)?;
        Ok(BrokenHopper { item_record, returned })
    }

    /// Break a non-hopper container. Its contents drop on the ground and
    /// every hopper linking to it loses that link.
    pub fn break_container(
        &mut self,
        actor: Option<&Actor>,
        location: Location,
    ) -> Result<(), HopperError> {
        if let Some(actor) = actor {
            self.require_build(actor, location)?;
        }
        if let Some(mut container) = self.world.remove_container(location) {
            let contents = container.take_all();
            self.world.drop_at(location, contents);
        }
        self.deferred.discard_touching(location);
        self.unlink_everywhere(location)
    }

    fn unlink_everywhere(&mut self, dest: Location) -> Result<(), HopperError> {
        let linked: Vec<Location> = self
            .cache
            .snapshot()
            .iter()
            .filter(|h| h.is_linked_to(dest))
            .map(HopperEntity::location)
            .collect();
        for hopper in linked {
            self.cache.update(hopper, |h| h.remove_links_to(dest));
            self.cache.save(hopper, &self.codec())?;
            self.events.push(HopperEvent::LinkRemoved { hopper, dest });
        }
        Ok(())
    }

    pub fn load_region(&mut self, region: RegionId) -> Result<usize, HopperError> {
        self.world.load_region(region);
        self.cache.load_region(region, &self.codec(), self.now)
    }

    /// Save and evict every hopper in `region`.
    pub fn unload_region(&mut self, region: RegionId) -> Result<usize, HopperError> {
        let count = self.cache.unload_region(region, &self.codec())?;
        self.world.unload_region(region);
        Ok(count)
    }

    /// Write every cached hopper through to the store.
    pub fn save_all(&self) -> Result<usize, HopperError> {
        let codec = self.codec();
        let locations = self.cache.locations();
        for location in &locations {
            self.cache.save(*location, &codec)?;
        }
        Ok(locations.len())
    }

    // -----------------------------------------------------------------------
    // Hopper mutations (presentation layer)
    // -----------------------------------------------------------------------
    //
    // Every mutation fails with `EntityNotFound` when no hopper is cached at
    // the location. Nothing is changed, saved or emitted in that case, and
    // `HopperError::is_no_op` tells hosts to drop it without a message.

    /// The hopper at `location`, if `actor` may open and manage it.
    fn checked_hopper(
        &self,
        actor: &Actor,
        location: Location,
    ) -> Result<HopperEntity, HopperError> {
        let denied = || HopperError::AccessDenied {
            actor: actor.id,
            location,
        };
        if !self.hooks.access.can_open(actor, location) {
            return Err(denied());
        }
        let hopper = self.cache.get(location).ok_or(HopperError::EntityNotFound(location))?;
        if !hopper.can_manage(actor) {
            return Err(denied());
        }
        Ok(hopper)
    }

    /// Store a mutated hopper, persist it, and tell open views to refresh.
    fn commit(&mut self, hopper: HopperEntity) -> Result<(), HopperError> {
        let location = hopper.location();
        self.cache.put(hopper);
        self.cache.save(location, &self.codec())?;
        self.events.push(HopperEvent::HopperChanged { hopper: location });
        Ok(())
    }

    fn mutate<R>(
        &mut self,
        actor: &Actor,
        location: Location,
        f: impl FnOnce(&mut HopperEntity) -> Result<R, HopperError>,
    ) -> Result<R, HopperError> {
        let mut hopper = self.checked_hopper(actor, location)?;
        let result = f(&mut hopper)?;
        self.commit(hopper)?;
        Ok(result)
    }

    pub fn toggle_enabled(
        &mut self,
        actor: &Actor,
        location: Location,
    ) -> Result<bool, HopperError> {
        self.mutate(actor, location, |h| Ok(h.toggle_enabled()))
    }

    pub fn toggle_particles(
        &mut self,
        actor: &Actor,
        location: Location,
    ) -> Result<bool, HopperError> {
        self.mutate(actor, location, |h| Ok(h.toggle_particles()))
    }

    pub fn cycle_input_filter(
        &mut self,
        actor: &Actor,
        location: Location,
    ) -> Result<FilterType, HopperError> {
        self.mutate(actor, location, |h| Ok(h.cycle_input_filter()))
    }

    pub fn add_input_filter_item(
        &mut self,
        actor: &Actor,
        location: Location,
        item: ItemTypeId,
    ) -> Result<bool, HopperError> {
        self.mutate(actor, location, |h| Ok(h.add_input_filter_item(item)))
    }

    pub fn remove_input_filter_item(
        &mut self,
        actor: &Actor,
        location: Location,
        item: ItemTypeId,
    ) -> Result<bool, HopperError> {
        self.mutate(actor, location, |h| Ok(h.remove_input_filter_item(item)))
    }

    /// Link or unlink `dest`. Linking needs a container at `dest` that the
    /// actor may open.
    pub fn toggle_link(
        &mut self,
        actor: &Actor,
        location: Location,
        dest: Location,
    ) -> Result<LinkToggle, HopperError> {
        let linking = self.cache.with(location, |h| !h.is_linked_to(dest)).unwrap_or(true);
        if linking {
            if !self.world.has_container(dest) {
                return Err(LinkError::NoContainer(dest).into());
            }
            if !self.hooks.access.can_open(actor, dest) {
                return Err(HopperError::AccessDenied {
                    actor: actor.id,
                    location: dest,
                });
            }
        }
        self.mutate(actor, location, |h| Ok(h.toggle_link(dest)?))
    }

    pub fn cycle_link_filter(
        &mut self,
        actor: &Actor,
        location: Location,
        dest: Location,
    ) -> Result<FilterType, HopperError> {
        self.mutate(actor, location, |h| Ok(h.cycle_link_filter(dest)?))
    }

    pub fn add_link_filter_item(
        &mut self,
        actor: &Actor,
        location: Location,
        dest: Location,
        item: ItemTypeId,
    ) -> Result<bool, HopperError> {
        self.mutate(actor, location, |h| Ok(h.add_link_filter_item(dest, item)?))
    }

    pub fn remove_link_filter_item(
        &mut self,
        actor: &Actor,
        location: Location,
        dest: Location,
        item: ItemTypeId,
    ) -> Result<bool, HopperError> {
        self.mutate(actor, location, |h| Ok(h.remove_link_filter_item(dest, item)?))
    }

    pub fn add_member(
        &mut self,
        actor: &Actor,
        location: Location,
        member: ActorId,
    ) -> Result<bool, HopperError> {
        self.mutate(actor, location, |h| Ok(h.add_member(member)))
    }

    pub fn remove_member(
        &mut self,
        actor: &Actor,
        location: Location,
        member: ActorId,
    ) -> Result<bool, HopperError> {
        self.mutate(actor, location, |h| Ok(h.remove_member(member)))
    }

    /// Buy the next level of `kind` with the actor's currency. A rejected
    /// purchase leaves both the balance and the hopper untouched.
    pub fn purchase_upgrade(
        &mut self,
        actor: &Actor,
        location: Location,
        kind: UpgradeKind,
    ) -> Result<PurchaseReceipt, HopperError> {
        let mut hopper = self.checked_hopper(actor, location)?;
        let currency = self.hooks.currency.as_mut();
        let receipt = hopper.purchase_upgrade(&self.settings.tracks, kind, actor, currency)?;
        tracing::debug!(%location, %kind, price = %receipt.price, "upgrade purchased");
        self.commit(hopper)?;
        Ok(receipt)
    }

    /// Unpaid step of `current`, within the paid ceiling.
    pub fn adjust_upgrade(
        &mut self,
        actor: &Actor,
        location: Location,
        kind: UpgradeKind,
        adjust: Adjust,
    ) -> Result<LevelValue, HopperError> {
        let mut hopper = self.checked_hopper(actor, location)?;
        let level = hopper.adjust_upgrade(&self.settings.tracks, kind, adjust)?;
        self.commit(hopper)?;
        Ok(level)
    }

    pub fn increase(
        &mut self,
        actor: &Actor,
        location: Location,
        kind: UpgradeKind,
    ) -> Result<LevelValue, HopperError> {
        self.adjust_upgrade(actor, location, kind, Adjust::Increase)
    }

    pub fn decrease(
        &mut self,
        actor: &Actor,
        location: Location,
        kind: UpgradeKind,
    ) -> Result<LevelValue, HopperError> {
        self.adjust_upgrade(actor, location, kind, Adjust::Decrease)
    }
}

// ---------------------------------------------------------------------------
// Standard handlers
// ---------------------------------------------------------------------------

/// An access rejection during placement or breaking becomes a cancelled
/// host action rather than an error.
fn cancel_on_denied(result: Result<(), HopperError>) -> Result<Verdict, HopperError> {
    match result {
        Ok(()) => Ok(Verdict::Allow),
        Err(HopperError::AccessDenied { .. }) => Ok(Verdict::Cancel),
        Err(e) => Err(e),
    }
}

fn on_native_move(engine: &mut Engine, event: &WorldEvent) -> Result<Verdict, HopperError> {
    match event {
        WorldEvent::NativeMove { source, dest } => Ok(engine.handle_native_move(*source, *dest)),
        _ => Ok(Verdict::Allow),
    }
}

fn on_native_pickup(engine: &mut Engine, event: &WorldEvent) -> Result<Verdict, HopperError> {
    match event {
        WorldEvent::NativePickup { hopper, .. } if engine.cache.contains(*hopper) => {
            Ok(Verdict::Cancel)
        }
        _ => Ok(Verdict::Allow),
    }
}

fn on_block_placed(engine: &mut Engine, event: &WorldEvent) -> Result<Verdict, HopperError> {
    let WorldEvent::BlockPlaced { actor, location, block } = event else {
        return Ok(Verdict::Allow);
    };
    let result = match block {
        PlacedBlock::Hopper { record } => engine.place_hopper(actor, *location, record.as_ref()),
        PlacedBlock::Container(container) => {
            engine.place_container(actor, *location, container.clone())
        }
    };
    cancel_on_denied(result)
}

fn on_block_broken(engine: &mut Engine, event: &WorldEvent) -> Result<Verdict, HopperError> {
    let WorldEvent::BlockBroken { actor, location } = event else {
        return Ok(Verdict::Allow);
    };
    if engine.cache.contains(*location) {
        cancel_on_denied(engine.break_hopper(actor.as_ref(), *location).map(|_| ()))
    } else if engine.world.has_container(*location) {
        cancel_on_denied(engine.break_container(actor.as_ref(), *location))
    } else {
        Ok(Verdict::Allow)
    }
}

fn on_region_loaded(engine: &mut Engine, event: &WorldEvent) -> Result<Verdict, HopperError> {
    if let WorldEvent::RegionLoaded(region) = event {
        engine.load_region(*region)?;
    }
    Ok(Verdict::Allow)
}

fn on_region_unloaded(engine: &mut Engine, event: &WorldEvent) -> Result<Verdict, HopperError> {
    if let WorldEvent::RegionUnloaded(region) = event {
        engine.unload_region(*region)?;
    }
    Ok(Verdict::Allow)
}

/// The dispatch table every engine starts with.
pub fn standard_dispatch() -> DispatchTable {
    let mut table = DispatchTable::new();
    table.register(WorldEventKind::NativeMove, on_native_move);
    table.register(WorldEventKind::NativePickup, on_native_pickup);
    table.register(WorldEventKind::BlockPlaced, on_block_placed);
    table.register(WorldEventKind::BlockBroken, on_block_broken);
    table.register(WorldEventKind::RegionLoaded, on_region_loaded);
    table.register(WorldEventKind::RegionUnloaded, on_region_unloaded);
    table
}
