//! Inbound world events, the dispatch table that routes them, and the
//! outbound hopper events the presentation layer consumes.
//!
//! # Inbound
//!
//! The host reports what happened in its world as [`WorldEvent`]s. The
//! engine looks up a handler by [`WorldEventKind`] in its [`DispatchTable`]
//! and runs it synchronously. The handler's [`Verdict`] tells the host
//! whether to let its native action proceed.
//!
//! # Outbound
//!
//! Engine actions record [`HopperEvent`]s into a fixed-capacity
//! [`EventBuffer`]. When the buffer is full the oldest events are dropped.

use crate::engine::Engine;
use crate::error::HopperError;
use crate::hooks::Actor;
use crate::id::{ActorId, GroundItemId, ItemTypeId, Location, RegionId};
use crate::item::Container;
use crate::persist::EncodedRecord;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Inbound world events
// ---------------------------------------------------------------------------

/// What the host placed.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacedBlock {
    /// A hopper item, optionally carrying the record of a previously broken
    /// hopper.
    Hopper { record: Option<EncodedRecord> },
    /// Any other inventory block.
    Container(Container),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// The host wants to move items between two containers on its own.
    NativeMove { source: Location, dest: Location },
    /// The host wants a hopper block to pick up a ground item on its own.
    NativePickup { hopper: Location, item: GroundItemId },
    BlockPlaced {
        actor: Actor,
        location: Location,
        block: PlacedBlock,
    },
    /// `actor` is `None` for explosions and other world modifications.
    BlockBroken { actor: Option<Actor>, location: Location },
    RegionLoaded(RegionId),
    RegionUnloaded(RegionId),
}

/// Discriminant tag for world events, the key of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldEventKind {
    NativeMove,
    NativePickup,
    BlockPlaced,
    BlockBroken,
    RegionLoaded,
    RegionUnloaded,
}

impl WorldEvent {
    pub fn kind(&self) -> WorldEventKind {
        match self {
            WorldEvent::NativeMove { .. } => WorldEventKind::NativeMove,
            WorldEvent::NativePickup { .. } => WorldEventKind::NativePickup,
            WorldEvent::BlockPlaced { .. } => WorldEventKind::BlockPlaced,
            WorldEvent::BlockBroken { .. } => WorldEventKind::BlockBroken,
            WorldEvent::RegionLoaded(_) => WorldEventKind::RegionLoaded,
            WorldEvent::RegionUnloaded(_) => WorldEventKind::RegionUnloaded,
        }
    }
}

/// Whether the host may carry out its native action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Cancel,
}

// ---------------------------------------------------------------------------
// Dispatch table
// ---------------------------------------------------------------------------

pub type Handler = fn(&mut Engine, &WorldEvent) -> Result<Verdict, HopperError>;

/// Handlers keyed by event kind. Kinds without a handler are allowed
/// through untouched.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<WorldEventKind, Handler>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `kind`, returning the one it replaced.
    pub fn register(&mut self, kind: WorldEventKind, handler: Handler) -> Option<Handler> {
        self.handlers.insert(kind, handler)
    }

    pub fn unregister(&mut self, kind: WorldEventKind) -> Option<Handler> {
        self.handlers.remove(&kind)
    }

    pub fn handler(&self, kind: WorldEventKind) -> Option<Handler> {
        self.handlers.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Outbound hopper events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopperEvent {
    SuctionCompleted {
        hopper: Location,
        captured: u32,
        destroyed: u32,
    },
    TransferCompleted {
        hopper: Location,
        dest: Location,
        moved: u32,
    },
    ItemsDestroyed {
        hopper: Location,
        item_type: ItemTypeId,
        count: u32,
    },
    /// Visual feedback for a hopper with particles enabled.
    Particles { hopper: Location },
    /// Any open view of this hopper must refresh.
    HopperChanged { hopper: Location },
    HopperPlaced { hopper: Location, owner: Option<ActorId> },
    HopperBroken { hopper: Location },
    LinkRemoved { hopper: Location, dest: Location },
}

impl HopperEvent {
    pub fn hopper(&self) -> Location {
        match self {
            HopperEvent::SuctionCompleted { hopper, .. }
            | HopperEvent::TransferCompleted { hopper, .. }
            | HopperEvent::ItemsDestroyed { hopper, .. }
            | HopperEvent::Particles { hopper }
            | HopperEvent::HopperChanged { hopper }
            | HopperEvent::HopperPlaced { hopper, .. }
            | HopperEvent::HopperBroken { hopper }
            | HopperEvent::LinkRemoved { hopper, .. } => *hopper,
        }
    }
}

/// Default number of outbound events retained between drains.
pub const DEFAULT_EVENT_CAPACITY: usize = 4096;

/// A pre-allocated ring buffer for outbound events. Fixed capacity; when
/// full, the oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<HopperEvent>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Events overwritten before anyone drained them.
    dropped: u64,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: HopperEvent) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        } else {
            self.dropped += 1;
        }
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    fn oldest_index(&self) -> usize {
        if self.len < self.capacity() { 0 } else { self.head }
    }

    /// Events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HopperEvent> {
        let start = self.oldest_index();
        let cap = self.capacity();
        (0..self.len).filter_map(move |i| self.events[(start + i) % cap].as_ref())
    }

    /// Remove and return every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<HopperEvent> {
        let start = self.oldest_index();
        let cap = self.capacity();
        let drained = (0..self.len)
            .filter_map(|i| self.events[(start + i) % cap].take())
            .collect();
        self.head = 0;
        self.len = 0;
        drained
    }
}

// ===========================================================================
// Tests
// ===========================================================================
