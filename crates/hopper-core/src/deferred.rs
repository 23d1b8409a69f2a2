//! Deferred transfer queue for moves the host world tried to perform itself.
//!
//! Native moves touching a hopper are cancelled at the source and queued
//! here instead. The queue is drained at the start of the next step, and
//! every entry is re-validated and replayed through the ordinary transfer
//! path. Entries that fail validation are dropped, never re-queued.

use crate::id::Location;
use crate::rate::ActionKind;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// DeferredEntry
// ---------------------------------------------------------------------------

/// One suppressed native move.
///
/// `is_transfer_side` means the source is the hopper pushing out;
/// `is_suction_side` means the destination is the hopper pulling in. When
/// both are set the source hopper's transfer side initiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredEntry {
    pub source: Location,
    pub dest: Location,
    pub is_suction_side: bool,
    pub is_transfer_side: bool,
}

impl DeferredEntry {
    /// A hopper at `source` pushing into `dest`.
    pub fn transfer(source: Location, dest: Location) -> Self {
        Self {
            source,
            dest,
            is_suction_side: false,
            is_transfer_side: true,
        }
    }

    /// A hopper at `dest` pulling from `source`.
    pub fn suction(source: Location, dest: Location) -> Self {
        Self {
            source,
            dest,
            is_suction_side: true,
            is_transfer_side: false,
        }
    }

    /// Location of the hopper whose timer and amount govern this move.
    pub fn initiator(&self) -> Location {
        if self.is_transfer_side {
            self.source
        } else {
            self.dest
        }
    }

    /// The initiator's rate-limited action.
    pub fn action(&self) -> ActionKind {
        if self.is_transfer_side {
            ActionKind::Transfer
        } else {
            ActionKind::Suction
        }
    }
}

// ---------------------------------------------------------------------------
// DeferredQueue
// ---------------------------------------------------------------------------

/// Entries waiting for the next step, deduplicated by `(source, dest)`.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    pending: Vec<DeferredEntry>,
    keys: HashSet<(Location, Location)>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entry. Returns false if the same `(source, dest)` pair is
    /// already pending.
    pub fn push(&mut self, entry: DeferredEntry) -> bool {
        if !self.keys.insert((entry.source, entry.dest)) {
            return false;
        }
        self.pending.push(entry);
        true
    }

    /// Take every pending entry in submission order.
    pub fn drain(&mut self) -> Vec<DeferredEntry> {
        self.keys.clear();
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending entries initiated by the hopper at `location`.
    pub fn entries_for(&self, location: Location) -> impl Iterator<Item = &DeferredEntry> {
        self.pending.iter().filter(move |e| e.initiator() == location)
    }

    /// Forget every pending entry touching `location`.
    pub fn discard_touching(&mut self, location: Location) -> usize {
        let before = self.pending.len();
        self.pending.retain(|e| e.source != location && e.dest != location);
        self.keys.retain(|(s, d)| *s != location && *d != location);
        before - self.pending.len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
