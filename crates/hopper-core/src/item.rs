//! Item stacks and slot containers.
//!
//! An [`ItemStack`] is a typed, countable quantity of one item type. A
//! [`Container`] is a fixed-size ordered sequence of optional slots whose
//! [`ContainerKind`] decides which slots play which role.

use crate::fixed::Fixed64;
use crate::id::{ItemTypeId, PropertyId};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ItemStack
// ---------------------------------------------------------------------------

/// A stack of fungible items with optional type-defining metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_type: ItemTypeId,
    pub count: u32,
    /// Type-defining metadata (e.g. enchantment level, potion effect).
    /// Stacks only merge when their metadata matches exactly.
    #[serde(default)]
    pub metadata: BTreeMap<PropertyId, Fixed64>,
}

impl ItemStack {
    pub fn new(item_type: ItemTypeId, count: u32) -> Self {
        Self {
            item_type,
            count,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, id: PropertyId, value: Fixed64) -> Self {
        self.metadata.insert(id, value);
        self
    }

    /// Two stacks are similar iff their type and all metadata match.
    /// Counts are ignored.
    pub fn is_similar(&self, other: &ItemStack) -> bool {
        self.item_type == other.item_type && self.metadata == other.metadata
    }

    /// A copy of this stack holding `count` units.
    pub fn split_off(&self, count: u32) -> ItemStack {
        ItemStack {
            item_type: self.item_type,
            count,
            metadata: self.metadata.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Slot roles
// ---------------------------------------------------------------------------

/// Slot count of a hopper's own inventory.
pub const HOPPER_SLOTS: usize = 5;
/// Slot count of a capacity-grid (crafter) container.
pub const GRID_SLOTS: usize = 9;

pub const SMELT_INPUT_SLOT: usize = 0;
pub const SMELT_FUEL_SLOT: usize = 1;
pub const SMELT_OUTPUT_SLOT: usize = 2;

pub const BREW_RESULT_SLOTS: [usize; 3] = [0, 1, 2];
pub const BREW_INGREDIENT_SLOT: usize = 3;
pub const BREW_FUEL_SLOT: usize = 4;

/// The shape of a container, which decides slot roles and placement rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    /// Any slot accepts anything.
    Generic,
    /// A hopper block's own inventory. Placement follows generic rules.
    Hopper,
    /// Input, fuel, and output slots.
    Smelting,
    /// Three result slots, one ingredient slot, one fuel slot.
    Brewing,
    /// Slots that can be individually disabled. `disabled[i]` masks slot `i`.
    CapacityGrid { disabled: Vec<bool> },
}

impl ContainerKind {
    /// Natural slot count for this kind. `None` for generic containers,
    /// whose size is chosen at creation.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            ContainerKind::Generic => None,
            ContainerKind::Hopper => Some(HOPPER_SLOTS),
            ContainerKind::Smelting => Some(3),
            ContainerKind::Brewing => Some(5),
            ContainerKind::CapacityGrid { .. } => Some(GRID_SLOTS),
        }
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// An ordered, fixed-size collection of optional slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    kind: ContainerKind,
    pub slots: Vec<Option<ItemStack>>,
}

impl Container {
    /// Create an empty container. Specialized kinds ignore `size` and use
    /// their natural slot count.
    pub fn new(kind: ContainerKind, size: usize) -> Self {
        let size = kind.fixed_size().unwrap_or(size);
        Self {
            kind,
            slots: vec![None; size],
        }
    }

    pub fn generic(size: usize) -> Self {
        Self::new(ContainerKind::Generic, size)
    }

    pub fn hopper() -> Self {
        Self::new(ContainerKind::Hopper, HOPPER_SLOTS)
    }

    pub fn smelting() -> Self {
        Self::new(ContainerKind::Smelting, 3)
    }

    pub fn brewing() -> Self {
        Self::new(ContainerKind::Brewing, 5)
    }

    /// A capacity grid with the listed slots disabled. Out-of-range indices
    /// are ignored.
    pub fn capacity_grid(disabled_slots: &[usize]) -> Self {
        let mut disabled = vec![false; GRID_SLOTS];
        for &slot in disabled_slots {
            if let Some(flag) = disabled.get_mut(slot) {
                *flag = true;
            }
        }
        Self::new(ContainerKind::CapacityGrid { disabled }, GRID_SLOTS)
    }

    pub fn kind(&self) -> &ContainerKind {
        &self.kind
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> Option<&ItemStack> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Place `stack` into `slot`, returning whatever was there.
    /// Out-of-range slots return the stack unchanged.
    pub fn set(&mut self, slot: usize, stack: Option<ItemStack>) -> Option<ItemStack> {
        match self.slots.get_mut(slot) {
            Some(existing) => std::mem::replace(existing, stack),
            None => stack,
        }
    }

    /// Whether `slot` exists and is not masked off.
    pub fn is_slot_enabled(&self, slot: usize) -> bool {
        if slot >= self.slots.len() {
            return false;
        }
        match &self.kind {
            ContainerKind::CapacityGrid { disabled } => {
                !disabled.get(slot).copied().unwrap_or(false)
            }
            _ => true,
        }
    }

    /// Toggle a capacity-grid slot. No-op for other kinds.
    pub fn set_slot_disabled(&mut self, slot: usize, value: bool) {
        if let ContainerKind::CapacityGrid { disabled } = &mut self.kind {
            if let Some(flag) = disabled.get_mut(slot) {
                *flag = value;
            }
        }
    }

    /// True when every enabled slot holds a full stack.
    pub fn is_full(&self, registry: &Registry) -> bool {
        (0..self.slots.len())
            .filter(|&i| self.is_slot_enabled(i))
            .all(|i| match &self.slots[i] {
                Some(stack) => stack.count >= registry.max_stack_size(stack.item_type),
                None => false,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Total units of `item_type` across all slots.
    pub fn total(&self, item_type: ItemTypeId) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.item_type == item_type)
            .map(|s| s.count)
            .sum()
    }

    /// Total units across all slots.
    pub fn total_items(&self) -> u32 {
        self.slots.iter().flatten().map(|s| s.count).sum()
    }

    /// Remove and return every stack, leaving the container empty.
    pub fn take_all(&mut self) -> Vec<ItemStack> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    /// Drop empty stacks so that occupied slots always have `count > 0`.
    pub(crate) fn normalize(&mut self) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|s| s.count == 0) {
                *slot = None;
            }
        }
    }
}
