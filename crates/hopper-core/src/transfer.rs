//! Atomic slot-to-slot transfer primitives.
//!
//! [`merge_into_slot`] is the only place stack-size overflow arithmetic
//! happens. Everything else (adapters, the tick driver) composes these
//! primitives, so a destination can never exceed its type's max stack size
//! and a source can never go below zero.

use crate::item::{Container, ItemStack};
use crate::registry::Registry;

/// Move up to `amount` units from `source` into the empty slot `dest_slot`.
///
/// The moved quantity is clamped to `min(amount, source.count,
/// max_stack_size)`. If the destination slot already holds a similar stack
/// this delegates to [`merge_into_slot`]. Returns 0 when the destination holds
/// a dissimilar stack, the slot is out of range, or the source is empty.
/// The source is cleared when it reaches zero.
#[must_use = "returns the quantity actually moved"]
pub fn move_into_slot(
    source: &mut Option<ItemStack>,
    dest: &mut Container,
    dest_slot: usize,
    amount: u32,
    registry: &Registry,
) -> u32 {
    let Some(src) = source.as_mut() else {
        return 0;
    };
    let Some(slot) = dest.slots.get_mut(dest_slot) else {
        return 0;
    };

    let moved = match slot {
        Some(existing) => {
            if !existing.is_similar(src) {
                return 0;
            }
            return merge_into_slot(source, existing, amount, registry);
        }
        None => {
            let max = registry.max_stack_size(src.item_type);
            let moved = amount.min(src.count).min(max);
            if moved == 0 {
                return 0;
            }
            *slot = Some(src.split_off(moved));
            moved
        }
    };

    src.count -= moved;
    if src.count == 0 {
        *source = None;
    }
    moved
}

/// Merge up to `amount` units from `source` into the similar stack `dest`.
///
/// Moves `min(amount, source.count, max_stack_size - dest.count)` units.
/// Returns 0 if the stacks are not similar or `source` is empty.
#[must_use = "returns the quantity actually moved"]
pub fn merge_into_slot(
    source: &mut Option<ItemStack>,
    dest: &mut ItemStack,
    amount: u32,
    registry: &Registry,
) -> u32 {
    let Some(src) = source.as_mut() else {
        return 0;
    };
    if !src.is_similar(dest) {
        return 0;
    }

    let space = registry.max_stack_size(dest.item_type).saturating_sub(dest.count);
    let moved = amount.min(src.count).min(space);

    src.count -= moved;
    dest.count += moved;
    if src.count == 0 {
        *source = None;
    }
    moved
}

/// Place up to `amount` units of one source slot into `dest` using generic
/// rules: merge into every similar stack in slot order, then move the rest
/// into the first empty slot. Disabled slots are skipped.
#[must_use = "returns the quantity actually moved"]
pub fn transfer_slot(
    source: &mut Option<ItemStack>,
    dest: &mut Container,
    amount: u32,
    registry: &Registry,
) -> u32 {
    let mut moved = 0;

    for i in 0..dest.size() {
        if moved >= amount || source.is_none() {
            return moved;
        }
        if !dest.is_slot_enabled(i) {
            continue;
        }
        if let Some(existing) = dest.slots[i].as_mut() {
            moved += merge_into_slot(source, existing, amount - moved, registry);
        }
    }

    for i in 0..dest.size() {
        if moved >= amount || source.is_none() {
            break;
        }
        if dest.is_slot_enabled(i) && dest.slots[i].is_none() {
            moved += move_into_slot(source, dest, i, amount - moved, registry);
        }
    }

    moved
}

/// Move up to `amount` units from `source` to `dest`, slot by slot in source
/// order, with generic placement rules. Stops once `amount` is exhausted or
/// the source is drained. Slot order is the tie-break, so the result is
/// deterministic.
#[must_use = "returns the quantity actually moved"]
pub fn transfer_container_to_container(
    source: &mut Container,
    dest: &mut Container,
    amount: u32,
    registry: &Registry,
) -> u32 {
    let mut moved = 0;
    for i in 0..source.size() {
        if moved >= amount {
            break;
        }
        if source.slots[i].is_none() {
            continue;
        }
        moved += transfer_slot(&mut source.slots[i], dest, amount - moved, registry);
    }
    moved
}

// ===========================================================================
// Tests
// ===========================================================================
