//! Container adapters: per-shape placement and extraction strategies.
//!
//! Inbound ([`insert_into`]) maps "place these units in that container" onto
//! role-specific slots. Outbound ([`extraction_slots`]) lists which source
//! slots may be drained, in role order. [`transfer`] composes both with a
//! per-slot filter check, which is the path every hopper-initiated
//! container-to-container move goes through.

use crate::filter::{Filter, TransferTally};
use crate::item::{
    BREW_FUEL_SLOT, BREW_INGREDIENT_SLOT, BREW_RESULT_SLOTS, Container, ContainerKind, ItemStack,
    SMELT_FUEL_SLOT, SMELT_INPUT_SLOT, SMELT_OUTPUT_SLOT,
};
use crate::registry::{ItemRole, Registry};
use crate::transfer::{merge_into_slot, move_into_slot, transfer_slot};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Whether `dest` has any slot role that could ever accept `stack`.
/// Used to tell a rejection apart from a full destination.
pub fn accepts(dest: &Container, stack: &ItemStack, registry: &Registry) -> bool {
    let roles = registry.roles(stack.item_type);
    match dest.kind() {
        ContainerKind::Generic | ContainerKind::Hopper => true,
        ContainerKind::CapacityGrid { .. } => (0..dest.size()).any(|i| dest.is_slot_enabled(i)),
        ContainerKind::Smelting => {
            roles.contains(ItemRole::Fuel) || roles.contains(ItemRole::Smeltable)
        }
        ContainerKind::Brewing => {
            roles.contains(ItemRole::BrewingFuel)
                || roles.contains(ItemRole::BrewingIngredient)
                || roles.contains(ItemRole::Potion)
        }
    }
}

/// Place up to `amount` units from `source` into `dest` following the
/// destination's slot roles. Returns the amount actually moved.
#[must_use = "returns the quantity actually moved"]
pub fn insert_into(
    dest: &mut Container,
    source: &mut Option<ItemStack>,
    amount: u32,
    registry: &Registry,
) -> u32 {
    let Some(stack) = source.as_ref() else {
        return 0;
    };
    let roles = registry.roles(stack.item_type);

    match dest.kind() {
        ContainerKind::Generic | ContainerKind::Hopper => {
            transfer_slot(source, dest, amount, registry)
        }
        ContainerKind::Smelting => {
            if roles.contains(ItemRole::Fuel) {
                let mut moved = place_into(dest, SMELT_FUEL_SLOT, source, amount, registry);
                if roles.contains(ItemRole::Smeltable) && moved < amount {
                    moved += place_into(dest, SMELT_INPUT_SLOT, source, amount - moved, registry);
                }
                moved
            } else if roles.contains(ItemRole::Smeltable) {
                place_into(dest, SMELT_INPUT_SLOT, source, amount, registry)
            } else {
                0
            }
        }
        ContainerKind::Brewing => {
            if roles.contains(ItemRole::BrewingFuel) {
                let mut moved = place_into(dest, BREW_FUEL_SLOT, source, amount, registry);
                if roles.contains(ItemRole::BrewingIngredient) && moved < amount {
                    let left = amount - moved;
                    moved += place_into(dest, BREW_INGREDIENT_SLOT, source, left, registry);
                }
                moved
            } else if roles.contains(ItemRole::BrewingIngredient) {
                place_into(dest, BREW_INGREDIENT_SLOT, source, amount, registry)
            } else if roles.contains(ItemRole::Potion) {
                // One bottle per empty result slot.
                let mut moved = 0;
                for slot in BREW_RESULT_SLOTS {
                    if moved >= amount || source.is_none() {
                        break;
                    }
                    if dest.get(slot).is_none() {
                        moved += move_into_slot(source, dest, slot, 1, registry);
                    }
                }
                moved
            } else {
                0
            }
        }
        ContainerKind::CapacityGrid { .. } => insert_into_grid(dest, source, amount, registry),
    }
}

/// Fill one fixed-role slot: merge if it holds a similar stack, move if it
/// is empty, otherwise nothing.
fn place_into(
    dest: &mut Container,
    slot: usize,
    source: &mut Option<ItemStack>,
    amount: u32,
    registry: &Registry,
) -> u32 {
    match dest.slots.get_mut(slot) {
        Some(Some(existing)) => merge_into_slot(source, existing, amount, registry),
        Some(None) => move_into_slot(source, dest, slot, amount, registry),
        None => 0,
    }
}

/// Pick the destination slot for one unit of `stack` in a capacity grid:
/// the enabled slot holding a similar, non-full stack with the smallest
/// count (lowest index on ties), else the first enabled empty slot.
pub fn select_grid_slot(
    dest: &Container,
    stack: &ItemStack,
    registry: &Registry,
) -> Option<usize> {
    let max = registry.max_stack_size(stack.item_type);
    let least_filled = (0..dest.size())
        .filter(|&i| dest.is_slot_enabled(i))
        .filter_map(|i| dest.get(i).map(|existing| (i, existing)))
        .filter(|(_, existing)| existing.is_similar(stack) && existing.count < max)
        .min_by_key(|&(i, existing)| (existing.count, i))
        .map(|(i, _)| i);

    least_filled.or_else(|| {
        (0..dest.size()).find(|&i| dest.is_slot_enabled(i) && dest.get(i).is_none())
    })
}

fn insert_into_grid(
    dest: &mut Container,
    source: &mut Option<ItemStack>,
    amount: u32,
    registry: &Registry,
) -> u32 {
    let mut moved = 0;
    while moved < amount {
        let Some(stack) = source.as_ref() else {
            break;
        };
        let Some(slot) = select_grid_slot(dest, stack, registry) else {
            break;
        };
        let step = place_into(dest, slot, source, 1, registry);
        if step == 0 {
            break;
        }
        moved += step;
    }
    moved
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Source slots that may be drained, in the order they are drained.
///
/// Smelting containers only give up their fuel slot when it holds an empty
/// bucket, then their output. Brewing containers give up their three result
/// slots. Everything else drains all enabled slots in order.
pub fn extraction_slots(source: &Container, registry: &Registry) -> Vec<usize> {
    match source.kind() {
        ContainerKind::Smelting => {
            let mut slots = Vec::with_capacity(2);
            if source
                .get(SMELT_FUEL_SLOT)
                .is_some_and(|s| registry.has_role(s.item_type, ItemRole::EmptyBucket))
            {
                slots.push(SMELT_FUEL_SLOT);
            }
            slots.push(SMELT_OUTPUT_SLOT);
            slots
        }
        ContainerKind::Brewing => BREW_RESULT_SLOTS.to_vec(),
        _ => (0..source.size()).filter(|&i| source.is_slot_enabled(i)).collect(),
    }
}

/// Move up to `amount` units from `source` to `dest` through both adapters,
/// consulting `filter` per source slot before any placement. Destroyed units
/// consume budget like moved ones.
#[must_use = "returns what was moved and destroyed"]
pub fn transfer(
    source: &mut Container,
    dest: &mut Container,
    filter: &Filter,
    amount: u32,
    registry: &Registry,
) -> TransferTally {
    let mut tally = TransferTally::default();
    for slot in extraction_slots(source, registry) {
        let budget = amount.saturating_sub(tally.consumed());
        if budget == 0 {
            break;
        }
        let Some(cell) = source.slots.get_mut(slot) else {
            continue;
        };
        if cell.is_none() {
            continue;
        }
        let step = filter.apply_to_slot(cell, budget, |s, b| insert_into(dest, s, b, registry));
        tally.absorb(step);
    }
    source.normalize();
    tally
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterType;
    use crate::test_utils::*;

    fn one(item: crate::id::ItemTypeId, count: u32) -> Option<ItemStack> {
        Some(ItemStack::new(item, count))
    }

    // -----------------------------------------------------------------------
    // Test 1: smelting_fuel_fills_fuel_slot
    // -----------------------------------------------------------------------
    #[test]
    fn smelting_fuel_fills_fuel_slot() {
        let registry = test_registry();
        let mut furnace = Container::smelting();
        let mut source = one(coal(), 10);

        let moved = insert_into(&mut furnace, &mut source, 10, &registry);
        assert_eq!(moved, 10);
        assert_eq!(furnace.get(SMELT_FUEL_SLOT).unwrap().count, 10);
        assert!(furnace.get(SMELT_INPUT_SLOT).is_none());
    }

    // -----------------------------------------------------------------------
    // Test 2: smeltable_fuel_overflows_into_input
    // -----------------------------------------------------------------------
    #[test]
    fn smeltable_fuel_overflows_into_input() {
        let registry = test_registry();
        let mut furnace = Container::smelting();
        furnace.set(SMELT_FUEL_SLOT, one(log(), 60));
        let mut source = one(log(), 10);

        let moved = insert_into(&mut furnace, &mut source, 10, &registry);
        assert_eq!(moved, 10);
        assert_eq!(furnace.get(SMELT_FUEL_SLOT).unwrap().count, 64);
        assert_eq!(furnace.get(SMELT_INPUT_SLOT).unwrap().count, 6);
    }

    // -----------------------------------------------------------------------
    // Test 3: non_fuel_goes_to_input_only
    // -----------------------------------------------------------------------
    #[test]
    fn non_fuel_goes_to_input_only() {
        let registry = test_registry();
        let mut furnace = Container::smelting();
        let mut ore = one(raw_iron(), 5);
        assert_eq!(insert_into(&mut furnace, &mut ore, 5, &registry), 5);
        assert_eq!(furnace.get(SMELT_INPUT_SLOT).unwrap().count, 5);

        let mut stone = one(cobblestone(), 5);
        assert_eq!(insert_into(&mut furnace, &mut stone, 5, &registry), 0);
        assert!(!accepts(&furnace, stone.as_ref().unwrap(), &registry));
    }

    // -----------------------------------------------------------------------
    // Test 4: smelting_outbound_drains_bucket_then_output
    // -----------------------------------------------------------------------
    #[test]
    fn smelting_outbound_drains_bucket_then_output() {
        let registry = test_registry();
        let mut furnace = Container::smelting();
        furnace.set(SMELT_FUEL_SLOT, one(bucket(), 1));
        assert_eq!(extraction_slots(&furnace, &registry), vec![SMELT_FUEL_SLOT, SMELT_OUTPUT_SLOT]);

        furnace.set(SMELT_FUEL_SLOT, one(coal(), 5));
        assert_eq!(extraction_slots(&furnace, &registry), vec![SMELT_OUTPUT_SLOT]);
    }

    // -----------------------------------------------------------------------
    // Test 5: brewing_roles
    // -----------------------------------------------------------------------
    #[test]
    fn brewing_roles() {
        let registry = test_registry();
        let mut stand = Container::brewing();

        let mut powder = one(blaze_powder(), 70);
        let moved = insert_into(&mut stand, &mut powder, 70, &registry);
        assert_eq!(moved, 70);
        assert_eq!(stand.get(BREW_FUEL_SLOT).unwrap().count, 64);
        assert_eq!(stand.get(BREW_INGREDIENT_SLOT).unwrap().count, 6);

        let mut wart = one(nether_wart(), 3);
        assert_eq!(
            insert_into(&mut stand, &mut wart, 3, &registry),
            0,
            "ingredient slot holds powder"
        );

        let mut stone = one(cobblestone(), 3);
        assert_eq!(insert_into(&mut stand, &mut stone, 3, &registry), 0);
    }

    // -----------------------------------------------------------------------
    // Test 6: potions_fill_one_per_result_slot
    // -----------------------------------------------------------------------
    #[test]
    fn potions_fill_one_per_result_slot() {
        let registry = test_registry();
        let mut stand = Container::brewing();
        stand.set(1, one(potion(), 1));
        let mut potions = one(potion(), 1);

        assert_eq!(insert_into(&mut stand, &mut potions, 5, &registry), 1);
        assert!(stand.get(0).is_some());
        assert!(potions.is_none());
    }

    // -----------------------------------------------------------------------
    // Test 7: grid_spreads_to_least_filled
    // -----------------------------------------------------------------------
    #[test]
    fn grid_spreads_to_least_filled() {
        let registry = test_registry();
        let mut grid = Container::capacity_grid(&[2, 3, 4, 5, 6, 7, 8]);
        grid.set(0, one(cobblestone(), 5));
        grid.set(1, one(cobblestone(), 2));
        let mut source = one(cobblestone(), 4);

        let moved = insert_into(&mut grid, &mut source, 4, &registry);
        assert_eq!(moved, 4);
        // Slot 1 climbs to 5, then the tie goes to the lower index.
        assert_eq!(grid.get(0).unwrap().count, 6);
        assert_eq!(grid.get(1).unwrap().count, 5);
    }

    // -----------------------------------------------------------------------
    // Test 8: grid_falls_back_to_first_enabled_empty
    // -----------------------------------------------------------------------
    #[test]
    fn grid_falls_back_to_first_enabled_empty() {
        let registry = test_registry();
        let mut grid = Container::capacity_grid(&[0]);
        grid.set(1, one(coal(), 1));
        let stack = ItemStack::new(cobblestone(), 1);
        assert_eq!(select_grid_slot(&grid, &stack, &registry), Some(2));
    }

    // -----------------------------------------------------------------------
    // Test 9: fully_disabled_grid_moves_nothing
    // -----------------------------------------------------------------------
    #[test]
    fn fully_disabled_grid_moves_nothing() {
        let registry = test_registry();
        let mut grid = Container::capacity_grid(&[0, 1, 2, 3, 4, 5, 6, 7, 8]);
        let mut source = one(cobblestone(), 4);
        assert_eq!(insert_into(&mut grid, &mut source, 4, &registry), 0);
        assert_eq!(source.unwrap().count, 4);
    }

    // -----------------------------------------------------------------------
    // Test 10: filtered_transfer_checks_each_slot
    // -----------------------------------------------------------------------
    #[test]
    fn filtered_transfer_checks_each_slot() {
        let registry = test_registry();
        let mut source = Container::hopper();
        source.set(0, one(cobblestone(), 3));
        source.set(1, one(coal(), 3));
        let mut dest = Container::generic(5);
        let filter = Filter::new(FilterType::Whitelist, [coal()]);

        let tally = transfer(&mut source, &mut dest, &filter, 10, &registry);
        assert_eq!(tally.moved, 3);
        assert!(tally.rejected);
        assert_eq!(source.get(0).unwrap().count, 3);
        assert_eq!(dest.total(coal()), 3);
    }

    // -----------------------------------------------------------------------
    // Test 11: brewing_outbound_drains_result_slots_in_order
    // -----------------------------------------------------------------------
    #[test]
    fn brewing_outbound_drains_result_slots_in_order() {
        let registry = test_registry();
        let mut stand = Container::brewing();
        stand.set(0, one(potion(), 1));
        stand.set(2, one(potion(), 1));
        stand.set(BREW_INGREDIENT_SLOT, one(nether_wart(), 4));
        let mut hopper = Container::hopper();

        let tally = transfer(&mut stand, &mut hopper, &Filter::default(), 64, &registry);
        assert_eq!(tally.moved, 2);
        assert_eq!(stand.get(BREW_INGREDIENT_SLOT).unwrap().count, 4);
        assert!(stand.get(0).is_none() && stand.get(2).is_none());
    }
}
