//! Property-based tests for the hopper core.
//!
//! Uses proptest to generate random item movements, filter cycles, timer
//! histories, and engine operation sequences, then verify invariants hold.

use hopper_core::deferred::{DeferredEntry, DeferredQueue};
use hopper_core::engine::Engine;
use hopper_core::filter::{Filter, FilterType};
use hopper_core::id::*;
use hopper_core::item::{Container, ItemStack};
use hopper_core::rate::{ActionKind, RateLimiter};
use hopper_core::test_utils::*;
use hopper_core::transfer;
use hopper_core::upgrade::UpgradeKind;
use proptest::prelude::*;
use std::collections::HashSet;

// ===========================================================================
// Generators
// ===========================================================================

/// Item types that merge in a generic container.
fn arb_item() -> impl Strategy<Value = ItemTypeId> {
    prop_oneof![Just(cobblestone()), Just(coal()), Just(bucket()), Just(sword())]
}

fn arb_stack() -> impl Strategy<Value = ItemStack> {
    (arb_item(), 1..=64u32).prop_map(|(item, count)| {
        let max = test_registry().max_stack_size(item);
        ItemStack::new(item, count.min(max))
    })
}

fn arb_container(size: usize) -> impl Strategy<Value = Container> {
    proptest::collection::vec(proptest::option::of(arb_stack()), size).prop_map(move |slots| {
        let mut container = Container::generic(size);
        for (i, stack) in slots.into_iter().enumerate() {
            container.set(i, stack);
        }
        container
    })
}

/// Operations a host might perform against a running engine.
#[derive(Debug, Clone)]
enum HostOp {
    DropItems(u8, ItemStack),
    Step(u16),
    NativeMove(u8, u8),
    ToggleLink(u8),
    CycleInputFilter,
    Purchase(u8),
    Power(bool),
    UnloadReload,
}

fn arb_host_ops(max_ops: usize) -> impl Strategy<Value = Vec<HostOp>> {
    let op = prop_oneof![
        (0..4u8, arb_stack()).prop_map(|(at, s)| HostOp::DropItems(at, s)),
        (0..1500u16).prop_map(HostOp::Step),
        (0..4u8, 0..4u8).prop_map(|(a, b)| HostOp::NativeMove(a, b)),
        (0..4u8).prop_map(HostOp::ToggleLink),
        Just(HostOp::CycleInputFilter),
        (0..6u8).prop_map(HostOp::Purchase),
        any::<bool>().prop_map(HostOp::Power),
        Just(HostOp::UnloadReload),
    ];
    proptest::collection::vec(op, 1..max_ops)
}

/// The hopper and three chests the host ops refer to by index.
fn site(index: u8) -> Location {
    match index {
        0 => loc(0, 64, 0),
        1 => loc(0, 63, 0),
        2 => loc(1, 64, 0),
        _ => loc(0, 64, 1),
    }
}

fn world_total(engine: &Engine) -> u64 {
    let containers: u64 = (0..4)
        .filter_map(|i| engine.world.container(site(i)))
        .map(|c| u64::from(c.total_items()))
        .sum();
    let ground: u64 = engine
        .world
        .ground_items_near(site(0), fixed(1000.0))
        .into_iter()
        .filter_map(|id| engine.world.ground_item(id))
        .map(|g| u64::from(g.stack.count))
        .sum();
    containers + ground
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // -----------------------------------------------------------------------
    // Merging never overfills a slot and conserves items
    // -----------------------------------------------------------------------
    #[test]
    fn transfer_slot_conserves_and_bounds(
        dest in arb_container(5),
        incoming in arb_stack(),
        amount in 0..128u32,
    ) {
        let registry = test_registry();
        let mut dest = dest;
        let before = dest.total_items() + incoming.count;
        let mut source = Some(incoming);

        let moved = transfer::transfer_slot(&mut source, &mut dest, amount, &registry);
        prop_assert!(moved <= amount);

        let remaining = source.as_ref().map_or(0, |s| s.count);
        prop_assert_eq!(dest.total_items() + remaining, before);
        for stack in dest.slots.iter().flatten() {
            prop_assert!(stack.count >= 1);
            prop_assert!(stack.count <= registry.max_stack_size(stack.item_type));
        }
    }

    // -----------------------------------------------------------------------
    // Four cycles return a filter to where it started
    // -----------------------------------------------------------------------
    #[test]
    fn filter_cycle_has_period_four(start in 0..4usize) {
        let mut filter = Filter::default();
        for _ in 0..start {
            filter.cycle();
        }
        let initial = filter.filter_type;
        let mut seen = HashSet::new();
        for _ in 0..4 {
            seen.insert(filter.cycle());
        }
        prop_assert_eq!(filter.filter_type, initial);
        prop_assert_eq!(seen.len(), 4);
        prop_assert!(seen.contains(&FilterType::Destroy));
    }

    // -----------------------------------------------------------------------
    // A timer never moves backwards, whatever the clock does
    // -----------------------------------------------------------------------
    #[test]
    fn rate_limiter_is_monotonic(
        history in proptest::collection::vec((0..10_000u64, 0..4u8), 1..40),
    ) {
        let speeds = [fixed(0.0), fixed(0.25), fixed(1.0), fixed(2.5)];
        let mut limiter = RateLimiter::starting_at(0);
        let mut last = limiter.next_time(ActionKind::Transfer);
        for (now, s) in history {
            limiter.record_success(ActionKind::Transfer, now, speeds[s as usize]);
            let next = limiter.next_time(ActionKind::Transfer);
            prop_assert!(next >= last);
            prop_assert!(next >= now);
            last = next;
        }
        prop_assert_eq!(limiter.next_time(ActionKind::Suction), 0);
    }

    // -----------------------------------------------------------------------
    // The deferred queue holds each (source, dest) pair at most once
    // -----------------------------------------------------------------------
    #[test]
    fn deferred_queue_dedups_pairs(
        pairs in proptest::collection::vec((0..4u8, 0..4u8, any::<bool>()), 0..40),
    ) {
        let mut queue = DeferredQueue::new();
        let mut distinct = HashSet::new();
        for (a, b, transfer_side) in pairs {
            let entry = if transfer_side {
                DeferredEntry::transfer(site(a), site(b))
            } else {
                DeferredEntry::suction(site(a), site(b))
            };
            let fresh = distinct.insert((site(a), site(b)));
            prop_assert_eq!(queue.push(entry), fresh);
        }
        prop_assert_eq!(queue.pending_count(), distinct.len());
        prop_assert_eq!(queue.drain().len(), distinct.len());
        prop_assert!(queue.is_empty());
    }

    // -----------------------------------------------------------------------
    // Random host activity keeps every hopper invariant and, without a
    // destroy filter, never creates or loses items
    // -----------------------------------------------------------------------
    #[test]
    fn host_activity_preserves_invariants(ops in arb_host_ops(60)) {
        let mut engine = test_engine_with(
            hopper_core::hooks::Hooks::default()
                .with_currency(SharedWallet::with_balance(player(1).id, fixed(10_000.0))),
        );
        place_test_hopper(&mut engine, site(0));
        for i in 1..4 {
            place_chest(&mut engine, site(i));
        }
        let mut now = 0u64;
        let mut filter_cycles = 0u32;
        let mut expected = 0u64;

        for op in ops {
            match op {
                HostOp::DropItems(at, stack) => {
                    expected += u64::from(stack.count);
                    engine.world.drop_at(site(at), [stack]);
                }
                HostOp::Step(dt) => {
                    now += u64::from(dt);
                    engine.step(now);
                }
                HostOp::NativeMove(a, b) => {
                    if a != b {
                        let _ = engine.dispatch(&hopper_core::event::WorldEvent::NativeMove {
                            source: site(a),
                            dest: site(b),
                        });
                    }
                }
                HostOp::ToggleLink(i) => {
                    let _ = engine.toggle_link(&player(1), site(0), site(i));
                }
                HostOp::CycleInputFilter => {
                    // Stop short of Destroy so items are conserved.
                    if filter_cycles < 2 {
                        engine.cycle_input_filter(&player(1), site(0)).unwrap();
                        filter_cycles += 1;
                    }
                }
                HostOp::Purchase(k) => {
                    let kind = UpgradeKind::ALL[k as usize];
                    let _ = engine.purchase_upgrade(&player(1), site(0), kind);
                }
                HostOp::Power(on) => engine.world.set_powered(site(0), on),
                HostOp::UnloadReload => {
                    let region = site(0).region();
                    engine.unload_region(region).unwrap();
                    engine.set_now(now);
                    engine.load_region(region).unwrap();
                }
            }

            let hopper = engine.hopper(site(0)).unwrap();
            prop_assert!(hopper.invariants_hold());
            prop_assert!(hopper.links().len() <= hopper.link_capacity() as usize);
            prop_assert!(!hopper.is_linked_to(site(0)));
            prop_assert_eq!(world_total(&engine), expected);
        }
    }
}

// ===========================================================================
// Conservation across a long run
// ===========================================================================

#[test]
fn long_run_conserves_items() {
    let mut engine = test_engine();
    place_test_hopper(&mut engine, site(0));
    place_chest(&mut engine, site(1));
    engine.toggle_link(&player(1), site(0), site(1)).unwrap();
    engine.world.drop_at(site(0), [ItemStack::new(cobblestone(), 40)]);
    let before = world_total(&engine);

    for t in 0..200u64 {
        engine.step(t * 250);
    }
    assert_eq!(world_total(&engine), before);
    assert_eq!(engine.world.container(site(1)).unwrap().total(cobblestone()), 40);
}
