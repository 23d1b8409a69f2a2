//! End-to-end run driven only through host world events.
//!
//! Configuration is JSON on disk. The host places blocks, streams ground
//! items, unloads and reloads the region, moves a hopper by breaking and
//! re-placing it, and finally breaks the chest the hopper feeds.

use std::fs;
use std::path::PathBuf;

use hopper_core::engine::Engine;
use hopper_core::event::{HopperEvent, PlacedBlock, Verdict, WorldEvent};
use hopper_core::hooks::Hooks;
use hopper_core::id::*;
use hopper_core::item::Container;
use hopper_core::store::MemoryStore;
use hopper_core::test_utils::{loc, player, stack};
use hopper_data::load_hopper_data;

const ITEMS_JSON: &str = r#"[
    {"name": "cobblestone"},
    {"name": "coal", "roles": ["fuel"]}
]"#;

const SETTINGS_JSON: &str = r#"{
    "starting": {"transfer_speed": 1.0, "suction_speed": 1.0},
    "upgrades": {
        "transfer_speed": [{"level": 1.0, "price": 0.0}],
        "transfer_amount": [{"level": 1.0, "price": 0.0}],
        "suction_speed": [{"level": 1.0, "price": 0.0}],
        "suction_amount": [{"level": 1.0, "price": 0.0}],
        "suction_range": [{"level": 1.0, "price": 0.0}],
        "link_capacity": [{"level": 1.0, "price": 0.0}]
    }
}"#;

fn make_config_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hopper_end_to_end_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("items.json"), ITEMS_JSON).unwrap();
    fs::write(dir.join("settings.json"), SETTINGS_JSON).unwrap();
    dir
}

fn send(engine: &mut Engine, event: WorldEvent) -> Verdict {
    engine.dispatch(&event).unwrap()
}

#[test]
fn host_driven_lifecycle() {
    let dir = make_config_dir();
    let data = load_hopper_data(&dir).unwrap();
    fs::remove_dir_all(&dir).unwrap();
    assert!(data.disabled.is_empty());

    let cobble = data.registry.item_id("cobblestone").unwrap();
    let coal = data.registry.item_id("coal").unwrap();
    let mut engine = Engine::new(
        data.registry,
        data.settings,
        MemoryStore::new(),
        Hooks::default(),
    );

    let hopper = loc(0, 64, 0);
    let moved_to = loc(1, 64, 0);
    let chest = loc(0, 63, 0);
    let region = hopper.region();

    // -----------------------------------------------------------------------
    // Placement and a steady stream of ground items
    // -----------------------------------------------------------------------

    send(&mut engine, WorldEvent::RegionLoaded(region));
    let placed = send(
        &mut engine,
        WorldEvent::BlockPlaced {
            actor: player(1),
            location: chest,
            block: PlacedBlock::Container(Container::generic(27)),
        },
    );
    assert_eq!(placed, Verdict::Allow);
    send(
        &mut engine,
        WorldEvent::BlockPlaced {
            actor: player(1),
            location: hopper,
            block: PlacedBlock::Hopper { record: None },
        },
    );
    engine.toggle_link(&player(1), hopper, chest).unwrap();
    engine.world.drop_at(hopper, [stack(cobble, 5)]);

    for t in 0..7u64 {
        engine.step(t * 1000);
    }
    assert_eq!(engine.world.container(chest).unwrap().total(cobble), 5);
    assert_eq!(engine.world.ground_item_count(), 0);

    // -----------------------------------------------------------------------
    // Region unload: nothing runs, the record survives
    // -----------------------------------------------------------------------

    send(&mut engine, WorldEvent::RegionUnloaded(region));
    assert!(engine.hopper(hopper).is_none());
    engine.world.drop_at(hopper, [stack(coal, 2)]);
    let report = engine.step(10_000);
    assert_eq!(report.suctions, 0);
    assert_eq!(engine.world.ground_item_count(), 1);

    // Reloaded hoppers wait one full period before acting again.
    engine.set_now(20_000);
    send(&mut engine, WorldEvent::RegionLoaded(region));
    let restored = engine.hopper(hopper).unwrap();
    assert_eq!(restored.links().len(), 1);
    assert_eq!(engine.step(20_000).captured, 0);
    for t in 21..=25u64 {
        engine.step(t * 1000);
    }
    assert_eq!(engine.world.container(chest).unwrap().total(coal), 2);

    // -----------------------------------------------------------------------
    // Moving the hopper keeps its links under the new owner
    // -----------------------------------------------------------------------

    let broken = engine.break_hopper(Some(&player(1)), hopper).unwrap();
    assert!(engine.hopper(hopper).is_none());
    assert!(engine.world.container(hopper).is_none());
    send(
        &mut engine,
        WorldEvent::BlockPlaced {
            actor: player(2),
            location: moved_to,
            block: PlacedBlock::Hopper {
                record: Some(broken.item_record),
            },
        },
    );
    let moved = engine.hopper(moved_to).unwrap();
    assert_eq!(moved.owner(), Some(player(2).id));
    assert_eq!(moved.location(), moved_to);
    assert!(moved.is_linked_to(chest));

    // -----------------------------------------------------------------------
    // Breaking the chest unlinks it and spills its contents
    // -----------------------------------------------------------------------

    engine.drain_events();
    send(
        &mut engine,
        WorldEvent::BlockBroken {
            actor: None,
            location: chest,
        },
    );
    assert!(engine.hopper(moved_to).unwrap().links().is_empty());
    assert_eq!(engine.world.ground_item_count(), 2);
    let events = engine.drain_events();
    assert!(events.contains(&HopperEvent::LinkRemoved {
        hopper: moved_to,
        dest: chest,
    }));
}
