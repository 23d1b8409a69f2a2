//! Cross-crate hopper scenarios.
//!
//! Each test loads its configuration through `hopper-data` from files on
//! disk, builds an engine over it, and drives it through the public API the
//! way a host would.

use std::fs;
use std::path::PathBuf;

use hopper_core::engine::Engine;
use hopper_core::error::HopperError;
use hopper_core::hooks::Hooks;
use hopper_core::hopper::LinkToggle;
use hopper_core::id::*;
use hopper_core::rate::ActionKind;
use hopper_core::store::MemoryStore;
use hopper_core::test_utils::{SharedWallet, fixed, loc, place_chest, player, stack};
use hopper_core::upgrade::UpgradeKind;
use hopper_data::load_hopper_data;

const ITEMS_TOML: &str = r#"
[[items]]
name = "cobblestone"

[[items]]
name = "coal"
roles = ["fuel"]

[[items]]
name = "raw_iron"
roles = ["smeltable"]
"#;

const SETTINGS_TOML: &str = r#"
drop_to_inventory = false

[starting]
transfer_speed = 1.0
transfer_amount = 1
suction_speed = 1.0
suction_amount = 1
suction_range = 1
max_containers = 1

[upgrades]
transfer_speed = [{ level = 1.0, price = 0.0 }, { level = 0.5, price = 100.0 }]
transfer_amount = [{ level = 1.0, price = 0.0 }, { level = 4.0, price = 50.0 }]
suction_speed = [{ level = 1.0, price = 0.0 }, { level = 0.5, price = 100.0 }]
suction_amount = [{ level = 1.0, price = 0.0 }, { level = 4.0, price = 50.0 }]
suction_range = [{ level = 1.0, price = 0.0 }, { level = 2.0, price = 50.0 }]
max_containers = [{ level = 1.0, price = 0.0 }, { level = 2.0, price = 100.0 }]
"#;

struct Fixture {
    dir: PathBuf,
    engine: Engine,
    wallet: SharedWallet,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn write_config(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hopper_scenario_{suffix}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("items.toml"), ITEMS_TOML).unwrap();
    fs::write(dir.join("settings.toml"), SETTINGS_TOML).unwrap();
    dir
}

fn fixture(suffix: &str, balance: f64) -> Fixture {
    let dir = write_config(suffix);
    let data = load_hopper_data(&dir).unwrap();
    assert!(data.disabled.is_empty());
    let wallet = SharedWallet::with_balance(player(1).id, fixed(balance));
    let mut engine = Engine::new(
        data.registry,
        data.settings,
        MemoryStore::new(),
        Hooks::default().with_currency(wallet.clone()),
    );
    engine.load_region(hopper().region()).unwrap();
    engine.place_hopper(&player(1), hopper(), None).unwrap();
    Fixture { dir, engine, wallet }
}

fn hopper() -> Location {
    loc(0, 64, 0)
}

fn item(engine: &Engine, name: &str) -> ItemTypeId {
    engine.registry().item_id(name).unwrap()
}

// ===========================================================================
// Scenario A: suction amount
// ===========================================================================
//
// suction_amount = 4 and a ground stack of 10: one eligible suction moves 4
// into the hopper, leaves 6 on the ground, and pushes the timer out by one
// period.

#[test]
fn scenario_a_suction_amount() {
    let mut f = fixture("a", 100.0);
    let engine = &mut f.engine;
    engine
        .purchase_upgrade(&player(1), hopper(), UpgradeKind::SuctionAmount)
        .unwrap();
    let cobble = item(engine, "cobblestone");
    let ground = engine.world.drop_at(hopper(), [stack(cobble, 10)])[0];

    let report = engine.step(10_000);
    assert_eq!(report.captured, 4);
    assert_eq!(engine.world.container(hopper()).unwrap().total(cobble), 4);
    assert_eq!(engine.world.ground_item(ground).unwrap().stack.count, 6);
    let timers = *engine.hopper(hopper()).unwrap().timers();
    assert_eq!(timers.next_time(ActionKind::Suction), 11_000);
}

// ===========================================================================
// Scenario B: destroy filter
// ===========================================================================
//
// A destroy link filter listing coal, 6 coal in the hopper and
// transfer_amount = 4: 4 destroyed, 2 remain, nothing arrives.

#[test]
fn scenario_b_destroy_filter() {
    let mut f = fixture("b", 100.0);
    let engine = &mut f.engine;
    let coal = item(engine, "coal");
    let chest = loc(0, 63, 0);
    place_chest(engine, chest);
    engine.toggle_link(&player(1), hopper(), chest).unwrap();
    for _ in 0..3 {
        engine.cycle_link_filter(&player(1), hopper(), chest).unwrap();
    }
    engine.add_link_filter_item(&player(1), hopper(), chest, coal).unwrap();
    engine
        .purchase_upgrade(&player(1), hopper(), UpgradeKind::TransferAmount)
        .unwrap();
    engine
        .world
        .container_mut(hopper())
        .unwrap()
        .set(0, Some(stack(coal, 6)));

    let report = engine.step(0);
    assert_eq!(report.destroyed, 4);
    assert_eq!(report.moved, 0);
    assert_eq!(engine.world.container(hopper()).unwrap().total(coal), 2);
    assert!(engine.world.container(chest).unwrap().is_empty());
}

// ===========================================================================
// Scenario C: purchase at max
// ===========================================================================

#[test]
fn scenario_c_purchase_at_max() {
    let mut f = fixture("c", 500.0);
    f.engine
        .purchase_upgrade(&player(1), hopper(), UpgradeKind::SuctionRange)
        .unwrap();
    let balance = f.wallet.balance_of(player(1).id);
    let before = f.engine.hopper(hopper()).unwrap();

    let err = f
        .engine
        .purchase_upgrade(&player(1), hopper(), UpgradeKind::SuctionRange)
        .unwrap_err();
    assert!(matches!(err, HopperError::Maxed(UpgradeKind::SuctionRange)));
    assert_eq!(f.wallet.balance_of(player(1).id), balance);
    assert_eq!(f.engine.hopper(hopper()).unwrap(), before);
}

// ===========================================================================
// Scenario D: link capacity
// ===========================================================================

#[test]
fn scenario_d_link_capacity() {
    let mut f = fixture("d", 500.0);
    let engine = &mut f.engine;
    let chests = [loc(1, 64, 0), loc(2, 64, 0), loc(3, 64, 0)];
    for chest in chests {
        place_chest(engine, chest);
    }
    engine
        .purchase_upgrade(&player(1), hopper(), UpgradeKind::LinkCapacity)
        .unwrap();

    assert_eq!(engine.toggle_link(&player(1), hopper(), chests[0]).unwrap(), LinkToggle::Added);
    assert_eq!(engine.toggle_link(&player(1), hopper(), chests[1]).unwrap(), LinkToggle::Added);
    let err = engine.toggle_link(&player(1), hopper(), chests[2]).unwrap_err();
    assert!(matches!(err, HopperError::CapacityExhausted { capacity: 2 }));

    assert_eq!(engine.toggle_link(&player(1), hopper(), chests[0]).unwrap(), LinkToggle::Removed);
    assert_eq!(engine.toggle_link(&player(1), hopper(), chests[2]).unwrap(), LinkToggle::Added);
    let links: Vec<Location> = engine
        .hopper(hopper())
        .unwrap()
        .links()
        .iter()
        .map(|l| l.location)
        .collect();
    assert_eq!(links, vec![chests[1], chests[2]]);
}
