//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::engine::Engine;
use crate::fixed::Fixed64;
use crate::hooks::{AccessControl, Actor, Currency, CurrencyError, Hooks, StackingHook};
use crate::id::*;
use crate::item::{Container, ItemStack};
use crate::persist::EncodedRecord;
use crate::registry::{ItemRole, ItemRoles, Registry, RegistryBuilder};
use crate::settings::{Settings, StartingValues};
use crate::store::{HopperStore, MemoryStore, StoreError};
use crate::upgrade::{UpgradeKind, UpgradeTrack, UpgradeTracks};
use crate::world::GroundItem;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Item constructors (ids follow registration order in `test_registry`)
// ===========================================================================

pub fn cobblestone() -> ItemTypeId {
    ItemTypeId(0)
}
pub fn coal() -> ItemTypeId {
    ItemTypeId(1)
}
pub fn raw_iron() -> ItemTypeId {
    ItemTypeId(2)
}
pub fn bucket() -> ItemTypeId {
    ItemTypeId(3)
}
pub fn lava_bucket() -> ItemTypeId {
    ItemTypeId(4)
}
pub fn blaze_powder() -> ItemTypeId {
    ItemTypeId(5)
}
pub fn nether_wart() -> ItemTypeId {
    ItemTypeId(6)
}
pub fn potion() -> ItemTypeId {
    ItemTypeId(7)
}
pub fn sword() -> ItemTypeId {
    ItemTypeId(8)
}
pub fn log() -> ItemTypeId {
    ItemTypeId(9)
}

pub fn stack(item: ItemTypeId, count: u32) -> ItemStack {
    ItemStack::new(item, count)
}

// ===========================================================================
// Registry
// ===========================================================================

pub fn test_registry() -> Registry {
    let mut b = RegistryBuilder::new();
    b.register_item("cobblestone", 64, ItemRoles::NONE);
    b.register_item("coal", 64, ItemRoles::NONE.with(ItemRole::Fuel));
    b.register_item("raw_iron", 64, ItemRoles::NONE.with(ItemRole::Smeltable));
    b.register_item("bucket", 16, ItemRoles::NONE.with(ItemRole::EmptyBucket));
    b.register_item("lava_bucket", 1, ItemRoles::NONE.with(ItemRole::Fuel));
    b.register_item(
        "blaze_powder",
        64,
        ItemRoles::NONE
            .with(ItemRole::BrewingFuel)
            .with(ItemRole::BrewingIngredient),
    );
    b.register_item("nether_wart", 64, ItemRoles::NONE.with(ItemRole::BrewingIngredient));
    b.register_item("potion", 1, ItemRoles::NONE.with(ItemRole::Potion));
    b.register_item("sword", 1, ItemRoles::NONE);
    b.register_item(
        "log",
        64,
        ItemRoles::NONE.with(ItemRole::Fuel).with(ItemRole::Smeltable),
    );
    b.build().unwrap()
}

// ===========================================================================
// Actors and locations
// ===========================================================================

pub fn player(n: u128) -> Actor {
    Actor::player(ActorId::from_u128(n))
}

pub fn loc(x: i32, y: i32, z: i32) -> Location {
    Location::new(WorldId(0), x, y, z)
}

// ===========================================================================
// Settings
// ===========================================================================

pub fn test_starting() -> StartingValues {
    StartingValues::default()
}

pub fn test_tracks() -> UpgradeTracks {
    let speeds = [
        (fixed(1.0), fixed(0.0)),
        (fixed(0.5), fixed(100.0)),
        (fixed(0.25), fixed(250.0)),
    ];
    let amounts = [(1, fixed(0.0)), (4, fixed(50.0)), (16, fixed(200.0))];
    UpgradeTracks {
        suction_speed: Some(UpgradeTrack::new(UpgradeKind::SuctionSpeed, speeds).unwrap()),
        suction_amount: Some(UpgradeTrack::new(UpgradeKind::SuctionAmount, amounts).unwrap()),
        suction_range: Some(
            UpgradeTrack::new(
                UpgradeKind::SuctionRange,
                [(1, fixed(0.0)), (2, fixed(50.0)), (4, fixed(150.0))],
            )
            .unwrap(),
        ),
        transfer_speed: Some(UpgradeTrack::new(UpgradeKind::TransferSpeed, speeds).unwrap()),
        transfer_amount: Some(UpgradeTrack::new(UpgradeKind::TransferAmount, amounts).unwrap()),
        link_capacity: Some(
            UpgradeTrack::new(
                UpgradeKind::LinkCapacity,
                [(1, fixed(0.0)), (2, fixed(100.0)), (3, fixed(200.0))],
            )
            .unwrap(),
        ),
    }
}

pub fn test_settings() -> Settings {
    Settings::new(test_starting(), test_tracks())
}

// ===========================================================================
// Hook doubles
// ===========================================================================

/// A per-actor balance book.
#[derive(Debug, Default, Clone)]
pub struct Wallet {
    balances: HashMap<ActorId, Fixed64>,
}

impl Wallet {
    pub fn with_balance(id: ActorId, amount: Fixed64) -> Self {
        let mut wallet = Self::default();
        wallet.balances.insert(id, amount);
        wallet
    }
}

impl Currency for Wallet {
    fn balance(&self, actor: &Actor) -> Fixed64 {
        self.balances.get(&actor.id).copied().unwrap_or(Fixed64::ZERO)
    }

    fn withdraw(&mut self, actor: &Actor, amount: Fixed64) -> Result<(), CurrencyError> {
        let balance = self.balances.entry(actor.id).or_insert(Fixed64::ZERO);
        if *balance < amount {
            return Err(CurrencyError::Insufficient);
        }
        *balance -= amount;
        Ok(())
    }
}

/// A shared wallet the test keeps a handle to after the engine takes it.
#[derive(Debug, Default, Clone)]
pub struct SharedWallet(pub Arc<Mutex<Wallet>>);

impl SharedWallet {
    pub fn with_balance(id: ActorId, amount: Fixed64) -> Self {
        Self(Arc::new(Mutex::new(Wallet::with_balance(id, amount))))
    }

    pub fn balance_of(&self, id: ActorId) -> Fixed64 {
        self.0.lock().balance(&Actor::player(id))
    }
}

impl Currency for SharedWallet {
    fn balance(&self, actor: &Actor) -> Fixed64 {
        self.0.lock().balance(actor)
    }

    fn withdraw(&mut self, actor: &Actor, amount: Fixed64) -> Result<(), CurrencyError> {
        self.0.lock().withdraw(actor, amount)
    }
}

/// Denies every build and open check.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl AccessControl for DenyAll {
    fn can_build(&self, _actor: &Actor, _location: Location) -> bool {
        false
    }

    fn can_open(&self, _actor: &Actor, _location: Location) -> bool {
        false
    }
}

/// A store whose every operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl HopperStore for FailingStore {
    fn load_region(&self, _region: RegionId) -> Result<Vec<EncodedRecord>, StoreError> {
        Err(StoreError::Io("disk on fire".into()))
    }

    fn save(&self, _location: Location, _record: &EncodedRecord) -> Result<(), StoreError> {
        Err(StoreError::Io("disk on fire".into()))
    }

    fn delete(&self, _location: Location) -> Result<(), StoreError> {
        Err(StoreError::Io("disk on fire".into()))
    }
}

/// A stacking hook backed by a shared id-to-count map. Ground items missing
/// from the map count as their own stack size.
#[derive(Debug, Default, Clone)]
pub struct MapStacking(pub Arc<Mutex<HashMap<GroundItemId, u32>>>);

impl MapStacking {
    pub fn set(&self, id: GroundItemId, count: u32) {
        self.0.lock().insert(id, count);
    }

    pub fn count(&self, id: GroundItemId) -> Option<u32> {
        self.0.lock().get(&id).copied()
    }
}

impl StackingHook for MapStacking {
    fn get_stack_count(&self, id: GroundItemId, item: &GroundItem) -> u32 {
        self.0.lock().get(&id).copied().unwrap_or(item.stack.count)
    }

    fn set_stack_count(&mut self, id: GroundItemId, _item: &mut GroundItem, count: u32) {
        self.0.lock().insert(id, count);
    }
}

// ===========================================================================
// Engine builders
// ===========================================================================

/// An engine over a memory store with the test registry and tracks, and the
/// region around the origin loaded.
pub fn test_engine() -> Engine {
    test_engine_with(Hooks::default())
}

pub fn test_engine_with(hooks: Hooks) -> Engine {
    let mut engine = Engine::new(test_registry(), test_settings(), MemoryStore::new(), hooks);
    engine.load_region(loc(0, 64, 0).region()).unwrap();
    engine
}

/// Place a fresh hopper owned by player 1.
pub fn place_test_hopper(engine: &mut Engine, location: Location) {
    engine.place_hopper(&player(1), location, None).unwrap();
}

/// Place a 27-slot generic container.
pub fn place_chest(engine: &mut Engine, location: Location) {
    engine.world.place_container(location, Container::generic(27));
}
