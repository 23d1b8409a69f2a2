//! The slice of the host world the engine reads and mutates: containers,
//! redstone power, loose ground items, and which regions are loaded.

use crate::fixed::Fixed64;
use crate::id::{GroundItemId, Location, RegionId, WorldId};
use crate::item::{Container, ItemStack};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};

/// A loose item lying in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundItem {
    pub world: WorldId,
    pub position: [Fixed64; 3],
    pub stack: ItemStack,
}

impl GroundItem {
    /// An item resting at the centre of a block.
    pub fn at_block(location: Location, stack: ItemStack) -> Self {
        Self {
            world: location.world,
            position: block_centre(location),
            stack,
        }
    }
}

fn block_centre(location: Location) -> [Fixed64; 3] {
    let half = Fixed64::from_num(0.5);
    [
        Fixed64::from_num(location.x) + half,
        Fixed64::from_num(location.y) + half,
        Fixed64::from_num(location.z) + half,
    ]
}

#[derive(Debug, Default)]
pub struct World {
    containers: BTreeMap<Location, Container>,
    powered: BTreeSet<Location>,
    ground: SlotMap<GroundItemId, GroundItem>,
    loaded: BTreeSet<RegionId>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // -- containers ---------------------------------------------------------

    /// Place a container, replacing whatever was there.
    pub fn place_container(
        &mut self,
        location: Location,
        container: Container,
    ) -> Option<Container> {
        self.containers.insert(location, container)
    }

    pub fn remove_container(&mut self, location: Location) -> Option<Container> {
        self.powered.remove(&location);
        self.containers.remove(&location)
    }

    pub fn container(&self, location: Location) -> Option<&Container> {
        self.containers.get(&location)
    }

    pub fn container_mut(&mut self, location: Location) -> Option<&mut Container> {
        self.containers.get_mut(&location)
    }

    pub fn has_container(&self, location: Location) -> bool {
        self.containers.contains_key(&location)
    }

    /// A container that exists and sits in a loaded region.
    pub fn is_available(&self, location: Location) -> bool {
        self.has_container(location) && self.is_loaded(location)
    }

    /// Run `f` with mutable access to two distinct containers. Returns
    /// `None` if either is missing or the locations are equal.
    pub fn with_pair<R>(
        &mut self,
        source: Location,
        dest: Location,
        f: impl FnOnce(&mut Container, &mut Container) -> R,
    ) -> Option<R> {
        if source == dest || !self.containers.contains_key(&dest) {
            return None;
        }
        let mut src = self.containers.remove(&source)?;
        let result = self.containers.get_mut(&dest).map(|dst| f(&mut src, dst));
        self.containers.insert(source, src);
        result
    }

    pub fn container_locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.containers.keys().copied()
    }

    // -- power --------------------------------------------------------------

    pub fn set_powered(&mut self, location: Location, powered: bool) {
        if powered {
            self.powered.insert(location);
        } else {
            self.powered.remove(&location);
        }
    }

    pub fn is_powered(&self, location: Location) -> bool {
        self.powered.contains(&location)
    }

    // -- ground items -------------------------------------------------------

    pub fn spawn_ground_item(&mut self, item: GroundItem) -> GroundItemId {
        self.ground.insert(item)
    }

    /// Drop stacks at the centre of a block.
    pub fn drop_at(
        &mut self,
        location: Location,
        stacks: impl IntoIterator<Item = ItemStack>,
    ) -> Vec<GroundItemId> {
        stacks
            .into_iter()
            .map(|stack| self.ground.insert(GroundItem::at_block(location, stack)))
            .collect()
    }

    pub fn ground_item(&self, id: GroundItemId) -> Option<&GroundItem> {
        self.ground.get(id)
    }

    pub fn ground_item_mut(&mut self, id: GroundItemId) -> Option<&mut GroundItem> {
        self.ground.get_mut(id)
    }

    pub fn remove_ground_item(&mut self, id: GroundItemId) -> Option<GroundItem> {
        self.ground.remove(id)
    }

    pub fn ground_item_count(&self) -> usize {
        self.ground.len()
    }

    /// Ground items inside the axis-aligned box of `half_extent` around the
    /// centre of `centre`, in id order.
    pub fn ground_items_near(&self, centre: Location, half_extent: Fixed64) -> Vec<GroundItemId> {
        let c = block_centre(centre);
        let mut ids: Vec<GroundItemId> = self
            .ground
            .iter()
            .filter(|(_, item)| {
                item.world == centre.world
                    && item
                        .position
                        .iter()
                        .zip(c.iter())
                        .all(|(p, c)| (*p - *c).abs() <= half_extent)
            })
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    // -- regions ------------------------------------------------------------

    pub fn load_region(&mut self, region: RegionId) -> bool {
        self.loaded.insert(region)
    }

    pub fn unload_region(&mut self, region: RegionId) -> bool {
        self.loaded.remove(&region)
    }

    pub fn is_region_loaded(&self, region: RegionId) -> bool {
        self.loaded.contains(&region)
    }

    pub fn is_loaded(&self, location: Location) -> bool {
        self.is_region_loaded(location.region())
    }
}
