use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Stack size used for item types the registry does not know about.
pub const DEFAULT_MAX_STACK_SIZE: u32 = 64;

/// A placement role an item type can play in a specialized container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    /// Burns in a smelting container's fuel slot.
    Fuel,
    /// Accepted by a smelting container's input slot.
    Smeltable,
    /// Empty container left behind in a fuel slot (drained outbound).
    EmptyBucket,
    /// Powers a brewing container.
    BrewingFuel,
    /// Accepted by a brewing container's ingredient slot.
    BrewingIngredient,
    /// Accepted by a brewing container's result slots.
    Potion,
}

impl ItemRole {
    const fn bit(self) -> u8 {
        match self {
            ItemRole::Fuel => 1 << 0,
            ItemRole::Smeltable => 1 << 1,
            ItemRole::EmptyBucket => 1 << 2,
            ItemRole::BrewingFuel => 1 << 3,
            ItemRole::BrewingIngredient => 1 << 4,
            ItemRole::Potion => 1 << 5,
        }
    }
}

/// Set of [`ItemRole`]s, packed into a byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRoles(u8);

impl ItemRoles {
    pub const NONE: ItemRoles = ItemRoles(0);

    pub fn with(mut self, role: ItemRole) -> Self {
        self.0 |= role.bit();
        self
    }

    pub fn insert(&mut self, role: ItemRole) {
        self.0 |= role.bit();
    }

    pub fn contains(&self, role: ItemRole) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<ItemRole> for ItemRoles {
    fn from_iter<I: IntoIterator<Item = ItemRole>>(iter: I) -> Self {
        iter.into_iter().fold(ItemRoles::NONE, ItemRoles::with)
    }
}

/// An item type definition in the registry.
#[derive(Debug, Clone)]
pub struct ItemTypeDef {
    pub name: String,
    pub max_stack_size: u32,
    pub roles: ItemRoles,
}

/// Builder for constructing an immutable Registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item type. Returns its ID.
    pub fn register_item(
        &mut self,
        name: &str,
        max_stack_size: u32,
        roles: ItemRoles,
    ) -> ItemTypeId {
        let id = ItemTypeId(self.items.len() as u32);
        self.items.push(ItemTypeDef {
            name: name.to_string(),
            max_stack_size,
            roles,
        });
        self.item_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Lookup item type ID by name.
    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Finalize and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if item.max_stack_size == 0 || item.max_stack_size > DEFAULT_MAX_STACK_SIZE {
                return Err(RegistryError::InvalidStackSize {
                    name: item.name.clone(),
                    size: item.max_stack_size,
                });
            }
            if !seen.insert(item.name.as_str()) {
                return Err(RegistryError::DuplicateName(item.name.clone()));
            }
        }

        Ok(Registry {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
        })
    }
}

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug, Default)]
pub struct Registry {
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
}

impl Registry {
    pub fn get_item(&self, id: ItemTypeId) -> Option<&ItemTypeDef> {
        self.items.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn item_name(&self, id: ItemTypeId) -> Option<&str> {
        self.get_item(id).map(|item| item.name.as_str())
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Maximum units a single slot may hold for this type.
    pub fn max_stack_size(&self, id: ItemTypeId) -> u32 {
        self.get_item(id)
            .map(|item| item.max_stack_size)
            .unwrap_or(DEFAULT_MAX_STACK_SIZE)
    }

    pub fn roles(&self, id: ItemTypeId) -> ItemRoles {
        self.get_item(id).map(|item| item.roles).unwrap_or_default()
    }

    pub fn has_role(&self, id: ItemTypeId, role: ItemRole) -> bool {
        self.roles(id).contains(role)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("item '{name}' has invalid max stack size {size} (expected 1..=64)")]
    InvalidStackSize { name: String, size: u32 },
    #[error("duplicate item name: {0}")]
    DuplicateName(String),
}
