//! Capabilities the engine borrows from its host: access control, currency,
//! and optional entity stacking.
//!
//! Hooks are injected at engine construction through [`Hooks`]. There is no
//! process-wide registry; a missing stacking hook is simply `None`.

use crate::fixed::Fixed64;
use crate::id::{ActorId, GroundItemId, Location};
use crate::world::GroundItem;

/// Someone performing an action: a player, or an admin bypassing ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Actor {
    pub id: ActorId,
    /// Admins may manage any hopper regardless of owner and members.
    pub admin: bool,
}

impl Actor {
    pub fn player(id: ActorId) -> Self {
        Self { id, admin: false }
    }

    pub fn admin(id: ActorId) -> Self {
        Self { id, admin: true }
    }
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

/// Protection/region checks. A `false` is a hard rejection, never retried.
pub trait AccessControl: std::fmt::Debug + Send {
    /// May `actor` place or break blocks at `location`?
    fn can_build(&self, actor: &Actor, location: Location) -> bool;

    /// May `actor` open the container at `location`?
    fn can_open(&self, actor: &Actor, location: Location) -> bool;
}

/// Access control that permits everything. Used when the host has no
/// protection plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn can_build(&self, _actor: &Actor, _location: Location) -> bool {
        true
    }

    fn can_open(&self, _actor: &Actor, _location: Location) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurrencyError {
    #[error("insufficient funds")]
    Insufficient,
    #[error("economy unavailable: {0}")]
    Unavailable(String),
}

/// The economy used to pay for upgrades.
pub trait Currency: std::fmt::Debug + Send {
    fn balance(&self, actor: &Actor) -> Fixed64;

    fn withdraw(&mut self, actor: &Actor, amount: Fixed64) -> Result<(), CurrencyError>;
}

/// An economy where nobody has money. Every paid upgrade is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEconomy;

impl Currency for NoEconomy {
    fn balance(&self, _actor: &Actor) -> Fixed64 {
        Fixed64::ZERO
    }

    fn withdraw(&mut self, _actor: &Actor, amount: Fixed64) -> Result<(), CurrencyError> {
        if amount <= Fixed64::ZERO {
            Ok(())
        } else {
            Err(CurrencyError::Insufficient)
        }
    }
}

// ---------------------------------------------------------------------------
// Entity stacking
// ---------------------------------------------------------------------------

/// Name under which the stacking hook can be listed in `disabled_hooks`.
pub const STACKING_HOOK_NAME: &str = "stacking";

/// Integration with an entity-stacking system that merges many ground items
/// into one entity. When installed, the hook's count is the total number of
/// units the entity represents.
pub trait StackingHook: std::fmt::Debug + Send {
    fn get_stack_count(&self, id: GroundItemId, item: &GroundItem) -> u32;

    fn set_stack_count(&mut self, id: GroundItemId, item: &mut GroundItem, count: u32);

    /// The hook's name, matched against `disabled_hooks`.
    fn name(&self) -> &str {
        STACKING_HOOK_NAME
    }
}

// ---------------------------------------------------------------------------
// Hooks bundle
// ---------------------------------------------------------------------------

/// Every host capability the engine needs, injected at construction.
#[derive(Debug)]
pub struct Hooks {
    pub access: Box<dyn AccessControl>,
    pub currency: Box<dyn Currency>,
    pub stacking: Option<Box<dyn StackingHook>>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            access: Box::new(AllowAll),
            currency: Box::new(NoEconomy),
            stacking: None,
        }
    }
}

impl Hooks {
    pub fn with_access(mut self, access: impl AccessControl + 'static) -> Self {
        self.access = Box::new(access);
        self
    }

    pub fn with_currency(mut self, currency: impl Currency + 'static) -> Self {
        self.currency = Box::new(currency);
        self
    }

    pub fn with_stacking(mut self, stacking: impl StackingHook + 'static) -> Self {
        self.stacking = Some(Box::new(stacking));
        self
    }

    /// Units a ground item represents: the stacking hook's count when one is
    /// installed, otherwise the item's own stack count.
    pub fn ground_amount(&self, id: GroundItemId, item: &GroundItem) -> u32 {
        match &self.stacking {
            Some(hook) => hook.get_stack_count(id, item),
            None => item.stack.count,
        }
    }
}
