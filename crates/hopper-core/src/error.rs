//! The engine-level error taxonomy.
//!
//! Module errors (`UpgradeError`, `LinkError`, `StoreError`, ...) convert
//! into [`HopperError`] so engine operations can use `?` throughout. Normal
//! outcomes such as a rate-limited hopper are returned as values, not
//! errors; the `RateLimited` and `FilterRejected` variants exist for callers
//! that want to surface those outcomes as messages.

use crate::fixed::Fixed64;
use crate::hopper::LinkError;
use crate::id::{ActorId, Location};
use crate::registry::RegistryError;
use crate::store::StoreError;
use crate::upgrade::{UpgradeError, UpgradeKind};

#[derive(Debug, thiserror::Error)]
pub enum HopperError {
    /// A configured feature is unusable and has been disabled.
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    #[error("no hopper at {0}")]
    EntityNotFound(Location),

    #[error("hopper at {0} is cooling down")]
    RateLimited(Location),

    #[error("filter rejected the item")]
    FilterRejected,

    #[error("link capacity of {capacity} reached")]
    CapacityExhausted { capacity: u32 },

    /// The durable store failed. Never swallowed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("upgrade costs {price}, balance is {balance}")]
    InsufficientFunds { price: Fixed64, balance: Fixed64 },

    #[error("{actor} may not do that at {location}")]
    AccessDenied { actor: ActorId, location: Location },

    #[error("{0} is already at its maximum level")]
    Maxed(UpgradeKind),

    #[error(transparent)]
    Link(LinkError),

    #[error(transparent)]
    Upgrade(UpgradeError),
}

impl From<UpgradeError> for HopperError {
    fn from(e: UpgradeError) -> Self {
        match e {
            // A disabled track behaves as if it were maxed.
            UpgradeError::Maxed(kind) | UpgradeError::TrackDisabled(kind) => {
                HopperError::Maxed(kind)
            }
            UpgradeError::InsufficientFunds { price, balance, .. } => {
                HopperError::InsufficientFunds { price, balance }
            }
            UpgradeError::EmptyTrack(_)
            | UpgradeError::DuplicateLevel { .. }
            | UpgradeError::NegativePrice { .. }
            | UpgradeError::InvalidLevel { .. }
            | UpgradeError::MissingStartingLevel(_) => {
                HopperError::ConfigurationInvalid(e.to_string())
            }
            other => HopperError::Upgrade(other),
        }
    }
}

impl From<LinkError> for HopperError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::CapacityExhausted { capacity } => {
                HopperError::CapacityExhausted { capacity }
            }
            other => HopperError::Link(other),
        }
    }
}

impl From<RegistryError> for HopperError {
    fn from(e: RegistryError) -> Self {
        HopperError::ConfigurationInvalid(e.to_string())
    }
}

impl HopperError {
    /// Whether this error is a hard failure rather than a user-facing
    /// rejection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HopperError::PersistenceFailure(_) | HopperError::ConfigurationInvalid(_))
    }

    /// Whether the operation changed nothing and the caller should carry on
    /// silently. A hopper that vanished between a click and the mutation is
    /// the usual case.
    pub fn is_no_op(&self) -> bool {
        matches!(self, HopperError::EntityNotFound(_) | HopperError::RateLimited(_))
    }
}
