//! Hopper Core -- upgradable item hoppers for block-based game worlds.
//!
//! A hopper sucks up nearby ground items and pushes its contents into
//! linked containers, each at a rate and in batches governed by purchased
//! upgrades. The host feeds world events in and calls [`engine::Engine::step`]
//! on its own clock; the engine never performs I/O itself.
//!
//! # Step Pipeline
//!
//! Each call to [`engine::Engine::step`] runs three phases:
//!
//! 1. **Deferred** -- Replay native moves suppressed since the last step.
//! 2. **Suction** -- Due hoppers capture ground items within range.
//! 3. **Transfer** -- Due, unpowered hoppers push into their links.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Tick driver, event dispatch, and lifecycle.
//! - [`hopper::HopperEntity`] -- Per-hopper configuration and timers.
//! - [`filter::Filter`] -- None, whitelist, blacklist, or destroy.
//! - [`upgrade::UpgradeTracks`] -- Priced level ladders for the six upgrades.
//! - [`adapter`] -- Placement rules for smelting, brewing, and grid containers.
//! - [`persist::Codec`] -- Versioned key/value records via bitcode.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.

pub mod adapter;
pub mod cache;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod event;
pub mod filter;
pub mod fixed;
pub mod hooks;
pub mod hopper;
pub mod id;
pub mod item;
pub mod persist;
pub mod rate;
pub mod registry;
pub mod settings;
pub mod store;
pub mod transfer;
pub mod upgrade;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
