//! Hopper Data -- configuration loading for `hopper-core`.
//!
//! Reads `items.{ron,toml,json}` and `settings.{ron,toml,json}` from a
//! directory and resolves them into a [`hopper_core::registry::Registry`]
//! and validated [`hopper_core::settings::Settings`].

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, HopperData, load_hopper_data};
