//! Command implementations wiring configuration to the library crates.

pub(crate) mod download;
pub(crate) mod features;
pub(crate) mod store_manager;
