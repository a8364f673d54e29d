//! # blockmatch-types
//!
//! Shared types, errors, and configuration for the **blockmatch** matching core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`MarketPair`]
//! - **Fixed point**: [`Price`], [`Qty`] and the [`fixed8`] conversions
//! - **Order model**: [`Side`], [`OrderPart`]
//! - **Trade model**: [`Trade`]
//! - **Configuration**: [`MarketConfig`], [`BookConfig`], [`BookBacking`]
//! - **Errors**: [`BlockmatchError`] with `BM_ERR_` prefix codes
//! - **Constants**: precision and default buffer sizes

pub mod config;
pub mod constants;
pub mod error;
pub mod fixed8;
pub mod ids;
pub mod order;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use blockmatch_types::{OrderPart, Side, Trade, ...};

pub use config::*;
pub use error::*;
pub use fixed8::{Price, Qty};
pub use ids::*;
pub use order::*;
pub use trade::*;

// Constants are accessed via `blockmatch_types::constants::FOO`
// (not re-exported to avoid name collisions).
