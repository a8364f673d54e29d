//! # blockmatch-matchcore
//!
//! **Pure deterministic call-auction matching for one trading pair.**
//!
//! Orders accumulate in the book during a block; at the end of the block
//! the engine runs a single auction round that clears every crossing order
//! at one uniform price. It has:
//!
//! - **Zero side effects**: no I/O, no balances, no clock; block heights come
//!   in with the orders
//! - **Deterministic output**: exact fixed-point arithmetic and id-ordered
//!   fills, so every node produces the same trades and trade root
//! - **Swappable books**: a bucket chain and a `BTreeMap` book behind one
//!   [`OrderBook`] trait
//! - **Lot-size aware allocation**: partially executable rows are shared in
//!   time priority, pro rata in whole lots within the same block

pub mod allocation;
pub mod determinism;
pub mod discovery;
pub mod engine;
pub mod orderbook;
pub mod overlap;
pub mod price_level;

pub use allocation::{allocate_residual, reserve_qty};
pub use determinism::{check_trade_root, compute_trade_root, verify_trade_root};
pub use discovery::{PriceDiscovery, prepare_match};
pub use engine::{MatchEngine, fill_orders};
pub use orderbook::{BucketChain, BucketedBook, OrderBook, TreeBook, compare_buy, compare_sell};
pub use overlap::{OverlapBuffer, OverlappedLevel};
pub use price_level::PriceLevel;
