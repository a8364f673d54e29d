//! System-wide constants for the blockmatch matching core.

/// Number of decimal places carried by every price and quantity.
pub const PRICE_PRECISION: u32 = 8;

/// Fixed-point scale: `1.0` is represented as `FIXED8_ONE`.
pub const FIXED8_ONE: i64 = 100_000_000;

/// Default number of price levels a book side is sized for up front.
pub const DEFAULT_BOOK_CAPACITY: usize = 10_000;

/// Default number of price levels held by one bucket of the bucketed chain.
pub const DEFAULT_BUCKET_SIZE: usize = 16;

/// Smallest bucket size that still allows a bucket to be split in half.
pub const MIN_BUCKET_SIZE: usize = 2;

/// Initial capacity of the per-engine overlap row buffer.
pub const DEFAULT_OVERLAP_ROWS: usize = 16;

/// Initial capacity of the per-engine candidate index buffers.
pub const DEFAULT_CANDIDATE_SLOTS: usize = 8;

/// Initial capacity of the per-engine trade buffer.
pub const DEFAULT_TRADE_SLOTS: usize = 64;
