//! Configuration types for a listed trading pair.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BlockmatchError, MarketPair, Price, Qty, Result, constants, fixed8};

/// Which order book structure backs a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookBacking {
    /// Unrolled bucket chain, tuned for activity near the top of the book.
    #[default]
    Bucketed,
    /// Balanced tree keyed by price.
    Tree,
}

/// Sizing of the order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    pub backing: BookBacking,
    /// Price levels per side the book is sized for up front.
    pub capacity: usize,
    /// Price levels per bucket (bucketed backing only).
    pub bucket_size: usize,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            backing: BookBacking::default(),
            capacity: constants::DEFAULT_BOOK_CAPACITY,
            bucket_size: constants::DEFAULT_BUCKET_SIZE,
        }
    }
}

/// Per-pair configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Base asset (e.g., "XYZ").
    pub base: String,
    /// Quote asset (e.g., "BNB").
    pub quote: String,
    /// Listing price; the reference price of the very first round.
    pub listing_price: Decimal,
    /// Lot size (quantity granularity).
    pub lot_size: Decimal,
    #[serde(default)]
    pub book: BookConfig,
}

impl MarketConfig {
    #[must_use]
    pub fn new(
        base: impl Into<String>,
        quote: impl Into<String>,
        listing_price: Decimal,
        lot_size: Decimal,
    ) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            listing_price,
            lot_size,
            book: BookConfig::default(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check that the configuration is usable by a matching engine.
    pub fn validate(&self) -> Result<()> {
        if self.base.is_empty() || self.quote.is_empty() {
            return Err(BlockmatchError::Configuration(
                "base and quote assets must be set".into(),
            ));
        }
        if self.listing_price_fixed8()? <= 0 {
            return Err(BlockmatchError::Configuration(format!(
                "listing price must be positive, got {}",
                self.listing_price
            )));
        }
        if self.lot_size_fixed8()? <= 0 {
            return Err(BlockmatchError::Configuration(format!(
                "lot size must be positive, got {}",
                self.lot_size
            )));
        }
        if self.book.backing == BookBacking::Bucketed
            && self.book.bucket_size < constants::MIN_BUCKET_SIZE
        {
            return Err(BlockmatchError::Configuration(format!(
                "bucket size must be at least {}, got {}",
                constants::MIN_BUCKET_SIZE,
                self.book.bucket_size
            )));
        }
        Ok(())
    }

    pub fn listing_price_fixed8(&self) -> Result<Price> {
        fixed8::to_fixed8(self.listing_price)
    }

    pub fn lot_size_fixed8(&self) -> Result<Qty> {
        fixed8::to_fixed8(self.lot_size)
    }

    #[must_use]
    pub fn pair(&self) -> MarketPair {
        MarketPair::new(&self.base, &self.quote)
    }

    /// Returns the market symbol (e.g., "XYZ_BNB").
    #[must_use]
    pub fn symbol(&self) -> String {
        self.pair().symbol()
    }
}
