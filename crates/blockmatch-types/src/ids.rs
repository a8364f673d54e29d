//! Identifiers used throughout blockmatch.
//!
//! Order ids are opaque strings assigned outside the core (typically
//! `<address>-<sequence>`). Their lexicographic order is the deterministic
//! tie-break inside a price level, so the ordering derived here is part of
//! the consensus-critical behavior.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Order identifier, compared byte-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MarketPair
// ---------------------------------------------------------------------------

/// A trading pair (e.g., XYZ_BNB).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MarketPair {
    pub base: String,
    pub quote: String,
}

impl MarketPair {
    #[must_use]
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}_{}", self.base, self.quote)
    }
}

impl fmt::Display for MarketPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_orders_bytewise() {
        assert!(OrderId::from("1") < OrderId::from("2"));
        assert!(OrderId::from("2") < OrderId::from("91"));
        assert!(OrderId::from("91") < OrderId::from("92"));
        // Lexicographic, not numeric.
        assert!(OrderId::from("10") < OrderId::from("9"));
    }

    #[test]
    fn order_id_display_is_raw() {
        assert_eq!(OrderId::new("b-1").to_string(), "b-1");
    }

    #[test]
    fn market_pair_symbol() {
        let pair = MarketPair::new("XYZ", "BNB");
        assert_eq!(pair.symbol(), "XYZ_BNB");
        assert_eq!(pair.to_string(), "XYZ_BNB");
    }

    #[test]
    fn order_id_serializes_as_plain_string() {
        let oid = OrderId::from("s-1");
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, "\"s-1\"");
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(oid, back);
    }
}
