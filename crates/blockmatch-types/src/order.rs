//! Order types held by the matching core.
//!
//! The core never sees full order messages: only the part of an order that
//! matters for matching ([`OrderPart`]) lives in the book.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{OrderId, Price, Qty};

/// Which side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Priority order of two prices on this side.
    ///
    /// `Greater` means `p1` is the better (more aggressive) price: higher for
    /// buys, lower for sells.
    #[must_use]
    pub fn compare(self, p1: Price, p2: Price) -> Ordering {
        match self {
            Self::Buy => p1.cmp(&p2),
            Self::Sell => p2.cmp(&p1),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// The matching-relevant part of a resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPart {
    pub id: OrderId,
    /// Arrival sequence (block height the order was accepted in).
    pub time: i64,
    /// Original quantity.
    pub qty: Qty,
    /// Quantity filled so far, across rounds.
    pub cum_qty: Qty,
    /// Quantity this order may still trade in the current round.
    #[serde(skip)]
    pub next_trade: Qty,
}

impl OrderPart {
    #[must_use]
    pub fn new(id: impl Into<OrderId>, time: i64, qty: Qty) -> Self {
        Self {
            id: id.into(),
            time,
            qty,
            cum_qty: 0,
            next_trade: 0,
        }
    }

    /// Remaining open quantity, never negative.
    #[must_use]
    pub fn leaves_qty(&self) -> Qty {
        if self.cum_qty >= self.qty {
            0
        } else {
            self.qty - self.cum_qty
        }
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.leaves_qty() == 0
    }

    /// Reset the per-round scratch quantity to the full open quantity.
    pub fn reset_next_trade(&mut self) -> Qty {
        self.next_trade = self.leaves_qty();
        self.next_trade
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl OrderPart {
    /// An order with its round scratch already primed, as a fresh round would.
    pub fn dummy(id: &str, time: i64, qty: Qty) -> Self {
        let mut order = Self::new(id, time, qty);
        order.reset_next_trade();
        order
    }
}
