//! Trade records produced by an auction round.
//!
//! A [`Trade`] is the immutable record of one fill between a buy and a sell
//! order at the round's uniform clearing price. There is no trade id: the
//! pair of order ids identifies a trade within a round, and the position in
//! the round's trade list is reproducible on every node.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, Price, Qty, fixed8};

/// One execution between two orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// The sell order.
    pub sell_id: OrderId,
    /// Execution price (the round's clearing price).
    pub price: Price,
    /// Executed quantity.
    pub qty: Qty,
    /// The buy order.
    pub buy_id: OrderId,
    /// Buy order's cumulative filled quantity after this trade.
    pub buyer_cum_qty: Qty,
    /// Sell order's cumulative filled quantity after this trade.
    pub seller_cum_qty: Qty,
}

impl Trade {
    /// Quote amount = price × quantity, as a decimal.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        fixed8::from_fixed8(self.price) * fixed8::from_fixed8(self.qty)
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{} <- {}] {} @ {}",
            self.buy_id,
            self.sell_id,
            fixed8::from_fixed8(self.qty),
            fixed8::from_fixed8(self.price),
        )
    }
}
