//! The order book for a single market pair.
//!
//! [`OrderBook`] is the seam between the matcher and the storage of resting
//! orders. Two backings implement it:
//!
//! - [`BucketedBook`]: an unrolled chain of fixed-size buckets, cheap for
//!   the churn that happens near the top of the book
//! - [`TreeBook`]: `BTreeMap` per side
//!
//! Both keep each side in priority order (buys highest first, sells lowest
//! first) and produce identical overlaps for the same order stream.

mod bucketed;
mod tree;

use std::cmp::Ordering;

use blockmatch_types::{BlockmatchError, OrderId, OrderPart, Price, Qty, Result, Side};

pub use bucketed::{BucketChain, BucketedBook};
pub use tree::TreeBook;

use crate::overlap::OverlapBuffer;
use crate::price_level::PriceLevel;

/// Buy-side priority: `Greater` when `p1` is the higher (better) bid.
#[must_use]
pub fn compare_buy(p1: Price, p2: Price) -> Ordering {
    Side::Buy.compare(p1, p2)
}

/// Sell-side priority: `Greater` when `p1` is the lower (better) ask.
#[must_use]
pub fn compare_sell(p1: Price, p2: Price) -> Ordering {
    Side::Sell.compare(p1, p2)
}

/// Storage of resting orders for one pair, kept in price priority per side.
pub trait OrderBook: std::fmt::Debug + Send {
    /// Insert a whole level. Fails with `PriceLevelExists` if the price is
    /// already present on that side.
    fn insert_price_level(&mut self, side: Side, level: PriceLevel) -> Result<()>;

    /// Remove a whole level. Returns `false` if there was none at `price`.
    fn remove_price_level(&mut self, side: Side, price: Price) -> bool;

    fn price_level(&self, side: Side, price: Price) -> Option<&PriceLevel>;

    fn price_level_mut(&mut self, side: Side, price: Price) -> Option<&mut PriceLevel>;

    /// Best price on a side: highest bid or lowest ask.
    fn best_price(&self, side: Side) -> Option<Price>;

    /// Number of price levels on a side.
    fn level_count(&self, side: Side) -> usize;

    /// Visit levels from the best price while they lie within `[from, to]`
    /// in the side's priority order (`from` is the better bound).
    fn visit_range(&self, side: Side, from: Price, to: Price, f: &mut dyn FnMut(&PriceLevel));

    /// Visit at most `max_levels` levels from the best price. The callback
    /// receives the level and its depth index.
    fn visit_levels(&self, side: Side, max_levels: usize, f: &mut dyn FnMut(&PriceLevel, usize));

    /// Visit every level of a side mutably, in priority order.
    fn for_each_level_mut(&mut self, side: Side, f: &mut dyn FnMut(&mut PriceLevel));

    /// Drop every level on both sides.
    fn clear(&mut self);

    // =================================================================
    // Provided operations
    // =================================================================

    /// Insert an order at `price`, creating the level if needed. Returns the
    /// number of orders at the level afterwards.
    fn insert_order(
        &mut self,
        side: Side,
        id: OrderId,
        time: i64,
        price: Price,
        qty: Qty,
    ) -> Result<usize> {
        if price <= 0 {
            return Err(BlockmatchError::InvalidOrder {
                reason: format!("order {id} has non-positive price {price}"),
            });
        }
        if qty <= 0 {
            return Err(BlockmatchError::InvalidOrder {
                reason: format!("order {id} has non-positive quantity {qty}"),
            });
        }
        if let Some(level) = self.price_level_mut(side, price) {
            return level.add_order(id, time, qty);
        }
        let mut level = PriceLevel::new(price);
        level.add_order(id, time, qty)?;
        self.insert_price_level(side, level)?;
        Ok(1)
    }

    /// Remove an order. The level goes away with its last order.
    fn remove_order(&mut self, side: Side, id: &OrderId, price: Price) -> Result<OrderPart> {
        let level = self
            .price_level_mut(side, price)
            .ok_or(BlockmatchError::PriceLevelNotFound { side, price })?;
        let (order, left) = level.remove_order(id)?;
        if left == 0 {
            self.remove_price_level(side, price);
        }
        Ok(order)
    }

    fn get_order(&self, side: Side, id: &OrderId, price: Price) -> Result<&OrderPart> {
        self.price_level(side, price)
            .ok_or(BlockmatchError::PriceLevelNotFound { side, price })?
            .get_order(id)
    }

    /// Stage the levels of both sides that cross and merge them into
    /// `buf`. Returns the number of overlapped rows (0 for a one-sided or
    /// uncrossed book).
    fn overlapped_range(&self, buf: &mut OverlapBuffer) -> usize {
        buf.clear();
        let (Some(buy_top), Some(sell_top)) = (self.best_price(Side::Buy), self.best_price(Side::Sell))
        else {
            return 0;
        };
        if compare_buy(buy_top, sell_top) == Ordering::Less {
            return 0;
        }
        self.visit_range(Side::Buy, buy_top, sell_top, &mut |level| {
            buf.stage(Side::Buy, level);
        });
        self.visit_range(Side::Sell, sell_top, buy_top, &mut |level| {
            buf.stage(Side::Sell, level);
        });
        buf.merge()
    }

    /// Walk up to `max_levels` levels on each side, buys first.
    fn show_depth(
        &self,
        max_levels: usize,
        f_buy: &mut dyn FnMut(&PriceLevel, usize),
        f_sell: &mut dyn FnMut(&PriceLevel, usize),
    ) {
        self.visit_levels(Side::Buy, max_levels, f_buy);
        self.visit_levels(Side::Sell, max_levels, f_sell);
    }

    /// Copies of every level, `(buys, sells)`, each in priority order.
    fn all_levels(&self) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let mut buys = Vec::with_capacity(self.level_count(Side::Buy));
        let mut sells = Vec::with_capacity(self.level_count(Side::Sell));
        self.visit_levels(Side::Buy, usize::MAX, &mut |level, _| buys.push(level.clone()));
        self.visit_levels(Side::Sell, usize::MAX, &mut |level, _| sells.push(level.clone()));
        (buys, sells)
    }

    /// Remove every order that arrived before `before_time`, on both sides.
    /// Levels left empty are removed. Returns the number of orders removed.
    fn expire_orders(&mut self, before_time: i64, on_expired: &mut dyn FnMut(Side, &OrderPart)) -> usize {
        let mut removed = 0;
        let mut emptied = Vec::new();
        for side in [Side::Buy, Side::Sell] {
            self.for_each_level_mut(side, &mut |level| {
                removed += level.remove_orders_before(before_time, |order| on_expired(side, order));
                if level.is_empty() {
                    emptied.push((side, level.price));
                }
            });
        }
        for (side, price) in emptied {
            self.remove_price_level(side, price);
        }
        removed
    }

    /// Total number of resting orders on a side.
    fn order_count(&self, side: Side) -> usize {
        let mut count = 0;
        self.visit_levels(side, usize::MAX, &mut |level, _| count += level.len());
        count
    }
}
