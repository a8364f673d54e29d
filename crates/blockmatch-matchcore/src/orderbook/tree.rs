//! `BTreeMap` backed order book.
//!
//! - **Buys**: `BTreeMap<Reverse<Price>, PriceLevel>` -- highest price first
//! - **Sells**: `BTreeMap<Price, PriceLevel>` -- lowest price first

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

use blockmatch_types::{BlockmatchError, Price, Result, Side};

use super::OrderBook;
use crate::price_level::PriceLevel;

#[derive(Debug, Default)]
pub struct TreeBook {
    /// Buy side: highest price first (`Reverse` key).
    buys: BTreeMap<Reverse<Price>, PriceLevel>,
    /// Sell side: lowest price first.
    sells: BTreeMap<Price, PriceLevel>,
}

impl TreeBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderBook for TreeBook {
    fn insert_price_level(&mut self, side: Side, level: PriceLevel) -> Result<()> {
        if level.is_empty() {
            return Err(BlockmatchError::InvalidOrder {
                reason: format!("price level {} has no orders", level.price),
            });
        }
        let price = level.price;
        if self.price_level(side, price).is_some() {
            return Err(BlockmatchError::PriceLevelExists { side, price });
        }
        match side {
            Side::Buy => self.buys.insert(Reverse(price), level),
            Side::Sell => self.sells.insert(price, level),
        };
        Ok(())
    }

    fn remove_price_level(&mut self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.buys.remove(&Reverse(price)).is_some(),
            Side::Sell => self.sells.remove(&price).is_some(),
        }
    }

    fn price_level(&self, side: Side, price: Price) -> Option<&PriceLevel> {
        match side {
            Side::Buy => self.buys.get(&Reverse(price)),
            Side::Sell => self.sells.get(&price),
        }
    }

    fn price_level_mut(&mut self, side: Side, price: Price) -> Option<&mut PriceLevel> {
        match side {
            Side::Buy => self.buys.get_mut(&Reverse(price)),
            Side::Sell => self.sells.get_mut(&price),
        }
    }

    fn best_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.buys.keys().next().map(|r| r.0),
            Side::Sell => self.sells.keys().next().copied(),
        }
    }

    fn level_count(&self, side: Side) -> usize {
        match side {
            Side::Buy => self.buys.len(),
            Side::Sell => self.sells.len(),
        }
    }

    fn visit_range(&self, side: Side, from: Price, to: Price, f: &mut dyn FnMut(&PriceLevel)) {
        // `BTreeMap::range` panics on an inverted range.
        if side.compare(from, to) == Ordering::Less {
            return;
        }
        match side {
            Side::Buy => self.buys.range(Reverse(from)..=Reverse(to)).for_each(|(_, l)| f(l)),
            Side::Sell => self.sells.range(from..=to).for_each(|(_, l)| f(l)),
        }
    }

    fn visit_levels(&self, side: Side, max_levels: usize, f: &mut dyn FnMut(&PriceLevel, usize)) {
        match side {
            Side::Buy => self
                .buys
                .values()
                .take(max_levels)
                .enumerate()
                .for_each(|(i, l)| f(l, i)),
            Side::Sell => self
                .sells
                .values()
                .take(max_levels)
                .enumerate()
                .for_each(|(i, l)| f(l, i)),
        }
    }

    fn for_each_level_mut(&mut self, side: Side, f: &mut dyn FnMut(&mut PriceLevel)) {
        match side {
            Side::Buy => self.buys.values_mut().for_each(f),
            Side::Sell => self.sells.values_mut().for_each(f),
        }
    }

    fn clear(&mut self) {
        self.buys.clear();
        self.sells.clear();
    }
}
