//! Overlapped price range extraction.
//!
//! Each round the book copies the crossing levels of both sides into an
//! [`OverlapBuffer`], which merges them into one row per distinct price,
//! highest price first. The matcher then works on these copies only.
//!
//! Rows and staging slots are recycled: the buffer keeps every slot it has
//! ever handed out and only resets the live count between rounds, so the
//! order vectors keep their allocations.

use blockmatch_types::{OrderPart, Price, Qty, Side, constants};

use crate::price_level::PriceLevel;

/// One row of the overlapped range: every crossing order at a single price.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlappedLevel {
    pub price: Price,
    pub buy_orders: Vec<OrderPart>,
    pub sell_orders: Vec<OrderPart>,
    /// Open buy quantity at this price.
    pub buy_total: Qty,
    /// Open sell quantity at this price.
    pub sell_total: Qty,
    /// Buy quantity at this price or higher.
    pub accumulated_buy: Qty,
    /// Sell quantity at this price or lower.
    pub accumulated_sell: Qty,
    /// `min(accumulated_buy, accumulated_sell)`.
    pub accumulated_executions: Qty,
    /// `accumulated_buy - accumulated_sell`.
    pub surplus: Qty,
}

impl OverlappedLevel {
    fn reset(&mut self, price: Price) {
        self.price = price;
        self.buy_orders.clear();
        self.sell_orders.clear();
        self.buy_total = 0;
        self.sell_total = 0;
        self.accumulated_buy = 0;
        self.accumulated_sell = 0;
        self.accumulated_executions = 0;
        self.surplus = 0;
    }
}

/// A `Vec` whose tail past `len` is kept as spare slots.
#[derive(Debug, Clone, Default)]
struct Slots<T> {
    items: Vec<T>,
    len: usize,
}

impl<T: Default> Slots<T> {
    fn with_capacity(n: usize) -> Self {
        Self {
            items: Vec::with_capacity(n),
            len: 0,
        }
    }

    /// The next free slot, reusing a spare one when there is one. The slot
    /// keeps whatever it held last.
    fn next_slot(&mut self) -> &mut T {
        if self.len == self.items.len() {
            self.items.push(T::default());
        }
        self.len += 1;
        &mut self.items[self.len - 1]
    }

    fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items[..self.len]
    }

    fn reset(&mut self) {
        self.len = 0;
    }
}

/// Reusable buffer holding the overlapped rows of one round.
#[derive(Debug, Clone, Default)]
pub struct OverlapBuffer {
    rows: Slots<OverlappedLevel>,
    buys: Slots<PriceLevel>,
    sells: Slots<PriceLevel>,
}

impl OverlapBuffer {
    #[must_use]
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            rows: Slots::with_capacity(rows),
            buys: Slots::with_capacity(rows),
            sells: Slots::with_capacity(rows),
        }
    }

    /// Buffer sized for a matching engine.
    #[must_use]
    pub fn for_engine() -> Self {
        Self::with_capacity(constants::DEFAULT_OVERLAP_ROWS)
    }

    /// Forget the previous round, keeping allocations.
    pub fn clear(&mut self) {
        self.rows.reset();
        self.buys.reset();
        self.sells.reset();
    }

    /// Copy a crossing level of `side` into staging. Levels of each side
    /// must arrive in that side's priority order.
    pub fn stage(&mut self, side: Side, level: &PriceLevel) {
        let slot = match side {
            Side::Buy => self.buys.next_slot(),
            Side::Sell => self.sells.next_slot(),
        };
        slot.price = level.price;
        slot.orders.clone_from(&level.orders);
    }

    /// Merge the staged levels into rows ordered by descending price. Buys
    /// are staged highest first and sells lowest first, so sells are read
    /// back to front. Returns the number of rows.
    pub fn merge(&mut self) -> usize {
        self.rows.reset();
        let buys = self.buys.as_mut_slice();
        let sells = self.sells.as_mut_slice();
        let mut i = 0;
        let mut j = sells.len();
        while i < buys.len() || j > 0 {
            let buy = buys.get(i).map(|l| l.price);
            let sell = j.checked_sub(1).map(|k| sells[k].price);
            let (take_buy, take_sell) = match (buy, sell) {
                (Some(bp), Some(sp)) => (bp >= sp, sp >= bp),
                (Some(_), None) => (true, false),
                (None, Some(_)) => (false, true),
                (None, None) => break,
            };
            let Some(price) = (if take_buy { buy } else { sell }) else {
                break;
            };
            let row = self.rows.next_slot();
            row.reset(price);
            if take_buy {
                std::mem::swap(&mut row.buy_orders, &mut buys[i].orders);
                i += 1;
            }
            if take_sell {
                std::mem::swap(&mut row.sell_orders, &mut sells[j - 1].orders);
                j -= 1;
            }
        }
        self.rows.len
    }

    #[must_use]
    pub fn rows(&self) -> &[OverlappedLevel] {
        self.rows.as_slice()
    }

    pub fn rows_mut(&mut self) -> &mut [OverlappedLevel] {
        self.rows.as_mut_slice()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.len == 0
    }
}
