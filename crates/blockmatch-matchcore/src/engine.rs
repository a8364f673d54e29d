//! The per-pair call-auction engine.
//!
//! Once per block the engine takes the crossing part of the book, picks a
//! single clearing price and fills as much quantity as possible at that
//! price. The round works on copies of the crossing levels held in the
//! [`OverlapBuffer`]; filled quantities reach the book only when the whole
//! round succeeds, so a failed round leaves the book untouched.
//!
//! A caller drives one pair like this:
//!
//! 1. insert and remove orders for the block
//! 2. [`MatchEngine::match_round`]
//! 3. publish [`MatchEngine::trades`]
//! 4. [`MatchEngine::drop_filled_orders`]

use std::cmp::Ordering;

use blockmatch_types::{BlockmatchError, BookBacking, MarketConfig, Price, Qty, Result, Side, Trade, constants};

use crate::allocation::reserve_qty;
use crate::determinism::compute_trade_root;
use crate::discovery::{PriceDiscovery, prepare_match, sum_orders_total_left};
use crate::orderbook::{BucketedBook, OrderBook, TreeBook};
use crate::overlap::{OverlapBuffer, OverlappedLevel};
use crate::price_level::sort_by_id;

/// Matching engine for one trading pair.
#[derive(Debug)]
pub struct MatchEngine {
    book: Box<dyn OrderBook>,
    lot_size: Qty,
    last_trade_price: Price,
    overlapped: OverlapBuffer,
    discovery: PriceDiscovery,
    trades: Vec<Trade>,
}

impl MatchEngine {
    /// Engine over `book`. `listing_price` is the reference price until the
    /// first trade.
    #[must_use]
    pub fn new(book: Box<dyn OrderBook>, listing_price: Price, lot_size: Qty) -> Self {
        Self {
            book,
            lot_size,
            last_trade_price: listing_price,
            overlapped: OverlapBuffer::for_engine(),
            discovery: PriceDiscovery::default(),
            trades: Vec::with_capacity(constants::DEFAULT_TRADE_SLOTS),
        }
    }

    /// Validate `config` and build an engine with the configured book.
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        config.validate()?;
        let book: Box<dyn OrderBook> = match config.book.backing {
            BookBacking::Bucketed => Box::new(BucketedBook::new(config.book.capacity, config.book.bucket_size)),
            BookBacking::Tree => Box::new(TreeBook::new()),
        };
        let engine = Self::new(book, config.listing_price_fixed8()?, config.lot_size_fixed8()?);
        tracing::debug!(
            symbol = %config.symbol(),
            backing = ?config.book.backing,
            listing_price = engine.last_trade_price,
            lot_size = engine.lot_size,
            "Match engine created"
        );
        Ok(engine)
    }

    /// Run one auction round over the current book.
    ///
    /// On success the trades are available from [`trades`](Self::trades),
    /// filled quantities are written back to the book and the clearing price
    /// becomes the new reference price. A book that does not cross is a
    /// successful round with no trades. A crossing range whose orders are
    /// already fully filled still moves the reference price to the
    /// discovered one.
    ///
    /// On failure (`NoClearingPrice`, `AllocationFailed`) the trade list is
    /// empty, the book and the reference price are unchanged.
    pub fn match_round(&mut self) -> Result<()> {
        self.trades.clear();
        let rows = self.book.overlapped_range(&mut self.overlapped);
        if rows == 0 {
            return Ok(());
        }

        match self.run_auction() {
            Ok(price) => {
                self.last_trade_price = price;
                self.write_back_fills();
                tracing::debug!(
                    rows,
                    clearing_price = price,
                    trades = self.trades.len(),
                    trade_root = %hex::encode(compute_trade_root(&self.trades)),
                    "Auction round complete"
                );
                Ok(())
            }
            Err(err) => {
                self.trades.clear();
                self.overlapped.clear();
                tracing::warn!(rows, reference_price = self.last_trade_price, error = %err, "Auction round failed");
                Err(err)
            }
        }
    }

    /// Discover the price and fill the overlapped rows.
    fn run_auction(&mut self) -> Result<Price> {
        let rows = self.overlapped.rows_mut();
        prepare_match(rows);
        let (price, index) = self.discovery.discover(rows, self.last_trade_price)?;
        let mut total_exec = rows[index].accumulated_executions;
        tracing::debug!(clearing_price = price, index, executions = total_exec, "Clearing price found");

        let mut i = 0;
        let mut j = rows.len() - 1;
        // Buys above the clearing row and sells below it cannot trade.
        while i <= index && index <= j && total_exec > 0 {
            let buy_total = rows[i].buy_total;
            let sell_total = rows[j].sell_total;
            match buy_total.cmp(&sell_total) {
                Ordering::Greater => {
                    if total_exec < buy_total {
                        reserve_qty(total_exec, &mut rows[i].buy_orders, self.lot_size)?;
                    }
                    fill_orders(rows, i, j, price, &mut self.trades);
                    total_exec -= sell_total;
                    let Some(next) = j.checked_sub(1) else { break };
                    j = next;
                }
                Ordering::Less => {
                    if total_exec < sell_total {
                        reserve_qty(total_exec, &mut rows[j].sell_orders, self.lot_size)?;
                    }
                    fill_orders(rows, i, j, price, &mut self.trades);
                    total_exec -= buy_total;
                    i += 1;
                }
                Ordering::Equal => {
                    fill_orders(rows, i, j, price, &mut self.trades);
                    total_exec -= buy_total;
                    i += 1;
                    let Some(next) = j.checked_sub(1) else { break };
                    j = next;
                }
            }
        }
        Ok(price)
    }

    /// Copy the round's cumulative quantities from the snapshot into the
    /// book.
    fn write_back_fills(&mut self) {
        for row in self.overlapped.rows() {
            for (side, orders) in [(Side::Buy, &row.buy_orders), (Side::Sell, &row.sell_orders)] {
                if orders.is_empty() {
                    continue;
                }
                if let Some(level) = self.book.price_level_mut(side, row.price) {
                    level.apply_fills(orders);
                }
            }
        }
    }

    /// Remove every order the last round filled completely. Levels left
    /// empty go with them. Returns the number of orders removed; a second
    /// call without another round returns 0.
    pub fn drop_filled_orders(&mut self) -> usize {
        let mut dropped = 0;
        for row in self.overlapped.rows() {
            for (side, orders) in [(Side::Buy, &row.buy_orders), (Side::Sell, &row.sell_orders)] {
                for order in orders.iter().filter(|o| o.is_filled()) {
                    match self.book.remove_order(side, &order.id, row.price) {
                        Ok(_) => dropped += 1,
                        Err(err) => {
                            tracing::debug!(order = %order.id, %side, price = row.price, error = %err, "Filled order already gone");
                        }
                    }
                }
            }
        }
        self.overlapped.clear();
        dropped
    }

    /// Trades of the last round, in execution order.
    #[must_use]
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Root hash of the last round's trades.
    #[must_use]
    pub fn trade_root(&self) -> [u8; 32] {
        compute_trade_root(&self.trades)
    }

    #[must_use]
    pub fn last_trade_price(&self) -> Price {
        self.last_trade_price
    }

    #[must_use]
    pub fn lot_size(&self) -> Qty {
        self.lot_size
    }

    /// Change the lot size for later rounds.
    pub fn set_lot_size(&mut self, lot_size: Qty) -> Result<()> {
        if lot_size <= 0 {
            return Err(BlockmatchError::Configuration(format!(
                "lot size must be positive, got {lot_size}"
            )));
        }
        self.lot_size = lot_size;
        Ok(())
    }

    #[must_use]
    pub fn book(&self) -> &dyn OrderBook {
        self.book.as_ref()
    }

    pub fn book_mut(&mut self) -> &mut dyn OrderBook {
        self.book.as_mut()
    }

    /// Overlapped rows of the last round, highest price first.
    #[must_use]
    pub fn overlapped(&self) -> &[OverlappedLevel] {
        self.overlapped.rows()
    }
}

/// Fill the buys of row `i` against the sells of row `j` at `price`.
///
/// Both sides are taken in id order. Each step trades the smaller of the two
/// head quantities, so afterwards at least one side has nothing left for
/// this round. Row totals are recomputed from what is left.
pub fn fill_orders(rows: &mut [OverlappedLevel], i: usize, j: usize, price: Price, trades: &mut Vec<Trade>) {
    let mut buys = std::mem::take(&mut rows[i].buy_orders);
    let mut sells = std::mem::take(&mut rows[j].sell_orders);
    sort_by_id(&mut buys);
    sort_by_id(&mut sells);

    let (mut k, mut h) = (0, 0);
    while k < buys.len() && h < sells.len() {
        let (buy, sell) = (&mut buys[k], &mut sells[h]);
        if buy.next_trade <= 0 {
            k += 1;
            continue;
        }
        if sell.next_trade <= 0 {
            h += 1;
            continue;
        }
        let qty = buy.next_trade.min(sell.next_trade);
        buy.next_trade -= qty;
        sell.next_trade -= qty;
        buy.cum_qty += qty;
        sell.cum_qty += qty;
        trades.push(Trade {
            sell_id: sell.id.clone(),
            price,
            qty,
            buy_id: buy.id.clone(),
            buyer_cum_qty: buy.cum_qty,
            seller_cum_qty: sell.cum_qty,
        });
        if buy.next_trade == 0 {
            k += 1;
        }
        if sell.next_trade == 0 {
            h += 1;
        }
    }

    rows[i].buy_total = sum_orders_total_left(&mut buys, false);
    rows[j].sell_total = sum_orders_total_left(&mut sells, false);
    rows[i].buy_orders = buys;
    rows[j].sell_orders = sells;
}

#[cfg(test)]
mod tests {
    use blockmatch_types::OrderPart;
    use rust_decimal::Decimal;

    use super::*;

    fn engine(listing_price: Price, lot_size: Qty) -> MatchEngine {
        MatchEngine::new(Box::new(BucketedBook::new(4, 2)), listing_price, lot_size)
    }

    fn insert(me: &mut MatchEngine, side: Side, id: &str, time: i64, price: Price, qty: Qty) {
        me.book_mut().insert_order(side, id.into(), time, price, qty).unwrap();
    }

    /// `(sell, buy, qty, buyer_cum, seller_cum)` per trade.
    fn fills(me: &MatchEngine) -> Vec<(&str, &str, Qty, Qty, Qty)> {
        me.trades()
            .iter()
            .map(|t| (t.sell_id.as_str(), t.buy_id.as_str(), t.qty, t.buyer_cum_qty, t.seller_cum_qty))
            .collect()
    }

    fn crossing_book() -> MatchEngine {
        let mut me = engine(100, 1);
        insert(&mut me, Side::Sell, "3", 100, 98, 100);
        insert(&mut me, Side::Sell, "5", 101, 98, 100);
        insert(&mut me, Side::Buy, "1", 102, 100, 50);
        insert(&mut me, Side::Buy, "8", 103, 98, 150);
        insert(&mut me, Side::Buy, "2", 103, 100, 80);
        insert(&mut me, Side::Buy, "4", 104, 100, 20);
        insert(&mut me, Side::Buy, "6", 105, 100, 50);
        insert(&mut me, Side::Sell, "9", 106, 98, 50);
        insert(&mut me, Side::Buy, "91", 107, 100, 50);
        insert(&mut me, Side::Sell, "92", 108, 97, 50);
        me
    }

    #[test]
    fn round_fills_at_uniform_price() {
        let mut me = crossing_book();
        me.match_round().unwrap();
        assert_eq!(me.overlapped().len(), 3);
        assert_eq!(me.last_trade_price(), 98);
        assert!(me.trades().iter().all(|t| t.price == 98));
        assert_eq!(
            fills(&me),
            vec![
                ("92", "1", 50, 50, 50),
                ("3", "2", 80, 80, 80),
                ("3", "4", 20, 20, 100),
                ("5", "6", 50, 50, 50),
                ("5", "91", 50, 50, 100),
                ("9", "8", 50, 50, 50),
            ]
        );
    }

    #[test]
    fn fills_reach_the_book() {
        let mut me = crossing_book();
        me.match_round().unwrap();
        let book = me.book();
        assert_eq!(book.get_order(Side::Buy, &"8".into(), 98).unwrap().cum_qty, 50);
        assert_eq!(book.get_order(Side::Sell, &"3".into(), 98).unwrap().cum_qty, 100);
        assert_eq!(book.get_order(Side::Buy, &"1".into(), 100).unwrap().cum_qty, 50);
    }

    #[test]
    fn uncrossed_book_has_no_trades() {
        let mut me = engine(100, 1);
        insert(&mut me, Side::Sell, "3", 100, 101, 100);
        insert(&mut me, Side::Sell, "92", 108, 102, 50);
        insert(&mut me, Side::Buy, "1", 102, 100, 50);
        insert(&mut me, Side::Buy, "8", 103, 98, 150);
        me.match_round().unwrap();
        assert!(me.overlapped().is_empty());
        assert!(me.trades().is_empty());
        assert_eq!(me.last_trade_price(), 100);
    }

    #[test]
    fn equal_totals_advance_both_cursors() {
        let mut me = engine(100, 1);
        insert(&mut me, Side::Sell, "3", 100, 98, 100);
        insert(&mut me, Side::Sell, "5", 101, 99, 100);
        insert(&mut me, Side::Buy, "1", 102, 100, 100);
        insert(&mut me, Side::Buy, "8", 103, 99, 100);
        me.match_round().unwrap();
        assert_eq!(me.overlapped().len(), 3);
        assert_eq!(me.last_trade_price(), 99);
        assert_eq!(fills(&me), vec![("3", "1", 100, 100, 100), ("5", "8", 100, 100, 100)]);
    }

    #[test]
    fn sell_heavy_round_leaves_sells() {
        let mut me = engine(100, 1);
        insert(&mut me, Side::Sell, "3", 100, 98, 100);
        insert(&mut me, Side::Sell, "5", 101, 98, 100);
        insert(&mut me, Side::Buy, "1", 102, 100, 50);
        insert(&mut me, Side::Sell, "8", 103, 98, 150);
        insert(&mut me, Side::Buy, "2", 103, 100, 80);
        insert(&mut me, Side::Buy, "4", 104, 100, 20);
        insert(&mut me, Side::Buy, "6", 105, 100, 50);
        insert(&mut me, Side::Sell, "9", 106, 98, 50);
        insert(&mut me, Side::Buy, "91", 107, 100, 50);
        insert(&mut me, Side::Sell, "92", 108, 97, 50);
        me.match_round().unwrap();
        assert_eq!(me.overlapped().len(), 3);
        assert_eq!(me.last_trade_price(), 98);
        assert_eq!(
            fills(&me),
            vec![
                ("92", "1", 50, 50, 50),
                ("3", "2", 80, 80, 80),
                ("3", "4", 20, 20, 100),
                ("5", "6", 50, 50, 50),
                ("5", "91", 50, 50, 100),
            ]
        );
    }

    fn deep_book() -> MatchEngine {
        let mut me = engine(100, 1);
        insert(&mut me, Side::Sell, "3", 100, 96, 300);
        insert(&mut me, Side::Sell, "5", 101, 98, 100);
        insert(&mut me, Side::Buy, "1", 102, 100, 150);
        insert(&mut me, Side::Sell, "8", 103, 99, 200);
        insert(&mut me, Side::Buy, "31", 103, 100, 50);
        insert(&mut me, Side::Buy, "2", 103, 102, 250);
        insert(&mut me, Side::Buy, "4", 104, 101, 250);
        insert(&mut me, Side::Buy, "6", 105, 100, 350);
        insert(&mut me, Side::Sell, "9", 105, 100, 200);
        insert(&mut me, Side::Buy, "91", 105, 100, 300);
        insert(&mut me, Side::Sell, "92", 105, 100, 100);
        insert(&mut me, Side::Buy, "93", 105, 100, 300);
        me
    }

    #[test]
    fn partial_row_is_reserved_by_arrival() {
        let mut me = deep_book();
        me.match_round().unwrap();
        assert_eq!(me.overlapped().len(), 6);
        assert_eq!(me.last_trade_price(), 100);
        let executed: Qty = me.trades().iter().map(|t| t.qty).sum();
        assert_eq!(executed, 900);
        assert_eq!(
            fills(&me),
            vec![
                ("3", "2", 250, 250, 250),
                ("3", "4", 50, 50, 300),
                ("5", "4", 100, 150, 100),
                ("8", "4", 100, 250, 100),
                ("8", "1", 100, 100, 200),
                ("9", "1", 50, 150, 50),
                ("9", "31", 50, 50, 100),
                ("9", "6", 74, 74, 174),
                ("9", "91", 26, 26, 200),
                ("92", "91", 37, 63, 37),
                ("92", "93", 63, 63, 100),
            ]
        );
    }

    #[test]
    fn drop_filled_orders_is_idempotent() {
        let mut me = deep_book();
        me.match_round().unwrap();
        assert_eq!(me.drop_filled_orders(), 9);
        assert_eq!(me.drop_filled_orders(), 0);

        let (buys, sells) = me.book().all_levels();
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].price, 100);
        let left: Vec<(&str, i64, Qty)> = buys[0].orders.iter().map(|o| (o.id.as_str(), o.time, o.cum_qty)).collect();
        assert_eq!(left, vec![("6", 105, 74), ("91", 105, 63), ("93", 105, 63)]);
        assert!(sells.is_empty());
    }

    #[test]
    fn zero_execution_round_adopts_discovered_price() {
        let mut me = engine(100, 1);
        insert(&mut me, Side::Buy, "1", 100, 101, 10);
        insert(&mut me, Side::Sell, "2", 100, 99, 10);
        // Filled in an earlier round but not dropped yet.
        for (side, id, price) in [(Side::Buy, "1", 101), (Side::Sell, "2", 99)] {
            let level = me.book_mut().price_level_mut(side, price).unwrap();
            level.orders.iter_mut().find(|o| o.id.as_str() == id).unwrap().cum_qty = 10;
        }
        me.match_round().unwrap();
        assert!(me.trades().is_empty());
        // 101 and 99 are equally far from 100, the higher one wins.
        assert_eq!(me.last_trade_price(), 101);
        assert_eq!(me.book().all_levels().0[0].orders[0].cum_qty, 10);
    }

    #[test]
    fn lot_size_change_with_open_quantity_off_the_grid() {
        let mut me = engine(100, 1);
        for (id, qty) in [("o016", 67), ("o018", 18), ("o019", 20)] {
            insert(&mut me, Side::Sell, id, 4, 99, qty);
        }
        insert(&mut me, Side::Buy, "b", 5, 99, 104);
        me.set_lot_size(5).unwrap();

        me.match_round().unwrap();
        assert_eq!(me.last_trade_price(), 99);
        assert_eq!(
            fills(&me),
            vec![
                ("o016", "b", 66, 66, 66),
                ("o018", "b", 18, 84, 18),
                ("o019", "b", 20, 104, 20),
            ]
        );
        assert_eq!(me.drop_filled_orders(), 3);
        let o016 = me.book().get_order(Side::Sell, &"o016".into(), 99).unwrap();
        assert_eq!(o016.leaves_qty(), 1);
    }

    #[test]
    fn lots_smaller_than_a_lot_still_fill() {
        let mut me = engine(100, 5);
        insert(&mut me, Side::Sell, "s", 100, 100, 5);
        for id in ["b1", "b2", "b3"] {
            insert(&mut me, Side::Buy, id, 100, 100, 3);
        }
        me.match_round().unwrap();
        let bought: Vec<(&str, Qty)> = me.trades().iter().map(|t| (t.buy_id.as_str(), t.qty)).collect();
        assert_eq!(bought, vec![("b1", 3), ("b2", 2)]);
    }

    #[test]
    fn failed_round_leaves_book_untouched() {
        // Only `new` accepts a lot size that cannot allocate.
        let mut me = engine(100, 0);
        insert(&mut me, Side::Sell, "s", 100, 100, 5);
        for id in ["b1", "b2", "b3"] {
            insert(&mut me, Side::Buy, id, 100, 100, 3);
        }
        let before = me.book().all_levels();

        let err = me.match_round().unwrap_err();
        assert!(matches!(err, BlockmatchError::AllocationFailed { .. }));
        assert!(err.is_fatal_for_round());
        assert!(me.trades().is_empty());
        assert!(me.overlapped().is_empty());
        assert_eq!(me.last_trade_price(), 100);
        assert_eq!(me.book().all_levels(), before);
        assert_eq!(me.drop_filled_orders(), 0);
    }

    #[test]
    fn fill_orders_conserves_quantity() {
        let buy_qty = [30, 45, 10];
        let sell_qty = [20, 20];
        let mut rows = vec![OverlappedLevel {
            price: 100,
            buy_orders: ["b3", "b1", "b2"]
                .iter()
                .zip(buy_qty)
                .map(|(id, q)| OrderPart::dummy(id, 100, q))
                .collect(),
            sell_orders: ["s2", "s1"]
                .iter()
                .zip(sell_qty)
                .map(|(id, q)| OrderPart::dummy(id, 100, q))
                .collect(),
            ..OverlappedLevel::default()
        }];
        let mut trades = Vec::new();
        fill_orders(&mut rows, 0, 0, 100, &mut trades);

        let executed: Qty = trades.iter().map(|t| t.qty).sum();
        assert_eq!(executed, 40);
        assert_eq!(rows[0].sell_total, 0);
        assert_eq!(rows[0].buy_total, 85 - 40);
        assert_eq!(trades[0].buy_id.as_str(), "b1");
        assert_eq!(trades[0].sell_id.as_str(), "s1");
        assert!(rows[0].buy_orders.iter().all(|o| o.cum_qty + o.next_trade == o.qty));
    }

    #[test]
    fn from_config_selects_backing() {
        let mut cfg = MarketConfig::new("XYZ", "BNB", Decimal::new(102_000, 0), Decimal::new(1, 0));
        cfg.book.backing = BookBacking::Tree;
        let me = MatchEngine::from_config(&cfg).unwrap();
        assert_eq!(me.last_trade_price(), 102_000 * constants::FIXED8_ONE);
        assert_eq!(me.lot_size(), constants::FIXED8_ONE);
        assert!(format!("{:?}", me.book()).starts_with("TreeBook"));

        cfg.lot_size = Decimal::ZERO;
        assert!(MatchEngine::from_config(&cfg).is_err());
    }

    #[test]
    fn lot_size_must_stay_positive() {
        let mut me = engine(100, 1);
        me.set_lot_size(5).unwrap();
        assert_eq!(me.lot_size(), 5);
        assert!(me.set_lot_size(0).is_err());
        assert_eq!(me.lot_size(), 5);
    }

    #[test]
    fn trade_root_tracks_last_round() {
        let mut me = crossing_book();
        let empty = me.trade_root();
        me.match_round().unwrap();
        assert_ne!(me.trade_root(), empty);
        assert_eq!(me.trade_root(), compute_trade_root(me.trades()));
    }

    #[test]
    fn engine_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<MatchEngine>();
    }
}
