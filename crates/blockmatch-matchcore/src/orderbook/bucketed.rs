//! Bucketed (unrolled) chain order book.
//!
//! Each side is a [`BucketChain`]: a singly linked chain of small sorted
//! buckets of price levels, best price first. Only a handful of levels near
//! the top of the book are touched by every round, so lookups walk bucket
//! heads from the front and inserts and deletes shift within one bucket.
//!
//! Buckets live in an arena (`Vec<Bucket>`) and link through indices. Spare
//! buckets sit on a free stack; the arena doubles when the stack runs dry.

use std::cmp::Ordering;

use blockmatch_types::{BlockmatchError, Price, Result, Side, constants};

use super::OrderBook;
use crate::price_level::PriceLevel;

#[derive(Debug, Clone)]
struct Bucket {
    next: Option<usize>,
    /// Sorted by side priority, best first.
    levels: Vec<PriceLevel>,
}

impl Bucket {
    fn with_capacity(size: usize) -> Self {
        Self {
            next: None,
            levels: Vec::with_capacity(size),
        }
    }

    fn head(&self) -> Option<&PriceLevel> {
        self.levels.first()
    }

    /// `Ok(pos)` if `price` is present, `Err(pos)` with its insertion point
    /// otherwise.
    fn search(&self, side: Side, price: Price) -> std::result::Result<usize, usize> {
        let pos = self
            .levels
            .partition_point(|l| side.compare(l.price, price) == Ordering::Greater);
        match self.levels.get(pos) {
            Some(l) if l.price == price => Ok(pos),
            _ => Err(pos),
        }
    }
}

/// One side of a bucketed book.
#[derive(Debug)]
pub struct BucketChain {
    side: Side,
    buckets: Vec<Bucket>,
    /// First bucket of the chain; never on the free stack.
    head: usize,
    free: Vec<usize>,
    bucket_size: usize,
    capacity: usize,
    len: usize,
}

impl BucketChain {
    /// A chain sized for `capacity` levels in buckets of `bucket_size`.
    #[must_use]
    pub fn new(side: Side, capacity: usize, bucket_size: usize) -> Self {
        let bucket_size = bucket_size.max(constants::MIN_BUCKET_SIZE);
        let capacity = capacity.max(bucket_size);
        let count = capacity / bucket_size + 1;
        Self {
            side,
            buckets: (0..count).map(|_| Bucket::with_capacity(bucket_size)).collect(),
            head: 0,
            free: (1..count).rev().collect(),
            bucket_size,
            capacity,
            len: 0,
        }
    }

    /// Number of price levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Buckets currently linked into the chain.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.chain().count()
    }

    /// Buckets allocated in the arena, linked or spare.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn best(&self) -> Option<&PriceLevel> {
        self.buckets[self.head].head()
    }

    fn chain(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(self.head), move |&b| self.buckets[b].next)
    }

    /// All levels in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.chain().flat_map(move |b| self.buckets[b].levels.iter())
    }

    /// The bucket that should hold `price` and its predecessor: the last
    /// bucket whose head is not worse than `price`. `None` when `price` is
    /// better than every head.
    fn locate_bucket(&self, price: Price) -> (Option<usize>, Option<usize>) {
        let mut prev = None;
        let mut last = None;
        for b in self.chain() {
            if let Some(head) = self.buckets[b].head() {
                if self.side.compare(head.price, price) == Ordering::Less {
                    break;
                }
            }
            prev = last;
            last = Some(b);
        }
        (prev, last)
    }

    /// `(bucket, index)` of the level at `price`.
    ///
    /// Walks bucket heads from the best price, peeking at the next head to
    /// decide whether the price can only be in the current bucket.
    fn position(&self, price: Price) -> Option<(usize, usize)> {
        let mut cur = Some(self.head);
        while let Some(b) = cur {
            let bucket = &self.buckets[b];
            let head = bucket.head()?;
            match self.side.compare(head.price, price) {
                Ordering::Equal => return Some((b, 0)),
                Ordering::Less => return None,
                Ordering::Greater => {
                    let Some(next) = bucket.next else {
                        return bucket.search(self.side, price).ok().map(|i| (b, i));
                    };
                    let next_head = self.buckets[next].head()?;
                    match self.side.compare(next_head.price, price) {
                        Ordering::Equal => return Some((next, 0)),
                        Ordering::Less => {
                            return bucket.search(self.side, price).ok().map(|i| (b, i));
                        }
                        Ordering::Greater => cur = Some(next),
                    }
                }
            }
        }
        None
    }

    #[must_use]
    pub fn get(&self, price: Price) -> Option<&PriceLevel> {
        let (b, i) = self.position(price)?;
        self.buckets[b].levels.get(i)
    }

    pub fn get_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        let (b, i) = self.position(price)?;
        self.buckets[b].levels.get_mut(i)
    }

    /// Insert a new level. Fails with `PriceLevelExists` on a duplicate
    /// price.
    pub fn insert(&mut self, level: PriceLevel) -> Result<()> {
        let price = level.price;
        match self.locate_bucket(price).1 {
            None => {
                // Better than every head: goes to the very front.
                if self.buckets[self.head].levels.len() >= self.bucket_size {
                    let spare = self.take_spare();
                    self.buckets[spare].next = Some(self.head);
                    self.head = spare;
                    tracing::trace!(side = %self.side, price, bucket = spare, "New head bucket");
                }
                self.buckets[self.head].levels.insert(0, level);
            }
            Some(b) => {
                let Err(pos) = self.buckets[b].search(self.side, price) else {
                    return Err(BlockmatchError::PriceLevelExists {
                        side: self.side,
                        price,
                    });
                };
                if self.buckets[b].levels.len() >= self.bucket_size {
                    self.split_insert(b, pos, level);
                } else {
                    self.buckets[b].levels.insert(pos, level);
                }
            }
        }
        self.len += 1;
        Ok(())
    }

    /// Move the upper half of the full bucket `b` into a spare bucket linked
    /// right after it, then insert `level` at `pos` on whichever half it
    /// belongs to.
    fn split_insert(&mut self, b: usize, pos: usize, level: PriceLevel) {
        let spare = self.take_spare();
        let mid = self.buckets[b].levels.len() / 2;

        let mut upper = std::mem::take(&mut self.buckets[spare].levels);
        upper.clear();
        upper.extend(self.buckets[b].levels.drain(mid..));
        if pos <= mid {
            self.buckets[b].levels.insert(pos, level);
        } else {
            upper.insert(pos - mid, level);
        }
        self.buckets[spare].levels = upper;
        self.buckets[spare].next = self.buckets[b].next;
        self.buckets[b].next = Some(spare);
        tracing::trace!(side = %self.side, from = b, to = spare, at = mid, "Bucket split");
    }

    /// Remove the level at `price`, unlinking its bucket if it empties.
    pub fn remove(&mut self, price: Price) -> Option<PriceLevel> {
        let (prev, Some(b)) = self.locate_bucket(price) else {
            return None;
        };
        let pos = self.buckets[b].search(self.side, price).ok()?;
        let level = self.buckets[b].levels.remove(pos);
        self.len -= 1;
        if self.buckets[b].levels.is_empty() {
            self.unlink(prev, b);
        }
        Some(level)
    }

    fn unlink(&mut self, prev: Option<usize>, b: usize) {
        let next = self.buckets[b].next;
        match (prev, next) {
            // The head stays when it is the only bucket.
            (None, None) => return,
            (None, Some(n)) => self.head = n,
            (Some(p), _) => self.buckets[p].next = next,
        }
        self.buckets[b].next = None;
        self.free.push(b);
        tracing::trace!(side = %self.side, bucket = b, "Bucket unlinked");
    }

    fn take_spare(&mut self) -> usize {
        match self.free.pop() {
            Some(b) => b,
            None => self.grow(),
        }
    }

    /// Double the capacity. Returns one of the new buckets; the rest go on
    /// the free stack.
    fn grow(&mut self) -> usize {
        let old = self.buckets.len();
        self.capacity = self.capacity.saturating_mul(2);
        let count = (self.capacity / self.bucket_size + 1).max(old + 1);
        let size = self.bucket_size;
        self.buckets.resize_with(count, || Bucket::with_capacity(size));
        self.free.extend((old + 1..count).rev());
        tracing::trace!(side = %self.side, buckets = count, capacity = self.capacity, "Bucket pool grown");
        old
    }

    /// Visit levels within `[from, to]` (`from` is the better bound),
    /// stopping at the first level worse than `to`.
    pub fn visit_range(&self, from: Price, to: Price, mut f: impl FnMut(&PriceLevel)) {
        if self.side.compare(from, to) == Ordering::Less {
            return;
        }
        for level in self.iter() {
            if self.side.compare(level.price, to) == Ordering::Less {
                break;
            }
            if self.side.compare(from, level.price) != Ordering::Less {
                f(level);
            }
        }
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut PriceLevel)) {
        let mut cur = Some(self.head);
        while let Some(b) = cur {
            self.buckets[b].levels.iter_mut().for_each(&mut f);
            cur = self.buckets[b].next;
        }
    }

    /// Empty the chain, keeping only the head bucket linked.
    pub fn clear(&mut self) {
        let mut cur = self.buckets[self.head].next.take();
        self.buckets[self.head].levels.clear();
        while let Some(b) = cur {
            cur = self.buckets[b].next.take();
            self.buckets[b].levels.clear();
            self.free.push(b);
        }
        self.len = 0;
    }

    /// Panics if the chain breaks any of its structural rules.
    #[cfg(test)]
    fn check_invariants(&self) {
        let chain: Vec<usize> = self.chain().collect();
        let mut seen = vec![false; self.buckets.len()];
        for &b in chain.iter().chain(self.free.iter()) {
            assert!(!seen[b], "bucket {b} linked twice");
            seen[b] = true;
        }
        assert!(seen.iter().all(|s| *s), "bucket leaked from chain and free stack");
        for &b in &chain {
            let levels = &self.buckets[b].levels;
            assert!(levels.len() <= self.bucket_size);
            if chain.len() > 1 {
                assert!(!levels.is_empty(), "empty bucket {b} left in chain");
            }
        }
        let prices: Vec<Price> = self.iter().map(|l| l.price).collect();
        assert_eq!(prices.len(), self.len);
        for w in prices.windows(2) {
            assert_eq!(self.side.compare(w[0], w[1]), Ordering::Greater, "{prices:?}");
        }
    }
}

/// Order book with a [`BucketChain`] per side.
#[derive(Debug)]
pub struct BucketedBook {
    buys: BucketChain,
    sells: BucketChain,
}

impl BucketedBook {
    #[must_use]
    pub fn new(capacity: usize, bucket_size: usize) -> Self {
        Self {
            buys: BucketChain::new(Side::Buy, capacity, bucket_size),
            sells: BucketChain::new(Side::Sell, capacity, bucket_size),
        }
    }

    #[must_use]
    pub fn chain(&self, side: Side) -> &BucketChain {
        match side {
            Side::Buy => &self.buys,
            Side::Sell => &self.sells,
        }
    }

    fn chain_mut(&mut self, side: Side) -> &mut BucketChain {
        match side {
            Side::Buy => &mut self.buys,
            Side::Sell => &mut self.sells,
        }
    }
}

impl Default for BucketedBook {
    fn default() -> Self {
        Self::new(constants::DEFAULT_BOOK_CAPACITY, constants::DEFAULT_BUCKET_SIZE)
    }
}

impl OrderBook for BucketedBook {
    fn insert_price_level(&mut self, side: Side, level: PriceLevel) -> Result<()> {
        if level.is_empty() {
            return Err(BlockmatchError::InvalidOrder {
                reason: format!("price level {} has no orders", level.price),
            });
        }
        self.chain_mut(side).insert(level)
    }

    fn remove_price_level(&mut self, side: Side, price: Price) -> bool {
        self.chain_mut(side).remove(price).is_some()
    }

    fn price_level(&self, side: Side, price: Price) -> Option<&PriceLevel> {
        self.chain(side).get(price)
    }

    fn price_level_mut(&mut self, side: Side, price: Price) -> Option<&mut PriceLevel> {
        self.chain_mut(side).get_mut(price)
    }

    fn best_price(&self, side: Side) -> Option<Price> {
        self.chain(side).best().map(|l| l.price)
    }

    fn level_count(&self, side: Side) -> usize {
        self.chain(side).len()
    }

    fn visit_range(&self, side: Side, from: Price, to: Price, f: &mut dyn FnMut(&PriceLevel)) {
        self.chain(side).visit_range(from, to, f);
    }

    fn visit_levels(&self, side: Side, max_levels: usize, f: &mut dyn FnMut(&PriceLevel, usize)) {
        self.chain(side)
            .iter()
            .take(max_levels)
            .enumerate()
            .for_each(|(i, l)| f(l, i));
    }

    fn for_each_level_mut(&mut self, side: Side, f: &mut dyn FnMut(&mut PriceLevel)) {
        self.chain_mut(side).for_each_mut(f);
    }

    fn clear(&mut self) {
        self.buys.clear();
        self.sells.clear();
    }
}
