//! Clearing price discovery.
//!
//! Rows of the overlapped range are ordered from the highest price (best
//! buy) down to the lowest. The clearing row is chosen by, in order:
//!
//! 1. maximum accumulated execution
//! 2. minimum absolute surplus
//! 3. market pressure: all buy surplus picks the highest price, all sell
//!    surplus the lowest
//! 4. distance to the reference (last trade) price, first row on ties
//!
//! Every node must compute the same answer, so all comparisons are exact
//! integer comparisons and ties always resolve toward the lowest row index.

use blockmatch_types::{BlockmatchError, OrderPart, Price, Qty, Result, constants};

use crate::overlap::OverlappedLevel;

/// Sum of the quantity the orders may still trade this round. With
/// `recompute`, each order's `next_trade` is first reset to its open
/// quantity.
pub fn sum_orders_total_left(orders: &mut [OrderPart], recompute: bool) -> Qty {
    orders.iter_mut().fold(0, |total: Qty, order| {
        if recompute {
            order.reset_next_trade();
        }
        total.saturating_add(order.next_trade)
    })
}

/// Fill in the per-row totals, accumulations, executions and surpluses.
/// Returns the number of rows.
pub fn prepare_match(rows: &mut [OverlappedLevel]) -> usize {
    let mut accumulated: Qty = 0;
    for row in rows.iter_mut().rev() {
        row.sell_total = sum_orders_total_left(&mut row.sell_orders, true);
        accumulated = accumulated.saturating_add(row.sell_total);
        row.accumulated_sell = accumulated;
    }
    accumulated = 0;
    for row in rows.iter_mut() {
        row.buy_total = sum_orders_total_left(&mut row.buy_orders, true);
        accumulated = accumulated.saturating_add(row.buy_total);
        row.accumulated_buy = accumulated;
        row.accumulated_executions = row.accumulated_buy.min(row.accumulated_sell);
        row.surplus = row.accumulated_buy - row.accumulated_sell;
    }
    rows.len()
}

/// Candidate rows sharing the best value found so far.
#[derive(Debug, Clone, Default)]
pub struct LevelIndex {
    pub value: Qty,
    pub index: Vec<usize>,
}

impl LevelIndex {
    fn with_capacity(n: usize) -> Self {
        Self {
            value: 0,
            index: Vec::with_capacity(n),
        }
    }

    fn clear(&mut self) {
        self.value = 0;
        self.index.clear();
    }
}

/// Least-surplus candidates with their signed surpluses.
#[derive(Debug, Clone, Default)]
pub struct SurplusIndex {
    pub value: Qty,
    pub index: Vec<usize>,
    pub surplus: Vec<Qty>,
}

impl SurplusIndex {
    fn with_capacity(n: usize) -> Self {
        Self {
            value: Qty::MAX,
            index: Vec::with_capacity(n),
            surplus: Vec::with_capacity(n),
        }
    }

    fn clear(&mut self) {
        self.value = Qty::MAX;
        self.index.clear();
        self.surplus.clear();
    }
}

/// Collect the rows with the maximum accumulated execution.
pub fn collect_max_executions(rows: &[OverlappedLevel], max_exec: &mut LevelIndex) {
    for (i, row) in rows.iter().enumerate() {
        if row.accumulated_executions > max_exec.value {
            max_exec.value = row.accumulated_executions;
            max_exec.index.clear();
            max_exec.index.push(i);
        } else if row.accumulated_executions == max_exec.value {
            max_exec.index.push(i);
        }
    }
}

/// Among the maximum-execution rows, collect those with the least absolute
/// surplus.
pub fn collect_least_surplus(
    rows: &[OverlappedLevel],
    max_exec: &LevelIndex,
    least: &mut SurplusIndex,
) {
    for &i in &max_exec.index {
        let surplus = rows[i].surplus;
        let abs = surplus.saturating_abs();
        if abs < least.value {
            least.value = abs;
            least.index.clear();
            least.surplus.clear();
            least.index.push(i);
            least.surplus.push(surplus);
        } else if abs == least.value {
            least.index.push(i);
            least.surplus.push(surplus);
        }
    }
}

/// The candidate whose price is closest to `reference`. Exact ties keep the
/// earlier candidate.
#[must_use]
pub fn closest_to_reference(
    rows: &[OverlappedLevel],
    candidates: &[usize],
    reference: Price,
) -> Option<(Price, usize)> {
    let mut best: Option<(u64, usize)> = None;
    for &i in candidates {
        let diff = rows[i].price.abs_diff(reference);
        if best.is_none_or(|(d, _)| diff < d) {
            best = Some((diff, i));
        }
    }
    best.map(|(_, i)| (rows[i].price, i))
}

/// Scratch state for clearing price discovery, reused across rounds.
#[derive(Debug, Clone)]
pub struct PriceDiscovery {
    max_exec: LevelIndex,
    least_surplus: SurplusIndex,
}

impl Default for PriceDiscovery {
    fn default() -> Self {
        Self {
            max_exec: LevelIndex::with_capacity(constants::DEFAULT_CANDIDATE_SLOTS),
            least_surplus: SurplusIndex::with_capacity(constants::DEFAULT_CANDIDATE_SLOTS),
        }
    }
}

impl PriceDiscovery {
    /// Pick the clearing `(price, row index)` for prepared rows.
    ///
    /// The result depends only on `rows` and `reference`.
    pub fn discover(&mut self, rows: &[OverlappedLevel], reference: Price) -> Result<(Price, usize)> {
        let no_price = || BlockmatchError::NoClearingPrice { rows: rows.len() };
        self.max_exec.clear();
        self.least_surplus.clear();

        collect_max_executions(rows, &mut self.max_exec);
        if let [i] = self.max_exec.index[..] {
            return Ok((rows[i].price, i));
        }

        collect_least_surplus(rows, &self.max_exec, &mut self.least_surplus);
        let candidates = &self.least_surplus.index;
        match candidates[..] {
            [] => return Err(no_price()),
            [i] => return Ok((rows[i].price, i)),
            _ => {}
        }

        let buy_pressure = self.least_surplus.surplus.iter().any(|s| *s > 0);
        let sell_pressure = self.least_surplus.surplus.iter().any(|s| *s < 0);
        let picked = match (buy_pressure, sell_pressure) {
            (true, false) => candidates.first().copied(),
            (false, true) => candidates.last().copied(),
            _ => return closest_to_reference(rows, candidates, reference).ok_or_else(no_price),
        };
        picked.map(|i| (rows[i].price, i)).ok_or_else(no_price)
    }

    /// Maximum accumulated execution found by the last [`discover`] call.
    ///
    /// [`discover`]: Self::discover
    #[must_use]
    pub fn max_execution(&self) -> Qty {
        self.max_exec.value
    }
}
