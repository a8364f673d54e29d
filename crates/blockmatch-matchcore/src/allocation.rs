//! Reservation and lot-size pro-rata allocation.
//!
//! When the row that still has quantity left can only partly trade, its
//! orders are cut down to the executable residual before filling: earlier
//! arrivals first, and orders that arrived together share pro rata in whole
//! lots.

use blockmatch_types::{BlockmatchError, OrderPart, Qty, Result};

use crate::discovery::sum_orders_total_left;
use crate::price_level::sort_by_id;

/// `floor(total_lots * order_left / total_left)`, computed without overflow.
fn lots_for(total_lots: Qty, order_left: Qty, total_left: Qty) -> Qty {
    if total_left <= 0 {
        return 0;
    }
    let lots = i128::from(total_lots) * i128::from(order_left) / i128::from(total_left);
    Qty::try_from(lots).unwrap_or(Qty::MAX)
}

/// Distribute `to_alloc` over orders that arrived at the same time.
///
/// On return each order's `next_trade` holds its share and `to_alloc` holds
/// what is left for later arrivals. If the orders can absorb everything they
/// keep their full `next_trade`. Otherwise, sorted by id, each order gets its
/// pro-rata share rounded down to whole lots, and the remainder is handed
/// out one lot at a time (the last piece may be an odd fragment) from the
/// first order on. An order with less open quantity left than a lot takes
/// only what it still has room for.
pub fn allocate_residual(to_alloc: &mut Qty, orders: &mut [OrderPart], lot_size: Qty) -> Result<()> {
    if lot_size <= 0 {
        return Err(BlockmatchError::AllocationFailed {
            residual: *to_alloc,
            lot_size,
        });
    }
    if let [order] = orders {
        let qty = (*to_alloc).min(order.next_trade);
        order.next_trade = qty;
        *to_alloc -= qty;
        return Ok(());
    }

    let total = sum_orders_total_left(orders, false);
    if total <= *to_alloc {
        *to_alloc -= total;
        return Ok(());
    }

    sort_by_id(orders);
    let mut residual = *to_alloc;
    let n_lots = residual / lot_size;
    for order in orders.iter_mut() {
        let share = lots_for(n_lots, order.next_trade, total)
            .saturating_mul(lot_size)
            .min(residual);
        order.next_trade = share;
        residual -= share;
    }

    while residual > 0 {
        let before = residual;
        for order in orders.iter_mut() {
            if residual == 0 {
                break;
            }
            let piece = lot_size.min(residual).min(order.leaves_qty() - order.next_trade);
            if piece > 0 {
                order.next_trade += piece;
                residual -= piece;
            }
        }
        if residual == before {
            tracing::warn!(residual, lot_size, orders = orders.len(), "Residual cannot be placed in whole lots");
            *to_alloc = residual;
            return Err(BlockmatchError::AllocationFailed { residual, lot_size });
        }
    }
    *to_alloc = 0;
    Ok(())
}

/// Cut a row's orders down so that together they trade exactly `residual`.
///
/// Orders are taken in arrival order; each group of orders with the same
/// arrival time is served through [`allocate_residual`], and groups after
/// the residual runs out get nothing.
pub fn reserve_qty(residual: Qty, orders: &mut [OrderPart], lot_size: Qty) -> Result<()> {
    if let [order] = orders {
        order.next_trade = residual;
        return Ok(());
    }
    orders.sort_unstable_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));

    let mut to_alloc = residual;
    for window in orders.chunk_by_mut(|a, b| a.time == b.time) {
        if to_alloc == 0 {
            window.iter_mut().for_each(|o| o.next_trade = 0);
        } else {
            allocate_residual(&mut to_alloc, window, lot_size)?;
        }
    }
    Ok(())
}
