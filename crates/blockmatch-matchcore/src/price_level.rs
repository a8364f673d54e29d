//! A single price level in the order book.
//!
//! Orders at the same price are stored in arrival order (time priority)
//! in a plain [`Vec`]: levels are short, and the matcher needs slice access
//! to sort and walk them.

use blockmatch_types::{BlockmatchError, OrderId, OrderPart, Price, Qty, Result};

/// A single price level containing all orders at that price.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceLevel {
    /// The price at this level.
    pub price: Price,
    /// Orders in arrival order (front = oldest).
    pub orders: Vec<OrderPart>,
}

impl PriceLevel {
    /// Create a new empty price level.
    #[must_use]
    pub fn new(price: Price) -> Self {
        Self {
            price,
            orders: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_orders(price: Price, orders: Vec<OrderPart>) -> Self {
        Self { price, orders }
    }

    /// Append an order (lowest time priority). Returns the new queue length.
    ///
    /// Callers add orders in arrival sequence, so appending keeps the queue
    /// sorted by `time`.
    pub fn add_order(&mut self, id: OrderId, time: i64, qty: Qty) -> Result<usize> {
        if self.orders.iter().any(|o| o.id == id) {
            return Err(BlockmatchError::DuplicateOrder(id));
        }
        self.orders.push(OrderPart::new(id, time, qty));
        Ok(self.orders.len())
    }

    /// Remove a specific order by ID. Returns the order and the number of
    /// orders left at this level.
    pub fn remove_order(&mut self, order_id: &OrderId) -> Result<(OrderPart, usize)> {
        let pos = self
            .orders
            .iter()
            .position(|o| o.id == *order_id)
            .ok_or_else(|| BlockmatchError::OrderNotFound(order_id.clone()))?;
        let order = self.orders.remove(pos);
        Ok((order, self.orders.len()))
    }

    pub fn get_order(&self, order_id: &OrderId) -> Result<&OrderPart> {
        self.orders
            .iter()
            .find(|o| o.id == *order_id)
            .ok_or_else(|| BlockmatchError::OrderNotFound(order_id.clone()))
    }

    /// Remove every order that arrived strictly before `before_time`.
    ///
    /// Orders are kept in arrival order, so the expired ones form a prefix.
    /// Returns the number of orders removed.
    pub fn remove_orders_before(
        &mut self,
        before_time: i64,
        mut on_removed: impl FnMut(&OrderPart),
    ) -> usize {
        let cut = self.orders.partition_point(|o| o.time < before_time);
        for order in self.orders.drain(..cut) {
            on_removed(&order);
        }
        cut
    }

    /// Total remaining quantity across all orders at this level.
    #[must_use]
    pub fn total_leaves_qty(&self) -> Qty {
        self.orders.iter().map(OrderPart::leaves_qty).sum()
    }

    /// Copy the filled quantities of a matched snapshot back into this level.
    ///
    /// Orders are matched by id; snapshot entries with no counterpart here
    /// are ignored. Returns the number of orders updated.
    pub fn apply_fills(&mut self, snapshot: &[OrderPart]) -> usize {
        let mut updated = 0;
        for filled in snapshot {
            if let Some(order) = self.orders.iter_mut().find(|o| o.id == filled.id) {
                if order.cum_qty != filled.cum_qty {
                    order.cum_qty = filled.cum_qty;
                    updated += 1;
                }
            }
        }
        updated
    }

    /// Returns `true` if there are no orders at this level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of orders at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }
}

impl std::fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->[", self.price)?;
        for (i, o) in self.orders.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {} {}/{}", o.id, o.time, o.cum_qty, o.qty)?;
        }
        f.write_str("]")
    }
}

/// Sort orders by id, the deterministic fill sequence inside a level.
///
/// Ids are unique, so an unstable sort yields the same order on every node
/// and re-sorting an already sorted slice is a no-op.
pub fn sort_by_id(orders: &mut [OrderPart]) {
    orders.sort_unstable_by(|a, b| a.id.cmp(&b.id));
}
