//! Determinism verification utilities for cross-node consistency.
//!
//! Every node matching the same block must produce the exact same trade
//! list. The `trade_root` is a hash over all trades of a round that lets
//! nodes compare results without exchanging full payloads.

use blockmatch_types::{BlockmatchError, Result, Trade};
use sha2::{Digest, Sha256};

const TRADE_ROOT_DOMAIN: &[u8] = b"blockmatch:trade_root:v1:";

/// Compute the trade root hash over a round's trades.
///
/// Covers, for every trade in order: both order ids, price, quantity and
/// both cumulative quantities. Ids are length-prefixed so that adjacent ids
/// cannot be re-split into a colliding pair.
#[must_use]
pub fn compute_trade_root(trades: &[Trade]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(TRADE_ROOT_DOMAIN);
    hasher.update((trades.len() as u64).to_le_bytes());

    for trade in trades {
        hash_id(&mut hasher, trade.sell_id.as_bytes());
        hash_id(&mut hasher, trade.buy_id.as_bytes());
        hasher.update(trade.price.to_le_bytes());
        hasher.update(trade.qty.to_le_bytes());
        hasher.update(trade.buyer_cum_qty.to_le_bytes());
        hasher.update(trade.seller_cum_qty.to_le_bytes());
    }

    let result = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&result);
    root
}

fn hash_id(hasher: &mut Sha256, id: &[u8]) {
    hasher.update((id.len() as u64).to_le_bytes());
    hasher.update(id);
}

/// Verify that a given trade root matches the expected hash.
#[must_use]
pub fn verify_trade_root(trades: &[Trade], expected_root: &[u8; 32]) -> bool {
    compute_trade_root(trades) == *expected_root
}

/// Like [`verify_trade_root`], but reports a mismatch as
/// `DeterminismViolation` carrying both roots in hex.
pub fn check_trade_root(trades: &[Trade], expected_root: &[u8; 32]) -> Result<()> {
    let actual = compute_trade_root(trades);
    if actual == *expected_root {
        return Ok(());
    }
    let err = BlockmatchError::DeterminismViolation {
        expected: hex::encode(expected_root),
        actual: hex::encode(actual),
    };
    tracing::warn!(trades = trades.len(), error = %err, "Trade root mismatch");
    Err(err)
}

#[cfg(test)]
mod tests {
    use blockmatch_types::OrderId;

    use super::*;

    fn make_trade(buy: &str, sell: &str, qty: i64) -> Trade {
        Trade {
            sell_id: OrderId::from(sell),
            price: 98,
            qty,
            buy_id: OrderId::from(buy),
            buyer_cum_qty: qty,
            seller_cum_qty: qty,
        }
    }

    #[test]
    fn empty_trades_deterministic() {
        assert_eq!(compute_trade_root(&[]), compute_trade_root(&[]));
    }

    #[test]
    fn same_trades_same_root() {
        let trades = vec![make_trade("1", "92", 50), make_trade("2", "3", 80)];
        assert_eq!(compute_trade_root(&trades), compute_trade_root(&trades.clone()));
    }

    #[test]
    fn different_trades_different_root() {
        let root_a = compute_trade_root(&[make_trade("1", "92", 50)]);
        let root_b = compute_trade_root(&[make_trade("1", "92", 51)]);
        assert_ne!(root_a, root_b);
    }

    #[test]
    fn order_matters() {
        let t1 = make_trade("1", "92", 50);
        let t2 = make_trade("2", "3", 80);
        let root_ab = compute_trade_root(&[t1.clone(), t2.clone()]);
        let root_ba = compute_trade_root(&[t2, t1]);
        assert_ne!(root_ab, root_ba, "Order of trades must affect root hash");
    }

    #[test]
    fn id_boundaries_are_hashed() {
        let root_a = compute_trade_root(&[make_trade("12", "3", 10)]);
        let root_b = compute_trade_root(&[make_trade("1", "23", 10)]);
        assert_ne!(root_a, root_b);
    }

    #[test]
    fn cumulative_quantities_are_hashed() {
        let t1 = make_trade("1", "92", 50);
        let mut t2 = t1.clone();
        t2.seller_cum_qty = 100;
        assert_ne!(compute_trade_root(&[t1]), compute_trade_root(&[t2]));
    }

    #[test]
    fn verify_correct_root() {
        let trades = vec![make_trade("1", "92", 50), make_trade("2", "3", 80)];
        let root = compute_trade_root(&trades);
        assert!(verify_trade_root(&trades, &root));
        check_trade_root(&trades, &root).unwrap();
    }

    #[test]
    fn verify_wrong_root() {
        let trades = vec![make_trade("1", "92", 50)];
        let wrong_root = [0xAB; 32];
        assert!(!verify_trade_root(&trades, &wrong_root));
        match check_trade_root(&trades, &wrong_root).unwrap_err() {
            BlockmatchError::DeterminismViolation { expected, actual } => {
                assert_eq!(expected, "ab".repeat(32));
                assert_eq!(actual, hex::encode(compute_trade_root(&trades)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
