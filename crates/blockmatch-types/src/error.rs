//! Error types for the blockmatch matching core.
//!
//! All errors use the `BM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order book errors (structural, reported to the caller)
//! - 5xx: Matching errors (fatal for the round)
//! - 9xx: Serialization and configuration errors

use thiserror::Error;

use crate::{OrderId, Price, Qty, Side};

/// Central error enum for all blockmatch operations.
#[derive(Debug, Error)]
pub enum BlockmatchError {
    // =================================================================
    // Order Book Errors (1xx)
    // =================================================================
    /// The requested order was not found at the given level.
    #[error("BM_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order failed validation (non-positive quantity, etc.).
    #[error("BM_ERR_101: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// An order with this ID already rests at the level.
    #[error("BM_ERR_102: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// No price level exists at this price on this side.
    #[error("BM_ERR_103: Price level not found: {side} @ {price}")]
    PriceLevelNotFound { side: Side, price: Price },

    /// A price level already exists at this price on this side.
    #[error("BM_ERR_104: Price level already exists: {side} @ {price}")]
    PriceLevelExists { side: Side, price: Price },

    /// A decimal value cannot be represented in 8-decimal fixed point.
    #[error("BM_ERR_105: Invalid fixed-point value {value}: {reason}")]
    InvalidFixedPoint { value: String, reason: &'static str },

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// Cross-node determinism check failed.
    #[error("BM_ERR_501: Determinism violation: expected {expected}, got {actual}")]
    DeterminismViolation { expected: String, actual: String },

    /// Price discovery could not select a clearing price.
    #[error("BM_ERR_502: No clearing price among {rows} overlapped levels")]
    NoClearingPrice { rows: usize },

    /// The residual quantity could not be distributed in whole lots.
    #[error("BM_ERR_503: Allocation failed: {residual} left undistributed with lot size {lot_size}")]
    AllocationFailed { residual: Qty, lot_size: Qty },

    // =================================================================
    // General (9xx)
    // =================================================================
    /// Serialization / deserialization error.
    #[error("BM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, missing fields, etc.).
    #[error("BM_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl BlockmatchError {
    /// `true` for errors that invalidate the whole round for the pair.
    #[must_use]
    pub fn is_fatal_for_round(&self) -> bool {
        matches!(
            self,
            Self::NoClearingPrice { .. } | Self::AllocationFailed { .. } | Self::DeterminismViolation { .. }
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BlockmatchError>;

impl From<serde_json::Error> for BlockmatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = BlockmatchError::OrderNotFound(OrderId::from("b-1"));
        let msg = format!("{err}");
        assert!(msg.starts_with("BM_ERR_100"), "Got: {msg}");
        assert!(msg.contains("b-1"));
    }

    #[test]
    fn allocation_failed_display() {
        let err = BlockmatchError::AllocationFailed {
            residual: 7,
            lot_size: 5,
        };
        let msg = format!("{err}");
        assert!(msg.contains("BM_ERR_503"));
        assert!(msg.contains('7'));
        assert!(msg.contains('5'));
    }

    #[test]
    fn price_level_display_names_side() {
        let err = BlockmatchError::PriceLevelNotFound {
            side: Side::Sell,
            price: 98,
        };
        assert!(format!("{err}").contains("SELL @ 98"));
    }

    #[test]
    fn structural_errors_are_not_fatal() {
        assert!(!BlockmatchError::DuplicateOrder(OrderId::from("1")).is_fatal_for_round());
        assert!(!BlockmatchError::OrderNotFound(OrderId::from("1")).is_fatal_for_round());
        assert!(BlockmatchError::NoClearingPrice { rows: 3 }.is_fatal_for_round());
        assert!(
            BlockmatchError::AllocationFailed {
                residual: 1,
                lot_size: 5
            }
            .is_fatal_for_round()
        );
    }

    #[test]
    fn all_errors_have_bm_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(BlockmatchError::NoClearingPrice { rows: 0 }),
            Box::new(BlockmatchError::Configuration("lot".into())),
            Box::new(BlockmatchError::Serialization("eof".into())),
            Box::new(BlockmatchError::InvalidFixedPoint {
                value: "0.000000001".into(),
                reason: "more than 8 decimal places",
            }),
            Box::new(BlockmatchError::DeterminismViolation {
                expected: "a".into(),
                actual: "b".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("BM_ERR_"),
                "Error missing BM_ERR_ prefix: {msg}"
            );
        }
    }
}
