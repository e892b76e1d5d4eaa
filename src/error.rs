use thiserror::Error;

use crate::types::{DemandId, StockId};

/// Problems found while turning columnar input into records. These are
/// warnings: the loader keeps going with whatever data is still usable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("{set}: column `{column}` has {found} values, expected {expected}")]
    ColumnLengthMismatch {
        set: String,
        column: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{set}: duplicate id {id}, keeping the first occurrence")]
    DuplicateId { set: String, id: u64 },

    #[error("{set}: record {id} has non-positive {field} ({value})")]
    NonPositiveDimension {
        set: String,
        id: u64,
        field: &'static str,
        value: f64,
    },
}

/// Fatal engine failures. Any of these means the selection logic is wrong,
/// not the data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("stock {stock_id} would end with negative leftover {leftover}")]
    NegativeLeftover { stock_id: StockId, leftover: f64 },

    #[error("demand {0} assigned twice")]
    DoubleAssignment(DemandId),

    #[error("unknown demand {0}")]
    UnknownDemand(DemandId),

    #[error("unknown stock {0}")]
    UnknownStock(StockId),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
