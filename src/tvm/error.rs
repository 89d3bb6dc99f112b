use thiserror::Error;

/// Errors produced while building, reading or encoding cells
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TvmError {
    #[error("value does not fit into {bits} bits")]
    ValueOutOfRange { bits: usize },
    #[error("cell capacity exceeded: {bits} bits, {refs} refs")]
    CapacityExceeded { bits: usize, refs: usize },
    #[error("invalid address format: {0}")]
    InvalidAddressFormat(String),
    #[error("cell underflow")]
    CellUnderflow,
    #[error("invalid bag of cells: {0}")]
    InvalidBoc(String),
    #[error("invalid tag: expected {expected:#010x}, got {actual:#010x}")]
    InvalidTag { expected: u32, actual: u32 },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

pub type TvmResult<T> = Result<T, TvmError>;
