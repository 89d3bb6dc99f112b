//! TVM (TON Virtual Machine) data structures and utilities
//!
//! This module provides the cell layer used to build contract messages:
//! - Cell: immutable node storing up to 1023 bits and up to 4 references
//! - CellBuilder / Builder: append fields in order, then finalize into a Cell
//! - Slice: a reader for sequentially accessing cell data
//! - BoC: Bag of Cells serialization format for encoding cells into byte arrays
//! - Address: internal TON addresses in raw and user-friendly forms

pub mod address;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod error;
pub mod slice;
#[cfg(test)]
pub mod tests;

pub use address::{Address, AddressFlags};
pub use boc::{
    base64_to_boc, boc_to_base64, boc_to_base64_url, boc_to_hex, deserialize_boc, hex_to_boc,
    serialize_boc,
};
pub use builder::Builder;
pub use cell::{Cell, CellBuilder, MAX_CELL_BITS, MAX_CELL_REFS};
pub use error::{TvmError, TvmResult};
pub use slice::Slice;
