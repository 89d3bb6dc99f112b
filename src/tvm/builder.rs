//! Enhanced Builder for constructing cells with convenient methods
//!
//! `Builder` wraps the low-level [`CellBuilder`] with the TON-specific field
//! encodings used by message schemas: wide unsigned integers, addresses,
//! coins and snake-encoded byte strings. Fields are appended in call order,
//! and [`Builder::build`] consumes the builder, so a builder is finalized at
//! most once.
//!
//! # Examples
//!
//! ```rust
//! use nft_giver_miner::tvm::{Address, Builder};
//!
//! let mut builder = Builder::new();
//!
//! let addr = Address::new(0, [0u8; 32]);
//! builder.store_u32(0x4d696e65).unwrap();
//! builder.store_address(Some(&addr)).unwrap();
//! builder.store_coins(1_000_000_000).unwrap();
//!
//! let cell = builder.build().unwrap();
//! assert_eq!(cell.bit_len(), 32 + 267 + 4 + 32);
//! ```

use crate::tvm::address::Address;
use crate::tvm::cell::{Cell, CellBuilder, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::tvm::error::{TvmError, TvmResult};
use num_bigint::BigUint;
use std::sync::Arc;

/// Extended builder with convenience methods
#[derive(Debug, Default)]
pub struct Builder {
    inner: CellBuilder,
}

impl Builder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bits used
    pub fn bit_len(&self) -> usize {
        self.inner.bit_len()
    }

    /// Returns the number of available bits
    pub fn available_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len()
    }

    /// Returns the number of references
    pub fn ref_count(&self) -> usize {
        self.inner.ref_count()
    }

    /// Returns the number of available references
    pub fn available_refs(&self) -> usize {
        MAX_CELL_REFS - self.ref_count()
    }

    /// Stores a single bit
    pub fn store_bit(&mut self, bit: bool) -> TvmResult<&mut Self> {
        self.inner.store_bit(bit)?;
        Ok(self)
    }

    /// Stores multiple bits from a byte slice
    pub fn store_bits(&mut self, bits: &[u8], bit_len: usize) -> TvmResult<&mut Self> {
        self.inner.store_bits(bits, bit_len)?;
        Ok(self)
    }

    /// Stores a byte
    pub fn store_byte(&mut self, byte: u8) -> TvmResult<&mut Self> {
        self.inner.store_byte(byte)?;
        Ok(self)
    }

    /// Stores multiple bytes
    pub fn store_bytes(&mut self, bytes: &[u8]) -> TvmResult<&mut Self> {
        self.inner.store_bytes(bytes)?;
        Ok(self)
    }

    /// Stores a u32 value
    pub fn store_u32(&mut self, value: u32) -> TvmResult<&mut Self> {
        self.inner.store_u32(value)?;
        Ok(self)
    }

    /// Stores a u64 value
    pub fn store_u64(&mut self, value: u64) -> TvmResult<&mut Self> {
        self.inner.store_u64(value)?;
        Ok(self)
    }

    /// Stores an unsigned integer with specific bit length
    pub fn store_uint(&mut self, value: u64, bits: usize) -> TvmResult<&mut Self> {
        self.inner.store_uint(value, bits)?;
        Ok(self)
    }

    /// Stores an arbitrarily wide unsigned integer with specific bit length
    pub fn store_big_uint(&mut self, value: &BigUint, bits: usize) -> TvmResult<&mut Self> {
        let value_bits = value.bits() as usize;
        if value_bits > bits {
            return Err(TvmError::ValueOutOfRange { bits });
        }
        if bits > self.available_bits() {
            return Err(TvmError::CapacityExceeded {
                bits: self.bit_len() + bits,
                refs: self.ref_count(),
            });
        }

        if bits == 0 {
            return Ok(self);
        }

        // Left-align the value inside a big-endian buffer of whole bytes
        let len = bits.div_ceil(8);
        let shifted = (value << ((8 - bits % 8) % 8)).to_bytes_be();
        let mut buf = vec![0u8; len];
        buf[len - shifted.len()..].copy_from_slice(&shifted);

        self.inner.store_bits(&buf, bits)?;
        Ok(self)
    }

    /// Stores a signed integer with specific bit length (two's complement)
    pub fn store_int(&mut self, value: i64, bits: usize) -> TvmResult<&mut Self> {
        if bits == 0 || bits > 64 {
            return Err(TvmError::ValueOutOfRange { bits });
        }
        let min = if bits == 64 { i64::MIN } else { -(1i64 << (bits - 1)) };
        let max = if bits == 64 { i64::MAX } else { (1i64 << (bits - 1)) - 1 };
        if value < min || value > max {
            return Err(TvmError::ValueOutOfRange { bits });
        }

        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.store_uint(value as u64 & mask, bits)
    }

    /// Stores a boolean value as a single bit
    pub fn store_bool(&mut self, value: bool) -> TvmResult<&mut Self> {
        self.store_bit(value)
    }

    /// Stores a reference to another cell
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> TvmResult<&mut Self> {
        self.inner.store_reference(cell)?;
        Ok(self)
    }

    /// Stores an optional reference (Maybe ^Cell)
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> TvmResult<&mut Self> {
        match cell {
            Some(c) => {
                if self.available_refs() == 0 {
                    return Err(TvmError::CapacityExceeded {
                        bits: self.bit_len(),
                        refs: self.ref_count() + 1,
                    });
                }
                self.store_bit(true)?;
                self.store_ref(c)?;
            }
            None => {
                self.store_bit(false)?;
            }
        }
        Ok(self)
    }

    /// Stores coins (VarUInteger 16)
    pub fn store_coins(&mut self, amount: u128) -> TvmResult<&mut Self> {
        if amount == 0 {
            return self.store_uint(0, 4);
        }

        let byte_len = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if byte_len > 15 {
            return Err(TvmError::ValueOutOfRange { bits: 120 });
        }

        self.store_uint(byte_len as u64, 4)?;
        let bytes = amount.to_be_bytes();
        self.store_bytes(&bytes[16 - byte_len..])
    }

    /// Stores bytes using snake encoding (splits across chained cells if needed)
    pub fn store_snake_bytes(&mut self, bytes: &[u8]) -> TvmResult<&mut Self> {
        let available = self.available_bits() / 8;
        if bytes.len() <= available {
            return self.store_bytes(bytes);
        }

        self.store_bytes(&bytes[..available])?;

        let mut next_builder = Builder::new();
        next_builder.store_snake_bytes(&bytes[available..])?;
        self.store_ref(next_builder.build()?)?;

        Ok(self)
    }

    /// Stores a TON address (MsgAddress)
    pub fn store_address(&mut self, address: Option<&Address>) -> TvmResult<&mut Self> {
        match address {
            None => {
                // addr_none$00
                self.store_uint(0b00, 2)?;
            }
            Some(addr) => {
                // addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256
                self.store_uint(0b10, 2)?;
                self.store_bit(false)?;
                self.store_int(addr.workchain as i64, 8)?;
                self.store_bytes(&addr.hash_part)?;
            }
        }
        Ok(self)
    }

    /// Builds the cell
    pub fn build(self) -> TvmResult<Arc<Cell>> {
        self.inner.build()
    }
}
