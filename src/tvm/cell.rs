//! Cell implementation for TON blockchain
//!
//! A cell is a fundamental data structure in TON that can store up to 1023 bits
//! of data and maintain up to 4 references to other cells. Cells are immutable:
//! the only way to obtain one is to finalize a [`CellBuilder`] (or the
//! higher-level [`Builder`](crate::tvm::Builder)), or to decode a bag of cells.

use crate::tvm::error::{TvmError, TvmResult};
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};

/// Maximum number of bits a cell can store
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have
pub const MAX_CELL_REFS: usize = 4;

/// Represents an ordinary cell in the TON blockchain
#[derive(Debug, Clone)]
pub struct Cell {
    /// Cell data as bytes, bits past `bit_len` are always zero
    data: Vec<u8>,
    /// Number of bits in the cell (not necessarily a multiple of 8)
    bit_len: usize,
    /// References to other cells
    references: Vec<Arc<Cell>>,
    /// Longest path to a leaf
    depth: u16,
    /// Cached representation hash
    hash: OnceLock<[u8; 32]>,
}

impl Cell {
    /// Creates a finalized cell, checking capacity limits
    pub(crate) fn new(
        mut data: Vec<u8>,
        bit_len: usize,
        references: Vec<Arc<Cell>>,
    ) -> TvmResult<Self> {
        if bit_len > MAX_CELL_BITS || references.len() > MAX_CELL_REFS {
            return Err(TvmError::CapacityExceeded {
                bits: bit_len,
                refs: references.len(),
            });
        }

        let required_bytes = bit_len.div_ceil(8);
        if data.len() < required_bytes {
            return Err(TvmError::CellUnderflow);
        }
        data.truncate(required_bytes);

        // Clear everything after the last data bit
        if bit_len % 8 != 0 {
            let mask = 0xFFu8 << (8 - bit_len % 8);
            if let Some(last) = data.last_mut() {
                *last &= mask;
            }
        }

        let depth = references
            .iter()
            .map(|r| r.depth() + 1)
            .max()
            .unwrap_or(0);

        Ok(Self {
            data,
            bit_len,
            references,
            depth,
            hash: OnceLock::new(),
        })
    }

    /// Returns the cell's data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the number of bits in the cell
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns the cell's references
    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    /// Returns the number of references
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Gets a reference by index
    pub fn reference(&self, index: usize) -> Option<&Arc<Cell>> {
        self.references.get(index)
    }

    /// Returns the depth of the cell (0 for a leaf)
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Computes the cell's descriptors (2 bytes)
    pub fn descriptors(&self) -> [u8; 2] {
        // First byte: number of references, ordinary cell of level 0
        let refs_descriptor = self.references.len() as u8;

        // Second byte: floor(b/8) + ceil(b/8)
        let bits_descriptor = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;

        [refs_descriptor, bits_descriptor]
    }

    /// Serializes the cell data, appending the completion tag to a partial byte
    pub fn serialize_data(&self) -> Vec<u8> {
        let mut result = self.data.clone();

        if self.bit_len % 8 != 0 {
            let last_byte_idx = self.bit_len / 8;
            result[last_byte_idx] |= 1 << (7 - self.bit_len % 8);
        }

        result
    }

    /// Descriptors followed by the padded payload
    pub fn repr_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(2 + self.data.len());
        result.extend_from_slice(&self.descriptors());
        result.extend_from_slice(&self.serialize_data());
        result
    }

    /// Flattens the tree depth-first: own representation, then every child in
    /// reference order
    pub fn serialize(&self) -> Vec<u8> {
        let mut result = self.repr_bytes();
        for reference in &self.references {
            result.extend_from_slice(&reference.serialize());
        }
        result
    }

    /// Returns the representation hash of the cell, computing it on first use
    pub fn hash(&self) -> [u8; 32] {
        *self.hash.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(self.descriptors());
            hasher.update(self.serialize_data());

            for reference in &self.references {
                hasher.update(reference.depth().to_be_bytes());
            }
            for reference in &self.references {
                hasher.update(reference.hash());
            }

            hasher.finalize().into()
        })
    }

    /// Returns the hash as lowercase hex
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.bit_len == other.bit_len
            && self.data == other.data
            && self.references == other.references
    }
}

impl Eq for Cell {}

/// Low-level builder for constructing cells
///
/// Provides the basic bit/byte operations with capacity checks. For the
/// TON-specific helpers (addresses, coins, 256-bit integers) see
/// [`Builder`](crate::tvm::Builder).
///
/// # Example
///
/// ```rust
/// use nft_giver_miner::tvm::CellBuilder;
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x12345678).unwrap();
/// builder.store_byte(0xFF).unwrap();
/// let cell = builder.build().unwrap();
/// assert_eq!(cell.bit_len(), 40);
/// ```
#[derive(Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
}

impl CellBuilder {
    /// Creates a new cell builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bits stored so far
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns the number of references stored so far
    pub fn ref_count(&self) -> usize {
        self.references.len()
    }

    fn ensure_bits(&self, bit_len: usize) -> TvmResult<()> {
        if self.bit_len + bit_len > MAX_CELL_BITS {
            return Err(TvmError::CapacityExceeded {
                bits: self.bit_len + bit_len,
                refs: self.references.len(),
            });
        }
        Ok(())
    }

    /// Stores the first `bit_len` bits of a byte slice (MSB first)
    pub fn store_bits(&mut self, bits: &[u8], bit_len: usize) -> TvmResult<&mut Self> {
        self.ensure_bits(bit_len)?;

        if bits.len() < bit_len.div_ceil(8) {
            return Err(TvmError::CellUnderflow);
        }

        if self.bit_len % 8 == 0 {
            // Aligned: copy whole bytes, then mask the tail
            let byte_len = bit_len.div_ceil(8);
            self.data.truncate(self.bit_len / 8);
            self.data.extend_from_slice(&bits[..byte_len]);
            if bit_len % 8 != 0 {
                if let Some(last) = self.data.last_mut() {
                    *last &= 0xFFu8 << (8 - bit_len % 8);
                }
            }
            self.bit_len += bit_len;
            return Ok(self);
        }

        for i in 0..bit_len {
            let bit = (bits[i / 8] >> (7 - i % 8)) & 1;

            let target_byte_idx = self.bit_len / 8;
            if target_byte_idx >= self.data.len() {
                self.data.push(0);
            }
            if bit == 1 {
                self.data[target_byte_idx] |= 1 << (7 - self.bit_len % 8);
            }

            self.bit_len += 1;
        }

        Ok(self)
    }

    /// Stores a single bit
    pub fn store_bit(&mut self, bit: bool) -> TvmResult<&mut Self> {
        self.store_bits(&[if bit { 0x80 } else { 0x00 }], 1)
    }

    /// Stores `count` zero bits
    pub fn store_zeros(&mut self, count: usize) -> TvmResult<&mut Self> {
        self.ensure_bits(count)?;
        let zeros = vec![0u8; count.div_ceil(8)];
        self.store_bits(&zeros, count)
    }

    /// Stores a byte
    pub fn store_byte(&mut self, byte: u8) -> TvmResult<&mut Self> {
        self.store_bits(&[byte], 8)
    }

    /// Stores multiple bytes
    pub fn store_bytes(&mut self, bytes: &[u8]) -> TvmResult<&mut Self> {
        self.store_bits(bytes, bytes.len() * 8)
    }

    /// Stores a u32 value
    pub fn store_u32(&mut self, value: u32) -> TvmResult<&mut Self> {
        self.store_bits(&value.to_be_bytes(), 32)
    }

    /// Stores a u64 value
    pub fn store_u64(&mut self, value: u64) -> TvmResult<&mut Self> {
        self.store_bits(&value.to_be_bytes(), 64)
    }

    /// Stores the value as an unsigned big-endian integer of `bits` width.
    ///
    /// Widths above 64 are zero-extended on the left.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> TvmResult<&mut Self> {
        if bits < 64 && value >> bits != 0 {
            return Err(TvmError::ValueOutOfRange { bits });
        }
        self.ensure_bits(bits)?;

        if bits > 64 {
            self.store_zeros(bits - 64)?;
            return self.store_u64(value);
        }

        // Left-align the value so the first `bits` bits are the payload
        let aligned = if bits == 0 { 0 } else { value << (64 - bits) };
        self.store_bits(&aligned.to_be_bytes(), bits)
    }

    /// Adds a reference to another cell
    pub fn store_reference(&mut self, cell: Arc<Cell>) -> TvmResult<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(TvmError::CapacityExceeded {
                bits: self.bit_len,
                refs: self.references.len() + 1,
            });
        }
        self.references.push(cell);
        Ok(self)
    }

    /// Builds the cell
    pub fn build(self) -> TvmResult<Arc<Cell>> {
        Ok(Arc::new(Cell::new(self.data, self.bit_len, self.references)?))
    }
}
