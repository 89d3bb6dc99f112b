//! Bag of Cells (BoC) serialization and deserialization
//!
//! BoC is a serialization format that encodes cells into byte arrays.
//! Identical subtrees are stored once; cells are written root first so every
//! reference points to a later index.

use crate::crc::CRC32C;
use crate::tvm::cell::{Cell, MAX_CELL_REFS};
use crate::tvm::error::{TvmError, TvmResult};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use std::collections::HashMap;
use std::sync::Arc;

/// BoC magic number for standard format
const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

fn invalid(reason: impl Into<String>) -> TvmError {
    TvmError::InvalidBoc(reason.into())
}

/// Serializes a cell and its references into a Bag of Cells (BoC) format
pub fn serialize_boc(root: &Arc<Cell>, has_crc32: bool) -> TvmResult<Vec<u8>> {
    let cells = collect_cells(root);

    let mut indices = HashMap::with_capacity(cells.len());
    for (idx, cell) in cells.iter().enumerate() {
        indices.insert(cell.hash(), idx);
    }

    let size_bytes = bytes_needed(cells.len());

    let mut cells_data = Vec::new();
    for cell in &cells {
        cells_data.extend_from_slice(&cell.repr_bytes());
        for reference in cell.references() {
            let ref_idx = indices
                .get(&reference.hash())
                .ok_or_else(|| invalid("reference not found in cell map"))?;
            write_uint(&mut cells_data, *ref_idx, size_bytes);
        }
    }

    let offset_bytes = bytes_needed(cells_data.len());

    let mut result = Vec::with_capacity(cells_data.len() + 32);
    result.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());

    // has_idx:1 has_crc32c:1 has_cache_bits:1 flags:2 size:3
    let flags = if has_crc32 { 0x40u8 } else { 0 };
    result.push(flags | size_bytes as u8);
    result.push(offset_bytes as u8);

    write_uint(&mut result, cells.len(), size_bytes);
    // One root, no absent cells
    write_uint(&mut result, 1, size_bytes);
    write_uint(&mut result, 0, size_bytes);
    write_uint(&mut result, cells_data.len(), offset_bytes);
    // Root is always the first cell
    write_uint(&mut result, 0, size_bytes);

    result.extend_from_slice(&cells_data);

    if has_crc32 {
        let crc = CRC32C.checksum(&result);
        result.extend_from_slice(&crc.to_le_bytes());
    }

    Ok(result)
}

/// Deserializes a Bag of Cells (BoC) into a root cell
pub fn deserialize_boc(data: &[u8]) -> TvmResult<Arc<Cell>> {
    let mut reader = Reader { data, pos: 0 };

    let magic = reader.read_uint(4)? as u32;
    if magic != BOC_GENERIC_MAGIC {
        return Err(invalid(format!("unknown magic {magic:#010x}")));
    }

    let flags_and_size = reader.read_uint(1)? as u8;
    let has_idx = flags_and_size & 0x80 != 0;
    let has_crc32 = flags_and_size & 0x40 != 0;
    let size_bytes = (flags_and_size & 0x07) as usize;
    if size_bytes == 0 || size_bytes > 4 {
        return Err(invalid(format!("invalid size_bytes {size_bytes}")));
    }

    let offset_bytes = reader.read_uint(1)? as usize;
    if offset_bytes == 0 || offset_bytes > 8 {
        return Err(invalid(format!("invalid offset_bytes {offset_bytes}")));
    }

    let cells_count = reader.read_uint(size_bytes)?;
    let roots_count = reader.read_uint(size_bytes)?;
    let absent_count = reader.read_uint(size_bytes)?;
    let cells_size = reader.read_uint(offset_bytes)?;

    if roots_count != 1 {
        return Err(invalid(format!("expected one root, got {roots_count}")));
    }
    if absent_count != 0 {
        return Err(invalid("absent cells are not supported"));
    }

    // Every cell carries at least its two descriptor bytes
    if cells_count == 0 || cells_count > cells_size / 2 {
        return Err(invalid(format!(
            "{cells_count} cells do not fit into {cells_size} bytes"
        )));
    }

    let root_idx = reader.read_uint(size_bytes)?;
    if root_idx >= cells_count {
        return Err(invalid(format!("invalid root index {root_idx}")));
    }
    if has_idx {
        let index_size = cells_count
            .checked_mul(offset_bytes)
            .ok_or_else(|| invalid("index size overflow"))?;
        reader.take(index_size)?;
    }

    let cells_data = reader.take(cells_size)?;
    let cells_end = reader.pos;

    if has_crc32 {
        let expected = u32::from_le_bytes(
            reader
                .take(4)?
                .try_into()
                .map_err(|_| invalid("missing crc32c"))?,
        );
        let actual = CRC32C.checksum(&data[..cells_end]);
        if expected != actual {
            return Err(invalid(format!(
                "crc32c mismatch: expected {expected:#010x}, got {actual:#010x}"
            )));
        }
    }

    if reader.pos != data.len() {
        return Err(invalid(format!(
            "{} trailing bytes after bag of cells",
            data.len() - reader.pos
        )));
    }

    let cells = parse_cells(cells_data, cells_count, size_bytes)?;
    cells
        .get(root_idx)
        .cloned()
        .ok_or_else(|| invalid(format!("invalid root index {root_idx}")))
}

struct RawCell<'a> {
    data: &'a [u8],
    bit_len: usize,
    refs: Vec<usize>,
}

fn parse_cells(data: &[u8], count: usize, size_bytes: usize) -> TvmResult<Vec<Arc<Cell>>> {
    let mut reader = Reader { data, pos: 0 };
    let mut raw_cells = Vec::with_capacity(count);

    for idx in 0..count {
        let d1 = reader.read_uint(1)? as u8;
        let d2 = reader.read_uint(1)? as u8;

        let ref_count = (d1 & 0x07) as usize;
        if d1 & 0x08 != 0 || d1 >> 5 != 0 {
            return Err(invalid("exotic and higher-level cells are not supported"));
        }
        if ref_count > MAX_CELL_REFS {
            return Err(invalid(format!("cell {idx} has {ref_count} references")));
        }

        let data_size = (d2 as usize).div_ceil(2);
        let cell_data = reader.take(data_size)?;

        let bit_len = if d2 % 2 == 0 {
            data_size * 8
        } else {
            // Partial byte: drop the completion tag and the zeros after it
            let last_byte = cell_data[data_size - 1];
            if last_byte == 0 {
                return Err(invalid(format!("cell {idx} is missing its completion tag")));
            }
            data_size * 8 - last_byte.trailing_zeros() as usize - 1
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let ref_idx = reader.read_uint(size_bytes)?;
            if ref_idx <= idx || ref_idx >= count {
                return Err(invalid(format!(
                    "cell {idx} has invalid reference index {ref_idx}"
                )));
            }
            refs.push(ref_idx);
        }

        raw_cells.push(RawCell {
            data: cell_data,
            bit_len,
            refs,
        });
    }

    if reader.pos != data.len() {
        return Err(invalid("trailing bytes after cells"));
    }

    // References always point forward, so build from the back
    let mut cells: Vec<Option<Arc<Cell>>> = vec![None; count];
    for idx in (0..count).rev() {
        let raw = &raw_cells[idx];
        let references = raw
            .refs
            .iter()
            .map(|&r| cells[r].clone().ok_or_else(|| invalid("unresolved reference")))
            .collect::<TvmResult<Vec<_>>>()?;
        let cell = Cell::new(raw.data.to_vec(), raw.bit_len, references)?;
        cells[idx] = Some(Arc::new(cell));
    }

    Ok(cells.into_iter().flatten().collect())
}

/// Orders unique cells root first; children always follow their parents
fn collect_cells(root: &Arc<Cell>) -> Vec<Arc<Cell>> {
    let mut post_order = Vec::new();
    let mut visited = HashMap::new();
    collect_cells_recursive(root, &mut post_order, &mut visited);
    post_order.reverse();
    post_order
}

fn collect_cells_recursive(
    cell: &Arc<Cell>,
    cells: &mut Vec<Arc<Cell>>,
    visited: &mut HashMap<[u8; 32], ()>,
) {
    if visited.insert(cell.hash(), ()).is_some() {
        return;
    }

    for reference in cell.references() {
        collect_cells_recursive(reference, cells, visited);
    }

    cells.push(cell.clone());
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> TvmResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| invalid("unexpected end of data"))?;
        let chunk = &self.data[self.pos..end];
        self.pos = end;
        Ok(chunk)
    }

    fn read_uint(&mut self, size: usize) -> TvmResult<usize> {
        Ok(self
            .take(size)?
            .iter()
            .fold(0usize, |acc, &byte| (acc << 8) | byte as usize))
    }
}

fn bytes_needed(value: usize) -> usize {
    let bits = (usize::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(8).max(1)
}

fn write_uint(buf: &mut Vec<u8>, value: usize, size: usize) {
    let bytes = (value as u64).to_be_bytes();
    buf.extend_from_slice(&bytes[8 - size..]);
}

/// Converts a hex string to a BoC
pub fn hex_to_boc(hex: &str) -> TvmResult<Arc<Cell>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&hex).map_err(|e| invalid(format!("bad hex: {e}")))?;
    deserialize_boc(&bytes)
}

/// Converts a BoC to a hex string
pub fn boc_to_hex(cell: &Arc<Cell>, has_crc32: bool) -> TvmResult<String> {
    Ok(hex::encode(serialize_boc(cell, has_crc32)?))
}

/// Converts a BoC to standard base64
pub fn boc_to_base64(cell: &Arc<Cell>, has_crc32: bool) -> TvmResult<String> {
    Ok(STANDARD.encode(serialize_boc(cell, has_crc32)?))
}

/// Converts a BoC to unpadded url-safe base64, as used in transfer links
pub fn boc_to_base64_url(cell: &Arc<Cell>, has_crc32: bool) -> TvmResult<String> {
    Ok(URL_SAFE_NO_PAD.encode(serialize_boc(cell, has_crc32)?))
}

/// Converts a base64 string (standard or url-safe, padded or not) to a BoC
pub fn base64_to_boc(b64: &str) -> TvmResult<Arc<Cell>> {
    let normalized: String = b64
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(normalized)
        .map_err(|e| invalid(format!("bad base64: {e}")))?;
    deserialize_boc(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvm::cell::CellBuilder;

    fn leaf(value: u32) -> Arc<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(value).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_serialize_deserialize_simple() {
        let cell = leaf(0x12345678);

        let boc = serialize_boc(&cell, false).unwrap();
        assert_eq!(
            hex::encode(&boc),
            "b5ee9c7201010101000600000812345678"
        );
        let deserialized = deserialize_boc(&boc).unwrap();

        assert_eq!(cell, deserialized);
        assert_eq!(cell.hash(), deserialized.hash());
    }

    #[test]
    fn test_state_init_layout() {
        let code = leaf(0xdeadbeef);
        let data = {
            let mut builder = CellBuilder::new();
            builder.store_u64(7).unwrap();
            builder.build().unwrap()
        };
        let mut builder = CellBuilder::new();
        builder.store_uint(0b00110, 5).unwrap();
        builder.store_reference(code).unwrap();
        builder.store_reference(data).unwrap();
        let root = builder.build().unwrap();

        let boc = serialize_boc(&root, false).unwrap();
        assert_eq!(
            hex::encode(&boc),
            "b5ee9c72010103010015000201340201001000000000000000070008deadbeef"
        );
        assert_eq!(deserialize_boc(&boc).unwrap(), root);
    }

    #[test]
    fn test_shared_subtree_stored_once() {
        let shared = leaf(1);
        let mut builder = CellBuilder::new();
        builder.store_reference(shared.clone()).unwrap();
        builder.store_reference(shared).unwrap();
        let root = builder.build().unwrap();

        let boc = serialize_boc(&root, false).unwrap();
        // header 11 bytes, root 2+0+2 bytes, leaf 2+4 bytes
        assert_eq!(boc.len(), 11 + 4 + 6);
        let decoded = deserialize_boc(&boc).unwrap();
        assert_eq!(decoded.reference(0), decoded.reference(1));
    }

    #[test]
    fn test_crc_mismatch() {
        let mut boc = serialize_boc(&leaf(5), true).unwrap();
        let last = boc.len() - 1;
        boc[last] ^= 0xFF;
        assert!(matches!(deserialize_boc(&boc), Err(TvmError::InvalidBoc(_))));
    }

    #[test]
    fn test_truncated_and_bad_magic() {
        let boc = serialize_boc(&leaf(5), true).unwrap();
        assert!(deserialize_boc(&boc[..boc.len() - 6]).is_err());
        assert!(deserialize_boc(&[0xde, 0xad, 0xbe, 0xef, 0x01]).is_err());
        assert!(deserialize_boc(&[]).is_err());
    }

    #[test]
    fn test_cell_count_larger_than_data() {
        let boc = hex::decode("b5ee9c720401ffffffff00000001000000000000000000").unwrap();
        assert_eq!(boc.len(), 23);
        assert!(matches!(deserialize_boc(&boc), Err(TvmError::InvalidBoc(_))));

        let root_out_of_range = hex::decode("b5ee9c7201010101000601000812345678").unwrap();
        assert!(matches!(
            deserialize_boc(&root_out_of_range),
            Err(TvmError::InvalidBoc(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        for has_crc32 in [false, true] {
            let mut boc = serialize_boc(&leaf(5), has_crc32).unwrap();
            assert!(deserialize_boc(&boc).is_ok());
            boc.extend_from_slice(&[0xAA, 0xBB]);
            assert!(matches!(deserialize_boc(&boc), Err(TvmError::InvalidBoc(_))));
        }
    }

    #[test]
    fn test_text_conversions() {
        let cell = leaf(0xDEADBEEF);

        let hex = boc_to_hex(&cell, false).unwrap();
        assert_eq!(hex_to_boc(&hex).unwrap(), cell);

        let b64 = boc_to_base64(&cell, true).unwrap();
        assert_eq!(base64_to_boc(&b64).unwrap(), cell);

        let b64_url = boc_to_base64_url(&cell, true).unwrap();
        assert!(!b64_url.contains('='));
        assert_eq!(base64_to_boc(&b64_url).unwrap(), cell);
    }
}
