//! Binary codec for the segment footer.
//!
//! Layout (all fields little-endian `u64`):
//!
//! ```text
//! ncolumns
//! repeat ncolumns times:
//!   nblocks
//!   repeat nblocks times:
//!     offset, length, block_size, num_elem, flags
//! ```
//!
//! The trailing footer-length field that follows the footer in the file is
//! written by the segment writer and consumed by [`super::Segment::init`];
//! it is not part of the footer body handled here.

use super::BlockInfo;

/// Bytes per serialized [`BlockInfo`] record.
const BLOCK_RECORD_SIZE: usize = 40;

/// Serializes the per-column block table.
pub(crate) fn encode_footer(blocks: &[Vec<BlockInfo>]) -> Vec<u8> {
    let nrecords: usize = blocks.iter().map(Vec::len).sum();
    let mut buf = Vec::with_capacity(8 * (1 + blocks.len()) + BLOCK_RECORD_SIZE * nrecords);

    buf.extend_from_slice(&(blocks.len() as u64).to_le_bytes());
    for column in blocks {
        buf.extend_from_slice(&(column.len() as u64).to_le_bytes());
        for info in column {
            buf.extend_from_slice(&info.offset.to_le_bytes());
            buf.extend_from_slice(&info.length.to_le_bytes());
            buf.extend_from_slice(&info.block_size.to_le_bytes());
            buf.extend_from_slice(&info.num_elem.to_le_bytes());
            buf.extend_from_slice(&info.flags.to_le_bytes());
        }
    }

    buf
}

/// Deserializes the per-column block table.
///
/// Errors carry a plain description; the caller attaches the segment path.
pub(crate) fn decode_footer(data: &[u8]) -> Result<Vec<Vec<BlockInfo>>, String> {
    let mut cursor = 0usize;

    let ncolumns = read_u64(data, &mut cursor)? as usize;
    // Each column needs at least its block count field.
    if ncolumns > data.len() / 8 {
        return Err(format!("implausible column count {ncolumns}"));
    }

    let mut blocks = Vec::with_capacity(ncolumns);
    for column in 0..ncolumns {
        let nblocks = read_u64(data, &mut cursor)? as usize;
        if nblocks > (data.len() - cursor) / BLOCK_RECORD_SIZE {
            return Err(format!(
                "column {column} declares {nblocks} blocks but only {} bytes remain",
                data.len() - cursor
            ));
        }

        let mut column_blocks = Vec::with_capacity(nblocks);
        for _ in 0..nblocks {
            column_blocks.push(BlockInfo {
                offset: read_u64(data, &mut cursor)?,
                length: read_u64(data, &mut cursor)?,
                block_size: read_u64(data, &mut cursor)?,
                num_elem: read_u64(data, &mut cursor)?,
                flags: read_u64(data, &mut cursor)?,
            });
        }
        blocks.push(column_blocks);
    }

    if cursor != data.len() {
        return Err(format!(
            "{} trailing bytes after block table",
            data.len() - cursor
        ));
    }

    Ok(blocks)
}

fn read_u64(data: &[u8], cursor: &mut usize) -> Result<u64, String> {
    let end = *cursor + 8;
    if end > data.len() {
        return Err("footer truncated".to_string());
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[*cursor..end]);
    *cursor = end;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{LZ4_COMPRESSED, TYPED_BLOCK};

    fn sample() -> Vec<Vec<BlockInfo>> {
        vec![
            vec![
                BlockInfo {
                    offset: 0,
                    length: 10,
                    block_size: 10,
                    num_elem: 5,
                    flags: 0,
                },
                BlockInfo {
                    offset: 10,
                    length: 6,
                    block_size: 20,
                    num_elem: 4,
                    flags: LZ4_COMPRESSED | TYPED_BLOCK,
                },
            ],
            vec![BlockInfo {
                offset: 16,
                length: 8,
                block_size: 8,
                num_elem: 1,
                flags: TYPED_BLOCK,
            }],
        ]
    }

    #[test]
    fn roundtrip() {
        let blocks = sample();
        let encoded = encode_footer(&blocks);
        assert_eq!(decode_footer(&encoded).unwrap(), blocks);
    }

    #[test]
    fn empty_table_roundtrip() {
        let encoded = encode_footer(&[]);
        assert_eq!(encoded.len(), 8);
        assert!(decode_footer(&encoded).unwrap().is_empty());
    }

    #[test]
    fn column_with_no_blocks_roundtrip() {
        let blocks = vec![Vec::new(), sample()[1].clone()];
        let encoded = encode_footer(&blocks);
        assert_eq!(decode_footer(&encoded).unwrap(), blocks);
    }

    #[test]
    fn truncated_footer_fails() {
        let encoded = encode_footer(&sample());
        assert!(decode_footer(&encoded[..encoded.len() - 1]).is_err());
        assert!(decode_footer(&[]).is_err());
    }

    #[test]
    fn trailing_garbage_fails() {
        let mut encoded = encode_footer(&sample());
        encoded.extend_from_slice(&[0u8; 8]);
        assert!(decode_footer(&encoded).is_err());
    }

    #[test]
    fn implausible_counts_fail() {
        // Claims u64::MAX columns in a 16-byte footer.
        let mut encoded = Vec::new();
        encoded.extend_from_slice(&u64::MAX.to_le_bytes());
        encoded.extend_from_slice(&0u64.to_le_bytes());
        assert!(decode_footer(&encoded).is_err());
    }
}
