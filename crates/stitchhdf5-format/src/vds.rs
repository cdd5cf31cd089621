//! Virtual dataset mapping table parsing.
//!
//! A virtual dataset's layout message points at a global heap object
//! holding the mapping table: an ordered list of entries, each tying a
//! selection of the virtual dataspace to a selection of a source dataset
//! in some file. Entry order is significant (when mappings overlap, the
//! first entry wins), so parsing preserves it exactly.

#[cfg(not(feature = "std"))]
use alloc::{string::String, string::ToString, vec::Vec};

use crate::checksum::jenkins_lookup3;
use crate::error::FormatError;
use crate::global_heap;
use crate::selection::Selection;

/// Source file name meaning "the file containing the virtual dataset".
pub const SELF_FILE: &str = ".";

/// One mapping: a virtual-space selection backed by a source-dataset
/// selection. Both selections enumerate the same number of elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdsEntry {
    /// Name of the file holding the source dataset; [`SELF_FILE`] refers
    /// to the virtual dataset's own file.
    pub source_file_name: String,
    /// Path of the source dataset within that file.
    pub source_dataset: String,
    /// The selected region of the source dataset.
    pub source_selection: Selection,
    /// The region of the virtual dataspace this entry covers.
    pub virtual_selection: Selection,
}

impl VdsEntry {
    /// Whether this entry's source lives in the virtual dataset's own file.
    pub fn is_self_referencing(&self) -> bool {
        self.source_file_name == SELF_FILE
    }
}

/// The parsed mapping table of one virtual dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdsDescriptor {
    /// Mapping entries in file order.
    pub entries: Vec<VdsEntry>,
}

fn ensure_len(data: &[u8], offset: usize, needed: usize) -> Result<(), FormatError> {
    if offset + needed > data.len() {
        Err(FormatError::UnexpectedEof {
            expected: offset + needed,
            available: data.len(),
        })
    } else {
        Ok(())
    }
}

fn read_length(data: &[u8], offset: usize, length_size: u8) -> Result<u64, FormatError> {
    let s = length_size as usize;
    ensure_len(data, offset, s)?;
    let slice = &data[offset..offset + s];
    Ok(match length_size {
        2 => u16::from_le_bytes([slice[0], slice[1]]) as u64,
        4 => u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]) as u64,
        8 => u64::from_le_bytes([
            slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
        ]),
        _ => return Err(FormatError::InvalidLengthSize(length_size)),
    })
}

/// Read a NUL-terminated UTF-8 name; returns the name and the bytes
/// consumed including the terminator.
fn read_name(data: &[u8], pos: usize) -> Result<(String, usize), FormatError> {
    ensure_len(data, pos, 1)?;
    let nul = data[pos..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(FormatError::UnterminatedName)?;
    let name = core::str::from_utf8(&data[pos..pos + nul])
        .map_err(|_| FormatError::InvalidEntryName)?;
    Ok((name.to_string(), nul + 1))
}

impl VdsDescriptor {
    /// Parse a virtual dataset global heap block.
    ///
    /// Layout: version (0), entry count (`length_size` wide), the entries
    /// (two NUL-terminated names and two serialized selections each), and
    /// a Jenkins lookup3 checksum over everything before it.
    pub fn parse(data: &[u8], length_size: u8) -> Result<VdsDescriptor, FormatError> {
        ensure_len(data, 0, 1)?;
        let version = data[0];
        if version != 0 {
            return Err(FormatError::InvalidVdsVersion(version));
        }

        let num_entries = read_length(data, 1, length_size)?;
        let mut pos = 1 + length_size as usize;

        let mut entries = Vec::with_capacity(num_entries as usize);
        for _ in 0..num_entries {
            let (source_file_name, n) = read_name(data, pos)?;
            pos += n;
            let (source_dataset, n) = read_name(data, pos)?;
            pos += n;
            let (source_selection, n) = Selection::parse(&data[pos..])?;
            pos += n;
            let (virtual_selection, n) = Selection::parse(&data[pos..])?;
            pos += n;
            entries.push(VdsEntry {
                source_file_name,
                source_dataset,
                source_selection,
                virtual_selection,
            });
        }

        ensure_len(data, pos, 4)?;
        let expected = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        let computed = jenkins_lookup3(&data[..pos]);
        if expected != computed {
            return Err(FormatError::ChecksumMismatch { expected, computed });
        }

        Ok(VdsDescriptor { entries })
    }

    /// Locate the mapping table through the global heap and parse it.
    ///
    /// `heap_address` and `heap_index` come from the dataset's virtual
    /// layout message.
    pub fn read_from_heap(
        file_data: &[u8],
        heap_address: u64,
        heap_index: u32,
        length_size: u8,
    ) -> Result<VdsDescriptor, FormatError> {
        let block = global_heap::read_object(file_data, heap_address, heap_index as u16, length_size)?;
        Self::parse(&block, length_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::HyperslabSelection;

    fn encode_selection(sel: &Selection) -> Vec<u8> {
        let mut buf = Vec::new();
        match sel {
            Selection::All => {
                buf.extend_from_slice(&3u32.to_le_bytes());
                buf.extend_from_slice(&1u32.to_le_bytes());
                buf.extend_from_slice(&[0u8; 8]);
            }
            Selection::None => {
                buf.extend_from_slice(&0u32.to_le_bytes());
                buf.extend_from_slice(&1u32.to_le_bytes());
                buf.extend_from_slice(&[0u8; 8]);
            }
            Selection::Hyperslab(h) => {
                buf.extend_from_slice(&2u32.to_le_bytes());
                buf.extend_from_slice(&2u32.to_le_bytes());
                buf.push(0); // flags
                buf.extend_from_slice(&(h.rank() as u32 * 32 + 4).to_le_bytes());
                buf.extend_from_slice(&(h.rank() as u32).to_le_bytes());
                for k in 0..h.rank() {
                    buf.extend_from_slice(&h.start[k].to_le_bytes());
                    buf.extend_from_slice(&h.stride[k].to_le_bytes());
                    buf.extend_from_slice(&h.count[k].to_le_bytes());
                    buf.extend_from_slice(&h.block[k].to_le_bytes());
                }
            }
            Selection::Points(_) => unimplemented!(),
        }
        buf
    }

    /// Build a heap block for the given entries, with a valid checksum.
    fn encode_block(
        entries: &[(&str, &str, Selection, Selection)],
        length_size: u8,
    ) -> Vec<u8> {
        let mut buf = vec![0u8]; // version
        match length_size {
            4 => buf.extend_from_slice(&(entries.len() as u32).to_le_bytes()),
            8 => buf.extend_from_slice(&(entries.len() as u64).to_le_bytes()),
            _ => panic!("unsupported length_size"),
        }
        for (file, dataset, source_sel, virtual_sel) in entries {
            buf.extend_from_slice(file.as_bytes());
            buf.push(0);
            buf.extend_from_slice(dataset.as_bytes());
            buf.push(0);
            buf.extend_from_slice(&encode_selection(source_sel));
            buf.extend_from_slice(&encode_selection(virtual_sel));
        }
        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    fn strided(start: u64, stride: u64, count: u64, block: u64) -> Selection {
        Selection::Hyperslab(
            HyperslabSelection::new(vec![start], vec![stride], vec![count], vec![block]).unwrap(),
        )
    }

    #[test]
    fn parse_single_entry() {
        let block = encode_block(
            &[(".", "/data/a", Selection::All, strided(2, 3, 4, 2))],
            8,
        );
        let desc = VdsDescriptor::parse(&block, 8).unwrap();
        assert_eq!(desc.entries.len(), 1);
        let entry = &desc.entries[0];
        assert!(entry.is_self_referencing());
        assert_eq!(entry.source_dataset, "/data/a");
        assert_eq!(entry.source_selection, Selection::All);
        assert_eq!(entry.virtual_selection, strided(2, 3, 4, 2));
    }

    #[test]
    fn entry_order_is_preserved() {
        let block = encode_block(
            &[
                ("b.h5", "/x", Selection::All, strided(0, 5, 1, 5)),
                ("a.h5", "/y", Selection::All, strided(3, 5, 1, 5)),
            ],
            8,
        );
        let desc = VdsDescriptor::parse(&block, 8).unwrap();
        assert_eq!(desc.entries[0].source_file_name, "b.h5");
        assert_eq!(desc.entries[1].source_file_name, "a.h5");
        assert!(!desc.entries[0].is_self_referencing());
    }

    #[test]
    fn parse_with_4byte_lengths() {
        let block = encode_block(&[("ext.h5", "/d", Selection::All, Selection::All)], 4);
        let desc = VdsDescriptor::parse(&block, 4).unwrap();
        assert_eq!(desc.entries.len(), 1);
    }

    #[test]
    fn bad_version_rejected() {
        let mut block = encode_block(&[], 8);
        block[0] = 1;
        let err = VdsDescriptor::parse(&block, 8).unwrap_err();
        assert_eq!(err, FormatError::InvalidVdsVersion(1));
    }

    #[test]
    fn corrupt_checksum_rejected() {
        let mut block = encode_block(&[(".", "/d", Selection::All, Selection::All)], 8);
        let last = block.len() - 1;
        block[last] ^= 0xFF;
        let err = VdsDescriptor::parse(&block, 8).unwrap_err();
        assert!(matches!(err, FormatError::ChecksumMismatch { .. }));
    }

    #[test]
    fn unterminated_name_rejected() {
        let mut block = vec![0u8];
        block.extend_from_slice(&1u64.to_le_bytes());
        block.extend_from_slice(b"no-terminator");
        let err = VdsDescriptor::parse(&block, 8).unwrap_err();
        assert_eq!(err, FormatError::UnterminatedName);
    }

    #[test]
    fn non_utf8_name_rejected() {
        let mut block = vec![0u8];
        block.extend_from_slice(&1u64.to_le_bytes());
        block.extend_from_slice(&[0xFF, 0xFE, 0x00]);
        let err = VdsDescriptor::parse(&block, 8).unwrap_err();
        assert_eq!(err, FormatError::InvalidEntryName);
    }

    #[test]
    fn read_through_global_heap() {
        let block = encode_block(&[(".", "/d", Selection::All, Selection::All)], 8);

        // Wrap the block in a heap collection at a nonzero address.
        let mut file = vec![0u8; 32];
        let heap_start = file.len() as u64;
        let padded = (block.len() + 7) & !7;
        let collection_size = 16 + 8 + 8 + padded + 2;
        file.extend_from_slice(b"GCOL");
        file.push(1); // version
        file.extend_from_slice(&[0u8; 3]);
        file.extend_from_slice(&(collection_size as u64).to_le_bytes());
        file.extend_from_slice(&1u16.to_le_bytes()); // object index
        file.extend_from_slice(&1u16.to_le_bytes()); // reference count
        file.extend_from_slice(&[0u8; 4]);
        file.extend_from_slice(&(block.len() as u64).to_le_bytes());
        file.extend_from_slice(&block);
        file.resize(file.len() + padded - block.len(), 0);
        file.extend_from_slice(&0u16.to_le_bytes()); // free space

        let desc = VdsDescriptor::read_from_heap(&file, heap_start, 1, 8).unwrap();
        assert_eq!(desc.entries.len(), 1);
        assert_eq!(desc.entries[0].source_dataset, "/d");
    }
}
