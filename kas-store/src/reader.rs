//! Read pipeline: ingest a file, validate its structure, and expose the
//! descriptor table for lookup.
//!
//! The whole file is acquired up front, either as a read-only private
//! memory map or, when mapping is disabled, as an owned 8-aligned buffer.
//! Items keep only offsets into that buffer; key and array slices are
//! materialized on demand so the store never holds self-referential
//! borrows.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use memmap2::{Mmap, MmapOptions};
use tracing::debug;
use zerocopy::IntoBytes;

use kas_core::error::{Error, Result};
use kas_core::types::ElementType;

use crate::format::{Descriptor, Header, ARRAY_ALIGN, DESCRIPTOR_SIZE, HEADER_SIZE};
use crate::pack::{compare_keys, pack_layout};

/// Whole-file storage for a read-mode store.
///
/// The two variants are semantically identical; [`Buffer::bytes`] is the
/// only way the rest of the reader touches the contents.
#[derive(Debug)]
pub(crate) enum Buffer {
    Mapped(Mmap),
    Owned(OwnedBuf),
}

impl Buffer {
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Buffer::Mapped(mmap) => &mmap[..],
            Buffer::Owned(buf) => buf.bytes(),
        }
    }
}

/// Heap buffer with 8-byte alignment, backed by `u64` words so that array
/// regions may be aliased as any supported element type, exactly as in
/// the mapped case.
#[derive(Debug)]
pub(crate) struct OwnedBuf {
    words: Vec<u64>,
    len: usize,
}

impl OwnedBuf {
    fn with_len(len: usize) -> Result<Self> {
        let word_count = len.div_ceil(8);
        let mut words: Vec<u64> = Vec::new();
        words.try_reserve_exact(word_count).map_err(|_| Error::NoMemory {
            message: format!("cannot allocate {} byte read buffer", len),
        })?;
        words.resize(word_count, 0);
        Ok(Self { words, len })
    }

    fn bytes(&self) -> &[u8] {
        &self.words.as_bytes()[..self.len]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.words.as_mut_bytes()[..len]
    }
}

/// One parsed descriptor. Offsets are validated against the file before
/// the item is constructed, so the slice accessors cannot go out of
/// bounds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadItem {
    pub ty: ElementType,
    pub key_start: u64,
    pub key_len: u64,
    pub array_start: u64,
    pub array_len: u64,
}

impl ReadItem {
    pub(crate) fn key<'b>(&self, buffer: &'b [u8]) -> &'b [u8] {
        &buffer[self.key_start as usize..(self.key_start + self.key_len) as usize]
    }

    pub(crate) fn array_bytes<'b>(&self, buffer: &'b [u8]) -> &'b [u8] {
        let len = self.array_len as usize * self.ty.size();
        &buffer[self.array_start as usize..self.array_start as usize + len]
    }
}

/// Everything a read-mode store holds after a successful open
#[derive(Debug)]
pub(crate) struct ReadState {
    pub buffer: Buffer,
    pub items: Vec<ReadItem>,
    pub file_version: (u16, u16),
}

/// A failed read means a truncated file when it stopped at EOF, and a
/// real I/O problem otherwise.
fn map_read_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::bad_format("file ends before the expected number of bytes")
    } else {
        err.into()
    }
}

/// Opens a file in read mode: header, whole-file buffer, descriptor
/// table, and full structural validation.
pub(crate) fn open_read(file: &mut File, no_mmap: bool) -> Result<ReadState> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    file.read_exact(&mut header_bytes).map_err(map_read_error)?;
    let header = Header::decode(&header_bytes)?;

    // The header must describe the file we are actually looking at; this
    // also keeps the mapped and buffered paths behavior-identical for
    // files with trailing bytes.
    let disk_len = file.metadata()?.len();
    if disk_len != header.file_size {
        return Err(Error::bad_format(format!(
            "header file_size {} does not match file length {}",
            header.file_size, disk_len
        )));
    }

    let buffer = if no_mmap {
        Buffer::Owned(read_whole_file(file, header.file_size)?)
    } else {
        Buffer::Mapped(map_whole_file(file)?)
    };

    let items = parse_descriptors(&header, buffer.bytes())?;
    debug!(
        "opened key-array store: {} items, {} bytes, format {}.{} ({})",
        header.num_items,
        header.file_size,
        header.version_major,
        header.version_minor,
        if no_mmap { "buffered" } else { "mapped" },
    );

    Ok(ReadState {
        buffer,
        items,
        file_version: (header.version_major, header.version_minor),
    })
}

fn map_whole_file(file: &File) -> Result<Mmap> {
    // SAFETY: the map is read-only and private; the store treats the file
    // as immutable for its whole life and never hands out the map itself,
    // only slices whose lifetime is tied to the store.
    let mmap = unsafe { MmapOptions::new().map(file) }.map_err(|e| Error::Io {
        message: "failed to memory-map store file".to_string(),
        source: e,
    })?;
    Ok(mmap)
}

fn read_whole_file(file: &mut File, file_size: u64) -> Result<OwnedBuf> {
    let mut buf = OwnedBuf::with_len(file_size as usize)?;
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(buf.bytes_mut()).map_err(map_read_error)?;
    Ok(buf)
}

/// Parses the descriptor table and validates every structural invariant:
/// per-item bounds, canonical packing, and strict key ordering.
fn parse_descriptors(header: &Header, buffer: &[u8]) -> Result<Vec<ReadItem>> {
    let num_items = header.num_items as usize;
    let table_end = HEADER_SIZE as u64 + num_items as u64 * DESCRIPTOR_SIZE as u64;
    if table_end > header.file_size {
        return Err(Error::bad_format(format!(
            "descriptor table for {} items needs {} bytes but the file has {}",
            num_items, table_end, header.file_size
        )));
    }

    let mut items: Vec<ReadItem> = Vec::new();
    items.try_reserve_exact(num_items).map_err(|_| Error::NoMemory {
        message: format!("cannot allocate table for {} items", num_items),
    })?;

    for j in 0..num_items {
        let offset = HEADER_SIZE + j * DESCRIPTOR_SIZE;
        let d = Descriptor::decode(&buffer[offset..offset + DESCRIPTOR_SIZE])?;

        let key_end = d
            .key_start
            .checked_add(d.key_len)
            .ok_or_else(|| Error::bad_format("key extent overflows"))?;
        if key_end > header.file_size {
            return Err(Error::bad_format(format!(
                "key [{}, {}) lies outside the file",
                d.key_start, key_end
            )));
        }

        let array_bytes = d
            .array_byte_len()
            .ok_or_else(|| Error::bad_format("array extent overflows"))?;
        let array_end = d
            .array_start
            .checked_add(array_bytes)
            .ok_or_else(|| Error::bad_format("array extent overflows"))?;
        if array_end > header.file_size {
            return Err(Error::bad_format(format!(
                "array [{}, {}) lies outside the file",
                d.array_start, array_end
            )));
        }

        items.push(ReadItem {
            ty: d.ty,
            key_start: d.key_start,
            key_len: d.key_len,
            array_start: d.array_start,
            array_len: d.array_len,
        });
    }

    validate_packing(header, &items)?;
    validate_ordering(buffer, &items)?;
    Ok(items)
}

/// Recomputes the canonical layout and compares it against the
/// descriptors. This forbids overlapping items, holes beyond alignment
/// padding, and any non-canonical packing.
fn validate_packing(header: &Header, items: &[ReadItem]) -> Result<()> {
    let extents: Vec<(u64, u64)> = items
        .iter()
        .map(|item| (item.key_len, item.array_len * item.ty.size() as u64))
        .collect();
    let layout = pack_layout(&extents)
        .ok_or_else(|| Error::bad_format("descriptor extents overflow"))?;

    for (j, item) in items.iter().enumerate() {
        if item.key_start != layout.key_starts[j] {
            return Err(Error::bad_format(format!(
                "key {} starts at {} but canonical packing puts it at {}",
                j, item.key_start, layout.key_starts[j]
            )));
        }
        if item.array_start != layout.array_starts[j] {
            return Err(Error::bad_format(format!(
                "array {} starts at {} but canonical packing puts it at {}",
                j, item.array_start, layout.array_starts[j]
            )));
        }
        debug_assert_eq!(item.array_start % ARRAY_ALIGN, 0);
    }
    if layout.file_size != header.file_size {
        return Err(Error::bad_format(format!(
            "packed size {} does not match header file_size {}",
            layout.file_size, header.file_size
        )));
    }
    Ok(())
}

/// Descriptor keys must be strictly increasing under the packer's order.
/// Binary-search lookup depends on this, and strictness rejects
/// duplicate keys at the same time.
fn validate_ordering(buffer: &[u8], items: &[ReadItem]) -> Result<()> {
    for pair in items.windows(2) {
        let prev = pair[0].key(buffer);
        let next = pair[1].key(buffer);
        if compare_keys(prev, next) != std::cmp::Ordering::Less {
            return Err(Error::bad_format(
                "descriptor keys are not in sorted order",
            ));
        }
    }
    Ok(())
}
