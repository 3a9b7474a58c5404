//! Write pipeline: sort, pack, and emit a store to disk in one pass.

use std::fs::File;
use std::io::{BufWriter, Write};

use bytes::Bytes;
use tracing::info;

use kas_core::error::{Error, Result};
use kas_core::types::ArrayRef;

use crate::format::{Descriptor, Header};
use crate::pack::{compare_keys, pack_layout};

/// One buffered insertion awaiting close.
///
/// The key is a private copy so callers may reuse or drop their buffer
/// between `put` and `close`; the array stays borrowed and must outlive
/// the store.
#[derive(Debug)]
pub(crate) struct WriteItem<'a> {
    pub key: Bytes,
    pub array: ArrayRef<'a>,
}

/// Sorts `items` by key and emits the complete file: header, descriptor
/// table, key region, then the 8-aligned array region with zero padding.
///
/// Any I/O failure aborts the write; a partially written file is corrupt
/// and callers must not attempt to repair it.
pub(crate) fn write_store(file: &mut File, items: &mut [WriteItem<'_>]) -> Result<()> {
    if items.len() > u32::MAX as usize {
        return Err(Error::generic(format!(
            "{} items exceed the format's u32 item count",
            items.len()
        )));
    }
    items.sort_by(|a, b| compare_keys(&a.key, &b.key));

    let extents: Vec<(u64, u64)> = items
        .iter()
        .map(|item| (item.key.len() as u64, item.array.byte_len() as u64))
        .collect();
    let layout = pack_layout(&extents)
        .ok_or_else(|| Error::generic("file layout overflowed u64 offsets"))?;

    let mut w = BufWriter::new(file);
    w.write_all(&Header::new(items.len() as u32, layout.file_size).encode())?;

    for (i, item) in items.iter().enumerate() {
        let descriptor = Descriptor {
            ty: item.array.element_type(),
            key_start: layout.key_starts[i],
            key_len: item.key.len() as u64,
            array_start: layout.array_starts[i],
            array_len: item.array.len() as u64,
        };
        w.write_all(&descriptor.encode())?;
    }

    // Keys, adjacent and unpadded.
    let mut offset = match layout.key_starts.first() {
        Some(&first) => first,
        None => layout.file_size,
    };
    for item in items.iter() {
        w.write_all(&item.key)?;
        offset += item.key.len() as u64;
    }

    // Arrays, each preceded by at most 7 zero pad bytes.
    const PAD: [u8; 8] = [0; 8];
    for (i, item) in items.iter().enumerate() {
        let padding = layout.array_starts[i] - offset;
        w.write_all(&PAD[..padding as usize])?;
        w.write_all(item.array.as_bytes())?;
        offset = layout.array_starts[i] + item.array.byte_len() as u64;
    }

    w.flush()?;
    info!(
        "finished writing key-array store: {} items, {} bytes",
        items.len(),
        layout.file_size
    );
    Ok(())
}
