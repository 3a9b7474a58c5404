//! Store lifecycle: open, put, get, close.

use std::fs::File;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use kas_core::error::{Error, Result};
use kas_core::types::ArrayRef;

use crate::pack::compare_keys;
use crate::reader::{open_read, ReadState};
use crate::writer::{write_store, WriteItem};

/// Open mode of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Ingest an existing file and answer lookups
    Read,
    /// Buffer insertions in memory and emit the file on close
    Write,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
        }
    }
}

/// Open-flags word. Only [`Flags::NO_MMAP`] is defined; all other bits
/// are reserved and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(pub u32);

impl Flags {
    /// Force buffered reads even where memory mapping is available.
    pub const NO_MMAP: u32 = 1 << 0;

    pub fn has(&self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u32) {
        self.0 |= flag;
    }
}

#[derive(Debug)]
enum Inner<'a> {
    Write {
        file: File,
        items: Vec<WriteItem<'a>>,
        finished: bool,
    },
    Read {
        // Held so the descriptor stays open for the life of the store;
        // the buffer is what lookups actually touch.
        _file: File,
        state: ReadState,
    },
}

/// A single-file key-array store handle.
///
/// A store is opened in [`Mode::Read`] or [`Mode::Write`] and is done when
/// [`close`](Store::close) consumes it. Write mode buffers every `put` in
/// memory and emits the whole file at close; read mode ingests the whole
/// file at open and answers [`get`](Store::get) from memory afterwards.
///
/// The lifetime parameter tracks the array slices handed to `put`: their
/// backing storage must outlive the store, because the file is written
/// from them only at close time. Read-mode stores do not use it.
///
/// Dropping an unclosed write-mode store flushes best-effort and discards
/// any error; call `close` to observe write failures.
#[derive(Debug)]
pub struct Store<'a> {
    path: PathBuf,
    mode: Mode,
    flags: Flags,
    inner: Inner<'a>,
}

impl<'a> Store<'a> {
    /// Opens `path` in the given mode.
    ///
    /// Write mode creates (or truncates) the file immediately but writes
    /// no bytes until close. Read mode reads and validates the entire
    /// file before returning; with [`Flags::NO_MMAP`] set the file is
    /// copied into an owned buffer instead of memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode, flags: Flags) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = match mode {
            Mode::Write => Inner::Write {
                file: File::create(&path)?,
                items: Vec::new(),
                finished: false,
            },
            Mode::Read => {
                let mut file = File::open(&path)?;
                let state = open_read(&mut file, flags.has(Flags::NO_MMAP))?;
                Inner::Read { _file: file, state }
            }
        };
        Ok(Self {
            path,
            mode,
            flags,
            inner,
        })
    }

    /// Buffers one (key, array) insertion. Write mode only.
    ///
    /// The key bytes are copied; the array stays borrowed and its backing
    /// storage must outlive the store. A rejected `put` (empty key,
    /// duplicate key) leaves the store exactly as it was.
    pub fn put(&mut self, key: &[u8], array: impl Into<ArrayRef<'a>>) -> Result<()> {
        let Inner::Write { items, .. } = &mut self.inner else {
            return Err(Error::BadMode { mode: "read" });
        };
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if items.iter().any(|item| item.key.as_ref() == key) {
            return Err(Error::DuplicateKey {
                key: String::from_utf8_lossy(key).into_owned(),
            });
        }
        items.push(WriteItem {
            key: Bytes::copy_from_slice(key),
            array: array.into(),
        });
        Ok(())
    }

    /// Looks up `key` by binary search over the sorted descriptor table.
    /// Read mode only.
    ///
    /// The returned view borrows from the store's file buffer and is
    /// valid until the store is closed or dropped.
    pub fn get(&self, key: &[u8]) -> Result<ArrayRef<'_>> {
        let (item, buffer) = self.find(key)?.ok_or(Error::KeyNotFound)?;
        ArrayRef::from_bytes(item.ty, item.array_bytes(buffer))
    }

    /// Whether `key` is present. Read mode only.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    fn find(&self, key: &[u8]) -> Result<Option<(&crate::reader::ReadItem, &[u8])>> {
        let state = self.read_state()?;
        let buffer = state.buffer.bytes();
        match state
            .items
            .binary_search_by(|item| compare_keys(item.key(buffer), key))
        {
            Ok(idx) => Ok(Some((&state.items[idx], buffer))),
            Err(_) => Ok(None),
        }
    }

    /// Iterates over `(key, array)` pairs in key order. Read mode only.
    pub fn iter(&self) -> Result<Iter<'_>> {
        let state = self.read_state()?;
        Ok(Iter { state, next: 0 })
    }

    /// Iterates over keys in key order. Read mode only.
    pub fn keys(&self) -> Result<impl Iterator<Item = &[u8]> + '_> {
        let state = self.read_state()?;
        let buffer = state.buffer.bytes();
        Ok(state.items.iter().map(move |item| item.key(buffer)))
    }

    /// Number of items: insertions so far in write mode, descriptor count
    /// in read mode.
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Write { items, .. } => items.len(),
            Inner::Read { state, .. } => state.items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(major, minor)` format version read from disk; `None` in write
    /// mode.
    pub fn file_version(&self) -> Option<(u16, u16)> {
        match &self.inner {
            Inner::Write { .. } => None,
            Inner::Read { state, .. } => Some(state.file_version),
        }
    }

    /// Closes the store.
    ///
    /// In write mode this is where the file is actually produced: items
    /// are sorted, packed, and emitted; the first error encountered is
    /// returned and the partial file must be treated as corrupt. In read
    /// mode the buffer is unmapped or freed and the file handle closed.
    /// Resources are released on every path.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        match &mut self.inner {
            Inner::Write {
                file,
                items,
                finished,
            } => {
                if *finished {
                    return Ok(());
                }
                *finished = true;
                let ret = write_store(file, items);
                items.clear();
                ret
            }
            Inner::Read { .. } => Ok(()),
        }
    }

    fn read_state(&self) -> Result<&ReadState> {
        match &self.inner {
            Inner::Read { state, .. } => Ok(state),
            Inner::Write { .. } => Err(self.bad_mode()),
        }
    }

    fn bad_mode(&self) -> Error {
        Error::BadMode {
            mode: self.mode.name(),
        }
    }

    pub fn put_i8(&mut self, key: &[u8], values: &'a [i8]) -> Result<()> {
        self.put(key, values)
    }

    pub fn put_u8(&mut self, key: &[u8], values: &'a [u8]) -> Result<()> {
        self.put(key, values)
    }

    pub fn put_i32(&mut self, key: &[u8], values: &'a [i32]) -> Result<()> {
        self.put(key, values)
    }

    pub fn put_u32(&mut self, key: &[u8], values: &'a [u32]) -> Result<()> {
        self.put(key, values)
    }

    pub fn put_i64(&mut self, key: &[u8], values: &'a [i64]) -> Result<()> {
        self.put(key, values)
    }

    pub fn put_u64(&mut self, key: &[u8], values: &'a [u64]) -> Result<()> {
        self.put(key, values)
    }

    pub fn put_f32(&mut self, key: &[u8], values: &'a [f32]) -> Result<()> {
        self.put(key, values)
    }

    pub fn put_f64(&mut self, key: &[u8], values: &'a [f64]) -> Result<()> {
        self.put(key, values)
    }

    /// Typed lookup; fails with `BadType` when the stored element type
    /// differs.
    pub fn get_i8(&self, key: &[u8]) -> Result<&[i8]> {
        self.get(key)?.as_i8()
    }

    pub fn get_u8(&self, key: &[u8]) -> Result<&[u8]> {
        self.get(key)?.as_u8()
    }

    pub fn get_i32(&self, key: &[u8]) -> Result<&[i32]> {
        self.get(key)?.as_i32()
    }

    pub fn get_u32(&self, key: &[u8]) -> Result<&[u32]> {
        self.get(key)?.as_u32()
    }

    pub fn get_i64(&self, key: &[u8]) -> Result<&[i64]> {
        self.get(key)?.as_i64()
    }

    pub fn get_u64(&self, key: &[u8]) -> Result<&[u64]> {
        self.get(key)?.as_u64()
    }

    pub fn get_f32(&self, key: &[u8]) -> Result<&[f32]> {
        self.get(key)?.as_f32()
    }

    pub fn get_f64(&self, key: &[u8]) -> Result<&[f64]> {
        self.get(key)?.as_f64()
    }
}

impl Drop for Store<'_> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Iterator over the items of a read-mode store, in key order
pub struct Iter<'s> {
    state: &'s ReadState,
    next: usize,
}

impl<'s> Iterator for Iter<'s> {
    type Item = (&'s [u8], ArrayRef<'s>);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.state.items.get(self.next)?;
        self.next += 1;
        let buffer = self.state.buffer.bytes();
        let key = item.key(buffer);
        // Layout validation proved alignment and size, so the cast holds.
        let array = ArrayRef::from_bytes(item.ty, item.array_bytes(buffer)).ok()?;
        Some((key, array))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.state.items.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}
