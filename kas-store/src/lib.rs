//! # KAS Store
//!
//! A single-file, write-once key-array container: short byte-string keys
//! mapped to typed, homogeneous numeric arrays. Files are self-describing
//! and fixed-layout, so a reader can memory-map them and hand out typed
//! array views with no copying and no per-value decoding.
//!
//! ## File layout (v1)
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │ HEADER (64 bytes)                                 │
//! │                                                   │
//! │ magic "\x89KAS\r\n\x1a\n" | version | num_items   │
//! │ file_size | reserved                              │
//! ├───────────────────────────────────────────────────┤
//! │ DESCRIPTOR TABLE (64 bytes per item, key-sorted)  │
//! │                                                   │
//! │ type | key_start | key_len | array_start          │
//! │ array_len | reserved                              │
//! ├───────────────────────────────────────────────────┤
//! │ KEY REGION (keys adjacent, no padding)            │
//! ├───────────────────────────────────────────────────┤
//! │ ARRAY REGION (each array 8-aligned, zero padded)  │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Arrays are always aligned to 8 bytes
//! regardless of element width, so mapped reads may alias the widest
//! supported type.
//!
//! ## Usage
//!
//! ```no_run
//! use kas_store::{Flags, Mode, Store};
//!
//! # fn main() -> kas_store::Result<()> {
//! let counts = vec![1i32, 2, 3];
//! let mut store = Store::open("data.kas", Mode::Write, Flags::default())?;
//! store.put_i32(b"counts", &counts)?;
//! store.close()?;
//!
//! let store = Store::open("data.kas", Mode::Read, Flags::default())?;
//! assert_eq!(store.get_i32(b"counts")?, &[1, 2, 3]);
//! store.close()?;
//! # Ok(())
//! # }
//! ```

pub mod format;
mod pack;
mod reader;
mod store;
mod writer;

pub use kas_core::{ArrayRef, ElementType, Error, Result, NUM_ELEMENT_TYPES};
pub use store::{Flags, Iter, Mode, Store};
