//! Element types and typed array views.
//!
//! A KAS file stores homogeneous numeric arrays. Each array carries one of
//! eight fixed-width element types, identified on disk by a single-byte
//! code. [`ElementType`] is the registry mapping codes to widths;
//! [`ArrayRef`] is the borrowed, typed view used both when inserting arrays
//! into a write-mode store and when reading them back out of the file
//! buffer.

use zerocopy::{FromBytes, IntoBytes};

use crate::error::{Error, Result};

/// Number of recognized element type codes. Codes at or above this value
/// are rejected with [`Error::BadType`].
pub const NUM_ELEMENT_TYPES: u8 = 8;

/// Fixed-width element type of a stored array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Int8 = 0,
    UInt8 = 1,
    Int32 = 2,
    UInt32 = 3,
    Int64 = 4,
    UInt64 = 5,
    Float32 = 6,
    Float64 = 7,
}

impl ElementType {
    /// Width of one element in bytes
    pub fn size(self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
        }
    }

    /// On-disk type code
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Int8 => "int8",
            ElementType::UInt8 => "uint8",
            ElementType::Int32 => "int32",
            ElementType::UInt32 => "uint32",
            ElementType::Int64 => "int64",
            ElementType::UInt64 => "uint64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for ElementType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ElementType::Int8),
            1 => Ok(ElementType::UInt8),
            2 => Ok(ElementType::Int32),
            3 => Ok(ElementType::UInt32),
            4 => Ok(ElementType::Int64),
            5 => Ok(ElementType::UInt64),
            6 => Ok(ElementType::Float32),
            7 => Ok(ElementType::Float64),
            _ => Err(Error::BadType { code: value }),
        }
    }
}

/// Borrowed, typed view of a homogeneous numeric array.
///
/// In write mode the caller hands one of these to `put`; the backing slice
/// must stay alive until the store is closed. In read mode `get` returns
/// one borrowing from the store's file buffer, which the reader guarantees
/// is 8-byte aligned for every array region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrayRef<'a> {
    Int8(&'a [i8]),
    UInt8(&'a [u8]),
    Int32(&'a [i32]),
    UInt32(&'a [u32]),
    Int64(&'a [i64]),
    UInt64(&'a [u64]),
    Float32(&'a [f32]),
    Float64(&'a [f64]),
}

impl<'a> ArrayRef<'a> {
    /// Element type of this view
    pub fn element_type(self) -> ElementType {
        match self {
            ArrayRef::Int8(_) => ElementType::Int8,
            ArrayRef::UInt8(_) => ElementType::UInt8,
            ArrayRef::Int32(_) => ElementType::Int32,
            ArrayRef::UInt32(_) => ElementType::UInt32,
            ArrayRef::Int64(_) => ElementType::Int64,
            ArrayRef::UInt64(_) => ElementType::UInt64,
            ArrayRef::Float32(_) => ElementType::Float32,
            ArrayRef::Float64(_) => ElementType::Float64,
        }
    }

    /// Number of elements
    pub fn len(self) -> usize {
        match self {
            ArrayRef::Int8(s) => s.len(),
            ArrayRef::UInt8(s) => s.len(),
            ArrayRef::Int32(s) => s.len(),
            ArrayRef::UInt32(s) => s.len(),
            ArrayRef::Int64(s) => s.len(),
            ArrayRef::UInt64(s) => s.len(),
            ArrayRef::Float32(s) => s.len(),
            ArrayRef::Float64(s) => s.len(),
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Length of the array region in bytes
    pub fn byte_len(self) -> usize {
        self.len() * self.element_type().size()
    }

    /// Raw bytes of the backing array, as laid out in memory
    pub fn as_bytes(self) -> &'a [u8] {
        match self {
            ArrayRef::Int8(s) => s.as_bytes(),
            ArrayRef::UInt8(s) => s,
            ArrayRef::Int32(s) => s.as_bytes(),
            ArrayRef::UInt32(s) => s.as_bytes(),
            ArrayRef::Int64(s) => s.as_bytes(),
            ArrayRef::UInt64(s) => s.as_bytes(),
            ArrayRef::Float32(s) => s.as_bytes(),
            ArrayRef::Float64(s) => s.as_bytes(),
        }
    }

    /// Reinterprets `bytes` as a typed view.
    ///
    /// `bytes` must be aligned to the element width and an exact multiple of
    /// it; callers are expected to have validated both, so a failed cast is
    /// reported as [`Error::Generic`].
    pub fn from_bytes(ty: ElementType, bytes: &'a [u8]) -> Result<Self> {
        fn cast<T>(bytes: &[u8]) -> Result<&[T]>
        where
            T: FromBytes + zerocopy::Immutable + zerocopy::KnownLayout,
        {
            <[T]>::ref_from_bytes(bytes)
                .map_err(|_| Error::generic("array region failed typed cast after validation"))
        }

        Ok(match ty {
            ElementType::Int8 => ArrayRef::Int8(cast(bytes)?),
            ElementType::UInt8 => ArrayRef::UInt8(bytes),
            ElementType::Int32 => ArrayRef::Int32(cast(bytes)?),
            ElementType::UInt32 => ArrayRef::UInt32(cast(bytes)?),
            ElementType::Int64 => ArrayRef::Int64(cast(bytes)?),
            ElementType::UInt64 => ArrayRef::UInt64(cast(bytes)?),
            ElementType::Float32 => ArrayRef::Float32(cast(bytes)?),
            ElementType::Float64 => ArrayRef::Float64(cast(bytes)?),
        })
    }

    fn type_mismatch(self) -> Error {
        Error::BadType {
            code: self.element_type().code(),
        }
    }

    pub fn as_i8(self) -> Result<&'a [i8]> {
        match self {
            ArrayRef::Int8(s) => Ok(s),
            other => Err(other.type_mismatch()),
        }
    }

    pub fn as_u8(self) -> Result<&'a [u8]> {
        match self {
            ArrayRef::UInt8(s) => Ok(s),
            other => Err(other.type_mismatch()),
        }
    }

    pub fn as_i32(self) -> Result<&'a [i32]> {
        match self {
            ArrayRef::Int32(s) => Ok(s),
            other => Err(other.type_mismatch()),
        }
    }

    pub fn as_u32(self) -> Result<&'a [u32]> {
        match self {
            ArrayRef::UInt32(s) => Ok(s),
            other => Err(other.type_mismatch()),
        }
    }

    pub fn as_i64(self) -> Result<&'a [i64]> {
        match self {
            ArrayRef::Int64(s) => Ok(s),
            other => Err(other.type_mismatch()),
        }
    }

    pub fn as_u64(self) -> Result<&'a [u64]> {
        match self {
            ArrayRef::UInt64(s) => Ok(s),
            other => Err(other.type_mismatch()),
        }
    }

    pub fn as_f32(self) -> Result<&'a [f32]> {
        match self {
            ArrayRef::Float32(s) => Ok(s),
            other => Err(other.type_mismatch()),
        }
    }

    pub fn as_f64(self) -> Result<&'a [f64]> {
        match self {
            ArrayRef::Float64(s) => Ok(s),
            other => Err(other.type_mismatch()),
        }
    }
}

impl<'a> From<&'a [i8]> for ArrayRef<'a> {
    fn from(s: &'a [i8]) -> Self {
        ArrayRef::Int8(s)
    }
}

impl<'a> From<&'a [u8]> for ArrayRef<'a> {
    fn from(s: &'a [u8]) -> Self {
        ArrayRef::UInt8(s)
    }
}

impl<'a> From<&'a [i32]> for ArrayRef<'a> {
    fn from(s: &'a [i32]) -> Self {
        ArrayRef::Int32(s)
    }
}

impl<'a> From<&'a [u32]> for ArrayRef<'a> {
    fn from(s: &'a [u32]) -> Self {
        ArrayRef::UInt32(s)
    }
}

impl<'a> From<&'a [i64]> for ArrayRef<'a> {
    fn from(s: &'a [i64]) -> Self {
        ArrayRef::Int64(s)
    }
}

impl<'a> From<&'a [u64]> for ArrayRef<'a> {
    fn from(s: &'a [u64]) -> Self {
        ArrayRef::UInt64(s)
    }
}

impl<'a> From<&'a [f32]> for ArrayRef<'a> {
    fn from(s: &'a [f32]) -> Self {
        ArrayRef::Float32(s)
    }
}

impl<'a> From<&'a [f64]> for ArrayRef<'a> {
    fn from(s: &'a [f64]) -> Self {
        ArrayRef::Float64(s)
    }
}
