//! KAS binary format constants and the header/descriptor codecs.
//!
//! Both records are fixed 64-byte blocks. All integers are little-endian;
//! reserved regions are zeroed on write and ignored on read so that future
//! minor versions can add fields without breaking old readers.
//!
//! ```text
//! Header (offset 0):
//! [magic: 8B "\x89KAS\r\n\x1a\n"][version_major: u16][version_minor: u16]
//! [num_items: u32][file_size: u64][reserved: 40B]
//!
//! Descriptor (64 + 64*i):
//! [type: u8][reserved: 7B][key_start: u64][key_len: u64]
//! [array_start: u64][array_len: u64][reserved: 24B]
//! ```

use byteorder::{ByteOrder, LittleEndian};

use kas_core::error::{Error, Result};
use kas_core::types::ElementType;

/// Magic bytes identifying a KAS file. Same shape as the PNG signature:
/// a high-bit byte to catch 7-bit channels, the format tag, a CRLF/LF pair
/// to catch line-ending translation, and a DOS EOF byte.
pub const MAGIC: &[u8; 8] = b"\x89KAS\r\n\x1a\n";

/// Size of the file header in bytes
pub const HEADER_SIZE: usize = 64;

/// Size of one item descriptor in bytes
pub const DESCRIPTOR_SIZE: usize = 64;

/// Array regions are aligned to this many bytes, regardless of element
/// width, so mapped reads may alias any supported element type.
pub const ARRAY_ALIGN: u64 = 8;

/// File format version written by this library. The major component must
/// match exactly on read; the minor component is informational.
pub const FILE_VERSION_MAJOR: u16 = 1;
pub const FILE_VERSION_MINOR: u16 = 0;

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version_major: u16,
    pub version_minor: u16,
    pub num_items: u32,
    pub file_size: u64,
}

impl Header {
    /// Header for a freshly packed file at the current format version
    pub fn new(num_items: u32, file_size: u64) -> Self {
        Self {
            version_major: FILE_VERSION_MAJOR,
            version_minor: FILE_VERSION_MINOR,
            num_items,
            file_size,
        }
    }

    /// Encodes the header into its 64-byte on-disk form
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(MAGIC);
        LittleEndian::write_u16(&mut buf[8..10], self.version_major);
        LittleEndian::write_u16(&mut buf[10..12], self.version_minor);
        LittleEndian::write_u32(&mut buf[12..16], self.num_items);
        LittleEndian::write_u64(&mut buf[16..24], self.file_size);
        // Bytes 24..64 are reserved and stay zero
        buf
    }

    /// Decodes and validates a header.
    ///
    /// # Validation
    ///
    /// - At least [`HEADER_SIZE`] bytes must be available
    /// - The magic must match exactly
    /// - `version_major` must equal [`FILE_VERSION_MAJOR`]
    /// - `file_size` must cover at least the header itself
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::bad_format(format!(
                "file too short for header: {} < {} bytes",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        if &bytes[0..8] != MAGIC {
            return Err(Error::bad_format("bad magic bytes"));
        }
        let version_major = LittleEndian::read_u16(&bytes[8..10]);
        let version_minor = LittleEndian::read_u16(&bytes[10..12]);
        let num_items = LittleEndian::read_u32(&bytes[12..16]);
        let file_size = LittleEndian::read_u64(&bytes[16..24]);

        if version_major < FILE_VERSION_MAJOR {
            return Err(Error::VersionTooOld {
                file: version_major,
                library: FILE_VERSION_MAJOR,
            });
        }
        if version_major > FILE_VERSION_MAJOR {
            return Err(Error::VersionTooNew {
                file: version_major,
                library: FILE_VERSION_MAJOR,
            });
        }
        if file_size < HEADER_SIZE as u64 {
            return Err(Error::bad_format(format!(
                "header file_size {} smaller than the header itself",
                file_size
            )));
        }

        Ok(Self {
            version_major,
            version_minor,
            num_items,
            file_size,
        })
    }
}

/// Decoded item descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub ty: ElementType,
    pub key_start: u64,
    pub key_len: u64,
    pub array_start: u64,
    pub array_len: u64,
}

impl Descriptor {
    /// Encodes the descriptor into its 64-byte on-disk form
    pub fn encode(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[0] = self.ty.code();
        // Bytes 1..8 are reserved
        LittleEndian::write_u64(&mut buf[8..16], self.key_start);
        LittleEndian::write_u64(&mut buf[16..24], self.key_len);
        LittleEndian::write_u64(&mut buf[24..32], self.array_start);
        LittleEndian::write_u64(&mut buf[32..40], self.array_len);
        // Bytes 40..64 are reserved
        buf
    }

    /// Decodes one descriptor record.
    ///
    /// The type code is validated here; offset and length fields are
    /// bounds-checked against the file by the reader, which knows the
    /// total file size.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DESCRIPTOR_SIZE {
            return Err(Error::bad_format(format!(
                "file too short for descriptor: {} < {} bytes",
                bytes.len(),
                DESCRIPTOR_SIZE
            )));
        }
        let ty = ElementType::try_from(bytes[0])?;
        Ok(Self {
            ty,
            key_start: LittleEndian::read_u64(&bytes[8..16]),
            key_len: LittleEndian::read_u64(&bytes[16..24]),
            array_start: LittleEndian::read_u64(&bytes[24..32]),
            array_len: LittleEndian::read_u64(&bytes[32..40]),
        })
    }

    /// Length of the array region in bytes, or `None` on overflow
    pub fn array_byte_len(&self) -> Option<u64> {
        self.array_len.checked_mul(self.ty.size() as u64)
    }
}
