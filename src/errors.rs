//! Error types for pack-v4 decoding stages.
//!
//! Errors are stage-specific: window acquisition, dictionary loading,
//! and per-object decoding each have their own taxonomy rather than one
//! monolithic enum. All enums are `#[non_exhaustive]` so variants can be
//! added without breaking callers.
//!
//! The bands matter to callers:
//! - [`DictError`] is sticky per pack: once a shared dictionary fails to
//!   load, every object needing it fails the same way.
//! - [`DecodeError`] is per object: the pack handle stays usable for
//!   other objects.

use std::fmt;

use crate::pack_inflate::InflateError;

/// Errors from pack window acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum WindowError {
    /// The requested offset is at or past the end of the pack.
    OffsetOutOfRange { offset: u64, len: u64 },
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OffsetOutOfRange { offset, len } => {
                write!(f, "pack offset {offset} out of range (pack is {len} bytes)")
            }
        }
    }
}

impl std::error::Error for WindowError {}

/// Errors from shared dictionary loading.
///
/// These are cached on the pack handle: a failed load is remembered and
/// returned for every later lookup, matching the at-most-one
/// construction rule.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DictError {
    /// Window acquisition failed while reading the dictionary.
    Window(WindowError),
    /// The size varint at the dictionary start is truncated or overlong.
    BadSizeVarint { offset: u64 },
    /// The declared size cannot hold even one empty record.
    SizeTooSmall { size: u64 },
    /// The declared size exceeds the configured cap.
    TooLarge { size: u64, max: usize },
    /// The compressed payload did not inflate to the declared size.
    Inflate(InflateError),
    /// The records do not cover the inflated buffer exactly.
    RecordMismatch { size: usize },
}

impl fmt::Display for DictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window(err) => write!(f, "{err}"),
            Self::BadSizeVarint { offset } => {
                write!(f, "bad dictionary size varint at offset {offset}")
            }
            Self::SizeTooSmall { size } => write!(f, "bad dictionary size {size}"),
            Self::TooLarge { size, max } => {
                write!(f, "dictionary size {size} exceeds cap {max}")
            }
            Self::Inflate(err) => write!(f, "{err}"),
            Self::RecordMismatch { size } => {
                write!(f, "dictionary records do not sum to {size} bytes")
            }
        }
    }
}

impl std::error::Error for DictError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Window(err) => Some(err),
            Self::Inflate(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WindowError> for DictError {
    fn from(err: WindowError) -> Self {
        Self::Window(err)
    }
}

impl From<InflateError> for DictError {
    fn from(err: InflateError) -> Self {
        Self::Inflate(err)
    }
}

/// Errors from decoding a single object.
///
/// Any of these frees the partial output and leaves the pack handle
/// usable for other objects. None are retried.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// Window acquisition failed mid-stream.
    Window(WindowError),
    /// A shared dictionary could not be loaded.
    Dict(DictError),
    /// Zlib inflation of an object payload failed.
    Inflate(InflateError),
    /// A varint is truncated or does not fit in 64 bits.
    BadVarint { offset: u64 },
    /// Fewer bytes remain than a fixed-size read requires.
    Truncated { offset: u64 },
    /// A hash reference index or hash-table position is out of range.
    HashIndexOutOfRange { index: u64, num_objects: u32 },
    /// An identity dictionary index is out of range.
    IdentIndexOutOfRange { index: u64, len: u32 },
    /// A path dictionary index is out of range.
    PathIndexOutOfRange { index: u64, len: u32 },
    /// A copy-range source is not a tree object.
    BadObjectType { tag: u8 },
    /// An object header exceeded the configured byte cap.
    HeaderTooLong { max: usize },
    /// A requested entry range does not fit the source tree.
    EntryRangeOutOfBounds { start: u64, count: u64, nb_entries: u64 },
    /// A copy record declared a zero-length range.
    ZeroCopyCount,
    /// The first copy record of a frame omitted its source object.
    MissingCopySource,
    /// A copy-source locator resolved to no object in this pack.
    UnknownCopySource,
    /// Copy-range recursion exceeded the configured depth cap.
    CopyDepthExceeded { max: u32 },
    /// The author time delta moved the commit time outside `u64`.
    TimestampOverflow,
    /// Reconstruction would exceed the declared object size.
    OutputOverflow { declared: usize },
    /// Reconstruction ended short of the declared object size.
    SizeMismatch { declared: usize, actual: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window(err) => write!(f, "{err}"),
            Self::Dict(err) => write!(f, "{err}"),
            Self::Inflate(err) => write!(f, "{err}"),
            Self::BadVarint { offset } => write!(f, "bad varint at offset {offset}"),
            Self::Truncated { offset } => write!(f, "truncated pack data at offset {offset}"),
            Self::HashIndexOutOfRange { index, num_objects } => {
                write!(f, "hash index {index} out of range ({num_objects} objects)")
            }
            Self::IdentIndexOutOfRange { index, len } => {
                write!(f, "identity index {index} out of range ({len} entries)")
            }
            Self::PathIndexOutOfRange { index, len } => {
                write!(f, "path index {index} out of range ({len} entries)")
            }
            Self::BadObjectType { tag } => write!(f, "object type tag {tag} is not a tree"),
            Self::HeaderTooLong { max } => {
                write!(f, "object header exceeded {max} bytes")
            }
            Self::EntryRangeOutOfBounds {
                start,
                count,
                nb_entries,
            } => write!(
                f,
                "entry range {start}+{count} out of bounds for tree of {nb_entries}"
            ),
            Self::ZeroCopyCount => write!(f, "copy record with zero count"),
            Self::MissingCopySource => {
                write!(f, "copy record reuses a source before any was given")
            }
            Self::UnknownCopySource => write!(f, "copy source not found in pack"),
            Self::CopyDepthExceeded { max } => {
                write!(f, "copy recursion deeper than {max}")
            }
            Self::TimestampOverflow => write!(f, "author time delta out of range"),
            Self::OutputOverflow { declared } => {
                write!(f, "reconstruction exceeds declared size {declared}")
            }
            Self::SizeMismatch { declared, actual } => {
                write!(
                    f,
                    "reconstructed {actual} bytes, declared size is {declared}"
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Window(err) => Some(err),
            Self::Dict(err) => Some(err),
            Self::Inflate(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WindowError> for DecodeError {
    fn from(err: WindowError) -> Self {
        Self::Window(err)
    }
}

impl From<DictError> for DecodeError {
    fn from(err: DictError) -> Self {
        Self::Dict(err)
    }
}

impl From<InflateError> for DecodeError {
    fn from(err: InflateError) -> Self {
        Self::Inflate(err)
    }
}
