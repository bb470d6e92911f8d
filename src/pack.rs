//! Pack handle: hash table, hash references, shared dictionary cache.
//!
//! A `Pack` ties together the windowed byte source, the object count,
//! and the two lazily loaded dictionaries. Dictionary state is
//! materialized at most once per pack and the outcome is sticky: a
//! load failure is remembered and every later lookup fails with it,
//! since no object indexing into a broken dictionary can be decoded.
//!
//! # On-disk layout read here
//! - bytes 0..12: pack header, opaque to this crate;
//! - bytes 12..12+20*num_objects: the sorted hash table;
//! - then the identity dictionary, then the path dictionary (found only
//!   by loading the identity dictionary and chaining past its end).

use once_cell::sync::OnceCell;

use crate::errors::{DecodeError, DictError};
use crate::limits::DecodeLimits;
use crate::object_id::ObjectId;
use crate::pack_dict::{Dict, DictEntry};
use crate::pack_window::{PackCursor, PackWindows};

/// Pack header bytes preceding the hash table.
pub const PACK_HEADER_BYTES: u64 = 12;

/// Object-offset lookups supplied by the host's pack index.
///
/// Tree copy ranges locate their source object either by hash-table
/// position or by literal hash; both resolve to pack offsets through
/// this trait.
pub trait ObjectOffsets {
    /// Offset of the object whose hash sits at `index` in the hash
    /// table, or `None` when the index is out of range.
    fn nth_object_offset(&self, index: u32) -> Option<u64>;

    /// Offset of the object with the given hash, or `None` when the
    /// hash is not in this pack.
    fn entry_offset(&self, id: &ObjectId) -> Option<u64>;
}

struct LoadedIdentDict {
    dict: Dict,
    /// Offset one past the identity dictionary's compressed stream;
    /// the path dictionary starts here.
    end_offset: u64,
}

/// A handle onto one pack.
///
/// Cheap to share by reference; all decode state it carries is the
/// immutable dictionary cache.
pub struct Pack<W> {
    windows: W,
    num_objects: u32,
    limits: DecodeLimits,
    ident_dict: OnceCell<Result<LoadedIdentDict, DictError>>,
    path_dict: OnceCell<Result<Dict, DictError>>,
}

impl<W: PackWindows> Pack<W> {
    /// Creates a handle with default limits.
    ///
    /// `num_objects` is the hash-table cardinality recorded by the
    /// pack's outer framing; this crate treats the 12-byte header as
    /// opaque and takes the count from the caller.
    #[must_use]
    pub fn new(windows: W, num_objects: u32) -> Self {
        Self::with_limits(windows, num_objects, DecodeLimits::default())
    }

    /// Creates a handle with explicit limits.
    #[must_use]
    pub fn with_limits(windows: W, num_objects: u32, limits: DecodeLimits) -> Self {
        Self {
            windows,
            num_objects,
            limits,
            ident_dict: OnceCell::new(),
            path_dict: OnceCell::new(),
        }
    }

    /// The windowed byte source.
    #[inline]
    pub fn windows(&self) -> &W {
        &self.windows
    }

    /// Hash-table cardinality.
    #[inline]
    #[must_use]
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// The decode limits in effect.
    #[inline]
    #[must_use]
    pub fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    /// Start of the identity dictionary: header plus hash table.
    fn dict_base(&self) -> u64 {
        PACK_HEADER_BYTES + u64::from(self.num_objects) * ObjectId::RAW_LEN as u64
    }

    /// Reads the hash at `index` in the hash table.
    pub fn nth_hash(&self, index: u32) -> Result<ObjectId, DecodeError> {
        if index >= self.num_objects {
            return Err(DecodeError::HashIndexOutOfRange {
                index: u64::from(index),
                num_objects: self.num_objects,
            });
        }
        let offset = PACK_HEADER_BYTES + u64::from(index) * ObjectId::RAW_LEN as u64;
        let window = self.windows.use_pack(offset)?;
        window
            .get(..ObjectId::RAW_LEN)
            .and_then(ObjectId::try_from_slice)
            .ok_or(DecodeError::Truncated { offset })
    }

    /// Resolves a hash reference at the cursor.
    ///
    /// A zero tag byte is followed by 20 literal hash bytes; otherwise
    /// a varint holds a 1-based index into the hash table.
    pub fn read_hashref(&self, cur: &mut PackCursor<'_, W>) -> Result<ObjectId, DecodeError> {
        if cur.peek_byte()? == 0 {
            let raw = cur.take(1 + ObjectId::RAW_LEN)?;
            ObjectId::try_from_slice(&raw[1..])
                .ok_or(DecodeError::Truncated { offset: cur.offset() })
        } else {
            let index = cur.varint()?;
            if index < 1 || index > u64::from(self.num_objects) {
                return Err(DecodeError::HashIndexOutOfRange {
                    index,
                    num_objects: self.num_objects,
                });
            }
            self.nth_hash((index - 1) as u32)
        }
    }

    /// Advances the cursor past a hash reference without resolving it.
    pub(crate) fn skip_hashref(&self, cur: &mut PackCursor<'_, W>) -> Result<(), DecodeError> {
        if cur.peek_byte()? == 0 {
            cur.take(1 + ObjectId::RAW_LEN)?;
        } else {
            cur.varint()?;
        }
        Ok(())
    }

    fn ident_result(&self) -> &Result<LoadedIdentDict, DictError> {
        self.ident_dict.get_or_init(|| {
            Dict::load(&self.windows, self.dict_base(), self.limits.max_dict_bytes)
                .map(|(dict, end_offset)| LoadedIdentDict { dict, end_offset })
        })
    }

    fn path_result(&self) -> &Result<Dict, DictError> {
        self.path_dict.get_or_init(|| {
            // The path dictionary's offset is only known once the
            // identity dictionary has been loaded (or failed, stickily).
            let ident = self.ident_result().as_ref().map_err(DictError::clone)?;
            Dict::load(&self.windows, ident.end_offset, self.limits.max_dict_bytes)
                .map(|(dict, _)| dict)
        })
    }

    /// The identity dictionary, loading it on first use.
    pub fn ident_dict(&self) -> Result<&Dict, DecodeError> {
        self.ident_result()
            .as_ref()
            .map(|loaded| &loaded.dict)
            .map_err(|err| DecodeError::Dict(err.clone()))
    }

    /// The path dictionary, loading both dictionaries on first use.
    pub fn path_dict(&self) -> Result<&Dict, DecodeError> {
        self.path_result()
            .as_ref()
            .map_err(|err| DecodeError::Dict(err.clone()))
    }

    /// Decodes a varint identity index at the cursor and returns that
    /// identity record.
    pub fn ident_ref(&self, cur: &mut PackCursor<'_, W>) -> Result<DictEntry<'_>, DecodeError> {
        let dict = self.ident_dict()?;
        let index = cur.varint()?;
        let len = dict.len();
        if index >= u64::from(len) {
            return Err(DecodeError::IdentIndexOutOfRange { index, len });
        }
        dict.entry(index as u32)
            .ok_or(DecodeError::IdentIndexOutOfRange { index, len })
    }

    /// Returns the path record at `index`.
    ///
    /// The index arrives already decoded, embedded in a tree-entry
    /// record's tagged varint.
    pub fn path_ref(&self, index: u64) -> Result<DictEntry<'_>, DecodeError> {
        let dict = self.path_dict()?;
        let len = dict.len();
        if index >= u64::from(len) {
            return Err(DecodeError::PathIndexOutOfRange { index, len });
        }
        dict.entry(index as u32)
            .ok_or(DecodeError::PathIndexOutOfRange { index, len })
    }
}
