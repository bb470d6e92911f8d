//! Shared string dictionaries.
//!
//! A pack carries two dictionaries, stored back to back after the hash
//! table: identity strings (author/committer lines) and path strings
//! (tree entry names). Each is framed as a varint giving the inflated
//! size followed by a zlib stream, and inflates to a run of records:
//! 2 prefix bytes, then a NUL-terminated string. The prefix meaning is
//! the consumer's business (a big-endian timezone for identities, the
//! big-endian file mode for paths); the dictionary carries it opaquely.
//!
//! The records must cover the inflated buffer exactly; any leftover or
//! overrun is corruption. Loading walks the buffer twice, once to count
//! records and once to index their offsets, and reports the offset one
//! past the compressed stream so the next dictionary can be found.

use memchr::memchr;

use crate::errors::DictError;
use crate::pack_inflate::inflate_exact_at;
use crate::pack_window::PackWindows;
use crate::varint::decode_varint;

/// An inflated, indexed string dictionary.
#[derive(Debug)]
pub struct Dict {
    data: Box<[u8]>,
    offsets: Box<[u32]>,
}

/// One dictionary record: 2 prefix bytes and the string that follows.
///
/// `text` excludes the terminating NUL. The slice borrows the
/// dictionary's buffer and lives as long as the pack handle holding it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DictEntry<'a> {
    /// Domain-specific prefix bytes (timezone or file mode, big-endian).
    pub prefix: [u8; 2],
    /// Record string without its NUL terminator.
    pub text: &'a [u8],
}

impl Dict {
    /// Loads the dictionary framed at `offset`.
    ///
    /// Returns the dictionary and the offset one past its compressed
    /// stream; the identity and path dictionaries chain through that
    /// value.
    ///
    /// # Errors
    /// - [`DictError::SizeTooSmall`] for declared sizes below 3 (one
    ///   empty-string record is 2 prefix bytes plus a NUL).
    /// - [`DictError::TooLarge`] if the declared size exceeds
    ///   `max_bytes`, itself bounded by the reach of the 32-bit record
    ///   index.
    /// - [`DictError::Inflate`] if the stream does not produce exactly
    ///   the declared size with a stream-end marker.
    /// - [`DictError::RecordMismatch`] if the records do not sum to the
    ///   declared size.
    pub fn load<W: PackWindows + ?Sized>(
        windows: &W,
        offset: u64,
        max_bytes: usize,
    ) -> Result<(Self, u64), DictError> {
        let src = windows.use_pack(offset)?;
        let (size, varint_len) =
            decode_varint(src).ok_or(DictError::BadSizeVarint { offset })?;
        if size < 3 {
            return Err(DictError::SizeTooSmall { size });
        }
        // Record offsets index the buffer with u32, so the effective
        // cap never exceeds that range no matter how high the
        // configured limit is raised.
        let max_bytes = max_bytes.min(u32::MAX as usize);
        if size > max_bytes as u64 {
            return Err(DictError::TooLarge {
                size,
                max: max_bytes,
            });
        }

        let (data, end_offset) =
            inflate_exact_at(windows, offset + varint_len as u64, size as usize)?;

        let count = walk_records(&data, |_| {})?;
        let mut offsets = Vec::with_capacity(count);
        walk_records(&data, |record_start| offsets.push(record_start as u32))?;

        Ok((
            Self {
                data: data.into_boxed_slice(),
                offsets: offsets.into_boxed_slice(),
            },
            end_offset,
        ))
    }

    /// Number of records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> u32 {
        self.offsets.len() as u32
    }

    /// Returns true if the dictionary holds no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Returns the record at `index`, or `None` when out of range.
    ///
    /// Lookups are pure: the same index always yields the same bytes.
    #[must_use]
    pub fn entry(&self, index: u32) -> Option<DictEntry<'_>> {
        let start = *self.offsets.get(index as usize)? as usize;
        let text_start = start + 2;
        let text_len = memchr(0, &self.data[text_start..])?;
        Some(DictEntry {
            prefix: [self.data[start], self.data[start + 1]],
            text: &self.data[text_start..text_start + text_len],
        })
    }
}

/// Walks the record run covering `data`, invoking `visit` with each
/// record's starting offset.
///
/// Returns the record count, or an error if a record overruns the
/// buffer or the run does not end exactly at its end.
fn walk_records(
    data: &[u8],
    mut visit: impl FnMut(usize),
) -> Result<usize, DictError> {
    let mut pos = 0usize;
    let mut count = 0usize;
    while pos < data.len() {
        let text_start = pos + 2;
        if text_start >= data.len() {
            return Err(DictError::RecordMismatch { size: data.len() });
        }
        let text_len = memchr(0, &data[text_start..])
            .ok_or(DictError::RecordMismatch { size: data.len() })?;
        visit(pos);
        pos = text_start + text_len + 1;
        count += 1;
    }
    Ok(count)
}
