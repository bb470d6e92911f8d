//! Pack byte windows and the forward cursor over them.
//!
//! A window is a contiguous borrow of pack bytes starting at a
//! requested offset. It may be shorter than the remainder of the pack;
//! readers must be prepared to re-acquire at their current offset when
//! a window runs out. Release is simply the end of the borrow.
//!
//! [`PackCursor`] is the reader built on that: an absolute offset plus
//! a window it re-materializes on demand. Holding the cursor's state as
//! an offset (rather than a raw pointer into a window) is what lets the
//! tree decoder recurse into another object and resume afterwards.
//!
//! # Window Contract
//! A window starting at `offset` must span at least [`MIN_WINDOW_BYTES`]
//! bytes or reach the end of the pack, whichever comes first, and is
//! never empty. Requests at or past the pack end fail.

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;

use crate::errors::{DecodeError, WindowError};
use crate::varint::decode_varint;

/// Minimum span a window must provide when not cut short by the pack
/// end. Large enough for the longest fixed-size read (a 21-byte inline
/// hash reference) and any varint.
pub const MIN_WINDOW_BYTES: usize = 32;

/// Windowed read access to a pack's bytes.
pub trait PackWindows {
    /// Acquires a readable window starting at `offset`.
    ///
    /// The returned slice may be shorter than the remainder of the pack
    /// but honors the module-level window contract.
    fn use_pack(&self, offset: u64) -> Result<&[u8], WindowError>;

    /// Total pack length in bytes.
    fn pack_len(&self) -> u64;
}

/// Memory-mapped pack file.
///
/// The whole file is mapped once; every window is a slice of the map.
pub struct MmapWindows {
    map: Mmap,
}

impl MmapWindows {
    /// Opens and maps a pack file.
    ///
    /// The pack file must not be mutated for the life of the handle.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        // Safety: pack files are immutable once written; the map is
        // read-only.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }
}

impl PackWindows for MmapWindows {
    fn use_pack(&self, offset: u64) -> Result<&[u8], WindowError> {
        window_from(&self.map, offset, usize::MAX)
    }

    fn pack_len(&self) -> u64 {
        self.map.len() as u64
    }
}

/// In-memory pack bytes with a configurable window length.
///
/// The window cap exists to exercise window re-acquisition in tests;
/// production callers normally use [`MmapWindows`].
pub struct SliceWindows {
    data: Vec<u8>,
    window_len: usize,
}

impl SliceWindows {
    /// Wraps pack bytes with unbounded windows.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            window_len: usize::MAX,
        }
    }

    /// Wraps pack bytes with windows capped at `window_len` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `window_len` is below [`MIN_WINDOW_BYTES`]; shorter
    /// windows would violate the window contract.
    #[must_use]
    pub fn with_window_len(data: Vec<u8>, window_len: usize) -> Self {
        assert!(
            window_len >= MIN_WINDOW_BYTES,
            "window_len must be at least MIN_WINDOW_BYTES"
        );
        Self { data, window_len }
    }
}

impl PackWindows for SliceWindows {
    fn use_pack(&self, offset: u64) -> Result<&[u8], WindowError> {
        window_from(&self.data, offset, self.window_len)
    }

    fn pack_len(&self) -> u64 {
        self.data.len() as u64
    }
}

fn window_from(data: &[u8], offset: u64, cap: usize) -> Result<&[u8], WindowError> {
    let len = data.len() as u64;
    if offset >= len {
        return Err(WindowError::OffsetOutOfRange { offset, len });
    }
    let start = offset as usize;
    let end = start.saturating_add(cap).min(data.len());
    Ok(&data[start..end])
}

/// A forward reader over pack bytes.
///
/// The cursor tracks an absolute pack offset and a current window; when
/// a read outruns the window it re-acquires one at the current offset.
/// Reads return slices borrowed from the window source, valid for the
/// source's lifetime.
pub struct PackCursor<'p, W: PackWindows + ?Sized> {
    windows: &'p W,
    buf: &'p [u8],
    base: u64,
    pos: usize,
}

impl<'p, W: PackWindows + ?Sized> PackCursor<'p, W> {
    /// Positions a cursor at `offset`.
    pub fn at(windows: &'p W, offset: u64) -> Result<Self, DecodeError> {
        let buf = windows.use_pack(offset)?;
        Ok(Self {
            windows,
            buf,
            base: offset,
            pos: 0,
        })
    }

    /// Current absolute offset in the pack.
    #[inline]
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Discards the current window and re-acquires one at the current
    /// offset.
    ///
    /// Required after any operation that read the pack at a different
    /// offset, such as copy-range recursion.
    pub fn refresh(&mut self) -> Result<(), DecodeError> {
        let offset = self.offset();
        self.buf = self.windows.use_pack(offset)?;
        self.base = offset;
        self.pos = 0;
        Ok(())
    }

    #[inline]
    fn remaining(&self) -> &'p [u8] {
        &self.buf[self.pos..]
    }

    /// Reads the next byte without consuming it.
    pub fn peek_byte(&mut self) -> Result<u8, DecodeError> {
        if self.remaining().is_empty() {
            self.refresh()?;
        }
        Ok(self.buf[self.pos])
    }

    /// Consumes and returns the next `n` bytes.
    ///
    /// Re-acquires the window if fewer than `n` bytes remain in it; the
    /// window contract makes that sufficient for any fixed-size read up
    /// to [`MIN_WINDOW_BYTES`].
    pub fn take(&mut self, n: usize) -> Result<&'p [u8], DecodeError> {
        if self.remaining().len() < n {
            self.refresh()?;
            if self.buf.len() < n {
                return Err(DecodeError::Truncated { offset: self.base });
            }
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    /// Decodes an offset varint at the cursor.
    pub fn varint(&mut self) -> Result<u64, DecodeError> {
        if let Some((value, len)) = decode_varint(self.remaining()) {
            self.pos += len;
            return Ok(value);
        }
        // The window may have ended mid-sequence; retry on a fresh one.
        let offset = self.offset();
        self.refresh()?;
        match decode_varint(self.remaining()) {
            Some((value, len)) => {
                self.pos += len;
                Ok(value)
            }
            None => Err(DecodeError::BadVarint { offset }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::varint::encode_varint;

    #[test]
    fn windows_are_capped_and_bounded() {
        let source = SliceWindows::with_window_len((0u8..100).collect(), 32);
        let w = source.use_pack(0).unwrap();
        assert_eq!(w.len(), 32);
        assert_eq!(w[0], 0);

        let w = source.use_pack(90).unwrap();
        assert_eq!(w.len(), 10);
        assert_eq!(w[0], 90);

        assert!(matches!(
            source.use_pack(100),
            Err(WindowError::OffsetOutOfRange { offset: 100, .. })
        ));
    }

    #[test]
    fn take_crosses_window_boundary() {
        let source = SliceWindows::with_window_len((0u8..200).collect(), 32);
        let mut cur = PackCursor::at(&source, 0).unwrap();
        // Consume most of the first window, then read past its end.
        assert_eq!(cur.take(30).unwrap().len(), 30);
        let bytes = cur.take(21).unwrap();
        assert_eq!(bytes[0], 30);
        assert_eq!(bytes[20], 50);
        assert_eq!(cur.offset(), 51);
    }

    #[test]
    fn take_past_end_is_truncated() {
        let source = SliceWindows::new(vec![0u8; 40]);
        let mut cur = PackCursor::at(&source, 30).unwrap();
        assert!(matches!(
            cur.take(11),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn varint_crosses_window_boundary() {
        let mut data = vec![0u8; 31];
        encode_varint(1 << 20, &mut data);
        data.extend_from_slice(&[0xaa; 32]);
        let source = SliceWindows::with_window_len(data, 32);
        let mut cur = PackCursor::at(&source, 0).unwrap();
        cur.take(31).unwrap();
        assert_eq!(cur.varint().unwrap(), 1 << 20);
    }

    #[test]
    fn varint_truncated_at_pack_end() {
        let mut data = vec![0u8; 32];
        data.push(0xff); // continuation with nothing after it
        let source = SliceWindows::new(data);
        let mut cur = PackCursor::at(&source, 32).unwrap();
        assert!(matches!(
            cur.varint(),
            Err(DecodeError::BadVarint { offset: 32 })
        ));
    }

    #[test]
    fn refresh_keeps_absolute_position() {
        let source = SliceWindows::with_window_len((0u8..100).collect(), 32);
        let mut cur = PackCursor::at(&source, 0).unwrap();
        cur.take(10).unwrap();
        cur.refresh().unwrap();
        assert_eq!(cur.offset(), 10);
        assert_eq!(cur.peek_byte().unwrap(), 10);
    }

    #[test]
    fn mmap_windows_read_back_file_bytes() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 64]).unwrap();
        file.flush().unwrap();

        let windows = MmapWindows::open(file.path()).unwrap();
        assert_eq!(windows.pack_len(), 64);
        let w = windows.use_pack(60).unwrap();
        assert_eq!(w, &[7u8; 4]);
    }
}
