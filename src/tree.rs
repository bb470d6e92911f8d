//! Tree reconstruction, including inter-object copy ranges.
//!
//! A v4 tree is a varint entry count followed by records. The low bit
//! of each record's leading varint discriminates:
//!
//! - **inline** (`what & 1 == 0`): `what >> 1` indexes the path
//!   dictionary; a hash reference follows. Emitted as
//!   `<octal mode> <name>\0<20 raw hash bytes>`.
//! - **copy** (`what & 1 == 1`): `what >> 1` is the first entry to
//!   reproduce from another tree object. A second varint carries the
//!   entry count in its high bits and, in its low bit, whether a source
//!   locator follows. The locator is sticky within a frame: later copy
//!   records may omit it to reuse the previous source.
//!
//! Reproducing a sub-range of a referenced tree means re-walking that
//! tree's records while skipping `start` leading entries; skipped
//! inline records still advance the cursor and skipped copy ranges
//! subtract from `start`. The recursion reads at a different pack
//! offset, so the caller's window is re-acquired when it returns.

use crate::errors::DecodeError;
use crate::object_id::ObjectId;
use crate::pack::{ObjectOffsets, Pack};
use crate::pack_window::{PackCursor, PackWindows};

/// Low-4-bit object-type tag for v4 trees.
///
/// Checked when copy-range recursion enters a referenced object; a
/// source that is not a tree is corruption.
pub const TREE_TYPE_TAG: u8 = 9;

/// Reconstructs the tree whose encoded payload starts at `offset`.
///
/// `size` is the declared size of the canonical entry bytes; the result
/// is exactly that long or the decode fails. A tree declaring zero
/// entries reconstructs to an empty buffer and must declare size 0.
pub fn tree_at<W: PackWindows>(
    pack: &Pack<W>,
    offsets: &dyn ObjectOffsets,
    offset: u64,
    size: usize,
) -> Result<Vec<u8>, DecodeError> {
    let mut cur = PackCursor::at(pack.windows(), offset)?;
    let nb_entries = cur.varint()?;

    let mut dec = TreeDecoder {
        pack,
        offsets,
        out: Vec::with_capacity(size),
        declared: size,
    };
    dec.decode_entries(offset, 0, nb_entries, false, 0)?;

    if dec.out.len() != size {
        return Err(DecodeError::SizeMismatch {
            declared: size,
            actual: dec.out.len(),
        });
    }
    Ok(dec.out)
}

struct TreeDecoder<'a, W: PackWindows> {
    pack: &'a Pack<W>,
    offsets: &'a dyn ObjectOffsets,
    out: Vec<u8>,
    declared: usize,
}

impl<'a, W: PackWindows> TreeDecoder<'a, W> {
    /// Re-emits entries `[start, start + count)` of the tree whose
    /// records begin at `offset`.
    ///
    /// `parse_header` is false only on the outermost call, where the
    /// caller already sits past the object header; recursive calls land
    /// on a referenced object's header and must skip and type-check it.
    fn decode_entries(
        &mut self,
        offset: u64,
        mut start: u64,
        mut count: u64,
        parse_header: bool,
        depth: u32,
    ) -> Result<(), DecodeError> {
        let pack = self.pack;
        let max_depth = pack.limits().max_copy_depth;
        if depth > max_depth {
            return Err(DecodeError::CopyDepthExceeded { max: max_depth });
        }

        let mut cur = PackCursor::at(pack.windows(), offset)?;
        if parse_header {
            self.skip_object_header(&mut cur)?;
        }

        let nb_entries = cur.varint()?;
        if start > nb_entries || count > nb_entries - start {
            return Err(DecodeError::EntryRangeOutOfBounds {
                start,
                count,
                nb_entries,
            });
        }

        // The copy source survives across copy records within this
        // frame only; recursion frames get their own.
        let mut copy_source: Option<u64> = None;

        while count > 0 {
            let what = cur.varint()?;

            if what & 1 == 0 {
                if start > 0 {
                    // Entry lies in the skip region. The hash reference
                    // still has to be walked past.
                    pack.skip_hashref(&mut cur)?;
                    start -= 1;
                } else {
                    self.emit_entry(what >> 1, &mut cur)?;
                    count -= 1;
                }
            } else {
                let copy_start = what >> 1;
                let raw_count = cur.varint()?;
                if raw_count == 0 {
                    return Err(DecodeError::ZeroCopyCount);
                }
                if raw_count & 1 != 0 {
                    copy_source = Some(self.read_copy_source(&mut cur)?);
                }
                let source = copy_source.ok_or(DecodeError::MissingCopySource)?;
                let copy_count = raw_count >> 1;

                if start >= copy_count {
                    // The whole range lies in the skip region.
                    start -= copy_count;
                } else {
                    let effective_start = copy_start.saturating_add(start);
                    let effective_count = (copy_count - start).min(count);
                    start = 0;
                    count -= effective_count;
                    self.decode_entries(source, effective_start, effective_count, true, depth + 1)?;
                    // The recursion read the pack elsewhere; the stale
                    // window must be re-acquired at the current offset.
                    cur.refresh()?;
                }
            }
        }

        Ok(())
    }

    /// Skips a referenced object's header varint and checks its type
    /// tag.
    ///
    /// The header is a continuation-bit varint; the terminating byte
    /// (high bit clear) carries the type tag in its low 4 bits.
    fn skip_object_header(&self, cur: &mut PackCursor<'_, W>) -> Result<(), DecodeError> {
        let max = self.pack.limits().max_header_bytes;
        let mut read = 0usize;
        loop {
            let byte = cur.take(1)?[0];
            read += 1;
            if byte & 0x80 == 0 {
                let tag = byte & 0x0f;
                if tag != TREE_TYPE_TAG {
                    return Err(DecodeError::BadObjectType { tag });
                }
                return Ok(());
            }
            if read >= max {
                return Err(DecodeError::HeaderTooLong { max });
            }
        }
    }

    /// Reads a copy record's source locator and resolves it to a pack
    /// offset.
    ///
    /// A zero varint means a literal 20-byte hash follows, resolved
    /// through the host's hash lookup; otherwise the varint is a
    /// 1-based hash-table index.
    fn read_copy_source(&self, cur: &mut PackCursor<'_, W>) -> Result<u64, DecodeError> {
        let index = cur.varint()?;
        if index == 0 {
            let raw = cur.take(ObjectId::RAW_LEN)?;
            let id = ObjectId::try_from_slice(raw).ok_or(DecodeError::Truncated {
                offset: cur.offset(),
            })?;
            self.offsets
                .entry_offset(&id)
                .ok_or(DecodeError::UnknownCopySource)
        } else {
            u32::try_from(index - 1)
                .ok()
                .and_then(|i| self.offsets.nth_object_offset(i))
                .ok_or(DecodeError::UnknownCopySource)
        }
    }

    /// Resolves and emits one inline entry:
    /// `<octal mode> <name>\0<20 raw hash bytes>`.
    fn emit_entry(
        &mut self,
        path_index: u64,
        cur: &mut PackCursor<'_, W>,
    ) -> Result<(), DecodeError> {
        let pack = self.pack;
        let path = pack.path_ref(path_index)?;
        let id = pack.read_hashref(cur)?;

        let mode = u16::from_be_bytes(path.prefix);
        let head = format!("{mode:o} ");
        let needed = head.len() + path.text.len() + 1 + ObjectId::RAW_LEN;
        if self.out.len() + needed > self.declared {
            return Err(DecodeError::OutputOverflow {
                declared: self.declared,
            });
        }
        self.out.extend_from_slice(head.as_bytes());
        self.out.extend_from_slice(path.text);
        self.out.push(0);
        self.out.extend_from_slice(id.as_slice());
        Ok(())
    }
}
