//! Commit reconstruction.
//!
//! A v4 commit stores its header structurally (a tree hash reference,
//! parent hash references, the commit time, identity-dictionary
//! references, and an author-time delta) followed by the free-form
//! message as a deflate stream. Reconstruction re-synthesizes the
//! canonical text:
//!
//! ```text
//! tree <hex>
//! parent <hex>        (zero or more)
//! author <ident> <epoch> <tz>
//! committer <ident> <epoch> <tz>
//! <message>
//! ```
//!
//! The committer is encoded before the author but emitted after it.
//! The declared size is a contract: every header emit is checked
//! against it and the message inflate must fill the remainder exactly.

use crate::errors::DecodeError;
use crate::pack::Pack;
use crate::pack_dict::DictEntry;
use crate::pack_inflate::inflate_exact_at;
use crate::pack_window::{PackCursor, PackWindows};

/// Reconstructs the commit whose encoded payload starts at `offset`.
///
/// `size` is the declared size of the canonical text; the result is
/// exactly that long or the decode fails.
pub fn commit_at<W: PackWindows>(
    pack: &Pack<W>,
    offset: u64,
    size: usize,
) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(size);
    let mut cur = PackCursor::at(pack.windows(), offset)?;

    let tree = pack.read_hashref(&mut cur)?;
    emit(&mut out, size, format!("tree {tree}\n").as_bytes())?;

    let mut nb_parents = cur.varint()?;
    while nb_parents > 0 {
        let parent = pack.read_hashref(&mut cur)?;
        emit(&mut out, size, format!("parent {parent}\n").as_bytes())?;
        nb_parents -= 1;
    }

    let commit_time = cur.varint()?;
    let committer = pack.ident_ref(&mut cur)?;

    // The author time is a delta off the commit time; the low bit says
    // which side of it (1 = later).
    let author_delta = cur.varint()?;
    let author = pack.ident_ref(&mut cur)?;
    let half = author_delta >> 1;
    let author_time = if author_delta & 1 != 0 {
        commit_time.checked_add(half)
    } else {
        commit_time.checked_sub(half)
    }
    .ok_or(DecodeError::TimestampOverflow)?;

    emit_ident_line(&mut out, size, b"author", &author, author_time)?;
    emit_ident_line(&mut out, size, b"committer", &committer, commit_time)?;

    let remaining = size - out.len();
    let (message, _end) = inflate_exact_at(pack.windows(), cur.offset(), remaining)?;
    out.extend_from_slice(&message);

    Ok(out)
}

fn emit(out: &mut Vec<u8>, declared: usize, bytes: &[u8]) -> Result<(), DecodeError> {
    if out.len() + bytes.len() > declared {
        return Err(DecodeError::OutputOverflow { declared });
    }
    out.extend_from_slice(bytes);
    Ok(())
}

/// Emits `<keyword> <ident> <epoch> <tz>\n`.
///
/// The identity record's 2 prefix bytes are the big-endian signed
/// timezone offset, rendered as a sign and four zero-padded digits.
fn emit_ident_line(
    out: &mut Vec<u8>,
    declared: usize,
    keyword: &[u8],
    ident: &DictEntry<'_>,
    time: u64,
) -> Result<(), DecodeError> {
    let tz = i16::from_be_bytes(ident.prefix);
    let mut line = Vec::with_capacity(keyword.len() + ident.text.len() + 32);
    line.extend_from_slice(keyword);
    line.push(b' ');
    line.extend_from_slice(ident.text);
    line.push(b' ');
    line.extend_from_slice(time.to_string().as_bytes());
    line.push(b' ');
    line.extend_from_slice(format!("{tz:+05}").as_bytes());
    line.push(b'\n');
    emit(out, declared, &line)
}
