//! Reader for the experimental pack-v4 content-addressed object format.
//!
//! A v4 pack concatenates compressed objects behind a sorted hash table
//! and two shared string dictionaries (identities and paths). Objects
//! reference hashes either inline or through the hash table, and
//! reference strings through the dictionaries, so a single object
//! cannot be decoded without the pack-wide state. This crate
//! reconstructs the canonical bytes of one object at a time, given its
//! pack offset and declared size:
//!
//! - commits: a structured header (tree, parents, times, identities)
//!   plus a compressed free-form message tail;
//! - trees: per-entry records that either name a path and hash inline
//!   or copy a run of entries out of another tree object, recursively.
//!
//! Declared sizes are contracts: decoding succeeds only when the
//! reconstruction fills the declared size exactly.
//!
//! # Host interfaces
//!
//! Pack container framing, hash-to-offset lookup, and any higher-level
//! object cache are the host's concern, supplied through
//! [`PackWindows`] (windowed byte access, mmap-backed or in-memory) and
//! [`ObjectOffsets`] (pack-index lookups for tree copy sources).
//!
//! # Failure model
//!
//! Dictionary-load failures are sticky per pack: every object needing
//! the broken dictionary fails with the same error. Object decode
//! failures are local: the pack handle stays usable. Nothing retries.

pub mod commit;
pub mod errors;
pub mod limits;
pub mod object_id;
pub mod pack;
pub mod pack_dict;
pub mod pack_inflate;
pub mod pack_window;
#[cfg(test)]
pub(crate) mod test_fixtures;
pub mod tree;
pub mod varint;

pub use commit::commit_at;
pub use errors::{DecodeError, DictError, WindowError};
pub use limits::DecodeLimits;
pub use object_id::ObjectId;
pub use pack::{ObjectOffsets, Pack, PACK_HEADER_BYTES};
pub use pack_dict::{Dict, DictEntry};
pub use pack_inflate::{inflate_exact_at, InflateError};
pub use pack_window::{
    MmapWindows, PackCursor, PackWindows, SliceWindows, MIN_WINDOW_BYTES,
};
pub use tree::{tree_at, TREE_TYPE_TAG};
pub use varint::{decode_varint, encode_varint, MAX_VARINT_BYTES};
