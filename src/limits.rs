//! Decode limits.
//!
//! Caps on the unbounded-looking parts of the format. A well-formed
//! pack never comes near them; a corrupt one hits a precise error
//! instead of runaway parsing, allocation, or recursion.

/// Limits applied while decoding objects from a pack.
#[derive(Clone, Copy, Debug)]
pub struct DecodeLimits {
    /// Maximum bytes of an object header varint at copy-range recursion.
    pub max_header_bytes: usize,
    /// Maximum inflated size of a shared dictionary.
    ///
    /// Dictionary records are indexed with 32-bit offsets; values above
    /// that range are clamped to it.
    pub max_dict_bytes: usize,
    /// Maximum copy-range recursion depth.
    ///
    /// Depth counts copy edges; the outermost tree is depth 0. A corrupt
    /// pack can form a copy cycle, which this turns into a decode error.
    pub max_copy_depth: u32,
}

impl DecodeLimits {
    /// Creates a new limits struct.
    #[must_use]
    pub const fn new(max_header_bytes: usize, max_dict_bytes: usize, max_copy_depth: u32) -> Self {
        Self {
            max_header_bytes,
            max_dict_bytes,
            max_copy_depth,
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            // A 64-bit size shifted past the 4-bit type tag fits in 10
            // varint bytes; 16 leaves slack without admitting runaways.
            max_header_bytes: 16,
            max_dict_bytes: 64 * 1024 * 1024,
            max_copy_depth: 64,
        }
    }
}
