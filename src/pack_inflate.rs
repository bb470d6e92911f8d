//! Windowed zlib inflation with an exact-output contract.
//!
//! Pack v4 stores compressed payloads (dictionaries, commit messages)
//! whose inflated size is declared up front. The helper here walks pack
//! windows, feeding each to zlib until the stream ends, and treats any
//! deviation from the declared output size as corruption: the stream
//! must terminate with a stream-end marker having produced exactly the
//! declared bytes.
//!
//! A per-thread `Decompress` is reused across calls to avoid repeated
//! allocation of zlib state.

use std::cell::RefCell;
use std::fmt;

use flate2::{Decompress, FlushDecompress, Status};

use crate::errors::WindowError;
use crate::pack_window::PackWindows;

thread_local! {
    static INFLATE_SCRATCH: RefCell<Decompress> = RefCell::new(Decompress::new(true));
}

/// Runs an inflate operation on the per-thread scratch state.
///
/// Not re-entrant on the same thread; callers must not nest inflate
/// calls.
fn with_inflate_scratch<F, R>(f: F) -> R
where
    F: FnOnce(&mut Decompress) -> R,
{
    INFLATE_SCRATCH.with(|de| {
        let mut de = de.borrow_mut();
        de.reset(true);
        f(&mut de)
    })
}

/// Inflate error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InflateError {
    /// Ran out of pack while the stream still wanted input.
    Window(WindowError),
    /// The stream ended or stalled before its stream-end marker.
    TruncatedInput,
    /// Zlib made no progress on non-empty input.
    Stalled,
    /// The stream produced a different byte count than declared.
    OutputMismatch { expected: usize, produced: usize },
    /// Zlib reported a data error.
    Backend,
}

impl fmt::Display for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window(err) => write!(f, "{err}"),
            Self::TruncatedInput => write!(f, "truncated compressed stream"),
            Self::Stalled => write!(f, "inflate stalled"),
            Self::OutputMismatch { expected, produced } => {
                write!(f, "inflate produced {produced} bytes, expected {expected}")
            }
            Self::Backend => write!(f, "inflate backend error"),
        }
    }
}

impl std::error::Error for InflateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Window(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WindowError> for InflateError {
    fn from(err: WindowError) -> Self {
        Self::Window(err)
    }
}

/// Inflates the zlib stream at `offset`, expecting exactly `expected`
/// output bytes.
///
/// Input is pulled window by window. On success returns the inflated
/// bytes and the offset one past the compressed stream, so callers can
/// chain onto whatever follows it in the pack.
///
/// # Errors
/// - [`InflateError::OutputMismatch`] if the stream ends with a
///   different byte count than `expected`, long or short.
/// - [`InflateError::TruncatedInput`] / [`InflateError::Window`] if the
///   pack ends before the stream does.
/// - [`InflateError::Backend`] on malformed deflate data.
pub fn inflate_exact_at<W: PackWindows + ?Sized>(
    windows: &W,
    offset: u64,
    expected: usize,
) -> Result<(Vec<u8>, u64), InflateError> {
    with_inflate_scratch(|de| {
        // One spare byte so an overlong stream is observed as excess
        // output rather than a stuck full buffer.
        let mut out = vec![0u8; expected + 1];
        let mut out_pos = 0usize;
        let mut offset = offset;

        loop {
            let input = windows.use_pack(offset)?;

            let before_in = de.total_in();
            let before_out = de.total_out();
            let status = de
                .decompress(input, &mut out[out_pos..], FlushDecompress::Finish)
                .map_err(|_| InflateError::Backend)?;
            let consumed = (de.total_in() - before_in) as usize;
            let produced = (de.total_out() - before_out) as usize;
            offset += consumed as u64;
            out_pos += produced;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if out_pos > expected {
                        return Err(InflateError::OutputMismatch {
                            expected,
                            produced: out_pos,
                        });
                    }
                    if consumed == 0 && produced == 0 {
                        if input.is_empty() {
                            return Err(InflateError::TruncatedInput);
                        }
                        return Err(InflateError::Stalled);
                    }
                }
            }
        }

        if out_pos != expected {
            return Err(InflateError::OutputMismatch {
                expected,
                produced: out_pos,
            });
        }
        out.truncate(expected);
        Ok((out, offset))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    use crate::pack_window::SliceWindows;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn inflates_exact_stream() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let mut pack = deflate(&payload);
        let stream_len = pack.len() as u64;
        pack.extend_from_slice(&[0xee; 8]); // trailing bytes stay unread

        let windows = SliceWindows::new(pack);
        let (data, end) = inflate_exact_at(&windows, 0, payload.len()).unwrap();
        assert_eq!(data, payload);
        assert_eq!(end, stream_len);
    }

    #[test]
    fn inflates_across_small_windows() {
        let payload: Vec<u8> = (0u8..=255).cycle().take(10_000).collect();
        let pack = deflate(&payload);
        let windows = SliceWindows::with_window_len(pack, 32);
        let (data, _) = inflate_exact_at(&windows, 0, payload.len()).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn inflates_at_offset() {
        let payload = b"hello\n".to_vec();
        let mut pack = vec![0xab; 40];
        pack.extend_from_slice(&deflate(&payload));

        let windows = SliceWindows::new(pack);
        let (data, _) = inflate_exact_at(&windows, 40, payload.len()).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn short_stream_is_output_mismatch() {
        let pack = deflate(b"abc");
        let windows = SliceWindows::new(pack);
        let err = inflate_exact_at(&windows, 0, 10).unwrap_err();
        assert_eq!(
            err,
            InflateError::OutputMismatch {
                expected: 10,
                produced: 3
            }
        );
    }

    #[test]
    fn long_stream_is_output_mismatch() {
        let pack = deflate(b"abcdef");
        let windows = SliceWindows::new(pack);
        let err = inflate_exact_at(&windows, 0, 3).unwrap_err();
        assert!(matches!(err, InflateError::OutputMismatch { expected: 3, .. }));
    }

    #[test]
    fn truncated_input_fails() {
        let mut pack = deflate(&[0x55u8; 4096]);
        pack.truncate(pack.len() / 2);
        let windows = SliceWindows::new(pack);
        let err = inflate_exact_at(&windows, 0, 4096).unwrap_err();
        assert!(matches!(
            err,
            InflateError::Window(_) | InflateError::TruncatedInput
        ));
    }

    #[test]
    fn empty_payload_round_trips() {
        let pack = deflate(b"");
        let stream_len = pack.len() as u64;
        let windows = SliceWindows::new(pack);
        let (data, end) = inflate_exact_at(&windows, 0, 0).unwrap();
        assert!(data.is_empty());
        assert_eq!(end, stream_len);
    }

    #[test]
    fn garbage_input_is_backend_error() {
        let windows = SliceWindows::new(vec![0x01, 0x02, 0x03, 0x04]);
        let err = inflate_exact_at(&windows, 0, 8).unwrap_err();
        assert_eq!(err, InflateError::Backend);
    }
}
