//! Compression seam — the byte codec applied before chunking and reversed
//! after reassembly.

use std::io::Cursor;

use zstd::stream::{decode_all, encode_all};

/// Default zstd level for outgoing files.
pub const DEFAULT_ZSTD_LEVEL: i32 = 21;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{codec} compression failed: {source}")]
    Compress {
        codec: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt {codec} stream: {source}")]
    CorruptStream {
        codec: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// A byte-level compression codec. Sender and receiver must agree on it.
pub trait Codec: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &'static str;

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Fails with [`CodecError::CorruptStream`] on structurally invalid or
    /// truncated input.
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// zstd, single frame.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    /// Out-of-range levels are clamped to what the linked zstd supports.
    pub fn new(level: i32) -> Self {
        let range = zstd::compression_level_range();
        Self {
            level: level.clamp(*range.start(), *range.end()),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self::new(DEFAULT_ZSTD_LEVEL)
    }
}

impl Codec for Zstd {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        encode_all(Cursor::new(input), self.level).map_err(|source| CodecError::Compress {
            codec: self.name(),
            source,
        })
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let corrupt = |source| CodecError::CorruptStream {
            codec: "zstd",
            source,
        };
        check_frames(input).map_err(corrupt)?;
        decode_all(Cursor::new(input)).map_err(corrupt)
    }
}

/// Walk the frame headers so a truncated final frame is an error rather
/// than a short read.
fn check_frames(mut input: &[u8]) -> std::io::Result<()> {
    while !input.is_empty() {
        let size = zstd::zstd_safe::find_frame_compressed_size(input).map_err(|code| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                zstd::zstd_safe::get_error_name(code),
            )
        })?;
        if size == 0 || size > input.len() {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        input = &input[size..];
    }
    Ok(())
}
