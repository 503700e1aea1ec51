//! Framecast wire format — the text carried inside every optical unit.
//!
//! A chunk is three fields joined by [`DELIMITER`]:
//!
//! ```text
//! <index:decimal>||<total:decimal>||<payload:base64>
//! ```
//!
//! These strings ARE the protocol. The payload is the standard padded base64
//! of one contiguous slice of the compressed file. The base64 alphabet does
//! not contain `|`, so splitting on the delimiter can never cut a payload in
//! two. Changing the delimiter or the transport alphabet is a breaking change.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use static_assertions::const_assert;

/// Error raised when payload text is not valid transport encoding.
pub use base64::DecodeError as TransportError;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Field separator. Must never occur inside any field's encoding.
pub const DELIMITER: &str = "||";

/// Default slice size in raw (pre-base64) bytes. A multiple of 3, so the
/// concatenated payload text carries no interior padding.
pub const DEFAULT_CHUNK_SIZE: usize = 600;

/// Every byte the transport encoding can emit.
pub const TRANSPORT_ALPHABET: &[u8; 65] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

const fn alphabet_contains(byte: u8) -> bool {
    let mut i = 0;
    while i < TRANSPORT_ALPHABET.len() {
        if TRANSPORT_ALPHABET[i] == byte {
            return true;
        }
        i += 1;
    }
    false
}

// Compile-time guard. If this fails, chunk strings can no longer be split
// unambiguously.
const_assert!(!alphabet_contains(b'|'));

// ── Chunk ─────────────────────────────────────────────────────────────────────

/// One parsed transfer unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in the transfer.
    pub index: u32,
    /// Sender-declared number of chunks in the transfer.
    pub total: u32,
    /// Base64 text of the slice at `index`.
    pub payload: String,
}

impl Chunk {
    /// Reverse the transport encoding of this chunk's payload.
    pub fn decode_payload(&self) -> Result<Vec<u8>, TransportError> {
        STANDARD.decode(self.payload.as_bytes())
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.index, self.total, self.payload
        )
    }
}

impl FromStr for Chunk {
    type Err = MalformedChunk;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_chunk(s)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a candidate string is not a chunk. Never fatal: the caller drops the
/// candidate and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedChunk {
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),
    #[error("empty {0} field")]
    EmptyField(&'static str),
    #[error("{field} is not a decimal integer: {raw:?}")]
    NotDecimal { field: &'static str, raw: String },
    #[error("{field} does not fit in 32 bits")]
    OutOfRange { field: &'static str },
    #[error("declared total is zero")]
    ZeroTotal,
}

/// Sender-side encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("chunk size must be at least 1 byte")]
    ZeroChunkSize,
    #[error("{0} chunks exceed the 32-bit index space")]
    TooManyChunks(usize),
}

// ── Encode ────────────────────────────────────────────────────────────────────

/// Split a compressed buffer into chunk strings of at most `chunk_size` raw
/// bytes each, in index order.
///
/// An empty buffer yields no chunks.
pub fn encode_chunks(compressed: &[u8], chunk_size: usize) -> Result<Vec<String>, WireError> {
    if chunk_size == 0 {
        return Err(WireError::ZeroChunkSize);
    }

    let count = compressed.len().div_ceil(chunk_size);
    let total = u32::try_from(count).map_err(|_| WireError::TooManyChunks(count))?;

    let chunks = compressed
        .chunks(chunk_size)
        .zip(0u32..)
        .map(|(slice, index)| {
            Chunk {
                index,
                total,
                payload: STANDARD.encode(slice),
            }
            .to_string()
        })
        .collect();

    Ok(chunks)
}

/// Reverse the transport encoding of one payload, appending the bytes to `out`.
pub fn decode_payload_into(payload: &str, out: &mut Vec<u8>) -> Result<(), TransportError> {
    STANDARD.decode_vec(payload, out)
}

// ── Parse ─────────────────────────────────────────────────────────────────────

/// Parse a candidate string into a [`Chunk`].
///
/// Accepts exactly three non-empty fields where index and total are plain
/// ASCII decimal `u32` values and total is non-zero. The payload is not
/// validated against the transport alphabet here; that happens at
/// reassembly.
pub fn parse_chunk(text: &str) -> Result<Chunk, MalformedChunk> {
    let fields: Vec<&str> = text.split(DELIMITER).collect();
    let [index, total, payload] = fields.as_slice() else {
        return Err(MalformedChunk::FieldCount(fields.len()));
    };

    let index = parse_decimal("index", index)?;
    let total = parse_decimal("total", total)?;
    if total == 0 {
        return Err(MalformedChunk::ZeroTotal);
    }
    if payload.is_empty() {
        return Err(MalformedChunk::EmptyField("payload"));
    }

    Ok(Chunk {
        index,
        total,
        payload: (*payload).to_string(),
    })
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<u32, MalformedChunk> {
    if raw.is_empty() {
        return Err(MalformedChunk::EmptyField(field));
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedChunk::NotDecimal {
            field,
            raw: raw.chars().take(16).collect(),
        });
    }
    raw.parse().map_err(|_| MalformedChunk::OutOfRange { field })
}
