//! Rebuilds the original file bytes from a complete transfer session.
//!
//! Reassembly reads a session and never changes it, so a failed attempt can
//! simply be retried once more chunks have arrived.

use framecast_core::wire::{decode_payload_into, TransportError};
use framecast_core::{Codec, CodecError};

use crate::session::TransferSession;

/// Fatal outcomes of one reassembly attempt. The session stays usable.
#[derive(Debug, thiserror::Error)]
pub enum ReassemblyError {
    #[error("no valid chunks received")]
    NoChunksReceived,
    #[error("missing chunks: {}", format_indices(.missing))]
    IncompleteTransfer { missing: Vec<u32> },
    #[error("chunk {index} is not valid transport encoding: {source}")]
    TransportDecode {
        index: u32,
        #[source]
        source: TransportError,
    },
    #[error("decompression failed: {0}")]
    Decompression(#[source] CodecError),
}

impl ReassemblyError {
    /// Indices still needed, empty unless the transfer is incomplete.
    pub fn missing(&self) -> &[u32] {
        match self {
            ReassemblyError::IncompleteTransfer { missing } => missing,
            _ => &[],
        }
    }
}

fn format_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rebuild the original bytes from a complete session.
pub fn reassemble(session: &TransferSession, codec: &dyn Codec) -> Result<Vec<u8>, ReassemblyError> {
    let Some(total) = session.declared_total() else {
        return Err(ReassemblyError::NoChunksReceived);
    };

    let missing = session.missing_indices();
    if !missing.is_empty() {
        return Err(ReassemblyError::IncompleteTransfer { missing });
    }

    let compressed = transport_decode(session, total)?;
    let original = codec
        .decompress(&compressed)
        .map_err(ReassemblyError::Decompression)?;

    tracing::debug!(
        attempt = %session.attempt(),
        chunks = total,
        compressed_bytes = compressed.len(),
        bytes = original.len(),
        codec = codec.name(),
        "session reassembled"
    );

    Ok(original)
}

/// Payloads are decoded one chunk at a time, in index order. Decoding per
/// chunk keeps chunk sizes that are not a multiple of 3 working, since each
/// payload carries its own padding.
fn transport_decode(session: &TransferSession, total: u32) -> Result<Vec<u8>, ReassemblyError> {
    let mut compressed = Vec::new();
    for index in 0..total {
        let payload = session
            .payload(index)
            .ok_or_else(|| ReassemblyError::IncompleteTransfer {
                missing: vec![index],
            })?;
        decode_payload_into(payload, &mut compressed)
            .map_err(|source| ReassemblyError::TransportDecode { index, source })?;
    }
    Ok(compressed)
}
