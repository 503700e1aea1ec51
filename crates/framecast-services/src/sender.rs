//! Sender-side preparation of files for optical transfer.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use framecast_core::digest::{self, Digest};
use framecast_core::wire::encode_chunks;
use framecast_core::Codec;

use crate::optical::{OpticalEncoder, OpticalUnit};

/// A file compressed and chunked, ready to be rendered.
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub file_name: String,
    /// Original size.
    pub bytes: u64,
    pub compressed_bytes: u64,
    /// BLAKE3 of the original bytes, for comparing against the receiver's log.
    pub digest: Digest,
    /// Chunk strings in index order.
    pub chunks: Vec<String>,
}

/// Per-file line of a folder preparation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub file_name: String,
    pub chunk_count: usize,
}

impl PreparedFile {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            file_name: self.file_name.clone(),
            chunk_count: self.chunk_count(),
        }
    }

    /// Render every chunk string, in index order.
    pub fn render(&self, encoder: &dyn OpticalEncoder) -> Result<Vec<OpticalUnit>> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(index, text)| {
                encoder.render(text).with_context(|| {
                    format!("failed to render chunk {index} of {}", self.file_name)
                })
            })
            .collect()
    }
}

/// Compress and chunk an in-memory buffer.
pub fn prepare_bytes(
    file_name: impl Into<String>,
    data: &[u8],
    codec: &dyn Codec,
    chunk_size: usize,
) -> Result<PreparedFile> {
    let file_name = file_name.into();
    let compressed = codec
        .compress(data)
        .with_context(|| format!("failed to compress {file_name}"))?;
    let chunks = encode_chunks(&compressed, chunk_size)
        .with_context(|| format!("failed to chunk {file_name}"))?;

    let prepared = PreparedFile {
        digest: digest::hash(data),
        bytes: data.len() as u64,
        compressed_bytes: compressed.len() as u64,
        chunks,
        file_name,
    };

    tracing::info!(
        filename = %prepared.file_name,
        bytes = prepared.bytes,
        compressed_bytes = prepared.compressed_bytes,
        chunks = prepared.chunk_count(),
        chunk_size,
        codec = codec.name(),
        digest = %digest::short_hex(&prepared.digest),
        "file prepared for optical transfer"
    );

    Ok(prepared)
}

/// Read, compress and chunk one file.
pub fn prepare_file(path: &Path, codec: &dyn Codec, chunk_size: usize) -> Result<PreparedFile> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read file: {}", path.display()))?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    prepare_bytes(filename, &data, codec, chunk_size)
}

/// Prepare every regular file directly inside `dir`, sorted by name.
pub fn prepare_folder(dir: &Path, codec: &dyn Codec, chunk_size: usize) -> Result<Vec<PreparedFile>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read folder: {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let prepared = paths
        .iter()
        .map(|path| prepare_file(path, codec, chunk_size))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(folder = %dir.display(), files = prepared.len(), "folder prepared");
    Ok(prepared)
}
