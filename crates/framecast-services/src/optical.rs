//! Optical collaborators — the seams to the image-level subsystems.
//!
//! Framecast never draws or reads pixels itself. Rendering a chunk string
//! to a scannable code, reading one back from a captured image, and pulling
//! still frames out of a recording are all supplied by the embedding
//! application through these traits.

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;

/// One captured image expected to contain one encoded chunk.
#[derive(Debug, Clone)]
pub struct OpticalUnit {
    /// Where the unit came from (frame file name, sequence number). Logs only.
    pub label: String,
    /// Encoded image bytes, opaque to Framecast.
    pub data: Bytes,
}

impl OpticalUnit {
    pub fn new(label: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Sender side: chunk text → renderable unit.
pub trait OpticalEncoder: Send + Sync {
    fn render(&self, text: &str) -> Result<OpticalUnit>;
}

/// Receiver side: captured unit → chunk text.
///
/// `Ok(None)` means the image holds no readable code. Implementations may
/// block; the decode pool runs them off the async runtime.
pub trait OpticalDecoder: Send + Sync {
    fn decode(&self, unit: &OpticalUnit) -> Result<Option<String>>;
}

/// Turns a recording into still images written under `frames_dir`.
pub trait FrameExtractor: Send + Sync {
    fn extract(&self, video: &Path, frames_dir: &Path) -> Result<()>;
}

/// Load every regular file in an extracted-frames directory, sorted by
/// file name, as optical units labelled with that name.
pub async fn load_frames(dir: &Path) -> Result<Vec<OpticalUnit>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read frames directory: {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut units = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read frame: {}", path.display()))?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        units.push(OpticalUnit::new(label, data));
    }

    tracing::debug!(dir = %dir.display(), frames = units.len(), "frames loaded");
    Ok(units)
}
