//! Receiver — owns the current transfer session and drives one reception
//! attempt from optical units (or a recording) to a file on disk.
//!
//! Every decode batch is tagged with the attempt it was started for. When a
//! new attempt begins, batches still in flight for the old one are discarded
//! on arrival instead of leaking chunks into the new session.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;

use framecast_core::config::ReceiverSettings;
use framecast_core::digest;
use framecast_core::Codec;

use crate::decode_pool::{DecodeFailure, DecodeOutcome, DecodePool, FrameOutcome};
use crate::optical::{load_frames, FrameExtractor, OpticalDecoder, OpticalUnit};
use crate::reassembler::reassemble;
use crate::session::{AttemptId, Submission, TransferSession, TransferStatus};

/// Outcome of one assembly, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveReport {
    pub success: bool,
    pub missing_chunks: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReceiveReport {
    fn written(path: PathBuf) -> Self {
        Self {
            success: true,
            missing_chunks: Vec::new(),
            path: Some(path),
            error: None,
        }
    }

    fn failed(missing_chunks: Vec<u32>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            missing_chunks,
            path: None,
            error: Some(error.into()),
        }
    }
}

/// Decode results for one attempt, not yet applied.
#[derive(Debug, Clone)]
pub struct DecodedBatch {
    pub attempt: AttemptId,
    pub outcomes: Vec<FrameOutcome>,
}

/// What applying a batch did to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub kept_existing: usize,
    /// Units whose code read as text that is not a chunk.
    pub rejected: usize,
    /// Units with no readable code, or whose decoder failed.
    pub absent: usize,
}

/// Work tagged with an attempt that is no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("attempt {batch} is stale, current attempt is {current}")]
pub struct StaleBatch {
    pub batch: AttemptId,
    pub current: AttemptId,
}

struct ReceiverState {
    last_attempt: u64,
    session: TransferSession,
}

#[derive(Clone)]
pub struct Receiver {
    codec: Arc<dyn Codec>,
    pool: DecodePool,
    settings: ReceiverSettings,
    state: Arc<Mutex<ReceiverState>>,
}

impl Receiver {
    pub fn new(
        decoder: Arc<dyn OpticalDecoder>,
        codec: Arc<dyn Codec>,
        settings: ReceiverSettings,
    ) -> Self {
        let limit = NonZeroUsize::new(settings.decode_concurrency).unwrap_or(NonZeroUsize::MIN);
        let pool = DecodePool::new(decoder, limit, settings.decode_timeout());
        Self {
            codec,
            pool,
            settings,
            state: Arc::new(Mutex::new(ReceiverState {
                last_attempt: 0,
                session: TransferSession::new(AttemptId(0)),
            })),
        }
    }

    pub fn settings(&self) -> &ReceiverSettings {
        &self.settings
    }

    /// Decode concurrency actually in force.
    pub fn decode_limit(&self) -> usize {
        self.pool.limit()
    }

    /// Drop the current session and start an empty one under a new id.
    pub async fn begin_attempt(&self) -> AttemptId {
        let mut state = self.state.lock().await;
        state.last_attempt += 1;
        let attempt = AttemptId(state.last_attempt);
        state.session = TransferSession::new(attempt);
        tracing::info!(%attempt, "reception attempt started");
        attempt
    }

    pub async fn current_attempt(&self) -> AttemptId {
        self.state.lock().await.session.attempt()
    }

    /// Run the decode pool. Does not touch the session.
    pub async fn decode_batch(&self, attempt: AttemptId, units: Vec<OpticalUnit>) -> DecodedBatch {
        let outcomes = self.pool.decode_all(units).await;
        DecodedBatch { attempt, outcomes }
    }

    /// Apply a batch to the session, in unit order. A batch for any attempt
    /// other than the current one is discarded whole.
    pub async fn apply(&self, batch: DecodedBatch) -> Result<BatchSummary, StaleBatch> {
        let mut state = self.state.lock().await;
        let current = state.session.attempt();
        if batch.attempt != current {
            tracing::warn!(
                batch = %batch.attempt,
                %current,
                units = batch.outcomes.len(),
                "stale decode batch discarded"
            );
            return Err(StaleBatch {
                batch: batch.attempt,
                current,
            });
        }

        let mut summary = BatchSummary::default();
        for frame in batch.outcomes {
            let submission = match frame.outcome {
                DecodeOutcome::Chunk(chunk) => state.session.accept(chunk),
                DecodeOutcome::Absent(DecodeFailure::Malformed(_)) => state.session.reject(),
                DecodeOutcome::Absent(_) => {
                    summary.absent += 1;
                    continue;
                }
            };
            match submission {
                Submission::Inserted => summary.inserted += 1,
                Submission::Replaced => summary.replaced += 1,
                Submission::KeptExisting => summary.kept_existing += 1,
                Submission::Rejected => summary.rejected += 1,
            }
        }

        tracing::debug!(
            attempt = %current,
            inserted = summary.inserted,
            replaced = summary.replaced,
            kept = summary.kept_existing,
            rejected = summary.rejected,
            absent = summary.absent,
            "decode batch applied"
        );
        Ok(summary)
    }

    pub async fn status(&self) -> TransferStatus {
        self.state.lock().await.session.status()
    }

    /// Malformed candidates dropped in the current attempt.
    pub async fn rejected(&self) -> usize {
        self.state.lock().await.session.rejected()
    }

    /// Reassemble the session of `attempt` and write it to
    /// `output_dir/<sanitized name>`. Fails without writing if `attempt` has
    /// been superseded. The session is left as is, so a failed assembly can
    /// be retried after more units are applied.
    pub async fn assemble(&self, attempt: AttemptId, name: Option<&str>) -> ReceiveReport {
        let session = {
            let state = self.state.lock().await;
            let current = state.session.attempt();
            if attempt != current {
                let stale = StaleBatch {
                    batch: attempt,
                    current,
                };
                tracing::warn!(%attempt, %current, "assembly of superseded attempt refused");
                return ReceiveReport::failed(Vec::new(), stale.to_string());
            }
            state.session.clone()
        };

        let codec = self.codec.clone();
        let rebuilt = tokio::task::spawn_blocking(move || reassemble(&session, codec.as_ref())).await;
        let data = match rebuilt {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                tracing::warn!(%attempt, error = %e, "reassembly failed");
                return ReceiveReport::failed(e.missing().to_vec(), e.to_string());
            }
            Err(e) => {
                tracing::error!(%attempt, error = %e, "reassembly task failed");
                return ReceiveReport::failed(Vec::new(), format!("reassembly task failed: {e}"));
            }
        };

        let file_name = sanitize_filename(
            name.unwrap_or(&self.settings.output_name),
            &self.settings.output_name,
        );
        match self.write_output(&file_name, &data).await {
            Ok(path) => {
                tracing::info!(
                    %attempt,
                    filename = %file_name,
                    bytes = data.len(),
                    digest = %digest::short_hex(&digest::hash(&data)),
                    path = %path.display(),
                    "file received and reassembled"
                );
                ReceiveReport::written(path)
            }
            Err(e) => {
                tracing::error!(%attempt, error = %e, "failed to write reconstructed file");
                ReceiveReport::failed(Vec::new(), format!("{e:#}"))
            }
        }
    }

    async fn write_output(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        let dir = &self.settings.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
        let path = dir.join(file_name);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("failed to write file: {}", path.display()))?;
        Ok(path)
    }

    /// One full attempt over an in-memory set of units.
    pub async fn receive_units(&self, name: Option<&str>, units: Vec<OpticalUnit>) -> ReceiveReport {
        let attempt = self.begin_attempt().await;
        let batch = self.decode_batch(attempt, units).await;
        if let Err(stale) = self.apply(batch).await {
            return ReceiveReport::failed(Vec::new(), stale.to_string());
        }
        self.assemble(attempt, name).await
    }

    /// Extract frames from a recording into a fresh per-video directory,
    /// then receive them. Extraction failures are errors; everything after
    /// that is reported through the [`ReceiveReport`].
    pub async fn receive_video(
        &self,
        extractor: Arc<dyn FrameExtractor>,
        video: &Path,
    ) -> Result<ReceiveReport> {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let frames_dir = self.settings.frames_dir.join(sanitize_filename(&stem, "video"));

        match tokio::fs::remove_dir_all(&frames_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to clear frames directory: {}", frames_dir.display())
                })
            }
        }
        tokio::fs::create_dir_all(&frames_dir)
            .await
            .with_context(|| format!("failed to create frames directory: {}", frames_dir.display()))?;

        tracing::info!(
            video = %video.display(),
            frames_dir = %frames_dir.display(),
            "extracting frames"
        );

        let (video_path, target) = (video.to_path_buf(), frames_dir.clone());
        tokio::task::spawn_blocking(move || extractor.extract(&video_path, &target))
            .await
            .context("frame extraction task failed")?
            .with_context(|| format!("failed to extract frames from {}", video.display()))?;

        let units = load_frames(&frames_dir).await?;
        tracing::info!(frames = units.len(), "frames extracted");

        Ok(self.receive_units(None, units).await)
    }
}

/// Reduce an untrusted name to a single safe path component.
pub fn sanitize_filename(raw: &str, fallback: &str) -> String {
    // Final path component only, for both separators.
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    // No hidden files and no ".." tricks.
    let trimmed = base.trim_start_matches('.');

    let clean: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if clean.is_empty() {
        fallback.to_string()
    } else {
        clean
    }
}
