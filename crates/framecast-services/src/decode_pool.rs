//! Bounded fan-out of the optical decode primitive.
//!
//! Every unit yields exactly one [`FrameOutcome`]. A decoder that errors,
//! panics, times out or returns garbage costs only its own unit; siblings
//! keep decoding. At most `limit` decoder calls run at any instant: the
//! permit travels into the blocking call and is released only when the call
//! really returns, even if its caller already gave up on a timeout.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use framecast_core::wire::{parse_chunk, Chunk, MalformedChunk};

use crate::optical::{OpticalDecoder, OpticalUnit};

/// Why a unit contributed no chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("no readable code in frame")]
    NoCode,
    #[error("malformed chunk: {0}")]
    Malformed(MalformedChunk),
    #[error("decoder failed: {0}")]
    Failed(String),
    #[error("decoder timed out")]
    TimedOut,
    #[error("decoder panicked")]
    Panicked,
}

/// Result of decoding one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Chunk(Chunk),
    Absent(DecodeFailure),
}

/// An outcome correlated back to its source unit.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    /// Position of the unit in the submitted batch.
    pub position: usize,
    pub label: String,
    pub outcome: DecodeOutcome,
}

#[derive(Clone)]
pub struct DecodePool {
    decoder: Arc<dyn OpticalDecoder>,
    limit: NonZeroUsize,
    timeout: Duration,
}

impl DecodePool {
    pub fn new(decoder: Arc<dyn OpticalDecoder>, limit: NonZeroUsize, timeout: Duration) -> Self {
        Self {
            decoder,
            limit,
            timeout,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit.get()
    }

    /// Decode every unit and return once all of them have an outcome.
    /// Results come back sorted by `position`.
    pub async fn decode_all(&self, units: Vec<OpticalUnit>) -> Vec<FrameOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.limit.get()));
        let labels: Vec<String> = units.iter().map(|u| u.label.clone()).collect();
        let mut tasks = JoinSet::new();

        tracing::debug!(units = units.len(), limit = self.limit.get(), "decode batch started");

        for (position, unit) in units.into_iter().enumerate() {
            // Admission: wait here until a running decode releases its permit.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break, // semaphore closed
            };
            tasks.spawn(decode_one(
                position,
                unit,
                self.decoder.clone(),
                self.timeout,
                permit,
            ));
        }

        let mut slots: Vec<Option<FrameOutcome>> = vec![None; labels.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    let position = outcome.position;
                    slots[position] = Some(outcome);
                }
                Err(e) => tracing::warn!(error = %e, "decode task failed"),
            }
        }

        // A unit whose task vanished still gets an outcome.
        let outcomes: Vec<FrameOutcome> = slots
            .into_iter()
            .zip(labels)
            .enumerate()
            .map(|(position, (slot, label))| {
                slot.unwrap_or(FrameOutcome {
                    position,
                    label,
                    outcome: DecodeOutcome::Absent(DecodeFailure::Panicked),
                })
            })
            .collect();

        let decoded = outcomes
            .iter()
            .filter(|o| matches!(o.outcome, DecodeOutcome::Chunk(_)))
            .count();
        tracing::info!(
            units = outcomes.len(),
            decoded,
            absent = outcomes.len() - decoded,
            "decode batch settled"
        );

        outcomes
    }
}

async fn decode_one(
    position: usize,
    unit: OpticalUnit,
    decoder: Arc<dyn OpticalDecoder>,
    timeout: Duration,
    permit: OwnedSemaphorePermit,
) -> FrameOutcome {
    let label = unit.label.clone();

    let call = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        decoder.decode(&unit)
    });

    let outcome = match tokio::time::timeout(timeout, call).await {
        Err(_) => DecodeOutcome::Absent(DecodeFailure::TimedOut),
        Ok(Err(_)) => DecodeOutcome::Absent(DecodeFailure::Panicked),
        Ok(Ok(Err(e))) => DecodeOutcome::Absent(DecodeFailure::Failed(format!("{e:#}"))),
        Ok(Ok(Ok(None))) => DecodeOutcome::Absent(DecodeFailure::NoCode),
        Ok(Ok(Ok(Some(text)))) => match parse_chunk(&text) {
            Ok(chunk) => DecodeOutcome::Chunk(chunk),
            Err(e) => DecodeOutcome::Absent(DecodeFailure::Malformed(e)),
        },
    };

    match &outcome {
        DecodeOutcome::Chunk(chunk) => tracing::trace!(
            frame = %label,
            index = chunk.index,
            total = chunk.total,
            "chunk decoded"
        ),
        DecodeOutcome::Absent(reason) => {
            tracing::warn!(frame = %label, reason = %reason, "no chunk from frame")
        }
    }

    FrameOutcome {
        position,
        label,
        outcome,
    }
}
