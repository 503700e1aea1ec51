//! Transfer session — the receiver's chunk store for one reception attempt.
//!
//! Chunks arrive in any order, any number of times. The store is keyed by
//! chunk index, so resubmitting a chunk is idempotent, and the first valid
//! chunk fixes the declared total for the life of the session.
//!
//! A session belongs to exactly one attempt. Starting over means building a
//! new session, never clearing this one.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use framecast_core::wire::{parse_chunk, Chunk};

/// Identifies one reception attempt. Strictly increasing per receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A chunk whose total disagreed with the session's declared total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalMismatch {
    pub index: u32,
    pub declared: u32,
    pub observed: u32,
}

/// What a single submission did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// First payload seen for this index.
    Inserted,
    /// Longer payload replaced a shorter one.
    Replaced,
    /// Existing payload was at least as long; nothing changed.
    KeptExisting,
    /// Candidate text was not a chunk.
    Rejected,
}

/// Read-only progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatus {
    /// Declared total, 0 until the first valid chunk.
    pub total_chunks: u32,
    pub received_chunks: usize,
    pub missing_chunks: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct TransferSession {
    attempt: AttemptId,
    declared_total: Option<u32>,
    chunks: HashMap<u32, String>,
    mismatches: Vec<TotalMismatch>,
    rejected: usize,
}

impl TransferSession {
    pub fn new(attempt: AttemptId) -> Self {
        Self {
            attempt,
            declared_total: None,
            chunks: HashMap::new(),
            mismatches: Vec::new(),
            rejected: 0,
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Parse candidate text and store it. Malformed text is logged and
    /// counted, and leaves the store untouched.
    pub fn submit(&mut self, text: &str) -> Submission {
        match parse_chunk(text) {
            Ok(chunk) => self.accept(chunk),
            Err(e) => {
                tracing::warn!(
                    attempt = %self.attempt,
                    error = %e,
                    candidate = %preview(text),
                    "ignoring malformed chunk"
                );
                self.reject()
            }
        }
    }

    /// Count a candidate that was parsed elsewhere and found malformed.
    pub fn reject(&mut self) -> Submission {
        self.rejected += 1;
        Submission::Rejected
    }

    /// Store an already-parsed chunk.
    pub fn accept(&mut self, chunk: Chunk) -> Submission {
        match self.declared_total {
            None => {
                tracing::debug!(attempt = %self.attempt, total = chunk.total, "declared total set");
                self.declared_total = Some(chunk.total);
            }
            Some(declared) if declared != chunk.total => {
                tracing::warn!(
                    attempt = %self.attempt,
                    index = chunk.index,
                    declared,
                    observed = chunk.total,
                    "mismatch in declared total, keeping first seen"
                );
                self.mismatches.push(TotalMismatch {
                    index: chunk.index,
                    declared,
                    observed: chunk.total,
                });
            }
            Some(_) => {}
        }

        if let Some(declared) = self.declared_total {
            if chunk.index >= declared {
                tracing::debug!(
                    attempt = %self.attempt,
                    index = chunk.index,
                    declared,
                    "chunk index beyond declared total"
                );
            }
        }

        match self.chunks.entry(chunk.index) {
            Entry::Vacant(slot) => {
                slot.insert(chunk.payload);
                Submission::Inserted
            }
            // Longest wins: a partial re-capture must not displace a fuller one.
            Entry::Occupied(mut slot) => {
                if chunk.payload.len() > slot.get().len() {
                    slot.insert(chunk.payload);
                    Submission::Replaced
                } else {
                    Submission::KeptExisting
                }
            }
        }
    }

    pub fn declared_total(&self) -> Option<u32> {
        self.declared_total
    }

    /// Distinct indices stored, including any beyond the declared total.
    pub fn received(&self) -> usize {
        self.chunks.len()
    }

    pub fn payload(&self, index: u32) -> Option<&str> {
        self.chunks.get(&index).map(String::as_str)
    }

    /// True iff a total is declared and every index below it is present.
    pub fn is_complete(&self) -> bool {
        match self.declared_total {
            Some(total) => (0..total).all(|i| self.chunks.contains_key(&i)),
            None => false,
        }
    }

    /// Indices in `[0, declared_total)` not yet stored, ascending.
    pub fn missing_indices(&self) -> Vec<u32> {
        match self.declared_total {
            Some(total) => (0..total).filter(|i| !self.chunks.contains_key(i)).collect(),
            None => Vec::new(),
        }
    }

    pub fn mismatches(&self) -> &[TotalMismatch] {
        &self.mismatches
    }

    /// Number of malformed candidates dropped so far.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn status(&self) -> TransferStatus {
        TransferStatus {
            total_chunks: self.declared_total.unwrap_or(0),
            received_chunks: self.received(),
            missing_chunks: self.missing_indices(),
        }
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 48;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}…")
    }
}
