//! Framecast integration test harness.
//!
//! These tests drive the full path a file takes: sender preparation,
//! rendering, a lossy and reordering "camera", the receiver's decode pool,
//! session and reassembly, and the file written on the other end.
//!
//! Optical codes are stood in for by their text: a rendered unit carries
//! the chunk string as its bytes, and decoding reads it back.
//!
//!   cargo test --test integration
//!   RUST_LOG=debug cargo test --test integration -- --nocapture

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use framecast_core::config::ReceiverSettings;
use framecast_core::Zstd;
use framecast_services::{OpticalDecoder, OpticalEncoder, OpticalUnit, Receiver};

// ── Harness ───────────────────────────────────────────────────────────────────

static INIT: Once = Once::new();

/// Route tracing output through the test writer. Safe to call from every test.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,framecast_services=debug"));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .compact(),
            )
            .init();
    });
}

/// Renders chunk text as-is and reads it back. Empty data is an image with
/// no readable code.
pub struct TextFrames;

impl OpticalEncoder for TextFrames {
    fn render(&self, text: &str) -> Result<OpticalUnit> {
        let index = text.split("||").next().unwrap_or("?");
        Ok(OpticalUnit::new(format!("code-{index}"), text.to_string()))
    }
}

impl OpticalDecoder for TextFrames {
    fn decode(&self, unit: &OpticalUnit) -> Result<Option<String>> {
        if unit.data.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8(unit.data.to_vec())?))
    }
}

/// A per-test directory under the system temp dir, emptied on creation.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "framecast-it-{name}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn settings(dir: &Path, concurrency: usize) -> ReceiverSettings {
    ReceiverSettings {
        decode_concurrency: concurrency,
        decode_timeout_ms: 5_000,
        frames_dir: dir.join("frames"),
        output_dir: dir.join("received"),
        output_name: "reconstructed_file".to_string(),
    }
}

pub fn text_receiver(dir: &Path, concurrency: usize) -> Receiver {
    Receiver::new(
        Arc::new(TextFrames),
        Arc::new(Zstd::default()),
        settings(dir, concurrency),
    )
}

/// Deterministic in-place shuffle (xorshift), so failures reproduce.
pub fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut state = seed | 1;
    for i in (1..items.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        items.swap(i, (state % (i as u64 + 1)) as usize);
    }
}

/// Bytes that compress poorly enough to need several chunks.
pub fn sample_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut x = seed.wrapping_mul(2_654_435_761).max(1);
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            (x >> 24) as u8
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

mod pipeline;
mod video;
