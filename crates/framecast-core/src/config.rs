//! Configuration system for Framecast.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FRAMECAST_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/framecast/config.toml
//!   3. ~/.config/framecast/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::codec::{Zstd, DEFAULT_ZSTD_LEVEL};
use crate::wire::DEFAULT_CHUNK_SIZE;

const DEFAULT_DECODE_TIMEOUT_MS: u64 = 10_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FramecastConfig {
    pub sender: SenderSettings,
    pub receiver: ReceiverSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderSettings {
    /// Raw bytes per chunk, before base64 expansion.
    pub chunk_size: usize,
    /// zstd level applied to the whole file before chunking.
    pub compression_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSettings {
    /// Max optical decodes in flight at once. 0 is treated as 1.
    pub decode_concurrency: usize,
    /// Per-unit decode timeout. A timed-out unit counts as absent.
    /// 0 means the default (10 s).
    pub decode_timeout_ms: u64,
    /// Parent directory for per-video extracted frames.
    pub frames_dir: PathBuf,
    /// Where reconstructed files are written.
    pub output_dir: PathBuf,
    /// File name used when the caller does not supply one.
    pub output_name: String,
}

impl SenderSettings {
    /// The codec both ends must agree on.
    pub fn codec(&self) -> Zstd {
        Zstd::new(self.compression_level)
    }
}

impl ReceiverSettings {
    pub fn decode_timeout(&self) -> Duration {
        match self.decode_timeout_ms {
            0 => Duration::from_millis(DEFAULT_DECODE_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression_level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            decode_concurrency: 5,
            decode_timeout_ms: DEFAULT_DECODE_TIMEOUT_MS,
            frames_dir: data_dir().join("frames"),
            output_dir: data_dir().join("received"),
            output_name: "reconstructed_file".to_string(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("framecast")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("framecast")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FramecastConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            FramecastConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FRAMECAST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&FramecastConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply FRAMECAST_* overrides. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FRAMECAST_SENDER__CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.sender.chunk_size = v;
        }
        if let Some(v) = lookup("FRAMECAST_SENDER__COMPRESSION_LEVEL").and_then(|v| v.parse().ok())
        {
            self.sender.compression_level = v;
        }
        if let Some(v) =
            lookup("FRAMECAST_RECEIVER__DECODE_CONCURRENCY").and_then(|v| v.parse().ok())
        {
            self.receiver.decode_concurrency = v;
        }
        if let Some(v) = lookup("FRAMECAST_RECEIVER__DECODE_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.receiver.decode_timeout_ms = v;
        }
        if let Some(v) = lookup("FRAMECAST_RECEIVER__FRAMES_DIR") {
            self.receiver.frames_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FRAMECAST_RECEIVER__OUTPUT_DIR") {
            self.receiver.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FRAMECAST_RECEIVER__OUTPUT_NAME").filter(|v| !v.is_empty()) {
            self.receiver.output_name = v;
        }
    }
}
