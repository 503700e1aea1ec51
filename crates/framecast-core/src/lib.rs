//! framecast-core — chunk wire format, compression seam, and configuration.
//! Shared by the sending and receiving ends of an optical transfer.

pub mod codec;
pub mod config;
pub mod digest;
pub mod wire;

pub use codec::{Codec, CodecError, Zstd};
pub use wire::{Chunk, MalformedChunk, WireError};
