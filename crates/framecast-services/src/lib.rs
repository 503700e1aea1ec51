//! framecast-services — both ends of an optical transfer.
//!
//! The sender compresses and chunks a file; the receiver decodes captured
//! units through a bounded pool, merges them into a transfer session and
//! reassembles the original bytes.

pub mod decode_pool;
pub mod optical;
pub mod reassembler;
pub mod receiver;
pub mod sender;
pub mod session;

pub use decode_pool::{DecodeFailure, DecodeOutcome, DecodePool, FrameOutcome};
pub use optical::{load_frames, FrameExtractor, OpticalDecoder, OpticalEncoder, OpticalUnit};
pub use reassembler::{reassemble, ReassemblyError};
pub use receiver::{
    sanitize_filename, BatchSummary, DecodedBatch, ReceiveReport, Receiver, StaleBatch,
};
pub use sender::{prepare_bytes, prepare_file, prepare_folder, FileSummary, PreparedFile};
pub use session::{AttemptId, Submission, TotalMismatch, TransferSession, TransferStatus};
