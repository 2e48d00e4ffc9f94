use thiserror::Error;

use crate::loader::reader::ReaderError;

#[derive(Debug, Error)]
/// Errors produced by the PCAP/PCAPNG capture reader.
pub enum PcapSourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error ({context}): {message}")]
    Pcap {
        context: &'static str,
        message: String,
    },
}

impl PcapSourceError {
    /// Opening the file or initializing the block reader failed before any
    /// packet was read — fatal to the pipeline (§7 `ReaderUnavailable`).
    pub fn into_start_failed(self) -> ReaderError {
        ReaderError::StartFailed(self.to_string())
    }

    /// A decode/refill error part-way through the stream — the loader
    /// treats this as a truncation, not a fatal error (§7 `ReaderTruncated`).
    pub fn into_stream_failed(self) -> ReaderError {
        ReaderError::StreamFailed(self.to_string())
    }
}
