//! The capture-reader capability contract (§4.1, §6).
//!
//! The reader subprocess itself — `tshark`/`capinfos` or any other decoder
//! — is out of scope; this module only fixes the two operations and the
//! record schema a `CaptureReader` implementation must honor.

use std::path::Path;

use thiserror::Error;

use crate::model::PacketRecord;

/// Errors a `CaptureReader` implementation may surface. Only
/// `StartFailed` is fatal to the pipeline (§7 `ReaderUnavailable`); a
/// `StreamFailed` mid-stream is handled by the loader as a truncation.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to start capture reader: {0}")]
    StartFailed(String),
    #[error("capture stream failed: {0}")]
    StreamFailed(String),
}

/// Capability exposed by whatever backs packet decoding (§4.1, §6).
///
/// `Handle` is opaque to the loader: it is acquired from `start_stream` and
/// must be released via `stop` on every exit path, success or failure.
#[async_trait::async_trait]
pub trait CaptureReader: Send + Sync {
    type Handle: Send;

    /// Total frame count, or an error if it cannot be determined quickly.
    /// The loader falls back to a file-size estimate on failure (§4.1).
    async fn count_packets(&self, path: &Path) -> Result<u64, ReaderError>;

    /// Open the capture and return a handle for `next_packet`/`stop`.
    async fn start_stream(&self, path: &Path) -> Result<Self::Handle, ReaderError>;

    /// Fetch the next decoded record, or `None` at end of stream.
    async fn next_packet(
        &self,
        handle: &mut Self::Handle,
    ) -> Result<Option<PacketRecord>, ReaderError>;

    /// Release the reader. Must be invoked exactly once per handle.
    async fn stop(&self, handle: Self::Handle);

    /// Whether records may arrive out of frame-number order, requiring the
    /// loader's post-load sort (§4.1 "Ordering rule").
    fn reports_parallel_order(&self) -> bool {
        false
    }
}

/// Accumulates an OS-fingerprint guess across the whole stream (§4.1).
///
/// The accumulator's inner heuristics (TTL, TCP window size, option
/// ordering, ...) are intentionally left to the implementation; the loader
/// only guarantees the call sequence `clear` → `observe`* → `finalize`.
pub trait OsFingerprintAccumulator: Send {
    fn clear(&mut self);
    fn observe(&mut self, record: &PacketRecord);
    fn finalize(&mut self);
}

/// An accumulator that does nothing, for callers with no fingerprinting
/// backend wired up.
#[derive(Debug, Default)]
pub struct NoopFingerprintAccumulator;

impl OsFingerprintAccumulator for NoopFingerprintAccumulator {
    fn clear(&mut self) {}
    fn observe(&mut self, _record: &PacketRecord) {}
    fn finalize(&mut self) {}
}
