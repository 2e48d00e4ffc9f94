//! Top-level error taxonomy (§7).
//!
//! Only conditions that terminate the pipeline become variants here.
//! Everything else recoverable — a truncated stream, a missing GeoIP
//! backend, a failed detector, a cache miss that falls back to direct
//! computation — is captured as a flag or default on the result and
//! logged via `tracing`, never propagated as an error.

use thiserror::Error;

/// Fatal pipeline errors (§7: "Only `ReaderUnavailable` and out-of-memory
/// conditions terminate the pipeline with an error return").
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("capture reader unavailable: {0}")]
    ReaderUnavailable(String),
    #[error("out of memory while processing capture: {0}")]
    OutOfMemory(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
