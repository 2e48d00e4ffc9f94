//! Packet loading: capture-reader contract, concrete PCAP backend, and the
//! loading algorithm itself (§4.1).

pub mod fingerprint;
pub mod pcap;
pub mod reader;

pub use fingerprint::TtlFingerprintAccumulator;
pub use pcap::PcapCaptureReader;
pub use reader::{CaptureReader, NoopFingerprintAccumulator, OsFingerprintAccumulator, ReaderError};

use std::path::Path;

use tracing::{info, warn};

use crate::model::PacketRecord;

/// Bytes-per-packet assumed when `count_packets` is unavailable or
/// returns zero (§4.1 step 1).
const ESTIMATE_BYTES_PER_PACKET: u64 = 500;

/// Report "Loading" progress every this many packets (§4.1 step 2).
const LOADING_REPORT_INTERVAL: u64 = 100_000;

/// Loads every packet record out of a capture file using a `CaptureReader`
/// backend, driving an `OsFingerprintAccumulator` across the stream.
pub struct PacketLoader<R, A> {
    reader: R,
    accumulator: A,
}

/// Progress callback invoked during the Loading sub-phase. Takes
/// `(packets_processed, packets_expected)`.
pub type LoadProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Result of a load run: the packets actually received, and whether the
/// stream ended early (§4.1, §7 `ReaderTruncated`).
pub struct LoadOutcome {
    pub packets: Vec<PacketRecord>,
    pub truncated: bool,
}

impl<R: CaptureReader, A: OsFingerprintAccumulator> PacketLoader<R, A> {
    pub fn new(reader: R, accumulator: A) -> Self {
        Self { reader, accumulator }
    }

    /// Runs the full load algorithm against `path`.
    ///
    /// A `StartFailed` error (file missing, reader init failure) is fatal
    /// and propagates. A mid-stream `StreamFailed` instead truncates: the
    /// packets already collected are returned with `truncated = true`,
    /// leaving the caller to decide whether to proceed (§4.1).
    pub async fn load(
        &mut self,
        path: &Path,
        on_progress: &LoadProgressFn<'_>,
    ) -> Result<LoadOutcome, ReaderError> {
        let expected = self.estimate_packet_count(path).await;

        self.accumulator.clear();
        let mut handle = self.reader.start_stream(path).await?;
        let mut packets = Vec::with_capacity(expected.min(16_000_000) as usize);

        let drain_result = self.drain(&mut handle, expected, on_progress, &mut packets).await;
        self.reader.stop(handle).await;
        let truncated = drain_result?;

        self.accumulator.finalize();

        if self.reader.reports_parallel_order() {
            packets.sort_by_key(|p| p.frame_number);
        }

        Ok(LoadOutcome { packets, truncated })
    }

    async fn estimate_packet_count(&self, path: &Path) -> u64 {
        match self.reader.count_packets(path).await {
            Ok(count) if count > 0 => count,
            Ok(_) => self.size_estimate(path),
            Err(err) => {
                warn!(error = %err, "count_packets failed, falling back to size estimate");
                self.size_estimate(path)
            }
        }
    }

    fn size_estimate(&self, path: &Path) -> u64 {
        std::fs::metadata(path)
            .map(|meta| meta.len() / ESTIMATE_BYTES_PER_PACKET)
            .unwrap_or(0)
    }

    /// Drains `next_packet` into `packets` until EOF or a stream failure.
    /// Returns whether the stream was truncated; only a `StartFailed`
    /// surfacing mid-stream (not part of the documented contract, but not
    /// ruled out for a misbehaving backend) propagates as an error.
    async fn drain(
        &mut self,
        handle: &mut R::Handle,
        expected: u64,
        on_progress: &LoadProgressFn<'_>,
        packets: &mut Vec<PacketRecord>,
    ) -> Result<bool, ReaderError> {
        let mut processed = 0u64;
        loop {
            match self.reader.next_packet(handle).await {
                Ok(Some(record)) => {
                    self.accumulator.observe(&record);
                    packets.push(record);
                    processed += 1;
                    if processed % LOADING_REPORT_INTERVAL == 0 {
                        on_progress(processed, expected);
                    }
                }
                Ok(None) => {
                    info!(packets = processed, "capture load complete");
                    on_progress(processed, expected.max(processed));
                    return Ok(false);
                }
                Err(ReaderError::StreamFailed(message)) => {
                    warn!(packets = processed, error = %message, "capture stream truncated mid-read");
                    on_progress(processed, expected.max(processed));
                    return Ok(true);
                }
                Err(err @ ReaderError::StartFailed(_)) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProtocolTag;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct FakeHandle {
        remaining: Vec<PacketRecord>,
    }

    struct FakeReader {
        frames: Mutex<Option<Vec<PacketRecord>>>,
        parallel: bool,
    }

    #[async_trait::async_trait]
    impl CaptureReader for FakeReader {
        type Handle = FakeHandle;

        async fn count_packets(&self, _path: &Path) -> Result<u64, ReaderError> {
            Ok(0)
        }

        async fn start_stream(&self, _path: &Path) -> Result<Self::Handle, ReaderError> {
            let frames = self.frames.lock().unwrap().take().unwrap_or_default();
            Ok(FakeHandle { remaining: frames })
        }

        async fn next_packet(
            &self,
            handle: &mut Self::Handle,
        ) -> Result<Option<PacketRecord>, ReaderError> {
            Ok(if handle.remaining.is_empty() {
                None
            } else {
                Some(handle.remaining.remove(0))
            })
        }

        async fn stop(&self, _handle: Self::Handle) {}

        fn reports_parallel_order(&self) -> bool {
            self.parallel
        }
    }

    fn record(frame_number: u64) -> PacketRecord {
        PacketRecord {
            frame_number,
            timestamp_ns: 0,
            length: 64,
            src_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            dst_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            src_port: 1,
            dst_port: 2,
            protocol: ProtocolTag::Other,
            app_protocol_hint: None,
            tcp_flags: None,
            os_fingerprint: None,
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn reorders_out_of_order_frames_when_parallel() {
        let reader = FakeReader {
            frames: Mutex::new(Some(vec![record(3), record(1), record(2)])),
            parallel: true,
        };
        let mut loader = PacketLoader::new(reader, NoopFingerprintAccumulator);
        let outcome = loader
            .load(Path::new("fake.pcap"), &|_, _| {})
            .await
            .unwrap();
        assert!(!outcome.truncated);
        let numbers: Vec<u64> = outcome.packets.iter().map(|p| p.frame_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn keeps_stream_order_when_not_parallel() {
        let reader = FakeReader {
            frames: Mutex::new(Some(vec![record(3), record(1), record(2)])),
            parallel: false,
        };
        let mut loader = PacketLoader::new(reader, NoopFingerprintAccumulator);
        let outcome = loader
            .load(Path::new("fake.pcap"), &|_, _| {})
            .await
            .unwrap();
        assert!(!outcome.truncated);
        let numbers: Vec<u64> = outcome.packets.iter().map(|p| p.frame_number).collect();
        assert_eq!(numbers, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn reports_final_progress_even_under_interval() {
        let reader = FakeReader {
            frames: Mutex::new(Some(vec![record(1), record(2)])),
            parallel: false,
        };
        let mut loader = PacketLoader::new(reader, NoopFingerprintAccumulator);
        let calls = AtomicU64::new(0);
        loader
            .load(Path::new("fake.pcap"), &|processed, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(processed, 2);
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct FailingHandle {
        remaining: Vec<PacketRecord>,
        fail_after: usize,
    }

    /// Yields its frames, then fails the stream with `StreamFailed` once
    /// `fail_after` records have been returned.
    struct FailingReader {
        frames: Mutex<Option<Vec<PacketRecord>>>,
        fail_after: usize,
    }

    #[async_trait::async_trait]
    impl CaptureReader for FailingReader {
        type Handle = FailingHandle;

        async fn count_packets(&self, _path: &Path) -> Result<u64, ReaderError> {
            Ok(0)
        }

        async fn start_stream(&self, _path: &Path) -> Result<Self::Handle, ReaderError> {
            let frames = self.frames.lock().unwrap().take().unwrap_or_default();
            Ok(FailingHandle {
                remaining: frames,
                fail_after: self.fail_after,
            })
        }

        async fn next_packet(
            &self,
            handle: &mut Self::Handle,
        ) -> Result<Option<PacketRecord>, ReaderError> {
            if handle.fail_after == 0 {
                return Err(ReaderError::StreamFailed("simulated mid-stream failure".to_string()));
            }
            handle.fail_after -= 1;
            Ok(if handle.remaining.is_empty() {
                None
            } else {
                Some(handle.remaining.remove(0))
            })
        }

        async fn stop(&self, _handle: Self::Handle) {}
    }

    #[tokio::test]
    async fn stream_failure_truncates_instead_of_erroring() {
        let reader = FailingReader {
            frames: Mutex::new(Some(vec![record(1), record(2), record(3)])),
            fail_after: 2,
        };
        let mut loader = PacketLoader::new(reader, NoopFingerprintAccumulator);
        let outcome = loader
            .load(Path::new("fake.pcap"), &|_, _| {})
            .await
            .expect("stream failure truncates rather than erroring");
        assert!(outcome.truncated);
        let numbers: Vec<u64> = outcome.packets.iter().map(|p| p.frame_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }
}
