//! Concrete [`CaptureReader`] backed by `pcap-parser`/`etherparse` (§4.1).
//!
//! The per-call work here is synchronous, mirroring the file format's own
//! sequential block structure; `PacketLoader` is responsible for keeping
//! the async runtime responsive around it (§4.1 implementation note).

use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader, traits::PcapReaderIterator,
};

use crate::model::PacketRecord;

use super::decode::decode_frame;
use super::error::PcapSourceError;
use super::layout;
use super::reader::{is_pcapng_magic, linktype_for_interface, pcapng_ts_to_seconds, read_magic_and_rewind};
use crate::loader::reader::{CaptureReader, ReaderError};

/// Reads packet records out of a `.pcap` or `.pcapng` file.
#[derive(Debug, Default)]
pub struct PcapCaptureReader;

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

/// Handle returned by [`PcapCaptureReader::start_stream`].
pub struct PcapHandle {
    inner: PcapReader,
    frame_counter: u64,
}

#[async_trait::async_trait]
impl CaptureReader for PcapCaptureReader {
    type Handle = PcapHandle;

    async fn count_packets(&self, path: &Path) -> Result<u64, ReaderError> {
        let file = File::open(path).map_err(|e| PcapSourceError::from(e).into_start_failed())?;
        let mut inner = create_reader(file).map_err(PcapSourceError::into_start_failed)?;
        let mut count = 0u64;
        loop {
            match next_raw(&mut inner).map_err(PcapSourceError::into_stream_failed)? {
                Some(_) => count += 1,
                None => return Ok(count),
            }
        }
    }

    async fn start_stream(&self, path: &Path) -> Result<Self::Handle, ReaderError> {
        let file = File::open(path).map_err(|e| PcapSourceError::from(e).into_start_failed())?;
        let inner = create_reader(file).map_err(PcapSourceError::into_start_failed)?;
        Ok(PcapHandle {
            inner,
            frame_counter: 0,
        })
    }

    async fn next_packet(
        &self,
        handle: &mut Self::Handle,
    ) -> Result<Option<PacketRecord>, ReaderError> {
        loop {
            let Some((ts_secs, linktype, data)) =
                next_raw(&mut handle.inner).map_err(PcapSourceError::into_stream_failed)?
            else {
                return Ok(None);
            };
            handle.frame_counter += 1;
            let timestamp_ns = (ts_secs * 1e9) as u128;
            if let Some(record) =
                decode_frame(handle.frame_counter, timestamp_ns, linktype, &data)
            {
                return Ok(Some(record));
            }
            // Undecodable frame (unsupported link type / malformed bytes):
            // keep pumping rather than fail the whole stream.
        }
    }

    async fn stop(&self, _handle: Self::Handle) {}
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            linktypes: Vec::new(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            linktype: None,
        })
    }
}

/// Pumps the underlying reader for the next raw frame, resolving the
/// per-interface link type but leaving decoding to the caller.
fn next_raw(reader: &mut PcapReader) -> Result<Option<(f64, Linktype, Vec<u8>)>, PcapSourceError> {
    loop {
        match reader {
            PcapReader::Legacy { reader, linktype } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *linktype = Some(header.network);
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => {
                            let ts = packet.ts_sec as f64 + (packet.ts_usec as f64 * 1e-6);
                            let lt = linktype.unwrap_or(Linktype::ETHERNET);
                            Some((ts, lt, packet.data.to_vec()))
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng { reader, linktypes } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            linktypes.push(intf.linktype);
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let ts = pcapng_ts_to_seconds(packet.ts_high, packet.ts_low);
                            let lt = linktype_for_interface(linktypes, packet.if_id);
                            Some((ts, lt, packet.data.to_vec()))
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}
