//! PCAP/PCAPNG-backed [`CaptureReader`](super::reader::CaptureReader).

mod decode;
mod error;
mod layout;
mod parser;
mod reader;

pub use error::PcapSourceError;
pub use parser::{PcapCaptureReader, PcapHandle};
