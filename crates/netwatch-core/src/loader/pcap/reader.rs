//! Low-level byte access shared by the legacy and NG parsers.

use std::io::{Read, Seek, SeekFrom};

use pcap_parser::Linktype;

use super::error::PcapSourceError;
use super::layout;

pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &layout::PCAPNG_MAGIC
}

/// Converts a PCAPNG enhanced-packet block's split timestamp (high/low
/// 32-bit words, microsecond resolution per the default `if_tsresol`) into
/// fractional seconds.
pub fn pcapng_ts_to_seconds(ts_high: u32, ts_low: u32) -> f64 {
    let ts_raw = ((ts_high as u64) << 32) | ts_low as u64;
    ts_raw as f64 * 1e-6
}

/// Resolves the link type recorded for `if_id` by the NG reader's earlier
/// Interface Description Blocks, defaulting to Ethernet if the index is
/// unknown (a capture with a single unlabeled interface).
pub fn linktype_for_interface(linktypes: &[Linktype], if_id: u32) -> Linktype {
    linktypes
        .get(if_id as usize)
        .copied()
        .unwrap_or(Linktype::ETHERNET)
}

#[cfg(test)]
mod tests {
    use super::{is_pcapng_magic, pcapng_ts_to_seconds, read_magic_and_rewind};
    use crate::loader::pcap::error::PcapSourceError;
    use std::io::Cursor;
    use std::io::Read;

    #[test]
    fn detect_pcapng_magic() {
        let data = super::layout::PCAPNG_MAGIC;
        assert!(is_pcapng_magic(&data));
    }

    #[test]
    fn read_magic_rewinds() {
        let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
        let mut cursor = Cursor::new(bytes);
        let magic = read_magic_and_rewind(&mut cursor).unwrap();
        assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
        let mut buf = [0u8; 1];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], 0x0a);
    }

    #[test]
    fn read_magic_too_short() {
        let bytes = [0x0a, 0x0d, 0x0d];
        let mut cursor = Cursor::new(bytes);
        let err = read_magic_and_rewind(&mut cursor).unwrap_err();
        assert!(matches!(err, PcapSourceError::Io(_)));
    }

    #[test]
    fn ts_conversion_is_microsecond_resolution() {
        assert!((pcapng_ts_to_seconds(0, 1_000_000) - 1.0).abs() < 1e-9);
    }
}
