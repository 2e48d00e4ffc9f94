//! Byte-level constants for the PCAP/PCAPNG capture reader.

/// PCAPNG files begin with a Section Header Block magic of `0x0A0D0D0A`.
pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Internal read buffer size handed to `pcap-parser`'s streaming readers.
pub const PCAP_READER_BUFFER_SIZE: usize = 1 << 16;
