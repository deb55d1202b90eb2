use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

/// Size of the `magic + length` envelope in front of every stored block
pub const FRAME_HEADER_SIZE: usize = 8;

/// Serialized block header size (version .. nonce)
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Offset of `nTime` inside the 80-byte header
const TIME_OFFSET: usize = 68;

/// Network magic prefix of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetMagic(pub [u8; 4]);

impl fmt::Display for NetMagic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The 8 bytes in front of each block in a blk file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: NetMagic,
    pub length: u32,
}

impl FrameHeader {
    pub fn parse(buf: &[u8; FRAME_HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[..4]);
        Self {
            magic: NetMagic(magic),
            length: LittleEndian::read_u32(&buf[4..]),
        }
    }

    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[..4].copy_from_slice(&self.magic.0);
        LittleEndian::write_u32(&mut buf[4..], self.length);
        buf
    }
}

/// One framed block as read from an input file.
///
/// The payload is kept verbatim so it can be re-emitted byte for byte.
#[derive(Debug, Clone)]
pub struct BlockRecord {
    pub frame: FrameHeader,
    pub payload: Vec<u8>,
}

impl BlockRecord {
    /// First 80 bytes of the payload.
    ///
    /// `BlockStream` rejects payloads shorter than a header, so this never
    /// panics for records it produced.
    pub fn header_bytes(&self) -> &[u8; BLOCK_HEADER_SIZE] {
        self.payload[..BLOCK_HEADER_SIZE]
            .try_into()
            .expect("payload holds at least a full header")
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader::parse(self.header_bytes())
    }

    pub fn time(&self) -> u32 {
        LittleEndian::read_u32(&self.payload[TIME_OFFSET..TIME_OFFSET + 4])
    }

    /// Bytes this record occupies on disk, envelope included
    pub fn frame_size(&self) -> u64 {
        FRAME_HEADER_SIZE as u64 + self.payload.len() as u64
    }
}

/// Decoded view of the fixed 80-byte header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub n_version: u32,
    pub hash_prev_block: [u8; 32],
    pub hash_merkle_root: [u8; 32],
    pub n_time: u32,
    pub n_bits: u32,
    pub n_nonce: u32,
}

impl BlockHeader {
    pub fn parse(raw: &[u8; BLOCK_HEADER_SIZE]) -> Self {
        let mut hash_prev_block = [0u8; 32];
        hash_prev_block.copy_from_slice(&raw[4..36]);
        let mut hash_merkle_root = [0u8; 32];
        hash_merkle_root.copy_from_slice(&raw[36..68]);

        Self {
            n_version: LittleEndian::read_u32(&raw[0..4]),
            hash_prev_block,
            hash_merkle_root,
            n_time: LittleEndian::read_u32(&raw[TIME_OFFSET..72]),
            n_bits: LittleEndian::read_u32(&raw[72..76]),
            n_nonce: LittleEndian::read_u32(&raw[76..80]),
        }
    }
}

/// Calendar month a block timestamp falls into (day fixed to 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
}

impl MonthBucket {
    pub const fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for MonthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
