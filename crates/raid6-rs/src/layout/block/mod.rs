//! On-disk data-block format: a 12-byte header plus zero-padded payload.


/// Bytes reserved for the block header.
pub const HEADER_LEN: usize = 12;

/// `BlockAddr` addresses one block on one disk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockAddr {
    pub disk: usize,
    pub block: usize,
}

impl BlockAddr {
    #[must_use]
    pub const fn new(disk: usize, block: usize) -> Self {
        Self { disk, block }
    }
}

/// `BlockHeader` is the fixed prefix of every data block:
///
/// ```text
/// off  len  field
///  0    4   payload_len (u32 LE)   0 marks a free block
///  4    4   next disk   (u32 LE)
///  8    4   next block  (u32 LE)
/// ```
///
/// A block whose `next` equals its own address terminates its chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub payload_len: u32,
    pub next: BlockAddr,
}

impl BlockHeader {
    /// `parse` decodes the header from the front of a block buffer.
    ///
    /// # Panics
    /// Panics if the buffer is shorter than [`HEADER_LEN`].
    #[must_use]
    pub fn parse(block: &[u8]) -> Self {
        let payload_len = u32::from_le_bytes(block[0..4].try_into().unwrap());
        let next_disk = u32::from_le_bytes(block[4..8].try_into().unwrap());
        let next_block = u32::from_le_bytes(block[8..12].try_into().unwrap());
        Self {
            payload_len,
            next: BlockAddr::new(next_disk as usize, next_block as usize),
        }
    }

    /// `write_to` encodes the header into the front of a block buffer.
    ///
    /// # Panics
    /// Panics if the buffer is shorter than [`HEADER_LEN`].
    pub fn write_to(&self, block: &mut [u8]) {
        block[0..4].copy_from_slice(&self.payload_len.to_le_bytes());
        block[4..8].copy_from_slice(&(self.next.disk as u32).to_le_bytes());
        block[8..12].copy_from_slice(&(self.next.block as u32).to_le_bytes());
    }

    /// `is_free` reports whether the block carries no payload.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.payload_len == 0
    }

    /// `terminates_at` reports whether this header ends a chain rooted
    /// at `addr`.
    #[must_use]
    pub fn terminates_at(&self, addr: BlockAddr) -> bool {
        self.next == addr
    }
}
