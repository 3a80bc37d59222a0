//! The file allocation table: fixed 32-byte entries packed into the
//! first data blocks of the array, scanned in canonical order.


use crate::error::{RaidError, RaidResult};
use crate::layout::block::BlockAddr;
use crate::layout::rotation::Placement;
use crate::retention::array::Geometry;
use crate::retention::volume::Volume;

/// Bytes per table entry.
pub const ENTRY_LEN: usize = 32;
/// Bytes reserved for the file name, NUL-padded.
pub const NAME_LEN: usize = 20;

/// `Slot` locates one table entry on disk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub addr: BlockAddr,
    pub offset: usize,
}

/// `FileEntry` is one live table slot: the file name, its byte size and
/// the head of its block chain, plus where the entry itself lives so
/// deletion can zero it in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u32,
    pub head: BlockAddr,
    pub slot: Slot,
}

/// `DataScan` iterates `(disk, block)` data positions in canonical
/// order: ascending disks within each block index, skipping the P and Q
/// members of every stripe.
pub struct DataScan {
    disks: usize,
    blocks: usize,
    next_disk: usize,
    next_block: usize,
}

impl DataScan {
    /// `from_start` scans from the first data position of block 0.
    #[must_use]
    pub const fn from_start(disks: usize, blocks: usize) -> Self {
        Self {
            disks,
            blocks,
            next_disk: 0,
            next_block: 0,
        }
    }

    /// `after` scans data positions strictly after `prev`.
    #[must_use]
    pub const fn after(disks: usize, blocks: usize, prev: BlockAddr) -> Self {
        let (next_disk, next_block) = if prev.disk + 1 >= disks {
            (0, prev.block + 1)
        } else {
            (prev.disk + 1, prev.block)
        };
        Self {
            disks,
            blocks,
            next_disk,
            next_block,
        }
    }
}

impl Iterator for DataScan {
    type Item = BlockAddr;

    fn next(&mut self) -> Option<BlockAddr> {
        while self.next_block < self.blocks {
            let (disk, block) = (self.next_disk, self.next_block);
            if self.next_disk + 1 >= self.disks {
                self.next_disk = 0;
                self.next_block += 1;
            } else {
                self.next_disk += 1;
            }
            if Placement::of_stripe(block, self.disks).is_data(disk) {
                return Some(BlockAddr::new(disk, block));
            }
        }
        None
    }
}

/// `FileTable` fixes the table extent and drives slot IO through the
/// volume. The table occupies the first `block_count` data positions in
/// canonical order, ending exactly at `last_block`.
pub struct FileTable {
    geom: Geometry,
    last: BlockAddr,
    blocks: usize,
    entries_per_block: usize,
}

impl FileTable {
    /// `new` sizes the table for `max_files` entries.
    ///
    /// # Errors
    /// Fails when a block cannot hold a single entry or the array
    /// cannot hold the table.
    pub fn new(geom: Geometry, max_files: usize) -> anyhow::Result<Self> {
        let entries_per_block = geom.block_size / ENTRY_LEN;
        if entries_per_block == 0 {
            anyhow::bail!(
                "block size {} cannot hold a {ENTRY_LEN}-byte table entry",
                geom.block_size
            );
        }
        if max_files == 0 {
            anyhow::bail!("max_files must be positive");
        }
        let blocks = max_files.div_ceil(entries_per_block);
        let last = DataScan::from_start(geom.disks, geom.blocks)
            .nth(blocks - 1)
            .ok_or_else(|| anyhow::anyhow!("array too small for a {blocks}-block file table"))?;
        Ok(Self {
            geom,
            last,
            blocks,
            entries_per_block,
        })
    }

    /// `last_block` is the coordinate of the final table block; file
    /// data lives strictly after it in canonical order.
    #[must_use]
    pub const fn last_block(&self) -> BlockAddr {
        self.last
    }

    /// `block_count` returns how many data blocks the table occupies.
    #[must_use]
    pub const fn block_count(&self) -> usize {
        self.blocks
    }

    fn table_blocks(&self) -> impl Iterator<Item = BlockAddr> {
        let last = self.last;
        let mut finished = false;
        DataScan::from_start(self.geom.disks, self.geom.blocks)
            .take_while(move |addr| !std::mem::replace(&mut finished, *addr == last))
    }

    /// `lookup` finds the live entry with the given name.
    ///
    /// # Errors
    /// Propagates volume IO failures.
    pub fn lookup(&self, volume: &mut Volume, name: &str) -> RaidResult<Option<FileEntry>> {
        for addr in self.table_blocks() {
            let block = volume.read_block(addr.disk, addr.block)?;
            for slot in 0..self.entries_per_block {
                let offset = slot * ENTRY_LEN;
                let bytes = &block[offset..offset + ENTRY_LEN];
                if bytes[0] == 0 {
                    continue;
                }
                let entry = decode_entry(bytes, addr, offset);
                if entry.name == name {
                    return Ok(Some(entry));
                }
            }
        }
        Ok(None)
    }

    /// `insert` writes a new entry into the first free slot.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty, over-long or NUL-bearing name,
    /// `NameExists` on a duplicate, `TableFull` when no slot is free.
    pub fn insert(
        &self,
        volume: &mut Volume,
        name: &str,
        size: u32,
        head: BlockAddr,
    ) -> RaidResult<FileEntry> {
        let name_bytes = name.as_bytes();
        if name_bytes.is_empty() || name_bytes.len() > NAME_LEN || name_bytes.contains(&0) {
            return Err(RaidError::InvalidArgument);
        }
        if self.lookup(volume, name)?.is_some() {
            return Err(RaidError::NameExists);
        }
        for addr in self.table_blocks() {
            let mut block = volume.read_block(addr.disk, addr.block)?;
            for slot in 0..self.entries_per_block {
                let offset = slot * ENTRY_LEN;
                if block[offset] != 0 {
                    continue;
                }
                encode_entry(&mut block[offset..offset + ENTRY_LEN], name_bytes, size, head);
                volume.write_block(addr.disk, addr.block, &block)?;
                volume.rewrite_parity(addr.block)?;
                return Ok(FileEntry {
                    name: name.to_string(),
                    size,
                    head,
                    slot: Slot { addr, offset },
                });
            }
        }
        Err(RaidError::TableFull)
    }

    /// `delete` zeroes the entry's slot.
    ///
    /// # Errors
    /// Propagates volume IO failures.
    pub fn delete(&self, volume: &mut Volume, entry: &FileEntry) -> RaidResult<()> {
        let addr = entry.slot.addr;
        let mut block = volume.read_block(addr.disk, addr.block)?;
        block[entry.slot.offset..entry.slot.offset + ENTRY_LEN].fill(0);
        volume.write_block(addr.disk, addr.block, &block)?;
        volume.rewrite_parity(addr.block)
    }

    /// `list` returns every live entry in canonical order.
    ///
    /// # Errors
    /// Propagates volume IO failures.
    pub fn list(&self, volume: &mut Volume) -> RaidResult<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for addr in self.table_blocks() {
            let block = volume.read_block(addr.disk, addr.block)?;
            for slot in 0..self.entries_per_block {
                let offset = slot * ENTRY_LEN;
                let bytes = &block[offset..offset + ENTRY_LEN];
                if bytes[0] != 0 {
                    entries.push(decode_entry(bytes, addr, offset));
                }
            }
        }
        Ok(entries)
    }
}

fn decode_entry(bytes: &[u8], addr: BlockAddr, offset: usize) -> FileEntry {
    let name_end = bytes[..NAME_LEN]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(NAME_LEN);
    let name = String::from_utf8_lossy(&bytes[..name_end]).into_owned();
    let size = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
    let head_disk = u32::from_le_bytes(bytes[24..28].try_into().unwrap());
    let head_block = u32::from_le_bytes(bytes[28..32].try_into().unwrap());
    FileEntry {
        name,
        size,
        head: BlockAddr::new(head_disk as usize, head_block as usize),
        slot: Slot { addr, offset },
    }
}

fn encode_entry(slot: &mut [u8], name: &[u8], size: u32, head: BlockAddr) {
    slot.fill(0);
    slot[..name.len()].copy_from_slice(name);
    slot[20..24].copy_from_slice(&size.to_le_bytes());
    slot[24..28].copy_from_slice(&(head.disk as u32).to_le_bytes());
    slot[28..32].copy_from_slice(&(head.block as u32).to_le_bytes());
}
