//! The public file layer: named files stored as block chains over the
//! RAID-6 volume.

pub mod table;

#[cfg(test)]
mod store_tests;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{RaidError, RaidResult};
use crate::layout::block::{BlockAddr, BlockHeader, HEADER_LEN};
use crate::metrics::{self, IoOpType, StoreOp};
use crate::retention::array::{Array, Geometry};
use crate::retention::disk::{BlockDevice, DirDisk, MemDisk};
use crate::retention::volume::Volume;
use crate::store::table::{DataScan, FileEntry, FileTable};

/// `DeviceSpec` selects the adapter backing one disk.
#[derive(Clone, Debug)]
pub enum DeviceSpec {
    /// Directory-backed disk rooted at the given path.
    Dir(PathBuf),
    /// In-memory disk.
    Mem,
}

/// `StoreConfig` fixes the array geometry and backing devices.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Per-disk capacity in bytes; must be a multiple of `block_size`.
    pub disk_size: u64,
    /// Block size in bytes; at least one table entry must fit.
    pub block_size: usize,
    /// Upper bound on stored files; defaults to the data-block capacity.
    pub max_files: Option<usize>,
    /// One adapter per disk, at least four.
    pub devices: Vec<DeviceSpec>,
}

/// `FileStore` owns the whole array and exposes the file operations.
/// Single-writer: every call runs to completion before the next.
pub struct FileStore {
    volume: Volume,
    table: FileTable,
    /// Payload bytes per data block.
    data_len: usize,
    /// Data blocks available to file chains (total minus table).
    max_data_blocks: usize,
}

impl FileStore {
    /// `open` validates the configuration and assembles the store. The
    /// disks are attached as-is; call [`format`](Self::format) to zero a
    /// fresh array.
    ///
    /// # Errors
    /// Returns an error for fewer than four disks, a block size that
    /// cannot hold a table entry, or a disk size that is not a positive
    /// multiple of the block size.
    pub fn open(config: StoreConfig) -> anyhow::Result<Self> {
        let disks = config.devices.len();
        if disks < 4 {
            anyhow::bail!("RAID-6 needs at least 4 disks, got {disks}");
        }
        if config.block_size < table::ENTRY_LEN {
            anyhow::bail!(
                "block size {} is below the {}-byte minimum",
                config.block_size,
                table::ENTRY_LEN
            );
        }
        if config.disk_size == 0 || config.disk_size % config.block_size as u64 != 0 {
            anyhow::bail!(
                "disk size {} is not a positive multiple of the block size",
                config.disk_size
            );
        }

        let blocks = usize::try_from(config.disk_size / config.block_size as u64)?;
        let geom = Geometry {
            disks,
            blocks,
            block_size: config.block_size,
        };
        let devices: Vec<Box<dyn BlockDevice>> = config
            .devices
            .iter()
            .map(|spec| match spec {
                DeviceSpec::Dir(path) => {
                    Box::new(DirDisk::new(path.clone(), blocks, config.block_size))
                        as Box<dyn BlockDevice>
                }
                DeviceSpec::Mem => Box::new(MemDisk::new(blocks, config.block_size)),
            })
            .collect();
        let array = Array::new(geom, devices)?;

        let data_capacity = (disks - 2) * blocks;
        let max_files = config.max_files.unwrap_or(data_capacity).min(data_capacity);
        let table = FileTable::new(geom, max_files)?;
        if table.block_count() >= data_capacity {
            anyhow::bail!("file table leaves no room for data blocks");
        }

        let max_data_blocks = data_capacity - table.block_count();
        Ok(Self {
            volume: Volume::new(array),
            table,
            data_len: config.block_size - HEADER_LEN,
            max_data_blocks,
        })
    }

    /// `format` zero-resets every disk. P and Q of an all-zero stripe
    /// are zero, so a formatted array already satisfies the parity
    /// invariant.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn format(&mut self) -> anyhow::Result<()> {
        for d in 0..self.geometry().disks {
            self.volume.reset_disk(d)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.volume.geometry()
    }

    /// `max_data_blocks` returns the chain capacity of the array.
    #[must_use]
    pub const fn max_data_blocks(&self) -> usize {
        self.max_data_blocks
    }

    /// `add_file` stores `bytes` under `name` as a fresh block chain.
    ///
    /// # Errors
    /// `NameExists`, `InvalidArgument` (bad name), `OutOfSpace`,
    /// `TableFull`; device loss beyond recovery surfaces as
    /// `Unrecoverable`.
    pub fn add_file(&mut self, name: &str, bytes: &[u8]) -> RaidResult<()> {
        let start = metrics::is_enabled().then(Instant::now);
        let res = self.add_file_inner(name, bytes);
        record_op(IoOpType::Write, bytes.len(), start, res.is_err());
        res
    }

    fn add_file_inner(&mut self, name: &str, bytes: &[u8]) -> RaidResult<()> {
        self.ensure_capacity_for(name, bytes.len())?;
        let head = self
            .next_free_block(self.table.last_block())?
            .ok_or(RaidError::OutOfSpace)?;
        let size = u32::try_from(bytes.len()).map_err(|_| RaidError::InvalidArgument)?;
        self.table.insert(&mut self.volume, name, size, head)?;
        self.write_chain(name, head, bytes)?;
        debug!(name, bytes = bytes.len(), "file stored");
        Ok(())
    }

    /// `read_file` returns the file's bytes, or `None` when the name is
    /// not in the table.
    ///
    /// # Errors
    /// Device loss beyond recovery surfaces as `Unrecoverable`.
    pub fn read_file(&mut self, name: &str) -> RaidResult<Option<Vec<u8>>> {
        let start = metrics::is_enabled().then(Instant::now);
        let res = self.read_file_inner(name);
        let bytes = match &res {
            Ok(Some(data)) => data.len(),
            _ => 0,
        };
        record_op(IoOpType::Read, bytes, start, res.is_err());
        res
    }

    fn read_file_inner(&mut self, name: &str) -> RaidResult<Option<Vec<u8>>> {
        let Some(entry) = self.table.lookup(&mut self.volume, name)? else {
            return Ok(None);
        };
        let mut data = Vec::with_capacity(entry.size as usize);
        if entry.size == 0 {
            return Ok(Some(data));
        }
        let mut at = entry.head;
        loop {
            let block = self.volume.read_block(at.disk, at.block)?;
            let header = BlockHeader::parse(&block);
            if header.is_free() {
                break;
            }
            let take = (header.payload_len as usize).min(self.data_len);
            data.extend_from_slice(&block[HEADER_LEN..HEADER_LEN + take]);
            if header.terminates_at(at) {
                break;
            }
            at = header.next;
        }
        Ok(Some(data))
    }

    /// `del_file` removes the table entry and zeroes the chain.
    /// Deleting an absent name is a no-op.
    ///
    /// # Errors
    /// Device loss beyond recovery surfaces as `Unrecoverable`.
    pub fn del_file(&mut self, name: &str) -> RaidResult<()> {
        let start = metrics::is_enabled().then(Instant::now);
        let res = self.del_file_inner(name);
        record_op(IoOpType::Write, 0, start, res.is_err());
        res
    }

    fn del_file_inner(&mut self, name: &str) -> RaidResult<()> {
        let Some(entry) = self.table.lookup(&mut self.volume, name)? else {
            return Ok(());
        };
        self.table.delete(&mut self.volume, &entry)?;
        if entry.size == 0 {
            return Ok(());
        }
        let zeros = vec![0u8; self.geometry().block_size];
        let mut at = entry.head;
        loop {
            let block = self.volume.read_block(at.disk, at.block)?;
            let header = BlockHeader::parse(&block);
            self.volume.write_block(at.disk, at.block, &zeros)?;
            self.volume.rewrite_parity(at.block)?;
            if header.is_free() || header.terminates_at(at) {
                break;
            }
            at = header.next;
        }
        debug!(name, "file deleted");
        Ok(())
    }

    /// `modify_file` replaces the byte range `[begin, end)` with
    /// `bytes`. Same-length edits are patched in place; size-changing
    /// edits splice and rewrite the whole file.
    ///
    /// # Errors
    /// `NameNotFound`, `InvalidArgument` for a range outside the file,
    /// `OutOfSpace` when a growing edit does not fit.
    pub fn modify_file(&mut self, name: &str, begin: usize, end: usize, bytes: &[u8]) -> RaidResult<()> {
        let start = metrics::is_enabled().then(Instant::now);
        let res = self.modify_file_inner(name, begin, end, bytes);
        record_op(IoOpType::Write, bytes.len(), start, res.is_err());
        res
    }

    fn modify_file_inner(&mut self, name: &str, begin: usize, end: usize, bytes: &[u8]) -> RaidResult<()> {
        let Some(entry) = self.table.lookup(&mut self.volume, name)? else {
            return Err(RaidError::NameNotFound);
        };
        let size = entry.size as usize;
        if begin > end || end > size {
            return Err(RaidError::InvalidArgument);
        }

        if bytes.len() != end - begin {
            // Size-changing edit: splice in memory and rewrite.
            let new_size = size - (end - begin) + bytes.len();
            self.ensure_room_for_resize(&entry, new_size)?;
            let Some(current) = self.read_file_inner(name)? else {
                return Err(RaidError::NameNotFound);
            };
            let mut spliced = Vec::with_capacity(new_size);
            spliced.extend_from_slice(&current[..begin]);
            spliced.extend_from_slice(bytes);
            spliced.extend_from_slice(&current[end..]);
            self.del_file_inner(name)?;
            return self.add_file_inner(name, &spliced);
        }

        if begin == end {
            return Ok(());
        }

        // In-place patch of every block overlapping [begin, end).
        let mut offset = 0usize;
        let mut at = entry.head;
        while offset < end {
            let mut block = self.volume.read_block(at.disk, at.block)?;
            let header = BlockHeader::parse(&block);
            if offset + self.data_len > begin {
                let lo = begin.saturating_sub(offset);
                let hi = (end - offset).min(self.data_len);
                block[HEADER_LEN + lo..HEADER_LEN + hi]
                    .copy_from_slice(&bytes[offset + lo - begin..offset + hi - begin]);
                self.volume.write_block(at.disk, at.block, &block)?;
                self.volume.rewrite_parity(at.block)?;
            }
            if header.terminates_at(at) {
                break;
            }
            at = header.next;
            offset += self.data_len;
        }
        Ok(())
    }

    /// `list_files` returns the live table entries in canonical order.
    ///
    /// # Errors
    /// Device loss beyond recovery surfaces as `Unrecoverable`.
    pub fn list_files(&mut self) -> RaidResult<Vec<FileEntry>> {
        self.table.list(&mut self.volume)
    }

    /// `check_and_recover_corruption` scans one stripe for a single
    /// corrupted block and rewrites it from the syndromes.
    ///
    /// # Errors
    /// `MultiCorruption` or `Unrecoverable` when more than one symbol
    /// per offset is wrong.
    pub fn check_and_recover_corruption(&mut self, stripe: usize) -> RaidResult<()> {
        self.volume.repair_corruption(stripe)
    }

    /// `take_recovery_duration` returns the wall-clock of the most
    /// recent recovery pass and clears it.
    pub fn take_recovery_duration(&mut self) -> Option<Duration> {
        self.volume.take_recovery_duration()
    }

    /// `reset_disk` zero-fills one disk.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn reset_disk(&mut self, disk: usize) -> anyhow::Result<()> {
        self.volume.reset_disk(disk)
    }

    /// `fail_disk` simulates losing a whole disk.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn fail_disk(&mut self, disk: usize) -> anyhow::Result<()> {
        self.volume.fail_disk(disk)
    }

    /// `check_disk` probes one disk.
    ///
    /// # Errors
    /// `DiskMissing` when the disk namespace is gone.
    pub fn check_disk(&self, disk: usize) -> RaidResult<()> {
        self.volume.check_disk(disk)
    }

    /// `corrupt_block` randomly flips bytes of one block.
    ///
    /// # Errors
    /// `DiskMissing` or `BlockMissing`.
    pub fn corrupt_block(&mut self, disk: usize, block: usize) -> RaidResult<()> {
        self.volume.corrupt_block(disk, block)
    }

    /// `status_string` returns a human-readable per-disk summary.
    #[must_use]
    pub fn status_string(&self) -> String {
        self.volume.status_string()
    }

    /// Capacity precheck in whole-block units; the chain writer still
    /// unwinds if the estimate was short.
    fn ensure_capacity_for(&mut self, name: &str, len: usize) -> RaidResult<()> {
        let entries = self.table.list(&mut self.volume)?;
        let block_size = self.geometry().block_size;
        let mut occupied = 0usize;
        for entry in &entries {
            if entry.name == name {
                return Err(RaidError::NameExists);
            }
            occupied += (entry.size as usize).div_ceil(block_size);
        }
        if occupied + len.div_ceil(block_size) > self.max_data_blocks {
            return Err(RaidError::OutOfSpace);
        }
        Ok(())
    }

    fn ensure_room_for_resize(&mut self, entry: &FileEntry, new_size: usize) -> RaidResult<()> {
        let entries = self.table.list(&mut self.volume)?;
        let block_size = self.geometry().block_size;
        let mut occupied = 0usize;
        for e in &entries {
            let size = if e.name == entry.name { new_size } else { e.size as usize };
            occupied += size.div_ceil(block_size);
        }
        if occupied > self.max_data_blocks {
            return Err(RaidError::OutOfSpace);
        }
        Ok(())
    }

    /// `next_free_block` scans data positions after `from` for a block
    /// whose header marks it free.
    fn next_free_block(&mut self, from: BlockAddr) -> RaidResult<Option<BlockAddr>> {
        let geom = self.geometry();
        for addr in DataScan::after(geom.disks, geom.blocks, from) {
            let block = self.volume.read_block(addr.disk, addr.block)?;
            if BlockHeader::parse(&block).is_free() {
                return Ok(Some(addr));
            }
        }
        Ok(None)
    }

    fn write_chain(&mut self, name: &str, head: BlockAddr, bytes: &[u8]) -> RaidResult<()> {
        let block_size = self.geometry().block_size;
        let mut offset = 0usize;
        let mut at = head;
        while offset < bytes.len() {
            let remaining = bytes.len() - offset;
            let mut block = vec![0u8; block_size];
            if remaining > self.data_len {
                let Some(next) = self.next_free_block(at)? else {
                    // Out of blocks mid-chain: unwind what was written.
                    self.del_file_inner(name)?;
                    return Err(RaidError::OutOfSpace);
                };
                BlockHeader {
                    payload_len: self.data_len as u32,
                    next,
                }
                .write_to(&mut block);
                block[HEADER_LEN..].copy_from_slice(&bytes[offset..offset + self.data_len]);
                self.volume.write_block(at.disk, at.block, &block)?;
                self.volume.rewrite_parity(at.block)?;
                at = next;
                offset += self.data_len;
            } else {
                BlockHeader {
                    payload_len: remaining as u32,
                    next: at,
                }
                .write_to(&mut block);
                block[HEADER_LEN..HEADER_LEN + remaining].copy_from_slice(&bytes[offset..]);
                self.volume.write_block(at.disk, at.block, &block)?;
                self.volume.rewrite_parity(at.block)?;
                offset = bytes.len();
            }
        }
        Ok(())
    }
}

fn record_op(op: IoOpType, bytes: usize, start: Option<Instant>, error: bool) {
    if let Some(start) = start {
        metrics::record_store_op(StoreOp {
            op,
            bytes: bytes as u64,
            latency_seconds: start.elapsed().as_secs_f64(),
            error,
        });
    }
}
