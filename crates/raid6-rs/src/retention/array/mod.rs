//! The disk array: N block devices sharing one geometry, plus the
//! stripe-wide write gate.


use tracing::warn;

use crate::error::{RaidError, RaidResult};
use crate::retention::disk::BlockDevice;

/// `Geometry` fixes the shared shape of every disk in the array.
#[derive(Copy, Clone, Debug)]
pub struct Geometry {
    pub disks: usize,
    pub blocks: usize,
    pub block_size: usize,
}

/// `Array` owns the member disks. Plain writes are refused while any
/// member of the target stripe is missing; forced writes go through and
/// recreate namespaces as needed, which is how recovery re-materializes
/// lost blocks.
pub struct Array {
    geom: Geometry,
    disks: Vec<Box<dyn BlockDevice>>,
}

impl Array {
    /// `new` assembles the array.
    ///
    /// # Errors
    /// Returns an error when the device count does not match the
    /// geometry.
    pub fn new(geom: Geometry, disks: Vec<Box<dyn BlockDevice>>) -> anyhow::Result<Self> {
        if disks.len() != geom.disks {
            anyhow::bail!("expected {} devices, got {}", geom.disks, disks.len());
        }
        Ok(Self { geom, disks })
    }

    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geom
    }

    /// `reset_disk` zero-fills every block of one disk.
    ///
    /// # Errors
    /// Returns an error on an out-of-range index or a device failure.
    pub fn reset_disk(&mut self, disk: usize) -> anyhow::Result<()> {
        if disk >= self.geom.disks {
            anyhow::bail!("disk index out of range: {disk} (disks={})", self.geom.disks);
        }
        self.disks[disk].reset()
    }

    /// `check_disk` probes one disk.
    ///
    /// # Errors
    /// `DiskMissing` when the disk namespace is gone.
    pub fn check_disk(&self, disk: usize) -> RaidResult<()> {
        self.index_ok(disk, 0)?;
        self.disks[disk].status()
    }

    /// `check_block` probes one block.
    ///
    /// # Errors
    /// `DiskMissing` or `BlockMissing`.
    pub fn check_block(&self, disk: usize, block: usize) -> RaidResult<()> {
        self.index_ok(disk, block)?;
        self.disks[disk].block_status(block)
    }

    /// `check_stripe` reports the first failure among the members of the
    /// stripe at `block`.
    ///
    /// # Errors
    /// The status of the first missing member.
    pub fn check_stripe(&self, block: usize) -> RaidResult<()> {
        for disk in &self.disks {
            disk.block_status(block)?;
        }
        Ok(())
    }

    /// `read_block` returns one block's contents.
    ///
    /// # Errors
    /// `InvalidArgument`, `DiskMissing` or `BlockMissing`.
    pub fn read_block(&self, disk: usize, block: usize) -> RaidResult<Vec<u8>> {
        self.index_ok(disk, block)?;
        self.disks[disk].read_block(block)
    }

    /// `write_block` stores one block. Non-forced writes fail with the
    /// stripe's failure status while any member at `block` is missing.
    ///
    /// # Errors
    /// `InvalidArgument` for bad indices or a mis-sized buffer; the
    /// stripe's failure status for gated writes; `DiskMissing` when the
    /// device rejects the write outright.
    pub fn write_block(&mut self, disk: usize, block: usize, bytes: &[u8], force: bool) -> RaidResult<()> {
        self.index_ok(disk, block)?;
        if bytes.len() != self.geom.block_size {
            return Err(RaidError::InvalidArgument);
        }
        if !force {
            self.check_stripe(block)?;
        }
        self.disks[disk].write_block(block, bytes).map_err(|err| {
            warn!(disk, block, ?err, "device rejected write");
            RaidError::DiskMissing
        })
    }

    /// `fail_disk` simulates losing a whole disk.
    ///
    /// # Errors
    /// Returns an error on an out-of-range index or a device failure.
    pub fn fail_disk(&mut self, disk: usize) -> anyhow::Result<()> {
        if disk >= self.geom.disks {
            anyhow::bail!("disk index out of range: {disk} (disks={})", self.geom.disks);
        }
        self.disks[disk].fail()
    }

    /// `corrupt_block` randomly flips bytes of one block.
    ///
    /// # Errors
    /// `InvalidArgument`, `DiskMissing` or `BlockMissing`.
    pub fn corrupt_block(&mut self, disk: usize, block: usize) -> RaidResult<()> {
        self.index_ok(disk, block)?;
        self.disks[disk].corrupt_block(block)
    }

    /// `status_string` returns a human-readable per-disk summary.
    #[must_use]
    pub fn status_string(&self) -> String {
        let mut out = String::new();
        for (i, disk) in self.disks.iter().enumerate() {
            let state = match disk.status() {
                Ok(()) => "OK",
                Err(_) => "MISSING",
            };
            out.push_str(&format!("disk {i}: {state}\n"));
        }
        out
    }

    fn index_ok(&self, disk: usize, block: usize) -> RaidResult<()> {
        if disk >= self.geom.disks || block >= self.geom.blocks {
            return Err(RaidError::InvalidArgument);
        }
        Ok(())
    }
}
