//! Per-disk block device adapters.


use std::fs;
use std::path::PathBuf;

use memmap2::MmapOptions;
use rand::Rng;

use crate::error::{RaidError, RaidResult};

/// Probability that `corrupt_block` flips any given byte.
const CORRUPT_PROB: f64 = 0.2;

/// `BlockDevice` is the capability one disk exposes to the array:
/// fixed-size block IO plus the probes and fault hooks the recovery
/// layer relies on. A freshly constructed device is missing until the
/// first `reset`.
pub trait BlockDevice {
    /// `reset` (re)creates the disk with every block zero-filled.
    ///
    /// # Errors
    /// Returns an error when the backing storage cannot be prepared.
    fn reset(&mut self) -> anyhow::Result<()>;

    /// `status` probes disk-level liveness.
    ///
    /// # Errors
    /// `DiskMissing` when the disk namespace is gone.
    fn status(&self) -> RaidResult<()>;

    /// `block_status` probes one block.
    ///
    /// # Errors
    /// `DiskMissing` when the disk is gone, `BlockMissing` when the
    /// block is absent or mis-sized.
    fn block_status(&self, block: usize) -> RaidResult<()>;

    /// `read_block` returns the block contents. Any unreadable block
    /// reports as missing so the recovery layer can rebuild it.
    ///
    /// # Errors
    /// `DiskMissing` or `BlockMissing`, as for `block_status`.
    fn read_block(&self, block: usize) -> RaidResult<Vec<u8>>;

    /// `write_block` stores a full block, recreating the disk namespace
    /// if it went missing. The buffer length must equal the block size.
    ///
    /// # Errors
    /// Returns an error when the backing storage rejects the write.
    fn write_block(&mut self, block: usize, bytes: &[u8]) -> anyhow::Result<()>;

    /// `fail` simulates loss of the whole disk.
    ///
    /// # Errors
    /// Returns an error when the backing storage cannot be torn down.
    fn fail(&mut self) -> anyhow::Result<()>;

    /// `corrupt_block` flips each byte of the block with probability
    /// 0.2, in place, without updating any syndrome.
    ///
    /// # Errors
    /// `DiskMissing` or `BlockMissing` when the block cannot be reached.
    fn corrupt_block(&mut self, block: usize) -> RaidResult<()>;
}

fn corrupt_bytes(bytes: &mut [u8]) {
    let mut rng = rand::rng();
    for byte in bytes.iter_mut() {
        if rng.random_bool(CORRUPT_PROB) {
            *byte = rng.random();
        }
    }
}

/// `DirDisk` keeps one file per block under a per-disk directory, block
/// files memory-mapped for IO. Disk-missing means the directory is
/// absent; block-missing means the file is absent or mis-sized.
pub struct DirDisk {
    dir: PathBuf,
    blocks: usize,
    block_size: usize,
}

impl DirDisk {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, blocks: usize, block_size: usize) -> Self {
        Self {
            dir: dir.into(),
            blocks,
            block_size,
        }
    }

    fn block_path(&self, block: usize) -> PathBuf {
        self.dir.join(format!("block_{block}"))
    }
}

impl BlockDevice for DirDisk {
    fn reset(&mut self) -> anyhow::Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        fs::create_dir_all(&self.dir)?;
        let zeros = vec![0u8; self.block_size];
        for block in 0..self.blocks {
            fs::write(self.block_path(block), &zeros)?;
        }
        Ok(())
    }

    fn status(&self) -> RaidResult<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(RaidError::DiskMissing)
        }
    }

    fn block_status(&self, block: usize) -> RaidResult<()> {
        self.status()?;
        match fs::metadata(self.block_path(block)) {
            Ok(meta) if meta.is_file() && meta.len() == self.block_size as u64 => Ok(()),
            _ => Err(RaidError::BlockMissing),
        }
    }

    fn read_block(&self, block: usize) -> RaidResult<Vec<u8>> {
        self.status()?;
        let Ok(file) = fs::File::open(self.block_path(block)) else {
            return Err(RaidError::BlockMissing);
        };
        match file.metadata() {
            Ok(meta) if meta.len() == self.block_size as u64 => {}
            _ => return Err(RaidError::BlockMissing),
        }
        let Ok(map) = (unsafe { MmapOptions::new().map(&file) }) else {
            return Err(RaidError::BlockMissing);
        };
        Ok(map.to_vec())
    }

    fn write_block(&mut self, block: usize, bytes: &[u8]) -> anyhow::Result<()> {
        if !self.dir.is_dir() {
            fs::create_dir_all(&self.dir)?;
        }
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.block_path(block))?;
        file.set_len(self.block_size as u64)?;
        let mut map = unsafe { MmapOptions::new().map_mut(&file)? };
        map.copy_from_slice(bytes);
        Ok(())
    }

    fn fail(&mut self) -> anyhow::Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }

    fn corrupt_block(&mut self, block: usize) -> RaidResult<()> {
        self.block_status(block)?;
        let Ok(file) = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.block_path(block))
        else {
            return Err(RaidError::BlockMissing);
        };
        let Ok(mut map) = (unsafe { MmapOptions::new().map_mut(&file) }) else {
            return Err(RaidError::BlockMissing);
        };
        corrupt_bytes(&mut map);
        Ok(())
    }
}

/// `MemDisk` is the in-memory adapter: the same observable semantics as
/// [`DirDisk`] without touching the filesystem.
pub struct MemDisk {
    blocks: usize,
    block_size: usize,
    /// `None` while the disk is missing; a missing cell is a lost block.
    cells: Option<Vec<Option<Vec<u8>>>>,
}

impl MemDisk {
    #[must_use]
    pub fn new(blocks: usize, block_size: usize) -> Self {
        Self {
            blocks,
            block_size,
            cells: None,
        }
    }
}

impl BlockDevice for MemDisk {
    fn reset(&mut self) -> anyhow::Result<()> {
        self.cells = Some(vec![Some(vec![0u8; self.block_size]); self.blocks]);
        Ok(())
    }

    fn status(&self) -> RaidResult<()> {
        if self.cells.is_some() {
            Ok(())
        } else {
            Err(RaidError::DiskMissing)
        }
    }

    fn block_status(&self, block: usize) -> RaidResult<()> {
        let cells = self.cells.as_ref().ok_or(RaidError::DiskMissing)?;
        match cells.get(block) {
            Some(Some(bytes)) if bytes.len() == self.block_size => Ok(()),
            _ => Err(RaidError::BlockMissing),
        }
    }

    fn read_block(&self, block: usize) -> RaidResult<Vec<u8>> {
        let cells = self.cells.as_ref().ok_or(RaidError::DiskMissing)?;
        match cells.get(block) {
            Some(Some(bytes)) if bytes.len() == self.block_size => Ok(bytes.clone()),
            _ => Err(RaidError::BlockMissing),
        }
    }

    fn write_block(&mut self, block: usize, bytes: &[u8]) -> anyhow::Result<()> {
        if block >= self.blocks {
            anyhow::bail!("block index out of range: {block} (blocks={})", self.blocks);
        }
        let cells = self
            .cells
            .get_or_insert_with(|| vec![None; self.blocks]);
        cells[block] = Some(bytes.to_vec());
        Ok(())
    }

    fn fail(&mut self) -> anyhow::Result<()> {
        self.cells = None;
        Ok(())
    }

    fn corrupt_block(&mut self, block: usize) -> RaidResult<()> {
        let cells = self.cells.as_mut().ok_or(RaidError::DiskMissing)?;
        match cells.get_mut(block) {
            Some(Some(bytes)) => {
                corrupt_bytes(bytes);
                Ok(())
            }
            _ => Err(RaidError::BlockMissing),
        }
    }
}
