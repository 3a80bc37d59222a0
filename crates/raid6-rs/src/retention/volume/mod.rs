//! Stripe-level IO: rotation-aware reads and writes with one-shot
//! failure recovery, parity maintenance and corruption repair.


use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::codec::syndrome::{self, Corruption};
use crate::error::{RaidError, RaidResult};
use crate::layout::rotation::Placement;
use crate::metrics::{self, RecoveryOp};
use crate::retention::array::{Array, Geometry};

/// `Volume` layers the rotating P/Q stripe discipline over an [`Array`].
///
/// Reads and writes retry once after a recovery pass; recovery itself
/// reads members directly and writes rebuilt blocks with force, so a
/// degraded stripe never recurses.
pub struct Volume {
    array: Array,
    last_recovery: Option<Duration>,
}

impl Volume {
    #[must_use]
    pub fn new(array: Array) -> Self {
        Self {
            array,
            last_recovery: None,
        }
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.array.geometry()
    }

    /// `placement` returns the P/Q placement of a stripe.
    #[must_use]
    pub fn placement(&self, stripe: usize) -> Placement {
        Placement::of_stripe(stripe, self.geometry().disks)
    }

    /// `array` exposes the underlying array for probes and tooling.
    #[must_use]
    pub fn array(&self) -> &Array {
        &self.array
    }

    /// `array_mut` exposes the underlying array mutably.
    pub fn array_mut(&mut self) -> &mut Array {
        &mut self.array
    }

    /// `read_block` reads one block, running a single recovery pass if a
    /// member reports missing before giving up.
    ///
    /// # Errors
    /// `Unrecoverable` when the block is still unreadable after
    /// recovery; recovery errors propagate.
    pub fn read_block(&mut self, disk: usize, block: usize) -> RaidResult<Vec<u8>> {
        match self.array.read_block(disk, block) {
            Ok(data) => Ok(data),
            Err(RaidError::DiskMissing | RaidError::BlockMissing) => {
                self.recover_from_failure(block)?;
                self.array
                    .read_block(disk, block)
                    .map_err(|_| RaidError::Unrecoverable)
            }
            Err(err) => Err(err),
        }
    }

    /// `write_block` writes one block (unforced), with the same one-shot
    /// recovery retry as [`read_block`](Self::read_block). Callers are
    /// responsible for rewriting the stripe's parity afterwards.
    ///
    /// # Errors
    /// As for `read_block`.
    pub fn write_block(&mut self, disk: usize, block: usize, bytes: &[u8]) -> RaidResult<()> {
        match self.array.write_block(disk, block, bytes, false) {
            Ok(()) => Ok(()),
            Err(RaidError::DiskMissing | RaidError::BlockMissing) => {
                self.recover_from_failure(block)?;
                self.array
                    .write_block(disk, block, bytes, false)
                    .map_err(|_| RaidError::Unrecoverable)
            }
            Err(err) => Err(err),
        }
    }

    /// `rewrite_parity` recomputes and persists both syndrome blocks of
    /// a stripe from its data members.
    ///
    /// # Errors
    /// Propagates read and write failures that recovery cannot absorb.
    pub fn rewrite_parity(&mut self, stripe: usize) -> RaidResult<()> {
        let (p, q) = self.compute_parity(stripe)?;
        let placement = self.placement(stripe);
        self.write_block(placement.p(), stripe, &p)?;
        self.write_block(placement.q(), stripe, &q)
    }

    fn compute_parity(&mut self, stripe: usize) -> RaidResult<(Vec<u8>, Vec<u8>)> {
        let geom = self.geometry();
        let placement = self.placement(stripe);
        let mut data_blocks = Vec::with_capacity(geom.disks - 2);
        for d in 0..geom.disks {
            if placement.is_data(d) {
                data_blocks.push(self.read_block(d, stripe)?);
            }
        }
        let mut p = vec![0u8; geom.block_size];
        let mut q = vec![0u8; geom.block_size];
        let mut symbols = vec![0u8; geom.disks - 2];
        for i in 0..geom.block_size {
            for (j, block) in data_blocks.iter().enumerate() {
                symbols[j] = block[i];
            }
            let (pi, qi) = syndrome::encode(&symbols);
            p[i] = pi;
            q[i] = qi;
        }
        Ok((p, q))
    }

    /// `recover_from_failure` rebuilds lost blocks. A missing disk
    /// triggers a full-array rebuild; otherwise only the stripe at
    /// `stripe` is repaired. The wall-clock of the pass is kept for
    /// [`take_recovery_duration`](Self::take_recovery_duration).
    ///
    /// # Errors
    /// `TooManyFailures` when more than two disks, or more than two
    /// members of one stripe, are gone.
    pub fn recover_from_failure(&mut self, stripe: usize) -> RaidResult<()> {
        let start = Instant::now();
        let geom = self.geometry();
        let failed_disks = (0..geom.disks)
            .filter(|&d| self.array.check_disk(d).is_err())
            .count();
        if failed_disks > 2 {
            warn!(failed_disks, "array lost more than two disks");
            return Err(RaidError::TooManyFailures);
        }

        let stripes;
        let mut rebuilt = 0u64;
        if failed_disks > 0 {
            for s in 0..geom.blocks {
                rebuilt += self.recover_stripe(s)?;
            }
            stripes = geom.blocks as u64;
        } else {
            rebuilt = self.recover_stripe(stripe)?;
            stripes = 1;
        }

        let elapsed = start.elapsed();
        self.last_recovery = Some(elapsed);
        metrics::record_recovery_op(RecoveryOp {
            stripes,
            blocks_rebuilt: rebuilt,
            latency_seconds: elapsed.as_secs_f64(),
        });
        Ok(())
    }

    /// Rebuilds the missing members of one stripe; returns how many
    /// blocks were written back.
    fn recover_stripe(&mut self, stripe: usize) -> RaidResult<u64> {
        let geom = self.geometry();
        let placement = self.placement(stripe);

        let failed_real: Vec<usize> = (0..geom.disks)
            .filter(|&d| self.array.check_block(d, stripe).is_err())
            .collect();
        if failed_real.is_empty() {
            return Ok(0);
        }
        if failed_real.len() > 2 {
            warn!(stripe, failed = failed_real.len(), "stripe lost more than two members");
            return Err(RaidError::TooManyFailures);
        }

        // Assemble the stripe in algorithmic order, zero-filling lost
        // members as the codec expects.
        let mut algo_blocks: Vec<Vec<u8>> = vec![vec![0u8; geom.block_size]; geom.disks];
        for d in 0..geom.disks {
            if !failed_real.contains(&d) {
                algo_blocks[placement.to_algo(d)] = self.array.read_block(d, stripe)?;
            }
        }

        // Sort by algorithmic index, real indices riding along.
        let mut failed: Vec<(usize, usize)> = failed_real
            .iter()
            .map(|&d| (placement.to_algo(d), d))
            .collect();
        failed.sort_unstable();
        let pos: Vec<usize> = failed.iter().map(|&(algo, _)| algo).collect();

        let mut rebuilt: Vec<Vec<u8>> = vec![vec![0u8; geom.block_size]; failed.len()];
        let mut symbols = vec![0u8; geom.disks];
        for i in 0..geom.block_size {
            for (algo, block) in algo_blocks.iter().enumerate() {
                symbols[algo] = block[i];
            }
            let fixed = syndrome::fix(&symbols, &pos)?;
            for (target, value) in rebuilt.iter_mut().zip(fixed) {
                target[i] = value;
            }
        }

        for (&(_, real), block) in failed.iter().zip(&rebuilt) {
            self.array.write_block(real, stripe, block, true)?;
        }
        debug!(stripe, rebuilt = failed.len(), "stripe members rebuilt");
        Ok(failed.len() as u64)
    }

    /// `repair_corruption` locates a single silently-corrupted block in
    /// the stripe via the P/Q syndromes and rewrites it with corrected
    /// bytes. The syndromes themselves are the reference, so no parity
    /// rewrite follows.
    ///
    /// # Errors
    /// `MultiCorruption` when offsets implicate two different members;
    /// `Unrecoverable` from the codec when the single-symbol assumption
    /// fails; missing members surface as their device status.
    pub fn repair_corruption(&mut self, stripe: usize) -> RaidResult<()> {
        let geom = self.geometry();
        let placement = self.placement(stripe);

        let mut algo_blocks: Vec<Vec<u8>> = vec![Vec::new(); geom.disks];
        for d in 0..geom.disks {
            algo_blocks[placement.to_algo(d)] = self.array.read_block(d, stripe)?;
        }

        let mut corrupt_algo: Option<usize> = None;
        let mut corrections: Vec<(usize, u8)> = Vec::new();
        let mut symbols = vec![0u8; geom.disks];
        for i in 0..geom.block_size {
            for (algo, block) in algo_blocks.iter().enumerate() {
                symbols[algo] = block[i];
            }
            match syndrome::check(&symbols)? {
                Corruption::Clean => {}
                Corruption::Corrupt { index, value } => {
                    match corrupt_algo {
                        None => corrupt_algo = Some(index),
                        Some(prev) if prev != index => {
                            warn!(stripe, "corruption implicates multiple members");
                            return Err(RaidError::MultiCorruption);
                        }
                        Some(_) => {}
                    }
                    corrections.push((i, value));
                }
            }
        }

        let Some(algo) = corrupt_algo else {
            return Ok(());
        };
        let real = placement.to_real(algo);
        let mut block = algo_blocks[algo].clone();
        for &(i, value) in &corrections {
            block[i] = value;
        }
        self.array.write_block(real, stripe, &block, false)?;
        debug!(stripe, disk = real, bytes = corrections.len(), "corrupted block repaired");
        Ok(())
    }

    /// `take_recovery_duration` returns the wall-clock of the most
    /// recent recovery pass and clears it.
    pub fn take_recovery_duration(&mut self) -> Option<Duration> {
        self.last_recovery.take()
    }

    /// `reset_disk` zero-fills one disk.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn reset_disk(&mut self, disk: usize) -> anyhow::Result<()> {
        self.array.reset_disk(disk)
    }

    /// `fail_disk` simulates losing a whole disk.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn fail_disk(&mut self, disk: usize) -> anyhow::Result<()> {
        self.array.fail_disk(disk)
    }

    /// `check_disk` probes one disk.
    ///
    /// # Errors
    /// `DiskMissing` when the disk namespace is gone.
    pub fn check_disk(&self, disk: usize) -> RaidResult<()> {
        self.array.check_disk(disk)
    }

    /// `corrupt_block` randomly flips bytes of one block.
    ///
    /// # Errors
    /// `DiskMissing` or `BlockMissing`.
    pub fn corrupt_block(&mut self, disk: usize, block: usize) -> RaidResult<()> {
        self.array.corrupt_block(disk, block)
    }

    /// `status_string` returns a human-readable per-disk summary.
    #[must_use]
    pub fn status_string(&self) -> String {
        self.array.status_string()
    }
}
