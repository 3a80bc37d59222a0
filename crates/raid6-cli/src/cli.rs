//! Command-line argument definitions for the RAID-6 store CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_DISK_SIZE: u64 = 1 << 20;
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Cli defines the root command for the RAID-6 store binary.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub array: ArrayArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// `ArrayArgs` locates the directory-backed disk array.
#[derive(Args)]
pub struct ArrayArgs {
    /// Directory holding one `disk_<i>` subdirectory per disk.
    #[arg(long, env = "RAID6_DISK_DIR")]
    pub disk_dir: PathBuf,

    #[arg(long, env = "RAID6_DISKS", default_value_t = 6)]
    pub disks: usize,

    #[arg(long, env = "RAID6_DISK_SIZE", default_value_t = DEFAULT_DISK_SIZE)]
    pub disk_size: u64,

    #[arg(long, env = "RAID6_BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Upper bound on stored files; defaults to the data-block capacity.
    #[arg(long)]
    pub max_files: Option<usize>,
}

/// Command enumerates the supported CLI subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Create the array and zero every disk.
    Init,

    /// Store a file from the host filesystem.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        input: PathBuf,
    },

    /// Print a stored file to stdout.
    Cat {
        #[arg(long)]
        name: String,
    },

    /// Delete a stored file.
    Rm {
        #[arg(long)]
        name: String,
    },

    /// List stored files.
    Ls,

    /// Replace the byte range `[begin, end)` of a stored file.
    Patch {
        #[arg(long)]
        name: String,
        #[arg(long)]
        begin: usize,
        #[arg(long)]
        end: usize,
        #[arg(long)]
        input: PathBuf,
    },

    /// Simulate losing a whole disk.
    FailDisk {
        #[arg(long)]
        disk: usize,
    },

    /// Randomly corrupt one block.
    Corrupt {
        #[arg(long)]
        disk: usize,
        #[arg(long)]
        block: usize,
    },

    /// Scan a stripe for silent corruption and repair it.
    Scrub {
        #[arg(long)]
        stripe: usize,
    },

    /// Report per-disk health.
    Status,
}
