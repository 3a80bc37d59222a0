use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{ArrayArgs, Cli, Command};
use raid6_rs::store::{DeviceSpec, FileStore, StoreConfig};

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut store = open_store(&cli.array)?;

    match cli.command {
        Command::Init => {
            store.format().context("failed to format the array")?;
            info!(disks = cli.array.disks, "array initialized");
        }
        Command::Add { name, input } => {
            let bytes = fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            store.add_file(&name, &bytes)?;
            info!(name = %name, bytes = bytes.len(), "file stored");
        }
        Command::Cat { name } => {
            let Some(bytes) = store.read_file(&name)? else {
                anyhow::bail!("no file named {name}");
            };
            std::io::stdout().write_all(&bytes)?;
        }
        Command::Rm { name } => {
            store.del_file(&name)?;
            info!(name = %name, "file deleted");
        }
        Command::Ls => {
            for entry in store.list_files()? {
                println!("{:>10}  {}", entry.size, entry.name);
            }
        }
        Command::Patch { name, begin, end, input } => {
            let bytes = fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            store.modify_file(&name, begin, end, &bytes)?;
            info!(name = %name, begin, end, bytes = bytes.len(), "file patched");
        }
        Command::FailDisk { disk } => {
            store.fail_disk(disk)?;
            info!(disk, "disk failed");
        }
        Command::Corrupt { disk, block } => {
            store.corrupt_block(disk, block)?;
            info!(disk, block, "block corrupted");
        }
        Command::Scrub { stripe } => {
            store.check_and_recover_corruption(stripe)?;
            info!(stripe, "stripe scrubbed");
        }
        Command::Status => {
            print!("{}", store.status_string());
        }
    }

    if let Some(duration) = store.take_recovery_duration() {
        info!(seconds = duration.as_secs_f64(), "recovery pass ran");
    }

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();
}

fn open_store(args: &ArrayArgs) -> Result<FileStore> {
    let devices = (0..args.disks)
        .map(|i| DeviceSpec::Dir(args.disk_dir.join(format!("disk_{i}"))))
        .collect();
    FileStore::open(StoreConfig {
        disk_size: args.disk_size,
        block_size: args.block_size,
        max_files: args.max_files,
        devices,
    })
    .context("failed to open the RAID-6 store")
}
