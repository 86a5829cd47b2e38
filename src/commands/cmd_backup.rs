// ardilla is an incremental backup tool
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::{
    archiver::{self, ArchiveSpec, StoreOptions},
    cancel::CancelToken,
    catalog::Catalog,
    commands::GlobalArgs,
    error::BackupError,
    scanner::AssetStreamer,
    ui, utils,
};

#[derive(Args, Debug)]
#[clap(about = "Manually backup directory files")]
pub struct CmdArgs {
    /// Source directory path
    #[clap(short = 's', long, value_parser)]
    pub source: PathBuf,

    /// Destination directory path
    #[clap(short = 'D', long, value_parser)]
    pub dest: PathBuf,

    /// Database path
    #[clap(short = 'd', long, value_parser)]
    pub database: PathBuf,

    /// Archive prefix
    #[clap(long, default_value = "")]
    pub archive_prefix: String,

    /// Maximum stored bytes per archive (accepts human sizes like "500M")
    #[clap(long = "max-size", value_parser = crate::commands::parse_size_arg, default_value_t = 0)]
    pub max_size: u64,

    /// Include large files in the backup; they are skipped otherwise
    #[clap(long, default_value_t = false)]
    pub include_large_files: bool,

    /// Don't write any files, just log the outcome
    #[clap(long, default_value_t = false)]
    pub dry_run: bool,
}

pub fn run(_global_args: &GlobalArgs, args: &CmdArgs, cancel: &CancelToken) -> Result<()> {
    archiver::validate_max_file_bytes(args.max_size)?;

    let start = Instant::now();
    ui::cli::info!("starting backup of {}", args.source.display());

    verify_destination(&args.dest)?;

    let catalog = Catalog::open(&args.database, args.dry_run)?;
    let source = catalog.get_source(&args.source)?;

    let scanned = AssetStreamer::new(&args.source, cancel.clone())?;
    if cancel.is_canceled() {
        return Ok(());
    }

    let stored = archiver::store_assets(
        cancel,
        &args.source,
        &ArchiveSpec {
            dir: args.dest.clone(),
            prefix: args.archive_prefix.clone(),
        },
        scanned,
        Some(&source),
        &StoreOptions {
            dry_run: args.dry_run,
            max_file_bytes: args.max_size,
            include_large_files: args.include_large_files,
        },
    )?;

    ui::cli::log!();
    if args.dry_run {
        ui::cli::log!(
            "{} Would store {}",
            "[DRY RUN]".bold().purple(),
            utils::format_count(stored, "asset", "assets")
        );
    } else {
        ui::cli::log!("Stored {}", utils::format_count(stored, "asset", "assets"));
    }
    if cancel.is_canceled() {
        ui::cli::log!("Backup {}", "cancelled".bold().yellow());
    } else {
        ui::cli::log!(
            "Finished in {}",
            utils::pretty_print_duration(start.elapsed())
        );
    }

    Ok(())
}

// Fatal precondition: the destination must exist, be a directory and be
// writable, before any archive is opened. Dry runs check it too.
pub(crate) fn verify_destination(dest: &std::path::Path) -> Result<()> {
    let meta = std::fs::metadata(dest)
        .with_context(|| format!("could not open dest path {}", dest.display()))?;
    if !meta.is_dir() {
        return Err(BackupError::NotWritable {
            path: dest.to_path_buf(),
        }
        .into());
    }
    utils::verify_writable(dest).with_context(|| BackupError::NotWritable {
        path: dest.to_path_buf(),
    })?;
    Ok(())
}
