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

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::{
    archiver::{self, ArchiveSpec, CopyOptions},
    cancel::CancelToken,
    catalog::{
        Catalog,
        source::{ArchiveOrder, BackupSource, FindArchives},
    },
    commands::{GlobalArgs, cmd_backup::verify_destination},
    ui, utils,
};

#[derive(Args, Debug)]
#[clap(
    about = "Copy existing archives into fresh size-bounded archives",
    long_about = "Copy existing archives into fresh size-bounded archives. The copied \
                  assets are registered as new versions; the old archives become \
                  eligible for clean once fully superseded."
)]
pub struct CmdArgs {
    /// Source directory path; all sources when omitted
    #[clap(short = 's', long, value_parser)]
    pub source: Option<PathBuf>,

    /// Destination directory path
    #[clap(short = 'D', long, value_parser)]
    pub dest: PathBuf,

    /// Database path
    #[clap(short = 'd', long, value_parser)]
    pub database: PathBuf,

    /// Maximum stored bytes per archive (accepts human sizes like "500M")
    #[clap(long = "max-size", value_parser = crate::commands::parse_size_arg, default_value_t = 0)]
    pub max_size: u64,

    /// Maximum number of archives to copy per source
    #[clap(long = "archive-limit", default_value_t = 0)]
    pub archive_limit: usize,

    /// Archive prefix
    #[clap(long, default_value = "")]
    pub archive_prefix: String,

    /// Don't write any files, just log the outcome
    #[clap(long, default_value_t = false)]
    pub dry_run: bool,
}

pub fn run(_global_args: &GlobalArgs, args: &CmdArgs, cancel: &CancelToken) -> Result<()> {
    archiver::validate_max_file_bytes(args.max_size)?;

    let start = Instant::now();
    ui::cli::info!("starting compacting");

    verify_destination(&args.dest)?;

    let catalog = Catalog::open(&args.database, args.dry_run)?;
    let sources: Vec<BackupSource> = match &args.source {
        Some(path) => vec![catalog.get_source(path)?],
        None => catalog.iter_sources()?,
    };

    let mut copied = 0usize;
    for source in sources {
        if cancel.is_canceled() {
            break;
        }

        let archive_paths: Vec<PathBuf> = source
            .find_archives(
                cancel,
                FindArchives {
                    limit: args.archive_limit,
                    order_by: ArchiveOrder::Size,
                    max_uncompressed_size: args.max_size,
                    ..Default::default()
                },
            )
            .inspect(|archive| {
                ui::cli::info!(
                    "found archive {} ({}, {} assets)",
                    archive.path.display(),
                    utils::format_size(archive.size, 1),
                    archive.asset_count
                );
            })
            .map(|archive| archive.path)
            .collect();

        if archive_paths.is_empty() {
            ui::cli::info!("no archives found for {}", source.path().display());
            continue;
        }

        let records = source.find_archived_assets(cancel, Some(archive_paths));
        copied += archiver::copy_archived(
            cancel,
            &source,
            &ArchiveSpec {
                dir: args.dest.clone(),
                prefix: args.archive_prefix.clone(),
            },
            records,
            &CopyOptions {
                dry_run: args.dry_run,
                max_file_bytes: args.max_size,
            },
        )?;
    }

    ui::cli::log!();
    if args.dry_run {
        ui::cli::log!(
            "{} Would copy {}",
            "[DRY RUN]".bold().purple(),
            utils::format_count(copied, "asset", "assets")
        );
    } else {
        ui::cli::log!("Copied {}", utils::format_count(copied, "asset", "assets"));
    }
    if cancel.is_canceled() {
        ui::cli::log!("Compacting {}", "cancelled".bold().yellow());
    } else {
        ui::cli::log!(
            "Finished in {}",
            utils::pretty_print_duration(start.elapsed())
        );
    }

    Ok(())
}
