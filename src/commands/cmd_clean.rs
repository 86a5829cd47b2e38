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
    cancel::CancelToken, catalog::Catalog, commands::GlobalArgs, retention, ui, utils,
};

#[derive(Args, Debug)]
#[clap(about = "Delete archives that are fully superseded by newer archives")]
pub struct CmdArgs {
    /// Source directory path; all sources when omitted
    #[clap(short = 's', long, value_parser)]
    pub source: Option<PathBuf>,

    /// Database path
    #[clap(short = 'd', long, value_parser)]
    pub database: PathBuf,

    /// Maximum number of archives to delete per source
    #[clap(long = "archive-limit", default_value_t = 0)]
    pub archive_limit: usize,

    /// Don't delete any files, just log the outcome
    #[clap(long, default_value_t = false)]
    pub dry_run: bool,
}

pub fn run(_global_args: &GlobalArgs, args: &CmdArgs, cancel: &CancelToken) -> Result<()> {
    let start = Instant::now();
    ui::cli::info!("starting cleaning old backup files");

    let catalog = Catalog::open(&args.database, args.dry_run)?;
    let summary = retention::clean_archives(
        cancel,
        &catalog,
        args.source.as_deref(),
        args.archive_limit,
        args.dry_run,
    )?;

    ui::cli::log!();
    if args.dry_run {
        ui::cli::log!("{} Nothing deleted", "[DRY RUN]".bold().purple());
    } else {
        ui::cli::log!(
            "Deleted {} ({} freed)",
            utils::format_count(summary.archives_deleted, "archive", "archives"),
            utils::format_size(summary.bytes_freed, 1)
        );
    }
    if cancel.is_canceled() {
        ui::cli::log!("Cleaning {}", "cancelled".bold().yellow());
    } else {
        ui::cli::log!(
            "Finished in {}",
            utils::pretty_print_duration(start.elapsed())
        );
    }

    Ok(())
}
