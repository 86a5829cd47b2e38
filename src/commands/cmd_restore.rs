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
    cancel::CancelToken,
    catalog::Catalog,
    commands::GlobalArgs,
    restorer::{self, Resolution},
    ui, utils,
};

#[derive(Args, Debug)]
#[clap(about = "Manually restore directory files")]
pub struct CmdArgs {
    /// Destination directory path where files will be restored
    #[clap(short = 'D', long, value_parser)]
    pub dest: PathBuf,

    /// Database path
    #[clap(short = 'd', long, value_parser)]
    pub database: PathBuf,

    /// Don't write any files, just log the outcome
    #[clap(long, default_value_t = false)]
    pub dry_run: bool,
}

pub fn run(_global_args: &GlobalArgs, args: &CmdArgs, cancel: &CancelToken) -> Result<()> {
    let start = Instant::now();
    ui::cli::info!("starting restore of {}", args.dest.display());

    let catalog = Catalog::open(&args.database, args.dry_run)?;

    // The destination is the source-path key the archived records were
    // registered under.
    let source = catalog.get_source(&args.dest)?;
    let records = source.find_archived_assets(cancel, None);

    // Restores never overwrite; a modified target is kept with a warning.
    let summary = restorer::restore(cancel, records, &Resolution::Skip, args.dry_run)?;

    ui::cli::log!();
    if args.dry_run {
        ui::cli::log!(
            "{} Would restore {} ({} skipped)",
            "[DRY RUN]".bold().purple(),
            utils::format_count(summary.restored, "asset", "assets"),
            summary.skipped
        );
    } else {
        ui::cli::log!(
            "Restored {} ({} skipped)",
            utils::format_count(summary.restored, "asset", "assets"),
            summary.skipped
        );
    }
    if cancel.is_canceled() {
        ui::cli::log!("Restore {}", "cancelled".bold().yellow());
    } else {
        ui::cli::log!(
            "Finished in {}",
            utils::pretty_print_duration(start.elapsed())
        );
    }

    Ok(())
}
