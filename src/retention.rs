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

use std::path::Path;

use anyhow::{Context, Result};

use crate::{
    cancel::CancelToken,
    catalog::{
        Catalog,
        source::{ArchiveOrder, BackupSource, FindArchives},
    },
    ui,
    utils::format_size,
};

#[derive(Debug, Default)]
pub struct CleanSummary {
    pub archives_deleted: usize,
    pub bytes_freed: u64,
}

/// Deletes archives that are fully superseded by newer archives.
///
/// Catalog rows go first, in one transaction per source; the backing files
/// are removed afterwards. A file that fails to delete is logged and left
/// as dead space: a stray file is harmless, while a stray catalog row would
/// make restore fail.
pub fn clean_archives(
    cancel: &CancelToken,
    catalog: &Catalog,
    source_path: Option<&Path>,
    limit_archives: usize,
    dry_run: bool,
) -> Result<CleanSummary> {
    let sources: Vec<BackupSource> = match source_path {
        Some(path) => vec![catalog.get_source(path)?],
        None => catalog.iter_sources()?,
    };

    let mut summary = CleanSummary::default();

    for source in sources {
        if cancel.is_canceled() {
            break;
        }

        let archive_paths: Vec<_> = source
            .find_archives(
                cancel,
                FindArchives {
                    limit: limit_archives,
                    order_by: ArchiveOrder::Size,
                    only_fully_backed_up: true,
                    ..Default::default()
                },
            )
            .inspect(|archive| {
                ui::cli::info!(
                    "found old archive {} ({}, {} assets)",
                    archive.path.display(),
                    format_size(archive.size, 1),
                    archive.asset_count
                );
            })
            .map(|archive| archive.path)
            .collect();

        if archive_paths.is_empty() {
            ui::cli::info!("no old archives found for {}", source.path().display());
            continue;
        }

        source
            .delete_archives(&archive_paths)
            .context("error deleting old backup data from the catalog")?;

        for path in &archive_paths {
            let stat = match std::fs::metadata(path) {
                Ok(stat) => stat,
                Err(e) => {
                    ui::cli::error!("could not stat old backup file {}: {e}", path.display());
                    continue;
                }
            };

            if dry_run {
                ui::cli::info!("would delete old backup file {} (dry run)", path.display());
                continue;
            }

            // A failed remove does not roll anything back; the catalog
            // already forgot this archive.
            match std::fs::remove_file(path) {
                Err(e) => {
                    ui::cli::error!(
                        "could not delete old backup file {}: {e}",
                        path.display()
                    );
                }
                Ok(()) => {
                    ui::cli::info!(
                        "deleted old backup file {} ({})",
                        path.display(),
                        format_size(stat.len(), 1)
                    );
                    summary.archives_deleted += 1;
                    summary.bytes_freed += stat.len();
                }
            }
        }
    }

    if summary.bytes_freed > 0 {
        ui::cli::info!(
            "deleted {} old backup files ({} freed)",
            summary.archives_deleted,
            format_size(summary.bytes_freed, 1)
        );
    }
    Ok(summary)
}
