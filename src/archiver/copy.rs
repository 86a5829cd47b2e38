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

use std::io;

use anyhow::Result;

use crate::{
    archiver::{ArchiveSpec, RegisterPump, ZipParts},
    asset::ArchivedAsset,
    cancel::CancelToken,
    catalog::source::BackupSource,
    restorer::{ZipReaderCache, entry_name},
    ui,
};

#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub dry_run: bool,
    /// Uncompressed bytes per archive part; 0 disables partitioning.
    pub max_file_bytes: u64,
}

/// Re-archives already-archived assets into fresh size-bounded parts,
/// reading entry bytes from their current archives. Contents are not
/// rehashed: the stored hash travels from the source record, since the
/// catalog is the authority for what was written.
///
/// The new records are registered as they are written; the old archives are
/// left untouched until retention finds them fully superseded.
pub fn copy_archived<I>(
    cancel: &CancelToken,
    source: &BackupSource,
    dest: &ArchiveSpec,
    records: I,
    opts: &CopyOptions,
) -> Result<usize>
where
    I: Iterator<Item = ArchivedAsset>,
{
    ui::cli::info!(
        "copying archived assets of {} to {}",
        source.path().display(),
        dest.dir.display()
    );

    let pump = RegisterPump::start(Some(source), cancel);
    let mut parts = ZipParts::new(dest, opts.dry_run);
    let mut readers = ZipReaderCache::new();
    let mut copied = 0usize;

    for record in records {
        if cancel.is_canceled() {
            break;
        }

        if opts.max_file_bytes > 0 && record.size >= opts.max_file_bytes {
            ui::cli::warning!(
                "asset {} larger than max file size ({} >= {}), skipping",
                record.path.display(),
                record.size,
                opts.max_file_bytes
            );
            continue;
        }
        parts.prepare(record.size, opts.max_file_bytes);

        let name = match entry_name(&record) {
            Ok(name) => name,
            Err(e) => {
                ui::cli::warning!("could not copy asset {}: {e:#}", record.path.display());
                continue;
            }
        };

        let mut entry = match readers.entry(&record) {
            Ok(entry) => entry,
            Err(e) => {
                ui::cli::warning!("could not copy asset {}: {e:#}", record.path.display());
                continue;
            }
        };

        if let Err(e) = parts
            .writer()
            .start_entry(&name, record.size, record.mod_time)
        {
            ui::cli::warning!("could not copy asset {}: {e:#}", record.path.display());
            continue;
        }

        let archive_path = parts.path();
        match io::copy(&mut entry, parts.writer()) {
            Err(e) => {
                ui::cli::warning!("could not copy asset {}: {e:#}", record.path.display());
                parts.add_written(record.size);
            }
            Ok(_) => {
                ui::cli::debug!("copied asset {}", record.path.display());
                parts.add_written(record.size);
                copied += 1;
                pump.emit(ArchivedAsset {
                    archive_path,
                    ..record
                });
            }
        }
    }

    parts.close();
    pump.finish();

    if cancel.is_canceled() {
        ui::cli::info!("cancelled copying ({copied} copied)");
    } else if copied == 0 {
        ui::cli::info!("no assets copied");
    } else {
        ui::cli::info!("done copying assets ({copied} copied)");
    }
    Ok(copied)
}
