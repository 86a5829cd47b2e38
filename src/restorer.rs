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

use std::{
    collections::{HashMap, hash_map::Entry},
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use zip::ZipArchive;

use crate::{asset::ArchivedAsset, cancel::CancelToken, hashing, ui};

/// What to do when a restore target already exists with different contents.
/// `Overwrite` exists for internal use; the CLI only restores
/// non-destructively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Skip,
    Overwrite,
}

/// ZIP readers keyed by archive path, opened on demand and held open for
/// the lifetime of the restore. Many records usually share one archive;
/// this avoids reopening it per record.
pub struct ZipReaderCache {
    readers: HashMap<PathBuf, ZipArchive<File>>,
}

impl ZipReaderCache {
    pub fn new() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Opens the archive entry backing `record`.
    pub fn entry(&mut self, record: &ArchivedAsset) -> Result<zip::read::ZipFile<'_>> {
        let name = entry_name(record)?;

        let archive = match self.readers.entry(record.archive_path.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let file = File::open(&record.archive_path).with_context(|| {
                    format!("could not open archive {}", record.archive_path.display())
                })?;
                let archive = ZipArchive::new(file).with_context(|| {
                    format!("could not read archive {}", record.archive_path.display())
                })?;
                vacant.insert(archive)
            }
        };

        archive
            .by_name(&name)
            .with_context(|| format!("could not open archive entry {name}"))
    }
}

impl Default for ZipReaderCache {
    fn default() -> Self {
        Self::new()
    }
}

// The in-archive entry name of a record: its path relative to the source
// root, as written at archive time.
pub(crate) fn entry_name(record: &ArchivedAsset) -> Result<String> {
    let rel = record.path.strip_prefix(&record.source_path).with_context(|| {
        format!(
            "asset {} is not under source {}",
            record.path.display(),
            record.source_path.display()
        )
    })?;
    Ok(rel.to_string_lossy().into_owned())
}

#[derive(Debug, Default)]
pub struct RestoreSummary {
    pub restored: usize,
    pub skipped: usize,
}

enum Outcome {
    Restored(u64),
    SkippedSame,
    SkippedModified,
}

/// Materializes a stream of archived-asset records back onto the
/// filesystem. Existing identical targets are skipped, modified targets are
/// left alone with a warning, and per-record failures never abort the whole
/// restore.
pub fn restore<I>(
    cancel: &CancelToken,
    records: I,
    resolution: &Resolution,
    dry_run: bool,
) -> Result<RestoreSummary>
where
    I: Iterator<Item = ArchivedAsset>,
{
    ui::cli::info!("start restoring assets");

    let mut readers = ZipReaderCache::new();
    let mut summary = RestoreSummary::default();

    for record in records {
        if cancel.is_canceled() {
            break;
        }

        let entry = match readers.entry(&record) {
            Ok(entry) => entry,
            Err(e) => {
                ui::cli::warning!("could not restore asset {}: {e:#}", record.path.display());
                continue;
            }
        };

        match restore_record(entry, &record, resolution, dry_run) {
            Ok(Outcome::SkippedSame) => {
                ui::cli::debug!("file already present, skipping {}", record.path.display());
                summary.skipped += 1;
            }
            Ok(Outcome::SkippedModified) => {
                ui::cli::warning!(
                    "found existing file {}. The file has been modified, skipping",
                    record.path.display()
                );
                summary.skipped += 1;
            }
            Ok(Outcome::Restored(bytes)) => {
                ui::cli::debug!("restored asset {} ({bytes} bytes)", record.path.display());
                summary.restored += 1;
            }
            Err(e) => {
                ui::cli::warning!("could not restore asset {}: {e:#}", record.path.display());
            }
        }
    }

    if cancel.is_canceled() {
        ui::cli::info!(
            "cancelled restore ({} restored, {} skipped)",
            summary.restored,
            summary.skipped
        );
    } else if summary.restored == 0 {
        ui::cli::info!("no assets restored ({} skipped)", summary.skipped);
    } else {
        ui::cli::info!(
            "done restoring assets ({} restored, {} skipped)",
            summary.restored,
            summary.skipped
        );
    }
    Ok(summary)
}

fn restore_record(
    mut entry: zip::read::ZipFile<'_>,
    record: &ArchivedAsset,
    resolution: &Resolution,
    dry_run: bool,
) -> Result<Outcome> {
    match fs::metadata(&record.path) {
        Ok(info) => {
            ui::cli::debug!("found existing file {}", record.path.display());

            if info.is_dir() {
                bail!("target is a directory");
            }

            let mod_micros = DateTime::<Utc>::from(info.modified()?).timestamp_micros();
            if mod_micros == record.mod_time.timestamp_micros() && info.len() == record.size {
                return Ok(Outcome::SkippedSame);
            }

            let existing_hash = hashing::compute_file_hash(&record.path)?;
            if existing_hash != record.hash {
                if *resolution == Resolution::Overwrite {
                    ui::cli::info!("found existing file {}, overwriting", record.path.display());
                    if dry_run {
                        return Ok(Outcome::Restored(0));
                    }
                    fs::remove_file(&record.path).with_context(|| {
                        format!("could not remove {}", record.path.display())
                    })?;
                    return write_target(&mut entry, &record.path).map(Outcome::Restored);
                }
                return Ok(Outcome::SkippedModified);
            }

            // Same contents under a different mod time or size report.
            Ok(Outcome::SkippedSame)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            ui::cli::debug!("file not found, creating {}", record.path.display());
            if dry_run {
                return Ok(Outcome::Restored(0));
            }

            if let Some(parent) = record.path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("could not create {}", parent.display()))?;
            }
            write_target(&mut entry, &record.path).map(Outcome::Restored)
        }
        Err(e) => {
            Err(e).with_context(|| format!("could not stat {}", record.path.display()))
        }
    }
}

fn write_target(entry: &mut zip::read::ZipFile<'_>, path: &Path) -> Result<u64> {
    let mut file =
        File::create(path).with_context(|| format!("could not create {}", path.display()))?;
    io::copy(entry, &mut file).with_context(|| format!("could not write {}", path.display()))
}
