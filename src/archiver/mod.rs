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

mod copy;
pub mod zip_writer;

pub use copy::{CopyOptions, copy_archived};

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    thread::JoinHandle,
};

use anyhow::{Context, Result};
use chrono::Utc;
use crossbeam_channel::Sender;

use crate::{
    asset::{ArchivedAsset, Asset},
    cancel::CancelToken,
    catalog::source::BackupSource,
    error::BackupError,
    global::defaults::{MIN_ARCHIVE_PART_SIZE, REGISTER_QUEUE_DEPTH},
    hashing::HashingReader,
    ui,
};

use zip_writer::LazyZipFile;

/// Where a backup run writes its archive parts: a destination directory and
/// an optional file-name prefix.
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
    pub dir: PathBuf,
    pub prefix: String,
}

#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub dry_run: bool,
    /// Uncompressed bytes per archive part; 0 disables partitioning.
    pub max_file_bytes: u64,
    /// Store assets of size >= max_file_bytes in their own part instead of
    /// skipping them.
    pub include_large_files: bool,
}

/// Rejects size bounds below the accepted minimum. Called at configuration
/// time, before any archive is opened.
pub fn validate_max_file_bytes(max_file_bytes: u64) -> Result<()> {
    if max_file_bytes > 0 && max_file_bytes < MIN_ARCHIVE_PART_SIZE {
        return Err(BackupError::ConfigInvalid(format!(
            "max size must be at least {MIN_ARCHIVE_PART_SIZE} bytes"
        ))
        .into());
    }
    Ok(())
}

/// Archives a stream of assets into size-bounded ZIP parts, hashing each
/// asset while it is written.
///
/// With a `source`, the input is first filtered down to new-or-modified
/// assets and every archived asset is registered in the catalog through a
/// background pump, in archival order. Cancellation ends the loop cleanly:
/// finished parts stay on disk and already-registered assets stay
/// registered.
///
/// Returns the number of archived assets, which in a dry run counts the
/// events that a real run would have produced.
pub fn store_assets<I>(
    cancel: &CancelToken,
    source_path: &Path,
    dest: &ArchiveSpec,
    assets: I,
    source: Option<&BackupSource>,
    opts: &StoreOptions,
) -> Result<usize>
where
    I: Iterator<Item = Asset> + 'static,
{
    ui::cli::info!(
        "backing up assets from {} to {}",
        source_path.display(),
        dest.dir.display()
    );

    let assets: Box<dyn Iterator<Item = Asset>> = match source {
        Some(src) => Box::new(src.find_missing_assets(cancel, assets)),
        None => Box::new(assets),
    };

    let pump = RegisterPump::start(source, cancel);
    let mut parts = ZipParts::new(dest, opts.dry_run);
    let mut stored = 0usize;

    for asset in assets {
        if cancel.is_canceled() {
            break;
        }

        if opts.max_file_bytes > 0
            && asset.size >= opts.max_file_bytes
            && !opts.include_large_files
        {
            ui::cli::warning!(
                "asset {} larger than max file size ({} >= {}), skipping",
                asset.path.display(),
                asset.size,
                opts.max_file_bytes
            );
            continue;
        }
        parts.prepare(asset.size, opts.max_file_bytes);

        let entry_name = match asset.path.strip_prefix(source_path) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(e) => {
                ui::cli::warning!("could not backup asset {}: {e}", asset.path.display());
                continue;
            }
        };
        ui::cli::debug!("asset to zip: {entry_name}");

        if let Err(e) = parts
            .writer()
            .start_entry(&entry_name, asset.size, asset.mod_time)
        {
            ui::cli::warning!("could not backup asset {}: {e:#}", asset.path.display());
            continue;
        }

        let archive_path = parts.path();
        match write_asset(&asset, parts.writer()) {
            Err(e) => {
                ui::cli::warning!("could not backup asset {}: {e:#}", asset.path.display());
                parts.add_written(asset.size);
            }
            Ok(hash) => {
                ui::cli::debug!("backed up asset {}", asset.path.display());
                parts.add_written(asset.size);
                stored += 1;
                pump.emit(ArchivedAsset {
                    source_path: source_path.to_path_buf(),
                    archive_path,
                    path: asset.path,
                    name: asset.name,
                    size: asset.size,
                    mod_time: asset.mod_time,
                    hash,
                });
            }
        }
    }

    parts.close();
    pump.finish();

    if cancel.is_canceled() {
        ui::cli::info!("cancelled backup ({stored} stored)");
    } else if stored == 0 {
        ui::cli::info!("no assets backed up");
    } else {
        ui::cli::info!("done backing up assets ({stored} stored)");
    }
    Ok(stored)
}

// Streams the asset into the current entry through the hashing tee; the
// returned value is the stored hash of exactly the written bytes.
fn write_asset(asset: &Asset, writer: &mut LazyZipFile) -> Result<u64> {
    let file = File::open(&asset.path)
        .with_context(|| format!("could not open {}", asset.path.display()))?;
    let mut tee = HashingReader::new(file);
    io::copy(&mut tee, writer)
        .with_context(|| format!("could not write {}", asset.path.display()))?;
    Ok(tee.digest())
}

/// The multi-part driver: names parts `<prefix><unix-millis>.zip`,
/// `<prefix><unix-millis>.1.zip`, ... and rolls to a new part when the next
/// asset would reach the size bound. Parts only materialize on their first
/// entry, so a part that stores nothing leaves no file.
pub(crate) struct ZipParts {
    full_prefix: String,
    part: usize,
    written: u64,
    dry_run: bool,
    current: LazyZipFile,
}

impl ZipParts {
    pub(crate) fn new(dest: &ArchiveSpec, dry_run: bool) -> Self {
        let full_prefix = dest
            .dir
            .join(format!("{}{}", dest.prefix, Utc::now().timestamp_millis()))
            .to_string_lossy()
            .into_owned();
        let current = Self::part_file(&full_prefix, 0, dry_run);
        ui::cli::info!("open archive {}", current.path().display());

        Self {
            full_prefix,
            part: 0,
            written: 0,
            dry_run,
            current,
        }
    }

    fn part_file(full_prefix: &str, part: usize, dry_run: bool) -> LazyZipFile {
        if dry_run {
            return LazyZipFile::null();
        }
        if part == 0 {
            LazyZipFile::new(PathBuf::from(format!("{full_prefix}.zip")))
        } else {
            LazyZipFile::new(PathBuf::from(format!("{full_prefix}.{part}.zip")))
        }
    }

    /// Rolls to the next part if writing `next_size` more bytes would reach
    /// the bound. A bound of 0 disables partitioning.
    pub(crate) fn prepare(&mut self, next_size: u64, max_file_bytes: u64) {
        if max_file_bytes > 0 && self.written + next_size >= max_file_bytes {
            ui::cli::debug!("archive would reach the size bound, opening a new part");
            if let Err(e) = self.current.close() {
                ui::cli::warning!("could not close backup file: {e:#}");
            }
            self.part += 1;
            self.written = 0;
            self.current = Self::part_file(&self.full_prefix, self.part, self.dry_run);
            ui::cli::info!("open archive {}", self.current.path().display());
        }
    }

    pub(crate) fn writer(&mut self) -> &mut LazyZipFile {
        &mut self.current
    }

    pub(crate) fn path(&self) -> PathBuf {
        self.current.path().to_path_buf()
    }

    pub(crate) fn add_written(&mut self, bytes: u64) {
        self.written += bytes;
    }

    pub(crate) fn close(&mut self) {
        if let Err(e) = self.current.close() {
            ui::cli::warning!("could not close backup file: {e:#}");
        }
    }
}

/// The background half of the archive loop: receives archived-asset events
/// over a bounded channel and registers them in the catalog, in order. On a
/// register failure the channel is drained so the archive loop never blocks.
pub(crate) struct RegisterPump {
    tx: Option<Sender<ArchivedAsset>>,
    handle: Option<JoinHandle<()>>,
}

impl RegisterPump {
    pub(crate) fn start(source: Option<&BackupSource>, cancel: &CancelToken) -> Self {
        let Some(source) = source else {
            return Self {
                tx: None,
                handle: None,
            };
        };

        let (tx, rx) = crossbeam_channel::bounded::<ArchivedAsset>(REGISTER_QUEUE_DEPTH);
        let source = source.clone();
        let cancel = cancel.clone();
        let handle = std::thread::spawn(move || {
            if let Err(e) = source.register(&cancel, rx.iter()) {
                ui::cli::error!("could not register backup assets: {e:#}");
                // Drain the channel.
                for _ in rx.iter() {}
            }
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub(crate) fn emit(&self, asset: ArchivedAsset) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(asset);
        }
    }

    /// Closes the channel and waits for the pump to finish.
    pub(crate) fn finish(mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
