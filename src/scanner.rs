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

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::{asset::Asset, cancel::CancelToken, ui};

/// A depth-first lazy streamer of the regular files under a source root.
///
/// Entries are produced in lexicographical order of their full paths. The
/// internal stack only holds the frontier of the walk; nothing is buffered
/// beyond that, so the next directory is only read when the consumer asks
/// for the next asset.
///
/// Symlinks, devices, sockets and directories are silently skipped.
/// Per-entry stat or read errors, and files over the intake size cap, are
/// logged and skipped without aborting the walk. Cancellation is observed
/// on every entry and ends the walk cleanly.
pub struct AssetStreamer {
    root: PathBuf,
    stack: Vec<PathBuf>,
    cancel: CancelToken,
    stat_count: usize,
    yield_count: usize,
    finished: bool,
}

impl AssetStreamer {
    pub fn new(root: &Path, cancel: CancelToken) -> Result<Self> {
        let meta = std::fs::metadata(root)
            .with_context(|| format!("could not scan {}", root.display()))?;
        if !meta.is_dir() {
            bail!("source path {} is not a directory", root.display());
        }

        ui::cli::info!("start scanning for assets in {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            stack: vec![root.to_path_buf()],
            cancel,
            stat_count: 0,
            yield_count: 0,
            finished: false,
        })
    }

    // Directory children sorted in reverse lexicographical order, so that
    // popping the stack visits them in lexicographical order.
    fn push_children_rev_sorted(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                ui::cli::warning!("could not scan {}: {e}", dir.display());
                return;
            }
        };

        let mut children: Vec<PathBuf> = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => children.push(entry.path()),
                Err(e) => ui::cli::warning!("could not scan entry in {}: {e}", dir.display()),
            }
        }
        children.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        self.stack.extend(children);
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            if self.cancel.is_canceled() {
                ui::cli::info!(
                    "cancelled scanning {} ({} scanned, {} yielded)",
                    self.root.display(),
                    self.stat_count,
                    self.yield_count
                );
            } else {
                ui::cli::info!(
                    "done scanning {} ({} scanned, {} yielded)",
                    self.root.display(),
                    self.stat_count,
                    self.yield_count
                );
            }
        }
    }
}

impl Iterator for AssetStreamer {
    type Item = Asset;

    fn next(&mut self) -> Option<Asset> {
        loop {
            if self.cancel.is_canceled() {
                self.stack.clear();
                self.finish();
                return None;
            }

            let path = match self.stack.pop() {
                Some(path) => path,
                None => {
                    self.finish();
                    return None;
                }
            };

            // symlink_metadata so that symlinks are seen as symlinks, not
            // their targets.
            let meta = match std::fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    ui::cli::warning!("could not stat {}: {e}", path.display());
                    continue;
                }
            };

            if meta.is_dir() {
                self.push_children_rev_sorted(&path);
                continue;
            }
            if !meta.is_file() {
                continue;
            }
            self.stat_count += 1;

            match Asset::from_metadata(path, &meta) {
                Ok(asset) => {
                    self.yield_count += 1;
                    ui::cli::debug!("scanned asset {}", asset.path.display());
                    return Some(asset);
                }
                Err(e) => {
                    ui::cli::warning!("could not create asset: {e:#}");
                    continue;
                }
            }
        }
    }
}
