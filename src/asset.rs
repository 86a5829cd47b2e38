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

use std::{fs::Metadata, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::{error::BackupError, global::defaults::MAX_ASSET_SIZE, hashing};

/// A regular file observed under a source root at scan time.
///
/// The content hash is deliberately not part of an asset: it is computed on
/// demand when comparing against the catalog, or captured while streaming
/// the file into an archive.
#[derive(Debug, Clone)]
pub struct Asset {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

impl Asset {
    /// Builds an asset from a path and its metadata. Non-regular files and
    /// files larger than the intake cap are rejected with distinguished
    /// errors so the scanner can log and skip them.
    pub fn from_metadata(path: PathBuf, meta: &Metadata) -> Result<Self> {
        if !meta.is_file() {
            return Err(BackupError::NotRegularFile { path }.into());
        }

        let size = meta.len();
        if exceeds_size_limit(size) {
            return Err(BackupError::MaxSizeExceeded {
                size,
                limit: MAX_ASSET_SIZE,
            }
            .into());
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mod_time = DateTime::<Utc>::from(meta.modified()?);

        Ok(Self {
            path,
            name,
            size,
            mod_time,
        })
    }

    /// Hashes the current contents of the asset on disk.
    pub fn compute_hash(&self) -> Result<u64> {
        hashing::compute_file_hash(&self.path)
    }
}

#[inline]
fn exceeds_size_limit(size: u64) -> bool {
    size > MAX_ASSET_SIZE
}

/// An asset that has been written into a specific archive. The hash is the
/// one captured at write time and is authoritative for the stored bytes.
#[derive(Debug, Clone)]
pub struct ArchivedAsset {
    pub source_path: PathBuf,
    pub archive_path: PathBuf,
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub hash: u64,
}
