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

use std::path::PathBuf;

/// Error kinds the rest of the pipeline needs to tell apart. Everything else
/// travels as a plain `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("not a regular file: {}", .path.display())]
    NotRegularFile { path: PathBuf },

    #[error("maximum size exceeded: current size {size}, maximum {limit}")]
    MaxSizeExceeded { size: u64, limit: u64 },

    #[error("file or directory already exists with this name: {}", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("destination must be a writable directory: {}", .path.display())]
    NotWritable { path: PathBuf },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("invalid schedule: {0}")]
    ScheduleInvalid(String),
}
