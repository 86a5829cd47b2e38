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

use std::time::Duration;

use crate::utils::size;

// -- Intake --
/// Largest regular file accepted by the scanner. Larger files are rejected
/// with a distinguished error and skipped.
pub const MAX_ASSET_SIZE: u64 = 4 * size::GiB;

// -- Archiving --
/// Smallest accepted value for the per-archive size bound. Non-zero values
/// below this are rejected at configuration time.
pub const MIN_ARCHIVE_PART_SIZE: u64 = 1024;
/// Depth of the channel between the archive loop and the register pump.
pub const REGISTER_QUEUE_DEPTH: usize = 64;

// -- Catalog --
/// Page/batch size for every catalog query and register transaction.
pub const CATALOG_BATCH_SIZE: usize = 50;
pub const CATALOG_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

// -- Daemon --
/// Poll interval of the config-file watcher.
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const SCHEDULER_WORKERS: usize = 4;

// Display
pub const DEFAULT_VERBOSITY: u32 = 2;
