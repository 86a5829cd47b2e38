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

use std::{path::PathBuf, thread::JoinHandle, time::Duration};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::{cancel::CancelToken, hashing, ui};

const CANCEL_POLL: Duration = Duration::from_millis(250);

/// Watches a file for content changes by rehashing it on every tick.
///
/// The tick source is injected (`crossbeam_channel::tick` in production) so
/// tests can drive the poll directly. `on_change` fires when the hash
/// differs from the last observed non-zero hash. The watcher thread ends
/// when the token is cancelled or the tick source is dropped.
pub fn watch_file<C, E>(
    cancel: CancelToken,
    path: PathBuf,
    ticks: Receiver<std::time::Instant>,
    on_change: C,
    on_error: E,
) -> Result<JoinHandle<()>>
where
    C: Fn() + Send + 'static,
    E: Fn(anyhow::Error) + Send + 'static,
{
    let mut last_hash = hashing::compute_file_hash(&path)
        .with_context(|| format!("could not watch {}", path.display()))?;

    ui::cli::info!("watching {} for changes", path.display());

    let handle = std::thread::spawn(move || {
        loop {
            if cancel.is_canceled() {
                return;
            }

            match ticks.recv_timeout(CANCEL_POLL) {
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
                Ok(_) => {}
            }

            match hashing::compute_file_hash(&path) {
                Err(e) => on_error(e),
                Ok(new_hash) => {
                    if new_hash != 0 && new_hash != last_hash {
                        last_hash = new_hash;
                        on_change();
                    }
                }
            }
        }
    });

    Ok(handle)
}
