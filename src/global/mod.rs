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

pub mod defaults;

use std::sync::LazyLock;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::{commands::GlobalArgs, global::defaults::DEFAULT_VERBOSITY, ui};

pub struct GlobalOpts {
    pub verbosity: u32,
}

impl Default for GlobalOpts {
    fn default() -> Self {
        Self {
            verbosity: DEFAULT_VERBOSITY,
        }
    }
}

pub static GLOBAL_OPTS: LazyLock<RwLock<GlobalOpts>> =
    LazyLock::new(|| RwLock::new(GlobalOpts::default()));

/// Resolves the default verbosity from the LOG_LEVEL environment variable.
/// Unrecognized values produce a warning and fall back to the info level.
fn verbosity_from_env() -> u32 {
    match std::env::var("LOG_LEVEL") {
        Err(_) => DEFAULT_VERBOSITY,
        Ok(level) => match level.to_lowercase().as_str() {
            "error" => 0,
            "warn" | "warning" => 1,
            "info" => 2,
            "debug" | "trace" => 3,
            _ => {
                ui::cli::log_warning(&format!(
                    "unrecognized LOG_LEVEL value \"{level}\", defaulting to info"
                ));
                DEFAULT_VERBOSITY
            }
        },
    }
}

pub fn set_global_opts_with_args(global_args: &GlobalArgs) {
    let verbosity = if global_args.quiet {
        0
    } else if let Some(v) = global_args.verbosity {
        v
    } else {
        verbosity_from_env()
    };

    let mut opts_guard = GLOBAL_OPTS.write();
    opts_guard.verbosity = verbosity;
}

pub fn global_opts() -> RwLockReadGuard<'static, GlobalOpts> {
    GLOBAL_OPTS.read()
}

/// Current verbosity level. Used by the logging macros.
#[inline]
pub fn verbosity() -> u32 {
    GLOBAL_OPTS.read().verbosity
}
