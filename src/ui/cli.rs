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

use colored::Colorize;

use crate::global;

/// Unconditional command output.
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        println!($($arg)*)
    };
}
pub use log;

/// Error log. Always shown.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::ui::cli::log_error(&format!($($arg)*))
    };
}
pub use error;

/// Warning log. Shown at verbosity >= 1.
#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::ui::cli::log_warning(&format!($($arg)*))
    };
}
pub use warning;

/// Operational log. Shown at verbosity >= 2.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::ui::cli::log_info(&format!($($arg)*))
    };
}
pub use info;

/// Tracing log. Shown at verbosity >= 3.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::ui::cli::log_debug(&format!($($arg)*))
    };
}
pub use debug;

/// Prints an error log (Error: ...)
pub fn log_error(str: &str) {
    eprintln!("{}: {}", "Error".bold().red(), str);
}

/// Prints a warning log (Warning: ...)
pub fn log_warning(str: &str) {
    if global::verbosity() >= 1 {
        eprintln!("{}: {}", "Warning".bold().yellow(), str);
    }
}

pub fn log_info(str: &str) {
    if global::verbosity() >= 2 {
        println!("{}: {}", "Info".bold().cyan(), str);
    }
}

pub fn log_debug(str: &str) {
    if global::verbosity() >= 3 {
        println!("{}: {}", "Debug".bold().purple(), str);
    }
}
