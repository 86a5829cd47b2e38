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

use std::{path::Path, time::Duration};

use anyhow::Result;

use ardilla::{
    cancel::CancelToken,
    commands::{GlobalArgs, cmd_backup},
};

mod test_cmd_backup;
mod test_cmd_clean;
mod test_cmd_copy;
mod test_cmd_restore;

pub(crate) fn global_args() -> GlobalArgs {
    GlobalArgs {
        quiet: false,
        verbosity: None,
    }
}

pub(crate) fn backup_args(source: &Path, dest: &Path, database: &Path) -> cmd_backup::CmdArgs {
    cmd_backup::CmdArgs {
        source: source.to_path_buf(),
        dest: dest.to_path_buf(),
        database: database.to_path_buf(),
        archive_prefix: "backup-".to_string(),
        max_size: 0,
        include_large_files: false,
        dry_run: false,
    }
}

pub(crate) fn run_backup(args: &cmd_backup::CmdArgs) -> Result<()> {
    // Part names carry a millisecond timestamp; spacing runs out keeps them
    // unique.
    std::thread::sleep(Duration::from_millis(5));
    cmd_backup::run(&global_args(), args, &CancelToken::new())
}

/// True for `<prefix><digits>.zip` (the name of part 0).
pub(crate) fn matches_part_name(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".zip"))
        .is_some_and(|stem| !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()))
}
