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

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};

use crate::{cancel::CancelToken, ui, utils};

pub mod cmd_backup;
pub mod cmd_clean;
pub mod cmd_copy;
pub mod cmd_daemon;
pub mod cmd_restore;

// CLI arguments
#[derive(Parser, Debug)]
#[clap(
    version = env!("CARGO_PKG_VERSION"), // Version from crate metadata
    about = "Incremental ZIP backup tool",
)]
pub struct Cli {
    // Subcommand
    #[command(subcommand)]
    pub command: Command,

    // Global arguments
    #[clap(flatten)]
    pub global_args: GlobalArgs,
}

// List of commands
#[derive(Subcommand, Debug)]
pub enum Command {
    Backup(cmd_backup::CmdArgs),
    Restore(cmd_restore::CmdArgs),
    Copy(cmd_copy::CmdArgs),
    Clean(cmd_clean::CmdArgs),
    Daemon(cmd_daemon::CmdArgs),
    #[clap(about = "Print the version")]
    Version,
}

#[derive(Parser, Debug)]
#[clap(group = ArgGroup::new("verbosity_group").multiple(true))]
pub struct GlobalArgs {
    /// Disable logging (verbosity = 0)
    #[clap(long, value_parser, group = "verbosity_group")]
    pub quiet: bool,

    /// Set the verbosity level [0-3]
    #[clap(short = 'v', long, value_parser, group = "verbosity_group")]
    pub verbosity: Option<u32>,
}

/// clap value parser for human-readable size arguments.
pub(crate) fn parse_size_arg(s: &str) -> std::result::Result<u64, String> {
    utils::parse_size_string(s).map_err(|e| format!("{e:#}"))
}

pub fn run(args: &Cli, cancel: &CancelToken) -> Result<()> {
    match &args.command {
        Command::Backup(cmd_args) => cmd_backup::run(&args.global_args, cmd_args, cancel),
        Command::Restore(cmd_args) => cmd_restore::run(&args.global_args, cmd_args, cancel),
        Command::Copy(cmd_args) => cmd_copy::run(&args.global_args, cmd_args, cancel),
        Command::Clean(cmd_args) => cmd_clean::run(&args.global_args, cmd_args, cancel),
        Command::Daemon(cmd_args) => cmd_daemon::run(&args.global_args, cmd_args, cancel),
        Command::Version => {
            ui::cli::log!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
