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

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Args;

use crate::{
    archiver::{self, ArchiveSpec, StoreOptions},
    cancel::CancelToken,
    catalog::Catalog,
    commands::{GlobalArgs, cmd_backup::verify_destination},
    config::{self, Config},
    global::defaults::{CONFIG_POLL_INTERVAL, SCHEDULER_WORKERS},
    scanner::AssetStreamer,
    scheduler::{Job, Scheduler, watcher},
    ui,
};

#[derive(Args, Debug)]
#[clap(about = "Run the backup service")]
pub struct CmdArgs {
    /// Config file path
    #[clap(short = 'c', long, value_parser)]
    pub config: PathBuf,

    /// Database path
    #[clap(short = 'd', long, value_parser)]
    pub database: PathBuf,

    /// Don't write any files, just log the outcome
    #[clap(long, default_value_t = false)]
    pub dry_run: bool,
}

pub fn run(_global_args: &GlobalArgs, args: &CmdArgs, cancel: &CancelToken) -> Result<()> {
    let cfg = config::load_from_file(&args.config).context("could not load config")?;

    let catalog = Catalog::open(&args.database, args.dry_run).context("could not open database")?;
    let scheduler = Arc::new(Scheduler::new(SCHEDULER_WORKERS));

    add_sync_jobs_from_config(&scheduler, &cfg, &catalog, cancel, args.dry_run);

    // Hot reload: on a config change, all jobs are replaced with the new
    // set.
    let watcher_handle = {
        let scheduler = scheduler.clone();
        let catalog = catalog.clone();
        let cancel_jobs = cancel.clone();
        let config_path = args.config.clone();
        let dry_run = args.dry_run;

        let result = watcher::watch_file(
            cancel.clone(),
            args.config.clone(),
            crossbeam_channel::tick(CONFIG_POLL_INTERVAL),
            move || {
                ui::cli::info!("config file changed, reloading");
                match config::load_from_file(&config_path) {
                    Err(e) => ui::cli::error!("could not load config: {e:#}"),
                    Ok(cfg) => {
                        scheduler.remove_jobs();
                        add_sync_jobs_from_config(
                            &scheduler,
                            &cfg,
                            &catalog,
                            &cancel_jobs,
                            dry_run,
                        );
                    }
                }
            },
            |e| ui::cli::error!("could not watch config file: {e:#}"),
        );

        match result {
            Ok(handle) => Some(handle),
            Err(e) => {
                ui::cli::error!("could not watch config file: {e:#}");
                None
            }
        }
    };

    scheduler.start();

    while !cancel.is_canceled() {
        std::thread::sleep(Duration::from_millis(200));
    }

    scheduler.stop();
    if let Some(handle) = watcher_handle {
        let _ = handle.join();
    }

    Ok(())
}

fn add_sync_jobs_from_config(
    scheduler: &Scheduler,
    cfg: &Config,
    catalog: &Catalog,
    cancel: &CancelToken,
    dry_run: bool,
) {
    let mut source_dirs: HashSet<String> = HashSet::new();
    let mut dest_dirs: HashSet<String> = HashSet::new();

    for source in &cfg.sources {
        if let Err(e) = config::validate_source(source) {
            ui::cli::warning!("skipping source: {e:#}");
            continue;
        }

        // Duplicates within one config file: first wins.
        if !source_dirs.insert(source.source_dir.clone()) {
            ui::cli::warning!("skipping duplicate source {}", source.source_dir);
            continue;
        }
        if !dest_dirs.insert(source.archive_dir.clone()) {
            ui::cli::warning!("skipping duplicate destination {}", source.archive_dir);
            continue;
        }

        if !source.enable {
            ui::cli::info!("skipping disabled backup source {}", source.source_dir);
            continue;
        }

        let job = Arc::new(BackupJob {
            cancel: cancel.clone(),
            source_dir: PathBuf::from(&source.source_dir),
            archive_dir: PathBuf::from(&source.archive_dir),
            archive_prefix: source.archive_prefix.clone(),
            max_file_bytes: source.archive_max_file_size.bytes,
            include_large_files: source.archive_include_large_files,
            dry_run,
            catalog: catalog.clone(),
        });

        match scheduler.add_job(&source.schedule, job) {
            Err(e) => {
                ui::cli::error!(
                    "could not add backup job for {}: {e:#}",
                    source.source_dir
                );
            }
            Ok(_) => {
                ui::cli::info!(
                    "added sync job {} -> {} ({})",
                    source.source_dir,
                    source.archive_dir,
                    source.schedule
                );
            }
        }
    }
}

// One scheduled incremental backup of one configured source.
struct BackupJob {
    cancel: CancelToken,
    source_dir: PathBuf,
    archive_dir: PathBuf,
    archive_prefix: String,
    max_file_bytes: u64,
    include_large_files: bool,
    dry_run: bool,
    catalog: Catalog,
}

impl BackupJob {
    fn backup(&self) -> Result<()> {
        archiver::validate_max_file_bytes(self.max_file_bytes)?;
        verify_destination(&self.archive_dir)?;

        let source = self.catalog.get_source(&self.source_dir)?;
        let scanned = AssetStreamer::new(&self.source_dir, self.cancel.clone())?;
        if self.cancel.is_canceled() {
            return Ok(());
        }

        archiver::store_assets(
            &self.cancel,
            &self.source_dir,
            &ArchiveSpec {
                dir: self.archive_dir.clone(),
                prefix: self.archive_prefix.clone(),
            },
            scanned,
            Some(&source),
            &StoreOptions {
                dry_run: self.dry_run,
                max_file_bytes: self.max_file_bytes,
                include_large_files: self.include_large_files,
            },
        )?;
        Ok(())
    }
}

impl Job for BackupJob {
    fn run(&self) {
        if let Err(e) = self.backup() {
            ui::cli::error!(
                "backup job failed for {}: {e:#}",
                self.source_dir.display()
            );
        }
    }
}
