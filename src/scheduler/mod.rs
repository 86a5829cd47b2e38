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

pub mod watcher;

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use threadpool::ThreadPool;

use crate::{error::BackupError, ui};

const DRIVER_TICK: Duration = Duration::from_millis(500);

/// A unit of recurring work driven by the scheduler.
pub trait Job: Send + Sync {
    fn run(&self);
}

struct Entry {
    schedule: Schedule,
    job: Arc<dyn Job>,
    next: Option<DateTime<Utc>>,
    /// Set while the job body runs; a firing that lands while the previous
    /// one is still going is skipped, so one entry never runs concurrently
    /// with itself.
    running: Arc<AtomicBool>,
}

/// Cron-driven job runner. Jobs execute on a worker pool; the driver thread
/// only decides what is due.
pub struct Scheduler {
    entries: Arc<Mutex<HashMap<u64, Entry>>>,
    pool: ThreadPool,
    next_id: AtomicU64,
    stop_flag: Arc<AtomicBool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            pool: ThreadPool::new(workers.max(1)),
            next_id: AtomicU64::new(0),
            stop_flag: Arc::new(AtomicBool::new(false)),
            driver: Mutex::new(None),
        }
    }

    /// Registers a job under a standard 5-field cron schedule. Returns the
    /// entry id, or an error for an unparsable schedule.
    pub fn add_job(&self, schedule: &str, job: Arc<dyn Job>) -> Result<u64> {
        // The cron parser wants a seconds field; user-facing schedules are
        // the standard 5-field form.
        let normalized = format!("0 {}", schedule.trim());
        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| BackupError::ScheduleInvalid(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let next = schedule.upcoming(Utc).next();
        self.entries.lock().insert(
            id,
            Entry {
                schedule,
                job,
                next,
                running: Arc::new(AtomicBool::new(false)),
            },
        );
        Ok(id)
    }

    /// Removes every registered job. Jobs already running finish on their
    /// own.
    pub fn remove_jobs(&self) {
        self.entries.lock().clear();
    }

    pub fn job_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Starts the driver thread. Idempotent.
    pub fn start(&self) {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return;
        }

        self.stop_flag.store(false, Ordering::Release);
        let entries = self.entries.clone();
        let pool = self.pool.clone();
        let stop_flag = self.stop_flag.clone();

        *driver = Some(std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Acquire) {
                let now = Utc::now();
                {
                    let mut entries = entries.lock();
                    for entry in entries.values_mut() {
                        let due = match entry.next {
                            Some(next) => next <= now,
                            None => false,
                        };
                        if due {
                            if entry.running.swap(true, Ordering::AcqRel) {
                                ui::cli::debug!("job still running, skipping this firing");
                            } else {
                                let job = entry.job.clone();
                                let running = entry.running.clone();
                                pool.execute(move || {
                                    job.run();
                                    running.store(false, Ordering::Release);
                                });
                            }
                            entry.next = entry.schedule.after(&now).next();
                        }
                    }
                }
                std::thread::sleep(DRIVER_TICK);
            }
        }));
    }

    /// Stops the driver thread. Idempotent; running jobs are not
    /// interrupted.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.driver.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
