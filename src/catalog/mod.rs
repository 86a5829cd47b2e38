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

pub mod source;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{catalog::source::BackupSource, global::defaults::CATALOG_BUSY_TIMEOUT, ui};

/// The persistent record of sources, archives and archived asset versions.
///
/// The underlying SQLite store is single-writer: every statement and every
/// transaction runs behind one process-wide mutex. Cloning the catalog is
/// cheap; all clones share the connection. In dry-run mode the schema still
/// exists and reads work, but no row is ever written.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

pub(crate) struct CatalogInner {
    pub(crate) conn: Mutex<Connection>,
    pub(crate) dry_run: bool,
}

impl Catalog {
    pub fn open(path: &Path, dry_run: bool) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("could not open catalog at {}", path.display()))?;
        Self::setup(conn, dry_run)
    }

    /// An in-memory catalog, mainly useful for tests.
    pub fn open_in_memory(dry_run: bool) -> Result<Self> {
        let conn = Connection::open_in_memory().context("could not open in-memory catalog")?;
        Self::setup(conn, dry_run)
    }

    fn setup(conn: Connection, dry_run: bool) -> Result<Self> {
        conn.busy_timeout(CATALOG_BUSY_TIMEOUT)
            .context("could not set catalog busy timeout")?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("could not enable WAL for catalog")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("could not enable foreign keys for catalog")?;
        init_schema(&conn)?;

        Ok(Self {
            inner: Arc::new(CatalogInner {
                conn: Mutex::new(conn),
                dry_run,
            }),
        })
    }

    pub(crate) fn inner(&self) -> &CatalogInner {
        &self.inner
    }

    /// Finds or creates the source identified by its root path.
    pub fn get_source(&self, path: &Path) -> Result<BackupSource> {
        ui::cli::debug!("get source {}", path.display());

        let text = path_to_text(path);
        let conn = self.inner.conn.lock();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT created_at FROM source WHERE path = ?1",
                params![text],
                |row| row.get(0),
            )
            .optional()
            .context("could not look up source")?;

        if existing.is_none() && !self.inner.dry_run {
            conn.execute(
                "INSERT INTO source (path, created_at) VALUES (?1, ?2)",
                params![text, timestamp_micros(&Utc::now())],
            )
            .context("could not create source")?;
        }
        drop(conn);

        Ok(BackupSource::new(self.clone(), path.to_path_buf()))
    }

    /// All sources known to the catalog, in path order.
    pub fn iter_sources(&self) -> Result<Vec<BackupSource>> {
        ui::cli::debug!("get sources");

        let conn = self.inner.conn.lock();
        let mut stmt = conn
            .prepare("SELECT path FROM source ORDER BY path")
            .context("could not list sources")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("could not read sources")?;
        drop(stmt);
        drop(conn);

        Ok(paths
            .into_iter()
            .map(|p| BackupSource::new(self.clone(), PathBuf::from(p)))
            .collect())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS source (
            path TEXT PRIMARY KEY,
            created_at TIMESTAMP NOT NULL
        );
        CREATE TABLE IF NOT EXISTS archive (
            path TEXT PRIMARY KEY,
            source_path TEXT NOT NULL REFERENCES source(path),
            created_at TIMESTAMP NOT NULL
        );
        CREATE TABLE IF NOT EXISTS archive_asset (
            archive_path TEXT NOT NULL REFERENCES archive(path),
            path TEXT NOT NULL,
            name TEXT NOT NULL,
            hash INTEGER NOT NULL,
            mod_time TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL,
            size INTEGER NOT NULL,
            PRIMARY KEY (archive_path, path)
        );
        CREATE INDEX IF NOT EXISTS idx_archive_source_path
            ON archive(source_path);
        CREATE INDEX IF NOT EXISTS idx_archive_asset_path_created
            ON archive_asset(path, created_at);
        "#,
    )
    .context("could not initialize catalog schema")?;
    Ok(())
}

// Timestamps live in the catalog as integer microseconds since the Unix
// epoch, so SQL MAX/ordering comparisons stay exact.

pub(crate) fn timestamp_micros(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

pub(crate) fn datetime_from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub(crate) fn path_to_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
