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
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{TransactionBehavior, params, params_from_iter, types::Value};

use crate::{
    asset::{ArchivedAsset, Asset},
    cancel::CancelToken,
    catalog::{Catalog, datetime_from_micros, path_to_text, timestamp_micros},
    global::defaults::CATALOG_BATCH_SIZE,
    ui,
};

/// One source root as seen through the catalog. Cheap to clone; all clones
/// share the catalog connection.
#[derive(Clone)]
pub struct BackupSource {
    catalog: Catalog,
    path: PathBuf,
}

/// Aggregate view of one archive: total uncompressed size and asset count.
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size: u64,
    pub asset_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveOrder {
    #[default]
    CreatedAt,
    /// Smallest uncompressed size first.
    Size,
}

/// Options for [`BackupSource::find_archives`]. Zero values disable the
/// corresponding filter.
#[derive(Debug, Clone, Default)]
pub struct FindArchives {
    pub limit: usize,
    pub order_by: ArchiveOrder,
    pub max_uncompressed_size: u64,
    /// Only archives whose every asset also appears in a strictly newer
    /// archive of the same source. Such archives are safe to delete.
    pub only_fully_backed_up: bool,
}

// Latest archived version of one path, as needed by the modification rule.
struct LatestRecord {
    hash: u64,
    size: u64,
    mod_time_micros: i64,
}

impl BackupSource {
    pub(crate) fn new(catalog: Catalog, path: PathBuf) -> Self {
        Self { catalog, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Filters a candidate sequence down to the assets that are new or
    /// modified with respect to the latest archived version per path.
    /// Candidates are probed in batches of 50 and yielded in arrival order.
    pub fn find_missing_assets<I>(&self, cancel: &CancelToken, from: I) -> MissingAssets<I>
    where
        I: Iterator<Item = Asset>,
    {
        ui::cli::info!("finding new or modified assets to backup");
        MissingAssets {
            source: self.clone(),
            upstream: from,
            cancel: cancel.clone(),
            pending: VecDeque::new(),
            upstream_done: false,
            finished: false,
            new_count: 0,
            modified_count: 0,
        }
    }

    /// Latest-version records per asset path for this source, newest first.
    /// With `archives`, only versions inside those archives are considered.
    pub fn find_archived_assets(
        &self,
        cancel: &CancelToken,
        archives: Option<Vec<PathBuf>>,
    ) -> ArchivedAssets {
        ArchivedAssets {
            source: self.clone(),
            cancel: cancel.clone(),
            archives: archives
                .map(|paths| paths.iter().map(|p| path_to_text(p)).collect()),
            offset: 0,
            page: VecDeque::new(),
            done: false,
        }
    }

    /// Archives owned by this source with their aggregate sizes, filtered
    /// and ordered per `opts`.
    pub fn find_archives(&self, cancel: &CancelToken, opts: FindArchives) -> Archives {
        Archives {
            source: self.clone(),
            cancel: cancel.clone(),
            opts: opts.clone(),
            offset: 0,
            remaining: opts.limit,
            page: VecDeque::new(),
            done: false,
        }
    }

    /// Records a stream of archived assets, in batches of 50 inserts per
    /// transaction. Assets from a different source are logged and skipped.
    /// Returns the number of recorded assets.
    pub fn register<I>(&self, cancel: &CancelToken, from: I) -> Result<usize>
    where
        I: Iterator<Item = ArchivedAsset>,
    {
        ui::cli::info!("register backup assets");

        let count = self.record_assets_in_batches(cancel, from)?;
        if cancel.is_canceled() {
            ui::cli::info!("cancelled recording backup assets");
        } else if count == 0 {
            ui::cli::info!("no backup assets recorded");
        } else {
            ui::cli::info!("done recording backup assets ({count} recorded)");
        }
        Ok(count)
    }

    /// Removes the given archives and their asset records in one
    /// transaction. Archive rows are scoped to this source.
    pub fn delete_archives(&self, archive_paths: &[PathBuf]) -> Result<()> {
        if archive_paths.is_empty() {
            return Ok(());
        }

        ui::cli::info!("deleting {} archives from the catalog", archive_paths.len());

        if self.catalog.inner().dry_run {
            ui::cli::info!("would delete archives (dry run)");
            return Ok(());
        }

        let texts: Vec<Value> = archive_paths
            .iter()
            .map(|p| Value::from(path_to_text(p)))
            .collect();
        let in_clause = placeholders(1, texts.len());

        let mut conn = self.catalog.inner().conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("could not start delete transaction")?;

        tx.execute(
            &format!("DELETE FROM archive_asset WHERE archive_path IN ({in_clause})"),
            params_from_iter(texts.iter()),
        )
        .context("could not delete archive assets")?;

        let mut with_source = texts.clone();
        with_source.push(Value::from(path_to_text(&self.path)));
        tx.execute(
            &format!(
                "DELETE FROM archive WHERE path IN ({in_clause}) AND source_path = ?{}",
                texts.len() + 1
            ),
            params_from_iter(with_source.iter()),
        )
        .context("could not delete archives")?;

        tx.commit().context("could not commit archive deletion")?;
        ui::cli::info!("archives deleted ({})", archive_paths.len());
        Ok(())
    }

    // One query per batch: the latest archived version of each path in
    // `paths`, restricted to this source.
    fn latest_records(&self, paths: &[String]) -> Result<HashMap<String, LatestRecord>> {
        let in_clause = placeholders(2, paths.len());
        let sql = format!(
            "SELECT aa.path, aa.hash, aa.size, aa.mod_time \
             FROM archive_asset aa \
             JOIN archive a ON a.path = aa.archive_path \
             JOIN ( \
                 SELECT archive_asset.path AS path, \
                        MAX(archive_asset.created_at) AS max_created_at \
                 FROM archive_asset \
                 JOIN archive ON archive.path = archive_asset.archive_path \
                 WHERE archive.source_path = ?1 \
                   AND archive_asset.path IN ({in_clause}) \
                 GROUP BY archive_asset.path \
             ) latest ON latest.path = aa.path \
                     AND latest.max_created_at = aa.created_at \
             WHERE a.source_path = ?1"
        );

        let mut bind: Vec<Value> = Vec::with_capacity(paths.len() + 1);
        bind.push(Value::from(path_to_text(&self.path)));
        bind.extend(paths.iter().map(|p| Value::from(p.clone())));

        let conn = self.catalog.inner().conn.lock();
        let mut stmt = conn.prepare(&sql).context("could not prepare lookup")?;
        let rows = stmt
            .query_map(params_from_iter(bind.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    LatestRecord {
                        hash: row.get::<_, i64>(1)? as u64,
                        size: row.get::<_, i64>(2)? as u64,
                        mod_time_micros: row.get::<_, i64>(3)?,
                    },
                ))
            })
            .context("could not query latest records")?;

        let mut map = HashMap::new();
        for row in rows {
            let (path, record) = row.context("could not read latest record")?;
            map.insert(path, record);
        }
        Ok(map)
    }

    fn archived_assets_page(
        &self,
        archives: Option<&[String]>,
        offset: usize,
    ) -> Result<Vec<ArchivedAsset>> {
        let filter_len = archives.map_or(0, |a| a.len());
        let in_clause = placeholders(2, filter_len);
        let archive_filter = if filter_len > 0 {
            format!("AND archive_asset.archive_path IN ({in_clause})")
        } else {
            String::new()
        };
        let outer_filter = if filter_len > 0 {
            format!("AND aa.archive_path IN ({in_clause})")
        } else {
            String::new()
        };

        let sql = format!(
            "SELECT aa.archive_path, a.source_path, aa.path, aa.name, \
                    aa.hash, aa.mod_time, aa.size \
             FROM archive_asset aa \
             JOIN archive a ON a.path = aa.archive_path \
             JOIN ( \
                 SELECT archive_asset.path AS path, \
                        MAX(archive_asset.created_at) AS max_created_at \
                 FROM archive_asset \
                 JOIN archive ON archive.path = archive_asset.archive_path \
                 WHERE archive.source_path = ?1 {archive_filter} \
                 GROUP BY archive_asset.path \
             ) latest ON latest.path = aa.path \
                     AND latest.max_created_at = aa.created_at \
             WHERE a.source_path = ?1 {outer_filter} \
             ORDER BY aa.created_at DESC \
             LIMIT ?{} OFFSET ?{}",
            filter_len + 2,
            filter_len + 3,
        );

        let mut bind: Vec<Value> = Vec::with_capacity(filter_len + 3);
        bind.push(Value::from(path_to_text(&self.path)));
        if let Some(archives) = archives {
            bind.extend(archives.iter().map(|p| Value::from(p.clone())));
        }
        bind.push(Value::from(CATALOG_BATCH_SIZE as i64));
        bind.push(Value::from(offset as i64));

        let conn = self.catalog.inner().conn.lock();
        let mut stmt = conn.prepare(&sql).context("could not prepare lookup")?;
        let rows = stmt
            .query_map(params_from_iter(bind.iter()), |row| {
                Ok(ArchivedAsset {
                    archive_path: PathBuf::from(row.get::<_, String>(0)?),
                    source_path: PathBuf::from(row.get::<_, String>(1)?),
                    path: PathBuf::from(row.get::<_, String>(2)?),
                    name: row.get(3)?,
                    hash: row.get::<_, i64>(4)? as u64,
                    mod_time: datetime_from_micros(row.get::<_, i64>(5)?),
                    size: row.get::<_, i64>(6)? as u64,
                })
            })
            .context("could not query archived assets")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("could not read archived assets")
    }

    fn archives_page(
        &self,
        opts: &FindArchives,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ArchiveInfo>> {
        // All assets of a fully-backed-up archive have a newer version in
        // some other archive of the same source.
        let fully_backed_up = if opts.only_fully_backed_up {
            "AND NOT EXISTS ( \
                 SELECT 1 FROM archive_asset aa1 \
                 WHERE aa1.archive_path = a.path \
                   AND NOT EXISTS ( \
                       SELECT 1 FROM archive_asset aa2 \
                       JOIN archive a2 ON aa2.archive_path = a2.path \
                       WHERE aa2.path = aa1.path \
                         AND a2.source_path = a.source_path \
                         AND a2.created_at > a.created_at \
                   ) \
                 LIMIT 1 \
             )"
        } else {
            ""
        };
        let having = if opts.max_uncompressed_size > 0 {
            "HAVING COALESCE(SUM(aa.size), 0) <= ?2"
        } else {
            ""
        };
        let order = match opts.order_by {
            ArchiveOrder::Size => "uncompressed_size ASC",
            ArchiveOrder::CreatedAt => "a.created_at ASC",
        };
        let next = if opts.max_uncompressed_size > 0 { 3 } else { 2 };

        let sql = format!(
            "SELECT a.path, a.created_at, \
                    COALESCE(SUM(aa.size), 0) AS uncompressed_size, \
                    COUNT(aa.path) AS asset_count \
             FROM archive a \
             LEFT JOIN archive_asset aa ON a.path = aa.archive_path \
             WHERE a.source_path = ?1 {fully_backed_up} \
             GROUP BY a.path, a.created_at \
             {having} \
             ORDER BY {order} \
             LIMIT ?{next} OFFSET ?{}",
            next + 1,
        );

        let mut bind: Vec<Value> = vec![Value::from(path_to_text(&self.path))];
        if opts.max_uncompressed_size > 0 {
            bind.push(Value::from(opts.max_uncompressed_size as i64));
        }
        bind.push(Value::from(limit as i64));
        bind.push(Value::from(offset as i64));

        let conn = self.catalog.inner().conn.lock();
        let mut stmt = conn.prepare(&sql).context("could not prepare lookup")?;
        let rows = stmt
            .query_map(params_from_iter(bind.iter()), |row| {
                Ok(ArchiveInfo {
                    path: PathBuf::from(row.get::<_, String>(0)?),
                    created_at: datetime_from_micros(row.get::<_, i64>(1)?),
                    size: row.get::<_, i64>(2)? as u64,
                    asset_count: row.get::<_, i64>(3)? as u64,
                })
            })
            .context("could not query archives")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("could not read archives")
    }

    fn record_assets_in_batches<I>(&self, cancel: &CancelToken, mut from: I) -> Result<usize>
    where
        I: Iterator<Item = ArchivedAsset>,
    {
        let source_text = path_to_text(&self.path);
        let mut recorded = 0usize;
        let mut upstream_done = false;

        while !upstream_done {
            if cancel.is_canceled() {
                break;
            }

            let mut batch: Vec<ArchivedAsset> = Vec::with_capacity(CATALOG_BATCH_SIZE);
            while batch.len() < CATALOG_BATCH_SIZE {
                match from.next() {
                    None => {
                        upstream_done = true;
                        break;
                    }
                    Some(asset) => {
                        if asset.source_path != self.path {
                            ui::cli::warning!(
                                "skipping asset from different source: {}",
                                asset.path.display()
                            );
                            continue;
                        }
                        batch.push(asset);
                    }
                }
            }

            if batch.is_empty() {
                break;
            }

            ui::cli::debug!("record archive assets batch ({})", batch.len());

            if self.catalog.inner().dry_run {
                recorded += batch.len();
                continue;
            }

            let now = timestamp_micros(&Utc::now());
            let mut conn = self.catalog.inner().conn.lock();
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .context("could not start register transaction")?;
            for asset in &batch {
                let archive_text = path_to_text(&asset.archive_path);
                tx.execute(
                    "INSERT OR IGNORE INTO archive (path, source_path, created_at) \
                     VALUES (?1, ?2, ?3)",
                    params![archive_text, source_text, now],
                )
                .context("could not record archive")?;
                tx.execute(
                    "INSERT INTO archive_asset \
                     (archive_path, path, name, hash, mod_time, created_at, size) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        archive_text,
                        path_to_text(&asset.path),
                        asset.name,
                        asset.hash as i64,
                        timestamp_micros(&asset.mod_time),
                        now,
                        asset.size as i64
                    ],
                )
                .context("could not record archive asset")?;
            }
            tx.commit().context("could not commit register batch")?;
            recorded += batch.len();
        }

        Ok(recorded)
    }
}

// Numbered SQL placeholders ?first..?first+count-1, comma separated.
fn placeholders(first: usize, count: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", first + i))
        .collect::<Vec<_>>()
        .join(", ")
}

// The modification rule: same mod time and size means unchanged; otherwise
// the current content hash decides. A hash-compute failure counts as
// unchanged (skip with a warning).
fn is_asset_modified(asset: &Asset, record: &LatestRecord) -> bool {
    if asset.mod_time.timestamp_micros() == record.mod_time_micros && asset.size == record.size {
        return false;
    }

    match asset.compute_hash() {
        Err(e) => {
            ui::cli::warning!(
                "could not compare asset {}: {e:#}. Skipping...",
                asset.path.display()
            );
            false
        }
        Ok(hash) => hash != record.hash,
    }
}

/// Streaming filter over a candidate sequence; see
/// [`BackupSource::find_missing_assets`].
pub struct MissingAssets<I> {
    source: BackupSource,
    upstream: I,
    cancel: CancelToken,
    pending: VecDeque<Asset>,
    upstream_done: bool,
    finished: bool,
    new_count: usize,
    modified_count: usize,
}

impl<I> MissingAssets<I> {
    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            if self.cancel.is_canceled() {
                ui::cli::info!("cancelled finding assets");
            } else if self.new_count + self.modified_count == 0 {
                ui::cli::info!("no new or modified assets found");
            } else {
                ui::cli::info!(
                    "done finding new or modified assets ({} new, {} modified)",
                    self.new_count,
                    self.modified_count
                );
            }
        }
    }
}

impl<I> Iterator for MissingAssets<I>
where
    I: Iterator<Item = Asset>,
{
    type Item = Asset;

    fn next(&mut self) -> Option<Asset> {
        loop {
            if self.cancel.is_canceled() {
                self.finish();
                return None;
            }
            if let Some(asset) = self.pending.pop_front() {
                return Some(asset);
            }
            if self.upstream_done {
                self.finish();
                return None;
            }

            let mut batch: Vec<Asset> = Vec::with_capacity(CATALOG_BATCH_SIZE);
            while batch.len() < CATALOG_BATCH_SIZE {
                match self.upstream.next() {
                    Some(asset) => batch.push(asset),
                    None => {
                        self.upstream_done = true;
                        break;
                    }
                }
            }
            if batch.is_empty() {
                continue;
            }

            let paths: Vec<String> = batch.iter().map(|a| path_to_text(&a.path)).collect();
            let latest = match self.source.latest_records(&paths) {
                Ok(map) => map,
                Err(e) => {
                    ui::cli::error!("could not read asset catalog records: {e:#}");
                    self.upstream_done = true;
                    self.finish();
                    return None;
                }
            };

            for asset in batch {
                match latest.get(&path_to_text(&asset.path)) {
                    None => {
                        ui::cli::debug!("asset not archived: {}", asset.path.display());
                        self.new_count += 1;
                        self.pending.push_back(asset);
                    }
                    Some(record) => {
                        if is_asset_modified(&asset, record) {
                            ui::cli::info!("asset was modified: {}", asset.path.display());
                            self.modified_count += 1;
                            self.pending.push_back(asset);
                        }
                    }
                }
            }
        }
    }
}

/// Paginated stream of latest-version archived assets; see
/// [`BackupSource::find_archived_assets`].
pub struct ArchivedAssets {
    source: BackupSource,
    cancel: CancelToken,
    archives: Option<Vec<String>>,
    offset: usize,
    page: VecDeque<ArchivedAsset>,
    done: bool,
}

impl Iterator for ArchivedAssets {
    type Item = ArchivedAsset;

    fn next(&mut self) -> Option<ArchivedAsset> {
        loop {
            if self.cancel.is_canceled() {
                return None;
            }
            if let Some(asset) = self.page.pop_front() {
                return Some(asset);
            }
            if self.done {
                return None;
            }

            match self
                .source
                .archived_assets_page(self.archives.as_deref(), self.offset)
            {
                Err(e) => {
                    ui::cli::error!("error fetching assets from the catalog: {e:#}");
                    self.done = true;
                }
                Ok(rows) => {
                    if rows.is_empty() {
                        self.done = true;
                        continue;
                    }
                    self.offset += CATALOG_BATCH_SIZE;
                    self.page.extend(rows);
                }
            }
        }
    }
}

/// Paginated stream of archive aggregates; see
/// [`BackupSource::find_archives`].
pub struct Archives {
    source: BackupSource,
    cancel: CancelToken,
    opts: FindArchives,
    offset: usize,
    remaining: usize,
    page: VecDeque<ArchiveInfo>,
    done: bool,
}

impl Iterator for Archives {
    type Item = ArchiveInfo;

    fn next(&mut self) -> Option<ArchiveInfo> {
        loop {
            if self.cancel.is_canceled() {
                return None;
            }
            if let Some(archive) = self.page.pop_front() {
                return Some(archive);
            }
            if self.done {
                return None;
            }

            let batch_size = if self.opts.limit > 0 {
                self.remaining.min(CATALOG_BATCH_SIZE)
            } else {
                CATALOG_BATCH_SIZE
            };
            if batch_size == 0 {
                self.done = true;
                continue;
            }

            match self.source.archives_page(&self.opts, batch_size, self.offset) {
                Err(e) => {
                    ui::cli::error!("error fetching archives from the catalog: {e:#}");
                    self.done = true;
                }
                Ok(rows) => {
                    if rows.is_empty() {
                        self.done = true;
                        continue;
                    }
                    if rows.len() < batch_size {
                        self.done = true;
                    }
                    self.offset += rows.len();
                    if self.opts.limit > 0 {
                        self.remaining = self.remaining.saturating_sub(rows.len());
                        if self.remaining == 0 {
                            self.done = true;
                        }
                    }
                    self.page.extend(rows);
                }
            }
        }
    }
}
