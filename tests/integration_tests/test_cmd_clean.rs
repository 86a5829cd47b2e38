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

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tempfile::tempdir;

    use ardilla::{
        cancel::CancelToken,
        catalog::Catalog,
        commands::cmd_clean,
        testing::{list_zip_parts, write_tree, zip_entry_names},
    };

    use crate::integration_tests::{backup_args, global_args, run_backup};

    // Two full rewrites of the same tree: the first archive ends up fully
    // superseded by the second.
    fn seed_superseded_archive(
        source: &std::path::Path,
        dest: &std::path::Path,
        database: &std::path::Path,
    ) -> Result<()> {
        write_tree(source, &[("a.txt", b"version 1 a"), ("b.txt", b"version 1 b")])?;
        run_backup(&backup_args(source, dest, database))?;

        std::thread::sleep(Duration::from_millis(10));
        write_tree(source, &[("a.txt", b"version 2 aa"), ("b.txt", b"version 2 bb")])?;
        run_backup(&backup_args(source, dest, database))?;
        Ok(())
    }

    #[test]
    fn test_clean_removes_superseded_archives() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        seed_superseded_archive(&source, &dest, &database)?;
        assert_eq!(list_zip_parts(&dest)?.len(), 2);

        let clean_args = cmd_clean::CmdArgs {
            source: Some(source.clone()),
            database: database.clone(),
            archive_limit: 0,
            dry_run: false,
        };
        cmd_clean::run(&global_args(), &clean_args, &CancelToken::new())?;

        // Only the newer archive survives, on disk and in the catalog.
        let parts = list_zip_parts(&dest)?;
        assert_eq!(parts.len(), 1);
        assert_eq!(zip_entry_names(&parts[0])?, vec!["a.txt", "b.txt"]);

        let catalog = Catalog::open(&database, false)?;
        let records: Vec<_> = catalog
            .get_source(&source)?
            .find_archived_assets(&CancelToken::new(), None)
            .collect();
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record.archive_path, parts[0]);
        }

        Ok(())
    }

    #[test]
    fn test_clean_without_source_covers_all_sources() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        seed_superseded_archive(&source, &dest, &database)?;

        let clean_args = cmd_clean::CmdArgs {
            source: None,
            database,
            archive_limit: 0,
            dry_run: false,
        };
        cmd_clean::run(&global_args(), &clean_args, &CancelToken::new())?;

        assert_eq!(list_zip_parts(&dest)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_clean_dry_run_deletes_nothing() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        seed_superseded_archive(&source, &dest, &database)?;

        let clean_args = cmd_clean::CmdArgs {
            source: Some(source.clone()),
            database: database.clone(),
            archive_limit: 0,
            dry_run: true,
        };
        cmd_clean::run(&global_args(), &clean_args, &CancelToken::new())?;

        assert_eq!(list_zip_parts(&dest)?.len(), 2);
        let catalog = Catalog::open(&database, false)?;
        let records: Vec<_> = catalog
            .get_source(&source)?
            .find_archived_assets(&CancelToken::new(), None)
            .collect();
        assert_eq!(records.len(), 2);

        Ok(())
    }

    #[test]
    fn test_clean_keeps_archives_with_live_assets() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;

        // Second run only rewrites one of the two files, so the first
        // archive still holds the only copy of the other.
        write_tree(&source, &[("a.txt", b"version 1 a"), ("b.txt", b"version 1 b")])?;
        run_backup(&backup_args(&source, &dest, &database))?;
        std::thread::sleep(Duration::from_millis(10));
        write_tree(&source, &[("b.txt", b"version 2 bb")])?;
        run_backup(&backup_args(&source, &dest, &database))?;

        let clean_args = cmd_clean::CmdArgs {
            source: Some(source),
            database,
            archive_limit: 0,
            dry_run: false,
        };
        cmd_clean::run(&global_args(), &clean_args, &CancelToken::new())?;

        assert_eq!(list_zip_parts(&dest)?.len(), 2);
        Ok(())
    }
}
