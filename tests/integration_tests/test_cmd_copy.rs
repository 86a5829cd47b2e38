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
        commands::{cmd_clean, cmd_copy},
        restorer::{self, Resolution},
        testing::{list_zip_parts, write_tree},
    };

    use crate::integration_tests::{backup_args, global_args, run_backup};

    #[test]
    fn test_copy_compacts_archives() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let compacted = tmp_dir.path().join("compacted");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        std::fs::create_dir_all(&compacted)?;
        write_tree(
            &source,
            &[("a.txt", b"Content for file 0"), ("b.txt", b"Content for file 1")],
        )?;

        // Two backup runs produce two archives: the second holds the
        // updated b.txt only.
        run_backup(&backup_args(&source, &dest, &database))?;
        std::thread::sleep(Duration::from_millis(10));
        std::fs::write(source.join("b.txt"), b"Content for file 1, updated")?;
        run_backup(&backup_args(&source, &dest, &database))?;
        assert_eq!(list_zip_parts(&dest)?.len(), 2);

        let copy_args = cmd_copy::CmdArgs {
            source: Some(source.clone()),
            dest: compacted.clone(),
            database: database.clone(),
            max_size: 0,
            archive_limit: 0,
            archive_prefix: "compact-".to_string(),
            dry_run: false,
        };
        std::thread::sleep(Duration::from_millis(5));
        cmd_copy::run(&global_args(), &copy_args, &CancelToken::new())?;

        // One fresh archive; the old ones are still there.
        assert_eq!(list_zip_parts(&compacted)?.len(), 1);
        assert_eq!(list_zip_parts(&dest)?.len(), 2);

        // The latest version of every path now lives in the compacted
        // archive, with its stored hash carried over.
        let catalog = Catalog::open(&database, false)?;
        let src = catalog.get_source(&source)?;
        let records: Vec<_> = src
            .find_archived_assets(&CancelToken::new(), None)
            .collect();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(record.archive_path.starts_with(&compacted));
        }

        // Old archives are now fully superseded; clean removes them and a
        // restore afterwards still reproduces the source.
        let clean_args = cmd_clean::CmdArgs {
            source: Some(source.clone()),
            database: database.clone(),
            archive_limit: 0,
            dry_run: false,
        };
        cmd_clean::run(&global_args(), &clean_args, &CancelToken::new())?;
        assert!(list_zip_parts(&dest)?.is_empty());
        assert_eq!(list_zip_parts(&compacted)?.len(), 1);

        std::fs::remove_dir_all(&source)?;
        let cancel = CancelToken::new();
        let summary = restorer::restore(
            &cancel,
            src.find_archived_assets(&cancel, None),
            &Resolution::Skip,
            false,
        )?;
        assert_eq!(summary.restored, 2);
        assert_eq!(
            std::fs::read(source.join("a.txt"))?,
            b"Content for file 0"
        );
        assert_eq!(
            std::fs::read(source.join("b.txt"))?,
            b"Content for file 1, updated"
        );

        Ok(())
    }

    #[test]
    fn test_copy_dry_run_writes_nothing() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let compacted = tmp_dir.path().join("compacted");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        std::fs::create_dir_all(&compacted)?;
        write_tree(&source, &[("a.txt", b"Content for file 0")])?;

        run_backup(&backup_args(&source, &dest, &database))?;

        let copy_args = cmd_copy::CmdArgs {
            source: Some(source.clone()),
            dest: compacted.clone(),
            database: database.clone(),
            max_size: 0,
            archive_limit: 0,
            archive_prefix: String::new(),
            dry_run: true,
        };
        cmd_copy::run(&global_args(), &copy_args, &CancelToken::new())?;

        assert!(list_zip_parts(&compacted)?.is_empty());

        // The catalog still points at the original archive.
        let catalog = Catalog::open(&database, false)?;
        let records: Vec<_> = catalog
            .get_source(&source)?
            .find_archived_assets(&CancelToken::new(), None)
            .collect();
        assert_eq!(records.len(), 1);
        assert!(records[0].archive_path.starts_with(&dest));

        Ok(())
    }
}
