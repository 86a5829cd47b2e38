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
    use anyhow::Result;
    use tempfile::tempdir;

    use ardilla::{
        cancel::CancelToken,
        catalog::Catalog,
        commands::cmd_restore,
        restorer::{self, Resolution},
        testing::write_tree,
    };

    use crate::integration_tests::{backup_args, global_args, run_backup};

    const TREE: &[(&str, &[u8])] = &[
        ("a.txt", b"Content for file 0"),
        ("sub/b.txt", b"Content for file 1"),
        ("sub/deeper/c.txt", b"Content for file 2"),
    ];

    fn run_restore(args: &cmd_restore::CmdArgs) -> Result<()> {
        cmd_restore::run(&global_args(), args, &CancelToken::new())
    }

    #[test]
    fn test_restore_round_trip() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(&source, TREE)?;

        run_backup(&backup_args(&source, &dest, &database))?;

        // Lose the source tree, then restore it from the catalog.
        std::fs::remove_dir_all(&source)?;

        let restore_args = cmd_restore::CmdArgs {
            dest: source.clone(),
            database: database.clone(),
            dry_run: false,
        };
        run_restore(&restore_args)?;

        for (rel, contents) in TREE {
            assert_eq!(std::fs::read(source.join(rel))?, *contents, "{rel}");
        }

        Ok(())
    }

    #[test]
    fn test_restore_is_idempotent() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(&source, TREE)?;

        run_backup(&backup_args(&source, &dest, &database))?;
        std::fs::remove_dir_all(&source)?;

        let catalog = Catalog::open(&database, false)?;
        let src = catalog.get_source(&source)?;
        let cancel = CancelToken::new();

        let first = restorer::restore(
            &cancel,
            src.find_archived_assets(&cancel, None),
            &Resolution::Skip,
            false,
        )?;
        assert_eq!(first.restored, TREE.len());
        assert_eq!(first.skipped, 0);

        // The second pass restores nothing and skips every record.
        let second = restorer::restore(
            &cancel,
            src.find_archived_assets(&cancel, None),
            &Resolution::Skip,
            false,
        )?;
        assert_eq!(second.restored, 0);
        assert_eq!(second.skipped, TREE.len());

        for (rel, contents) in TREE {
            assert_eq!(std::fs::read(source.join(rel))?, *contents, "{rel}");
        }

        Ok(())
    }

    #[test]
    fn test_restore_keeps_locally_modified_files() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(&source, TREE)?;

        run_backup(&backup_args(&source, &dest, &database))?;

        // Local edit after the backup: restore must not clobber it.
        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(source.join("a.txt"), b"locally edited")?;

        let restore_args = cmd_restore::CmdArgs {
            dest: source.clone(),
            database,
            dry_run: false,
        };
        run_restore(&restore_args)?;

        assert_eq!(std::fs::read(source.join("a.txt"))?, b"locally edited");

        Ok(())
    }

    #[test]
    fn test_restore_dry_run_writes_nothing() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(&source, TREE)?;

        run_backup(&backup_args(&source, &dest, &database))?;
        std::fs::remove_dir_all(&source)?;

        let restore_args = cmd_restore::CmdArgs {
            dest: source.clone(),
            database,
            dry_run: true,
        };
        run_restore(&restore_args)?;

        assert!(!source.exists());

        Ok(())
    }
}
