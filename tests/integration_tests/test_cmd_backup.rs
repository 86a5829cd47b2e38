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
    use std::{fs::File, io::Read, time::Duration};

    use anyhow::Result;
    use tempfile::tempdir;

    use ardilla::{
        cancel::CancelToken,
        catalog::Catalog,
        hashing,
        testing::{list_zip_parts, write_tree, zip_entry_names},
    };

    use crate::integration_tests::{backup_args, matches_part_name, run_backup};

    #[test]
    fn test_basic_backup() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(
            &source,
            &[
                ("a.txt", b"Content for file 0"),
                ("b.txt", b"Content for file 1"),
                ("c.txt", b"Content for file 2"),
            ],
        )?;

        run_backup(&backup_args(&source, &dest, &database))?;

        // Exactly one archive named backup-<millis>.zip with the three
        // entries, relative to the source root.
        let parts = list_zip_parts(&dest)?;
        assert_eq!(parts.len(), 1);
        let name = parts[0].file_name().unwrap().to_string_lossy();
        assert!(matches_part_name(&name, "backup-"), "bad part name {name}");
        assert_eq!(zip_entry_names(&parts[0])?, vec!["a.txt", "b.txt", "c.txt"]);

        // The stored hash of every record matches both the source bytes and
        // the bytes actually present in the ZIP entry.
        let catalog = Catalog::open(&database, false)?;
        let records: Vec<_> = catalog
            .get_source(&source)?
            .find_archived_assets(&CancelToken::new(), None)
            .collect();
        assert_eq!(records.len(), 3);

        let mut archive = zip::ZipArchive::new(File::open(&parts[0])?)?;
        for record in records {
            let source_hash = hashing::compute_file_hash(&record.path)?;
            assert_eq!(record.hash, source_hash);

            let rel = record.path.strip_prefix(&source)?.to_string_lossy().into_owned();
            let mut entry = archive.by_name(&rel)?;
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            assert_eq!(
                record.hash,
                hashing::compute_hash(&mut std::io::Cursor::new(bytes))?
            );
        }

        Ok(())
    }

    #[test]
    fn test_size_bounded_split() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(
            &source,
            &[
                ("a.dat", &[b'a'; 1000][..]),
                ("b.dat", &[b'b'; 2000][..]),
                ("c.dat", &[b'c'; 3000][..]),
            ],
        )?;

        // c.dat alone reaches the bound, so it needs the large-file policy
        // to be stored at all.
        let mut args = backup_args(&source, &dest, &database);
        args.max_size = 2500;
        args.include_large_files = true;
        run_backup(&args)?;

        // Next-would-exceed rollover: one part per file, three entries in
        // total.
        let parts = list_zip_parts(&dest)?;
        assert_eq!(parts.len(), 3);
        let mut all_entries = Vec::new();
        for part in &parts {
            let entries = zip_entry_names(part)?;
            assert_eq!(entries.len(), 1);
            all_entries.extend(entries);
        }
        all_entries.sort();
        assert_eq!(all_entries, vec!["a.dat", "b.dat", "c.dat"]);

        // Part 0 holds only the 1000-byte file: the next asset would have
        // reached the bound.
        let base = parts
            .iter()
            .find(|p| {
                matches_part_name(&p.file_name().unwrap().to_string_lossy(), "backup-")
            })
            .expect("part 0 missing");
        assert_eq!(zip_entry_names(base)?, vec!["a.dat"]);

        Ok(())
    }

    #[test]
    fn test_large_file_policy() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        write_tree(
            &source,
            &[("large.dat", &[b'L'; 2000][..]), ("small.dat", &[b's'; 17][..])],
        )?;

        // Without the policy the large file is skipped.
        let dest_skip = tmp_dir.path().join("dest_skip");
        std::fs::create_dir_all(&dest_skip)?;
        let mut args = backup_args(&source, &dest_skip, &database);
        args.max_size = 1000;
        run_backup(&args)?;

        let parts = list_zip_parts(&dest_skip)?;
        assert_eq!(parts.len(), 1);
        assert_eq!(zip_entry_names(&parts[0])?, vec!["small.dat"]);

        // With the policy, every asset of size >= the bound gets a part of
        // its own.
        let dest_keep = tmp_dir.path().join("dest_keep");
        std::fs::create_dir_all(&dest_keep)?;
        let database_keep = tmp_dir.path().join("catalog_keep.db");
        let mut args = backup_args(&source, &dest_keep, &database_keep);
        args.max_size = 1000;
        args.include_large_files = true;
        run_backup(&args)?;

        let parts = list_zip_parts(&dest_keep)?;
        assert_eq!(parts.len(), 2);
        let mut all_entries = Vec::new();
        for part in &parts {
            let entries = zip_entry_names(part)?;
            assert_eq!(entries.len(), 1);
            all_entries.extend(entries);
        }
        all_entries.sort();
        assert_eq!(all_entries, vec!["large.dat", "small.dat"]);

        Ok(())
    }

    #[test]
    fn test_incremental_rerun() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(
            &source,
            &[
                ("a.txt", b"Content for file 0"),
                ("b.txt", b"Content for file 1"),
                ("c.txt", b"Content for file 2"),
            ],
        )?;

        let args = backup_args(&source, &dest, &database);
        run_backup(&args)?;
        assert_eq!(list_zip_parts(&dest)?.len(), 1);

        // Nothing changed: no part is even created.
        run_backup(&args)?;
        assert_eq!(list_zip_parts(&dest)?.len(), 1);

        // Touch one file: the next run stores exactly that file.
        std::thread::sleep(Duration::from_millis(10));
        std::fs::write(source.join("b.txt"), b"Content for file 1, updated")?;
        run_backup(&args)?;

        let mut parts = list_zip_parts(&dest)?;
        assert_eq!(parts.len(), 2);
        parts.sort_by_key(|p| std::fs::metadata(p).unwrap().modified().unwrap());
        assert_eq!(zip_entry_names(&parts[1])?, vec!["b.txt"]);

        // The catalog serves the new version for b and the old versions for
        // a and c.
        let catalog = Catalog::open(&database, false)?;
        let records: Vec<_> = catalog
            .get_source(&source)?
            .find_archived_assets(&CancelToken::new(), None)
            .collect();
        assert_eq!(records.len(), 3);
        for record in records {
            let expected = hashing::compute_file_hash(&record.path)?;
            assert_eq!(record.hash, expected);
            if record.path == source.join("b.txt") {
                assert_eq!(record.archive_path, parts[1]);
            } else {
                assert_eq!(record.archive_path, parts[0]);
            }
        }

        Ok(())
    }

    #[test]
    fn test_dry_run_conservation() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(&source, &[("a.txt", b"aaa"), ("b.txt", b"bbb")])?;

        let mut args = backup_args(&source, &dest, &database);
        args.dry_run = true;
        run_backup(&args)?;

        // No archive file, no catalog rows.
        assert!(list_zip_parts(&dest)?.is_empty());
        let catalog = Catalog::open(&database, false)?;
        let records: Vec<_> = catalog
            .get_source(&source)?
            .find_archived_assets(&CancelToken::new(), None)
            .collect();
        assert!(records.is_empty());

        // A real run stores exactly the assets the dry run reported.
        let mut args = backup_args(&source, &dest, &database);
        args.dry_run = false;
        run_backup(&args)?;
        let records: Vec<_> = catalog
            .get_source(&source)?
            .find_archived_assets(&CancelToken::new(), None)
            .collect();
        assert_eq!(records.len(), 2);

        Ok(())
    }

    #[test]
    fn test_max_size_boundaries() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;
        write_tree(&source, &[("a.txt", b"data")])?;

        let mut args = backup_args(&source, &dest, &database);
        args.max_size = 1023;
        assert!(run_backup(&args).is_err());

        args.max_size = 1024;
        run_backup(&args)?;
        assert_eq!(list_zip_parts(&dest)?.len(), 1);

        Ok(())
    }

    #[test]
    fn test_empty_source_produces_no_parts() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let dest = tmp_dir.path().join("dest");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        std::fs::create_dir_all(&dest)?;

        run_backup(&backup_args(&source, &dest, &database))?;
        assert!(list_zip_parts(&dest)?.is_empty());

        Ok(())
    }

    #[test]
    fn test_missing_destination_is_fatal() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("source");
        let database = tmp_dir.path().join("catalog.db");
        std::fs::create_dir_all(&source)?;
        write_tree(&source, &[("a.txt", b"data")])?;

        // Missing destination directory, real run and dry run alike.
        let missing = tmp_dir.path().join("missing_dest");
        let mut args = backup_args(&source, &missing, &database);
        assert!(run_backup(&args).is_err());
        args.dry_run = true;
        assert!(run_backup(&args).is_err());

        // Destination that is a file.
        let file_dest = tmp_dir.path().join("a_file");
        std::fs::write(&file_dest, b"not a directory")?;
        let args = backup_args(&source, &file_dest, &database);
        assert!(run_backup(&args).is_err());

        Ok(())
    }
}
