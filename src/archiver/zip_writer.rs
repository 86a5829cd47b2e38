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
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Datelike, Timelike, Utc};
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::error::BackupError;

const NULL_DEVICE: &str = "/dev/null";

enum Target {
    /// A real archive file, created on first use.
    Path(PathBuf),
    /// The null device; entries are compressed and discarded.
    Null,
}

/// A ZIP file that only comes into existence when the first entry is
/// created. Closing a writer that never opened is a no-op, so a part that
/// stores nothing leaves no file behind.
pub struct LazyZipFile {
    target: Target,
    writer: Option<ZipWriter<File>>,
    entry_open: bool,
}

impl LazyZipFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            target: Target::Path(path),
            writer: None,
            entry_open: false,
        }
    }

    /// A writer backed by the null device, for dry runs.
    pub fn null() -> Self {
        Self {
            target: Target::Null,
            writer: None,
            entry_open: false,
        }
    }

    pub fn path(&self) -> &Path {
        match &self.target {
            Target::Path(path) => path,
            Target::Null => Path::new(NULL_DEVICE),
        }
    }

    fn open(&mut self) -> Result<()> {
        let file = match &self.target {
            Target::Null => OpenOptions::new()
                .write(true)
                .open(NULL_DEVICE)
                .context("could not open null device")?,
            Target::Path(path) => {
                match OpenOptions::new().write(true).create_new(true).open(path) {
                    Ok(file) => file,
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        return Err(BackupError::AlreadyExists { path: path.clone() }.into());
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("could not create archive {}", path.display())
                        });
                    }
                }
            }
        };
        self.writer = Some(ZipWriter::new(file));
        Ok(())
    }

    /// Starts a Deflate entry carrying the uncompressed size and mod time.
    /// The first entry lazily opens the backing file; an existing file at
    /// the target path is refused rather than overwritten. The entry body is
    /// then written through the `Write` impl.
    pub fn start_entry(&mut self, name: &str, size: u64, mod_time: DateTime<Utc>) -> Result<()> {
        if self.writer.is_none() {
            self.open()?;
        }

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip_datetime(mod_time))
            .large_file(size >= u32::MAX as u64);

        let Some(writer) = self.writer.as_mut() else {
            bail!("archive writer unavailable");
        };
        // Open entries are finalized by the next start_file or by finish.
        writer
            .start_file(name, options)
            .with_context(|| format!("could not create archive entry {name}"))?;
        self.entry_open = true;
        Ok(())
    }

    /// Flushes the central directory and closes the backing file. Idempotent:
    /// closing a writer that never opened succeeds silently.
    pub fn close(&mut self) -> Result<()> {
        self.entry_open = false;
        if let Some(mut writer) = self.writer.take() {
            writer
                .finish()
                .with_context(|| format!("could not close archive {}", self.path().display()))?;
        }
        Ok(())
    }

    /// Removes the backing file, if one was ever created.
    pub fn delete(&mut self) -> Result<()> {
        if let Target::Path(path) = &self.target {
            if path.exists() {
                std::fs::remove_file(path)
                    .with_context(|| format!("could not delete {}", path.display()))?;
            }
        }
        Ok(())
    }
}

impl Write for LazyZipFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match (&mut self.writer, self.entry_open) {
            (Some(writer), true) => writer.write(buf),
            _ => Err(std::io::Error::other("no open archive entry")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

// ZIP mod times are DOS-style local times with 2-second resolution and no
// years before 1980; out-of-range times fall back to the format's epoch.
fn zip_datetime(dt: DateTime<Utc>) -> zip::DateTime {
    zip::DateTime::from_date_and_time(
        dt.year().clamp(0, u16::MAX as i32) as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second().min(59) as u8,
    )
    .unwrap_or_default()
}
