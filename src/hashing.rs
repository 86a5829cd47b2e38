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
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

use anyhow::{Context, Result};
use xxhash_rust::xxh64::Xxh64;

const HASH_SEED: u64 = 0;
const READ_BUF_SIZE: usize = 64 * 1024;

/// Computes the 64-bit content hash of a reader, consuming it to EOF.
/// The reader is not closed.
pub fn compute_hash<R: Read>(reader: &mut R) -> Result<u64> {
    let mut hasher = Xxh64::new(HASH_SEED);
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("could not read stream"),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.digest())
}

/// Computes the 64-bit content hash of the file at `path`.
/// The file is opened read-only and released on every exit path.
pub fn compute_file_hash(path: &Path) -> Result<u64> {
    let mut file =
        File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    compute_hash(&mut file).with_context(|| format!("could not hash {}", path.display()))
}

/// A reader that feeds every byte it hands out into the content hasher.
///
/// Copying through this reader into an archive entry yields the stored hash
/// of exactly the bytes that were written.
pub struct HashingReader<R> {
    inner: R,
    hasher: Xxh64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Xxh64::new(HASH_SEED),
        }
    }

    /// The hash of all bytes read so far.
    pub fn digest(&self) -> u64 {
        self.hasher.digest()
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
