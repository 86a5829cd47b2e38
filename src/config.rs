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

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::{error::BackupError, utils};

/// The daemon configuration: a list of sources to back up on a schedule.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub source_dir: String,
    #[serde(default)]
    pub archive_dir: String,
    #[serde(default)]
    pub archive_prefix: String,
    #[serde(default)]
    pub archive_max_file_size: SizeSpec,
    #[serde(default)]
    pub archive_include_large_files: bool,
    #[serde(default)]
    pub enable: bool,
    #[serde(default, rename = "cron")]
    pub schedule: String,
}

/// A byte count that deserializes from either an integer or a
/// human-readable string ("1G", "500M", "2MiB").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeSpec {
    pub bytes: u64,
}

impl<'de> Deserialize<'de> for SizeSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SizeVisitor;

        impl<'de> serde::de::Visitor<'de> for SizeVisitor {
            type Value = SizeSpec;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a byte count or a human-readable size string")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<SizeSpec, E> {
                Ok(SizeSpec { bytes: v })
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<SizeSpec, E> {
                if v < 0 {
                    return Err(E::custom("size must not be negative"));
                }
                Ok(SizeSpec { bytes: v as u64 })
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<SizeSpec, E> {
                let bytes = utils::parse_size_string(v).map_err(E::custom)?;
                Ok(SizeSpec { bytes })
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}

/// Loads and parses the JSON config file. A document that does not parse to
/// an object fails with a configuration error.
pub fn load_from_file(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read config file {}", path.display()))?;

    let config: Config =
        serde_json::from_str(&raw).map_err(|e| BackupError::ConfigInvalid(e.to_string()))?;
    Ok(config)
}

/// A source is only schedulable with a source dir, an archive dir and a
/// schedule.
pub fn validate_source(source: &SourceConfig) -> Result<()> {
    if source.source_dir.is_empty() {
        return Err(BackupError::ConfigInvalid("source must have a directory".into()).into());
    }
    if source.archive_dir.is_empty() {
        return Err(BackupError::ConfigInvalid("source must have a destination".into()).into());
    }
    if source.schedule.is_empty() {
        return Err(BackupError::ConfigInvalid("source must have a schedule".into()).into());
    }
    Ok(())
}
