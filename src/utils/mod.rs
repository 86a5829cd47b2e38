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

use anyhow::{Context, Result, anyhow};

// --- Constants ---

#[allow(non_upper_case_globals)]
pub mod size {
    pub const KiB: u64 = 1024;
    pub const MiB: u64 = KiB * 1024;
    pub const GiB: u64 = MiB * 1024;
    pub const TiB: u64 = GiB * 1024;

    pub const KB: u64 = 1000;
    pub const MB: u64 = KB * 1000;
    pub const GB: u64 = MB * 1000;
    pub const TB: u64 = GB * 1000;
}

// --- Formatting ---

/// Formats a byte count into a human-readable string with binary prefixes (KiB, MiB, etc.).
#[allow(non_upper_case_globals)]
pub fn format_size(bytes: u64, precision: usize) -> String {
    if bytes >= size::TiB {
        format!("{:.precision$} TiB", (bytes as f64) / (size::TiB as f64))
    } else if bytes >= size::GiB {
        format!("{:.precision$} GiB", (bytes as f64) / (size::GiB as f64))
    } else if bytes >= size::MiB {
        format!("{:.precision$} MiB", (bytes as f64) / (size::MiB as f64))
    } else if bytes >= size::KiB {
        format!("{:.precision$} KiB", (bytes as f64) / (size::KiB as f64))
    } else {
        format!("{bytes} B")
    }
}

/// Formats a count with appropriate singular or plural suffix.
pub fn format_count<T>(count: T, singular: &str, plural: &str) -> String
where
    T: std::fmt::Display + PartialEq + From<u8>,
{
    if count == T::from(1) {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

// --- Parsing ---

/// Parses a human-readable size string (e.g., "1024", "500M", "1.5GiB") into bytes.
///
/// Decimal suffixes (K, KB, M, MB, G, GB, T, TB) are powers of 1000; binary
/// suffixes (KiB, MiB, GiB, TiB) are powers of 1024. A bare number or a "B"
/// suffix is taken as bytes. Suffixes are case-insensitive.
pub fn parse_size_string(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("empty size string"));
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (num_str, unit_str) = s.split_at(split);

    let value: f64 = num_str
        .parse()
        .with_context(|| format!("invalid number in size \"{s}\""))?;

    let multiplier = match unit_str.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => size::KB,
        "ki" | "kib" => size::KiB,
        "m" | "mb" => size::MB,
        "mi" | "mib" => size::MiB,
        "g" | "gb" => size::GB,
        "gi" | "gib" => size::GiB,
        "t" | "tb" => size::TB,
        "ti" | "tib" => size::TiB,
        unit => return Err(anyhow!("invalid size unit \"{}\" in \"{}\"", unit, s)),
    };

    Ok((value * multiplier as f64) as u64)
}

// --- Duration Utilities ---

/// Pretty prints a `std::time::Duration` in a human-readable format.
/// Attempts to show up to two most significant units.
pub fn pretty_print_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();
    let milliseconds = duration.subsec_millis();

    let days = total_seconds / (24 * 3600);
    let rem_seconds = total_seconds % (24 * 3600);
    let hours = rem_seconds / 3600;
    let rem_seconds = rem_seconds % 3600;
    let minutes = rem_seconds / 60;
    let seconds = rem_seconds % 60;

    let mut parts = Vec::with_capacity(2);

    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if (hours > 0 || (days > 0 && minutes > 0) || (days > 0 && seconds > 0 && parts.is_empty()))
        && parts.len() < 2
    {
        parts.push(format!("{hours}h"));
    }
    if (minutes > 0 || (hours > 0 && seconds > 0 && parts.is_empty())) && parts.len() < 2 {
        parts.push(format!("{minutes}m"));
    }
    if (seconds > 0 || (minutes > 0 && milliseconds > 0 && parts.is_empty())) && parts.len() < 2 {
        parts.push(format!("{seconds}s"));
    }
    if parts.is_empty() && milliseconds > 0 {
        parts.push(format!("{milliseconds}ms"));
    }

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

// --- Filesystem ---

/// Returns Ok if `dir_path` is a directory we can create and remove a file in.
pub fn verify_writable(dir_path: &Path) -> Result<()> {
    let probe = dir_path.join(format!(".write_probe_{}", std::process::id()));
    let file = std::fs::File::create(&probe)
        .with_context(|| format!("could not create file in {}", dir_path.display()))?;
    drop(file);
    std::fs::remove_file(&probe)
        .with_context(|| format!("could not remove probe file {}", probe.display()))?;
    Ok(())
}
