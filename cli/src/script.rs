/*
 * script.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of mgsieve, a ManageSieve client.
 *
 * mgsieve is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * mgsieve is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with mgsieve.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Local script helpers: script names from file paths, human-readable sizes.

use std::path::Path;

use anyhow::{anyhow, Result};

/// Script name for an uploaded file: the file name without directory or extension.
pub fn script_name_from_path(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("cannot derive a script name from {}", path.display()))
}

const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

/// Binary-prefixed size: two decimals below 100 units, whole units above.
pub fn format_size(size: u64) -> String {
    if size <= 1024 {
        return format!("{} bytes", size);
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value > 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 || value > 99.0 {
        format!("{} {}", value.floor() as u64, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_strips_directory_and_extension() {
        assert_eq!(
            script_name_from_path(Path::new("/home/u/sieve/vacation.sieve")).unwrap(),
            "vacation"
        );
        assert_eq!(script_name_from_path(Path::new("rules")).unwrap(), "rules");
        assert_eq!(
            script_name_from_path(Path::new("dir/my.rules.sieve")).unwrap(),
            "my.rules"
        );
        assert!(script_name_from_path(Path::new("/")).is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 bytes");
        assert_eq!(format_size(1024), "1024 bytes");
        assert_eq!(format_size(4096), "4 KiB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.50 MiB");
        assert_eq!(format_size(200 * 1024 * 1024), "200 MiB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GiB");
    }
}
