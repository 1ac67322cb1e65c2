// Copyright (C) 2019-2021 Aleo Systems Inc.
// This file is part of the snarkOS library.

// The snarkOS library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The snarkOS library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the snarkOS library. If not, see <https://www.gnu.org/licenses/>.

//! A per-tick statistics snapshot, in the tab-separated format of spec §6:
//! `<unix_time>\t<nr_default>\t<nr_watched>\t<nr_starving>\t<nr_supported>`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// A snapshot of how many peers are currently in each state.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct StateCounts {
    pub default: u64,
    pub watched: u64,
    pub starving: u64,
    pub supported: u64,
}

/// Where per-tick statistics snapshots go. Injectable so tests can
/// substitute an in-memory sink instead of touching the filesystem.
pub trait StatsSink: Send + Sync {
    fn record(&self, unix_time: f64, counts: StateCounts);
}

/// Appends one line per tick to a log file, mirroring the original
/// implementation's `supporter_statistics.log`.
pub struct FileStatsSink {
    file: Mutex<File>,
}

impl FileStatsSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl StatsSink for FileStatsSink {
    fn record(&self, unix_time: f64, counts: StateCounts) {
        let line = format!(
            "{:.2}\t{}\t{}\t{}\t{}\n",
            unix_time, counts.default, counts.watched, counts.starving, counts.supported
        );
        let mut file = self.file.lock().unwrap();
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::warn!("Failed to write statistics snapshot: {}", e);
            return;
        }
        let _ = file.flush();
    }
}

/// A sink that keeps every recorded snapshot in memory, for assertions in
/// tests.
#[derive(Default)]
pub struct InMemoryStatsSink {
    pub snapshots: Mutex<Vec<(f64, StateCounts)>>,
}

impl StatsSink for InMemoryStatsSink {
    fn record(&self, unix_time: f64, counts: StateCounts) {
        self.snapshots.lock().unwrap().push((unix_time, counts));
    }
}

/// A sink that discards every snapshot; the coordinator's default when no
/// sink is configured.
#[derive(Debug, Default)]
pub struct NullStatsSink;

impl StatsSink for NullStatsSink {
    fn record(&self, _unix_time: f64, _counts: StateCounts) {}
}
