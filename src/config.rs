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

//! The on-disk configuration for the `supporter-monitor` binary: a thin TOML
//! file mapping onto `monitor::MonitorConfig`'s overridable bounds, plus the
//! handful of process-level settings (the statistics log path) the library
//! crate has no business knowing about.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use monitor::MonitorConfig;

/// Mirrors `MonitorConfig`'s fields as plain seconds, since `Duration` has no
/// convenient TOML representation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub is_alive_timeout_secs: u64,
    pub peer_timeout_secs: u64,
    pub peer_removal_time_secs: u64,
    pub tick_interval_secs: u64,
    pub stats_log_path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        let defaults = MonitorConfig::default();
        Self {
            is_alive_timeout_secs: defaults.is_alive_timeout.as_secs(),
            peer_timeout_secs: defaults.peer_timeout.as_secs(),
            peer_removal_time_secs: defaults.peer_removal_time.as_secs(),
            tick_interval_secs: defaults.tick_interval.as_secs(),
            stats_log_path: PathBuf::from("supporter_statistics.log"),
        }
    }
}

impl FileConfig {
    /// Loads the configuration from `path`, falling back to every default
    /// left unset in the file. A missing file is not an error — the binary
    /// is meant to run out of the box the way `snarkos`'s `--config` flag is
    /// optional and `Config::default()` is always a valid starting point.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            is_alive_timeout: Duration::from_secs(self.is_alive_timeout_secs),
            peer_timeout: Duration::from_secs(self.peer_timeout_secs),
            peer_removal_time: Duration::from_secs(self.peer_removal_time_secs),
            tick_interval: Duration::from_secs(self.tick_interval_secs),
        }
    }
}
