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

//! `supporter-monitor` wires the `monitor` library crate up to a process:
//! it loads a TOML config, installs a `tracing` subscriber, spawns the
//! periodic tick task, and waits for a shutdown signal. The monitor itself
//! never talks to a socket — the control-plane's ingress adapter and RPC
//! transport are external collaborators (spec §1) this binary does not
//! implement; this is only the thinnest scaffolding needed to run the
//! monitor as a long-lived process.

mod config;

use std::sync::Arc;

use clap::{App, Arg};

use monitor::{Dispatcher, JsonRpcDispatcher, Monitor, StatsSink};

use crate::config::FileConfig;

/// A `StatsSink` that forwards every per-tick snapshot to both the
/// configured log file and the `tracing` subscriber, so an operator
/// watching stdout sees the same numbers `supporter_statistics.log` records.
struct TracingStatsSink {
    file: monitor::stats::FileStatsSink,
}

impl StatsSink for TracingStatsSink {
    fn record(&self, unix_time: f64, counts: monitor::stats::StateCounts) {
        tracing::debug!(
            unix_time,
            default = counts.default,
            watched = counts.watched,
            starving = counts.starving,
            supported = counts.supported,
            "tick snapshot"
        );
        self.file.record(unix_time, counts);
    }
}

fn parse_args() -> String {
    let matches = App::new("supporter-monitor")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Supporter Monitor Contributors")
        .about("Control plane for a peer-assisted content-distribution overlay")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Path to the monitor's TOML configuration file")
                .takes_value(true)
                .default_value("monitor.toml"),
        )
        .get_matches();

    matches.value_of("config").unwrap_or("monitor.toml").to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config_path = parse_args();
    let file_config = FileConfig::load(&config_path)?;
    tracing::info!("Loaded configuration from {}", config_path);

    let stats_sink: Arc<dyn StatsSink> =
        Arc::new(TracingStatsSink { file: monitor::stats::FileStatsSink::open(&file_config.stats_log_path)? });
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(JsonRpcDispatcher::new());

    let monitor = Monitor::with_collaborators(
        file_config.monitor_config(),
        Arc::new(monitor::SystemClock),
        dispatcher,
        stats_sink,
    );

    let tick_handle = monitor.spawn();
    tracing::info!("Supporter monitor is running; listening for shutdown signal");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received; finishing the in-flight tick before exiting");
    monitor.shutdown();
    let _ = tick_handle.await;

    Ok(())
}
