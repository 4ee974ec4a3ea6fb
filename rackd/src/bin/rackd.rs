// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executable that runs the rack controller

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use slog::{info, o, Drain, Logger};

use rackd::app::Controller;
use rackd::config::RackdConfig;

#[derive(Debug, Parser)]
#[clap(name = "rackd", about = "Bare-metal rack controller")]
struct Args {
    #[clap(long, help = "Path to the rackd configuration file")]
    config: Utf8PathBuf,
}

fn make_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("name" => "rackd"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = RackdConfig::from_file(&args.config)
        .with_context(|| format!("loading config from {:?}", args.config))?;
    let log = make_logger();

    let controller = Controller::start(&config, &log)
        .map_err(|e| anyhow::anyhow!("starting controller: {}", e))?;

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!(log, "shutting down");
    drop(controller);
    Ok(())
}
