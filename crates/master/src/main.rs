mod config;
mod game;
mod process;

use anyhow::Context;
use clap::Parser;
use config::MasterConfig;
use game::{EndReason, Orchestrator};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn main() -> anyhow::Result<()> {
    let config = MasterConfig::parse().normalized()?;
    common::setup_logging();

    // The handlers only raise the flag; every blocking wait in the loop is
    // bounded, so the flag is observed within one wait interval and all
    // cleanup happens on the main control path.
    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;

    let mut orchestrator = Orchestrator::init(config, Arc::clone(&shutdown))
        .context("failed to set up shared game state")?;
    orchestrator
        .spawn_children()
        .context("failed to spawn child processes")?;

    let reason = orchestrator.run()?;
    let outcome = orchestrator.drain(reason)?;
    orchestrator.shutdown_children();
    orchestrator.release();

    if outcome.reason == EndReason::ShutdownRequested {
        std::process::exit(1);
    }
    Ok(())
}
