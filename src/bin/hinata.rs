// src/bin/hinata.rs
// Entry point for the hinata operational CLI, following the teacher's
// main.rs shape (backend/src/main.rs): install a tracing subscriber, then
// hand off to the library's own command dispatch.

use clap::Parser;
use hinata_core::cli::{commands, CliArgs};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    hinata_core::metrics::init_metrics();

    let args = CliArgs::parse();
    commands::run(args).await
}
