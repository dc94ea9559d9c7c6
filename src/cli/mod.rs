// src/cli/mod.rs
// Operational CLI surface, scaled down from the teacher's interactive
// backend/src/cli/ (REPL, session store, websocket client) to the small set
// of administrative commands an ingestion/profile backend needs: schema
// setup, tier migration, backups, invariant checks, reindexing and profile
// inspection.

pub mod args;
pub mod commands;

pub use args::{CliArgs, Command, OutputFormat};
