//! Workspace-level integration tests: whole runs through the public API.

mod config;
mod runs;
