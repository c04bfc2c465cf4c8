//! perfpair workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual perfpair functionality is in the workspace member crates:
//! - `perfpair-types`: data model, ids and the class catalog
//! - `perfpair-stats` / `perfpair-significance`: preprocessing and hypothesis tests
//! - `perfpair-domain`: comparison detection and the comparison engine
//! - `perfpair-config`: queue configuration
//! - `perfpair-adapters`: publisher and fallback seams
//! - `perfpair-app`: queue, batching, processors and the run manager
//! - `perfpair`: facade re-exporting all of the above
