//! perfpair: pairwise statistical comparison of benchmark methods.
//!
//! This crate re-exports the workspace so hosts can depend on one crate:
//!
//! - [`types`]: completion events, comparison results, the class catalog
//! - [`stats`] and [`significance`]: preprocessing and hypothesis tests
//! - [`domain`]: detection and the comparison engine
//! - [`config`]: `QueueConfig` and validation
//! - [`adapters`]: publisher and fallback seams
//! - [`app`]: queue, batching, processors and the run manager
//!
//! ```no_run
//! use perfpair::adapters::ChannelPublisher;
//! use perfpair::app::RunManager;
//! use perfpair::config::QueueConfig;
//! use perfpair::types::{ClassCatalog, ClassRegistration, CompletionEvent};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), perfpair::error::PerfpairError> {
//! let catalog = ClassCatalog::builder()
//!     .class(
//!         ClassRegistration::new("SortingAlgorithms")
//!             .method_in_group("BubbleSort", "SortingAlgorithms")
//!             .method_in_group("QuickSort", "SortingAlgorithms"),
//!     )
//!     .build()?;
//! let (publisher, _published) = ChannelPublisher::new();
//! let run = RunManager::builder(QueueConfig::default(), catalog, Arc::new(publisher))
//!     .start()
//!     .await?;
//!
//! let handle = run.handle();
//! handle
//!     .submit(CompletionEvent::new("SortingAlgorithms", "BubbleSort", vec![9.1, 9.3, 9.2], "2024-01-01T00:00:00Z"))
//!     .await?;
//! let summary = run.shutdown().await;
//! println!("{} comparisons", summary.comparisons_produced);
//! # Ok(())
//! # }
//! ```

pub use perfpair_adapters as adapters;
pub use perfpair_app as app;
pub use perfpair_config as config;
pub use perfpair_domain as domain;
pub use perfpair_error as error;
pub use perfpair_significance as significance;
pub use perfpair_stats as stats;
pub use perfpair_types as types;

pub use perfpair_app::{RunHandle, RunManager, RunSummary};
pub use perfpair_config::QueueConfig;
pub use perfpair_error::PerfpairError;
pub use perfpair_types::{ClassCatalog, ClassRegistration, ComparisonResult, CompletionEvent};
