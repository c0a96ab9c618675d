//! Vigil - visual regression comparison with vision-model change
//! classification.
//!
//! The root crate wires the workspace members together: pixel diffing,
//! result caching, rate-limited vision calls, change reconciliation,
//! artifact generation and result persistence.

pub mod config;
pub mod pipeline;
pub mod reconciler;
pub mod report;
pub mod storage;

pub use config::{AppConfig, StorageConfig, VisionConfig};
pub use pipeline::{ComparisonPipeline, PipelineError};
pub use reconciler::ChangeReconciler;
pub use storage::{FsResultStore, ResultStore, StoreError};
