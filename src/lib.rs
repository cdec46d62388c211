// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod archive;
pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod notify;
pub mod observe;
pub mod pipeline;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::config::{Cutoff, PipelineConfig};
pub use crate::error::{ConfigError, PipelineError, Stage};
pub use crate::models::{ComposedItem, ItemMeta, PersistedRecord, RawItem};
pub use crate::pipeline::types::{RunReport, RunStatus};
pub use crate::pipeline::Pipeline;
