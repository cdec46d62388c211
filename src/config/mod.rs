pub mod app;
pub mod pipeline;

pub use app::{AppConfig, ChannelKind, JobConfig};
pub use pipeline::{Cutoff, PipelineConfig, PipelineConfigBuilder};
