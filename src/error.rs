//! Error kinds surfaced by a pipeline run and by configuration building.

use std::fmt;
use std::time::Duration;

/// A named step of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Dedupe,
    Compose,
    Persist,
    Publish,
    Update,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Fetch,
        Stage::Dedupe,
        Stage::Compose,
        Stage::Persist,
        Stage::Publish,
        Stage::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Dedupe => "dedupe",
            Stage::Compose => "compose",
            Stage::Persist => "persist",
            Stage::Publish => "publish",
            Stage::Update => "update",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of run failures.
///
/// `FetchFailed` is the only recoverable kind: the controller reports it and
/// carries on with whatever the source returned. Every other kind ends the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("fetch failed: {0:#}")]
    FetchFailed(#[source] anyhow::Error),

    #[error("dedupe failed: {0:#}")]
    DedupeFailed(#[source] anyhow::Error),

    #[error("compose failed: {0:#}")]
    ComposeFailed(#[source] anyhow::Error),

    #[error("persist failed for {hash}: {cause:#}")]
    PersistFailed {
        hash: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("publish failed for {hash}: {cause:#}")]
    PublishFailed {
        hash: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("update failed for {hash}: {cause:#}")]
    UpdateFailed {
        hash: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("enricher returned {composed} composed items for {raw} raw items")]
    ConsistencyViolation { composed: usize, raw: usize },

    #[error("run exceeded its {0:?} budget")]
    TimedOut(Duration),

    #[error("run cancelled")]
    Cancelled,
}

/// Discriminant of [`PipelineError`], for callers that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FetchFailed,
    DedupeFailed,
    ComposeFailed,
    PersistFailed,
    PublishFailed,
    UpdateFailed,
    ConsistencyViolation,
    TimedOut,
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FetchFailed(_) => ErrorKind::FetchFailed,
            Self::DedupeFailed(_) => ErrorKind::DedupeFailed,
            Self::ComposeFailed(_) => ErrorKind::ComposeFailed,
            Self::PersistFailed { .. } => ErrorKind::PersistFailed,
            Self::PublishFailed { .. } => ErrorKind::PublishFailed,
            Self::UpdateFailed { .. } => ErrorKind::UpdateFailed,
            Self::ConsistencyViolation { .. } => ErrorKind::ConsistencyViolation,
            Self::TimedOut(_) => ErrorKind::TimedOut,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Stage that raised the error. Timeouts and cancellation are not tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::FetchFailed(_) => Some(Stage::Fetch),
            Self::DedupeFailed(_) => Some(Stage::Dedupe),
            Self::ComposeFailed(_) => Some(Stage::Compose),
            Self::PersistFailed { .. } | Self::ConsistencyViolation { .. } => Some(Stage::Persist),
            Self::PublishFailed { .. } => Some(Stage::Publish),
            Self::UpdateFailed { .. } => Some(Stage::Update),
            Self::TimedOut(_) | Self::Cancelled => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FetchFailed(_))
    }

    /// Short label used for metrics and log fields.
    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::FetchFailed => "fetch_failed",
            ErrorKind::DedupeFailed => "dedupe_failed",
            ErrorKind::ComposeFailed => "compose_failed",
            ErrorKind::PersistFailed => "persist_failed",
            ErrorKind::PublishFailed => "publish_failed",
            ErrorKind::UpdateFailed => "update_failed",
            ErrorKind::ConsistencyViolation => "consistency_violation",
            ErrorKind::TimedOut => "timed_out",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

/// Rejected pipeline or application configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("dedupe requires persistence to be enabled")]
    DedupeWithoutPersistence,

    #[error("omitting items with empty metadata requires composition to be enabled")]
    EmptyMetaWithoutComposition,

    #[error("fetch cutoff is not set")]
    MissingCutoff,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
