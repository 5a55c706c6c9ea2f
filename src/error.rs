// src/error.rs
use std::fmt;
use std::time::Duration;

/// Why a single collector produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum FailureKind {
    #[error("{0:#}")]
    Error(anyhow::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Per-source failure, recorded without affecting sibling collectors.
#[derive(Debug, thiserror::Error)]
#[error("collector `{collector}` failed: {kind}")]
pub struct CollectorFailure {
    pub collector: String,
    #[source]
    pub kind: FailureKind,
}

impl CollectorFailure {
    pub fn new(collector: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            collector: collector.into(),
            kind,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, FailureKind::Timeout(_))
    }
}

/// Raised when a collection run has nothing to show for itself.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("all {} collectors failed: {}", .0.len(), FailureList(.0))]
    AllFailed(Vec<CollectorFailure>),
}

impl CollectionError {
    pub fn failures(&self) -> &[CollectorFailure] {
        match self {
            Self::AllFailed(v) => v,
        }
    }
}

struct FailureList<'a>(&'a [CollectorFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.collector, failure.kind)?;
        }
        Ok(())
    }
}

/// Scoring collaborator error, split by whether another attempt can help.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("transient scoring error: {0:#}")]
    Transient(anyhow::Error),
    #[error("fatal scoring error: {0:#}")]
    Fatal(anyhow::Error),
}

impl ScoreError {
    pub fn transient(msg: impl fmt::Display) -> Self {
        Self::Transient(anyhow::anyhow!("{msg}"))
    }

    pub fn fatal(msg: impl fmt::Display) -> Self {
        Self::Fatal(anyhow::anyhow!("{msg}"))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Configuration that parses but cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} points to non-existent path {path}")]
    MissingPath { var: &'static str, path: String },
    #[error("unsupported scorer provider `{0}`")]
    UnsupportedProvider(String),
    #[error("missing {0} env var")]
    MissingEnv(&'static str),
    #[error("profile `name` must not be empty")]
    EmptyProfileName,
}
