//! Version marker sources
//!
//! A version marker is an opaque token identifying the currently deployed
//! build. Sources fetch it; one attempt per poll tick, succeeding or
//! failing exactly once.

mod file;
mod http;

pub use file::FileVersionSource;
pub use http::HttpVersionSource;

use async_trait::async_trait;
use thiserror::Error;

/// Errors fetching a version marker.
///
/// All of these are transient from the watcher's point of view: the tick
/// that hit one is logged and the poll loop continues on schedule.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("version marker request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("version marker endpoint returned {status}")]
    Status { status: reqwest::StatusCode },

    #[error("failed to read version marker: {0}")]
    Io(#[from] std::io::Error),

    #[error("version marker was empty")]
    EmptyMarker,
}

/// An opaque version marker provider.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn fetch_version(&self) -> Result<String, SourceError>;
}
