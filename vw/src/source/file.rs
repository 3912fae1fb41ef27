//! File-backed version marker source

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::trace;

use super::{SourceError, VersionSource};

/// Reads the version marker from a local file.
///
/// The development-mode counterpart of the HTTP source: point it at the
/// build output and rewriting the marker file behaves like a deploy.
pub struct FileVersionSource {
    path: PathBuf,
}

impl FileVersionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl VersionSource for FileVersionSource {
    async fn fetch_version(&self) -> Result<String, SourceError> {
        trace!(path = %self.path.display(), "reading version marker");
        let body = tokio::fs::read_to_string(&self.path).await?;

        let marker = body.trim();
        if marker.is_empty() {
            return Err(SourceError::EmptyMarker);
        }

        Ok(marker.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_and_trims_marker() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a1b2c3d4").unwrap();

        let source = FileVersionSource::new(file.path());
        let marker = source.fetch_version().await.unwrap();
        assert_eq!(marker, "a1b2c3d4");
    }

    #[tokio::test]
    async fn test_empty_marker_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   ").unwrap();

        let source = FileVersionSource::new(file.path());
        let result = source.fetch_version().await;
        assert!(matches!(result, Err(SourceError::EmptyMarker)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = FileVersionSource::new("/nonexistent/build-hash.txt");
        let result = source.fetch_version().await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }
}
