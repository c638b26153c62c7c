//! Filesystem Document Source
//!
//! Reads documents from the local filesystem. Workers started for a job may
//! not see the client's directory layout, so an optional document root is
//! supported: relative references are resolved against it, and a reference
//! that does not exist falls back to `<root>/<file name>`.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use docflow_domain::document::DocumentRef;
use docflow_domain::ports::DocumentSource;
use docflow_domain::processor::ProcessingError;

#[derive(Debug, Clone, Default)]
pub struct FsDocumentSource {
    root: Option<PathBuf>,
}

impl FsDocumentSource {
    /// Read references as plain paths
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolve references against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Paths to try for a reference, in order
    fn candidates(&self, reference: &DocumentRef) -> Vec<PathBuf> {
        let path = Path::new(reference.as_str());

        let Some(root) = &self.root else {
            return vec![path.to_path_buf()];
        };

        let primary = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };

        let mut candidates = vec![primary];
        if let Some(name) = path.file_name() {
            let fallback = root.join(name);
            if fallback != candidates[0] {
                candidates.push(fallback);
            }
        }
        candidates
    }
}

impl DocumentSource for FsDocumentSource {
    #[instrument(skip(self, reference), fields(document = %reference))]
    fn read(
        &self,
        reference: &DocumentRef,
    ) -> impl Future<Output = Result<Vec<u8>, ProcessingError>> + Send {
        let candidates = self.candidates(reference);
        let reference = reference.clone();

        async move {
            let mut last_error = None;

            for path in &candidates {
                match tokio::fs::read(path).await {
                    Ok(bytes) => {
                        debug!(path = %path.display(), size = bytes.len(), "Read document");
                        return Ok(bytes);
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Document not readable here");
                        last_error = Some(e);
                    }
                }
            }

            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidate path".to_string());
            Err(ProcessingError::read_error(&reference, reason))
        }
    }
}
