//! Pre-flight duplicate detection by exact predicted filename.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engine::{EngineOptions, ExtractionEngine, MediaInfo};
use crate::utils::filename::sanitize_filename;

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// The predicted file already exists.
    Duplicate { filename: String },
    /// Metadata resolved and nothing exists at the predicted path.
    Fresh { filename: String },
    /// Metadata could not be resolved; no prediction is available.
    Unknown { reason: String },
}

/// Predicts the download filename and checks whether it already exists.
///
/// Only the exact predicted path is checked. A file with the same title but
/// another quality tag is not a duplicate.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    download_dir: PathBuf,
}

impl DuplicateDetector {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// `"{title} [{quality}].{ext}"`, sanitized.
    ///
    /// The quality tag comes from the requested format when the engine lists
    /// it, otherwise the selector itself (or `default`) is used.
    pub fn expected_filename(info: &MediaInfo, format_id: Option<&str>) -> String {
        let title = info
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Unknown");

        let (tag, ext) = match format_id.and_then(|id| info.find_format(id)) {
            Some(format) => (format.quality(), Some(format.ext.as_str())),
            None => (format_id.unwrap_or("default").to_string(), info.ext.as_deref()),
        };
        let ext = ext.filter(|e| !e.is_empty()).unwrap_or("webm");

        sanitize_filename(&format!("{title} [{tag}].{ext}"))
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.download_dir.join(filename)
    }

    /// Resolve metadata and check the predicted path. Blocking.
    pub fn check(
        &self,
        engine: &dyn ExtractionEngine,
        url: &str,
        options: &EngineOptions,
    ) -> DuplicateCheck {
        let info = match engine.resolve(url, options) {
            Ok(info) => info,
            Err(e) => {
                return DuplicateCheck::Unknown {
                    reason: e.to_string(),
                };
            }
        };

        let filename = Self::expected_filename(&info, options.format.as_deref());
        let path = self.path_for(&filename);
        debug!(url = %url, path = %path.display(), "Checking for existing download");

        if path.exists() {
            DuplicateCheck::Duplicate { filename }
        } else {
            DuplicateCheck::Fresh { filename }
        }
    }
}
