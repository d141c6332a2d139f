//! Best-effort purge of the working roots.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Outcome of purging one or more directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: usize,
    pub failed: usize,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn merge(mut self, other: PurgeReport) -> PurgeReport {
        self.removed += other.removed;
        self.failed += other.failed;
        self
    }
}

/// Remove every entry inside `dir`, keeping `dir` itself.
///
/// Workspace subdirectories are removed recursively.  A failure on one entry
/// is logged and counted; the purge carries on with the rest.  A missing
/// `dir` counts as already clean.
pub fn purge_dir(dir: &Path) -> PurgeReport {
    let mut report = PurgeReport::default();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to list directory for purge");
            report.failed += 1;
            return report;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read directory entry");
                report.failed += 1;
                continue;
            }
        };
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let result = if is_dir { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
        match result {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to delete");
                report.failed += 1;
            }
        }
    }

    info!(dir = %dir.display(), removed = report.removed, failed = report.failed, "directory purged");
    report
}
