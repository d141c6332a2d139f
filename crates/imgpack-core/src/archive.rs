//! Zip packaging of converted files.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::workspace::Workspace;

/// Attachment name of every download archive.
pub const ARCHIVE_FILE_NAME: &str = "converted_files.zip";

/// Deflate at its highest level; downloads are rare and size matters more
/// than speed.
const COMPRESSION_LEVEL: i64 = 9;

/// What went into a finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub included: Vec<String>,
    /// Requested names that were absent or not plain file names.
    pub missing: Vec<String>,
}

/// Pack `names` from the workspace upload directory into
/// `<download dir>/converted_files.zip`, replacing any earlier archive.
///
/// Each entry sits at the archive root under its own name.  Names that do not
/// resolve are skipped and listed in [`ArchiveReport::missing`].  The archive
/// is fully flushed to disk when this returns.
pub fn build_archive<S: AsRef<str>>(workspace: &Workspace, names: &[S]) -> Result<ArchiveReport> {
    let path = workspace.download_dir().join(ARCHIVE_FILE_NAME);
    let mut zip = ZipWriter::new(BufWriter::new(File::create(&path)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut included = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        let name = name.as_ref();
        if included.iter().any(|n| n == name) {
            continue;
        }
        let Some(source) = workspace.resolve(name) else {
            warn!(workspace = %workspace.id(), file = %name, "archive input missing; skipped");
            missing.push(name.to_owned());
            continue;
        };
        zip.start_file(name, options)?;
        io::copy(&mut BufReader::new(File::open(&source)?), &mut zip)?;
        included.push(name.to_owned());
    }

    let writer = zip.finish()?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

    info!(
        workspace = %workspace.id(),
        entries = included.len(),
        missing = missing.len(),
        "archive built"
    );
    Ok(ArchiveReport { path, included, missing })
}
