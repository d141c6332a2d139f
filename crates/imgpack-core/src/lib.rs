//! imgpack-core – conversion pipeline shared by the imgpack binaries.
//!
//! A request flows through these pieces in order:
//!
//! 1. [`codec`] turns transport-encoded filenames into on-disk names.
//! 2. [`Workspace`] stores the uploaded bytes in an isolated directory.
//! 3. [`convert::convert_batch`] re-encodes every stored upload into the
//!    requested [`TargetFormat`], reporting one [`FileOutcome`] per input.
//! 4. [`archive::build_archive`] packs selected outputs into a zip file.
//! 5. [`cleanup::purge_dir`] empties the working roots at shutdown.
//!
//! # Example
//! ```no_run
//! use imgpack_core::{convert, TargetFormat, WorkspaceRoots};
//!
//! let roots = WorkspaceRoots::new("/tmp/imgpack/uploads", "/tmp/imgpack/downloads");
//! roots.ensure().unwrap();
//! let ws = roots.create().unwrap();
//! let upload = ws.store("cat.ico", "image/vnd.microsoft.icon", &std::fs::read("cat.ico").unwrap()).unwrap();
//! let outcomes = convert::convert_batch(&ws, &[upload], TargetFormat::Png);
//! println!("{outcomes:?}");
//! ```

pub mod archive;
pub mod cleanup;
pub mod codec;
pub mod convert;
mod error;
pub mod format;
pub mod workspace;

pub use archive::{ArchiveReport, ARCHIVE_FILE_NAME};
pub use cleanup::PurgeReport;
pub use convert::{FileOutcome, SourceKind};
pub use error::{CoreError, Result};
pub use format::TargetFormat;
pub use workspace::{StoredUpload, Workspace, WorkspaceRoots};
