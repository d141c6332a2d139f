//! Per-batch working directories.
//!
//! Every conversion batch gets its own [`Workspace`]: a uuid-named
//! subdirectory under both the uploads root and the downloads root.  Uploaded
//! and converted files live side by side in the upload directory; the
//! download directory only ever holds that batch's archive.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::codec;
use crate::error::{CoreError, Result};

/// The two root directories that hold every workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceRoots {
    uploads: PathBuf,
    downloads: PathBuf,
}

impl WorkspaceRoots {
    pub fn new(uploads: impl Into<PathBuf>, downloads: impl Into<PathBuf>) -> Self {
        Self { uploads: uploads.into(), downloads: downloads.into() }
    }

    pub fn uploads(&self) -> &Path {
        &self.uploads
    }

    pub fn downloads(&self) -> &Path {
        &self.downloads
    }

    /// Create both roots if they do not exist yet.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.uploads)?;
        fs::create_dir_all(&self.downloads)?;
        Ok(())
    }

    /// Create a fresh workspace with a generated id.
    pub fn create(&self) -> Result<Workspace> {
        let ws = self.workspace(Uuid::new_v4());
        fs::create_dir_all(&ws.upload_dir)?;
        fs::create_dir_all(&ws.download_dir)?;
        debug!(workspace = %ws.id, "workspace created");
        Ok(ws)
    }

    /// Look up an existing workspace by the id handed out from [`create`](Self::create).
    pub fn open(&self, id: &str) -> Result<Workspace> {
        let id = Uuid::parse_str(id).map_err(|_| CoreError::InvalidWorkspace(id.to_owned()))?;
        let ws = self.workspace(id);
        if !ws.upload_dir.is_dir() {
            return Err(CoreError::InvalidWorkspace(id.to_string()));
        }
        // The download side may have been purged independently; recreate it.
        fs::create_dir_all(&ws.download_dir)?;
        Ok(ws)
    }

    fn workspace(&self, id: Uuid) -> Workspace {
        let name = id.to_string();
        Workspace {
            id,
            upload_dir: self.uploads.join(&name),
            download_dir: self.downloads.join(&name),
        }
    }
}

/// An isolated directory scope for one batch.
#[derive(Debug, Clone)]
pub struct Workspace {
    id: Uuid,
    upload_dir: PathBuf,
    download_dir: PathBuf,
}

/// An uploaded file as written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Decoded original filename; also the on-disk name.
    pub file_name: String,
    /// Media type declared by the client for this part.
    pub media_type: String,
    pub path: PathBuf,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Persist one uploaded part under its decoded name, overwriting any
    /// earlier file of the same name in this workspace.
    pub fn store(&self, raw_name: &str, media_type: &str, bytes: &[u8]) -> Result<StoredUpload> {
        let file_name = upload_file_name(raw_name)?;
        let path = self.upload_dir.join(&file_name);
        fs::write(&path, bytes)?;
        debug!(workspace = %self.id, file = %file_name, bytes = bytes.len(), "upload stored");
        Ok(StoredUpload { file_name, media_type: media_type.to_owned(), path })
    }

    /// Path of `name` inside the upload directory, if `name` is a plain file
    /// name and that file exists.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !is_plain_file_name(name) {
            return None;
        }
        let path = self.upload_dir.join(name);
        path.is_file().then_some(path)
    }
}

/// Decode a client-supplied filename and keep only its final component.
pub fn upload_file_name(raw: &str) -> Result<String> {
    let decoded = codec::decode(raw);
    // Browsers on Windows may still send a full path.
    let last = decoded
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_owned();
    if is_plain_file_name(&last) {
        Ok(last)
    } else {
        Err(CoreError::InvalidFileName(raw.to_owned()))
    }
}

/// `true` for a non-empty single path component other than `.` and `..`.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod test {
    use super::*;

    fn roots(dir: &Path) -> WorkspaceRoots {
        let roots = WorkspaceRoots::new(dir.join("uploads"), dir.join("downloads"));
        roots.ensure().unwrap();
        roots
    }

    #[test]
    fn workspaces_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = roots(tmp.path());
        let a = roots.create().unwrap();
        let b = roots.create().unwrap();

        a.store("same.png", "image/png", b"a").unwrap();
        b.store("same.png", "image/png", b"b").unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(fs::read(a.upload_dir().join("same.png")).unwrap(), b"a");
        assert_eq!(fs::read(b.upload_dir().join("same.png")).unwrap(), b"b");
    }

    #[test]
    fn store_decodes_name_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = roots(tmp.path()).create().unwrap();

        let first = ws.store("my%20cat.png", "image/png", b"one").unwrap();
        let second = ws.store("my%20cat.png", "image/png", b"two").unwrap();

        assert_eq!(first.file_name, "my cat.png");
        assert_eq!(first.path, second.path);
        assert_eq!(fs::read(&second.path).unwrap(), b"two");
    }

    #[test]
    fn store_strips_directories_from_name() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = roots(tmp.path()).create().unwrap();

        let stored = ws.store("..%2F..%2Fescape.png", "image/png", b"x").unwrap();
        assert_eq!(stored.file_name, "escape.png");
        assert!(stored.path.starts_with(ws.upload_dir()));

        let stored = ws.store("C:\\Users\\me\\pic.jpg", "image/jpeg", b"x").unwrap();
        assert_eq!(stored.file_name, "pic.jpg");
    }

    #[test]
    fn store_rejects_names_without_a_file_component() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = roots(tmp.path()).create().unwrap();

        for bad in ["", "..", "dir/", "%2E%2E"] {
            assert!(matches!(ws.store(bad, "image/png", b"x"), Err(CoreError::InvalidFileName(_))), "{bad}");
        }
    }

    #[test]
    fn open_rejects_unknown_and_malformed_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let roots = roots(tmp.path());
        let ws = roots.create().unwrap();

        assert_eq!(roots.open(&ws.id().to_string()).unwrap().id(), ws.id());
        assert!(matches!(roots.open("../etc"), Err(CoreError::InvalidWorkspace(_))));
        assert!(matches!(
            roots.open(&Uuid::new_v4().to_string()),
            Err(CoreError::InvalidWorkspace(_))
        ));
    }

    #[test]
    fn resolve_only_finds_plain_existing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = roots(tmp.path()).create().unwrap();
        ws.store("a.png", "image/png", b"x").unwrap();

        assert!(ws.resolve("a.png").is_some());
        assert!(ws.resolve("missing.png").is_none());
        assert!(ws.resolve("../a.png").is_none());
    }
}
