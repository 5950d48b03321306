//! Photo and video attachments
//!
//! The core only records metadata; bytes go through a [`MediaStorage`].

use crate::comment::CommentId;
use crate::issue::IssueId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

pub type MediaId = u64;

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "mp4", "mov", "avi"];

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/avi",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video") {
            MediaKind::Video
        } else {
            MediaKind::Photo
        }
    }
}

/// Entity an attachment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "owner_type", content = "owner_id", rename_all = "snake_case")]
pub enum MediaOwner {
    Issue(IssueId),
    Comment(CommentId),
}

impl MediaOwner {
    /// Storage directory for the owner's files
    fn directory(&self) -> String {
        match self {
            MediaOwner::Issue(id) => format!("issues/{id}"),
            MediaOwner::Comment(id) => format!("comments/{id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    pub owner: MediaOwner,
    /// Path relative to the storage root
    pub file_path: String,
    /// Name the client uploaded the file under
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// File received from a client
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Check type, size and count limits for a batch of uploads
pub fn validate_uploads(uploads: &[Upload], limits: &crate::config::MediaConfig) -> Result<()> {
    if uploads.len() > limits.max_files {
        return Err(Error::Validation(format!(
            "at most {} files may be attached",
            limits.max_files
        )));
    }

    for upload in uploads {
        let ext_ok = upload
            .extension()
            .is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()));
        let mime_ok = ALLOWED_MIME_TYPES.contains(&upload.mime_type.to_lowercase().as_str());
        if !ext_ok || !mime_ok {
            return Err(Error::Validation(format!(
                "{}: only images (jpeg, jpg, png, gif) and videos (mp4, mov, avi) are allowed",
                upload.file_name
            )));
        }
        if upload.bytes.len() as u64 > limits.max_file_size {
            return Err(Error::Validation(format!(
                "{}: file exceeds {} bytes",
                upload.file_name, limits.max_file_size
            )));
        }
    }

    Ok(())
}

/// Build the stored path for an upload
pub fn storage_path(owner: MediaOwner, upload: &Upload) -> String {
    let ext = upload.extension().unwrap_or_else(|| "bin".to_string());
    format!("{}/{}.{}", owner.directory(), Uuid::new_v4().simple(), ext)
}

/// File storage collaborator: store by path, delete by path
pub trait MediaStorage: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    fn delete(&self, path: &str) -> Result<()>;
}

/// Stores files below a root directory
pub struct FsMediaStorage {
    root: PathBuf,
}

impl FsMediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::Storage(format!("refusing path outside storage: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

impl MediaStorage for FsMediaStorage {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, bytes)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match std::fs::remove_file(full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps files in memory
#[derive(Default)]
pub struct MemoryMediaStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMediaStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaStorage for MemoryMediaStorage {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| Error::Storage("media storage lock poisoned".into()))?;
        files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| Error::Storage("media storage lock poisoned".into()))?;
        files.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;

    fn photo(name: &str) -> Upload {
        Upload::new(name, "image/jpeg", vec![0xff, 0xd8, 0xff])
    }

    #[test]
    fn kind_from_mime() {
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Photo);
    }

    #[test]
    fn rejects_disallowed_types() {
        let limits = MediaConfig::default();
        assert!(validate_uploads(&[photo("a.jpg")], &limits).is_ok());
        assert!(validate_uploads(&[Upload::new("a.exe", "image/jpeg", vec![])], &limits).is_err());
        assert!(
            validate_uploads(&[Upload::new("a.jpg", "application/pdf", vec![])], &limits).is_err()
        );
    }

    #[test]
    fn enforces_size_and_count() {
        let limits = MediaConfig {
            max_file_size: 2,
            max_files: 2,
        };
        assert!(validate_uploads(&[photo("a.jpg")], &limits).is_err());

        let limits = MediaConfig {
            max_file_size: 10,
            max_files: 2,
        };
        let batch = vec![photo("a.jpg"), photo("b.jpg"), photo("c.jpg")];
        assert!(validate_uploads(&batch, &limits).is_err());
    }

    #[test]
    fn storage_path_is_scoped_to_owner() {
        let path = storage_path(MediaOwner::Issue(7), &photo("Pic.JPG"));
        assert!(path.starts_with("issues/7/"));
        assert!(path.ends_with(".jpg"));
    }

    #[test]
    fn fs_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsMediaStorage::new(dir.path());

        storage.put("issues/1/a.jpg", b"abc").unwrap();
        assert!(dir.path().join("issues/1/a.jpg").exists());

        storage.delete("issues/1/a.jpg").unwrap();
        assert!(!dir.path().join("issues/1/a.jpg").exists());
        // Deleting twice is fine
        storage.delete("issues/1/a.jpg").unwrap();
    }

    #[test]
    fn fs_storage_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsMediaStorage::new(dir.path());
        assert!(storage.put("../escape.jpg", b"x").is_err());
        assert!(storage.delete("/etc/passwd").is_err());
    }
}
