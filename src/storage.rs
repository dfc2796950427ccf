use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// URL scheme for objects held in the local store.
pub const STORE_SCHEME: &str = "store://";

/// Filesystem-backed object store for images. Objects live under a root
/// directory at paths namespaced by entity type and id, e.g.
/// `projects/<project_id>/<file>.png`, and are referenced elsewhere by
/// `store://projects/<project_id>/<file>.png` URLs.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ImageStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an object and return its `store://` URL.
    pub fn put(&self, entity: &str, id: &str, file: &str, bytes: &[u8]) -> AppResult<String> {
        let rel = join_checked(&[entity, id, file])?;
        let path = self.root.join(&rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
        }
        std::fs::write(&path, bytes)
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {e}", path.display())))?;
        Ok(format!("{STORE_SCHEME}{rel}"))
    }

    /// Read an object by its `store://` URL.
    pub fn get(&self, url: &str) -> AppResult<Vec<u8>> {
        let path = self.url_to_path(url)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound(format!("Object {url} not found")),
            _ => AppError::Storage(format!("Failed to read {}: {e}", path.display())),
        })
    }

    pub fn delete(&self, url: &str) -> AppResult<()> {
        let path = self.url_to_path(url)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }

    /// Remove every object under `entity/id`. Used when the owning record is
    /// deleted.
    pub fn delete_namespace(&self, entity: &str, id: &str) -> AppResult<()> {
        let rel = join_checked(&[entity, id])?;
        let dir = self.root.join(rel);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete {}: {e}",
                dir.display()
            ))),
        }
    }

    fn url_to_path(&self, url: &str) -> AppResult<PathBuf> {
        let rel = url
            .strip_prefix(STORE_SCHEME)
            .ok_or_else(|| AppError::InvalidRequest(format!("Not a store URL: {url}")))?;
        let parts: Vec<&str> = rel.split('/').collect();
        let rel = join_checked(&parts)?;
        Ok(self.root.join(rel))
    }
}

/// Join path segments, rejecting empty segments and traversal.
fn join_checked(parts: &[&str]) -> AppResult<String> {
    for part in parts {
        if part.is_empty() || *part == "." || *part == ".." || part.contains(['/', '\\', ':']) {
            return Err(AppError::InvalidRequest(format!(
                "Invalid storage path segment: {part:?}"
            )));
        }
    }
    Ok(parts.join("/"))
}
