// Durable storage for session state

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Blob storage for one serialized session
pub trait SessionStore: Send + Sync {
    /// Read the stored blob; `Ok(None)` if nothing is stored
    fn read(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replace the stored blob
    fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// Remove the stored blob; returns whether anything was removed
    fn delete(&self) -> io::Result<bool>;

    /// Human-readable location for logs and errors
    fn location(&self) -> String;
}

/// One JSON file per session
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileStore {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Sibling temp file + rename: readers see the old blob or the new one, never a mix
        let temp = self.temp_path();
        if let Err(e) = std::fs::write(&temp, bytes).and_then(|_| std::fs::rename(&temp, &self.path)) {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self) -> io::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing blob
    pub fn with_blob(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: Mutex::new(Some(bytes.into())),
        }
    }

    /// Current blob contents
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        // A poisoned lock still holds a consistent blob; writes are single assignments
        self.blob.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.lock().clone())
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        *self.lock() = Some(bytes.to_vec());
        Ok(())
    }

    fn delete(&self) -> io::Result<bool> {
        Ok(self.lock().take().is_some())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
