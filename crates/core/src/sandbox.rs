//! Per-request scratch directories for external binary invocations.
//!
//! A [`SandboxDirectory`] is created before any file I/O for a request and
//! removed on every exit path: explicitly through [`SandboxDirectory::close`],
//! or by `Drop` when the owning future errors, panics or is cancelled.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

const SANDBOX_PREFIX: &str = "mf-";

/// A uniquely named directory owned by exactly one request.
#[derive(Debug)]
pub struct SandboxDirectory {
    path: PathBuf,
    id: Uuid,
    removed: bool,
}

impl SandboxDirectory {
    /// Creates a fresh directory under `root`.
    ///
    /// The name embeds a random v4 UUID; `create_dir` (not `create_dir_all`)
    /// guarantees the directory did not exist before.
    pub async fn create(root: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;

        let id = Uuid::new_v4();
        let path = root.join(format!("{}{}", SANDBOX_PREFIX, id.simple()));
        tokio::fs::create_dir(&path).await?;

        tracing::debug!(sandbox_id = %id, "Created sandbox directory");

        Ok(Self {
            path,
            id,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path of a file inside the sandbox.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Replaces occurrences of the sandbox path in `text` so diagnostics can be
    /// returned to clients without disclosing the server's filesystem layout.
    pub fn redact(&self, text: &str) -> String {
        text.replace(&*self.path.to_string_lossy(), "<sandbox>")
    }

    /// Removes the directory recursively. Errors are logged, never returned.
    pub async fn close(mut self) {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => tracing::debug!(sandbox_id = %self.id, "Removed sandbox directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(sandbox_id = %self.id, error = %e, "Failed to remove sandbox directory")
            }
        }
    }
}

impl Drop for SandboxDirectory {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(sandbox_id = %self.id, error = %e, "Failed to remove sandbox directory on drop");
            }
        }
    }
}
