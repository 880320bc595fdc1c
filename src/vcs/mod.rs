//! Version control backends
//!
//! Every component owns one [`Repository`]. Writes to the working tree go
//! through the component-wide lock: [`Repository::lock`] hands out a
//! [`RepositoryLock`] guard and the mutating operations take it by
//! reference, so they cannot be called without holding it.

mod git;
mod plain;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TransyncError, TransyncResult};

pub use git::GitRepository;
pub use plain::PlainRepository;

/// Held for the whole read-decide-write-push sequence of a commit
pub struct RepositoryLock<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Advisory in-process lock shared by all translations of a component
#[derive(Debug, Default)]
pub struct VcsLock {
    mutex: Mutex<()>,
}

impl VcsLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is free. A poisoned lock (a holder panicked)
    /// is taken over.
    pub fn acquire(&self, path: &Path) -> RepositoryLock<'_> {
        debug!("Acquiring repository lock for {}", path.display());
        let guard = self.mutex.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Repository lock for {} was abandoned by a failed worker, recovering",
                path.display()
            );
            poisoned.into_inner()
        });
        RepositoryLock { _guard: guard }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    #[default]
    Git,
    Plain,
}

/// Contract the commit coordinator and synchronizer use. Paths are relative
/// to the repository root.
pub trait Repository: Send + Sync {
    fn path(&self) -> &Path;

    fn lock(&self) -> RepositoryLock<'_>;

    /// Content hash of a tracked file as it is on disk
    fn get_object_hash(&self, file: &Path) -> TransyncResult<String>;

    fn needs_commit(&self, lock: &RepositoryLock<'_>, files: &[PathBuf]) -> TransyncResult<bool>;

    /// Commit `files`; returns the new revision
    fn commit(
        &self,
        lock: &RepositoryLock<'_>,
        message: &str,
        author: &str,
        timestamp: DateTime<Utc>,
        files: &[PathBuf],
    ) -> TransyncResult<String>;

    fn last_revision(&self) -> TransyncResult<Option<String>>;

    /// File content at a past revision
    fn retrieve_revision(&self, revision: &str, file: &Path) -> TransyncResult<Vec<u8>>;

    fn needs_push(&self) -> TransyncResult<bool>;

    fn push(&self, lock: &RepositoryLock<'_>) -> TransyncResult<()>;

    fn push_if_needed(&self, lock: &RepositoryLock<'_>) -> TransyncResult<()> {
        if self.needs_push()? {
            self.push(lock)?;
        }
        Ok(())
    }

    /// Delete files from the working tree and record it. Pushing is up to
    /// the caller.
    fn remove(
        &self,
        lock: &RepositoryLock<'_>,
        files: &[PathBuf],
        message: &str,
        author: &str,
    ) -> TransyncResult<()>;
}

/// Open the backend configured for a checkout
pub fn open_repository(kind: VcsKind, path: &Path) -> TransyncResult<Box<dyn Repository>> {
    if !path.is_dir() {
        return Err(TransyncError::Vcs(format!(
            "Repository path {} is not a directory",
            path.display()
        )));
    }
    Ok(match kind {
        VcsKind::Git => Box::new(GitRepository::open(path)?),
        VcsKind::Plain => Box::new(PlainRepository::open(path)?),
    })
}

/// `Name <email>`, inventing an address when the author has none
pub(crate) fn author_signature(author: &str) -> String {
    if author.contains('<') {
        author.to_string()
    } else {
        let local: String = author
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let local = if local.is_empty() { "anonymous".to_string() } else { local };
        format!("{} <{}@users.transync.invalid>", author, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_signature() {
        assert_eq!(
            author_signature("Jane Doe <jane@example.com>"),
            "Jane Doe <jane@example.com>"
        );
        assert_eq!(
            author_signature("Jane Doe"),
            "Jane Doe <janedoe@users.transync.invalid>"
        );
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = std::sync::Arc::new(VcsLock::new());
        let cloned = std::sync::Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _held = cloned.acquire(Path::new("repo"));
            panic!("worker failed while holding the lock");
        })
        .join();
        let _again = lock.acquire(Path::new("repo"));
    }

    #[test]
    fn test_open_repository_requires_directory() {
        let result = open_repository(VcsKind::Plain, Path::new("/nonexistent/transync"));
        assert!(matches!(result, Err(TransyncError::Vcs(_))));
    }
}
