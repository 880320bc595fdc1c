//! Checkout without version control
//!
//! Commits are recorded in an in-process journal holding file snapshots, so
//! past revisions stay retrievable for the lifetime of the process.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{TransyncError, TransyncResult};

use super::{Repository, RepositoryLock, VcsLock};

#[derive(Debug, Clone)]
struct Revision {
    id: String,
    message: String,
    author: String,
    timestamp: DateTime<Utc>,
    /// `None` records a deletion
    files: BTreeMap<PathBuf, Option<Vec<u8>>>,
}

#[derive(Debug, Default)]
struct Journal {
    revisions: Vec<Revision>,
}

impl Journal {
    /// Content of `file` as last committed at or before revision `upto`
    fn content_at(&self, upto: usize, file: &Path) -> Option<&Vec<u8>> {
        self.revisions[..=upto]
            .iter()
            .rev()
            .find_map(|rev| rev.files.get(file))
            .and_then(Option::as_ref)
    }

    fn committed(&self, file: &Path) -> Option<&Vec<u8>> {
        if self.revisions.is_empty() {
            return None;
        }
        self.content_at(self.revisions.len() - 1, file)
    }
}

pub struct PlainRepository {
    path: PathBuf,
    lock: VcsLock,
    journal: Mutex<Journal>,
}

fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> TransyncResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() {
            if !hidden {
                collect_files(root, &path, out)?;
            }
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

impl PlainRepository {
    /// Open a checkout, snapshotting its current files as the first revision
    pub fn open(path: &Path) -> TransyncResult<Self> {
        let repo = Self {
            path: path.to_path_buf(),
            lock: VcsLock::new(),
            journal: Mutex::new(Journal::default()),
        };
        let mut files = Vec::new();
        collect_files(path, path, &mut files)?;
        let snapshot = files
            .into_iter()
            .map(|file| {
                let content = fs::read(path.join(&file))?;
                Ok((file, Some(content)))
            })
            .collect::<TransyncResult<BTreeMap<_, _>>>()?;
        repo.record("Initial snapshot", "Transync", Utc::now(), snapshot);
        Ok(repo)
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(|poisoned| {
            warn!("Journal mutex for {} was poisoned", self.path.display());
            poisoned.into_inner()
        })
    }

    fn record(
        &self,
        message: &str,
        author: &str,
        timestamp: DateTime<Utc>,
        files: BTreeMap<PathBuf, Option<Vec<u8>>>,
    ) -> String {
        let mut journal = self.journal();
        let mut hasher = Sha256::new();
        if let Some(parent) = journal.revisions.last() {
            hasher.update(parent.id.as_bytes());
        }
        hasher.update(message.as_bytes());
        hasher.update(author.as_bytes());
        hasher.update(timestamp.to_rfc3339().as_bytes());
        for (file, content) in &files {
            hasher.update(file.to_string_lossy().as_bytes());
            if let Some(content) = content {
                hasher.update(content);
            }
        }
        let id = hex::encode(hasher.finalize());
        journal.revisions.push(Revision {
            id: id.clone(),
            message: message.to_string(),
            author: author.to_string(),
            timestamp,
            files,
        });
        id
    }

    /// `(revision, author, message)` of the journal, newest first
    pub fn log(&self) -> Vec<(String, String, String)> {
        self.journal()
            .revisions
            .iter()
            .rev()
            .map(|r| (r.id.clone(), r.author.clone(), r.message.clone()))
            .collect()
    }

    /// Commit time of the newest revision
    pub fn last_commit_time(&self) -> Option<DateTime<Utc>> {
        self.journal().revisions.last().map(|r| r.timestamp)
    }
}

impl Repository for PlainRepository {
    fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> RepositoryLock<'_> {
        self.lock.acquire(&self.path)
    }

    fn get_object_hash(&self, file: &Path) -> TransyncResult<String> {
        let full = self.path.join(file);
        if !full.exists() {
            return Err(TransyncError::MissingFile(file.to_path_buf()));
        }
        Ok(sha256_hex(&fs::read(full)?))
    }

    fn needs_commit(&self, _lock: &RepositoryLock<'_>, files: &[PathBuf]) -> TransyncResult<bool> {
        let journal = self.journal();
        for file in files {
            let full = self.path.join(file);
            let on_disk = if full.exists() {
                Some(fs::read(full)?)
            } else {
                None
            };
            if on_disk.as_ref() != journal.committed(file) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn commit(
        &self,
        _lock: &RepositoryLock<'_>,
        message: &str,
        author: &str,
        timestamp: DateTime<Utc>,
        files: &[PathBuf],
    ) -> TransyncResult<String> {
        let mut snapshot = BTreeMap::new();
        for file in files {
            let full = self.path.join(file);
            let content = if full.exists() {
                Some(fs::read(full)?)
            } else {
                None
            };
            snapshot.insert(file.clone(), content);
        }
        let id = self.record(message, author, timestamp, snapshot);
        info!("Recorded revision {} in {}", id, self.path.display());
        Ok(id)
    }

    fn last_revision(&self) -> TransyncResult<Option<String>> {
        Ok(self.journal().revisions.last().map(|r| r.id.clone()))
    }

    fn retrieve_revision(&self, revision: &str, file: &Path) -> TransyncResult<Vec<u8>> {
        let journal = self.journal();
        let index = journal
            .revisions
            .iter()
            .position(|r| r.id == revision)
            .ok_or_else(|| TransyncError::Vcs(format!("Unknown revision {}", revision)))?;
        journal.content_at(index, file).cloned().ok_or_else(|| {
            TransyncError::Vcs(format!(
                "{} does not exist in revision {}",
                file.display(),
                revision
            ))
        })
    }

    fn needs_push(&self) -> TransyncResult<bool> {
        Ok(false)
    }

    fn push(&self, _lock: &RepositoryLock<'_>) -> TransyncResult<()> {
        Ok(())
    }

    fn remove(
        &self,
        lock: &RepositoryLock<'_>,
        files: &[PathBuf],
        message: &str,
        author: &str,
    ) -> TransyncResult<()> {
        for file in files {
            let full = self.path.join(file);
            if full.exists() {
                fs::remove_file(full)?;
            }
        }
        self.commit(lock, message, author, Utc::now(), files)?;
        Ok(())
    }
}
