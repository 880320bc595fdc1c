//! Git backend, driving the `git` binary

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{TransyncError, TransyncResult};

use super::{author_signature, Repository, RepositoryLock, VcsLock};

const COMMITTER_NAME: &str = "Transync";
const COMMITTER_EMAIL: &str = "noreply@transync.invalid";

pub struct GitRepository {
    path: PathBuf,
    lock: VcsLock,
}

impl GitRepository {
    pub fn open(path: &Path) -> TransyncResult<Self> {
        let repo = Self {
            path: path.to_path_buf(),
            lock: VcsLock::new(),
        };
        repo.git(&["rev-parse", "--git-dir"])?;
        Ok(repo)
    }

    /// Create a new repository with an initial commit of the current tree
    pub fn init(path: &Path) -> TransyncResult<Self> {
        let repo = Self {
            path: path.to_path_buf(),
            lock: VcsLock::new(),
        };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["add", "--all"])?;
        repo.git(&["commit", "--quiet", "--allow-empty", "-m", "Initial commit"])?;
        Ok(repo)
    }

    fn run(&self, args: &[&str]) -> TransyncResult<Output> {
        debug!("git {}", args.join(" "));
        Command::new("git")
            .arg("-c")
            .arg(format!("user.name={}", COMMITTER_NAME))
            .arg("-c")
            .arg(format!("user.email={}", COMMITTER_EMAIL))
            .args(args)
            .current_dir(&self.path)
            .output()
            .map_err(|e| TransyncError::Vcs(format!("Failed to run git: {}", e)))
    }

    /// Run git, failing on a non-zero exit; returns stdout
    fn git(&self, args: &[&str]) -> TransyncResult<Vec<u8>> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(TransyncError::Vcs(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    fn git_text(&self, args: &[&str]) -> TransyncResult<String> {
        Ok(String::from_utf8_lossy(&self.git(args)?).trim().to_string())
    }
}

fn path_args(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|f| f.to_string_lossy().replace('\\', "/"))
        .collect()
}

impl Repository for GitRepository {
    fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> RepositoryLock<'_> {
        self.lock.acquire(&self.path)
    }

    fn get_object_hash(&self, file: &Path) -> TransyncResult<String> {
        if !self.path.join(file).exists() {
            return Err(TransyncError::MissingFile(file.to_path_buf()));
        }
        let file = file.to_string_lossy().replace('\\', "/");
        self.git_text(&["hash-object", "--", file.as_str()])
    }

    fn needs_commit(&self, _lock: &RepositoryLock<'_>, files: &[PathBuf]) -> TransyncResult<bool> {
        let paths = path_args(files);
        let mut args = vec!["status", "--porcelain", "--"];
        args.extend(paths.iter().map(String::as_str));
        Ok(!self.git(&args)?.is_empty())
    }

    fn commit(
        &self,
        _lock: &RepositoryLock<'_>,
        message: &str,
        author: &str,
        timestamp: DateTime<Utc>,
        files: &[PathBuf],
    ) -> TransyncResult<String> {
        let paths = path_args(files);
        let mut add = vec!["add", "--all", "--"];
        add.extend(paths.iter().map(String::as_str));
        self.git(&add)?;

        let author = format!("--author={}", author_signature(author));
        let date = format!("--date={}", timestamp.to_rfc3339());
        let mut commit = vec![
            "commit",
            "--quiet",
            author.as_str(),
            date.as_str(),
            "-m",
            message,
            "--",
        ];
        commit.extend(paths.iter().map(String::as_str));
        self.git(&commit)?;

        let revision = self.git_text(&["rev-parse", "HEAD"])?;
        info!("Committed {} as {}", paths.join(", "), revision);
        Ok(revision)
    }

    fn last_revision(&self) -> TransyncResult<Option<String>> {
        let output = self.run(&["rev-parse", "--verify", "--quiet", "HEAD"])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }

    fn retrieve_revision(&self, revision: &str, file: &Path) -> TransyncResult<Vec<u8>> {
        let object = format!("{}:{}", revision, file.to_string_lossy().replace('\\', "/"));
        self.git(&["show", object.as_str()])
    }

    fn needs_push(&self) -> TransyncResult<bool> {
        let output = self.run(&["rev-list", "--count", "@{upstream}..HEAD"])?;
        if !output.status.success() {
            // no upstream configured
            return Ok(false);
        }
        let ahead = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(ahead.parse::<u64>().unwrap_or(0) > 0)
    }

    fn push(&self, _lock: &RepositoryLock<'_>) -> TransyncResult<()> {
        info!("Pushing {}", self.path.display());
        self.git(&["push", "--quiet"])?;
        Ok(())
    }

    fn remove(
        &self,
        _lock: &RepositoryLock<'_>,
        files: &[PathBuf],
        message: &str,
        author: &str,
    ) -> TransyncResult<()> {
        let paths = path_args(files);
        let mut rm = vec!["rm", "--quiet", "--"];
        rm.extend(paths.iter().map(String::as_str));
        self.git(&rm)?;

        let author = format!("--author={}", author_signature(author));
        let mut commit = vec!["commit", "--quiet", author.as_str(), "-m", message, "--"];
        commit.extend(paths.iter().map(String::as_str));
        self.git(&commit)?;
        Ok(())
    }
}
