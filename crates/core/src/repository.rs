//! A handle on a working tree and its git directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::GitError;
use crate::state::FsMetadata;

/// A repository on disk. Cheap to clone; holds paths only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    path: PathBuf,
    git_dir: PathBuf,
}

impl Repository {
    /// Open the repository whose working tree is at `path`.
    ///
    /// `.git` may be a directory or, for linked worktrees and submodules, a
    /// file containing `gitdir: <path>`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GitError> {
        let path = path.into();
        let dot_git = path.join(".git");

        let git_dir = if dot_git.is_dir() {
            dot_git
        } else if dot_git.is_file() {
            let contents = fs::read_to_string(&dot_git)?;
            let target = contents
                .lines()
                .find_map(|l| l.strip_prefix("gitdir:"))
                .map(str::trim)
                .ok_or_else(|| {
                    GitError::InvalidRequest(format!(
                        "'{}' does not name a git directory",
                        dot_git.display()
                    ))
                })?;
            let target = Path::new(target);
            if target.is_absolute() {
                target.to_path_buf()
            } else {
                path.join(target)
            }
        } else {
            return Err(GitError::InvalidRequest(format!(
                "'{}' is not a git working tree",
                path.display()
            )));
        };

        debug!(path = %path.display(), git_dir = %git_dir.display(), "opened repository");
        Ok(Self { path, git_dir })
    }

    /// Use an explicit git directory without probing the filesystem.
    pub fn with_git_dir(path: impl Into<PathBuf>, git_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            git_dir: git_dir.into(),
        }
    }

    /// The working tree root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// A read-only view over the git directory for state reconstruction.
    pub fn metadata(&self) -> FsMetadata {
        FsMetadata::new(&self.git_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_regular_repository() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.path(), dir.path());
        assert_eq!(repo.git_dir(), dir.path().join(".git"));
    }

    #[test]
    fn test_open_follows_gitdir_file() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("main/.git/worktrees/wt");
        fs::create_dir_all(&real).unwrap();
        let wt = dir.path().join("wt");
        fs::create_dir(&wt).unwrap();
        fs::write(wt.join(".git"), format!("gitdir: {}\n", real.display())).unwrap();

        let repo = Repository::open(&wt).unwrap();
        assert_eq!(repo.git_dir(), real);
    }

    #[test]
    fn test_open_relative_gitdir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("modules/sub")).unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join(".git"), "gitdir: ../modules/sub\n").unwrap();

        let repo = Repository::open(&sub).unwrap();
        assert_eq!(repo.git_dir(), sub.join("../modules/sub"));
    }

    #[test]
    fn test_open_rejects_plain_directory() {
        let dir = TempDir::new().unwrap();
        let err = Repository::open(dir.path()).unwrap_err();
        assert!(matches!(err, GitError::InvalidRequest(_)));
    }

    #[test]
    fn test_open_rejects_malformed_gitdir_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".git"), "garbage\n").unwrap();
        assert!(Repository::open(dir.path()).is_err());
    }
}
