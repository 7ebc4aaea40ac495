//! Finding the git executable and its version.

use super::error::{GitError, GitResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::process::Command;
use tokio::sync::OnceCell;

/// Environment variable that overrides the git executable.
pub const GIT_PATH_ENV: &str = "GITLORE_GIT_PATH";

static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("constant regex pattern is valid")
});

/// Parsed `git --version` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse text such as `git version 2.39.3 (Apple Git-145)`.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = VERSION.captures(text)?;
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse().ok());
        Some(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3).unwrap_or(0),
        })
    }

    pub fn at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
        *self >= GitVersion::new(major, minor, patch)
    }
}

impl std::fmt::Display for GitVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A usable git executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLocation {
    pub path: PathBuf,
    pub version: GitVersion,
}

/// Locates git once and remembers the answer.
///
/// Lookup order: explicit path, then `GITLORE_GIT_PATH`, then `PATH`.
#[derive(Debug, Clone)]
pub struct GitLocator {
    explicit: Option<PathBuf>,
    located: Arc<OnceCell<GitLocation>>,
}

impl GitLocator {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            located: Arc::new(OnceCell::new()),
        }
    }

    /// A locator that always answers `location` without probing.
    pub fn fixed(location: GitLocation) -> Self {
        Self {
            explicit: Some(location.path.clone()),
            located: Arc::new(OnceCell::new_with(Some(location))),
        }
    }

    /// Find and probe git on first use; later calls return the cached result.
    /// A failed probe is not cached.
    pub async fn locate(&self) -> GitResult<&GitLocation> {
        self.located
            .get_or_try_init(|| async {
                let candidate = self.candidate().ok_or(GitError::NotFound)?;
                probe(&candidate).await
            })
            .await
    }

    /// The cached location, if `locate` already succeeded.
    pub fn cached(&self) -> Option<&GitLocation> {
        self.located.get()
    }

    fn candidate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        if let Some(path) = std::env::var_os(GIT_PATH_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        find_in_path(executable_name())
    }
}

fn executable_name() -> &'static str {
    if cfg!(windows) {
        "git.exe"
    } else {
        "git"
    }
}

/// Search `PATH` for `name`.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

async fn probe(path: &Path) -> GitResult<GitLocation> {
    let output = Command::new(path)
        .arg("--version")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => GitError::NotFound,
            _ => GitError::Spawn {
                program: path.display().to_string(),
                source: Arc::new(err),
            },
        })?;

    if !output.status.success() {
        return Err(GitError::Unusable {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = GitVersion::parse(&stdout).ok_or_else(|| GitError::Unusable {
        path: path.to_path_buf(),
        reason: format!("unrecognized version output: {}", stdout.trim()),
    })?;

    Ok(GitLocation {
        path: path.to_path_buf(),
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!(
            GitVersion::parse("git version 2.39.3 (Apple Git-145)"),
            Some(GitVersion::new(2, 39, 3))
        );
        assert_eq!(
            GitVersion::parse("git version 2.45.1.windows.1"),
            Some(GitVersion::new(2, 45, 1))
        );
        assert_eq!(GitVersion::parse("git version 3.0"), Some(GitVersion::new(3, 0, 0)));
        assert_eq!(GitVersion::parse("no digits here"), None);
    }

    #[test]
    fn test_at_least() {
        let version = GitVersion::new(2, 30, 1);
        assert!(version.at_least(2, 30, 0));
        assert!(version.at_least(2, 30, 1));
        assert!(!version.at_least(2, 31, 0));
        assert!(!version.at_least(3, 0, 0));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let locator = GitLocator::new(Some(PathBuf::from("/nonexistent/gitlore/git")));
        assert!(matches!(locator.locate().await, Err(GitError::NotFound)));
        assert!(locator.cached().is_none());
    }

    #[tokio::test]
    async fn test_fixed_location() {
        let location = GitLocation {
            path: PathBuf::from("/usr/bin/git"),
            version: GitVersion::new(2, 40, 0),
        };
        let locator = GitLocator::fixed(location.clone());
        assert_eq!(locator.locate().await.unwrap(), &location);
    }

    #[tokio::test]
    async fn test_locates_real_git_when_present() {
        if find_in_path(executable_name()).is_none() {
            return;
        }
        let locator = GitLocator::new(None);
        if std::env::var_os(GIT_PATH_ENV).is_some() {
            return;
        }
        let location = locator.locate().await.unwrap();
        assert!(location.version.major >= 1);
        assert!(locator.cached().is_some());
    }
}
