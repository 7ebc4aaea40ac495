//! Repository watcher that resets cached git results when `.git` changes.

use crate::error::EngineResult;
use crate::git::GitExecutor;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// A watched repository: its working tree and git directory.
#[derive(Debug, Clone)]
struct WatchedRepo {
    root: PathBuf,
    git_dir: PathBuf,
}

/// Watches git directories and calls [`GitExecutor::reset_for`] once changes
/// settle.
pub struct RepoWatcher {
    watcher: RecommendedWatcher,
    repos: Arc<Mutex<Vec<WatchedRepo>>>,
}

impl RepoWatcher {
    /// Create a watcher with debouncing. Must be called inside a tokio runtime.
    pub fn new(executor: GitExecutor, debounce: Duration) -> EngineResult<Self> {
        let (tx, mut rx) = mpsc::channel::<Event>(100);

        let watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    // Called from notify's own thread
                    let _ = tx.blocking_send(event);
                }
            },
            Config::default(),
        )?;

        let repos: Arc<Mutex<Vec<WatchedRepo>>> = Arc::new(Mutex::new(Vec::new()));
        let task_repos = Arc::clone(&repos);

        tokio::spawn(async move {
            let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

            loop {
                tokio::select! {
                    event = rx.recv() => {
                        match event {
                            Some(event) if matches!(event.kind, EventKind::Access(_)) => {}
                            Some(event) => {
                                let roots: Vec<PathBuf> = {
                                    let repos = task_repos.lock();
                                    event
                                        .paths
                                        .iter()
                                        .filter_map(|path| owning_repo(&repos, path))
                                        .map(|repo| repo.root.clone())
                                        .collect()
                                };
                                for root in roots {
                                    pending.insert(root, Instant::now());
                                }
                            }
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {
                        let now = Instant::now();
                        let mut settled = Vec::new();

                        pending.retain(|root, last_change| {
                            if now.duration_since(*last_change) >= debounce {
                                settled.push(root.clone());
                                false
                            } else {
                                true
                            }
                        });

                        for root in settled {
                            executor
                                .sink()
                                .debug("watch", &format!("repository changed: {}", root.display()));
                            executor.reset_for(&root);
                        }
                    }
                }
            }
        });

        Ok(Self { watcher, repos })
    }

    /// Start watching the git directory of the repository at `root`.
    ///
    /// `git_dir` defaults to `root/.git`.
    pub fn watch(&mut self, root: &Path, git_dir: Option<&Path>) -> EngineResult<()> {
        let git_dir = git_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join(".git"));
        self.watcher.watch(&git_dir, RecursiveMode::Recursive)?;
        self.repos.lock().push(WatchedRepo {
            root: root.to_path_buf(),
            git_dir,
        });
        Ok(())
    }

    /// Stop watching the repository at `root`.
    pub fn unwatch(&mut self, root: &Path) -> EngineResult<()> {
        let removed: Vec<WatchedRepo> = {
            let mut repos = self.repos.lock();
            let (removed, kept) = repos.drain(..).partition(|repo| repo.root == root);
            *repos = kept;
            removed
        };
        for repo in removed {
            self.watcher.unwatch(&repo.git_dir)?;
        }
        Ok(())
    }

    /// Roots currently watched.
    pub fn watched(&self) -> Vec<PathBuf> {
        self.repos.lock().iter().map(|r| r.root.clone()).collect()
    }
}

fn owning_repo<'a>(repos: &'a [WatchedRepo], path: &Path) -> Option<&'a WatchedRepo> {
    repos.iter().find(|repo| {
        path.strip_prefix(&repo.git_dir)
            .map(is_relevant)
            .unwrap_or(false)
    })
}

/// Whether a change at `relative` (inside a git directory) can affect command
/// results. Object writes and lock files churn during every operation and are
/// followed by a ref or index update anyway.
fn is_relevant(relative: &Path) -> bool {
    let mut components = relative.components();
    if let Some(Component::Normal(first)) = components.next() {
        if first == "objects" || first == "logs" {
            return false;
        }
    }
    !relative
        .extension()
        .is_some_and(|ext| ext == "lock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::git::{GitLocation, GitLocator, GitVersion};
    use crate::sink::MemorySink;

    fn executor(sink: Arc<MemorySink>) -> GitExecutor {
        let locator = GitLocator::fixed(GitLocation {
            path: PathBuf::from("/usr/bin/git"),
            version: GitVersion::new(2, 45, 0),
        });
        GitExecutor::with_locator(&EngineConfig::default(), locator, sink)
    }

    #[test]
    fn test_relevant_paths() {
        assert!(is_relevant(Path::new("HEAD")));
        assert!(is_relevant(Path::new("index")));
        assert!(is_relevant(Path::new("refs/heads/main")));
        assert!(!is_relevant(Path::new("objects/ab/cdef")));
        assert!(!is_relevant(Path::new("logs/HEAD")));
        assert!(!is_relevant(Path::new("index.lock")));
        assert!(!is_relevant(Path::new("refs/heads/main.lock")));
    }

    #[test]
    fn test_owning_repo() {
        let repos = vec![
            WatchedRepo {
                root: PathBuf::from("/work/a"),
                git_dir: PathBuf::from("/work/a/.git"),
            },
            WatchedRepo {
                root: PathBuf::from("/work/b"),
                git_dir: PathBuf::from("/gitdirs/b"),
            },
        ];
        let owner = |p: &str| owning_repo(&repos, Path::new(p)).map(|r| r.root.clone());

        assert_eq!(owner("/work/a/.git/HEAD"), Some(PathBuf::from("/work/a")));
        assert_eq!(owner("/gitdirs/b/refs/tags/v1"), Some(PathBuf::from("/work/b")));
        assert_eq!(owner("/work/a/src/main.rs"), None);
        assert_eq!(owner("/work/a/.git/objects/12/3456"), None);
    }

    #[tokio::test]
    async fn test_head_change_resets_repository() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        std::fs::create_dir_all(&git_dir).unwrap();

        let sink = Arc::new(MemorySink::new());
        let mut watcher = RepoWatcher::new(executor(sink.clone()), Duration::from_millis(50)).unwrap();
        watcher.watch(dir.path(), None).unwrap();
        assert_eq!(watcher.watched(), vec![dir.path().to_path_buf()]);

        std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let expected = format!("reset {}", dir.path().display());
        let mut reset = false;
        for _ in 0..100 {
            if sink.messages("git").iter().any(|m| m.starts_with(&expected)) {
                reset = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        assert!(reset, "no reset observed");
        let changed = format!("repository changed: {}", dir.path().display());
        assert!(sink.messages("watch").contains(&changed));

        watcher.unwatch(dir.path()).unwrap();
        assert!(watcher.watched().is_empty());
    }
}
