//! Spawning git and collecting its output.

use super::cancel::CancellationHandle;
use super::error::{CancelCause, GitError, GitResult};
use super::invocation::GitInvocation;
use super::output::GitOutput;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Configuration overrides placed before every caller argument.
const CONFIG_PREFIX: &[&str] = &["-c", "core.quotepath=false", "-c", "color.ui=false"];

/// Long paths need opting into on Windows.
#[cfg(windows)]
const PLATFORM_PREFIX: &[&str] = &["-c", "core.longpaths=true"];
#[cfg(not(windows))]
const PLATFORM_PREFIX: &[&str] = &[];

/// Environment overlaid on the host's before caller overrides: never prompt
/// for credentials, and keep messages in the C locale so classification sees
/// English text.
const BASE_ENV: &[(&str, &str)] = &[
    ("GCM_INTERACTIVE", "NEVER"),
    ("GCM_PRESERVE_CREDS", "TRUE"),
    ("LC_ALL", "C"),
];

/// Fixed prefix followed by the caller's arguments.
pub(crate) fn full_args(invocation: &GitInvocation) -> Vec<String> {
    CONFIG_PREFIX
        .iter()
        .chain(PLATFORM_PREFIX)
        .map(|s| s.to_string())
        .chain(invocation.args().iter().cloned())
        .collect()
}

/// The expanded command line, used for identities, cache keys and logs.
pub(crate) fn command_line(program: &Path, args: &[String]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

pub(crate) fn build_command(program: &Path, invocation: &GitInvocation, args: &[String]) -> Command {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(invocation.cwd())
        .envs(BASE_ENV.iter().copied())
        .envs(
            invocation
                .env_overrides()
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
        .stdin(if invocation.stdin_bytes().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

pub(crate) fn spawn(program: &Path, invocation: &GitInvocation, args: &[String]) -> GitResult<Child> {
    let mut child = build_command(program, invocation, args)
        .spawn()
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => GitError::NotFound,
            _ => GitError::Spawn {
                program: program.display().to_string(),
                source: Arc::new(err),
            },
        })?;

    if let (Some(input), Some(mut stdin)) = (invocation.stdin_bytes().cloned(), child.stdin.take()) {
        tokio::spawn(async move {
            // A child that exits without reading stdin closes the pipe; that
            // surfaces through its exit code instead
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        });
    }

    Ok(child)
}

/// Read a pipe to the end on its own task.
pub(crate) fn collect<R>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

pub(crate) async fn join_collected(task: JoinHandle<std::io::Result<Vec<u8>>>) -> GitResult<Vec<u8>> {
    match task.await {
        Ok(result) => Ok(result?),
        Err(err) => Err(GitError::Abandoned(err.to_string())),
    }
}

/// Resolves when the timeout elapses or the handle is cancelled.
pub(crate) async fn abort_signal(timeout: Option<Duration>, cancellation: Option<&CancellationHandle>) {
    let timer = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };
    let cancelled = async {
        match cancellation {
            Some(handle) => handle.cancelled().await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = timer => {}
        _ = cancelled => {}
    }
}

/// Timeout if the process ran at least as long as its timeout, else caller.
pub(crate) fn cancel_cause(elapsed: Duration, timeout: Option<Duration>) -> CancelCause {
    match timeout {
        Some(timeout) if elapsed >= timeout => CancelCause::Timeout,
        _ => CancelCause::Caller,
    }
}

pub(crate) fn cancelled(command_line: &str, started: Instant, timeout: Option<Duration>) -> GitError {
    let elapsed = started.elapsed();
    GitError::Cancelled {
        command_line: command_line.to_string(),
        cause: cancel_cause(elapsed, timeout),
        elapsed,
    }
}

/// Run to completion. Any exit code is a successful return here; error modes
/// are applied by the caller.
pub(crate) async fn run(
    program: &Path,
    invocation: &GitInvocation,
    args: &[String],
    command_line: &str,
) -> GitResult<GitOutput> {
    let started = Instant::now();
    let timeout = invocation.timeout_value();
    let cancellation = invocation.cancellation_handle();

    if cancellation.is_some_and(CancellationHandle::is_cancelled) {
        return Err(cancelled(command_line, started, timeout));
    }

    let mut child = spawn(program, invocation, args)?;
    let stdout = collect(child.stdout.take());
    let stderr = collect(child.stderr.take());

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = abort_signal(timeout, cancellation) => {
            let _ = child.kill().await;
            stdout.abort();
            stderr.abort();
            return Err(cancelled(command_line, started, timeout));
        }
    };

    let stdout = join_collected(stdout).await?;
    let stderr = join_collected(stderr).await?;

    Ok(GitOutput::new(
        stdout,
        String::from_utf8_lossy(&stderr).into_owned(),
        // Killed by a signal
        status.code().unwrap_or(-1),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_args_prefix() {
        let invocation = GitInvocation::new("/repo", ["log", "-n1"]);
        let args = full_args(&invocation);
        assert_eq!(&args[..4], &["-c", "core.quotepath=false", "-c", "color.ui=false"]);
        assert_eq!(&args[args.len() - 2..], &["log", "-n1"]);
        #[cfg(windows)]
        assert!(args.contains(&"core.longpaths=true".to_string()));
    }

    #[test]
    fn test_command_line() {
        let args = vec!["status".to_string(), "--porcelain".to_string()];
        assert_eq!(
            command_line(Path::new("git"), &args),
            "git status --porcelain"
        );
    }

    #[test]
    fn test_cancel_cause() {
        let timeout = Some(Duration::from_millis(100));
        assert_eq!(cancel_cause(Duration::from_millis(150), timeout), CancelCause::Timeout);
        assert_eq!(cancel_cause(Duration::from_millis(20), timeout), CancelCause::Caller);
        assert_eq!(cancel_cause(Duration::from_secs(60), None), CancelCause::Caller);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_collects_output_and_exit_code() {
        let invocation = GitInvocation::new(std::env::temp_dir(), ["-c", "echo out; echo err >&2; exit 3"]);
        let args = invocation.args().to_vec();
        let output = run(Path::new("/bin/sh"), &invocation, &args, "sh")
            .await
            .unwrap();
        assert_eq!(output.text().unwrap(), "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_applies_base_env_and_stdin() {
        let invocation = GitInvocation::new(std::env::temp_dir(), ["-c", "printf \"$LC_ALL:\"; cat"])
            .stdin(b"piped".to_vec());
        let args = invocation.args().to_vec();
        let output = run(Path::new("/bin/sh"), &invocation, &args, "sh")
            .await
            .unwrap();
        assert_eq!(output.text().unwrap(), "C:piped");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout() {
        let invocation = GitInvocation::new(std::env::temp_dir(), ["-c", "sleep 5"])
            .timeout(Duration::from_millis(100));
        let args = invocation.args().to_vec();
        let err = run(Path::new("/bin/sh"), &invocation, &args, "sh")
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_caller_cancellation() {
        let handle = CancellationHandle::new();
        let invocation = GitInvocation::new(std::env::temp_dir(), ["-c", "sleep 5"])
            .timeout(Duration::from_secs(30))
            .cancellation(handle.clone());
        let args = invocation.args().to_vec();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });
        let err = run(Path::new("/bin/sh"), &invocation, &args, "sh")
            .await
            .unwrap_err();
        canceller.await.unwrap();

        match err {
            GitError::Cancelled { cause, .. } => assert_eq!(cause, CancelCause::Caller),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
