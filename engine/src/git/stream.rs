//! Pull-based streaming of git stdout.
//!
//! A [`GitStream`] yields decoded UTF-8 chunks as git produces them. Whatever
//! way consumption ends (exhaustion, an error, [`GitStream::close`], or simply
//! dropping the stream) the process is drained and reaped and the finalizer
//! runs exactly once.

use super::cancel::CancellationHandle;
use super::error::{GitError, GitFailure, GitResult};
use super::invocation::ErrorMode;
use super::process::{abort_signal, cancelled, collect, join_collected};
use super::queue::Permit;
use crate::sink::LogSink;
use gitlore_records::Utf8Chunker;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 16 * 1024;
const STDOUT_TAIL_LIMIT: usize = 8 * 1024;

/// How a stream's process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamExit {
    pub exit_code: i32,
    pub stderr: String,
}

/// Everything needed to reap the process; consumed by the finalizer.
struct Running {
    child: Child,
    stdout: ChildStdout,
    stderr: JoinHandle<std::io::Result<Vec<u8>>>,
    permit: Option<Permit>,
    sink: Arc<dyn LogSink>,
    command_line: String,
    started: Instant,
    timeout: Option<Duration>,
    cancellation: Option<CancellationHandle>,
}

impl Running {
    /// Time left before the timeout fires.
    fn remaining(&self) -> Option<Duration> {
        self.timeout.map(|t| t.saturating_sub(self.started.elapsed()))
    }

    /// Discard remaining stdout, wait for exit, log once.
    ///
    /// The drain still honours the timeout and cancellation; the process is
    /// killed when either fires.
    async fn finish(mut self, mut killed: bool) -> GitResult<StreamExit> {
        if !killed {
            let deadline = self.remaining();
            let mut sink = tokio::io::sink();
            tokio::select! {
                _ = tokio::io::copy(&mut self.stdout, &mut sink) => {}
                _ = abort_signal(deadline, self.cancellation.as_ref()) => killed = true,
            }
        }

        if killed {
            let _ = self.child.kill().await;
            // Descendants may still hold the pipe open
            self.stderr.abort();
        }
        let status = self.child.wait().await;
        let stderr = if killed {
            Vec::new()
        } else {
            join_collected(self.stderr).await.unwrap_or_default()
        };
        // Killed by a signal
        let exit_code = status.map(|s| s.code().unwrap_or(-1)).unwrap_or(-1);
        drop(self.permit.take());

        self.sink.debug(
            "stream",
            &format!(
                "finished `{}` exit={}{} in {:?}",
                self.command_line,
                exit_code,
                if killed { " (killed)" } else { "" },
                self.started.elapsed()
            ),
        );

        Ok(StreamExit {
            exit_code,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    /// Finalizer for a stream dropped without a runtime to drain it on.
    fn finish_detached(mut self) {
        let _ = self.child.start_kill();
        self.stderr.abort();
        self.sink.debug(
            "stream",
            &format!("finished `{}` (killed on drop)", self.command_line),
        );
    }
}

/// Lazy, finite, forward-only sequence of stdout chunks.
pub struct GitStream {
    running: Option<Running>,
    exit: Option<StreamExit>,
    chunker: Utf8Chunker,
    buffer: Vec<u8>,
    /// The most recent stdout text, kept for failure diagnostics.
    tail: String,
    error_mode: ErrorMode,
}

impl GitStream {
    pub(crate) fn start(
        mut child: Child,
        permit: Option<Permit>,
        sink: Arc<dyn LogSink>,
        command_line: String,
        error_mode: ErrorMode,
        timeout: Option<Duration>,
        cancellation: Option<CancellationHandle>,
    ) -> GitResult<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GitError::Abandoned("git stdout was not captured".to_string()))?;
        let stderr = collect(child.stderr.take());

        Ok(Self {
            running: Some(Running {
                child,
                stdout,
                stderr,
                permit,
                sink,
                command_line,
                started: Instant::now(),
                timeout,
                cancellation,
            }),
            exit: None,
            chunker: Utf8Chunker::new(),
            buffer: vec![0; READ_BUFFER_SIZE],
            tail: String::new(),
            error_mode,
        })
    }

    /// The next decoded chunk, or `None` once stdout is exhausted.
    ///
    /// At exhaustion a nonzero exit raises [`GitError::Command`] under
    /// [`ErrorMode::Throw`]. After `None` or an error, keeps returning `None`.
    pub async fn next_chunk(&mut self) -> GitResult<Option<String>> {
        loop {
            let Some(running) = self.running.as_mut() else {
                return Ok(None);
            };

            let deadline = running.remaining();
            let read = tokio::select! {
                read = running.stdout.read(&mut self.buffer) => read,
                _ = abort_signal(deadline, running.cancellation.as_ref()) => {
                    return Err(self.abort().await);
                }
            };

            match read {
                Ok(0) => {
                    let rest = self.chunker.finish();
                    if !rest.is_empty() {
                        self.remember(&rest);
                        return Ok(Some(rest));
                    }
                    return self.complete().await.map(|_| None);
                }
                Ok(n) => {
                    let text = self.chunker.push(&self.buffer[..n]);
                    if !text.is_empty() {
                        self.remember(&text);
                        return Ok(Some(text));
                    }
                }
                Err(err) => {
                    if let Some(running) = self.running.take() {
                        let _ = running.finish(true).await;
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Stop consuming: drain the rest of stdout, wait for exit.
    ///
    /// Returns the exit even if it is nonzero; error modes only apply to
    /// [`next_chunk`](Self::next_chunk).
    pub async fn close(mut self) -> GitResult<StreamExit> {
        if let Some(running) = self.running.take() {
            let exit = running.finish(false).await?;
            self.exit = Some(exit);
        }
        self.exit
            .clone()
            .ok_or_else(|| GitError::Abandoned("git stream ended without an exit".to_string()))
    }

    /// Exit of a stream that has been fully consumed.
    pub fn exit(&self) -> Option<&StreamExit> {
        self.exit.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.running.is_none()
    }

    async fn complete(&mut self) -> GitResult<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let command_line = running.command_line.clone();
        let exit = running.finish(false).await?;
        self.exit = Some(exit.clone());

        if exit.exit_code != 0 && self.error_mode == ErrorMode::Throw {
            let stdout = std::mem::take(&mut self.tail);
            return Err(GitFailure::new(command_line, exit.exit_code, stdout, exit.stderr).into());
        }
        Ok(())
    }

    async fn abort(&mut self) -> GitError {
        let Some(running) = self.running.take() else {
            return GitError::Abandoned("git stream already finished".to_string());
        };
        let started = running.started;
        let timeout = running.timeout;
        let command_line = running.command_line.clone();
        let _ = running.finish(true).await;
        cancelled(&command_line, started, timeout)
    }

    /// Keep the last [`STDOUT_TAIL_LIMIT`] bytes of emitted text.
    fn remember(&mut self, text: &str) {
        self.tail.push_str(text);
        if self.tail.len() > STDOUT_TAIL_LIMIT {
            let mut cut = self.tail.len() - STDOUT_TAIL_LIMIT;
            while !self.tail.is_char_boundary(cut) {
                cut += 1;
            }
            self.tail.drain(..cut);
        }
    }
}

impl Drop for GitStream {
    fn drop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = running.finish(false).await;
                });
            }
            Err(_) => running.finish_detached(),
        }
    }
}
