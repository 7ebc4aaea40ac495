//! Settled command results.

use super::error::{GitError, GitResult};
use std::sync::Arc;

/// Stdout, stderr and exit code of one git process.
///
/// Stdout is shared, so cloning a result for every deduplicated caller or
/// cache hit does not copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: Arc<[u8]>,
    pub stderr: String,
    pub exit_code: i32,
}

impl GitOutput {
    pub fn new(stdout: Vec<u8>, stderr: String, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr,
            exit_code,
        }
    }

    /// Exit 0 and nothing printed.
    pub fn empty() -> Self {
        Self::new(Vec::new(), String::new(), 0)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout as text; fails on invalid UTF-8.
    pub fn text(&self) -> GitResult<&str> {
        std::str::from_utf8(&self.stdout).map_err(|e| GitError::InvalidUtf8(e.to_string()))
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.stdout
    }

    /// Same output under a different exit code.
    pub(crate) fn with_exit_code(&self, exit_code: i32) -> Self {
        Self {
            stdout: Arc::clone(&self.stdout),
            stderr: self.stderr.clone(),
            exit_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_validates_utf8() {
        let ok = GitOutput::new("héllo".as_bytes().to_vec(), String::new(), 0);
        assert_eq!(ok.text().unwrap(), "héllo");

        let bad = GitOutput::new(vec![0x66, 0xff], String::new(), 0);
        assert!(matches!(bad.text(), Err(GitError::InvalidUtf8(_))));
        assert_eq!(bad.text_lossy(), "f\u{fffd}");
    }

    #[test]
    fn test_clone_shares_stdout() {
        let output = GitOutput::new(b"abc".to_vec(), String::new(), 0);
        let copy = output.clone();
        assert!(Arc::ptr_eq(&output.stdout, &copy.stdout));
    }
}
