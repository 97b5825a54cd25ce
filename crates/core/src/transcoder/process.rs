//! Running external binaries inside a sandbox.

use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::error::TranscodeError;
use crate::sandbox::SandboxDirectory;

/// Longest stderr excerpt kept for error responses.
const STDERR_LIMIT: usize = 2000;

/// One binary invocation.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub binary: &'a Path,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Redirect stdout into this file instead of discarding it.
    pub stdout_file: Option<&'a Path>,
}

impl<'a> Invocation<'a> {
    pub fn new(binary: &'a Path, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            binary,
            args,
            timeout_secs,
            stdout_file: None,
        }
    }

    pub fn stdout_to(mut self, path: &'a Path) -> Self {
        self.stdout_file = Some(path);
        self
    }
}

fn binary_name(binary: &Path) -> String {
    binary
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| binary.display().to_string())
}

/// Keeps the tail of the captured stderr, on a char boundary.
fn truncate_tail(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - limit;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

/// Runs `invocation` with the sandbox as working directory.
///
/// stdin is closed, stdout discarded (or written to `stdout_file`) and stderr
/// captured line by line; each line is passed to `on_stderr_line`. The child
/// is killed when the timeout fires or the future is dropped.
pub async fn run_binary<F>(
    invocation: Invocation<'_>,
    sandbox: &SandboxDirectory,
    mut on_stderr_line: F,
) -> Result<(), TranscodeError>
where
    F: FnMut(&str) + Send,
{
    let name = binary_name(invocation.binary);

    let stdout = match invocation.stdout_file {
        Some(path) => Stdio::from(std::fs::File::create(path)?),
        None => Stdio::null(),
    };

    tracing::debug!(binary = %name, args = ?invocation.args, "Spawning binary");

    let mut child = Command::new(invocation.binary)
        .args(&invocation.args)
        .current_dir(sandbox.path())
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TranscodeError::BinaryNotFound {
                    binary: name.clone(),
                }
            } else {
                TranscodeError::Io(e)
            }
        })?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;
    let mut reader = BufReader::new(stderr).lines();

    let timeout_duration = Duration::from_secs(invocation.timeout_secs);
    let result = timeout(timeout_duration, async {
        let mut captured = String::new();
        while let Ok(Some(line)) = reader.next_line().await {
            on_stderr_line(&line);
            captured.push_str(&line);
            captured.push('\n');
            if captured.len() > STDERR_LIMIT * 4 {
                captured = truncate_tail(&captured, STDERR_LIMIT);
            }
        }
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, captured))
    })
    .await;

    match result {
        Ok(Ok((status, _))) if status.success() => Ok(()),
        Ok(Ok((status, captured))) => {
            let status = status
                .code()
                .map(|c| format!("exit code {c}"))
                .unwrap_or_else(|| "terminated by signal".to_string());
            let stderr = truncate_tail(&sandbox.redact(&captured), STDERR_LIMIT);
            tracing::warn!(binary = %name, %status, "Binary failed");
            Err(TranscodeError::binary_failure(name, status, stderr))
        }
        Ok(Err(e)) => Err(TranscodeError::Io(e)),
        Err(_) => {
            tracing::warn!(binary = %name, timeout_secs = invocation.timeout_secs, "Binary timed out");
            Err(TranscodeError::Timeout {
                timeout_secs: invocation.timeout_secs,
            })
        }
    }
}

/// Reads a binary's output file, treating a missing or zero-byte file as
/// [`TranscodeError::EmptyOutput`].
pub async fn read_output(path: &Path) -> Result<Vec<u8>, TranscodeError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Err(TranscodeError::EmptyOutput),
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TranscodeError::EmptyOutput),
        Err(e) => Err(TranscodeError::Io(e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_truncate_tail() {
        assert_eq!(truncate_tail("  short  ", 10), "short");
        assert_eq!(truncate_tail("abcdefghij", 4), "...ghij");
        assert_eq!(truncate_tail("ééééé", 3), "...é");
    }

    #[tokio::test]
    async fn test_failure_carries_redacted_stderr() {
        let bin = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let sandbox = SandboxDirectory::create(root.path()).await.unwrap();
        let fail = script(bin.path(), "fail", r#"echo "cannot open $PWD/input.png" >&2; exit 3"#);

        let err = run_binary(Invocation::new(&fail, vec![], 10), &sandbox, |_| {})
            .await
            .unwrap_err();

        match err {
            TranscodeError::ExternalBinaryFailure {
                binary,
                status,
                stderr,
            } => {
                assert_eq!(binary, "fail");
                assert_eq!(status, "exit code 3");
                assert!(stderr.contains("input.png"));
                assert!(!stderr.contains(&*root.path().to_string_lossy()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let root = TempDir::new().unwrap();
        let sandbox = SandboxDirectory::create(root.path()).await.unwrap();
        let missing = PathBuf::from("/nonexistent/mediaforge-binary");

        let err = run_binary(Invocation::new(&missing, vec![], 10), &sandbox, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::BinaryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let bin = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let sandbox = SandboxDirectory::create(root.path()).await.unwrap();
        let slow = script(bin.path(), "slow", "sleep 30");

        let err = run_binary(Invocation::new(&slow, vec![], 1), &sandbox, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Timeout { timeout_secs: 1 }));
    }

    #[tokio::test]
    async fn test_stdout_redirect_and_stderr_lines() {
        let bin = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let sandbox = SandboxDirectory::create(root.path()).await.unwrap();
        let talk = script(bin.path(), "talk", "echo preview-bytes; echo progress=1 >&2; echo progress=2 >&2");
        let out = sandbox.file("preview.jpg");

        let mut lines = Vec::new();
        run_binary(
            Invocation::new(&talk, vec![], 10).stdout_to(&out),
            &sandbox,
            |line| lines.push(line.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(lines, vec!["progress=1", "progress=2"]);
        assert_eq!(read_output(&out).await.unwrap(), b"preview-bytes\n");
    }

    #[tokio::test]
    async fn test_read_output_empty() {
        let root = TempDir::new().unwrap();
        let empty = root.path().join("empty");
        std::fs::write(&empty, b"").unwrap();

        assert!(matches!(read_output(&empty).await, Err(TranscodeError::EmptyOutput)));
        assert!(matches!(
            read_output(&root.path().join("missing")).await,
            Err(TranscodeError::EmptyOutput)
        ));
    }
}
