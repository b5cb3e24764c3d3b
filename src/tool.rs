//! External tool runner
//!
//! Runs an external executable with captured output and a wall-clock
//! timeout. Both pipes are drained on their own threads so a chatty tool
//! can never stall on a full pipe while we wait for it.
//!
//! On timeout the child is killed and reaped before the error is returned,
//! so no orphan keeps handles open on files the next stage reads or deletes.

use crate::error::{ToolError, ToolResult};
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often to check whether the child has exited
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A located external executable
#[derive(Debug, Clone)]
pub struct ExternalTool {
    /// Display name used in errors and logs
    name: String,

    /// Program actually spawned
    program: PathBuf,

    /// Arguments placed before the caller's arguments (launcher mode)
    leading_args: Vec<OsString>,
}

/// Captured output of a successful run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ExternalTool {
    /// Locate a tool at an exact path
    ///
    /// Fails with `ToolError::NotFound` if nothing exists there.
    pub fn locate(name: impl Into<String>, path: impl Into<PathBuf>) -> ToolResult<Self> {
        let name = name.into();
        let path = path.into();
        ensure_exists(&name, &path)?;

        Ok(Self {
            name,
            program: path,
            leading_args: Vec::new(),
        })
    }

    /// Locate a tool that must be started through a launcher program
    ///
    /// The tool path becomes the launcher's first argument, e.g.
    /// `mono ExportSqlCe40.exe ...` or `/bin/sh script.sh ...`.
    pub fn with_launcher(
        name: impl Into<String>,
        launcher: impl Into<PathBuf>,
        path: impl Into<PathBuf>,
    ) -> ToolResult<Self> {
        let name = name.into();
        let launcher = launcher.into();
        let path = path.into();
        ensure_exists(&name, &path)?;
        ensure_exists(&name, &launcher)?;

        Ok(Self {
            name,
            program: launcher,
            leading_args: vec![path.into_os_string()],
        })
    }

    /// Tool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the tool to completion or until `timeout` elapses
    pub fn run<I, S>(&self, args: I, timeout: Duration) -> ToolResult<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Running {}: {:?}", self.name, command);

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| ToolError::SpawnFailed {
            tool: self.name.clone(),
            reason: e.to_string(),
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.wait_with_deadline(&mut child, start + timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Reader threads are left to finish on their own once the
                // pipes close; joining could block on inherited handles.
                self.terminate(&mut child);
                return Err(ToolError::Timeout {
                    tool: self.name.clone(),
                    timeout,
                });
            }
            Err(e) => {
                self.terminate(&mut child);
                return Err(e);
            }
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        let elapsed = start.elapsed();

        if !status.success() {
            return Err(ToolError::Failed {
                tool: self.name.clone(),
                code: status.code(),
                stderr,
            });
        }

        debug!(
            tool = %self.name,
            elapsed_ms = elapsed.as_millis() as u64,
            "Tool finished"
        );
        if !stdout.trim().is_empty() {
            debug!("{} stdout: {}", self.name, stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.name, stderr.trim());
        }

        Ok(ToolOutput {
            status,
            stdout,
            stderr,
            elapsed,
        })
    }

    /// Wait for the child, returning `None` once the deadline has passed
    fn wait_with_deadline(&self, child: &mut Child, deadline: Instant) -> ToolResult<Option<ExitStatus>> {
        loop {
            // Deadline first: a timeout beats an exit seen on the same tick.
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => thread::sleep(POLL_INTERVAL.min(deadline - now)),
                Err(e) => {
                    return Err(ToolError::Wait {
                        tool: self.name.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    /// Kill the child and block until it has been reaped
    fn terminate(&self, child: &mut Child) {
        if let Err(e) = child.kill() {
            warn!("Failed to kill {} (pid {}): {}", self.name, child.id(), e);
        }
        match child.wait() {
            Ok(status) => debug!("{} terminated: {}", self.name, status),
            Err(e) => warn!("Failed to reap {} (pid {}): {}", self.name, child.id(), e),
        }
    }
}

fn ensure_exists(name: &str, path: &Path) -> ToolResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ToolError::NotFound {
            tool: name.to_string(),
            path: path.to_path_buf(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_locate_missing_tool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sqlite3");

        let err = ExternalTool::locate("sqlite3", &path).unwrap_err();
        match err {
            ToolError::NotFound { tool, path: missing } => {
                assert_eq!(tool, "sqlite3");
                assert_eq!(missing, path);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_launcher_requires_tool() {
        let dir = tempdir().unwrap();
        let launcher = dir.path().join("host");
        std::fs::write(&launcher, "").unwrap();

        let err = ExternalTool::with_launcher("exporter", &launcher, dir.path().join("missing.exe"))
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_output() {
        let sh = ExternalTool::locate("sh", "/bin/sh").unwrap();
        let output = sh
            .run(["-c", "echo hello; echo warn >&2"], Duration::from_secs(10))
            .unwrap();

        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "warn");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_nonzero_exit() {
        let sh = ExternalTool::locate("sh", "/bin/sh").unwrap();
        let err = sh
            .run(["-c", "echo broken >&2; exit 3"], Duration::from_secs(10))
            .unwrap_err();

        match err {
            ToolError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_timeout_kills_process() {
        let sh = ExternalTool::locate("sh", "/bin/sh").unwrap();
        let start = Instant::now();
        let err = sh
            .run(["-c", "exec sleep 30"], Duration::from_millis(200))
            .unwrap_err();

        assert!(matches!(err, ToolError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_large_output_does_not_block() {
        let sh = ExternalTool::locate("sh", "/bin/sh").unwrap();
        // Well past a typical 64KiB pipe buffer
        let output = sh
            .run(
                ["-c", "i=0; while [ $i -lt 20000 ]; do echo 0123456789; i=$((i+1)); done"],
                Duration::from_secs(30),
            )
            .unwrap();

        assert_eq!(output.stdout.lines().count(), 20000);
    }
}
