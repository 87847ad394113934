//! Running a module's build commands.
//!
//! [`CommandRunner`] is the seam between the orchestrator and the outside
//! world; tests substitute a recording fake. [`ShellRunner`] runs each command
//! through the platform shell in the module directory, one after the other,
//! and kills the running command once the module's timeout is exhausted.

use crate::error::{Error, Result};
use log::{debug, info};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Executes build commands for a module.
pub trait CommandRunner {
    /// Run `commands` in order inside `working_dir`; fail on the first
    /// unsuccessful command or once `timeout` has elapsed for the whole list.
    fn run(&self, commands: &[String], working_dir: &Path, timeout: Duration) -> Result<()>;
}

/// Runs commands through `sh -c` (`cmd /C` on Windows)
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, commands: &[String], working_dir: &Path, timeout: Duration) -> Result<()> {
        // A timeout too large to represent never expires.
        let deadline = Instant::now().checked_add(timeout);
        for command in commands {
            info!("executing the \"{}\" command in {}", command, working_dir.display());
            run_one(command, working_dir, deadline, timeout)?;
        }
        Ok(())
    }
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

fn run_one(
    command: &str,
    working_dir: &Path,
    deadline: Option<Instant>,
    timeout: Duration,
) -> Result<()> {
    let mut child = shell(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::CommandFailed {
            command: command.to_string(),
            status: "not started".to_string(),
            stderr: e.to_string(),
        })?;

    // Both pipes are drained while the child runs.
    let stdout = child.stdout.take().map(|out| {
        thread::spawn(move || {
            for line in BufReader::new(out).split(b'\n') {
                match line {
                    Ok(bytes) => debug!("{}", String::from_utf8_lossy(&bytes).trim_end()),
                    Err(_) => break,
                }
            }
        })
    });
    let stderr = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut collected = Vec::new();
            let _ = err.read_to_end(&mut collected);
            String::from_utf8_lossy(&collected).into_owned()
        })
    });

    let status = match wait_until(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::CommandTimeout {
                command: command.to_string(),
                timeout: format!("{:?}", timeout),
            });
        }
        Err(e) => {
            let _ = child.kill();
            return Err(Error::CommandFailed {
                command: command.to_string(),
                status: "unknown".to_string(),
                stderr: e.to_string(),
            });
        }
    };

    if let Some(handle) = stdout {
        let _ = handle.join();
    }
    let stderr = stderr
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(Error::CommandFailed {
            command: command.to_string(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}

/// Wait for `child` to exit; `None` when the deadline passes first.
fn wait_until(
    child: &mut Child,
    deadline: Option<Instant>,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_runs_commands_in_working_dir() {
        let dir = TempDir::new().unwrap();
        let commands = vec![
            "echo built > out.txt".to_string(),
            "cat out.txt >> log.txt".to_string(),
        ];
        ShellRunner
            .run(&commands, dir.path(), Duration::from_secs(30))
            .unwrap();
        let log = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert_eq!(log.trim(), "built");
    }

    #[test]
    fn test_failure_reports_stderr_and_stops() {
        let dir = TempDir::new().unwrap();
        let commands = vec![
            "echo broken >&2; exit 3".to_string(),
            "touch never.txt".to_string(),
        ];
        let err = ShellRunner
            .run(&commands, dir.path(), Duration::from_secs(30))
            .unwrap_err();
        match err {
            Error::CommandFailed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!dir.path().join("never.txt").exists());
    }

    #[test]
    fn test_timeout_kills_command() {
        let dir = TempDir::new().unwrap();
        let started = Instant::now();
        let err = ShellRunner
            .run(&["sleep 5".to_string()], dir.path(), Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_huge_timeout_means_no_deadline() {
        let dir = TempDir::new().unwrap();
        let timeout = crate::build_params::parse_duration("9300000000000000000s").unwrap();
        ShellRunner
            .run(&["true".to_string()], dir.path(), timeout)
            .unwrap();
    }

    #[test]
    fn test_non_utf8_output_is_drained() {
        let dir = TempDir::new().unwrap();
        let command = r"printf '\377\n'; head -c 300000 /dev/zero | tr '\000' a".to_string();
        ShellRunner
            .run(&[command], dir.path(), Duration::from_secs(30))
            .unwrap();
    }

    #[test]
    fn test_empty_command_list_succeeds() {
        let dir = TempDir::new().unwrap();
        ShellRunner.run(&[], dir.path(), Duration::from_secs(1)).unwrap();
    }
}
