//! Synchronous shell-command execution for the command executor.
//!
//! The loop has exactly one thread of control, so command execution is
//! a plain blocking subprocess call: the child's stderr is inherited
//! (it goes straight to this process's diagnostic stream) and its
//! stdout is relayed there line by line as it arrives. No signal is
//! processed while a command runs.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::status;

/// Result of one shell-command run.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Exit status of the command, [`status::SPAWN_FAILED`] when it
    /// could not be launched, or 128 + signal number when it was killed.
    pub status: i32,
    /// Everything the command wrote to stdout.
    pub output: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Run a command line under `sh -c`, blocking until it exits.
pub fn run_shell(command: &str) -> CommandOutcome {
    debug!(command, "running shell command");

    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            warn!(command, error = %e, "failed to spawn shell");
            return CommandOutcome {
                status: status::SPAWN_FAILED,
                output: String::new(),
            };
        }
    };

    let mut output = String::new();
    if let Some(stdout) = child.stdout.take() {
        let mut diag = std::io::stderr().lock();
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) => {
                    let _ = writeln!(diag, "{line}");
                    output.push_str(&line);
                    output.push('\n');
                }
                Err(e) => {
                    warn!(error = %e, "error reading command output");
                    break;
                }
            }
        }
    }

    let status = match child.wait() {
        Ok(exit) => exit.code().unwrap_or_else(|| {
            use std::os::unix::process::ExitStatusExt;
            128 + exit.signal().unwrap_or(0)
        }),
        Err(e) => {
            warn!(error = %e, "failed to reap shell command");
            status::SPAWN_FAILED
        }
    };

    debug!(command, status, "shell command finished");
    CommandOutcome { status, output }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_succeeds() {
        let outcome = run_shell("echo hi");
        assert!(outcome.success());
        assert_eq!(outcome.output, "hi\n");
    }

    #[test]
    fn test_exit_status_propagates() {
        let outcome = run_shell("exit 3");
        assert_eq!(outcome.status, 3);
        assert!(outcome.output.is_empty());
    }

    #[test]
    fn test_multi_line_output() {
        let outcome = run_shell("printf 'a\\nb\\n'");
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.output, "a\nb\n");
    }

    #[test]
    fn test_missing_command_is_nonzero() {
        // sh itself launches fine; the command inside fails.
        let outcome = run_shell("definitely-not-a-command-7d1f");
        assert_ne!(outcome.status, 0);
        assert_ne!(outcome.status, status::SPAWN_FAILED);
    }
}
