//! External tool invocation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Lines of stderr kept in failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// Locate a program on `PATH`, falling back to the bare name.
pub fn find_program(name: &str) -> PathBuf {
    which::which(name).unwrap_or_else(|_| PathBuf::from(name))
}

/// Run a tool to completion.
///
/// On failure the error message carries the exit status and the tail of
/// stderr.
pub fn run<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Result<(), String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    log::debug!("Running {:?}", cmd);
    let output = cmd
        .output()
        .map_err(|e| format!("failed to start {}: {}", program.display(), e))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(format!(
        "{} exited with {}: {}",
        program.display(),
        output.status,
        tail(&stderr, STDERR_TAIL_LINES)
    ))
}

/// The last `count` non-empty lines of `text`.
fn tail(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
