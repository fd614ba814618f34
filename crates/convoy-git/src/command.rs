//! System git invocations

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use tracing::debug;

use convoy_core::error::GitError;

use crate::repository::Result;

/// Run `git <args>` in `cwd` and return trimmed stdout
///
/// A non-zero exit becomes [`GitError::CommandFailed`] carrying stderr, so
/// callers can inspect why git refused.
pub(crate) fn run_git<S: AsRef<str>>(cwd: &Path, args: &[S]) -> Result<String> {
    let start = Instant::now();
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    let output = Command::new("git").args(&args).current_dir(cwd).output()?;

    let command = format!("git {}", args.join(" "));
    debug!(
        command = %command,
        success = output.status.success(),
        duration_ms = start.elapsed().as_millis() as u64,
        "ran git"
    );

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// Non-empty output lines
pub(crate) fn lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty())
}
