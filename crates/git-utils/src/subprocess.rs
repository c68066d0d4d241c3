use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::process::{Command, ExitStatus, Stdio};

use bstr::ByteSlice;

use crate::error::UtilError;
use crate::Result;

/// Result of running a subprocess.
#[derive(Debug)]
pub struct GitCommandResult {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl GitCommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Builder for running a git helper to completion.
///
/// Stdin is either closed or fed from a file handed over to the child, which
/// is how helpers such as `git show-index` consume their input. Stdout and
/// stderr are always captured.
pub struct GitCommand {
    program: OsString,
    args: Vec<OsString>,
    stdin_file: Option<File>,
}

impl GitCommand {
    /// Create a new command builder for the given program.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            stdin_file: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Feed the child's stdin from `file`. The handle is consumed by the child.
    pub fn stdin_file(mut self, file: File) -> Self {
        self.stdin_file = Some(file);
        self
    }

    /// Get the command string for error messages.
    pub fn command_string(&self) -> String {
        let mut s = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(&arg.to_string_lossy());
        }
        s
    }

    /// Run the command and wait for it to complete, capturing piped output.
    pub fn run(self) -> Result<GitCommandResult> {
        let command = self.command_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(match self.stdin_file {
            Some(file) => Stdio::from(file),
            None => Stdio::null(),
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd
            .output()
            .map_err(|source| UtilError::Subprocess { command, source })?;
        Ok(GitCommandResult {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Run the command and return its stdout, failing on a non-zero exit.
    pub fn run_checked(self) -> Result<Vec<u8>> {
        let command = self.command_string();
        let result = self.run()?;
        if !result.success() {
            return Err(UtilError::ExitStatus {
                command,
                status: result.status,
                stderr: result.stderr.trim().to_str_lossy().into_owned(),
            });
        }
        Ok(result.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_echo() {
        let result = GitCommand::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), b"hello");
    }

    #[test]
    fn capture_stderr() {
        let result = GitCommand::new("sh")
            .arg("-c")
            .arg("echo error >&2")
            .run()
            .unwrap();
        assert!(result.success());
        assert_eq!(result.stderr.trim(), b"error");
    }

    #[test]
    fn run_checked_reports_exit_status() {
        let err = GitCommand::new("sh")
            .arg("-c")
            .arg("echo broken >&2; exit 42")
            .run_checked()
            .unwrap_err();
        match err {
            UtilError::ExitStatus { status, stderr, .. } => {
                assert_eq!(status.code(), Some(42));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_subprocess_error() {
        let err = GitCommand::new("/nonexistent/definitely-not-git")
            .run()
            .unwrap_err();
        assert!(matches!(err, UtilError::Subprocess { .. }));
    }

    #[test]
    fn stdin_is_closed_without_a_file() {
        let out = GitCommand::new("cat").run_checked().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn stdin_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, b"piped input").unwrap();

        let out = GitCommand::new("cat")
            .stdin_file(File::open(&path).unwrap())
            .run_checked()
            .unwrap();
        assert_eq!(out, b"piped input");
    }
}
