//! External command execution
//!
//! All package-manager, init-system, packet-filter and certificate tooling is
//! reached through [`CommandRunner`], so workflows can be driven against a
//! recording runner in tests.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Output};

use log::debug;

use crate::error::{InstallerError, Result};

/// A program invocation with its arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Run `script` through `bash -c` with `pipefail`, for curl-pipe bootstraps.
    pub fn shell(script: impl AsRef<str>) -> Self {
        Self::new("bash").args(["-c", &format!("set -o pipefail; {}", script.as_ref())])
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Output from a command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stderr, or stdout when the tool reports failures there.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

pub trait CommandRunner {
    /// Run to completion. A nonzero exit is reported in the output, not as an error.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Find `program` on the search path this runner executes with.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run and turn a nonzero exit into [`InstallerError::Command`].
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec)?;
        if output.success() {
            Ok(output)
        } else {
            Err(InstallerError::Command {
                cmd: spec.to_string(),
                message: format!("exit code {}: {}", output.exit_code, output.diagnostic()),
            })
        }
    }
}

/// Runs commands on the local host with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!("running: {spec}");
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InstallerError::CommandNotFound(spec.program.clone())
                } else {
                    InstallerError::Command {
                        cmd: spec.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let output = parse_output(output);
        debug!("`{}` exited with {}", spec.program, output.exit_code);
        Ok(output)
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

fn parse_output(output: Output) -> CommandOutput {
    CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_spec_enables_pipefail() {
        let spec = CommandSpec::shell("curl -fsSL https://get.hy2.sh/ | bash");
        assert_eq!(spec.program, "bash");
        assert_eq!(spec.args[0], "-c");
        assert!(spec.args[1].starts_with("set -o pipefail; curl"));
    }

    #[test]
    fn test_display_joins_arguments() {
        let spec = CommandSpec::new("systemctl").args(["enable", "hysteria-server"]);
        assert_eq!(spec.to_string(), "systemctl enable hysteria-server");
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "out".into(),
            stderr: "  err\n".into(),
        };
        assert_eq!(output.diagnostic(), "err");

        let output = CommandOutput {
            exit_code: 1,
            stdout: "only stdout\n".into(),
            stderr: String::new(),
        };
        assert_eq!(output.diagnostic(), "only stdout");
    }

    #[test]
    fn test_missing_program_is_command_not_found() {
        let spec = CommandSpec::new("definitely-not-a-real-program-7f3a");
        match SystemRunner.run(&spec) {
            Err(InstallerError::CommandNotFound(name)) => {
                assert_eq!(name, "definitely-not-a-real-program-7f3a")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_locate_misses_unknown_programs() {
        assert_eq!(SystemRunner.locate("definitely-not-a-real-program-7f3a"), None);
    }
}
