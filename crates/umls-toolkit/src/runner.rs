//! Toolkit process execution.

use crate::command::{redact_args, Script, ToolCommand};
use crate::config::{ConnectionConfig, ToolkitConfig};
use crate::error::ToolkitError;
use crate::Result;
use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Captured output of one toolkit invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    /// Script that was run.
    pub script: Script,

    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl InvocationResult {
    /// Successful invocation with the given stdout.
    pub fn ok(script: Script, stdout: impl Into<String>) -> Self {
        Self {
            script,
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    /// Failed invocation with the given exit code and stderr.
    pub fn failed(script: Script, exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            script,
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    /// Whether the script exited cleanly.
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into [`ToolkitError::NonZeroExit`].
    pub fn into_success(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(ToolkitError::NonZeroExit {
                script: self.script.file_name().to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Anything that can answer a [`ToolCommand`].
///
/// The production implementation is [`ProcessInvoker`]; tests inject
/// [`crate::fakes::ScriptedInvoker`].
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run the command and capture its output.
    ///
    /// A non-zero exit is reported in the result, not as an error; only
    /// failures to run at all are errors.
    async fn invoke(&self, command: &ToolCommand) -> Result<InvocationResult>;
}

/// Runs toolkit scripts as child processes.
///
/// Every invocation opens its own database connection through the
/// toolkit; nothing is pooled or shared between calls.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    connection: ConnectionConfig,
    toolkit: ToolkitConfig,
}

impl ProcessInvoker {
    /// Validates the connection settings up front.
    pub fn new(connection: ConnectionConfig, toolkit: ToolkitConfig) -> Result<Self> {
        connection.validate()?;
        Ok(Self {
            connection,
            toolkit,
        })
    }

    pub fn toolkit(&self) -> &ToolkitConfig {
        &self.toolkit
    }

    /// Check the interpreter and script exist before spawning.
    fn preflight(&self, script: Script) -> Result<()> {
        let script_path = self.toolkit.script_path(script.file_name());
        if !script_path.is_file() {
            return Err(ToolkitError::ToolNotFound(
                script_path.display().to_string(),
            ));
        }
        if let Some(perl) = &self.toolkit.perl_bin {
            // Bare names are resolved through PATH at spawn time.
            if perl.components().count() > 1 && !perl.is_file() {
                return Err(ToolkitError::ToolNotFound(perl.display().to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    #[instrument(skip_all, fields(script = %command.script, pairs = command.input.len()))]
    async fn invoke(&self, command: &ToolCommand) -> Result<InvocationResult> {
        self.preflight(command.script)?;

        // Held until the child exits; removed on drop.
        let infile = match command.input.infile_contents() {
            Some(contents) => {
                let mut file = tempfile::Builder::new()
                    .prefix("umls-sim-")
                    .suffix(".txt")
                    .tempfile()?;
                file.write_all(contents.as_bytes())?;
                file.flush()?;
                Some(file)
            }
            None => None,
        };

        let program = command.program(&self.toolkit);
        let args = command.args(
            &self.connection,
            &self.toolkit,
            infile.as_ref().map(|f| f.path()),
        );
        debug!("{} {}", program.display(), redact_args(&args));

        let start = Instant::now();
        let child = Command::new(&program)
            .args(&args)
            .current_dir(self.toolkit.script_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolkitError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let output = if self.toolkit.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.toolkit.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.toolkit.timeout_secs, "toolkit timed out, killed");
                ToolkitError::TimedOut {
                    script: command.script.file_name().to_string(),
                    timeout_secs: self.toolkit.timeout_secs,
                }
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        info!(exit_code, duration_ms, "toolkit finished");
        debug!(%stdout, "toolkit stdout");
        if !stderr.trim().is_empty() {
            debug!(%stderr, "toolkit stderr");
        }

        drop(infile);

        Ok(InvocationResult {
            script: command.script,
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}

/// Whether all toolkit scripts are present in the configured directory.
pub fn is_toolkit_available(toolkit: &ToolkitConfig) -> bool {
    Script::ALL
        .iter()
        .all(|s| toolkit.script_path(s.file_name()).is_file())
}
