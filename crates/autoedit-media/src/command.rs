//! auto-editor command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use autoedit_models::EditOptions;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Binary name looked up on `PATH` when none is configured.
pub const DEFAULT_BINARY: &str = "auto-editor";

/// Default processing timeout (1 hour).
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Number of trailing stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 200;

/// Builder for auto-editor commands.
#[derive(Debug, Clone)]
pub struct AutoEditorCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// `--margin` value
    margin: Option<String>,
    /// `--edit` value
    edit: Option<String>,
    /// Extra arguments appended after the passthrough flags
    extra_args: Vec<String>,
    /// Whether to pass `--no-open`
    no_open: bool,
}

impl AutoEditorCommand {
    /// Create a new auto-editor command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            margin: None,
            edit: None,
            extra_args: Vec::new(),
            no_open: true,
        }
    }

    /// Set padding around cuts (e.g. `0.2sec`).
    pub fn margin(mut self, margin: impl Into<String>) -> Self {
        self.margin = Some(margin.into());
        self
    }

    /// Set the edit method (e.g. `audio` or `motion:threshold=0.02`).
    pub fn edit(mut self, edit: impl Into<String>) -> Self {
        self.edit = Some(edit.into());
        self
    }

    /// Apply passthrough options from a request.
    pub fn apply(mut self, options: &EditOptions) -> Self {
        if let Some(margin) = &options.margin {
            self = self.margin(margin.clone());
        }
        if let Some(edit) = options.edit_arg() {
            self = self.edit(edit);
        }
        self
    }

    /// Add a raw argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Keep auto-editor's default of opening the result in a viewer.
    pub fn allow_open(mut self) -> Self {
        self.no_open = false;
        self
    }

    /// Input file path.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Output file path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            self.input.to_string_lossy().to_string(),
            "-o".to_string(),
            self.output.to_string_lossy().to_string(),
        ];

        if let Some(ref margin) = self.margin {
            args.push("--margin".to_string());
            args.push(margin.clone());
        }

        if let Some(ref edit) = self.edit {
            args.push("--edit".to_string());
            args.push(edit.clone());
        }

        if self.no_open {
            args.push("--no-open".to_string());
        }

        args.extend(self.extra_args.clone());
        args
    }
}

/// Runner for auto-editor commands with timeout and stderr capture.
#[derive(Debug, Clone)]
pub struct AutoEditorRunner {
    /// Binary name or path
    binary: String,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for AutoEditorRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoEditorRunner {
    /// Create a runner for `auto-editor` on `PATH` with the default timeout.
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Use a different binary name or path.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Disable the timeout.
    pub fn without_timeout(mut self) -> Self {
        self.timeout_secs = None;
        self
    }

    /// Configured binary.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Configured timeout in seconds.
    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    /// Run an auto-editor command.
    pub async fn run(&self, cmd: &AutoEditorCommand) -> MediaResult<()> {
        check_tool(&self.binary)?;

        let args = cmd.build_args();
        debug!("Running {} {}", self.binary, args.join(" "));
        let started = Instant::now();

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::tool_failed("stderr was not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();

        // Drain stderr so the child never blocks on a full pipe
        let stderr_handle = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = reader.next_line().await {
                debug!(target: "autoedit::tool", "{}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        if let Err(MediaError::Timeout(_)) = result {
            // Grandchildren may still hold the pipe open
            stderr_handle.abort();
            return result;
        }
        let stderr_output = stderr_handle.await.unwrap_or_default();

        match result {
            Ok(()) => {
                info!(
                    input = %cmd.input().display(),
                    output = %cmd.output().display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "auto-editor finished"
                );
                Ok(())
            }
            Err(MediaError::ToolFailed {
                message, exit_code, ..
            }) => {
                let stderr = if stderr_output.trim().is_empty() {
                    None
                } else {
                    Some(stderr_output)
                };
                Err(MediaError::tool_failed(message, stderr, exit_code))
            }
            Err(e) => Err(e),
        }
    }

    /// Wait for child process with timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let wait_future = child.wait();

        let status = if let Some(timeout_secs) = self.timeout_secs {
            let timeout = tokio::time::timeout(Duration::from_secs(timeout_secs), wait_future);
            match timeout.await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        "{} timed out after {} seconds, killing process",
                        self.binary, timeout_secs
                    );
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout(timeout_secs));
                }
            }
        } else {
            wait_future.await?
        };

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::tool_failed(
                format!("{} exited with non-zero status", self.binary),
                None,
                status.code(),
            ))
        }
    }
}

/// Check if a tool is available on `PATH` (or at the given path).
pub fn check_tool(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::ToolNotFound(binary.to_string()))
}
