//! Invocation of the external project-file generator

use super::{ReconcileError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long to wait for the output pipes to drain after the process is gone
const PIPE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorStatus {
    /// Exit code, `None` if the process was terminated by a signal
    Exited(Option<i32>),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    pub status: GeneratorStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl GeneratorOutput {
    pub fn success(&self) -> bool {
        self.status == GeneratorStatus::Exited(Some(0))
    }
}

/// Runs the descriptor-regeneration tool
#[async_trait]
pub trait GeneratorInvoker: Send + Sync {
    async fn invoke(&self, timeout: Duration) -> Result<GeneratorOutput>;
}

/// Generator run as a child process with fixed arguments
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { program: program.into(), args, working_dir: None }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl GeneratorInvoker for CommandGenerator {
    async fn invoke(&self, timeout: Duration) -> Result<GeneratorOutput> {
        info!("Running generator: {}", self.command_line());
        let started = Instant::now();

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        #[cfg(windows)]
        command.creation_flags(0x0800_0000); // CREATE_NO_WINDOW

        let mut child = command
            .spawn()
            .map_err(|source| ReconcileError::GeneratorSpawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = tokio::spawn(drain(child.stdout.take()));
        let stderr = tokio::spawn(drain(child.stderr.take()));

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => GeneratorStatus::Exited(status.code()),
            Ok(Err(e)) => return Err(ReconcileError::GeneratorWait(e)),
            Err(_) => {
                warn!("Generator exceeded {:?}, terminating it", timeout);
                if let Err(e) = child.kill().await {
                    warn!("Failed to terminate generator: {}", e);
                }
                GeneratorStatus::TimedOut
            }
        };

        let output = GeneratorOutput {
            status,
            stdout: collect(stdout).await,
            stderr: collect(stderr).await,
            elapsed: started.elapsed(),
        };
        debug!("Generator finished with {:?} after {:?}", output.status, output.elapsed);
        Ok(output)
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        // A read error just truncates the captured output
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

async fn collect(task: JoinHandle<Vec<u8>>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(PIPE_GRACE, task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
        _ => {
            abort.abort();
            String::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandGenerator {
        CommandGenerator::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_successful_generator() {
        let generator = sh("echo generated; echo warn >&2");
        let output = generator.invoke(Duration::from_secs(10)).await.unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "generated");
        assert_eq!(output.stderr, "warn");
    }

    #[tokio::test]
    async fn test_failing_generator_reports_exit_code() {
        let output = sh("exit 3").invoke(Duration::from_secs(10)).await.unwrap();

        assert!(!output.success());
        assert_eq!(output.status, GeneratorStatus::Exited(Some(3)));
    }

    #[tokio::test]
    async fn test_timeout_kills_and_keeps_partial_output() {
        let generator = sh("echo started; exec sleep 30");
        let output = generator.invoke(Duration::from_millis(300)).await.unwrap();

        assert_eq!(output.status, GeneratorStatus::TimedOut);
        assert_eq!(output.stdout, "started");
        assert!(output.elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let generator = CommandGenerator::new("/nonexistent/generator-tool", vec![]);
        let result = generator.invoke(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ReconcileError::GeneratorSpawn { .. })));
    }

    #[tokio::test]
    async fn test_working_dir_is_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let generator = sh("pwd").with_working_dir(dir.path());
        let output = generator.invoke(Duration::from_secs(10)).await.unwrap();
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
