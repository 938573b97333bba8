//! Sandboxed script execution.
//!
//! Runs a generated script as an isolated child process: the script is
//! materialized to a transient file (removed on every exit path), the
//! child gets CPU-time and address-space ceilings before it executes any
//! script code, stdout/stderr are captured in full, and a wall-clock
//! timeout kills the child rather than leaving it running. Nothing in
//! here raises past the harness boundary for child failures; those come
//! back as structured [`ExecutionResult`]s.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::error::Result;

/// Marker the child writes to stderr when a resource limit could not be
/// applied; the parent turns it into a degradation warning.
const LIMIT_FAILURE_MARKER: &str = "cellscript-sandbox: resource limit could not be applied";

/// Resource ceilings for one execution.
#[derive(Clone, Copy, Debug)]
pub struct SandboxLimits {
    /// Wall-clock limit enforced by the parent.
    pub timeout: Duration,
    /// CPU-time limit applied to the child (RLIMIT_CPU).
    pub cpu_seconds: u64,
    /// Address-space limit applied to the child (RLIMIT_AS).
    pub memory_bytes: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        SandboxLimits {
            timeout: Duration::from_secs(30),
            cpu_seconds: 30,
            memory_bytes: 100 * 1024 * 1024,
        }
    }
}

/// How an execution ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    TimedOut,
    Failed(String),
}

/// Captured result of one sandboxed run.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// None when the child was killed (timeout) or died to a signal.
    pub exit_code: Option<i32>,
    pub outcome: ExecutionOutcome,
    /// Degradations (e.g. limits unsupported), not failures.
    pub warnings: Vec<String>,
    /// Where the transient script lived; already removed by the time the
    /// result is returned.
    pub script_path: PathBuf,
}

/// A script interpreter to execute under resource limits.
pub struct Sandbox {
    interpreter: PathBuf,
    args: Vec<String>,
    suffix: String,
}

impl Sandbox {
    pub fn new(interpreter: impl Into<PathBuf>, args: Vec<String>, suffix: &str) -> Sandbox {
        Sandbox {
            interpreter: interpreter.into(),
            args,
            suffix: suffix.to_string(),
        }
    }

    /// The default sandbox: this binary's own `run` subcommand as the
    /// Rhai interpreter.
    pub fn for_current_exe() -> Result<Sandbox> {
        Ok(Sandbox::new(
            std::env::current_exe()?,
            vec!["run".to_string()],
            ".rhai",
        ))
    }

    /// Execute `script` under `limits`. Child failures (non-zero exit,
    /// timeout, spawn error) come back as structured outcomes; only
    /// materializing the script file can error here.
    pub fn run_script(&self, script: &str, limits: &SandboxLimits) -> Result<ExecutionResult> {
        let mut file = tempfile::Builder::new()
            .prefix("cellscript-")
            .suffix(&self.suffix)
            .tempfile()?;
        file.write_all(script.as_bytes())?;
        file.flush()?;
        let script_path = file.path().to_path_buf();

        let mut warnings = Vec::new();
        let mut command = Command::new(&self.interpreter);
        command
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        apply_limits(&mut command, limits, &mut warnings);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Ok(ExecutionResult {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                    outcome: ExecutionOutcome::Failed(format!(
                        "failed to spawn {}: {}",
                        self.interpreter.display(),
                        e
                    )),
                    warnings,
                    script_path,
                });
            }
        };

        // Drain both pipes off-thread so a chatty child can't deadlock
        // against a full pipe buffer while we wait on it.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = match child.wait_timeout(limits.timeout)? {
            Some(status) => Some(status),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                None
            }
        };

        let stdout = join_reader(stdout_reader);
        let mut stderr = join_reader(stderr_reader);
        if stderr.contains(LIMIT_FAILURE_MARKER) {
            warnings.push(
                "sandbox ran without full resource limits (limit-setting failed in the child)"
                    .to_string(),
            );
            stderr = stderr
                .lines()
                .filter(|line| !line.contains(LIMIT_FAILURE_MARKER))
                .collect::<Vec<_>>()
                .join("\n");
        }

        let (exit_code, outcome) = match status {
            None => (None, ExecutionOutcome::TimedOut),
            Some(status) if status.success() => (status.code(), ExecutionOutcome::Completed),
            Some(status) => {
                let detail = match status.code() {
                    Some(code) => format!("script exited with status {}: {}", code, stderr.trim()),
                    None => format!("script terminated by signal: {}", stderr.trim()),
                };
                (status.code(), ExecutionOutcome::Failed(detail))
            }
        };

        // `file` drops here, which removes the transient script on every
        // path through this function.
        Ok(ExecutionResult {
            stdout,
            stderr,
            exit_code,
            outcome,
            warnings,
            script_path,
        })
    }
}

#[cfg(unix)]
fn apply_limits(command: &mut Command, limits: &SandboxLimits, _warnings: &mut Vec<String>) {
    use std::os::unix::process::CommandExt;

    let cpu = limits.cpu_seconds as libc::rlim_t;
    let memory = limits.memory_bytes as libc::rlim_t;

    // Runs between fork and exec in the child; only async-signal-safe
    // calls are allowed, so failures are reported with a raw write(2).
    unsafe {
        command.pre_exec(move || {
            let cpu_limit = libc::rlimit {
                rlim_cur: cpu,
                rlim_max: cpu,
            };
            if libc::setrlimit(libc::RLIMIT_CPU, &cpu_limit) != 0 {
                report_limit_failure();
            }
            let mem_limit = libc::rlimit {
                rlim_cur: memory,
                rlim_max: memory,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &mem_limit) != 0 {
                report_limit_failure();
            }
            Ok(())
        });
    }
}

#[cfg(unix)]
fn report_limit_failure() {
    // No allocation: this runs between fork and exec.
    const MSG: &[u8] = b"cellscript-sandbox: resource limit could not be applied\n";
    unsafe {
        libc::write(2, MSG.as_ptr() as *const libc::c_void, MSG.len());
    }
}

#[cfg(not(unix))]
fn apply_limits(_command: &mut Command, _limits: &SandboxLimits, warnings: &mut Vec<String>) {
    warnings.push(
        "resource limits are not supported on this platform; script runs without CPU/memory ceilings"
            .to_string(),
    );
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<String>> {
    source.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
