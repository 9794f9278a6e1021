//! Asynchronous git subprocess execution.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::lines::LineSplitter;
use super::signatures::{classify_output, KnownError};
use crate::errors::{CommandFailure, GitError};

/// Commands slower than this get their timing logged.
const SLOW_COMMAND: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// A single git invocation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Arguments passed to git (without the binary name).
    pub args: Vec<String>,
    /// Working directory for the process.
    pub working_dir: PathBuf,
    /// Written in full to stdin, which is then closed. `None` closes stdin
    /// immediately.
    pub stdin: Option<Vec<u8>>,
    /// Overlaid on the ambient environment; wins on key collision.
    pub env: BTreeMap<String, String>,
    /// Exit codes that count as success. Defaults to `{0}`.
    pub success_exit_codes: BTreeSet<i32>,
    /// Receives stderr line by line while the process runs.
    pub live_output: Option<mpsc::UnboundedSender<String>>,
}

impl ExecutionRequest {
    pub fn new<I, S>(args: I, working_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            working_dir: working_dir.into(),
            stdin: None,
            env: BTreeMap::new(),
            success_exit_codes: BTreeSet::from([0]),
            live_output: None,
        }
    }

    pub fn stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Replace the success set.
    pub fn success_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.success_exit_codes = codes.into_iter().collect();
        self
    }

    pub fn live_output(mut self, subscriber: mpsc::UnboundedSender<String>) -> Self {
        self.live_output = Some(subscriber);
        self
    }

    /// `git <args>` for logs.
    pub fn display_command(&self) -> String {
        format!("git {}", self.args.join(" "))
    }
}

/// The outcome of a finished git process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Set only when the exit code was outside the success set.
    pub error: Option<KnownError>,
}

// ---------------------------------------------------------------------------
// Live output handle
// ---------------------------------------------------------------------------

/// A running git process whose stderr can be consumed line by line before
/// the final result is available.
///
/// Lines can be read only once; a fresh sequence requires a fresh process.
#[derive(Debug)]
pub struct LiveProcess {
    lines: mpsc::UnboundedReceiver<String>,
    completion: JoinHandle<Result<ExecutionResult, GitError>>,
}

impl LiveProcess {
    /// Assemble a handle from a line channel and a completion task. Used by
    /// alternative [`GitRunner`] implementations.
    pub fn from_parts(
        lines: mpsc::UnboundedReceiver<String>,
        completion: JoinHandle<Result<ExecutionResult, GitError>>,
    ) -> Self {
        Self { lines, completion }
    }

    /// Next stderr line, or `None` once the stream has closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Await process exit. Unread lines are discarded.
    pub async fn wait(self) -> Result<ExecutionResult, GitError> {
        match self.completion.await {
            Ok(result) => result,
            Err(join_err) => Err(GitError::IoError(std::io::Error::other(join_err))),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner seam
// ---------------------------------------------------------------------------

/// Executes git invocations. [`GitProcess`] is the real implementation;
/// tests substitute recording fakes.
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run to completion, buffering both streams.
    async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult, GitError>;

    /// Launch and return a live handle. Any subscriber already set on the
    /// request is replaced by the handle's own channel.
    fn spawn(&self, request: ExecutionRequest) -> Result<LiveProcess, GitError>;
}

/// Spawns the real git binary.
#[derive(Debug, Clone)]
pub struct GitProcess {
    binary: PathBuf,
    /// Applied to every invocation beneath the request's own overlay.
    base_env: BTreeMap<String, String>,
}

impl Default for GitProcess {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitProcess {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            base_env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.base_env = env;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn launch(&self, request: &ExecutionRequest) -> Result<Child, GitError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&request.args)
            .current_dir(&request.working_dir)
            .envs(&self.base_env)
            .envs(&request.env)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(
            cmd = %request.display_command(),
            cwd = %request.working_dir.display(),
            "running git command"
        );

        cmd.spawn().map_err(|source| GitError::Launch {
            program: self.binary.display().to_string(),
            working_dir: request.working_dir.clone(),
            source,
        })
    }
}

#[async_trait]
impl GitRunner for GitProcess {
    async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult, GitError> {
        let child = self.launch(&request)?;
        collect(child, request).await
    }

    fn spawn(&self, mut request: ExecutionRequest) -> Result<LiveProcess, GitError> {
        let (tx, rx) = mpsc::unbounded_channel();
        request.live_output = Some(tx);
        let child = self.launch(&request)?;
        let completion = tokio::spawn(collect(child, request));
        Ok(LiveProcess::from_parts(rx, completion))
    }
}

/// Drive a launched child to exit: feed stdin, drain both pipes
/// concurrently, then apply the success-code check.
async fn collect(mut child: Child, request: ExecutionRequest) -> Result<ExecutionResult, GitError> {
    let started = Instant::now();

    let stdin_pipe = child.stdin.take();
    let payload = request.stdin.clone();
    let write_stdin = async move {
        if let (Some(mut pipe), Some(payload)) = (stdin_pipe, payload) {
            pipe.write_all(&payload).await?;
            pipe.shutdown().await?;
        }
        Ok::<(), std::io::Error>(())
    };

    let stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
    let stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

    let (written, stdout, stderr) = tokio::join!(
        write_stdin,
        read_all(stdout_pipe, None),
        read_all(stderr_pipe, request.live_output.clone()),
    );

    if let Err(e) = written {
        // git may exit before consuming its input; the exit code tells the story.
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            warn!(cmd = %request.display_command(), "git closed stdin before reading all input");
        } else {
            return Err(GitError::IoError(e));
        }
    }

    let stdout = stdout?;
    let stderr = stderr?;
    let status = child.wait().await?;

    let elapsed = started.elapsed();
    if elapsed > SLOW_COMMAND {
        debug!(
            cmd = %request.display_command(),
            elapsed_ms = elapsed.as_millis() as u64,
            "git command finished"
        );
    }

    let result = ExecutionResult {
        exit_code: status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        error: None,
    };

    check_exit(&request.args, &request.success_exit_codes, result)
}

/// Read a pipe to the end. With a subscriber, completed lines are forwarded
/// as they arrive.
async fn read_all<R>(
    mut pipe: R,
    subscriber: Option<mpsc::UnboundedSender<String>>,
) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut splitter = LineSplitter::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        captured.extend_from_slice(&chunk[..n]);
        if let Some(ref tx) = subscriber {
            for line in splitter.push(&chunk[..n]) {
                // A dropped receiver only means nobody is watching anymore.
                let _ = tx.send(line);
            }
        }
    }

    if let Some(ref tx) = subscriber {
        if let Some(line) = splitter.finish() {
            let _ = tx.send(line);
        }
    }

    Ok(captured)
}

/// Accept the result if its exit code is in `success`; otherwise classify
/// the output and fail with everything that was captured.
pub fn check_exit(
    args: &[String],
    success: &BTreeSet<i32>,
    mut result: ExecutionResult,
) -> Result<ExecutionResult, GitError> {
    if success.contains(&result.exit_code) {
        return Ok(result);
    }

    let kind = classify_output(&result.stderr, &result.stdout);
    result.error = kind;

    warn!(
        cmd = %format!("git {}", args.join(" ")),
        exit_code = result.exit_code,
        classified = ?kind,
        stdout = %result.stdout.trim(),
        stderr = %result.stderr.trim(),
        "git exited with an unexpected code"
    );

    Err(CommandFailure {
        args: args.to_vec(),
        result,
        kind,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            error: None,
        }
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_request_defaults() {
        let req = ExecutionRequest::new(["status"], "/tmp");
        assert_eq!(req.success_exit_codes, BTreeSet::from([0]));
        assert!(req.stdin.is_none());
        assert!(req.env.is_empty());
        assert_eq!(req.display_command(), "git status");
    }

    #[test]
    fn test_check_exit_accepts_configured_codes() {
        let args = vec!["merge-base".to_string()];
        let codes = BTreeSet::from([0, 1, 128]);
        for code in [0, 1, 128] {
            let out = check_exit(&args, &codes, result(code, "", "fatal: bad revision 'x'")).unwrap();
            assert_eq!(out.exit_code, code);
            assert_eq!(out.error, None, "success codes are never classified");
        }
    }

    #[test]
    fn test_check_exit_rejects_other_codes_and_keeps_output() {
        let args = vec!["rebase".to_string(), "--continue".to_string()];
        let codes = BTreeSet::from([0]);
        let err = check_exit(
            &args,
            &codes,
            result(1, "You must edit all merge conflicts and then\nmark them as resolved using git add\n", ""),
        )
        .unwrap_err();

        match err {
            GitError::Command(failure) => {
                assert_eq!(failure.args, args);
                assert_eq!(failure.result.exit_code, 1);
                assert!(failure.result.stdout.contains("You must edit"));
                assert_eq!(failure.kind, Some(KnownError::UnresolvedConflicts));
                assert_eq!(failure.result.error, Some(KnownError::UnresolvedConflicts));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_exit_unclassified_failure() {
        let err = check_exit(&["x".into()], &BTreeSet::from([0]), result(2, "", "weird")).unwrap_err();
        assert!(matches!(err, GitError::Command(ref f) if f.kind.is_none()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_launch_error() {
        let runner = GitProcess::new("/nonexistent/bin/git-does-not-exist");
        let err = runner
            .run(ExecutionRequest::new(["--version"], std::env::temp_dir()))
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::Launch { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_invalid_working_dir_is_a_launch_error() {
        if !git_available() {
            eprintln!("SKIPPED: git not found in PATH");
            return;
        }
        let err = GitProcess::default()
            .run(ExecutionRequest::new(["--version"], "/nonexistent/working/dir"))
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::Launch { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_stdin_is_delivered_and_output_captured() {
        if !git_available() {
            eprintln!("SKIPPED: git not found in PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let out = GitProcess::default()
            .run(
                ExecutionRequest::new(["hash-object", "--stdin"], dir.path())
                    .stdin("hello\n"),
            )
            .await
            .unwrap();
        // Well-known blob id for "hello\n".
        assert_eq!(out.stdout.trim(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_env_overlay_wins() {
        if !git_available() {
            eprintln!("SKIPPED: git not found in PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut base = BTreeMap::new();
        base.insert("GIT_CONFIG_COUNT".to_string(), "1".to_string());
        base.insert("GIT_CONFIG_KEY_0".to_string(), "gitorch.marker".to_string());
        base.insert("GIT_CONFIG_VALUE_0".to_string(), "base".to_string());

        let out = GitProcess::default()
            .with_env(base)
            .run(
                ExecutionRequest::new(["config", "--get", "gitorch.marker"], dir.path())
                    .env("GIT_CONFIG_VALUE_0", "overlay"),
            )
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "overlay");
    }

    #[tokio::test]
    async fn test_failure_carries_classification() {
        if !git_available() {
            eprintln!("SKIPPED: git not found in PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let err = GitProcess::default()
            .run(ExecutionRequest::new(["status"], dir.path()).env("GIT_CEILING_DIRECTORIES", dir.path().parent().unwrap().to_string_lossy()))
            .await
            .unwrap_err();
        assert_eq!(err.known_error(), Some(KnownError::NotAGitRepository));
        assert_eq!(err.result().map(|r| r.exit_code), Some(128));
    }

    #[tokio::test]
    async fn test_live_lines_arrive_before_completion() {
        if !git_available() {
            eprintln!("SKIPPED: git not found in PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        // `git hash-object` with a missing file writes one line to stderr.
        let mut live = GitProcess::default()
            .spawn(
                ExecutionRequest::new(["hash-object", "does-not-exist"], dir.path())
                    .success_codes([0, 128]),
            )
            .unwrap();

        let mut lines = Vec::new();
        while let Some(line) = live.next_line().await {
            lines.push(line);
        }
        let result = live.wait().await.unwrap();
        assert_eq!(result.exit_code, 128);
        assert!(!lines.is_empty());
        assert!(result.stderr.contains(&lines[0]));
    }
}
