//! Network and checkout operations with progress reporting.
//!
//! With a sink, git is asked for `--progress`, its stderr is parsed by the
//! phase table for the command, and git-lfs is pointed at a scratch file via
//! `GIT_LFS_PROGRESS` that is tailed while the command runs. git's own events
//! are retitled with the operation's name, and no event moves the fraction
//! backwards, so a caller sees one continuous bar per command.

use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, Span};

use crate::errors::GitError;
use crate::process::{ExecutionRequest, ExecutionResult, GitRunner};
use crate::progress::{
    GitProgressParser, LfsProgressParser, ProgressEvent, ProgressParser, ProgressSink,
};
use crate::repository::Repository;

const LFS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Holds every fraction at or above the highest one already emitted.
struct MonotonicSink<'a> {
    inner: &'a mut dyn ProgressSink,
    floor: f64,
}

impl<'a> MonotonicSink<'a> {
    fn new(inner: &'a mut dyn ProgressSink) -> Self {
        Self { inner, floor: 0.0 }
    }
}

impl ProgressSink for MonotonicSink<'_> {
    fn emit(&mut self, mut event: ProgressEvent) {
        if let ProgressEvent::Progress { fraction, .. } = &mut event {
            if *fraction < self.floor {
                *fraction = self.floor;
            }
            self.floor = *fraction;
        }
        self.inner.emit(event);
    }
}

/// Follows the file git-lfs appends progress lines to. Only complete lines
/// are parsed until [`LfsTail::finish`].
struct LfsTail {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
    parser: LfsProgressParser,
}

impl LfsTail {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
            partial: Vec::new(),
            parser: LfsProgressParser::new(),
        }
    }

    async fn poll(&mut self, sink: &mut dyn ProgressSink) {
        let bytes = match read_from(&self.path, self.offset).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "LFS progress file unreadable");
                return;
            }
        };
        self.offset += bytes.len() as u64;
        self.partial.extend_from_slice(&bytes);

        while let Some(end) = self.partial.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=end).collect();
            self.parse_line(&line, sink);
        }
    }

    /// Read what is left, including a final line with no newline.
    async fn finish(mut self, sink: &mut dyn ProgressSink) {
        self.poll(sink).await;
        let rest = std::mem::take(&mut self.partial);
        self.parse_line(&rest, sink);
    }

    fn parse_line(&mut self, line: &[u8], sink: &mut dyn ProgressSink) {
        let line = String::from_utf8_lossy(line);
        if let Some(event) = self.parser.parse(line.trim_end()) {
            sink.emit(event);
        }
    }
}

async fn read_from(path: &Path, offset: u64) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

/// Presents every event from `inner` as progress on one titled operation,
/// carrying the last known fraction across lines that do not move it.
struct TitledParser {
    title: String,
    inner: GitProgressParser,
    last_fraction: f64,
}

impl ProgressParser for TitledParser {
    fn parse(&mut self, line: &str) -> Option<ProgressEvent> {
        let description = match self.inner.parse(line)? {
            ProgressEvent::Progress {
                description,
                fraction,
                ..
            } => {
                self.last_fraction = fraction;
                description
            }
            ProgressEvent::Context { text, .. } => text,
        };
        Some(ProgressEvent::progress(
            self.title.clone(),
            description,
            self.last_fraction,
        ))
    }
}

/// Runs commands that talk to remotes or rewrite the working tree.
pub struct RemoteOps {
    runner: Arc<dyn GitRunner>,
    /// Forwarded unchanged to every command (askpass, prompt suppression).
    env: BTreeMap<String, String>,
    span: Span,
}

impl RemoteOps {
    pub fn new(runner: Arc<dyn GitRunner>) -> Self {
        Self {
            runner,
            env: BTreeMap::new(),
            span: tracing::info_span!("remote"),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    #[instrument(parent = &self.span, skip(self, path, sink), fields(path = %path.display()))]
    pub async fn clone_repository(
        &self,
        url: &str,
        path: &Path,
        branch: Option<&str>,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<(), GitError> {
        let path_text = path.display().to_string();
        let mut args = vec!["clone".to_string(), "--recursive".to_string()];
        if sink.is_some() {
            args.push("--progress".into());
        }
        if let Some(branch) = branch {
            args.extend(["-b".to_string(), branch.to_string()]);
        }
        args.extend(["--".to_string(), url.to_string(), path_text.clone()]);

        // The target directory does not exist yet; run from its parent.
        let cwd = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        info!(url, "cloning");
        self.run_reporting(
            args,
            cwd,
            format!("Cloning into {path_text}"),
            GitProgressParser::clone_repository(),
            sink,
        )
        .await?;
        Ok(())
    }

    #[instrument(parent = &self.span, skip(self, repo, sink), fields(repo = %repo.path().display()))]
    pub async fn fetch(
        &self,
        repo: &Repository,
        remote: &str,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<(), GitError> {
        let mut args = vec!["fetch".to_string()];
        if sink.is_some() {
            args.push("--progress".into());
        }
        args.extend(["--prune".to_string(), remote.to_string()]);

        info!("fetching");
        self.run_reporting(
            args,
            repo.path(),
            format!("Fetching {remote}"),
            GitProgressParser::fetch(),
            sink,
        )
        .await?;
        Ok(())
    }

    #[instrument(parent = &self.span, skip(self, repo, sink), fields(repo = %repo.path().display()))]
    pub async fn pull(
        &self,
        repo: &Repository,
        remote: &str,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<(), GitError> {
        let mut args = vec!["pull".to_string(), "--ff".to_string()];
        if sink.is_some() {
            args.push("--progress".into());
        }
        args.push(remote.to_string());

        info!("pulling");
        self.run_reporting(
            args,
            repo.path(),
            format!("Pulling {remote}"),
            GitProgressParser::pull(),
            sink,
        )
        .await?;
        Ok(())
    }

    #[instrument(parent = &self.span, skip(self, repo, sink), fields(repo = %repo.path().display()))]
    pub async fn push(
        &self,
        repo: &Repository,
        remote: &str,
        branch: &str,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<(), GitError> {
        let mut args = vec!["push".to_string()];
        if sink.is_some() {
            args.push("--progress".into());
        }
        args.extend([remote.to_string(), branch.to_string()]);

        info!("pushing");
        self.run_reporting(
            args,
            repo.path(),
            format!("Pushing to {remote}"),
            GitProgressParser::push(),
            sink,
        )
        .await?;
        Ok(())
    }

    #[instrument(parent = &self.span, skip(self, repo, sink), fields(repo = %repo.path().display()))]
    pub async fn checkout(
        &self,
        repo: &Repository,
        branch: &str,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<(), GitError> {
        let mut args = vec!["checkout".to_string()];
        if sink.is_some() {
            args.push("--progress".into());
        }
        args.extend([branch.to_string(), "--".to_string()]);

        info!("checking out");
        self.run_reporting(
            args,
            repo.path(),
            format!("Checking out branch {branch}"),
            GitProgressParser::checkout(),
            sink,
        )
        .await?;
        Ok(())
    }

    async fn run_reporting(
        &self,
        args: Vec<String>,
        cwd: &Path,
        title: String,
        parser: GitProgressParser,
        sink: Option<&mut dyn ProgressSink>,
    ) -> Result<ExecutionResult, GitError> {
        let request = ExecutionRequest::new(args, cwd).envs(&self.env);

        let sink = match sink {
            Some(sink) => sink,
            None => return self.runner.run(request).await,
        };

        let lfs_file = tempfile::Builder::new()
            .prefix("gitorch-lfs-progress")
            .tempfile()?;
        let request = request.env(
            "GIT_LFS_PROGRESS",
            lfs_file.path().to_string_lossy().into_owned(),
        );

        let mut sink = MonotonicSink::new(sink);
        sink.emit(ProgressEvent::progress(title.clone(), "", 0.0));

        let mut parser = TitledParser {
            title,
            inner: parser,
            last_fraction: 0.0,
        };
        let mut tail = LfsTail::new(lfs_file.path());
        let mut ticker = tokio::time::interval(LFS_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut live = self.runner.spawn(request)?;
        loop {
            tokio::select! {
                line = live.next_line() => match line {
                    Some(line) => {
                        if let Some(event) = parser.parse(&line) {
                            sink.emit(event);
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => tail.poll(&mut sink).await,
            }
        }

        let result = live.wait().await;
        tail.finish(&mut sink).await;
        result
    }
}
