//! A scripted [`GitRunner`] for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::GitError;
use crate::process::{check_exit, ExecutionRequest, ExecutionResult, GitRunner, LiveProcess};

/// Records every request and answers from a queue of canned results. Once
/// the queue is empty every command succeeds with no output.
///
/// Canned results go through the same exit-code check as real processes, so
/// a scripted failure carries the classification git's text would get.
#[derive(Default)]
pub struct RecordingRunner {
    requests: Mutex<Vec<ExecutionRequest>>,
    responses: Mutex<VecDeque<ExecutionResult>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result for the next unanswered command.
    pub fn respond(self, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.push_response(exit_code, stdout, stderr);
        self
    }

    pub fn push_response(&self, exit_code: i32, stdout: &str, stderr: &str) {
        self.responses.lock().unwrap().push_back(ExecutionResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            error: None,
        });
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.requests().into_iter().map(|r| r.args).collect()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn answer(&self, request: &ExecutionRequest) -> ExecutionResult {
        let mut stored = request.clone();
        stored.live_output = None;
        self.requests.lock().unwrap().push(stored);
        self.responses.lock().unwrap().pop_front().unwrap_or_default()
    }
}

#[async_trait]
impl GitRunner for RecordingRunner {
    async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult, GitError> {
        let result = self.answer(&request);
        if let Some(ref tx) = request.live_output {
            for line in result.stderr.lines() {
                let _ = tx.send(line.to_string());
            }
        }
        check_exit(&request.args, &request.success_exit_codes, result)
    }

    fn spawn(&self, request: ExecutionRequest) -> Result<LiveProcess, GitError> {
        let result = self.answer(&request);
        let (tx, rx) = mpsc::unbounded_channel();
        for line in result.stderr.lines() {
            let _ = tx.send(line.to_string());
        }
        drop(tx);
        let completion = tokio::spawn(async move {
            check_exit(&request.args, &request.success_exit_codes, result)
        });
        Ok(LiveProcess::from_parts(rx, completion))
    }
}
