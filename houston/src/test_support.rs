//! Test-only collaborators with scripted behaviour.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use reqwest::StatusCode;

use crate::core::types::{Choice, CompletionRequest, CompletionResponse, Usage};
use crate::io::cmd::{CmdRunner, CommandResult};
use crate::io::completion::{Completer, TransportError};
use crate::io::init::{HoustonPaths, init_home};

/// A response with a single choice carrying `text`.
pub fn response(text: &str) -> CompletionResponse {
    CompletionResponse {
        id: "cmpl-test".to_string(),
        object: "text_completion".to_string(),
        created: 0,
        model: "test-model".to_string(),
        choices: vec![Choice {
            text: text.to_string(),
            index: 0,
            finish_reason: Some("stop".to_string()),
        }],
        usage: Usage::default(),
    }
}

type Scripted = Result<CompletionResponse, (StatusCode, String)>;

/// Completer that replays queued responses and records the prompts it saw.
///
/// Once the queue is empty every call fails with a 500 status.
pub struct ScriptedCompleter {
    queue: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    pub fn new(texts: &[&str]) -> Self {
        Self::from_queue(texts.iter().map(|text| Ok(response(text))).collect())
    }

    /// Answers once with a response that has no choices.
    pub fn empty_choices() -> Self {
        let mut empty = response("");
        empty.choices.clear();
        Self::from_queue(VecDeque::from([Ok(empty)]))
    }

    /// Answers once with a non-success status.
    pub fn failing(status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::from_queue(VecDeque::from([Err((status, body.to_string()))]))
    }

    fn from_queue(queue: VecDeque<Scripted>) -> Self {
        Self {
            queue: Mutex::new(queue),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl Completer for ScriptedCompleter {
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        let next = self
            .queue
            .lock()
            .map_err(|_| TransportError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "scripted completer poisoned".to_string(),
            })?
            .pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err((status, body))) => Err(TransportError::Status { status, body }),
            None => Err(TransportError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "no scripted response left".to_string(),
            }),
        }
    }
}

/// Command runner answering from a fixed table and recording every call.
///
/// Unknown commands fail to launch.
#[derive(Default)]
pub struct MapCmdRunner {
    results: HashMap<String, CommandResult>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl MapCmdRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, command: &str, result: CommandResult) -> Self {
        self.results.insert(command.to_string(), result);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl CmdRunner for MapCmdRunner {
    fn run(&self, command: &str, args: &[&str]) -> Result<CommandResult> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((
                command.to_string(),
                args.iter().map(|arg| arg.to_string()).collect(),
            ));
        }
        self.results
            .get(command)
            .cloned()
            .ok_or_else(|| anyhow!("{command}: command not found"))
    }
}

/// An initialized Houston home inside a temporary directory.
pub struct TestHome {
    temp: tempfile::TempDir,
    pub paths: HoustonPaths,
}

impl TestHome {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = HoustonPaths::new(temp.path().join("houston"));
        init_home(&paths)?;
        Ok(Self { temp, paths })
    }

    /// Root of the temporary directory, outside the home.
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Append a trust pattern.
    pub fn trust(&self, pattern: &str) -> Result<()> {
        let mut list = fs::read_to_string(&self.paths.trust_path)?;
        list.push_str(pattern);
        list.push('\n');
        fs::write(&self.paths.trust_path, list)?;
        Ok(())
    }

    /// Write the named context `<name>.ctxt`.
    pub fn write_context(&self, name: &str, content: &str) -> Result<()> {
        fs::write(self.paths.named_context(name), content)?;
        Ok(())
    }
}
