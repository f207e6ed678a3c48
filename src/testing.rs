//! Test doubles shared by the stage tests.

use std::sync::Mutex;

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::runner::{CommandOutput, CommandRunner, Invocation};

type Responder = Box<dyn Fn(&Invocation, usize) -> Result<CommandOutput> + Send + Sync>;

/// Records every invocation and answers from a closure that also receives
/// the zero-based call index.
pub struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    respond: Responder,
}

impl FakeRunner {
    pub fn with<F>(respond: F) -> Self
    where
        F: Fn(&Invocation, usize) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Every call exits 0.
    pub fn ok() -> Self {
        Self::with(|_, _| Ok(exit(0)))
    }

    /// The first `n` calls exit 1, later ones exit 0.
    pub fn failing_first(n: usize) -> Self {
        Self::with(move |_, i| Ok(if i < n { exit(1) } else { exit(0) }))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations rendered as command lines, for compact assertions.
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::display).collect()
    }
}

impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(invocation.clone());
            calls.len() - 1
        };
        (self.respond)(invocation, index)
    }
}

pub fn exit(code: i32) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: if code == 0 { String::new() } else { "failed".to_string() },
    }
}

/// Three attempts, no real waiting.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
        jitter_ms: 0,
    }
}
