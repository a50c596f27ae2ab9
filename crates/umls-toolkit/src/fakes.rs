//! Scripted stand-in for the toolkit (testing only)
//!
//! `ScriptedInvoker` answers each [`ToolCommand`] through a caller-supplied
//! closure and records every command it receives, so tests can assert on
//! what would have been spawned without touching a database.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{Script, ToolCommand};
use crate::runner::{InvocationResult, ToolInvoker};
use crate::Result;

type Responder = Box<dyn Fn(&ToolCommand) -> Result<InvocationResult> + Send + Sync>;

/// Invoker that replies from a closure and keeps a call log.
pub struct ScriptedInvoker {
    responder: Responder,
    calls: Mutex<Vec<ToolCommand>>,
}

impl ScriptedInvoker {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ToolCommand) -> Result<InvocationResult> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with the same stdout to every command.
    pub fn constant(stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        Self::new(move |cmd| Ok(InvocationResult::ok(cmd.script, stdout.clone())))
    }

    /// Reply with a non-zero exit to every command.
    pub fn failing(exit_code: i32, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        Self::new(move |cmd| Ok(InvocationResult::failed(cmd.script, exit_code, stderr.clone())))
    }

    /// Number of commands received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Commands received so far, in arrival order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands received for one script.
    pub fn calls_for(&self, script: Script) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.script == script)
            .collect()
    }
}

impl std::fmt::Debug for ScriptedInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedInvoker")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn invoke(&self, command: &ToolCommand) -> Result<InvocationResult> {
        self.calls.lock().unwrap().push(command.clone());
        (self.responder)(command)
    }
}
