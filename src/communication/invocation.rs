//! Remote command invocation: the call descriptor and the pending result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationParameter {
    pub type_name: String,
    pub value: serde_json::Value,
}

impl InvocationParameter {
    pub fn new(type_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }
}

/// Serialized description of a call to a member of a remote command set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInvocation {
    pub command_set: String,
    pub member_name: String,
    #[serde(default)]
    pub parameters: Vec<InvocationParameter>,
}

impl MethodInvocation {
    pub fn new(
        command_set: impl Into<String>,
        member_name: impl Into<String>,
        parameters: Vec<InvocationParameter>,
    ) -> Self {
        Self {
            command_set: command_set.into(),
            member_name: member_name.into(),
            parameters,
        }
    }

    pub fn parameter_types(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.type_name.as_str()).collect()
    }
}

impl fmt::Display for MethodInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.command_set, self.member_name)
    }
}

/// What a command produced: nothing beyond completion, or a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum CommandResult {
    Ack,
    Value(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Completed(CommandResult),
    Faulted(String),
    Canceled,
}

type Continuation = Box<dyn FnOnce(&CommandOutcome) + Send>;

#[derive(Default)]
struct TaskState {
    outcome: Option<CommandOutcome>,
    continuations: Vec<Continuation>,
}

/// A command execution that finishes at some later point, on any thread.
///
/// Continuations run inline on the thread that completes the task, or right away
/// on the registering thread when the task has already finished.
#[derive(Clone, Default)]
pub struct CommandTask {
    state: Arc<Mutex<TaskState>>,
}

impl fmt::Debug for CommandTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTask")
            .field("outcome", &self.outcome())
            .finish()
    }
}

impl CommandTask {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn completed(outcome: CommandOutcome) -> Self {
        let task = Self::pending();
        task.complete(outcome);
        task
    }

    /// A finished task carrying the result of a synchronous command body.
    pub fn from_result(result: anyhow::Result<CommandResult>) -> Self {
        match result {
            Ok(value) => Self::completed(CommandOutcome::Completed(value)),
            Err(e) => Self::completed(CommandOutcome::Faulted(format!("{e:#}"))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Finishes the task. Returns `false` if it had already finished.
    pub fn complete(&self, outcome: CommandOutcome) -> bool {
        let continuations = {
            let mut state = self.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.continuations)
        };
        for continuation in continuations {
            continuation(&outcome);
        }
        true
    }

    pub fn cancel(&self) -> bool {
        self.complete(CommandOutcome::Canceled)
    }

    pub fn outcome(&self) -> Option<CommandOutcome> {
        self.lock().outcome.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().outcome.is_some()
    }

    /// Runs `continuation` exactly once, when the task finishes.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&CommandOutcome) + Send + 'static,
    {
        let finished = {
            let mut state = self.lock();
            if state.outcome.is_none() {
                state.continuations.push(Box::new(continuation));
                return;
            }
            state.outcome.clone()
        };
        if let Some(outcome) = finished {
            continuation(&outcome);
        }
    }
}
