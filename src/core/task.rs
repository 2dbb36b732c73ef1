// ─── Task Tree ───
// Explicit per-node state machine for an install run. Leaves settle from the
// work they ran; groups settle from their children.

use std::fmt;

use serde::Serialize;

use crate::core::error::{InstallError, InstallResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// A node starts once and settles once. Pending work may be cancelled
    /// without ever running.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One node of the task tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskNode {
    pub name: String,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaskNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TaskState::Pending,
            children: Vec::new(),
            error: None,
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<TaskNode>) -> Self {
        Self {
            children,
            ..Self::leaf(name)
        }
    }

    pub fn transition(&mut self, next: TaskState) -> InstallResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(InstallError::Other(format!(
                "Task '{}' cannot go from {} to {}",
                self.name, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    pub fn start(&mut self) -> InstallResult<()> {
        self.transition(TaskState::Running)
    }

    pub fn succeed(&mut self) -> InstallResult<()> {
        self.transition(TaskState::Succeeded)
    }

    pub fn fail(&mut self, error: impl Into<String>) -> InstallResult<()> {
        self.transition(TaskState::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> InstallResult<()> {
        self.transition(TaskState::Cancelled)
    }

    /// Cancel every node that never got to run.
    pub fn cancel_pending(&mut self) {
        for child in &mut self.children {
            child.cancel_pending();
        }
        if self.state == TaskState::Pending {
            self.state = TaskState::Cancelled;
        }
    }

    /// Settle a running group from its children: any failure fails it, then
    /// any cancellation cancels it, otherwise it succeeded.
    pub fn settle_from_children(&mut self) -> InstallResult<()> {
        if self.state == TaskState::Pending {
            self.start()?;
        }
        let states: Vec<TaskState> = self.children.iter().map(|c| c.state).collect();
        if states.contains(&TaskState::Failed) {
            let failed = states.iter().filter(|s| **s == TaskState::Failed).count();
            self.fail(format!("{} of {} subtasks failed", failed, states.len()))
        } else if states.iter().any(|s| !s.is_terminal() || *s == TaskState::Cancelled) {
            self.cancel()
        } else {
            self.succeed()
        }
    }

    pub fn find(&self, name: &str) -> Option<&TaskNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn leaves(&self) -> Vec<&TaskNode> {
        if self.children.is_empty() {
            return vec![self];
        }
        self.children.iter().flat_map(|c| c.leaves()).collect()
    }
}
