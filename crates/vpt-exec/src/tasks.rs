//! Async task manager: a thread-safe, task-id-keyed map of background
//! work with progress updates and idempotent completion, backing
//! long-running HTTP requests. Grounded in the same "concurrent map of
//! entries tracked by id, with a lifecycle status" shape used elsewhere
//! in the workspace for tracking live work, generalized from a
//! session/subagent key to a task id and from an open-ended status set to
//! the four-state lifecycle the design calls for.

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use vpt_core::model::{TaskId, TaskRecord, TaskStatus};

#[derive(Default)]
pub struct TaskManager {
    tasks: DashMap<TaskId, TaskRecord>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_task(&self, command: impl Into<String>, params: serde_json::Value) -> TaskId {
        let id = TaskId::new_uuid();
        self.tasks
            .insert(id.clone(), TaskRecord::new(id.clone(), command, params));
        id
    }

    /// Replaces the progress structure atomically. A no-op if the task
    /// doesn't exist or has already reached a terminal status.
    pub fn update_task_progress(&self, task_id: &TaskId, progress: serde_json::Value) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            if entry.status == TaskStatus::Started || entry.status == TaskStatus::Running {
                entry.status = TaskStatus::Running;
                entry.progress = progress;
            }
        }
    }

    /// Transitions to `completed` (no error) or `failed` (error present).
    /// Idempotent: once a task has reached a terminal status, later calls
    /// are no-ops and the original result/error is preserved.
    pub fn complete_task(
        &self,
        task_id: &TaskId,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            if entry.status == TaskStatus::Completed || entry.status == TaskStatus::Failed {
                return;
            }
            entry.status = if error.is_some() {
                TaskStatus::Failed
            } else {
                TaskStatus::Completed
            };
            entry.result = result;
            entry.error = error;
            entry.completed_at = Some(Utc::now());
        }
    }

    pub fn get_task(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.tasks.get(task_id).map(|e| e.clone())
    }

    /// Removes tasks older than `max_age`, called periodically by the
    /// server rather than on a dedicated timer.
    pub fn cleanup_old_tasks(&self, max_age: Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default();
        self.tasks.retain(|_, task| task.created_at >= cutoff);
    }
}
