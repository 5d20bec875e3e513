//! Status - タスクテーブルの状態別件数

use serde::{Deserialize, Serialize};

use crate::domain::TaskStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub processing: usize,
    pub succeeded: usize,
}

impl TaskCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Processing => self.processing += 1,
            TaskStatus::Success => self.succeeded += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.processing + self.succeeded
    }
}
