//! Waiting queue for tasks that found no capacity.
//!
//! Tasks are appended at the tail and may be removed from any position.
//! The queue lock is never held while the fleet lock is being acquired.

use std::collections::VecDeque;

use fcas_id::TaskId;
use parking_lot::Mutex;

use crate::task::Task;

#[derive(Debug, Default)]
pub struct WaitingQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }

    /// Remove a task wherever it sits.
    pub fn remove(&self, id: TaskId) -> Option<Task> {
        let mut tasks = self.tasks.lock();
        let index = tasks.iter().position(|t| t.id() == id)?;
        tasks.remove(index)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.lock().iter().any(|t| t.id() == id)
    }

    /// Copy of the queue, front to back.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}
