// Staged edits of a single task

use crate::backend::Backend;
use crate::models::{Task, TaskId};
use crate::store::{Change, Store};
use chrono::{NaiveDate, NaiveTime};
use eyre::Result;
use tracing::debug;

/// A task being edited
///
/// Owned by the view, not the store: holding one is the "editing" state, and
/// `commit` or `cancel` are the only ways out. Nothing reaches the store until
/// `commit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    id: TaskId,
    pub text: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl EditSession {
    /// Start editing `id` with its current values as the draft, `None` if unknown
    pub fn begin<B: Backend>(store: &Store<B>, id: TaskId) -> Option<Self> {
        let task = store.get(id)?;
        debug!(id, "edit: begin");
        Some(Self::from_task(task))
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            text: task.text.clone(),
            date: task.date,
            time: task.time,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Apply the draft through `Store::update`
    ///
    /// A blank draft comes back as `Change::Rejected` and leaves the task as it was.
    pub fn commit<B: Backend>(self, store: &mut Store<B>) -> Result<Change> {
        debug!(id = self.id, "edit: commit");
        store.update(self.id, &self.text, self.date, self.time)
    }

    /// Drop the draft
    pub fn cancel(self) {
        debug!(id = self.id, "edit: cancel");
    }
}
