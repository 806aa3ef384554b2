// Task store with write-through persistence

use crate::backend::Backend;
use crate::codec;
use crate::filter::{self, FilterMode};
use crate::models::{Stats, Task, TaskId, now_ms};
use chrono::{NaiveDate, NaiveTime, SubsecRound, Utc};
use eyre::{Result, eyre};
use tracing::{debug, info, warn};

/// Outcome of a mutation addressed by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The collection changed and was written
    Applied,
    /// No task has that id; nothing changed
    NotFound,
    /// The new text was empty after trimming; nothing changed
    Rejected,
}

/// Canonical ordered task collection, newest first
///
/// Every successful mutation writes the whole collection back through the
/// codec before returning. If that write fails the in-memory change stands,
/// the store is marked dirty and the error is returned; the next successful
/// write (any mutation or `flush`) clears the flag.
pub struct Store<B: Backend> {
    backend: B,
    key: String,
    tasks: Vec<Task>,
    last_id: TaskId,
    dirty: bool,
    backup: Option<String>,
}

impl<B: Backend> Store<B> {
    /// Open a store over `backend`, loading whatever is stored under the default key
    pub fn open(backend: B) -> Result<Self> {
        Self::open_with_key(backend, codec::DEFAULT_KEY)
    }

    /// Open a store over `backend` using `key` for the collection
    pub fn open_with_key(mut backend: B, key: &str) -> Result<Self> {
        crate::backend::validate_key(key)?;
        let codec::Loaded { tasks, backup } = codec::load(&mut backend, key)?;
        let last_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);

        info!(key, count = tasks.len(), "Opened task store");

        Ok(Self {
            backend,
            key: key.to_string(),
            tasks,
            last_id,
            dirty: false,
            backup,
        })
    }

    /// Give the backend back, e.g. to reopen it in a test
    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// All tasks in display order (newest first)
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filtered(&self, mode: FilterMode) -> Vec<&Task> {
        filter::project(&self.tasks, mode)
    }

    pub fn stats(&self) -> Stats {
        Stats::of(&self.tasks)
    }

    /// Key where unreadable stored data was copied during open, if there was any
    pub fn backup_key(&self) -> Option<&str> {
        self.backup.as_deref()
    }

    /// True when the last write failed and memory is ahead of storage
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a task at the front of the list
    ///
    /// Returns `None` without touching storage when `text` is blank.
    pub fn add(&mut self, text: &str, date: Option<NaiveDate>, time: Option<NaiveTime>) -> Result<Option<Task>> {
        let text = text.trim();
        if text.is_empty() {
            debug!("add: rejected blank text");
            return Ok(None);
        }

        let id = self.next_id()?;
        // Millisecond precision, matching the stored ISO-8601 form
        let created_at = Utc::now().trunc_subsecs(3);
        let task = Task {
            id,
            text: text.to_string(),
            date,
            time,
            completed: false,
            created_at,
        };

        self.tasks.insert(0, task.clone());
        debug!(id, "add: created task");
        self.persist()?;
        Ok(Some(task))
    }

    /// Flip the completed flag of one task
    pub fn toggle(&mut self, id: TaskId) -> Result<Change> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "toggle: no such task");
            return Ok(Change::NotFound);
        };

        task.completed = !task.completed;
        debug!(id, completed = task.completed, "toggle: flipped");
        self.persist()?;
        Ok(Change::Applied)
    }

    /// Replace text, date and time of one task
    ///
    /// Id, creation time and completion are left alone. Blank text discards the edit.
    pub fn update(
        &mut self,
        id: TaskId,
        text: &str,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> Result<Change> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "update: no such task");
            return Ok(Change::NotFound);
        };

        let text = text.trim();
        if text.is_empty() {
            debug!(id, "update: rejected blank text");
            return Ok(Change::Rejected);
        }

        task.text = text.to_string();
        task.date = date;
        task.time = time;
        debug!(id, "update: edited");
        self.persist()?;
        Ok(Change::Applied)
    }

    /// Delete one task
    pub fn remove(&mut self, id: TaskId) -> Result<Change> {
        let Some(pos) = self.tasks.iter().position(|t| t.id == id) else {
            debug!(id, "remove: no such task");
            return Ok(Change::NotFound);
        };

        self.tasks.remove(pos);
        debug!(id, "remove: deleted");
        self.persist()?;
        Ok(Change::Applied)
    }

    /// Delete every completed task, returning how many went
    ///
    /// Nothing is written when there is nothing to clear.
    pub fn clear_completed(&mut self) -> Result<usize> {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        let removed = before - self.tasks.len();

        if removed == 0 {
            debug!("clear_completed: nothing to clear");
            return Ok(0);
        }

        debug!(removed, "clear_completed: cleared");
        self.persist()?;
        Ok(removed)
    }

    /// Write the collection again, typically after a failed write
    pub fn flush(&mut self) -> Result<()> {
        self.persist()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Millisecond clock, bumped past the last id so ids stay strictly increasing
    fn next_id(&mut self) -> Result<TaskId> {
        let floor = self
            .last_id
            .checked_add(1)
            .ok_or_else(|| eyre!("Task ids exhausted: last id is {}", self.last_id))?;
        let id = now_ms().max(floor);
        self.last_id = id;
        Ok(id)
    }

    fn persist(&mut self) -> Result<()> {
        match codec::save(&mut self.backend, &self.key, &self.tasks) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                warn!(key = %self.key, error = ?e, "Failed to persist tasks, keeping in-memory state");
                self.dirty = true;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileBackend, MemoryBackend};
    use eyre::eyre;
    use tempfile::TempDir;

    fn store() -> Store<MemoryBackend> {
        Store::open(MemoryBackend::new()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn time(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn stored_texts(store: &Store<MemoryBackend>) -> Vec<String> {
        let raw = store.backend().get(store.key()).unwrap().unwrap();
        let tasks: Vec<Task> = serde_json::from_str(&raw).unwrap();
        tasks.into_iter().map(|t| t.text).collect()
    }

    /// Backend that counts writes and can be told to fail them
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        writes: usize,
        fail: bool,
    }

    impl Backend for FlakyBackend {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.fail {
                return Err(eyre!("quota exceeded"));
            }
            self.writes += 1;
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_add_increments_total_and_pending() {
        let mut store = store();
        let task = store.add("  Buy milk  ", None, None).unwrap().unwrap();

        assert_eq!(task.text, "Buy milk");
        assert!(!task.completed);
        assert_eq!(
            store.stats(),
            Stats {
                total: 1,
                completed: 0,
                pending: 1
            }
        );
        assert_eq!(stored_texts(&store), vec!["Buy milk"]);
    }

    #[test]
    fn test_add_blank_is_noop() {
        let mut store = Store::open(FlakyBackend::default()).unwrap();
        assert!(store.add("", None, None).unwrap().is_none());
        assert!(store.add("   ", date(2026, 1, 1), None).unwrap().is_none());

        assert_eq!(store.stats(), Stats::default());
        assert_eq!(store.backend().writes, 0);
    }

    #[test]
    fn test_add_prepends_newest_first() {
        let mut store = store();
        store.add("A", None, None).unwrap();
        store.add("B", None, None).unwrap();

        let texts: Vec<&str> = store.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["B", "A"]);
        let all: Vec<&str> = store.filtered(FilterMode::All).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(all, vec!["B", "A"]);
    }

    #[test]
    fn test_ids_unique_and_increasing() {
        let mut store = store();
        let ids: Vec<TaskId> = (0..50)
            .map(|i| store.add(&format!("task {}", i), None, None).unwrap().unwrap().id)
            .collect();

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ids_stay_ahead_of_loaded_future_ids() {
        let mut backend = MemoryBackend::new();
        let future = now_ms() + 86_400_000;
        backend
            .set(
                codec::DEFAULT_KEY,
                &format!(r#"[{{"id":{},"text":"from the future","createdAt":"2026-01-01T00:00:00Z"}}]"#, future),
            )
            .unwrap();

        let mut store = Store::open(backend).unwrap();
        let task = store.add("now", None, None).unwrap().unwrap();
        assert_eq!(task.id, future + 1);
    }

    #[test]
    fn test_add_fails_cleanly_when_ids_exhausted() {
        let mut backend = FlakyBackend::default();
        backend
            .inner
            .set(
                codec::DEFAULT_KEY,
                &format!(r#"[{{"id":{},"text":"last","createdAt":"2026-01-01T00:00:00Z"}}]"#, i64::MAX),
            )
            .unwrap();

        let mut store = Store::open(backend).unwrap();
        assert!(store.add("one more", None, None).is_err());

        assert_eq!(store.stats().total, 1);
        assert_eq!(store.tasks()[0].id, i64::MAX);
        assert!(!store.is_dirty());
        assert_eq!(store.backend().writes, 0);
    }

    #[test]
    fn test_unreadable_record_is_kept_after_next_write() {
        let mut backend = MemoryBackend::new();
        backend
            .set(
                codec::DEFAULT_KEY,
                r#"[
                    {"id":2,"text":"good","date":"","time":"","completed":false,"createdAt":"2026-01-01T00:00:00Z"},
                    {"id":1,"text":"Pay rent","date":"next friday","time":"","completed":false,"createdAt":"2026-01-01T00:00:00Z"}
                ]"#,
            )
            .unwrap();

        let mut store = Store::open(backend).unwrap();
        let backup = store.backup_key().unwrap().to_string();
        store.add("new", None, None).unwrap();

        assert_eq!(stored_texts(&store), vec!["new", "good"]);
        let preserved = store.backend().get(&backup).unwrap().unwrap();
        assert!(preserved.contains("Pay rent"));
    }

    #[test]
    fn test_clean_open_has_no_backup() {
        let mut store = store();
        store.add("fine", None, None).unwrap();
        let reopened = Store::open(store.into_backend()).unwrap();
        assert_eq!(reopened.backup_key(), None);
    }

    #[test]
    fn test_toggle_is_involution() {
        let mut store = store();
        let id = store.add("Buy milk", None, None).unwrap().unwrap().id;

        assert_eq!(store.toggle(id).unwrap(), Change::Applied);
        assert!(store.get(id).unwrap().completed);
        assert_eq!(store.toggle(id).unwrap(), Change::Applied);
        assert!(!store.get(id).unwrap().completed);
    }

    #[test]
    fn test_toggle_unknown_id() {
        let mut store = Store::open(FlakyBackend::default()).unwrap();
        assert_eq!(store.toggle(42).unwrap(), Change::NotFound);
        assert_eq!(store.backend().writes, 0);
    }

    #[test]
    fn test_update_replaces_schedule_and_text_only() {
        let mut store = store();
        let original = store.add("Dentist", date(2026, 3, 1), time(9, 0)).unwrap().unwrap();
        store.toggle(original.id).unwrap();

        let change = store.update(original.id, " Dentist (moved) ", date(2026, 3, 8), None).unwrap();
        assert_eq!(change, Change::Applied);

        let task = store.get(original.id).unwrap();
        assert_eq!(task.text, "Dentist (moved)");
        assert_eq!(task.date, date(2026, 3, 8));
        assert_eq!(task.time, None);
        assert!(task.completed);
        assert_eq!(task.created_at, original.created_at);
        assert_eq!(stored_texts(&store), vec!["Dentist (moved)"]);
    }

    #[test]
    fn test_update_blank_text_discards_edit() {
        let mut store = Store::open(FlakyBackend::default()).unwrap();
        let original = store.add("Dentist", date(2026, 3, 1), time(9, 0)).unwrap().unwrap();
        let writes = store.backend().writes;

        assert_eq!(store.update(original.id, "  ", None, None).unwrap(), Change::Rejected);
        assert_eq!(store.get(original.id), Some(&original));
        assert_eq!(store.backend().writes, writes);
    }

    #[test]
    fn test_update_unknown_id() {
        let mut store = store();
        assert_eq!(store.update(7, "text", None, None).unwrap(), Change::NotFound);
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn test_remove() {
        let mut store = store();
        let a = store.add("A", None, None).unwrap().unwrap();
        let b = store.add("B", None, None).unwrap().unwrap();
        store.toggle(b.id).unwrap();

        assert_eq!(store.remove(999).unwrap(), Change::NotFound);
        assert_eq!(store.stats().total, 2);

        assert_eq!(store.remove(b.id).unwrap(), Change::Applied);
        assert_eq!(
            store.stats(),
            Stats {
                total: 1,
                completed: 0,
                pending: 1
            }
        );

        assert_eq!(store.remove(a.id).unwrap(), Change::Applied);
        assert_eq!(store.stats(), Stats::default());
        assert!(stored_texts(&store).is_empty());
    }

    #[test]
    fn test_clear_completed() {
        let mut store = store();
        for text in ["one", "two", "three", "four"] {
            store.add(text, None, None).unwrap();
        }
        let ids: Vec<TaskId> = store.tasks().iter().map(|t| t.id).collect();
        store.toggle(ids[0]).unwrap();
        store.toggle(ids[2]).unwrap();

        assert_eq!(store.clear_completed().unwrap(), 2);
        let texts: Vec<&str> = store.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["three", "one"]);
        assert_eq!(store.clear_completed().unwrap(), 0);
    }

    #[test]
    fn test_clear_completed_nothing_to_clear_does_not_write() {
        let mut store = Store::open(FlakyBackend::default()).unwrap();
        store.add("pending", None, None).unwrap();
        let writes = store.backend().writes;

        assert_eq!(store.clear_completed().unwrap(), 0);
        assert_eq!(store.backend().writes, writes);
    }

    #[test]
    fn test_every_mutation_writes_once() {
        let mut store = Store::open(FlakyBackend::default()).unwrap();
        let id = store.add("A", None, None).unwrap().unwrap().id;
        store.toggle(id).unwrap();
        store.update(id, "A2", None, None).unwrap();
        store.clear_completed().unwrap();

        assert_eq!(store.backend().writes, 4);
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn test_buy_milk_scenario() {
        let mut store = store();
        let id = store.add("Buy milk", None, None).unwrap().unwrap().id;
        assert_eq!(
            store.stats(),
            Stats {
                total: 1,
                completed: 0,
                pending: 1
            }
        );

        store.toggle(id).unwrap();
        assert_eq!(
            store.stats(),
            Stats {
                total: 1,
                completed: 1,
                pending: 0
            }
        );

        assert_eq!(store.clear_completed().unwrap(), 1);
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn test_failed_write_keeps_memory_and_marks_dirty() {
        let mut store = Store::open(FlakyBackend::default()).unwrap();
        store.add("saved", None, None).unwrap();

        store.backend.fail = true;
        assert!(store.add("unsaved", None, None).is_err());
        assert_eq!(store.stats().total, 2);
        assert!(store.is_dirty());

        store.backend.fail = false;
        store.flush().unwrap();
        assert!(!store.is_dirty());

        let reopened = Store::open(store.into_backend()).unwrap();
        let texts: Vec<&str> = reopened.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["unsaved", "saved"]);
    }

    #[test]
    fn test_reopen_from_file_backend() {
        let temp = TempDir::new().unwrap();
        let (first, second) = {
            let mut store = Store::open(FileBackend::open(temp.path()).unwrap()).unwrap();
            let first = store.add("first", date(2026, 5, 1), None).unwrap().unwrap();
            let second = store.add("second", None, time(8, 15)).unwrap().unwrap();
            store.toggle(first.id).unwrap();
            (store.get(first.id).unwrap().clone(), second)
        };

        let store = Store::open(FileBackend::open(temp.path()).unwrap()).unwrap();
        assert_eq!(store.tasks(), &[second, first]);
        assert!(temp.path().join("tasks.json").exists());
    }

    #[test]
    fn test_custom_key() {
        let mut store = Store::open_with_key(MemoryBackend::new(), "work").unwrap();
        store.add("ship it", None, None).unwrap();

        let backend = store.into_backend();
        assert!(backend.get("work").unwrap().is_some());
        assert!(backend.get(codec::DEFAULT_KEY).unwrap().is_none());

        assert!(Store::open_with_key(MemoryBackend::new(), "../etc").is_err());
    }
}
