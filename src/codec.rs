// Whole-collection persistence codec

use crate::backend::{Backend, MAX_KEY_LEN};
use crate::models::{Task, now_ms};
use eyre::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

/// Default key the collection is stored under
pub const DEFAULT_KEY: &str = "tasks";

/// What `load` found under a key
#[derive(Debug, Default)]
pub struct Loaded {
    pub tasks: Vec<Task>,
    /// Key holding a copy of whatever could not be read, if anything
    pub backup: Option<String>,
}

/// Key for a copy of unreadable data taken at `stamp`
///
/// `key` is shortened as needed so the result always fits within the key limit.
pub fn backup_key(key: &str, stamp: i64) -> String {
    let suffix = format!(".corrupt-{}", stamp);
    let mut end = key.len().min(MAX_KEY_LEN - suffix.len());
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &key[..end], suffix)
}

/// Serialize the ordered collection to one JSON array and store it under `key`
pub fn save<B: Backend + ?Sized>(backend: &mut B, key: &str, tasks: &[Task]) -> Result<()> {
    let json = serde_json::to_string(tasks).context("Failed to serialize tasks")?;
    backend.set(key, &json).context("Failed to write tasks")?;
    info!(key, count = tasks.len(), "Saved tasks");
    Ok(())
}

/// Read the collection stored under `key`
///
/// - Absent key: empty collection.
/// - Blob that is not a JSON array: copied to a fresh backup key, empty collection.
/// - Records that do not match the task shape, have blank text or repeat an
///   earlier id: skipped, and written as a JSON array to a fresh backup key.
///
/// Nothing unreadable is dropped without a copy: if the backup cannot be
/// written the load fails. Backend read failures are returned as errors too.
pub fn load<B: Backend + ?Sized>(backend: &mut B, key: &str) -> Result<Loaded> {
    let blob = match backend.get(key).context("Failed to read tasks")? {
        Some(blob) => blob,
        None => {
            info!(key, "No stored tasks, starting empty");
            return Ok(Loaded::default());
        }
    };

    if blob.trim().is_empty() {
        return Ok(Loaded::default());
    }

    let values: Vec<Value> = match serde_json::from_str(&blob) {
        Ok(v) => v,
        Err(e) => {
            warn!(key, error = ?e, "Stored tasks are unreadable, starting empty");
            let backup = preserve(backend, key, &blob)?;
            return Ok(Loaded {
                tasks: Vec::new(),
                backup: Some(backup),
            });
        }
    };

    let mut tasks = Vec::with_capacity(values.len());
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();

    for (index, value) in values.into_iter().enumerate() {
        let mut task: Task = match serde_json::from_value(value.clone()) {
            Ok(t) => t,
            Err(e) => {
                warn!(key, index, error = ?e, "Failed to parse task, skipping");
                skipped.push(value);
                continue;
            }
        };

        let trimmed = task.text.trim();
        if trimmed.is_empty() {
            warn!(key, index, id = task.id, "Task has blank text, skipping");
            skipped.push(value);
            continue;
        }
        if trimmed.len() != task.text.len() {
            task.text = trimmed.to_string();
        }

        if !seen.insert(task.id) {
            warn!(key, index, id = task.id, "Duplicate task id, skipping");
            skipped.push(value);
            continue;
        }

        tasks.push(task);
    }

    let backup = if skipped.is_empty() {
        None
    } else {
        let json = serde_json::to_string(&skipped).context("Failed to serialize skipped tasks")?;
        Some(preserve(backend, key, &json)?)
    };

    info!(key, count = tasks.len(), skipped = skipped.len(), "Loaded tasks");
    Ok(Loaded { tasks, backup })
}

/// Store `content` under an unused backup key and return that key
fn preserve<B: Backend + ?Sized>(backend: &mut B, key: &str, content: &str) -> Result<String> {
    let mut stamp = now_ms();
    let mut backup = backup_key(key, stamp);
    while backend.get(&backup)?.is_some() {
        stamp = stamp.saturating_add(1);
        backup = backup_key(key, stamp);
    }

    backend
        .set(&backup, content)
        .with_context(|| format!("Failed to preserve unreadable tasks under {}", backup))?;
    warn!(key, backup = %backup, "Preserved unreadable tasks");
    Ok(backup)
}
