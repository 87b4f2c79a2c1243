//! Board Service: task movement and column reordering on top of the
//! Filesystem Store.
//!
//! `move_task_left`/`move_task_right` clamp at the boundary columns as a
//! no-op rather than an error: the task comes back unchanged, `updated`
//! is not bumped, and nothing is persisted.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Result, SltasksError};
use crate::model::{Task, ARCHIVED_STATE};
use crate::storage::{BoardOrder, FilesystemStore};
use std::path::PathBuf;
use tracing::{debug, info};

const TASKS_YAML: &str = "tasks.yaml";

/// Moves tasks between columns and reorders them within a column. Reads and
/// writes through a caller-supplied [`FilesystemStore`] for task content;
/// reorder works directly against `tasks.yaml` since the store exposes no
/// swap primitive of its own.
pub struct BoardService<'a> {
    task_root: PathBuf,
    clock: &'a dyn Clock,
}

impl<'a> BoardService<'a> {
    #[must_use]
    pub fn new(task_root: impl Into<PathBuf>, clock: &'a dyn Clock) -> Self {
        Self { task_root: task_root.into(), clock }
    }

    fn order_path(&self) -> PathBuf {
        self.task_root.join(TASKS_YAML)
    }

    fn column_ids(config: &Config) -> Vec<String> {
        let mut ids: Vec<String> = config.board.columns.iter().map(|c| c.id.clone()).collect();
        ids.push(ARCHIVED_STATE.to_string());
        ids
    }

    /// Move `task_id` (the store's on-disk key) to `to_state`, resolving
    /// aliases to their canonical column id and stamping `updated`.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if no such task exists, or whatever error
    /// `store.save` produces.
    pub fn move_task(&self, store: &mut FilesystemStore, config: &Config, task_id: &str, to_state: &str) -> Result<Task> {
        let mut task = store
            .get_by_id(task_id, config)?
            .ok_or_else(|| SltasksError::TaskNotFound { id: task_id.to_string() })?;

        let old_state = task.state.clone();
        let canonical_state = config.resolve_status(to_state);
        task.state = canonical_state.clone();
        task.updated = self.clock.now_utc();

        let saved = store.save(task, config)?;
        info!(task_id, from = %old_state, to = %canonical_state, "task moved");
        Ok(saved)
    }

    /// Move to the previous configured column. At the leftmost column this
    /// is a no-op: the task is returned exactly as stored, nothing written.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if no such task exists.
    pub fn move_task_left(&self, store: &mut FilesystemStore, config: &Config, task_id: &str) -> Result<Task> {
        let task = store
            .get_by_id(task_id, config)?
            .ok_or_else(|| SltasksError::TaskNotFound { id: task_id.to_string() })?;

        match previous_column(&task.state, config) {
            Some(prev) => self.move_task(store, config, task_id, &prev),
            None => {
                debug!(task_id, "move_task_left: already at leftmost column");
                Ok(task)
            }
        }
    }

    /// Move to the next configured column. At the rightmost column this is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if no such task exists.
    pub fn move_task_right(&self, store: &mut FilesystemStore, config: &Config, task_id: &str) -> Result<Task> {
        let task = store
            .get_by_id(task_id, config)?
            .ok_or_else(|| SltasksError::TaskNotFound { id: task_id.to_string() })?;

        match next_column(&task.state, config) {
            Some(next) => self.move_task(store, config, task_id, &next),
            None => {
                debug!(task_id, "move_task_right: already at rightmost column");
                Ok(task)
            }
        }
    }

    /// Move a task to the reserved archived state.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if no such task exists.
    pub fn archive_task(&self, store: &mut FilesystemStore, config: &Config, task_id: &str) -> Result<Task> {
        info!(task_id, "archiving task");
        self.move_task(store, config, task_id, ARCHIVED_STATE)
    }

    /// Move an archived task back to the first configured column.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if no such task exists.
    pub fn unarchive_task(&self, store: &mut FilesystemStore, config: &Config, task_id: &str) -> Result<Task> {
        let first = config.first_column_id().unwrap_or("todo").to_string();
        info!(task_id, to = %first, "unarchiving task");
        self.move_task(store, config, task_id, &first)
    }

    /// Swap `task_id` with its neighbor in the direction of `delta` (`-1`
    /// up, `+1` down) within its current column's order. Returns `false` at
    /// a boundary without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns an error if `tasks.yaml` cannot be read or written.
    pub fn reorder_task(&self, store: &mut FilesystemStore, config: &Config, task_id: &str, delta: i32) -> Result<bool> {
        if store.get_by_id(task_id, config)?.is_none() {
            debug!(task_id, "reorder_task: task not found");
            return Ok(false);
        }

        let mut order = BoardOrder::load(&self.order_path(), &Self::column_ids(config))?;
        let moved = order.swap_adjacent(task_id, delta);

        if moved {
            order.save(&self.order_path())?;
            debug!(task_id, delta, "task reordered");
        } else {
            debug!(task_id, "reorder_task: at boundary, cannot move");
        }
        Ok(moved)
    }
}

fn previous_column(state: &str, config: &Config) -> Option<String> {
    let ids: Vec<&str> = config.board.columns.iter().map(|c| c.id.as_str()).collect();
    let idx = ids.iter().position(|&id| id == state)?;
    if idx == 0 {
        None
    } else {
        Some(ids[idx - 1].to_string())
    }
}

fn next_column(state: &str, config: &Config) -> Option<String> {
    let ids: Vec<&str> = config.board.columns.iter().map(|c| c.id.as_str()).collect();
    let idx = ids.iter().position(|&id| id == state)?;
    if idx + 1 >= ids.len() {
        None
    } else {
        Some(ids[idx + 1].to_string())
    }
}
