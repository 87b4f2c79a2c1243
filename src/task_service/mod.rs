//! Task Service: task lifecycle operations layered over the Filesystem
//! Store — create, update, delete, rename-to-match-title, and opening a
//! task in an external editor.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Result, SltasksError};
use crate::model::{ProviderData, Task, DEFAULT_PRIORITY};
use crate::slug::slugify;
use crate::storage::FilesystemStore;
use crate::template::TemplateService;
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};

const FALLBACK_EDITORS: [&str; 4] = ["nvim", "vim", "vi", "nano"];

/// Creates, updates, deletes, and renames tasks against a caller-supplied
/// [`FilesystemStore`].
pub struct TaskService<'a> {
    task_root: PathBuf,
    clock: &'a dyn Clock,
}

impl<'a> TaskService<'a> {
    #[must_use]
    pub fn new(task_root: impl Into<PathBuf>, clock: &'a dyn Clock) -> Self {
        let task_root = task_root.into();
        Self { task_root, clock }
    }

    fn default_state(config: &Config) -> String {
        config.first_column_id().unwrap_or("todo").to_string()
    }

    fn generate_filename(title: &str) -> String {
        let slug = slugify(title);
        let slug = if slug.is_empty() { "untitled".to_string() } else { slug };
        format!("{slug}.md")
    }

    /// Append `-1`, `-2`, ... to `filename`'s stem until it names no
    /// existing task.
    fn unique_filename(store: &mut FilesystemStore, config: &Config, filename: &str) -> Result<String> {
        if store.get_by_id(filename, config)?.is_none() {
            return Ok(filename.to_string());
        }
        let stem = filename.strip_suffix(".md").unwrap_or(filename);
        let mut counter = 1u32;
        loop {
            let candidate = format!("{stem}-{counter}.md");
            if store.get_by_id(&candidate, config)?.is_none() {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    /// Create a task: generates a unique filename from `title`, applies the
    /// type's template (if any) as a default for unset priority/tags/body,
    /// and stamps `created`/`updated`.
    ///
    /// # Errors
    ///
    /// Returns whatever error `store.save` produces.
    #[allow(clippy::too_many_arguments)]
    pub fn create_task(
        &self,
        store: &mut FilesystemStore,
        config: &Config,
        title: &str,
        state: Option<&str>,
        priority: &str,
        tags: Vec<String>,
        type_id: Option<&str>,
    ) -> Result<Task> {
        let filename = Self::generate_filename(title);
        let filename = Self::unique_filename(store, config, &filename)?;

        let state = state.map_or_else(|| Self::default_state(config), |s| config.resolve_status(s));
        let now = self.clock.now_utc();

        let mut task = Task {
            id: filename.clone(),
            title: title.to_string(),
            body: String::new(),
            state,
            priority: config.resolve_priority(priority),
            r#type: type_id.map(|t| config.resolve_type(t)),
            tags,
            created: now,
            updated: now,
            provider_data: ProviderData::File,
        };

        if let Some(type_id) = task.r#type.clone() {
            let templates = TemplateService::new(&self.task_root);
            if let Some((template_fm, template_body)) = templates.get_template(config, &type_id) {
                apply_template_defaults(&mut task, &template_fm);
                if task.body.is_empty() {
                    task.body = template_body;
                }
            }
        }

        info!(filename, title, "task created");
        store.save(task, config)
    }

    /// Persist an already-mutated task, stamping `updated`.
    ///
    /// # Errors
    ///
    /// Returns whatever error `store.save` produces.
    pub fn update_task(&self, store: &mut FilesystemStore, config: &Config, mut task: Task) -> Result<Task> {
        task.updated = self.clock.now_utc();
        store.save(task, config)
    }

    /// Delete a task by its on-disk filename.
    ///
    /// # Errors
    ///
    /// Returns whatever error `store.delete` produces.
    pub fn delete_task(&self, store: &mut FilesystemStore, config: &Config, filename: &str) -> Result<()> {
        info!(filename, "task deleted");
        store.delete(filename, config)
    }

    /// Fetch a single task by its on-disk filename.
    ///
    /// # Errors
    ///
    /// Returns whatever error `store.get_by_id` produces.
    pub fn get_task(&self, store: &mut FilesystemStore, config: &Config, filename: &str) -> Result<Option<Task>> {
        store.get_by_id(filename, config)
    }

    /// Fetch every task, board-ordered.
    ///
    /// # Errors
    ///
    /// Returns whatever error `store.get_all` produces.
    pub fn get_all_tasks(&self, store: &mut FilesystemStore, config: &Config) -> Result<Vec<Task>> {
        store.get_all(config)
    }

    /// Regenerate a local-only task's filename from its current title,
    /// renaming the file on disk and updating `tasks.yaml`'s entry in
    /// place. A no-op if the generated filename is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if no such task exists, `InvalidState` if the
    /// task is Remote-backed (its filename carries the repository and issue
    /// number, not the title), or an I/O error on rename.
    pub fn rename_task_to_match_title(
        &self,
        store: &mut FilesystemStore,
        config: &Config,
        filename: &str,
    ) -> Result<Task> {
        let task = store
            .get_by_id(filename, config)?
            .ok_or_else(|| SltasksError::TaskNotFound { id: filename.to_string() })?;

        if task.provider_data.is_remote() {
            return Err(SltasksError::InvalidState(format!(
                "'{filename}' is synced from GitHub; its filename is not derived from the title"
            )));
        }

        let new_filename = Self::generate_filename(&task.title);
        if new_filename == filename {
            return Ok(task);
        }
        let new_filename = Self::unique_filename(store, config, &new_filename)?;

        let old_path = self.task_root.join(filename);
        let new_path = self.task_root.join(&new_filename);
        std::fs::rename(&old_path, &new_path)?;

        let mut renamed = task;
        renamed.id = new_filename.clone();
        store.rename_in_board_order(filename, &new_filename, config)?;
        debug!(from = filename, to = new_filename.as_str(), "task renamed to match title");
        Ok(renamed)
    }

    /// Open a task's file in `$VISUAL`, then `$EDITOR`, then the first of
    /// `nvim`/`vim`/`vi`/`nano` found on `PATH`. Returns `false` if no
    /// editor could be found or it exited non-zero.
    #[must_use]
    pub fn open_in_editor(&self, filename: &str) -> bool {
        let path = self.task_root.join(filename);
        let path_var = std::env::var("PATH").ok();

        let Some(editor) = resolve_editor(std::env::var("VISUAL").ok(), std::env::var("EDITOR").ok(), path_var.as_deref())
        else {
            warn!("open_in_editor: no editor found in $VISUAL, $EDITOR, or PATH");
            return false;
        };

        let mut parts = editor.split_whitespace();
        let Some(program) = parts.next() else {
            return false;
        };

        match Command::new(program).args(parts).arg(&path).status() {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(editor = program, error = %e, "failed to launch editor");
                false
            }
        }
    }
}

/// Pick an editor command from `$VISUAL`, `$EDITOR`, or the first fallback
/// binary found on `path_var`. Pure function so the resolution logic can be
/// tested without touching the real process environment.
fn resolve_editor(visual: Option<String>, editor: Option<String>, path_var: Option<&str>) -> Option<String> {
    visual
        .filter(|s| !s.is_empty())
        .or_else(|| editor.filter(|s| !s.is_empty()))
        .or_else(|| {
            let path_var = path_var?;
            FALLBACK_EDITORS
                .iter()
                .find(|cmd| command_exists(cmd, path_var))
                .map(|cmd| (*cmd).to_string())
        })
}

fn command_exists(cmd: &str, path_var: &str) -> bool {
    std::env::split_paths(path_var).any(|dir| dir.join(cmd).is_file())
}

/// Fill in task fields left at their caller-supplied defaults from the
/// type's template. Priority and tags win only if the caller never set
/// them away from the system default.
fn apply_template_defaults(task: &mut Task, template_fm: &Mapping) {
    if task.priority == DEFAULT_PRIORITY {
        if let Some(priority) = template_fm.get("priority").and_then(Value::as_str) {
            task.priority = priority.to_string();
        }
    }
    if task.tags.is_empty() {
        if let Some(tags) = template_fm.get("tags").and_then(Value::as_sequence) {
            task.tags = tags.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::{Config, TypeEntry};
    use chrono::{TimeZone, Utc};

    fn config() -> Config {
        Config::default()
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn create_task_generates_filename_and_stamps_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let mut store = FilesystemStore::new(dir.path());
        let clock = clock();
        let service = TaskService::new(dir.path(), &clock);

        let task = service
            .create_task(&mut store, &config, "Fix Login Bug", None, "medium", vec![], None)
            .unwrap();

        assert_eq!(task.id, "fix-login-bug.md");
        assert_eq!(task.state, "todo");
        assert_eq!(task.created, clock.0);
        assert_eq!(task.updated, clock.0);
    }

    #[test]
    fn create_task_avoids_filename_collision() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let mut store = FilesystemStore::new(dir.path());
        let clock = clock();
        let service = TaskService::new(dir.path(), &clock);

        service.create_task(&mut store, &config, "Fix Login", None, "medium", vec![], None).unwrap();
        let second = service
            .create_task(&mut store, &config, "Fix Login", None, "medium", vec![], None)
            .unwrap();

        assert_eq!(second.id, "fix-login-1.md");
    }

    #[test]
    fn create_task_applies_type_template_when_priority_left_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        std::fs::write(dir.path().join("templates/bug.md"), "---\npriority: critical\n---\nSteps:\n").unwrap();

        let mut config = config();
        config.board.types.push(TypeEntry {
            id: "bug".to_string(),
            color: "red".to_string(),
            template: None,
            type_alias: vec![],
            canonical_alias: None,
        });

        let mut store = FilesystemStore::new(dir.path());
        let clock = clock();
        let service = TaskService::new(dir.path(), &clock);

        let task = service
            .create_task(&mut store, &config, "Login broken", None, "medium", vec![], Some("bug"))
            .unwrap();

        assert_eq!(task.priority, "critical");
        assert_eq!(task.body, "Steps:\n");
    }

    #[test]
    fn rename_task_to_match_title_updates_filename_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let mut store = FilesystemStore::new(dir.path());
        let clock = clock();
        let service = TaskService::new(dir.path(), &clock);

        let mut task = service
            .create_task(&mut store, &config, "Old Title", None, "medium", vec![], None)
            .unwrap();
        task.title = "New Title".to_string();
        service.update_task(&mut store, &config, task).unwrap();

        let renamed = service.rename_task_to_match_title(&mut store, &config, "old-title.md").unwrap();

        assert_eq!(renamed.id, "new-title.md");
        assert!(!dir.path().join("old-title.md").exists());
        assert!(dir.path().join("new-title.md").exists());
    }

    #[test]
    fn rename_task_to_match_title_is_a_no_op_when_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let mut store = FilesystemStore::new(dir.path());
        let clock = clock();
        let service = TaskService::new(dir.path(), &clock);

        service.create_task(&mut store, &config, "Stable Title", None, "medium", vec![], None).unwrap();
        let result = service.rename_task_to_match_title(&mut store, &config, "stable-title.md").unwrap();

        assert_eq!(result.id, "stable-title.md");
    }

    #[test]
    fn delete_task_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let mut store = FilesystemStore::new(dir.path());
        let clock = clock();
        let service = TaskService::new(dir.path(), &clock);

        service.create_task(&mut store, &config, "Temp", None, "medium", vec![], None).unwrap();
        service.delete_task(&mut store, &config, "temp.md").unwrap();

        assert!(!dir.path().join("temp.md").exists());
    }

    #[test]
    fn resolve_editor_prefers_visual_over_editor() {
        let editor = resolve_editor(Some("nvim".to_string()), Some("nano".to_string()), None);
        assert_eq!(editor, Some("nvim".to_string()));
    }

    #[test]
    fn resolve_editor_falls_back_to_editor_when_visual_unset() {
        let editor = resolve_editor(None, Some("nano".to_string()), None);
        assert_eq!(editor, Some("nano".to_string()));
    }

    #[test]
    fn resolve_editor_falls_back_to_path_search() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vim"), "#!/bin/sh\n").unwrap();
        let path_var = dir.path().to_str().unwrap();

        let editor = resolve_editor(None, None, Some(path_var));
        assert_eq!(editor, Some("vim".to_string()));
    }

    #[test]
    fn resolve_editor_none_when_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let path_var = dir.path().to_str().unwrap();
        assert_eq!(resolve_editor(None, None, Some(path_var)), None);
    }
}
