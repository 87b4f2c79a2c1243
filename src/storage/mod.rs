//! Filesystem Store.
//!
//! Tasks live as individual `.md` files with YAML frontmatter under the
//! configured task root; `tasks.yaml` ([`BoardOrder`]) holds per-column
//! ordering as a sidecar. Reconciliation treats file state as authoritative
//! over the order file, repairing `tasks.yaml` whenever the two disagree.
//!
//! `FilesystemStore` caches the raw frontmatter [`Mapping`] it parsed each
//! task from, keyed by [`Task::id`]. `save` merges the task's fields back
//! into that cached mapping rather than rebuilding it, so foreign,
//! user-authored keys and their relative order survive a save. This is
//! deliberately different from the Sync Engine's pull path, which always
//! writes a fresh canonical-order mapping directly — see `sync::mod` for
//! that path.

pub mod board_order;

pub use board_order::BoardOrder;

use crate::config::Config;
use crate::error::{Result, SltasksError};
use crate::frontmatter::{self, Document};
use crate::model::{PrioritySource, ProviderData, Task, ARCHIVED_STATE, DEFAULT_PRIORITY};
use crate::util::time::{format_utc_timestamp, parse_utc_timestamp};
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const TASKS_YAML: &str = "tasks.yaml";
const DEFAULT_STATE: &str = "todo";

/// A parsed task's on-disk identity, distinct from [`Task::id`] for
/// Remote tasks (whose id is `"{repository}#{issue_number}"`, while the
/// file on disk is the synced filename carrying the title slug).
struct StoredFile {
    filename: String,
    raw: Mapping,
}

/// Reads and writes tasks under a single task root directory.
pub struct FilesystemStore {
    task_root: PathBuf,
    files: HashMap<String, StoredFile>,
    order: Option<BoardOrder>,
}

impl FilesystemStore {
    #[must_use]
    pub fn new(task_root: impl Into<PathBuf>) -> Self {
        Self {
            task_root: task_root.into(),
            files: HashMap::new(),
            order: None,
        }
    }

    fn order_path(&self) -> PathBuf {
        self.task_root.join(TASKS_YAML)
    }

    fn column_ids(config: &Config) -> Vec<String> {
        config.board.columns.iter().map(|c| c.id.clone()).collect()
    }

    fn ensure_order(&mut self, config: &Config) -> Result<&mut BoardOrder> {
        if self.order.is_none() {
            self.order = Some(BoardOrder::load(&self.order_path(), &Self::column_ids(config))?);
        }
        let order = self.order.as_mut().expect("just populated");
        let mut ids = Self::column_ids(config);
        ids.push(ARCHIVED_STATE.to_string());
        order.ensure_columns(&ids);
        Ok(order)
    }

    fn save_order(&self, order: &BoardOrder) -> Result<()> {
        fs::create_dir_all(&self.task_root)?;
        order.save(&self.order_path())
    }

    /// Join `filename` under the task root, rejecting anything that would
    /// escape it (a path separator or a `..` component).
    fn safe_join(&self, filename: &str) -> Result<PathBuf> {
        if filename.contains('/') || filename.contains('\\') || filename.split('/').any(|part| part == "..") {
            return Err(SltasksError::UnsafePath { path: PathBuf::from(filename) });
        }
        Ok(self.task_root.join(filename))
    }

    /// Load and return every task, with reconciliation applied: ids with
    /// no backing file are dropped from `tasks.yaml`,
    /// unlisted files are placed into their current state's column, and
    /// files whose state disagrees with their listed column are moved —
    /// file state wins. Returns tasks sorted by board position.
    ///
    /// # Errors
    ///
    /// Returns an error if the task root or `tasks.yaml` cannot be read.
    pub fn get_all(&mut self, config: &Config) -> Result<Vec<Task>> {
        self.files.clear();
        let mut tasks = Vec::new();

        if self.task_root.exists() {
            for entry in fs::read_dir(&self.task_root)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let filename = filename.to_string();
                if let Some(task) = self.parse_task_file(&path, &filename, config) {
                    tasks.push(task);
                }
            }
        }

        self.reconcile(&tasks, config)?;
        self.sort_by_board_position(&mut tasks, config);
        Ok(tasks)
    }

    /// Load a single task by its on-disk filename (not [`Task::id`] — for
    /// Remote tasks those differ).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn get_by_id(&mut self, filename: &str, config: &Config) -> Result<Option<Task>> {
        let path = self.safe_join(filename)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(self.parse_task_file(&path, filename, config))
    }

    /// Write `task` to disk, merging its fields into whatever raw
    /// frontmatter was previously cached for it (preserving foreign keys),
    /// and place it in `tasks.yaml` under its current state. Returns the
    /// canonical post-write task: `save` always hands back a fresh value
    /// rather than the caller's possibly-stale one.
    ///
    /// For a Remote task this requires the store to already know its
    /// on-disk filename (from a prior `get_all`/`get_by_id`) — the Sync
    /// Engine's pull path, which creates the file for the first time,
    /// writes directly rather than through this method.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if `task` is a Remote task this store has
    /// never seen, or an I/O error if the file cannot be written.
    pub fn save(&mut self, task: Task, config: &Config) -> Result<Task> {
        let filename = self.filename_for(&task)?;
        let cached = self.files.get(&task.id).map(|f| f.raw.clone());
        let metadata = build_frontmatter(cached.as_ref(), &task);

        fs::create_dir_all(&self.task_root)?;
        let path = self.safe_join(&filename)?;
        let text = frontmatter::emit(&metadata, &task.body);
        fs::write(&path, text)?;

        self.files.insert(
            task.id.clone(),
            StoredFile {
                filename: filename.clone(),
                raw: metadata,
            },
        );

        let order = self.ensure_order(config)?;
        order.place(&filename, &task.state);
        let order = order.clone();
        self.save_order(&order)?;
        Ok(task)
    }

    /// Delete a task's file and its `tasks.yaml` entry by on-disk filename.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn delete(&mut self, filename: &str, config: &Config) -> Result<()> {
        let path = self.safe_join(filename)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        if let Some(id) = self
            .files
            .iter()
            .find(|(_, f)| f.filename == filename)
            .map(|(id, _)| id.clone())
        {
            self.files.remove(&id);
        }

        let order = self.ensure_order(config)?;
        order.remove(filename);
        let order = order.clone();
        self.save_order(&order)?;
        Ok(())
    }

    /// Rename a task's `tasks.yaml` entry in place, preserving its position.
    /// Callers are responsible for the filesystem rename itself.
    ///
    /// # Errors
    ///
    /// Returns an error if `tasks.yaml` cannot be read or written.
    pub fn rename_in_board_order(
        &mut self,
        old_filename: &str,
        new_filename: &str,
        config: &Config,
    ) -> Result<()> {
        let order = self.ensure_order(config)?;
        order.rename(old_filename, new_filename);
        let order = order.clone();
        self.save_order(&order)?;
        Ok(())
    }

    fn filename_for(&self, task: &Task) -> Result<String> {
        match &task.provider_data {
            ProviderData::File => Ok(task.id.clone()),
            ProviderData::Remote { .. } => self
                .files
                .get(&task.id)
                .map(|f| f.filename.clone())
                .ok_or_else(|| SltasksError::TaskNotFound { id: task.id.clone() }),
        }
    }

    fn reconcile(&mut self, tasks: &[Task], config: &Config) -> Result<()> {
        let known_filenames: HashSet<String> = self
            .files
            .values()
            .map(|f| f.filename.clone())
            .collect();

        // Resolve filenames up front so the loop below doesn't need to
        // borrow `self.files` while `self.order` is already borrowed.
        let entries: Vec<(String, String)> = tasks
            .iter()
            .filter_map(|t| self.files.get(&t.id).map(|f| (f.filename.clone(), t.state.clone())))
            .collect();

        let order = self.ensure_order(config)?;
        let before = order.clone();
        order.retain_known(&known_filenames);

        let listed: HashSet<String> = order.all_ids().into_iter().collect();
        for (filename, state) in &entries {
            if !listed.contains(filename) {
                order.place(filename, state);
            } else if order.find_list_of(filename).as_deref() != Some(state.as_str()) {
                order.place(filename, state);
            }
        }

        if *order != before {
            let order = order.clone();
            self.save_order(&order)?;
        }
        Ok(())
    }

    fn sort_by_board_position(&self, tasks: &mut [Task], config: &Config) {
        let Some(order) = &self.order else { return };
        let mut column_ids = Self::column_ids(config);
        column_ids.push(ARCHIVED_STATE.to_string());

        let mut positions: HashMap<String, (usize, usize)> = HashMap::new();
        for (state_idx, column) in column_ids.iter().enumerate() {
            for (pos_idx, filename) in order.list(column).iter().enumerate() {
                positions.insert(filename.clone(), (state_idx, pos_idx));
            }
        }

        tasks.sort_by(|a, b| {
            let key = |t: &Task| {
                let filename = self
                    .files
                    .get(&t.id)
                    .map_or(t.id.clone(), |f| f.filename.clone());
                let pos = positions
                    .get(&filename)
                    .copied()
                    .unwrap_or((usize::MAX, usize::MAX));
                (pos, filename)
            };
            key(a).cmp(&key(b))
        });
    }

    fn parse_task_file(&mut self, path: &Path, filename: &str, config: &Config) -> Option<Task> {
        let contents = fs::read_to_string(path).ok()?;
        let Document { metadata, body } = frontmatter::parse(&contents, filename)?;
        let task = task_from_frontmatter(filename, &metadata, body, config)?;

        self.files.insert(
            task.id.clone(),
            StoredFile {
                filename: filename.to_string(),
                raw: metadata,
            },
        );
        Some(task)
    }
}

fn default_title_from_filename(filename: &str) -> String {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    stem.split(['-', '_'])
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn task_from_frontmatter(
    filename: &str,
    metadata: &Mapping,
    body: String,
    config: &Config,
) -> Option<Task> {
    let str_at = |key: &str| metadata.get(key).and_then(Value::as_str).map(str::to_string);

    let title = str_at("title").unwrap_or_else(|| default_title_from_filename(filename));
    let raw_state = str_at("state").unwrap_or_else(|| DEFAULT_STATE.to_string());
    let state = config.resolve_status(&raw_state);
    let priority = str_at("priority").unwrap_or_else(|| DEFAULT_PRIORITY.to_string());
    let r#type = str_at("type");
    let tags = metadata
        .get("tags")
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let created = str_at("created")
        .and_then(|s| parse_utc_timestamp(&s).ok())
        .unwrap_or_else(chrono::Utc::now);
    let updated = str_at("updated")
        .and_then(|s| parse_utc_timestamp(&s).ok())
        .unwrap_or(created);

    let provider_data = match metadata.get("github").and_then(Value::as_mapping) {
        Some(gh) => {
            let gh_str = |key: &str| gh.get(key).and_then(Value::as_str).map(str::to_string);
            let parsed_name = crate::slug::parse_synced_filename(filename);

            let repository = parsed_name
                .as_ref()
                .map(crate::slug::ParsedSyncedFilename::repository)
                .or_else(|| gh_str("repository"));
            let issue_number = parsed_name
                .as_ref()
                .map(|p| p.number)
                .or_else(|| gh.get("issue_number").and_then(Value::as_u64));

            let (Some(repository), Some(issue_number)) = (repository, issue_number) else {
                warn!(file = filename, "github frontmatter missing repository/issue_number, skipping file");
                return None;
            };

            let priority_source = match gh_str("priority_source").as_deref() {
                Some("field") => PrioritySource::Field,
                _ => PrioritySource::Labels,
            };

            ProviderData::Remote {
                project_item_id: gh_str("project_item_id").unwrap_or_default(),
                issue_node_id: gh_str("issue_node_id").unwrap_or_default(),
                repository,
                issue_number,
                type_label: None,
                priority_label: gh_str("priority_label"),
                last_synced: gh_str("last_synced").and_then(|s| parse_utc_timestamp(&s).ok()),
                priority_source,
            }
        }
        None => ProviderData::File,
    };

    let id = match &provider_data {
        ProviderData::Remote { repository, issue_number, .. } => {
            Task::remote_id(repository, *issue_number)
        }
        ProviderData::File => filename.to_string(),
    };

    Some(Task {
        id,
        title,
        body,
        state,
        priority,
        r#type,
        tags,
        created,
        updated,
        provider_data,
    })
}

/// Merge `task`'s fields into `cached` (or a fresh mapping), preserving any
/// foreign keys and their relative order. The `github`
/// sub-block, when present, is rebuilt from `task.provider_data` but other
/// top-level keys (`push_changes`, `close_on_github`, user-authored ones)
/// are left exactly as found, defaulting only if entirely new.
fn build_frontmatter(cached: Option<&Mapping>, task: &Task) -> Mapping {
    let mut map = cached.cloned().unwrap_or_default();

    map.insert(Value::from("title"), Value::from(task.title.clone()));
    map.insert(Value::from("state"), Value::from(task.state.clone()));
    map.insert(Value::from("priority"), Value::from(task.priority.clone()));

    match &task.r#type {
        Some(t) => {
            map.insert(Value::from("type"), Value::from(t.clone()));
        }
        None => {
            map.remove("type");
        }
    }

    if task.tags.is_empty() {
        map.remove("tags");
    } else {
        let tags = task.tags.iter().map(|t| Value::from(t.clone())).collect();
        map.insert(Value::from("tags"), Value::Sequence(tags));
    }

    map.insert(Value::from("created"), Value::from(format_utc_timestamp(task.created)));
    map.insert(Value::from("updated"), Value::from(format_utc_timestamp(task.updated)));

    if let ProviderData::Remote {
        project_item_id,
        issue_node_id,
        repository,
        issue_number,
        priority_label,
        last_synced,
        priority_source,
        ..
    } = &task.provider_data
    {
        let mut gh = map
            .get("github")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        gh.insert(Value::from("synced"), Value::from(true));
        gh.insert(Value::from("issue_number"), Value::from(*issue_number));
        gh.insert(Value::from("repository"), Value::from(repository.clone()));
        gh.insert(Value::from("project_item_id"), Value::from(project_item_id.clone()));
        gh.insert(Value::from("issue_node_id"), Value::from(issue_node_id.clone()));
        if let Some(ts) = last_synced {
            gh.insert(Value::from("last_synced"), Value::from(format_utc_timestamp(*ts)));
        }
        let source = match priority_source {
            PrioritySource::Labels => "labels",
            PrioritySource::Field => "field",
        };
        gh.insert(Value::from("priority_source"), Value::from(source));
        match priority_label {
            Some(label) => {
                gh.insert(Value::from("priority_label"), Value::from(label.clone()));
            }
            None => {
                gh.remove("priority_label");
            }
        }
        map.insert(Value::from("github"), Value::Mapping(gh));

        if !map.contains_key("push_changes") {
            map.insert(Value::from("push_changes"), Value::from(false));
        }
        if !map.contains_key("close_on_github") {
            map.insert(Value::from("close_on_github"), Value::from(false));
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::{TimeZone, Utc};

    fn config() -> Config {
        Config::default()
    }

    fn sample_task(id: &str, state: &str) -> Task {
        Task {
            id: id.to_string(),
            title: "Fix login".to_string(),
            body: "Body text.\n".to_string(),
            state: state.to_string(),
            priority: "medium".to_string(),
            r#type: Some("bug".to_string()),
            tags: vec!["ui".to_string()],
            created: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            updated: Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
            provider_data: ProviderData::File,
        }
    }

    #[test]
    fn save_then_get_by_id_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FilesystemStore::new(dir.path());
        let config = config();
        let task = sample_task("fix-login.md", "todo");

        store.save(task, &config).unwrap();
        let loaded = store.get_by_id("fix-login.md", &config).unwrap().unwrap();

        assert_eq!(loaded.title, "Fix login");
        assert_eq!(loaded.state, "todo");
        assert_eq!(loaded.tags, vec!["ui".to_string()]);
    }

    #[test]
    fn get_by_id_rejects_filenames_that_escape_the_task_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FilesystemStore::new(dir.path());
        let config = config();

        let err = store.get_by_id("../outside.md", &config).unwrap_err();
        assert!(matches!(err, SltasksError::UnsafePath { .. }));
    }

    #[test]
    fn save_preserves_foreign_frontmatter_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fix-login.md");
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(
            &path,
            "---\ntitle: Fix login\nstate: todo\npriority: medium\nestimate: 3\n---\nBody.\n",
        )
        .unwrap();

        let mut store = FilesystemStore::new(dir.path());
        let config = config();
        let mut task = store.get_by_id("fix-login.md", &config).unwrap().unwrap();
        task.title = "Fix login properly".to_string();
        store.save(task, &config).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("estimate: 3"));
        assert!(contents.contains("Fix login properly"));
    }

    #[test]
    fn get_all_reconciles_missing_and_misplaced_entries() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let mut store = FilesystemStore::new(dir.path());

        store.save(sample_task("a.md", "todo"), &config).unwrap();
        store.save(sample_task("b.md", "done"), &config).unwrap();

        // Hand-corrupt tasks.yaml: drop a stale reference and misplace "b.md".
        let order_path = dir.path().join("tasks.yaml");
        fs::write(
            &order_path,
            "todo:\n  - a.md\n  - gone.md\nin_progress:\n  - b.md\ndone: []\narchived: []\n",
        )
        .unwrap();

        // A fresh store, as a new process would construct, so it reads the
        // hand-edited file rather than an in-memory cache from the saves above.
        let mut store = FilesystemStore::new(dir.path());
        let tasks = store.get_all(&config).unwrap();
        assert_eq!(tasks.len(), 2);

        let reloaded = BoardOrder::load(&order_path, &["todo", "in_progress", "done"].map(String::from))
            .unwrap();
        assert_eq!(reloaded.list("todo"), &["a.md".to_string()]);
        assert_eq!(reloaded.list("done"), &["b.md".to_string()]);
        assert!(reloaded.list("in_progress").is_empty());
    }

    #[test]
    fn reading_alias_state_normalizes_without_rewriting_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(&path, "---\ntitle: A\nstate: new\n---\nBody.\n").unwrap();

        let mut store = FilesystemStore::new(dir.path());
        let config = config();
        let task = store.get_by_id("a.md", &config).unwrap().unwrap();
        assert_eq!(task.state, "todo");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("state: new"));
    }

    #[test]
    fn delete_removes_file_and_order_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let mut store = FilesystemStore::new(dir.path());
        store.save(sample_task("a.md", "todo"), &config).unwrap();

        store.delete("a.md", &config).unwrap();

        assert!(!dir.path().join("a.md").exists());
        let order = BoardOrder::load(&dir.path().join("tasks.yaml"), &["todo".to_string()]).unwrap();
        assert!(order.list("todo").is_empty());
    }

    #[test]
    fn rename_in_board_order_preserves_position() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let mut store = FilesystemStore::new(dir.path());
        store.save(sample_task("a.md", "todo"), &config).unwrap();
        store.save(sample_task("old.md", "todo"), &config).unwrap();

        store.rename_in_board_order("old.md", "new.md", &config).unwrap();

        let order = BoardOrder::load(&dir.path().join("tasks.yaml"), &["todo".to_string()]).unwrap();
        assert_eq!(order.list("todo"), &["a.md".to_string(), "new.md".to_string()]);
    }

    #[test]
    fn missing_title_falls_back_to_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fix-login-bug.md");
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(&path, "---\nstate: todo\n---\n").unwrap();

        let mut store = FilesystemStore::new(dir.path());
        let task = store.get_by_id("fix-login-bug.md", &config()).unwrap().unwrap();
        assert_eq!(task.title, "Fix Login Bug");
    }

    #[test]
    fn remote_task_id_differs_from_synced_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme-proj#7-fix-login.md");
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(
            &path,
            "---\ntitle: Fix login\nstate: todo\ngithub:\n  synced: true\n  issue_number: 7\n  repository: acme/proj\n---\n",
        )
        .unwrap();

        let mut store = FilesystemStore::new(dir.path());
        let task = store
            .get_by_id("acme-proj#7-fix-login.md", &config())
            .unwrap()
            .unwrap();
        assert_eq!(task.id, "acme/proj#7");
        assert!(task.provider_data.is_remote());
    }
}
