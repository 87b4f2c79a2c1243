//! Sync Engine: change detection, conflict classification, and push/pull
//! orchestration between the Filesystem Store and the Remote Store.
//!
//! Unlike the Filesystem Store, this module reads and writes task files
//! directly through the frontmatter codec rather than through
//! `FilesystemStore::save`. Two reasons: the pull path always writes a fresh
//! canonical-order mapping, never merging into a cached pre-image, and
//! `push_changes`/`close_on_github` are frontmatter sibling keys with no
//! counterpart on `Task` that only this module's post-push bookkeeping
//! needs to touch.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Result, SltasksError};
use crate::filter::{self, MatchableItem};
use crate::frontmatter::{self, Document};
use crate::model::{ProviderData, Task, ARCHIVED_STATE};
use crate::remote::RemoteStore;
use crate::slug;
use crate::storage::BoardOrder;
use crate::util::time::format_utc_timestamp;
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TASKS_YAML: &str = "tasks.yaml";

/// Disposition applied to a local file right after its issue was created.
/// `keep` (do nothing) is not represented: callers simply don't call
/// `handle_pushed_file` for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostPushAction {
    Delete,
    Archive,
    Rename,
}

/// Result of a push batch (`push_new_issues` or `push_updates`).
#[derive(Debug, Clone, Default)]
pub struct PushResult {
    pub created: Vec<String>,
    pub errors: Vec<String>,
    pub dry_run: bool,
}

/// Result of a pull pass (`sync_from_github`).
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub pulled: u32,
    pub conflicts: u32,
    pub errors: Vec<String>,
    pub dry_run: bool,
}

/// A task whose local and remote sides both changed since the last sync.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub task_id: String,
    pub local_updated: chrono::DateTime<chrono::Utc>,
    pub remote_updated: chrono::DateTime<chrono::Utc>,
    pub last_synced: chrono::DateTime<chrono::Utc>,
}

/// Pure classification of every synced/local-only task. The three lists
/// are disjoint.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub to_pull: Vec<String>,
    pub to_push: Vec<String>,
    pub conflicts: Vec<Conflict>,
}

/// A synced task plus the raw frontmatter it was parsed from and its
/// on-disk path — needed to patch `push_changes`/`github.last_synced` back
/// in place without disturbing other keys.
struct SyncedFile {
    task: Task,
    path: PathBuf,
    mapping: Mapping,
}

/// Drives pull/push reconciliation between a task root and a `RemoteStore`.
pub struct SyncEngine<'a> {
    task_root: PathBuf,
    clock: &'a dyn Clock,
}

impl<'a> SyncEngine<'a> {
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

    /// Tasks whose filenames don't match the synced pattern and whose
    /// frontmatter carries no Remote metadata block.
    ///
    /// # Errors
    ///
    /// Returns an error if the task root cannot be read.
    pub fn find_local_only_tasks(&self, config: &Config) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();
        if !self.task_root.exists() {
            return Ok(tasks);
        }
        for entry in fs::read_dir(&self.task_root)? {
            let entry = entry?;
            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if !slug::is_local_only_filename(filename) {
                continue;
            }
            if let Some((task, _)) = read_task_file(&path, filename, config) {
                if task.provider_data.is_file() {
                    tasks.push(task);
                }
            }
        }
        Ok(tasks)
    }

    fn scan_synced_files(&self, config: &Config) -> Vec<SyncedFile> {
        let mut files = Vec::new();
        let Ok(entries) = fs::read_dir(&self.task_root) else { return files };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if !slug::is_synced_filename(filename) {
                continue;
            }
            if let Some((task, mapping)) = read_task_file(&path, filename, config) {
                if task.provider_data.is_remote() {
                    files.push(SyncedFile { task, path, mapping });
                }
            }
        }
        files
    }

    fn locate_synced_file(&self, repository: &str, issue_number: u64) -> Option<(PathBuf, Mapping, String)> {
        let entries = fs::read_dir(&self.task_root).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            let filename = path.file_name()?.to_str()?.to_string();
            let Some(parsed) = slug::parse_synced_filename(&filename) else { continue };
            if parsed.repository() == repository && parsed.number == issue_number {
                let contents = fs::read_to_string(&path).ok()?;
                let doc = frontmatter::parse(&contents, &filename)?;
                return Some((path, doc.metadata, filename));
            }
        }
        None
    }

    /// Create a remote item for each of `tasks`. `dry_run` synthesizes
    /// `"{default_repo}#(new)"` ids and makes no remote calls.
    #[must_use]
    pub fn push_new_issues(
        &self,
        tasks: Vec<Task>,
        remote: &mut RemoteStore,
        config: &Config,
        dry_run: bool,
    ) -> PushResult {
        let mut result = PushResult { dry_run, ..PushResult::default() };

        let Some(github) = &config.github else {
            result.errors.push("provider is not remote, nothing to push".to_string());
            return result;
        };

        if dry_run {
            for task in tasks {
                let synthetic = format!("{}#(new)", github.default_repo);
                debug!(id = %task.id, synthetic, "dry run: would create issue");
                result.created.push(synthetic);
            }
            return result;
        }

        if let Err(e) = remote.fetch_project_metadata() {
            warn!(error = %e, "failed to fetch project metadata before push, continuing");
        }

        for task in tasks {
            let id = task.id.clone();
            match remote.save(task, config) {
                Ok(created) => {
                    info!(id = %created.id, "pushed new issue");
                    result.created.push(created.id);
                }
                Err(e) => {
                    warn!(id, error = %e, "failed to push new issue");
                    result.errors.push(format!("{id}: {e}"));
                }
            }
        }
        result
    }

    /// Apply the post-push disposition to a local file. `issue_id` is
    /// `"{repository}#{issue_number}"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frontmatter can't be read/written, the file
    /// can't be renamed/removed, or `tasks.yaml` can't be saved.
    pub fn handle_pushed_file(
        &self,
        filename: &str,
        issue_id: &str,
        action: PostPushAction,
        config: &Config,
    ) -> Result<()> {
        let path = self.task_root.join(filename);

        match action {
            PostPushAction::Delete => {
                if path.exists() {
                    fs::remove_file(&path)?;
                }
                let mut order = BoardOrder::load(&self.order_path(), &Self::column_ids(config))?;
                order.remove(filename);
                order.save(&self.order_path())?;
                info!(filename, issue_id, "deleted local file after push");
            }
            PostPushAction::Archive => {
                let contents = fs::read_to_string(&path)?;
                let Some(Document { mut metadata, body }) = frontmatter::parse(&contents, filename) else {
                    return Err(SltasksError::ParseFailed(format!("{filename}: could not parse frontmatter")));
                };
                metadata.insert(Value::from("archived"), Value::from(true));
                metadata.insert(Value::from("state"), Value::from(ARCHIVED_STATE));
                metadata.insert(Value::from("updated"), Value::from(format_utc_timestamp(self.clock.now_utc())));
                fs::write(&path, frontmatter::emit(&metadata, &body))?;
                info!(filename, issue_id, "archived local file after push");
            }
            PostPushAction::Rename => {
                let contents = fs::read_to_string(&path)?;
                let Some(Document { metadata, .. }) = frontmatter::parse(&contents, filename) else {
                    return Err(SltasksError::ParseFailed(format!("{filename}: could not parse frontmatter")));
                };
                let title = metadata.get("title").and_then(Value::as_str).unwrap_or(filename);
                let (repository, number) = issue_id
                    .split_once('#')
                    .and_then(|(r, n)| n.parse::<u64>().ok().map(|n| (r, n)))
                    .ok_or_else(|| SltasksError::ParseFailed(format!("invalid issue id: {issue_id}")))?;
                let (owner, repo) = repository
                    .split_once('/')
                    .ok_or_else(|| SltasksError::ParseFailed(format!("invalid repository: {repository}")))?;

                let new_filename = slug::generate_synced_filename(owner, repo, number, title);
                let new_path = self.task_root.join(&new_filename);
                fs::rename(&path, &new_path)?;

                let mut order = BoardOrder::load(&self.order_path(), &Self::column_ids(config))?;
                order.rename(filename, &new_filename);
                order.save(&self.order_path())?;
                info!(filename, new_filename, issue_id, "renamed local file to synced form after push");
            }
        }
        Ok(())
    }

    /// Push every synced task in `tasks` that locally opted in via
    /// `push_changes: true`. Callers typically pass the subset produced by
    /// `detect_changes().to_push` restricted to synced tasks (local-only
    /// tasks go through `push_new_issues` instead).
    #[must_use]
    pub fn push_updates(
        &self,
        tasks: Vec<Task>,
        remote: &mut RemoteStore,
        config: &Config,
        dry_run: bool,
    ) -> PushResult {
        let mut result = PushResult { dry_run, ..PushResult::default() };

        for task in tasks {
            let id = task.id.clone();
            let ProviderData::Remote { repository, issue_number, .. } = &task.provider_data else {
                result.errors.push(format!("{id}: no GitHub metadata found"));
                continue;
            };
            let repository = repository.clone();
            let issue_number = *issue_number;

            if dry_run {
                debug!(id, "dry run: would push update");
                result.created.push(id);
                continue;
            }

            match remote.save(task, config) {
                Ok(_) => match self.update_sync_metadata(&repository, issue_number) {
                    Ok(()) => {
                        info!(id, "pushed update");
                        result.created.push(id);
                    }
                    Err(e) => {
                        warn!(id, error = %e, "pushed update but failed to stamp local metadata");
                        result.errors.push(format!("{id}: {e}"));
                    }
                },
                Err(e) => {
                    warn!(id, error = %e, "failed to push update");
                    result.errors.push(format!("{id}: {e}"));
                }
            }
        }
        result
    }

    /// After a successful push, rewrite only `github.last_synced` and
    /// `push_changes` in place — no other keys are disturbed or reordered.
    fn update_sync_metadata(&self, repository: &str, issue_number: u64) -> Result<()> {
        let Some((path, mut metadata, filename)) = self.locate_synced_file(repository, issue_number) else {
            return Err(SltasksError::NotFound(format!("local file for {repository}#{issue_number}")));
        };

        let mut github = metadata.get("github").and_then(Value::as_mapping).cloned().unwrap_or_default();
        github.insert(Value::from("last_synced"), Value::from(format_utc_timestamp(self.clock.now_utc())));
        metadata.insert(Value::from("github"), Value::Mapping(github));
        metadata.insert(Value::from("push_changes"), Value::from(false));

        let contents = fs::read_to_string(&path)?;
        let body = frontmatter::parse(&contents, &filename).map_or_else(String::new, |d| d.body);
        fs::write(&path, frontmatter::emit(&metadata, &body))?;
        Ok(())
    }

    /// The full pull path: fetch, filter, and materialize remote items as
    /// local synced files. Errors are collected per item; the pass never
    /// aborts on a single failure.
    #[must_use]
    pub fn sync_from_github(&self, remote: &mut RemoteStore, config: &Config, dry_run: bool, force: bool) -> SyncResult {
        let mut result = SyncResult { dry_run, ..SyncResult::default() };

        let Some(github) = &config.github else {
            result.errors.push("provider is not remote, nothing to sync".to_string());
            return result;
        };

        let current_user = match remote.current_user() {
            Ok(u) => u,
            Err(e) => {
                result.errors.push(format!("failed to resolve current user: {e}"));
                return result;
            }
        };

        let raw_items = match remote.fetch_raw_items() {
            Ok(items) => items,
            Err(e) => {
                result.errors.push(format!("failed to fetch project items: {e}"));
                return result;
            }
        };

        let filters = match filter::parse_all(&github.sync.filters) {
            Ok(f) => f,
            Err(e) => {
                result.errors.push(format!("invalid sync filter: {e}"));
                return result;
            }
        };

        let filtered: Vec<&JsonValue> = raw_items
            .iter()
            .filter(|item| {
                remote
                    .build_matchable_item(item, config)
                    .is_some_and(|m: MatchableItem| filter::matches_any(&filters, &m, &current_user))
            })
            .collect();

        let existing = self.scan_synced_files(config);
        let mut order = match BoardOrder::load(&self.order_path(), &Self::column_ids(config)) {
            Ok(o) => o,
            Err(e) => {
                result.errors.push(format!("failed to load tasks.yaml: {e}"));
                return result;
            }
        };

        for item in filtered {
            let Some(task) = remote.map_item_to_task(item, config) else { continue };

            let existing_entry = existing.iter().find(|f| f.task.id == task.id);

            if let Some(entry) = existing_entry {
                let last_synced = entry.task.provider_data.last_synced();
                let conflict = last_synced.is_some_and(|t| {
                    entry.task.updated > t && task.updated > t
                });

                if conflict && !force {
                    debug!(id = %task.id, "conflict, skipping pull");
                    result.conflicts += 1;
                    continue;
                }

                if dry_run {
                    result.pulled += 1;
                    continue;
                }

                if let Err(e) = write_pulled_file(&entry.path, &task, self.clock, &mut order) {
                    result.errors.push(format!("{}: {e}", task.id));
                    continue;
                }
                result.pulled += 1;
            } else {
                if dry_run {
                    result.pulled += 1;
                    continue;
                }

                let ProviderData::Remote { repository, issue_number, .. } = &task.provider_data else { continue };
                let Some((owner, repo)) = repository.split_once('/') else { continue };
                let filename = slug::generate_synced_filename(owner, repo, *issue_number, &task.title);
                let path = self.task_root.join(&filename);

                if let Err(e) = write_pulled_file(&path, &task, self.clock, &mut order) {
                    result.errors.push(format!("{}: {e}", task.id));
                    continue;
                }
                result.pulled += 1;
            }
        }

        if !dry_run {
            if let Err(e) = order.save(&self.order_path()) {
                result.errors.push(format!("failed to save tasks.yaml: {e}"));
            }
        }

        result
    }

    /// Fetches the remote item set and the local synced/local-only files,
    /// then hands them to [`Self::classify_changes`] for pure classification.
    #[must_use]
    pub fn detect_changes(&self, remote: &mut RemoteStore, config: &Config) -> ChangeSet {
        let Some(github) = &config.github else { return ChangeSet::default() };

        let current_user = remote.current_user().unwrap_or_default();
        let raw_items = remote.fetch_raw_items().unwrap_or_default();
        let filters = filter::parse_all(&github.sync.filters).unwrap_or_default();

        let filtered: Vec<Task> = raw_items
            .iter()
            .filter(|item| {
                remote
                    .build_matchable_item(item, config)
                    .is_some_and(|m: MatchableItem| filter::matches_any(&filters, &m, &current_user))
            })
            .filter_map(|item| remote.map_item_to_task(item, config))
            .collect();

        let existing = self.scan_synced_files(config);
        let local_only = self.find_local_only_tasks(config).unwrap_or_default();

        Self::classify_changes(&existing, &filtered, &local_only)
    }

    /// Pure classification of which synced/local-only tasks need to move
    /// which direction, with no writes. The three result lists are disjoint:
    /// a synced task lands in exactly one of `to_pull`/`to_push`/`conflicts`,
    /// and a local-only task only ever lands in `to_push`.
    fn classify_changes(existing: &[SyncedFile], filtered: &[Task], local_only: &[Task]) -> ChangeSet {
        let mut change_set = ChangeSet::default();

        for entry in existing {
            let Some(remote_task) = filtered.iter().find(|t| t.id == entry.task.id) else {
                continue;
            };
            let push_changes = entry
                .mapping
                .get("push_changes")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            match entry.task.provider_data.last_synced() {
                None => change_set.to_pull.push(entry.task.id.clone()),
                Some(last_synced) => {
                    let local_changed = entry.task.updated > last_synced;
                    let remote_changed = remote_task.updated > last_synced;

                    if local_changed && remote_changed {
                        change_set.conflicts.push(Conflict {
                            task_id: entry.task.id.clone(),
                            local_updated: entry.task.updated,
                            remote_updated: remote_task.updated,
                            last_synced,
                        });
                    } else if local_changed {
                        if push_changes {
                            change_set.to_push.push(entry.task.id.clone());
                        }
                    } else if remote_changed {
                        change_set.to_pull.push(entry.task.id.clone());
                    }
                }
            }
        }

        for task in filtered {
            if !existing.iter().any(|e| e.task.id == task.id) {
                change_set.to_pull.push(task.id.clone());
            }
        }

        change_set.to_push.extend(local_only.iter().map(|t| t.id.clone()));

        change_set
    }
}

/// Write a fresh canonical-order frontmatter mapping for a pulled task,
/// then add/move its id in `order`.
fn write_pulled_file(path: &Path, task: &Task, clock: &dyn Clock, order: &mut BoardOrder) -> Result<()> {
    let metadata = build_pull_frontmatter(task, clock);
    let text = frontmatter::emit(&metadata, &task.body);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;

    if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
        order.place(filename, &task.state);
    }
    Ok(())
}

/// Build the canonical key order for a pulled task: `title, state,
/// priority, type, tags, created, updated, github: {...}, push_changes,
/// close_on_github`.
fn build_pull_frontmatter(task: &Task, clock: &dyn Clock) -> Mapping {
    let mut map = Mapping::new();
    map.insert(Value::from("title"), Value::from(task.title.clone()));
    map.insert(Value::from("state"), Value::from(task.state.clone()));
    map.insert(Value::from("priority"), Value::from(task.priority.clone()));
    if let Some(t) = &task.r#type {
        map.insert(Value::from("type"), Value::from(t.clone()));
    }
    let tags = task.tags.iter().map(|t| Value::from(t.clone())).collect();
    map.insert(Value::from("tags"), Value::Sequence(tags));
    map.insert(Value::from("created"), Value::from(format_utc_timestamp(task.created)));
    map.insert(Value::from("updated"), Value::from(format_utc_timestamp(task.updated)));

    if let ProviderData::Remote {
        project_item_id,
        issue_node_id,
        repository,
        issue_number,
        priority_label,
        priority_source,
        ..
    } = &task.provider_data
    {
        let mut github = Mapping::new();
        github.insert(Value::from("synced"), Value::from(true));
        github.insert(Value::from("issue_number"), Value::from(*issue_number));
        github.insert(Value::from("repository"), Value::from(repository.clone()));
        github.insert(Value::from("project_item_id"), Value::from(project_item_id.clone()));
        github.insert(Value::from("issue_node_id"), Value::from(issue_node_id.clone()));
        github.insert(Value::from("last_synced"), Value::from(format_utc_timestamp(clock.now_utc())));
        let source = match priority_source {
            crate::model::PrioritySource::Labels => "labels",
            crate::model::PrioritySource::Field => "field",
        };
        github.insert(Value::from("priority_source"), Value::from(source));
        if let Some(label) = priority_label {
            github.insert(Value::from("priority_label"), Value::from(label.clone()));
        }
        map.insert(Value::from("github"), Value::Mapping(github));
    }

    map.insert(Value::from("push_changes"), Value::from(false));
    map.insert(Value::from("close_on_github"), Value::from(false));
    map
}

/// Parse a task file directly through the frontmatter codec, independent of
/// `FilesystemStore`'s cache: the Sync Engine owns its own file access,
/// mirroring how it owns its own raw item fetch.
fn read_task_file(path: &Path, filename: &str, config: &Config) -> Option<(Task, Mapping)> {
    let contents = fs::read_to_string(path).ok()?;
    let Document { metadata, body } = frontmatter::parse(&contents, filename)?;
    let task = task_from_frontmatter(filename, &metadata, body, config)?;
    Some((task, metadata))
}

fn task_from_frontmatter(filename: &str, metadata: &Mapping, body: String, config: &Config) -> Option<Task> {
    let str_at = |key: &str| metadata.get(key).and_then(Value::as_str).map(str::to_string);

    let title = str_at("title").unwrap_or_else(|| filename.trim_end_matches(".md").to_string());
    let raw_state = str_at("state").unwrap_or_else(|| "todo".to_string());
    let state = config.resolve_status(&raw_state);
    let priority = str_at("priority").unwrap_or_else(|| crate::model::DEFAULT_PRIORITY.to_string());
    let r#type = str_at("type");
    let tags = metadata
        .get("tags")
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let created = str_at("created")
        .and_then(|s| crate::util::time::parse_utc_timestamp(&s).ok())
        .unwrap_or_else(chrono::Utc::now);
    let updated = str_at("updated").and_then(|s| crate::util::time::parse_utc_timestamp(&s).ok()).unwrap_or(created);

    let provider_data = match metadata.get("github").and_then(Value::as_mapping) {
        Some(gh) => {
            let gh_str = |key: &str| gh.get(key).and_then(Value::as_str).map(str::to_string);
            let parsed_name = slug::parse_synced_filename(filename);

            let repository =
                parsed_name.as_ref().map(slug::ParsedSyncedFilename::repository).or_else(|| gh_str("repository"));
            let issue_number =
                parsed_name.as_ref().map(|p| p.number).or_else(|| gh.get("issue_number").and_then(Value::as_u64));

            let (Some(repository), Some(issue_number)) = (repository, issue_number) else {
                warn!(file = filename, "github frontmatter missing repository/issue_number, skipping file");
                return None;
            };

            let priority_source = match gh_str("priority_source").as_deref() {
                Some("field") => crate::model::PrioritySource::Field,
                _ => crate::model::PrioritySource::Labels,
            };

            ProviderData::Remote {
                project_item_id: gh_str("project_item_id").unwrap_or_default(),
                issue_node_id: gh_str("issue_node_id").unwrap_or_default(),
                repository,
                issue_number,
                type_label: None,
                priority_label: gh_str("priority_label"),
                last_synced: gh_str("last_synced").and_then(|s| crate::util::time::parse_utc_timestamp(&s).ok()),
                priority_source,
            }
        }
        None => ProviderData::File,
    };

    let id = match &provider_data {
        ProviderData::Remote { repository, issue_number, .. } => Task::remote_id(repository, *issue_number),
        ProviderData::File => filename.to_string(),
    };

    Some(Task { id, title, body, state, priority, r#type, tags, created, updated, provider_data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::{GithubConfig, Provider, SyncConfig};
    use chrono::{TimeZone, Utc};

    fn config() -> Config {
        let mut config = Config::default();
        config.provider = Provider::Remote;
        config.github = Some(GithubConfig {
            project_url: "https://github.com/orgs/acme/projects/1".to_string(),
            default_repo: "acme/proj".to_string(),
            base_url: "api.github.com".to_string(),
            include_drafts: false,
            include_prs: false,
            include_closed: false,
            priority_field: None,
            sync: SyncConfig { enabled: true, filters: vec!["*".to_string()], task_root: None },
        });
        config
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    fn remote_task(id: &str, updated: chrono::DateTime<chrono::Utc>, last_synced: Option<chrono::DateTime<chrono::Utc>>) -> Task {
        Task {
            id: id.to_string(),
            title: "Fix login".to_string(),
            body: String::new(),
            state: "todo".to_string(),
            priority: "medium".to_string(),
            r#type: None,
            tags: vec![],
            created: updated,
            updated,
            provider_data: ProviderData::Remote {
                project_item_id: "PVTI_1".to_string(),
                issue_node_id: "I_1".to_string(),
                repository: "acme/proj".to_string(),
                issue_number: 7,
                type_label: None,
                priority_label: None,
                last_synced,
                priority_source: crate::model::PrioritySource::Labels,
            },
        }
    }

    #[test]
    fn find_local_only_tasks_skips_synced_filenames() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fix-thing.md"), "---\ntitle: Fix thing\nstate: todo\n---\nBody.\n").unwrap();
        fs::write(
            dir.path().join("acme-proj#7-fix-login.md"),
            "---\ntitle: Fix login\nstate: todo\ngithub:\n  synced: true\n  issue_number: 7\n  repository: acme/proj\n---\n",
        )
        .unwrap();

        let clock = clock();
        let engine = SyncEngine::new(dir.path(), &clock);
        let tasks = engine.find_local_only_tasks(&config()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "fix-thing.md");
    }

    #[test]
    fn classify_changes_separates_conflicts_pulls_and_pushes() {
        let t3 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t4 = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let t5 = Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap();

        // Conflicting pair: local updated at t5, remote at t4, both newer
        // than the last sync at t3.
        let conflict_id = "acme-proj#7-fix-login.md";
        let local_conflict = remote_task(conflict_id, t5, Some(t3));
        let remote_conflict = remote_task(conflict_id, t4, None);

        // Remote-only changed since last sync: pulls.
        let pull_id = "acme-proj#8-fix-signup.md";
        let local_unchanged = remote_task(pull_id, t3, Some(t3));
        let remote_changed = remote_task(pull_id, t5, None);

        // A brand new remote item with no local file yet: also pulls.
        let new_remote_id = "acme-proj#9-new-item.md";
        let new_remote = remote_task(new_remote_id, t4, None);

        let existing = vec![
            SyncedFile { task: local_conflict, path: PathBuf::from(conflict_id), mapping: Mapping::new() },
            SyncedFile { task: local_unchanged, path: PathBuf::from(pull_id), mapping: Mapping::new() },
        ];
        let filtered = vec![remote_conflict, remote_changed, new_remote];
        let local_only = vec![Task {
            id: "fix-thing.md".to_string(),
            title: "Fix thing".to_string(),
            body: String::new(),
            state: "todo".to_string(),
            priority: "medium".to_string(),
            r#type: None,
            tags: vec![],
            created: t3,
            updated: t3,
            provider_data: ProviderData::File,
        }];

        let change_set = SyncEngine::classify_changes(&existing, &filtered, &local_only);

        assert_eq!(change_set.conflicts.len(), 1);
        assert_eq!(change_set.conflicts[0].task_id, conflict_id);
        assert_eq!(change_set.conflicts[0].local_updated, t5);
        assert_eq!(change_set.conflicts[0].remote_updated, t4);
        assert_eq!(change_set.conflicts[0].last_synced, t3);

        assert!(!change_set.to_pull.contains(&conflict_id.to_string()));
        assert!(!change_set.to_push.contains(&conflict_id.to_string()));

        assert!(change_set.to_pull.contains(&pull_id.to_string()));
        assert!(change_set.to_pull.contains(&new_remote_id.to_string()));
        assert!(change_set.to_push.contains(&"fix-thing.md".to_string()));

        let conflict_ids: std::collections::HashSet<&String> =
            change_set.conflicts.iter().map(|c| &c.task_id).collect();
        let pull_ids: std::collections::HashSet<&String> = change_set.to_pull.iter().collect();
        let push_ids: std::collections::HashSet<&String> = change_set.to_push.iter().collect();
        assert!(conflict_ids.is_disjoint(&pull_ids));
        assert!(conflict_ids.is_disjoint(&push_ids));
        assert!(pull_ids.is_disjoint(&push_ids));
    }

    proptest::proptest! {
        // No id appears in two of classify_changes's three result lists,
        // for any combination of local/remote/last-synced ticks and
        // push_changes flags.
        #[test]
        fn classify_changes_result_lists_are_always_disjoint(
            entries in proptest::collection::vec(
                (0i64..5, proptest::option::of(0i64..5), 0i64..5, proptest::bool::ANY),
                0..6,
            ),
        ) {
            let mut existing = Vec::new();
            let mut filtered = Vec::new();

            for (i, (local_tick, synced_tick, remote_tick, push_changes)) in entries.into_iter().enumerate() {
                let id = format!("acme-proj#{i}-task.md");
                let local_updated = Utc.timestamp_opt(local_tick * 1000, 0).unwrap();
                let last_synced = synced_tick.map(|t| Utc.timestamp_opt(t * 1000, 0).unwrap());
                let remote_updated = Utc.timestamp_opt(remote_tick * 1000, 0).unwrap();

                let local_task = remote_task(&id, local_updated, last_synced);
                let remote_side_task = remote_task(&id, remote_updated, None);

                let mut mapping = Mapping::new();
                mapping.insert(Value::from("push_changes"), Value::from(push_changes));

                existing.push(SyncedFile { task: local_task, path: PathBuf::from(&id), mapping });
                filtered.push(remote_side_task);
            }

            let change_set = SyncEngine::classify_changes(&existing, &filtered, &[]);

            let conflict_ids: std::collections::HashSet<&String> =
                change_set.conflicts.iter().map(|c| &c.task_id).collect();
            let pull_ids: std::collections::HashSet<&String> = change_set.to_pull.iter().collect();
            let push_ids: std::collections::HashSet<&String> = change_set.to_push.iter().collect();

            proptest::prop_assert!(conflict_ids.is_disjoint(&pull_ids));
            proptest::prop_assert!(conflict_ids.is_disjoint(&push_ids));
            proptest::prop_assert!(pull_ids.is_disjoint(&push_ids));
        }
    }

    #[test]
    fn handle_pushed_file_rename_moves_to_synced_form_and_updates_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fix-thing.md"), "---\ntitle: Fix thing\nstate: todo\n---\nBody.\n").unwrap();
        let mut order = BoardOrder::new(&["todo".to_string(), "archived".to_string()]);
        order.place("fix-thing.md", "todo");
        order.save(&dir.path().join("tasks.yaml")).unwrap();

        let clock = clock();
        let engine = SyncEngine::new(dir.path(), &clock);
        engine
            .handle_pushed_file("fix-thing.md", "acme/proj#42", PostPushAction::Rename, &config())
            .unwrap();

        assert!(!dir.path().join("fix-thing.md").exists());
        assert!(dir.path().join("acme-proj#42-fix-thing.md").exists());

        let order = BoardOrder::load(&dir.path().join("tasks.yaml"), &["todo".to_string(), "archived".to_string()])
            .unwrap();
        assert_eq!(order.list("todo"), &["acme-proj#42-fix-thing.md".to_string()]);
    }

    #[test]
    fn handle_pushed_file_archive_sets_archived_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fix-thing.md");
        fs::write(&path, "---\ntitle: Fix thing\nstate: todo\n---\nBody.\n").unwrap();

        let clock = clock();
        let engine = SyncEngine::new(dir.path(), &clock);
        engine.handle_pushed_file("fix-thing.md", "acme/proj#42", PostPushAction::Archive, &config()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("archived: true"));
        assert!(contents.contains("state: archived"));
    }

    #[test]
    fn handle_pushed_file_delete_removes_file_and_order_entry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fix-thing.md"), "---\ntitle: Fix thing\nstate: todo\n---\nBody.\n").unwrap();
        let mut order = BoardOrder::new(&["todo".to_string(), "archived".to_string()]);
        order.place("fix-thing.md", "todo");
        order.save(&dir.path().join("tasks.yaml")).unwrap();

        let clock = clock();
        let engine = SyncEngine::new(dir.path(), &clock);
        engine.handle_pushed_file("fix-thing.md", "acme/proj#42", PostPushAction::Delete, &config()).unwrap();

        assert!(!dir.path().join("fix-thing.md").exists());
        let order = BoardOrder::load(&dir.path().join("tasks.yaml"), &["todo".to_string(), "archived".to_string()])
            .unwrap();
        assert!(order.list("todo").is_empty());
    }

    #[test]
    fn build_pull_frontmatter_matches_canonical_key_order() {
        let clock = clock();
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let task = remote_task("acme/proj#7", t, None);
        let map = build_pull_frontmatter(&task, &clock);
        let keys: Vec<String> = map.keys().map(|k| k.as_str().unwrap_or_default().to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "title".to_string(),
                "state".to_string(),
                "priority".to_string(),
                "tags".to_string(),
                "created".to_string(),
                "updated".to_string(),
                "github".to_string(),
                "push_changes".to_string(),
                "close_on_github".to_string(),
            ]
        );
    }

    #[test]
    fn write_pulled_file_places_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let task = remote_task("acme/proj#7", t, None);
        let path = dir.path().join("acme-proj#7-fix-login.md");
        let mut order = BoardOrder::new(&["todo".to_string(), "archived".to_string()]);

        write_pulled_file(&path, &task, &clock, &mut order).unwrap();

        assert!(path.exists());
        assert_eq!(order.list("todo"), &["acme-proj#7-fix-login.md".to_string()]);
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("push_changes: false"));
        assert!(contents.contains("close_on_github: false"));
    }

    #[test]
    fn column_ids_appends_archived() {
        let config = config();
        let ids = SyncEngine::column_ids(&config);
        assert_eq!(ids.last().map(String::as_str), Some(ARCHIVED_STATE));
    }
}
