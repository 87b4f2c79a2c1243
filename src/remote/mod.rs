//! Remote Store: reads and writes tasks against a GitHub Projects V2 board
//! over GraphQL.
//!
//! Caches project metadata (status/priority fields and their options) for
//! the process lifetime — `reload` clears the fetched task cache but keeps
//! metadata, since it rarely changes. Label ids per repository
//! are cached write-through: a lookup miss fetches and caches, a write only
//! updates the cache on success.

pub mod client;
pub mod queries;

use crate::config::{BoardConfig, Config, GithubConfig};
use crate::error::{Result, SltasksError};
use crate::filter::MatchableItem;
use crate::model::{PrioritySource, ProviderData, Task, DEFAULT_PRIORITY};
use crate::slug::slugify_column_id;
use crate::util::time::parse_utc_timestamp;
use client::GithubClient;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

struct SingleSelectField {
    id: String,
    options_ordered: Vec<String>,
    options: HashMap<String, String>,
}

/// Reads and writes tasks backed by a GitHub Projects V2 board.
pub struct RemoteStore {
    client: GithubClient,
    github: GithubConfig,

    project_id: Option<String>,
    status_field_id: Option<String>,
    status_options: HashMap<String, String>,
    reverse_status_options: HashMap<String, String>,
    status_options_ordered: Vec<String>,

    single_select_fields: HashMap<String, SingleSelectField>,
    priority_field_id: Option<String>,
    priority_options: HashMap<String, String>,
    priority_options_ordered: Vec<String>,

    tasks: IndexMap<String, Task>,
    repo_labels: HashMap<String, HashMap<String, String>>,
    current_user: Option<String>,
}

impl RemoteStore {
    /// # Errors
    ///
    /// Returns `AuthFailed` if no GitHub token can be resolved from the
    /// environment.
    pub fn new(github: GithubConfig) -> Result<Self> {
        let client = GithubClient::from_environment(&github.base_url)?;
        Ok(Self {
            client,
            github,
            project_id: None,
            status_field_id: None,
            status_options: HashMap::new(),
            reverse_status_options: HashMap::new(),
            status_options_ordered: Vec::new(),
            single_select_fields: HashMap::new(),
            priority_field_id: None,
            priority_options: HashMap::new(),
            priority_options_ordered: Vec::new(),
            tasks: IndexMap::new(),
            repo_labels: HashMap::new(),
            current_user: None,
        })
    }

    /// Fetch the project's id and single-select fields (Status, and the
    /// configured priority field, if any) if not already cached.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if `project_url` doesn't parse, `NotFound` if
    /// the project doesn't exist, or a transport/auth error.
    pub fn fetch_project_metadata(&mut self) -> Result<()> {
        if self.project_id.is_some() {
            return Ok(());
        }

        let (owner, number, is_org) = parse_project_url(&self.github.project_url)?;
        let query = if is_org { queries::GET_ORG_PROJECT } else { queries::GET_USER_PROJECT };
        let data = self.client.query(query, json!({ "owner": owner, "number": number }))?;

        let root_key = if is_org { "organization" } else { "user" };
        let project = data
            .get(root_key)
            .and_then(|r| r.get("projectV2"))
            .filter(|p| !p.is_null())
            .ok_or_else(|| SltasksError::NotFound(format!("project not found: {owner}/projects/{number}")))?;

        self.project_id = project.get("id").and_then(Value::as_str).map(str::to_string);
        self.extract_project_fields(project);

        if self.status_field_id.is_none() {
            return Err(SltasksError::SchemaMismatch(
                "Status field not found in project".to_string(),
            ));
        }
        Ok(())
    }

    fn extract_project_fields(&mut self, project: &Value) {
        self.single_select_fields.clear();
        let Some(nodes) = project.get("fields").and_then(|f| f.get("nodes")).and_then(Value::as_array) else {
            return;
        };

        for field in nodes {
            let Some(name) = field.get("name").and_then(Value::as_str) else { continue };
            let Some(options) = field.get("options").and_then(Value::as_array) else { continue };

            let options_ordered: Vec<String> = options
                .iter()
                .filter_map(|o| o.get("name").and_then(Value::as_str).map(str::to_string))
                .collect();
            let options_map: HashMap<String, String> = options
                .iter()
                .filter_map(|o| {
                    let n = o.get("name").and_then(Value::as_str)?;
                    let id = o.get("id").and_then(Value::as_str)?;
                    Some((n.to_string(), id.to_string()))
                })
                .collect();
            let field_id = field.get("id").and_then(Value::as_str).unwrap_or_default().to_string();

            if name == "Status" {
                self.status_field_id = Some(field_id.clone());
                self.status_options = options_map.clone();
                self.reverse_status_options =
                    options_map.iter().map(|(n, i)| (i.clone(), n.clone())).collect();
                self.status_options_ordered = options_ordered.clone();
            }

            self.single_select_fields.insert(
                name.to_string(),
                SingleSelectField { id: field_id, options_ordered, options: options_map },
            );
        }

        if let Some(priority_field) = &self.github.priority_field {
            if let Some(field) = self.single_select_fields.get(priority_field) {
                self.priority_field_id = Some(field.id.clone());
                self.priority_options = field.options.clone();
                self.priority_options_ordered = field.options_ordered.clone();
            }
        }
    }

    /// The authenticated user's login, for `@me` filter expansion. Cached
    /// after the first call.
    ///
    /// # Errors
    ///
    /// Returns a transport/auth error if the query fails.
    pub fn current_user(&mut self) -> Result<String> {
        if let Some(user) = &self.current_user {
            return Ok(user.clone());
        }
        let data = self.client.query(queries::GET_VIEWER, json!({}))?;
        let login = data
            .get("viewer")
            .and_then(|v| v.get("login"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.current_user = Some(login.clone());
        Ok(login)
    }

    /// Load all tasks from the project. No filtering: every
    /// item honoring `include_drafts`/`include_prs`/`include_closed` is
    /// returned, in the order the API paginates them.
    ///
    /// # Errors
    ///
    /// Returns a transport/auth/schema error from the underlying fetch.
    pub fn get_all(&mut self, config: &Config) -> Result<Vec<Task>> {
        self.fetch_project_metadata()?;
        self.fetch_items(config)?;
        Ok(self.tasks.values().cloned().collect())
    }

    /// Look up a single task by its canonical id (`"{repository}#{number}"`).
    ///
    /// # Errors
    ///
    /// Returns a transport/auth/schema error if a fetch is required and
    /// fails.
    pub fn get_by_id(&mut self, task_id: &str, config: &Config) -> Result<Option<Task>> {
        if self.tasks.is_empty() {
            self.get_all(config)?;
        }
        Ok(self.tasks.get(task_id).cloned())
    }

    fn fetch_items(&mut self, config: &Config) -> Result<()> {
        debug!("fetching project items");
        self.tasks.clear();

        let mut cursor: Option<String> = None;
        loop {
            let data = self.client.query(
                queries::GET_PROJECT_ITEMS,
                json!({ "projectId": self.project_id, "cursor": cursor }),
            )?;

            let items_data = data.get("node").and_then(|n| n.get("items")).cloned().unwrap_or(Value::Null);
            let nodes = items_data.get("nodes").and_then(Value::as_array).cloned().unwrap_or_default();

            for item in &nodes {
                if let Some(task) = self.map_item_to_task(item, config) {
                    self.tasks.insert(task.id.clone(), task);
                }
            }

            let page_info = items_data.get("pageInfo").cloned().unwrap_or(Value::Null);
            if page_info.get("hasNextPage").and_then(Value::as_bool).unwrap_or(false) {
                cursor = page_info.get("endCursor").and_then(Value::as_str).map(str::to_string);
            } else {
                break;
            }
        }

        info!(count = self.tasks.len(), "fetched tasks from GitHub project");
        Ok(())
    }

    /// Paginate every project item as raw GraphQL nodes, without mapping to
    /// `Task` or applying `include_*` filtering. Used by the Sync Engine's
    /// pull path, which needs `assignees`/`milestone` for filter matching
    /// before deciding which items to materialize as tasks.
    ///
    /// # Errors
    ///
    /// Returns a transport/auth/schema error from the underlying fetch.
    pub fn fetch_raw_items(&mut self) -> Result<Vec<Value>> {
        self.fetch_project_metadata()?;
        debug!("fetching raw project items");

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let data = self.client.query(
                queries::GET_PROJECT_ITEMS,
                json!({ "projectId": self.project_id, "cursor": cursor }),
            )?;

            let items_data = data.get("node").and_then(|n| n.get("items")).cloned().unwrap_or(Value::Null);
            let nodes = items_data.get("nodes").and_then(Value::as_array).cloned().unwrap_or_default();
            items.extend(nodes);

            let page_info = items_data.get("pageInfo").cloned().unwrap_or(Value::Null);
            if page_info.get("hasNextPage").and_then(Value::as_bool).unwrap_or(false) {
                cursor = page_info.get("endCursor").and_then(Value::as_str).map(str::to_string);
            } else {
                break;
            }
        }

        info!(count = items.len(), "fetched raw project items");
        Ok(items)
    }

    /// Map a raw project item node to a `Task`. Exposed for the Sync Engine,
    /// which fetches items itself (via `fetch_raw_items`) to apply filters
    /// before choosing which ones to pull.
    #[must_use]
    pub fn map_item_to_task(&self, item: &Value, config: &Config) -> Option<Task> {
        self.map_item_to_task_inner(item, config)
    }

    fn content_type(content: &Value) -> &'static str {
        if content.get("isDraft").is_some() {
            "pull_request"
        } else if content.get("number").is_some() {
            "issue"
        } else {
            "draft_issue"
        }
    }

    /// Map a raw project item node to a `Task`, honoring
    /// `include_drafts`/`include_prs`/`include_closed`. Requires project
    /// metadata to already be fetched.
    fn map_item_to_task_inner(&self, item: &Value, config: &Config) -> Option<Task> {
        let content = item.get("content").filter(|c| !c.is_null())?;

        let kind = Self::content_type(content);
        if kind == "draft_issue" && !self.github.include_drafts {
            return None;
        }
        if kind == "pull_request" {
            if !self.github.include_prs {
                return None;
            }
            if content.get("isDraft").and_then(Value::as_bool).unwrap_or(false)
                && !self.github.include_drafts
            {
                return None;
            }
        }
        if kind == "issue"
            && content.get("state").and_then(Value::as_str) == Some("CLOSED")
            && !self.github.include_closed
        {
            return None;
        }

        let repository = content
            .get("repository")
            .and_then(|r| r.get("nameWithOwner"))
            .and_then(Value::as_str)?
            .to_string();
        let issue_number = content.get("number").and_then(Value::as_u64)?;
        let task_id = Task::remote_id(&repository, issue_number);

        let github_status = Self::extract_status(item);
        let state = self.map_status_to_state(github_status.as_deref(), &config.board);

        let labels: Vec<String> = content
            .get("labels")
            .and_then(|l| l.get("nodes"))
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|n| n.get("name").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let (task_type, type_label) = extract_type_from_labels(&labels, &config.board);
        let (priority, priority_label, priority_source) =
            self.extract_priority_from_item(item, &labels, &config.board);

        let tags: Vec<String> = labels
            .into_iter()
            .filter(|l| Some(l.as_str()) != type_label.as_deref() && Some(l.as_str()) != priority_label.as_deref())
            .collect();

        let created = content
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| parse_utc_timestamp(s).ok())
            .unwrap_or_else(chrono::Utc::now);
        let updated = content
            .get("updatedAt")
            .and_then(Value::as_str)
            .and_then(|s| parse_utc_timestamp(s).ok())
            .unwrap_or(created);

        Some(Task {
            id: task_id,
            title: content.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
            body: content.get("body").and_then(Value::as_str).unwrap_or_default().to_string(),
            state,
            priority,
            r#type: task_type,
            tags,
            created,
            updated,
            provider_data: ProviderData::Remote {
                project_item_id: item.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                issue_node_id: content.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                repository,
                issue_number,
                type_label,
                priority_label,
                last_synced: None,
                priority_source,
            },
        })
    }

    fn extract_status(item: &Value) -> Option<String> {
        item.get("fieldValues")?
            .get("nodes")?
            .as_array()?
            .iter()
            .find(|fv| fv.get("field").and_then(|f| f.get("name")).and_then(Value::as_str) == Some("Status"))
            .and_then(|fv| fv.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Map a remote Status value to a local column id: no status -> the
    /// board's first column, otherwise direct slugification.
    fn map_status_to_state(&self, github_status: Option<&str>, board: &BoardConfig) -> String {
        match github_status {
            Some(status) => slugify_column_id(status),
            None => board.columns.first().map_or_else(|| "todo".to_string(), |c| c.id.clone()),
        }
    }

    /// Map a local column id back to a remote Status option name: the first
    /// option whose slugification matches `state`.
    fn map_state_to_status(&self, state: &str) -> Option<String> {
        self.status_options_ordered
            .iter()
            .find(|name| slugify_column_id(name) == state)
            .cloned()
    }

    /// Priority projection: by position in the configured priority field
    /// if one is set, else via labels.
    fn extract_priority_from_item(
        &self,
        item: &Value,
        labels: &[String],
        board: &BoardConfig,
    ) -> (String, Option<String>, PrioritySource) {
        if let (Some(field_name), Some(_)) = (&self.github.priority_field, &self.priority_field_id) {
            if let Some(priority) = self.extract_priority_from_field(item, field_name, board) {
                return (priority, None, PrioritySource::Field);
            }
        }
        let (priority, label) = extract_priority_from_labels(labels, board);
        (priority, label, PrioritySource::Labels)
    }

    fn extract_priority_from_field(&self, item: &Value, field_name: &str, board: &BoardConfig) -> Option<String> {
        let nodes = item.get("fieldValues")?.get("nodes")?.as_array()?;
        let option_name = nodes
            .iter()
            .find(|fv| fv.get("field").and_then(|f| f.get("name")).and_then(Value::as_str) == Some(field_name))
            .and_then(|fv| fv.get("name"))
            .and_then(Value::as_str)?;

        let index = self.priority_options_ordered.iter().position(|n| n == option_name)?;
        board.priorities.get(index).map(|p| p.id.clone())
    }

    /// Build the subset of a raw project item the Filter Parser (C7) can
    /// match against. Requires `assignees`/`milestone` fields that the Sync
    /// Engine's own pull query requests in addition to what `get_all` needs.
    #[must_use]
    pub fn build_matchable_item(&self, item: &Value, config: &Config) -> Option<MatchableItem> {
        let content = item.get("content").filter(|c| !c.is_null())?;
        let repository = content
            .get("repository")
            .and_then(|r| r.get("nameWithOwner"))
            .and_then(Value::as_str)?
            .to_string();

        let assignee_logins = content
            .get("assignees")
            .and_then(|a| a.get("nodes"))
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|n| n.get("login").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let label_names: Vec<String> = content
            .get("labels")
            .and_then(|l| l.get("nodes"))
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|n| n.get("name").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let milestone_title = content
            .get("milestone")
            .filter(|m| !m.is_null())
            .and_then(|m| m.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let is_closed = content.get("state").and_then(Value::as_str) == Some("CLOSED");

        let (_, priority_label, _) = self.extract_priority_from_item(item, &label_names, &config.board);
        let priority = priority_label
            .as_deref()
            .map(|l| l.to_lowercase())
            .or_else(|| {
                let (p, label) = extract_priority_from_labels(&label_names, &config.board);
                if label.is_some() { Some(p.to_lowercase()) } else { None }
            });

        Some(MatchableItem { assignee_logins, label_names, milestone_title, is_closed, repository, priority })
    }

    /// Save a task: create a new issue if it has no remote identity yet,
    /// otherwise update the existing one.
    ///
    /// # Errors
    ///
    /// Returns a transport/auth/schema error, or `ConfigInvalid` if creating
    /// requires `default_repo` and none is configured.
    pub fn save(&mut self, task: Task, config: &Config) -> Result<Task> {
        match &task.provider_data {
            ProviderData::File => self.create_issue(task, config),
            ProviderData::Remote { .. } => self.update_issue(task, config),
        }
    }

    fn create_issue(&mut self, mut task: Task, config: &Config) -> Result<Task> {
        if self.github.default_repo.is_empty() {
            return Err(SltasksError::ConfigInvalid(
                "default_repo is required in github config to create issues".to_string(),
            ));
        }
        let repo = self.github.default_repo.clone();
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| SltasksError::ConfigInvalid(format!("invalid default_repo: {repo}")))?;

        let repo_data = self.client.query(queries::GET_REPOSITORY, json!({ "owner": owner, "name": name }))?;
        let repo_id = repo_data
            .get("repository")
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| SltasksError::NotFound(format!("repository not found: {repo}")))?
            .to_string();

        let issue_data = self
            .client
            .mutate(
                queries::CREATE_ISSUE,
                json!({
                    "repositoryId": repo_id,
                    "title": if task.title.is_empty() { "Untitled" } else { task.title.as_str() },
                    "body": task.body,
                }),
            )?
            .get("createIssue")
            .and_then(|c| c.get("issue"))
            .cloned()
            .ok_or_else(|| SltasksError::SchemaMismatch("createIssue returned no issue".to_string()))?;

        self.fetch_project_metadata()?;
        let item_data = self
            .client
            .mutate(
                queries::ADD_ITEM_TO_PROJECT,
                json!({ "projectId": self.project_id, "contentId": issue_data.get("id") }),
            )?
            .get("addProjectV2ItemById")
            .and_then(|r| r.get("item"))
            .cloned()
            .ok_or_else(|| SltasksError::SchemaMismatch("addProjectV2ItemById returned no item".to_string()))?;
        let item_id = item_data.get("id").and_then(Value::as_str).unwrap_or_default().to_string();

        if let Some(status_name) = self.map_state_to_status(&task.state) {
            if let Some(field_id) = self.status_field_id.clone() {
                if let Some(option_id) = self.status_options.get(&status_name).cloned() {
                    self.client.mutate(
                        queries::UPDATE_ITEM_FIELD,
                        json!({
                            "projectId": self.project_id,
                            "itemId": item_id,
                            "fieldId": field_id,
                            "optionId": option_id,
                        }),
                    )?;
                }
            }
        }

        let issue_number = issue_data.get("number").and_then(Value::as_u64).unwrap_or_default();
        let issue_node_id = issue_data.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        task.id = Task::remote_id(&repo, issue_number);
        task.created = issue_data
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| parse_utc_timestamp(s).ok())
            .unwrap_or(task.created);
        task.updated = issue_data
            .get("updatedAt")
            .and_then(Value::as_str)
            .and_then(|s| parse_utc_timestamp(s).ok())
            .unwrap_or(task.updated);
        task.provider_data = ProviderData::Remote {
            project_item_id: item_id,
            issue_node_id: issue_node_id.clone(),
            repository: repo.clone(),
            issue_number,
            type_label: None,
            priority_label: None,
            last_synced: None,
            priority_source: if self.github.priority_field.is_some() {
                PrioritySource::Field
            } else {
                PrioritySource::Labels
            },
        };

        self.update_priority_field(&task, config)?;

        let (labels_to_add, labels_to_remove) = self.compute_label_changes(&task, None, config);
        self.update_labels(&issue_node_id, &repo, labels_to_add, labels_to_remove);

        if let ProviderData::Remote { type_label, priority_label, .. } = &mut task.provider_data {
            *type_label = task_type_write_label(&task.r#type, &config.board);
            if self.github.priority_field.is_none() {
                *priority_label = config.get_priority(&task.priority).map(|p| config.write_alias_for_priority(&p.id));
            }
        }

        self.tasks.insert(task.id.clone(), task.clone());
        info!(id = %task.id, "created GitHub issue");
        Ok(task)
    }

    fn update_issue(&mut self, mut task: Task, config: &Config) -> Result<Task> {
        let ProviderData::Remote { issue_node_id, project_item_id, repository, .. } = task.provider_data.clone()
        else {
            return Err(SltasksError::InvalidState("task has no remote identity".to_string()));
        };

        let old_task = self.tasks.get(&task.id).cloned();

        self.client.mutate(
            queries::UPDATE_ISSUE,
            json!({ "issueId": issue_node_id, "title": task.title, "body": task.body }),
        )?;

        self.fetch_project_metadata()?;
        match (self.map_state_to_status(&task.state), self.status_field_id.clone()) {
            (Some(status_name), Some(field_id)) => {
                if let Some(option_id) = self.status_options.get(&status_name).cloned() {
                    self.client.mutate(
                        queries::UPDATE_ITEM_FIELD,
                        json!({
                            "projectId": self.project_id,
                            "itemId": project_item_id,
                            "fieldId": field_id,
                            "optionId": option_id,
                        }),
                    )?;
                } else {
                    warn!(state = %task.state, "status option not found, not updating");
                }
            }
            _ => warn!(state = %task.state, "could not map state to a GitHub status"),
        }

        self.update_priority_field(&task, config)?;

        let (labels_to_add, labels_to_remove) = self.compute_label_changes(&task, old_task.as_ref(), config);
        self.update_labels(&issue_node_id, &repository, labels_to_add, labels_to_remove);

        if let ProviderData::Remote { type_label, priority_label, .. } = &mut task.provider_data {
            *type_label = task_type_write_label(&task.r#type, &config.board);
            if self.github.priority_field.is_none() {
                *priority_label = config.get_priority(&task.priority).map(|p| config.write_alias_for_priority(&p.id));
            }
        }

        self.tasks.insert(task.id.clone(), task.clone());
        info!(id = %task.id, "updated GitHub issue");
        Ok(task)
    }

    fn fetch_repo_labels(&mut self, repository: &str) -> HashMap<String, String> {
        if let Some(cached) = self.repo_labels.get(repository) {
            return cached.clone();
        }
        let Some((owner, name)) = repository.split_once('/') else { return HashMap::new() };

        match self.client.query(queries::GET_REPOSITORY_LABELS, json!({ "owner": owner, "name": name })) {
            Ok(data) => {
                let labels: HashMap<String, String> = data
                    .get("repository")
                    .and_then(|r| r.get("labels"))
                    .and_then(|l| l.get("nodes"))
                    .and_then(Value::as_array)
                    .map(|nodes| {
                        nodes
                            .iter()
                            .filter_map(|n| {
                                let name = n.get("name").and_then(Value::as_str)?;
                                let id = n.get("id").and_then(Value::as_str)?;
                                Some((name.to_string(), id.to_string()))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                self.repo_labels.insert(repository.to_string(), labels.clone());
                labels
            }
            Err(e) => {
                warn!(repository, error = %e, "failed to fetch labels");
                HashMap::new()
            }
        }
    }

    fn compute_label_changes(
        &self,
        task: &Task,
        old_task: Option<&Task>,
        config: &Config,
    ) -> (Vec<String>, Vec<String>) {
        if !task.provider_data.is_remote() {
            return (Vec::new(), Vec::new());
        }

        let (old_type_label, old_priority_label) = match old_task.map(|t| &t.provider_data) {
            Some(ProviderData::Remote { type_label, priority_label, .. }) => {
                (type_label.clone(), priority_label.clone())
            }
            _ => (None, None),
        };

        let mut add = Vec::new();
        let mut remove = Vec::new();

        let new_type_label = task_type_write_label(&task.r#type, &config.board);
        match (&new_type_label, &old_type_label) {
            (Some(new), Some(old)) if new != old => {
                remove.push(old.clone());
                add.push(new.clone());
            }
            (Some(new), None) => add.push(new.clone()),
            (None, Some(old)) => remove.push(old.clone()),
            _ => {}
        }

        let mut new_priority_label = None;
        if self.github.priority_field.is_none() {
            if let Some(priority_config) = config.get_priority(&task.priority) {
                let label = config.write_alias_for_priority(&priority_config.id);
                if Some(&label) != old_priority_label.as_ref() {
                    if let Some(old) = &old_priority_label {
                        remove.push(old.clone());
                    }
                    add.push(label.clone());
                }
                new_priority_label = Some(label);
            }
        }

        if let Some(old_task) = old_task {
            let old_tags: std::collections::HashSet<&String> = old_task.tags.iter().collect();
            let new_tags: std::collections::HashSet<&String> = task.tags.iter().collect();

            for tag in new_tags.difference(&old_tags) {
                if !add.contains(tag) && Some(tag.as_str()) != new_type_label.as_deref() && Some(tag.as_str()) != new_priority_label.as_deref() {
                    add.push((*tag).clone());
                }
            }
            for tag in old_tags.difference(&new_tags) {
                if !remove.contains(tag) && Some(tag.as_str()) != old_type_label.as_deref() && Some(tag.as_str()) != old_priority_label.as_deref() {
                    remove.push((*tag).clone());
                }
            }
        }

        (add, remove)
    }

    fn update_labels(&mut self, issue_node_id: &str, repository: &str, add: Vec<String>, remove: Vec<String>) {
        if add.is_empty() && remove.is_empty() {
            return;
        }
        let repo_labels = self.fetch_repo_labels(repository);

        if !remove.is_empty() {
            let ids: Vec<&String> = remove.iter().filter_map(|n| repo_labels.get(n)).collect();
            if !ids.is_empty() {
                if let Err(e) = self
                    .client
                    .mutate(queries::REMOVE_LABELS, json!({ "labelableId": issue_node_id, "labelIds": ids }))
                {
                    warn!(error = %e, "failed to remove labels");
                }
            }
        }

        if !add.is_empty() {
            let ids: Vec<&String> = add.iter().filter_map(|n| repo_labels.get(n)).collect();
            if !ids.is_empty() {
                if let Err(e) =
                    self.client.mutate(queries::ADD_LABELS, json!({ "labelableId": issue_node_id, "labelIds": ids }))
                {
                    warn!(error = %e, "failed to add labels");
                }
            }
            let missing: Vec<&String> = add.iter().filter(|n| !repo_labels.contains_key(n.as_str())).collect();
            if !missing.is_empty() {
                warn!(repository, ?missing, "labels not found in repository, will not be created");
            }
        }
    }

    fn update_priority_field(&mut self, task: &Task, config: &Config) -> Result<()> {
        let Some(field_id) = self.priority_field_id.clone() else { return Ok(()) };
        if !task.provider_data.is_remote() {
            return Ok(());
        }

        let Some(index) = config.board.priorities.iter().position(|p| p.id == task.priority) else {
            warn!(priority = %task.priority, "unknown priority, not updating field");
            return Ok(());
        };
        let Some(option_name) = self.priority_options_ordered.get(index) else {
            warn!(index, "priority index exceeds available field options, not updating");
            return Ok(());
        };
        let Some(option_id) = self.priority_options.get(option_name).cloned() else { return Ok(()) };

        let ProviderData::Remote { project_item_id, .. } = &task.provider_data else { return Ok(()) };
        let project_item_id = project_item_id.clone();

        self.client.mutate(
            queries::UPDATE_ITEM_FIELD,
            json!({
                "projectId": self.project_id,
                "itemId": project_item_id,
                "fieldId": field_id,
                "optionId": option_id,
            }),
        )?;
        Ok(())
    }

    /// Close the issue backing `task_id`. Tolerates the issue already being
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns a transport/auth error other than one indicating the issue
    /// was already closed.
    pub fn delete(&mut self, task_id: &str, config: &Config) -> Result<()> {
        let Some(task) = self.get_by_id(task_id, config)? else {
            debug!(task_id, "delete: task not found");
            return Ok(());
        };
        let ProviderData::Remote { issue_node_id, .. } = task.provider_data else { return Ok(()) };

        match self.client.mutate(queries::CLOSE_ISSUE, json!({ "issueId": issue_node_id })) {
            Ok(_) => info!(task_id, "closed GitHub issue"),
            Err(e) => debug!(task_id, error = %e, "failed to close issue (may already be closed)"),
        }

        self.tasks.shift_remove(task_id);
        Ok(())
    }

    /// Move `task_id` to appear after `after_task_id` (`None` for first
    /// position) in the project's manual ordering.
    ///
    /// # Errors
    ///
    /// Returns a transport/auth error, or `Ok(false)` if either task id is
    /// unknown or not remote-backed.
    pub fn reorder_task(&mut self, task_id: &str, after_task_id: Option<&str>, config: &Config) -> Result<bool> {
        let Some(task) = self.get_by_id(task_id, config)? else {
            warn!(task_id, "reorder_task: task not found");
            return Ok(false);
        };
        let ProviderData::Remote { project_item_id, .. } = &task.provider_data else {
            return Ok(false);
        };

        let after_item_id = match after_task_id {
            Some(after_id) => match self.get_by_id(after_id, config)? {
                Some(after_task) => match &after_task.provider_data {
                    ProviderData::Remote { project_item_id, .. } => Some(project_item_id.clone()),
                    ProviderData::File => None,
                },
                None => {
                    warn!(after_id, "reorder_task: after_task not found");
                    None
                }
            },
            None => None,
        };

        self.fetch_project_metadata()?;
        self.client.mutate(
            queries::UPDATE_ITEM_POSITION,
            json!({ "projectId": self.project_id, "itemId": project_item_id, "afterId": after_item_id }),
        )?;
        info!(task_id, "reordered task in GitHub project");
        Ok(true)
    }

    /// Clear the fetched task cache; project metadata (fields, options) is
    /// kept since it rarely changes.
    pub fn reload(&mut self) {
        self.tasks.clear();
    }
}

fn task_type_write_label(task_type: &Option<String>, board: &BoardConfig) -> Option<String> {
    let type_id = task_type.as_ref()?;
    board.types.iter().find(|t| &t.id == type_id).map(|t| t.canonical_alias.clone().unwrap_or_else(|| t.id.clone()))
}

fn extract_type_from_labels(labels: &[String], board: &BoardConfig) -> (Option<String>, Option<String>) {
    for label in labels {
        let lower = label.to_lowercase();
        for type_config in &board.types {
            if lower == type_config.id
                || type_config.type_alias.iter().any(|a| a == &lower)
                || type_config.canonical_alias.as_deref().is_some_and(|c| lower == c.to_lowercase())
            {
                return (Some(type_config.id.clone()), Some(label.clone()));
            }
        }
    }
    (None, None)
}

fn extract_priority_from_labels(labels: &[String], board: &BoardConfig) -> (String, Option<String>) {
    for label in labels {
        let lower = label.to_lowercase();
        for priority_config in &board.priorities {
            if lower == priority_config.id
                || priority_config.priority_alias.iter().any(|a| a == &lower)
                || priority_config.canonical_alias.as_deref().is_some_and(|c| lower == c.to_lowercase())
            {
                return (priority_config.id.clone(), Some(label.clone()));
            }
        }
    }
    (DEFAULT_PRIORITY.to_string(), None)
}

/// Parse a GitHub Projects URL into `(owner, project_number, is_org)`.
///
/// Accepts `https://github.com/orgs/{owner}/projects/{n}`,
/// `https://github.com/users/{owner}/projects/{n}`, and the same with a
/// trailing `/views/{n}`.
fn parse_project_url(url: &str) -> Result<(String, u32, bool)> {
    let trimmed = url.trim_end_matches('/');
    let mut parts: Vec<&str> = trimmed.split('/').collect();

    if let Some(views_idx) = parts.iter().position(|p| *p == "views") {
        parts.truncate(views_idx);
    }

    let invalid = || SltasksError::ConfigInvalid(format!("invalid project URL: {url}"));

    let number: u32 = parts.last().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let owner = parts.get(parts.len().wrapping_sub(3)).ok_or_else(invalid)?;
    let is_org = parts.get(parts.len().wrapping_sub(4)).ok_or_else(invalid)? == &"orgs";

    Ok(((*owner).to_string(), number, is_org))
}
