//! Configuration model.
//!
//! Loads `sltasks.yml`. Validation failures at load are reported but not
//! fatal: the loader falls back to [`Config::default`] and the caller is
//! handed back a `config_error` flag plus the warnings, so the core keeps
//! running.

use crate::error::{Result, SltasksError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Which backend holds the task content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    File,
    Remote,
}

impl Default for Provider {
    fn default() -> Self {
        Self::File
    }
}

/// A single board column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status_alias: Vec<String>,
}

/// A single task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntry {
    pub id: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub type_alias: Vec<String>,
    #[serde(default)]
    pub canonical_alias: Option<String>,
}

/// A single priority level. Priorities are ordered lowest-to-highest by
/// position in `Config::priorities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub id: String,
    pub label: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default)]
    pub priority_alias: Vec<String>,
    #[serde(default)]
    pub canonical_alias: Option<String>,
}

impl TypeEntry {
    /// Template file name under the templates directory: the explicit
    /// `template` override, or `"{id}.md"` by default.
    #[must_use]
    pub fn template_filename(&self) -> String {
        self.template.clone().unwrap_or_else(|| format!("{}.md", self.id))
    }
}

fn default_color() -> String {
    "white".to_string()
}

fn default_symbol() -> String {
    "\u{25cf}".to_string()
}

/// Filters gating which remote items sync locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub task_root: Option<String>,
}

/// Remote (GitHub Projects-shaped) configuration, present when
/// `provider: remote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    pub project_url: String,
    pub default_repo: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub include_drafts: bool,
    #[serde(default)]
    pub include_prs: bool,
    #[serde(default)]
    pub include_closed: bool,
    #[serde(default)]
    pub priority_field: Option<String>,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_base_url() -> String {
    "api.github.com".to_string()
}

/// Board-level vocabulary: columns, types, priorities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub columns: Vec<Column>,
    #[serde(default)]
    pub types: Vec<TypeEntry>,
    #[serde(default)]
    pub priorities: Vec<PriorityEntry>,
}

impl BoardConfig {
    fn default_columns() -> Vec<Column> {
        vec![
            Column {
                id: "todo".to_string(),
                title: "To Do".to_string(),
                status_alias: vec!["new".to_string()],
            },
            Column {
                id: "in_progress".to_string(),
                title: "In Progress".to_string(),
                status_alias: vec![],
            },
            Column {
                id: "done".to_string(),
                title: "Done".to_string(),
                status_alias: vec!["completed".to_string(), "finished".to_string()],
            },
        ]
    }

    fn default_types() -> Vec<TypeEntry> {
        vec![
            TypeEntry {
                id: "feature".to_string(),
                color: "blue".to_string(),
                template: None,
                type_alias: vec![],
                canonical_alias: None,
            },
            TypeEntry {
                id: "bug".to_string(),
                color: "red".to_string(),
                template: None,
                type_alias: vec!["defect".to_string(), "issue".to_string()],
                canonical_alias: None,
            },
            TypeEntry {
                id: "task".to_string(),
                color: "white".to_string(),
                template: None,
                type_alias: vec!["chore".to_string()],
                canonical_alias: None,
            },
        ]
    }

    fn default_priorities() -> Vec<PriorityEntry> {
        vec![
            PriorityEntry {
                id: "low".to_string(),
                label: "Low".to_string(),
                color: "green".to_string(),
                symbol: default_symbol(),
                priority_alias: vec!["trivial".to_string(), "minor".to_string()],
                canonical_alias: None,
            },
            PriorityEntry {
                id: "medium".to_string(),
                label: "Medium".to_string(),
                color: "yellow".to_string(),
                symbol: default_symbol(),
                priority_alias: vec![],
                canonical_alias: None,
            },
            PriorityEntry {
                id: "high".to_string(),
                label: "High".to_string(),
                color: "orange".to_string(),
                symbol: default_symbol(),
                priority_alias: vec!["important".to_string()],
                canonical_alias: None,
            },
            PriorityEntry {
                id: "critical".to_string(),
                label: "Critical".to_string(),
                color: "red".to_string(),
                symbol: default_symbol(),
                priority_alias: vec!["blocker".to_string(), "urgent".to_string()],
                canonical_alias: None,
            },
        ]
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            columns: Self::default_columns(),
            types: Self::default_types(),
            priorities: Self::default_priorities(),
        }
    }
}

/// Root configuration loaded from `sltasks.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_task_root")]
    pub task_root: String,
    #[serde(default)]
    pub github: Option<GithubConfig>,
    #[serde(default)]
    pub board: BoardConfig,
}

fn default_version() -> u32 {
    1
}

fn default_task_root() -> String {
    ".tasks".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            provider: Provider::File,
            task_root: default_task_root(),
            github: None,
            board: BoardConfig::default(),
        }
    }
}

const IDENTIFIER: &str = "^[a-z][a-z0-9_]*$";

fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl Config {
    /// Load and validate `sltasks.yml` at `path`.
    ///
    /// On success, returns the validated config. On validation failure,
    /// returns `Err` describing every problem found — the caller (typically
    /// [`Config::load_or_default`]) decides whether to fall back.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the file fails schema or cross-cutting
    /// validation, or an I/O/YAML error if the file cannot be read/parsed
    /// at all.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `sltasks.yml`, falling back to [`Config::default`] with a
    /// `config_error` flag on any failure: validation failures fall back
    /// to defaults and the core keeps running.
    #[must_use]
    pub fn load_or_default(path: &Path) -> (Self, bool, Vec<String>) {
        match Self::load(path) {
            Ok(config) => (config, false, Vec::new()),
            Err(e) => (Self::default(), true, vec![e.to_string()]),
        }
    }

    /// Validate cross-cutting invariants: within `columns`, `types`, and
    /// `priorities`, ids and aliases must form one disjoint set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` describing the first batch of problems found.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !(2..=6).contains(&self.board.columns.len()) {
            errors.push(format!(
                "columns must have between 2 and 6 entries, found {}",
                self.board.columns.len()
            ));
        }

        let mut seen = HashSet::new();
        for col in &self.board.columns {
            if !is_valid_identifier(&col.id) {
                errors.push(format!("column id '{}' must match {IDENTIFIER}", col.id));
            }
            if col.id == "archived" {
                errors.push("'archived' is reserved and cannot be used as a column id".into());
            }
            if !seen.insert(col.id.clone()) {
                errors.push(format!("duplicate column id '{}'", col.id));
            }
            for alias in &col.status_alias {
                if !is_valid_identifier(alias) {
                    errors.push(format!("column alias '{alias}' must match {IDENTIFIER}"));
                }
                if alias == "archived" {
                    errors.push("'archived' is reserved and cannot be used as an alias".into());
                }
                if !seen.insert(alias.clone()) {
                    errors.push(format!("duplicate column id/alias '{alias}'"));
                }
            }
        }

        validate_disjoint_set(
            &self.board.types,
            |t| &t.id,
            |t| &t.type_alias,
            "type",
            &mut errors,
        );
        validate_disjoint_set(
            &self.board.priorities,
            |p| &p.id,
            |p| &p.priority_alias,
            "priority",
            &mut errors,
        );

        if Path::new(&self.task_root).is_absolute() {
            errors.push("task_root must be a relative path".into());
        }
        if self.task_root.split('/').any(|part| part == "..") {
            errors.push("task_root must not escape the project root".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SltasksError::ConfigInvalid(errors.join("; ")))
        }
    }

    /// Resolve a status string (id or alias) to its canonical column id.
    /// Unknown inputs pass through unchanged.
    #[must_use]
    pub fn resolve_status(&self, status: &str) -> String {
        if self.board.columns.iter().any(|c| c.id == status) {
            return status.to_string();
        }
        for col in &self.board.columns {
            if col.status_alias.iter().any(|a| a == status) {
                return col.id.clone();
            }
        }
        status.to_string()
    }

    /// Resolve a type string (id or alias) to its canonical type id.
    #[must_use]
    pub fn resolve_type(&self, type_value: &str) -> String {
        if self.board.types.iter().any(|t| t.id == type_value) {
            return type_value.to_string();
        }
        for t in &self.board.types {
            if t.type_alias.iter().any(|a| a == type_value) {
                return t.id.clone();
            }
        }
        type_value.to_string()
    }

    /// Resolve a priority string (id or alias) to its canonical priority id.
    #[must_use]
    pub fn resolve_priority(&self, priority_value: &str) -> String {
        if self.board.priorities.iter().any(|p| p.id == priority_value) {
            return priority_value.to_string();
        }
        for p in &self.board.priorities {
            if p.priority_alias.iter().any(|a| a == priority_value) {
                return p.id.clone();
            }
        }
        priority_value.to_string()
    }

    /// Column id for a status (id, alias, or `"archived"`); `None` if
    /// unresolvable.
    #[must_use]
    pub fn get_column_for_status(&self, status: &str) -> Option<String> {
        if status == crate::model::ARCHIVED_STATE {
            return Some(status.to_string());
        }
        if self.board.columns.iter().any(|c| c.id == status) {
            return Some(status.to_string());
        }
        for col in &self.board.columns {
            if col.status_alias.iter().any(|a| a == status) {
                return Some(col.id.clone());
            }
        }
        None
    }

    #[must_use]
    pub fn is_valid_status(&self, status: &str) -> bool {
        self.get_column_for_status(status).is_some()
    }

    #[must_use]
    pub fn is_valid_type(&self, type_value: &str) -> bool {
        self.board.types.iter().any(|t| t.id == type_value)
            || self
                .board
                .types
                .iter()
                .any(|t| t.type_alias.iter().any(|a| a == type_value))
    }

    #[must_use]
    pub fn is_valid_priority(&self, priority_value: &str) -> bool {
        self.board.priorities.iter().any(|p| p.id == priority_value)
            || self
                .board
                .priorities
                .iter()
                .any(|p| p.priority_alias.iter().any(|a| a == priority_value))
    }

    /// Position of a priority in the lowest-to-highest order, or `-1` if
    /// unknown.
    #[must_use]
    pub fn get_priority_rank(&self, priority_id: &str) -> i64 {
        let resolved = self.resolve_priority(priority_id);
        self.board
            .priorities
            .iter()
            .position(|p| p.id == resolved)
            .map_or(-1, |i| i as i64)
    }

    #[must_use]
    pub fn get_type(&self, type_id: &str) -> Option<&TypeEntry> {
        self.board.types.iter().find(|t| t.id == type_id)
    }

    #[must_use]
    pub fn get_priority(&self, priority_id: &str) -> Option<&PriorityEntry> {
        self.board.priorities.iter().find(|p| p.id == priority_id)
    }

    /// The string to write back to the remote for a type or priority entity:
    /// `canonical_alias ?? id`. `entity` is an id or alias; it's resolved to
    /// canonical first.
    #[must_use]
    pub fn write_alias_for_type(&self, type_value: &str) -> String {
        let canonical = self.resolve_type(type_value);
        self.get_type(&canonical)
            .and_then(|t| t.canonical_alias.clone())
            .unwrap_or(canonical)
    }

    #[must_use]
    pub fn write_alias_for_priority(&self, priority_value: &str) -> String {
        let canonical = self.resolve_priority(priority_value);
        self.get_priority(&canonical)
            .and_then(|p| p.canonical_alias.clone())
            .unwrap_or(canonical)
    }

    /// Absolute path to the task root, resolved against `project_root`.
    #[must_use]
    pub fn task_root_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.task_root)
    }

    /// The first configured column id (used by `unarchive_task`, C9).
    #[must_use]
    pub fn first_column_id(&self) -> Option<&str> {
        self.board.columns.first().map(|c| c.id.as_str())
    }
}

fn validate_disjoint_set<T>(
    entries: &[T],
    id_of: impl Fn(&T) -> &String,
    aliases_of: impl Fn(&T) -> &Vec<String>,
    kind: &str,
    errors: &mut Vec<String>,
) {
    let mut seen = HashSet::new();
    for entry in entries {
        let id = id_of(entry);
        if !is_valid_identifier(id) {
            errors.push(format!("{kind} id '{id}' must match {IDENTIFIER}"));
        }
        if id == "archived" {
            errors.push(format!("'archived' is reserved and cannot be used as a {kind} id"));
        }
        if !seen.insert(id.clone()) {
            errors.push(format!("duplicate {kind} id '{id}'"));
        }
        for alias in aliases_of(entry) {
            if !is_valid_identifier(alias) {
                errors.push(format!("{kind} alias '{alias}' must match {IDENTIFIER}"));
            }
            if alias == "archived" {
                errors.push(format!("'archived' is reserved and cannot be used as a {kind} alias"));
            }
            if !seen.insert(alias.clone()) {
                errors.push(format!("duplicate {kind} id/alias '{alias}'"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn resolve_status_follows_alias_to_canonical() {
        let config = Config::default();
        assert_eq!(config.resolve_status("new"), "todo");
        assert_eq!(config.resolve_status("todo"), "todo");
        assert_eq!(config.resolve_status("something_else"), "something_else");
    }

    #[test]
    fn get_column_for_status_handles_archived() {
        let config = Config::default();
        assert_eq!(
            config.get_column_for_status("archived"),
            Some("archived".to_string())
        );
        assert_eq!(config.get_column_for_status("bogus"), None);
    }

    #[test]
    fn priority_rank_orders_lowest_to_highest() {
        let config = Config::default();
        assert_eq!(config.get_priority_rank("low"), 0);
        assert_eq!(config.get_priority_rank("critical"), 3);
        assert_eq!(config.get_priority_rank("trivial"), 0); // alias
        assert_eq!(config.get_priority_rank("nonexistent"), -1);
    }

    #[test]
    fn write_alias_defaults_to_id() {
        let config = Config::default();
        assert_eq!(config.write_alias_for_type("bug"), "bug");
        assert_eq!(config.write_alias_for_type("defect"), "bug");
    }

    #[test]
    fn write_alias_uses_canonical_alias_when_set() {
        let mut config = Config::default();
        config.board.types[1].canonical_alias = Some("Defect".to_string());
        assert_eq!(config.write_alias_for_type("bug"), "Defect");
    }

    #[test]
    fn rejects_too_few_columns() {
        let mut config = Config::default();
        config.board.columns.truncate(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_archived_as_column_id() {
        let mut config = Config::default();
        config.board.columns[0].id = "archived".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_alias_across_columns() {
        let mut config = Config::default();
        config.board.columns[0].status_alias.push("completed".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_uppercase_identifier() {
        let mut config = Config::default();
        config.board.columns[0].id = "Todo".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_task_root_escaping_project_root() {
        let mut config = Config::default();
        config.task_root = "../outside".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_or_default_falls_back_on_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sltasks.yml");
        fs::write(&path, "not: [valid yaml structure for config").unwrap();
        let (config, config_error, warnings) = Config::load_or_default(&path);
        assert!(config_error);
        assert!(!warnings.is_empty());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_or_default_uses_file_when_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sltasks.yml");
        fs::write(
            &path,
            "version: 1\nprovider: file\ntask_root: .tasks\nboard:\n  columns:\n    - id: todo\n      title: Todo\n    - id: done\n      title: Done\n",
        )
        .unwrap();
        let (config, config_error, _) = Config::load_or_default(&path);
        assert!(!config_error);
        assert_eq!(config.board.columns.len(), 2);
    }
}
