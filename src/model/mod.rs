//! Core data types for the sync core.
//!
//! `ProviderData` is a tagged variant, not inheritance — consumers branch on
//! the tag; no virtual dispatch is needed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a task's priority value was last read from, for a Remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrioritySource {
    Labels,
    Field,
}

/// Provider-specific side data, keyed by a discriminant tag.
///
/// Invariant: a task has exactly one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderData {
    /// A task with no remote identity.
    File,
    /// A task backed by a remote project item.
    Remote {
        project_item_id: String,
        issue_node_id: String,
        repository: String,
        issue_number: u64,
        /// The exact label string that produced `type`, kept for round-trip.
        type_label: Option<String>,
        priority_label: Option<String>,
        last_synced: Option<DateTime<Utc>>,
        priority_source: PrioritySource,
    },
}

impl ProviderData {
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }

    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    #[must_use]
    pub const fn last_synced(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::File => None,
            Self::Remote { last_synced, .. } => *last_synced,
        }
    }

    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        match self {
            Self::File => None,
            Self::Remote { repository, .. } => Some(repository),
        }
    }

    #[must_use]
    pub const fn issue_number(&self) -> Option<u64> {
        match self {
            Self::File => None,
            Self::Remote { issue_number, .. } => Some(*issue_number),
        }
    }
}

/// The reserved state for tasks taken off the active board.
pub const ARCHIVED_STATE: &str = "archived";

/// The default priority id when a task declares none.
pub const DEFAULT_PRIORITY: &str = "medium";

/// A work item, either local-only or backed by a remote project item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Filename for local tasks; `"{repository}#{issue_number}"` for Remote
    /// tasks. Stable across the task's lifetime.
    pub id: String,
    pub title: String,
    pub body: String,
    /// Canonical column id, or `ARCHIVED_STATE`.
    pub state: String,
    /// Canonical priority id, defaulting to `DEFAULT_PRIORITY`.
    pub priority: String,
    pub r#type: Option<String>,
    /// Ordered, duplicate-free label set.
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub provider_data: ProviderData,
}

impl Task {
    /// Build the canonical id for a Remote task from its repository and
    /// issue number: `id == "{repository}#{issue_number}"`.
    #[must_use]
    pub fn remote_id(repository: &str, issue_number: u64) -> String {
        format!("{repository}#{issue_number}")
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.state == ARCHIVED_STATE
    }

    /// Add a tag if not already present, preserving insertion order.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Remove a tag if present.
    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: "acme/proj#7".to_string(),
            title: "Fix Login".to_string(),
            body: String::new(),
            state: "todo".to_string(),
            priority: "medium".to_string(),
            r#type: Some("bug".to_string()),
            tags: vec!["ui".to_string()],
            created: Utc::now(),
            updated: Utc::now(),
            provider_data: ProviderData::File,
        }
    }

    #[test]
    fn is_archived_checks_reserved_state() {
        let mut task = sample_task();
        assert!(!task.is_archived());
        task.state = ARCHIVED_STATE.to_string();
        assert!(task.is_archived());
    }

    #[test]
    fn remote_id_format() {
        assert_eq!(Task::remote_id("acme/proj", 7), "acme/proj#7");
    }

    #[test]
    fn add_tag_is_idempotent_and_order_preserving() {
        let mut task = sample_task();
        task.add_tag("backend");
        task.add_tag("ui");
        task.add_tag("api");
        assert_eq!(task.tags, vec!["ui", "backend", "api"]);
    }

    #[test]
    fn remove_tag_drops_only_match() {
        let mut task = sample_task();
        task.add_tag("backend");
        task.remove_tag("ui");
        assert_eq!(task.tags, vec!["backend"]);
    }

    #[test]
    fn provider_data_round_trips_through_yaml() {
        let data = ProviderData::Remote {
            project_item_id: "PVTI_1".to_string(),
            issue_node_id: "I_1".to_string(),
            repository: "acme/proj".to_string(),
            issue_number: 7,
            type_label: Some("bug".to_string()),
            priority_label: None,
            last_synced: None,
            priority_source: PrioritySource::Labels,
        };
        let yaml = serde_yaml::to_string(&data).unwrap();
        let back: ProviderData = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(data, back);
    }
}
