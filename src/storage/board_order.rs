//! `tasks.yaml` — the sidecar ordering file.
//!
//! A mapping from column id to an ordered list of task ids, plus a reserved
//! `archived` list. Every id appears in at most one list. The file carries a
//! leading "do not edit" comment and a stable key order: configured column
//! order, then `archived` last.

use crate::error::Result;
use crate::model::ARCHIVED_STATE;
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

const BANNER: &str = "# This file is managed by sltasks. Do not edit by hand.\n";

/// Ordered task ids per column, plus the archived list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardOrder {
    columns: IndexMap<String, Vec<String>>,
    archived: Vec<String>,
}

impl BoardOrder {
    /// An empty order with one list per `column_ids`, in that order.
    #[must_use]
    pub fn new(column_ids: &[String]) -> Self {
        let mut columns = IndexMap::new();
        for id in column_ids {
            columns.insert(id.clone(), Vec::new());
        }
        Self {
            columns,
            archived: Vec::new(),
        }
    }

    /// Load `tasks.yaml` at `path`, or an empty order if the file doesn't
    /// exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path, column_ids: &[String]) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(column_ids));
        }
        let contents = fs::read_to_string(path)?;
        let raw: IndexMap<String, Vec<String>> = serde_yaml::from_str(&contents)?;
        let mut order = Self::new(column_ids);
        for (key, ids) in raw {
            if key == ARCHIVED_STATE {
                order.archived = ids;
            } else {
                order.columns.entry(key).or_default().extend(ids);
            }
        }
        Ok(order)
    }

    /// Persist to `path` with the banner comment and stable key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut ordered = IndexMap::new();
        for (col, ids) in &self.columns {
            ordered.insert(col.clone(), ids.clone());
        }
        ordered.insert(ARCHIVED_STATE.to_string(), self.archived.clone());

        let yaml = serde_yaml::to_string(&ordered)?;
        let mut out = String::with_capacity(BANNER.len() + yaml.len());
        out.push_str(BANNER);
        out.push_str(&yaml);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, out)?;
        Ok(())
    }

    fn list_mut(&mut self, column_or_archived: &str) -> &mut Vec<String> {
        if column_or_archived == ARCHIVED_STATE {
            &mut self.archived
        } else {
            self.columns.entry(column_or_archived.to_string()).or_default()
        }
    }

    #[must_use]
    pub fn list(&self, column_or_archived: &str) -> &[String] {
        if column_or_archived == ARCHIVED_STATE {
            &self.archived
        } else {
            self.columns.get(column_or_archived).map_or(&[], Vec::as_slice)
        }
    }

    /// The column (or `archived`) that currently lists `id`, if any.
    #[must_use]
    pub fn find_list_of(&self, id: &str) -> Option<String> {
        if self.archived.iter().any(|i| i == id) {
            return Some(ARCHIVED_STATE.to_string());
        }
        self.columns
            .iter()
            .find(|(_, ids)| ids.iter().any(|i| i == id))
            .map(|(col, _)| col.clone())
    }

    /// Remove `id` from whichever list currently contains it.
    pub fn remove(&mut self, id: &str) {
        self.archived.retain(|i| i != id);
        for ids in self.columns.values_mut() {
            ids.retain(|i| i != id);
        }
    }

    /// Append `id` to the end of `column_or_archived`'s list, removing it
    /// from any other list first.
    pub fn place(&mut self, id: &str, column_or_archived: &str) {
        self.remove(id);
        self.list_mut(column_or_archived).push(id.to_string());
    }

    /// Replace `old` with `new` in place, preserving position (used by
    /// rename operations).
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(slot) = self.archived.iter_mut().find(|i| i.as_str() == old) {
            *slot = new.to_string();
            return;
        }
        for ids in self.columns.values_mut() {
            if let Some(slot) = ids.iter_mut().find(|i| i.as_str() == old) {
                *slot = new.to_string();
                return;
            }
        }
    }

    /// Swap `id` with its neighbor in the direction of `delta` (`-1` or
    /// `+1`) within its current list. Returns `false` at a boundary without
    /// mutating.
    #[must_use]
    pub fn swap_adjacent(&mut self, id: &str, delta: i32) -> bool {
        let Some(list_name) = self.find_list_of(id) else {
            return false;
        };
        let list = self.list_mut(&list_name);
        let Some(pos) = list.iter().position(|i| i == id) else {
            return false;
        };
        let new_pos = pos as i64 + i64::from(delta);
        if new_pos < 0 || new_pos as usize >= list.len() {
            return false;
        }
        list.swap(pos, new_pos as usize);
        true
    }

    /// All ids referenced anywhere in the order file.
    #[must_use]
    pub fn all_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.columns.values().flatten().cloned().collect();
        ids.extend(self.archived.iter().cloned());
        ids
    }

    /// Drop ids with no backing file (reconciliation step 1).
    pub fn retain_known(&mut self, known_ids: &std::collections::HashSet<String>) {
        for ids in self.columns.values_mut() {
            ids.retain(|i| known_ids.contains(i));
        }
        self.archived.retain(|i| known_ids.contains(i));
    }

    /// Add an empty list for any of `column_ids` not already tracked, in
    /// case the configured columns changed since this order was loaded.
    pub fn ensure_columns(&mut self, column_ids: &[String]) {
        for id in column_ids {
            self.columns.entry(id.clone()).or_default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["todo".to_string(), "in_progress".to_string(), "done".to_string()]
    }

    #[test]
    fn place_moves_between_lists() {
        let mut order = BoardOrder::new(&columns());
        order.place("a", "todo");
        order.place("a", "done");
        assert_eq!(order.list("todo"), &[] as &[String]);
        assert_eq!(order.list("done"), &["a".to_string()]);
    }

    #[test]
    fn swap_adjacent_respects_boundaries() {
        let mut order = BoardOrder::new(&columns());
        order.place("a", "todo");
        order.place("b", "todo");
        assert!(!order.swap_adjacent("a", -1));
        assert!(order.swap_adjacent("a", 1));
        assert_eq!(order.list("todo"), &["b".to_string(), "a".to_string()]);
        assert!(!order.swap_adjacent("a", 1));
    }

    #[test]
    fn rename_preserves_position() {
        let mut order = BoardOrder::new(&columns());
        order.place("a", "todo");
        order.place("old-name", "todo");
        order.place("c", "todo");
        order.rename("old-name", "new-name");
        assert_eq!(
            order.list("todo"),
            &["a".to_string(), "new-name".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn retain_known_drops_missing_ids() {
        let mut order = BoardOrder::new(&columns());
        order.place("a", "todo");
        order.place("gone", "todo");
        let known: std::collections::HashSet<String> = ["a".to_string()].into_iter().collect();
        order.retain_known(&known);
        assert_eq!(order.list("todo"), &["a".to_string()]);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.yaml");
        let mut order = BoardOrder::new(&columns());
        order.place("a", "todo");
        order.place("b", "done");
        order.save(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# "));

        let loaded = BoardOrder::load(&path, &columns()).unwrap();
        assert_eq!(loaded.list("todo"), &["a".to_string()]);
        assert_eq!(loaded.list("done"), &["b".to_string()]);
    }

    #[test]
    fn find_list_of_sees_archived() {
        let mut order = BoardOrder::new(&columns());
        order.place("a", ARCHIVED_STATE);
        assert_eq!(order.find_list_of("a"), Some(ARCHIVED_STATE.to_string()));
    }
}
