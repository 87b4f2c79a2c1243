//! GitHub search-syntax filter parser and matcher.
//!
//! Filters gate which remote items sync locally. A single filter's terms
//! are AND'd together; multiple configured filters are OR'd — an item
//! syncs if it matches any one of them. Unknown keys are a hard parse
//! error, never silently ignored.

use crate::error::{Result, SltasksError};
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(\w+):(?:"([^"]+)"|(\S+))"#).unwrap());

/// Remote item state a filter can select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Open,
    Closed,
    All,
}

/// A single parsed filter expression. Every `Some`/non-empty field must
/// match for the filter to match (AND within a filter).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedFilter {
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub milestone: Option<String>,
    pub state: Option<FilterState>,
    pub repo: Option<String>,
    pub is_wildcard: bool,
    pub priority: Vec<String>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::Open
    }
}

/// Parse a single filter expression, e.g. `"assignee:@me label:bug is:open"`
/// or the wildcard `"*"`.
///
/// # Errors
///
/// Returns `ParseFailed` for an unknown key, an invalid `is:` value, or a
/// `repo:` value without a `/`.
pub fn parse(expression: &str) -> Result<ParsedFilter> {
    let expression = expression.trim();

    if expression == "*" {
        return Ok(ParsedFilter {
            is_wildcard: true,
            state: Some(FilterState::All),
            ..ParsedFilter::default()
        });
    }
    if expression.is_empty() {
        return Ok(ParsedFilter { state: Some(FilterState::Open), ..ParsedFilter::default() });
    }

    let mut filter = ParsedFilter { state: Some(FilterState::Open), ..ParsedFilter::default() };

    for caps in TOKEN.captures_iter(expression) {
        let key = caps[1].to_lowercase();
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());

        match key.as_str() {
            "assignee" => filter.assignee = Some(value.to_string()),
            "label" => filter.labels.push(value.to_string()),
            "milestone" => filter.milestone = Some(value.to_string()),
            "is" => {
                filter.state = Some(match value.to_lowercase().as_str() {
                    "open" => FilterState::Open,
                    "closed" => FilterState::Closed,
                    other => {
                        return Err(SltasksError::ParseFailed(format!(
                            "invalid is: value '{other}'. Expected 'open' or 'closed'."
                        )))
                    }
                });
            }
            "repo" => {
                if !value.contains('/') {
                    return Err(SltasksError::ParseFailed(format!(
                        "invalid repo format '{value}'. Expected 'owner/repo'."
                    )));
                }
                filter.repo = Some(value.to_string());
            }
            "priority" => {
                filter.priority.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_lowercase),
                );
            }
            other => {
                return Err(SltasksError::ParseFailed(format!(
                    "unknown filter key '{other}'. Supported: assignee, label, milestone, is, repo, priority"
                )))
            }
        }
    }

    Ok(filter)
}

/// Parse every filter in `expressions`, failing on the first invalid one.
///
/// # Errors
///
/// Returns the first `ParseFailed` encountered.
pub fn parse_all(expressions: &[String]) -> Result<Vec<ParsedFilter>> {
    expressions.iter().map(|e| parse(e)).collect()
}

/// The subset of a remote project item's shape a filter can match against.
/// Built by the Remote Store/Sync Engine from the raw GraphQL response.
#[derive(Debug, Clone, Default)]
pub struct MatchableItem {
    pub assignee_logins: Vec<String>,
    pub label_names: Vec<String>,
    pub milestone_title: Option<String>,
    pub is_closed: bool,
    pub repository: String,
    /// Priority as already resolved by the caller (project field value if
    /// configured, else a `priority:X` label, else a label matching a known
    /// priority id), lowercased. `None` if none of those applied.
    pub priority: Option<String>,
}

/// True if `item` matches every criterion in `filter` (AND logic).
#[must_use]
pub fn matches(filter: &ParsedFilter, item: &MatchableItem, current_user: &str) -> bool {
    if filter.is_wildcard {
        return true;
    }

    if let Some(assignee) = &filter.assignee {
        let expected = if assignee == "@me" { current_user } else { assignee.as_str() };
        if !item.assignee_logins.iter().any(|a| a == expected) {
            return false;
        }
    }

    if !filter.labels.is_empty()
        && !filter.labels.iter().all(|required| item.label_names.iter().any(|l| l == required))
    {
        return false;
    }

    if let Some(milestone) = &filter.milestone {
        if item.milestone_title.as_deref() != Some(milestone.as_str()) {
            return false;
        }
    }

    match filter.state.unwrap_or(FilterState::Open) {
        FilterState::All => {}
        FilterState::Open if item.is_closed => return false,
        FilterState::Closed if !item.is_closed => return false,
        _ => {}
    }

    if let Some(repo) = &filter.repo {
        if item.repository.to_lowercase() != repo.to_lowercase() {
            return false;
        }
    }

    if !filter.priority.is_empty() {
        match &item.priority {
            Some(p) if filter.priority.iter().any(|want| want == &p.to_lowercase()) => {}
            _ => return false,
        }
    }

    true
}

/// True if `item` matches at least one of `filters` (OR logic). An empty
/// filter list matches nothing — sync is opt-in.
#[must_use]
pub fn matches_any(filters: &[ParsedFilter], item: &MatchableItem, current_user: &str) -> bool {
    !filters.is_empty() && filters.iter().any(|f| matches(f, item, current_user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> MatchableItem {
        MatchableItem {
            assignee_logins: vec!["octocat".to_string()],
            label_names: vec!["bug".to_string(), "priority:p1".to_string()],
            milestone_title: Some("v1".to_string()),
            is_closed: false,
            repository: "acme/proj".to_string(),
            priority: Some("p1".to_string()),
        }
    }

    #[test]
    fn wildcard_parses_and_matches_everything() {
        let filter = parse("*").unwrap();
        assert!(filter.is_wildcard);
        assert!(matches(&filter, &item(), "octocat"));
    }

    #[test]
    fn empty_expression_defaults_to_open() {
        let filter = parse("").unwrap();
        assert_eq!(filter.state, Some(FilterState::Open));
    }

    #[test]
    fn ands_terms_within_one_filter() {
        let filter = parse("assignee:@me label:bug is:open").unwrap();
        assert!(matches(&filter, &item(), "octocat"));

        let mut closed = item();
        closed.is_closed = true;
        assert!(!matches(&filter, &closed, "octocat"));
    }

    #[test]
    fn at_me_expands_to_current_user() {
        let filter = parse("assignee:@me").unwrap();
        assert!(matches(&filter, &item(), "octocat"));
        assert!(!matches(&filter, &item(), "someone-else"));
    }

    #[test]
    fn all_required_labels_must_be_present() {
        let filter = parse("label:bug label:missing").unwrap();
        assert!(!matches(&filter, &item(), "octocat"));
    }

    #[test]
    fn invalid_is_value_is_a_parse_error() {
        assert!(parse("is:sideways").is_err());
    }

    #[test]
    fn repo_without_slash_is_a_parse_error() {
        assert!(parse("repo:bad").is_err());
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        assert!(parse("bogus:value").is_err());
    }

    #[test]
    fn repo_match_is_case_insensitive() {
        let filter = parse("repo:ACME/Proj").unwrap();
        assert!(matches(&filter, &item(), "octocat"));
    }

    #[test]
    fn priority_list_matches_any() {
        let filter = parse("priority:p0,p1").unwrap();
        assert!(matches(&filter, &item(), "octocat"));

        let filter_miss = parse("priority:p2").unwrap();
        assert!(!matches(&filter_miss, &item(), "octocat"));
    }

    #[test]
    fn matches_any_is_or_across_filters_and_empty_matches_nothing() {
        let filters = parse_all(&["label:missing".to_string(), "label:bug".to_string()]).unwrap();
        assert!(matches_any(&filters, &item(), "octocat"));
        assert!(!matches_any(&[], &item(), "octocat"));
    }

    #[test]
    fn quoted_values_support_spaces() {
        let filter = parse(r#"milestone:"Sprint One""#).unwrap();
        assert_eq!(filter.milestone, Some("Sprint One".to_string()));
    }

    proptest::proptest! {
        // Adding a required label to a filter never grows its match set: if
        // the stricter filter matches, the looser one (without that label)
        // must match too.
        #[test]
        fn adding_a_label_criterion_never_grows_the_match_set(
            base_labels in proptest::collection::vec("[a-z]{2,6}", 0..3),
            extra_label in "[a-z]{2,6}",
            item_has_extra in proptest::bool::ANY,
            item_labels in proptest::collection::vec("[a-z]{2,6}", 0..3),
        ) {
            let mut matchable = item();
            matchable.label_names = item_labels;
            if item_has_extra {
                matchable.label_names.push(extra_label.clone());
            }

            let looser = ParsedFilter { labels: base_labels.clone(), state: Some(FilterState::All), ..ParsedFilter::default() };
            let mut stricter_labels = base_labels;
            stricter_labels.push(extra_label);
            let stricter = ParsedFilter { labels: stricter_labels, state: Some(FilterState::All), ..ParsedFilter::default() };

            if matches(&stricter, &matchable, "octocat") {
                proptest::prop_assert!(matches(&looser, &matchable, "octocat"));
            }
        }
    }
}
