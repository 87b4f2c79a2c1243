//! GraphQL query/mutation bodies for the GitHub Projects V2 API.
//!
//! Kept as plain string constants rather than a query-builder: the shapes
//! are fixed and reviewing a diff against GitHub's schema docs is easier
//! against a literal string than generated code.

pub const GET_USER_PROJECT: &str = r#"
query GetUserProject($owner: String!, $number: Int!) {
  user(login: $owner) {
    projectV2(number: $number) {
      id
      title
      fields(first: 20) {
        nodes {
          ... on ProjectV2Field {
            id
            name
          }
          ... on ProjectV2SingleSelectField {
            id
            name
            options {
              id
              name
            }
          }
        }
      }
    }
  }
}
"#;

pub const GET_ORG_PROJECT: &str = r#"
query GetOrgProject($owner: String!, $number: Int!) {
  organization(login: $owner) {
    projectV2(number: $number) {
      id
      title
      fields(first: 20) {
        nodes {
          ... on ProjectV2Field {
            id
            name
          }
          ... on ProjectV2SingleSelectField {
            id
            name
            options {
              id
              name
            }
          }
        }
      }
    }
  }
}
"#;

pub const GET_PROJECT_ITEMS: &str = r#"
query GetProjectItems($projectId: ID!, $cursor: String) {
  node(id: $projectId) {
    ... on ProjectV2 {
      items(first: 100, after: $cursor) {
        pageInfo {
          hasNextPage
          endCursor
        }
        nodes {
          id
          fieldValues(first: 10) {
            nodes {
              ... on ProjectV2ItemFieldSingleSelectValue {
                field {
                  ... on ProjectV2SingleSelectField {
                    name
                  }
                }
                name
                optionId
              }
            }
          }
          content {
            ... on Issue {
              id
              number
              title
              body
              state
              labels(first: 20) {
                nodes {
                  name
                }
              }
              assignees(first: 10) {
                nodes {
                  login
                }
              }
              milestone {
                title
              }
              createdAt
              updatedAt
              repository {
                nameWithOwner
              }
            }
            ... on PullRequest {
              id
              number
              title
              body
              state
              isDraft
              labels(first: 20) {
                nodes {
                  name
                }
              }
              createdAt
              updatedAt
              repository {
                nameWithOwner
              }
            }
            ... on DraftIssue {
              title
              body
              createdAt
              updatedAt
            }
          }
        }
      }
    }
  }
}
"#;

pub const UPDATE_ITEM_FIELD: &str = r#"
mutation UpdateItemField($projectId: ID!, $itemId: ID!, $fieldId: ID!, $optionId: String!) {
  updateProjectV2ItemFieldValue(
    input: {
      projectId: $projectId
      itemId: $itemId
      fieldId: $fieldId
      value: { singleSelectOptionId: $optionId }
    }
  ) {
    projectV2Item {
      id
    }
  }
}
"#;

pub const UPDATE_ITEM_POSITION: &str = r#"
mutation UpdateItemPosition($projectId: ID!, $itemId: ID!, $afterId: ID) {
  updateProjectV2ItemPosition(
    input: {
      projectId: $projectId
      itemId: $itemId
      afterId: $afterId
    }
  ) {
    items(first: 1) {
      nodes {
        id
      }
    }
  }
}
"#;

pub const CREATE_ISSUE: &str = r#"
mutation CreateIssue($repositoryId: ID!, $title: String!, $body: String) {
  createIssue(
    input: {
      repositoryId: $repositoryId
      title: $title
      body: $body
    }
  ) {
    issue {
      id
      number
      title
      body
      createdAt
      updatedAt
      repository {
        nameWithOwner
      }
    }
  }
}
"#;

pub const UPDATE_ISSUE: &str = r#"
mutation UpdateIssue($issueId: ID!, $title: String, $body: String) {
  updateIssue(
    input: {
      id: $issueId
      title: $title
      body: $body
    }
  ) {
    issue {
      id
      number
      title
      body
      updatedAt
    }
  }
}
"#;

pub const CLOSE_ISSUE: &str = r#"
mutation CloseIssue($issueId: ID!) {
  closeIssue(input: { issueId: $issueId }) {
    issue {
      id
      state
    }
  }
}
"#;

pub const ADD_ITEM_TO_PROJECT: &str = r#"
mutation AddItemToProject($projectId: ID!, $contentId: ID!) {
  addProjectV2ItemById(
    input: {
      projectId: $projectId
      contentId: $contentId
    }
  ) {
    item {
      id
    }
  }
}
"#;

pub const GET_REPOSITORY: &str = r#"
query GetRepository($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    id
    nameWithOwner
  }
}
"#;

pub const ADD_LABELS: &str = r#"
mutation AddLabels($labelableId: ID!, $labelIds: [ID!]!) {
  addLabelsToLabelable(
    input: {
      labelableId: $labelableId
      labelIds: $labelIds
    }
  ) {
    labelable {
      ... on Issue {
        id
        labels(first: 20) {
          nodes {
            name
          }
        }
      }
    }
  }
}
"#;

pub const REMOVE_LABELS: &str = r#"
mutation RemoveLabels($labelableId: ID!, $labelIds: [ID!]!) {
  removeLabelsFromLabelable(
    input: {
      labelableId: $labelableId
      labelIds: $labelIds
    }
  ) {
    labelable {
      ... on Issue {
        id
        labels(first: 20) {
          nodes {
            name
          }
        }
      }
    }
  }
}
"#;

pub const GET_REPOSITORY_LABELS: &str = r#"
query GetRepositoryLabels($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    labels(first: 100) {
      nodes {
        id
        name
      }
    }
  }
}
"#;

pub const GET_VIEWER: &str = r#"
query GetViewer {
  viewer {
    login
  }
}
"#;
