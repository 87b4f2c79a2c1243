//! Thin blocking GraphQL client for the GitHub Projects V2 API.
//!
//! Token resolution, HTTP status handling, and GraphQL error-array
//! inspection all map 1:1 onto [`crate::error::SltasksError`] variants so
//! callers never see a raw `reqwest`/JSON error.

use crate::error::{Result, SltasksError};
use serde_json::Value;
use std::process::Command;
use std::time::Duration;

/// Authenticated client for one GitHub (or GitHub Enterprise) GraphQL
/// endpoint.
pub struct GithubClient {
    http: reqwest::blocking::Client,
    graphql_url: url::Url,
}

impl GithubClient {
    /// Build a client from an explicit token and API host.
    ///
    /// # Errors
    ///
    /// Returns `TransportFailed` if the underlying HTTP client or URL fails
    /// to construct.
    pub fn new(token: &str, base_url: &str) -> Result<Self> {
        let graphql_url = url::Url::parse(&format!("https://{base_url}/graphql"))
            .map_err(|e| SltasksError::TransportFailed(format!("invalid base_url: {e}")))?;

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {token}");
        let mut auth_value = reqwest::header::HeaderValue::from_str(&auth)
            .map_err(|e| SltasksError::TransportFailed(format!("invalid token: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SltasksError::TransportFailed(e.to_string()))?;

        Ok(Self { http, graphql_url })
    }

    /// Resolve a token from `GITHUB_TOKEN`, falling back to `gh auth token`,
    /// and build a client against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AuthFailed` if neither source yields a token, or
    /// `TransportFailed` if client construction fails.
    pub fn from_environment(base_url: &str) -> Result<Self> {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                return Self::new(&token, base_url);
            }
        }

        if let Ok(output) = Command::new("gh").args(["auth", "token"]).output() {
            if output.status.success() {
                let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !token.is_empty() {
                    return Self::new(&token, base_url);
                }
            }
        }

        Err(SltasksError::AuthFailed(
            "no GitHub token found: set GITHUB_TOKEN or run 'gh auth login'".to_string(),
        ))
    }

    /// Execute a GraphQL query (read-only request).
    ///
    /// # Errors
    ///
    /// See [`Self::execute`].
    pub fn query(&self, query: &str, variables: Value) -> Result<Value> {
        self.execute(query, variables)
    }

    /// Execute a GraphQL mutation.
    ///
    /// # Errors
    ///
    /// See [`Self::execute`].
    pub fn mutate(&self, mutation: &str, variables: Value) -> Result<Value> {
        self.execute(mutation, variables)
    }

    fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        let payload = serde_json::json!({ "query": query, "variables": variables });

        let response = self
            .http
            .post(self.graphql_url.clone())
            .json(&payload)
            .send()
            .map_err(|e| SltasksError::TransportFailed(e.to_string()))?;

        let status = response.status();
        let body: Value = response.json().map_err(|e| {
            SltasksError::SchemaMismatch(format!("response was not valid JSON: {e}"))
        })?;

        if status.as_u16() == 401 {
            return Err(SltasksError::AuthFailed(
                "check your GITHUB_TOKEN; required scopes: read:project, project, repo".to_string(),
            ));
        }
        if status.as_u16() == 403 {
            let text = body.to_string().to_lowercase();
            if text.contains("rate limit") {
                return Err(SltasksError::RateLimited(
                    "GitHub API rate limit exceeded".to_string(),
                ));
            }
            return Err(SltasksError::PermissionDenied(
                "token lacks required scopes: read:project, project, repo".to_string(),
            ));
        }
        if status.as_u16() == 404 {
            return Err(SltasksError::NotFound("resource not found".to_string()));
        }
        if status.as_u16() >= 400 {
            return Err(SltasksError::TransportFailed(format!(
                "HTTP {status}: {body}"
            )));
        }

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("").to_string())
                .collect();

            for error in errors {
                let error_type = error.get("type").and_then(Value::as_str).unwrap_or("");
                let message = error.get("message").and_then(Value::as_str).unwrap_or("");
                if error_type == "NOT_FOUND" || message.to_lowercase().contains("not found") {
                    return Err(SltasksError::NotFound(message.to_string()));
                }
                if error_type == "FORBIDDEN" || message.to_lowercase().contains("permission") {
                    return Err(SltasksError::PermissionDenied(message.to_string()));
                }
            }

            return Err(SltasksError::SchemaMismatch(format!(
                "GraphQL errors: {}",
                messages.join("; ")
            )));
        }

        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}
