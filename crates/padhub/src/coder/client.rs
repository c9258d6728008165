//! Coder HTTP client.
//!
//! Thin async façade over the Coder REST API: user lookup/creation with
//! best-effort unique usernames, workspace lifecycle builds, dormancy
//! toggling, and the dormant-workspace cleanup sweep. Every operation is one
//! or two sequential round-trips; nothing is cached or retried.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use crate::settings::CoderSettings;

use super::error::{CoderError, CoderResult};
use super::types::*;

/// Header carrying the Coder session token.
const SESSION_TOKEN_HEADER: &str = "Coder-Session-Token";

/// Bound on random-suffix probes when deriving a unique username.
const MAX_USERNAME_ATTEMPTS: u32 = 1000;

/// Client for a Coder deployment.
///
/// Stateless beyond its immutable configuration; cheap to clone.
#[derive(Debug, Clone)]
pub struct CoderClient {
    /// HTTP client (shared, connection-pooled).
    client: Client,
    /// Base URL of the deployment, without trailing slash.
    base_url: String,
    /// Session token sent with every request.
    session_token: String,
    /// Template pad workspaces are created from.
    template_id: Option<Uuid>,
    /// Organization new users are added to.
    default_organization: Option<Uuid>,
    /// Fixed per-user workspace name.
    workspace_name: String,
}

impl CoderClient {
    /// Create a client from settings.
    ///
    /// Fails fast when the base URL or session token is absent; the template
    /// id is only required once a workspace is actually created.
    pub fn new(settings: &CoderSettings) -> CoderResult<Self> {
        if settings.url.is_empty() {
            return Err(CoderError::MissingConfig("CODER_URL"));
        }
        if settings.api_key.is_empty() {
            return Err(CoderError::MissingConfig("CODER_API_KEY"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            session_token: settings.api_key.clone(),
            template_id: settings.template_id,
            default_organization: settings.default_organization,
            workspace_name: settings.workspace_name.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// List users, optionally filtered by a search query.
    pub async fn list_users(
        &self,
        query: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> CoderResult<Vec<User>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(query) = query {
            params.push(("q", query.to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.url("/api/v2/users"))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .query(&params)
            .send()
            .await?;

        let listing: UsersResponse = self.handle_response(response).await?;
        Ok(listing.users)
    }

    /// Find a user by email.
    pub async fn find_user_by_email(&self, email: &str) -> CoderResult<Option<User>> {
        let mut users = self.list_users(Some(email), Some(1), None).await?;
        Ok(if users.is_empty() {
            None
        } else {
            Some(users.remove(0))
        })
    }

    /// Whether a username is already taken on the deployment.
    pub async fn username_exists(&self, username: &str) -> CoderResult<bool> {
        let users = self.list_users(Some(username), None, None).await?;
        Ok(!users.is_empty())
    }

    /// Create a new OIDC user in the default organization.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        name: Option<String>,
    ) -> CoderResult<User> {
        let request = CreateUserRequest {
            username: username.to_string(),
            email: email.to_string(),
            login_type: "oidc",
            organization_ids: self.default_organization.into_iter().collect(),
            name,
        };

        let response = self
            .client
            .post(self.url("/api/v2/users"))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Look up a user by email, creating one when absent.
    ///
    /// Usernames are derived from the email local part; collisions are
    /// resolved by probing random suffixes. The probe is best-effort, not a
    /// uniqueness guarantee -- the deployment rejects true duplicates on
    /// create, and remains the source of truth.
    ///
    /// Returns the user and whether it was newly created.
    pub async fn ensure_user_exists(&self, user_info: &UserInfo) -> CoderResult<(User, bool)> {
        if let Some(user) = self.find_user_by_email(&user_info.email).await? {
            debug!(email = %user_info.email, username = %user.username, "user already exists");
            return Ok((user, false));
        }

        let base = derive_base_username(&user_info.email);
        let mut username = base.clone();

        if self.username_exists(&username).await? {
            let mut resolved = false;
            for _ in 0..MAX_USERNAME_ATTEMPTS {
                let suffix = rand::rng().random_range(1..=100_000u32);
                username = format!("{base}{suffix}");
                if !self.username_exists(&username).await? {
                    resolved = true;
                    break;
                }
            }
            if !resolved {
                return Err(CoderError::UsernameExhausted {
                    email: user_info.email.clone(),
                    attempts: MAX_USERNAME_ATTEMPTS,
                });
            }
        }

        let name = (!user_info.name.is_empty()).then(|| user_info.name.clone());
        let user = self.create_user(&username, &user_info.email, name).await?;
        info!(email = %user.email, username = %user.username, "created user");
        Ok((user, true))
    }

    /// Fetch a workspace by id.
    pub async fn get_workspace_metadata(&self, workspace_id: Uuid) -> CoderResult<Workspace> {
        let response = self
            .client
            .get(self.url(&format!("/api/v2/workspaces/{workspace_id}")))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Fetch the user's pad workspace, or `None` when it does not exist.
    ///
    /// 404 means "no workspace"; every other non-success status propagates.
    pub async fn get_workspace_status_for_user(
        &self,
        username: &str,
    ) -> CoderResult<Option<Workspace>> {
        let response = self
            .client
            .get(self.url(&format!(
                "/api/v2/users/{username}/workspace/{}",
                self.workspace_name
            )))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    /// Create the user's pad workspace unless it already exists.
    ///
    /// Returns the created workspace, or `None` when one was already there.
    pub async fn ensure_workspace_exists(
        &self,
        username: &str,
        user_id: Uuid,
    ) -> CoderResult<Option<Workspace>> {
        if self.get_workspace_status_for_user(username).await?.is_some() {
            debug!(%username, "workspace already exists");
            return Ok(None);
        }

        let workspace = self.create_workspace(user_id, None).await?;
        Ok(Some(workspace))
    }

    /// Create a workspace for a user from the configured template.
    pub async fn create_workspace(
        &self,
        user_id: Uuid,
        parameter_values: Option<Vec<RichParameterValue>>,
    ) -> CoderResult<Workspace> {
        let template_id = self
            .template_id
            .ok_or(CoderError::MissingConfig("CODER_TEMPLATE_ID"))?;

        let request = CreateWorkspaceRequest {
            name: self.workspace_name.clone(),
            template_id,
            rich_parameter_values: parameter_values,
        };

        info!(%user_id, %template_id, "creating workspace");

        let response = self
            .client
            .post(self.url(&format!("/api/v2/users/{user_id}/workspaces")))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Start a workspace.
    ///
    /// A dormant workspace cannot be built, so dormancy is cleared first.
    /// The build targets the workspace's active template version.
    pub async fn start_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild> {
        if self.is_workspace_dormant(workspace_id).await? {
            info!(%workspace_id, "workspace was dormant, clearing dormancy");
            self.set_workspace_dormancy(workspace_id, false).await?;
        }

        let workspace = self.get_workspace_metadata(workspace_id).await?;
        self.create_build(
            workspace_id,
            CreateBuildRequest::new(
                WorkspaceTransition::Start,
                workspace.template_active_version_id,
            ),
        )
        .await
    }

    /// Stop a workspace.
    pub async fn stop_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild> {
        let workspace = self.get_workspace_metadata(workspace_id).await?;
        self.create_build(
            workspace_id,
            CreateBuildRequest::new(
                WorkspaceTransition::Stop,
                workspace.template_active_version_id,
            ),
        )
        .await
    }

    /// Whether a workspace is currently dormant.
    pub async fn is_workspace_dormant(&self, workspace_id: Uuid) -> CoderResult<bool> {
        let workspace = self.get_workspace_metadata(workspace_id).await?;
        Ok(workspace.is_dormant())
    }

    /// Set or clear a workspace's dormancy flag.
    pub async fn set_workspace_dormancy(
        &self,
        workspace_id: Uuid,
        dormant: bool,
    ) -> CoderResult<Workspace> {
        let response = self
            .client
            .put(self.url(&format!("/api/v2/workspaces/{workspace_id}/dormant")))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .json(&UpdateDormancyRequest { dormant })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List workspaces, optionally filtered by a search query.
    pub async fn list_workspaces(
        &self,
        query: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> CoderResult<WorkspacesResponse> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(query) = query {
            params.push(("q", query.to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.url("/api/v2/workspaces"))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .query(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete a workspace via a delete build.
    pub async fn delete_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild> {
        let response = self
            .client
            .post(self.url(&format!("/api/v2/workspaces/{workspace_id}/builds")))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .json(&DeleteBuildRequest {
                transition: WorkspaceTransition::Delete,
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List the deployment's templates.
    pub async fn list_templates(&self) -> CoderResult<Vec<Template>> {
        let response = self
            .client
            .get(self.url("/api/v2/templates"))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete dormant workspaces approaching their deletion deadline.
    ///
    /// Sweeps all `dormant:true` workspaces and deletes each one whose
    /// `deleting_at` deadline is fewer than `days_until_deleting` whole days
    /// away (already-overdue deadlines count as negative). The threshold is
    /// fixed for the whole sweep. Returns the number of workspaces deleted.
    pub async fn cleanse_workspaces(&self, days_until_deleting: i64) -> CoderResult<u32> {
        let listing = self.list_workspaces(Some("dormant:true"), None, None).await?;
        let now = Utc::now();
        let mut count = 0u32;

        for workspace in listing.workspaces {
            let Some(deleting_at) = workspace.deleting_at else {
                continue;
            };
            let days_remaining = (deleting_at - now).num_days();
            if days_remaining < days_until_deleting {
                count += 1;
                info!(
                    workspace_id = %workspace.id,
                    owner = %workspace.owner_name,
                    days_remaining,
                    "[{count}] deleting dormant workspace"
                );
                self.delete_workspace(workspace.id).await?;
            }
        }

        Ok(count)
    }

    async fn create_build(
        &self,
        workspace_id: Uuid,
        request: CreateBuildRequest,
    ) -> CoderResult<WorkspaceBuild> {
        let response = self
            .client
            .post(self.url(&format!("/api/v2/workspaces/{workspace_id}/builds")))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> CoderResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .map(|err| err.message)
            .unwrap_or(body);
        Err(CoderError::Api { status, message })
    }
}

/// Derive the base username from an email: the local part, lowercased, with
/// everything non-alphanumeric stripped. Falls back to `"user"`.
fn derive_base_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let base: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_settings(url: &str, api_key: &str) -> CoderSettings {
        CoderSettings {
            url: url.to_string(),
            api_key: api_key.to_string(),
            template_id: None,
            default_organization: None,
            workspace_name: "pad".to_string(),
        }
    }

    #[test]
    fn test_derive_base_username_strips_and_lowercases() {
        assert_eq!(derive_base_username("John.Doe+1@x.com"), "johndoe1");
    }

    #[test]
    fn test_derive_base_username_empty_local_part() {
        assert_eq!(derive_base_username("@x.com"), "user");
        assert_eq!(derive_base_username("...@x.com"), "user");
    }

    #[test]
    fn test_derive_base_username_plain() {
        assert_eq!(derive_base_username("alice@example.com"), "alice");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = CoderClient::new(&make_settings("https://coder.example.com/", "tok")).unwrap();
        assert_eq!(
            client.url("/api/v2/users"),
            "https://coder.example.com/api/v2/users"
        );
    }

    #[test]
    fn test_new_requires_url_and_key() {
        assert!(matches!(
            CoderClient::new(&make_settings("", "tok")),
            Err(CoderError::MissingConfig("CODER_URL"))
        ));
        assert!(matches!(
            CoderClient::new(&make_settings("https://coder.example.com", "")),
            Err(CoderError::MissingConfig("CODER_API_KEY"))
        ));
    }
}
