//! Coder API types.
//!
//! Only the fields this backend reads are modeled; unknown fields in remote
//! responses are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A Coder user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Envelope of `GET /api/v2/users`.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
    #[serde(default)]
    pub count: i64,
}

/// A Coder workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    #[serde(default)]
    pub owner_name: String,
    pub template_id: Uuid,
    pub template_active_version_id: Uuid,
    /// Set when the workspace has been marked dormant.
    #[serde(default)]
    pub dormant_at: Option<DateTime<Utc>>,
    /// Scheduled deletion deadline, set once dormant.
    #[serde(default)]
    pub deleting_at: Option<DateTime<Utc>>,
}

impl Workspace {
    /// Whether the workspace is currently dormant.
    pub fn is_dormant(&self) -> bool {
        self.dormant_at.is_some()
    }
}

/// Envelope of `GET /api/v2/workspaces`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspacesResponse {
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub count: i64,
}

/// A workspace template.
#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub active_version_id: Uuid,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
}

/// Receipt for a workspace build (state transition).
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceBuild {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub transition: WorkspaceTransition,
    #[serde(default)]
    pub status: Option<String>,
}

/// Build transition requested against a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceTransition {
    Start,
    Stop,
    Delete,
}

/// Identity attributes of a platform user, as provided by the login layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// A template parameter value passed through on workspace creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RichParameterValue {
    pub name: String,
    pub value: String,
}

/// Body of `POST /api/v2/users`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub login_type: &'static str,
    pub organization_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of `POST /api/v2/users/{user}/workspaces`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub template_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rich_parameter_values: Option<Vec<RichParameterValue>>,
}

/// Body of `POST /api/v2/workspaces/{id}/builds` for start/stop builds.
#[derive(Debug, Clone, Serialize)]
pub struct CreateBuildRequest {
    pub transition: WorkspaceTransition,
    pub template_version_id: Uuid,
    pub dry_run: bool,
    pub orphan: bool,
    pub rich_parameter_values: Vec<RichParameterValue>,
    pub state: Vec<u8>,
}

impl CreateBuildRequest {
    pub fn new(transition: WorkspaceTransition, template_version_id: Uuid) -> Self {
        Self {
            transition,
            template_version_id,
            dry_run: false,
            orphan: false,
            rich_parameter_values: Vec::new(),
            state: Vec::new(),
        }
    }
}

/// Body of a delete build; the delete transition takes no template version.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteBuildRequest {
    pub transition: WorkspaceTransition,
}

/// Body of `PUT /api/v2/workspaces/{id}/dormant`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateDormancyRequest {
    pub dormant: bool,
}

/// Error body shape returned by Coder.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}
