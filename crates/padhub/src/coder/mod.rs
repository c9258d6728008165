//! Coder workspace provisioning client module.
//!
//! Provides an async client for managing users and per-user pad workspaces
//! on a remote Coder deployment.

mod client;
mod error;
mod types;

use async_trait::async_trait;
use uuid::Uuid;

pub use client::CoderClient;
pub use error::{CoderError, CoderResult};
pub use types::*;

/// Minimal provisioning abstraction for testability.
///
/// Covers the operations the login flow drives: a user account and a pad
/// workspace for it.
#[async_trait]
pub trait WorkspaceProvisioner: Send + Sync {
    async fn ensure_user_exists(&self, user_info: &UserInfo) -> CoderResult<(User, bool)>;
    async fn ensure_workspace_exists(
        &self,
        username: &str,
        user_id: Uuid,
    ) -> CoderResult<Option<Workspace>>;
    async fn start_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild>;
    async fn stop_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild>;
}

/// Run the login-time provisioning flow.
///
/// Ensures the account exists, then ensures its pad workspace exists.
/// Returns the user and the workspace when one was newly created.
pub async fn provision(
    provisioner: &dyn WorkspaceProvisioner,
    user_info: &UserInfo,
) -> CoderResult<(User, Option<Workspace>)> {
    let (user, created) = provisioner.ensure_user_exists(user_info).await?;
    if created {
        tracing::info!(username = %user.username, "provisioned new user");
    }

    let workspace = provisioner
        .ensure_workspace_exists(&user.username, user.id)
        .await?;
    Ok((user, workspace))
}

#[async_trait]
impl WorkspaceProvisioner for CoderClient {
    async fn ensure_user_exists(&self, user_info: &UserInfo) -> CoderResult<(User, bool)> {
        self.ensure_user_exists(user_info).await
    }

    async fn ensure_workspace_exists(
        &self,
        username: &str,
        user_id: Uuid,
    ) -> CoderResult<Option<Workspace>> {
        self.ensure_workspace_exists(username, user_id).await
    }

    async fn start_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild> {
        self.start_workspace(workspace_id).await
    }

    async fn stop_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild> {
        self.stop_workspace(workspace_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn fake_user(id: Uuid) -> User {
        User {
            id,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            name: String::new(),
            created_at: None,
        }
    }

    fn fake_workspace(owner_id: Uuid) -> Workspace {
        Workspace {
            id: Uuid::new_v4(),
            name: "pad".to_string(),
            owner_id,
            owner_name: "alice".to_string(),
            template_id: Uuid::new_v4(),
            template_active_version_id: Uuid::new_v4(),
            dormant_at: None,
            deleting_at: None,
        }
    }

    /// Records the calls the provisioning flow makes.
    struct FakeProvisioner {
        user_id: Uuid,
        workspace_missing: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProvisioner {
        fn new(user_id: Uuid, workspace_missing: bool) -> Self {
            Self {
                user_id,
                workspace_missing,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WorkspaceProvisioner for FakeProvisioner {
        async fn ensure_user_exists(&self, user_info: &UserInfo) -> CoderResult<(User, bool)> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("ensure_user {}", user_info.email));
            Ok((fake_user(self.user_id), false))
        }

        async fn ensure_workspace_exists(
            &self,
            username: &str,
            user_id: Uuid,
        ) -> CoderResult<Option<Workspace>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("ensure_workspace {username} {user_id}"));
            Ok(self.workspace_missing.then(|| fake_workspace(user_id)))
        }

        async fn start_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild> {
            Ok(WorkspaceBuild {
                id: Uuid::new_v4(),
                workspace_id,
                transition: WorkspaceTransition::Start,
                status: None,
            })
        }

        async fn stop_workspace(&self, workspace_id: Uuid) -> CoderResult<WorkspaceBuild> {
            Ok(WorkspaceBuild {
                id: Uuid::new_v4(),
                workspace_id,
                transition: WorkspaceTransition::Stop,
                status: None,
            })
        }
    }

    #[tokio::test]
    async fn provision_ensures_user_then_workspace() {
        let user_id = Uuid::new_v4();
        let provisioner = FakeProvisioner::new(user_id, true);
        let info = UserInfo {
            email: "alice@example.com".to_string(),
            name: String::new(),
        };

        let (user, workspace) = provision(&provisioner, &info).await.unwrap();
        assert_eq!(user.id, user_id);
        assert!(workspace.is_some());

        // The workspace ensure runs after, and with, the resolved user.
        let calls = provisioner.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                "ensure_user alice@example.com".to_string(),
                format!("ensure_workspace alice {user_id}"),
            ]
        );
    }

    #[tokio::test]
    async fn provision_reports_existing_workspace() {
        let provisioner = FakeProvisioner::new(Uuid::new_v4(), false);
        let info = UserInfo {
            email: "alice@example.com".to_string(),
            name: String::new(),
        };

        let (_, workspace) = provision(&provisioner, &info).await.unwrap();
        assert!(workspace.is_none());
    }
}
