/// Authorization helpers and capability checks
///
/// This module provides utilities for role-based access control (RBAC) on
/// projects in Plinth.
///
/// # Permission Model
///
/// Plinth resolves every request to a [`Capabilities`] set for one project:
///
/// 1. **Project Membership**: An accepted membership maps the user's role
///    (Owner, Editor, Viewer) to capabilities
/// 2. **API Keys**: A project's key grants read and write on that project
///    only, never member or settings management
/// 3. **Anonymous**: Public projects grant read to unauthenticated callers;
///    private projects grant nothing
///
/// # Example
///
/// ```no_run
/// use plinth_shared::auth::authorization::{capabilities_of, require_role};
/// use plinth_shared::auth::middleware::AuthContext;
/// use plinth_shared::models::membership::ProjectRole;
/// use plinth_shared::models::project::Project;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// async fn check_permissions(
///     pool: &PgPool,
///     project: &Project,
///     auth: Option<&AuthContext>,
/// ) -> Result<(), Box<dyn std::error::Error>> {
///     let caps = capabilities_of(pool, project, auth).await?;
///     if !caps.write {
///         return Err("read-only access".into());
///     }
///     Ok(())
/// }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::{AuthContext, AuthMethod};
use crate::models::membership::{ProjectMembership, ProjectRole};
use crate::models::project::Project;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Caller presented no credentials for an operation that requires them
    #[error("Authentication required")]
    Unauthenticated,

    /// User has no accepted membership in the project
    #[error("Not a member of project {0}")]
    NotMember(Uuid),

    /// User's role is below the required role
    #[error("Insufficient role: requires {required:?}, has {actual:?}")]
    InsufficientRole {
        required: ProjectRole,
        actual: ProjectRole,
    },

    /// Caller's capabilities do not allow the operation
    #[error("Not authorized to perform this operation")]
    NotAuthorized,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Capability set resolved for one caller on one project
///
/// Capabilities are derived, never stored. Roles map as:
///
/// | capability       | Owner | Editor | Viewer |
/// |------------------|-------|--------|--------|
/// | read             | yes   | yes    | yes    |
/// | write            | yes   | yes    | no     |
/// | manage_members   | yes   | yes    | no     |
/// | manage_settings  | yes   | no     | no     |
/// | delete_project   | yes   | no     | no     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub manage_members: bool,
    pub manage_settings: bool,
    pub delete_project: bool,
}

impl Capabilities {
    /// No access at all (non-member on a private project)
    pub fn none() -> Self {
        Self {
            read: false,
            write: false,
            manage_members: false,
            manage_settings: false,
            delete_project: false,
        }
    }

    /// Read-only access (anonymous or non-member on a public project)
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::none()
        }
    }

    /// Access granted by a project's own API key
    ///
    /// Keys act on data, not on governance: no member, settings, or
    /// deletion rights.
    pub fn api_key() -> Self {
        Self {
            read: true,
            write: true,
            ..Self::none()
        }
    }

    /// Capabilities for an accepted membership role
    pub fn for_role(role: ProjectRole) -> Self {
        Self {
            read: role.can_read(),
            write: role.can_write(),
            manage_members: role.can_manage_members(),
            manage_settings: role.can_manage_settings(),
            delete_project: role.can_delete_project(),
        }
    }

    /// Returns true if no capability is granted
    pub fn is_empty(&self) -> bool {
        !(self.read
            || self.write
            || self.manage_members
            || self.manage_settings
            || self.delete_project)
    }
}

/// Resolves the capability set for a caller on a project
///
/// The caller may be anonymous (`auth` is `None`), a JWT-authenticated user,
/// or a project API key. Pending, rejected, and expired memberships grant
/// nothing; only accepted memberships count.
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `project` - The project being accessed
/// * `auth` - Authentication context, if any
///
/// # Returns
///
/// The resolved [`Capabilities`]. This function never fails for lack of
/// access; callers decide what an empty set means for their operation.
///
/// # Errors
///
/// Returns `AuthzError::DatabaseError` if the membership lookup fails
///
/// # Example
///
/// ```no_run
/// # use plinth_shared::auth::authorization::capabilities_of;
/// # use plinth_shared::auth::middleware::AuthContext;
/// # use plinth_shared::models::project::Project;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool, project: Project) -> Result<(), Box<dyn std::error::Error>> {
/// let caps = capabilities_of(&pool, &project, None).await?;
/// assert_eq!(caps.read, project.is_public);
/// # Ok(())
/// # }
/// ```
pub async fn capabilities_of(
    pool: &PgPool,
    project: &Project,
    auth: Option<&AuthContext>,
) -> Result<Capabilities, AuthzError> {
    let public_default = if project.is_public {
        Capabilities::read_only()
    } else {
        Capabilities::none()
    };

    let Some(auth) = auth else {
        return Ok(public_default);
    };

    match auth.method {
        AuthMethod::ApiKey => {
            if auth.project_id == Some(project.id) {
                Ok(Capabilities::api_key())
            } else {
                // A key for another project is no better than anonymous here.
                Ok(public_default)
            }
        }
        AuthMethod::Jwt => {
            let Some(user_id) = auth.user_id else {
                return Ok(public_default);
            };

            match ProjectMembership::get_role(pool, project.id, user_id).await? {
                Some(role) => Ok(Capabilities::for_role(role)),
                None => Ok(public_default),
            }
        }
    }
}

/// Checks if a user has an accepted membership in a project
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `project_id` - Project ID
/// * `user_id` - User ID
///
/// # Returns
///
/// `Ok(())` if the user is an accepted member, error otherwise
///
/// # Errors
///
/// Returns `AuthzError::NotMember` if the user has no accepted membership
///
/// # Example
///
/// ```no_run
/// # use plinth_shared::auth::authorization::require_membership;
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
/// # async fn example(pool: PgPool, project_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// require_membership(&pool, project_id, user_id).await?;
/// # Ok(())
/// # }
/// ```
pub async fn require_membership(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<(), AuthzError> {
    let has_access = ProjectMembership::has_access(pool, project_id, user_id).await?;

    if !has_access {
        return Err(AuthzError::NotMember(project_id));
    }

    Ok(())
}

/// Checks if a user holds at least the required role in a project
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `project_id` - Project ID
/// * `user_id` - User ID
/// * `required_role` - Minimum required role
///
/// # Returns
///
/// The user's actual role if it satisfies the requirement
///
/// # Errors
///
/// Returns error if:
/// - User has no accepted membership
/// - User's role is below the requirement
///
/// # Example
///
/// ```no_run
/// # use plinth_shared::auth::authorization::require_role;
/// # use plinth_shared::models::membership::ProjectRole;
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
/// # async fn example(pool: PgPool, project_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// // Require editor or higher
/// require_role(&pool, project_id, user_id, ProjectRole::Editor).await?;
/// # Ok(())
/// # }
/// ```
pub async fn require_role(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    required_role: ProjectRole,
) -> Result<ProjectRole, AuthzError> {
    let user_role = ProjectMembership::get_role(pool, project_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(project_id))?;

    if !user_role.has_permission(&required_role) {
        return Err(AuthzError::InsufficientRole {
            required: required_role,
            actual: user_role,
        });
    }

    Ok(user_role)
}

/// Requires an authenticated user in the auth context
///
/// API key contexts carry no user identity, so governance operations
/// (invitations, role changes, settings) reject them here.
///
/// # Returns
///
/// The user ID
///
/// # Errors
///
/// Returns `AuthzError::Unauthenticated` if the context is absent or
/// carries no user
///
/// # Example
///
/// ```no_run
/// # use plinth_shared::auth::authorization::require_user;
/// # use plinth_shared::auth::middleware::AuthContext;
/// # fn example(auth: Option<&AuthContext>) -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = require_user(auth)?;
/// # Ok(())
/// # }
/// ```
pub fn require_user(auth: Option<&AuthContext>) -> Result<Uuid, AuthzError> {
    auth.and_then(|a| a.user_id).ok_or(AuthzError::Unauthenticated)
}

/// Requires read capability on a project
///
/// Succeeds for accepted members, the project's own API key, and anonymous
/// callers on public projects.
///
/// # Example
///
/// ```no_run
/// # use plinth_shared::auth::authorization::require_read;
/// # use plinth_shared::auth::middleware::AuthContext;
/// # use plinth_shared::models::project::Project;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool, project: Project, auth: Option<AuthContext>) -> Result<(), Box<dyn std::error::Error>> {
/// require_read(&pool, &project, auth.as_ref()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn require_read(
    pool: &PgPool,
    project: &Project,
    auth: Option<&AuthContext>,
) -> Result<Capabilities, AuthzError> {
    let caps = capabilities_of(pool, project, auth).await?;

    if !caps.read {
        // Distinguish "log in first" from "you may not".
        if auth.is_none() {
            return Err(AuthzError::Unauthenticated);
        }
        return Err(AuthzError::NotAuthorized);
    }

    Ok(caps)
}

/// Requires write capability on a project
///
/// Succeeds for owners, editors, and the project's own API key.
///
/// # Example
///
/// ```no_run
/// # use plinth_shared::auth::authorization::require_write;
/// # use plinth_shared::auth::middleware::AuthContext;
/// # use plinth_shared::models::project::Project;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool, project: Project, auth: Option<AuthContext>) -> Result<(), Box<dyn std::error::Error>> {
/// require_write(&pool, &project, auth.as_ref()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn require_write(
    pool: &PgPool,
    project: &Project,
    auth: Option<&AuthContext>,
) -> Result<Capabilities, AuthzError> {
    let caps = capabilities_of(pool, project, auth).await?;

    if !caps.write {
        if auth.is_none() {
            return Err(AuthzError::Unauthenticated);
        }
        return Err(AuthzError::NotAuthorized);
    }

    Ok(caps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_for_owner() {
        let caps = Capabilities::for_role(ProjectRole::Owner);
        assert!(caps.read);
        assert!(caps.write);
        assert!(caps.manage_members);
        assert!(caps.manage_settings);
        assert!(caps.delete_project);
    }

    #[test]
    fn test_capabilities_for_editor() {
        let caps = Capabilities::for_role(ProjectRole::Editor);
        assert!(caps.read);
        assert!(caps.write);
        assert!(caps.manage_members);
        assert!(!caps.manage_settings);
        assert!(!caps.delete_project);
    }

    #[test]
    fn test_capabilities_for_viewer() {
        let caps = Capabilities::for_role(ProjectRole::Viewer);
        assert!(caps.read);
        assert!(!caps.write);
        assert!(!caps.manage_members);
        assert!(!caps.manage_settings);
        assert!(!caps.delete_project);
    }

    #[test]
    fn test_capabilities_none_and_read_only() {
        assert!(Capabilities::none().is_empty());

        let read_only = Capabilities::read_only();
        assert!(read_only.read);
        assert!(!read_only.write);
        assert!(!read_only.is_empty());
    }

    #[test]
    fn test_capabilities_api_key() {
        let caps = Capabilities::api_key();
        assert!(caps.read);
        assert!(caps.write);
        assert!(!caps.manage_members);
        assert!(!caps.manage_settings);
        assert!(!caps.delete_project);
    }

    #[test]
    fn test_require_user() {
        let user_id = Uuid::new_v4();
        let jwt = AuthContext::from_jwt(user_id);
        assert_eq!(require_user(Some(&jwt)).ok(), Some(user_id));

        // Anonymous
        assert!(matches!(
            require_user(None),
            Err(AuthzError::Unauthenticated)
        ));

        // API key contexts have no user
        let key_ctx = AuthContext {
            user_id: None,
            project_id: Some(Uuid::new_v4()),
            method: AuthMethod::ApiKey,
        };
        assert!(matches!(
            require_user(Some(&key_ctx)),
            Err(AuthzError::Unauthenticated)
        ));
    }

    #[test]
    fn test_authz_error_display() {
        let err = AuthzError::NotMember(Uuid::new_v4());
        assert!(err.to_string().contains("Not a member"));

        let err = AuthzError::InsufficientRole {
            required: ProjectRole::Owner,
            actual: ProjectRole::Viewer,
        };
        assert!(err.to_string().contains("Insufficient role"));

        let err = AuthzError::Unauthenticated;
        assert!(err.to_string().contains("Authentication required"));
    }
}

// Integration tests exercising capabilities_of against real memberships are
// in the tests/ directory.
