/// Membership and invitation endpoints
///
/// This module implements the invitation lifecycle over project
/// memberships: invite, accept, reject, revoke, and role changes. Member
/// operations hang off a project; invitation responses hang off the
/// invitee's own invitation list.
///
/// # Endpoints
///
/// - `POST /v1/projects/:project_id/members` - Invite a user by email
/// - `GET /v1/projects/:project_id/members` - List project memberships
/// - `DELETE /v1/projects/:project_id/members/:membership_id` - Revoke
/// - `PATCH /v1/projects/:project_id/members/:membership_id` - Change role
/// - `GET /v1/invitations` - List the caller's pending invitations
/// - `POST /v1/invitations/:membership_id/accept` - Accept
/// - `POST /v1/invitations/:membership_id/reject` - Reject

use crate::{
    app::AppState,
    config::InvitePolicy,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use plinth_shared::{
    auth::{
        authorization::{capabilities_of, require_role, require_user},
        middleware::AuthContext,
    },
    models::{
        membership::{InvitationStatus, InviteMember, ProjectMembership, ProjectRole},
        project::Project,
        user::User,
    },
    notify::WebhookEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// Invite request
#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    /// Email of the user to invite (must already have an account)
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Role granted on acceptance (defaults to viewer)
    #[serde(default = "default_invite_role")]
    pub role: ProjectRole,

    /// Optional message shown to the invitee
    #[validate(length(max = 500, message = "Message must be at most 500 characters"))]
    pub message: Option<String>,
}

fn default_invite_role() -> ProjectRole {
    ProjectRole::Viewer
}

/// Change role request
#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    /// New role for the member
    pub role: ProjectRole,
}

/// Membership representation returned by all membership endpoints
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: ProjectRole,
    pub status: InvitationStatus,
    pub invited_by: Option<String>,
    pub message: Option<String>,
    pub invited_at: chrono::DateTime<chrono::Utc>,
    pub responded_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ProjectMembership> for MembershipResponse {
    fn from(m: ProjectMembership) -> Self {
        MembershipResponse {
            id: m.id.to_string(),
            project_id: m.project_id.to_string(),
            user_id: m.user_id.to_string(),
            role: m.role,
            status: m.status,
            invited_by: m.invited_by.map(|id| id.to_string()),
            message: m.message,
            invited_at: m.invited_at,
            responded_at: m.responded_at,
        }
    }
}

/// List memberships response
#[derive(Debug, Serialize)]
pub struct ListMembershipsResponse {
    pub members: Vec<MembershipResponse>,
}

/// List invitations response
#[derive(Debug, Serialize)]
pub struct ListInvitationsResponse {
    pub invitations: Vec<MembershipResponse>,
}

async fn load_project(state: &AppState, project_id: Uuid) -> Result<Project, ApiError> {
    Project::find_by_id(&state.db, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
}

/// Invite a user to a project
///
/// Requires the `manage_members` capability; with `INVITE_POLICY=owner_only`
/// the owner role is required instead. The invitee must already have an
/// account. Rejected and expired invitations are replaced by a fresh
/// pending one; pending and accepted memberships block re-invitation with
/// `duplicate_membership`.
///
/// # Endpoint
///
/// ```text
/// POST /v1/projects/:project_id/members
/// Authorization: Bearer <jwt_token>
/// Content-Type: application/json
///
/// {
///   "email": "teammate@example.com",
///   "role": "editor",
///   "message": "Join the mobile backend project"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller may not invite under the active policy
/// - `404 Not Found`: No such project or no user with that email
/// - `409 Conflict`: A pending or accepted membership already exists
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Json<MembershipResponse>> {
    let user_id = require_user(Some(&auth))?;
    req.validate()?;

    let project = load_project(&state, project_id).await?;

    match state.config.invite_policy {
        InvitePolicy::OwnersAndEditors => {
            let caps = capabilities_of(&state.db, &project, Some(&auth)).await?;
            if !caps.manage_members {
                return Err(if caps.is_empty() {
                    ApiError::NotFound("Project not found".to_string())
                } else {
                    ApiError::InsufficientRole(
                        "Not authorized for this operation".to_string(),
                    )
                });
            }
        }
        InvitePolicy::OwnerOnly => {
            require_role(&state.db, project_id, user_id, ProjectRole::Owner).await?;
        }
    }

    let invitee = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let membership = ProjectMembership::invite(
        &state.db,
        InviteMember {
            project_id,
            user_id: invitee.id,
            role: req.role,
            invited_by: Some(user_id),
            message: req.message,
        },
    )
    .await?;

    state.notifier.notify(
        &project,
        WebhookEvent::MemberInvited,
        json!({
            "membership_id": membership.id,
            "user_id": invitee.id,
            "role": membership.role,
            "invited_by": user_id,
        }),
    );

    Ok(Json(membership.into()))
}

/// List a project's memberships
///
/// Visible to accepted members only; every lifecycle state is included so
/// inviters can see who has not responded yet.
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id/members
/// Authorization: Bearer <jwt_token>
/// ```
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ListMembershipsResponse>> {
    let user_id = require_user(Some(&auth))?;

    load_project(&state, project_id).await?;
    plinth_shared::auth::authorization::require_membership(&state.db, project_id, user_id)
        .await?;

    let members = ProjectMembership::list_by_project(&state.db, project_id).await?;

    Ok(Json(ListMembershipsResponse {
        members: members.into_iter().map(Into::into).collect(),
    }))
}

/// Revoke a membership or leave a project
///
/// Members with `manage_members` can remove anyone; any member can remove
/// their own membership. Removing the last accepted owner is refused with
/// `last_owner_protection`.
///
/// # Endpoint
///
/// ```text
/// DELETE /v1/projects/:project_id/members/:membership_id
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller may not remove this member
/// - `404 Not Found`: No such project or membership
/// - `409 Conflict`: The membership is the last accepted owner
pub async fn revoke_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, membership_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = require_user(Some(&auth))?;

    let project = load_project(&state, project_id).await?;

    let membership = ProjectMembership::find_by_id(&state.db, membership_id)
        .await?
        .filter(|m| m.project_id == project_id)
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))?;

    if membership.user_id != user_id {
        let caps = capabilities_of(&state.db, &project, Some(&auth)).await?;
        if !caps.manage_members {
            return Err(if caps.is_empty() {
                ApiError::NotFound("Project not found".to_string())
            } else {
                ApiError::InsufficientRole("Not authorized for this operation".to_string())
            });
        }
    }

    ProjectMembership::revoke(&state.db, membership_id).await?;

    state.notifier.notify(
        &project,
        WebhookEvent::MemberRevoked,
        json!({
            "membership_id": membership_id,
            "user_id": membership.user_id,
            "revoked_by": user_id,
        }),
    );

    Ok(Json(json!({ "revoked": true })))
}

/// Change an accepted member's role
///
/// Owner only. Demoting the last accepted owner is refused with
/// `last_owner_protection`; changing a membership that is not accepted
/// fails with `invalid_state`.
///
/// # Endpoint
///
/// ```text
/// PATCH /v1/projects/:project_id/members/:membership_id
/// Authorization: Bearer <jwt_token>
/// Content-Type: application/json
///
/// {
///   "role": "editor"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an owner
/// - `404 Not Found`: No such project or membership
/// - `409 Conflict`: Membership not accepted, or last-owner demotion
pub async fn change_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, membership_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<MembershipResponse>> {
    let user_id = require_user(Some(&auth))?;

    let project = load_project(&state, project_id).await?;
    require_role(&state.db, project_id, user_id, ProjectRole::Owner).await?;

    ProjectMembership::find_by_id(&state.db, membership_id)
        .await?
        .filter(|m| m.project_id == project_id)
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))?;

    let updated = ProjectMembership::change_role(&state.db, membership_id, req.role).await?;

    state.notifier.notify(
        &project,
        WebhookEvent::MemberRoleChanged,
        json!({
            "membership_id": updated.id,
            "user_id": updated.user_id,
            "role": updated.role,
            "changed_by": user_id,
        }),
    );

    Ok(Json(updated.into()))
}

/// List the caller's pending invitations
///
/// # Endpoint
///
/// ```text
/// GET /v1/invitations
/// Authorization: Bearer <jwt_token>
/// ```
pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListInvitationsResponse>> {
    let user_id = require_user(Some(&auth))?;

    let invitations = ProjectMembership::list_pending_for_user(&state.db, user_id).await?;

    Ok(Json(ListInvitationsResponse {
        invitations: invitations.into_iter().map(Into::into).collect(),
    }))
}

/// Accept a pending invitation
///
/// Only the invitee may respond. Responding to an invitation that is no
/// longer pending fails with `invalid_state`.
///
/// # Endpoint
///
/// ```text
/// POST /v1/invitations/:membership_id/accept
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not the invitee
/// - `404 Not Found`: No such invitation
/// - `409 Conflict`: Invitation is not pending
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(membership_id): Path<Uuid>,
) -> ApiResult<Json<MembershipResponse>> {
    let user_id = require_user(Some(&auth))?;

    let membership = ProjectMembership::accept(&state.db, membership_id, user_id).await?;

    if let Some(project) = Project::find_by_id(&state.db, membership.project_id).await? {
        state.notifier.notify(
            &project,
            WebhookEvent::MemberAccepted,
            json!({
                "membership_id": membership.id,
                "user_id": membership.user_id,
                "role": membership.role,
            }),
        );
    }

    Ok(Json(membership.into()))
}

/// Reject a pending invitation
///
/// The row stays behind as `rejected` and does not block a later
/// re-invitation.
///
/// # Endpoint
///
/// ```text
/// POST /v1/invitations/:membership_id/reject
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Errors
///
/// Same as [`accept_invitation`]
pub async fn reject_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(membership_id): Path<Uuid>,
) -> ApiResult<Json<MembershipResponse>> {
    let user_id = require_user(Some(&auth))?;

    let membership = ProjectMembership::reject(&state.db, membership_id, user_id).await?;

    if let Some(project) = Project::find_by_id(&state.db, membership.project_id).await? {
        state.notifier.notify(
            &project,
            WebhookEvent::MemberRejected,
            json!({
                "membership_id": membership.id,
                "user_id": membership.user_id,
            }),
        );
    }

    Ok(Json(membership.into()))
}
