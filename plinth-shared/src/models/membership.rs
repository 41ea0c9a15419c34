/// Project membership model: RBAC roles plus the invitation lifecycle
///
/// This module provides the ProjectMembership model for user-project
/// relationships. A membership is both a role assignment and an invitation
/// record: it is created as a pending invitation and becomes an active role
/// grant once the invitee accepts.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_role AS ENUM ('owner', 'editor', 'viewer');
/// CREATE TYPE invitation_status AS ENUM ('pending', 'accepted', 'rejected', 'expired');
///
/// CREATE TABLE project_memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id),
///     role project_role NOT NULL DEFAULT 'viewer',
///     status invitation_status NOT NULL DEFAULT 'pending',
///     invited_by UUID REFERENCES users(id),
///     message TEXT,
///     invited_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     responded_at TIMESTAMPTZ,
///     UNIQUE (project_id, user_id)
/// );
/// ```
///
/// # Lifecycle
///
/// ```text
/// invite ──> pending ──accept──> accepted ──revoke──> (row deleted)
///               │
///               ├──reject──> rejected ──invite──> pending (row reset)
///               ├──(TTL sweep)──> expired ──invite──> pending (row reset)
///               └──revoke──> (row deleted)
/// ```
///
/// Only `pending` invitations can be accepted or rejected. A user holds at
/// most one membership row per project; the UNIQUE constraint backs that
/// invariant under concurrent invitations. State transitions run inside
/// transactions with the row locked, so concurrent accept/revoke pairs
/// serialize instead of corrupting state.
///
/// # Roles
///
/// - **owner**: Full control, settings, member management, delete project
/// - **editor**: Read and write data, invite members
/// - **viewer**: Read-only access
///
/// # Example
///
/// ```no_run
/// use plinth_shared::models::membership::{ProjectMembership, InviteMember, ProjectRole};
/// use plinth_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let project_id = Uuid::new_v4();
/// let invitee = Uuid::new_v4();
/// let inviter = Uuid::new_v4();
///
/// // Invite a user as an editor
/// let invitation = ProjectMembership::invite(&pool, InviteMember {
///     project_id,
///     user_id: invitee,
///     role: ProjectRole::Editor,
///     invited_by: Some(inviter),
///     message: Some("Join the mobile backend project".to_string()),
/// }).await?;
///
/// // The invitee accepts; the role from the invitation now applies
/// let membership = ProjectMembership::accept(&pool, invitation.id, invitee).await?;
/// assert_eq!(membership.role, ProjectRole::Editor);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Errors from membership state-machine operations
#[derive(Debug, Error)]
pub enum MembershipError {
    /// No membership row matches the given identifiers
    #[error("membership not found")]
    NotFound,

    /// A pending or accepted membership already exists for this user
    #[error("user already has a membership in this project")]
    DuplicateMembership,

    /// The membership is not in a state that allows this transition
    #[error("operation not allowed while membership is {}", .0.as_str())]
    InvalidState(InvitationStatus),

    /// The operation would leave the project without an accepted owner
    #[error("project must keep at least one accepted owner")]
    LastOwnerProtection,

    /// Only the invited user may respond to an invitation
    #[error("only the invited user can respond to this invitation")]
    NotInvitee,

    /// Underlying database error
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// RBAC roles for project memberships
///
/// Roles form a strict hierarchy: owner > editor > viewer. Every
/// capability granted to a role is granted to the roles above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    /// Full control: settings, member management, delete project
    Owner,

    /// Can read and write project data and invite members
    Editor,

    /// Read-only access to project data
    Viewer,
}

impl ProjectRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "owner",
            ProjectRole::Editor => "editor",
            ProjectRole::Viewer => "viewer",
        }
    }

    /// Parses a role from a string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(ProjectRole::Owner),
            "editor" => Some(ProjectRole::Editor),
            "viewer" => Some(ProjectRole::Viewer),
            _ => None,
        }
    }

    /// Can read project data
    pub fn can_read(&self) -> bool {
        true
    }

    /// Can write project data (rows and files)
    pub fn can_write(&self) -> bool {
        matches!(self, ProjectRole::Owner | ProjectRole::Editor)
    }

    /// Can invite members and manage their roles
    pub fn can_manage_members(&self) -> bool {
        matches!(self, ProjectRole::Owner | ProjectRole::Editor)
    }

    /// Can change project settings, quotas, and rotate the API key
    pub fn can_manage_settings(&self) -> bool {
        matches!(self, ProjectRole::Owner)
    }

    /// Can delete the project
    pub fn can_delete_project(&self) -> bool {
        matches!(self, ProjectRole::Owner)
    }

    /// Checks if this role has the permission level of the required role
    ///
    /// Hierarchy: Owner > Editor > Viewer
    pub fn has_permission(&self, required: &ProjectRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    /// Returns numeric permission level for comparison
    fn permission_level(&self) -> u8 {
        match self {
            ProjectRole::Owner => 3,
            ProjectRole::Editor => 2,
            ProjectRole::Viewer => 1,
        }
    }
}

/// Lifecycle states of a membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    /// Invitation sent, awaiting the invitee's response
    Pending,

    /// Invitation accepted; the role grant is active
    Accepted,

    /// Invitation declined by the invitee
    Rejected,

    /// Invitation lapsed without a response
    Expired,
}

impl InvitationStatus {
    /// Converts status to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
            InvitationStatus::Expired => "expired",
        }
    }

    /// Parses a status from a string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "rejected" => Some(InvitationStatus::Rejected),
            "expired" => Some(InvitationStatus::Expired),
            _ => None,
        }
    }

    /// Whether a new invitation may replace a row in this state
    ///
    /// Rejected and expired rows don't block re-invitation; pending and
    /// accepted rows do.
    pub fn allows_reinvite(&self) -> bool {
        matches!(self, InvitationStatus::Rejected | InvitationStatus::Expired)
    }
}

/// Membership row: a role assignment with its invitation lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectMembership {
    /// Unique membership ID
    pub id: Uuid,

    /// Project this membership belongs to
    pub project_id: Uuid,

    /// The invited (or member) user
    pub user_id: Uuid,

    /// Role granted once the invitation is accepted
    pub role: ProjectRole,

    /// Current lifecycle state
    pub status: InvitationStatus,

    /// User who sent the invitation (None for the implicit owner membership)
    pub invited_by: Option<Uuid>,

    /// Optional message shown to the invitee
    pub message: Option<String>,

    /// When the invitation was sent (reset on re-invitation)
    pub invited_at: DateTime<Utc>,

    /// When the invitee responded (None while pending)
    pub responded_at: Option<DateTime<Utc>>,
}

/// Input for inviting a user to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteMember {
    /// Project ID
    pub project_id: Uuid,

    /// User to invite
    pub user_id: Uuid,

    /// Role to grant on acceptance (defaults to Viewer)
    #[serde(default = "default_role")]
    pub role: ProjectRole,

    /// User sending the invitation
    pub invited_by: Option<Uuid>,

    /// Optional message shown to the invitee
    pub message: Option<String>,
}

fn default_role() -> ProjectRole {
    ProjectRole::Viewer
}

impl ProjectMembership {
    /// Invites a user to a project
    ///
    /// Creates a pending membership, or resets an existing rejected or
    /// expired row back to pending with the new role, inviter, and message.
    /// A pending or accepted row blocks re-invitation.
    ///
    /// The existing row is locked for the duration of the transaction, and
    /// the UNIQUE (project_id, user_id) constraint catches the race where
    /// two invitations for the same user are inserted concurrently.
    ///
    /// # Errors
    ///
    /// - `DuplicateMembership` if the user already has a pending or
    ///   accepted membership
    /// - `Database` if the project or user doesn't exist, or the query fails
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use plinth_shared::models::membership::{ProjectMembership, InviteMember, ProjectRole};
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, project_id: Uuid, user_id: Uuid, inviter: Uuid) -> Result<(), Box<dyn std::error::Error>> {
    /// let invitation = ProjectMembership::invite(&pool, InviteMember {
    ///     project_id,
    ///     user_id,
    ///     role: ProjectRole::Viewer,
    ///     invited_by: Some(inviter),
    ///     message: None,
    /// }).await?;
    /// assert_eq!(invitation.role, ProjectRole::Viewer);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn invite(pool: &PgPool, data: InviteMember) -> Result<Self, MembershipError> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE project_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(data.project_id)
        .bind(data.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let membership = match existing {
            Some(row) if row.status.allows_reinvite() => {
                // Reuse the row so the one-per-pair constraint keeps holding
                sqlx::query_as::<_, ProjectMembership>(
                    r#"
                    UPDATE project_memberships
                    SET role = $2, status = 'pending', invited_by = $3, message = $4,
                        invited_at = NOW(), responded_at = NULL
                    WHERE id = $1
                    RETURNING id, project_id, user_id, role, status, invited_by, message,
                              invited_at, responded_at
                    "#,
                )
                .bind(row.id)
                .bind(data.role)
                .bind(data.invited_by)
                .bind(&data.message)
                .fetch_one(&mut *tx)
                .await?
            }
            Some(_) => {
                tx.rollback().await?;
                return Err(MembershipError::DuplicateMembership);
            }
            None => {
                let inserted = sqlx::query_as::<_, ProjectMembership>(
                    r#"
                    INSERT INTO project_memberships (project_id, user_id, role, invited_by, message)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, project_id, user_id, role, status, invited_by, message,
                              invited_at, responded_at
                    "#,
                )
                .bind(data.project_id)
                .bind(data.user_id)
                .bind(data.role)
                .bind(data.invited_by)
                .bind(&data.message)
                .fetch_one(&mut *tx)
                .await;

                match inserted {
                    Ok(row) => row,
                    Err(e) if is_unique_violation(&e) => {
                        // Lost the race to a concurrent invitation
                        tx.rollback().await?;
                        return Err(MembershipError::DuplicateMembership);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        tx.commit().await?;

        Ok(membership)
    }

    /// Accepts a pending invitation
    ///
    /// The role recorded on the invitation becomes active. Only the
    /// invited user can accept, and only while the invitation is pending.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no membership row has this ID (including revoked
    ///   invitations, whose rows are deleted)
    /// - `NotInvitee` if `user_id` is not the invited user
    /// - `InvalidState` if the invitation is not pending
    pub async fn accept(
        pool: &PgPool,
        membership_id: Uuid,
        user_id: Uuid,
    ) -> Result<Self, MembershipError> {
        Self::respond(pool, membership_id, user_id, InvitationStatus::Accepted).await
    }

    /// Rejects a pending invitation
    ///
    /// The row stays behind as `rejected` and does not block a later
    /// re-invitation.
    ///
    /// # Errors
    ///
    /// Same as [`ProjectMembership::accept`]
    pub async fn reject(
        pool: &PgPool,
        membership_id: Uuid,
        user_id: Uuid,
    ) -> Result<Self, MembershipError> {
        Self::respond(pool, membership_id, user_id, InvitationStatus::Rejected).await
    }

    /// Shared transition for accept/reject
    async fn respond(
        pool: &PgPool,
        membership_id: Uuid,
        user_id: Uuid,
        new_status: InvitationStatus,
    ) -> Result<Self, MembershipError> {
        let mut tx = pool.begin().await?;

        let row = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(membership_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(MembershipError::NotFound)?;

        if row.user_id != user_id {
            tx.rollback().await?;
            return Err(MembershipError::NotInvitee);
        }

        if row.status != InvitationStatus::Pending {
            tx.rollback().await?;
            return Err(MembershipError::InvalidState(row.status));
        }

        let membership = sqlx::query_as::<_, ProjectMembership>(
            r#"
            UPDATE project_memberships
            SET status = $2, responded_at = NOW()
            WHERE id = $1
            RETURNING id, project_id, user_id, role, status, invited_by, message,
                      invited_at, responded_at
            "#,
        )
        .bind(membership_id)
        .bind(new_status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(membership)
    }

    /// Revokes a membership or cancels a pending invitation
    ///
    /// Deletes the row, so a later accept of a revoked invitation fails
    /// with `NotFound`. Removing the last accepted owner is refused.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the membership doesn't exist
    /// - `LastOwnerProtection` if this is the project's only accepted owner
    pub async fn revoke(pool: &PgPool, membership_id: Uuid) -> Result<(), MembershipError> {
        let mut tx = pool.begin().await?;

        let row = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(membership_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(MembershipError::NotFound)?;

        if row.role == ProjectRole::Owner && row.status == InvitationStatus::Accepted {
            Self::ensure_other_accepted_owner(&mut tx, row.project_id, row.id).await?;
        }

        sqlx::query("DELETE FROM project_memberships WHERE id = $1")
            .bind(membership_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Changes the role of an accepted membership
    ///
    /// Pending invitations can't have their role changed; revoke and
    /// re-invite instead. Demoting the project's only accepted owner is
    /// refused.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the membership doesn't exist
    /// - `InvalidState` if the membership is not accepted
    /// - `LastOwnerProtection` if demoting the only accepted owner
    pub async fn change_role(
        pool: &PgPool,
        membership_id: Uuid,
        new_role: ProjectRole,
    ) -> Result<Self, MembershipError> {
        let mut tx = pool.begin().await?;

        let row = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(membership_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(MembershipError::NotFound)?;

        if row.status != InvitationStatus::Accepted {
            tx.rollback().await?;
            return Err(MembershipError::InvalidState(row.status));
        }

        if row.role == ProjectRole::Owner && new_role != ProjectRole::Owner {
            Self::ensure_other_accepted_owner(&mut tx, row.project_id, row.id).await?;
        }

        let membership = sqlx::query_as::<_, ProjectMembership>(
            r#"
            UPDATE project_memberships
            SET role = $2
            WHERE id = $1
            RETURNING id, project_id, user_id, role, status, invited_by, message,
                      invited_at, responded_at
            "#,
        )
        .bind(membership_id)
        .bind(new_role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(membership)
    }

    /// Locks the project's other accepted owner rows and fails if there
    /// are none
    ///
    /// Locking serializes concurrent demotions/revocations of the same
    /// project's owners, so two of them can't each see the other as the
    /// remaining owner.
    async fn ensure_other_accepted_owner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: Uuid,
        excluding_membership: Uuid,
    ) -> Result<(), MembershipError> {
        let other_owners: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM project_memberships
            WHERE project_id = $1
              AND id != $2
              AND role = 'owner'
              AND status = 'accepted'
            FOR UPDATE
            "#,
        )
        .bind(project_id)
        .bind(excluding_membership)
        .fetch_all(&mut **tx)
        .await?;

        if other_owners.is_empty() {
            return Err(MembershipError::LastOwnerProtection);
        }

        Ok(())
    }

    /// Expires pending invitations older than `ttl_days`
    ///
    /// Run periodically by the worker. Expired rows stay behind so a
    /// later re-invitation can reset them to pending.
    ///
    /// # Returns
    ///
    /// Number of invitations that were expired
    pub async fn expire_stale(pool: &PgPool, ttl_days: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE project_memberships
            SET status = 'expired', responded_at = NOW()
            WHERE status = 'pending'
              AND invited_at < NOW() - make_interval(days => $1)
            "#,
        )
        .bind(ttl_days)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Finds a membership by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Finds the membership row for a user in a project (any status)
    pub async fn find(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE project_id = $1 AND user_id = $2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Gets a user's active role in a project
    ///
    /// Only accepted memberships grant a role; pending, rejected, and
    /// expired rows return None.
    pub async fn get_role(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectRole>, sqlx::Error> {
        let role: Option<ProjectRole> = sqlx::query_scalar(
            r#"
            SELECT role FROM project_memberships
            WHERE project_id = $1 AND user_id = $2 AND status = 'accepted'
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    /// Checks if a user is an accepted member of a project (any role)
    pub async fn has_access(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM project_memberships
                WHERE project_id = $1 AND user_id = $2 AND status = 'accepted'
            )
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Lists all memberships of a project (every status)
    pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE project_id = $1
            ORDER BY invited_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(memberships)
    }

    /// Lists all memberships of a user across projects (every status)
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE user_id = $1
            ORDER BY invited_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(memberships)
    }

    /// Lists a user's pending invitations
    pub async fn list_pending_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, ProjectMembership>(
            r#"
            SELECT id, project_id, user_id, role, status, invited_by, message,
                   invited_at, responded_at
            FROM project_memberships
            WHERE user_id = $1 AND status = 'pending'
            ORDER BY invited_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(memberships)
    }

    /// Counts accepted members of a project
    pub async fn count_accepted(pool: &PgPool, project_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM project_memberships
            WHERE project_id = $1 AND status = 'accepted'
            "#,
        )
        .bind(project_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Counts accepted owners of a project
    pub async fn count_accepted_owners(pool: &PgPool, project_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM project_memberships
            WHERE project_id = $1 AND role = 'owner' AND status = 'accepted'
            "#,
        )
        .bind(project_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}

/// Checks whether a sqlx error is a Postgres unique constraint violation
fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
