/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - Test database setup and cleanup
/// - Test object storage connection
/// - Test user and project creation
/// - JWT token generation
/// - API client helpers

use plinth_api::app::{build_router, AppState};
use plinth_api::config::Config;
use plinth_shared::auth::jwt::{create_token, Claims, TokenType};
use plinth_shared::data::tables;
use plinth_shared::models::project::{CreateProject, Project};
use plinth_shared::models::user::{CreateUser, User};
use plinth_shared::storage::ObjectStore;
use sqlx::PgPool;
use uuid::Uuid;

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub storage: ObjectStore,
    pub app: axum::Router,
    pub config: Config,
    pub user: User,
    pub project: Project,
    pub api_key: String,
    pub jwt_token: String,
}

impl TestContext {
    /// Creates a new test context with a fresh user and project
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_project(CreateProject::default()).await
    }

    /// Creates a new test context with custom project settings
    ///
    /// The `owner_id` field of `data` is overwritten with the test user's
    /// id.
    pub async fn with_project(mut data: CreateProject) -> anyhow::Result<Self> {
        // Load test configuration
        let config = Config::from_env()?;

        // Connect to database
        let db = PgPool::connect(&config.database.url).await?;

        // Apply migrations (embedded in plinth-shared)
        plinth_shared::db::migrations::run_migrations(&db).await?;

        // Connect to object storage
        let storage = ObjectStore::connect(&config.storage).await;

        // Create test user
        let user = User::create(
            &db,
            CreateUser {
                email: format!("test-{}@example.com", Uuid::new_v4()),
                password_hash: "test_hash".to_string(), // Not used in tests
                name: Some("Test User".to_string()),
            },
        )
        .await?;

        // Create test project (starts in pending provisioning state)
        if data.name.is_empty() {
            data.name = format!("Test Project {}", Uuid::new_v4());
        }
        data.owner_id = user.id;
        let (project, api_key) = Project::create(&db, data).await?;

        // Generate JWT token
        let claims = Claims::new(user.id, TokenType::Access);
        let jwt_token = create_token(&claims, &config.jwt.secret)?;

        // Build app
        let state = AppState::new(db.clone(), config.clone(), storage.clone());
        let app = build_router(state);

        Ok(TestContext {
            db,
            storage,
            app,
            config,
            user,
            project,
            api_key,
            jwt_token,
        })
    }

    /// Returns authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.jwt_token)
    }

    /// Provisions the test project directly, bypassing the worker
    ///
    /// Tests that exercise the provisioner itself should run it instead;
    /// everything else uses this to get a usable data space without
    /// racing other tests for the claim.
    pub async fn provision(&mut self) -> anyhow::Result<()> {
        tables::create_schema(&self.db, &self.project.schema_name).await?;
        self.storage.create_bucket(&self.project.bucket_name).await?;
        Project::mark_provisioning_completed(&self.db, self.project.id).await?;

        self.project = Project::find_by_id(&self.db, self.project.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Test project disappeared"))?;

        Ok(())
    }

    /// Cleans up test data
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        // Tear down the data space first, then the registry row (cascades
        // to memberships)
        let _ = tables::drop_schema(&self.db, &self.project.schema_name).await;
        let _ = self.storage.delete_bucket(&self.project.bucket_name).await;
        Project::delete(&self.db, self.project.id).await?;
        User::delete(&self.db, self.user.id).await?;
        Ok(())
    }
}

/// Helper to create a second user with their own access token
pub async fn create_second_user(ctx: &TestContext) -> anyhow::Result<(User, String)> {
    let user = User::create(
        &ctx.db,
        CreateUser {
            email: format!("invitee-{}@example.com", Uuid::new_v4()),
            password_hash: "test_hash".to_string(),
            name: Some("Invited User".to_string()),
        },
    )
    .await?;

    let claims = Claims::new(user.id, TokenType::Access);
    let token = create_token(&claims, &ctx.config.jwt.secret)?;

    Ok((user, token))
}

/// Helper to wait for condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout_secs: u64) -> anyhow::Result<()>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);

    loop {
        if condition().await {
            return Ok(());
        }

        if start.elapsed() > timeout {
            anyhow::bail!("Condition not met within {} seconds", timeout_secs);
        }

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
