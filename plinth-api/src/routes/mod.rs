/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login, refresh)
/// - `projects`: Project registry (create, update, delete, key rotation)
/// - `members`: Membership and invitation lifecycle
/// - `tables`: Table DDL on the data plane
/// - `records`: Row CRUD on the data plane
/// - `files`: Object storage on the data plane

pub mod auth;
pub mod files;
pub mod health;
pub mod members;
pub mod projects;
pub mod records;
pub mod tables;
