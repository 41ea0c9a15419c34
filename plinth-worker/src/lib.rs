//! # Plinth Worker Library
//!
//! This library provides the background jobs that keep the Plinth control
//! plane consistent: project provisioning and invitation expiry.
//!
//! ## Modules
//!
//! - `config`: Worker configuration from environment variables
//! - `provisioner`: Claims pending projects and allocates schema + bucket
//! - `sweeper`: Expires stale pending invitations
//!
//! ## Example
//!
//! ```no_run
//! use plinth_worker::provisioner::Provisioner;
//! use plinth_shared::{notify::WebhookNotifier, storage::ObjectStore};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool, storage: ObjectStore) -> anyhow::Result<()> {
//! let provisioner = Provisioner::new(pool, storage, WebhookNotifier::new(None));
//! provisioner.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod provisioner;
pub mod sweeper;
