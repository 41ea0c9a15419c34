/// Webhook delivery for project lifecycle events
///
/// Projects may register a single webhook URL. Whenever provisioning finishes
/// or a membership changes, Plinth POSTs a JSON payload to that URL.
///
/// # Delivery Model
///
/// Deliveries are fire-and-forget: each notification runs in its own task and
/// failures are logged, never surfaced to the request that triggered them.
///
/// # Security
///
/// - When a signing secret is configured, each delivery carries an
///   HMAC-SHA256 signature in the X-Plinth-Signature header
/// - Signatures are computed over the exact request body bytes
/// - Recipients should verify signatures to ensure authenticity
///
/// # Example
///
/// ```no_run
/// use plinth_shared::notify::{WebhookEvent, WebhookNotifier};
/// use plinth_shared::models::project::Project;
/// use serde_json::json;
///
/// # fn example(project: Project) {
/// let notifier = WebhookNotifier::new(Some("signing-secret".to_string()));
///
/// notifier.notify(
///     &project,
///     WebhookEvent::MemberInvited,
///     json!({ "email": "new.member@example.com", "role": "editor" }),
/// );
/// # }
/// ```

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::project::Project;

/// Header carrying the hex-encoded HMAC-SHA256 payload signature
pub const SIGNATURE_HEADER: &str = "X-Plinth-Signature";

/// Timeout for a single delivery attempt
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Event types delivered to project webhooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    /// Project provisioning completed
    #[serde(rename = "project.provisioned")]
    ProjectProvisioned,

    /// Project provisioning failed
    #[serde(rename = "project.provisioning_failed")]
    ProjectProvisioningFailed,

    /// A user was invited to the project
    #[serde(rename = "member.invited")]
    MemberInvited,

    /// An invitee accepted their invitation
    #[serde(rename = "member.accepted")]
    MemberAccepted,

    /// An invitee rejected their invitation
    #[serde(rename = "member.rejected")]
    MemberRejected,

    /// A membership or invitation was revoked
    #[serde(rename = "member.revoked")]
    MemberRevoked,

    /// A member's role changed
    #[serde(rename = "member.role_changed")]
    MemberRoleChanged,
}

impl WebhookEvent {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::ProjectProvisioned => "project.provisioned",
            WebhookEvent::ProjectProvisioningFailed => "project.provisioning_failed",
            WebhookEvent::MemberInvited => "member.invited",
            WebhookEvent::MemberAccepted => "member.accepted",
            WebhookEvent::MemberRejected => "member.rejected",
            WebhookEvent::MemberRevoked => "member.revoked",
            WebhookEvent::MemberRoleChanged => "member.role_changed",
        }
    }
}

/// JSON body POSTed to the project's webhook URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Event name (e.g. "member.invited")
    pub event: String,

    /// Project the event belongs to
    pub project_id: Uuid,

    /// When the event occurred
    pub timestamp: DateTime<Utc>,

    /// Event-specific details
    pub data: Value,
}

/// Delivers lifecycle events to project webhook URLs
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    signing_secret: Option<String>,
}

impl WebhookNotifier {
    /// Creates a notifier
    ///
    /// # Arguments
    ///
    /// * `signing_secret` - Optional shared secret; when set, deliveries are
    ///   signed with HMAC-SHA256
    pub fn new(signing_secret: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_default();

        WebhookNotifier {
            client,
            signing_secret,
        }
    }

    /// Generates the hex-encoded HMAC-SHA256 signature for a payload
    ///
    /// Returns None when no signing secret is configured.
    pub fn sign(&self, payload: &[u8]) -> Option<String> {
        let secret = self.signing_secret.as_ref()?;

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");

        mac.update(payload);

        Some(format!("{:x}", mac.finalize().into_bytes()))
    }

    /// Dispatches an event to the project's webhook, if one is registered
    ///
    /// Returns immediately; delivery happens on a background task. Projects
    /// without a webhook URL are skipped.
    pub fn notify(&self, project: &Project, event: WebhookEvent, data: Value) {
        let Some(url) = project.webhook_url.clone() else {
            return;
        };

        let payload = WebhookPayload {
            event: event.as_str().to_string(),
            project_id: project.id,
            timestamp: Utc::now(),
            data,
        };

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                warn!(
                    project_id = %project.id,
                    event = event.as_str(),
                    error = %err,
                    "Failed to serialize webhook payload"
                );
                return;
            }
        };

        let signature = self.sign(&body);
        let client = self.client.clone();
        let project_id = project.id;
        let event_name = event.as_str();

        tokio::spawn(async move {
            let mut request = client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);

            if let Some(signature) = signature {
                request = request.header(SIGNATURE_HEADER, signature);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        project_id = %project_id,
                        event = event_name,
                        status = %response.status(),
                        "Webhook delivered"
                    );
                }
                Ok(response) => {
                    warn!(
                        project_id = %project_id,
                        event = event_name,
                        status = %response.status(),
                        "Webhook endpoint returned an error"
                    );
                }
                Err(err) => {
                    warn!(
                        project_id = %project_id,
                        event = event_name,
                        error = %err,
                        "Webhook delivery failed"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_names() {
        assert_eq!(WebhookEvent::ProjectProvisioned.as_str(), "project.provisioned");
        assert_eq!(WebhookEvent::MemberInvited.as_str(), "member.invited");
        assert_eq!(WebhookEvent::MemberRoleChanged.as_str(), "member.role_changed");

        // serde names match as_str
        let json = serde_json::to_value(WebhookEvent::MemberAccepted).unwrap();
        assert_eq!(json, "member.accepted");
    }

    #[test]
    fn test_sign_deterministic() {
        let notifier = WebhookNotifier::new(Some("secret".to_string()));

        let sig1 = notifier.sign(b"test payload").unwrap();
        let sig2 = notifier.sign(b"test payload").unwrap();
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64); // HMAC-SHA256 hex is 64 chars

        let sig3 = notifier.sign(b"different payload").unwrap();
        assert_ne!(sig1, sig3);
    }

    #[test]
    fn test_sign_without_secret() {
        let notifier = WebhookNotifier::new(None);
        assert!(notifier.sign(b"payload").is_none());
    }

    #[test]
    fn test_payload_serialization() {
        let payload = WebhookPayload {
            event: WebhookEvent::MemberInvited.as_str().to_string(),
            project_id: Uuid::nil(),
            timestamp: Utc::now(),
            data: json!({ "email": "invitee@example.com" }),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["event"], "member.invited");
        assert_eq!(value["data"]["email"], "invitee@example.com");
        assert!(value["timestamp"].is_string());
    }
}
