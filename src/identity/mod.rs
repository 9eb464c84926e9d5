//! Identity: credential forwarding to the hosted auth API and the session
//! change channel.
//!
//! The service never stores passwords for the hosted backend. Sign-in hands
//! the credentials to an [`IdentityProvider`] and keeps only the resulting
//! access token inside the service's own session cookie.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::models::Role;

pub mod gotrue;
pub mod memory;

pub use gotrue::GoTrueIdentity;
pub use memory::MemoryIdentity;

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    /// The auth API refused the request; the message is safe to show.
    #[error("{0}")]
    Rejected(String),

    #[error("auth request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected auth response: {0}")]
    Unexpected(String),
}

/// Profile fields sent alongside credentials at sign-up. The hosted
/// backend's trigger copies them into the `profiles` row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignUpMetadata {
    pub full_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthUser, IdentityError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedUp { user_id: Uuid, role: Role },
    SignedIn { user_id: Uuid },
    SignedOut { user_id: Uuid },
    ProfileApproved { user_id: Uuid, by: Uuid },
    ProfileRejected { user_id: Uuid, by: Uuid },
}

/// Single notification channel for session and profile changes.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Logs every session event until the channel closes.
pub async fn log_session_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::info!(?event, "session event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("session event log lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
