use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use super::{AuthSession, AuthUser, IdentityError, IdentityProvider, SignUpMetadata};

/// Auth API of the hosted backend (`{url}/auth/v1`).
pub struct GoTrueIdentity {
    auth_url: String,
    anon_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct UserPayload {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenPayload {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserPayload,
}

impl GoTrueIdentity {
    pub fn new(base_url: &str, anon_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            auth_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            anon_key,
            client,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.auth_url, path))
            .header("apikey", &self.anon_key)
    }
}

/// Pulls the human-readable message out of an auth error body. The auth API
/// has used `error_description`, `msg` and `message` across versions.
pub(crate) fn rejection_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| format!("Authentication failed ({})", status.as_u16()))
}

fn expiry(payload: &TokenPayload) -> Option<DateTime<Utc>> {
    match (payload.expires_at, payload.expires_in) {
        (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
        (None, Some(secs)) => Some(Utc::now() + chrono::Duration::seconds(secs)),
        (None, None) => None,
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value, IdentityError> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_client_error() {
        return Err(IdentityError::Rejected(rejection_message(status, &body)));
    }
    if !status.is_success() {
        return Err(IdentityError::Unexpected(format!("status {}: {}", status, body)));
    }
    serde_json::from_str(&body).map_err(|e| IdentityError::Unexpected(e.to_string()))
}

#[async_trait]
impl IdentityProvider for GoTrueIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let resp = self
            .post("/token?grant_type=password")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let value = read_json(resp).await?;
        let payload: TokenPayload =
            serde_json::from_value(value).map_err(|e| IdentityError::Unexpected(e.to_string()))?;
        let expires_at = expiry(&payload);
        Ok(AuthSession {
            user: AuthUser {
                id: payload.user.id,
                email: payload.user.email.unwrap_or_else(|| email.to_string()),
            },
            access_token: payload.access_token,
            expires_at,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthUser, IdentityError> {
        let resp = self
            .post("/signup")
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;
        let value = read_json(resp).await?;
        // With email confirmation on, the body is the bare user; otherwise it
        // is a session wrapping the user.
        let user_value = value.get("user").cloned().unwrap_or(value);
        let user: UserPayload = serde_json::from_value(user_value)
            .map_err(|e| IdentityError::Unexpected(e.to_string()))?;
        Ok(AuthUser {
            id: user.id,
            email: user.email.unwrap_or_else(|| email.to_string()),
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let resp = self.post("/logout").bearer_auth(access_token).send().await?;
        let status = resp.status();
        // An already expired token has nothing left to revoke.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(IdentityError::Unexpected(format!("logout status {}: {}", status, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_message_prefers_known_fields() {
        assert_eq!(
            rejection_message(
                StatusCode::BAD_REQUEST,
                r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#
            ),
            "Invalid login credentials"
        );
        assert_eq!(
            rejection_message(StatusCode::UNPROCESSABLE_ENTITY, r#"{"code":422,"msg":"User already registered"}"#),
            "User already registered"
        );
        assert_eq!(
            rejection_message(StatusCode::BAD_REQUEST, "not json"),
            "Authentication failed (400)"
        );
    }

    #[test]
    fn expiry_prefers_absolute_timestamp() {
        let payload = TokenPayload {
            access_token: "t".to_string(),
            expires_at: Some(1_700_000_000),
            expires_in: Some(3600),
            user: UserPayload { id: Uuid::nil(), email: None },
        };
        assert_eq!(expiry(&payload).unwrap().timestamp(), 1_700_000_000);
    }
}
