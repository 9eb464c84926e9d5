use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Json, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::{Profile, Role};
use crate::db::Store;
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::identity::{AuthUser, SessionEvent, SignUpMetadata};
use crate::AppState;

pub const AUTH_COOKIE_NAME: &str = "auth_token";

const MIN_PASSWORD_LEN: usize = 6;

// Claims for our JWT. `access_token` is the hosted backend's token, replayed
// on every data call so row level security sees the real user.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub email: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Identity carried by a valid session token. No store lookup.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
}

/// Per-request context handed to view handlers: the user plus their profile,
/// read fresh from the store.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: AuthenticatedUser,
    pub profile: Profile,
}

impl Session {
    pub fn role(&self) -> Role {
        self.profile.role
    }

    /// Store scoped to this user's access token.
    pub fn store(&self, state: &AppState) -> Arc<dyn Store> {
        state.db.store(Some(&self.user.access_token))
    }
}

/// When our session ends: one day out, or earlier if the hosted token does.
pub fn session_expiry(hosted_expiry: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let day = Utc::now() + Duration::days(1);
    hosted_expiry.map_or(day, |at| at.min(day))
}

pub fn create_jwt(
    config: &Config,
    user: &AuthUser,
    access_token: &str,
    hosted_expiry: Option<DateTime<Utc>>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = session_expiry(hosted_expiry).timestamp();

    let claims = Claims {
        sub: user.id.to_string(),
        exp: expiration.max(0) as usize,
        email: user.email.clone(),
        access_token: access_token.to_string(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub fn decode_jwt(config: &Config, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    if let Some(issuer) = &config.jwt_issuer {
        validation.set_issuer(&[issuer.as_str()]);
    }
    if let Some(audience) = &config.jwt_audience {
        validation.set_audience(&[audience.as_str()]);
    }
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    let cookie_header = headers.get(header::COOKIE).and_then(|h| h.to_str().ok())?;
    cookie_header.split(';').find_map(|cookie| {
        let (k, v) = cookie.trim().split_once('=')?;
        (k == AUTH_COOKIE_NAME && !v.is_empty()).then(|| v.to_string())
    })
}

fn authenticate(config: &Config, headers: &HeaderMap) -> Result<AuthenticatedUser, AppError> {
    let token = extract_token_from_headers(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing auth token".to_string()))?;
    let claims = decode_jwt(config, &token).map_err(|e| {
        tracing::warn!("Token error: {}", e);
        AppError::Unauthorized("Invalid token".to_string())
    })?;
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;
    Ok(AuthenticatedUser { id, email: claims.email, access_token: claims.access_token })
}

async fn load_session(state: &AppState, user: AuthenticatedUser) -> Result<Session, AppError> {
    let store = state.db.store(Some(&user.access_token));
    match store.get_profile(user.id).await? {
        Some(profile) => Ok(Session { user, profile }),
        None => {
            // Rejected NGOs lose their profile row but keep a valid token.
            tracing::warn!("No profile for user {}", user.id);
            Err(AppError::Unauthorized("Profile not found".to_string()))
        }
    }
}

/// Resolves an optional session for public views. A missing or invalid token
/// is `None`; a store failure is still an error.
pub async fn session_from_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Session>, AppError> {
    let Ok(user) = authenticate(&state.config, headers) else {
        return Ok(None);
    };
    match load_session(state, user).await {
        Ok(session) => Ok(Some(session)),
        Err(AppError::Unauthorized(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user = authenticate(&state.config, &parts.headers);
        let state = state.clone();
        async move { load_session(&state, user?).await }
    }
}

fn build_auth_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        AUTH_COOKIE_NAME,
        token,
        max_age.max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", AUTH_COOKIE_NAME);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response, AppError> {
    let value = HeaderValue::from_str(cookie).map_err(|e| AppError::Internal(e.to_string()))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    pub role: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub organization_name: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl SignupRequest {
    /// Checks the form locally. Nothing is sent to the auth API unless this
    /// passes.
    pub fn validate(&self) -> Result<SignUpMetadata, AppError> {
        if self.password != self.confirm_password {
            return Err(AppError::Validation("Passwords do not match".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.email.trim().is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }
        if self.full_name.trim().is_empty() {
            return Err(AppError::Validation("Full name is required".to_string()));
        }
        let role = match self.role.trim().to_lowercase().as_str() {
            "donor" => Role::Donor,
            "ngo" => Role::Ngo,
            _ => return Err(AppError::Validation("Role must be donor or ngo".to_string())),
        };
        let organization_name = non_blank(&self.organization_name);
        if role == Role::Ngo && organization_name.is_none() {
            return Err(AppError::Validation(
                "Organization name is required for NGOs".to_string(),
            ));
        }

        Ok(SignUpMetadata {
            full_name: self.full_name.trim().to_string(),
            role,
            phone: non_blank(&self.phone),
            address: non_blank(&self.address),
            organization_name,
        })
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let metadata = payload.validate()?;
    let user = state
        .identity
        .sign_up(payload.email.trim(), &payload.password, &metadata)
        .await?;

    tracing::info!("Signed up {} as {}", user.id, metadata.role.as_str());
    state.events.publish(SessionEvent::SignedUp { user_id: user.id, role: metadata.role });

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": { "id": user.id, "email": user.email },
            "message": "Account created. Please sign in.",
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    let auth = state
        .identity
        .sign_in(payload.email.trim(), &payload.password)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Validation(message) => AppError::Unauthorized(message),
            other => other,
        })?;

    let expires_at = session_expiry(auth.expires_at);
    let token = create_jwt(&state.config, &auth.user, &auth.access_token, Some(expires_at))
        .map_err(|e| AppError::Internal(format!("JWT creation failed: {}", e)))?;

    let profile = state
        .db
        .store(Some(&auth.access_token))
        .get_profile(auth.user.id)
        .await?;

    tracing::info!("Signed in {}", auth.user.id);
    state.events.publish(SessionEvent::SignedIn { user_id: auth.user.id });

    let response = Json(json!({
        "token": token,
        "user": { "id": auth.user.id, "email": auth.user.email },
        "profile": profile,
    }))
    .into_response();
    let max_age = (expires_at - Utc::now()).num_seconds();
    with_cookie(response, &build_auth_cookie(&token, max_age, state.config.is_production()))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Ok(user) = authenticate(&state.config, &headers) {
        if let Err(e) = state.identity.sign_out(&user.access_token).await {
            tracing::warn!("Auth API sign-out failed for {}: {}", user.id, e);
        }
        state.events.publish(SessionEvent::SignedOut { user_id: user.id });
    }

    let response = Json(json!({ "ok": true })).into_response();
    with_cookie(response, &clear_auth_cookie(state.config.is_production()))
}

pub async fn me(session: Session) -> impl IntoResponse {
    Json(json!({
        "user": { "id": session.user.id, "email": session.user.email },
        "profile": session.profile,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str, confirm: &str, role: &str, org: Option<&str>) -> SignupRequest {
        SignupRequest {
            email: "alice@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
            full_name: "Alice".to_string(),
            role: role.to_string(),
            phone: Some("  ".to_string()),
            address: None,
            organization_name: org.map(str::to_string),
        }
    }

    fn message(err: AppError) -> String {
        err.to_string()
    }

    #[test]
    fn signup_validation_rules() {
        assert_eq!(
            message(request("secret1", "secret2", "donor", None).validate().unwrap_err()),
            "Passwords do not match"
        );
        assert_eq!(
            message(request("abc", "abc", "donor", None).validate().unwrap_err()),
            "Password must be at least 6 characters"
        );
        assert_eq!(
            message(request("secret1", "secret1", "admin", None).validate().unwrap_err()),
            "Role must be donor or ngo"
        );
        assert!(request("secret1", "secret1", "ngo", Some(" ")).validate().is_err());

        let metadata = request("secret1", "secret1", "ngo", Some("Helpers Inc")).validate().unwrap();
        assert_eq!(metadata.role, Role::Ngo);
        assert_eq!(metadata.organization_name.as_deref(), Some("Helpers Inc"));
        assert!(metadata.phone.is_none());
    }

    #[test]
    fn jwt_round_trips_and_respects_audience() {
        let mut config = Config::for_memory("test-secret");
        config.jwt_audience = Some("ecoplates".to_string());
        let user = AuthUser { id: Uuid::new_v4(), email: "a@example.com".to_string() };

        let token = create_jwt(&config, &user, "hosted-token", None).unwrap();
        let claims = decode_jwt(&config, &token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.access_token, "hosted-token");

        config.jwt_audience = Some("someone-else".to_string());
        assert!(decode_jwt(&config, &token).is_err());
    }

    #[test]
    fn jwt_expiry_never_outlives_hosted_token() {
        let config = Config::for_memory("test-secret");
        let user = AuthUser { id: Uuid::new_v4(), email: "a@example.com".to_string() };
        let soon = Utc::now() + Duration::minutes(30);
        let token = create_jwt(&config, &user, "t", Some(soon)).unwrap();
        let claims = decode_jwt(&config, &token).unwrap();
        assert_eq!(claims.exp as i64, soon.timestamp());
    }

    #[test]
    fn token_is_read_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; auth_token=abc"));
        assert_eq!(extract_token_from_headers(&headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(extract_token_from_headers(&headers).as_deref(), Some("xyz"));

        let mut cleared = HeaderMap::new();
        cleared.insert(header::COOKIE, HeaderValue::from_static("auth_token="));
        assert!(extract_token_from_headers(&cleared).is_none());
    }

    #[test]
    fn cookies_are_http_only_and_secure_in_production() {
        assert!(build_auth_cookie("t", 3600, false).contains("HttpOnly"));
        assert!(!build_auth_cookie("t", 3600, false).contains("Secure"));
        assert!(build_auth_cookie("t", 3600, true).contains("Max-Age=3600; Secure"));
        assert!(build_auth_cookie("t", -5, false).contains("Max-Age=0"));
        assert!(clear_auth_cookie(true).ends_with("; Secure"));
        assert!(clear_auth_cookie(true).contains("Max-Age=0"));
    }
}
