use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::session_from_headers;
use crate::error::AppError;
use crate::extract::ApiQuery;
use crate::shell::{self, AuthView, Section};
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct ShellParams {
    #[serde(default)]
    pub view: AuthView,
    #[serde(default)]
    pub section: Section,
}

pub async fn shell(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(params): ApiQuery<ShellParams>,
) -> Result<impl IntoResponse, AppError> {
    let session = session_from_headers(&state, &headers).await?;
    let role = session.as_ref().map(|s| s.role());
    let screen = shell::resolve(role, params.view, params.section);

    Ok(Json(json!({
        "screen": screen,
        "nav": shell::nav_items(role),
        "user": session.as_ref().map(|s| json!({ "id": s.user.id, "email": s.user.email })),
        "profile": session.map(|s| s.profile),
    })))
}
