use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::AppError;
use crate::extract::ApiPath;
use crate::AppState;

pub async fn list_notifications(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let notifications = session.store(&state).list_notifications(session.user.id).await?;
    let unread = notifications.iter().filter(|n| !n.is_read).count();
    Ok(Json(json!({ "notifications": notifications, "unread": unread })))
}

pub async fn mark_read(
    ApiPath(id): ApiPath<Uuid>,
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    if session.store(&state).mark_notification_read(id, session.user.id).await? {
        Ok(Json(json!({ "status": "read", "id": id })))
    } else {
        Err(AppError::NotFound("Notification not found".to_string()))
    }
}
