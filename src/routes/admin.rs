use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::Session;
use crate::db::models::Role;
use crate::db::ProfileFilter;
use crate::error::AppError;
use crate::extract::ApiPath;
use crate::identity::SessionEvent;
use crate::lifecycle;
use crate::AppState;

pub async fn list_pending_ngos(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Admin)?;
    let ngos = session
        .store(&state)
        .list_profiles(&ProfileFilter::pending_ngos())
        .await?;
    Ok(Json(json!({ "ngos": ngos })))
}

pub async fn approve_ngo(
    ApiPath(id): ApiPath<Uuid>,
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Admin)?;
    let profile = session
        .store(&state)
        .approve_ngo(id)
        .await?
        .ok_or_else(|| AppError::NotFound("NGO not found".to_string()))?;

    tracing::info!("Admin {} approved NGO {}", session.user.id, id);
    state.events.publish(SessionEvent::ProfileApproved { user_id: id, by: session.user.id });
    Ok(Json(json!({ "status": "approved", "profile": profile })))
}

/// Rejection removes the NGO's profile outright.
pub async fn reject_ngo(
    ApiPath(id): ApiPath<Uuid>,
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Admin)?;
    if !session.store(&state).delete_ngo(id).await? {
        return Err(AppError::NotFound("NGO not found".to_string()));
    }

    tracing::info!("Admin {} rejected NGO {}", session.user.id, id);
    state.events.publish(SessionEvent::ProfileRejected { user_id: id, by: session.user.id });
    Ok(Json(json!({ "status": "rejected", "id": id })))
}
