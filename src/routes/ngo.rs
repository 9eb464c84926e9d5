use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::Session;
use crate::db::models::Role;
use crate::db::DonationFilter;
use crate::error::AppError;
use crate::extract::ApiPath;
use crate::lifecycle;
use crate::AppState;

/// Open donations plus this NGO's own requests. Unapproved NGOs only learn
/// that they are waiting.
pub async fn ngo_dashboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Ngo)?;
    if !lifecycle::can_claim(&session.profile) {
        return Ok(Json(json!({
            "state": "pending_approval",
            "profile": session.profile,
            "can_claim": false,
        })));
    }

    let store = session.store(&state);
    let available_filter = DonationFilter::available();
    let claimed_filter = DonationFilter::claimed_by(session.user.id);
    let (available, requests) = tokio::try_join!(
        store.list_donations(&available_filter),
        store.list_donations(&claimed_filter),
    )?;

    Ok(Json(json!({
        "state": "approved",
        "profile": session.profile,
        "can_claim": true,
        "available": available,
        "requests": requests,
    })))
}

pub async fn claim_donation(
    ApiPath(id): ApiPath<Uuid>,
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Ngo)?;
    if !lifecycle::can_claim(&session.profile) {
        tracing::warn!("Unapproved NGO {} tried to claim {}", session.user.id, id);
        return Err(AppError::Forbidden("NGO approval pending".to_string()));
    }

    let store = session.store(&state);
    if let Some(donation) = store.claim_donation(id, session.user.id).await? {
        tracing::info!("NGO {} claimed donation {}", session.user.id, id);
        return Ok(Json(json!({ "status": "requested", "donation": donation })));
    }

    match store.get_donation(id).await? {
        Some(existing) => {
            tracing::warn!(
                "Claim of donation {} by {} lost, status {}",
                id,
                session.user.id,
                existing.status.as_str()
            );
            Err(AppError::Conflict("Donation is no longer available".to_string()))
        }
        None => Err(AppError::NotFound("Donation not found".to_string())),
    }
}
