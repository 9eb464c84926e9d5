use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::Session;
use crate::db::models::{DonationDetails, DonationStatus, NewDonation, Role};
use crate::db::DonationFilter;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::lifecycle::{self, DonationCard};
use crate::AppState;

pub async fn list_donations(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Donor)?;
    let donations = session
        .store(&state)
        .list_donations(&DonationFilter::by_donor(session.user.id))
        .await?;
    let cards: Vec<DonationCard> = donations.into_iter().map(DonationCard::from).collect();
    Ok(Json(json!({ "donations": cards })))
}

pub async fn create_donation(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<DonationDetails>,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Donor)?;
    let details = lifecycle::validate_details(req)?;

    let donation = session
        .store(&state)
        .insert_donation(NewDonation {
            donor_id: session.user.id,
            details,
            status: DonationStatus::Available,
        })
        .await?;

    tracing::info!("Donor {} posted donation {}", session.user.id, donation.id);
    Ok((StatusCode::CREATED, Json(json!({ "status": "created", "donation": DonationCard::from(donation) }))))
}

pub async fn update_donation(
    ApiPath(id): ApiPath<Uuid>,
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<DonationDetails>,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Donor)?;
    let details = lifecycle::validate_details(req)?;
    let store = session.store(&state);

    if let Some(donation) = store.update_donation_details(id, session.user.id, details).await? {
        return Ok(Json(json!({ "status": "updated", "donation": DonationCard::from(donation) })));
    }

    // The conditional update matched nothing; tell "gone" apart from "locked".
    match store.get_donation(id).await? {
        Some(existing) if existing.donor_id == session.user.id => {
            tracing::warn!(
                "Edit of donation {} refused in status {}",
                id,
                existing.status.as_str()
            );
            Err(AppError::Conflict("Only available donations can be edited".to_string()))
        }
        _ => Err(AppError::NotFound("Donation not found".to_string())),
    }
}

pub async fn delete_donation(
    ApiPath(id): ApiPath<Uuid>,
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    lifecycle::require_role(&session, Role::Donor)?;
    if session.store(&state).delete_donation(id, session.user.id).await? {
        tracing::info!("Donor {} deleted donation {}", session.user.id, id);
        Ok(Json(json!({ "status": "deleted", "id": id })))
    } else {
        Err(AppError::NotFound("Donation not found".to_string()))
    }
}
