use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::db::{DonationFilter, ProfileFilter};
use crate::error::AppError;
use crate::AppState;

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Stats {
    pub total_donations: i64,
    pub active_donors: i64,
    pub registered_ngos: i64,
}

pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let store = state.db.store(None);
    let all = DonationFilter::default();
    let donors = ProfileFilter::donors();
    let ngos = ProfileFilter::approved_ngos();
    let (total_donations, active_donors, registered_ngos) = tokio::try_join!(
        store.count_donations(&all),
        store.count_profiles(&donors),
        store.count_profiles(&ngos),
    )?;
    Ok(Json(Stats { total_donations, active_donors, registered_ngos }))
}
