//! Donation lifecycle rules and role gates.
//!
//! ```text
//! available --claim (approved ngo)--> requested
//! ```
//!
//! `completed` and `cancelled` are terminal states with no transition into
//! them yet. Donors edit only while a donation is available and may delete it
//! in any state.

use serde::Serialize;

use crate::auth::Session;
use crate::db::models::{Donation, DonationDetails, DonationStatus, Profile, Role};
use crate::error::AppError;

fn required(label: &str, value: String) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", label)));
    }
    Ok(value.to_string())
}

/// Trims every field and rejects blanks, naming the first offender.
pub fn validate_details(details: DonationDetails) -> Result<DonationDetails, AppError> {
    Ok(DonationDetails {
        food_type: required("Food type", details.food_type)?,
        quantity: required("Quantity", details.quantity)?,
        description: required("Description", details.description)?,
        pickup_location: required("Pickup location", details.pickup_location)?,
        pickup_time: required("Pickup time", details.pickup_time)?,
    })
}

pub fn require_role(session: &Session, role: Role) -> Result<(), AppError> {
    if session.role() == role {
        Ok(())
    } else {
        tracing::warn!(
            "User {} with role {} denied {} view",
            session.user.id,
            session.role().as_str(),
            role.as_str()
        );
        Err(AppError::Forbidden(format!("{} access required", role.as_str())))
    }
}

pub fn can_claim(profile: &Profile) -> bool {
    profile.role == Role::Ngo && profile.is_approved
}

pub fn is_editable(status: DonationStatus) -> bool {
    status == DonationStatus::Available
}

/// A donation as the donor view shows it, with its affordances.
#[derive(Serialize, Debug, Clone)]
pub struct DonationCard {
    #[serde(flatten)]
    pub donation: Donation,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl From<Donation> for DonationCard {
    fn from(donation: Donation) -> Self {
        Self {
            can_edit: is_editable(donation.status),
            can_delete: true,
            donation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn details() -> DonationDetails {
        DonationDetails {
            food_type: " Rice ".to_string(),
            quantity: "10 kg".to_string(),
            description: "Fresh".to_string(),
            pickup_location: "123 Main St".to_string(),
            pickup_time: "6pm".to_string(),
        }
    }

    fn donation(status: DonationStatus) -> Donation {
        Donation {
            id: Uuid::new_v4(),
            donor_id: Uuid::new_v4(),
            food_type: "Rice".to_string(),
            quantity: "10 kg".to_string(),
            description: "Fresh".to_string(),
            pickup_location: "123 Main St".to_string(),
            pickup_time: "6pm".to_string(),
            status,
            ngo_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn details_are_trimmed_and_required() {
        assert_eq!(validate_details(details()).unwrap().food_type, "Rice");

        let blank = DonationDetails { pickup_time: "   ".to_string(), ..details() };
        let err = validate_details(blank).unwrap_err();
        assert_eq!(err.to_string(), "Pickup time is required");
    }

    #[test]
    fn only_available_donations_are_editable() {
        let card = DonationCard::from(donation(DonationStatus::Available));
        assert!(card.can_edit && card.can_delete);

        for status in [DonationStatus::Requested, DonationStatus::Completed, DonationStatus::Cancelled] {
            let card = DonationCard::from(donation(status));
            assert!(!card.can_edit);
            assert!(card.can_delete);
        }
    }

    #[test]
    fn card_serializes_flat() {
        let value = serde_json::to_value(DonationCard::from(donation(DonationStatus::Requested))).unwrap();
        assert_eq!(value["status"], "requested");
        assert_eq!(value["can_edit"], false);
    }

    #[test]
    fn claim_needs_approved_ngo() {
        let mut profile = Profile {
            id: Uuid::new_v4(),
            email: "ngo@example.org".to_string(),
            full_name: "Helpers Inc".to_string(),
            role: Role::Ngo,
            phone: None,
            address: None,
            organization_name: Some("Helpers Inc".to_string()),
            is_approved: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!can_claim(&profile));
        profile.is_approved = true;
        assert!(can_claim(&profile));
        profile.role = Role::Donor;
        assert!(!can_claim(&profile));
    }
}
