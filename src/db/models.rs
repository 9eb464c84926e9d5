use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Donor,
    Ngo,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "donor",
            Role::Ngo => "ngo",
            Role::Admin => "admin",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Available,
    Requested,
    Completed,
    Cancelled,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Available => "available",
            DonationStatus::Requested => "requested",
            DonationStatus::Completed => "completed",
            DonationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DonationPosted,
    DonationRequested,
    DonationCompleted,
    NgoApproved,
    General,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row written when an auth account is created. On the hosted backend a
/// sign-up trigger does this; the in-memory backend does it itself.
#[derive(Serialize, Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    pub is_approved: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub food_type: String,
    pub quantity: String,
    pub description: String,
    pub pickup_location: String,
    pub pickup_time: String,
    pub status: DonationStatus,
    #[serde(default)]
    pub ngo_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The five donor-entered fields. Create and edit both carry all of them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DonationDetails {
    pub food_type: String,
    pub quantity: String,
    pub description: String,
    pub pickup_location: String,
    pub pickup_time: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct NewDonation {
    pub donor_id: Uuid,
    #[serde(flatten)]
    pub details: DonationDetails,
    pub status: DonationStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
