use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;
pub mod models;
pub mod postgrest;

use models::{
    Donation, DonationDetails, DonationStatus, NewDonation, Notification, Profile, Role,
};

pub use memory::MemoryDatabase;
pub use postgrest::PostgrestDatabase;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("request to data store failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("data store responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode data store payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed count header: {0}")]
    Count(String),

    #[error("data store returned no row for {0}")]
    MissingRow(&'static str),
}

/// Equality filters over `profiles`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFilter {
    pub role: Option<Role>,
    pub is_approved: Option<bool>,
}

impl ProfileFilter {
    pub fn pending_ngos() -> Self {
        Self { role: Some(Role::Ngo), is_approved: Some(false) }
    }

    pub fn approved_ngos() -> Self {
        Self { role: Some(Role::Ngo), is_approved: Some(true) }
    }

    pub fn donors() -> Self {
        Self { role: Some(Role::Donor), is_approved: None }
    }

    pub fn matches(&self, profile: &Profile) -> bool {
        self.role.map_or(true, |role| profile.role == role)
            && self.is_approved.map_or(true, |approved| profile.is_approved == approved)
    }
}

/// Filters over `donations`. An empty `statuses` list matches every status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonationFilter {
    pub donor_id: Option<Uuid>,
    pub ngo_id: Option<Uuid>,
    pub statuses: Vec<DonationStatus>,
}

impl DonationFilter {
    pub fn by_donor(donor_id: Uuid) -> Self {
        Self { donor_id: Some(donor_id), ..Default::default() }
    }

    pub fn available() -> Self {
        Self { statuses: vec![DonationStatus::Available], ..Default::default() }
    }

    /// What an NGO sees under "my requests": claimed and completed pickups.
    pub fn claimed_by(ngo_id: Uuid) -> Self {
        Self {
            ngo_id: Some(ngo_id),
            statuses: vec![DonationStatus::Requested, DonationStatus::Completed],
            ..Default::default()
        }
    }

    pub fn matches(&self, donation: &Donation) -> bool {
        self.donor_id.map_or(true, |id| donation.donor_id == id)
            && self.ngo_id.map_or(true, |id| donation.ngo_id == Some(id))
            && (self.statuses.is_empty() || self.statuses.contains(&donation.status))
    }
}

/// Access to the three record collections. Lists come back newest first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, Error>;

    async fn list_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>, Error>;

    async fn count_profiles(&self, filter: &ProfileFilter) -> Result<i64, Error>;

    /// Returns the updated profile, or `None` if no NGO profile has this id.
    async fn approve_ngo(&self, id: Uuid) -> Result<Option<Profile>, Error>;

    /// Deletes an NGO profile. Returns whether a row was removed.
    async fn delete_ngo(&self, id: Uuid) -> Result<bool, Error>;

    async fn insert_donation(&self, new_donation: NewDonation) -> Result<Donation, Error>;

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>, Error>;

    async fn list_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>, Error>;

    async fn count_donations(&self, filter: &DonationFilter) -> Result<i64, Error>;

    /// Replaces the details of a donation owned by `donor_id` that is still
    /// available. `None` means no row satisfied all three conditions.
    async fn update_donation_details(
        &self,
        id: Uuid,
        donor_id: Uuid,
        details: DonationDetails,
    ) -> Result<Option<Donation>, Error>;

    /// Compare-and-set: available -> requested with `ngo_id` recorded.
    /// `None` means the donation was missing or no longer available.
    async fn claim_donation(&self, id: Uuid, ngo_id: Uuid) -> Result<Option<Donation>, Error>;

    async fn delete_donation(&self, id: Uuid, donor_id: Uuid) -> Result<bool, Error>;

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, Error>;

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, Error>;
}

/// Hands out stores scoped to a caller. With the hosted backend the access
/// token decides which rows the caller may touch; `None` is the anonymous key.
pub trait Database: Send + Sync {
    fn store(&self, access_token: Option<&str>) -> Arc<dyn Store>;

    fn backend_tag(&self) -> &'static str;
}
