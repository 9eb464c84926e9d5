use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    Donation, DonationDetails, DonationStatus, NewDonation, NewProfile, Notification,
    NotificationType, Profile, Role,
};
use super::{Database, DonationFilter, Error, ProfileFilter, Store};

/// In-process stand-in for the hosted backend, used in development when no
/// endpoint is configured and by the test suite.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    store: Arc<MemoryStore>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory_store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }
}

impl Database for MemoryDatabase {
    fn store(&self, _access_token: Option<&str>) -> Arc<dyn Store> {
        self.store.clone()
    }

    fn backend_tag(&self) -> &'static str {
        "memory"
    }
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<Vec<Profile>>,
    donations: RwLock<Vec<Donation>>,
    notifications: RwLock<Vec<Notification>>,
}

// Rows are kept in insertion order; reversing before the stable sort keeps
// the newest row first when timestamps tie.
fn newest_first<T>(mut rows: Vec<T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.reverse();
    rows.sort_by_key(|row| Reverse(key(row)));
    rows
}

impl MemoryStore {
    /// Writes a profile row. The hosted backend does this in its sign-up
    /// trigger, so only [`MemoryIdentity`](crate::identity::MemoryIdentity) calls it.
    pub async fn insert_profile(&self, new_profile: NewProfile) -> Result<Profile, Error> {
        let mut profiles = self.profiles.write().await;
        if profiles.iter().any(|p| p.id == new_profile.id) {
            return Err(Error::Status {
                status: 409,
                body: format!("duplicate key value: profiles.id={}", new_profile.id),
            });
        }
        let now = Utc::now();
        let profile = Profile {
            id: new_profile.id,
            email: new_profile.email,
            full_name: new_profile.full_name,
            role: new_profile.role,
            phone: new_profile.phone,
            address: new_profile.address,
            organization_name: new_profile.organization_name,
            is_approved: new_profile.is_approved,
            created_at: now,
            updated_at: now,
        };
        profiles.push(profile.clone());
        Ok(profile)
    }

    /// Notifications have no producer in the service; tests and local seeding
    /// insert them directly.
    pub async fn insert_notification(
        &self,
        user_id: Uuid,
        kind: NotificationType,
        title: &str,
        message: &str,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            kind,
            is_read: false,
            created_at: Utc::now(),
        };
        self.notifications.write().await.push(notification.clone());
        notification
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, Error> {
        Ok(self.profiles.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn list_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>, Error> {
        let profiles = self.profiles.read().await;
        Ok(newest_first(
            profiles.iter().filter(|p| filter.matches(p)).cloned().collect(),
            |p| p.created_at,
        ))
    }

    async fn count_profiles(&self, filter: &ProfileFilter) -> Result<i64, Error> {
        let profiles = self.profiles.read().await;
        Ok(profiles.iter().filter(|p| filter.matches(p)).count() as i64)
    }

    async fn approve_ngo(&self, id: Uuid) -> Result<Option<Profile>, Error> {
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.iter_mut().find(|p| p.id == id && p.role == Role::Ngo) else {
            return Ok(None);
        };
        profile.is_approved = true;
        profile.updated_at = Utc::now();
        Ok(Some(profile.clone()))
    }

    async fn delete_ngo(&self, id: Uuid) -> Result<bool, Error> {
        let mut profiles = self.profiles.write().await;
        let before = profiles.len();
        profiles.retain(|p| !(p.id == id && p.role == Role::Ngo));
        Ok(profiles.len() != before)
    }

    async fn insert_donation(&self, new_donation: NewDonation) -> Result<Donation, Error> {
        let now = Utc::now();
        let donation = Donation {
            id: Uuid::new_v4(),
            donor_id: new_donation.donor_id,
            food_type: new_donation.details.food_type,
            quantity: new_donation.details.quantity,
            description: new_donation.details.description,
            pickup_location: new_donation.details.pickup_location,
            pickup_time: new_donation.details.pickup_time,
            status: new_donation.status,
            ngo_id: None,
            created_at: now,
            updated_at: now,
        };
        self.donations.write().await.push(donation.clone());
        Ok(donation)
    }

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>, Error> {
        Ok(self.donations.read().await.iter().find(|d| d.id == id).cloned())
    }

    async fn list_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>, Error> {
        let donations = self.donations.read().await;
        Ok(newest_first(
            donations.iter().filter(|d| filter.matches(d)).cloned().collect(),
            |d| d.created_at,
        ))
    }

    async fn count_donations(&self, filter: &DonationFilter) -> Result<i64, Error> {
        let donations = self.donations.read().await;
        Ok(donations.iter().filter(|d| filter.matches(d)).count() as i64)
    }

    async fn update_donation_details(
        &self,
        id: Uuid,
        donor_id: Uuid,
        details: DonationDetails,
    ) -> Result<Option<Donation>, Error> {
        let mut donations = self.donations.write().await;
        let Some(donation) = donations.iter_mut().find(|d| {
            d.id == id && d.donor_id == donor_id && d.status == DonationStatus::Available
        }) else {
            return Ok(None);
        };
        donation.food_type = details.food_type;
        donation.quantity = details.quantity;
        donation.description = details.description;
        donation.pickup_location = details.pickup_location;
        donation.pickup_time = details.pickup_time;
        donation.updated_at = Utc::now();
        Ok(Some(donation.clone()))
    }

    async fn claim_donation(&self, id: Uuid, ngo_id: Uuid) -> Result<Option<Donation>, Error> {
        // The write lock makes the status check and the update one step.
        let mut donations = self.donations.write().await;
        let Some(donation) = donations
            .iter_mut()
            .find(|d| d.id == id && d.status == DonationStatus::Available)
        else {
            return Ok(None);
        };
        donation.status = DonationStatus::Requested;
        donation.ngo_id = Some(ngo_id);
        donation.updated_at = Utc::now();
        Ok(Some(donation.clone()))
    }

    async fn delete_donation(&self, id: Uuid, donor_id: Uuid) -> Result<bool, Error> {
        let mut donations = self.donations.write().await;
        let before = donations.len();
        donations.retain(|d| !(d.id == id && d.donor_id == donor_id));
        Ok(donations.len() != before)
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, Error> {
        let notifications = self.notifications.read().await;
        Ok(newest_first(
            notifications
                .iter()
                .filter(|n| n.user_id == user_id)
                .cloned()
                .collect(),
            |n| n.created_at,
        ))
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, Error> {
        let mut notifications = self.notifications.write().await;
        match notifications.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
