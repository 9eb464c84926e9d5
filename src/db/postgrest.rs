use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::models::{Donation, DonationDetails, NewDonation, Notification, Profile, Role};
use super::{Database, DonationFilter, Error, ProfileFilter, Store};

const PROFILES: &str = "profiles";
// Contact-free projection of `profiles` that anonymous callers may count.
const PUBLIC_PROFILES: &str = "public_profiles";
const DONATIONS: &str = "donations";
const NOTIFICATIONS: &str = "notifications";
const NEWEST_FIRST: &str = "created_at.desc";

type Query = Vec<(&'static str, String)>;

/// Record API of the hosted backend (`{url}/rest/v1/{collection}`).
#[derive(Clone)]
pub struct PostgrestDatabase {
    rest_url: String,
    anon_key: String,
    client: reqwest::Client,
}

impl PostgrestDatabase {
    pub fn new(base_url: &str, anon_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            anon_key,
            client,
        }
    }
}

impl Database for PostgrestDatabase {
    fn store(&self, access_token: Option<&str>) -> Arc<dyn Store> {
        Arc::new(PostgrestStore {
            rest_url: self.rest_url.clone(),
            anon_key: self.anon_key.clone(),
            bearer: access_token.unwrap_or(&self.anon_key).to_string(),
            client: self.client.clone(),
        })
    }

    fn backend_tag(&self) -> &'static str {
        "postgrest"
    }
}

pub struct PostgrestStore {
    rest_url: String,
    anon_key: String,
    bearer: String,
    client: reqwest::Client,
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

pub(crate) fn profile_query(filter: &ProfileFilter) -> Query {
    let mut query = Vec::new();
    if let Some(role) = filter.role {
        query.push(("role", eq(role.as_str())));
    }
    if let Some(approved) = filter.is_approved {
        query.push(("is_approved", eq(approved)));
    }
    query
}

pub(crate) fn donation_query(filter: &DonationFilter) -> Query {
    let mut query = Vec::new();
    if let Some(donor_id) = filter.donor_id {
        query.push(("donor_id", eq(donor_id)));
    }
    if let Some(ngo_id) = filter.ngo_id {
        query.push(("ngo_id", eq(ngo_id)));
    }
    match filter.statuses.as_slice() {
        [] => {}
        [single] => query.push(("status", eq(single.as_str()))),
        many => {
            let list: Vec<&str> = many.iter().map(|s| s.as_str()).collect();
            query.push(("status", format!("in.({})", list.join(","))));
        }
    }
    query
}

/// Total from a `Content-Range` header such as `0-24/57` or `*/0`.
pub(crate) fn parse_content_range(value: &str) -> Result<i64, Error> {
    value
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<i64>().ok())
        .ok_or_else(|| Error::Count(value.to_string()))
}

impl PostgrestStore {
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.bearer)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    fn request(&self, method: Method, collection: &str, query: &Query) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, collection))
            .headers(self.headers())
            .query(query)
    }

    fn write(&self, method: Method, collection: &str, query: &Query) -> RequestBuilder {
        self.request(method, collection, query)
            .header("Prefer", "return=representation")
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, Error> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("data store request failed with {}: {}", status, body);
            return Err(Error::Status { status: status.as_u16(), body });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn select<T: DeserializeOwned>(&self, collection: &str, mut query: Query) -> Result<Vec<T>, Error> {
        query.push(("select", "*".to_string()));
        query.push(("order", NEWEST_FIRST.to_string()));
        self.send(self.request(Method::GET, collection, &query)).await
    }

    async fn select_one<T: DeserializeOwned>(&self, collection: &str, id: Uuid) -> Result<Option<T>, Error> {
        let query = vec![("select", "*".to_string()), ("id", eq(id))];
        let rows: Vec<T> = self.send(self.request(Method::GET, collection, &query)).await?;
        Ok(rows.into_iter().next())
    }

    async fn count(&self, collection: &str, query: Query) -> Result<i64, Error> {
        let resp = self
            .request(Method::HEAD, collection, &query)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status { status: status.as_u16(), body: String::new() });
        }
        let header = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Count("missing content-range".to_string()))?;
        parse_content_range(header)
    }

    async fn patch_returning<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: Query,
        body: serde_json::Value,
    ) -> Result<Vec<T>, Error> {
        self.send(self.write(Method::PATCH, collection, &query).json(&body)).await
    }

    async fn delete_returning<T: DeserializeOwned>(&self, collection: &str, query: Query) -> Result<Vec<T>, Error> {
        self.send(self.write(Method::DELETE, collection, &query)).await
    }
}

#[async_trait]
impl Store for PostgrestStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, Error> {
        self.select_one(PROFILES, id).await
    }

    async fn list_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>, Error> {
        self.select(PROFILES, profile_query(filter)).await
    }

    async fn count_profiles(&self, filter: &ProfileFilter) -> Result<i64, Error> {
        self.count(PUBLIC_PROFILES, profile_query(filter)).await
    }

    async fn approve_ngo(&self, id: Uuid) -> Result<Option<Profile>, Error> {
        let query = vec![("id", eq(id)), ("role", eq(Role::Ngo.as_str()))];
        let rows: Vec<Profile> = self
            .patch_returning(PROFILES, query, json!({ "is_approved": true, "updated_at": Utc::now() }))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_ngo(&self, id: Uuid) -> Result<bool, Error> {
        let query = vec![("id", eq(id)), ("role", eq(Role::Ngo.as_str()))];
        let rows: Vec<Profile> = self.delete_returning(PROFILES, query).await?;
        Ok(!rows.is_empty())
    }

    async fn insert_donation(&self, new_donation: NewDonation) -> Result<Donation, Error> {
        let rows: Vec<Donation> = self
            .send(self.write(Method::POST, DONATIONS, &Vec::new()).json(&new_donation))
            .await?;
        rows.into_iter().next().ok_or(Error::MissingRow(DONATIONS))
    }

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>, Error> {
        self.select_one(DONATIONS, id).await
    }

    async fn list_donations(&self, filter: &DonationFilter) -> Result<Vec<Donation>, Error> {
        self.select(DONATIONS, donation_query(filter)).await
    }

    async fn count_donations(&self, filter: &DonationFilter) -> Result<i64, Error> {
        self.count(DONATIONS, donation_query(filter)).await
    }

    async fn update_donation_details(
        &self,
        id: Uuid,
        donor_id: Uuid,
        details: DonationDetails,
    ) -> Result<Option<Donation>, Error> {
        let query = vec![
            ("id", eq(id)),
            ("donor_id", eq(donor_id)),
            ("status", eq("available")),
        ];
        let mut body = serde_json::to_value(&details)?;
        body["updated_at"] = json!(Utc::now());
        let rows: Vec<Donation> = self.patch_returning(DONATIONS, query, body).await?;
        Ok(rows.into_iter().next())
    }

    async fn claim_donation(&self, id: Uuid, ngo_id: Uuid) -> Result<Option<Donation>, Error> {
        // The status filter turns the update into a compare-and-set.
        let query = vec![("id", eq(id)), ("status", eq("available"))];
        let body = json!({ "status": "requested", "ngo_id": ngo_id, "updated_at": Utc::now() });
        let rows: Vec<Donation> = self.patch_returning(DONATIONS, query, body).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_donation(&self, id: Uuid, donor_id: Uuid) -> Result<bool, Error> {
        let query = vec![("id", eq(id)), ("donor_id", eq(donor_id))];
        let rows: Vec<Donation> = self.delete_returning(DONATIONS, query).await?;
        Ok(!rows.is_empty())
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, Error> {
        self.select(NOTIFICATIONS, vec![("user_id", eq(user_id))]).await
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, Error> {
        let query = vec![("id", eq(id)), ("user_id", eq(user_id))];
        let rows: Vec<Notification> = self
            .patch_returning(NOTIFICATIONS, query, json!({ "is_read": true }))
            .await?;
        Ok(!rows.is_empty())
    }
}
