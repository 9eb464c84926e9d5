use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthSession, AuthUser, IdentityError, IdentityProvider, SignUpMetadata};
use crate::db::memory::MemoryStore;
use crate::db::models::{NewProfile, Role};

struct Account {
    id: Uuid,
    email: String,
    salt: [u8; 16],
    hash: blake3::Hash,
}

/// Accounts kept in process, paired with [`MemoryStore`] so that sign-up
/// creates the profile row the way the hosted trigger does.
pub struct MemoryIdentity {
    store: Arc<MemoryStore>,
    accounts: RwLock<HashMap<String, Account>>,
    calls: AtomicUsize,
}

fn hash_password(salt: &[u8; 16], password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize()
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl MemoryIdentity {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            accounts: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of sign-in/sign-up/sign-out requests that reached the provider.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthUser, IdentityError> {
        let key = normalize(email);
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(IdentityError::Rejected("User already registered".to_string()));
        }

        let id = Uuid::new_v4();
        let salt = *Uuid::new_v4().as_bytes();
        self.store
            .insert_profile(NewProfile {
                id,
                email: email.trim().to_string(),
                full_name: metadata.full_name.clone(),
                role: metadata.role,
                phone: metadata.phone.clone(),
                address: metadata.address.clone(),
                organization_name: metadata.organization_name.clone(),
                is_approved: metadata.role == Role::Admin,
            })
            .await
            .map_err(|e| IdentityError::Unexpected(e.to_string()))?;

        accounts.insert(
            key,
            Account {
                id,
                email: email.trim().to_string(),
                salt,
                hash: hash_password(&salt, password),
            },
        );
        Ok(AuthUser { id, email: email.trim().to_string() })
    }

    /// Creates an account without counting it as a client request. Used to
    /// seed the development admin and test fixtures.
    pub async fn seed_account(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthUser, IdentityError> {
        self.create_account(email, password, metadata).await
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(&normalize(email))
            .filter(|a| hash_password(&a.salt, password) == a.hash)
            .ok_or_else(|| IdentityError::Rejected("Invalid login credentials".to_string()))?;

        let access_token = format!("mem-{}", Uuid::new_v4().simple());
        Ok(AuthSession {
            user: AuthUser { id: account.id, email: account.email.clone() },
            access_token,
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<AuthUser, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.create_account(email, password, metadata).await
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
