#![allow(dead_code)]

use std::sync::Arc;

use ecoplates::config::Config;
use ecoplates::db::memory::MemoryStore;
use ecoplates::db::models::Role;
use ecoplates::db::{Database, MemoryDatabase, Store};
use ecoplates::identity::{IdentityProvider, MemoryIdentity, SessionEvents, SignUpMetadata};
use ecoplates::{build_router, AppState};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use uuid::Uuid;

pub const PASSWORD: &str = "secret123";

pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<MemoryIdentity>,
    pub events: SessionEvents,
}

pub struct Account {
    pub id: Uuid,
    pub token: String,
}

pub async fn spawn_app() -> TestApp {
    let memory = MemoryDatabase::new();
    let store = memory.memory_store();
    let identity = Arc::new(MemoryIdentity::new(store.clone()));
    let events = SessionEvents::default();

    let db: Arc<dyn Database> = Arc::new(memory);
    let provider: Arc<dyn IdentityProvider> = identity.clone();
    let state = AppState {
        config: Arc::new(Config::for_memory("integration-test-secret")),
        db,
        identity: provider,
        events: events.clone(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        store,
        identity,
        events,
    }
}

impl TestApp {
    pub fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base, path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str, token: &str) -> Response {
        self.request(Method::GET, path, Some(token)).send().await.expect("get")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Response {
        self.request(Method::POST, path, Some(token)).json(&body).send().await.expect("post")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Response {
        self.request(Method::PUT, path, Some(token)).json(&body).send().await.expect("put")
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.request(Method::DELETE, path, Some(token)).send().await.expect("delete")
    }

    pub async fn signup(&self, body: Value) -> Response {
        self.request(Method::POST, "/auth/signup", None)
            .json(&body)
            .send()
            .await
            .expect("signup")
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.request(Method::POST, "/auth/login", None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login")
    }

    pub async fn login_token(&self, email: &str) -> String {
        let resp = self.login(email, PASSWORD).await;
        assert_eq!(resp.status(), 200, "login for {}", email);
        let body: Value = resp.json().await.expect("login body");
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn register(&self, email: &str, full_name: &str, role: &str, org: Option<&str>) -> Account {
        let resp = self
            .signup(json!({
                "email": email,
                "password": PASSWORD,
                "confirm_password": PASSWORD,
                "full_name": full_name,
                "role": role,
                "organization_name": org,
            }))
            .await;
        assert_eq!(resp.status(), 201, "signup for {}", email);
        let body: Value = resp.json().await.expect("signup body");
        let id = body["user"]["id"].as_str().expect("user id").parse().expect("uuid");
        Account { id, token: self.login_token(email).await }
    }

    pub async fn donor(&self, name: &str) -> Account {
        let email = format!("{}@donors.test", name.to_lowercase().replace(' ', "."));
        self.register(&email, name, "donor", None).await
    }

    pub async fn pending_ngo(&self, name: &str) -> Account {
        let email = format!("{}@ngos.test", name.to_lowercase().replace(' ', "."));
        self.register(&email, name, "ngo", Some(name)).await
    }

    pub async fn approved_ngo(&self, name: &str) -> Account {
        let account = self.pending_ngo(name).await;
        self.store.approve_ngo(account.id).await.expect("approve").expect("ngo row");
        account
    }

    pub async fn admin(&self) -> Account {
        let metadata = SignUpMetadata {
            full_name: "Admin".to_string(),
            role: Role::Admin,
            phone: None,
            address: None,
            organization_name: None,
        };
        let user = self
            .identity
            .seed_account("admin@ecoplates.test", PASSWORD, &metadata)
            .await
            .expect("seed admin");
        Account { id: user.id, token: self.login_token("admin@ecoplates.test").await }
    }
}

pub fn rice() -> Value {
    json!({
        "food_type": "Rice",
        "quantity": "10 kg",
        "description": "Fresh",
        "pickup_location": "123 Main St",
        "pickup_time": "6pm",
    })
}

pub async fn body(resp: Response) -> Value {
    resp.json().await.expect("json body")
}
