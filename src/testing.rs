//! Router-level test harness over the in-memory store.

use std::{collections::HashMap, sync::Arc, sync::Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::repo::UserRepo,
    config::AppConfig,
    mail::{Mailer, OutboxMailer},
    memory::MemoryStore,
    social::providers::{ProviderCredentials, SocialAuth, SocialError, SocialProfile},
    state::{AppState, Repos},
};

pub const STRONG_PASSWORD: &str = "Str0ng!Passw0rd";

/// Social provider that only knows the tokens it was told to accept.
#[derive(Default)]
pub struct StaticSocialAuth {
    profiles: Mutex<HashMap<String, SocialProfile>>,
}

impl StaticSocialAuth {
    pub fn accept(&self, access_token: &str, profile: SocialProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(access_token.to_string(), profile);
    }
}

#[async_trait]
impl SocialAuth for StaticSocialAuth {
    async fn profile(&self, creds: &ProviderCredentials) -> Result<SocialProfile, SocialError> {
        self.profiles
            .lock()
            .unwrap()
            .get(creds.access_token())
            .cloned()
            .ok_or(SocialError::InvalidToken(creds.provider()))
    }
}

pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub outbox: Arc<OutboxMailer>,
    pub social: Arc<StaticSocialAuth>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(OutboxMailer::new());
        let social = Arc::new(StaticSocialAuth::default());
        let state = AppState::from_parts(
            Arc::new(AppConfig::for_tests()),
            Repos::shared(store.clone()),
            outbox.clone() as Arc<dyn Mailer>,
            social.clone() as Arc<dyn SocialAuth>,
        );
        Self {
            state,
            store,
            outbox,
            social,
        }
    }

    /// Sends one request through the full router. Non-JSON bodies come back
    /// as a JSON string.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_app(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Registers an account and returns its session token.
    pub async fn register(&self, username: &str, email: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/register",
                None,
                Some(json!({"user": {
                    "username": username,
                    "email": email,
                    "password": STRONG_PASSWORD
                }})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({"user": {"email": email, "password": password}})),
        )
        .await
    }

    pub async fn user_id(&self, email: &str) -> Uuid {
        self.store
            .find_by_email(email)
            .await
            .unwrap()
            .expect("registered user")
            .id
    }

    async fn last_link(&self, marker: &str) -> String {
        self.outbox
            .sent()
            .await
            .iter()
            .rev()
            .flat_map(|m| m.body.lines().map(str::to_string).collect::<Vec<_>>())
            .find(|line| line.contains(marker))
            .expect("link in outbox")
            .trim()
            .to_string()
    }

    /// Path of the newest verification link, ready for [`Self::request`].
    pub async fn last_link_path(&self) -> String {
        let link = self.last_link("/verify/").await;
        link.trim_start_matches("http://localhost:8080").to_string()
    }

    pub async fn last_reset_token(&self) -> String {
        let link = self.last_link("/password-reset/").await;
        link.rsplit('/').next().unwrap().to_string()
    }
}
