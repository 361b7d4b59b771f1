//! Shared harness for the HTTP integration tests.
//!
//! [`TestAppBuilder`] wires the production router from `build_app` over
//! in-memory repositories and a recording notifier, so every test can seed
//! state, call the API and inspect what was persisted or sent.

#![allow(dead_code, clippy::expect_used)]

pub mod http_mock;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use fellowship_api::{
    app::{build_app, AppDeps, AppOptions},
    build_info::BuildInfoProvider,
    config::{CalendarConfig, MediaConfig},
    honor::repo::mock::InMemoryHonorRepo,
    identity::{repo::mock::InMemoryAccountRepo, Role},
    media::MediaSigner,
    members::{repo::mock::InMemoryMemberRepo, MemberService},
    notify::mock::RecordingNotifier,
};
use fellowship_api::identity::http::auth::ACCOUNT_ID_HEADER;
use fw_roster::Member;
use serde_json::Value;
use tower::ServiceExt;

pub const SUPER_ADMIN: &str = "acct-super";
pub const ADMIN: &str = "acct-admin";
pub const EDITOR: &str = "acct-editor";
pub const READER: &str = "acct-reader";

pub struct TestApp {
    pub router: Router,
    pub accounts: Arc<InMemoryAccountRepo>,
    pub members: Arc<InMemoryMemberRepo>,
    pub service: Arc<MemberService>,
    pub honor: Arc<InMemoryHonorRepo>,
    pub notifier: Arc<RecordingNotifier>,
}

pub struct TestAppBuilder {
    calendar: CalendarConfig,
    media: Option<MediaConfig>,
    cors_origins: Option<Vec<String>>,
    swagger: bool,
    members: Vec<Member>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calendar: CalendarConfig::default(),
            media: None,
            cors_origins: None,
            swagger: false,
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_calendar(mut self, calendar: CalendarConfig) -> Self {
        self.calendar = calendar;
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: MediaConfig) -> Self {
        self.media = Some(media);
        self
    }

    #[must_use]
    pub fn with_cors(mut self, origins: &[&str]) -> Self {
        self.cors_origins = Some(origins.iter().map(|s| (*s).to_string()).collect());
        self
    }

    #[must_use]
    pub fn with_swagger(mut self) -> Self {
        self.swagger = true;
        self
    }

    #[must_use]
    pub fn with_members(mut self, members: impl IntoIterator<Item = Member>) -> Self {
        self.members.extend(members);
        self
    }

    /// Build the app with one account per role already registered.
    #[must_use]
    pub fn build(self) -> TestApp {
        let accounts = Arc::new(InMemoryAccountRepo::new());
        accounts.insert(SUPER_ADMIN, "super@church.test", Role::SuperAdmin);
        accounts.insert(ADMIN, "admin@church.test", Role::Admin);
        accounts.insert(EDITOR, "editor@church.test", Role::Editor);
        accounts.insert(READER, "reader@church.test", Role::Reader);

        let members = Arc::new(InMemoryMemberRepo::new());
        members.seed(self.members);

        let service = Arc::new(MemberService::new(
            members.clone(),
            accounts.clone(),
            self.calendar,
        ));
        let honor = Arc::new(InMemoryHonorRepo::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let media = self
            .media
            .as_ref()
            .and_then(MediaSigner::from_config)
            .map(Arc::new);

        let router = build_app(
            AppDeps {
                accounts: accounts.clone(),
                members: service.clone(),
                honor: honor.clone(),
                notifier: notifier.clone(),
                media,
                build_info: BuildInfoProvider::from_lookup(|_| None).build_info(),
            },
            &AppOptions {
                cors_origins: self.cors_origins,
                swagger: self.swagger,
            },
        );

        TestApp {
            router,
            accounts,
            members,
            service,
            honor,
            notifier,
        }
    }
}

/// Response status plus the parsed JSON body (`Value::Null` when empty).
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        account: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(account) = account {
            builder = builder.header(ACCOUNT_ID_HEADER, account);
        }
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, account: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(account), None).await
    }

    pub async fn post(&self, uri: &str, account: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(account), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, account: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(account), Some(body))
            .await
    }

    pub async fn delete(&self, uri: &str, account: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(account), None).await
    }
}

/// A member with a birth date and optional email.
#[must_use]
pub fn member(id: &str, name: &str, birth_date: Option<&str>, email: Option<&str>) -> Member {
    let mut m = Member::new(id, name);
    m.birth_date = birth_date.map(str::to_string);
    m.email = email.map(str::to_string);
    m
}
