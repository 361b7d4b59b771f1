//! Stub notification gateways backed by `wiremock`.
//!
//! ```ignore
//! let gateway = GatewayStub::start().await;
//! Mock::given(method("POST")).and(path(PUSH_PATH))
//!     .respond_with(ResponseTemplate::new(200).set_body_json(json!({...})))
//!     .expect(1)
//!     .mount(&gateway.server)
//!     .await;
//! let notifier = HttpNotifier::new(&gateway.config()).expect("client");
//! ```

pub use wiremock::matchers::{body_json, header, method, path};
pub use wiremock::{Mock, MockServer, ResponseTemplate};

use fellowship_api::config::NotificationsConfig;

pub const PUSH_PATH: &str = "/push";
pub const EMAIL_PATH: &str = "/email";
pub const PUSH_API_KEY: &str = "test-push-key";

pub struct GatewayStub {
    pub server: MockServer,
}

impl GatewayStub {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Notification settings pointing both gateways at this stub.
    #[must_use]
    pub fn config(&self) -> NotificationsConfig {
        NotificationsConfig {
            push_endpoint: Some(format!("{}{PUSH_PATH}", self.server.uri())),
            push_api_key: Some(PUSH_API_KEY.to_string()),
            email_endpoint: Some(format!("{}{EMAIL_PATH}", self.server.uri())),
            request_timeout_secs: 5,
        }
    }
}
