//! Outbound push and email notifications.
//!
//! [`HttpNotifier`] posts to configured gateways. Without any gateway the
//! service runs a [`LogNotifier`] that only records sends in the logs.

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::NotificationsConfig;
use crate::identity::{AccountRepo, Role};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway error: {status} - {message}")]
    Gateway { status: u16, message: String },

    #[error("could not collect recipients: {0}")]
    Recipients(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmailMessage {
    pub subject: String,
    pub message: String,
}

/// Per-token delivery outcome of a multicast push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PushReport {
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmailReport {
    pub recipients: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_push(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<PushReport, NotifyError>;

    async fn send_email(
        &self,
        recipients: &[String],
        message: &EmailMessage,
    ) -> Result<EmailReport, NotifyError>;
}

/// Simulation mode: every send succeeds and is only logged.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_push(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<PushReport, NotifyError> {
        tracing::info!(tokens = tokens.len(), title = %message.title, "push (log only)");
        Ok(PushReport {
            success_count: tokens.len(),
            ..PushReport::default()
        })
    }

    async fn send_email(
        &self,
        recipients: &[String],
        message: &EmailMessage,
    ) -> Result<EmailReport, NotifyError> {
        tracing::info!(recipients = recipients.len(), subject = %message.subject, "email (log only)");
        Ok(EmailReport {
            recipients: recipients.len(),
            message: None,
        })
    }
}

#[derive(Serialize)]
struct PushGatewayRequest<'a> {
    tokens: &'a [String],
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct PushGatewayResponse {
    success_count: usize,
    failure_count: usize,
}

#[derive(Serialize)]
struct EmailGatewayRequest<'a> {
    to: &'a [String],
    subject: &'a str,
    message: &'a str,
}

/// Gateway-backed notifier. A missing endpoint falls back to log-only sends.
pub struct HttpNotifier {
    client: reqwest::Client,
    push_endpoint: Option<String>,
    push_api_key: Option<String>,
    email_endpoint: Option<String>,
}

impl HttpNotifier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &NotificationsConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a notifier with a custom `reqwest::Client`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &NotificationsConfig) -> Self {
        Self {
            client,
            push_endpoint: config.push_endpoint.clone(),
            push_api_key: config.push_api_key.clone(),
            email_endpoint: config.email_endpoint.clone(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, NotifyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(NotifyError::Gateway {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_push(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<PushReport, NotifyError> {
        let Some(url) = &self.push_endpoint else {
            return LogNotifier.send_push(tokens, message).await;
        };

        let mut request = self.client.post(url).json(&PushGatewayRequest {
            tokens,
            title: &message.title,
            body: &message.body,
        });
        if let Some(key) = &self.push_api_key {
            request = request.bearer_auth(key);
        }

        let response = Self::check(request.send().await?).await?;
        let outcome: PushGatewayResponse = response.json().await?;
        Ok(PushReport {
            success_count: outcome.success_count,
            failure_count: outcome.failure_count,
            message: None,
        })
    }

    async fn send_email(
        &self,
        recipients: &[String],
        message: &EmailMessage,
    ) -> Result<EmailReport, NotifyError> {
        let Some(url) = &self.email_endpoint else {
            return LogNotifier.send_email(recipients, message).await;
        };

        let request = self.client.post(url).json(&EmailGatewayRequest {
            to: recipients,
            subject: &message.subject,
            message: &message.message,
        });
        Self::check(request.send().await?).await?;
        Ok(EmailReport {
            recipients: recipients.len(),
            message: None,
        })
    }
}

/// Pick the notifier for the configured gateways.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn notifier_from_config(
    config: &NotificationsConfig,
) -> Result<Arc<dyn Notifier>, NotifyError> {
    if config.push_endpoint.is_none() && config.email_endpoint.is_none() {
        tracing::info!("no notification gateways configured; sends are logged only");
        return Ok(Arc::new(LogNotifier));
    }
    Ok(Arc::new(HttpNotifier::new(config)?))
}

/// Send a push to every registered device.
///
/// # Errors
///
/// Returns an error when tokens cannot be read or the gateway fails.
pub async fn push_to_all(
    accounts: &dyn AccountRepo,
    notifier: &dyn Notifier,
    message: &PushMessage,
) -> Result<PushReport, NotifyError> {
    let tokens = accounts
        .all_push_tokens()
        .await
        .map_err(|e| NotifyError::Recipients(e.to_string()))?;
    if tokens.is_empty() {
        return Ok(PushReport {
            message: Some("No tokens found".to_string()),
            ..PushReport::default()
        });
    }
    notifier.send_push(&tokens, message).await
}

/// Email every account whose role is in `audience` (all accounts when empty).
///
/// # Errors
///
/// Returns an error when accounts cannot be read or the gateway fails.
pub async fn email_audience(
    accounts: &dyn AccountRepo,
    notifier: &dyn Notifier,
    audience: &[Role],
    message: &EmailMessage,
) -> Result<EmailReport, NotifyError> {
    let mut recipients: Vec<String> = accounts
        .list_accounts()
        .await
        .map_err(|e| NotifyError::Recipients(e.to_string()))?
        .into_iter()
        .filter(|a| audience.is_empty() || audience.contains(&a.role))
        .map(|a| a.email.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    recipients.sort();
    recipients.dedup();

    if recipients.is_empty() {
        return Ok(EmailReport {
            recipients: 0,
            message: Some("No recipients found".to_string()),
        });
    }
    notifier.send_email(&recipients, message).await
}

/// Fire-and-forget push to every registered device. Failures are logged and
/// never reach the caller.
pub fn spawn_push_to_all(
    accounts: Arc<dyn AccountRepo>,
    notifier: Arc<dyn Notifier>,
    message: PushMessage,
) {
    tokio::spawn(async move {
        match push_to_all(accounts.as_ref(), notifier.as_ref(), &message).await {
            Ok(report) => tracing::info!(
                title = %message.title,
                success = report.success_count,
                failure = report.failure_count,
                "push dispatched"
            ),
            Err(e) => tracing::warn!(title = %message.title, "push dispatch failed: {e}"),
        }
    });
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::expect_used)]
pub mod mock {
    //! Notifier that records every send.

    use std::sync::Mutex;
    use std::time::Duration;

    use super::{async_trait, EmailMessage, EmailReport, Notifier, NotifyError, PushMessage, PushReport};

    #[derive(Default)]
    pub struct RecordingNotifier {
        pushes: Mutex<Vec<(Vec<String>, PushMessage)>>,
        emails: Mutex<Vec<(Vec<String>, EmailMessage)>>,
    }

    impl RecordingNotifier {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        #[must_use]
        pub fn pushes(&self) -> Vec<(Vec<String>, PushMessage)> {
            self.pushes.lock().expect("lock poisoned").clone()
        }

        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        #[must_use]
        pub fn emails(&self) -> Vec<(Vec<String>, EmailMessage)> {
            self.emails.lock().expect("lock poisoned").clone()
        }

        /// Wait up to one second for `count` pushes, for spawned sends.
        pub async fn wait_for_pushes(&self, count: usize) -> Vec<(Vec<String>, PushMessage)> {
            for _ in 0..100 {
                let pushes = self.pushes();
                if pushes.len() >= count {
                    return pushes;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.pushes()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_push(
            &self,
            tokens: &[String],
            message: &PushMessage,
        ) -> Result<PushReport, NotifyError> {
            self.pushes
                .lock()
                .expect("lock poisoned")
                .push((tokens.to_vec(), message.clone()));
            Ok(PushReport {
                success_count: tokens.len(),
                ..PushReport::default()
            })
        }

        async fn send_email(
            &self,
            recipients: &[String],
            message: &EmailMessage,
        ) -> Result<EmailReport, NotifyError> {
            self.emails
                .lock()
                .expect("lock poisoned")
                .push((recipients.to_vec(), message.clone()));
            Ok(EmailReport {
                recipients: recipients.len(),
                message: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingNotifier;
    use super::*;
    use crate::identity::repo::mock::InMemoryAccountRepo;

    fn push() -> PushMessage {
        PushMessage {
            title: "Hello".into(),
            body: "World".into(),
        }
    }

    #[tokio::test]
    async fn push_without_tokens_reports_no_recipients() {
        let accounts = InMemoryAccountRepo::new();
        let notifier = RecordingNotifier::new();

        let report = push_to_all(&accounts, &notifier, &push()).await.expect("push");
        assert_eq!(report.success_count, 0);
        assert_eq!(report.message.as_deref(), Some("No tokens found"));
        assert!(notifier.pushes().is_empty());
    }

    #[tokio::test]
    async fn push_collects_every_token() {
        let accounts = InMemoryAccountRepo::new();
        accounts.insert("a", "a@example.com", Role::Reader);
        accounts.add_push_token("a", "t1").await.expect("token");
        accounts.add_push_token("a", "t2").await.expect("token");
        let notifier = RecordingNotifier::new();

        let report = push_to_all(&accounts, &notifier, &push()).await.expect("push");
        assert_eq!(report.success_count, 2);
        assert_eq!(notifier.pushes()[0].0, ["t1", "t2"]);
    }

    #[tokio::test]
    async fn email_filters_by_role() {
        let accounts = InMemoryAccountRepo::new();
        accounts.insert("1", "admin@example.com", Role::Admin);
        accounts.insert("2", "editor@example.com", Role::Editor);
        accounts.insert("3", "reader@example.com", Role::Reader);
        accounts.insert("4", "", Role::Admin);
        let notifier = RecordingNotifier::new();
        let message = EmailMessage {
            subject: "Meeting".into(),
            message: "Sunday".into(),
        };

        let report = email_audience(&accounts, &notifier, &[Role::Admin, Role::Editor], &message)
            .await
            .expect("email");
        assert_eq!(report.recipients, 2);
        assert_eq!(
            notifier.emails()[0].0,
            ["admin@example.com", "editor@example.com"]
        );

        let report = email_audience(&accounts, &notifier, &[], &message)
            .await
            .expect("email");
        assert_eq!(report.recipients, 3);
    }

    #[tokio::test]
    async fn log_notifier_counts_every_recipient_as_sent() {
        let report = LogNotifier
            .send_push(&["a".into(), "b".into()], &push())
            .await
            .expect("push");
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 0);
    }

    #[test]
    fn log_only_without_gateways() {
        let notifier = notifier_from_config(&NotificationsConfig::default());
        assert!(notifier.is_ok());
    }
}
