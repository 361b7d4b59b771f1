//! Signed upload parameters for the media CDN.
//!
//! Clients upload honor-plan photos straight to the CDN. The service only
//! signs `token + expire` with the private key so the CDN can verify the
//! upload; the private key never leaves the server.

use std::sync::Arc;

use axum::{extract::Extension, response::Response, routing::get, Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::http::{internal_error, service_unavailable, ErrorResponse};
use crate::identity::http::auth::Actor;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MediaAuth {
    pub token: String,
    /// Unix seconds after which the signature is rejected.
    pub expire: i64,
    pub signature: String,
    pub public_key: String,
    pub url_endpoint: String,
}

pub struct MediaSigner {
    public_key: String,
    private_key: String,
    url_endpoint: String,
    ttl_secs: i64,
}

impl MediaSigner {
    /// Build a signer when media settings are complete.
    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self {
            public_key: config.public_key.clone()?,
            private_key: config.private_key.clone()?,
            url_endpoint: config.url_endpoint.clone()?,
            ttl_secs: config.token_ttl_secs,
        })
    }

    /// Unpadded base64url HMAC-SHA256 of `token` followed by `expire`.
    ///
    /// # Errors
    ///
    /// Fails only if the key is rejected by the MAC implementation.
    pub fn sign(&self, token: &str, expire: i64) -> Result<String, hmac::digest::InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(self.private_key.as_bytes())?;
        mac.update(token.as_bytes());
        mac.update(expire.to_string().as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Fresh upload parameters valid for the configured lifetime.
    ///
    /// # Errors
    ///
    /// See [`Self::sign`].
    pub fn auth_params(&self, now: DateTime<Utc>) -> Result<MediaAuth, hmac::digest::InvalidLength> {
        let token = Uuid::new_v4().to_string();
        let expire = now.timestamp() + self.ttl_secs;
        let signature = self.sign(&token, expire)?;
        Ok(MediaAuth {
            token,
            expire,
            signature,
            public_key: self.public_key.clone(),
            url_endpoint: self.url_endpoint.clone(),
        })
    }
}

pub fn router() -> Router {
    Router::new().route("/media/auth", get(media_auth))
}

/// Signed upload parameters for the media CDN
#[utoipa::path(
    get,
    path = "/media/auth",
    tag = "Media",
    responses(
        (status = 200, description = "Upload parameters", body = MediaAuth),
        (status = 503, description = "Media uploads are not configured", body = ErrorResponse)
    )
)]
pub async fn media_auth(
    _actor: Actor,
    Extension(signer): Extension<Option<Arc<MediaSigner>>>,
) -> Result<Json<MediaAuth>, Response> {
    let signer = signer.ok_or_else(|| service_unavailable("Media uploads are not configured"))?;
    let params = signer.auth_params(Utc::now()).map_err(|e| {
        tracing::error!("media signing failed: {e}");
        internal_error()
    })?;
    Ok(Json(params))
}
