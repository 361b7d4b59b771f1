use chrono::{DateTime, Utc};
use serde::Serialize;
use std::env;
use utoipa::ToSchema;

/// Build metadata exposed at `/api/v1/build-info` and in the startup log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: String,
    pub git_sha: String,
    pub build_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BuildInfoProvider {
    info: BuildInfo,
}

impl BuildInfoProvider {
    /// Resolve build metadata from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve build metadata through `lookup`; missing values fall back to
    /// `dev` / `unknown`.
    pub fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let version = lookup("APP_VERSION")
            .or_else(|| lookup("VERSION"))
            .unwrap_or_else(|| "dev".to_string());
        let git_sha = lookup("GIT_SHA").unwrap_or_else(|| "unknown".to_string());
        let build_time = lookup("BUILD_TIME")
            .and_then(|value| normalize_build_time(&value))
            .unwrap_or_else(|| "unknown".to_string());
        let message = lookup("BUILD_MESSAGE").filter(|m| !m.trim().is_empty());

        Self {
            info: BuildInfo {
                version,
                git_sha,
                build_time,
                message,
            },
        }
    }

    #[must_use]
    pub fn build_info(&self) -> BuildInfo {
        self.info.clone()
    }
}

fn normalize_build_time(value: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc3339(&format!("{value}Z")))
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_time_without_offset_is_read_as_utc() {
        assert_eq!(
            normalize_build_time("2025-03-01T10:00:00").as_deref(),
            Some("2025-03-01T10:00:00+00:00")
        );
        assert_eq!(
            normalize_build_time("2025-03-01T10:00:00+02:00").as_deref(),
            Some("2025-03-01T08:00:00+00:00")
        );
    }

    #[test]
    fn serializes_camel_case_and_omits_empty_message() {
        let info = BuildInfoProvider::from_lookup(|key| match key {
            "GIT_SHA" => Some("abc".into()),
            "BUILD_MESSAGE" => Some("  ".into()),
            _ => None,
        })
        .build_info();
        let json = serde_json::to_value(&info).expect("serialize");
        assert_eq!(json["gitSha"], "abc");
        assert_eq!(json["buildTime"], "unknown");
        assert!(json.get("message").is_none());
    }
}
