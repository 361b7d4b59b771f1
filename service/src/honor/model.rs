use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use fw_roster::parse_calendar_date;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum HonorStatus {
    #[default]
    Planning,
    Active,
    Completed,
}

impl HonorStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for HonorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HonorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown honor plan status: '{other}'")),
        }
    }
}

/// Mobile bank transfer details shown to contributors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MobilePayment {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
}

impl MobilePayment {
    /// Trim every field and drop the whole block when nothing is left.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        let payment = Self {
            phone: clean(self.phone),
            national_id: clean(self.national_id),
            bank: clean(self.bank),
        };
        (payment != Self::default()).then_some(payment)
    }
}

/// An event honoring one or more members, with optional contribution details.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HonorPlan {
    pub id: Uuid,
    pub title: String,
    /// `YYYY-MM-DD`
    pub target_date: String,
    pub honoree_ids: Vec<String>,
    pub description: String,
    pub public_message: String,
    pub financial_target: Option<f64>,
    pub contribution_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_payment: Option<MobilePayment>,
    pub qr_url: Option<String>,
    pub photos: Vec<String>,
    pub status: HonorStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct HonorPlanInput {
    pub title: String,
    pub target_date: String,
    #[serde(default)]
    pub honoree_ids: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub public_message: String,
    #[serde(default)]
    pub financial_target: Option<f64>,
    #[serde(default)]
    pub contribution_link: Option<String>,
    #[serde(default)]
    pub mobile_payment: Option<MobilePayment>,
    #[serde(default)]
    pub qr_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HonorValidationError {
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Invalid target date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("Financial target must be a non-negative number")]
    InvalidFinancialTarget,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl HonorPlanInput {
    /// Validate the input into a new plan. New plans start `active`.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule.
    pub fn into_plan(self, now: DateTime<Utc>) -> Result<HonorPlan, HonorValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(HonorValidationError::EmptyTitle);
        }

        let target_date = self.target_date.trim().to_string();
        parse_calendar_date(&target_date)
            .map_err(|_| HonorValidationError::InvalidDate(target_date.clone()))?;

        if let Some(target) = self.financial_target {
            if !target.is_finite() || target < 0.0 {
                return Err(HonorValidationError::InvalidFinancialTarget);
            }
        }

        let mut honoree_ids: Vec<String> = Vec::with_capacity(self.honoree_ids.len());
        for id in self.honoree_ids {
            let id = id.trim().to_string();
            if !id.is_empty() && !honoree_ids.contains(&id) {
                honoree_ids.push(id);
            }
        }

        Ok(HonorPlan {
            id: Uuid::new_v4(),
            title,
            target_date,
            honoree_ids,
            description: self.description.trim().to_string(),
            public_message: self.public_message.trim().to_string(),
            financial_target: self.financial_target,
            contribution_link: non_empty(self.contribution_link),
            mobile_payment: self.mobile_payment.and_then(MobilePayment::normalized),
            qr_url: non_empty(self.qr_url),
            photos: Vec::new(),
            status: HonorStatus::Active,
            created_at: now,
        })
    }
}
