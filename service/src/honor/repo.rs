//! Honor plan persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{HonorPlan, MobilePayment};

#[derive(Debug, thiserror::Error)]
pub enum HonorRepoError {
    #[error("honor plan not found")]
    NotFound,
    #[error("invalid stored honor plan: {0}")]
    InvalidRow(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait HonorRepo: Send + Sync {
    /// All plans, latest target date first.
    async fn list_plans(&self) -> Result<Vec<HonorPlan>, HonorRepoError>;

    async fn get_plan(&self, id: Uuid) -> Result<HonorPlan, HonorRepoError>;

    async fn create_plan(&self, plan: &HonorPlan) -> Result<HonorPlan, HonorRepoError>;

    async fn delete_plan(&self, id: Uuid) -> Result<(), HonorRepoError>;

    /// Append `url` to the plan's photos unless it is already there.
    async fn add_photo(&self, id: Uuid, url: &str) -> Result<HonorPlan, HonorRepoError>;
}

#[derive(sqlx::FromRow)]
struct HonorPlanRow {
    id: Uuid,
    title: String,
    target_date: String,
    honoree_ids: Vec<String>,
    description: String,
    public_message: String,
    financial_target: Option<f64>,
    contribution_link: Option<String>,
    payment_phone: Option<String>,
    payment_national_id: Option<String>,
    payment_bank: Option<String>,
    qr_url: Option<String>,
    photos: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HonorPlanRow> for HonorPlan {
    type Error = HonorRepoError;

    fn try_from(row: HonorPlanRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(HonorRepoError::InvalidRow)?;
        let mobile_payment = MobilePayment {
            phone: row.payment_phone,
            national_id: row.payment_national_id,
            bank: row.payment_bank,
        }
        .normalized();
        Ok(Self {
            id: row.id,
            title: row.title,
            target_date: row.target_date,
            honoree_ids: row.honoree_ids,
            description: row.description,
            public_message: row.public_message,
            financial_target: row.financial_target,
            contribution_link: row.contribution_link,
            mobile_payment,
            qr_url: row.qr_url,
            photos: row.photos,
            status,
            created_at: row.created_at,
        })
    }
}

const PLAN_COLUMNS: &str = "id, title, target_date, honoree_ids, description, public_message, financial_target, contribution_link, payment_phone, payment_national_id, payment_bank, qr_url, photos, status, created_at";

/// `PostgreSQL` implementation of [`HonorRepo`].
pub struct PgHonorRepo {
    pool: PgPool,
}

impl PgHonorRepo {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HonorRepo for PgHonorRepo {
    async fn list_plans(&self) -> Result<Vec<HonorPlan>, HonorRepoError> {
        let rows = sqlx::query_as::<_, HonorPlanRow>(&format!(
            "SELECT {PLAN_COLUMNS} FROM honor_plans ORDER BY target_date DESC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(HonorPlan::try_from).collect()
    }

    async fn get_plan(&self, id: Uuid) -> Result<HonorPlan, HonorRepoError> {
        sqlx::query_as::<_, HonorPlanRow>(&format!(
            "SELECT {PLAN_COLUMNS} FROM honor_plans WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(HonorRepoError::NotFound)?
        .try_into()
    }

    async fn create_plan(&self, plan: &HonorPlan) -> Result<HonorPlan, HonorRepoError> {
        let payment = plan.mobile_payment.clone().unwrap_or_default();
        sqlx::query(
            r"
            INSERT INTO honor_plans
                (id, title, target_date, honoree_ids, description, public_message,
                 financial_target, contribution_link, payment_phone, payment_national_id,
                 payment_bank, qr_url, photos, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ",
        )
        .bind(plan.id)
        .bind(&plan.title)
        .bind(&plan.target_date)
        .bind(&plan.honoree_ids)
        .bind(&plan.description)
        .bind(&plan.public_message)
        .bind(plan.financial_target)
        .bind(&plan.contribution_link)
        .bind(&payment.phone)
        .bind(&payment.national_id)
        .bind(&payment.bank)
        .bind(&plan.qr_url)
        .bind(&plan.photos)
        .bind(plan.status.as_str())
        .bind(plan.created_at)
        .execute(&self.pool)
        .await?;
        Ok(plan.clone())
    }

    async fn delete_plan(&self, id: Uuid) -> Result<(), HonorRepoError> {
        let result = sqlx::query("DELETE FROM honor_plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HonorRepoError::NotFound);
        }
        Ok(())
    }

    async fn add_photo(&self, id: Uuid, url: &str) -> Result<HonorPlan, HonorRepoError> {
        sqlx::query_as::<_, HonorPlanRow>(&format!(
            r"
            UPDATE honor_plans
               SET photos = CASE
                       WHEN $2 = ANY(photos) THEN photos
                       ELSE array_append(photos, $2)
                   END
             WHERE id = $1
            RETURNING {PLAN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(HonorRepoError::NotFound)?
        .try_into()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::expect_used)]
pub mod mock {
    //! In-memory honor plan store.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::{async_trait, HonorPlan, HonorRepo, HonorRepoError, Uuid};

    #[derive(Default)]
    pub struct InMemoryHonorRepo {
        plans: Mutex<HashMap<Uuid, HonorPlan>>,
    }

    impl InMemoryHonorRepo {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl HonorRepo for InMemoryHonorRepo {
        async fn list_plans(&self) -> Result<Vec<HonorPlan>, HonorRepoError> {
            let mut plans: Vec<HonorPlan> = self
                .plans
                .lock()
                .expect("lock poisoned")
                .values()
                .cloned()
                .collect();
            plans.sort_by(|a, b| {
                b.target_date
                    .cmp(&a.target_date)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
            Ok(plans)
        }

        async fn get_plan(&self, id: Uuid) -> Result<HonorPlan, HonorRepoError> {
            self.plans
                .lock()
                .expect("lock poisoned")
                .get(&id)
                .cloned()
                .ok_or(HonorRepoError::NotFound)
        }

        async fn create_plan(&self, plan: &HonorPlan) -> Result<HonorPlan, HonorRepoError> {
            self.plans
                .lock()
                .expect("lock poisoned")
                .insert(plan.id, plan.clone());
            Ok(plan.clone())
        }

        async fn delete_plan(&self, id: Uuid) -> Result<(), HonorRepoError> {
            self.plans
                .lock()
                .expect("lock poisoned")
                .remove(&id)
                .map(|_| ())
                .ok_or(HonorRepoError::NotFound)
        }

        async fn add_photo(&self, id: Uuid, url: &str) -> Result<HonorPlan, HonorRepoError> {
            let mut plans = self.plans.lock().expect("lock poisoned");
            let plan = plans.get_mut(&id).ok_or(HonorRepoError::NotFound)?;
            if !plan.photos.iter().any(|p| p == url) {
                plan.photos.push(url.to_string());
            }
            Ok(plan.clone())
        }
    }
}
