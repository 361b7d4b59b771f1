//! Account persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use super::role::Role;

/// An authenticated user of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Account {
    /// Identifier issued by the upstream identity provider.
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub role: Role,
    pub birth_date: Option<String>,
    pub phone_number: Option<String>,
    #[serde(skip_serializing)]
    pub push_tokens: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields reported by the identity provider at sign-in.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountRepoError {
    #[error("account not found")]
    NotFound,
    #[error("invalid stored account: {0}")]
    InvalidRow(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Create the account as a reader on first sign-in; otherwise refresh the
    /// provider fields. Never changes the role.
    async fn upsert_session(&self, id: &str, info: &SessionInfo)
        -> Result<Account, AccountRepoError>;

    async fn get_account(&self, id: &str) -> Result<Account, AccountRepoError>;

    /// All accounts ordered by email.
    async fn list_accounts(&self) -> Result<Vec<Account>, AccountRepoError>;

    async fn set_role(&self, id: &str, role: Role) -> Result<Account, AccountRepoError>;

    async fn update_profile(
        &self,
        id: &str,
        birth_date: &str,
        phone_number: Option<&str>,
    ) -> Result<Account, AccountRepoError>;

    /// Register a push token; registering the same token twice is a no-op.
    async fn add_push_token(&self, id: &str, token: &str) -> Result<(), AccountRepoError>;

    /// Every registered push token across all accounts.
    async fn all_push_tokens(&self) -> Result<Vec<String>, AccountRepoError>;
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    email: String,
    display_name: Option<String>,
    photo_url: Option<String>,
    role: String,
    birth_date: Option<String>,
    phone_number: Option<String>,
    push_tokens: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = AccountRepoError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e: super::role::ParseRoleError| AccountRepoError::InvalidRow(e.to_string()))?;
        Ok(Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            photo_url: row.photo_url,
            role,
            birth_date: row.birth_date,
            phone_number: row.phone_number,
            push_tokens: row.push_tokens,
            created_at: row.created_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, email, display_name, photo_url, role, birth_date, phone_number, push_tokens, created_at";

fn one(row: Option<AccountRow>) -> Result<Account, AccountRepoError> {
    row.ok_or(AccountRepoError::NotFound)?.try_into()
}

/// `PostgreSQL` implementation of [`AccountRepo`].
pub struct PgAccountRepo {
    pool: PgPool,
}

impl PgAccountRepo {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepo for PgAccountRepo {
    async fn upsert_session(
        &self,
        id: &str,
        info: &SessionInfo,
    ) -> Result<Account, AccountRepoError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r"
            INSERT INTO accounts (id, email, display_name, photo_url, role)
            VALUES ($1, $2, $3, $4, 'reader')
            ON CONFLICT (id) DO UPDATE
               SET email = EXCLUDED.email,
                   display_name = COALESCE(EXCLUDED.display_name, accounts.display_name),
                   photo_url = COALESCE(EXCLUDED.photo_url, accounts.photo_url),
                   updated_at = now()
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&info.email)
        .bind(&info.display_name)
        .bind(&info.photo_url)
        .fetch_optional(&self.pool)
        .await?;
        one(row)
    }

    async fn get_account(&self, id: &str) -> Result<Account, AccountRepoError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        one(row)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, AccountRepoError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY email, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Account::try_from).collect()
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<Account, AccountRepoError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "UPDATE accounts SET role = $2, updated_at = now() WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        one(row)
    }

    async fn update_profile(
        &self,
        id: &str,
        birth_date: &str,
        phone_number: Option<&str>,
    ) -> Result<Account, AccountRepoError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r"
            UPDATE accounts
               SET birth_date = $2,
                   phone_number = COALESCE($3, phone_number),
                   updated_at = now()
             WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(birth_date)
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;
        one(row)
    }

    async fn add_push_token(&self, id: &str, token: &str) -> Result<(), AccountRepoError> {
        let result = sqlx::query(
            r"
            UPDATE accounts
               SET push_tokens = CASE
                       WHEN $2 = ANY(push_tokens) THEN push_tokens
                       ELSE array_append(push_tokens, $2)
                   END,
                   updated_at = now()
             WHERE id = $1
            ",
        )
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountRepoError::NotFound);
        }
        Ok(())
    }

    async fn all_push_tokens(&self) -> Result<Vec<String>, AccountRepoError> {
        let tokens = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT unnest(push_tokens) FROM accounts",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tokens)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::expect_used)]
pub mod mock {
    //! In-memory account store for handler and service tests.

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::{async_trait, Account, AccountRepo, AccountRepoError, Role, SessionInfo};

    #[derive(Default)]
    pub struct InMemoryAccountRepo {
        accounts: Mutex<BTreeMap<String, Account>>,
    }

    impl InMemoryAccountRepo {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed an account with the given role.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        pub fn insert(&self, id: &str, email: &str, role: Role) -> Account {
            let account = Account {
                id: id.to_string(),
                email: email.to_string(),
                display_name: None,
                photo_url: None,
                role,
                birth_date: None,
                phone_number: None,
                push_tokens: Vec::new(),
                created_at: chrono::Utc::now(),
            };
            self.accounts
                .lock()
                .expect("lock poisoned")
                .insert(id.to_string(), account.clone());
            account
        }

        fn update<F>(&self, id: &str, f: F) -> Result<Account, AccountRepoError>
        where
            F: FnOnce(&mut Account),
        {
            let mut accounts = self.accounts.lock().expect("lock poisoned");
            let account = accounts.get_mut(id).ok_or(AccountRepoError::NotFound)?;
            f(account);
            Ok(account.clone())
        }
    }

    #[async_trait]
    impl AccountRepo for InMemoryAccountRepo {
        async fn upsert_session(
            &self,
            id: &str,
            info: &SessionInfo,
        ) -> Result<Account, AccountRepoError> {
            let exists = self.accounts.lock().expect("lock poisoned").contains_key(id);
            if !exists {
                self.insert(id, &info.email, Role::Reader);
            }
            self.update(id, |a| {
                a.email.clone_from(&info.email);
                if info.display_name.is_some() {
                    a.display_name.clone_from(&info.display_name);
                }
                if info.photo_url.is_some() {
                    a.photo_url.clone_from(&info.photo_url);
                }
            })
        }

        async fn get_account(&self, id: &str) -> Result<Account, AccountRepoError> {
            self.accounts
                .lock()
                .expect("lock poisoned")
                .get(id)
                .cloned()
                .ok_or(AccountRepoError::NotFound)
        }

        async fn list_accounts(&self) -> Result<Vec<Account>, AccountRepoError> {
            let mut all: Vec<Account> = self
                .accounts
                .lock()
                .expect("lock poisoned")
                .values()
                .cloned()
                .collect();
            all.sort_by(|a, b| a.email.cmp(&b.email).then_with(|| a.id.cmp(&b.id)));
            Ok(all)
        }

        async fn set_role(&self, id: &str, role: Role) -> Result<Account, AccountRepoError> {
            self.update(id, |a| a.role = role)
        }

        async fn update_profile(
            &self,
            id: &str,
            birth_date: &str,
            phone_number: Option<&str>,
        ) -> Result<Account, AccountRepoError> {
            self.update(id, |a| {
                a.birth_date = Some(birth_date.to_string());
                if let Some(phone) = phone_number {
                    a.phone_number = Some(phone.to_string());
                }
            })
        }

        async fn add_push_token(&self, id: &str, token: &str) -> Result<(), AccountRepoError> {
            self.update(id, |a| {
                if !a.push_tokens.iter().any(|t| t == token) {
                    a.push_tokens.push(token.to_string());
                }
            })
            .map(|_| ())
        }

        async fn all_push_tokens(&self) -> Result<Vec<String>, AccountRepoError> {
            let mut tokens: Vec<String> = self
                .accounts
                .lock()
                .expect("lock poisoned")
                .values()
                .flat_map(|a| a.push_tokens.iter().cloned())
                .collect();
            tokens.sort();
            tokens.dedup();
            Ok(tokens)
        }
    }
}
