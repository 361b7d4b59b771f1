//! Member persistence

use async_trait::async_trait;
use fw_roster::{Member, MemberId};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

#[derive(Debug, thiserror::Error)]
pub enum MemberRepoError {
    #[error("member not found")]
    NotFound,
    #[error("account is already linked to another member")]
    LinkedAccountTaken,
    #[error("linked account does not exist")]
    UnknownAccount,
    #[error("invalid stored member: {0}")]
    InvalidRow(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage for member records. Implementations return typed [`Member`]s and
/// never hand raw rows to callers.
#[async_trait]
pub trait MemberRepo: Send + Sync {
    /// Point-in-time snapshot of every member, ordered by name.
    async fn list_members(&self) -> Result<Vec<Member>, MemberRepoError>;

    async fn get_member(&self, id: &MemberId) -> Result<Member, MemberRepoError>;

    async fn create_member(&self, member: &Member) -> Result<Member, MemberRepoError>;

    /// Overwrite every field of the member with `member.id`.
    async fn update_member(&self, member: &Member) -> Result<Member, MemberRepoError>;

    /// Clear the account link held by `releasing` and overwrite `member`
    /// in one transaction. Neither write is visible if the other fails.
    async fn update_member_taking_link(
        &self,
        member: &Member,
        releasing: &MemberId,
    ) -> Result<Member, MemberRepoError>;

    async fn delete_member(&self, id: &MemberId) -> Result<(), MemberRepoError>;

    async fn find_by_linked_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Member>, MemberRepoError>;
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: String,
    full_name: String,
    email: Option<String>,
    phone_number: Option<String>,
    birth_date: Option<String>,
    membership_type: String,
    status: String,
    linked_account_id: Option<String>,
    notes: Option<String>,
}

impl TryFrom<MemberRow> for Member {
    type Error = MemberRepoError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let invalid = |e: fw_roster::ParseEnumError| {
            MemberRepoError::InvalidRow(format!("member {}: {e}", row.id))
        };
        let membership_type = row.membership_type.parse().map_err(invalid)?;
        let status = row.status.parse().map_err(invalid)?;
        Ok(Self {
            id: MemberId::new(row.id),
            full_name: row.full_name,
            email: row.email,
            phone_number: row.phone_number,
            birth_date: row.birth_date,
            membership_type,
            status,
            linked_account_id: row.linked_account_id,
            notes: row.notes,
        })
    }
}

const MEMBER_COLUMNS: &str = "id, full_name, email, phone_number, birth_date, membership_type, status, linked_account_id, notes";

fn map_write_error(e: sqlx::Error) -> MemberRepoError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some("members_linked_account_id_key") => return MemberRepoError::LinkedAccountTaken,
            Some("members_linked_account_id_fkey") => return MemberRepoError::UnknownAccount,
            _ => {}
        }
    }
    MemberRepoError::Database(e)
}

fn update_query(member: &Member) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(
        r"
        UPDATE members
           SET full_name = $2,
               email = $3,
               phone_number = $4,
               birth_date = $5,
               membership_type = $6,
               status = $7,
               linked_account_id = $8,
               notes = $9,
               updated_at = now()
         WHERE id = $1
        ",
    )
    .bind(member.id.as_str())
    .bind(&member.full_name)
    .bind(&member.email)
    .bind(&member.phone_number)
    .bind(&member.birth_date)
    .bind(member.membership_type.as_str())
    .bind(member.status.as_str())
    .bind(&member.linked_account_id)
    .bind(&member.notes)
}

/// `PostgreSQL` implementation of [`MemberRepo`].
pub struct PgMemberRepo {
    pool: PgPool,
}

impl PgMemberRepo {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepo for PgMemberRepo {
    async fn list_members(&self) -> Result<Vec<Member>, MemberRepoError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members ORDER BY lower(full_name), id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Member::try_from).collect()
    }

    async fn get_member(&self, id: &MemberId) -> Result<Member, MemberRepoError> {
        sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(MemberRepoError::NotFound)?
        .try_into()
    }

    async fn create_member(&self, member: &Member) -> Result<Member, MemberRepoError> {
        sqlx::query(
            r"
            INSERT INTO members
                (id, full_name, email, phone_number, birth_date, membership_type, status,
                 linked_account_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(member.id.as_str())
        .bind(&member.full_name)
        .bind(&member.email)
        .bind(&member.phone_number)
        .bind(&member.birth_date)
        .bind(member.membership_type.as_str())
        .bind(member.status.as_str())
        .bind(&member.linked_account_id)
        .bind(&member.notes)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(member.clone())
    }

    async fn update_member(&self, member: &Member) -> Result<Member, MemberRepoError> {
        let result = update_query(member)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(MemberRepoError::NotFound);
        }
        Ok(member.clone())
    }

    async fn update_member_taking_link(
        &self,
        member: &Member,
        releasing: &MemberId,
    ) -> Result<Member, MemberRepoError> {
        let mut tx = self.pool.begin().await?;

        let released = sqlx::query(
            "UPDATE members SET linked_account_id = NULL, updated_at = now() WHERE id = $1",
        )
        .bind(releasing.as_str())
        .execute(&mut *tx)
        .await?;
        if released.rows_affected() == 0 {
            return Err(MemberRepoError::NotFound);
        }

        let updated = update_query(member)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        if updated.rows_affected() == 0 {
            return Err(MemberRepoError::NotFound);
        }

        tx.commit().await?;
        Ok(member.clone())
    }

    async fn delete_member(&self, id: &MemberId) -> Result<(), MemberRepoError> {
        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MemberRepoError::NotFound);
        }
        Ok(())
    }

    async fn find_by_linked_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Member>, MemberRepoError> {
        sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE linked_account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Member::try_from)
        .transpose()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::expect_used)]
pub mod mock {
    //! In-memory member store with injectable failures.

    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    use super::{async_trait, Member, MemberId, MemberRepo, MemberRepoError};

    #[derive(Default)]
    pub struct InMemoryMemberRepo {
        members: Mutex<BTreeMap<MemberId, Member>>,
        fail_updates: Mutex<bool>,
        failing_ids: Mutex<BTreeSet<MemberId>>,
        fail_deletes: Mutex<bool>,
    }

    impl InMemoryMemberRepo {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed records directly, bypassing validation.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        pub fn seed(&self, members: impl IntoIterator<Item = Member>) {
            let mut store = self.members.lock().expect("lock poisoned");
            for member in members {
                store.insert(member.id.clone(), member);
            }
        }

        /// Make every subsequent update fail with a database error.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        pub fn fail_updates(&self) {
            *self.fail_updates.lock().expect("lock poisoned") = true;
        }

        /// Make subsequent updates of the member with `id` fail with a
        /// database error. Other members still update normally.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        pub fn fail_updates_for(&self, id: impl Into<MemberId>) {
            self.failing_ids
                .lock()
                .expect("lock poisoned")
                .insert(id.into());
        }

        fn update_fails(&self, id: &MemberId) -> bool {
            *self.fail_updates.lock().expect("lock poisoned")
                || self.failing_ids.lock().expect("lock poisoned").contains(id)
        }

        /// Make every subsequent delete fail with a database error.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        pub fn fail_deletes(&self) {
            *self.fail_deletes.lock().expect("lock poisoned") = true;
        }

        /// # Panics
        ///
        /// Panics if the internal mutex is poisoned.
        #[must_use]
        pub fn snapshot(&self) -> Vec<Member> {
            self.members
                .lock()
                .expect("lock poisoned")
                .values()
                .cloned()
                .collect()
        }

        fn check_link(
            store: &BTreeMap<MemberId, Member>,
            member: &Member,
        ) -> Result<(), MemberRepoError> {
            let Some(link) = member.linked_account_id.as_deref() else {
                return Ok(());
            };
            let taken = store
                .values()
                .any(|m| m.id != member.id && m.linked_account_id.as_deref() == Some(link));
            if taken {
                Err(MemberRepoError::LinkedAccountTaken)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MemberRepo for InMemoryMemberRepo {
        async fn list_members(&self) -> Result<Vec<Member>, MemberRepoError> {
            let mut all = self.snapshot();
            all.sort_by(|a, b| {
                a.full_name
                    .to_lowercase()
                    .cmp(&b.full_name.to_lowercase())
                    .then_with(|| a.id.cmp(&b.id))
            });
            Ok(all)
        }

        async fn get_member(&self, id: &MemberId) -> Result<Member, MemberRepoError> {
            self.members
                .lock()
                .expect("lock poisoned")
                .get(id)
                .cloned()
                .ok_or(MemberRepoError::NotFound)
        }

        async fn create_member(&self, member: &Member) -> Result<Member, MemberRepoError> {
            let mut store = self.members.lock().expect("lock poisoned");
            Self::check_link(&store, member)?;
            store.insert(member.id.clone(), member.clone());
            Ok(member.clone())
        }

        async fn update_member(&self, member: &Member) -> Result<Member, MemberRepoError> {
            if self.update_fails(&member.id) {
                return Err(MemberRepoError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut store = self.members.lock().expect("lock poisoned");
            if !store.contains_key(&member.id) {
                return Err(MemberRepoError::NotFound);
            }
            Self::check_link(&store, member)?;
            store.insert(member.id.clone(), member.clone());
            Ok(member.clone())
        }

        async fn update_member_taking_link(
            &self,
            member: &Member,
            releasing: &MemberId,
        ) -> Result<Member, MemberRepoError> {
            if self.update_fails(releasing) || self.update_fails(&member.id) {
                return Err(MemberRepoError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut store = self.members.lock().expect("lock poisoned");
            if !store.contains_key(&member.id) {
                return Err(MemberRepoError::NotFound);
            }
            let mut staged = store.clone();
            staged
                .get_mut(releasing)
                .ok_or(MemberRepoError::NotFound)?
                .linked_account_id = None;
            Self::check_link(&staged, member)?;
            staged.insert(member.id.clone(), member.clone());
            *store = staged;
            Ok(member.clone())
        }

        async fn delete_member(&self, id: &MemberId) -> Result<(), MemberRepoError> {
            if *self.fail_deletes.lock().expect("lock poisoned") {
                return Err(MemberRepoError::Database(sqlx::Error::PoolTimedOut));
            }
            self.members
                .lock()
                .expect("lock poisoned")
                .remove(id)
                .map(|_| ())
                .ok_or(MemberRepoError::NotFound)
        }

        async fn find_by_linked_account(
            &self,
            account_id: &str,
        ) -> Result<Option<Member>, MemberRepoError> {
            Ok(self
                .members
                .lock()
                .expect("lock poisoned")
                .values()
                .find(|m| m.linked_account_id.as_deref() == Some(account_id))
                .cloned())
        }
    }
}
