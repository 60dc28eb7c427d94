//! Member repository for database operations.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::error::StoreError;
use super::models::{Member, NewMember};
use crate::auth::MemberId;

/// Persistence for member accounts.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Look up a member by exact email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Member>, StoreError>;

    /// Look up a member by id.
    async fn find_by_id(&self, id: MemberId) -> Result<Option<Member>, StoreError>;

    /// Insert a new member and return it with its assigned id.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken, even
    /// when a concurrent insert won the race.
    async fn create(&self, member: NewMember) -> Result<Member, StoreError>;

    /// Persist the mutable fields of an existing member.
    async fn save(&self, member: &Member) -> Result<(), StoreError>;
}

const MEMBER_COLUMNS: &str = "id, name, email, phone_number, company_name, position, \
     password_hash, profile_image_url, created_at, updated_at";

/// SQLite-backed member store.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    /// Create a new member repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberStore for MemberRepository {
    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
        let member = sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members WHERE email = ?",
            MEMBER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: MemberId) -> Result<Option<Member>, StoreError> {
        let member = sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members WHERE id = ?",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    #[instrument(skip(self, member), fields(email = %member.email))]
    async fn create(&self, member: NewMember) -> Result<Member, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO members (name, email, phone_number, company_name, position, password_hash)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.phone_number)
        .bind(&member.company_name)
        .bind(&member.position)
        .bind(&member.password_hash)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_write)?;

        let id = MemberId(result.last_insert_rowid());
        debug!(member_id = %id, "inserted member");

        self.find_by_id(id).await?.ok_or(StoreError::NotFound(id))
    }

    #[instrument(skip(self, member), fields(member_id = %member.id))]
    async fn save(&self, member: &Member) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE members
            SET name = ?, phone_number = ?, company_name = ?, position = ?,
                password_hash = ?, profile_image_url = ?, updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(&member.name)
        .bind(&member.phone_number)
        .bind(&member.company_name)
        .bind(&member.position)
        .bind(&member.password_hash)
        .bind(&member.profile_image_url)
        .bind(member.id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(member.id));
        }

        Ok(())
    }
}
