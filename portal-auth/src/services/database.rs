//! PostgreSQL implementation of the token store and user directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{UserAccount, UserStatus, VerificationRecord};
use crate::services::{ServiceError, UserDirectory, VerificationStore};
use crate::utils::PasswordHashString;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }
}

/// Escape LIKE metacharacters so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// ==================== Verification Tokens ====================

#[async_trait]
impl VerificationStore for Database {
    async fn replace(&self, record: &VerificationRecord) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent issuers for the same identifier until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&record.identifier)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM verification_tokens WHERE identifier = $1")
            .bind(&record.identifier)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO verification_tokens (identifier, token, expires)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&record.identifier)
        .bind(&record.token)
        .bind(record.expires)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, record: &VerificationRecord) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (identifier, token, expires)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&record.identifier)
        .bind(&record.token)
        .bind(record.expires)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_live_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError> {
        let record = sqlx::query_as::<_, VerificationRecord>(
            r#"
            SELECT identifier, token, expires FROM verification_tokens
            WHERE token = $1 AND expires > $2
            LIMIT 1
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_live(
        &self,
        identifier: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError> {
        let record = sqlx::query_as::<_, VerificationRecord>(
            r#"
            SELECT identifier, token, expires FROM verification_tokens
            WHERE identifier = $1 AND token = $2 AND expires > $3
            "#,
        )
        .bind(identifier)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_live_by_token_and_prefix(
        &self,
        token: &str,
        identifier_prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationRecord>, ServiceError> {
        let record = sqlx::query_as::<_, VerificationRecord>(
            r#"
            SELECT identifier, token, expires FROM verification_tokens
            WHERE token = $1 AND identifier LIKE $2 ESCAPE '\' AND expires > $3
            LIMIT 1
            "#,
        )
        .bind(token)
        .bind(like_prefix(identifier_prefix))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete(&self, identifier: &str, token: &str) -> Result<bool, ServiceError> {
        let result =
            sqlx::query("DELETE FROM verification_tokens WHERE identifier = $1 AND token = $2")
                .bind(identifier)
                .bind(token)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE expires < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.ping().await
    }
}

// ==================== Users ====================

#[async_trait]
impl UserDirectory for Database {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, ServiceError> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, email, name, email_verified, status, password_hash, created_at, updated_at
            FROM users WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn mark_email_verified(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE users SET email_verified = $2, status = $3, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(at)
        .bind(UserStatus::Active.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &PasswordHashString,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash.as_str())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.ping().await
    }
}
