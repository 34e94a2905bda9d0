//! Auth session repository implementation.
//!
//! Tokens are opaque secrets handed to the client once; the database keeps
//! only their SHA-256 digests. Each signin produces one session row carrying
//! both the access and refresh digests, so revoking the session kills both
//! tokens at once.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use cairn_core::defaults::{
    env_i64, ACCESS_TOKEN_LIFETIME_MINUTES, ENV_ACCESS_TOKEN_MINUTES, ENV_REFRESH_TOKEN_DAYS,
    REFRESH_TOKEN_LIFETIME_DAYS, TOKEN_SECRET_LENGTH,
};
use cairn_core::{new_v7, AuthSession, Error, IssuedTokens, Result, SessionRepository};

/// Prefix identifying access tokens at a glance.
const ACCESS_TOKEN_PREFIX: &str = "cn_at_";

/// Prefix identifying refresh tokens.
const REFRESH_TOKEN_PREFIX: &str = "cn_rt_";

/// Retention window for expired session rows before cleanup deletes them.
const SESSION_AUDIT_DAYS: i64 = 30;

/// PostgreSQL implementation of the auth session repository.
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: Pool<Postgres>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl PgSessionRepository {
    /// Create a new PgSessionRepository with lifetimes from the environment
    /// (`ACCESS_TOKEN_MINUTES`, `REFRESH_TOKEN_DAYS`) or their defaults.
    pub fn new(pool: Pool<Postgres>) -> Self {
        let access_minutes = env_i64(ENV_ACCESS_TOKEN_MINUTES, ACCESS_TOKEN_LIFETIME_MINUTES);
        let refresh_days = env_i64(ENV_REFRESH_TOKEN_DAYS, REFRESH_TOKEN_LIFETIME_DAYS);
        Self::with_lifetimes(
            pool,
            Duration::minutes(access_minutes),
            Duration::days(refresh_days),
        )
    }

    /// Create a repository with explicit token lifetimes.
    pub fn with_lifetimes(
        pool: Pool<Postgres>,
        access_lifetime: Duration,
        refresh_lifetime: Duration,
    ) -> Self {
        Self {
            pool,
            access_lifetime,
            refresh_lifetime,
        }
    }

    /// Generate a cryptographically secure random string.
    fn generate_secret(length: usize) -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    /// Hash a secret using SHA256.
    fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create_session(&self, user_id: Uuid) -> Result<IssuedTokens> {
        let now = Utc::now();
        let id = new_v7();

        let access_token = format!(
            "{}{}",
            ACCESS_TOKEN_PREFIX,
            Self::generate_secret(TOKEN_SECRET_LENGTH)
        );
        let refresh_token = format!(
            "{}{}",
            REFRESH_TOKEN_PREFIX,
            Self::generate_secret(TOKEN_SECRET_LENGTH)
        );
        let access_expires_at = now + self.access_lifetime;
        let refresh_expires_at = now + self.refresh_lifetime;

        sqlx::query(
            r#"INSERT INTO auth_session (
                id, user_id, access_token_hash, refresh_token_hash,
                access_expires_at, refresh_expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(Self::hash_secret(&access_token))
        .bind(Self::hash_secret(&refresh_token))
        .bind(access_expires_at)
        .bind(refresh_expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    async fn validate_access_token(&self, access_token: &str) -> Result<Option<AuthSession>> {
        let hash = Self::hash_secret(access_token);
        let now = Utc::now();

        let row = sqlx::query(
            r#"SELECT
                id, user_id, access_token_hash, refresh_token_hash,
                access_expires_at, refresh_expires_at,
                revoked, revoked_at, revoked_reason, created_at
            FROM auth_session
            WHERE access_token_hash = $1
              AND revoked = false
              AND access_expires_at > $2"#,
        )
        .bind(&hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| session_from_row(&r)))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<IssuedTokens>> {
        let hash = Self::hash_secret(refresh_token);
        let now = Utc::now();

        // Fetch and rotate in one transaction so a refresh token can only be
        // spent once even under concurrent requests.
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(
            r#"SELECT user_id FROM auth_session
            WHERE refresh_token_hash = $1
              AND revoked = false
              AND refresh_expires_at > $2
            FOR UPDATE"#,
        )
        .bind(&hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(Error::Database)?;
            return Ok(None);
        };
        let user_id: Uuid = row.get("user_id");

        sqlx::query(
            r#"UPDATE auth_session
            SET revoked = true, revoked_at = $1, revoked_reason = 'refreshed'
            WHERE refresh_token_hash = $2"#,
        )
        .bind(now)
        .bind(&hash)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let id = new_v7();
        let access_token = format!(
            "{}{}",
            ACCESS_TOKEN_PREFIX,
            Self::generate_secret(TOKEN_SECRET_LENGTH)
        );
        let refresh_token = format!(
            "{}{}",
            REFRESH_TOKEN_PREFIX,
            Self::generate_secret(TOKEN_SECRET_LENGTH)
        );
        let access_expires_at = now + self.access_lifetime;
        let refresh_expires_at = now + self.refresh_lifetime;

        sqlx::query(
            r#"INSERT INTO auth_session (
                id, user_id, access_token_hash, refresh_token_hash,
                access_expires_at, refresh_expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(Self::hash_secret(&access_token))
        .bind(Self::hash_secret(&refresh_token))
        .bind(access_expires_at)
        .bind(refresh_expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        Ok(Some(IssuedTokens {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        }))
    }

    async fn revoke_by_refresh_token(&self, refresh_token: &str, reason: &str) -> Result<bool> {
        let hash = Self::hash_secret(refresh_token);
        let now = Utc::now();

        let result = sqlx::query(
            r#"UPDATE auth_session
            SET revoked = true, revoked_at = $1, revoked_reason = $2
            WHERE refresh_token_hash = $3
              AND revoked = false
              AND refresh_expires_at > $1"#,
        )
        .bind(now)
        .bind(reason)
        .bind(&hash)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        // Keep expired rows for a while for audit before deleting.
        let cutoff = Utc::now() - Duration::days(SESSION_AUDIT_DAYS);

        let result = sqlx::query(
            r#"DELETE FROM auth_session
            WHERE access_expires_at < $1
              AND refresh_expires_at < $1"#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}

/// Convert a database row to an AuthSession.
fn session_from_row(row: &sqlx::postgres::PgRow) -> AuthSession {
    AuthSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        access_token_hash: row.get("access_token_hash"),
        refresh_token_hash: row.get("refresh_token_hash"),
        access_expires_at: row.get("access_expires_at"),
        refresh_expires_at: row.get("refresh_expires_at"),
        revoked: row.get("revoked"),
        revoked_at: row.get("revoked_at"),
        revoked_reason: row.get("revoked_reason"),
        created_at: row.get("created_at"),
    }
}
