//! User account repository implementation.

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use cairn_core::{new_v7, CreateUserRequest, Error, Result, User, UserRepository};

/// PostgreSQL implementation of the user repository.
///
/// Passwords are stored as `salt$digest` where the digest is the SHA-256 of
/// the salt concatenated with the password, hex-encoded.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Generate a random alphanumeric salt.
    fn generate_salt() -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..16)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    fn digest(salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Hash a password with a fresh salt, producing `salt$digest`.
    fn hash_password(password: &str) -> String {
        let salt = Self::generate_salt();
        let digest = Self::digest(&salt, password);
        format!("{}${}", salt, digest)
    }

    /// Verify a password against a stored `salt$digest` hash.
    fn verify_password(password: &str, stored: &str) -> bool {
        match stored.split_once('$') {
            Some((salt, digest)) => Self::digest(salt, password) == digest,
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, req: CreateUserRequest) -> Result<User> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM app_user WHERE LOWER(email) = LOWER($1))")
                .bind(&req.email)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            return Err(Error::InvalidInput(
                "A user with this email already exists.".to_string(),
            ));
        }

        let id = new_v7();
        let password_hash = Self::hash_password(&req.password);

        let row = sqlx::query(
            r#"INSERT INTO app_user (id, email, full_name, password_hash)
               VALUES ($1, $2, $3, $4)
               RETURNING id, email, full_name, password_hash, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&req.email)
        .bind(&req.full_name)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user_from_row(&row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"SELECT id, email, full_name, password_hash, created_at, updated_at
               FROM app_user WHERE LOWER(email) = LOWER($1)"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| user_from_row(&r)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"SELECT id, email, full_name, password_hash, created_at, updated_at
               FROM app_user WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| user_from_row(&r)))
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let user = self.find_by_email(email).await?;

        Ok(user.filter(|u| Self::verify_password(password, &u.password_hash)))
    }
}

/// Convert a database row to a User.
fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
