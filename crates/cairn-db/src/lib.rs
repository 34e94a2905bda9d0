//! # cairn-db
//!
//! PostgreSQL database layer for cairn.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for accounts, sessions, notes, and attachments
//! - A durable analysis run queue with event-driven worker wake
//! - Filesystem blob storage for attachment bytes
//!
//! ## Example
//!
//! ```rust,ignore
//! use cairn_db::{Database, CreateNoteRequest, NoteRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/cairn")
//!         .await?
//!         .with_storage_path("/var/cairn/data");
//!
//!     let note = db.notes.insert(user_id, CreateNoteRequest {
//!         title: "Field notes".to_string(),
//!         body: "Hello, world!".to_string(),
//!     }).await?;
//!
//!     println!("Created note: {}", note.id);
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

pub mod analysis_queue;
pub mod attachments;
pub mod file_storage;
pub mod notes;
pub mod pool;
pub mod tokens;
pub mod users;

// Re-export core types
pub use cairn_core::*;

// Re-export repository implementations
pub use analysis_queue::PgAnalysisQueue;
pub use attachments::PgAttachmentRepository;
pub use file_storage::{generate_storage_path, FilesystemBackend, StorageBackend};
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tokens::PgSessionRepository;
pub use users::PgUserRepository;

use cairn_core::defaults::DEFAULT_STORAGE_PATH;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Account repository.
    pub users: PgUserRepository,
    /// Auth session repository.
    pub sessions: PgSessionRepository,
    /// Note repository for CRUD operations.
    pub notes: PgNoteRepository,
    /// Image attachment repository (records + stored bytes).
    pub attachments: PgAttachmentRepository,
    /// Analysis run queue for background processing.
    pub queue: PgAnalysisQueue,
    /// Storage base path, kept so `Clone` can reconstruct the backend.
    storage_path: PathBuf,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    ///
    /// Attachment bytes go under the default storage path; use
    /// [`with_storage_path`](Self::with_storage_path) to relocate them.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        let storage_path = PathBuf::from(DEFAULT_STORAGE_PATH);
        Self {
            users: PgUserRepository::new(pool.clone()),
            sessions: PgSessionRepository::new(pool.clone()),
            notes: PgNoteRepository::new(pool.clone()),
            attachments: PgAttachmentRepository::new(
                pool.clone(),
                FilesystemBackend::new(&storage_path),
            ),
            queue: PgAnalysisQueue::new(pool.clone()),
            storage_path,
            pool,
        }
    }

    /// Rebase attachment byte storage onto the given directory.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self.attachments = PgAttachmentRepository::new(
            self.pool.clone(),
            FilesystemBackend::new(&self.storage_path),
        );
        self
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Storage base path for attachment bytes.
    pub fn storage_path(&self) -> &std::path::Path {
        &self.storage_path
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            users: self.users.clone(),
            sessions: self.sessions.clone(),
            notes: self.notes.clone(),
            // The backend is not cloneable; rebuild it from the kept path.
            attachments: PgAttachmentRepository::new(
                self.pool.clone(),
                FilesystemBackend::new(&self.storage_path),
            ),
            // Share the notify handle so a clone's enqueue still wakes workers.
            queue: PgAnalysisQueue::with_notify(self.pool.clone(), self.queue.run_notify()),
            storage_path: self.storage_path.clone(),
        }
    }
}
