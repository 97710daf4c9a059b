//! Persistence module.
//!
//! One repository surface, two interchangeable implementations: a durable
//! SQLite store and an in-memory mock, selected by configuration. Handlers
//! only ever see [`Repository`].

mod memory;
mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{
    Conversation, ConversationSummary, CreateProfileRequest, CreateRatingRequest,
    CreateSkillRequest, CreateSwapRequest, Message, NewNotification, Notification, Profile,
    Rating, Skill, SkillWithStats, SwapRequest, SwapStatus, UpdateProfileRequest,
};

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            location TEXT NOT NULL DEFAULT '',
            bio TEXT,
            avatar TEXT,
            skills_offered TEXT NOT NULL DEFAULT '[]',
            skills_wanted TEXT NOT NULL DEFAULT '[]',
            rating REAL NOT NULL DEFAULT 0,
            availability TEXT NOT NULL DEFAULT 'flexible',
            is_public INTEGER NOT NULL DEFAULT 1,
            is_online INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT NOT NULL,
            completed_swaps INTEGER NOT NULL DEFAULT 0,
            badges TEXT NOT NULL DEFAULT '[]',
            joined_date TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS skills (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            category TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS swap_requests (
            id TEXT PRIMARY KEY,
            requester_id TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            offered_skill TEXT NOT NULL,
            requested_skill TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            message TEXT,
            proposed_schedule TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_a TEXT NOT NULL,
            user_b TEXT NOT NULL,
            last_message TEXT,
            last_message_time TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(user_a, user_b)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            sender_id TEXT NOT NULL,
            recipient_id TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ratings (
            id TEXT PRIMARY KEY,
            swap_request_id TEXT NOT NULL,
            rater_id TEXT NOT NULL,
            rated_id TEXT NOT NULL,
            stars INTEGER NOT NULL,
            feedback TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(swap_request_id, rater_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            ref_user_id TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_profiles_name ON profiles(name);
        CREATE INDEX IF NOT EXISTS idx_profiles_active ON profiles(active);
        CREATE INDEX IF NOT EXISTS idx_swaps_requester ON swap_requests(requester_id);
        CREATE INDEX IF NOT EXISTS idx_swaps_provider ON swap_requests(provider_id);
        CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
        CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient_id, is_read);
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id);
        CREATE INDEX IF NOT EXISTS idx_ratings_rated ON ratings(rated_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Repository front, dispatching to the configured implementation.
pub enum Repository {
    Sqlite(SqliteRepository),
    Memory(MemoryRepository),
}

macro_rules! dispatch {
    ($self:ident, $repo:ident => $call:expr) => {
        match $self {
            Repository::Sqlite($repo) => $call.await,
            Repository::Memory($repo) => $call.await,
        }
    };
}

impl Repository {
    // ==================== PROFILE OPERATIONS ====================

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        dispatch!(self, repo => repo.list_profiles())
    }

    pub async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        dispatch!(self, repo => repo.get_profile(id))
    }

    pub async fn create_profile(
        &self,
        request: &CreateProfileRequest,
    ) -> Result<Profile, AppError> {
        dispatch!(self, repo => repo.create_profile(request))
    }

    pub async fn update_profile(
        &self,
        id: &str,
        request: &UpdateProfileRequest,
    ) -> Result<Profile, AppError> {
        dispatch!(self, repo => repo.update_profile(id, request))
    }

    pub async fn deactivate_profile(&self, id: &str) -> Result<(), AppError> {
        dispatch!(self, repo => repo.deactivate_profile(id))
    }

    pub async fn set_presence(
        &self,
        id: &str,
        online: bool,
        last_seen: &str,
    ) -> Result<(), AppError> {
        dispatch!(self, repo => repo.set_presence(id, online, last_seen))
    }

    // ==================== SKILL OPERATIONS ====================

    pub async fn list_skills(
        &self,
        query: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<Skill>, AppError> {
        dispatch!(self, repo => repo.list_skills(query, category))
    }

    pub async fn create_skill(&self, request: &CreateSkillRequest) -> Result<Skill, AppError> {
        dispatch!(self, repo => repo.create_skill(request))
    }

    pub async fn skill_categories(&self) -> Result<Vec<String>, AppError> {
        dispatch!(self, repo => repo.skill_categories())
    }

    pub async fn popular_skills(&self, limit: usize) -> Result<Vec<SkillWithStats>, AppError> {
        dispatch!(self, repo => repo.popular_skills(limit))
    }

    // ==================== SWAP OPERATIONS ====================

    pub async fn create_swap(&self, request: &CreateSwapRequest) -> Result<SwapRequest, AppError> {
        dispatch!(self, repo => repo.create_swap(request))
    }

    pub async fn get_swap(&self, id: &str) -> Result<Option<SwapRequest>, AppError> {
        dispatch!(self, repo => repo.get_swap(id))
    }

    pub async fn list_swaps_for_user(&self, user_id: &str) -> Result<Vec<SwapRequest>, AppError> {
        dispatch!(self, repo => repo.list_swaps_for_user(user_id))
    }

    pub async fn transition_swap(
        &self,
        id: &str,
        next: SwapStatus,
        actor: &str,
    ) -> Result<SwapRequest, AppError> {
        dispatch!(self, repo => repo.transition_swap(id, next, actor))
    }

    pub async fn delete_swap(&self, id: &str, actor: &str) -> Result<(), AppError> {
        dispatch!(self, repo => repo.delete_swap(id, actor))
    }

    // ==================== MESSAGE OPERATIONS ====================

    pub async fn send_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
        timestamp: &str,
    ) -> Result<(Message, Conversation), AppError> {
        dispatch!(self, repo => repo.send_message(sender_id, recipient_id, content, timestamp))
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, AppError> {
        dispatch!(self, repo => repo.get_conversation(id))
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        dispatch!(self, repo => repo.list_conversations(user_id))
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
        dispatch!(self, repo => repo.list_messages(conversation_id))
    }

    pub async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        viewer_id: &str,
    ) -> Result<u64, AppError> {
        dispatch!(self, repo => repo.mark_conversation_read(conversation_id, viewer_id))
    }

    // ==================== RATING OPERATIONS ====================

    pub async fn create_rating(&self, request: &CreateRatingRequest) -> Result<Rating, AppError> {
        dispatch!(self, repo => repo.create_rating(request))
    }

    pub async fn list_ratings_for_user(&self, user_id: &str) -> Result<Vec<Rating>, AppError> {
        dispatch!(self, repo => repo.list_ratings_for_user(user_id))
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    pub async fn create_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Notification, AppError> {
        dispatch!(self, repo => repo.create_notification(new))
    }

    pub async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>, AppError> {
        dispatch!(self, repo => repo.list_notifications(user_id))
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<Notification, AppError> {
        dispatch!(self, repo => repo.mark_notification_read(id))
    }

    pub async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, AppError> {
        dispatch!(self, repo => repo.mark_all_notifications_read(user_id))
    }

    pub async fn delete_notification(&self, id: &str) -> Result<(), AppError> {
        dispatch!(self, repo => repo.delete_notification(id))
    }
}
