//! SQLite repository for CRUD operations.
//!
//! Uses prepared statements; string lists are stored as JSON text columns.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Availability, Conversation, ConversationSummary, CreateProfileRequest, CreateRatingRequest,
    CreateSkillRequest, CreateSwapRequest, Message, NewNotification, Notification, NotificationKind,
    Profile, Rating, Skill, SkillWithStats, SwapRequest, SwapStatus, UpdateProfileRequest,
    participant_pair,
};

/// Durable repository backed by SQLite.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

const PROFILE_COLUMNS: &str = "id, name, email, location, bio, avatar, skills_offered, skills_wanted, rating, availability, is_public, is_online, last_seen, completed_swaps, badges, joined_date, active";
const SWAP_COLUMNS: &str = "id, requester_id, provider_id, offered_skill, requested_skill, status, message, proposed_schedule, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, recipient_id, content, timestamp, is_read";
const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, description, timestamp, is_read, ref_user_id";

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== PROFILE OPERATIONS ====================

    /// List all profiles, including deactivated ones; callers filter.
    pub async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM profiles ORDER BY name",
            PROFILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(profile_from_row).collect())
    }

    pub async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM profiles WHERE id = ?",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    pub async fn create_profile(
        &self,
        request: &CreateProfileRequest,
    ) -> Result<Profile, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let offered_json = serde_json::to_string(&request.skills_offered).unwrap_or_default();
        let wanted_json = serde_json::to_string(&request.skills_wanted).unwrap_or_default();

        sqlx::query(
            "INSERT INTO profiles (id, name, email, location, bio, avatar, skills_offered, skills_wanted, rating, availability, is_public, is_online, last_seen, completed_swaps, badges, joined_date, active) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, 0, ?, 0, '[]', ?, 1)",
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.location.as_deref().unwrap_or_default())
        .bind(&request.bio)
        .bind(&request.avatar)
        .bind(&offered_json)
        .bind(&wanted_json)
        .bind(request.availability.as_str())
        .bind(request.is_public as i32)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Profile {
            id,
            name: request.name.clone(),
            email: request.email.clone(),
            location: request.location.clone().unwrap_or_default(),
            bio: request.bio.clone(),
            avatar: request.avatar.clone(),
            skills_offered: request.skills_offered.clone(),
            skills_wanted: request.skills_wanted.clone(),
            rating: 0.0,
            availability: request.availability,
            is_public: request.is_public,
            is_online: false,
            last_seen: now.clone(),
            completed_swaps: 0,
            badges: Vec::new(),
            joined_date: now,
            active: true,
            match_score: None,
        })
    }

    pub async fn update_profile(
        &self,
        id: &str,
        request: &UpdateProfileRequest,
    ) -> Result<Profile, AppError> {
        let existing = self
            .get_profile(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", id)))?;

        let name = request.name.clone().unwrap_or(existing.name);
        let email = request.email.clone().or(existing.email);
        let location = request.location.clone().unwrap_or(existing.location);
        let bio = request.bio.clone().or(existing.bio);
        let avatar = request.avatar.clone().or(existing.avatar);
        let skills_offered = request
            .skills_offered
            .clone()
            .unwrap_or(existing.skills_offered);
        let skills_wanted = request
            .skills_wanted
            .clone()
            .unwrap_or(existing.skills_wanted);
        let availability = request.availability.unwrap_or(existing.availability);
        let is_public = request.is_public.unwrap_or(existing.is_public);
        let badges = request.badges.clone().unwrap_or(existing.badges);

        let offered_json = serde_json::to_string(&skills_offered).unwrap_or_default();
        let wanted_json = serde_json::to_string(&skills_wanted).unwrap_or_default();
        let badges_json = serde_json::to_string(&badges).unwrap_or_default();

        sqlx::query(
            "UPDATE profiles SET name = ?, email = ?, location = ?, bio = ?, avatar = ?, skills_offered = ?, skills_wanted = ?, availability = ?, is_public = ?, badges = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&email)
        .bind(&location)
        .bind(&bio)
        .bind(&avatar)
        .bind(&offered_json)
        .bind(&wanted_json)
        .bind(availability.as_str())
        .bind(is_public as i32)
        .bind(&badges_json)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Profile {
            id: id.to_string(),
            name,
            email,
            location,
            bio,
            avatar,
            skills_offered,
            skills_wanted,
            rating: existing.rating,
            availability,
            is_public,
            is_online: existing.is_online,
            last_seen: existing.last_seen,
            completed_swaps: existing.completed_swaps,
            badges,
            joined_date: existing.joined_date,
            active: existing.active,
            match_score: None,
        })
    }

    pub async fn deactivate_profile(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE profiles SET active = 0, is_public = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Profile {} not found", id)));
        }
        Ok(())
    }

    pub async fn set_presence(
        &self,
        id: &str,
        online: bool,
        last_seen: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE profiles SET is_online = ?, last_seen = ? WHERE id = ?")
            .bind(online as i32)
            .bind(last_seen)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== SKILL OPERATIONS ====================

    pub async fn list_skills(
        &self,
        query: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<Skill>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, category, description, created_at FROM skills \
             WHERE (? IS NULL OR name LIKE '%' || ? || '%') \
             AND (? IS NULL OR category = ?) \
             ORDER BY name",
        )
        .bind(query)
        .bind(query)
        .bind(category)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(skill_from_row).collect())
    }

    pub async fn create_skill(&self, request: &CreateSkillRequest) -> Result<Skill, AppError> {
        let existing = sqlx::query("SELECT id FROM skills WHERE name = ?")
            .bind(&request.name)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "Skill {} already exists",
                request.name
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO skills (id, name, category, description, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.category)
        .bind(&request.description)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Skill {
            id,
            name: request.name.clone(),
            category: request.category.clone(),
            description: request.description.clone(),
            created_at: now,
        })
    }

    pub async fn skill_categories(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT DISTINCT category FROM skills ORDER BY category")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("category")).collect())
    }

    /// Popularity is the number of active profiles currently offering the skill.
    pub async fn popular_skills(&self, limit: usize) -> Result<Vec<SkillWithStats>, AppError> {
        let skills = self.list_skills(None, None).await?;
        let profiles = self.list_profiles().await?;

        let mut ranked: Vec<SkillWithStats> = skills
            .into_iter()
            .map(|skill| {
                let offered_count = profiles
                    .iter()
                    .filter(|p| p.active && p.skills_offered.contains(&skill.name))
                    .count();
                SkillWithStats {
                    skill,
                    offered_count,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.offered_count.cmp(&a.offered_count));
        ranked.truncate(limit);
        Ok(ranked)
    }

    // ==================== SWAP OPERATIONS ====================

    pub async fn create_swap(&self, request: &CreateSwapRequest) -> Result<SwapRequest, AppError> {
        if self.get_profile(&request.requester_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Profile {} not found",
                request.requester_id
            )));
        }
        if self.get_profile(&request.provider_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Profile {} not found",
                request.provider_id
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let schedule_json = request
            .proposed_schedule
            .as_ref()
            .map(|s| s.to_string());

        sqlx::query(
            "INSERT INTO swap_requests (id, requester_id, provider_id, offered_skill, requested_skill, status, message, proposed_schedule, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.requester_id)
        .bind(&request.provider_id)
        .bind(&request.offered_skill)
        .bind(&request.requested_skill)
        .bind(&request.message)
        .bind(&schedule_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(SwapRequest {
            id,
            requester_id: request.requester_id.clone(),
            provider_id: request.provider_id.clone(),
            offered_skill: request.offered_skill.clone(),
            requested_skill: request.requested_skill.clone(),
            status: SwapStatus::Pending,
            message: request.message.clone(),
            proposed_schedule: request.proposed_schedule.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn get_swap(&self, id: &str) -> Result<Option<SwapRequest>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM swap_requests WHERE id = ?",
            SWAP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(swap_from_row))
    }

    pub async fn list_swaps_for_user(&self, user_id: &str) -> Result<Vec<SwapRequest>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM swap_requests WHERE requester_id = ? OR provider_id = ? ORDER BY created_at DESC",
            SWAP_COLUMNS
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(swap_from_row).collect())
    }

    pub async fn transition_swap(
        &self,
        id: &str,
        next: SwapStatus,
        actor: &str,
    ) -> Result<SwapRequest, AppError> {
        let mut swap = self
            .get_swap(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Swap request {} not found", id)))?;

        if !swap.actor_may(actor, next) {
            return Err(AppError::Forbidden(format!(
                "User {} may not move swap request {} to {}",
                actor,
                id,
                next.as_str()
            )));
        }
        if !swap.status.can_transition(next) {
            return Err(AppError::Conflict(format!(
                "Illegal transition {} -> {}",
                swap.status.as_str(),
                next.as_str()
            )));
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE swap_requests SET status = ?, updated_at = ? WHERE id = ?")
            .bind(next.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if next == SwapStatus::Completed {
            sqlx::query(
                "UPDATE profiles SET completed_swaps = completed_swaps + 1 WHERE id IN (?, ?)",
            )
            .bind(&swap.requester_id)
            .bind(&swap.provider_id)
            .execute(&self.pool)
            .await?;
        }

        swap.status = next;
        swap.updated_at = now;
        Ok(swap)
    }

    pub async fn delete_swap(&self, id: &str, actor: &str) -> Result<(), AppError> {
        let swap = self
            .get_swap(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Swap request {} not found", id)))?;

        // Only the original requester may delete their request.
        if swap.requester_id != actor {
            return Err(AppError::Forbidden(format!(
                "User {} may not delete swap request {}",
                actor, id
            )));
        }

        sqlx::query("DELETE FROM swap_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== MESSAGE OPERATIONS ====================

    pub async fn send_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
        timestamp: &str,
    ) -> Result<(Message, Conversation), AppError> {
        let (user_a, user_b) = participant_pair(sender_id, recipient_id);

        let existing = sqlx::query(
            "SELECT id, user_a, user_b, last_message, last_message_time, created_at FROM conversations WHERE user_a = ? AND user_b = ?",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        let mut conversation = match existing {
            Some(row) => conversation_from_row(&row),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                let now = Utc::now().to_rfc3339();
                sqlx::query(
                    "INSERT INTO conversations (id, user_a, user_b, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(user_a)
                .bind(user_b)
                .bind(&now)
                .execute(&self.pool)
                .await?;
                Conversation {
                    id,
                    user_a: user_a.to_string(),
                    user_b: user_b.to_string(),
                    last_message: None,
                    last_message_time: None,
                    created_at: now,
                }
            }
        };

        let message_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(&format!(
            "INSERT INTO messages ({}) VALUES (?, ?, ?, ?, ?, ?, 0)",
            MESSAGE_COLUMNS
        ))
        .bind(&message_id)
        .bind(&conversation.id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE conversations SET last_message = ?, last_message_time = ? WHERE id = ?")
            .bind(content)
            .bind(timestamp)
            .bind(&conversation.id)
            .execute(&self.pool)
            .await?;

        conversation.last_message = Some(content.to_string());
        conversation.last_message_time = Some(timestamp.to_string());

        let message = Message {
            id: message_id,
            conversation_id: conversation.id.clone(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            content: content.to_string(),
            timestamp: timestamp.to_string(),
            is_read: false,
        };

        Ok((message, conversation))
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query(
            "SELECT id, user_a, user_b, last_message, last_message_time, created_at FROM conversations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(conversation_from_row))
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_a, user_b, last_message, last_message_time, created_at FROM conversations \
             WHERE user_a = ? OR user_b = ? ORDER BY last_message_time DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::new();
        for row in &rows {
            let conversation = conversation_from_row(row);
            let peer_id = conversation.peer_of(user_id).to_string();
            let peer = self.get_profile(&peer_id).await?;

            let unread_row = sqlx::query(
                "SELECT COUNT(*) AS unread FROM messages WHERE conversation_id = ? AND recipient_id = ? AND is_read = 0",
            )
            .bind(&conversation.id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

            summaries.push(ConversationSummary {
                id: conversation.id,
                peer_name: peer
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| peer_id.clone()),
                peer_online: peer.as_ref().map(|p| p.is_online).unwrap_or(false),
                peer_id,
                last_message: conversation.last_message,
                last_message_time: conversation.last_message_time,
                unread_count: unread_row.get("unread"),
            });
        }

        Ok(summaries)
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY timestamp",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    pub async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        viewer_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE conversation_id = ? AND recipient_id = ? AND is_read = 0",
        )
        .bind(conversation_id)
        .bind(viewer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ==================== RATING OPERATIONS ====================

    pub async fn create_rating(&self, request: &CreateRatingRequest) -> Result<Rating, AppError> {
        let swap = self
            .get_swap(&request.swap_request_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Swap request {} not found",
                    request.swap_request_id
                ))
            })?;

        validate_rating(request, &swap)?;

        let existing = sqlx::query(
            "SELECT id FROM ratings WHERE swap_request_id = ? AND rater_id = ?",
        )
        .bind(&request.swap_request_id)
        .bind(&request.rater_id)
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "Swap request {} already rated by {}",
                request.swap_request_id, request.rater_id
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO ratings (id, swap_request_id, rater_id, rated_id, stars, feedback, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.swap_request_id)
        .bind(&request.rater_id)
        .bind(&request.rated_user_id)
        .bind(request.rating)
        .bind(&request.feedback)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        // Keep the profile's running average in step.
        sqlx::query(
            "UPDATE profiles SET rating = (SELECT AVG(stars) FROM ratings WHERE rated_id = ?) WHERE id = ?",
        )
        .bind(&request.rated_user_id)
        .bind(&request.rated_user_id)
        .execute(&self.pool)
        .await?;

        Ok(Rating {
            id,
            swap_request_id: request.swap_request_id.clone(),
            rater_id: request.rater_id.clone(),
            rated_id: request.rated_user_id.clone(),
            stars: request.rating,
            feedback: request.feedback.clone(),
            created_at: now,
        })
    }

    pub async fn list_ratings_for_user(&self, user_id: &str) -> Result<Vec<Rating>, AppError> {
        let rows = sqlx::query(
            "SELECT id, swap_request_id, rater_id, rated_id, stars, feedback, created_at FROM ratings WHERE rated_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(rating_from_row).collect())
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    pub async fn create_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Notification, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(&format!(
            "INSERT INTO notifications ({}) VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
            NOTIFICATION_COLUMNS
        ))
        .bind(&id)
        .bind(&new.user_id)
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(&new.description)
        .bind(&now)
        .bind(&new.ref_user_id)
        .execute(&self.pool)
        .await?;

        Ok(Notification {
            id,
            user_id: new.user_id.clone(),
            kind: new.kind,
            title: new.title.clone(),
            description: new.description.clone(),
            timestamp: now,
            is_read: false,
            ref_user_id: new.ref_user_id.clone(),
        })
    }

    pub async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE user_id = ? ORDER BY timestamp DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(notification_from_row).collect())
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<Notification, AppError> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification_from_row(&row))
    }

    pub async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_notification(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }
}

/// Shared rating preconditions: the swap must be completed and both parties
/// must be its participants, on opposite sides.
pub(super) fn validate_rating(
    request: &CreateRatingRequest,
    swap: &SwapRequest,
) -> Result<(), AppError> {
    if swap.status != SwapStatus::Completed {
        return Err(AppError::Conflict(
            "Only completed swaps can be rated".to_string(),
        ));
    }
    if !swap.involves(&request.rater_id) || !swap.involves(&request.rated_user_id) {
        return Err(AppError::Forbidden(
            "Only swap participants can rate each other".to_string(),
        ));
    }
    if request.rater_id == request.rated_user_id {
        return Err(AppError::Validation("Users cannot rate themselves".to_string()));
    }
    Ok(())
}

// Helper functions for row conversion

fn profile_from_row(row: &sqlx::sqlite::SqliteRow) -> Profile {
    let is_public: i32 = row.get("is_public");
    let is_online: i32 = row.get("is_online");
    let active: i32 = row.get("active");
    let offered_str: String = row.get("skills_offered");
    let wanted_str: String = row.get("skills_wanted");
    let badges_str: String = row.get("badges");
    let availability_str: String = row.get("availability");

    Profile {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        location: row.get("location"),
        bio: row.get("bio"),
        avatar: row.get("avatar"),
        skills_offered: parse_json_array(&offered_str),
        skills_wanted: parse_json_array(&wanted_str),
        rating: row.get("rating"),
        availability: Availability::from_str(&availability_str).unwrap_or(Availability::Flexible),
        is_public: is_public != 0,
        is_online: is_online != 0,
        last_seen: row.get("last_seen"),
        completed_swaps: row.get("completed_swaps"),
        badges: parse_json_array(&badges_str),
        joined_date: row.get("joined_date"),
        active: active != 0,
        match_score: None,
    }
}

fn skill_from_row(row: &sqlx::sqlite::SqliteRow) -> Skill {
    Skill {
        id: row.get("id"),
        name: row.get("name"),
        category: row.get("category"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

fn swap_from_row(row: &sqlx::sqlite::SqliteRow) -> SwapRequest {
    let status_str: String = row.get("status");
    let schedule_str: Option<String> = row.get("proposed_schedule");

    SwapRequest {
        id: row.get("id"),
        requester_id: row.get("requester_id"),
        provider_id: row.get("provider_id"),
        offered_skill: row.get("offered_skill"),
        requested_skill: row.get("requested_skill"),
        status: SwapStatus::from_str(&status_str).unwrap_or(SwapStatus::Pending),
        message: row.get("message"),
        proposed_schedule: schedule_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn conversation_from_row(row: &sqlx::sqlite::SqliteRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        user_a: row.get("user_a"),
        user_b: row.get("user_b"),
        last_message: row.get("last_message"),
        last_message_time: row.get("last_message_time"),
        created_at: row.get("created_at"),
    }
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> Message {
    let is_read: i32 = row.get("is_read");
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        content: row.get("content"),
        timestamp: row.get("timestamp"),
        is_read: is_read != 0,
    }
}

fn rating_from_row(row: &sqlx::sqlite::SqliteRow) -> Rating {
    Rating {
        id: row.get("id"),
        swap_request_id: row.get("swap_request_id"),
        rater_id: row.get("rater_id"),
        rated_id: row.get("rated_id"),
        stars: row.get("stars"),
        feedback: row.get("feedback"),
        created_at: row.get("created_at"),
    }
}

fn notification_from_row(row: &sqlx::sqlite::SqliteRow) -> Notification {
    let is_read: i32 = row.get("is_read");
    let kind_str: String = row.get("kind");
    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: NotificationKind::from_str(&kind_str).unwrap_or(NotificationKind::System),
        title: row.get("title"),
        description: row.get("description"),
        timestamp: row.get("timestamp"),
        is_read: is_read != 0,
        ref_user_id: row.get("ref_user_id"),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
