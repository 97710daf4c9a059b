//! In-memory repository.
//!
//! A single injected store with the same semantics as the SQLite
//! implementation, for tests and zero-setup deployments. State lives behind
//! one lock and is only reachable through these methods.

use chrono::Utc;
use tokio::sync::RwLock;

use super::sqlite::validate_rating;
use crate::errors::AppError;
use crate::models::{
    participant_pair, Conversation, ConversationSummary, CreateProfileRequest,
    CreateRatingRequest, CreateSkillRequest, CreateSwapRequest, Message, NewNotification,
    Notification, Profile, Rating, Skill, SkillWithStats, SwapRequest, SwapStatus,
    UpdateProfileRequest,
};

#[derive(Default)]
struct MemoryInner {
    profiles: Vec<Profile>,
    skills: Vec<Skill>,
    swaps: Vec<SwapRequest>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    ratings: Vec<Rating>,
    notifications: Vec<Notification>,
}

/// Mock repository holding everything in process memory.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<MemoryInner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== PROFILE OPERATIONS ====================

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        let inner = self.inner.read().await;
        let mut profiles = inner.profiles.clone();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    pub async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.profiles.iter().find(|p| p.id == id).cloned())
    }

    pub async fn create_profile(
        &self,
        request: &CreateProfileRequest,
    ) -> Result<Profile, AppError> {
        let now = Utc::now().to_rfc3339();
        let profile = Profile {
            id: uuid::Uuid::new_v4().to_string(),
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
        };

        let mut inner = self.inner.write().await;
        inner.profiles.push(profile.clone());
        Ok(profile)
    }

    pub async fn update_profile(
        &self,
        id: &str,
        request: &UpdateProfileRequest,
    ) -> Result<Profile, AppError> {
        let mut inner = self.inner.write().await;
        let profile = inner
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", id)))?;

        if let Some(name) = &request.name {
            profile.name = name.clone();
        }
        if let Some(email) = &request.email {
            profile.email = Some(email.clone());
        }
        if let Some(location) = &request.location {
            profile.location = location.clone();
        }
        if let Some(bio) = &request.bio {
            profile.bio = Some(bio.clone());
        }
        if let Some(avatar) = &request.avatar {
            profile.avatar = Some(avatar.clone());
        }
        if let Some(offered) = &request.skills_offered {
            profile.skills_offered = offered.clone();
        }
        if let Some(wanted) = &request.skills_wanted {
            profile.skills_wanted = wanted.clone();
        }
        if let Some(availability) = request.availability {
            profile.availability = availability;
        }
        if let Some(is_public) = request.is_public {
            profile.is_public = is_public;
        }
        if let Some(badges) = &request.badges {
            profile.badges = badges.clone();
        }

        Ok(profile.clone())
    }

    pub async fn deactivate_profile(&self, id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let profile = inner
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", id)))?;
        profile.active = false;
        profile.is_public = false;
        Ok(())
    }

    pub async fn set_presence(
        &self,
        id: &str,
        online: bool,
        last_seen: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if let Some(profile) = inner.profiles.iter_mut().find(|p| p.id == id) {
            profile.is_online = online;
            profile.last_seen = last_seen.to_string();
        }
        Ok(())
    }

    // ==================== SKILL OPERATIONS ====================

    pub async fn list_skills(
        &self,
        query: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<Skill>, AppError> {
        let inner = self.inner.read().await;
        let needle = query.map(str::to_lowercase);
        let mut skills: Vec<Skill> = inner
            .skills
            .iter()
            .filter(|s| {
                needle
                    .as_deref()
                    .map(|q| s.name.to_lowercase().contains(q))
                    .unwrap_or(true)
            })
            .filter(|s| category.map(|c| s.category == c).unwrap_or(true))
            .cloned()
            .collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }

    pub async fn create_skill(&self, request: &CreateSkillRequest) -> Result<Skill, AppError> {
        let mut inner = self.inner.write().await;
        if inner.skills.iter().any(|s| s.name == request.name) {
            return Err(AppError::Conflict(format!(
                "Skill {} already exists",
                request.name
            )));
        }

        let skill = Skill {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.clone(),
            category: request.category.clone(),
            description: request.description.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        inner.skills.push(skill.clone());
        Ok(skill)
    }

    pub async fn skill_categories(&self) -> Result<Vec<String>, AppError> {
        let inner = self.inner.read().await;
        let mut categories: Vec<String> =
            inner.skills.iter().map(|s| s.category.clone()).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    pub async fn popular_skills(&self, limit: usize) -> Result<Vec<SkillWithStats>, AppError> {
        let inner = self.inner.read().await;
        let mut ranked: Vec<SkillWithStats> = inner
            .skills
            .iter()
            .map(|skill| {
                let offered_count = inner
                    .profiles
                    .iter()
                    .filter(|p| p.active && p.skills_offered.contains(&skill.name))
                    .count();
                SkillWithStats {
                    skill: skill.clone(),
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
        let mut inner = self.inner.write().await;
        for id in [&request.requester_id, &request.provider_id] {
            if !inner.profiles.iter().any(|p| &p.id == id) {
                return Err(AppError::NotFound(format!("Profile {} not found", id)));
            }
        }

        let now = Utc::now().to_rfc3339();
        let swap = SwapRequest {
            id: uuid::Uuid::new_v4().to_string(),
            requester_id: request.requester_id.clone(),
            provider_id: request.provider_id.clone(),
            offered_skill: request.offered_skill.clone(),
            requested_skill: request.requested_skill.clone(),
            status: SwapStatus::Pending,
            message: request.message.clone(),
            proposed_schedule: request.proposed_schedule.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        inner.swaps.push(swap.clone());
        Ok(swap)
    }

    pub async fn get_swap(&self, id: &str) -> Result<Option<SwapRequest>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.swaps.iter().find(|s| s.id == id).cloned())
    }

    pub async fn list_swaps_for_user(&self, user_id: &str) -> Result<Vec<SwapRequest>, AppError> {
        let inner = self.inner.read().await;
        let mut swaps: Vec<SwapRequest> = inner
            .swaps
            .iter()
            .filter(|s| s.involves(user_id))
            .cloned()
            .collect();
        swaps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(swaps)
    }

    pub async fn transition_swap(
        &self,
        id: &str,
        next: SwapStatus,
        actor: &str,
    ) -> Result<SwapRequest, AppError> {
        let mut inner = self.inner.write().await;
        let swap = inner
            .swaps
            .iter()
            .find(|s| s.id == id)
            .cloned()
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
        let stored = inner
            .swaps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Swap request {} not found", id)))?;
        stored.status = next;
        stored.updated_at = now;
        let updated = stored.clone();

        if next == SwapStatus::Completed {
            for profile in inner.profiles.iter_mut() {
                if profile.id == updated.requester_id || profile.id == updated.provider_id {
                    profile.completed_swaps += 1;
                }
            }
        }

        Ok(updated)
    }

    pub async fn delete_swap(&self, id: &str, actor: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let swap = inner
            .swaps
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Swap request {} not found", id)))?;

        if swap.requester_id != actor {
            return Err(AppError::Forbidden(format!(
                "User {} may not delete swap request {}",
                actor, id
            )));
        }

        inner.swaps.retain(|s| s.id != id);
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
        let mut inner = self.inner.write().await;
        let (user_a, user_b) = participant_pair(sender_id, recipient_id);

        let existing_id = inner
            .conversations
            .iter()
            .find(|c| c.user_a == user_a && c.user_b == user_b)
            .map(|c| c.id.clone());
        let conversation_id = match existing_id {
            Some(id) => id,
            None => {
                let conversation = Conversation {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_a: user_a.to_string(),
                    user_b: user_b.to_string(),
                    last_message: None,
                    last_message_time: None,
                    created_at: Utc::now().to_rfc3339(),
                };
                let id = conversation.id.clone();
                inner.conversations.push(conversation);
                id
            }
        };

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            content: content.to_string(),
            timestamp: timestamp.to_string(),
            is_read: false,
        };
        inner.messages.push(message.clone());

        let conversation = inner
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| {
                AppError::Internal(format!("Conversation {} not found", conversation_id))
            })?;
        conversation.last_message = Some(content.to_string());
        conversation.last_message_time = Some(timestamp.to_string());
        let conversation = conversation.clone();

        Ok((message, conversation))
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.conversations.iter().find(|c| c.id == id).cloned())
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<ConversationSummary> = inner
            .conversations
            .iter()
            .filter(|c| c.user_a == user_id || c.user_b == user_id)
            .map(|conversation| {
                let peer_id = conversation.peer_of(user_id).to_string();
                let peer = inner.profiles.iter().find(|p| p.id == peer_id);
                let unread_count = inner
                    .messages
                    .iter()
                    .filter(|m| {
                        m.conversation_id == conversation.id
                            && m.recipient_id == user_id
                            && !m.is_read
                    })
                    .count() as i64;

                ConversationSummary {
                    id: conversation.id.clone(),
                    peer_name: peer
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| peer_id.clone()),
                    peer_online: peer.map(|p| p.is_online).unwrap_or(false),
                    peer_id,
                    last_message: conversation.last_message.clone(),
                    last_message_time: conversation.last_message_time.clone(),
                    unread_count,
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        Ok(summaries)
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, AppError> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(messages)
    }

    pub async fn mark_conversation_read(
        &self,
        conversation_id: &str,
        viewer_id: &str,
    ) -> Result<u64, AppError> {
        let mut inner = self.inner.write().await;
        let mut flipped = 0;
        for message in inner.messages.iter_mut() {
            if message.conversation_id == conversation_id
                && message.recipient_id == viewer_id
                && !message.is_read
            {
                message.is_read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    // ==================== RATING OPERATIONS ====================

    pub async fn create_rating(&self, request: &CreateRatingRequest) -> Result<Rating, AppError> {
        let mut inner = self.inner.write().await;
        let swap = inner
            .swaps
            .iter()
            .find(|s| s.id == request.swap_request_id)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Swap request {} not found",
                    request.swap_request_id
                ))
            })?;

        validate_rating(request, &swap)?;

        if inner
            .ratings
            .iter()
            .any(|r| r.swap_request_id == request.swap_request_id && r.rater_id == request.rater_id)
        {
            return Err(AppError::Conflict(format!(
                "Swap request {} already rated by {}",
                request.swap_request_id, request.rater_id
            )));
        }

        let rating = Rating {
            id: uuid::Uuid::new_v4().to_string(),
            swap_request_id: request.swap_request_id.clone(),
            rater_id: request.rater_id.clone(),
            rated_id: request.rated_user_id.clone(),
            stars: request.rating,
            feedback: request.feedback.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        inner.ratings.push(rating.clone());

        // Keep the profile's running average in step.
        let (sum, count) = inner
            .ratings
            .iter()
            .filter(|r| r.rated_id == request.rated_user_id)
            .fold((0i64, 0i64), |(sum, count), r| (sum + r.stars, count + 1));
        if let Some(profile) = inner
            .profiles
            .iter_mut()
            .find(|p| p.id == request.rated_user_id)
        {
            profile.rating = sum as f64 / count as f64;
        }

        Ok(rating)
    }

    pub async fn list_ratings_for_user(&self, user_id: &str) -> Result<Vec<Rating>, AppError> {
        let inner = self.inner.read().await;
        let mut ratings: Vec<Rating> = inner
            .ratings
            .iter()
            .filter(|r| r.rated_id == user_id)
            .cloned()
            .collect();
        ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(ratings)
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    pub async fn create_notification(
        &self,
        new: &NewNotification,
    ) -> Result<Notification, AppError> {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: new.user_id.clone(),
            kind: new.kind,
            title: new.title.clone(),
            description: new.description.clone(),
            timestamp: Utc::now().to_rfc3339(),
            is_read: false,
            ref_user_id: new.ref_user_id.clone(),
        };

        let mut inner = self.inner.write().await;
        inner.notifications.push(notification.clone());
        Ok(notification)
    }

    pub async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>, AppError> {
        let inner = self.inner.read().await;
        let mut notifications: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(notifications)
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<Notification, AppError> {
        let mut inner = self.inner.write().await;
        let notification = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;
        notification.is_read = true;
        Ok(notification.clone())
    }

    pub async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, AppError> {
        let mut inner = self.inner.write().await;
        let mut flipped = 0;
        for notification in inner.notifications.iter_mut() {
            if notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    pub async fn delete_notification(&self, id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if !inner.notifications.iter().any(|n| n.id == id) {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        inner.notifications.retain(|n| n.id != id);
        Ok(())
    }
}
