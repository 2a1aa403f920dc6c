//! Interaction Coordinator: every mutation of the social graph goes
//! through here as a compound operation - authorization check, existence
//! check, primary mutation, then a best-effort notification side effect.
//! The side effect is never rolled back and never fails the request; a
//! crash between steps leaves a partial effect, which is accepted.

use std::sync::Arc;
use thiserror::Error;

use crate::auth::{AuthUser, Context};
use crate::emotion::{reaction_body, Emotion, EmotionClassifier};
use crate::models::*;
use crate::store::{Store, StoreError};

/// Tagged per-operation failure, mapped onto HTTP statuses at the edge.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("You must be logged in to do that")]
    Unauthenticated,
    #[error("You do not have permission to do that")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("You have already liked this")]
    AlreadyLiked,
    #[error("You have not liked this")]
    NotLiked,
    #[error("You have already saved this post")]
    AlreadySaved,
    #[error("You have not saved this post")]
    NotSaved,
    #[error("You are already following this user")]
    AlreadyFollowing,
    #[error("You are not following this user")]
    NotFollowing,
    #[error("Email is already taken")]
    DuplicateEmail,
    #[error("Username is already taken")]
    DuplicateUsername,
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ActionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ActionError::NotFound(what),
            other => ActionError::Store(other),
        }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

/// Input to comment creation: free text, or a captured frame for an
/// emotion reaction.
#[derive(Debug)]
pub enum CommentInput {
    Text(String),
    Reaction { image_data: String },
}

pub struct InteractionService {
    store: Arc<Store>,
    classifier: Arc<dyn EmotionClassifier>,
}

impl InteractionService {
    pub fn new(store: Arc<Store>, classifier: Arc<dyn EmotionClassifier>) -> Self {
        Self { store, classifier }
    }

    // ==================== Posts ====================

    pub fn create_post(
        &self,
        ctx: &Context,
        body: String,
        media_url: Option<String>,
        media_type: Option<MediaType>,
    ) -> ActionResult<Post> {
        let actor = require_auth(ctx)?;

        if body.trim().is_empty() {
            return Err(ActionError::Validation("Post body cannot be empty".to_string()));
        }

        let mut post = Post {
            id: String::new(),
            user_id: actor.user_id.clone(),
            body,
            media_url,
            media_type,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.store.create_post(&mut post)?;
        Ok(post)
    }

    /// Unconditional removal by the owner. Comments and like edges that
    /// pointed at the post are left dangling.
    pub fn delete_post(&self, ctx: &Context, post_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        let post = self.store.get_post(post_id)?;
        if post.user_id != actor.user_id {
            return Err(ActionError::Forbidden);
        }
        self.store.delete_post(post_id)?;
        Ok(())
    }

    // ==================== Like / Save ====================

    pub fn like_post(&self, ctx: &Context, post_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        let post = self.store.get_post(post_id)?;

        if self.store.has_liked_post(post_id, &actor.user_id)? {
            return Err(ActionError::AlreadyLiked);
        }
        self.store.like_post(post_id, &actor.user_id)?;

        self.notify(
            &post.user_id,
            NotificationKind::Like,
            "Someone liked your post!".to_string(),
            Some(post.id.clone()),
        );
        Ok(())
    }

    pub fn unlike_post(&self, ctx: &Context, post_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        self.store.get_post(post_id)?;

        if !self.store.has_liked_post(post_id, &actor.user_id)? {
            return Err(ActionError::NotLiked);
        }
        self.store.unlike_post(post_id, &actor.user_id)?;
        Ok(())
    }

    pub fn save_post(&self, ctx: &Context, post_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        self.store.get_post(post_id)?;

        if self.store.has_saved_post(post_id, &actor.user_id)? {
            return Err(ActionError::AlreadySaved);
        }
        self.store.save_post(post_id, &actor.user_id)?;
        Ok(())
    }

    pub fn unsave_post(&self, ctx: &Context, post_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        self.store.get_post(post_id)?;

        if !self.store.has_saved_post(post_id, &actor.user_id)? {
            return Err(ActionError::NotSaved);
        }
        self.store.unsave_post(post_id, &actor.user_id)?;
        Ok(())
    }

    // ==================== Follow ====================

    pub fn follow_user(&self, ctx: &Context, user_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        if actor.user_id == user_id {
            return Err(ActionError::Validation("You cannot follow yourself".to_string()));
        }
        self.store.get_user(user_id)?;

        if self.store.is_following(&actor.user_id, user_id)? {
            return Err(ActionError::AlreadyFollowing);
        }
        self.store.follow(&actor.user_id, user_id)?;

        self.notify(
            user_id,
            NotificationKind::Follow,
            format!("{} started following you", actor.name),
            None,
        );
        Ok(())
    }

    pub fn unfollow_user(&self, ctx: &Context, user_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        self.store.get_user(user_id)?;

        if !self.store.is_following(&actor.user_id, user_id)? {
            return Err(ActionError::NotFollowing);
        }
        self.store.unfollow(&actor.user_id, user_id)?;
        Ok(())
    }

    // ==================== Comments ====================

    /// Create a text comment or an emotion reaction on a post.
    ///
    /// The reaction path asks the classifier for a label; any failure
    /// there degrades to `neutral` and the request still succeeds.
    pub async fn create_comment(
        &self,
        ctx: &Context,
        post_id: &str,
        input: CommentInput,
    ) -> ActionResult<Comment> {
        let actor = require_auth(ctx)?.clone();
        let post = self.store.get_post(post_id)?;

        let (mut comment, kind, notice) = match input {
            CommentInput::Text(body) => {
                if body.trim().is_empty() {
                    return Err(ActionError::Validation("Comment body cannot be empty".to_string()));
                }
                let comment = Comment {
                    id: String::new(),
                    post_id: post.id.clone(),
                    user_id: actor.user_id.clone(),
                    body,
                    image_data: None,
                    emotion: None,
                    is_emotion_reaction: false,
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                };
                (
                    comment,
                    NotificationKind::Comment,
                    "Someone replied to your post!".to_string(),
                )
            }
            CommentInput::Reaction { image_data } => {
                if image_data.is_empty() {
                    return Err(ActionError::Validation("Reaction image cannot be empty".to_string()));
                }
                let emotion = match self.classifier.classify(&image_data).await {
                    Ok(e) => e,
                    Err(e) => {
                        log::warn!("emotion classification failed, falling back to neutral: {}", e);
                        Emotion::Neutral
                    }
                };
                let comment = Comment {
                    id: String::new(),
                    post_id: post.id.clone(),
                    user_id: actor.user_id.clone(),
                    body: reaction_body(emotion),
                    image_data: Some(image_data),
                    emotion: Some(emotion),
                    is_emotion_reaction: true,
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                };
                (
                    comment,
                    NotificationKind::Reaction,
                    format!("{} shared a reaction to your post!", actor.name),
                )
            }
        };

        self.store.create_comment(&mut comment)?;
        self.notify(&post.user_id, kind, notice, Some(post.id.clone()));
        Ok(comment)
    }

    pub fn like_comment(&self, ctx: &Context, comment_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        let comment = self.store.get_comment(comment_id)?;

        if self.store.has_liked_comment(comment_id, &actor.user_id)? {
            return Err(ActionError::AlreadyLiked);
        }
        self.store.like_comment(comment_id, &actor.user_id)?;

        self.notify(
            &comment.user_id,
            NotificationKind::CommentLike,
            "Someone liked your reply!".to_string(),
            Some(comment.post_id.clone()),
        );
        Ok(())
    }

    pub fn unlike_comment(&self, ctx: &Context, comment_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        self.store.get_comment(comment_id)?;

        if !self.store.has_liked_comment(comment_id, &actor.user_id)? {
            return Err(ActionError::NotLiked);
        }
        self.store.unlike_comment(comment_id, &actor.user_id)?;
        Ok(())
    }

    pub fn delete_comment(&self, ctx: &Context, comment_id: &str) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        let comment = self.store.get_comment(comment_id)?;
        if comment.user_id != actor.user_id {
            return Err(ActionError::Forbidden);
        }
        self.store.delete_comment(comment_id)?;
        Ok(())
    }

    // ==================== Profile ====================

    pub fn update_profile(
        &self,
        ctx: &Context,
        changes: UpdateProfileRequest,
    ) -> ActionResult<User> {
        let actor = require_auth(ctx)?;
        let mut user = self.store.get_user(&actor.user_id)?;

        if let Some(name) = changes.name {
            if name.trim().is_empty() {
                return Err(ActionError::Validation("Name cannot be empty".to_string()));
            }
            user.name = name;
        }
        if let Some(bio) = changes.bio {
            user.bio = bio;
        }
        if let Some(location) = changes.location {
            user.location = location;
        }
        if let Some(profile_image) = changes.profile_image {
            user.profile_image = profile_image;
        }
        if let Some(cover_image) = changes.cover_image {
            user.cover_image = cover_image;
        }

        self.store.update_user(&mut user)?;
        Ok(user)
    }

    // ==================== Notifications ====================

    pub fn list_notifications(&self, ctx: &Context) -> ActionResult<Vec<Notification>> {
        let actor = require_auth(ctx)?;
        Ok(self.store.list_notifications(&actor.user_id)?)
    }

    pub fn clear_notifications(&self, ctx: &Context) -> ActionResult<()> {
        let actor = require_auth(ctx)?;
        self.store.clear_notifications(&actor.user_id)?;
        Ok(())
    }

    /// Best-effort: create the notification and set the recipient's unread
    /// flag. Failures are logged and swallowed - the primary mutation has
    /// already happened and is not rolled back.
    fn notify(&self, recipient: &str, kind: NotificationKind, body: String, link: Option<String>) {
        let mut notification = Notification {
            id: String::new(),
            user_id: recipient.to_string(),
            body,
            link,
            kind,
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.store.create_notification(&mut notification) {
            log::warn!("failed to create {} notification for {}: {}", kind.as_str(), recipient, e);
            return;
        }
        if let Err(e) = self.store.set_has_new_notifications(recipient, true) {
            log::warn!("failed to set unread flag for {}: {}", recipient, e);
        }
    }
}

fn require_auth(ctx: &Context) -> ActionResult<&AuthUser> {
    ctx.current_user.as_ref().ok_or(ActionError::Unauthenticated)
}
