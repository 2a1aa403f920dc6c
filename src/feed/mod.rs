//! Feed Query Service: read-only projections over posts, users and
//! comments. Handlers pass the viewer (if any) so items carry the
//! viewer's like/save/follow state; nothing here mutates the store.

use std::sync::Arc;

use crate::models::*;
use crate::store::{Store, StoreResult};

pub struct FeedService {
    store: Arc<Store>,
}

impl FeedService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Paginated feed, newest first, optionally filtered by a
    /// case-insensitive substring match on the body. An empty store is an
    /// empty page, not an error.
    pub fn list_posts(
        &self,
        page: i64,
        page_size: i64,
        search: Option<&str>,
        viewer: Option<&str>,
    ) -> StoreResult<FeedPage<PostView>> {
        let (limit, skip) = page_window(page, page_size);

        let posts = self.store.list_posts(search, limit, skip)?;
        let total = self.store.count_posts(search)?;
        let has_more = total > skip + posts.len() as i64;

        let mut items = Vec::with_capacity(posts.len());
        for post in &posts {
            items.push(self.project_post(post, viewer)?);
        }

        Ok(FeedPage { items, has_more })
    }

    pub fn get_post(&self, id: &str, viewer: Option<&str>) -> StoreResult<PostView> {
        let post = self.store.get_post(id)?;
        self.project_post(&post, viewer)
    }

    /// Profile feed: one user's posts, newest first.
    pub fn list_user_posts(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
        viewer: Option<&str>,
    ) -> StoreResult<FeedPage<PostView>> {
        let (limit, skip) = page_window(page, page_size);

        let posts = self.store.list_posts_by_user(user_id, limit, skip)?;
        let total = self.store.count_posts_by_user(user_id)?;
        let has_more = total > skip + posts.len() as i64;

        let mut items = Vec::with_capacity(posts.len());
        for post in &posts {
            items.push(self.project_post(post, viewer)?);
        }

        Ok(FeedPage { items, has_more })
    }

    /// Posts the viewer has saved, most recently saved first.
    pub fn list_saved_posts(&self, viewer: &str) -> StoreResult<Vec<PostView>> {
        let posts = self.store.list_saved_posts(viewer)?;
        let mut items = Vec::with_capacity(posts.len());
        for post in &posts {
            items.push(self.project_post(post, Some(viewer))?);
        }
        Ok(items)
    }

    /// Comments of a post in creation order, with author snippet and the
    /// viewer's like state.
    pub fn list_comments(&self, post_id: &str, viewer: Option<&str>) -> StoreResult<Vec<CommentView>> {
        // Existence check so a deleted post reads as missing, not empty.
        self.store.get_post(post_id)?;

        let comments = self.store.list_comments_for_post(post_id)?;
        let mut items = Vec::with_capacity(comments.len());
        for comment in &comments {
            let author = self.store.get_user(&comment.user_id)?;
            let has_liked = match viewer {
                Some(v) => self.store.has_liked_comment(&comment.id, v)?,
                None => false,
            };
            items.push(CommentView {
                id: comment.id.clone(),
                post_id: comment.post_id.clone(),
                body: comment.body.clone(),
                user: UserSnippet::from(&author),
                likes: self.store.count_comment_likes(&comment.id)?,
                has_liked,
                image_data: comment.image_data.clone(),
                emotion: comment.emotion,
                is_emotion_reaction: comment.is_emotion_reaction,
                created_at: comment.created_at,
            });
        }
        Ok(items)
    }

    /// Paginated user directory, optionally filtered on name/username/email.
    pub fn list_users(
        &self,
        page: i64,
        page_size: i64,
        search: Option<&str>,
        viewer: Option<&str>,
    ) -> StoreResult<FeedPage<UserView>> {
        let (limit, skip) = page_window(page, page_size);

        let users = self.store.list_users(search, limit, skip)?;
        let total = self.store.count_users(search)?;
        let has_more = total > skip + users.len() as i64;

        let mut items = Vec::with_capacity(users.len());
        for user in &users {
            items.push(self.project_user(user, viewer)?);
        }

        Ok(FeedPage { items, has_more })
    }

    pub fn get_user(&self, id: &str, viewer: Option<&str>) -> StoreResult<UserView> {
        let user = self.store.get_user(id)?;
        self.project_user(&user, viewer)
    }

    fn project_post(&self, post: &Post, viewer: Option<&str>) -> StoreResult<PostView> {
        let author = self.store.get_user(&post.user_id)?;
        let (has_liked, has_saved) = match viewer {
            Some(v) => (
                self.store.has_liked_post(&post.id, v)?,
                self.store.has_saved_post(&post.id, v)?,
            ),
            None => (false, false),
        };

        Ok(PostView {
            id: post.id.clone(),
            body: post.body.clone(),
            media_url: post.media_url.clone(),
            media_type: post.media_type,
            user: UserSnippet::from(&author),
            likes: self.store.count_post_likes(&post.id)?,
            comments: self.store.count_comments_for_post(&post.id)?,
            has_liked,
            has_saved,
            created_at: post.created_at,
            updated_at: post.updated_at,
        })
    }

    fn project_user(&self, user: &User, viewer: Option<&str>) -> StoreResult<UserView> {
        let is_following = match viewer {
            Some(v) => self.store.is_following(v, &user.id)?,
            None => false,
        };

        Ok(UserView {
            id: user.id.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            location: user.location.clone(),
            profile_image: user.profile_image.clone(),
            cover_image: user.cover_image.clone(),
            followers: self.store.count_followers(&user.id)?,
            following: self.store.count_following(&user.id)?,
            is_following,
            created_at: user.created_at,
        })
    }
}

/// skip = (page-1)*page_size, clamped to sane bounds.
fn page_window(page: i64, page_size: i64) -> (i64, i64) {
    let page = page.max(1);
    let limit = page_size.clamp(1, 100);
    (limit, (page - 1) * limit)
}
