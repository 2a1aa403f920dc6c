use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe SQLite store.
///
/// Edge sets (likes, saves, follows) are relations with composite primary
/// keys; "push if absent" is `INSERT OR IGNORE`, so a duplicate push is a
/// no-op at the storage level regardless of what the caller observed.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                bio TEXT DEFAULT '',
                location TEXT DEFAULT '',
                profile_image TEXT DEFAULT '',
                cover_image TEXT DEFAULT '',
                has_new_notifications INTEGER DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                body TEXT NOT NULL,
                media_url TEXT,
                media_type TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                body TEXT NOT NULL,
                image_data TEXT,
                emotion TEXT,
                is_emotion_reaction INTEGER DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (post_id) REFERENCES posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                body TEXT NOT NULL,
                link TEXT,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS post_likes (
                post_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS post_saves (
                post_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (post_id, user_id),
                FOREIGN KEY (post_id) REFERENCES posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS comment_likes (
                comment_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (comment_id, user_id),
                FOREIGN KEY (comment_id) REFERENCES comments(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS follows (
                follower_id TEXT NOT NULL,
                followee_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id),
                FOREIGN KEY (follower_id) REFERENCES users(id),
                FOREIGN KEY (followee_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);
            CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);
            CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);
            CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id);
            CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub fn create_user(&self, user: &mut User) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        user.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;

        conn.execute(
            r#"INSERT INTO users (id, name, username, email, password_hash, bio, location,
                profile_image, cover_image, has_new_notifications, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                &user.id,
                &user.name,
                &user.username,
                &user.email,
                &user.password_hash,
                &user.bio,
                &user.location,
                &user.profile_image,
                &user.cover_image,
                user.has_new_notifications,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> StoreResult<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], |row| {
            row_to_user(row)
        })
        .map_err(|e| not_found(e, format!("User {}", id)))
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![email],
            |row| row_to_user(row),
        )
        .map_err(|e| not_found(e, format!("User {}", email)))
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1",
            params![username],
            |row| row_to_user(row),
        )
        .map_err(|e| not_found(e, format!("User {}", username)))
    }

    /// Update the mutable profile fields of a user.
    pub fn update_user(&self, user: &mut User) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        user.updated_at = Utc::now();

        let rows = conn.execute(
            r#"UPDATE users SET name = ?1, bio = ?2, location = ?3, profile_image = ?4,
               cover_image = ?5, updated_at = ?6 WHERE id = ?7"#,
            params![
                &user.name,
                &user.bio,
                &user.location,
                &user.profile_image,
                &user.cover_image,
                user.updated_at.to_rfc3339(),
                &user.id,
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("User {}", user.id)));
        }
        Ok(())
    }

    pub fn set_has_new_notifications(&self, user_id: &str, value: bool) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE users SET has_new_notifications = ?1 WHERE id = ?2",
            params![value, user_id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// List users newest-first, optionally filtered by a case-insensitive
    /// substring match on name, username or email.
    pub fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut users = Vec::new();

        if let Some(q) = search {
            let pattern = format!("%{}%", q);
            let mut stmt = conn.prepare(
                r#"SELECT * FROM users
                   WHERE name LIKE ?1 OR username LIKE ?1 OR email LIKE ?1
                   ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"#,
            )?;
            let rows = stmt.query_map(params![pattern, limit, offset], |row| row_to_user(row))?;
            for row in rows {
                users.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT * FROM users ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(params![limit, offset], |row| row_to_user(row))?;
            for row in rows {
                users.push(row?);
            }
        }

        Ok(users)
    }

    pub fn count_users(&self, search: Option<&str>) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = if let Some(q) = search {
            let pattern = format!("%{}%", q);
            conn.query_row(
                "SELECT COUNT(*) FROM users WHERE name LIKE ?1 OR username LIKE ?1 OR email LIKE ?1",
                params![pattern],
                |row| row.get(0),
            )?
        } else {
            conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?
        };
        Ok(count)
    }

    // ==================== Follow Operations ====================

    /// Add a follow edge. Returns false if it already existed.
    pub fn follow(&self, follower_id: &str, followee_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)",
            params![follower_id, followee_id, Utc::now().to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    /// Remove a follow edge. Returns false if it did not exist.
    pub fn unfollow(&self, follower_id: &str, followee_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower_id, followee_id],
        )?;
        Ok(rows > 0)
    }

    pub fn is_following(&self, follower_id: &str, followee_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                params![follower_id, followee_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_followers(&self, user_id: &str) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE followee_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_following(&self, user_id: &str) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ==================== Post Operations ====================

    pub fn create_post(&self, post: &mut Post) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        post.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        post.created_at = now;
        post.updated_at = now;

        conn.execute(
            r#"INSERT INTO posts (id, user_id, body, media_url, media_type, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &post.id,
                &post.user_id,
                &post.body,
                &post.media_url,
                post.media_type.map(|m| m.as_str()),
                post.created_at.to_rfc3339(),
                post.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_post(&self, id: &str) -> StoreResult<Post> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM posts WHERE id = ?1", params![id], |row| {
            row_to_post(row)
        })
        .map_err(|e| not_found(e, format!("Post {}", id)))
    }

    /// Hard delete. Dangling comment/like rows are left behind on purpose.
    pub fn delete_post(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("Post {}", id)));
        }
        Ok(())
    }

    /// List posts newest-first, optionally filtered by a case-insensitive
    /// substring match on the body.
    pub fn list_posts(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Post>> {
        let conn = self.conn.lock().unwrap();
        let mut posts = Vec::new();

        if let Some(q) = search {
            let pattern = format!("%{}%", q);
            let mut stmt = conn.prepare(
                r#"SELECT * FROM posts WHERE body LIKE ?1
                   ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"#,
            )?;
            let rows = stmt.query_map(params![pattern, limit, offset], |row| row_to_post(row))?;
            for row in rows {
                posts.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT * FROM posts ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(params![limit, offset], |row| row_to_post(row))?;
            for row in rows {
                posts.push(row?);
            }
        }

        Ok(posts)
    }

    pub fn count_posts(&self, search: Option<&str>) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = if let Some(q) = search {
            let pattern = format!("%{}%", q);
            conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE body LIKE ?1",
                params![pattern],
                |row| row.get(0),
            )?
        } else {
            conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?
        };
        Ok(count)
    }

    pub fn list_posts_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Post>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT * FROM posts WHERE user_id = ?1
               ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"#,
        )?;
        let rows = stmt.query_map(params![user_id, limit, offset], |row| row_to_post(row))?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    pub fn count_posts_by_user(&self, user_id: &str) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Posts saved by a user, most recently saved first.
    pub fn list_saved_posts(&self, user_id: &str) -> StoreResult<Vec<Post>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT p.* FROM posts p
               JOIN post_saves s ON s.post_id = p.id
               WHERE s.user_id = ?1
               ORDER BY s.created_at DESC, p.id DESC"#,
        )?;
        let rows = stmt.query_map(params![user_id], |row| row_to_post(row))?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    // ==================== Like / Save Operations ====================

    /// Add a like edge. Returns false if the user already liked the post;
    /// the primary key keeps concurrent duplicate pushes deduplicated.
    pub fn like_post(&self, post_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "INSERT OR IGNORE INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    pub fn unlike_post(&self, post_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn has_liked_post(&self, post_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT 1 FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_post_likes(&self, post_id: &str) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn save_post(&self, post_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "INSERT OR IGNORE INTO post_saves (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    pub fn unsave_post(&self, post_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "DELETE FROM post_saves WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn has_saved_post(&self, post_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT 1 FROM post_saves WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ==================== Comment Operations ====================

    pub fn create_comment(&self, comment: &mut Comment) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        comment.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        comment.created_at = now;
        comment.updated_at = now;

        conn.execute(
            r#"INSERT INTO comments (id, post_id, user_id, body, image_data, emotion,
                is_emotion_reaction, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                &comment.id,
                &comment.post_id,
                &comment.user_id,
                &comment.body,
                &comment.image_data,
                comment.emotion.map(|e| e.label()),
                comment.is_emotion_reaction,
                comment.created_at.to_rfc3339(),
                comment.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_comment(&self, id: &str) -> StoreResult<Comment> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM comments WHERE id = ?1", params![id], |row| {
            row_to_comment(row)
        })
        .map_err(|e| not_found(e, format!("Comment {}", id)))
    }

    pub fn delete_comment(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("Comment {}", id)));
        }
        Ok(())
    }

    /// Comments of a post in creation order - the post's ordered comment list.
    pub fn list_comments_for_post(&self, post_id: &str) -> StoreResult<Vec<Comment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM comments WHERE post_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![post_id], |row| row_to_comment(row))?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    pub fn count_comments_for_post(&self, post_id: &str) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn like_comment(&self, comment_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "INSERT OR IGNORE INTO comment_likes (comment_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![comment_id, user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(rows > 0)
    }

    pub fn unlike_comment(&self, comment_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
            params![comment_id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn has_liked_comment(&self, comment_id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT 1 FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
                params![comment_id, user_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_comment_likes(&self, comment_id: &str) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?1",
            params![comment_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ==================== Notification Operations ====================

    pub fn create_notification(&self, notification: &mut Notification) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        notification.id = Uuid::new_v4().to_string();
        notification.created_at = Utc::now();

        conn.execute(
            r#"INSERT INTO notifications (id, user_id, body, link, kind, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                &notification.id,
                &notification.user_id,
                &notification.body,
                &notification.link,
                notification.kind.as_str(),
                notification.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_notifications(&self, user_id: &str) -> StoreResult<Vec<Notification>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row_to_notification(row))?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Delete every notification owned by the user and reset the unread
    /// flag, in one transaction. A no-op when the log is already empty.
    pub fn clear_notifications(&self, user_id: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM notifications WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute(
            "UPDATE users SET has_new_notifications = 0 WHERE id = ?1",
            params![user_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn not_found(e: rusqlite::Error, what: String) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(what),
        _ => StoreError::Database(e),
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        bio: row.get("bio")?,
        location: row.get("location")?,
        profile_image: row.get("profile_image")?,
        cover_image: row.get("cover_image")?,
        has_new_notifications: row.get("has_new_notifications")?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    let media_type: Option<String> = row.get("media_type")?;
    Ok(Post {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        body: row.get("body")?,
        media_url: row.get("media_url")?,
        media_type: media_type.as_deref().and_then(MediaType::parse),
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
    let emotion: Option<String> = row.get("emotion")?;
    Ok(Comment {
        id: row.get("id")?,
        post_id: row.get("post_id")?,
        user_id: row.get("user_id")?,
        body: row.get("body")?,
        image_data: row.get("image_data")?,
        emotion: emotion.as_deref().and_then(crate::emotion::Emotion::parse),
        is_emotion_reaction: row.get("is_emotion_reaction")?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
    let kind: String = row.get("kind")?;
    Ok(Notification {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        body: row.get("body")?,
        link: row.get("link")?,
        kind: NotificationKind::parse(&kind).unwrap_or(NotificationKind::Comment),
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(username: &str) -> User {
        User {
            id: String::new(),
            name: username.to_string(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: "hash".to_string(),
            bio: String::new(),
            location: String::new(),
            profile_image: String::new(),
            cover_image: String::new(),
            has_new_notifications: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_post(user_id: &str, body: &str) -> Post {
        Post {
            id: String::new(),
            user_id: user_id.to_string(),
            body: body.to_string(),
            media_url: None,
            media_type: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_get_user() {
        let store = Store::in_memory().unwrap();
        let mut user = test_user("alice");

        store.create_user(&mut user).unwrap();
        assert!(!user.id.is_empty());

        let retrieved = store.get_user(&user.id).unwrap();
        assert_eq!(retrieved.username, "alice");
        assert!(!retrieved.has_new_notifications);

        let by_email = store.get_user_by_email("alice@example.com").unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[test]
    fn test_like_edge_is_deduplicated() {
        let store = Store::in_memory().unwrap();
        let mut user = test_user("alice");
        store.create_user(&mut user).unwrap();
        let mut post = test_post(&user.id, "hello #world");
        store.create_post(&mut post).unwrap();

        assert!(store.like_post(&post.id, &user.id).unwrap());
        // Second push of the same edge is absorbed by the store.
        assert!(!store.like_post(&post.id, &user.id).unwrap());
        assert_eq!(store.count_post_likes(&post.id).unwrap(), 1);

        assert!(store.unlike_post(&post.id, &user.id).unwrap());
        assert!(!store.unlike_post(&post.id, &user.id).unwrap());
        assert_eq!(store.count_post_likes(&post.id).unwrap(), 0);
    }

    #[test]
    fn test_follow_round_trip() {
        let store = Store::in_memory().unwrap();
        let mut a = test_user("alice");
        let mut b = test_user("bob");
        store.create_user(&mut a).unwrap();
        store.create_user(&mut b).unwrap();

        assert!(store.follow(&a.id, &b.id).unwrap());
        assert!(store.is_following(&a.id, &b.id).unwrap());
        assert_eq!(store.count_followers(&b.id).unwrap(), 1);
        assert_eq!(store.count_following(&a.id).unwrap(), 1);

        assert!(store.unfollow(&a.id, &b.id).unwrap());
        assert!(!store.is_following(&a.id, &b.id).unwrap());
        assert_eq!(store.count_followers(&b.id).unwrap(), 0);
        assert_eq!(store.count_following(&a.id).unwrap(), 0);
    }

    #[test]
    fn test_list_posts_search_is_case_insensitive() {
        let store = Store::in_memory().unwrap();
        let mut user = test_user("alice");
        store.create_user(&mut user).unwrap();

        let mut p1 = test_post(&user.id, "Hello #World");
        let mut p2 = test_post(&user.id, "something else");
        store.create_post(&mut p1).unwrap();
        store.create_post(&mut p2).unwrap();

        let hits = store.list_posts(Some("hello"), 10, 0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, p1.id);
        assert_eq!(store.count_posts(Some("hello")).unwrap(), 1);
        assert_eq!(store.count_posts(None).unwrap(), 2);
    }

    #[test]
    fn test_list_posts_newest_first() {
        let store = Store::in_memory().unwrap();
        let mut user = test_user("alice");
        store.create_user(&mut user).unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let mut post = test_post(&user.id, &format!("post {} #n", i));
            store.create_post(&mut post).unwrap();
            ids.push(post.id);
        }

        let listed = store.list_posts(None, 10, 0).unwrap();
        let listed_ids: Vec<_> = listed.iter().map(|p| p.id.clone()).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids);
    }

    #[test]
    fn test_comments_keep_creation_order() {
        let store = Store::in_memory().unwrap();
        let mut user = test_user("alice");
        store.create_user(&mut user).unwrap();
        let mut post = test_post(&user.id, "first #post");
        store.create_post(&mut post).unwrap();

        for i in 0..3 {
            let mut comment = Comment {
                id: String::new(),
                post_id: post.id.clone(),
                user_id: user.id.clone(),
                body: format!("reply {}", i),
                image_data: None,
                emotion: None,
                is_emotion_reaction: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            store.create_comment(&mut comment).unwrap();
        }

        let comments = store.list_comments_for_post(&post.id).unwrap();
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].body, "reply 0");
        assert_eq!(comments[2].body, "reply 2");
        assert_eq!(store.count_comments_for_post(&post.id).unwrap(), 3);
    }

    #[test]
    fn test_clear_notifications_resets_flag() {
        let store = Store::in_memory().unwrap();
        let mut user = test_user("alice");
        store.create_user(&mut user).unwrap();

        let mut n = Notification {
            id: String::new(),
            user_id: user.id.clone(),
            body: "Someone liked your post!".to_string(),
            link: None,
            kind: NotificationKind::Like,
            created_at: Utc::now(),
        };
        store.create_notification(&mut n).unwrap();
        store.set_has_new_notifications(&user.id, true).unwrap();

        store.clear_notifications(&user.id).unwrap();
        assert!(store.list_notifications(&user.id).unwrap().is_empty());
        assert!(!store.get_user(&user.id).unwrap().has_new_notifications);

        // Clearing an already-empty log is still fine.
        store.clear_notifications(&user.id).unwrap();
    }

    #[test]
    fn test_saved_posts_round_trip() {
        let store = Store::in_memory().unwrap();
        let mut user = test_user("alice");
        store.create_user(&mut user).unwrap();
        let mut post = test_post(&user.id, "keep this #saved");
        store.create_post(&mut post).unwrap();

        assert!(store.save_post(&post.id, &user.id).unwrap());
        assert!(store.has_saved_post(&post.id, &user.id).unwrap());
        let saved = store.list_saved_posts(&user.id).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, post.id);

        assert!(store.unsave_post(&post.id, &user.id).unwrap());
        assert!(store.list_saved_posts(&user.id).unwrap().is_empty());
    }
}
