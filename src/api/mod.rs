use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::feed::FeedService;
use crate::interactions::{ActionError, CommentInput, InteractionService};
use crate::mentions;
use crate::models::*;
use crate::store::{Store, StoreError};

pub struct AppState {
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
    pub feed: Arc<FeedService>,
    pub interactions: Arc<InteractionService>,
}

/// Map a coordinator failure onto an HTTP status. Everything that is a
/// business-rule violation stays a 400.
fn action_error(err: ActionError) -> HttpResponse {
    let body = ApiResponse::<()>::error(err.to_string());
    match err {
        ActionError::Unauthenticated => HttpResponse::Unauthorized().json(body),
        ActionError::Forbidden => HttpResponse::Forbidden().json(body),
        ActionError::NotFound(_) => HttpResponse::NotFound().json(body),
        ActionError::Store(_) => HttpResponse::InternalServerError().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

fn store_error(err: StoreError) -> HttpResponse {
    match err {
        StoreError::NotFound(what) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error(format!("Not found: {}", what)))
        }
        e => HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string())),
    }
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Auth Endpoints ====================

#[derive(Deserialize)]
pub struct RegisterQuery {
    step: u8,
}

/// Two-step registration: step 1 reserves the email, step 2 finalizes
/// username and password and creates the account.
pub async fn register(
    state: web::Data<AppState>,
    query: web::Query<RegisterQuery>,
    body: web::Json<serde_json::Value>,
) -> impl Responder {
    match query.step {
        1 => {
            let req: RegisterStepOneRequest = match serde_json::from_value(body.into_inner()) {
                Ok(r) => r,
                Err(e) => return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string())),
            };
            if req.email.trim().is_empty() || req.name.trim().is_empty() {
                return HttpResponse::BadRequest()
                    .json(ApiResponse::<()>::error("Email and name are required"));
            }
            match state.store.get_user_by_email(&req.email) {
                Ok(_) => action_error(ActionError::DuplicateEmail),
                Err(StoreError::NotFound(_)) => {
                    HttpResponse::Ok().json(serde_json::json!({ "success": true }))
                }
                Err(e) => store_error(e),
            }
        }
        2 => {
            let req: RegisterStepTwoRequest = match serde_json::from_value(body.into_inner()) {
                Ok(r) => r,
                Err(e) => return HttpResponse::BadRequest().json(ApiResponse::<()>::error(e.to_string())),
            };
            if req.username.trim().is_empty() || req.password.is_empty() {
                return HttpResponse::BadRequest()
                    .json(ApiResponse::<()>::error("Username and password are required"));
            }
            match state.store.get_user_by_email(&req.email) {
                Ok(_) => return action_error(ActionError::DuplicateEmail),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return store_error(e),
            }
            match state.store.get_user_by_username(&req.username) {
                Ok(_) => return action_error(ActionError::DuplicateUsername),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return store_error(e),
            }

            let password_hash = match state.auth_service.hash_password(&req.password) {
                Ok(hash) => hash,
                Err(_) => {
                    return HttpResponse::InternalServerError()
                        .json(ApiResponse::<()>::error("Failed to hash password"))
                }
            };

            let mut user = User {
                id: String::new(),
                name: req.name.clone(),
                username: req.username.clone(),
                email: req.email.clone(),
                password_hash,
                bio: String::new(),
                location: String::new(),
                profile_image: String::new(),
                cover_image: String::new(),
                has_new_notifications: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            if let Err(e) = state.store.create_user(&mut user) {
                return HttpResponse::BadRequest()
                    .json(ApiResponse::<()>::error(format!("Failed to create user: {}", e)));
            }

            let token = match state.auth_service.generate_token(&user.id) {
                Ok(t) => t,
                Err(_) => {
                    return HttpResponse::InternalServerError()
                        .json(ApiResponse::<()>::error("Failed to generate token"))
                }
            };

            HttpResponse::Created().json(ApiResponse::success(LoginResponse { token, user }))
        }
        _ => HttpResponse::BadRequest().json(ApiResponse::<()>::error("Unknown registration step")),
    }
}

pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let user = match state.store.get_user_by_email(&body.email) {
        Ok(u) => u,
        Err(StoreError::NotFound(_)) => {
            return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid credentials"));
        }
        Err(_) => {
            return HttpResponse::InternalServerError().json(ApiResponse::<()>::error("Database error"));
        }
    };

    let valid = state
        .auth_service
        .verify_password(&body.password, &user.password_hash)
        .unwrap_or(false);

    if !valid {
        return HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid credentials"));
    }

    let token = match state.auth_service.generate_token(&user.id) {
        Ok(t) => t,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to generate token"))
        }
    };

    HttpResponse::Ok().json(ApiResponse::success(LoginResponse { token, user }))
}

pub async fn get_current_user(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match ctx.current_user {
        Some(auth_user) => match state.store.get_user(&auth_user.user_id) {
            Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
            Err(e) => store_error(e),
        },
        None => action_error(ActionError::Unauthenticated),
    }
}

// ==================== Feed Endpoints ====================

#[derive(Deserialize)]
pub struct FeedQuery {
    page: Option<i64>,
    page_size: Option<i64>,
    q: Option<String>,
}

pub async fn list_posts(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<FeedQuery>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(10);

    match state
        .feed
        .list_posts(page, page_size, query.q.as_deref(), ctx.viewer_id())
    {
        Ok(page) => HttpResponse::Ok().json(ApiResponse::success(page)),
        Err(e) => store_error(e),
    }
}

pub async fn get_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    let id = path.into_inner();
    match state.feed.get_post(&id, ctx.viewer_id()) {
        Ok(post) => HttpResponse::Ok().json(ApiResponse::success(post)),
        Err(e) => store_error(e),
    }
}

pub async fn create_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreatePostRequest>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    let body = body.into_inner();

    // Composer rule: a post needs a hashtag unless media is attached.
    if body.media_url.is_none() && !mentions::contains_hashtag(&body.body) {
        return action_error(ActionError::Validation(
            "Your post must contain a hashtag or media".to_string(),
        ));
    }

    match state
        .interactions
        .create_post(&ctx, body.body, body.media_url, body.media_type)
    {
        Ok(post) => HttpResponse::Ok().json(ApiResponse::success(post)),
        Err(e) => action_error(e),
    }
}

pub async fn delete_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.delete_post(&ctx, &path.into_inner()) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => action_error(e),
    }
}

pub async fn list_user_posts(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<FeedQuery>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(10);

    match state
        .feed
        .list_user_posts(&path.into_inner(), page, page_size, ctx.viewer_id())
    {
        Ok(page) => HttpResponse::Ok().json(ApiResponse::success(page)),
        Err(e) => store_error(e),
    }
}

pub async fn list_saved_posts(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    let Some(viewer) = ctx.viewer_id() else {
        return action_error(ActionError::Unauthenticated);
    };
    match state.feed.list_saved_posts(viewer) {
        Ok(posts) => HttpResponse::Ok().json(ApiResponse::success(posts)),
        Err(e) => store_error(e),
    }
}

// ==================== Like / Save Endpoints ====================

pub async fn like_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.like_post(&ctx, &path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Post liked")),
        Err(e) => action_error(e),
    }
}

pub async fn unlike_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.unlike_post(&ctx, &path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Like removed")),
        Err(e) => action_error(e),
    }
}

pub async fn save_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.save_post(&ctx, &path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Post saved")),
        Err(e) => action_error(e),
    }
}

pub async fn unsave_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.unsave_post(&ctx, &path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Post unsaved")),
        Err(e) => action_error(e),
    }
}

// ==================== Comment Endpoints ====================

pub async fn list_comments(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.feed.list_comments(&path.into_inner(), ctx.viewer_id()) {
        Ok(comments) => HttpResponse::Ok().json(ApiResponse::success(comments)),
        Err(e) => store_error(e),
    }
}

/// Create a text comment (`body`) or an emotion reaction (`image_data`).
pub async fn create_comment(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateCommentRequest>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    let body = body.into_inner();

    let input = match (body.image_data, body.body) {
        (Some(image_data), _) => CommentInput::Reaction { image_data },
        (None, Some(text)) => CommentInput::Text(text),
        (None, None) => {
            return action_error(ActionError::Validation(
                "A comment needs a body or an image".to_string(),
            ));
        }
    };

    match state.interactions.create_comment(&ctx, &body.post_id, input).await {
        Ok(comment) => HttpResponse::Ok().json(ApiResponse::success(comment)),
        Err(e) => action_error(e),
    }
}

pub async fn like_comment(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CommentIdRequest>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.like_comment(&ctx, &body.comment_id) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Comment liked")),
        Err(e) => action_error(e),
    }
}

pub async fn unlike_comment(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CommentIdRequest>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.unlike_comment(&ctx, &body.comment_id) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Like removed")),
        Err(e) => action_error(e),
    }
}

pub async fn delete_comment(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.delete_comment(&ctx, &path.into_inner()) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => action_error(e),
    }
}

// ==================== User Endpoints ====================

pub async fn list_users(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<FeedQuery>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(10);

    match state
        .feed
        .list_users(page, page_size, query.q.as_deref(), ctx.viewer_id())
    {
        Ok(page) => HttpResponse::Ok().json(ApiResponse::success(page)),
        Err(e) => store_error(e),
    }
}

pub async fn get_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.feed.get_user(&path.into_inner(), ctx.viewer_id()) {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(e) => store_error(e),
    }
}

pub async fn update_profile(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.update_profile(&ctx, body.into_inner()) {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(e) => action_error(e),
    }
}

pub async fn follow_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.follow_user(&ctx, &path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Followed")),
        Err(e) => action_error(e),
    }
}

pub async fn unfollow_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.unfollow_user(&ctx, &path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Unfollowed")),
        Err(e) => action_error(e),
    }
}

/// Exact-match mention lookup: `@username` -> profile snippet.
pub async fn resolve_mention(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match mentions::resolve_mention(&state.store, &path.into_inner()) {
        Ok(snippet) => HttpResponse::Ok().json(ApiResponse::success(snippet)),
        Err(e) => store_error(e),
    }
}

// ==================== Notification Endpoints ====================

pub async fn list_notifications(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.list_notifications(&ctx) {
        Ok(notifications) => HttpResponse::Ok().json(ApiResponse::success(notifications)),
        Err(e) => action_error(e),
    }
}

pub async fn clear_notifications(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let ctx = state.auth_service.authenticate(&req);
    match state.interactions.clear_notifications(&ctx) {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Notifications cleared")),
        Err(e) => action_error(e),
    }
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))

        // Auth
        .route("/api/auth/register", web::post().to(register))
        .route("/api/auth/login", web::post().to(login))
        .route("/api/auth/me", web::get().to(get_current_user))

        // Posts
        .route("/api/posts", web::get().to(list_posts))
        .route("/api/posts", web::post().to(create_post))
        .route("/api/posts/{id}", web::get().to(get_post))
        .route("/api/posts/{id}", web::delete().to(delete_post))
        .route("/api/posts/{id}/like", web::put().to(like_post))
        .route("/api/posts/{id}/like", web::delete().to(unlike_post))
        .route("/api/posts/{id}/save", web::put().to(save_post))
        .route("/api/posts/{id}/save", web::delete().to(unsave_post))
        .route("/api/posts/{id}/comments", web::get().to(list_comments))

        // Comments
        .route("/api/comments", web::post().to(create_comment))
        .route("/api/comments", web::put().to(like_comment))
        .route("/api/comments", web::delete().to(unlike_comment))
        .route("/api/comments/{id}", web::delete().to(delete_comment))

        // Users
        .route("/api/users", web::get().to(list_users))
        .route("/api/users/me", web::patch().to(update_profile))
        .route("/api/users/resolve/{username}", web::get().to(resolve_mention))
        .route("/api/users/{id}", web::get().to(get_user))
        .route("/api/users/{id}/posts", web::get().to(list_user_posts))
        .route("/api/users/{id}/follow", web::put().to(follow_user))
        .route("/api/users/{id}/follow", web::delete().to(unfollow_user))

        // Saved posts
        .route("/api/saved", web::get().to(list_saved_posts))

        // Notifications
        .route("/api/notifications", web::get().to(list_notifications))
        .route("/api/notifications", web::delete().to(clear_notifications));
}
