use actix_web::{test, web, App};
use serde_json::json;
use std::sync::Arc;

use warble::api::{self, AppState};
use warble::auth::AuthService;
use warble::emotion::{Emotion, StaticClassifier};
use warble::feed::FeedService;
use warble::interactions::InteractionService;
use warble::models::{Post, User};
use warble::store::Store;

/// Helper to build AppState over an in-memory store
fn create_app_state(store: Arc<Store>, auth_service: Arc<AuthService>) -> AppState {
    AppState {
        store: store.clone(),
        auth_service: auth_service.clone(),
        feed: Arc::new(FeedService::new(store.clone())),
        interactions: Arc::new(InteractionService::new(
            store,
            Arc::new(StaticClassifier(Emotion::Neutral)),
        )),
    }
}

/// Helper to create a test user and return them with an auth token
fn create_test_user_with_token(
    store: &Arc<Store>,
    auth_service: &Arc<AuthService>,
    username: &str,
) -> (User, String) {
    let password_hash = auth_service.hash_password("testpass123").unwrap();

    let mut user = User {
        id: String::new(),
        name: username.to_string(),
        username: username.to_string(),
        email: format!("{}@test.com", username),
        password_hash,
        bio: String::new(),
        location: String::new(),
        profile_image: String::new(),
        cover_image: String::new(),
        has_new_notifications: false,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    store.create_user(&mut user).unwrap();
    let token = auth_service.generate_token(&user.id).unwrap();
    (user, token)
}

fn create_test_post(store: &Arc<Store>, user_id: &str, body: &str) -> String {
    let mut post = Post {
        id: String::new(),
        user_id: user_id.to_string(),
        body: body.to_string(),
        media_url: None,
        media_type: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    store.create_post(&mut post).unwrap();
    post.id
}

#[actix_web::test]
async fn test_like_creates_notification_with_link() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string(), store.clone()));
    let (_alice, alice_token) = create_test_user_with_token(&store, &auth_service, "alice");
    let (_bob, bob_token) = create_test_user_with_token(&store, &auth_service, "bob");
    let post_id = create_test_post(&store, &_alice.id, "hello #intro");

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(create_app_state(store.clone(), auth_service.clone())))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{}/like", post_id))
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::get()
        .uri("/api/notifications")
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"], "like");
    assert_eq!(items[0]["link"], post_id.as_str());
    assert_eq!(items[0]["body"], "Someone liked your post!");

    // Unread flag is visible on the account record.
    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["has_new_notifications"], true);
}

#[actix_web::test]
async fn test_notifications_are_newest_first() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string(), store.clone()));
    let (alice, alice_token) = create_test_user_with_token(&store, &auth_service, "alice");
    let (_bob, bob_token) = create_test_user_with_token(&store, &auth_service, "bob");
    let post_id = create_test_post(&store, &alice.id, "hello #intro");

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(create_app_state(store.clone(), auth_service.clone())))
            .configure(api::configure_routes),
    )
    .await;

    // Like, then comment; the comment notification should come first.
    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{}/like", post_id))
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::post()
        .uri("/api/comments")
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .set_json(json!({ "post_id": post_id, "body": "and a reply" }))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::get()
        .uri("/api/notifications")
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["kind"], "comment");
    assert_eq!(items[1]["kind"], "like");
}

#[actix_web::test]
async fn test_clear_notifications_deletes_and_resets_flag() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string(), store.clone()));
    let (alice, alice_token) = create_test_user_with_token(&store, &auth_service, "alice");
    let (_bob, bob_token) = create_test_user_with_token(&store, &auth_service, "bob");
    let post_id = create_test_post(&store, &alice.id, "hello #intro");

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(create_app_state(store.clone(), auth_service.clone())))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/posts/{}/like", post_id))
        .insert_header(("Authorization", format!("Bearer {}", bob_token)))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());
    assert!(store.get_user(&alice.id).unwrap().has_new_notifications);

    let req = test::TestRequest::delete()
        .uri("/api/notifications")
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::get()
        .uri("/api/notifications")
        .insert_header(("Authorization", format!("Bearer {}", alice_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    assert!(!store.get_user(&alice.id).unwrap().has_new_notifications);
}

#[actix_web::test]
async fn test_clear_with_no_notifications_is_a_noop_success() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string(), store.clone()));
    let (alice, token) = create_test_user_with_token(&store, &auth_service, "alice");

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(create_app_state(store.clone(), auth_service.clone())))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::delete()
        .uri("/api/notifications")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(!store.get_user(&alice.id).unwrap().has_new_notifications);
}

#[actix_web::test]
async fn test_notifications_require_authentication() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string(), store.clone()));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(create_app_state(store.clone(), auth_service.clone())))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/notifications").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::delete().uri("/api/notifications").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}
