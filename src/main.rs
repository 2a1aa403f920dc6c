mod api;
mod auth;
mod emotion;
mod feed;
mod interactions;
mod mentions;
mod models;
mod store;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::env;
use std::sync::Arc;
use std::time::Duration;

use api::AppState;
use auth::AuthService;
use emotion::{Emotion, EmotionClassifier, HttpEmotionClassifier, StaticClassifier};
use feed::FeedService;
use interactions::InteractionService;
use store::Store;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load environment variables
    dotenvy::dotenv().ok();

    // Get configuration from environment
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .expect("PORT must be a number");

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "warble.db".to_string());

    let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
        log::warn!("JWT_SECRET not set, using default (not secure for production!)");
        "default_jwt_secret_change_me".to_string()
    });

    // Initialize store
    let store = Arc::new(Store::new(&db_path).expect("Failed to initialize database"));

    // Initialize auth service
    let auth_service = Arc::new(AuthService::new(jwt_secret, store.clone()));

    // Emotion classifier: HTTP collaborator when configured, otherwise a
    // static neutral label (reactions still work, just unclassified).
    let classifier: Arc<dyn EmotionClassifier> = match env::var("EMOTION_API_URL") {
        Ok(url) => {
            let timeout_ms: u64 = env::var("EMOTION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000);
            log::info!("Emotion classifier: {} (timeout {}ms)", url, timeout_ms);
            Arc::new(HttpEmotionClassifier::new(url, Duration::from_millis(timeout_ms)))
        }
        Err(_) => {
            log::warn!("EMOTION_API_URL not set, reactions will be labeled neutral");
            Arc::new(StaticClassifier(Emotion::Neutral))
        }
    };

    let feed = Arc::new(FeedService::new(store.clone()));
    let interactions = Arc::new(InteractionService::new(store.clone(), classifier));

    log::info!("Database: {}", db_path);
    log::info!("Starting warble server on port {}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
                feed: feed.clone(),
                interactions: interactions.clone(),
            }))
            // Reaction frames arrive base64-encoded in the JSON body.
            .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024))
            .configure(api::configure_routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
