use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::{auth, comments, likes, stories, users};
use crate::config::{Config, CorsConfig};
use crate::error::AppError;
use crate::security::jwt::JwtService;
use crate::services::{AuthService, CommentService, LikeService, StoryService, UserService};

pub struct AppState {
    pub db: SqlitePool,
    pub auth: AuthService,
    pub users: UserService,
    pub stories: StoryService,
    pub comments: CommentService,
    pub likes: LikeService,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &Config) -> Self {
        let jwt = Arc::new(JwtService::new(&config.jwt));
        Self {
            auth: AuthService::new(db.clone(), jwt),
            users: UserService::new(db.clone()),
            stories: StoryService::new(db.clone()),
            comments: CommentService::new(db.clone()),
            likes: LikeService::new(db.clone()),
            db,
        }
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allows_any() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

async fn health(State(state): State<Arc<AppState>>) -> Result<&'static str, AppError> {
    sqlx::query("SELECT 1").execute(&state.db).await?;
    Ok("OK")
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list))
        .route("/users/me", put(users::update_me))
        .route("/users/username/{username}", get(users::get_by_username))
        .route("/users/{id}", get(users::get))
        .route("/stories", get(stories::list).post(stories::create))
        .route("/stories/search", get(stories::search))
        .route("/stories/top-rated", get(stories::top_rated))
        .route("/stories/most-viewed", get(stories::most_viewed))
        .route("/stories/tag/{tag}", get(stories::by_tag))
        .route("/stories/author/{id}", get(stories::by_author))
        .route(
            "/stories/{id}",
            get(stories::get).put(stories::update).delete(stories::delete),
        )
        .route("/stories/{id}/publish", post(stories::publish))
        .route("/stories/{id}/unpublish", post(stories::unpublish))
        .route("/stories/{id}/rate", post(stories::rate))
        .route("/stories/{id}/view", post(stories::view))
        .route("/stories/{id}/like", post(likes::toggle_story))
        .route("/comments", get(comments::list).post(comments::create))
        .route(
            "/comments/{id}",
            get(comments::get).put(comments::update).delete(comments::delete),
        )
        .route(
            "/comments/{id}/like",
            post(comments::toggle_like).delete(comments::unlike),
        )
        .route(
            "/likes/stories/{id}",
            get(likes::status).post(likes::like).delete(likes::unlike),
        )
}

pub fn router(state: Arc<AppState>, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors)),
        )
        .with_state(state)
}

pub async fn start_server(config: Config, db: SqlitePool) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(db, &config));
    let app = router(state, &config.cors);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, env = %config.app.env, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
