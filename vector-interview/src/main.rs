use std::sync::{Arc, OnceLock};

use axum::routing::{get, post, put};
use axum::Router;
use serde::Serialize;
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

mod clients;
mod config;
mod events;
mod matching;
mod models;
mod presence;
mod routes;
mod schema;
mod session;
mod socket;
mod sweeper;

use clients::questions::QuestionClient;
use config::AppConfig;
use presence::PresenceTracker;
use vector_shared::clients::db::{create_pool, DbPool};
use vector_shared::clients::rabbitmq::RabbitMQClient;
use vector_shared::clients::redis::RedisClient;
use vector_shared::errors::{AppError, AppResult};

pub type DbConn =
    diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<diesel::PgConnection>>;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub redis: RedisClient,
    pub presence: PresenceTracker,
    pub questions: QuestionClient,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    io: OnceLock<SocketIo>,
}

impl AppState {
    pub fn conn(&self) -> AppResult<DbConn> {
        self.db
            .get()
            .map_err(|e| AppError::internal(format!("database connection error: {e}")))
    }

    fn set_io(&self, io: SocketIo) {
        let _ = self.io.set(io);
    }

    /// Targeted emit to a user's private room. Best-effort: dropped when the
    /// user has no live socket.
    pub fn notify_user<T: Serialize>(&self, user_id: Uuid, event: &'static str, data: &T) {
        if let Some(io) = self.io.get() {
            let _ = io.to(format!("user:{user_id}")).emit(event, data);
        }
    }

    /// Best-effort broadcast to everyone in a session room.
    pub fn notify_session<T: Serialize>(&self, session_id: Uuid, event: &'static str, data: &T) {
        if let Some(io) = self.io.get() {
            let _ = io.to(format!("session:{session_id}")).emit(event, data);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vector_shared::middleware::init_tracing("vector-interview");

    let config = AppConfig::load()?;
    let port = config.port;

    // Database pool
    let db = create_pool(&config.database_url)?;

    // Infrastructure clients
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let questions = QuestionClient::new(config.question_service_url.clone());
    let metrics_handle = vector_shared::middleware::init_metrics();

    let state = Arc::new(AppState {
        db,
        config,
        rabbitmq,
        redis,
        presence: PresenceTracker::new(),
        questions,
        metrics_handle,
        io: OnceLock::new(),
    });

    // Socket.IO setup
    let (sio_layer, io) = SocketIo::builder()
        .with_state(state.clone())
        .build_layer();

    io.ns("/", socket::handlers::on_connect);
    state.set_io(io);

    // Background sweep: expiry + unconfirmed-match release
    sweeper::spawn(state.clone());

    // Axum router with REST endpoints + Socket.IO layer
    let app = Router::new()
        // Health + metrics
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        // Matching lifecycle
        .route("/matching/start", post(routes::matching::start_matching))
        .route(
            "/matching/:id",
            get(routes::matching::get_request).delete(routes::matching::cancel_request),
        )
        .route("/matching/:id/confirm", post(routes::matching::confirm_match))
        // Live sessions
        .route("/sessions/:id", get(routes::session::get_session))
        .route("/sessions/:id/question", post(routes::session::change_question))
        .route(
            "/sessions/:id/switch-roles",
            post(routes::session::switch_roles),
        )
        .route("/sessions/:id/end", post(routes::session::end_session))
        // Feedback
        .route("/sessions/:id/feedback", put(routes::feedback::submit_feedback))
        .route(
            "/sessions/:id/feedback/status",
            get(routes::feedback::feedback_status),
        )
        .layer(axum::middleware::from_fn(
            vector_shared::middleware::metrics_middleware,
        ))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "vector-interview starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
