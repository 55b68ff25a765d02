//! Router assembly, listener, and background maintenance.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ServerError;
use crate::state::ServerState;
use crate::{admin, http, ws};

/// Cadence of guard sweeps, registry reaping, and user-log flushes.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Sessions with no socket and no room for this long are reaped.
const SESSION_IDLE_TTL: Duration = Duration::from_secs(3600);

/// Builds the complete router: game socket, public queries, honeypots,
/// and the admin surface, with CORS and request tracing layered on top.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.cors_any() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Everything public goes through the guard, honeypots included --
    // hitting one is exactly what the guard wants to see.
    let public = Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/syllable-stats", get(http::syllable_stats))
        .route("/words-by-syllable", get(http::words_by_syllable))
        .route("/validate", get(http::validate))
        .route("/top-syllables", get(http::top_syllables))
        .route("/search", get(http::search))
        .route("/token", get(http::issue_token))
        .route("/api/words.json", get(http::honeypot_words))
        .route("/dictionary.txt", get(http::honeypot_dictionary))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            http::guard_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin/add-word", post(admin::add_word))
        .route("/admin/remove-word", post(admin::remove_word))
        .route("/admin/antiscraping/stats", get(admin::antiscraping_stats))
        .route(
            "/admin/antiscraping/blocked-ips",
            get(admin::antiscraping_blocked),
        )
        .route("/admin/antiscraping/unblock", post(admin::antiscraping_unblock))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/ban", post(admin::ban_ip))
        .route("/admin/ban/{ip}", delete(admin::unban_ip))
        .route("/staff", get(admin::list_staff).post(admin::upsert_staff))
        .route("/staff/login", post(admin::staff_login))
        .route("/staff/{username}", delete(admin::delete_staff));

    Router::new()
        .merge(public)
        .merge(admin_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured port and serves until the process terminates.
pub async fn run(state: Arc<ServerState>) -> Result<(), ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let router = build_router(Arc::clone(&state));

    let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
    tracing::info!(%addr, "wordbomb server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(ServerError::Serve)
}

/// Runs the fixed-cadence maintenance loop: guard score decay and token
/// pruning, idle session and room reaping, user-log flush.
pub fn spawn_maintenance(state: Arc<ServerState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;

            state.guard.lock().await.sweep();
            state.sessions.lock().await.reap_idle(SESSION_IDLE_TTL);
            state.rooms.lock().await.reap_idle();
            if let Err(e) = state.stores.flush_userlog().await {
                tracing::warn!(error = %e, "user log flush failed");
            }
        }
    });
}
