//! Admin and staff endpoints: dictionary mutations, anti-scraping
//! management, bans, and staff account CRUD.
//!
//! Authorization is either the static `ADMIN_TOKEN` (header
//! `x-admin-token`) or a staff session token (header `x-staff-token`)
//! whose account holds the `admin` role. An empty `ADMIN_TOKEN` means
//! dev mode: everything is open. Failures never reveal whether a
//! resource exists.

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::http::HttpError;
use crate::state::ServerState;
use crate::ws::evict_ip;

/// Checks `x-admin-token` / `x-staff-token` for admin rights.
async fn authorize_admin(state: &ServerState, headers: &HeaderMap) -> Result<(), HttpError> {
    if state.config.admin_token.is_empty() {
        return Ok(());
    }
    if let Some(token) = header_str(headers, "x-admin-token") {
        if token == state.config.admin_token {
            return Ok(());
        }
    }
    if let Some(token) = header_str(headers, "x-staff-token") {
        if state.stores.staff_role_for_token(token).await.as_deref() == Some("admin") {
            return Ok(());
        }
    }
    tracing::warn!("admin endpoint rejected");
    Err(HttpError::Unauthorized)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// Dictionary mutations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WordBody {
    pub word: String,
}

/// `POST /admin/add-word` -- append to disk, then rebuild the index.
///
/// When the append succeeded but the rebuild did not, the mutation is on
/// disk and will be picked up by the next successful rebuild: the call
/// reports success with a `rebuild_failed` warning.
pub async fn add_word(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<WordBody>,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;

    wordbomb_dict::append_word(&state.config.dict_path, &body.word)
        .await
        .map_err(|e| match e {
            wordbomb_dict::DictError::EmptyWord => HttpError::InvalidWord,
            other => HttpError::Io(other.to_string()),
        })?;

    Ok(rebuild_and_report(&state).await)
}

/// `POST /admin/remove-word` -- rewrite the file without the word, then
/// rebuild.
pub async fn remove_word(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<WordBody>,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;

    let removed = wordbomb_dict::remove_word(&state.config.dict_path, &body.word)
        .await
        .map_err(|e| match e {
            wordbomb_dict::DictError::EmptyWord => HttpError::InvalidWord,
            other => HttpError::Io(other.to_string()),
        })?;
    if !removed {
        return Err(HttpError::NotFound);
    }

    Ok(rebuild_and_report(&state).await)
}

async fn rebuild_and_report(state: &ServerState) -> Response {
    match state
        .dict
        .rebuild(&state.config.dict_path, state.config.sample_cap)
        .await
    {
        Ok(report) => Json(serde_json::json!({
            "ok": true,
            "words": report.lines_processed,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "rebuild after admin mutation failed");
            Json(serde_json::json!({
                "ok": true,
                "warning": "rebuild_failed",
            }))
            .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Anti-scraping management
// ---------------------------------------------------------------------------

/// `GET /admin/antiscraping/stats`
pub async fn antiscraping_stats(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    let stats = state.guard.lock().await.stats();
    Ok(Json(stats).into_response())
}

/// `GET /admin/antiscraping/blocked-ips`
pub async fn antiscraping_blocked(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    let blocked: Vec<String> = state
        .guard
        .lock()
        .await
        .blocked_ips()
        .into_iter()
        .map(|ip| ip.to_string())
        .collect();
    Ok(Json(serde_json::json!({ "blocked": blocked })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct IpBody {
    pub ip: String,
    #[serde(default)]
    pub reason: String,
}

/// `POST /admin/antiscraping/unblock`
pub async fn antiscraping_unblock(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<IpBody>,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    let ip: IpAddr = body.ip.parse().map_err(|_| HttpError::InvalidWord)?;
    let released = state.guard.lock().await.unblock(ip);
    Ok(Json(serde_json::json!({ "ok": true, "released": released })).into_response())
}

// ---------------------------------------------------------------------------
// Bans and users
// ---------------------------------------------------------------------------

/// `GET /admin/users` -- the user log.
pub async fn list_users(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    let users = state.stores.userlog_listing().await;
    Ok(Json(users).into_response())
}

/// `POST /admin/ban` -- persist the ban, arm the guard, evict sockets.
pub async fn ban_ip(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<IpBody>,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    let ip: IpAddr = body.ip.parse().map_err(|_| HttpError::InvalidWord)?;
    let reason = if body.reason.is_empty() {
        "banned".to_string()
    } else {
        body.reason.clone()
    };

    state.guard.lock().await.ban(ip);
    state
        .stores
        .add_ban(&body.ip, &reason)
        .await
        .map_err(|e| HttpError::Io(e.to_string()))?;
    evict_ip(&state, ip).await;

    Ok(Json(serde_json::json!({ "ok": true })).into_response())
}

/// `DELETE /admin/ban/{ip}`
pub async fn unban_ip(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(ip): Path<String>,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    let parsed: IpAddr = ip.parse().map_err(|_| HttpError::InvalidWord)?;
    state.guard.lock().await.unban(parsed);
    let removed = state
        .stores
        .remove_ban(&ip)
        .await
        .map_err(|e| HttpError::Io(e.to_string()))?;
    Ok(Json(serde_json::json!({ "ok": true, "removed": removed })).into_response())
}

// ---------------------------------------------------------------------------
// Staff accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StaffBody {
    pub username: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "moderator".to_string()
}

/// `GET /staff` -- usernames and roles.
pub async fn list_staff(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    let listing: Vec<serde_json::Value> = state
        .stores
        .staff_listing()
        .await
        .into_iter()
        .map(|(username, role)| serde_json::json!({ "username": username, "role": role }))
        .collect();
    Ok(Json(listing).into_response())
}

/// `POST /staff` -- create or replace an account.
pub async fn upsert_staff(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<StaffBody>,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    if body.username.is_empty() || body.password.is_empty() {
        return Err(HttpError::InvalidWord);
    }
    state
        .stores
        .upsert_staff(&body.username, &body.password, &body.role)
        .await
        .map_err(|e| HttpError::Io(e.to_string()))?;
    Ok(Json(serde_json::json!({ "ok": true })).into_response())
}

/// `DELETE /staff/{username}`
pub async fn delete_staff(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Response, HttpError> {
    authorize_admin(&state, &headers).await?;
    let removed = state
        .stores
        .remove_staff(&username)
        .await
        .map_err(|e| HttpError::Io(e.to_string()))?;
    if !removed {
        return Err(HttpError::NotFound);
    }
    Ok(Json(serde_json::json!({ "ok": true })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

/// `POST /staff/login` -- exchanges credentials for the session token.
pub async fn staff_login(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<LoginBody>,
) -> Result<Response, HttpError> {
    match state
        .stores
        .verify_staff_login(&body.username, &body.password)
        .await
    {
        Some((token, role)) => {
            Ok(Json(serde_json::json!({ "token": token, "role": role })).into_response())
        }
        None => Err(HttpError::Unauthorized),
    }
}
