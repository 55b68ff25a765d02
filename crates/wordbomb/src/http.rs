//! Public HTTP endpoints: dictionary queries, token issuance, honeypots.
//!
//! Everything here sits behind [`guard_middleware`], which screens each
//! request through the anti-scraping guard before any handler runs. All
//! dictionary queries answer `503 {"ready": false}` while no index has
//! been built yet.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use wordbomb_dict::DictionaryIndex;
use wordbomb_guard::{TokenCheck, Verdict};

use crate::state::ServerState;

/// Errors surfaced by the HTTP layer, mapped to status + error code.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("rate_limited")]
    RateLimited,
    #[error("forbidden")]
    Forbidden,
    #[error("unauthorized")]
    Unauthorized,
    #[error("not_found")]
    NotFound,
    #[error("not_ready")]
    NotReady,
    #[error("invalid_word")]
    InvalidWord,
    #[error("io_error")]
    Io(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        // The index-not-ready shape is part of the client contract.
        if matches!(self, Self::NotReady) {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "ready": false })),
            )
                .into_response();
        }
        let status = match &self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidWord => StatusCode::BAD_REQUEST,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotReady => unreachable!(),
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Guard middleware
// ---------------------------------------------------------------------------

/// Paths where a client is expected to present an anti-scraping token.
fn token_expected(path: &str) -> bool {
    matches!(
        path,
        "/syllable-stats" | "/words-by-syllable" | "/top-syllables" | "/search"
    )
}

/// Screens every request through the guard. Fail-open on plumbing (the
/// guard cannot error once locked), fail-closed on policy.
pub async fn guard_middleware(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let token_header = request
        .headers()
        .get("x-api-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let token = match (&token_header, token_expected(&path)) {
        (Some(value), _) => TokenCheck::Provided(value.as_str()),
        (None, true) => TokenCheck::Missing,
        (None, false) => TokenCheck::NotRequired,
    };

    let verdict = state
        .guard
        .lock()
        .await
        .check_request(addr.ip(), &path, &user_agent, token);

    match verdict {
        Verdict::Allow => next.run(request).await,
        Verdict::RateLimited => {
            tracing::warn!(ip = %addr.ip(), %path, "request rate limited");
            HttpError::RateLimited.into_response()
        }
        Verdict::Forbidden => HttpError::Forbidden.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Query endpoints
// ---------------------------------------------------------------------------

fn index_or_not_ready(state: &ServerState) -> Result<Arc<DictionaryIndex>, HttpError> {
    state.dict.snapshot().ok_or(HttpError::NotReady)
}

#[derive(Debug, Deserialize)]
pub struct LengthQuery {
    #[serde(default = "default_length")]
    pub length: usize,
}

fn default_length() -> usize {
    2
}

/// `GET /syllable-stats?length=L` -- the full syllable → count map.
pub async fn syllable_stats(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LengthQuery>,
) -> Result<Response, HttpError> {
    let index = index_or_not_ready(&state)?;
    let counts = index
        .counts_for_length(query.length)
        .ok_or(HttpError::NotFound)?;
    Ok(Json(serde_json::json!({
        "length": query.length,
        "counts": counts,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct WordsBySyllableQuery {
    pub syl: String,
    pub length: Option<usize>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    30
}

/// `GET /words-by-syllable?syl=S&length=L&limit=n` -- sample words.
pub async fn words_by_syllable(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WordsBySyllableQuery>,
) -> Result<Response, HttpError> {
    let index = index_or_not_ready(&state)?;
    let length = query.length.unwrap_or_else(|| query.syl.chars().count());
    let words = index.samples_for(length, &query.syl, query.limit);
    Ok(Json(serde_json::json!({
        "syllable": query.syl.to_uppercase(),
        "count": index.count_for(&query.syl).unwrap_or(0),
        "words": words,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub word: String,
}

/// `GET /validate?word=W` -- dictionary membership.
pub async fn validate(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ValidateQuery>,
) -> Result<Response, HttpError> {
    let index = index_or_not_ready(&state)?;
    Ok(Json(serde_json::json!({ "exists": index.contains(&query.word) })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct TopSyllablesQuery {
    #[serde(default = "default_length")]
    pub length: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// `GET /top-syllables?length=L&limit=n` -- highest-count syllables.
pub async fn top_syllables(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<TopSyllablesQuery>,
) -> Result<Response, HttpError> {
    let index = index_or_not_ready(&state)?;
    let top: Vec<serde_json::Value> = index
        .top_syllables(query.length, query.limit)
        .into_iter()
        .map(|(syllable, count)| serde_json::json!({ "syllable": syllable, "count": count }))
        .collect();
    Ok(Json(top).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// `GET /search?q=Q&limit=n` -- fast path by syllable sample lists when
/// the query is syllable-sized, then the bounded scan as fallback.
pub async fn search(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, HttpError> {
    let index = index_or_not_ready(&state)?;
    let needle = query.q.trim().to_uppercase();
    if needle.is_empty() {
        return Ok(Json(serde_json::json!({ "words": [] })).into_response());
    }

    let len = needle.chars().count();
    let mut words = index.samples_for(len, &needle, query.limit);
    if words.len() < query.limit {
        for word in index.scan_containing(&needle, query.limit) {
            if words.len() >= query.limit {
                break;
            }
            if !words.contains(&word) {
                words.push(word);
            }
        }
    }
    Ok(Json(serde_json::json!({ "words": words })).into_response())
}

/// `GET /token` -- issues a fresh anti-scraping token bound to the IP.
pub async fn issue_token(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let token = state.guard.lock().await.generate_token(addr.ip());
    Json(serde_json::json!({ "token": token, "ttl": 300 })).into_response()
}

// ---------------------------------------------------------------------------
// Honeypots
// ---------------------------------------------------------------------------

/// `GET /api/words.json` -- honeypot. The guard has already tagged the
/// caller; the payload is plausible-looking but synthetic.
pub async fn honeypot_words() -> Response {
    Json(serde_json::json!({
        "version": 3,
        "words": ["MAISON", "ORDINATEUR", "FENETRE", "BOUTEILLE", "CHAPEAU"],
        "total": 212_847,
        "next_page": "/api/words.json?page=2",
    }))
    .into_response()
}

/// `GET /dictionary.txt` -- the download path never serves the real
/// dictionary.
pub async fn honeypot_dictionary() -> Response {
    HttpError::NotFound.into_response()
}
