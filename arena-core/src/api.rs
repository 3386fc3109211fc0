//! HTTP API
//!
//! Thin actix-web layer over [`Arena`]. The caller identity is read from the
//! `x-user-id` header, which the upstream auth gateway sets after verifying
//! the session; a missing or malformed header means "not authenticated".

use crate::types::{GameId, MatchId, ProfileUpdate, UserId};
use crate::{Arena, Error};
use actix_web::{
    dev::Payload, error::ResponseError, http::StatusCode, web, FromRequest, HttpRequest,
    HttpResponse,
};
use serde::Deserialize;
use serde_json::json;
use std::future::{ready, Ready};
use std::sync::Arc;

/// Header carrying the authenticated user ID
pub const CALLER_HEADER: &str = "x-user-id";

/// Caller identity for one request
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Option<UserId>);

impl FromRequest for Caller {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let caller = req
            .headers()
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| UserId::parse(value.trim()));
        ready(Ok(Caller(caller)))
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidState(_) | Error::Full { .. } | Error::AlreadyJoined(_) => {
                StatusCode::CONFLICT
            }
            Error::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

type ArenaData = web::Data<Arc<Arena>>;

fn parse_id<T>(raw: &str, what: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, Error> {
    parse(raw).ok_or_else(|| Error::InvalidArgument(format!("Malformed {} id: {}", what, raw)))
}

/// Health check endpoint
pub async fn health_check(arena: ArenaData) -> HttpResponse {
    match arena.stats() {
        Ok(stats) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": arena.config().service_name,
            "version": arena.config().service_version,
            "users": stats.total_users,
            "matches": stats.total_matches,
            "transactions": stats.total_transactions,
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({
            "status": "unhealthy",
            "error": e.to_string(),
        })),
    }
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(arena: ArenaData) -> HttpResponse {
    match arena.metrics().render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "metrics",
            "message": e.to_string(),
        })),
    }
}

/// List active games
pub async fn list_games(arena: ArenaData) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(arena.list_games()?))
}

/// Get one game
pub async fn get_game(arena: ArenaData, id: web::Path<String>) -> Result<HttpResponse, Error> {
    let id = parse_id(&id, "game", GameId::parse)?;
    let game = arena
        .get_game(id)?
        .ok_or_else(|| Error::NotFound("Game".to_string()))?;
    Ok(HttpResponse::Ok().json(game))
}

/// Matches of a game, newest first
pub async fn list_matches_by_game(
    arena: ArenaData,
    id: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let id = parse_id(&id, "game", GameId::parse)?;
    Ok(HttpResponse::Ok().json(arena.list_matches_by_game(id)?))
}

/// Get one match
pub async fn get_match(arena: ArenaData, id: web::Path<String>) -> Result<HttpResponse, Error> {
    let id = parse_id(&id, "match", MatchId::parse)?;
    let found = arena
        .get_match(id)?
        .ok_or_else(|| Error::NotFound("Match".to_string()))?;
    Ok(HttpResponse::Ok().json(found))
}

/// Participants of a match
pub async fn get_participants(
    arena: ArenaData,
    id: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let id = parse_id(&id, "match", MatchId::parse)?;
    Ok(HttpResponse::Ok().json(arena.get_participants(id)?))
}

/// Join a match
pub async fn join_match(
    arena: ArenaData,
    caller: Caller,
    id: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let id = parse_id(&id, "match", MatchId::parse)?;
    arena.join_match(caller.0, id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Current balance; `null` without a session
pub async fn get_balance(arena: ArenaData, caller: Caller) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(json!({ "balance": arena.get_balance(caller.0)? })))
}

/// Most recent ledger entries
pub async fn get_transactions(arena: ArenaData, caller: Caller) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(arena.get_transactions(caller.0)?))
}

/// Deposit request body
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    /// Coins to add
    pub amount: f64,
}

/// Add funds to the wallet
pub async fn add_funds(
    arena: ArenaData,
    caller: Caller,
    request: web::Json<DepositRequest>,
) -> Result<HttpResponse, Error> {
    let receipt = arena.add_funds_f64(caller.0, request.amount).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "newBalance": receipt.new_balance,
    })))
}

/// Leaderboard
pub async fn top_players(arena: ArenaData) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(arena.top_players()?))
}

/// Caller's profile; `null` without a session
pub async fn get_profile(arena: ArenaData, caller: Caller) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(arena.get_profile(caller.0)?))
}

/// Patch the caller's profile
pub async fn update_profile(
    arena: ArenaData,
    caller: Caller,
    update: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, Error> {
    arena.update_profile(caller.0, update.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        Error::InvalidArgument(format!("Malformed request body: {}", err)).into()
    });

    cfg.app_data(json_config).service(
        web::scope("/api/v1")
            .route("/games", web::get().to(list_games))
            .route("/games/{id}", web::get().to(get_game))
            .route("/games/{id}/matches", web::get().to(list_matches_by_game))
            .route("/matches/{id}", web::get().to(get_match))
            .route("/matches/{id}/participants", web::get().to(get_participants))
            .route("/matches/{id}/join", web::post().to(join_match))
            .route("/wallet/balance", web::get().to(get_balance))
            .route("/wallet/transactions", web::get().to(get_transactions))
            .route("/wallet/deposit", web::post().to(add_funds))
            .route("/leaderboard", web::get().to(top_players))
            .route("/profile", web::get().to(get_profile))
            .route("/profile", web::patch().to(update_profile)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
