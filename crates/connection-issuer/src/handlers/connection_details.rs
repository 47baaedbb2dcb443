//! Connection details handler.
//!
//! `GET /connection-details` turns a room name and display name into a
//! `ConnectionDetails` descriptor. The token comes from one of two places:
//!
//! - `serverType=livekit`: signed locally with the configured API key
//! - anything else: requested from the delegated token backend
//!
//! Every successful response also sets the identity cookie so a returning
//! browser keeps its identity suffix.

use crate::errors::IssuerError;
use crate::models::ConnectionDetailsQuery;
use crate::observability::metrics;
use crate::routes::AppState;
use crate::services::delegate_client::{normalize_server_url, CreateTokenRequest};
use crate::services::identity::{build_cookie, resolve_suffix};
use crate::services::region_resolver::resolve_server_url;
use crate::services::token_issuer::{sign_participant_token, ParticipantTokenRequest};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use common::types::{participant_identity, ConnectionDetails, ServerType};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Handler for GET /connection-details
///
/// # Query parameters
///
/// - `roomName` (required)
/// - `participantName` (required, may be empty)
/// - `metadata` (optional, default empty)
/// - `region` (optional, direct signing only)
/// - `serverType` (optional, `livekit` selects direct signing)
///
/// # Response
///
/// - 200 OK with `ConnectionDetails` JSON and a `Set-Cookie` header
/// - 400 Bad Request if a required parameter is absent
/// - 500 Internal Server Error for configuration, region, signing and
///   backend failures
#[instrument(
    skip_all,
    name = "issuer.connection_details",
    fields(room_name, mode)
)]
pub async fn get_connection_details(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectionDetailsQuery>,
    headers: HeaderMap,
) -> Result<Response, IssuerError> {
    let start = Instant::now();
    let mode = ServerType::from_query(query.server_type.as_deref());
    tracing::Span::current().record("mode", mode.as_str());

    let result = issue(&state, query, &headers, mode).await;

    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_token_issuance(mode.as_str(), status, start.elapsed());

    result
}

async fn issue(
    state: &AppState,
    query: ConnectionDetailsQuery,
    headers: &HeaderMap,
    mode: ServerType,
) -> Result<Response, IssuerError> {
    let room_name = query
        .room_name
        .ok_or(IssuerError::MissingParameter("roomName"))?;
    let participant_name = query
        .participant_name
        .ok_or(IssuerError::MissingParameter("participantName"))?;
    let metadata = query.metadata.unwrap_or_default();

    tracing::Span::current().record("room_name", room_name.as_str());

    let suffix = resolve_suffix(headers)?;
    let identity = participant_identity(&participant_name, &suffix.value);

    let (server_url, participant_token) = match mode {
        ServerType::LiveKit => {
            let credentials = state.config.signing.as_ref().ok_or_else(|| {
                IssuerError::Configuration(
                    "LIVEKIT_API_KEY and LIVEKIT_API_SECRET are required for LiveKit server mode"
                        .to_string(),
                )
            })?;

            let server_url = resolve_server_url(&state.config, query.region.as_deref())?;

            let token = sign_participant_token(
                credentials,
                &ParticipantTokenRequest {
                    room_name: &room_name,
                    participant_name: &participant_name,
                    identity: &identity,
                    metadata: &metadata,
                },
                Utc::now().timestamp(),
            )?;

            (server_url.to_string(), token)
        }
        ServerType::Custom => {
            let response = state
                .delegate
                .create_token(&CreateTokenRequest {
                    room_name: room_name.clone(),
                    participant_name: identity,
                    metadata,
                })
                .await?;

            let server_url = normalize_server_url(
                response.server_url.as_deref(),
                &state.config.livekit_url,
            );

            (server_url, response.participant_token)
        }
    };

    info!(
        target: "issuer.handlers.connection_details",
        room_name = %room_name,
        mode = %mode,
        suffix_source = ?suffix.source,
        "Issued connection details"
    );

    let details = ConnectionDetails {
        server_url,
        room_name,
        participant_token,
        participant_name,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, build_cookie(&suffix.value, Utc::now()))],
        Json(details),
    )
        .into_response())
}

/// Handler for OPTIONS /connection-details
///
/// Answers CORS preflight with an empty 200. The CORS headers themselves are
/// added to every response by the router.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
