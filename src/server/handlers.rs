use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::location::{format_coords, Coordinate, Resolution};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

/// Token cancelled when the handler future is dropped (client went away).
fn request_token() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

// ─── Resolution bodies ───────────────────────────────────────────

#[derive(Serialize)]
pub struct LocatedResponse {
    pub lat: f64,
    pub lng: f64,
    pub formatted_coords: String,
    pub maps_url: String,
}

impl From<Coordinate> for LocatedResponse {
    fn from(c: Coordinate) -> Self {
        Self {
            lat: c.lat(),
            lng: c.lng(),
            formatted_coords: format_coords(c.lat(), c.lng()),
            maps_url: c.maps_url(),
        }
    }
}

fn resolution_response(input: &str, resolution: Resolution) -> Response {
    match resolution {
        Resolution::Coordinate { coordinate } => Json(LocatedResponse::from(coordinate)).into_response(),
        r @ Resolution::Candidates { .. } => Json(r).into_response(),
        Resolution::NotFound => api_error(
            StatusCode::NOT_FOUND,
            format!("Location not found: '{input}'. Try a different search term or paste coordinates directly."),
        )
        .into_response(),
        Resolution::Unavailable => api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Location services are unreachable right now. Paste coordinates directly.",
        )
        .into_response(),
    }
}

// ─── GET /api/resolve ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub input: Option<String>,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveQuery>,
) -> Response {
    let start = Instant::now();
    let input = params.input.as_deref().unwrap_or("").trim();
    if input.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "Missing 'input' parameter").into_response();
    }

    let (token, _guard) = request_token();
    let Ok(resolution) = state.resolver.resolve_input(input, &token).await else {
        return api_error(StatusCode::REQUEST_TIMEOUT, "Request cancelled").into_response();
    };

    tracing::info!(
        input,
        found = resolution.is_found(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/resolve"
    );
    resolution_response(input, resolution)
}

// ─── GET /api/suggest ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SuggestQuery {
    pub q: Option<String>,
}

pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestQuery>,
) -> Response {
    let q = params.q.unwrap_or_default();
    let (token, _guard) = request_token();
    match state.resolver.suggest(&q, &token).await {
        // An empty list is a normal answer for a dropdown.
        Ok(Resolution::NotFound) => Json(Resolution::Candidates { candidates: Vec::new() }).into_response(),
        Ok(resolution) => resolution_response(&q, resolution),
        Err(_) => api_error(StatusCode::REQUEST_TIMEOUT, "Request cancelled").into_response(),
    }
}

// ─── GET /api/city ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CityQuery {
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct CityCentreResponse {
    pub city: String,
    pub located: bool,
    #[serde(flatten)]
    pub centre: LocatedResponse,
}

pub async fn city_centre(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityQuery>,
) -> Result<Json<CityCentreResponse>, ApiError> {
    let city = params.name.as_deref().unwrap_or("").trim().to_string();
    if city.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing 'name' parameter"));
    }

    let (token, _guard) = request_token();
    let centre = state
        .cities
        .locate_or_default(&city, &token)
        .await
        .map_err(|_| api_error(StatusCode::REQUEST_TIMEOUT, "Request cancelled"))?;

    Ok(Json(CityCentreResponse {
        city,
        located: centre.located,
        centre: centre.coordinate.into(),
    }))
}

// ─── GET /api/cities, /api/areas ─────────────────────────────────

pub async fn city_list(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.areas.cities().await)
}

#[derive(Deserialize)]
pub struct AreasQuery {
    pub city: Option<String>,
}

pub async fn area_list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AreasQuery>,
) -> Json<Vec<String>> {
    let areas = match params.city.as_deref().map(str::trim) {
        Some(city) if !city.is_empty() => state.areas.areas_for_city(city).await,
        _ => state.areas.all_areas().await,
    };
    Json(areas)
}

pub async fn health() -> &'static str {
    "ok"
}
