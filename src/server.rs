// Clinic API - HTTP Layer
// Router and handlers. Every handler validates its parameters into closed
// types before touching the store; the shared connection handle is injected
// through axum state.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cursor;
use crate::db::Db;
use crate::error::ApiError;
use crate::models::{Gender, Patient, Source};
use crate::pagination::{validate_limit, Page, SortOrder};
use crate::queries::analytics;
use crate::queries::patients::{
    get_patient_detail, list_patients, ListCursor, PatientDetail, PatientFilter, PatientSortField,
};
use crate::queries::providers::{list_providers, ProviderCursor, ProviderRow};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/patients", get(patients_handler))
        .route("/patients/:id", get(patient_detail_handler))
        .route("/providers", get(providers_handler))
        .route("/analytics/demographics", get(demographics_handler))
        .route("/analytics/sources", get(sources_handler))
        .route("/analytics/services", get(services_handler))
        .route("/analytics/providers", get(providers_analytics_handler))
        .route("/analytics/appointments", get(appointments_handler))
        .route("/analytics/business", get(business_handler))
        .route("/analytics/patient-behavior", get(patient_behavior_handler))
        .with_state(state);

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Malformed cursors are treated as "no cursor": the listing restarts from
/// the first page instead of failing, so stale client-held tokens stay
/// harmless. Logged so client-side corruption remains visible server-side.
fn decode_cursor_lenient<T: DeserializeOwned>(token: Option<&str>) -> Option<T> {
    let token = token?;
    let state = cursor::decode(token);
    if state.is_none() {
        tracing::debug!(token, "discarding malformed cursor");
    }
    state
}

fn parse_enum_filter<T>(
    field: &'static str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => parse(raw)
            .map(Some)
            .ok_or_else(|| ApiError::invalid(field, format!("`{raw}` is not a recognized value"))),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct PatientListQuery {
    cursor: Option<String>,
    limit: Option<i64>,
    search: Option<String>,
    gender: Option<String>,
    source: Option<String>,
    #[serde(rename = "sortBy")]
    sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    sort_order: Option<String>,
}

async fn patients_handler(
    State(state): State<AppState>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Page<Patient>>, ApiError> {
    let limit = validate_limit(query.limit)?;
    let sort = PatientSortField::parse(query.sort_by.as_deref())?;
    let order = SortOrder::parse(query.sort_order.as_deref())?;
    let filter = PatientFilter {
        search: query.search.filter(|s| !s.is_empty()),
        gender: parse_enum_filter("gender", query.gender.as_deref(), Gender::parse)?,
        source: parse_enum_filter("source", query.source.as_deref(), Source::parse)?,
    };
    let cursor = decode_cursor_lenient::<ListCursor>(query.cursor.as_deref());

    let conn = state.db.lock().unwrap();
    let page = list_patients(&conn, &filter, sort, order, cursor, limit)?;
    Ok(Json(page))
}

async fn patient_detail_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<PatientDetail>, ApiError> {
    let conn = state.db.lock().unwrap();
    let detail = get_patient_detail(&conn, &patient_id)?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct ProviderListQuery {
    cursor: Option<String>,
    limit: Option<i64>,
    search: Option<String>,
}

async fn providers_handler(
    State(state): State<AppState>,
    Query(query): Query<ProviderListQuery>,
) -> Result<Json<Page<ProviderRow>>, ApiError> {
    let limit = validate_limit(query.limit)?;
    let search = query.search.filter(|s| !s.is_empty());
    let cursor = decode_cursor_lenient::<ProviderCursor>(query.cursor.as_deref());

    let conn = state.db.lock().unwrap();
    let page = list_providers(&conn, search.as_deref(), cursor, limit)?;
    Ok(Json(page))
}

async fn demographics_handler(
    State(state): State<AppState>,
) -> Result<Json<analytics::Demographics>, ApiError> {
    let conn = state.db.lock().unwrap();
    let snapshot = analytics::demographics(&conn, Utc::now().date_naive())?;
    Ok(Json(snapshot))
}

async fn sources_handler(
    State(state): State<AppState>,
) -> Result<Json<analytics::Sources>, ApiError> {
    let conn = state.db.lock().unwrap();
    Ok(Json(analytics::sources(&conn)?))
}

async fn services_handler(
    State(state): State<AppState>,
) -> Result<Json<analytics::ServicesAnalytics>, ApiError> {
    let conn = state.db.lock().unwrap();
    Ok(Json(analytics::services(&conn)?))
}

async fn providers_analytics_handler(
    State(state): State<AppState>,
) -> Result<Json<analytics::ProvidersAnalytics>, ApiError> {
    let conn = state.db.lock().unwrap();
    Ok(Json(analytics::providers(&conn)?))
}

async fn appointments_handler(
    State(state): State<AppState>,
) -> Result<Json<analytics::AppointmentsAnalytics>, ApiError> {
    let conn = state.db.lock().unwrap();
    Ok(Json(analytics::appointments(&conn)?))
}

async fn business_handler(
    State(state): State<AppState>,
) -> Result<Json<analytics::BusinessAnalytics>, ApiError> {
    let conn = state.db.lock().unwrap();
    Ok(Json(analytics::business(&conn)?))
}

async fn patient_behavior_handler(
    State(state): State<AppState>,
) -> Result<Json<analytics::PatientBehavior>, ApiError> {
    let conn = state.db.lock().unwrap();
    Ok(Json(analytics::patient_behavior(&conn)?))
}
