//! Consent routes backed by the visitor's `consent_preferences` cookie.
//!
//! Every request gets its own cookie jar and manager; mutations answer with
//! the `Set-Cookie` headers the jar queued.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bulwark_consent::{ConsentCategory, ConsentManager, ConsentUpdate, CookieJar, CONSENT_UPDATED};
use serde_json::json;

use crate::state::AppState;

// ---------------------------------------------------------------
// Route builder
// ---------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/consent",
            get(get_consent).post(save_consent).delete(reset_consent),
        )
        .route("/consent/config", get(consent_config))
        .route("/consent/accept-all", post(accept_all))
        .route("/consent/reject-all", post(reject_all))
        .route("/consent/{category}", get(check_consent))
}

// ---------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------

fn open(state: &AppState, headers: &HeaderMap) -> (Arc<CookieJar>, ConsentManager) {
    let cookies = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok());
    let jar = Arc::new(
        CookieJar::from_headers(cookies).with_secure(state.config.consent.secure_cookie),
    );
    let manager = state.consent_manager(jar.clone());
    (jar, manager)
}

fn with_cookies(jar: &CookieJar, body: serde_json::Value) -> Response {
    let set_cookies: Vec<_> = jar
        .take_set_cookies()
        .into_iter()
        .map(|cookie| (header::SET_COOKIE, cookie))
        .collect();
    (AppendHeaders(set_cookies), Json(body)).into_response()
}

fn saved(jar: &CookieJar, record: bulwark_consent::ConsentRecord) -> Response {
    with_cookies(
        jar,
        json!({
            "event": CONSENT_UPDATED,
            "preferences": record,
        }),
    )
}

// ---------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------

/// GET /api/consent — current record and whether the banner should show.
async fn get_consent(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (jar, manager) = open(&state, &headers);
    let preferences = manager.get_consent_preferences();
    let has_any = preferences.is_some();
    with_cookies(
        &jar,
        json!({
            "preferences": preferences,
            "hasAnyConsent": has_any,
            "showBanner": !has_any,
            "bannerDelayMs": state.config.consent.banner_delay_ms,
        }),
    )
}

/// POST /api/consent — save explicit preferences.
async fn save_consent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<ConsentUpdate>,
) -> Response {
    let (jar, manager) = open(&state, &headers);
    let record = manager.save_consent_preferences(update);
    saved(&jar, record)
}

async fn accept_all(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (jar, manager) = open(&state, &headers);
    let record = manager.accept_all();
    saved(&jar, record)
}

async fn reject_all(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (jar, manager) = open(&state, &headers);
    let record = manager.reject_all();
    saved(&jar, record)
}

/// DELETE /api/consent — forget the record so the banner asks again.
async fn reset_consent(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (jar, manager) = open(&state, &headers);
    manager.reset_consent();
    with_cookies(
        &jar,
        json!({
            "event": CONSENT_UPDATED,
            "preferences": null,
        }),
    )
}

/// GET /api/consent/{category} — whether one category is allowed.
async fn check_consent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(category): Path<String>,
) -> Response {
    let category: ConsentCategory = match category.parse() {
        Ok(category) => category,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    };

    let (_jar, manager) = open(&state, &headers);
    Json(json!({
        "category": category,
        "allowed": manager.has_consent(category),
    }))
    .into_response()
}

/// GET /api/consent/config — settings the front end needs to render the banner.
async fn consent_config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let consent = &state.config.consent;
    Json(json!({
        "version": consent.policy_version,
        "cookieName": consent.cookie_name,
        "maxAgeDays": consent.max_age_days,
        "bannerDelayMs": consent.banner_delay_ms,
        "categories": ConsentCategory::all(),
        "event": CONSENT_UPDATED,
    }))
}
