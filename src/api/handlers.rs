use actix_web::{web, HttpRequest, HttpResponse};

use super::{ApiError, AppState};
use crate::geolocation::{GeoLocator, LookupTarget};
use crate::model::{Decision, RiskModel};
use crate::models::{
    AdaptiveLoginRequest, AdaptiveLoginResult, GeolocationResult, LocationSummary, NotifyRequest,
    NotifyResult,
};
use crate::notify::SmsSender;

pub const LIVENESS_MESSAGE: &str = "Backend server is running properly!";
pub const GEOLOCATION_FAILED: &str = "Failed to fetch geolocation";
pub const ADAPTIVE_LOGIN_FAILED: &str = "Failed to process adaptive login";
pub const NOTIFY_FAILED: &str = "Failed to send notification";
pub const LOGIN_FIELDS_REQUIRED: &str = "userId and ip are required";
pub const NOTIFY_FIELDS_REQUIRED: &str = "to and message are required";
pub const INVALID_JSON: &str = "Invalid JSON body";

/// `GET /`
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(LIVENESS_MESSAGE)
}

/// `POST /geolocation`: locate the caller. The body is ignored.
pub async fn geolocation(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let target = LookupTarget::Requester(req.peer_addr().map(|addr| addr.ip()));

    let location = state.geolocator.lookup(&target).await.map_err(|e| {
        log::error!("Error fetching geolocation: {}", e);
        ApiError::from_upstream(e.is_timeout(), GEOLOCATION_FAILED)
    })?;

    Ok(HttpResponse::Ok().json(GeolocationResult { location }))
}

/// `POST /adaptive-login`: locate `ip`, score the coordinates, decide
pub async fn adaptive_login(
    state: web::Data<AppState>,
    body: web::Json<AdaptiveLoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, ip) = body
        .fields()
        .ok_or_else(|| ApiError::InvalidInput(LOGIN_FIELDS_REQUIRED.to_string()))?;

    let payload = state
        .geolocator
        .lookup(&LookupTarget::Address(ip.to_string()))
        .await
        .map_err(|e| {
            log::error!("Error during adaptive login for {}: geolocation failed: {}", user_id, e);
            ApiError::from_upstream(e.is_timeout(), ADAPTIVE_LOGIN_FAILED)
        })?;

    let location = LocationSummary::from_payload(&payload).map_err(|e| {
        log::error!("Error during adaptive login for {}: {}", user_id, e);
        ApiError::Upstream(ADAPTIVE_LOGIN_FAILED.to_string())
    })?;

    let score = state.model.predict(&location.features()).map_err(|e| {
        log::error!("Error during adaptive login for {}: inference failed: {}", user_id, e);
        ApiError::Internal(ADAPTIVE_LOGIN_FAILED.to_string())
    })?;

    let decision = Decision::from_score(score, state.threshold);
    log::info!(
        "Adaptive login: user {} from {} scored {:.4} -> {}",
        user_id,
        ip,
        score,
        decision
    );

    Ok(HttpResponse::Ok().json(AdaptiveLoginResult { location, decision }))
}

/// `POST /notify`: send one SMS
pub async fn notify(
    state: web::Data<AppState>,
    body: web::Json<NotifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let (to, message) = body
        .fields()
        .ok_or_else(|| ApiError::InvalidInput(NOTIFY_FIELDS_REQUIRED.to_string()))?;

    let result = state.sms.send(to, message).await.map_err(|e| {
        log::error!("Error sending notification: {}", e);
        ApiError::from_upstream(e.is_timeout(), NOTIFY_FAILED)
    })?;

    Ok(HttpResponse::Ok().json(NotifyResult::sent(result)))
}
