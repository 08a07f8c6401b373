use crate::errors::{AppError, AppResult};
use crate::models::{ApiResponse, HealthResponse, LeaveMessagePayload, LogInputPayload, PromptAuthPayload};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

pub const UNKNOWN_ORIGIN: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// The verdict travels in `success`; a well-formed request is always 200.
pub async fn prompt_auth(
    State(state): State<AppState>,
    payload: Result<Json<PromptAuthPayload>, JsonRejection>,
) -> AppResult<Json<ApiResponse>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    let authorized = state.service.check_code(&payload);
    let message = if authorized {
        "Access code accepted."
    } else {
        "Wrong access code."
    };
    Ok(Json(ApiResponse {
        success: authorized,
        message: Some(message.to_string()),
    }))
}

pub async fn leave_message(
    State(state): State<AppState>,
    payload: Result<Json<LeaveMessagePayload>, JsonRejection>,
) -> AppResult<Json<ApiResponse>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    state.service.leave_message(payload).await?;
    Ok(Json(ApiResponse::success("Message saved, thanks for your support!")))
}

pub async fn user_input_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LogInputPayload>, JsonRejection>,
) -> AppResult<Json<ApiResponse>> {
    let Json(payload) = payload.map_err(invalid_body)?;
    let origin = client_origin(&headers);
    state.service.log_input(payload, Some(origin)).await?;
    Ok(Json(ApiResponse::ok()))
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`, else `unknown`.
pub fn client_origin(headers: &HeaderMap) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    header_value(FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| header_value(REAL_IP))
        .unwrap_or(UNKNOWN_ORIGIN)
        .to_string()
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    tracing::debug!(error = %rejection.body_text(), "rejected request body");
    AppError::Validation("Request body must be a JSON object.".to_string())
}
