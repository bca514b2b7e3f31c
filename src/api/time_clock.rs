use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::auth::auth::AuthEmployee;
use crate::error::TimeClockError;
use crate::model::time_entry::ClockContext;
use crate::utils::policy_cache::resolve_policy;

#[derive(Deserialize, ToSchema)]
pub struct ClockInRequest {
    /// Overrides the scheduled shift when given.
    pub shift_id: Option<u64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[schema(value_type = Object, nullable = true)]
    pub device: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ClockOutRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[schema(value_type = Object, nullable = true)]
    pub device: Option<serde_json::Value>,
}

fn client_ip(req: &HttpRequest) -> Option<String> {
    let info = req.connection_info();
    info.realip_remote_addr()
        .and_then(|addr| addr.split(':').next())
        .map(str::to_string)
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/timeclock/clock-in",
    request_body = ClockInRequest,
    responses(
        (status = 200, description = "Clocked in", body = Object, example = json!({
            "message": "Clocked in"
        })),
        (status = 400, description = "Validation failed or entry already active"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Time clock"
)]
pub async fn clock_in(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    payload: web::Json<ClockInRequest>,
    req: HttpRequest,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;

    let policy = resolve_policy(state.policies.as_ref(), auth.company_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, company_id = auth.company_id, "Failed to load time policy");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let ctx = ClockContext {
        ip: client_ip(&req),
        lat: payload.lat,
        lng: payload.lng,
        device: payload.device.clone(),
    };

    let result = state
        .time_clock
        .clock_in(
            auth.company_id,
            employee_id,
            &policy,
            &ctx,
            payload.shift_id,
            payload.notes.clone(),
        )
        .await;

    match result {
        Ok(entry) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Clocked in",
            "entry": entry
        }))),
        Err(TimeClockError::AlreadyActiveEntry) => {
            Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "You already have an active time entry"
            })))
        }
        Err(TimeClockError::ValidationFailed(errors)) => {
            Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Clock-in validation failed",
                "errors": errors
            })))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id, "Clock-in failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/timeclock/clock-out",
    request_body = ClockOutRequest,
    responses(
        (status = 200, description = "Clocked out", body = Object, example = json!({
            "message": "Clocked out"
        })),
        (status = 400, description = "No active time entry or already clocked out"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Time clock"
)]
pub async fn clock_out(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    payload: web::Json<ClockOutRequest>,
    req: HttpRequest,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;

    let policy = resolve_policy(state.policies.as_ref(), auth.company_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, company_id = auth.company_id, "Failed to load time policy");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let entry = state
        .time_clock
        .active_entry(auth.company_id, employee_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Failed to look up active entry");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    let Some(entry) = entry else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "No active time entry found"
        })));
    };

    let ctx = ClockContext {
        ip: client_ip(&req),
        lat: payload.lat,
        lng: payload.lng,
        device: payload.device.clone(),
    };

    match state.time_clock.clock_out(&entry, &policy, &ctx).await {
        Ok(entry) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Clocked out",
            "entry": entry
        }))),
        Err(TimeClockError::AlreadyClockedOut) => {
            Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Already clocked out"
            })))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id, "Clock-out failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Active entry lookup
#[utoipa::path(
    get,
    path = "/api/v1/timeclock/active",
    responses(
        (status = 200, description = "Active time entry"),
        (status = 404, description = "No active time entry"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Time clock"
)]
pub async fn active_entry(
    auth: AuthEmployee,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;

    let entry = state
        .time_clock
        .active_entry(auth.company_id, employee_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Failed to look up active entry");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    match entry {
        Some(entry) => Ok(HttpResponse::Ok().json(entry)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "No active time entry"
        }))),
    }
}

/// Pre-flight clock-in validation
#[utoipa::path(
    post,
    path = "/api/v1/timeclock/validate",
    request_body = ClockInRequest,
    responses(
        (status = 200, description = "Validation result, every failing rule listed", body = Object,
         example = json!({
            "valid": false,
            "errors": ["GPS coordinates are required to clock in"]
         })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Time clock"
)]
pub async fn validate(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    payload: web::Json<ClockInRequest>,
    req: HttpRequest,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.employee_id()?;

    let policy = resolve_policy(state.policies.as_ref(), auth.company_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, company_id = auth.company_id, "Failed to load time policy");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let ctx = ClockContext {
        ip: client_ip(&req),
        lat: payload.lat,
        lng: payload.lng,
        device: payload.device.clone(),
    };

    let validation = state
        .time_clock
        .validate_clock_in(auth.company_id, employee_id, &policy, &ctx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Clock-in validation failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "valid": validation.is_valid(),
        "errors": validation.errors
    })))
}
