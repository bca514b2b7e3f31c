use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::AppState;
use crate::auth::auth::AuthEmployee;
use crate::model::pay_period::{PayFrequency, PayPeriod};
use crate::utils::policy_cache::resolve_policy;

#[derive(Deserialize, ToSchema)]
pub struct GeneratePeriods {
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,

    #[schema(example = "2026-03-29", value_type = String, format = "date")]
    pub end_date: NaiveDate,

    #[schema(example = "biweekly")]
    pub frequency: PayFrequency,
}

#[derive(Deserialize, ToSchema)]
pub struct ExportRequest {
    /// External batch identifier; generated when absent.
    pub batch_id: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HoursQuery {
    #[schema(example = 1001)]
    /// Restrict the report to one employee
    pub employee_id: Option<u64>,
}

async fn load_period(
    state: &AppState,
    company_id: u64,
    period_id: u64,
) -> actix_web::Result<Option<PayPeriod>> {
    let period = state.periods.find(period_id).await.map_err(|e| {
        tracing::error!(error = %e, period_id, "Failed to fetch pay period");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    // Tenant scoping: a period from another company is simply not found.
    Ok(period.filter(|p| p.company_id == company_id))
}

/// Generate pay periods over a date range
#[utoipa::path(
    post,
    path = "/api/v1/pay-periods/generate",
    request_body = GeneratePeriods,
    responses(
        (status = 200, description = "Periods covering the range", body = Object, example = json!({
            "message": "Pay periods generated",
            "count": 6
        })),
        (status = 400, description = "Bad date range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Pay periods"
)]
pub async fn generate(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    payload: web::Json<GeneratePeriods>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    if payload.start_date > payload.end_date {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "start_date cannot be after end_date"
        })));
    }

    let periods = state
        .payroll
        .generate_pay_periods(
            auth.company_id,
            payload.start_date,
            payload.end_date,
            payload.frequency,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, company_id = auth.company_id, "Failed to generate pay periods");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Pay periods generated",
        "count": periods.len(),
        "periods": periods
    })))
}

/// Approve a pay period
#[utoipa::path(
    put,
    path = "/api/v1/pay-periods/{period_id}/approve",
    params(
        ("period_id" = u64, Path, description = "ID of the pay period to approve")
    ),
    responses(
        (status = 200, description = "Period approved, completed entries cascaded"),
        (status = 404, description = "Pay period not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Pay periods"
)]
pub async fn approve(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let period_id = path.into_inner();
    let Some(period) = load_period(&state, auth.company_id, period_id).await? else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Pay period not found"
        })));
    };

    let approved = state
        .payroll
        .approve_pay_period(&period, auth.user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, period_id, "Approve pay period failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Pay period approved",
        "period": approved
    })))
}

/// Mark a pay period's approved entries as exported
#[utoipa::path(
    post,
    path = "/api/v1/pay-periods/{period_id}/export",
    request_body = ExportRequest,
    params(
        ("period_id" = u64, Path, description = "ID of the pay period to export")
    ),
    responses(
        (status = 200, description = "Approved entries flipped to paid", body = Object, example = json!({
            "message": "Entries exported",
            "batch_id": "0e2f9f6e-6f3e-4b7a-9d35-02f0c0b9c1a4",
            "exported": 52
        })),
        (status = 404, description = "Pay period not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Pay periods"
)]
pub async fn export(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<ExportRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let period_id = path.into_inner();
    let Some(period) = load_period(&state, auth.company_id, period_id).await? else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Pay period not found"
        })));
    };

    let batch_id = payload
        .batch_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let exported = state
        .payroll
        .mark_as_exported(&period, &batch_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, period_id, "Export marking failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Entries exported",
        "batch_id": batch_id,
        "exported": exported
    })))
}

/// Re-run weekly overtime classification over a pay period
#[utoipa::path(
    post,
    path = "/api/v1/pay-periods/{period_id}/recalculate",
    params(
        ("period_id" = u64, Path, description = "ID of the pay period to recalculate")
    ),
    responses(
        (status = 200, description = "Entries reclassified", body = Object, example = json!({
            "message": "Pay period recalculated",
            "updated": 48
        })),
        (status = 404, description = "Pay period not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Pay periods"
)]
pub async fn recalculate(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let period_id = path.into_inner();
    let Some(period) = load_period(&state, auth.company_id, period_id).await? else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Pay period not found"
        })));
    };

    let policy = resolve_policy(state.policies.as_ref(), auth.company_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, company_id = auth.company_id, "Failed to load time policy");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let updated = state
        .payroll
        .recalculate_pay_period(&period, &policy)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, period_id, "Recalculation failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Pay period recalculated",
        "updated": updated
    })))
}

/// Per-employee hours report for a pay period
#[utoipa::path(
    get,
    path = "/api/v1/pay-periods/{period_id}/hours",
    params(
        ("period_id" = u64, Path, description = "ID of the pay period"),
        HoursQuery
    ),
    responses(
        (status = 200, description = "Per-employee hour totals"),
        (status = 404, description = "Pay period not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Pay periods"
)]
pub async fn hours(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    query: web::Query<HoursQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let period_id = path.into_inner();
    let Some(period) = load_period(&state, auth.company_id, period_id).await? else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Pay period not found"
        })));
    };

    let policy = resolve_policy(state.policies.as_ref(), auth.company_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, company_id = auth.company_id, "Failed to load time policy");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let summaries = state
        .payroll
        .calculate_pay_period_hours(&period, &policy, query.employee_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, period_id, "Hours report failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(summaries))
}

/// Aggregate statistics over every entry in a pay period
#[utoipa::path(
    get,
    path = "/api/v1/pay-periods/{period_id}/summary",
    params(
        ("period_id" = u64, Path, description = "ID of the pay period")
    ),
    responses(
        (status = 200, description = "Aggregate entry statistics"),
        (status = 404, description = "Pay period not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Pay periods"
)]
pub async fn summary(
    auth: AuthEmployee,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let period_id = path.into_inner();
    let Some(period) = load_period(&state, auth.company_id, period_id).await? else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Pay period not found"
        })));
    };

    let stats = state.payroll.summary_statistics(&period).await.map_err(|e| {
        tracing::error!(error = %e, period_id, "Summary statistics failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(stats))
}
