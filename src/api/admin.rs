//! Manager-only listing and reports

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        record::{RecordQuery, ValetRecord},
        report::ReportQuery,
    },
    services::email::report_attachment_name,
    AppState,
};

use super::{required_date, ManagerAgent};

#[derive(Serialize, ToSchema)]
pub struct RecordsResponse {
    pub records: Vec<ValetRecord>,
}

/// List records, newest first
#[utoipa::path(
    get,
    path = "/admin/records",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(RecordQuery),
    responses(
        (status = 200, description = "Up to 500 records", body = RecordsResponse),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse),
        (status = 403, description = "Manager access required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_records(
    State(state): State<AppState>,
    ManagerAgent(_manager): ManagerAgent,
    WithRejection(Query(query), _): WithRejection<Query<RecordQuery>, AppError>,
) -> AppResult<Json<RecordsResponse>> {
    let records = state.services.valet.list_records(&query).await?;
    Ok(Json(RecordsResponse { records }))
}

/// Daily report as a CSV download
#[utoipa::path(
    get,
    path = "/admin/reports/daily",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
        (status = 400, description = "Date missing or malformed", body = crate::error::ErrorResponse),
        (status = 403, description = "Manager access required", body = crate::error::ErrorResponse)
    )
)]
pub async fn daily_report_csv(
    State(state): State<AppState>,
    ManagerAgent(_manager): ManagerAgent,
    WithRejection(Query(query), _): WithRejection<Query<ReportQuery>, AppError>,
) -> AppResult<impl IntoResponse> {
    let date = required_date(query.date.as_deref())?;
    let csv = state.services.reports.daily_csv(date).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report_attachment_name(date)),
            ),
        ],
        csv,
    ))
}

/// Daily report as an HTML fragment
#[utoipa::path(
    get,
    path = "/admin/reports/daily/html",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "HTML summary", content_type = "text/html", body = String),
        (status = 400, description = "Date missing or malformed", body = crate::error::ErrorResponse),
        (status = 403, description = "Manager access required", body = crate::error::ErrorResponse)
    )
)]
pub async fn daily_report_html(
    State(state): State<AppState>,
    ManagerAgent(_manager): ManagerAgent,
    WithRejection(Query(query), _): WithRejection<Query<ReportQuery>, AppError>,
) -> AppResult<Html<String>> {
    let date = required_date(query.date.as_deref())?;
    let html = state.services.reports.daily_html(date).await?;
    Ok(Html(html))
}
