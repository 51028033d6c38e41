//! Arrival, departure and open-record search endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::{multipart::MultipartError, Multipart, WithRejection};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::record::{CreateArrival, SearchQuery, ValetRecord},
    services::photos::Photo,
    AppState,
};

use super::AuthenticatedAgent;

#[derive(Serialize, ToSchema)]
pub struct ArrivalResponse {
    pub success: bool,
    pub message: String,
    pub record: ValetRecord,
}

#[derive(Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<ValetRecord>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartureRequest {
    pub record_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartureResponse {
    pub success: bool,
    pub message: String,
    pub duration_minutes: i64,
    pub record: ValetRecord,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        AppError::BadRequest(format!("Invalid multipart body: {}", e))
    }
}

/// Register a vehicle arrival with its photo
#[utoipa::path(
    post,
    path = "/arrivals",
    tag = "records",
    security(("bearer_auth" = [])),
    request_body(content = CreateArrival, content_type = "multipart/form-data",
        description = "Form fields plus an `image` file part"),
    responses(
        (status = 201, description = "Arrival recorded", body = ArrivalResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Ticket already open", body = crate::error::ErrorResponse),
        (status = 413, description = "Image too large", body = crate::error::ErrorResponse),
        (status = 500, description = "Photo or storage failure", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_arrival(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    WithRejection(mut multipart, _): WithRejection<Multipart, AppError>,
) -> AppResult<(StatusCode, Json<ArrivalResponse>)> {
    let mut form = CreateArrival::default();
    let mut photo = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            photo = Some(Photo {
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "ticketUid" => form.ticket_uid = value,
            "plateNumber" => form.plate_number = value,
            "notes" => form.notes = Some(value),
            "vehicleMake" => form.vehicle_make = Some(value),
            "vehicleModel" => form.vehicle_model = Some(value),
            "vehicleColor" => form.vehicle_color = Some(value),
            _ => {}
        }
    }

    let record = state
        .services
        .valet
        .create_arrival(form, &agent.id, photo)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ArrivalResponse {
            success: true,
            message: "Vehicle arrival recorded".to_string(),
            record,
        }),
    ))
}

/// Search open records by ticket or plate
#[utoipa::path(
    get,
    path = "/records/search",
    tag = "records",
    security(("bearer_auth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching open records", body = SearchResponse),
        (status = 400, description = "Query missing or out of bounds", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_records(
    State(state): State<AppState>,
    AuthenticatedAgent(_agent): AuthenticatedAgent,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, AppError>,
) -> AppResult<Json<SearchResponse>> {
    let results = state.services.valet.search_open(query.query.as_deref()).await?;
    Ok(Json(SearchResponse { results }))
}

/// Close an open record when the vehicle leaves
#[utoipa::path(
    post,
    path = "/departures",
    tag = "records",
    security(("bearer_auth" = [])),
    request_body = DepartureRequest,
    responses(
        (status = 200, description = "Departure recorded", body = DepartureResponse),
        (status = 400, description = "Invalid record id", body = crate::error::ErrorResponse),
        (status = 404, description = "Record not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Record already closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn record_departure(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    WithRejection(Json(request), _): WithRejection<Json<DepartureRequest>, AppError>,
) -> AppResult<Json<DepartureResponse>> {
    let record_id = request
        .record_id
        .ok_or_else(|| AppError::Validation("recordId is required".to_string()))?;

    let (record, duration_minutes) = state
        .services
        .valet
        .close_departure(&record_id, &agent.id)
        .await?;

    Ok(Json(DepartureResponse {
        success: true,
        message: "Vehicle departure recorded".to_string(),
        duration_minutes,
        record,
    }))
}
