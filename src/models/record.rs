//! Valet parking record model and related types

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Bounds on a normalized plate number
pub const PLATE_MIN_LEN: usize = 2;
pub const PLATE_MAX_LEN: usize = 10;

/// Record status: a stay is `parked` until its single departure closes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Parked,
    Closed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Parked => "parked",
            RecordStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parked" => Ok(RecordStatus::Parked),
            "closed" => Ok(RecordStatus::Closed),
            _ => Err(format!("Invalid record status: {}", s)),
        }
    }
}

/// Strip everything but ASCII letters and digits, then uppercase
pub fn normalize_plate(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalize a plate and enforce the 2..=10 character bound
pub fn validated_plate(raw: &str) -> AppResult<String> {
    let plate = normalize_plate(raw);
    if plate.len() < PLATE_MIN_LEN || plate.len() > PLATE_MAX_LEN {
        return Err(AppError::Validation(format!(
            "License plate must be between {} and {} characters",
            PLATE_MIN_LEN, PLATE_MAX_LEN
        )));
    }
    Ok(plate)
}

/// Raw database row; timestamps are stored as RFC 3339 text
#[derive(Debug, Clone, FromRow)]
pub struct ValetRecordRow {
    id: String,
    ticket_uid: String,
    plate_number: String,
    plate_state: Option<String>,
    plate_country: Option<String>,
    vehicle_make: Option<String>,
    vehicle_model: Option<String>,
    vehicle_color: Option<String>,
    arrival_timestamp_utc: String,
    arrival_local: String,
    departure_timestamp_utc: Option<String>,
    departure_local: Option<String>,
    hotel_local_tz: String,
    image_original_url: Option<String>,
    image_thumb_url: Option<String>,
    notes: Option<String>,
    status: String,
    agent_id: String,
    created_at_utc: String,
    updated_at_utc: String,
}

fn parse_utc(column: &str, value: &str) -> AppResult<DateTime<Utc>> {
    Ok(parse_local(column, value)?.with_timezone(&Utc))
}

fn parse_local(column: &str, value: &str) -> AppResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| AppError::Internal(format!("Corrupt {} value {:?}: {}", column, value, e)))
}

impl TryFrom<ValetRecordRow> for ValetRecord {
    type Error = AppError;

    fn try_from(row: ValetRecordRow) -> Result<Self, Self::Error> {
        Ok(ValetRecord {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| AppError::Internal(format!("Corrupt record id {:?}: {}", row.id, e)))?,
            ticket_uid: row.ticket_uid,
            plate: Plate {
                number: row.plate_number,
                state: row.plate_state,
                country: row.plate_country,
            },
            vehicle: Vehicle {
                make: row.vehicle_make,
                model: row.vehicle_model,
                color: row.vehicle_color,
            },
            arrival_timestamp_utc: parse_utc("arrival_timestamp_utc", &row.arrival_timestamp_utc)?,
            arrival_local: parse_local("arrival_local", &row.arrival_local)?,
            departure_timestamp_utc: row
                .departure_timestamp_utc
                .as_deref()
                .map(|v| parse_utc("departure_timestamp_utc", v))
                .transpose()?,
            departure_local: row
                .departure_local
                .as_deref()
                .map(|v| parse_local("departure_local", v))
                .transpose()?,
            hotel_local_tz: row.hotel_local_tz,
            image: ImageRefs {
                original_url: row.image_original_url,
                thumb_url: row.image_thumb_url,
            },
            notes: row.notes,
            status: row.status.parse().map_err(AppError::Internal)?,
            agent_id: row.agent_id,
            created_at_utc: parse_utc("created_at_utc", &row.created_at_utc)?,
            updated_at_utc: parse_utc("updated_at_utc", &row.updated_at_utc)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Plate {
    /// Normalized plate: uppercase ASCII letters and digits
    pub number: String,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vehicle {
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

/// References returned by the photo store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRefs {
    pub original_url: Option<String>,
    pub thumb_url: Option<String>,
}

/// One vehicle stay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValetRecord {
    pub id: Uuid,
    /// Code printed on the physical ticket
    pub ticket_uid: String,
    pub plate: Plate,
    pub vehicle: Vehicle,
    pub arrival_timestamp_utc: DateTime<Utc>,
    /// Arrival rendered in the hotel timezone
    pub arrival_local: DateTime<FixedOffset>,
    pub departure_timestamp_utc: Option<DateTime<Utc>>,
    pub departure_local: Option<DateTime<FixedOffset>>,
    pub hotel_local_tz: String,
    pub image: ImageRefs,
    pub notes: Option<String>,
    pub status: RecordStatus,
    /// Agent who created the record, or closed it once departed
    pub agent_id: String,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl ValetRecord {
    pub fn is_open(&self) -> bool {
        self.status == RecordStatus::Parked
    }
}

/// Arrival form fields (the photo travels separately)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateArrival {
    #[validate(length(min = 2, max = 32, message = "Ticket UID must be 2-32 characters"))]
    pub ticket_uid: String,
    #[validate(length(min = 2, max = 20, message = "Plate number must be 2-20 characters"))]
    pub plate_number: String,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 60, message = "Vehicle make must be at most 60 characters"))]
    pub vehicle_make: Option<String>,
    #[validate(length(max = 60, message = "Vehicle model must be at most 60 characters"))]
    pub vehicle_model: Option<String>,
    #[validate(length(max = 60, message = "Vehicle color must be at most 60 characters"))]
    pub vehicle_color: Option<String>,
}

fn trimmed_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateArrival {
    /// Trim every field and drop empty optionals, as the form sends blanks for unset inputs
    pub fn normalized(self) -> Self {
        Self {
            ticket_uid: self.ticket_uid.trim().to_string(),
            plate_number: self.plate_number.trim().to_string(),
            notes: trimmed_optional(self.notes),
            vehicle_make: trimmed_optional(self.vehicle_make),
            vehicle_model: trimmed_optional(self.vehicle_model),
            vehicle_color: trimmed_optional(self.vehicle_color),
        }
    }
}

/// Fully validated arrival, ready to insert
#[derive(Debug, Clone)]
pub struct NewArrival {
    pub id: Uuid,
    pub ticket_uid: String,
    pub plate_number: String,
    pub vehicle: Vehicle,
    pub notes: Option<String>,
    pub image: ImageRefs,
    pub agent_id: String,
}

/// Admin listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RecordQuery {
    /// `parked` or `closed`
    pub status: Option<RecordStatus>,
    /// Hotel-local calendar day (YYYY-MM-DD)
    pub date: Option<String>,
}

/// Open-record search parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Ticket UID or plate number
    pub query: Option<String>,
}
