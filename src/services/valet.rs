//! Ticket lifecycle: arrivals, departures and open-record search

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::record::{
        normalize_plate, validated_plate, CreateArrival, ImageRefs, NewArrival, RecordQuery,
        ValetRecord, Vehicle,
    },
    repository::{records::LIST_LIMIT, Repository},
    services::{
        local_time,
        photos::{Photo, PhotoStore},
    },
};

/// Bounds on a trimmed search query
const SEARCH_MIN_LEN: usize = 2;
const SEARCH_MAX_LEN: usize = 32;

#[derive(Clone)]
pub struct ValetService {
    repository: Repository,
    photos: Arc<dyn PhotoStore>,
    tz: Tz,
    max_image_bytes: usize,
}

impl ValetService {
    pub fn new(
        repository: Repository,
        photos: Arc<dyn PhotoStore>,
        tz: Tz,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            repository,
            photos,
            tz,
            max_image_bytes,
        }
    }

    pub async fn create_arrival(
        &self,
        form: CreateArrival,
        agent_id: &str,
        photo: Option<Photo>,
    ) -> AppResult<ValetRecord> {
        self.create_arrival_at(form, agent_id, photo, Utc::now()).await
    }

    /// Register a vehicle arrival at `now`.
    ///
    /// The open-ticket lookup is only a fast path that avoids storing a photo
    /// for an obvious duplicate. The unique index on open tickets decides.
    pub async fn create_arrival_at(
        &self,
        form: CreateArrival,
        agent_id: &str,
        photo: Option<Photo>,
        now: DateTime<Utc>,
    ) -> AppResult<ValetRecord> {
        let form = form.normalized();
        form.validate()?;
        let plate_number = validated_plate(&form.plate_number)?;

        let photo = photo.ok_or_else(|| AppError::Validation("Vehicle photo is required".to_string()))?;
        if !photo.is_image() {
            return Err(AppError::Validation("Only image uploads are allowed".to_string()));
        }
        if photo.bytes.len() > self.max_image_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Image exceeds the {} byte limit",
                self.max_image_bytes
            )));
        }

        if self
            .repository
            .records
            .find_open_by_ticket(&form.ticket_uid)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Ticket UID already exists for an active record".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let image = self.photos.store(id, &photo).await.map_err(|e| {
            tracing::error!(record_id = %id, error = %e, "Failed to store vehicle photo");
            e
        })?;

        let arrival = NewArrival {
            id,
            ticket_uid: form.ticket_uid,
            plate_number,
            vehicle: Vehicle {
                make: form.vehicle_make,
                model: form.vehicle_model,
                color: form.vehicle_color,
            },
            notes: form.notes,
            image,
            agent_id: agent_id.to_string(),
        };

        match self.repository.records.insert_arrival(&arrival, now, self.tz).await {
            Ok(record) => {
                tracing::info!(
                    record_id = %record.id,
                    ticket_uid = %record.ticket_uid,
                    plate = %record.plate.number,
                    agent_id = %agent_id,
                    "arrival.created"
                );
                Ok(record)
            }
            Err(e) => {
                self.discard_photo(&arrival.image).await;
                Err(e)
            }
        }
    }

    async fn discard_photo(&self, image: &ImageRefs) {
        if let Err(e) = self.photos.discard(image).await {
            tracing::warn!(error = %e, "Failed to discard photo of rejected arrival");
        }
    }

    pub async fn close_departure(&self, record_id: &str, agent_id: &str) -> AppResult<(ValetRecord, i64)> {
        self.close_departure_at(record_id, agent_id, Utc::now()).await
    }

    /// Close an open record; returns it with the stay length in whole minutes (at least 1)
    pub async fn close_departure_at(
        &self,
        record_id: &str,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<(ValetRecord, i64)> {
        let id = Uuid::parse_str(record_id.trim())
            .map_err(|_| AppError::Validation("recordId must be a valid UUID".to_string()))?;

        let record = self.repository.records.close(id, agent_id, now, self.tz).await?;
        let departed = record.departure_timestamp_utc.unwrap_or(now);
        let duration_minutes = local_time::rounded_minutes(record.arrival_timestamp_utc, departed).max(1);

        tracing::info!(
            record_id = %record.id,
            ticket_uid = %record.ticket_uid,
            agent_id = %agent_id,
            duration_minutes,
            "departure.closed"
        );

        Ok((record, duration_minutes))
    }

    /// Open records whose ticket matches exactly or whose plate matches after normalization
    pub async fn search_open(&self, query: Option<&str>) -> AppResult<Vec<ValetRecord>> {
        let query = query.map(str::trim).unwrap_or_default();
        let len = query.chars().count();
        if !(SEARCH_MIN_LEN..=SEARCH_MAX_LEN).contains(&len) {
            return Err(AppError::Validation(format!(
                "query must be {}-{} characters",
                SEARCH_MIN_LEN, SEARCH_MAX_LEN
            )));
        }

        self.repository
            .records
            .search_open(query, &normalize_plate(query))
            .await
    }

    /// Manager listing, newest first
    pub async fn list_records(&self, query: &RecordQuery) -> AppResult<Vec<ValetRecord>> {
        let window = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(date) => Some(local_time::day_window(local_time::parse_date(date)?, self.tz)),
            None => None,
        };

        self.repository
            .records
            .list(query.status, window, LIST_LIMIT)
            .await
    }
}
