//! Valet records repository
//!
//! The two race-sensitive transitions are decided by the store itself: the
//! partial unique index on open tickets rejects duplicate arrivals, and
//! departures are a conditional update that only matches `parked` rows.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::record::{NewArrival, RecordStatus, ValetRecord, ValetRecordRow},
    services::local_time::{self, DayWindow},
};

/// Upper bound on admin listings
pub const LIST_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct RecordsRepository {
    pool: Pool<Sqlite>,
}

fn into_records(rows: Vec<ValetRecordRow>) -> AppResult<Vec<ValetRecord>> {
    rows.into_iter().map(ValetRecord::try_from).collect()
}

impl RecordsRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get record by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<ValetRecord>> {
        sqlx::query_as::<_, ValetRecordRow>("SELECT * FROM valet_records WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(ValetRecord::try_from)
            .transpose()
    }

    /// The open record holding a ticket, if any
    pub async fn find_open_by_ticket(&self, ticket_uid: &str) -> AppResult<Option<ValetRecord>> {
        sqlx::query_as::<_, ValetRecordRow>(
            "SELECT * FROM valet_records WHERE ticket_uid = ? AND status = 'parked'",
        )
        .bind(ticket_uid)
        .fetch_optional(&self.pool)
        .await?
        .map(ValetRecord::try_from)
        .transpose()
    }

    /// Insert a parked record; a second open record for the ticket is a `Conflict`
    pub async fn insert_arrival(
        &self,
        arrival: &NewArrival,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> AppResult<ValetRecord> {
        let now_utc = local_time::format_utc(now);
        let now_local = local_time::format_offset(local_time::to_local(now, tz));

        let row = sqlx::query_as::<_, ValetRecordRow>(
            r#"
            INSERT INTO valet_records (
                id, ticket_uid, plate_number, plate_state, plate_country,
                vehicle_make, vehicle_model, vehicle_color,
                arrival_timestamp_utc, arrival_local, departure_timestamp_utc, departure_local,
                hotel_local_tz, image_original_url, image_thumb_url, notes, status, agent_id,
                created_at_utc, updated_at_utc
            )
            VALUES (?, ?, ?, NULL, 'USA', ?, ?, ?, ?, ?, NULL, NULL, ?, ?, ?, ?, 'parked', ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(arrival.id.to_string())
        .bind(&arrival.ticket_uid)
        .bind(&arrival.plate_number)
        .bind(&arrival.vehicle.make)
        .bind(&arrival.vehicle.model)
        .bind(&arrival.vehicle.color)
        .bind(&now_utc)
        .bind(&now_local)
        .bind(tz.name())
        .bind(&arrival.image.original_url)
        .bind(&arrival.image.thumb_url)
        .bind(&arrival.notes)
        .bind(&arrival.agent_id)
        .bind(&now_utc)
        .bind(&now_utc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                "Ticket UID already exists for an active record".to_string(),
            ),
            other => AppError::Database(other),
        })?;

        ValetRecord::try_from(row)
    }

    /// Close a parked record in a single conditional update.
    ///
    /// Missing records are `NotFound`; records that are no longer parked
    /// (including one closed by a concurrent request) are `Conflict`.
    pub async fn close(
        &self,
        id: Uuid,
        agent_id: &str,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> AppResult<ValetRecord> {
        let now_utc = local_time::format_utc(now);
        let now_local = local_time::format_offset(local_time::to_local(now, tz));

        let row = sqlx::query_as::<_, ValetRecordRow>(
            r#"
            UPDATE valet_records
            SET status = 'closed',
                departure_timestamp_utc = ?,
                departure_local = ?,
                agent_id = ?,
                updated_at_utc = ?
            WHERE id = ? AND status = 'parked'
            RETURNING *
            "#,
        )
        .bind(&now_utc)
        .bind(&now_local)
        .bind(agent_id)
        .bind(&now_utc)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => ValetRecord::try_from(row),
            None => match self.get_by_id(id).await? {
                Some(_) => Err(AppError::Conflict("Record is already closed".to_string())),
                None => Err(AppError::NotFound(format!("Record {} not found", id))),
            },
        }
    }

    /// Open records matching a ticket exactly or a normalized plate
    pub async fn search_open(&self, ticket_uid: &str, plate_number: &str) -> AppResult<Vec<ValetRecord>> {
        let rows = sqlx::query_as::<_, ValetRecordRow>(
            r#"
            SELECT * FROM valet_records
            WHERE status = 'parked' AND (ticket_uid = ? OR plate_number = ?)
            ORDER BY arrival_timestamp_utc DESC
            "#,
        )
        .bind(ticket_uid)
        .bind(plate_number)
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    /// Newest-first listing, optionally filtered by status and arrival day
    pub async fn list(
        &self,
        status: Option<RecordStatus>,
        window: Option<DayWindow>,
        limit: i64,
    ) -> AppResult<Vec<ValetRecord>> {
        let mut conditions = Vec::new();

        if status.is_some() {
            conditions.push("status = ?");
        }
        if window.is_some() {
            conditions.push("arrival_timestamp_utc >= ? AND arrival_timestamp_utc < ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT * FROM valet_records {} ORDER BY arrival_timestamp_utc DESC LIMIT ?",
            where_clause
        );

        let mut builder = sqlx::query_as::<_, ValetRecordRow>(&query);
        if let Some(status) = status {
            builder = builder.bind(status.as_str());
        }
        if let Some(window) = window {
            builder = builder
                .bind(local_time::format_utc(window.start))
                .bind(local_time::format_utc(window.end));
        }

        let rows = builder.bind(limit).fetch_all(&self.pool).await?;
        into_records(rows)
    }

    /// Every record that arrived inside the window, oldest first
    pub async fn arrivals_between(&self, window: DayWindow) -> AppResult<Vec<ValetRecord>> {
        let rows = sqlx::query_as::<_, ValetRecordRow>(
            r#"
            SELECT * FROM valet_records
            WHERE arrival_timestamp_utc >= ? AND arrival_timestamp_utc < ?
            ORDER BY arrival_timestamp_utc ASC
            "#,
        )
        .bind(local_time::format_utc(window.start))
        .bind(local_time::format_utc(window.end))
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    /// Permanently delete records that arrived before the cutoff
    pub async fn delete_arrived_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM valet_records WHERE arrival_timestamp_utc < ?")
            .bind(local_time::format_utc(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
