//! Daily report generation
//!
//! `summarize`, `render_csv` and `render_html` are pure functions of the
//! fetched rows and the hotel timezone; only `ReportsService` touches the store.

use chrono::NaiveDate;
use chrono_tz::Tz;
use maud::html;

use crate::{
    error::AppResult,
    models::{
        record::ValetRecord,
        report::{DailyReport, DailySummary},
    },
    repository::Repository,
    services::local_time,
};

pub const CSV_HEADER: &str = "ticketUid,plate,arrivalLocal,departureLocal,parkedMinutes,notes";

/// Rounded parked minutes of a closed record
fn parked_minutes(record: &ValetRecord) -> Option<i64> {
    record
        .departure_timestamp_utc
        .map(|departure| local_time::rounded_minutes(record.arrival_timestamp_utc, departure))
}

pub fn summarize(rows: &[ValetRecord], tz: Tz) -> DailySummary {
    let mut summary = DailySummary {
        total: rows.len(),
        ..DailySummary::default()
    };

    let mut durations = Vec::new();
    for row in rows {
        let arrival = row.arrival_timestamp_utc;
        if let Some(minutes) = parked_minutes(row) {
            durations.push(minutes);
        }
        *summary
            .count_by_hour
            .entry(local_time::local_hour_key(arrival, tz))
            .or_insert(0) += 1;
        summary.first_arrival = Some(summary.first_arrival.map_or(arrival, |first| first.min(arrival)));
        summary.last_arrival = Some(summary.last_arrival.map_or(arrival, |last| last.max(arrival)));
    }

    if !durations.is_empty() {
        let total: i64 = durations.iter().sum();
        summary.avg_duration = (total as f64 / durations.len() as f64).round() as i64;
    }

    summary
}

/// Quote a CSV field when it holds a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        csv_quoted(value)
    } else {
        value.to_string()
    }
}

fn csv_quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn render_csv(rows: &[ValetRecord], tz: Tz) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for row in rows {
        let departure = row
            .departure_timestamp_utc
            .map(|d| local_time::format_local_datetime(d, tz))
            .unwrap_or_default();
        let minutes = parked_minutes(row).map(|m| m.to_string()).unwrap_or_default();

        let line = [
            csv_field(&row.ticket_uid),
            csv_field(&row.plate.number),
            local_time::format_local_datetime(row.arrival_timestamp_utc, tz),
            departure,
            minutes,
            // Notes are free text; always quoted
            csv_quoted(row.notes.as_deref().unwrap_or("")),
        ]
        .join(",");
        csv.push_str(&line);
        csv.push('\n');
    }

    csv
}

pub fn render_html(rows: &[ValetRecord], summary: &DailySummary, tz: Tz) -> String {
    let first_arrival = summary
        .first_arrival
        .map(|t| local_time::format_local_datetime(t, tz))
        .unwrap_or_else(|| "N/A".to_string());
    let last_arrival = summary
        .last_arrival
        .map(|t| local_time::format_local_datetime(t, tz))
        .unwrap_or_else(|| "N/A".to_string());

    html! {
        h2 { "Daily Valet Summary" }
        p { "Total vehicles: " strong { (summary.total) } }
        p { "Average duration: " strong { (summary.avg_duration) " minutes" } }
        p { "First arrival: " (first_arrival) }
        p { "Last arrival: " (last_arrival) }
        h3 { "Arrivals by hour" }
        ul {
            @for (hour, count) in &summary.count_by_hour {
                li { strong { (hour) ":00" } " — " (count) }
            }
        }
        table border="1" cellpadding="6" cellspacing="0" {
            thead {
                tr {
                    th { "Ticket" } th { "Plate" } th { "Arrival" }
                    th { "Departure" } th { "Minutes" } th { "Notes" }
                }
            }
            tbody {
                @for row in rows {
                    tr {
                        td { (row.ticket_uid) }
                        td { (row.plate.number) }
                        td { (local_time::format_local_time(row.arrival_timestamp_utc, tz)) }
                        td {
                            @match row.departure_timestamp_utc {
                                Some(departure) => { (local_time::format_local_time(departure, tz)) }
                                None => { "—" }
                            }
                        }
                        td {
                            @match parked_minutes(row) {
                                Some(minutes) => { (minutes) }
                                None => { "—" }
                            }
                        }
                        td { (row.notes.as_deref().unwrap_or("")) }
                    }
                }
            }
        }
    }
    .into_string()
}

/// Builds daily reports from the store
#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
    tz: Tz,
}

impl ReportsService {
    pub fn new(repository: Repository, tz: Tz) -> Self {
        Self { repository, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Arrivals of one hotel-local day, oldest first
    pub async fn rows_for_date(&self, date: NaiveDate) -> AppResult<Vec<ValetRecord>> {
        let window = local_time::day_window(date, self.tz);
        self.repository.records.arrivals_between(window).await
    }

    /// Fetch the day once and render every output from that snapshot
    pub async fn build_daily_report(&self, date: NaiveDate) -> AppResult<DailyReport> {
        let rows = self.rows_for_date(date).await?;
        Ok(Self::report_from_rows(&rows, self.tz))
    }

    pub fn report_from_rows(rows: &[ValetRecord], tz: Tz) -> DailyReport {
        let summary = summarize(rows, tz);
        DailyReport {
            csv: render_csv(rows, tz),
            html: render_html(rows, &summary, tz),
            summary,
        }
    }

    pub async fn daily_csv(&self, date: NaiveDate) -> AppResult<String> {
        let rows = self.rows_for_date(date).await?;
        Ok(render_csv(&rows, self.tz))
    }

    pub async fn daily_html(&self, date: NaiveDate) -> AppResult<String> {
        let rows = self.rows_for_date(date).await?;
        let summary = summarize(&rows, self.tz);
        Ok(render_html(&rows, &summary, self.tz))
    }
}
