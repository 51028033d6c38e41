//! Daily report types (derived, never persisted)

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Aggregates over one local calendar day of arrivals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub total: usize,
    /// Mean parked minutes over closed records, rounded; 0 when none closed
    pub avg_duration: i64,
    pub first_arrival: Option<DateTime<Utc>>,
    pub last_arrival: Option<DateTime<Utc>>,
    /// Local arrival hour ("00".."23") to count
    pub count_by_hour: BTreeMap<String, usize>,
}

/// Every rendering of one day's report
#[derive(Debug, Clone)]
pub struct DailyReport {
    pub summary: DailySummary,
    pub csv: String,
    pub html: String,
}

/// Report date parameter
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// Hotel-local calendar day (YYYY-MM-DD)
    pub date: Option<String>,
}
