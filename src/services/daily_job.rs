//! Nightly report delivery and retention purge

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;

use crate::{
    repository::Repository,
    services::{email::ReportMailer, local_time, reports::ReportsService},
};

/// What a single run achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOutcome {
    pub delivered: bool,
    pub purged: u64,
}

#[derive(Clone)]
pub struct DailyJob {
    reports: ReportsService,
    repository: Repository,
    mailer: Arc<dyn ReportMailer>,
    retention_days: i64,
    tz: Tz,
}

impl DailyJob {
    pub fn new(
        reports: ReportsService,
        repository: Repository,
        mailer: Arc<dyn ReportMailer>,
        retention_days: i64,
    ) -> Self {
        let tz = reports.timezone();
        Self {
            reports,
            repository,
            mailer,
            retention_days,
            tz,
        }
    }

    /// Today's date at the hotel
    pub fn today(&self) -> NaiveDate {
        local_time::local_today(Utc::now(), self.tz)
    }

    pub async fn run(&self, date: NaiveDate) -> JobOutcome {
        self.run_at(date, Utc::now()).await
    }

    /// Report on `date`, deliver it, then purge expired records.
    ///
    /// Never fails: each step logs its own error and the run carries on.
    pub async fn run_at(&self, date: NaiveDate, now: DateTime<Utc>) -> JobOutcome {
        let mut outcome = JobOutcome::default();

        match self.reports.build_daily_report(date).await {
            Ok(report) => {
                tracing::info!(
                    date = %date,
                    total = report.summary.total,
                    avg_duration = report.summary.avg_duration,
                    "Daily report built"
                );
                if !self.mailer.is_configured() {
                    tracing::warn!(date = %date, "Email not configured, daily report not sent");
                } else {
                    match self.mailer.send_daily_report(date, &report.html, &report.csv).await {
                        Ok(()) => outcome.delivered = true,
                        Err(e) => tracing::error!(date = %date, error = %e, "Failed to send daily report"),
                    }
                }
            }
            Err(e) => tracing::error!(date = %date, error = %e, "Failed to build daily report"),
        }

        if self.retention_days > 0 {
            let cutoff = now - Duration::days(self.retention_days);
            match self.repository.records.delete_arrived_before(cutoff).await {
                Ok(purged) => {
                    outcome.purged = purged;
                    tracing::info!(purged, retention_days = self.retention_days, "Retention purge done");
                }
                Err(e) => tracing::error!(error = %e, "Retention purge failed"),
            }
        }

        outcome
    }
}

/// Next instant strictly after `now` at which the local clock reads `run_at`,
/// with the hotel-local date it belongs to
pub fn next_run_after(now: DateTime<Utc>, run_at: NaiveTime, tz: Tz) -> (DateTime<Utc>, NaiveDate) {
    let mut date = local_time::local_today(now, tz);
    loop {
        let candidate = local_time::resolve_local(date.and_time(run_at), tz);
        if candidate > now {
            return (candidate, date);
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => return (candidate, date),
        };
    }
}

/// Run the job every day at `run_at` hotel time, one run at a time
pub fn spawn_scheduler(job: DailyJob, run_at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let (next, date) = next_run_after(now, run_at, job.tz);
            tracing::info!(next_run = %next, date = %date, "Daily job scheduled");

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let outcome = job.run(date).await;
            tracing::info!(
                date = %date,
                delivered = outcome.delivered,
                purged = outcome.purged,
                "Daily job finished"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::models::record::{ImageRefs, NewArrival, Vehicle};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingMailer {
        configured: bool,
        fail: bool,
        sent: Mutex<Vec<(NaiveDate, String)>>,
    }

    #[async_trait]
    impl ReportMailer for RecordingMailer {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn send_daily_report(&self, date: NaiveDate, _html: &str, csv: &str) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Upstream("relay refused".into()));
            }
            self.sent.lock().unwrap().push((date, csv.to_string()));
            Ok(())
        }
    }

    async fn job_with(mailer: Arc<RecordingMailer>, retention_days: i64) -> (DailyJob, Repository) {
        let repository = Repository::in_memory().await.unwrap();
        let reports = ReportsService::new(repository.clone(), New_York);
        (DailyJob::new(reports, repository.clone(), mailer, retention_days), repository)
    }

    async fn arrive(repository: &Repository, ticket: &str, at: DateTime<Utc>) {
        let arrival = NewArrival {
            id: Uuid::new_v4(),
            ticket_uid: ticket.into(),
            plate_number: "AB12".into(),
            vehicle: Vehicle { make: None, model: None, color: None },
            notes: None,
            image: ImageRefs { original_url: None, thumb_url: None },
            agent_id: "agent-lino".into(),
        };
        repository.records.insert_arrival(&arrival, at, New_York).await.unwrap();
    }

    #[tokio::test]
    async fn reports_then_purges() {
        let mailer = Arc::new(RecordingMailer { configured: true, ..Default::default() });
        let (job, repository) = job_with(mailer.clone(), 30).await;

        let now = Utc.with_ymd_and_hms(2024, 6, 30, 3, 59, 0).unwrap();
        arrive(&repository, "OLD", now - Duration::days(31)).await;
        arrive(&repository, "KEEP", now - Duration::days(29)).await;
        arrive(&repository, "TODAY", now - Duration::hours(2)).await;

        let date = local_time::local_today(now, New_York);
        let outcome = job.run_at(date, now).await;

        assert_eq!(outcome, JobOutcome { delivered: true, purged: 1 });
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, date);
        assert!(sent[0].1.contains("TODAY"));
    }

    #[tokio::test]
    async fn unconfigured_mailer_skips_delivery_but_still_purges() {
        let mailer = Arc::new(RecordingMailer::default());
        let (job, repository) = job_with(mailer.clone(), 30).await;
        let now = Utc::now();
        arrive(&repository, "OLD", now - Duration::days(40)).await;

        let outcome = job.run_at(job.today(), now).await;
        assert_eq!(outcome, JobOutcome { delivered: false, purged: 1 });
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let mailer = Arc::new(RecordingMailer { configured: true, fail: true, ..Default::default() });
        let (job, _) = job_with(mailer, 30).await;

        let outcome = job.run(job.today()).await;
        assert!(!outcome.delivered);
    }

    #[tokio::test]
    async fn non_positive_retention_disables_purge() {
        let mailer = Arc::new(RecordingMailer::default());
        let (job, repository) = job_with(mailer, 0).await;
        let now = Utc::now();
        arrive(&repository, "ANCIENT", now - Duration::days(400)).await;

        let outcome = job.run_at(job.today(), now).await;
        assert_eq!(outcome.purged, 0);
    }

    #[test]
    fn next_run_is_later_today_or_tomorrow() {
        let run_at = NaiveTime::from_hms_opt(23, 59, 0).unwrap();

        // 12:00 New York, summer
        let noon = Utc.with_ymd_and_hms(2024, 6, 15, 16, 0, 0).unwrap();
        let (next, date) = next_run_after(noon, run_at, New_York);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 16, 3, 59, 0).unwrap());

        let (after, next_date) = next_run_after(next, run_at, New_York);
        assert_eq!(next_date, NaiveDate::from_ymd_opt(2024, 6, 16).unwrap());
        assert_eq!(after - next, Duration::hours(24));
    }

    #[test]
    fn next_run_crosses_dst_change() {
        let run_at = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        // Just after the 2024-03-09 run; the next local day is 23 hours long
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap();
        let (next, date) = next_run_after(now, run_at, New_York);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 3, 59, 0).unwrap());
    }
}
