//! Business logic services

pub mod auth;
pub mod daily_job;
pub mod email;
pub mod local_time;
pub mod photos;
pub mod reports;
pub mod valet;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub valet: valet::ValetService,
    pub reports: reports::ReportsService,
    pub daily_job: daily_job::DailyJob,
    pub repository: Repository,
}

impl Services {
    /// Wire services from configuration with the given photo and mail collaborators
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        photos: Arc<dyn photos::PhotoStore>,
        mailer: Arc<dyn email::ReportMailer>,
    ) -> AppResult<Self> {
        let tz = config
            .hotel
            .tz()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let reports = reports::ReportsService::new(repository.clone(), tz);

        Ok(Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            valet: valet::ValetService::new(
                repository.clone(),
                photos,
                tz,
                config.uploads.max_image_bytes(),
            ),
            daily_job: daily_job::DailyJob::new(
                reports.clone(),
                repository.clone(),
                mailer,
                config.retention.days,
            ),
            reports,
            repository,
        })
    }

    /// Services backed by the configured uploads directory and SMTP relay
    pub fn from_config(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let photos = Arc::new(photos::DiskPhotoStore::new(&config.uploads.dir));
        let mailer = Arc::new(email::SmtpReportMailer::new(config.email.clone()));
        Self::new(repository, config, photos, mailer)
    }
}
