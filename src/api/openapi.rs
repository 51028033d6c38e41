//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, health, records, system};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Valet API",
        version = "1.0.0",
        description = "Hotel valet parking operations REST API"
    ),
    servers(
        (url = "/api", description = "Valet API")
    ),
    paths(
        // Auth
        auth::login,
        auth::me,
        // Records
        records::create_arrival,
        records::search_records,
        records::record_departure,
        // Admin
        admin::list_records,
        admin::daily_report_csv,
        admin::daily_report_html,
        // System
        system::run_daily_report,
        health::healthz,
    ),
    components(
        schemas(
            auth::LoginRequest,
            auth::LoginResponse,
            crate::models::agent::AgentProfile,
            crate::models::record::ValetRecord,
            crate::models::record::Plate,
            crate::models::record::Vehicle,
            crate::models::record::ImageRefs,
            crate::models::record::RecordStatus,
            crate::models::record::CreateArrival,
            crate::models::report::DailySummary,
            records::ArrivalResponse,
            records::SearchResponse,
            records::DepartureRequest,
            records::DepartureResponse,
            admin::RecordsResponse,
            system::TriggerRequest,
            system::TriggerResponse,
            health::HealthResponse,
            health::DbHealth,
            health::HealthError,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Agent login"),
        (name = "records", description = "Arrivals, departures and search"),
        (name = "admin", description = "Manager listing and reports"),
        (name = "system", description = "Scheduled jobs"),
        (name = "health", description = "Health check")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/me",
            "/arrivals",
            "/records/search",
            "/departures",
            "/admin/records",
            "/admin/reports/daily",
            "/admin/reports/daily/html",
            "/system/reports/daily",
            "/healthz",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
