//! API endpoint modules.

pub mod agents;
pub mod analytics;
pub mod health;
pub mod openapi;
pub mod rally;

pub use agents::configure_routes as configure_agent_routes;
pub use analytics::configure_routes as configure_analytics_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use rally::configure_routes as configure_rally_routes;

use actix_web::web;

/// Register every `/api/v1` route.
pub fn configure_api_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(configure_health_routes)
        .configure(configure_rally_routes)
        .configure(configure_analytics_routes)
        .configure(configure_agent_routes);
}
