//! HTTP router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! Browser dashboards run on other origins, so CORS is permissive.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::config::MAX_AUDIO_BYTES;
use crate::core_state::CoreState;

pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        // Patients
        .route(
            "/patient",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route("/patient/record-dose", post(endpoints::patients::record_dose))
        .route("/patient/skip-dose", post(endpoints::patients::skip_dose))
        .route("/patient/voice-query", post(endpoints::patients::voice_query))
        .route(
            "/patient/doctor/:doctor_id",
            get(endpoints::patients::by_doctor),
        )
        .route(
            "/patient/:id",
            get(endpoints::patients::get).put(endpoints::patients::update),
        )
        .route(
            "/patient/:id/medication-history",
            get(endpoints::patients::medication_history),
        )
        .route(
            "/patient/:id/recent-doses",
            get(endpoints::patients::recent_doses),
        )
        // Alerts
        .route("/alerts", get(endpoints::alerts::list))
        .route("/alerts/stream", get(endpoints::alerts::stream))
        .route("/alerts/acknowledge", post(endpoints::alerts::acknowledge))
        .route(
            "/alerts/patient/:patient_id",
            get(endpoints::alerts::by_patient),
        )
        // Patient notifications
        .route(
            "/patient-notifications/stream/:patient_id",
            get(endpoints::notifications::stream),
        )
        .route(
            "/patient-notifications/reminder/:patient_id",
            post(endpoints::notifications::reminder),
        )
        .route(
            "/patient-notifications/warning/:patient_id",
            post(endpoints::notifications::warning),
        )
        .route(
            "/patient-notifications/doctor-instruction/:patient_id",
            post(endpoints::notifications::doctor_instruction),
        )
        // Messages
        .route("/messages", post(endpoints::messages::send))
        .route("/messages/voice", post(endpoints::messages::voice))
        .route(
            "/messages/conversation/:patient_id/:doctor_id",
            get(endpoints::messages::conversation),
        )
        .route(
            "/messages/doctor/:doctor_id",
            get(endpoints::messages::for_doctor),
        )
        .route(
            "/messages/patient/:patient_id",
            get(endpoints::messages::for_patient),
        )
        .route(
            "/messages/:message_id/read",
            post(endpoints::messages::mark_read),
        )
        // Doctors
        .route(
            "/doctor/dashboard/:doctor_id",
            get(endpoints::doctors::dashboard),
        )
        .route(
            "/doctor/patient/:doctor_id/:patient_id",
            get(endpoints::doctors::patient_detail),
        )
        .route("/doctor/respond", post(endpoints::doctors::respond))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
