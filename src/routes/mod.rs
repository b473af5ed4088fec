use crate::models::AppState;
use axum::Router;

pub mod admission_routes;
pub mod appointment_routes;
pub mod bed_routes;
pub mod doctor_routes;
pub mod home_routes;
pub mod patient_routes;
pub mod prescription_routes;
pub mod report_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(bed_routes::router())
                .merge(admission_routes::router())
                .merge(patient_routes::router())
                .merge(doctor_routes::router())
                .merge(appointment_routes::router())
                .merge(prescription_routes::router())
                .merge(report_routes::router())
                .merge(home_routes::router()),
        )
        .with_state(state)
}
