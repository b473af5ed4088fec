use axum::{Json, Router, extract::State, routing::get};

use crate::error::ApiError;
use crate::models::{ApiOk, AppState};
use crate::occupancy::{OccupancyCounts, count_by_status, resolve_all};
use crate::store::{AdmissionFilter, AdmissionRepository, BedRepository, PatientRepository};

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub patients: i64,
    pub active_admissions: usize,
    pub beds: OccupancyCounts,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/health", get(health))
}

pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<DashboardData>>, ApiError> {
    let (patients, beds, active) = tokio::try_join!(
        state.store.count_patients(),
        state.store.list_beds(),
        state.store.list_admissions(AdmissionFilter::Active),
    )?;

    Ok(Json(ApiOk {
        data: DashboardData {
            patients,
            active_admissions: active.len(),
            beds: count_by_status(&resolve_all(&beds, &active)),
        },
    }))
}

pub async fn health() -> &'static str {
    "ok"
}
