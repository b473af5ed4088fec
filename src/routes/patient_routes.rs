// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{deserialize_double_option, AppState, OkResponse, Patient},
    store::{NewPatient, PatientPatch, PatientRepository},
};

const MAX_NAME_LEN: usize = 128;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(search_patients).post(create_patient))
        .route(
            "/patients/{patient_id}",
            get(get_patient).patch(update_patient).delete(delete_patient),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    pub name: String,
    pub cpf: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub cpf: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub birth_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

fn validate_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "name is too long (max {MAX_NAME_LEN})"
        )));
    }
    Ok(name.to_string())
}

/// Blank strings clear the field.
fn clean_optional(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub async fn search_patients(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    Ok(Json(state.store.list_patients(q.query.as_deref()).await?))
}

pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let row = state
        .store
        .get_patient(patient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("patient"))?;
    Ok(Json(row))
}

pub async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let name = validate_name(&req.name)?;
    let row = state
        .store
        .create_patient(NewPatient {
            name,
            cpf: clean_optional(req.cpf),
            birth_date: req.birth_date,
        })
        .await?;
    Ok(Json(row))
}

pub async fn update_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let patch = PatientPatch {
        name: req.name.as_deref().map(validate_name).transpose()?,
        cpf: req.cpf.map(clean_optional),
        birth_date: req.birth_date,
    };
    Ok(Json(state.store.update_patient(patient_id, patch).await?))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_patient(patient_id).await?;
    Ok(Json(OkResponse::ok()))
}
