// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{deserialize_double_option, AppState, Doctor, OkResponse},
    store::{DoctorPatch, DoctorRepository, NewDoctor},
};

const MAX_NAME_LEN: usize = 128;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route(
            "/doctors/{doctor_id}",
            get(get_doctor).patch(update_doctor).delete(delete_doctor),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub crm: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub crm: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub specialty: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
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

fn clean_optional(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn validate_email(raw: Option<String>) -> Result<Option<String>, ApiError> {
    match clean_optional(raw) {
        Some(email) if !email.contains('@') => {
            Err(ApiError::validation("email must contain '@'"))
        }
        other => Ok(other),
    }
}

pub async fn list_doctors(State(state): State<AppState>) -> Result<Json<Vec<Doctor>>, ApiError> {
    Ok(Json(state.store.list_doctors().await?))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Doctor>, ApiError> {
    let row = state
        .store
        .get_doctor(doctor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("doctor"))?;
    Ok(Json(row))
}

pub async fn create_doctor(
    State(state): State<AppState>,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<Json<Doctor>, ApiError> {
    let doctor = state
        .store
        .create_doctor(NewDoctor {
            name: validate_name(&req.name)?,
            crm: clean_optional(req.crm),
            specialty: clean_optional(req.specialty),
            phone: clean_optional(req.phone),
            email: validate_email(req.email)?,
        })
        .await?;
    tracing::info!(doctor_id = %doctor.id, "doctor created");
    Ok(Json(doctor))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<Doctor>, ApiError> {
    let patch = DoctorPatch {
        name: req.name.as_deref().map(validate_name).transpose()?,
        crm: req.crm.map(clean_optional),
        specialty: req.specialty.map(clean_optional),
        phone: req.phone.map(clean_optional),
        email: req.email.map(validate_email).transpose()?,
    };
    Ok(Json(state.store.update_doctor(doctor_id, patch).await?))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_doctor(doctor_id).await?;
    tracing::info!(%doctor_id, "doctor deleted");
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryStore;

    fn state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new()),
        }
    }

    fn request(name: &str) -> Json<CreateDoctorRequest> {
        Json(CreateDoctorRequest {
            name: name.to_string(),
            crm: Some(" 123456 ".into()),
            specialty: Some("Pediatria".into()),
            phone: Some("".into()),
            email: Some("maria@hospital.com".into()),
        })
    }

    #[tokio::test]
    async fn create_list_and_clear_fields() {
        let state = state();
        create_doctor(State(state.clone()), request("Dr. Felipe Lima"))
            .await
            .unwrap();
        let maria = create_doctor(State(state.clone()), request(" Dra. Maria Santos "))
            .await
            .unwrap()
            .0;
        assert_eq!(maria.name, "Dra. Maria Santos");
        assert_eq!(maria.crm.as_deref(), Some("123456"));
        assert!(maria.phone.is_none());

        let names: Vec<_> = list_doctors(State(state.clone()))
            .await
            .unwrap()
            .0
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Dr. Felipe Lima", "Dra. Maria Santos"]);

        let req: UpdateDoctorRequest =
            serde_json::from_value(serde_json::json!({ "specialty": null })).unwrap();
        let updated = update_doctor(State(state.clone()), Path(maria.id), Json(req))
            .await
            .unwrap()
            .0;
        assert!(updated.specialty.is_none());
        assert_eq!(updated.email.as_deref(), Some("maria@hospital.com"));
    }

    #[tokio::test]
    async fn bad_email_and_unknown_doctor() {
        let state = state();
        let err = create_doctor(
            State(state.clone()),
            Json(CreateDoctorRequest {
                name: "Dr. Carlos Pereira".into(),
                crm: None,
                specialty: None,
                phone: None,
                email: Some("carlos.hospital.com".into()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        let err = update_doctor(
            State(state.clone()),
            Path(Uuid::new_v4()),
            Json(UpdateDoctorRequest::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }
}
