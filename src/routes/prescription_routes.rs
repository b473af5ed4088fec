// src/routes/prescription_routes.rs

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{AppState, OkResponse, Prescription},
    store::{AppointmentRepository, NewPrescription, PrescriptionRepository},
};

const MAX_TEXT_LEN: usize = 4000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/appointments/{appointment_id}/prescriptions",
            get(list_prescriptions).post(create_prescription),
        )
        .route(
            "/prescriptions/{prescription_id}",
            get(get_prescription).delete(delete_prescription),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreatePrescriptionRequest {
    #[serde(default)]
    pub text: String,
    pub author: Option<String>,
}

async fn ensure_appointment(state: &AppState, appointment_id: Uuid) -> Result<(), ApiError> {
    state
        .store
        .get_appointment(appointment_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("appointment"))
}

pub async fn list_prescriptions(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Vec<Prescription>>, ApiError> {
    ensure_appointment(&state, appointment_id).await?;
    Ok(Json(state.store.list_prescriptions(appointment_id).await?))
}

pub async fn create_prescription(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<CreatePrescriptionRequest>,
) -> Result<Json<Prescription>, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::validation("text is required"));
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::validation(format!(
            "text is too long (max {MAX_TEXT_LEN})"
        )));
    }

    let prescription = state
        .store
        .create_prescription(NewPrescription {
            appointment_id,
            text: text.to_string(),
            author: req
                .author
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
        .await?;
    tracing::info!(prescription_id = %prescription.id, %appointment_id, "prescription written");

    Ok(Json(prescription))
}

pub async fn get_prescription(
    State(state): State<AppState>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Json<Prescription>, ApiError> {
    let row = state
        .store
        .get_prescription(prescription_id)
        .await?
        .ok_or_else(|| ApiError::not_found("prescription"))?;
    Ok(Json(row))
}

pub async fn delete_prescription(
    State(state): State<AppState>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_prescription(prescription_id).await?;
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::models::Appointment;
    use crate::store::{
        DoctorRepository, MemoryStore, NewAppointment, NewDoctor, NewPatient, PatientRepository,
    };

    fn state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new()),
        }
    }

    async fn appointment(state: &AppState) -> Appointment {
        let patient = state
            .store
            .create_patient(NewPatient {
                name: "Ana Oliveira".into(),
                cpf: None,
                birth_date: None,
            })
            .await
            .unwrap();
        let doctor = state
            .store
            .create_doctor(NewDoctor {
                name: "Dra. Maria Santos".into(),
                crm: None,
                specialty: Some("Pediatria".into()),
                phone: None,
                email: None,
            })
            .await
            .unwrap();
        state
            .store
            .create_appointment(NewAppointment {
                patient_id: patient.id,
                patient_name: patient.name,
                doctor_id: doctor.id,
                doctor_name: doctor.name,
                date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
                time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
                reason: None,
            })
            .await
            .unwrap()
    }

    fn text(body: &str) -> Json<CreatePrescriptionRequest> {
        Json(CreatePrescriptionRequest {
            text: body.to_string(),
            author: None,
        })
    }

    #[tokio::test]
    async fn prescriptions_attach_to_their_appointment() {
        let state = state();
        let appt = appointment(&state).await;

        let first = create_prescription(State(state.clone()), Path(appt.id), text(" Amoxicilina 500mg "))
            .await
            .unwrap()
            .0;
        assert_eq!(first.text, "Amoxicilina 500mg");
        create_prescription(State(state.clone()), Path(appt.id), text("Repouso por 3 dias"))
            .await
            .unwrap();

        let rows = list_prescriptions(State(state.clone()), Path(appt.id))
            .await
            .unwrap()
            .0;
        let texts: Vec<_> = rows.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, ["Amoxicilina 500mg", "Repouso por 3 dias"]);

        delete_prescription(State(state.clone()), Path(first.id)).await.unwrap();
        let err = get_prescription(State(state.clone()), Path(first.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }

    #[tokio::test]
    async fn blank_text_or_unknown_appointment_is_rejected() {
        let state = state();
        let appt = appointment(&state).await;

        let err = create_prescription(State(state.clone()), Path(appt.id), text("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        let err = create_prescription(State(state.clone()), Path(Uuid::new_v4()), text("Dipirona"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
        let err = list_prescriptions(State(state.clone()), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }
}
