// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{deserialize_double_option, Appointment, AppointmentStatus, AppState, OkResponse},
    store::{
        AppointmentFilter, AppointmentPatch, AppointmentRepository, DoctorRepository,
        NewAppointment, PatientRepository,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub reason: Option<Option<String>>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation("date must be YYYY-MM-DD"))
}

fn parse_time(raw: &str) -> Result<NaiveTime, ApiError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ApiError::validation("time must be HH:MM"))
}

fn parse_status(raw: &str) -> Result<AppointmentStatus, ApiError> {
    AppointmentStatus::parse(raw).ok_or_else(|| {
        ApiError::validation(format!(
            "status must be one of scheduled, completed, cancelled (got {raw:?})"
        ))
    })
}

fn clean_optional(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub async fn list_appointments(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let mut rows = state
        .store
        .list_appointments(AppointmentFilter {
            doctor_id: q.doctor_id,
            date: None,
        })
        .await?;
    if let Some(patient_id) = q.patient_id {
        rows.retain(|a| a.patient_id == patient_id);
    }
    Ok(Json(rows))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let row = state
        .store
        .get_appointment(appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;
    Ok(Json(row))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let date = parse_date(&req.date)?;
    let time = parse_time(&req.time)?;

    let (patient, doctor) = tokio::try_join!(
        state.store.get_patient(req.patient_id),
        state.store.get_doctor(req.doctor_id),
    )?;
    let patient = patient.ok_or_else(|| ApiError::not_found("patient"))?;
    let doctor = doctor.ok_or_else(|| ApiError::not_found("doctor"))?;

    let appointment = state
        .store
        .create_appointment(NewAppointment {
            patient_id: patient.id,
            patient_name: patient.name,
            doctor_id: doctor.id,
            doctor_name: doctor.name,
            date,
            time,
            reason: clean_optional(req.reason),
        })
        .await?;
    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        %date,
        "appointment scheduled"
    );

    Ok(Json(appointment))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let patch = AppointmentPatch {
        date: req.date.as_deref().map(parse_date).transpose()?,
        time: req.time.as_deref().map(parse_time).transpose()?,
        status: req.status.as_deref().map(parse_status).transpose()?,
        reason: req.reason.map(clean_optional),
    };
    Ok(Json(state.store.update_appointment(appointment_id, patch).await?))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_appointment(appointment_id).await?;
    tracing::info!(%appointment_id, "appointment deleted");
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Doctor, Patient};
    use crate::store::{MemoryStore, NewDoctor, NewPatient};

    fn state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new()),
        }
    }

    async fn seed(state: &AppState) -> (Patient, Doctor) {
        let patient = state
            .store
            .create_patient(NewPatient {
                name: "Pedro Gomes".into(),
                cpf: None,
                birth_date: None,
            })
            .await
            .unwrap();
        let doctor = state
            .store
            .create_doctor(NewDoctor {
                name: "Dr. Carlos Pereira".into(),
                crm: Some("123456".into()),
                specialty: Some("Clínica Geral".into()),
                phone: None,
                email: None,
            })
            .await
            .unwrap();
        (patient, doctor)
    }

    fn request(patient: &Patient, doctor: &Doctor, date: &str, time: &str) -> Json<CreateAppointmentRequest> {
        Json(CreateAppointmentRequest {
            patient_id: patient.id,
            doctor_id: doctor.id,
            date: date.into(),
            time: time.into(),
            reason: Some(" Consulta de rotina ".into()),
        })
    }

    #[tokio::test]
    async fn booking_copies_names_and_starts_scheduled() {
        let state = state();
        let (patient, doctor) = seed(&state).await;

        let appt = create_appointment(
            State(state.clone()),
            request(&patient, &doctor, "2025-10-21", "09:00"),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(appt.patient_name, "Pedro Gomes");
        assert_eq!(appt.doctor_name, "Dr. Carlos Pereira");
        assert_eq!(appt.status, "scheduled");
        assert_eq!(appt.reason.as_deref(), Some("Consulta de rotina"));
        assert_eq!(appt.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn bad_date_time_or_unknown_doctor_are_rejected() {
        let state = state();
        let (patient, doctor) = seed(&state).await;

        for (date, time) in [("21/10/2025", "09:00"), ("2025-10-21", "9h")] {
            let err = create_appointment(State(state.clone()), request(&patient, &doctor, date, time))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));
        }

        let err = create_appointment(
            State(state.clone()),
            Json(CreateAppointmentRequest {
                patient_id: patient.id,
                doctor_id: Uuid::new_v4(),
                date: "2025-10-21".into(),
                time: "09:00".into(),
                reason: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }

    #[tokio::test]
    async fn status_update_accepts_legacy_label() {
        let state = state();
        let (patient, doctor) = seed(&state).await;
        let appt = create_appointment(
            State(state.clone()),
            request(&patient, &doctor, "2025-10-21", "11:00"),
        )
        .await
        .unwrap()
        .0;

        let req: UpdateAppointmentRequest =
            serde_json::from_value(serde_json::json!({ "status": "Cancelada", "reason": null }))
                .unwrap();
        let updated = update_appointment(State(state.clone()), Path(appt.id), Json(req))
            .await
            .unwrap()
            .0;
        assert_eq!(updated.status, "cancelled");
        assert!(updated.reason.is_none());

        let req = UpdateAppointmentRequest {
            status: Some("pending".into()),
            ..Default::default()
        };
        let err = update_appointment(State(state.clone()), Path(appt.id), Json(req))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        delete_appointment(State(state.clone()), Path(appt.id)).await.unwrap();
        let rows = list_appointments(State(state.clone()), Query(ListQuery::default()))
            .await
            .unwrap()
            .0;
        assert!(rows.is_empty());
    }
}
