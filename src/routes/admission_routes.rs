// src/routes/admission_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{parse_timestamp, Admission, AppState, OkResponse},
    store::{
        AdmissionFilter, AdmissionRepository, BedRepository, NewAdmission, PatientRepository,
        ALREADY_DISCHARGED,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admissions", get(list_admissions).post(create_admission))
        .route(
            "/admissions/{admission_id}",
            get(get_admission).delete(delete_admission),
        )
        .route("/admissions/{admission_id}/discharge", post(discharge_admission))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdmissionRequest {
    pub bed_id: Uuid,
    pub patient_id: Uuid,
    pub entry_timestamp: Option<String>,
    pub reason: Option<String>,
}

/// Body may be `{}`; the discharge time then defaults to now.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargeRequest {
    pub discharge_timestamp: Option<String>,
}

/// Write-side timestamps are strict: a malformed value is a 400, not a guess.
fn parse_request_timestamp(field: &str, raw: Option<&str>) -> Result<DateTime<Utc>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Utc::now()),
        Some(s) => parse_timestamp(s).ok_or_else(|| {
            ApiError::validation(format!("{field} must be an ISO-8601 timestamp"))
        }),
    }
}

pub async fn list_admissions(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Admission>>, ApiError> {
    let filter = match q.active {
        None => AdmissionFilter::All,
        Some(true) => AdmissionFilter::Active,
        Some(false) => AdmissionFilter::Discharged,
    };
    Ok(Json(state.store.list_admissions(filter).await?))
}

pub async fn get_admission(
    State(state): State<AppState>,
    Path(admission_id): Path<Uuid>,
) -> Result<Json<Admission>, ApiError> {
    let row = state
        .store
        .get_admission(admission_id)
        .await?
        .ok_or_else(|| ApiError::not_found("admission"))?;
    Ok(Json(row))
}

pub async fn create_admission(
    State(state): State<AppState>,
    Json(req): Json<CreateAdmissionRequest>,
) -> Result<Json<Admission>, ApiError> {
    let entry_timestamp =
        parse_request_timestamp("entryTimestamp", req.entry_timestamp.as_deref())?;

    let (bed, patient) = tokio::try_join!(
        state.store.get_bed(req.bed_id),
        state.store.get_patient(req.patient_id),
    )?;
    let bed = bed.ok_or_else(|| ApiError::not_found("bed"))?;
    let patient = patient.ok_or_else(|| ApiError::not_found("patient"))?;

    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    // the store rejects an active admission or maintenance atomically (BED_OCCUPIED);
    // a stale stored "occupied" flag alone does not block
    let admission = state
        .store
        .create_admission(NewAdmission {
            bed_id: bed.id,
            patient_id: patient.id,
            patient_name: patient.name,
            entry_timestamp,
            reason,
        })
        .await?;
    tracing::info!(
        admission_id = %admission.id,
        bed_id = %bed.id,
        patient_id = %admission.patient_id,
        "patient admitted"
    );

    Ok(Json(admission))
}

pub async fn discharge_admission(
    State(state): State<AppState>,
    Path(admission_id): Path<Uuid>,
    Json(req): Json<DischargeRequest>,
) -> Result<Json<Admission>, ApiError> {
    let at = parse_request_timestamp("dischargeTimestamp", req.discharge_timestamp.as_deref())?;

    let admission = state
        .store
        .get_admission(admission_id)
        .await?
        .ok_or_else(|| ApiError::not_found("admission"))?;
    if !admission.is_active() {
        return Err(ApiError::Conflict(
            ALREADY_DISCHARGED,
            "admission was already discharged".into(),
        ));
    }
    if admission.entry_timestamp.is_some_and(|entry| at < entry) {
        return Err(ApiError::validation(
            "dischargeTimestamp must not precede entryTimestamp",
        ));
    }

    let admission = state.store.discharge_admission(admission_id, at).await?;
    tracing::info!(%admission_id, bed_id = %admission.bed_id, "patient discharged");

    Ok(Json(admission))
}

pub async fn delete_admission(
    State(state): State<AppState>,
    Path(admission_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_admission(admission_id).await?;
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Bed, Patient};
    use crate::occupancy::BedStatus;
    use crate::store::{BedPatch, MemoryStore, NewBed, NewPatient, BED_OCCUPIED};

    fn state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new()),
        }
    }

    async fn seed(state: &AppState, code: &str, name: &str) -> (Bed, Patient) {
        let bed = state
            .store
            .create_bed(NewBed {
                code: code.to_string(),
                status: BedStatus::Free,
            })
            .await
            .unwrap();
        let patient = state
            .store
            .create_patient(NewPatient {
                name: name.to_string(),
                cpf: None,
                birth_date: None,
            })
            .await
            .unwrap();
        (bed, patient)
    }

    fn request(bed: &Bed, patient: &Patient, entry: Option<&str>) -> Json<CreateAdmissionRequest> {
        Json(CreateAdmissionRequest {
            bed_id: bed.id,
            patient_id: patient.id,
            entry_timestamp: entry.map(str::to_string),
            reason: Some("  Pneumonia ".into()),
        })
    }

    #[tokio::test]
    async fn admission_denormalizes_patient_name() {
        let state = state();
        let (bed, patient) = seed(&state, "A-201", "João da Silva").await;

        let adm = create_admission(
            State(state.clone()),
            request(&bed, &patient, Some("2025-10-15T09:00:00Z")),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(adm.patient_name, "João da Silva");
        assert_eq!(adm.reason.as_deref(), Some("Pneumonia"));
        assert!(adm.is_active());
    }

    #[tokio::test]
    async fn busy_or_maintenance_bed_is_rejected() {
        let state = state();
        let (bed, ana) = seed(&state, "A-201", "Ana Oliveira").await;
        let (spare, joao) = seed(&state, "B-010", "João da Silva").await;

        create_admission(State(state.clone()), request(&bed, &ana, None))
            .await
            .unwrap();
        let err = create_admission(State(state.clone()), request(&bed, &joao, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(BED_OCCUPIED, _)));

        state
            .store
            .update_bed(
                spare.id,
                BedPatch {
                    code: None,
                    status: Some(BedStatus::Maintenance),
                },
            )
            .await
            .unwrap();
        let err = create_admission(State(state.clone()), request(&spare, &joao, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(BED_OCCUPIED, _)));
    }

    #[tokio::test]
    async fn stale_occupied_flag_does_not_block_admission() {
        let state = state();
        let (bed, ana) = seed(&state, "C-005", "Ana Oliveira").await;
        state
            .store
            .update_bed(
                bed.id,
                BedPatch {
                    code: None,
                    status: Some(BedStatus::Occupied),
                },
            )
            .await
            .unwrap();

        create_admission(State(state.clone()), request(&bed, &ana, None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_references_and_bad_timestamps() {
        let state = state();
        let (bed, patient) = seed(&state, "A-201", "Ana Oliveira").await;

        let err = create_admission(
            State(state.clone()),
            Json(CreateAdmissionRequest {
                bed_id: Uuid::new_v4(),
                patient_id: patient.id,
                entry_timestamp: None,
                reason: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));

        let err = create_admission(State(state.clone()), request(&bed, &patient, Some("ontem")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));
    }

    #[tokio::test]
    async fn discharge_once_and_not_before_entry() {
        let state = state();
        let (bed, patient) = seed(&state, "A-201", "Ana Oliveira").await;
        let adm = create_admission(
            State(state.clone()),
            request(&bed, &patient, Some("2025-10-15T09:00:00Z")),
        )
        .await
        .unwrap()
        .0;

        let err = discharge_admission(
            State(state.clone()),
            Path(adm.id),
            Json(DischargeRequest {
                discharge_timestamp: Some("2025-10-14T09:00:00Z".into()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        let done = discharge_admission(
            State(state.clone()),
            Path(adm.id),
            Json(DischargeRequest {
                discharge_timestamp: Some("2025-10-20T12:00:00Z".into()),
            }),
        )
        .await
        .unwrap()
        .0;
        assert!(!done.is_active());

        let err = discharge_admission(State(state.clone()), Path(adm.id), Json(DischargeRequest::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ALREADY_DISCHARGED, _)));

        let active = list_admissions(State(state.clone()), Query(ListQuery { active: Some(true) }))
            .await
            .unwrap()
            .0;
        assert!(active.is_empty());
        let past = list_admissions(State(state.clone()), Query(ListQuery { active: Some(false) }))
            .await
            .unwrap()
            .0;
        assert_eq!(past.len(), 1);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let state = state();
        let (bed, patient) = seed(&state, "A-201", "Ana Oliveira").await;
        let adm = create_admission(State(state.clone()), request(&bed, &patient, None))
            .await
            .unwrap()
            .0;

        delete_admission(State(state.clone()), Path(adm.id)).await.unwrap();
        let err = get_admission(State(state.clone()), Path(adm.id)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }
}
