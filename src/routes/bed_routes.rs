// src/routes/bed_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{AppState, Bed, OkResponse},
    occupancy::{resolve_all, resolve_bed, BedStatus, ResolvedBed},
    store::{AdmissionFilter, AdmissionRepository, BedPatch, BedRepository, NewBed},
};

const MAX_CODE_LEN: usize = 32;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/beds", get(list_beds).post(create_bed))
        .route("/beds/{bed_id}", get(get_bed).patch(update_bed).delete(delete_bed))
        .route("/beds/{bed_id}/maintenance", post(toggle_maintenance))
}

#[derive(Debug, Deserialize)]
pub struct CreateBedRequest {
    pub code: String,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBedRequest {
    pub code: Option<String>,
    pub status: Option<String>,
}

fn validate_code(raw: &str) -> Result<String, ApiError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(ApiError::validation("code is required"));
    }
    if code.chars().count() > MAX_CODE_LEN {
        return Err(ApiError::validation(format!(
            "code is too long (max {MAX_CODE_LEN})"
        )));
    }
    Ok(code.to_string())
}

fn validate_status(raw: &str) -> Result<BedStatus, ApiError> {
    BedStatus::parse_strict(raw).ok_or_else(|| {
        ApiError::validation(format!(
            "status must be one of free, maintenance, occupied (got {raw:?})"
        ))
    })
}

async fn load_bed(state: &AppState, bed_id: Uuid) -> Result<Bed, ApiError> {
    state
        .store
        .get_bed(bed_id)
        .await?
        .ok_or_else(|| ApiError::not_found("bed"))
}

async fn resolve_one(state: &AppState, bed: &Bed) -> Result<ResolvedBed, ApiError> {
    let admissions = state.store.list_admissions_for_bed(bed.id).await?;
    Ok(resolve_bed(bed, &admissions))
}

pub async fn list_beds(State(state): State<AppState>) -> Result<Json<Vec<ResolvedBed>>, ApiError> {
    let (beds, admissions) = tokio::try_join!(
        state.store.list_beds(),
        state.store.list_admissions(AdmissionFilter::Active),
    )?;

    Ok(Json(resolve_all(&beds, &admissions)))
}

pub async fn get_bed(
    State(state): State<AppState>,
    Path(bed_id): Path<Uuid>,
) -> Result<Json<ResolvedBed>, ApiError> {
    let bed = load_bed(&state, bed_id).await?;
    Ok(Json(resolve_one(&state, &bed).await?))
}

pub async fn create_bed(
    State(state): State<AppState>,
    Json(req): Json<CreateBedRequest>,
) -> Result<Json<ResolvedBed>, ApiError> {
    let code = validate_code(&req.code)?;
    let status = match req.status.as_deref() {
        Some(s) => validate_status(s)?,
        None => BedStatus::Free,
    };

    let bed = state.store.create_bed(NewBed { code, status }).await?;
    tracing::info!(bed_id = %bed.id, code = %bed.code, "bed created");

    Ok(Json(resolve_bed(&bed, &[])))
}

pub async fn update_bed(
    State(state): State<AppState>,
    Path(bed_id): Path<Uuid>,
    Json(req): Json<UpdateBedRequest>,
) -> Result<Json<ResolvedBed>, ApiError> {
    let patch = BedPatch {
        code: req.code.as_deref().map(validate_code).transpose()?,
        status: req.status.as_deref().map(validate_status).transpose()?,
    };

    let bed = state.store.update_bed(bed_id, patch).await?;
    Ok(Json(resolve_one(&state, &bed).await?))
}

/// Stored `maintenance` goes back to `free`; anything else goes to `maintenance`.
pub async fn toggle_maintenance(
    State(state): State<AppState>,
    Path(bed_id): Path<Uuid>,
) -> Result<Json<ResolvedBed>, ApiError> {
    let bed = load_bed(&state, bed_id).await?;
    let next = match BedStatus::normalize(bed.status.as_deref()) {
        BedStatus::Maintenance => BedStatus::Free,
        _ => BedStatus::Maintenance,
    };

    let bed = state
        .store
        .update_bed(
            bed_id,
            BedPatch {
                code: None,
                status: Some(next),
            },
        )
        .await?;
    tracing::info!(%bed_id, status = %next, "bed maintenance toggled");

    Ok(Json(resolve_one(&state, &bed).await?))
}

pub async fn delete_bed(
    State(state): State<AppState>,
    Path(bed_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete_bed(bed_id).await?;
    tracing::info!(%bed_id, "bed deleted");
    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::store::{
        MemoryStore, NewAdmission, NewPatient, PatientRepository, BED_CODE_TAKEN, BED_IN_USE,
    };

    fn state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new()),
        }
    }

    async fn add_bed(state: &AppState, code: &str) -> ResolvedBed {
        create_bed(
            State(state.clone()),
            Json(CreateBedRequest {
                code: code.to_string(),
                status: None,
            }),
        )
        .await
        .unwrap()
        .0
    }

    async fn admit(state: &AppState, bed_id: Uuid, name: &str) {
        let patient = state
            .store
            .create_patient(NewPatient {
                name: name.to_string(),
                cpf: None,
                birth_date: None,
            })
            .await
            .unwrap();
        state
            .store
            .create_admission(NewAdmission {
                bed_id,
                patient_id: patient.id,
                patient_name: patient.name,
                entry_timestamp: Utc::now(),
                reason: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn new_bed_defaults_to_free_with_trimmed_code() {
        let state = state();
        let bed = add_bed(&state, "  A-201 ").await;
        assert_eq!(bed.code, "A-201");
        assert_eq!(bed.stored_status.as_deref(), Some("free"));
        assert_eq!(bed.effective_status, BedStatus::Free);
    }

    #[tokio::test]
    async fn create_rejects_blank_code_bad_status_and_duplicates() {
        let state = state();
        let err = create_bed(
            State(state.clone()),
            Json(CreateBedRequest {
                code: "   ".into(),
                status: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        let err = create_bed(
            State(state.clone()),
            Json(CreateBedRequest {
                code: "A-201".into(),
                status: Some("ocup".into()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", _)));

        add_bed(&state, "A-201").await;
        let err = create_bed(
            State(state.clone()),
            Json(CreateBedRequest {
                code: "A-201".into(),
                status: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(BED_CODE_TAKEN, _)));
    }

    #[tokio::test]
    async fn list_reports_admission_overriding_maintenance() {
        let state = state();
        let a = add_bed(&state, "A-201").await;
        let b = add_bed(&state, "B-010").await;
        toggle_maintenance(State(state.clone()), Path(b.id)).await.unwrap();
        admit(&state, b.id, "João da Silva").await;

        let beds = list_beds(State(state.clone())).await.unwrap().0;
        assert_eq!(beds.len(), 2);
        // newest first
        assert_eq!(beds[0].id, b.id);
        assert_eq!(beds[0].stored_status.as_deref(), Some("maintenance"));
        assert_eq!(beds[0].effective_status, BedStatus::Occupied);
        assert_eq!(beds[0].active_patient_name.as_deref(), Some("João da Silva"));
        assert_eq!(beds[1].id, a.id);
        assert_eq!(beds[1].effective_status, BedStatus::Free);
    }

    #[tokio::test]
    async fn maintenance_toggle_round_trips() {
        let state = state();
        let bed = add_bed(&state, "C-005").await;

        let on = toggle_maintenance(State(state.clone()), Path(bed.id)).await.unwrap().0;
        assert_eq!(on.effective_status, BedStatus::Maintenance);

        let off = toggle_maintenance(State(state.clone()), Path(bed.id)).await.unwrap().0;
        assert_eq!(off.effective_status, BedStatus::Free);
        assert_eq!(off.stored_status.as_deref(), Some("free"));
    }

    #[tokio::test]
    async fn patch_writes_canonical_status() {
        let state = state();
        let bed = add_bed(&state, "D-003").await;

        let updated = update_bed(
            State(state.clone()),
            Path(bed.id),
            Json(UpdateBedRequest {
                code: Some("D-004".into()),
                status: Some("Manutenção".into()),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(updated.code, "D-004");
        assert_eq!(updated.stored_status.as_deref(), Some("maintenance"));

        let err = update_bed(
            State(state.clone()),
            Path(Uuid::new_v4()),
            Json(UpdateBedRequest {
                code: None,
                status: Some("free".into()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }

    #[tokio::test]
    async fn delete_is_rejected_while_admissions_reference_bed() {
        let state = state();
        let busy = add_bed(&state, "E-001").await;
        let idle = add_bed(&state, "E-002").await;
        admit(&state, busy.id, "Ana Oliveira").await;

        let err = delete_bed(State(state.clone()), Path(busy.id)).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(BED_IN_USE, _)));

        delete_bed(State(state.clone()), Path(idle.id)).await.unwrap();
        let err = get_bed(State(state.clone()), Path(idle.id)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(..)));
    }
}
