// src/routes/report_routes.rs

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        deserialize_lenient_string, deserialize_lenient_timestamp, deserialize_lenient_vec,
        Admission, ApiOk, AppState, Appointment, Bed,
    },
    occupancy::{count_by_status, resolve_all, BedStatus, OccupancyCounts, ResolvedBed},
    routes::appointment_routes::parse_date,
    store::{
        AdmissionFilter, AdmissionRepository, AppointmentFilter, AppointmentRepository,
        BedRepository,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/beds", get(bed_occupancy_report))
        .route("/reports/beds/resolve", post(resolve_snapshot))
        .route("/reports/active-admissions", get(active_admissions_report))
        .route("/reports/doctor-schedule", get(doctor_schedule_report))
}

#[derive(Debug, Serialize)]
pub struct BedOccupancyReport {
    pub counts: OccupancyCounts,
    pub beds: Vec<ResolvedBed>,
}

impl BedOccupancyReport {
    fn build(beds: &[Bed], admissions: &[Admission]) -> Self {
        let beds = resolve_all(beds, admissions);
        Self {
            counts: count_by_status(&beds),
            beds,
        }
    }
}

/* -------------------------
   Snapshot resolution
--------------------------*/

/// Collections fetched elsewhere, e.g. an export of another system. Ids are
/// opaque (numbers or strings) and every record is parsed on its own: a
/// malformed element is skipped, a malformed field reads as absent.
#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    #[serde(default, deserialize_with = "deserialize_lenient_vec")]
    pub beds: Vec<SnapshotBed>,
    #[serde(default, deserialize_with = "deserialize_lenient_vec")]
    pub admissions: Vec<SnapshotAdmission>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotBed {
    #[serde(default)]
    pub id: Value,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAdmission {
    #[serde(default)]
    pub bed_id: Value,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub entry_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub discharge_timestamp: Option<DateTime<Utc>>,
}

/// Like [`ResolvedBed`], but carrying the caller's own id back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResolvedBed {
    pub id: Value,
    pub code: String,
    pub stored_status: Option<String>,
    pub effective_status: BedStatus,
    pub active_patient_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotReport {
    pub counts: OccupancyCounts,
    pub beds: Vec<SnapshotResolvedBed>,
}

/// Join key for a caller-supplied id. `1` and `"1"` name the same bed;
/// `null` names none.
fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl SnapshotRequest {
    /// Maps the opaque ids onto internal ones, runs the resolver, then puts
    /// the caller's ids back. Admissions pointing at no posted bed are dropped.
    fn resolve(self) -> SnapshotReport {
        let mut ids: HashMap<String, Uuid> = HashMap::new();
        let beds: Vec<Bed> = self
            .beds
            .iter()
            .map(|b| Bed {
                id: match id_key(&b.id) {
                    Some(key) => *ids.entry(key).or_insert_with(Uuid::new_v4),
                    None => Uuid::new_v4(),
                },
                code: b.code.clone().unwrap_or_default(),
                status: b.status.clone(),
            })
            .collect();

        let admissions: Vec<Admission> = self
            .admissions
            .into_iter()
            .enumerate()
            .filter_map(|(position, a)| {
                let bed_id = id_key(&a.bed_id).and_then(|key| ids.get(&key).copied())?;
                Some(Admission {
                    // position in the posted array; shows up in tie-break warnings
                    id: Uuid::from_u128(position as u128),
                    bed_id,
                    patient_id: Uuid::nil(),
                    patient_name: a.patient_name.unwrap_or_default(),
                    entry_timestamp: a.entry_timestamp,
                    discharge_timestamp: a.discharge_timestamp,
                    reason: None,
                })
            })
            .collect();

        let resolved = resolve_all(&beds, &admissions);
        let counts = count_by_status(&resolved);
        let beds = resolved
            .into_iter()
            .zip(self.beds)
            .map(|(r, posted)| SnapshotResolvedBed {
                id: posted.id,
                code: r.code,
                stored_status: r.stored_status,
                effective_status: r.effective_status,
                active_patient_name: r.active_patient_name.filter(|n| !n.is_empty()),
            })
            .collect();

        SnapshotReport { counts, beds }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAdmissionRow {
    pub admission_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub bed_id: Uuid,
    pub bed_code: Option<String>,
    pub entry_timestamp: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

pub async fn bed_occupancy_report(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<BedOccupancyReport>>, ApiError> {
    let (beds, admissions) = tokio::try_join!(
        state.store.list_beds(),
        state.store.list_admissions(AdmissionFilter::Active),
    )?;

    Ok(Json(ApiOk {
        data: BedOccupancyReport::build(&beds, &admissions),
    }))
}

/// Same reconciliation as `/reports/beds`, over caller-supplied data.
/// Nothing is read from or written to the store.
pub async fn resolve_snapshot(Json(req): Json<SnapshotRequest>) -> Json<ApiOk<SnapshotReport>> {
    Json(ApiOk {
        data: req.resolve(),
    })
}

pub async fn active_admissions_report(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<ActiveAdmissionRow>>>, ApiError> {
    let (beds, admissions) = tokio::try_join!(
        state.store.list_beds(),
        state.store.list_admissions(AdmissionFilter::Active),
    )?;

    let codes: HashMap<Uuid, &str> = beds.iter().map(|b| (b.id, b.code.as_str())).collect();
    let mut rows: Vec<ActiveAdmissionRow> = admissions
        .into_iter()
        .map(|a| ActiveAdmissionRow {
            admission_id: a.id,
            patient_id: a.patient_id,
            bed_code: codes.get(&a.bed_id).map(|c| c.to_string()),
            bed_id: a.bed_id,
            patient_name: a.patient_name,
            entry_timestamp: a.entry_timestamp,
            reason: a.reason,
        })
        .collect();
    rows.sort_by(|x, y| y.entry_timestamp.cmp(&x.entry_timestamp));

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub doctor_id: Option<Uuid>,
    /// YYYY-MM-DD
    pub date: Option<String>,
}

/// Appointments for one doctor and/or one calendar day, earliest first.
/// Either filter may be omitted.
pub async fn doctor_schedule_report(
    State(state): State<AppState>,
    Query(q): Query<ScheduleQuery>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let date = q
        .date
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_date)
        .transpose()?;

    let rows = state
        .store
        .list_appointments(AppointmentFilter {
            doctor_id: q.doctor_id,
            date,
        })
        .await?;
    Ok(Json(ApiOk { data: rows }))
}
