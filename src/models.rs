use std::sync::Arc;

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::store::HospitalStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HospitalStore>,
}

/* -------------------------
   Records
--------------------------*/

/// A physical bed. `status` is whatever was persisted and may be stale;
/// read it through the occupancy resolver, never directly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bed {
    pub id: Uuid,
    pub code: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Links a patient to a bed. A missing `discharge_timestamp` means the
/// admission is still active.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub id: Uuid,
    pub bed_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub entry_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_lenient_timestamp")]
    pub discharge_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Admission {
    pub fn is_active(&self) -> bool {
        self.discharge_timestamp.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub cpf: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub crm: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A scheduled consultation. Patient and doctor names are copied at booking
/// time, like `Admission::patient_name`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Always one of the [`AppointmentStatus`] tokens.
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub text: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Canonical tokens plus the legacy Portuguese labels.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "scheduled" | "agendada" => Some(AppointmentStatus::Scheduled),
            "completed" | "realizada" => Some(AppointmentStatus::Completed),
            "cancelled" | "canceled" | "cancelada" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self {
            data: OkData { ok: true },
        }
    }
}

/* -------------------------
   Helpers
--------------------------*/

/// Field present (even as `null`) => `Some(..)`, absent => `None`.
pub fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/// Accepts RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` taken as UTC.
/// Anything else (wrong type, garbage text) becomes `None` instead of failing
/// the whole payload; for a discharge timestamp that reads as "still admitted".
pub fn deserialize_lenient_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(value) = raw else {
        return Ok(None);
    };

    let parsed = value.as_str().and_then(parse_timestamp);
    if parsed.is_none() && !value.is_null() {
        tracing::warn!(%value, "unparseable timestamp, treating as absent");
    }
    Ok(parsed)
}

/// Strings pass through, numbers and booleans are stringified, anything else
/// is `None`.
pub fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(v @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => Some(v.to_string()),
        Some(other) => {
            tracing::warn!(value = %other, "expected a string, treating as absent");
            None
        }
    })
}

/// Parses every array element on its own. An element that does not fit `T`
/// is logged and dropped; the rest of the array still goes through.
pub fn deserialize_lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed record");
                None
            }
        })
        .collect())
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
