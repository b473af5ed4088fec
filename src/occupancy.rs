//! Bed occupancy reconciliation.
//!
//! A bed's stored status can go stale (an admission created without touching
//! the bed, a maintenance flag left on after a patient was placed). The status
//! shown to users is therefore derived on every read: an active admission
//! always wins, otherwise the stored flag is normalized.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Admission, Bed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BedStatus {
    Free,
    Maintenance,
    Occupied,
}

impl BedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BedStatus::Free => "free",
            BedStatus::Maintenance => "maintenance",
            BedStatus::Occupied => "occupied",
        }
    }

    /// Read-side normalization of a free-form stored value. Never fails:
    /// unknown, empty and missing values are `Free`. Only case is folded, so a
    /// value with leading whitespace matches no prefix.
    pub fn normalize(raw: Option<&str>) -> Self {
        let v = raw.unwrap_or_default().to_lowercase();
        if v.starts_with("ocup") || v.starts_with("occup") {
            BedStatus::Occupied
        } else if v.starts_with("manut") || v.starts_with("maint") {
            BedStatus::Maintenance
        } else {
            BedStatus::Free
        }
    }

    /// Write-side validation. Only whole tokens are accepted.
    pub fn parse_strict(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "free" | "livre" => Some(BedStatus::Free),
            "maintenance" | "manutencao" | "manutenção" => Some(BedStatus::Maintenance),
            "occupied" | "ocupado" => Some(BedStatus::Occupied),
            _ => None,
        }
    }
}

impl fmt::Display for BedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-bed output of [`resolve_all`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBed {
    pub id: Uuid,
    pub code: String,
    pub stored_status: Option<String>,
    pub effective_status: BedStatus,
    pub active_patient_name: Option<String>,
}

impl ResolvedBed {
    fn new(bed: &Bed, active: Option<&Admission>) -> Self {
        Self {
            id: bed.id,
            code: bed.code.clone(),
            stored_status: bed.status.clone(),
            effective_status: resolve_status(bed, active),
            active_patient_name: active.map(|a| a.patient_name.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OccupancyCounts {
    pub total: usize,
    pub free: usize,
    pub occupied: usize,
    pub maintenance: usize,
}

/// Effective status of one bed given the admissions that reference it.
/// The caller does the join; admissions for other beds are not filtered out.
pub fn resolve_status<'a, I>(bed: &Bed, admissions_for_bed: I) -> BedStatus
where
    I: IntoIterator<Item = &'a Admission>,
{
    if admissions_for_bed.into_iter().any(Admission::is_active) {
        return BedStatus::Occupied;
    }
    BedStatus::normalize(bed.status.as_deref())
}

/// Resolves a single bed against its own admission history.
pub fn resolve_bed(bed: &Bed, admissions_for_bed: &[Admission]) -> ResolvedBed {
    let active = select_active(bed.id, admissions_for_bed.iter().filter(|a| a.is_active()));
    ResolvedBed::new(bed, active)
}

/// Resolves every bed. Output has one entry per input bed, in input order.
pub fn resolve_all(beds: &[Bed], admissions: &[Admission]) -> Vec<ResolvedBed> {
    let mut active_by_bed: HashMap<Uuid, Vec<&Admission>> = HashMap::new();
    for admission in admissions.iter().filter(|a| a.is_active()) {
        active_by_bed.entry(admission.bed_id).or_default().push(admission);
    }

    beds.iter()
        .map(|bed| {
            let active = active_by_bed
                .get(&bed.id)
                .and_then(|candidates| select_active(bed.id, candidates.iter().copied()));
            ResolvedBed::new(bed, active)
        })
        .collect()
}

pub fn count_by_status(resolved: &[ResolvedBed]) -> OccupancyCounts {
    resolved
        .iter()
        .fold(OccupancyCounts::default(), |mut acc, bed| {
            acc.total += 1;
            match bed.effective_status {
                BedStatus::Free => acc.free += 1,
                BedStatus::Occupied => acc.occupied += 1,
                BedStatus::Maintenance => acc.maintenance += 1,
            }
            acc
        })
}

/// Picks the active admission for a bed out of `candidates` (all active).
///
/// More than one candidate is a data-integrity violation. The latest
/// `entry_timestamp` wins, an undated admission loses to any dated one, and
/// on an exact tie the candidate appearing later in the input wins.
fn select_active<'a>(
    bed_id: Uuid,
    candidates: impl Iterator<Item = &'a Admission>,
) -> Option<&'a Admission> {
    candidates.reduce(|current, candidate| {
        let winner = if candidate.entry_timestamp >= current.entry_timestamp {
            candidate
        } else {
            current
        };
        let loser = if std::ptr::eq(winner, candidate) { current } else { candidate };
        tracing::warn!(
            %bed_id,
            kept_admission = %winner.id,
            ignored_admission = %loser.id,
            "multiple active admissions for one bed"
        );
        winner
    })
}
