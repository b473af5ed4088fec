// src/store/mod.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::{Admission, Appointment, AppointmentStatus, Bed, Doctor, Patient, Prescription};
use crate::occupancy::BedStatus;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const BED_CODE_TAKEN: &str = "BED_CODE_TAKEN";
pub const BED_IN_USE: &str = "BED_IN_USE";
pub const BED_OCCUPIED: &str = "BED_OCCUPIED";
pub const PATIENT_IN_USE: &str = "PATIENT_IN_USE";
pub const ALREADY_DISCHARGED: &str = "ALREADY_DISCHARGED";
pub const DOCTOR_IN_USE: &str = "DOCTOR_IN_USE";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        StoreError::Conflict {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBed {
    pub code: String,
    pub status: BedStatus,
}

#[derive(Debug, Clone, Default)]
pub struct BedPatch {
    pub code: Option<String>,
    pub status: Option<BedStatus>,
}

#[derive(Debug, Clone)]
pub struct NewAdmission {
    pub bed_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub entry_timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionFilter {
    #[default]
    All,
    Active,
    Discharged,
}

impl AdmissionFilter {
    pub fn matches(self, admission: &Admission) -> bool {
        match self {
            AdmissionFilter::All => true,
            AdmissionFilter::Active => admission.is_active(),
            AdmissionFilter::Discharged => !admission.is_active(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub cpf: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// `None` leaves a field untouched; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub cpf: Option<Option<String>>,
    pub birth_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub crm: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub crm: Option<Option<String>>,
    pub specialty: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub status: Option<AppointmentStatus>,
    pub reason: Option<Option<String>>,
}

/// Both criteria are optional; `date` is compared for equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.is_none_or(|id| appointment.doctor_id == id)
            && self.date.is_none_or(|date| appointment.date == date)
    }
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub appointment_id: Uuid,
    pub text: String,
    pub author: Option<String>,
}

/// Lists are newest first.
#[async_trait]
pub trait BedRepository: Send + Sync {
    async fn list_beds(&self) -> Result<Vec<Bed>, StoreError>;
    async fn get_bed(&self, id: Uuid) -> Result<Option<Bed>, StoreError>;
    /// Conflict `BED_CODE_TAKEN` when the code already exists.
    async fn create_bed(&self, new: NewBed) -> Result<Bed, StoreError>;
    async fn update_bed(&self, id: Uuid, patch: BedPatch) -> Result<Bed, StoreError>;
    /// Conflict `BED_IN_USE` while any admission references the bed.
    async fn delete_bed(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AdmissionRepository: Send + Sync {
    async fn list_admissions(&self, filter: AdmissionFilter) -> Result<Vec<Admission>, StoreError>;
    async fn list_admissions_for_bed(&self, bed_id: Uuid) -> Result<Vec<Admission>, StoreError>;
    async fn get_admission(&self, id: Uuid) -> Result<Option<Admission>, StoreError>;
    /// Conflict `BED_OCCUPIED` when the bed already has an active admission or
    /// is stored as under maintenance. Checked atomically with the insert.
    async fn create_admission(&self, new: NewAdmission) -> Result<Admission, StoreError>;
    /// Sets the discharge timestamp once; conflict `ALREADY_DISCHARGED` after that.
    async fn discharge_admission(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Admission, StoreError>;
    async fn delete_admission(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PatientRepository: Send + Sync {
    /// Case-insensitive substring match on the name when `query` is given.
    async fn list_patients(&self, query: Option<&str>) -> Result<Vec<Patient>, StoreError>;
    async fn count_patients(&self) -> Result<i64, StoreError>;
    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError>;
    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError>;
    async fn update_patient(&self, id: Uuid, patch: PatientPatch) -> Result<Patient, StoreError>;
    /// Conflict `PATIENT_IN_USE` while any admission or appointment references
    /// the patient.
    async fn delete_patient(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    /// Ordered by name.
    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError>;
    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError>;
    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError>;
    async fn update_doctor(&self, id: Uuid, patch: DoctorPatch) -> Result<Doctor, StoreError>;
    /// Conflict `DOCTOR_IN_USE` while any appointment references the doctor.
    async fn delete_doctor(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Ordered by date, then time.
    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError>;
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;
    /// New appointments always start as `scheduled`.
    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError>;
    async fn update_appointment(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError>;
    /// Removes the appointment's prescriptions with it.
    async fn delete_appointment(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    /// Oldest first, the order they were written in.
    async fn list_prescriptions(&self, appointment_id: Uuid)
        -> Result<Vec<Prescription>, StoreError>;
    async fn get_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError>;
    async fn create_prescription(&self, new: NewPrescription) -> Result<Prescription, StoreError>;
    async fn delete_prescription(&self, id: Uuid) -> Result<(), StoreError>;
}

pub trait HospitalStore:
    BedRepository
    + AdmissionRepository
    + PatientRepository
    + DoctorRepository
    + AppointmentRepository
    + PrescriptionRepository
{
}

impl<T> HospitalStore for T where
    T: BedRepository
        + AdmissionRepository
        + PatientRepository
        + DoctorRepository
        + AppointmentRepository
        + PrescriptionRepository
{
}
