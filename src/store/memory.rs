// src/store/memory.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AdmissionFilter, AdmissionRepository, AppointmentFilter, AppointmentPatch,
    AppointmentRepository, BedPatch, BedRepository, DoctorPatch, DoctorRepository, NewAdmission,
    NewAppointment, NewBed, NewDoctor, NewPatient, NewPrescription, PatientPatch,
    PatientRepository, PrescriptionRepository, StoreError, ALREADY_DISCHARGED, BED_CODE_TAKEN,
    BED_IN_USE, BED_OCCUPIED, DOCTOR_IN_USE, PATIENT_IN_USE,
};
use crate::models::{
    Admission, Appointment, AppointmentStatus, Bed, Doctor, Patient, Prescription,
};
use crate::occupancy::BedStatus;

/// Store owned by whoever constructs it (tests, `STORE_BACKEND=memory`).
/// Rows are kept in insertion order; lists return them newest first.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    beds: Vec<Bed>,
    admissions: Vec<Admission>,
    patients: Vec<Patient>,
    doctors: Vec<Doctor>,
    appointments: Vec<Appointment>,
    prescriptions: Vec<Prescription>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BedRepository for MemoryStore {
    async fn list_beds(&self) -> Result<Vec<Bed>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.beds.iter().rev().cloned().collect())
    }

    async fn get_bed(&self, id: Uuid) -> Result<Option<Bed>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.beds.iter().find(|b| b.id == id).cloned())
    }

    async fn create_bed(&self, new: NewBed) -> Result<Bed, StoreError> {
        let mut t = self.tables.write().await;
        if t.beds.iter().any(|b| b.code == new.code) {
            return Err(StoreError::conflict(
                BED_CODE_TAKEN,
                format!("bed code {} already exists", new.code),
            ));
        }
        let bed = Bed {
            id: Uuid::new_v4(),
            code: new.code,
            status: Some(new.status.as_str().to_string()),
        };
        t.beds.push(bed.clone());
        Ok(bed)
    }

    async fn update_bed(&self, id: Uuid, patch: BedPatch) -> Result<Bed, StoreError> {
        let mut t = self.tables.write().await;
        let idx = t
            .beds
            .iter()
            .position(|b| b.id == id)
            .ok_or(StoreError::NotFound("bed"))?;
        if let Some(code) = patch.code.as_deref() {
            if t.beds.iter().any(|b| b.id != id && b.code == code) {
                return Err(StoreError::conflict(
                    BED_CODE_TAKEN,
                    format!("bed code {code} already exists"),
                ));
            }
        }
        let bed = &mut t.beds[idx];
        if let Some(code) = patch.code {
            bed.code = code;
        }
        if let Some(status) = patch.status {
            bed.status = Some(status.as_str().to_string());
        }
        Ok(bed.clone())
    }

    async fn delete_bed(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let idx = t
            .beds
            .iter()
            .position(|b| b.id == id)
            .ok_or(StoreError::NotFound("bed"))?;
        if t.admissions.iter().any(|a| a.bed_id == id) {
            return Err(StoreError::conflict(
                BED_IN_USE,
                "bed is referenced by admissions",
            ));
        }
        t.beds.remove(idx);
        Ok(())
    }
}

#[async_trait]
impl AdmissionRepository for MemoryStore {
    async fn list_admissions(&self, filter: AdmissionFilter) -> Result<Vec<Admission>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.admissions
            .iter()
            .rev()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn list_admissions_for_bed(&self, bed_id: Uuid) -> Result<Vec<Admission>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.admissions
            .iter()
            .rev()
            .filter(|a| a.bed_id == bed_id)
            .cloned()
            .collect())
    }

    async fn get_admission(&self, id: Uuid) -> Result<Option<Admission>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.admissions.iter().find(|a| a.id == id).cloned())
    }

    async fn create_admission(&self, new: NewAdmission) -> Result<Admission, StoreError> {
        let mut t = self.tables.write().await;
        let bed = t
            .beds
            .iter()
            .find(|b| b.id == new.bed_id)
            .ok_or(StoreError::NotFound("bed"))?;
        if BedStatus::normalize(bed.status.as_deref()) == BedStatus::Maintenance {
            return Err(StoreError::conflict(
                BED_OCCUPIED,
                format!("bed {} is under maintenance", bed.code),
            ));
        }
        if !t.patients.iter().any(|p| p.id == new.patient_id) {
            return Err(StoreError::NotFound("patient"));
        }
        if t
            .admissions
            .iter()
            .any(|a| a.bed_id == new.bed_id && a.is_active())
        {
            return Err(StoreError::conflict(
                BED_OCCUPIED,
                "bed already has an active admission",
            ));
        }
        let admission = Admission {
            id: Uuid::new_v4(),
            bed_id: new.bed_id,
            patient_id: new.patient_id,
            patient_name: new.patient_name,
            entry_timestamp: Some(new.entry_timestamp),
            discharge_timestamp: None,
            reason: new.reason,
        };
        t.admissions.push(admission.clone());
        Ok(admission)
    }

    async fn discharge_admission(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        let mut t = self.tables.write().await;
        let admission = t
            .admissions
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound("admission"))?;
        if !admission.is_active() {
            return Err(StoreError::conflict(
                ALREADY_DISCHARGED,
                "admission was already discharged",
            ));
        }
        admission.discharge_timestamp = Some(at);
        Ok(admission.clone())
    }

    async fn delete_admission(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let idx = t
            .admissions
            .iter()
            .position(|a| a.id == id)
            .ok_or(StoreError::NotFound("admission"))?;
        t.admissions.remove(idx);
        Ok(())
    }
}

#[async_trait]
impl PatientRepository for MemoryStore {
    async fn list_patients(&self, query: Option<&str>) -> Result<Vec<Patient>, StoreError> {
        let needle = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
        let t = self.tables.read().await;
        Ok(t.patients
            .iter()
            .rev()
            .filter(|p| match &needle {
                Some(n) => p.name.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn count_patients(&self) -> Result<i64, StoreError> {
        let t = self.tables.read().await;
        Ok(t.patients.len() as i64)
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.patients.iter().find(|p| p.id == id).cloned())
    }

    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError> {
        let mut t = self.tables.write().await;
        let patient = Patient {
            id: Uuid::new_v4(),
            name: new.name,
            cpf: new.cpf,
            birth_date: new.birth_date,
        };
        t.patients.push(patient.clone());
        Ok(patient)
    }

    async fn update_patient(&self, id: Uuid, patch: PatientPatch) -> Result<Patient, StoreError> {
        let mut t = self.tables.write().await;
        let patient = t
            .patients
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound("patient"))?;
        if let Some(name) = patch.name {
            patient.name = name;
        }
        if let Some(cpf) = patch.cpf {
            patient.cpf = cpf;
        }
        if let Some(birth_date) = patch.birth_date {
            patient.birth_date = birth_date;
        }
        Ok(patient.clone())
    }

    async fn delete_patient(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let idx = t
            .patients
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound("patient"))?;
        if t.admissions.iter().any(|a| a.patient_id == id)
            || t.appointments.iter().any(|a| a.patient_id == id)
        {
            return Err(StoreError::conflict(
                PATIENT_IN_USE,
                "patient is referenced by admissions or appointments",
            ));
        }
        t.patients.remove(idx);
        Ok(())
    }
}

#[async_trait]
impl DoctorRepository for MemoryStore {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let t = self.tables.read().await;
        let mut rows = t.doctors.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.doctors.iter().find(|d| d.id == id).cloned())
    }

    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError> {
        let mut t = self.tables.write().await;
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: new.name,
            crm: new.crm,
            specialty: new.specialty,
            phone: new.phone,
            email: new.email,
        };
        t.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn update_doctor(&self, id: Uuid, patch: DoctorPatch) -> Result<Doctor, StoreError> {
        let mut t = self.tables.write().await;
        let doctor = t
            .doctors
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(StoreError::NotFound("doctor"))?;
        if let Some(name) = patch.name {
            doctor.name = name;
        }
        if let Some(crm) = patch.crm {
            doctor.crm = crm;
        }
        if let Some(specialty) = patch.specialty {
            doctor.specialty = specialty;
        }
        if let Some(phone) = patch.phone {
            doctor.phone = phone;
        }
        if let Some(email) = patch.email {
            doctor.email = email;
        }
        Ok(doctor.clone())
    }

    async fn delete_doctor(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let idx = t
            .doctors
            .iter()
            .position(|d| d.id == id)
            .ok_or(StoreError::NotFound("doctor"))?;
        if t.appointments.iter().any(|a| a.doctor_id == id) {
            return Err(StoreError::conflict(
                DOCTOR_IN_USE,
                "doctor is referenced by appointments",
            ));
        }
        t.doctors.remove(idx);
        Ok(())
    }
}

#[async_trait]
impl AppointmentRepository for MemoryStore {
    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Appointment> = t
            .appointments
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.date, a.time));
        Ok(rows)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.appointments.iter().find(|a| a.id == id).cloned())
    }

    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut t = self.tables.write().await;
        if !t.patients.iter().any(|p| p.id == new.patient_id) {
            return Err(StoreError::NotFound("patient"));
        }
        if !t.doctors.iter().any(|d| d.id == new.doctor_id) {
            return Err(StoreError::NotFound("doctor"));
        }
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            patient_name: new.patient_name,
            doctor_id: new.doctor_id,
            doctor_name: new.doctor_name,
            date: new.date,
            time: new.time,
            status: AppointmentStatus::Scheduled.as_str().to_string(),
            reason: new.reason,
        };
        t.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError> {
        let mut t = self.tables.write().await;
        let appointment = t
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound("appointment"))?;
        if let Some(date) = patch.date {
            appointment.date = date;
        }
        if let Some(time) = patch.time {
            appointment.time = time;
        }
        if let Some(status) = patch.status {
            appointment.status = status.as_str().to_string();
        }
        if let Some(reason) = patch.reason {
            appointment.reason = reason;
        }
        Ok(appointment.clone())
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let idx = t
            .appointments
            .iter()
            .position(|a| a.id == id)
            .ok_or(StoreError::NotFound("appointment"))?;
        t.appointments.remove(idx);
        t.prescriptions.retain(|p| p.appointment_id != id);
        Ok(())
    }
}

#[async_trait]
impl PrescriptionRepository for MemoryStore {
    async fn list_prescriptions(
        &self,
        appointment_id: Uuid,
    ) -> Result<Vec<Prescription>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.prescriptions
            .iter()
            .filter(|p| p.appointment_id == appointment_id)
            .cloned()
            .collect())
    }

    async fn get_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.prescriptions.iter().find(|p| p.id == id).cloned())
    }

    async fn create_prescription(&self, new: NewPrescription) -> Result<Prescription, StoreError> {
        let mut t = self.tables.write().await;
        if !t.appointments.iter().any(|a| a.id == new.appointment_id) {
            return Err(StoreError::NotFound("appointment"));
        }
        let prescription = Prescription {
            id: Uuid::new_v4(),
            appointment_id: new.appointment_id,
            text: new.text,
            author: new.author,
            created_at: Utc::now(),
        };
        t.prescriptions.push(prescription.clone());
        Ok(prescription)
    }

    async fn delete_prescription(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let idx = t
            .prescriptions
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound("prescription"))?;
        t.prescriptions.remove(idx);
        Ok(())
    }
}
