// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
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

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const BED_COLUMNS: &str = "id, code, status";
const ADMISSION_COLUMNS: &str =
    "id, bed_id, patient_id, patient_name, entry_timestamp, discharge_timestamp, reason";
const PATIENT_COLUMNS: &str = "id, name, cpf, birth_date";
const DOCTOR_COLUMNS: &str = "id, name, crm, specialty, phone, email";
const APPOINTMENT_COLUMNS: &str = "id, patient_id, patient_name, doctor_id, doctor_name, \
     scheduled_date AS date, scheduled_time AS time, status, reason";
const PRESCRIPTION_COLUMNS: &str = "id, appointment_id, text, author, created_at";

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl BedRepository for PgStore {
    async fn list_beds(&self) -> Result<Vec<Bed>, StoreError> {
        let rows = sqlx::query_as::<_, Bed>(&format!(
            "SELECT {BED_COLUMNS} FROM bed ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_bed(&self, id: Uuid) -> Result<Option<Bed>, StoreError> {
        let row = sqlx::query_as::<_, Bed>(&format!("SELECT {BED_COLUMNS} FROM bed WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn create_bed(&self, new: NewBed) -> Result<Bed, StoreError> {
        sqlx::query_as::<_, Bed>(&format!(
            r#"
            INSERT INTO bed (id, code, status, created_at)
            VALUES ($1, $2, $3, now())
            RETURNING {BED_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.code)
        .bind(new.status.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::conflict(BED_CODE_TAKEN, format!("bed code {} already exists", new.code))
            } else {
                e.into()
            }
        })
    }

    async fn update_bed(&self, id: Uuid, patch: BedPatch) -> Result<Bed, StoreError> {
        sqlx::query_as::<_, Bed>(&format!(
            r#"
            UPDATE bed
            SET code = COALESCE($2, code),
                status = COALESCE($3, status)
            WHERE id = $1
            RETURNING {BED_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.code.as_deref())
        .bind(patch.status.map(|s| s.as_str()))
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::conflict(BED_CODE_TAKEN, "bed code already exists")
            } else {
                e.into()
            }
        })?
        .ok_or(StoreError::NotFound("bed"))
    }

    async fn delete_bed(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM bed WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::conflict(BED_IN_USE, "bed is referenced by admissions")
                } else {
                    e.into()
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("bed"));
        }
        Ok(())
    }
}

#[async_trait]
impl AdmissionRepository for PgStore {
    async fn list_admissions(&self, filter: AdmissionFilter) -> Result<Vec<Admission>, StoreError> {
        let condition = match filter {
            AdmissionFilter::All => "TRUE",
            AdmissionFilter::Active => "discharge_timestamp IS NULL",
            AdmissionFilter::Discharged => "discharge_timestamp IS NOT NULL",
        };
        let rows = sqlx::query_as::<_, Admission>(&format!(
            "SELECT {ADMISSION_COLUMNS} FROM admission WHERE {condition} ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_admissions_for_bed(&self, bed_id: Uuid) -> Result<Vec<Admission>, StoreError> {
        let rows = sqlx::query_as::<_, Admission>(&format!(
            "SELECT {ADMISSION_COLUMNS} FROM admission WHERE bed_id = $1 ORDER BY created_at DESC"
        ))
        .bind(bed_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_admission(&self, id: Uuid) -> Result<Option<Admission>, StoreError> {
        let row = sqlx::query_as::<_, Admission>(&format!(
            "SELECT {ADMISSION_COLUMNS} FROM admission WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_admission(&self, new: NewAdmission) -> Result<Admission, StoreError> {
        let mut tx = self.db.begin().await?;

        // row lock: a concurrent maintenance toggle waits for this insert (or vice versa)
        let status = sqlx::query_scalar::<_, Option<String>>(
            "SELECT status FROM bed WHERE id = $1 FOR UPDATE",
        )
        .bind(new.bed_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("bed"))?;
        if BedStatus::normalize(status.as_deref()) == BedStatus::Maintenance {
            return Err(StoreError::conflict(BED_OCCUPIED, "bed is under maintenance"));
        }

        // admission_one_active_per_bed (partial unique index) backs the occupied check
        let row = sqlx::query_as::<_, Admission>(&format!(
            r#"
            INSERT INTO admission (id, bed_id, patient_id, patient_name, entry_timestamp, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING {ADMISSION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.bed_id)
        .bind(new.patient_id)
        .bind(&new.patient_name)
        .bind(new.entry_timestamp)
        .bind(new.reason.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::conflict(BED_OCCUPIED, "bed already has an active admission")
            } else if is_foreign_key_violation(&e) {
                StoreError::NotFound("patient")
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        Ok(row)
    }

    async fn discharge_admission(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        let updated = sqlx::query_as::<_, Admission>(&format!(
            r#"
            UPDATE admission
            SET discharge_timestamp = $2
            WHERE id = $1
              AND discharge_timestamp IS NULL
            RETURNING {ADMISSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.db)
        .await?;

        match updated {
            Some(row) => Ok(row),
            None => match self.get_admission(id).await? {
                Some(_) => Err(StoreError::conflict(
                    ALREADY_DISCHARGED,
                    "admission was already discharged",
                )),
                None => Err(StoreError::NotFound("admission")),
            },
        }
    }

    async fn delete_admission(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM admission WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("admission"));
        }
        Ok(())
    }
}

#[async_trait]
impl PatientRepository for PgStore {
    async fn list_patients(&self, query: Option<&str>) -> Result<Vec<Patient>, StoreError> {
        let query = query.map(str::trim).unwrap_or_default();
        if query.is_empty() {
            let rows = sqlx::query_as::<_, Patient>(&format!(
                "SELECT {PATIENT_COLUMNS} FROM patient ORDER BY created_at DESC LIMIT 200"
            ))
            .fetch_all(&self.db)
            .await?;
            return Ok(rows);
        }

        let like = format!("%{query}%");
        let rows = sqlx::query_as::<_, Patient>(&format!(
            r#"
            SELECT {PATIENT_COLUMNS}
            FROM patient
            WHERE name ILIKE $1
            ORDER BY created_at DESC
            LIMIT 200
            "#
        ))
        .bind(like)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count_patients(&self) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM patient")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        let row = sqlx::query_as::<_, Patient>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patient WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError> {
        let row = sqlx::query_as::<_, Patient>(&format!(
            r#"
            INSERT INTO patient (id, name, cpf, birth_date, created_at)
            VALUES ($1, $2, $3, $4, now())
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(new.cpf.as_deref())
        .bind(new.birth_date)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_patient(&self, id: Uuid, patch: PatientPatch) -> Result<Patient, StoreError> {
        let existing = self
            .get_patient(id)
            .await?
            .ok_or(StoreError::NotFound("patient"))?;

        let name = patch.name.unwrap_or(existing.name);
        let cpf = patch.cpf.unwrap_or(existing.cpf);
        let birth_date = patch.birth_date.unwrap_or(existing.birth_date);

        sqlx::query_as::<_, Patient>(&format!(
            r#"
            UPDATE patient
            SET name = $2,
                cpf = $3,
                birth_date = $4
            WHERE id = $1
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(cpf)
        .bind(birth_date)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound("patient"))
    }

    async fn delete_patient(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM patient WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::conflict(
                        PATIENT_IN_USE,
                        "patient is referenced by admissions or appointments",
                    )
                } else {
                    e.into()
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("patient"));
        }
        Ok(())
    }
}

#[async_trait]
impl DoctorRepository for PgStore {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let rows = sqlx::query_as::<_, Doctor>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor ORDER BY name ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let row = sqlx::query_as::<_, Doctor>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError> {
        let row = sqlx::query_as::<_, Doctor>(&format!(
            r#"
            INSERT INTO doctor (id, name, crm, specialty, phone, email, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(new.crm.as_deref())
        .bind(new.specialty.as_deref())
        .bind(new.phone.as_deref())
        .bind(new.email.as_deref())
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_doctor(&self, id: Uuid, patch: DoctorPatch) -> Result<Doctor, StoreError> {
        let existing = self
            .get_doctor(id)
            .await?
            .ok_or(StoreError::NotFound("doctor"))?;

        sqlx::query_as::<_, Doctor>(&format!(
            r#"
            UPDATE doctor
            SET name = $2,
                crm = $3,
                specialty = $4,
                phone = $5,
                email = $6
            WHERE id = $1
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name.unwrap_or(existing.name))
        .bind(patch.crm.unwrap_or(existing.crm))
        .bind(patch.specialty.unwrap_or(existing.specialty))
        .bind(patch.phone.unwrap_or(existing.phone))
        .bind(patch.email.unwrap_or(existing.email))
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound("doctor"))
    }

    async fn delete_doctor(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM doctor WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::conflict(DOCTOR_IN_USE, "doctor is referenced by appointments")
                } else {
                    e.into()
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("doctor"));
        }
        Ok(())
    }
}

#[async_trait]
impl AppointmentRepository for PgStore {
    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE ($1::uuid IS NULL OR doctor_id = $1)
              AND ($2::date IS NULL OR scheduled_date = $2)
            ORDER BY scheduled_date ASC, scheduled_time ASC
            "#
        ))
        .bind(filter.doctor_id)
        .bind(filter.date)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            INSERT INTO appointment
              (id, patient_id, patient_name, doctor_id, doctor_name,
               scheduled_date, scheduled_time, status, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.patient_id)
        .bind(&new.patient_name)
        .bind(new.doctor_id)
        .bind(&new.doctor_name)
        .bind(new.date)
        .bind(new.time)
        .bind(AppointmentStatus::Scheduled.as_str())
        .bind(new.reason.as_deref())
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound("patient or doctor")
            } else {
                e.into()
            }
        })
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError> {
        let existing = self
            .get_appointment(id)
            .await?
            .ok_or(StoreError::NotFound("appointment"))?;

        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointment
            SET scheduled_date = $2,
                scheduled_time = $3,
                status = $4,
                reason = $5
            WHERE id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.date.unwrap_or(existing.date))
        .bind(patch.time.unwrap_or(existing.time))
        .bind(patch.status.map_or(existing.status, |s| s.as_str().to_string()))
        .bind(patch.reason.unwrap_or(existing.reason))
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound("appointment"))
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<(), StoreError> {
        // prescriptions go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM appointment WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("appointment"));
        }
        Ok(())
    }
}

#[async_trait]
impl PrescriptionRepository for PgStore {
    async fn list_prescriptions(
        &self,
        appointment_id: Uuid,
    ) -> Result<Vec<Prescription>, StoreError> {
        let rows = sqlx::query_as::<_, Prescription>(&format!(
            r#"
            SELECT {PRESCRIPTION_COLUMNS}
            FROM prescription
            WHERE appointment_id = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(appointment_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError> {
        let row = sqlx::query_as::<_, Prescription>(&format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescription WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create_prescription(&self, new: NewPrescription) -> Result<Prescription, StoreError> {
        sqlx::query_as::<_, Prescription>(&format!(
            r#"
            INSERT INTO prescription (id, appointment_id, text, author, created_at)
            VALUES ($1, $2, $3, $4, now())
            RETURNING {PRESCRIPTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.appointment_id)
        .bind(&new.text)
        .bind(new.author.as_deref())
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound("appointment")
            } else {
                e.into()
            }
        })
    }

    async fn delete_prescription(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM prescription WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("prescription"));
        }
        Ok(())
    }
}
