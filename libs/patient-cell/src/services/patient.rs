use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_database::{DocumentStore, Fields, PATIENTS};

use crate::models::{
    consultations_value, Consultation, ConsultationDraft, Patient, PatientDraft, PatientError,
};

/// Writes to the `patients` collection. Reads go through the live mirror.
pub struct PatientService {
    store: Arc<dyn DocumentStore>,
}

impl PatientService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Registers a patient after checking that the national ID is not taken.
    ///
    /// The check and the insert are two separate calls; two desks creating
    /// the same national ID at once can both succeed.
    pub async fn create_patient(&self, draft: &PatientDraft) -> Result<Patient, PatientError> {
        draft.validate()?;
        let national_id = draft.national_id.trim();
        debug!("Creating patient record for national ID {}", national_id);

        let existing = self
            .store
            .find_equal(PATIENTS, "cpf", &json!(national_id))
            .await?;
        if !existing.is_empty() {
            warn!(
                "National ID {} already registered to {} patient(s)",
                national_id,
                existing.len()
            );
            return Err(PatientError::DuplicateNationalId(national_id.to_string()));
        }

        let created_at = Utc::now();
        let mut fields = draft.to_fields();
        fields.insert("isArchived".into(), json!(false));
        fields.insert("consultations".into(), json!([]));
        fields.insert("createdAt".into(), json!(created_at.to_rfc3339()));

        let id = self.store.add(PATIENTS, fields).await.map_err(|e| {
            error!("Failed to insert patient: {}", e);
            e
        })?;
        debug!("Patient created with ID: {}", id);

        let mut patient = Patient {
            id,
            name: String::new(),
            national_id: String::new(),
            date_of_birth: None,
            phone: String::new(),
            city: None,
            notes: String::new(),
            archived: false,
            created_at: Some(created_at),
            consultations: Vec::new(),
        };
        patient.apply_draft(draft);
        Ok(patient)
    }

    /// Partial update of the cadastral fields. History and archive flag are
    /// left alone.
    pub async fn update_patient(
        &self,
        patient_id: &str,
        draft: &PatientDraft,
    ) -> Result<(), PatientError> {
        draft.validate()?;
        debug!("Updating cadastral fields of patient {}", patient_id);

        self.store
            .update(PATIENTS, patient_id, draft.to_fields())
            .await?;
        Ok(())
    }

    /// Prepends a new consultation and rewrites the whole sequence. Returns
    /// the sequence as written.
    pub async fn add_consultation(
        &self,
        patient: &Patient,
        draft: ConsultationDraft,
    ) -> Result<Vec<Consultation>, PatientError> {
        let consultation = draft.into_consultation(Uuid::new_v4().to_string());
        debug!(
            "Adding consultation {:?} to patient {}",
            consultation.id, patient.id
        );

        let mut consultations = Vec::with_capacity(patient.consultations.len() + 1);
        consultations.push(consultation);
        consultations.extend(patient.consultations.iter().cloned());

        self.write_consultations(&patient.id, &consultations).await?;
        Ok(consultations)
    }

    /// Replaces the consultation with the draft's id and rewrites the whole
    /// sequence. Returns the sequence as written.
    pub async fn edit_consultation(
        &self,
        patient: &Patient,
        draft: ConsultationDraft,
    ) -> Result<Vec<Consultation>, PatientError> {
        let id = match draft.id.clone() {
            Some(id) if !id.is_empty() => id,
            _ => return Err(PatientError::MissingConsultationId),
        };

        let position = patient
            .consultations
            .iter()
            .position(|c| c.id.as_deref() == Some(id.as_str()))
            .ok_or_else(|| PatientError::ConsultationNotFound(id.clone()))?;
        debug!("Editing consultation {} of patient {}", id, patient.id);

        let mut consultations = patient.consultations.clone();
        consultations[position] = draft.into_consultation(id);

        self.write_consultations(&patient.id, &consultations).await?;
        Ok(consultations)
    }

    /// Soft delete. The record and its history stay in the store.
    pub async fn archive_patient(&self, patient_id: &str) -> Result<(), PatientError> {
        debug!("Archiving patient {}", patient_id);

        let mut fields = Fields::new();
        fields.insert("isArchived".into(), Value::Bool(true));
        self.store.update(PATIENTS, patient_id, fields).await?;
        Ok(())
    }

    async fn write_consultations(
        &self,
        patient_id: &str,
        consultations: &[Consultation],
    ) -> Result<(), PatientError> {
        let mut fields = Fields::new();
        fields.insert("consultations".into(), consultations_value(consultations)?);
        self.store.update(PATIENTS, patient_id, fields).await?;
        Ok(())
    }
}
