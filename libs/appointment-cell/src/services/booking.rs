use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};

use patient_cell::PatientRef;
use shared_database::{DocumentStore, APPOINTMENTS};

use crate::models::{
    appointment_fields, status_fields, Appointment, AppointmentDraft, AppointmentError,
    AppointmentStatus,
};

/// Writes to the `appointments` collection.
pub struct AppointmentService {
    store: Arc<dyn DocumentStore>,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Books `draft` for `patient`, copying the patient's name and city into
    /// the appointment.
    pub async fn create_appointment(
        &self,
        patient: Option<&PatientRef>,
        draft: AppointmentDraft,
    ) -> Result<Appointment, AppointmentError> {
        let patient = patient.ok_or(AppointmentError::NoPatientSelected)?;
        debug!("Booking appointment for patient {}", patient.id);

        let mut appointment = draft.into_appointment(String::new(), patient, Utc::now())?;
        let fields = appointment_fields(&appointment)?;

        appointment.id = self.store.add(APPOINTMENTS, fields).await.map_err(|e| {
            error!("Failed to insert appointment: {}", e);
            e
        })?;
        debug!(
            "Appointment {} booked for {:?} at {:?}",
            appointment.id, appointment.date, appointment.time
        );
        Ok(appointment)
    }

    /// Any status may move to any other.
    pub async fn update_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Setting appointment {} to {}", appointment_id, status);
        self.store
            .update(APPOINTMENTS, appointment_id, status_fields(status))
            .await?;
        Ok(())
    }
}
