use serde::{Deserialize, Serialize};
use serde_json::json;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt;

use patient_cell::{City, PatientRef};
use shared_database::{Fields, StoreError};
use shared_models::dates;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    /// `None` when the stored value is blank or unreadable.
    #[serde(default, with = "dates::optional_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "dates::optional_time")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    /// Copied from the patient at booking time and never refreshed.
    pub patient_id: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default, with = "patient_cell::models::city_field")]
    pub patient_city: Option<City>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    #[serde(rename = "Agendado")]
    Scheduled,
    #[serde(rename = "Confirmado")]
    Confirmed,
    #[serde(rename = "Atendido")]
    Seen,
    #[serde(rename = "Faltou")]
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Seen,
        AppointmentStatus::NoShow,
    ];

    /// The stored and displayed name.
    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Agendado",
            AppointmentStatus::Confirmed => "Confirmado",
            AppointmentStatus::Seen => "Atendido",
            AppointmentStatus::NoShow => "Faltou",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ==============================================================================
// FORM
// ==============================================================================

pub const DEFAULT_TIME: (u32, u32) = (9, 0);

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDraft {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub notes: String,
    pub status: AppointmentStatus,
}

impl AppointmentDraft {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: Some(today),
            time: NaiveTime::from_hms_opt(DEFAULT_TIME.0, DEFAULT_TIME.1, 0),
            notes: String::new(),
            status: AppointmentStatus::Scheduled,
        }
    }

    pub fn validate(&self) -> Result<(NaiveDate, NaiveTime), AppointmentError> {
        match (self.date, self.time) {
            (Some(date), Some(time)) => Ok((date, time)),
            _ => Err(AppointmentError::MissingSchedule),
        }
    }

    pub(crate) fn into_appointment(
        self,
        id: String,
        patient: &PatientRef,
        created_at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let (date, time) = self.validate()?;
        Ok(Appointment {
            id,
            date: Some(date),
            time: Some(time),
            notes: self.notes,
            status: self.status,
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            patient_city: patient.city,
            created_at: Some(created_at),
        })
    }
}

pub(crate) fn appointment_fields(appointment: &Appointment) -> Result<Fields, AppointmentError> {
    match serde_json::to_value(appointment) {
        Ok(serde_json::Value::Object(mut fields)) => {
            fields.remove("id");
            Ok(fields)
        }
        Ok(other) => Err(AppointmentError::Encoding(format!("not an object: {}", other))),
        Err(e) => Err(AppointmentError::Encoding(e.to_string())),
    }
}

pub(crate) fn status_fields(status: AppointmentStatus) -> Fields {
    let mut fields = Fields::new();
    fields.insert("status".into(), json!(status.label()));
    fields
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("No patient selected")]
    NoPatientSelected,

    #[error("Appointment date and time are required")]
    MissingSchedule,

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NoPatientSelected | AppointmentError::MissingSchedule => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::Encoding(msg) => AppError::Internal(msg),
            AppointmentError::Store(store) => store.into(),
        }
    }
}
