use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::fmt;

use shared_database::{Fields, StoreError};
use shared_models::dates::{self, optional_date};
use shared_models::error::AppError;

pub const DEFAULT_DOCTOR: &str = "Dr. Ricardo Lobo";
const MAX_PLAUSIBLE_AGE: u32 = 120;

// ==============================================================================
// CITIES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum City {
    JoaoPinheiro,
    Vazante,
    BrasilandiaDeMinas,
    Lagamar,
    Other,
}

impl City {
    pub const ALL: [City; 5] = [
        City::JoaoPinheiro,
        City::Vazante,
        City::BrasilandiaDeMinas,
        City::Lagamar,
        City::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            City::JoaoPinheiro => "João Pinheiro - MG",
            City::Vazante => "Vazante - MG",
            City::BrasilandiaDeMinas => "Brasilândia de Minas - MG",
            City::Lagamar => "Lagamar - MG",
            City::Other => "Outra",
        }
    }

    pub fn from_label(raw: &str) -> Option<City> {
        let raw = raw.trim();
        City::ALL.into_iter().find(|city| city.label() == raw)
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `city` as stored: the label, or an empty string when unset. Labels outside
/// the served list are read as `Other`.
pub mod city_field {
    use super::City;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<City>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.map(|city| city.label()).unwrap_or(""))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<City>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(City::from_label(&raw).unwrap_or_else(|| {
            tracing::warn!("Unknown city {:?}, reading as Other", raw);
            City::Other
        })))
    }
}

// ==============================================================================
// CONSULTATION MODELS
// ==============================================================================

/// One value per eye: OD (right) and OE (left).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EyePair {
    #[serde(default)]
    pub od: String,
    #[serde(default)]
    pub oe: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LensPower {
    #[serde(default)]
    pub sph: String,
    #[serde(default)]
    pub cyl: String,
    #[serde(default)]
    pub axis: String,
}

/// Refraction or lensometry: per-eye power plus the near addition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LensPrescription {
    #[serde(default)]
    pub od: LensPower,
    #[serde(default)]
    pub oe: LensPower,
    #[serde(default)]
    pub add: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EyeExam {
    /// Visual acuity without correction.
    #[serde(default)]
    pub av_sc: EyePair,
    /// Visual acuity with correction.
    #[serde(default)]
    pub av_cc: EyePair,
    #[serde(default)]
    pub refraction: LensPrescription,
    /// Current glasses.
    #[serde(default)]
    pub lensometry: LensPrescription,
    /// Intraocular pressure, mmHg.
    #[serde(default)]
    pub pio: EyePair,
    #[serde(default)]
    pub biomicroscopy: String,
    #[serde(default)]
    pub fundoscopy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    #[serde(rename = "consultId", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `None` when the stored date is blank or unreadable.
    #[serde(default, with = "optional_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub doctor: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub exam: EyeExam,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsultationDraft {
    /// Present when editing an existing consultation.
    pub id: Option<String>,
    pub date: Option<NaiveDate>,
    pub doctor: String,
    pub diagnosis: String,
    pub notes: String,
    pub exam: EyeExam,
}

impl ConsultationDraft {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            id: None,
            date: Some(today),
            doctor: DEFAULT_DOCTOR.to_string(),
            diagnosis: String::new(),
            notes: String::new(),
            exam: EyeExam::default(),
        }
    }

    pub fn from_consultation(consultation: &Consultation) -> Self {
        Self {
            id: consultation.id.clone(),
            date: consultation.date,
            doctor: consultation.doctor.clone(),
            diagnosis: consultation.diagnosis.clone(),
            notes: consultation.notes.clone(),
            exam: consultation.exam.clone(),
        }
    }

    pub fn into_consultation(self, id: String) -> Consultation {
        Consultation {
            id: Some(id),
            date: self.date,
            doctor: self.doctor,
            diagnosis: self.diagnosis,
            notes: self.notes,
            exam: self.exam,
        }
    }
}

// ==============================================================================
// PATIENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    #[serde(rename = "cpf", default)]
    pub national_id: String,
    #[serde(rename = "dob", default, with = "optional_date")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub phone: String,
    #[serde(default, with = "city_field")]
    pub city: Option<City>,
    #[serde(default)]
    pub notes: String,
    #[serde(rename = "isArchived", default)]
    pub archived: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consultations: Vec<Consultation>,
}

impl Patient {
    /// Whole years on `today`; `None` without a plausible date of birth.
    pub fn age(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        if dob > today {
            return None;
        }
        let mut years = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        let years = u32::try_from(years).ok()?;
        (years <= MAX_PLAUSIBLE_AGE).then_some(years)
    }

    /// Consultation history, most recent first. Same-day entries keep their
    /// stored order; undated entries come last.
    pub fn consultations_newest_first(&self) -> Vec<&Consultation> {
        let mut history: Vec<&Consultation> = self.consultations.iter().collect();
        history.sort_by(|a, b| b.date.cmp(&a.date));
        history
    }

    pub fn latest_consultation(&self) -> Option<&Consultation> {
        self.consultations_newest_first().into_iter().next()
    }

    pub fn latest_consultation_date(&self) -> Option<NaiveDate> {
        self.consultations.iter().filter_map(|c| c.date).max()
    }

    pub fn was_seen_on(&self, day: NaiveDate) -> bool {
        self.consultations.iter().any(|c| c.date == Some(day))
    }

    pub fn reference(&self) -> PatientRef {
        PatientRef {
            id: self.id.clone(),
            name: self.name.clone(),
            city: self.city,
        }
    }

    /// Applies a confirmed cadastral edit to this local copy.
    pub fn apply_draft(&mut self, draft: &PatientDraft) {
        self.name = draft.name.trim().to_string();
        self.national_id = draft.national_id.trim().to_string();
        self.date_of_birth = draft.date_of_birth;
        self.phone = draft.phone.clone();
        self.city = draft.city;
        self.notes = draft.notes.clone();
    }
}

/// The patient fields an appointment copies at booking time.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRef {
    pub id: String,
    pub name: String,
    pub city: Option<City>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientDraft {
    pub name: String,
    pub national_id: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: String,
    pub city: Option<City>,
    pub notes: String,
}

impl PatientDraft {
    pub fn new(name: impl Into<String>, national_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            national_id: national_id.into(),
            ..Self::default()
        }
    }

    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            name: patient.name.clone(),
            national_id: patient.national_id.clone(),
            date_of_birth: patient.date_of_birth,
            phone: patient.phone.clone(),
            city: patient.city,
            notes: patient.notes.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), PatientError> {
        if self.name.trim().is_empty() || self.national_id.trim().is_empty() {
            return Err(PatientError::MissingRequiredFields);
        }
        Ok(())
    }

    /// The cadastral fields as written to the store.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(self.name.trim()));
        fields.insert("cpf".into(), json!(self.national_id.trim()));
        fields.insert(
            "dob".into(),
            json!(self
                .date_of_birth
                .map(|d| d.format(dates::DATE_FORMAT).to_string())
                .unwrap_or_default()),
        );
        fields.insert("phone".into(), json!(self.phone));
        fields.insert(
            "city".into(),
            json!(self.city.map(|c| c.label()).unwrap_or("")),
        );
        fields.insert("notes".into(), json!(self.notes));
        fields
    }
}

pub(crate) fn consultations_value(consultations: &[Consultation]) -> Result<Value, PatientError> {
    serde_json::to_value(consultations).map_err(|e| PatientError::Encoding(e.to_string()))
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatientError {
    #[error("Name and national ID are required")]
    MissingRequiredFields,

    #[error("National ID {0} is already registered")]
    DuplicateNationalId(String),

    #[error("Consultation has no identifier")]
    MissingConsultationId,

    #[error("Consultation {0} not found")]
    ConsultationNotFound(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::MissingRequiredFields
            | PatientError::MissingConsultationId
            | PatientError::ConsultationNotFound(_) => AppError::ValidationError(err.to_string()),
            PatientError::DuplicateNationalId(_) => AppError::Conflict(err.to_string()),
            PatientError::Encoding(msg) => AppError::Internal(msg),
            PatientError::Store(store) => store.into(),
        }
    }
}
