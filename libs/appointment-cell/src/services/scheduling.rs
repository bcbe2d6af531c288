use chrono::NaiveDate;
use tracing::debug;

use patient_cell::{search_active_patients, show_no_match_hint, Patient, PatientRef};

use crate::models::{AppointmentDraft, AppointmentError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStep {
    /// Find an existing patient or register a new one.
    SearchOrCreate,
    /// A patient is resolved; fill in date, time and notes.
    Details,
}

/// The new-appointment modal. Dropping it discards everything; the next
/// modal starts from a fresh flow.
#[derive(Debug, Clone)]
pub struct SchedulingFlow {
    search: String,
    registering: bool,
    patient: Option<PatientRef>,
    draft: AppointmentDraft,
}

impl SchedulingFlow {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            search: String::new(),
            registering: false,
            patient: None,
            draft: AppointmentDraft::new(today),
        }
    }

    pub fn step(&self) -> SchedulingStep {
        if self.patient.is_some() {
            SchedulingStep::Details
        } else {
            SchedulingStep::SearchOrCreate
        }
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn results<'a>(&self, patients: &'a [Patient]) -> Vec<&'a Patient> {
        search_active_patients(patients, &self.search)
    }

    pub fn show_no_match_hint(&self, patients: &[Patient]) -> bool {
        show_no_match_hint(&self.search, self.results(patients).len())
    }

    pub fn is_registering(&self) -> bool {
        self.registering
    }

    /// Opens the inline new-patient form.
    pub fn start_registration(&mut self) {
        self.registering = true;
    }

    pub fn cancel_registration(&mut self) {
        self.registering = false;
    }

    pub fn select_patient(&mut self, patient: &Patient) {
        debug!("Scheduling for patient {}", patient.id);
        self.patient = Some(patient.reference());
        self.registering = false;
    }

    /// Continuation of a successful registration: the new patient is the
    /// one being scheduled.
    pub fn patient_registered(&mut self, patient: &Patient) {
        self.select_patient(patient);
    }

    pub fn patient(&self) -> Option<&PatientRef> {
        self.patient.as_ref()
    }

    /// Back to search. Clears the chosen patient and the search term.
    pub fn back(&mut self) {
        self.patient = None;
        self.search.clear();
    }

    pub fn draft(&self) -> &AppointmentDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut AppointmentDraft {
        &mut self.draft
    }

    /// What a submit would book, checked without touching the store.
    pub fn submission(&self) -> Result<(PatientRef, AppointmentDraft), AppointmentError> {
        let patient = self.patient.clone().ok_or(AppointmentError::NoPatientSelected)?;
        self.draft.validate()?;
        Ok((patient, self.draft.clone()))
    }
}
