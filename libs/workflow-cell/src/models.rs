use chrono::NaiveDate;

use appointment_cell::SchedulingFlow;
use patient_cell::{DetailView, Patient, PatientListFilter};
use shared_models::auth::Identity;

use crate::services::notifications::NotificationCenter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for an identity.
    Starting,
    Ready,
    /// Startup failed; the message is what the user sees. There is no retry.
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Agenda,
    Patients,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// Everything the desk shows, apart from the mirrored collections.
#[derive(Debug)]
pub struct AppState {
    pub phase: Phase,
    pub identity: Option<Identity>,
    pub view: View,
    /// Local copy of the open patient, updated after confirmed writes.
    pub selected_patient: Option<Patient>,
    pub detail_view: DetailView,
    pub patient_modal_open: bool,
    /// Present while the new-appointment modal is open.
    pub scheduling: Option<SchedulingFlow>,
    pub submitting: bool,
    pub agenda_date: NaiveDate,
    pub list_filter: PatientListFilter,
    pub notifications: NotificationCenter,
}

impl AppState {
    pub fn new(today: NaiveDate, notifications: NotificationCenter) -> Self {
        Self {
            phase: Phase::Starting,
            identity: None,
            view: View::Agenda,
            selected_patient: None,
            detail_view: DetailView::Details,
            patient_modal_open: false,
            scheduling: None,
            submitting: false,
            agenda_date: today,
            list_filter: PatientListFilter::default(),
            notifications,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }
}
