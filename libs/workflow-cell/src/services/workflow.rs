use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use appointment_cell::{
    agenda_for, Appointment, AppointmentError, AppointmentService, AppointmentStatus,
    SchedulingFlow,
};
use auth_cell::{AuthError, IdentityBootstrap, IdentityProvider};
use patient_cell::{
    filter_patients, seen_count, seen_on, Consultation, ConsultationDraft, DetailView, Patient,
    PatientDraft, PatientError, PatientListFilter, PatientService,
};
use shared_config::AppConfig;
use shared_database::{DocumentStore, LiveMirror, MirrorState, APPOINTMENTS, PATIENTS};
use shared_models::error::AppError;

use crate::messages;
use crate::models::{AppState, Notification, Phase, View};
use crate::services::notifications::NotificationCenter;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

struct Mirrors {
    patient_updates: watch::Receiver<MirrorState<Patient>>,
    appointment_updates: watch::Receiver<MirrorState<Appointment>>,
    patients: LiveMirror<Patient>,
    appointments: LiveMirror<Appointment>,
    patient_errors_seen: u64,
    appointment_errors_seen: u64,
    patients_open: bool,
    appointments_open: bool,
}

/// Top-level owner of the desk: identity, mirrors, navigation and every
/// write the staff can trigger.
///
/// Writes are two-phase: the remote call goes first and local state changes
/// only once it succeeded. Mirrors catch up through their subscriptions.
pub struct Workflow {
    config: AppConfig,
    bootstrap: IdentityBootstrap,
    store: Arc<dyn DocumentStore>,
    patients: PatientService,
    appointments: AppointmentService,
    mirrors: Option<Mirrors>,
    state: AppState,
    startup_error: Option<AppError>,
}

impl Workflow {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let notifications = NotificationCenter::new(config.notification_ttl());
        Self {
            bootstrap: IdentityBootstrap::new(provider),
            patients: PatientService::new(Arc::clone(&store)),
            appointments: AppointmentService::new(Arc::clone(&store)),
            store,
            mirrors: None,
            state: AppState::new(today(), notifications),
            startup_error: None,
            config,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    /// Acquires the identity and attaches both mirrors. Any failure here is
    /// final and leaves the desk in `Phase::Failed`; later calls return the
    /// same error. Starting twice is a conflict.
    pub async fn start(&mut self) -> Result<(), AppError> {
        match &self.state.phase {
            Phase::Starting => {}
            Phase::Ready => {
                warn!("Desk already started");
                return Err(AppError::Conflict("desk already started".to_string()));
            }
            Phase::Failed(message) => {
                warn!("Start requested after failed startup: {}", message);
                return Err(self
                    .startup_error
                    .clone()
                    .unwrap_or_else(|| AppError::Internal(message.clone())));
            }
        }
        info!("Starting clinic desk for app {}", self.config.app_id);

        if !self.config.is_configured() {
            return Err(self.fail_startup(
                messages::CONFIG_MISSING,
                AppError::Config("store URL or key not set".to_string()),
            ));
        }

        let token = self.config.initial_auth_token.clone();
        let identity = match self.bootstrap.acquire(token.as_deref()).await {
            Ok(identity) => identity,
            Err(err) => {
                let message = match &err {
                    AuthError::NotConfigured => messages::CONFIG_MISSING,
                    AuthError::AnonymousSignInFailed(_) => messages::ANONYMOUS_SIGN_IN_FAILED,
                    _ => messages::AUTH_FAILED,
                };
                return Err(self.fail_startup(message, err.into()));
            }
        };

        self.store.authorize(&identity);
        self.attach_mirrors();

        info!("Desk ready as {}", identity.display_id());
        self.state.identity = Some(identity);
        self.state.phase = Phase::Ready;
        Ok(())
    }

    fn fail_startup(&mut self, message: &str, err: AppError) -> AppError {
        error!("Startup failed: {}", err);
        self.state.phase = Phase::Failed(message.to_string());
        self.startup_error = Some(err.clone());
        err
    }

    fn attach_mirrors(&mut self) {
        let patients: LiveMirror<Patient> = LiveMirror::attach(Arc::clone(&self.store), PATIENTS);
        let appointments: LiveMirror<Appointment> =
            LiveMirror::attach(Arc::clone(&self.store), APPOINTMENTS);

        self.mirrors = Some(Mirrors {
            patient_updates: patients.watch(),
            appointment_updates: appointments.watch(),
            patients,
            appointments,
            patient_errors_seen: 0,
            appointment_errors_seen: 0,
            patients_open: true,
            appointments_open: true,
        });
    }

    /// Detaches both mirrors. Collections read as empty afterwards.
    pub fn shutdown(&mut self) {
        if let Some(mirrors) = self.mirrors.take() {
            mirrors.patients.detach();
            mirrors.appointments.detach();
            info!("Desk shut down");
        }
    }

    /// Turns new subscription failures into notifications.
    pub fn sync(&mut self) {
        let Some(mirrors) = self.mirrors.as_mut() else {
            return;
        };

        let patient_errors = mirrors.patients.state().error_count;
        if patient_errors > mirrors.patient_errors_seen {
            mirrors.patient_errors_seen = patient_errors;
            self.state.notifications.error(messages::PATIENTS_LOAD_FAILED);
        }

        let appointment_errors = mirrors.appointments.state().error_count;
        if appointment_errors > mirrors.appointment_errors_seen {
            mirrors.appointment_errors_seen = appointment_errors;
            self.state.notifications.error(messages::APPOINTMENTS_LOAD_FAILED);
        }
    }

    /// Waits for the next change on either mirror. A mirror whose
    /// subscription ended stops being watched; returns `false` once nothing
    /// is left to watch.
    pub async fn next_update(&mut self) -> bool {
        let Some(mirrors) = self.mirrors.as_mut() else {
            return false;
        };

        let changed = loop {
            if !mirrors.patients_open && !mirrors.appointments_open {
                break false;
            }
            tokio::select! {
                result = mirrors.patient_updates.changed(), if mirrors.patients_open => {
                    if result.is_ok() {
                        break true;
                    }
                    debug!("Patient mirror closed");
                    mirrors.patients_open = false;
                }
                result = mirrors.appointment_updates.changed(), if mirrors.appointments_open => {
                    if result.is_ok() {
                        break true;
                    }
                    debug!("Appointment mirror closed");
                    mirrors.appointments_open = false;
                }
            }
        };
        self.sync();
        changed
    }

    /// Waits until both mirrors have received their first snapshot or failed.
    pub async fn wait_until_loaded(&mut self) {
        if let Some(mirrors) = &self.mirrors {
            mirrors.patients.wait_until(|s| !s.loading).await;
            mirrors.appointments.wait_until(|s| !s.loading).await;
        }
        self.sync();
    }

    pub fn is_loading(&self) -> bool {
        match &self.mirrors {
            Some(mirrors) => {
                mirrors.patients.state().loading || mirrors.appointments.state().loading
            }
            None => self.state.phase == Phase::Starting,
        }
    }

    // ==========================================================================
    // DERIVED VIEWS
    // ==========================================================================

    pub fn patients(&self) -> Arc<Vec<Patient>> {
        self.mirrors
            .as_ref()
            .map(|m| m.patients.items())
            .unwrap_or_default()
    }

    pub fn appointments(&self) -> Arc<Vec<Appointment>> {
        self.mirrors
            .as_ref()
            .map(|m| m.appointments.items())
            .unwrap_or_default()
    }

    /// The patient list under the current filter.
    pub fn patient_list(&self) -> Vec<Patient> {
        let patients = self.patients();
        filter_patients(&patients, &self.state.list_filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn seen_today(&self) -> Vec<Patient> {
        let patients = self.patients();
        seen_on(&patients, today()).into_iter().cloned().collect()
    }

    pub fn seen_today_count(&self) -> usize {
        seen_count(&self.patients(), today())
    }

    pub fn total_patients(&self) -> usize {
        self.patients().len()
    }

    /// Appointments on the agenda date, by time.
    pub fn agenda(&self) -> Vec<Appointment> {
        let appointments = self.appointments();
        agenda_for(&appointments, self.state.agenda_date)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn scheduling_results(&self) -> Vec<Patient> {
        let Some(flow) = &self.state.scheduling else {
            return Vec::new();
        };
        let patients = self.patients();
        flow.results(&patients).into_iter().cloned().collect()
    }

    pub fn scheduling_no_match_hint(&self) -> bool {
        match &self.state.scheduling {
            Some(flow) => flow.show_no_match_hint(&self.patients()),
            None => false,
        }
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.state.notifications.current()
    }

    // ==========================================================================
    // NAVIGATION
    // ==========================================================================

    pub fn set_view(&mut self, view: View) {
        debug!("Switching to {:?}", view);
        self.state.view = view;
        self.state.notifications.dismiss();
    }

    pub fn set_agenda_date(&mut self, date: NaiveDate) {
        self.state.agenda_date = date;
    }

    pub fn list_filter_mut(&mut self) -> &mut PatientListFilter {
        &mut self.state.list_filter
    }

    pub fn dismiss_notification(&mut self) {
        self.state.notifications.dismiss();
    }

    /// Opens a patient from the mirrored list.
    pub fn select_patient(&mut self, patient_id: &str) -> Result<(), AppError> {
        let patients = self.patients();
        if let Some(patient) = patients.iter().find(|p| p.id == patient_id) {
            debug!("Opening patient {}", patient_id);
            self.state.selected_patient = Some(patient.clone());
            self.state.detail_view = DetailView::Details;
            self.state.notifications.dismiss();
            return Ok(());
        }
        Err(self.report(
            messages::PATIENT_NOT_FOUND,
            AppError::NotFound(format!("patient {}", patient_id)),
        ))
    }

    /// Back to the list.
    pub fn deselect_patient(&mut self) {
        self.state.selected_patient = None;
        self.state.detail_view = DetailView::Details;
        self.state.notifications.dismiss();
    }

    /// Jump from an agenda row to the patient's record. The agenda date goes
    /// back to today.
    pub fn open_patient_from_agenda(&mut self, patient_id: &str) -> Result<(), AppError> {
        self.select_patient(patient_id)?;
        self.state.view = View::Patients;
        self.state.agenda_date = today();
        Ok(())
    }

    pub fn show_detail(&mut self, view: DetailView) {
        self.state.detail_view = view;
    }

    pub fn patient_draft(&self) -> Option<PatientDraft> {
        self.state.selected_patient.as_ref().map(PatientDraft::from_patient)
    }

    pub fn new_consultation_draft(&self) -> ConsultationDraft {
        ConsultationDraft::new(today())
    }

    /// Draft for editing one consultation of the open patient.
    pub fn consultation_draft(&self, consultation_id: &str) -> Option<ConsultationDraft> {
        self.state
            .selected_patient
            .as_ref()?
            .consultations
            .iter()
            .find(|c| c.id.as_deref() == Some(consultation_id))
            .map(ConsultationDraft::from_consultation)
    }

    pub fn open_patient_modal(&mut self) {
        self.state.patient_modal_open = true;
    }

    pub fn close_patient_modal(&mut self) {
        self.state.patient_modal_open = false;
    }

    /// Opens the new-appointment modal with a fresh flow.
    pub fn open_scheduling(&mut self) {
        self.state.scheduling = Some(SchedulingFlow::new(today()));
    }

    pub fn close_scheduling(&mut self) {
        self.state.scheduling = None;
    }

    pub fn scheduling_mut(&mut self) -> Option<&mut SchedulingFlow> {
        self.state.scheduling.as_mut()
    }

    // ==========================================================================
    // WRITES
    // ==========================================================================

    fn begin_submit(&mut self) -> Result<(), AppError> {
        if self.state.submitting {
            warn!("Submission refused while another one is in flight");
            self.state.notifications.error(messages::BUSY);
            return Err(AppError::Busy);
        }
        self.state.submitting = true;
        Ok(())
    }

    fn finish_submit(&mut self) {
        self.state.submitting = false;
    }

    fn report(&mut self, message: &str, err: impl Into<AppError>) -> AppError {
        let err = err.into();
        err.log();
        self.state.notifications.error(message);
        err
    }

    fn selected(&mut self) -> Result<Patient, AppError> {
        if let Some(patient) = &self.state.selected_patient {
            return Ok(patient.clone());
        }
        Err(self.report(
            messages::NO_PATIENT_SELECTED,
            AppError::ValidationError("no patient selected".to_string()),
        ))
    }

    fn apply_consultations(&mut self, patient_id: &str, consultations: Vec<Consultation>) {
        if let Some(patient) = self.state.selected_patient.as_mut() {
            if patient.id == patient_id {
                patient.consultations = consultations;
            }
        }
        self.state.detail_view = DetailView::Details;
    }

    pub async fn create_patient(&mut self, draft: &PatientDraft) -> Result<Patient, AppError> {
        self.create_patient_then(draft, |_, _| {}).await
    }

    /// Registers a patient and, once the write is confirmed, hands the new
    /// record to `then`.
    pub async fn create_patient_then<F>(
        &mut self,
        draft: &PatientDraft,
        then: F,
    ) -> Result<Patient, AppError>
    where
        F: FnOnce(&mut AppState, &Patient),
    {
        self.begin_submit()?;
        let result = self.patients.create_patient(draft).await;
        self.finish_submit();

        match result {
            Ok(patient) => {
                info!("Patient {} registered", patient.id);
                self.state.patient_modal_open = false;
                self.state.notifications.success(messages::PATIENT_SAVED);
                then(&mut self.state, &patient);
                Ok(patient)
            }
            Err(err) => {
                let message = match &err {
                    PatientError::DuplicateNationalId(_) => messages::DUPLICATE_NATIONAL_ID,
                    PatientError::MissingRequiredFields => messages::REQUIRED_FIELDS_MISSING,
                    _ => messages::PATIENT_SAVE_FAILED,
                };
                Err(self.report(message, err))
            }
        }
    }

    /// Registration from inside the scheduling modal: the new patient becomes
    /// the one being scheduled.
    pub async fn register_patient_for_scheduling(
        &mut self,
        draft: &PatientDraft,
    ) -> Result<Patient, AppError> {
        self.create_patient_then(draft, |state, patient| {
            if let Some(flow) = state.scheduling.as_mut() {
                flow.patient_registered(patient);
            }
        })
        .await
    }

    pub async fn update_patient(&mut self, draft: &PatientDraft) -> Result<(), AppError> {
        let patient = self.selected()?;
        self.begin_submit()?;
        let result = self.patients.update_patient(&patient.id, draft).await;
        self.finish_submit();

        match result {
            Ok(()) => {
                if let Some(selected) = self.state.selected_patient.as_mut() {
                    if selected.id == patient.id {
                        selected.apply_draft(draft);
                    }
                }
                self.state.detail_view = DetailView::Details;
                self.state.notifications.success(messages::PATIENT_UPDATED);
                Ok(())
            }
            Err(err) => {
                let message = match &err {
                    PatientError::MissingRequiredFields => messages::REQUIRED_FIELDS_MISSING,
                    _ => messages::PATIENT_UPDATE_FAILED,
                };
                Err(self.report(message, err))
            }
        }
    }

    pub async fn add_consultation(&mut self, draft: ConsultationDraft) -> Result<(), AppError> {
        let patient = self.selected()?;
        self.begin_submit()?;
        let result = self.patients.add_consultation(&patient, draft).await;
        self.finish_submit();

        match result {
            Ok(consultations) => {
                self.apply_consultations(&patient.id, consultations);
                self.state.notifications.success(messages::CONSULTATION_SAVED);
                Ok(())
            }
            Err(err) => Err(self.report(messages::CONSULTATION_SAVE_FAILED, err)),
        }
    }

    pub async fn edit_consultation(&mut self, draft: ConsultationDraft) -> Result<(), AppError> {
        let patient = self.selected()?;
        self.begin_submit()?;
        let result = self.patients.edit_consultation(&patient, draft).await;
        self.finish_submit();

        match result {
            Ok(consultations) => {
                self.apply_consultations(&patient.id, consultations);
                self.state.notifications.success(messages::CONSULTATION_UPDATED);
                Ok(())
            }
            Err(err) => {
                let message = match &err {
                    PatientError::MissingConsultationId | PatientError::ConsultationNotFound(_) => {
                        messages::CONSULTATION_ID_MISSING
                    }
                    _ => messages::CONSULTATION_UPDATE_FAILED,
                };
                Err(self.report(message, err))
            }
        }
    }

    /// Archives the open patient and returns to the list.
    pub async fn archive_patient(&mut self) -> Result<(), AppError> {
        let patient = self.selected()?;
        self.begin_submit()?;
        let result = self.patients.archive_patient(&patient.id).await;
        self.finish_submit();

        match result {
            Ok(()) => {
                info!("Patient {} archived", patient.id);
                self.deselect_patient();
                self.state.notifications.success(messages::PATIENT_ARCHIVED);
                Ok(())
            }
            Err(err) => Err(self.report(messages::PATIENT_ARCHIVE_FAILED, err)),
        }
    }

    /// Books the appointment described by the open scheduling flow and closes
    /// the modal.
    pub async fn create_appointment(&mut self) -> Result<Appointment, AppError> {
        let submission = match &self.state.scheduling {
            Some(flow) => flow.submission(),
            None => Err(AppointmentError::NoPatientSelected),
        };
        let (patient, draft) = match submission {
            Ok(submission) => submission,
            Err(err) => {
                let message = match &err {
                    AppointmentError::MissingSchedule => messages::APPOINTMENT_SCHEDULE_MISSING,
                    _ => messages::NO_PATIENT_SELECTED,
                };
                return Err(self.report(message, err));
            }
        };

        self.begin_submit()?;
        let result = self.appointments.create_appointment(Some(&patient), draft).await;
        self.finish_submit();

        match result {
            Ok(appointment) => {
                info!("Appointment {} booked", appointment.id);
                self.state.scheduling = None;
                self.state.notifications.success(messages::APPOINTMENT_SAVED);
                Ok(appointment)
            }
            Err(err) => Err(self.report(messages::APPOINTMENT_SAVE_FAILED, err)),
        }
    }

    /// Inline status change from the agenda. Success is silent; the mirror
    /// shows the new status.
    pub async fn update_appointment_status(
        &mut self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> Result<(), AppError> {
        self.begin_submit()?;
        let result = self.appointments.update_status(appointment_id, status).await;
        self.finish_submit();

        result.map_err(|err| self.report(messages::STATUS_UPDATE_FAILED, err))
    }
}
