use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, Utc};

use appointment_cell::{AppointmentStatus, SchedulingStep};
use auth_cell::AuthError;
use patient_cell::{DetailView, PatientDraft};
use shared_database::{DocumentStore, InMemoryStore, StoreError, APPOINTMENTS, PATIENTS};
use shared_models::auth::SignInMethod;
use shared_models::error::AppError;
use shared_utils::test_utils::{
    fields, seed_appointment, seed_patient, MockSupabaseResponses, ScriptedIdentityProvider,
    TestConfig,
};
use workflow_cell::{messages, NotificationKind, Phase, View, Workflow};

fn desk(store: &InMemoryStore) -> Workflow {
    Workflow::new(
        TestConfig::default().to_app_config(),
        ScriptedIdentityProvider::anonymous_only(),
        Arc::new(store.clone()),
    )
}

async fn ready_desk(store: &InMemoryStore) -> Workflow {
    let mut desk = desk(store);
    desk.start().await.unwrap();
    desk.wait_until_loaded().await;
    desk
}

/// Pumps mirror updates until `done` holds.
async fn settle<F>(desk: &mut Workflow, mut done: F)
where
    F: FnMut(&Workflow) -> bool,
{
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while !done(&*desk) {
            if !desk.next_update().await {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "mirror never reached the expected state");
}

fn notification(desk: &Workflow) -> Option<(NotificationKind, String)> {
    desk.notification().map(|n| (n.kind, n.message.clone()))
}

#[tokio::test]
async fn test_unconfigured_start_fails() {
    let store = InMemoryStore::new();
    let mut desk = Workflow::new(
        TestConfig::unconfigured().to_app_config(),
        ScriptedIdentityProvider::anonymous_only(),
        Arc::new(store),
    );

    let result = desk.start().await;

    assert_matches!(result, Err(AppError::Config(_)));
    assert_eq!(desk.state().phase, Phase::Failed(messages::CONFIG_MISSING.to_string()));
}

#[tokio::test]
async fn test_auth_failure_is_fatal() {
    let store = InMemoryStore::new();
    let mut desk = Workflow::new(
        TestConfig::default().to_app_config(),
        ScriptedIdentityProvider::failing(AuthError::Service("disabled".into())),
        Arc::new(store),
    );

    let result = desk.start().await;

    assert_matches!(result, Err(AppError::Auth(_)));
    assert_eq!(
        desk.state().phase,
        Phase::Failed(messages::ANONYMOUS_SIGN_IN_FAILED.to_string())
    );
    assert!(desk.state().identity.is_none());
    assert_eq!(desk.total_patients(), 0);
}

#[tokio::test]
async fn test_start_after_failure_returns_the_failure() {
    let store = InMemoryStore::new();
    let mut desk = Workflow::new(
        TestConfig::unconfigured().to_app_config(),
        ScriptedIdentityProvider::anonymous_only(),
        Arc::new(store),
    );
    assert_matches!(desk.start().await, Err(AppError::Config(_)));

    let again = desk.start().await;

    assert_matches!(again, Err(AppError::Config(_)));
    assert_eq!(desk.state().phase, Phase::Failed(messages::CONFIG_MISSING.to_string()));
}

#[tokio::test]
async fn test_second_start_is_refused() {
    let store = InMemoryStore::new();
    let mut desk = ready_desk(&store).await;

    assert_matches!(desk.start().await, Err(AppError::Conflict(_)));
    assert!(desk.state().is_ready());
    assert_eq!(desk.state().identity.as_ref().map(|i| i.method), Some(SignInMethod::Anonymous));
}

#[tokio::test]
async fn test_start_signs_in_and_loads_collections() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    seed_appointment(
        &store,
        MockSupabaseResponses::appointment_row("a1", "p1", "2024-05-10", "14:00"),
    );
    seed_appointment(
        &store,
        MockSupabaseResponses::appointment_row("a2", "p1", "2024-05-10", "09:00"),
    );

    let mut desk = ready_desk(&store).await;

    assert!(desk.state().is_ready());
    assert_eq!(
        desk.state().identity.as_ref().map(|i| i.method),
        Some(SignInMethod::Anonymous)
    );
    assert!(!desk.is_loading());
    assert_eq!(desk.total_patients(), 1);

    desk.set_agenda_date(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    let ids: Vec<_> = desk.agenda().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["a2", "a1"]);
}

#[tokio::test]
async fn test_blank_dates_and_times_keep_records_visible() {
    let store = InMemoryStore::new();
    let mut row = MockSupabaseResponses::patient_row("p1", "Ana Silva", "111");
    row["consultations"] = serde_json::json!([
        MockSupabaseResponses::consultation("c1", ""),
        MockSupabaseResponses::consultation("c2", "2024-05-10"),
    ]);
    seed_patient(&store, row);
    seed_appointment(
        &store,
        MockSupabaseResponses::appointment_row("a1", "p1", "2024-05-10", ""),
    );
    seed_appointment(
        &store,
        MockSupabaseResponses::appointment_row("a2", "p1", "2024-05-10", "09:00"),
    );

    let mut desk = ready_desk(&store).await;

    assert_eq!(desk.total_patients(), 1);
    desk.list_filter_mut().search = "silva".into();
    assert_eq!(desk.patient_list().len(), 1);

    desk.select_patient("p1").unwrap();
    let selected = desk.state().selected_patient.clone().unwrap();
    assert_eq!(selected.consultations.len(), 2);
    assert_eq!(
        selected.latest_consultation().and_then(|c| c.id.as_deref()),
        Some("c2")
    );

    desk.set_agenda_date(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    let ids: Vec<_> = desk.agenda().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["a2", "a1"]);

    let duplicate = desk.create_patient(&PatientDraft::new("Ana S.", "111")).await;
    assert_matches!(duplicate, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn test_duplicate_national_id_notifies_without_writing() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    let mut desk = ready_desk(&store).await;
    desk.open_patient_modal();

    let result = desk.create_patient(&PatientDraft::new("Ana S.", "111")).await;

    assert_matches!(result, Err(AppError::Conflict(_)));
    assert_eq!(store.write_count(), 0);
    assert!(desk.state().patient_modal_open);
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Error, messages::DUPLICATE_NATIONAL_ID.to_string()))
    );
}

#[tokio::test]
async fn test_created_patient_reaches_the_list() {
    let store = InMemoryStore::new();
    let mut desk = ready_desk(&store).await;
    desk.open_patient_modal();

    let patient = desk.create_patient(&PatientDraft::new("Bruno", "222")).await.unwrap();

    assert!(!desk.state().patient_modal_open);
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Success, messages::PATIENT_SAVED.to_string()))
    );
    settle(&mut desk, |d| d.total_patients() == 1).await;
    assert_eq!(desk.patient_list()[0].id, patient.id);
}

#[tokio::test]
async fn test_consultation_lifecycle_updates_open_patient() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    let mut desk = ready_desk(&store).await;
    desk.select_patient("p1").unwrap();

    desk.show_detail(DetailView::NewConsultation);
    let mut draft = desk.new_consultation_draft();
    draft.exam.refraction.od.sph = "-2.00".into();
    desk.add_consultation(draft).await.unwrap();

    let selected = desk.state().selected_patient.clone().unwrap();
    assert_eq!(selected.consultations.len(), 1);
    assert_eq!(desk.state().detail_view, DetailView::Details);
    let consultation_id = selected.consultations[0].id.clone().unwrap();

    desk.show_detail(DetailView::EditConsultation(consultation_id.clone()));
    let mut edit = desk.consultation_draft(&consultation_id).unwrap();
    edit.diagnosis = "Miopia".into();
    desk.edit_consultation(edit).await.unwrap();

    let selected = desk.state().selected_patient.clone().unwrap();
    assert_eq!(selected.consultations.len(), 1);
    assert_eq!(selected.consultations[0].diagnosis, "Miopia");
    assert_eq!(selected.consultations[0].exam.refraction.od.sph, "-2.00");
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Success, messages::CONSULTATION_UPDATED.to_string()))
    );
}

#[tokio::test]
async fn test_edit_without_consultation_id_is_rejected() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    let mut desk = ready_desk(&store).await;
    desk.select_patient("p1").unwrap();

    let draft = desk.new_consultation_draft();
    let result = desk.edit_consultation(draft).await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
    assert_eq!(store.write_count(), 0);
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Error, messages::CONSULTATION_ID_MISSING.to_string()))
    );
}

#[tokio::test]
async fn test_update_patient_applies_locally() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    let mut desk = ready_desk(&store).await;
    desk.select_patient("p1").unwrap();

    let mut draft = desk.patient_draft().unwrap();
    draft.phone = "38 3561-0000".into();
    desk.update_patient(&draft).await.unwrap();

    assert_eq!(desk.state().selected_patient.as_ref().unwrap().phone, "38 3561-0000");
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Success, messages::PATIENT_UPDATED.to_string()))
    );
}

#[tokio::test]
async fn test_archive_returns_to_list_and_hides_patient() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    let mut desk = ready_desk(&store).await;
    desk.select_patient("p1").unwrap();

    desk.archive_patient().await.unwrap();

    assert!(desk.state().selected_patient.is_none());
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Success, messages::PATIENT_ARCHIVED.to_string()))
    );
    settle(&mut desk, |d| d.patient_list().is_empty()).await;
    assert_eq!(desk.total_patients(), 1);

    desk.list_filter_mut().include_archived = true;
    assert_eq!(desk.patient_list().len(), 1);
}

#[tokio::test]
async fn test_write_without_selection_is_rejected() {
    let store = InMemoryStore::new();
    let mut desk = ready_desk(&store).await;

    let result = desk.archive_patient().await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Error, messages::NO_PATIENT_SELECTED.to_string()))
    );
}

#[tokio::test]
async fn test_scheduling_with_new_patient() {
    let store = InMemoryStore::new();
    let mut desk = ready_desk(&store).await;
    desk.open_scheduling();

    let result = desk.create_appointment().await;
    assert_matches!(result, Err(AppError::ValidationError(_)));
    assert_eq!(store.write_count(), 0);

    desk.scheduling_mut().unwrap().set_search("Carla");
    assert!(desk.scheduling_no_match_hint());
    desk.scheduling_mut().unwrap().start_registration();

    let patient = desk
        .register_patient_for_scheduling(&PatientDraft::new("Carla Souza", "333"))
        .await
        .unwrap();
    let flow = desk.state().scheduling.as_ref().unwrap();
    assert_eq!(flow.step(), SchedulingStep::Details);
    assert_eq!(flow.patient().unwrap().id, patient.id);

    desk.scheduling_mut().unwrap().draft_mut().notes = "Retorno".into();
    let appointment = desk.create_appointment().await.unwrap();

    assert!(desk.state().scheduling.is_none());
    assert_eq!(appointment.patient_name, "Carla Souza");
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.date, Some(Utc::now().date_naive()));
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Success, messages::APPOINTMENT_SAVED.to_string()))
    );
    settle(&mut desk, |d| d.agenda().len() == 1).await;
}

#[tokio::test]
async fn test_scheduling_search_finds_existing_patient() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    let mut desk = ready_desk(&store).await;
    desk.open_scheduling();

    desk.scheduling_mut().unwrap().set_search("an");
    let results = desk.scheduling_results();
    assert_eq!(results.len(), 1);
    desk.scheduling_mut().unwrap().select_patient(&results[0]);

    desk.create_appointment().await.unwrap();

    let stored = store.documents(APPOINTMENTS);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].field("patientId"), Some(&serde_json::json!("p1")));
}

#[tokio::test]
async fn test_agenda_jump_to_patient() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    let mut desk = ready_desk(&store).await;
    desk.set_agenda_date(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());

    let missing = desk.open_patient_from_agenda("gone");
    assert_matches!(missing, Err(AppError::NotFound(_)));
    assert_eq!(desk.state().view, View::Agenda);
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Error, messages::PATIENT_NOT_FOUND.to_string()))
    );

    desk.open_patient_from_agenda("p1").unwrap();
    assert_eq!(desk.state().view, View::Patients);
    assert_eq!(desk.state().selected_patient.as_ref().unwrap().id, "p1");
    assert_eq!(desk.state().agenda_date, Utc::now().date_naive());
    assert!(desk.notification().is_none());
}

#[tokio::test]
async fn test_status_update_failure_notifies() {
    let store = InMemoryStore::new();
    seed_appointment(
        &store,
        MockSupabaseResponses::appointment_row("a1", "p1", "2024-05-10", "09:00"),
    );
    let mut desk = ready_desk(&store).await;
    store.fail_with(StoreError::Unavailable("offline".into()));

    let result = desk.update_appointment_status("a1", AppointmentStatus::Seen).await;

    assert_matches!(result, Err(AppError::Database(_)));
    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Error, messages::STATUS_UPDATE_FAILED.to_string()))
    );
}

#[tokio::test]
async fn test_status_update_is_silent_on_success() {
    let store = InMemoryStore::new();
    seed_appointment(
        &store,
        MockSupabaseResponses::appointment_row("a1", "p1", "2024-05-10", "09:00"),
    );
    let mut desk = ready_desk(&store).await;

    desk.update_appointment_status("a1", AppointmentStatus::Confirmed)
        .await
        .unwrap();

    assert!(desk.notification().is_none());
    settle(&mut desk, |d| {
        d.appointments()
            .iter()
            .any(|a| a.status == AppointmentStatus::Confirmed)
    })
    .await;
}

#[tokio::test]
async fn test_subscription_error_raises_notification() {
    let store = InMemoryStore::new();
    let mut desk = ready_desk(&store).await;

    store.break_subscriptions(PATIENTS, StoreError::PermissionDenied("rules".into()));
    settle(&mut desk, |d| d.notification().is_some()).await;

    assert_eq!(
        notification(&desk),
        Some((NotificationKind::Error, messages::PATIENTS_LOAD_FAILED.to_string()))
    );
    assert!(!desk.is_loading());
}

#[tokio::test]
async fn test_view_change_clears_notification() {
    let store = InMemoryStore::new();
    let mut desk = ready_desk(&store).await;
    let _ = desk.select_patient("missing");
    assert!(desk.notification().is_some());

    desk.set_view(View::Patients);

    assert!(desk.notification().is_none());
}

#[tokio::test]
async fn test_shutdown_detaches_mirrors() {
    let store = InMemoryStore::new();
    seed_patient(&store, MockSupabaseResponses::patient_row("p1", "Ana Silva", "111"));
    let mut desk = ready_desk(&store).await;
    assert_eq!(desk.total_patients(), 1);

    desk.shutdown();

    assert_eq!(desk.total_patients(), 0);
    assert!(!desk.next_update().await);
}

#[tokio::test]
async fn test_updates_continue_after_one_subscription_ends() {
    let store = InMemoryStore::new();
    let mut desk = ready_desk(&store).await;

    store.break_subscriptions(PATIENTS, StoreError::PermissionDenied("rules".into()));
    settle(&mut desk, |d| d.notification().is_some()).await;

    store
        .add(
            APPOINTMENTS,
            fields(MockSupabaseResponses::appointment_row("a1", "p1", "2024-05-10", "09:00")),
        )
        .await
        .unwrap();
    settle(&mut desk, |d| d.appointments().len() == 1).await;

    assert_eq!(desk.appointments().len(), 1);
}
