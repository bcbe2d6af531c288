use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use auth_cell::{AuthError, IdentityProvider};
use shared_config::AppConfig;
use shared_database::{Document, Fields, InMemoryStore, APPOINTMENTS, PATIENTS};
use shared_models::auth::{Identity, SignInMethod};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub initial_auth_token: Option<String>,
    pub snapshot_poll_interval_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            initial_auth_token: None,
            snapshot_poll_interval_ms: 20,
        }
    }
}

impl TestConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            ..Self::default()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        let mut config = AppConfig::new(self.supabase_url.clone(), self.supabase_anon_key.clone());
        config.initial_auth_token = self.initial_auth_token.clone();
        config.snapshot_poll_interval_ms = self.snapshot_poll_interval_ms;
        config
    }
}

/// Identity provider replaying fixed outcomes for each sign-in path.
pub struct ScriptedIdentityProvider {
    token: Result<Identity, AuthError>,
    anonymous: Result<Identity, AuthError>,
    calls: Mutex<Vec<SignInMethod>>,
}

impl ScriptedIdentityProvider {
    pub fn new(token: Result<Identity, AuthError>, anonymous: Result<Identity, AuthError>) -> Arc<Self> {
        Arc::new(Self {
            token,
            anonymous,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Rejects any token and signs in anonymously.
    pub fn anonymous_only() -> Arc<Self> {
        Self::new(
            Err(AuthError::TokenRejected("no custom tokens in tests".into())),
            Ok(test_identity(SignInMethod::Anonymous)),
        )
    }

    pub fn failing(err: AuthError) -> Arc<Self> {
        Self::new(Err(err.clone()), Err(err))
    }

    pub fn calls(&self) -> Vec<SignInMethod> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, method: SignInMethod) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(method);
        }
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentityProvider {
    async fn sign_in_with_token(&self, _token: &str) -> Result<Identity, AuthError> {
        self.record(SignInMethod::Token);
        self.token.clone()
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        self.record(SignInMethod::Anonymous);
        self.anonymous.clone()
    }
}

pub fn test_identity(method: SignInMethod) -> Identity {
    Identity::new(
        Uuid::new_v4().simple().to_string(),
        Some("test-access-token".to_string()),
        method,
    )
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_row(id: &str, name: &str, cpf: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "cpf": cpf,
            "dob": "",
            "phone": "",
            "city": "João Pinheiro - MG",
            "notes": "",
            "isArchived": false,
            "createdAt": "2024-01-01T00:00:00Z",
            "consultations": []
        })
    }

    pub fn consultation(id: &str, date: &str) -> Value {
        json!({
            "consultId": id,
            "date": date,
            "doctor": "Dr. Ricardo Lobo",
            "diagnosis": "",
            "notes": "",
            "av_sc": {"od": "", "oe": ""},
            "av_cc": {"od": "", "oe": ""},
            "refraction": {"od": {"sph": "", "cyl": "", "axis": ""}, "oe": {"sph": "", "cyl": "", "axis": ""}, "add": ""},
            "lensometry": {"od": {"sph": "", "cyl": "", "axis": ""}, "oe": {"sph": "", "cyl": "", "axis": ""}, "add": ""},
            "pio": {"od": "", "oe": ""},
            "biomicroscopy": "",
            "fundoscopy": ""
        })
    }

    pub fn appointment_row(id: &str, patient_id: &str, date: &str, time: &str) -> Value {
        json!({
            "id": id,
            "date": date,
            "time": time,
            "notes": "",
            "status": "Agendado",
            "patientId": patient_id,
            "patientName": "Ana Silva",
            "patientCity": "João Pinheiro - MG",
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }

    pub fn session_response(user_id: &str) -> Value {
        json!({
            "access_token": "anon-session-token",
            "token_type": "bearer",
            "user": {"id": user_id, "is_anonymous": true}
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

/// Seeds `row` (which must carry an `id`) into `collection`.
pub fn seed(store: &InMemoryStore, collection: &str, row: Value) {
    match Document::from_row(row) {
        Ok(document) => {
            debug!("Seeding {}/{}", collection, document.id);
            store.insert_document(collection, document);
        }
        Err(err) => panic!("fixture row is not a document: {}", err),
    }
}

pub fn seed_patient(store: &InMemoryStore, row: Value) {
    seed(store, PATIENTS, row);
}

pub fn seed_appointment(store: &InMemoryStore, row: Value) {
    seed(store, APPOINTMENTS, row);
}

/// Fields of `row` without its id.
pub fn fields(row: Value) -> Fields {
    match Document::from_row(row) {
        Ok(document) => document.fields,
        Err(_) => Fields::new(),
    }
}
