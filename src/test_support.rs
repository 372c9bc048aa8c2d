use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::types::Json;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tower::ServiceExt;
use uuid::Uuid;

use crate::api;
use crate::core::security::{self, Role};
use crate::core::{config::Settings, state::AppState, time::primitive_now_utc};
use crate::db::models::{
    AttemptSummary, GradeEntry, NewAttempt, QuestionSetRecord, QuizAttempt, QuizConfig,
    QuizConfigInput, UnitSummary,
};
use crate::db::types::Difficulty;
use crate::repositories::store::{AttemptRecorder, QuizStore, StoreError};
use crate::schemas::quiz::{OptionLabel, Question, QuestionOptions, QuestionSet};
use crate::services::text_generation::{GenerationRequest, TextGenerationError, TextGenerator};

const TEST_SECRET_KEY: &str = "test-secret";
const TOKEN_LIFETIME: time::Duration = time::Duration::hours(1);

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) generator: Arc<ScriptedGenerator>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(AsyncMutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("REFUERZO_ENV", "test");
    std::env::set_var("REFUERZO_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    for key in [
        "DATABASE_URL",
        "GEMINI_API_KEY",
        "AI_MODEL",
        "AI_MAX_ATTEMPTS",
        "QUIZ_MIN_QUESTIONS",
        "QUIZ_MAX_QUESTIONS",
        "QUIZ_GRADE_SCALE",
        "REFUERZO_LOG_LEVEL",
        "REFUERZO_LOG_JSON",
        "API_V1_STR",
        "PROJECT_NAME",
    ] {
        std::env::remove_var(key);
    }
    std::env::set_var("AI_RETRY_DELAY_MS", "0");
}

pub(crate) async fn setup_test_context() -> TestContext {
    setup_test_context_with_script(Vec::new()).await
}

/// Test context whose text generator replays `script` in order.
pub(crate) async fn setup_test_context_with_script(
    script: Vec<Result<Option<String>, TextGenerationError>>,
) -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let generator = Arc::new(ScriptedGenerator::new(script));
    let store = Arc::new(MemoryStore::default());
    let state = AppState::new(settings, store.clone(), generator.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, store, generator, _guard: guard }
}

pub(crate) fn test_state(settings: Settings) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let state = AppState::new(settings, store.clone(), Arc::new(ScriptedGenerator::default()));
    (state, store)
}

pub(crate) fn sample_config(subject: &str, unit: &str, question_count: i32) -> QuizConfig {
    let now = primitive_now_utc();
    QuizConfig {
        id: Uuid::new_v4().to_string(),
        subject: subject.to_string(),
        unit: unit.to_string(),
        topics: Json(vec!["repaso general".to_string()]),
        question_count,
        difficulty: Difficulty::EasyIntermediate,
        show_feedback: true,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_question(number: usize) -> Question {
    Question {
        prompt: format!("Contexto de la pregunta {number}.\n\n¿Cuál es la opción {number}?"),
        options: QuestionOptions::from_texts([
            format!("Opción A{number}"),
            format!("Opción B{number}"),
            format!("Opción C{number}"),
            format!("Opción D{number}"),
        ]),
        correct: OptionLabel::C,
        explanation: format!("La C es correcta en la pregunta {number}."),
    }
}

pub(crate) fn sample_question_set(count: usize) -> QuestionSet {
    QuestionSet::new((1..=count).map(sample_question).collect())
}

/// Model-style payload with Spanish keys; every correct answer is `C`.
pub(crate) fn sample_questions_json(count: usize) -> Value {
    Value::Array(
        (1..=count)
            .map(|number| {
                json!({
                    "pregunta": format!("¿Cuál es la opción {number}?"),
                    "opciones": {
                        "A": format!("Opción A{number}"),
                        "B": format!("Opción B{number}"),
                        "C": format!("Opción C{number}"),
                        "D": format!("Opción D{number}"),
                    },
                    "respuesta_correcta": "C",
                    "explicacion": format!("La C es correcta en la pregunta {number}."),
                })
            })
            .collect(),
    )
}

/// Replays canned responses and records every request it receives. Once the
/// script runs out it answers with no content.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Option<String>, TextGenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(script: Vec<Result<Option<String>, TextGenerationError>>) -> Self {
        Self { script: Mutex::new(script.into()), requests: Mutex::default() }
    }

    pub(crate) fn push(&self, response: Result<Option<String>, TextGenerationError>) {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, TextGenerationError> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        self.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front().unwrap_or(Ok(None))
    }
}

/// Attempt sink that can be told to fail its first writes.
#[derive(Default)]
pub(crate) struct RecordingRecorder {
    failures_left: Mutex<usize>,
    attempts: Mutex<Vec<NewAttempt>>,
}

impl RecordingRecorder {
    pub(crate) fn failing_first(failures: usize) -> Self {
        Self { failures_left: Mutex::new(failures), attempts: Mutex::default() }
    }

    pub(crate) fn attempts(&self) -> Vec<NewAttempt> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl AttemptRecorder for RecordingRecorder {
    async fn record_attempt(&self, attempt: &NewAttempt) -> Result<QuizAttempt, StoreError> {
        {
            let mut failures = self.failures_left.lock().unwrap_or_else(PoisonError::into_inner);
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
        }
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner).push(attempt.clone());
        Ok(attempt_record(Uuid::new_v4().to_string(), attempt))
    }
}

fn attempt_record(id: String, attempt: &NewAttempt) -> QuizAttempt {
    QuizAttempt {
        id,
        student_id: attempt.student_id.clone(),
        student_name: attempt.student_name.clone(),
        config_id: Some(attempt.config_id.clone()),
        subject: attempt.subject.clone(),
        unit: attempt.unit.clone(),
        show_feedback: attempt.show_feedback,
        score: attempt.score,
        total_questions: attempt.total_questions,
        grade: attempt.grade,
        questions: Json(attempt.questions.clone()),
        answers: Json(attempt.answers.clone()),
        created_at: primitive_now_utc(),
    }
}

#[derive(Default)]
struct MemoryTables {
    configs: Vec<QuizConfig>,
    sets: Vec<QuestionSetRecord>,
    attempts: Vec<QuizAttempt>,
    settings: BTreeMap<String, String>,
}

/// In-process [`QuizStore`] with the same observable behavior as the
/// PostgreSQL store: unique `(subject, unit)`, one active set per unit and
/// newest-first attempt listings.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryStore {
    fn tables(&self) -> std::sync::MutexGuard<'_, MemoryTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn attempts(&self) -> Vec<QuizAttempt> {
        self.tables().attempts.clone()
    }
}

fn unit_taken(tables: &MemoryTables, input: &QuizConfigInput, except: Option<&str>) -> bool {
    tables.configs.iter().any(|config| {
        config.subject == input.subject
            && config.unit == input.unit
            && Some(config.id.as_str()) != except
    })
}

fn apply_input(config: &mut QuizConfig, input: &QuizConfigInput) {
    config.subject = input.subject.clone();
    config.unit = input.unit.clone();
    config.topics = Json(input.topics.clone());
    config.question_count = input.question_count;
    config.difficulty = input.difficulty;
    config.show_feedback = input.show_feedback;
}

#[async_trait]
impl AttemptRecorder for MemoryStore {
    async fn record_attempt(&self, attempt: &NewAttempt) -> Result<QuizAttempt, StoreError> {
        let record = attempt_record(Uuid::new_v4().to_string(), attempt);
        self.tables().attempts.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_configs(&self) -> Result<Vec<QuizConfig>, StoreError> {
        let mut configs = self.tables().configs.clone();
        configs.sort_by(|a, b| (&a.subject, &a.unit).cmp(&(&b.subject, &b.unit)));
        Ok(configs)
    }

    async fn list_subjects(&self) -> Result<Vec<String>, StoreError> {
        let mut subjects: Vec<String> =
            self.tables().configs.iter().map(|config| config.subject.clone()).collect();
        subjects.sort();
        subjects.dedup();
        Ok(subjects)
    }

    async fn list_units(&self, subject: &str) -> Result<Vec<UnitSummary>, StoreError> {
        let tables = self.tables();
        let mut units: Vec<UnitSummary> = tables
            .configs
            .iter()
            .filter(|config| config.subject == subject)
            .map(|config| UnitSummary {
                config_id: config.id.clone(),
                unit: config.unit.clone(),
                show_feedback: config.show_feedback,
                is_active: tables
                    .sets
                    .iter()
                    .any(|set| set.config_id == config.id && set.is_active),
            })
            .collect();
        units.sort_by(|a, b| b.is_active.cmp(&a.is_active).then_with(|| a.unit.cmp(&b.unit)));
        Ok(units)
    }

    async fn get_config(&self, id: &str) -> Result<Option<QuizConfig>, StoreError> {
        Ok(self.tables().configs.iter().find(|config| config.id == id).cloned())
    }

    async fn create_config(&self, input: &QuizConfigInput) -> Result<QuizConfig, StoreError> {
        let mut tables = self.tables();
        if unit_taken(&tables, input, None) {
            return Err(StoreError::Conflict("unit already exists for this subject".to_string()));
        }
        let mut config = sample_config(&input.subject, &input.unit, input.question_count);
        apply_input(&mut config, input);
        tables.configs.push(config.clone());
        Ok(config)
    }

    async fn update_config(
        &self,
        id: &str,
        input: &QuizConfigInput,
    ) -> Result<QuizConfig, StoreError> {
        let mut tables = self.tables();
        if unit_taken(&tables, input, Some(id)) {
            return Err(StoreError::Conflict("unit already exists for this subject".to_string()));
        }
        let config =
            tables.configs.iter_mut().find(|config| config.id == id).ok_or(StoreError::NotFound)?;
        apply_input(config, input);
        config.updated_at = primitive_now_utc();
        Ok(config.clone())
    }

    async fn delete_config(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        let before = tables.configs.len();
        tables.configs.retain(|config| config.id != id);
        if tables.configs.len() == before {
            return Ok(false);
        }
        tables.sets.retain(|set| set.config_id != id);
        for attempt in tables.attempts.iter_mut() {
            if attempt.config_id.as_deref() == Some(id) {
                attempt.config_id = None;
            }
        }
        Ok(true)
    }

    async fn save_and_activate(
        &self,
        config_id: &str,
        questions: &QuestionSet,
    ) -> Result<QuestionSetRecord, StoreError> {
        let mut tables = self.tables();
        if !tables.configs.iter().any(|config| config.id == config_id) {
            return Err(StoreError::NotFound);
        }
        let mut version = 0;
        for set in tables.sets.iter_mut().filter(|set| set.config_id == config_id) {
            set.is_active = false;
            version = version.max(set.version);
        }
        let record = QuestionSetRecord {
            id: Uuid::new_v4().to_string(),
            config_id: config_id.to_string(),
            version: version + 1,
            questions: Json(questions.clone()),
            is_active: true,
            created_at: primitive_now_utc(),
        };
        tables.sets.push(record.clone());
        Ok(record)
    }

    async fn active_set(&self, config_id: &str) -> Result<Option<QuestionSetRecord>, StoreError> {
        Ok(self
            .tables()
            .sets
            .iter()
            .find(|set| set.config_id == config_id && set.is_active)
            .cloned())
    }

    async fn latest_set(&self, config_id: &str) -> Result<Option<QuestionSetRecord>, StoreError> {
        Ok(self
            .tables()
            .sets
            .iter()
            .filter(|set| set.config_id == config_id)
            .max_by_key(|set| set.version)
            .cloned())
    }

    async fn set_activation(
        &self,
        config_id: &str,
        active: bool,
    ) -> Result<Option<QuestionSetRecord>, StoreError> {
        let mut tables = self.tables();
        let mut latest: Option<&mut QuestionSetRecord> = None;
        for set in tables.sets.iter_mut().filter(|set| set.config_id == config_id) {
            set.is_active = false;
            if latest.as_ref().map_or(true, |current| set.version > current.version) {
                latest = Some(set);
            }
        }
        if !active {
            return Ok(None);
        }
        Ok(latest.map(|set| {
            set.is_active = true;
            set.clone()
        }))
    }

    async fn list_attempts(
        &self,
        subject: &str,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<AttemptSummary>, i64), StoreError> {
        let tables = self.tables();
        let matching: Vec<&QuizAttempt> =
            tables.attempts.iter().rev().filter(|attempt| attempt.subject == subject).collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|attempt| AttemptSummary {
                id: attempt.id.clone(),
                student_name: attempt.student_name.clone(),
                unit: attempt.unit.clone(),
                score: attempt.score,
                total_questions: attempt.total_questions,
                grade: attempt.grade,
                created_at: attempt.created_at,
            })
            .collect();
        Ok((page, total))
    }

    async fn get_attempt(&self, id: &str) -> Result<Option<QuizAttempt>, StoreError> {
        Ok(self.tables().attempts.iter().find(|attempt| attempt.id == id).cloned())
    }

    async fn clear_attempts(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        let deleted = tables.attempts.len() as u64;
        tables.attempts.clear();
        Ok(deleted)
    }

    async fn evaluative_grades(&self, subject: &str) -> Result<Vec<GradeEntry>, StoreError> {
        Ok(self
            .tables()
            .attempts
            .iter()
            .filter(|attempt| attempt.subject == subject && !attempt.show_feedback)
            .map(|attempt| GradeEntry {
                student_id: attempt.student_id.clone(),
                student_name: attempt.student_name.clone(),
                unit: attempt.unit.clone(),
                grade: attempt.grade,
                created_at: attempt.created_at,
            })
            .collect())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tables().settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.tables().settings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub(crate) fn student_token(student_id: &str, name: &str, settings: &Settings) -> String {
    security::create_access_token(student_id, name, Role::Student, settings, TOKEN_LIFETIME)
}

pub(crate) fn admin_token(settings: &Settings) -> String {
    security::create_access_token("admin-1", "Coordinación", Role::Admin, settings, TOKEN_LIFETIME)
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

/// Sends one request through a clone of `app`. An empty body reads as `null`
/// and a non-JSON body (extractor rejections) as a string.
pub(crate) async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response =
        app.clone().oneshot(json_request(method, uri, token, body)).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, json)
}
