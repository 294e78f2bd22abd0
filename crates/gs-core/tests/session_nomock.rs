//! No-mock grading session tests.
//!
//! Real files, real audit log, real archives. Only the external seams
//! (check engine, renderer, prompt, HTTP) are replaced with in-process
//! fakes that count their calls.
//!
//! Covers:
//! - Checks against native function bindings
//! - `check_all` ordering and bracketing records
//! - Construction failures and their `INIT` record
//! - Credential caching across sessions
//! - Submission preconditions and payload
//! - Export archive contents and PDF rendering
//! - Audit log damage and concurrent sessions on one log

use gs_bundle::{ArchiveReader, FileKind};
use gs_core::audit::{AuditEntry, AuditEventType};
use gs_core::check::CheckError;
use gs_core::prompt::{CredentialPrompt, LoginCredentials, PromptError};
use gs_core::render::{NotebookRenderer, PdfOptions, RenderError};
use gs_core::transport::{HttpTransport, TransportError};
use gs_core::{
    verify_log, Binding, CheckEngine, CheckResult, Collaborators, CredentialStore, Environment,
    ExportOptions, GradingSession, NativeValue, SessionError, SessionOptions,
};
use serde_json::{json, Value};
use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============================================================================
// Fakes
// ============================================================================

/// A callable binding. Not plain data, so snapshots leave it unshelved.
#[derive(Debug)]
struct NativeFn {
    name: &'static str,
    call: fn(&Value) -> Value,
}

impl NativeValue for NativeFn {
    fn type_name(&self) -> &str {
        self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn square(v: &Value) -> Value {
    let n = v.as_i64().unwrap_or_default();
    json!(n * n)
}

/// Deliberately wrong: returns its argument unchanged.
fn negate(v: &Value) -> Value {
    v.clone()
}

fn student_env() -> Environment {
    let mut env = Environment::new();
    env.insert("square", Binding::native(NativeFn { name: "function", call: square }));
    env.insert("negate", Binding::native(NativeFn { name: "function", call: negate }));
    env
}

/// Runs one-line scripts of the form `name(arg) == expected`, with JSON
/// literals. A script line `let name = value` binds data instead, and
/// `grade nan` reports an undefined grade.
struct CallEngine {
    runs: AtomicUsize,
}

impl CallEngine {
    fn new() -> Arc<Self> {
        Arc::new(CallEngine {
            runs: AtomicUsize::new(0),
        })
    }
}

impl CheckEngine for CallEngine {
    fn script_extension(&self) -> &str {
        "chk"
    }

    fn run(
        &self,
        script: &Path,
        question: &str,
        env: &mut Environment,
    ) -> Result<CheckResult, CheckError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let text = fs::read_to_string(script).map_err(|e| CheckError::Io {
            path: script.to_path_buf(),
            source: e,
        })?;
        let line = text.trim();
        if line == "grade nan" {
            return Ok(CheckResult::new(question, f64::NAN, "0/0 tests"));
        }
        let malformed = |message: &str| CheckError::Malformed {
            path: script.to_path_buf(),
            message: message.to_string(),
        };

        if let Some(rest) = line.strip_prefix("let ") {
            let (name, value) = rest.split_once(" = ").ok_or_else(|| malformed("bad let"))?;
            let value: Value = serde_json::from_str(value).map_err(|e| malformed(&e.to_string()))?;
            env.insert(name, value);
            return Ok(CheckResult::new(question, 1.0, format!("{question} bound {name}")));
        }

        let (call, expected) = line.split_once(" == ").ok_or_else(|| malformed("no =="))?;
        let (name, arg) = call
            .strip_suffix(')')
            .and_then(|c| c.split_once('('))
            .ok_or_else(|| malformed("bad call"))?;
        let arg: Value = serde_json::from_str(arg).map_err(|e| malformed(&e.to_string()))?;
        let expected: Value =
            serde_json::from_str(expected).map_err(|e| malformed(&e.to_string()))?;

        let func = env
            .get(name)
            .and_then(|b| b.downcast_native::<NativeFn>())
            .ok_or_else(|| CheckError::Execution {
                path: script.to_path_buf(),
                message: format!("name '{name}' is not defined"),
            })?;
        let actual = (func.call)(&arg);

        if actual == expected {
            Ok(CheckResult::new(question, 1.0, format!("{question} passed")))
        } else {
            Ok(CheckResult::new(question, 0.0, format!("{question} failed"))
                .with_failures(vec![format!("{call}: expected {expected}, got {actual}")]))
        }
    }
}

/// Writes a placeholder PDF next to the notebook.
#[derive(Default)]
struct StubRenderer {
    calls: AtomicUsize,
}

impl NotebookRenderer for StubRenderer {
    fn render_pdf(&self, notebook: &Path, _: &PdfOptions) -> Result<PathBuf, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pdf = notebook.with_extension("pdf");
        fs::write(&pdf, b"%PDF-1.4 stub").map_err(|e| RenderError::Failed {
            notebook: notebook.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(pdf)
    }
}

#[derive(Default)]
struct CountingPrompt {
    logins: AtomicUsize,
    api_keys: AtomicUsize,
}

impl CredentialPrompt for CountingPrompt {
    fn api_key(&self, _: &str) -> Result<String, PromptError> {
        self.api_keys.fetch_add(1, Ordering::SeqCst);
        Ok("pasted-key".into())
    }

    fn login(&self) -> Result<LoginCredentials, PromptError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(LoginCredentials {
            username: "student".into(),
            password: "hunter2".into(),
        })
    }
}

#[derive(Default)]
struct CountingTransport {
    gets: Mutex<Vec<(String, Vec<(String, String)>)>>,
    posts: Mutex<Vec<(String, Value)>>,
}

impl CountingTransport {
    fn calls(&self) -> usize {
        self.gets.lock().unwrap().len() + self.posts.lock().unwrap().len()
    }
}

impl HttpTransport for CountingTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, TransportError> {
        self.gets.lock().unwrap().push((
            url.to_string(),
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        Ok("api-key-123".into())
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<String, TransportError> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        Ok("Submission received".into())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    tmp: TempDir,
    engine: Arc<CallEngine>,
    renderer: Arc<StubRenderer>,
    prompt: Arc<CountingPrompt>,
    transport: Arc<CountingTransport>,
    store: Arc<CredentialStore>,
}

impl Harness {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("tests")).unwrap();
        Harness {
            tmp,
            engine: CallEngine::new(),
            renderer: Arc::new(StubRenderer::default()),
            prompt: Arc::new(CountingPrompt::default()),
            transport: Arc::new(CountingTransport::default()),
            store: Arc::new(CredentialStore::new()),
        }
    }

    fn dir(&self) -> &Path {
        self.tmp.path()
    }

    fn write(&self, name: &str, content: &str) {
        let path = self.dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn script(&self, question: &str, line: &str) {
        self.write(&format!("tests/{question}.chk"), line);
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators::new(self.engine.clone())
            .with_renderer(self.renderer.clone())
            .with_prompt(self.prompt.clone())
            .with_transport(self.transport.clone())
            .with_credentials(self.store.clone())
    }

    fn open(&self) -> Result<GradingSession, SessionError> {
        GradingSession::open(SessionOptions::new(self.dir()), self.collaborators())
    }

    fn entries(&self) -> Vec<AuditEntry> {
        let path = self.dir().join(".OTTER_LOG");
        let Ok(text) = fs::read_to_string(path) else {
            return Vec::new();
        };
        // Damaged lines are covered by verify_log; only entries are returned.
        text.lines()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }

    fn entries_of(&self, event_type: AuditEventType) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

const NOTEBOOK: &str = r#"{"cells": [], "metadata": {"kernelspec": {"name": "python3"}}, "nbformat": 4}"#;

const REMOTE_CONFIG: &str = r#"{
    "endpoint": "http://localhost:5000",
    "auth": "default",
    "assignment_id": "hw01",
    "class_id": "data8",
    "notebook": "hw01.ipynb"
}"#;

const LOCAL_CONFIG: &str = r#"{
    "notebook": "hw01.ipynb",
    "pregraded_questions": ["q3"]
}"#;

// ============================================================================
// Checks
// ============================================================================

#[test]
fn check_grades_against_native_bindings() {
    let h = Harness::new();
    h.script("q1", "square(2) == 4");
    h.script("q2", "negate(true) == false");
    let mut session = h.open().unwrap();
    let mut env = student_env();

    let q1 = session.check("q1", Some(&mut env)).unwrap();
    assert_eq!(q1.grade, 1.0);
    assert!(q1.passed());

    let q2 = session.check("q2", Some(&mut env)).unwrap();
    assert_eq!(q2.grade, 0.0);
    assert_eq!(q2.failures.len(), 1);

    let checks = h.entries_of(AuditEventType::Check);
    assert_eq!(checks.len(), 2);
    assert_eq!(checks[0].question.as_deref(), Some("q1"));
    assert_eq!(checks[1].question.as_deref(), Some("q2"));
    assert!(checks.iter().all(|e| e.success));
    assert_eq!(checks[0].results, vec![q1]);

    // Functions are live values: named, never serialized.
    let snapshot = checks[0].snapshot.as_ref().unwrap();
    assert!(snapshot.captured.is_empty());
    assert_eq!(snapshot.unshelved, vec!["negate", "square"]);
}

#[test]
fn check_missing_script_records_failure_without_result() {
    let h = Harness::new();
    let mut session = h.open().unwrap();
    let mut env = student_env();

    let err = session.check("q9", Some(&mut env)).unwrap_err();
    assert!(matches!(err, SessionError::CheckNotFound { ref question, .. } if question == "q9"));
    assert!(err.to_string().starts_with("test q9 does not exist at"));
    assert_eq!(h.engine.runs.load(Ordering::SeqCst), 0);

    let checks = h.entries_of(AuditEventType::Check);
    assert_eq!(checks.len(), 1);
    assert!(!checks[0].success);
    assert!(checks[0].results.is_empty());
    assert_eq!(checks[0].question.as_deref(), Some("q9"));
}

#[test]
fn check_engine_error_is_propagated_and_snapshot_still_taken() {
    let h = Harness::new();
    h.script("q1", "cube(2) == 8");
    let mut session = h.open().unwrap();
    let mut env = Environment::new();
    env.insert("answer", json!(42));

    let err = session.check("q1", Some(&mut env)).unwrap_err();
    assert_eq!(err.kind(), "check");

    let checks = h.entries_of(AuditEventType::Check);
    assert_eq!(checks.len(), 1);
    assert!(!checks[0].success);
    assert!(checks[0].error.as_deref().unwrap().contains("cube"));
    assert_eq!(checks[0].snapshot.as_ref().unwrap().captured, vec!["answer"]);
}

#[test]
fn check_without_environment_uses_session_environment() {
    let h = Harness::new();
    h.script("q1", "let total = 10");
    let mut session = h.open().unwrap();

    session.check("q1", None).unwrap();
    assert_eq!(
        session.environment().get("total").and_then(Binding::as_data),
        Some(&json!(10))
    );
}

#[test]
fn check_all_runs_sorted_and_bracketed() {
    let h = Harness::new();
    h.script("q2", "negate(true) == false");
    h.script("q1", "square(3) == 9");
    h.script("q10", "square(0) == 0");
    h.script("__init__", "ignored");
    let mut session = h.open().unwrap();
    let mut env = student_env();

    let results = session.check_all(Some(&mut env)).unwrap();
    let names: Vec<_> = results.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(names, vec!["q1", "q10", "q2"]);

    let entries = h.entries();
    let types: Vec<_> = entries.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            AuditEventType::Init,
            AuditEventType::BeginCheckAll,
            AuditEventType::Check,
            AuditEventType::Check,
            AuditEventType::Check,
            AuditEventType::EndCheckAll,
        ]
    );
    let end = entries.last().unwrap();
    assert!(end.success);
    assert_eq!(end.results, results);
}

#[test]
fn check_all_shares_environment_between_questions() {
    let h = Harness::new();
    h.script("q1", "let base = 3");
    h.script("q2", "square(3) == 9");
    let mut session = h.open().unwrap();
    let mut env = student_env();

    session.check_all(Some(&mut env)).unwrap();
    assert!(env.contains("base"));

    let checks = h.entries_of(AuditEventType::Check);
    assert_eq!(checks[1].snapshot.as_ref().unwrap().captured, vec!["base"]);
}

#[test]
fn check_all_stops_at_first_error() {
    let h = Harness::new();
    h.script("q1", "square(2) == 4");
    h.script("q2", "not a check");
    h.script("q3", "square(1) == 1");
    let mut session = h.open().unwrap();
    let mut env = student_env();

    let err = session.check_all(Some(&mut env)).unwrap_err();
    assert_eq!(err.kind(), "check");
    assert_eq!(h.engine.runs.load(Ordering::SeqCst), 2);

    let end = h.entries_of(AuditEventType::EndCheckAll);
    assert_eq!(end.len(), 1);
    assert!(!end[0].success);
    assert_eq!(end[0].results.len(), 1);
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn local_only_session_skips_authentication() {
    let h = Harness::new();
    let session = h.open().unwrap();

    assert!(!session.service_enabled());
    assert!(session.credential().is_none());
    assert_eq!(h.transport.calls(), 0);
    assert!(session.session_id().starts_with("gs-"));

    let init = h.entries_of(AuditEventType::Init);
    assert_eq!(init.len(), 1);
    assert!(init[0].success);
    assert_eq!(init[0].details.as_ref().unwrap()["config"]["service_enabled"], false);
}

#[test]
fn multiple_config_artifacts_fail_construction() {
    let h = Harness::new();
    h.write("a.otter", LOCAL_CONFIG);
    h.write("b.otter", LOCAL_CONFIG);
    h.write("hw01.ipynb", NOTEBOOK);

    let err = h.open().unwrap_err();
    assert_eq!(err.kind(), "configuration");

    let entries = h.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_type, AuditEventType::Init);
    assert!(!entries[0].success);
}

#[test]
fn local_config_exposes_pregraded_questions() {
    let h = Harness::new();
    h.write("hw01.otter", LOCAL_CONFIG);
    h.write("hw01.ipynb", NOTEBOOK);
    let session = h.open().unwrap();

    assert!(!session.service_enabled());
    assert!(session.is_pregraded("q3"));
    assert!(!session.is_pregraded("q1"));
    assert_eq!(session.notebook(), Some(h.dir().join("hw01.ipynb").as_path()));
}

#[test]
fn remote_config_authenticates_once_per_store() {
    let h = Harness::new();
    h.write("hw01.otter", REMOTE_CONFIG);
    h.write("hw01.ipynb", NOTEBOOK);

    let first = h.open().unwrap();
    assert_eq!(first.credential().unwrap().expose(), "api-key-123");
    assert_eq!(h.prompt.logins.load(Ordering::SeqCst), 1);
    {
        let gets = h.transport.gets.lock().unwrap();
        assert_eq!(gets.len(), 1);
        assert_eq!(gets[0].0, "http://localhost:5000/auth");
        assert!(gets[0].1.contains(&("username".to_string(), "student".to_string())));
    }

    let second = h.open().unwrap();
    assert_eq!(second.credential().unwrap().expose(), "api-key-123");
    assert_eq!(h.prompt.logins.load(Ordering::SeqCst), 1);
    assert_eq!(h.transport.calls(), 1);

    let auth = h.entries_of(AuditEventType::Auth);
    assert_eq!(auth.len(), 2);
    assert_eq!(auth[0].details.as_ref().unwrap()["cached"], false);
    assert_eq!(auth[1].details.as_ref().unwrap()["cached"], true);
    assert_ne!(first.session_id(), second.session_id());

    // The key itself never reaches the audit trail.
    let log = fs::read_to_string(h.dir().join(".OTTER_LOG")).unwrap();
    assert!(!log.contains("api-key-123"));
}

#[test]
fn sessions_with_separate_stores_authenticate_separately() {
    let h = Harness::new();
    h.write("hw01.otter", REMOTE_CONFIG);
    h.write("hw01.ipynb", NOTEBOOK);

    h.open().unwrap();
    GradingSession::open(
        SessionOptions::new(h.dir()),
        h.collaborators()
            .with_credentials(Arc::new(CredentialStore::new())),
    )
    .unwrap();

    assert_eq!(h.prompt.logins.load(Ordering::SeqCst), 2);
}

#[test]
fn invalid_auth_provider_fails_construction() {
    let h = Harness::new();
    h.write("hw01.otter", &REMOTE_CONFIG.replace("\"default\"", "\"github\""));
    h.write("hw01.ipynb", NOTEBOOK);

    let err = h.open().unwrap_err();
    assert_eq!(err.kind(), "auth");
    assert_eq!(h.transport.calls(), 0);
    assert!(!h.store.is_populated());

    let types: Vec<_> = h.entries().iter().map(|e| (e.event_type, e.success)).collect();
    assert_eq!(
        types,
        vec![(AuditEventType::Auth, false), (AuditEventType::Init, false)]
    );
}

// ============================================================================
// Submission
// ============================================================================

#[test]
fn submit_without_service_is_a_precondition_failure() {
    let h = Harness::new();
    h.write("hw01.otter", LOCAL_CONFIG);
    h.write("hw01.ipynb", NOTEBOOK);
    let mut session = h.open().unwrap();

    let err = session.submit().unwrap_err();
    assert!(matches!(err, SessionError::Precondition(_)));
    assert_eq!(h.transport.calls(), 0);
    assert_eq!(h.prompt.logins.load(Ordering::SeqCst), 0);

    let submits = h.entries_of(AuditEventType::Submit);
    assert_eq!(submits.len(), 1);
    assert!(!submits[0].success);
}

#[test]
fn submit_posts_notebook_with_metadata() {
    let h = Harness::new();
    h.write("hw01.otter", REMOTE_CONFIG);
    h.write("hw01.ipynb", NOTEBOOK);
    let mut session = h.open().unwrap();

    let response = session.submit().unwrap();
    assert_eq!(response, "Submission received");

    let posts = h.transport.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "http://localhost:5000/submit");
    let body = &posts[0].1;
    assert_eq!(body["api_key"], "api-key-123");
    assert_eq!(body["nb"]["metadata"]["assignment_id"], "hw01");
    assert_eq!(body["nb"]["metadata"]["class_id"], "data8");
    assert_eq!(body["nb"]["metadata"]["kernelspec"]["name"], "python3");

    let submits = h.entries_of(AuditEventType::Submit);
    assert_eq!(submits.len(), 1);
    assert!(submits[0].success);
}

#[test]
fn submit_rejects_notebook_that_is_not_json() {
    let h = Harness::new();
    h.write("hw01.otter", REMOTE_CONFIG);
    h.write("hw01.ipynb", "not json");
    let mut session = h.open().unwrap();

    let err = session.submit().unwrap_err();
    assert_eq!(err.kind(), "invalid_notebook");
    assert!(h.transport.posts.lock().unwrap().is_empty());
}

// ============================================================================
// Export and rendering
// ============================================================================

#[test]
fn to_pdf_resolves_sole_notebook() {
    let h = Harness::new();
    h.write("hw01.ipynb", NOTEBOOK);
    let session = h.open().unwrap();

    let pdf = session.to_pdf(None, PdfOptions::default()).unwrap();
    assert_eq!(pdf, h.dir().join("hw01.pdf"));
    assert!(pdf.is_file());

    let records = h.entries_of(AuditEventType::ToPdf);
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
}

#[test]
fn to_pdf_without_notebook_fails_resolution() {
    let h = Harness::new();
    h.write("a.ipynb", NOTEBOOK);
    h.write("b.ipynb", NOTEBOOK);
    let session = h.open().unwrap();

    let err = session.to_pdf(None, PdfOptions::default()).unwrap_err();
    assert_eq!(err.kind(), "export_resolution");
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);
    assert!(!h.entries_of(AuditEventType::ToPdf)[0].success);
}

#[test]
fn export_packages_notebook_pdf_log_and_config() {
    let h = Harness::new();
    h.write("hw01.otter", LOCAL_CONFIG);
    h.write("hw01.ipynb", NOTEBOOK);
    h.write("data/extra.csv", "a,b\n1,2\n");
    let session = h.open().unwrap();

    let summary = session
        .export(&ExportOptions::new().with_file("data/extra.csv"))
        .unwrap();
    assert_eq!(summary.archive, h.dir().join("hw01.zip"));
    assert_eq!(
        summary.entries,
        vec![".OTTER_LOG", "data/extra.csv", "hw01.ipynb", "hw01.otter", "hw01.pdf"]
    );

    let mut reader = ArchiveReader::open(&summary.archive).unwrap();
    assert!(reader.verify_all().is_empty());
    assert_eq!(reader.manifest().notebook, "hw01.ipynb");
    assert_eq!(reader.manifest().files_of_kind(FileKind::AuditLog).count(), 1);
    assert_eq!(reader.read_verified("hw01.ipynb").unwrap(), NOTEBOOK.as_bytes());

    let types: Vec<_> = h.entries().iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            AuditEventType::Init,
            AuditEventType::BeginExport,
            AuditEventType::EndExport
        ]
    );
}

#[test]
fn export_without_pdf_and_explicit_path() {
    let h = Harness::new();
    h.write("hw01.ipynb", NOTEBOOK);
    let session = h.open().unwrap();

    let summary = session
        .export(
            &ExportOptions::new()
                .with_notebook("hw01.ipynb")
                .with_export_path("out.zip")
                .with_pdf(false),
        )
        .unwrap();
    assert_eq!(summary.archive, h.dir().join("out.zip"));
    assert!(!summary.entries.iter().any(|e| e.ends_with(".pdf")));
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn export_with_missing_extra_file_fails() {
    let h = Harness::new();
    h.write("hw01.ipynb", NOTEBOOK);
    let session = h.open().unwrap();

    let err = session
        .export(&ExportOptions::new().with_pdf(false).with_file("missing.txt"))
        .unwrap_err();
    assert_eq!(err.kind(), "archive");

    let end = h.entries_of(AuditEventType::EndExport);
    assert_eq!(end.len(), 1);
    assert!(!end[0].success);
}

// ============================================================================
// Audit trail
// ============================================================================

#[test]
fn full_session_log_verifies() {
    let h = Harness::new();
    h.write("hw01.otter", REMOTE_CONFIG);
    h.write("hw01.ipynb", NOTEBOOK);
    h.script("q1", "square(2) == 4");
    let mut session = h.open().unwrap();
    let mut env = student_env();

    session.check("q1", Some(&mut env)).unwrap();
    session.check("q2", Some(&mut env)).unwrap_err();
    session.check_all(Some(&mut env)).unwrap();
    session.submit().unwrap();

    let result = verify_log(&h.dir().join(".OTTER_LOG")).unwrap();
    assert!(result.is_valid);
    assert_eq!(result.entries_verified, h.entries().len() as u64);

    let session_ids: std::collections::BTreeSet<_> =
        h.entries().into_iter().filter_map(|e| e.session_id).collect();
    assert_eq!(session_ids.len(), 1);
}

#[test]
fn damaged_log_does_not_block_new_sessions() {
    let h = Harness::new();
    drop(h.open().unwrap());

    // A write cut short by a crash leaves half a record with no newline.
    let path = h.dir().join(".OTTER_LOG");
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(br#"{"schema_version":"1.0.0","ts":"#);
    fs::write(&path, bytes).unwrap();

    let mut session = h.open().unwrap();
    session.check("q1", None).unwrap_err();
    drop(session);

    let types: Vec<_> = h.entries().iter().map(|e| (e.event_type, e.success)).collect();
    assert_eq!(
        types,
        vec![
            (AuditEventType::Init, true),
            (AuditEventType::Init, true),
            (AuditEventType::Check, false),
        ]
    );

    let result = verify_log(&path).unwrap();
    assert_eq!(result.entries_verified, 3);
    assert!(result.broken_link.is_none());
    assert!(result.tampered_entries.is_empty());
    assert_eq!(result.unreadable_lines.len(), 1);
    assert_eq!(result.unreadable_lines[0].line, 2);
}

#[test]
fn non_finite_grade_is_a_check_error() {
    let h = Harness::new();
    h.script("q1", "grade nan");
    let mut session = h.open().unwrap();

    let err = session.check("q1", None).unwrap_err();
    assert_eq!(err.kind(), "check");
    assert!(err.to_string().contains("not a finite number"));

    let checks = h.entries_of(AuditEventType::Check);
    assert_eq!(checks.len(), 1);
    assert!(!checks[0].success);
    assert!(checks[0].results.is_empty());
    assert!(verify_log(&h.dir().join(".OTTER_LOG")).unwrap().is_valid);
}

#[test]
fn concurrent_sessions_share_one_chain() {
    let h = Harness::new();
    h.script("q1", "square(2) == 4");

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let mut session = h.open().unwrap();
                let mut env = student_env();
                for _ in 0..20 {
                    session.check("q1", Some(&mut env)).unwrap();
                }
            });
        }
    });

    let result = verify_log(&h.dir().join(".OTTER_LOG")).unwrap();
    assert!(result.is_valid, "{result:?}");
    assert_eq!(result.entries_verified, 8 * 21);
    assert_eq!(result.sessions, 8);
}

#[test]
fn sessions_on_one_directory_share_the_log_handle() {
    let h = Harness::new();
    let first = h.open().unwrap();
    let second = h.open().unwrap();
    assert!(first.audit_log().shares_lock_with(second.audit_log()));
}
