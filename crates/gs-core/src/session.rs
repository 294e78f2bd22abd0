//! The grading session facade.
//!
//! A [`GradingSession`] is opened once per grading context. Opening resolves
//! configuration, decides between local-only and remote-service mode, and in
//! remote mode authenticates immediately. Every public operation runs inside
//! an [`OperationSpan`], so the audit log gets a terminal record on every
//! exit path.

use crate::audit::{
    audit_log_path, AuditContext, AuditEntry, AuditEventType, OperationSpan, SharedAuditLog,
};
use crate::auth::AuthClient;
use crate::check::{list_questions, script_path, CheckEngine, CheckError, CheckResult};
use crate::credentials::{Credential, CredentialStore};
use crate::error::SessionError;
use crate::export::{archive_name, ExportOptions, ExportSummary};
use crate::logging::{generate_session_id, process_run_id};
use crate::prompt::{CredentialPrompt, TerminalPrompt};
use crate::render::{NotebookRenderer, PdfOptions, UnavailableRenderer};
use crate::snapshot::{snapshot, Environment};
use crate::submit::{inject_metadata, SubmissionClient};
use crate::transport::{HttpTransport, UreqTransport};
use gs_bundle::{ArchiveWriter, FileKind};
use gs_config::{discover_notebooks, ConfigOptions, ConfigSnapshot, SessionSettings};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default check-script directory, relative to the working directory.
pub const DEFAULT_TEST_DIR: &str = "tests";

/// Where a session finds its inputs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub config: ConfigOptions,
    /// Check-script directory; relative paths are joined to the working directory.
    pub test_dir: PathBuf,
    /// Audit log path; defaults to `.OTTER_LOG` in the working directory.
    pub audit_log: Option<PathBuf>,
}

impl SessionOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        SessionOptions {
            config: ConfigOptions::new(work_dir),
            test_dir: PathBuf::from(DEFAULT_TEST_DIR),
            audit_log: None,
        }
    }

    pub fn with_test_dir(mut self, test_dir: impl Into<PathBuf>) -> Self {
        self.test_dir = test_dir.into();
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_config_path(path);
        self
    }

    pub fn with_audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log = Some(path.into());
        self
    }

    fn work_dir(&self) -> PathBuf {
        if self.config.work_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            self.config.work_dir.clone()
        }
    }
}

/// External capabilities a session depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn CheckEngine>,
    pub renderer: Arc<dyn NotebookRenderer>,
    pub prompt: Arc<dyn CredentialPrompt>,
    pub transport: Arc<dyn HttpTransport>,
    pub credentials: Arc<CredentialStore>,
    /// Shared log handle; when absent the process-wide handle for the
    /// session's log path is used.
    pub audit: Option<SharedAuditLog>,
}

impl Collaborators {
    /// Production defaults around `engine`: terminal prompts, `ureq`, the
    /// process-wide credential store, and no PDF renderer.
    pub fn new(engine: Arc<dyn CheckEngine>) -> Self {
        Collaborators {
            engine,
            renderer: Arc::new(UnavailableRenderer),
            prompt: Arc::new(TerminalPrompt),
            transport: Arc::new(UreqTransport::new()),
            credentials: CredentialStore::global(),
            audit: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn NotebookRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_audit_log(mut self, audit: SharedAuditLog) -> Self {
        self.audit = Some(audit);
        self
    }
}

#[derive(Serialize)]
struct InitDetails<'a> {
    work_dir: &'a str,
    test_dir: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a ConfigSnapshot>,
}

#[derive(Serialize)]
struct CheckDetails {
    pregraded: bool,
}

#[derive(Serialize)]
struct PdfDetails<'a> {
    notebook: &'a Path,
    pdf: &'a Path,
    options: &'a PdfOptions,
}

pub struct GradingSession {
    ctx: AuditContext,
    audit: SharedAuditLog,
    settings: SessionSettings,
    test_dir: PathBuf,
    credential: Option<Credential>,
    environment: Environment,
    engine: Arc<dyn CheckEngine>,
    renderer: Arc<dyn NotebookRenderer>,
    auth: AuthClient,
    submission: SubmissionClient,
}

impl GradingSession {
    /// Open a session, recording one `INIT` entry whatever the outcome.
    ///
    /// Fails only without an `INIT` entry when the audit log itself cannot
    /// be opened.
    pub fn open(options: SessionOptions, collaborators: Collaborators) -> Result<Self, SessionError> {
        let work_dir = options.work_dir();
        let audit = match collaborators.audit.clone() {
            Some(audit) => audit,
            None => SharedAuditLog::for_path(
                options
                    .audit_log
                    .clone()
                    .unwrap_or_else(|| audit_log_path(&work_dir)),
            )?,
        };
        let ctx = AuditContext::new(process_run_id()).with_session_id(generate_session_id());

        let mut span = OperationSpan::begin(&audit, &ctx, AuditEventType::Init);
        let result = Self::construct(options, collaborators, audit.clone(), ctx, &mut span);
        span.complete(result)
    }

    fn construct(
        options: SessionOptions,
        collaborators: Collaborators,
        audit: SharedAuditLog,
        ctx: AuditContext,
        span: &mut OperationSpan,
    ) -> Result<Self, SessionError> {
        let work_dir = options.work_dir();
        let test_dir = if options.test_dir.is_absolute() {
            options.test_dir.clone()
        } else {
            work_dir.join(&options.test_dir)
        };

        let work_dir_name = work_dir.display().to_string();
        let test_dir_name = test_dir.display().to_string();
        span.set_details(&InitDetails {
            work_dir: &work_dir_name,
            test_dir: &test_dir_name,
            config: None,
        });

        let settings = SessionSettings::resolve(&options.config)?;
        span.set_details(&InitDetails {
            work_dir: &work_dir_name,
            test_dir: &test_dir_name,
            config: Some(&settings.snapshot()),
        });

        let Collaborators {
            engine,
            renderer,
            prompt,
            transport,
            credentials,
            ..
        } = collaborators;

        let mut session = GradingSession {
            ctx,
            audit,
            settings,
            test_dir,
            credential: None,
            environment: Environment::new(),
            engine,
            renderer,
            auth: AuthClient::new(credentials, prompt, transport.clone()),
            submission: SubmissionClient::new(transport),
        };

        info!(
            session_id = session.session_id(),
            service_enabled = session.service_enabled(),
            "Grading session opened"
        );

        if session.service_enabled() {
            session.authenticate()?;
        }

        Ok(session)
    }

    /// Resolve the session credential, recording one `AUTH` entry.
    pub fn authenticate(&mut self) -> Result<Credential, SessionError> {
        let mut span = OperationSpan::begin(&self.audit, &self.ctx, AuditEventType::Auth);
        let result = self
            .auth
            .resolve(self.settings.remote.as_ref())
            .map_err(SessionError::from);
        if let Ok(outcome) = &result {
            span.set_details(outcome);
        }

        let outcome = span.complete(result)?;
        self.credential = Some(outcome.credential.clone());
        Ok(outcome.credential)
    }

    /// Run the check script for `question`.
    ///
    /// Without an explicit environment the session's own environment is used;
    /// mutations made by the check persist there.
    pub fn check(
        &mut self,
        question: &str,
        env: Option<&mut Environment>,
    ) -> Result<CheckResult, SessionError> {
        match env {
            Some(env) => self.check_in(question, env),
            None => {
                let mut env = std::mem::take(&mut self.environment);
                let result = self.check_in(question, &mut env);
                self.environment = env;
                result
            }
        }
    }

    fn check_in(&self, question: &str, env: &mut Environment) -> Result<CheckResult, SessionError> {
        let mut span = OperationSpan::begin(&self.audit, &self.ctx, AuditEventType::Check);
        span.set_question(question);
        span.set_details(&CheckDetails {
            pregraded: self.is_pregraded(question),
        });

        let result = self.run_check(question, env);

        span.set_snapshot(snapshot(env).to_record());
        if let Ok(check) = &result {
            debug!(question, grade = check.grade, "Check completed");
            span.push_result(check.clone());
        }
        span.complete(result)
    }

    fn run_check(&self, question: &str, env: &mut Environment) -> Result<CheckResult, SessionError> {
        let path = script_path(&self.test_dir, question, self.engine.script_extension());
        if !path.is_file() {
            return Err(SessionError::CheckNotFound {
                question: question.to_string(),
                path,
            });
        }
        let result = self.engine.run(&path, question, env)?;
        if !result.grade.is_finite() {
            return Err(CheckError::Execution {
                path,
                message: format!("grade {} is not a finite number", result.grade),
            }
            .into());
        }
        Ok(result)
    }

    /// Run every check script in the test directory, in sorted order,
    /// against one shared environment.
    pub fn check_all(
        &mut self,
        env: Option<&mut Environment>,
    ) -> Result<Vec<CheckResult>, SessionError> {
        match env {
            Some(env) => self.check_all_in(env),
            None => {
                let mut env = std::mem::take(&mut self.environment);
                let result = self.check_all_in(&mut env);
                self.environment = env;
                result
            }
        }
    }

    fn check_all_in(&self, env: &mut Environment) -> Result<Vec<CheckResult>, SessionError> {
        let mut span = OperationSpan::begin(&self.audit, &self.ctx, AuditEventType::EndCheckAll);
        let result = match self.record(AuditEventType::BeginCheckAll) {
            Ok(()) => self.run_all(env, &mut span),
            Err(e) => Err(e),
        };
        span.complete(result)
    }

    fn run_all(
        &self,
        env: &mut Environment,
        span: &mut OperationSpan,
    ) -> Result<Vec<CheckResult>, SessionError> {
        let questions = list_questions(&self.test_dir, self.engine.script_extension())
            .map_err(|e| SessionError::io(&self.test_dir, e))?;

        let mut results = Vec::with_capacity(questions.len());
        for question in &questions {
            let result = self.check_in(question, env)?;
            span.push_result(result.clone());
            results.push(result);
        }

        info!(
            questions = results.len(),
            passed = results.iter().filter(|r| r.passed()).count(),
            "Check run completed"
        );
        Ok(results)
    }

    /// Package the notebook and supporting files into a zip archive.
    pub fn export(&self, options: &ExportOptions) -> Result<ExportSummary, SessionError> {
        let mut span = OperationSpan::begin(&self.audit, &self.ctx, AuditEventType::EndExport);
        let result = match self.record_with(AuditEventType::BeginExport, options) {
            Ok(()) => self.build_export(options),
            Err(e) => Err(e),
        };
        if let Ok(summary) = &result {
            span.set_details(summary);
        }
        span.complete(result)
    }

    fn build_export(&self, options: &ExportOptions) -> Result<ExportSummary, SessionError> {
        let work_dir = &self.settings.work_dir;
        let notebook = self.resolve_notebook(options.notebook.as_deref())?;
        let archive = match &options.export_path {
            Some(path) => self.in_work_dir(path),
            None => notebook.with_extension("zip"),
        };

        let notebook_name = archive_name(work_dir, &notebook);
        let mut writer =
            ArchiveWriter::new(notebook_name.clone()).with_tool_version(env!("CARGO_PKG_VERSION"));
        if let Some(remote) = &self.settings.remote {
            writer = writer.with_assignment_id(&remote.assignment_id);
        }

        writer.add_path(notebook_name, &notebook, FileKind::Notebook)?;

        if options.pdf {
            let pdf = self.renderer.render_pdf(&notebook, &options.pdf_options)?;
            writer.add_path(archive_name(work_dir, &pdf), &pdf, FileKind::Pdf)?;
        }

        self.audit.flush()?;
        let log_path = self.audit.path();
        if log_path.is_file() {
            writer.add_path(archive_name(work_dir, log_path), log_path, FileKind::AuditLog)?;
        }

        if let Some(config) = self.settings.config_path() {
            writer.add_path(archive_name(work_dir, config), config, FileKind::Config)?;
        }

        for file in &options.files {
            let source = self.in_work_dir(file);
            writer.add_path(archive_name(work_dir, &source), &source, FileKind::Extra)?;
        }

        let manifest = writer.write(&archive)?;
        let mut entries: Vec<String> = manifest.files.iter().map(|f| f.path.clone()).collect();
        entries.sort();
        Ok(ExportSummary {
            archive,
            notebook,
            entries,
            total_bytes: manifest.total_bytes(),
        })
    }

    /// Render the notebook to PDF and return the PDF's path.
    pub fn to_pdf(&self, notebook: Option<&Path>, options: PdfOptions) -> Result<PathBuf, SessionError> {
        let mut span = OperationSpan::begin(&self.audit, &self.ctx, AuditEventType::ToPdf);
        let result = self.resolve_notebook(notebook).and_then(|nb| {
            let pdf = self.renderer.render_pdf(&nb, &options)?;
            Ok((nb, pdf))
        });
        if let Ok((nb, pdf)) = &result {
            span.set_details(&PdfDetails {
                notebook: nb,
                pdf,
                options: &options,
            });
        }
        span.complete(result).map(|(_, pdf)| pdf)
    }

    /// Submit the notebook to the grading service, recording one `SUBMIT` entry.
    pub fn submit(&mut self) -> Result<String, SessionError> {
        let span = OperationSpan::begin(&self.audit, &self.ctx, AuditEventType::Submit);
        let result = self.submit_notebook();
        span.complete(result)
    }

    fn submit_notebook(&mut self) -> Result<String, SessionError> {
        let Some(remote) = self.settings.remote.clone() else {
            return Err(SessionError::Precondition(
                "notebook not configured for the grading service; submission requires an endpoint"
                    .to_string(),
            ));
        };

        let credential = match self.credential.clone() {
            Some(credential) => credential,
            None => self.authenticate()?,
        };

        let path = self.settings.notebook.clone().ok_or_else(|| {
            SessionError::Precondition("no notebook resolved for submission".to_string())
        })?;
        let raw = std::fs::read_to_string(&path).map_err(|e| SessionError::io(&path, e))?;
        let notebook: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| SessionError::InvalidNotebook {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let notebook =
            inject_metadata(notebook, &remote).ok_or_else(|| SessionError::InvalidNotebook {
                path: path.clone(),
                message: "notebook root is not a JSON object".to_string(),
            })?;

        let response = self.submission.submit(&remote, &credential, &notebook)?;
        info!(bytes = response.len(), "Submission accepted by grading service");
        Ok(response)
    }

    /// Notebook to operate on: explicit path, then the configured notebook,
    /// then the only notebook in the working directory.
    pub fn resolve_notebook(&self, explicit: Option<&Path>) -> Result<PathBuf, SessionError> {
        if let Some(path) = explicit {
            return Ok(self.in_work_dir(path));
        }
        if let Some(path) = &self.settings.notebook {
            return Ok(path.clone());
        }

        let work_dir = &self.settings.work_dir;
        let mut found = discover_notebooks(work_dir)?;
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(SessionError::ExportResolution(format!(
                "no notebook path given and no notebook found in {}",
                work_dir.display()
            ))),
            n => Err(SessionError::ExportResolution(format!(
                "no notebook path given and {} notebooks found in {}",
                n,
                work_dir.display()
            ))),
        }
    }

    fn in_work_dir(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.settings.work_dir.join(path)
        }
    }

    fn record(&self, event_type: AuditEventType) -> Result<(), SessionError> {
        self.audit.append(AuditEntry::new(&self.ctx, event_type))?;
        Ok(())
    }

    fn record_with<T: Serialize>(
        &self,
        event_type: AuditEventType,
        details: &T,
    ) -> Result<(), SessionError> {
        self.audit
            .append(AuditEntry::new(&self.ctx, event_type).with_details(details))?;
        Ok(())
    }

    pub fn service_enabled(&self) -> bool {
        self.settings.service_enabled()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn test_dir(&self) -> &Path {
        &self.test_dir
    }

    pub fn notebook(&self) -> Option<&Path> {
        self.settings.notebook.as_deref()
    }

    pub fn pregraded_questions(&self) -> &[String] {
        &self.settings.pregraded_questions
    }

    pub fn is_pregraded(&self, question: &str) -> bool {
        self.settings.pregraded_questions.iter().any(|q| q == question)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Environment used when `check` is called without one.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    pub fn audit_log(&self) -> &SharedAuditLog {
        &self.audit
    }

    pub fn session_id(&self) -> &str {
        self.ctx.session_id.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for GradingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradingSession")
            .field("session_id", &self.session_id())
            .field("work_dir", &self.settings.work_dir)
            .field("test_dir", &self.test_dir)
            .field("service_enabled", &self.service_enabled())
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}
