use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::application::bootstrap::{WorkspaceLayout, bootstrap_workspace};
use crate::application::calendar_picker::TargetCalendarResolver;
use crate::application::calendar_sync::{PlanSyncService, PlannedEvent, SyncFailure};
use crate::application::credentials::{CredentialBroker, CredentialStatus, OAuthSettings};
use crate::application::plan_parser::parse_plan;
use crate::application::schedule_mapper::map_schedule;
use crate::domain::models::{Credential, PlanDocument, SessionStep};
use crate::infrastructure::calendar_client::{CalendarClient, CalendarInfo, CreatedEvent};
use crate::infrastructure::config::{read_calendar_config, read_planner_config};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::CoreError;
use crate::infrastructure::event_ledger::{EventLedger, InMemoryEventLedger};
use crate::infrastructure::oauth_client::OAuthHttpClient;
use crate::infrastructure::plan_generator::{PlanGenerator, build_study_prompt};
use crate::infrastructure::text_extractor::TextExtractor;

static NEXT_AUTH_STATE: AtomicU64 = AtomicU64::new(1);

fn next_auth_state() -> String {
    let sequence = NEXT_AUTH_STATE.fetch_add(1, Ordering::Relaxed);
    format!("studysync-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected {
        expires_at: Option<DateTime<Utc>>,
    },
    AuthorizationRequired {
        authorization_url: String,
    },
}

/// Overrides for a single sync run; unset fields fall back to the saved
/// calendar config (and, for the calendar, the picker).
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub calendar_id: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub timezone: Option<Tz>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub calendar_id: String,
    pub succeeded: Vec<CreatedEvent>,
    pub failed: Vec<SyncFailure>,
}

#[derive(Debug)]
struct SessionRuntime {
    step: SessionStep,
    plan: Option<PlanDocument>,
    last_sync_calendar_id: Option<String>,
}

impl Default for SessionRuntime {
    fn default() -> Self {
        Self {
            step: SessionStep::Connect,
            plan: None,
            last_sync_calendar_id: None,
        }
    }
}

/// One user's planning session: connect a calendar, generate a plan from a
/// document, sync it, tear it down.
///
/// The session owns the step gating: operations invoked outside their valid
/// step fail with `CoreError::State` and mutate nothing, even though the
/// boundary UI is expected to only offer valid actions. Only one state
/// permits each calendar-mutating operation, so a single runtime lock is
/// the whole concurrency story.
pub struct PlannerSession<C, S, O>
where
    C: CalendarClient,
    S: CredentialStore,
    O: OAuthHttpClient,
{
    layout: WorkspaceLayout,
    calendar_client: Arc<C>,
    credential_broker: CredentialBroker<S, O>,
    ledger: Arc<InMemoryEventLedger>,
    runtime: Mutex<SessionRuntime>,
    log_guard: Mutex<()>,
}

impl<C, S, O> PlannerSession<C, S, O>
where
    C: CalendarClient,
    S: CredentialStore,
    O: OAuthHttpClient,
{
    pub fn new(
        workspace_root: &Path,
        oauth_settings: OAuthSettings,
        calendar_client: Arc<C>,
        credential_store: Arc<S>,
        oauth_client: Arc<O>,
    ) -> Result<Self, CoreError> {
        let layout = bootstrap_workspace(workspace_root)?;
        Ok(Self {
            layout,
            calendar_client,
            credential_broker: CredentialBroker::new(
                oauth_settings,
                credential_store,
                oauth_client,
            ),
            ledger: Arc::new(InMemoryEventLedger::new()),
            runtime: Mutex::new(SessionRuntime::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn current_step(&self) -> Result<SessionStep, CoreError> {
        Ok(self.lock_runtime()?.step)
    }

    pub fn current_plan(&self) -> Result<Option<PlanDocument>, CoreError> {
        Ok(self.lock_runtime()?.plan.clone())
    }

    pub fn created_event_ids(&self) -> Result<Vec<String>, CoreError> {
        self.ledger.all()
    }

    /// Acquires a calendar credential and moves `connect -> upload`.
    ///
    /// With an authorization code the code is exchanged; without one the
    /// stored credential is used or refreshed, and if neither works the
    /// caller gets the authorization URL to send the user through (the step
    /// stays `connect` until a credential materializes).
    pub async fn connect_calendar(
        &self,
        authorization_code: Option<&str>,
    ) -> Result<ConnectOutcome, CoreError> {
        self.require_step(SessionStep::Connect, "connect_calendar")?;

        if let Some(code) = authorization_code {
            let credential = self.credential_broker.authenticate_with_code(code).await?;
            return self.finish_connect("exchanged authorization code", credential);
        }

        match self.credential_broker.ensure_credential().await? {
            CredentialStatus::Valid(credential) => {
                self.finish_connect("reused stored credential", credential)
            }
            CredentialStatus::Refreshed(credential) => {
                self.finish_connect("refreshed stored credential", credential)
            }
            CredentialStatus::InteractionRequired => {
                let authorization_url = self
                    .credential_broker
                    .build_authorization_url(&next_auth_state())?;
                self.log_info("connect_calendar", "authorization required");
                Ok(ConnectOutcome::AuthorizationRequired { authorization_url })
            }
        }
    }

    /// Server-side bootstrap: connect using a long-lived refresh token
    /// instead of the browser flow.
    pub async fn connect_with_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<ConnectOutcome, CoreError> {
        self.require_step(SessionStep::Connect, "connect_with_refresh_token")?;
        let credential = self
            .credential_broker
            .authenticate_with_refresh_token(refresh_token)
            .await?;
        self.finish_connect("bootstrapped from refresh token", credential)
    }

    fn finish_connect(
        &self,
        detail: &str,
        credential: Credential,
    ) -> Result<ConnectOutcome, CoreError> {
        {
            let mut runtime = self.lock_runtime()?;
            runtime.step = SessionStep::Upload;
        }
        self.log_info("connect_calendar", detail);
        Ok(ConnectOutcome::Connected {
            expires_at: credential.expires_at,
        })
    }

    /// Validates raw model output into the session's plan. Generation
    /// replaces the previous cycle wholesale: the ledger's tracked IDs from
    /// an earlier plan are discarded here, not carried over.
    pub fn generate_plan(&self, raw_model_text: &str) -> Result<PlanDocument, CoreError> {
        self.require_step(SessionStep::Upload, "generate_plan")?;

        let parsed = parse_plan(raw_model_text)?;
        for entry in &parsed.dropped {
            self.log_error(
                "generate_plan",
                &format!(
                    "dropped {} entry {}: {}",
                    entry.section.as_str(),
                    entry.index,
                    entry.reason
                ),
            );
        }

        self.ledger.clear()?;
        {
            let mut runtime = self.lock_runtime()?;
            runtime.plan = Some(parsed.plan.clone());
        }

        self.log_info(
            "generate_plan",
            &format!(
                "accepted plan '{}' with {} sessions ({} entries dropped)",
                parsed.plan.title,
                parsed.plan.schedule.len(),
                parsed.dropped.len()
            ),
        );
        Ok(parsed.plan)
    }

    /// Full pipeline: extract document text, prompt the model, validate the
    /// response into the session's plan.
    pub async fn generate_plan_from_document<E, G>(
        &self,
        extractor: &E,
        generator: &G,
        document_path: &Path,
    ) -> Result<PlanDocument, CoreError>
    where
        E: TextExtractor,
        G: PlanGenerator,
    {
        self.require_step(SessionStep::Upload, "generate_plan_from_document")?;

        let planner = read_planner_config(&self.layout.config_dir)?;
        let material = extractor.extract(document_path)?;
        let prompt = build_study_prompt(
            &material,
            planner.plan_days,
            planner.hours_per_day,
            planner.prompt_char_budget,
        );
        let raw = generator.complete(&prompt).await?;
        self.generate_plan(&raw)
    }

    /// Maps the session's plan to events and creates them, then moves
    /// `upload -> display`. Per-item calendar failures do not abort the
    /// batch or block the transition: even a fully failed sync reaches
    /// `display` so the user can see what happened. Structural failures
    /// (no plan, mapping, auth, config) abort with the step unchanged.
    pub async fn sync_plan_to_calendar(&self, options: SyncOptions) -> Result<SyncReport, CoreError> {
        self.require_step(SessionStep::Upload, "sync_plan_to_calendar")?;

        let plan = self
            .lock_runtime()?
            .plan
            .clone()
            .ok_or_else(|| CoreError::Parse("no plan has been generated".to_string()))?;

        let credential = self.required_credential().await?;
        let calendar_id = self
            .resolve_calendar_id(options.calendar_id, &credential.access_token)
            .await?;

        let calendar_config = read_calendar_config(&self.layout.config_dir)?;
        let start_time = match options.start_time {
            Some(start_time) => start_time,
            None => calendar_config.parsed_start_time()?,
        };
        let timezone = match options.timezone {
            Some(timezone) => timezone,
            None => calendar_config.parsed_timezone()?,
        };

        let descriptors = map_schedule(&plan, start_time, timezone)?;
        let planned: Vec<PlannedEvent> = plan
            .schedule
            .iter()
            .cloned()
            .zip(descriptors)
            .map(|(source, descriptor)| PlannedEvent::new(source, descriptor))
            .collect();

        let sync_service =
            PlanSyncService::new(Arc::clone(&self.calendar_client), Arc::clone(&self.ledger));
        let outcomes = sync_service
            .sync_create(&credential.access_token, &calendar_id, &planned)
            .await?;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome.created() {
                Some(created) => succeeded.push(created.clone()),
                None => {
                    if let Some(failure) = outcome.failure() {
                        failed.push(failure.clone());
                    }
                }
            }
        }

        {
            let mut runtime = self.lock_runtime()?;
            runtime.step = SessionStep::Display;
            runtime.last_sync_calendar_id = Some(calendar_id.clone());
        }

        self.log_info(
            "sync_plan_to_calendar",
            &format!(
                "calendar_id={calendar_id} created={} failed={}",
                succeeded.len(),
                failed.len()
            ),
        );
        for failure in &failed {
            self.log_error(
                "sync_plan_to_calendar",
                &format!(
                    "event for {} '{}' failed: {}",
                    failure.session.date, failure.session.topic, failure.message
                ),
            );
        }

        Ok(SyncReport {
            calendar_id,
            succeeded,
            failed,
        })
    }

    /// Best-effort teardown of everything this session created: one delete
    /// per tracked ID, then the ledger is cleared regardless of per-item
    /// delete failures (the failures are logged and the count returned
    /// reflects only confirmed deletions). The step stays `display`.
    pub async fn delete_synced_events(
        &self,
        calendar_id: Option<&str>,
    ) -> Result<usize, CoreError> {
        self.require_step(SessionStep::Display, "delete_synced_events")?;

        let event_ids = self.ledger.all()?;
        if event_ids.is_empty() {
            self.log_info("delete_synced_events", "no tracked events to delete");
            return Ok(0);
        }

        let credential = self.required_credential().await?;
        let calendar_id = self
            .resolve_calendar_id(calendar_id.map(ToOwned::to_owned), &credential.access_token)
            .await?;

        let sync_service =
            PlanSyncService::new(Arc::clone(&self.calendar_client), Arc::clone(&self.ledger));
        let report = sync_service
            .sync_delete(&credential.access_token, &calendar_id, &event_ids)
            .await;

        for failure in &report.failures {
            self.log_error(
                "delete_synced_events",
                &format!("delete of {} failed: {}", failure.event_id, failure.message),
            );
        }
        self.ledger.clear()?;

        self.log_info(
            "delete_synced_events",
            &format!(
                "calendar_id={calendar_id} deleted={} failed={}",
                report.deleted,
                report.failures.len()
            ),
        );
        Ok(report.deleted)
    }

    /// `display -> upload` for a fresh generation cycle. The plan is
    /// discarded; the calendar events of the old plan stay put, and their
    /// IDs stay tracked until the next generation or an explicit delete.
    pub fn start_new_plan(&self) -> Result<(), CoreError> {
        self.require_step(SessionStep::Display, "start_new_plan")?;
        {
            let mut runtime = self.lock_runtime()?;
            runtime.step = SessionStep::Upload;
            runtime.plan = None;
        }
        self.log_info("start_new_plan", "returned to upload step");
        Ok(())
    }

    pub async fn list_writable_calendars(&self) -> Result<Vec<CalendarInfo>, CoreError> {
        {
            let runtime = self.lock_runtime()?;
            if runtime.step == SessionStep::Connect {
                let error = CoreError::state("list_writable_calendars", runtime.step);
                drop(runtime);
                self.log_error("list_writable_calendars", &error.to_string());
                return Err(error);
            }
        }

        let credential = self.required_credential().await?;
        let resolver =
            TargetCalendarResolver::new(&self.layout.config_dir, Arc::clone(&self.calendar_client));
        resolver.list_writable(&credential.access_token).await
    }

    async fn required_credential(&self) -> Result<Credential, CoreError> {
        match self.credential_broker.ensure_credential().await? {
            CredentialStatus::Valid(credential) | CredentialStatus::Refreshed(credential) => {
                Ok(credential)
            }
            CredentialStatus::InteractionRequired => Err(CoreError::Auth(
                "calendar authorization required; connect the calendar first".to_string(),
            )),
        }
    }

    // Explicit argument, else the calendar of the last sync, else the
    // configured or freshly picked one.
    async fn resolve_calendar_id(
        &self,
        explicit: Option<String>,
        access_token: &str,
    ) -> Result<String, CoreError> {
        if let Some(calendar_id) = explicit
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Ok(calendar_id.to_string());
        }
        if let Some(calendar_id) = self.lock_runtime()?.last_sync_calendar_id.clone() {
            return Ok(calendar_id);
        }

        let resolver =
            TargetCalendarResolver::new(&self.layout.config_dir, Arc::clone(&self.calendar_client));
        let choice = resolver.resolve(access_token).await?;
        Ok(choice.calendar_id().to_string())
    }

    fn require_step(&self, expected: SessionStep, operation: &str) -> Result<(), CoreError> {
        let step = self.lock_runtime()?.step;
        if step != expected {
            let error = CoreError::state(operation, step);
            self.log_error(operation, &error.to_string());
            return Err(error);
        }
        Ok(())
    }

    fn lock_runtime(&self) -> Result<MutexGuard<'_, SessionRuntime>, CoreError> {
        self.runtime
            .lock()
            .map_err(|error| CoreError::Internal(format!("runtime lock poisoned: {error}")))
    }

    fn log_info(&self, operation: &str, message: &str) {
        self.append_log("info", operation, message);
    }

    fn log_error(&self, operation: &str, message: &str) {
        self.append_log("error", operation, message);
    }

    // Logging is best-effort; a failed write never fails the operation.
    fn append_log(&self, level: &str, operation: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.layout.logs_dir.join("session.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "operation": operation,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{payload}");
        }
    }
}
