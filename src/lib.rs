//! StudySync core: turn a study document into a validated plan and keep a
//! Google Calendar in step with it.
//!
//! The crate is the backend for a three-step session. [`PlannerSession`]
//! is the entry point and owns the step gating:
//!
//! 1. `connect` — obtain a calendar credential
//!    ([`PlannerSession::connect_calendar`]).
//! 2. `upload` — generate and validate a plan from a document or raw model
//!    output ([`PlannerSession::generate_plan_from_document`],
//!    [`PlannerSession::generate_plan`]), then sync it
//!    ([`PlannerSession::sync_plan_to_calendar`]).
//! 3. `display` — tear down the synced events
//!    ([`PlannerSession::delete_synced_events`]) or start over
//!    ([`PlannerSession::start_new_plan`]).
//!
//! External calendars, credential storage, OAuth token endpoints, text
//! extraction, and the plan-generating model are all behind traits, so a
//! host can swap in fakes or alternative providers; the provided
//! implementations target Google Calendar, the OS keyring, and Gemini.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{WorkspaceLayout, bootstrap_workspace};
pub use application::calendar_picker::{CalendarChoice, TargetCalendarResolver};
pub use application::calendar_sync::{
    DeleteFailure, DeleteReport, PlanSyncService, PlannedEvent, SyncFailure, SyncOutcome,
};
pub use application::credentials::{CredentialBroker, CredentialStatus, OAuthSettings};
pub use application::plan_parser::{DroppedEntry, ParsedPlan, PlanSection, parse_plan};
pub use application::schedule_mapper::map_schedule;
pub use application::session::{ConnectOutcome, PlannerSession, SyncOptions, SyncReport};
pub use domain::models::{
    Credential, EventDescriptor, PlanDocument, SessionStep, StudySession, Topic,
};
pub use infrastructure::calendar_client::{
    CalendarClient, CalendarInfo, CreatedEvent, ReqwestGoogleCalendarClient,
};
pub use infrastructure::config::{CalendarConfig, PlannerConfig};
pub use infrastructure::credential_store::{
    CredentialStore, InMemoryCredentialStore, KeyringCredentialStore,
};
pub use infrastructure::error::CoreError;
pub use infrastructure::event_ledger::{EventLedger, InMemoryEventLedger};
pub use infrastructure::oauth_client::{OAuthHttpClient, ReqwestOAuthClient};
pub use infrastructure::plan_generator::{GeminiPlanGenerator, PlanGenerator};
pub use infrastructure::text_extractor::{PlainTextExtractor, TextExtractor};
