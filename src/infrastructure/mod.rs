pub mod calendar_client;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod event_ledger;
pub mod event_payload;
pub mod oauth_client;
pub mod plan_generator;
pub mod text_extractor;
