pub mod bootstrap;
pub mod calendar_picker;
pub mod calendar_sync;
pub mod credentials;
pub mod plan_parser;
pub mod schedule_mapper;
pub mod session;
