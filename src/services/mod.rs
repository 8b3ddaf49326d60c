pub mod event_manager;
pub mod filtering;
pub mod infraction;
pub mod localization;
pub mod logger;
