pub mod auth;
pub mod billing;
pub mod client_roster;
pub mod config;
pub mod dashboard;
pub mod database_validator;
pub mod email;
pub mod events;
pub mod messaging;
pub mod notification;
pub mod portal;
pub mod profile;
pub mod progress;
pub mod workout_builder;
pub mod workout_completion;

#[cfg(test)]
pub(crate) mod testing;
