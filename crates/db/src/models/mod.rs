pub mod client;
pub mod client_portal;
pub mod coach;
pub mod coach_profile;
pub mod coach_session;
pub mod email_log;
pub mod exercise;
pub mod message;
pub mod notification;
pub mod progress_metric;
pub mod subscription;
pub mod workout;
