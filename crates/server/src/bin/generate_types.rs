//! Writes the TypeScript declarations the SPA imports to `shared/types.ts`.

use std::{fs, path::PathBuf};

use ts_rs::TS;

fn declarations() -> Vec<String> {
    vec![
        utils::response::ApiResponse::<()>::decl(),
        db::models::coach::Coach::decl(),
        db::models::coach_profile::CoachProfile::decl(),
        db::models::coach_profile::UpsertCoachProfile::decl(),
        db::models::client::ClientStatus::decl(),
        db::models::client::Client::decl(),
        db::models::client::CreateClient::decl(),
        db::models::client::UpdateClient::decl(),
        db::models::client_portal::ClientPortal::decl(),
        db::models::workout::WorkoutStatus::decl(),
        db::models::workout::Workout::decl(),
        db::models::workout::WorkoutWithExercises::decl(),
        db::models::exercise::Exercise::decl(),
        db::models::exercise::CreateExercise::decl(),
        db::models::progress_metric::MetricType::decl(),
        db::models::progress_metric::ProgressMetric::decl(),
        db::models::progress_metric::CreateProgressMetric::decl(),
        db::models::message::MessageSender::decl(),
        db::models::message::Message::decl(),
        db::models::notification::NotificationKind::decl(),
        db::models::notification::Notification::decl(),
        db::models::email_log::EmailStatus::decl(),
        db::models::email_log::EmailLog::decl(),
        db::models::subscription::Subscription::decl(),
        services::services::auth::CoachSession::decl(),
        services::services::auth::SignupRequest::decl(),
        services::services::auth::LoginRequest::decl(),
        services::services::auth::SignedIn::decl(),
        services::services::client_roster::ClientDeletion::decl(),
        services::services::config::PublicConfig::decl(),
        services::services::dashboard::DashboardSummary::decl(),
        services::services::email::PortalEmailRequest::decl(),
        services::services::events::FeedTable::decl(),
        services::services::events::ChangeKind::decl(),
        services::services::events::RecordChange::decl(),
        services::services::portal::PortalView::decl(),
        services::services::profile::Lookup::<()>::decl(),
        services::services::progress::MetricSeries::decl(),
        services::services::workout_builder::WorkoutDraft::decl(),
        services::services::workout_builder::UpdateWorkoutStatus::decl(),
        services::services::workout_builder::ReorderExercises::decl(),
        services::services::workout_completion::WorkoutCompletionRequest::decl(),
        services::services::billing::WebhookOutcome::decl(),
        server::routes::auth::Me::decl(),
        server::routes::messages::SendMessage::decl(),
        server::routes::messages::MarkedRead::decl(),
        server::routes::notifications::ClearedNotifications::decl(),
        server::routes::functions::FunctionResponse::decl(),
    ]
}

fn main() -> anyhow::Result<()> {
    let out = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared/types.ts");
    if let Some(dir) = out.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut contents = String::from(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit.\n\n",
    );
    for decl in declarations() {
        contents.push_str("export ");
        contents.push_str(&decl);
        contents.push_str("\n\n");
    }
    fs::write(&out, contents)?;
    println!("Wrote {}", out.display());
    Ok(())
}
