use db::models::{
    client::{Client, CreateClient},
    coach::{Coach, CreateCoach},
};
use sqlx::SqlitePool;
use uuid::Uuid;

pub(crate) async fn seed_coach(pool: &SqlitePool, email: &str) -> Coach {
    Coach::create(
        pool,
        Uuid::new_v4(),
        &CreateCoach {
            email: email.to_string(),
            password_hash: "unused".to_string(),
            full_name: "Casey Coach".to_string(),
        },
    )
    .await
    .unwrap()
}

pub(crate) async fn seed_client(pool: &SqlitePool, coach_id: Uuid, name: &str) -> Client {
    Client::create(
        pool,
        coach_id,
        &CreateClient {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: None,
            status: None,
            goals: None,
            notes: None,
        },
        Uuid::new_v4(),
    )
    .await
    .unwrap()
}
