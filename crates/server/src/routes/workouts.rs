//! Workout builder submission and workout lifecycle.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    exercise::Exercise,
    workout::{Workout, WorkoutWithExercises},
};
use deployment::Deployment;
use services::services::workout_builder::{
    ReorderExercises, UpdateWorkoutStatus, WorkoutDraft, WorkoutService,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::CurrentCoach};

pub async fn submit_workout(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Json(draft): Json<WorkoutDraft>,
) -> Result<ResponseJson<ApiResponse<WorkoutWithExercises>>, ApiError> {
    let workout = WorkoutService::submit(&deployment.db().pool, session.coach_id, &draft).await?;
    Ok(ResponseJson(ApiResponse::success(workout)))
}

pub async fn list_client_workouts(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<WorkoutWithExercises>>>, ApiError> {
    let workouts =
        WorkoutService::list_for_client(&deployment.db().pool, session.coach_id, client_id)
            .await?;
    Ok(ResponseJson(ApiResponse::success(workouts)))
}

pub async fn get_workout(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(workout_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<WorkoutWithExercises>>, ApiError> {
    let workout = WorkoutService::get(&deployment.db().pool, session.coach_id, workout_id).await?;
    Ok(ResponseJson(ApiResponse::success(workout)))
}

pub async fn update_workout_status(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(workout_id): Path<Uuid>,
    Json(payload): Json<UpdateWorkoutStatus>,
) -> Result<ResponseJson<ApiResponse<Workout>>, ApiError> {
    let workout = WorkoutService::update_status(
        &deployment.db().pool,
        session.coach_id,
        workout_id,
        payload.status,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(workout)))
}

pub async fn reorder_exercises(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(workout_id): Path<Uuid>,
    Json(payload): Json<ReorderExercises>,
) -> Result<ResponseJson<ApiResponse<Vec<Exercise>>>, ApiError> {
    let exercises = WorkoutService::reorder(
        &deployment.db().pool,
        session.coach_id,
        workout_id,
        &payload.exercise_ids,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(exercises)))
}

pub async fn delete_workout(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(workout_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    WorkoutService::delete(&deployment.db().pool, session.coach_id, workout_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/clients/{client_id}/workouts", get(list_client_workouts))
        .nest(
            "/workouts",
            Router::new()
                .route("/", post(submit_workout))
                .route("/{workout_id}", get(get_workout).delete(delete_workout))
                .route("/{workout_id}/status", put(update_workout_status))
                .route("/{workout_id}/exercises/order", put(reorder_exercises)),
        )
}
