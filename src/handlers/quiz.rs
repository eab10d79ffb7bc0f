// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, CLASS_NOT_FOUND, QUIZ_NOT_FOUND},
    models::{
        class::{Class, StudentQuizResult, SubmitAnswerRequest, UnbanRequest},
        user::Role,
    },
    quiz::session,
    state::AppState,
    utils::jwt::Principal,
};

/// Runs one quiz action against the class as a single atomic update.
///
/// Classes the caller cannot see are reported as missing.
async fn update_visible_class(
    state: &AppState,
    class_id: Uuid,
    principal: &Principal,
    mut action: impl FnMut(&mut Class) -> Result<(), AppError> + Send,
) -> Result<Class, AppError> {
    state
        .store
        .classes
        .update(class_id, &mut |class: &mut Class| {
            if !principal.can_view(class) {
                return Err(AppError::not_found(CLASS_NOT_FOUND));
            }
            action(class)
        })
        .await
}

fn student_result(class: &Class, quiz_id: Uuid, user_id: Uuid) -> Result<StudentQuizResult, AppError> {
    class
        .result(quiz_id, user_id)
        .map(StudentQuizResult::from)
        .ok_or_else(|| AppError::not_found(QUIZ_NOT_FOUND))
}

/// Starts the caller's attempt. 201 when a new attempt was opened, 200 when
/// an attempt without a start time was resumed.
pub async fn start_quiz(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path((class_id, quiz_id)) = path?;
    let now = state.clock.now();
    let mut created = false;

    let class = update_visible_class(&state, class_id, &principal, |class| {
        created = session::start_quiz(class, quiz_id, principal.id, now)?;
        Ok(())
    })
    .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(student_result(&class, quiz_id, principal.id)?)))
}

/// Answers one question of the caller's attempt.
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<SubmitAnswerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path((class_id, quiz_id)) = path?;
    let Json(payload) = payload?;
    payload.validate()?;

    let now = state.clock.now();
    let policy = state.config.grading_policy;

    let class = update_visible_class(&state, class_id, &principal, |class| {
        session::submit_answer(class, quiz_id, principal.id, &payload, policy, now).map(|_| ())
    })
    .await?;

    Ok(Json(student_result(&class, quiz_id, principal.id)?))
}

/// Records a cheat signal (tab switch, focus loss) for the caller's attempt.
pub async fn report_cheat(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path((class_id, quiz_id)) = path?;
    let now = state.clock.now();

    let class = update_visible_class(&state, class_id, &principal, |class| {
        session::report_cheat(class, quiz_id, principal.id, now).map(|_| ())
    })
    .await?;

    Ok(Json(student_result(&class, quiz_id, principal.id)?))
}

/// Lifts a student's ban. Teachers and admins only.
pub async fn unban(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<UnbanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path((class_id, quiz_id)) = path?;
    principal.require(Role::Teacher)?;
    let Json(payload) = payload?;

    let now = state.clock.now();
    let grace_ms = state.config.unban_grace_ms;

    update_visible_class(&state, class_id, &principal, |class| {
        session::unban(class, quiz_id, payload.user_id, grace_ms, now).map(|_| ())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
