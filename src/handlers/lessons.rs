// src/handlers/lessons.rs

use axum::{
    Json,
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
    error::{AppError, LESSON_NOT_FOUND},
    models::lesson::{CreateLessonRequest, Lesson, Quiz, UpdateLessonRequest, empty_document},
    state::AppState,
    utils::html::plain_text,
};

/// Strips markup from quiz titles. A title with nothing left is rejected.
fn clean_quizzes(quizzes: Vec<Quiz>) -> Result<Vec<Quiz>, AppError> {
    quizzes
        .into_iter()
        .map(|quiz| {
            let title = plain_text(&quiz.title);
            if title.is_empty() {
                return Err(AppError::validation("quiz_title_cannot_be_empty"));
            }
            Ok(Quiz { title, ..quiz })
        })
        .collect()
}

/// Creates a lesson together with its quizzes.
pub async fn create_lesson(
    State(state): State<AppState>,
    payload: Result<Json<CreateLessonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let topic = plain_text(&payload.topic);
    if topic.is_empty() {
        return Err(AppError::validation("topic_cannot_be_empty"));
    }

    let now = state.clock.now();
    let lesson = Lesson {
        id: Uuid::new_v4(),
        topic,
        hours: payload.hours,
        subject_id: payload.subject_id,
        content: payload.content.unwrap_or_else(empty_document),
        quizzes: clean_quizzes(payload.quizzes)?,
        created_at: now,
        updated_at: now,
    };

    state.store.lessons.insert(&lesson).await?;
    tracing::info!("Lesson {} created with {} quizzes", lesson.id, lesson.quizzes.len());

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Full lesson, answer key included.
pub async fn get_lesson(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let lesson = state
        .store
        .lessons
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(LESSON_NOT_FOUND))?;

    Ok(Json(lesson))
}

/// Updates the master lesson. Classes already scheduled keep their snapshot.
pub async fn update_lesson(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateLessonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let Json(payload) = payload?;
    payload.validate()?;

    let mut lesson = state
        .store
        .lessons
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(LESSON_NOT_FOUND))?;

    if let Some(topic) = payload.topic {
        let topic = plain_text(&topic);
        if topic.is_empty() {
            return Err(AppError::validation("topic_cannot_be_empty"));
        }
        lesson.topic = topic;
    }
    if let Some(hours) = payload.hours {
        lesson.hours = hours;
    }
    if let Some(subject_id) = payload.subject_id {
        lesson.subject_id = subject_id;
    }
    if let Some(content) = payload.content {
        lesson.content = content;
    }
    if let Some(quizzes) = payload.quizzes {
        lesson.quizzes = clean_quizzes(quizzes)?;
    }
    lesson.updated_at = state.clock.now();

    state.store.lessons.replace(&lesson).await?;

    Ok(Json(lesson))
}
