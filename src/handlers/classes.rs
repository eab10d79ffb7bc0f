// src/handlers/classes.rs

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    error::{AppError, CLASS_NOT_FOUND, LESSON_NOT_FOUND},
    models::{
        class::{
            Class, ClassListParams, ClassResponse, CreateClassRequest, FullClassResponse,
            Pageable, UpdateClassRequest,
        },
        lesson::Lesson,
    },
    state::AppState,
    store::ClassFilter,
    utils::html::plain_text,
};

/// Cleans a plain-text field and rejects it when nothing is left.
fn required_text(value: &str, field: &str) -> Result<String, AppError> {
    let cleaned = plain_text(value);
    if cleaned.is_empty() {
        return Err(AppError::Validation(format!("{}_cannot_be_empty", field)));
    }
    Ok(cleaned)
}

async fn load_lesson(state: &AppState, lesson_id: Uuid) -> Result<Lesson, AppError> {
    state
        .store
        .lessons
        .find_by_id(lesson_id)
        .await?
        .ok_or_else(|| AppError::not_found(LESSON_NOT_FOUND))
}

/// Lists classes, newest first.
///
/// Text filters are case-insensitive substring matches. `page` starts at 1.
pub async fn list_classes(
    State(state): State<AppState>,
    params: Result<Query<ClassListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let filter = ClassFilter {
        title: params.title,
        short_title: params.short_title,
        group: params.group,
        lesson_id: params.lesson_id,
        status: params.status,
        begin_from: params.begin_at,
        offset: (page - 1) * limit,
        limit,
    };

    let (classes, total) = state.store.classes.list(&filter).await?;

    Ok(Json(Pageable {
        items: classes.iter().map(ClassResponse::from).collect(),
        total,
        page,
        limit,
    }))
}

/// Schedules a class. The lesson is copied into the class as it is right now.
pub async fn create_class(
    State(state): State<AppState>,
    payload: Result<Json<CreateClassRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let lesson = load_lesson(&state, payload.lesson_id).await?;
    let now = state.clock.now();

    let class = Class {
        id: Uuid::new_v4(),
        group: required_text(&payload.group, "group")?,
        title: required_text(&payload.title, "title")?,
        short_title: required_text(&payload.short_title, "short_title")?,
        begin_at: payload.begin_at,
        status: payload.status,
        lesson,
        quiz_results: Vec::new(),
        created_at: now,
        updated_at: now,
        version: 0,
    };

    state.store.classes.insert(&class).await?;
    tracing::info!("Class {} scheduled for group {}", class.id, class.group);

    Ok((StatusCode::CREATED, Json(FullClassResponse::from(&class))))
}

/// Grading view: full lesson with the answer key and every student's results.
pub async fn get_class(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let class = state
        .store
        .classes
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(CLASS_NOT_FOUND))?;

    Ok(Json(FullClassResponse::from(&class)))
}

/// Edits class metadata. Passing `lesson_id` replaces the lesson snapshot;
/// recorded quiz results are kept.
pub async fn update_class(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateClassRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let Json(payload) = payload?;
    payload.validate()?;

    let lesson = match payload.lesson_id {
        Some(lesson_id) => Some(load_lesson(&state, lesson_id).await?),
        None => None,
    };
    let group = payload.group.as_deref().map(|g| required_text(g, "group")).transpose()?;
    let title = payload.title.as_deref().map(|t| required_text(t, "title")).transpose()?;
    let short_title = payload
        .short_title
        .as_deref()
        .map(|t| required_text(t, "short_title"))
        .transpose()?;
    let now = state.clock.now();

    let class = state
        .store
        .classes
        .update(id, &mut |class: &mut Class| {
            if let Some(lesson) = &lesson {
                class.lesson = lesson.clone();
            }
            if let Some(group) = &group {
                class.group = group.clone();
            }
            if let Some(title) = &title {
                class.title = title.clone();
            }
            if let Some(short_title) = &short_title {
                class.short_title = short_title.clone();
            }
            if let Some(begin_at) = payload.begin_at {
                class.begin_at = begin_at;
            }
            if let Some(status) = payload.status {
                class.status = status;
            }
            class.updated_at = now;
            Ok(())
        })
        .await?;

    Ok(Json(FullClassResponse::from(&class)))
}

pub async fn delete_class(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    if !state.store.classes.delete(id).await? {
        return Err(AppError::not_found(CLASS_NOT_FOUND));
    }
    tracing::info!("Class {} deleted", id);

    Ok(StatusCode::NO_CONTENT)
}
