// src/handlers/schedule.rs

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::{AppError, CLASS_NOT_FOUND},
    models::{
        class::{ClassResponse, ScheduleParams, StudentClassResponse},
        user::Role,
    },
    state::AppState,
    store::ScheduleFilter,
    utils::jwt::Principal,
};

/// Classes of the caller's group(s), earliest first.
///
/// Admins get every group. A user without a group gets an empty schedule.
pub async fn list_schedule(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<ScheduleParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let groups = match principal.role {
        Role::Admin => None,
        _ => Some(principal.groups()),
    };

    let filter = ScheduleFilter {
        groups,
        from: params.from,
        to: params.to,
    };

    let classes = state.store.classes.schedule(&filter).await?;
    let visible: Vec<ClassResponse> = classes
        .iter()
        .filter(|class| principal.can_view(class))
        .map(ClassResponse::from)
        .collect();

    Ok(Json(visible))
}

/// One class as the caller sees it: no answer key, only the caller's results.
pub async fn get_scheduled_class(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = path?;
    let class = state
        .store
        .classes
        .find_by_id(id)
        .await?
        .filter(|class| principal.can_view(class))
        .ok_or_else(|| AppError::not_found(CLASS_NOT_FOUND))?;

    Ok(Json(StudentClassResponse::for_user(&class, principal.id)))
}
