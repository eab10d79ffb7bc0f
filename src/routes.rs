// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, classes, lessons, quiz, schedule},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Auth is public.
/// * Lessons and classes are teacher-only (Auth first, then Teacher check).
/// * The schedule and quiz actions need any signed-in user; unban checks the
///   role itself.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let lesson_routes = Router::new()
        .route("/", post(lessons::create_lesson))
        .route("/{id}", get(lessons::get_lesson).put(lessons::update_lesson))
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let class_routes = Router::new()
        .route("/", get(classes::list_classes).post(classes::create_class))
        .route(
            "/{id}",
            get(classes::get_class)
                .put(classes::update_class)
                .delete(classes::delete_class),
        )
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let schedule_routes = Router::new()
        .route("/", get(schedule::list_schedule))
        .route("/{id}", get(schedule::get_scheduled_class))
        .route("/{id}/quiz/{quiz_id}", post(quiz::submit_answer))
        .route("/{id}/quiz/{quiz_id}/start", post(quiz::start_quiz))
        .route("/{id}/quiz/{quiz_id}/cheat", post(quiz::report_cheat))
        .route("/{id}/quiz/{quiz_id}/unban", post(quiz::unban))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/lessons", lesson_routes)
        .nest("/api/classes", class_routes)
        .nest("/api/schedule", schedule_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
