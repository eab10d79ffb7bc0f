// tests/postgres_store.rs

//! Runs against a real PostgreSQL when `DATABASE_URL` is set; every test
//! returns early otherwise.

use chrono::{Duration, TimeZone, Utc};
use classroom::{
    error::AppError,
    models::{
        class::{Class, ClassStatus, QuizStatus, SubmitAnswerRequest},
        lesson::{Lesson, QuestionType, Quiz, QuizQuestion, QuizQuestionOption, empty_document},
    },
    quiz::{scoring::GradingPolicy, session},
    store::{ClassStore, PgStore},
};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

/// Connects and migrates, or `None` when no database is configured.
async fn connect() -> Option<PgStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL store test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(PgStore::new(pool))
}

fn class_with_quiz() -> (Class, Uuid) {
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let quiz = Quiz {
        id: Uuid::new_v4(),
        title: "Refraction check".to_string(),
        duration: 60,
        max_cheat_attempts: 2,
        questions: vec![QuizQuestion {
            id: Uuid::new_v4(),
            question_type: QuestionType::Multiple,
            prompt: json!({ "type": "doc" }),
            options: vec![QuizQuestionOption {
                id: Uuid::new_v4(),
                text: json!("right"),
                is_correct: true,
            }],
        }],
    };
    let quiz_id = quiz.id;

    let class = Class {
        id: Uuid::new_v4(),
        group: "10A".to_string(),
        title: "Optics".to_string(),
        short_title: "OPT".to_string(),
        begin_at: now,
        status: ClassStatus::Opened,
        lesson: Lesson {
            id: Uuid::new_v4(),
            topic: "Optics".to_string(),
            hours: 1.0,
            subject_id: "physics".to_string(),
            content: empty_document(),
            quizzes: vec![quiz],
            created_at: now,
            updated_at: now,
        },
        quiz_results: Vec::new(),
        created_at: now,
        updated_at: now,
        version: 0,
    };
    (class, quiz_id)
}

#[tokio::test]
async fn update_bumps_version_and_persists_the_document() {
    let Some(store) = connect().await else { return };
    let (class, quiz_id) = class_with_quiz();
    store.insert(&class).await.unwrap();

    let student = Uuid::new_v4();
    let start = class.begin_at;
    let updated = store
        .update(class.id, &mut |c: &mut Class| {
            session::start_quiz(c, quiz_id, student, start).map(|_| ())
        })
        .await
        .unwrap();
    assert_eq!(updated.version, 1);

    let stored = store.find_by_id(class.id).await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.result(quiz_id, student).unwrap().status, QuizStatus::Started);
}

#[tokio::test]
async fn failed_mutation_writes_nothing() {
    let Some(store) = connect().await else { return };
    let (class, quiz_id) = class_with_quiz();
    store.insert(&class).await.unwrap();

    // Cheating without an attempt is rejected after the row was locked.
    let at = class.begin_at;
    let err = store
        .update(class.id, &mut |c: &mut Class| {
            c.title = "half-done".to_string();
            session::report_cheat(c, quiz_id, Uuid::new_v4(), at).map(|_| ())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let stored = store.find_by_id(class.id).await.unwrap().unwrap();
    assert_eq!(stored.version, 0);
    assert_eq!(stored, class);
}

#[tokio::test]
async fn update_of_missing_class_is_not_found() {
    let Some(store) = connect().await else { return };
    let err = store
        .update(Uuid::new_v4(), &mut |_: &mut Class| Ok(()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn concurrent_students_both_persist() {
    let Some(store) = connect().await else { return };
    let (class, quiz_id) = class_with_quiz();
    store.insert(&class).await.unwrap();

    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let start = class.begin_at + Duration::seconds(1);

    let mut start_alice = |c: &mut Class| session::start_quiz(c, quiz_id, alice, start).map(|_| ());
    let mut start_bob = |c: &mut Class| session::start_quiz(c, quiz_id, bob, start).map(|_| ());
    let (a, b) = tokio::join!(
        store.update(class.id, &mut start_alice),
        store.update(class.id, &mut start_bob),
    );
    a.unwrap();
    b.unwrap();

    let stored = store.find_by_id(class.id).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.quiz_results.len(), 2);
    assert!(stored.result(quiz_id, alice).is_some());
    assert!(stored.result(quiz_id, bob).is_some());
}

#[tokio::test]
async fn concurrent_duplicate_answer_has_one_winner() {
    let Some(store) = connect().await else { return };
    let (class, quiz_id) = class_with_quiz();
    store.insert(&class).await.unwrap();

    let student = Uuid::new_v4();
    let question = &class.lesson.quizzes[0].questions[0];
    let submission = SubmitAnswerRequest {
        question_id: question.id,
        options: vec![question.options[0].id.to_string()],
    };
    let policy = GradingPolicy::default();
    let at = class.begin_at;

    let mut submit_first = |c: &mut Class| {
        session::submit_answer(c, quiz_id, student, &submission, policy, at).map(|_| ())
    };
    let mut submit_second = |c: &mut Class| {
        session::submit_answer(c, quiz_id, student, &submission, policy, at).map(|_| ())
    };
    let (a, b) = tokio::join!(
        store.update(class.id, &mut submit_first),
        store.update(class.id, &mut submit_second),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(AppError::Conflict(code)) if code == "question_already_answered"
    )));

    let stored = store.find_by_id(class.id).await.unwrap().unwrap();
    assert_eq!(stored.result(quiz_id, student).unwrap().answers.len(), 1);
}
