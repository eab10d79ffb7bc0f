// src/models/class.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::{
        CLASS_SHORT_TITLE_MAX_LENGTH, CLASS_TITLE_MAX_LENGTH, GROUP_MAX_LENGTH,
        QUIZ_ANSWER_MAX_LENGTH,
    },
    models::lesson::{Lesson, PublicLesson},
};

/// Value of `next_question_index` once every question has been answered.
pub const QUIZ_COMPLETE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    #[default]
    Opened,
    Closed,
}

impl ClassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassStatus::Opened => "opened",
            ClassStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opened" => Ok(ClassStatus::Opened),
            "closed" => Ok(ClassStatus::Closed),
            other => Err(format!("unknown class status '{}'", other)),
        }
    }
}

/// A scheduled occurrence of a lesson for a group.
///
/// The lesson is a frozen snapshot taken when the class was scheduled; later
/// edits to the master lesson do not reach it. Quiz results live inside the
/// class, so the class document is the unit of atomicity for quiz actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub id: Uuid,
    pub group: String,
    pub title: String,
    pub short_title: String,
    pub begin_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ClassStatus,
    pub lesson: Lesson,
    #[serde(default)]
    pub quiz_results: Vec<QuizResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Concurrency token. Owned by the store, not part of the document body.
    #[serde(skip)]
    pub version: i64,
}

impl Class {
    pub fn result(&self, quiz_id: Uuid, user_id: Uuid) -> Option<&QuizResult> {
        self.quiz_results
            .iter()
            .find(|r| r.quiz_id == quiz_id && r.user_id == user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    #[default]
    Pending,
    Started,
    Finished,
    Banned,
}

/// One student's progress and grade for one quiz of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub next_question_index: i32,
    #[serde(default)]
    pub cheat_attempts: u32,
    #[serde(default)]
    pub status: QuizStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub banned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizResult {
    pub fn is_answered(&self, question_id: Uuid) -> bool {
        self.answers.iter().any(|a| a.question_id == question_id)
    }

    /// Sum of per-answer scores.
    pub fn total_score(&self) -> f64 {
        self.answers.iter().map(|a| a.score).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: Uuid,
    /// Selected option ids for multiple-choice questions, the answer text for
    /// open ones.
    pub options: Vec<String>,
    pub score: f64,
}

/// DTO for answering one question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    #[validate(length(min = 1), custom(function = validate_answer_options))]
    pub options: Vec<String>,
}

fn validate_answer_options(options: &[String]) -> Result<(), validator::ValidationError> {
    for option in options {
        if option.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_blank"));
        }
        if option.len() as u64 > QUIZ_ANSWER_MAX_LENGTH {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

/// DTO for lifting a student's ban.
#[derive(Debug, Deserialize)]
pub struct UnbanRequest {
    pub user_id: Uuid,
}

/// DTO for scheduling a class.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    pub lesson_id: Uuid,
    pub begin_at: DateTime<Utc>,
    #[validate(length(min = 1, max = GROUP_MAX_LENGTH))]
    pub group: String,
    #[validate(length(min = 1, max = CLASS_TITLE_MAX_LENGTH))]
    pub title: String,
    #[validate(length(min = 1, max = CLASS_SHORT_TITLE_MAX_LENGTH))]
    pub short_title: String,
    #[serde(default)]
    pub status: ClassStatus,
}

/// DTO for editing a class. A `lesson_id` re-snapshots the lesson.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClassRequest {
    pub lesson_id: Option<Uuid>,
    pub begin_at: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = GROUP_MAX_LENGTH))]
    pub group: Option<String>,
    #[validate(length(min = 1, max = CLASS_TITLE_MAX_LENGTH))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = CLASS_SHORT_TITLE_MAX_LENGTH))]
    pub short_title: Option<String>,
    pub status: Option<ClassStatus>,
}

/// Query parameters for listing classes.
#[derive(Debug, Default, Deserialize)]
pub struct ClassListParams {
    /// Case-insensitive substring filters.
    pub title: Option<String>,
    pub short_title: Option<String>,
    pub group: Option<String>,
    pub lesson_id: Option<Uuid>,
    pub status: Option<ClassStatus>,
    /// Only classes beginning at or after this instant.
    pub begin_at: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Query parameters for the schedule.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Pageable<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Class header without lesson or results.
#[derive(Debug, Clone, Serialize)]
pub struct ClassResponse {
    pub id: Uuid,
    pub group: String,
    pub title: String,
    pub short_title: String,
    pub begin_at: DateTime<Utc>,
    pub status: ClassStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Class> for ClassResponse {
    fn from(class: &Class) -> Self {
        ClassResponse {
            id: class.id,
            group: class.group.clone(),
            title: class.title.clone(),
            short_title: class.short_title.clone(),
            begin_at: class.begin_at,
            status: class.status,
            created_at: class.created_at,
            updated_at: class.updated_at,
        }
    }
}

/// Grading and moderation view: every result, every score, the answer key.
#[derive(Debug, Serialize)]
pub struct FullClassResponse {
    #[serde(flatten)]
    pub class: ClassResponse,
    pub lesson: Lesson,
    pub quiz_results: Vec<QuizResult>,
}

impl From<&Class> for FullClassResponse {
    fn from(class: &Class) -> Self {
        FullClassResponse {
            class: ClassResponse::from(class),
            lesson: class.lesson.clone(),
            quiz_results: class.quiz_results.clone(),
        }
    }
}

/// Progress of the requesting student. Scores stay hidden.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentQuizResult {
    pub quiz_id: Uuid,
    pub status: QuizStatus,
    pub next_question_index: i32,
    pub cheat_attempts: u32,
    pub answered_question_ids: Vec<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&QuizResult> for StudentQuizResult {
    fn from(result: &QuizResult) -> Self {
        StudentQuizResult {
            quiz_id: result.quiz_id,
            status: result.status,
            next_question_index: result.next_question_index,
            cheat_attempts: result.cheat_attempts,
            answered_question_ids: result.answers.iter().map(|a| a.question_id).collect(),
            started_at: result.started_at,
            deadline_at: result.deadline_at,
            completed_at: result.completed_at,
        }
    }
}

/// Class as seen by one student: public lesson, own results only.
#[derive(Debug, Serialize)]
pub struct StudentClassResponse {
    #[serde(flatten)]
    pub class: ClassResponse,
    pub lesson: PublicLesson,
    pub quiz_results: Vec<StudentQuizResult>,
}

impl StudentClassResponse {
    pub fn for_user(class: &Class, user_id: Uuid) -> Self {
        StudentClassResponse {
            class: ClassResponse::from(class),
            lesson: PublicLesson::from(&class.lesson),
            quiz_results: class
                .quiz_results
                .iter()
                .filter(|r| r.user_id == user_id)
                .map(StudentQuizResult::from)
                .collect(),
        }
    }
}
