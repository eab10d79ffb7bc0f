// src/models/lesson.rs

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::config::{
    LESSON_TOPIC_MAX_LENGTH, LESSON_TOPIC_MIN_LENGTH, QUIZ_TITLE_MAX_LENGTH, QUIZ_TITLE_MIN_LENGTH,
};

/// A reusable content unit: rich-text material plus zero or more quizzes.
///
/// Stored as a JSON document in the 'lessons' table and copied verbatim into
/// every class scheduled from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub topic: String,
    pub hours: f32,
    pub subject_id: String,

    /// Editor document. Never inspected by the backend.
    #[serde(default = "empty_document")]
    pub content: Value,

    #[serde(default)]
    pub quizzes: Vec<Quiz>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    pub fn quiz(&self, quiz_id: Uuid) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id == quiz_id)
    }
}

/// Blank editor document used when a lesson is created without content.
pub fn empty_document() -> Value {
    json!({
        "type": "doc",
        "content": [
            { "type": "paragraph", "content": [{ "type": "text", "text": "" }] }
        ]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Pick one or more of the listed options. Auto-graded.
    Multiple,
    /// Free-text answer. Recorded with a zero score for manual grading.
    Open,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Quiz {
    pub id: Uuid,

    #[validate(length(min = QUIZ_TITLE_MIN_LENGTH, max = QUIZ_TITLE_MAX_LENGTH))]
    pub title: String,

    /// Time limit in seconds, 0 means untimed.
    #[serde(default)]
    pub duration: u32,

    /// Cheat signals tolerated before a ban, 0 means unlimited.
    #[serde(default)]
    pub max_cheat_attempts: u32,

    #[serde(default)]
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    pub fn question(&self, question_id: Uuid) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn is_timed(&self) -> bool {
        self.duration > 0
    }

    pub fn duration_ms(&self) -> i64 {
        i64::from(self.duration) * 1000
    }

    /// Deadline for an attempt started at `started_at`, if the quiz is timed.
    pub fn deadline_from(&self, started_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.is_timed()
            .then(|| started_at + Duration::milliseconds(self.duration_ms()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub prompt: Value,

    #[serde(default)]
    pub options: Vec<QuizQuestionOption>,
}

impl QuizQuestion {
    pub fn correct_option_ids(&self) -> HashSet<Uuid> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect()
    }

    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestionOption {
    pub id: Uuid,
    pub text: Value,
    #[serde(default)]
    pub is_correct: bool,
}

fn validate_questions(questions: &[QuizQuestion]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    for question in questions {
        if !seen.insert(question.id) {
            return Err(validator::ValidationError::new("duplicate_question_id"));
        }
        if question.question_type == QuestionType::Multiple && question.options.is_empty() {
            return Err(validator::ValidationError::new("options_cannot_be_empty"));
        }
        let mut option_ids = HashSet::new();
        if !question.options.iter().all(|o| option_ids.insert(o.id)) {
            return Err(validator::ValidationError::new("duplicate_option_id"));
        }
    }
    Ok(())
}

fn validate_quizzes(quizzes: &[Quiz]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    if quizzes.iter().all(|q| seen.insert(q.id)) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("duplicate_quiz_id"))
    }
}

/// DTO for creating a lesson.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = LESSON_TOPIC_MIN_LENGTH, max = LESSON_TOPIC_MAX_LENGTH))]
    pub topic: String,
    #[validate(range(exclusive_min = 0.0))]
    pub hours: f32,
    #[validate(length(min = 1, max = 64))]
    pub subject_id: String,
    pub content: Option<Value>,
    #[serde(default)]
    #[validate(nested, custom(function = validate_quizzes))]
    pub quizzes: Vec<Quiz>,
}

/// DTO for updating a lesson. Absent fields are left untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLessonRequest {
    #[validate(length(min = LESSON_TOPIC_MIN_LENGTH, max = LESSON_TOPIC_MAX_LENGTH))]
    pub topic: Option<String>,
    #[validate(range(exclusive_min = 0.0))]
    pub hours: Option<f32>,
    #[validate(length(min = 1, max = 64))]
    pub subject_id: Option<String>,
    pub content: Option<Value>,
    #[validate(nested, custom(function = validate_quizzes))]
    pub quizzes: Option<Vec<Quiz>>,
}

/// Lesson as shown to whoever is answering its quizzes: no answer key.
#[derive(Debug, Clone, Serialize)]
pub struct PublicLesson {
    pub id: Uuid,
    pub topic: String,
    pub hours: f32,
    pub subject_id: String,
    pub content: Value,
    pub quizzes: Vec<PublicQuiz>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicQuiz {
    pub id: Uuid,
    pub title: String,
    pub duration: u32,
    pub max_cheat_attempts: u32,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: Value,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicOption {
    pub id: Uuid,
    pub text: Value,
}

impl From<&Lesson> for PublicLesson {
    fn from(lesson: &Lesson) -> Self {
        PublicLesson {
            id: lesson.id,
            topic: lesson.topic.clone(),
            hours: lesson.hours,
            subject_id: lesson.subject_id.clone(),
            content: lesson.content.clone(),
            quizzes: lesson.quizzes.iter().map(PublicQuiz::from).collect(),
        }
    }
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        PublicQuiz {
            id: quiz.id,
            title: quiz.title.clone(),
            duration: quiz.duration,
            max_cheat_attempts: quiz.max_cheat_attempts,
            questions: quiz
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    id: q.id,
                    question_type: q.question_type,
                    prompt: q.prompt.clone(),
                    options: q
                        .options
                        .iter()
                        .map(|o| PublicOption {
                            id: o.id,
                            text: o.text.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(is_correct: bool) -> QuizQuestionOption {
        QuizQuestionOption {
            id: Uuid::new_v4(),
            text: json!({"type": "doc"}),
            is_correct,
        }
    }

    fn quiz_with(questions: Vec<QuizQuestion>) -> Quiz {
        Quiz {
            id: Uuid::new_v4(),
            title: "Quiz".to_string(),
            duration: 0,
            max_cheat_attempts: 0,
            questions,
        }
    }

    #[test]
    fn deadline_only_for_timed_quizzes() {
        let now = Utc::now();
        let mut quiz = quiz_with(vec![]);
        assert_eq!(quiz.deadline_from(now), None);

        quiz.duration = 90;
        assert_eq!(quiz.deadline_from(now), Some(now + Duration::seconds(90)));
    }

    #[test]
    fn multiple_choice_question_needs_options() {
        let quiz = quiz_with(vec![QuizQuestion {
            id: Uuid::new_v4(),
            question_type: QuestionType::Multiple,
            prompt: json!({}),
            options: vec![],
        }]);
        assert!(quiz.validate().is_err());
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        let id = Uuid::new_v4();
        let question = QuizQuestion {
            id,
            question_type: QuestionType::Open,
            prompt: json!({}),
            options: vec![],
        };
        let quiz = quiz_with(vec![question.clone(), question]);
        assert!(quiz.validate().is_err());
    }

    #[test]
    fn public_projection_drops_answer_key() {
        let lesson = Lesson {
            id: Uuid::new_v4(),
            topic: "Fractions".to_string(),
            hours: 2.0,
            subject_id: "math".to_string(),
            content: empty_document(),
            quizzes: vec![quiz_with(vec![QuizQuestion {
                id: Uuid::new_v4(),
                question_type: QuestionType::Multiple,
                prompt: json!({}),
                options: vec![option(true), option(false)],
            }])],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let public = serde_json::to_string(&PublicLesson::from(&lesson)).unwrap();
        assert!(!public.contains("is_correct"));
        assert!(serde_json::to_string(&lesson).unwrap().contains("is_correct"));
    }
}
