// src/quiz/session.rs

//! State transitions of a student's quiz attempt.
//!
//! Every function takes the whole class aggregate, validates first and only
//! then mutates, so a returned error leaves the class untouched.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    error::{
        AppError, QUESTION_ALREADY_ANSWERED, QUESTION_NOT_FOUND, QUIZ_ALREADY_FINISHED,
        QUIZ_ALREADY_STARTED, QUIZ_BANNED, QUIZ_DEADLINE_EXCEEDED,
        QUIZ_NOT_FOUND, UNKNOWN_OPTION,
    },
    models::{
        class::{Answer, Class, QUIZ_COMPLETE, QuizResult, QuizStatus, SubmitAnswerRequest},
        lesson::{Lesson, QuestionType, Quiz, QuizQuestion},
    },
    quiz::scoring::{GradingPolicy, grade},
};

/// Result of a successful answer submission.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub score: f64,
    pub result: QuizResult,
}

fn find_quiz(lesson: &Lesson, quiz_id: Uuid) -> Result<&Quiz, AppError> {
    lesson
        .quiz(quiz_id)
        .ok_or_else(|| AppError::not_found(QUIZ_NOT_FOUND))
}

fn position(results: &[QuizResult], quiz_id: Uuid, user_id: Uuid) -> Option<usize> {
    results
        .iter()
        .position(|r| r.quiz_id == quiz_id && r.user_id == user_id)
}

fn new_result(quiz: &Quiz, user_id: Uuid, now: DateTime<Utc>) -> QuizResult {
    QuizResult {
        quiz_id: quiz.id,
        user_id,
        answers: Vec::new(),
        next_question_index: 0,
        cheat_attempts: 0,
        status: QuizStatus::Started,
        started_at: Some(now),
        deadline_at: quiz.deadline_from(now),
        banned_at: None,
        completed_at: None,
    }
}

/// Gives a result that was materialized without a start time one.
fn backfill_start(result: &mut QuizResult, quiz: &Quiz, now: DateTime<Utc>) {
    result.started_at = Some(now);
    result.status = QuizStatus::Started;
    if result.deadline_at.is_none() {
        result.deadline_at = quiz.deadline_from(now);
    }
}

/// Starts an attempt. Returns `true` when a new result was created.
///
/// A result that already carries a start time cannot be started again.
pub fn start_quiz(
    class: &mut Class,
    quiz_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let quiz = find_quiz(&class.lesson, quiz_id)?;

    let created = match position(&class.quiz_results, quiz_id, user_id) {
        None => {
            class.quiz_results.push(new_result(quiz, user_id, now));
            true
        }
        Some(index) => {
            let result = &mut class.quiz_results[index];
            if result.started_at.is_some() {
                return Err(AppError::conflict(QUIZ_ALREADY_STARTED));
            }
            backfill_start(result, quiz, now);
            false
        }
    };

    class.updated_at = now;
    Ok(created)
}

/// Turns the submitted option strings into the stored answer and its score.
fn evaluate(
    question: &QuizQuestion,
    options: &[String],
    policy: GradingPolicy,
) -> Result<(Vec<String>, f64), AppError> {
    if options.is_empty() {
        return Err(AppError::validation("options_cannot_be_empty"));
    }

    match question.question_type {
        QuestionType::Open => Ok((options.to_vec(), grade(policy, question, &HashSet::new()))),
        QuestionType::Multiple => {
            let mut selected = HashSet::new();
            let mut stored = Vec::with_capacity(options.len());
            for raw in options {
                let id = Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::validation(UNKNOWN_OPTION))?;
                if !question.has_option(id) {
                    return Err(AppError::validation(UNKNOWN_OPTION));
                }
                if selected.insert(id) {
                    stored.push(id.to_string());
                }
            }
            let score = grade(policy, question, &selected);
            Ok((stored, score))
        }
    }
}

/// Records the answer to one question.
///
/// Creates the attempt on first contact. A question can be answered once;
/// answering the last one finishes the attempt.
pub fn submit_answer(
    class: &mut Class,
    quiz_id: Uuid,
    user_id: Uuid,
    submission: &SubmitAnswerRequest,
    policy: GradingPolicy,
    now: DateTime<Utc>,
) -> Result<AnswerOutcome, AppError> {
    let quiz = find_quiz(&class.lesson, quiz_id)?;
    let question = quiz
        .question(submission.question_id)
        .ok_or_else(|| AppError::not_found(QUESTION_NOT_FOUND))?;

    let existing = position(&class.quiz_results, quiz_id, user_id);

    if let Some(index) = existing {
        let result = &class.quiz_results[index];
        if result.is_answered(question.id) {
            return Err(AppError::conflict(QUESTION_ALREADY_ANSWERED));
        }
        match result.status {
            QuizStatus::Banned => return Err(AppError::conflict(QUIZ_BANNED)),
            QuizStatus::Finished => return Err(AppError::conflict(QUIZ_ALREADY_FINISHED)),
            QuizStatus::Pending | QuizStatus::Started => {}
        }
        if result.deadline_at.is_some_and(|deadline| now > deadline) {
            return Err(AppError::conflict(QUIZ_DEADLINE_EXCEEDED));
        }
    }

    let (options, score) = evaluate(question, &submission.options, policy)?;
    let question_count = quiz.questions.len() as i32;

    let index = match existing {
        Some(index) => index,
        None => {
            class.quiz_results.push(new_result(quiz, user_id, now));
            class.quiz_results.len() - 1
        }
    };
    let result = &mut class.quiz_results[index];
    if result.started_at.is_none() {
        backfill_start(result, quiz, now);
    }

    result.answers.push(Answer {
        question_id: question.id,
        options,
        score,
    });

    result.next_question_index += 1;
    if result.next_question_index >= question_count {
        result.next_question_index = QUIZ_COMPLETE;
        result.completed_at = Some(now);
        result.status = QuizStatus::Finished;
        tracing::info!(
            class_id = %class.id,
            %quiz_id,
            %user_id,
            total_score = result.total_score(),
            "Quiz finished"
        );
    }

    let outcome = AnswerOutcome {
        score,
        result: result.clone(),
    };
    class.updated_at = now;
    Ok(outcome)
}

/// Counts one cheat signal. The attempt is banned when the counter reaches
/// the quiz's limit exactly.
pub fn report_cheat(
    class: &mut Class,
    quiz_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<QuizResult, AppError> {
    let quiz = find_quiz(&class.lesson, quiz_id)?;
    let index = position(&class.quiz_results, quiz_id, user_id)
        .ok_or_else(|| AppError::not_found(QUIZ_NOT_FOUND))?;
    let result = &mut class.quiz_results[index];

    // A finished attempt is a closed record.
    if result.status == QuizStatus::Finished {
        return Ok(result.clone());
    }

    result.cheat_attempts += 1;
    if quiz.max_cheat_attempts > 0
        && result.cheat_attempts == quiz.max_cheat_attempts
        && result.status == QuizStatus::Started
    {
        result.status = QuizStatus::Banned;
        result.banned_at = Some(now);
        tracing::info!(
            class_id = %class.id,
            %quiz_id,
            %user_id,
            attempts = result.cheat_attempts,
            "Student banned from quiz"
        );
    }

    let updated = result.clone();
    class.updated_at = now;
    Ok(updated)
}

/// Lets a banned student back in, or clears the cheat counter of a running
/// attempt.
///
/// For timed quizzes that were banned, the time between the ban and now is
/// credited back: the new deadline is
/// `now + duration - (banned_at - started_at) + grace`. A running attempt keeps
/// its deadline. Finished attempts stay finished.
pub fn unban(
    class: &mut Class,
    quiz_id: Uuid,
    user_id: Uuid,
    grace_ms: i64,
    now: DateTime<Utc>,
) -> Result<QuizResult, AppError> {
    let quiz = find_quiz(&class.lesson, quiz_id)?;
    let index = position(&class.quiz_results, quiz_id, user_id)
        .ok_or_else(|| AppError::not_found(QUIZ_NOT_FOUND))?;
    let result = &mut class.quiz_results[index];

    if result.status == QuizStatus::Finished {
        return Err(AppError::conflict(QUIZ_ALREADY_FINISHED));
    }

    result.cheat_attempts = 0;
    result.status = QuizStatus::Started;

    if let (true, Some(banned)) = (quiz.is_timed(), result.banned_at) {
        let spent_ms = result
            .started_at
            .map_or(0, |started| (banned - started).num_milliseconds());
        let remaining_ms = quiz.duration_ms() - spent_ms + grace_ms;
        result.deadline_at = Some(now + Duration::milliseconds(remaining_ms));
    }
    result.banned_at = None;

    tracing::info!(
        class_id = %class.id,
        %quiz_id,
        %user_id,
        deadline_at = ?result.deadline_at,
        "Student unbanned"
    );

    let updated = result.clone();
    class.updated_at = now;
    Ok(updated)
}
