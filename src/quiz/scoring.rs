// src/quiz/scoring.rs

use std::{collections::HashSet, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::lesson::{QuestionType, QuizQuestion};

/// How multiple-choice answers are graded. Chosen once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingPolicy {
    /// 1.0 for the exact set of correct options, 0.0 otherwise.
    Binary,
    /// Jaccard index of selected vs. correct options.
    #[default]
    PartialCredit,
}

impl FromStr for GradingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "binary" => Ok(GradingPolicy::Binary),
            "partial_credit" | "partial" => Ok(GradingPolicy::PartialCredit),
            other => Err(format!("unknown grading policy '{}'", other)),
        }
    }
}

/// Scores one answer in `[0.0, 1.0]`.
///
/// Open questions are not auto-graded and always score 0.
pub fn grade(policy: GradingPolicy, question: &QuizQuestion, selected: &HashSet<Uuid>) -> f64 {
    match question.question_type {
        QuestionType::Open => 0.0,
        QuestionType::Multiple => {
            let correct = question.correct_option_ids();
            match policy {
                GradingPolicy::Binary => {
                    if *selected == correct { 1.0 } else { 0.0 }
                }
                GradingPolicy::PartialCredit => jaccard(selected, &correct),
            }
        }
    }
}

fn jaccard(a: &HashSet<Uuid>, b: &HashSet<Uuid>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lesson::QuizQuestionOption;
    use serde_json::json;

    /// Builds a multiple-choice question with `correct` correct options
    /// followed by `wrong` wrong ones.
    fn question(correct: usize, wrong: usize) -> QuizQuestion {
        let options = (0..correct + wrong)
            .map(|i| QuizQuestionOption {
                id: Uuid::new_v4(),
                text: json!({}),
                is_correct: i < correct,
            })
            .collect();
        QuizQuestion {
            id: Uuid::new_v4(),
            question_type: QuestionType::Multiple,
            prompt: json!({}),
            options,
        }
    }

    fn pick(q: &QuizQuestion, indices: &[usize]) -> HashSet<Uuid> {
        indices.iter().map(|&i| q.options[i].id).collect()
    }

    #[test]
    fn exact_match_scores_full_marks() {
        let q = question(2, 2);
        let selected = pick(&q, &[0, 1]);
        assert_eq!(grade(GradingPolicy::PartialCredit, &q, &selected), 1.0);
        assert_eq!(grade(GradingPolicy::Binary, &q, &selected), 1.0);
    }

    #[test]
    fn disjoint_selection_scores_zero() {
        let q = question(1, 2);
        let selected = pick(&q, &[1, 2]);
        assert_eq!(grade(GradingPolicy::PartialCredit, &q, &selected), 0.0);
        assert_eq!(grade(GradingPolicy::Binary, &q, &selected), 0.0);
    }

    #[test]
    fn subset_earns_partial_credit() {
        // 1 of 2 correct options picked: |{a}| / |{a, b}|
        let q = question(2, 1);
        let selected = pick(&q, &[0]);
        assert_eq!(grade(GradingPolicy::PartialCredit, &q, &selected), 0.5);
        assert_eq!(grade(GradingPolicy::Binary, &q, &selected), 0.0);
    }

    #[test]
    fn superset_is_penalised() {
        // a correct, b wrong: |{a}| / |{a, b}|
        let q = question(1, 1);
        let selected = pick(&q, &[0, 1]);
        assert_eq!(grade(GradingPolicy::PartialCredit, &q, &selected), 0.5);
        assert_eq!(grade(GradingPolicy::Binary, &q, &selected), 0.0);
    }

    #[test]
    fn open_questions_are_left_for_manual_grading() {
        let mut q = question(1, 0);
        q.question_type = QuestionType::Open;
        let selected = pick(&q, &[0]);
        assert_eq!(grade(GradingPolicy::PartialCredit, &q, &selected), 0.0);
    }

    #[test]
    fn policy_from_config_string() {
        assert_eq!("binary".parse::<GradingPolicy>().unwrap(), GradingPolicy::Binary);
        assert_eq!(
            "partial_credit".parse::<GradingPolicy>().unwrap(),
            GradingPolicy::PartialCredit
        );
        assert!("lenient".parse::<GradingPolicy>().is_err());
    }
}
