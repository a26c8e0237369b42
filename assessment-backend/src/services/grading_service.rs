use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::session_answer::SessionAnswer;

/// How a submitted option set is judged against a question's correct set.
/// Neither policy gives partial credit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Correct iff the submitted set equals the correct set.
    #[default]
    ExactSet,
    /// Only the first submitted option is looked at.
    FirstOption,
}

impl FromStr for ScoringPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact_set" | "all_or_nothing" => Ok(Self::ExactSet),
            "first_option" | "single_select" => Ok(Self::FirstOption),
            other => Err(format!("unknown scoring policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub answers: Vec<SessionAnswer>,
    pub points_earned: i32,
}

pub struct GradingService;

impl GradingService {
    pub fn is_correct(policy: ScoringPolicy, selected: &[Uuid], correct: &HashSet<Uuid>) -> bool {
        if selected.is_empty() || correct.is_empty() {
            return false;
        }
        match policy {
            ScoringPolicy::FirstOption => correct.contains(&selected[0]),
            ScoringPolicy::ExactSet => {
                let chosen: HashSet<Uuid> = selected.iter().copied().collect();
                chosen == *correct
            }
        }
    }

    /// Scores every generated answer. `submitted` maps question id to the
    /// chosen option ids; a question absent from it counts as unanswered.
    /// Awarded points come from the snapshotted `SessionAnswer::points`.
    pub fn grade(
        policy: ScoringPolicy,
        answers: &[SessionAnswer],
        submitted: &HashMap<Uuid, Vec<Uuid>>,
        correct: &HashMap<Uuid, HashSet<Uuid>>,
    ) -> Result<GradeOutcome> {
        let empty = HashSet::new();
        let mut points_earned: i32 = 0;
        let mut graded = Vec::with_capacity(answers.len());

        for answer in answers {
            let mut selected: Vec<Uuid> = Vec::new();
            for id in submitted.get(&answer.question_id).into_iter().flatten() {
                if !selected.contains(id) {
                    selected.push(*id);
                }
            }

            let correct_set = correct.get(&answer.question_id).unwrap_or(&empty);
            let is_correct = Self::is_correct(policy, &selected, correct_set);
            let earned = if is_correct { answer.points } else { 0 };
            points_earned = points_earned
                .checked_add(earned)
                .ok_or_else(|| Error::BadRequest("earned points exceed the supported range".to_string()))?;

            graded.push(SessionAnswer {
                selected_option_ids: Some(selected),
                is_correct: Some(is_correct),
                points_earned: Some(earned),
                ..answer.clone()
            });
        }

        Ok(GradeOutcome {
            answers: graded,
            points_earned,
        })
    }
}
