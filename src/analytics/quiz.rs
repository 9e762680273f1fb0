use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use super::CourseContent;
use crate::{
    model::{QuizAttempt, StudentProgress, Unit},
    utils::round2,
};

/// Where a unit's quiz result was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MarkSource {
    Progress,
    Attempts,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitMark {
    pub unit_id: String,
    pub unit_title: String,
    pub order: u32,
    pub total_quizzes: usize,
    /// Highest percentage over every attempt of the unit, `None` when never attempted
    pub best_percentage: Option<f64>,
    pub attempts: usize,
    pub quizzes_taken: usize,
    /// True when any attempt of the unit passed, not only the best one
    pub passed: bool,
    pub source: Option<MarkSource>,
}

impl UnitMark {
    pub fn attempted(&self) -> bool {
        self.best_percentage.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizPerformance {
    pub unit_marks: Vec<UnitMark>,
    /// Mean of best percentages over attempted units only
    pub course_marks: f64,
    pub total_taken: usize,
    pub total_passed: usize,
    pub units_attempted: usize,
    pub units_with_quizzes: usize,
    pub total_quizzes: usize,
}

struct Reduced<'a> {
    best: f64,
    attempts: usize,
    passed: bool,
    quizzes: BTreeSet<&'a str>,
}

/// Best attempt by percentage (first seen wins a tie) and OR over `passed`.
fn reduce<'a>(attempts: impl Iterator<Item = (&'a str, f64, bool)>) -> Option<Reduced<'a>> {
    let mut reduced: Option<Reduced<'a>> = None;
    for (quiz, percentage, passed) in attempts {
        if let Some(r) = reduced.as_mut() {
            if percentage > r.best {
                r.best = percentage;
            }
            r.attempts += 1;
            r.passed |= passed;
            r.quizzes.insert(quiz);
        } else {
            reduced = Some(Reduced {
                best: percentage,
                attempts: 1,
                passed,
                quizzes: BTreeSet::from([quiz]),
            });
        }
    }
    reduced
}

fn unit_mark(
    unit: &Unit,
    total_quizzes: usize,
    reduced: Option<Reduced<'_>>,
    source: MarkSource,
) -> UnitMark {
    UnitMark {
        unit_id: unit.id.clone(),
        unit_title: unit.title.clone(),
        order: unit.order,
        total_quizzes,
        best_percentage: reduced.as_ref().map(|r| round2(r.best)),
        attempts: reduced.as_ref().map_or(0, |r| r.attempts),
        quizzes_taken: reduced.as_ref().map_or(0, |r| r.quizzes.len()),
        passed: reduced.as_ref().is_some_and(|r| r.passed),
        source: reduced.map(|_| source),
    }
}

/// Per-unit quiz marks of one student.
///
/// The progress record is read first. Raw attempts are only scanned for units the
/// progress record has no quiz data for, so an attempt is never counted twice.
/// Attempts on quizzes that belong to no unit of the course are ignored.
pub fn quiz_performance(
    content: &CourseContent,
    progress: Option<&StudentProgress>,
    attempts: &[QuizAttempt],
) -> QuizPerformance {
    let quiz_units = content.quiz_units();
    let mut unit_marks = Vec::with_capacity(content.units.len());
    for unit in &content.units {
        let unit_quizzes = quiz_units.values().filter(|u| **u == unit.id).count();
        let from_progress = reduce(
            progress
                .into_iter()
                .flat_map(|p| p.units.iter())
                .filter(|u| u.unit_id == unit.id)
                .flat_map(|u| u.quiz_attempts.iter())
                .map(|a| (a.quiz.as_str(), a.percentage, a.passed)),
        );
        let mark = match from_progress {
            Some(reduced) => unit_mark(unit, unit_quizzes, Some(reduced), MarkSource::Progress),
            None => {
                let fallback = reduce(
                    attempts
                        .iter()
                        .filter(|a| {
                            quiz_units.get(a.quiz.as_str()) == Some(&unit.id.as_str())
                                || a.unit.as_deref() == Some(unit.id.as_str())
                        })
                        .map(|a| (a.quiz.as_str(), a.percentage, a.passed)),
                );
                unit_mark(unit, unit_quizzes, fallback, MarkSource::Attempts)
            }
        };
        unit_marks.push(mark);
    }

    let attempted: Vec<f64> = unit_marks.iter().filter_map(|m| m.best_percentage).collect();
    let course_marks = if attempted.is_empty() {
        0.0
    } else {
        round2(attempted.iter().sum::<f64>() / attempted.len() as f64)
    };
    QuizPerformance {
        course_marks,
        total_taken: unit_marks.iter().map(|m| m.quizzes_taken).sum(),
        total_passed: unit_marks.iter().filter(|m| m.passed).count(),
        units_attempted: attempted.len(),
        units_with_quizzes: unit_marks
            .iter()
            .filter(|m| m.total_quizzes > 0 || m.attempted())
            .count(),
        total_quizzes: content.total_quizzes(),
        unit_marks,
    }
}
