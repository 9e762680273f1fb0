use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ContentCompletion, QuizPerformance};
use crate::utils::round2;

pub const CONTENT_WEIGHT: f64 = 0.6;
pub const QUIZ_WEIGHT: f64 = 0.4;

/// How content completion and quiz results combine into one progress number.
///
/// Each report picks exactly one strategy:
/// - department and school overviews use [`BlendStrategy::ContentPlusAttemptRate`]
/// - course analytics and student reports use [`BlendStrategy::ContentPlusAverageScore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum BlendStrategy {
    ContentOnly,
    /// quiz part = units attempted / units with quizzes * 100
    ContentPlusAttemptRate,
    /// quiz part = course marks (mean best percentage of attempted units)
    ContentPlusAverageScore,
}

impl BlendStrategy {
    pub fn quiz_progress(self, quiz: &QuizPerformance) -> f64 {
        match self {
            BlendStrategy::ContentOnly => 0.0,
            BlendStrategy::ContentPlusAttemptRate => {
                if quiz.units_with_quizzes == 0 {
                    0.0
                } else {
                    quiz.units_attempted as f64 / quiz.units_with_quizzes as f64 * 100.0
                }
            }
            BlendStrategy::ContentPlusAverageScore => quiz.course_marks,
        }
    }

    pub fn blend(self, content: &ContentCompletion, quiz: &QuizPerformance) -> f64 {
        let content_percent = content.display_percent();
        let value = match self {
            BlendStrategy::ContentOnly => content_percent,
            _ => CONTENT_WEIGHT * content_percent + QUIZ_WEIGHT * self.quiz_progress(quiz),
        };
        round2(value.clamp(0.0, 100.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProgressColor {
    Green,
    Yellow,
    Red,
}

impl ProgressColor {
    pub fn from_percent(value: f64) -> Self {
        if value > 75.0 {
            ProgressColor::Green
        } else if value >= 50.0 {
            ProgressColor::Yellow
        } else {
            ProgressColor::Red
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(percent: f64) -> ContentCompletion {
        ContentCompletion {
            percent,
            ..Default::default()
        }
    }

    fn quiz(attempted: usize, with_quizzes: usize, marks: f64) -> QuizPerformance {
        QuizPerformance {
            units_attempted: attempted,
            units_with_quizzes: with_quizzes,
            course_marks: marks,
            ..Default::default()
        }
    }

    #[test]
    fn color_boundaries() {
        assert_eq!(ProgressColor::from_percent(75.0), ProgressColor::Yellow);
        assert_eq!(ProgressColor::from_percent(75.01), ProgressColor::Green);
        assert_eq!(ProgressColor::from_percent(49.99), ProgressColor::Red);
        assert_eq!(ProgressColor::from_percent(50.0), ProgressColor::Yellow);
        assert_eq!(ProgressColor::from_percent(0.0), ProgressColor::Red);
    }

    #[test]
    fn strategies_differ() {
        let c = content(50.0);
        let q = quiz(1, 4, 90.0);
        assert_eq!(BlendStrategy::ContentOnly.blend(&c, &q), 50.0);
        // 0.6 * 50 + 0.4 * 25
        assert_eq!(BlendStrategy::ContentPlusAttemptRate.blend(&c, &q), 40.0);
        // 0.6 * 50 + 0.4 * 90
        assert_eq!(BlendStrategy::ContentPlusAverageScore.blend(&c, &q), 66.0);
    }

    #[test]
    fn attempt_rate_without_quizzes_is_zero() {
        let q = quiz(0, 0, 0.0);
        assert_eq!(BlendStrategy::ContentPlusAttemptRate.quiz_progress(&q), 0.0);
        assert_eq!(
            BlendStrategy::ContentPlusAttemptRate.blend(&content(100.0), &q),
            60.0
        );
    }

    #[test]
    fn uses_started_percent_when_higher() {
        let c = ContentCompletion {
            percent: 20.0,
            started_percent: 80.0,
            ..Default::default()
        };
        assert_eq!(BlendStrategy::ContentOnly.blend(&c, &quiz(0, 0, 0.0)), 80.0);
    }
}
