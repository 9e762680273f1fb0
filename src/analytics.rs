//! Student progress & performance aggregation.
//!
//! Everything in here is pure: callers load a [`CourseContent`] snapshot plus the
//! student's progress record and raw attempts, and get plain numbers back.

pub mod blend;
pub mod content;
pub mod quiz;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use utoipa::ToSchema;

pub use blend::{BlendStrategy, ProgressColor};
pub use content::{ContentCompletion, completion};
pub use quiz::{QuizPerformance, UnitMark, quiz_performance};

use crate::model::{Course, Quiz, QuizAttempt, ReadingMaterial, Student, StudentProgress, Unit, Video};

/// Everything that belongs to one course, read once per request.
#[derive(Debug, Clone)]
pub struct CourseContent {
    pub course: Course,
    /// ordered by `Unit::order`
    pub units: Vec<Unit>,
    pub videos: Vec<Video>,
    pub reading_materials: Vec<ReadingMaterial>,
    pub quizzes: Vec<Quiz>,
}

impl CourseContent {
    pub fn new(
        course: Course,
        mut units: Vec<Unit>,
        videos: Vec<Video>,
        reading_materials: Vec<ReadingMaterial>,
        quizzes: Vec<Quiz>,
    ) -> Self {
        units.sort_by_key(|u| u.order);
        Self {
            course,
            units,
            videos,
            reading_materials,
            quizzes,
        }
    }

    /// Videos attached to the course directly or through one of its units.
    pub fn video_ids(&self) -> BTreeSet<&str> {
        self.videos
            .iter()
            .filter(|v| v.course == self.course.id)
            .map(|v| v.id.as_str())
            .chain(
                self.units
                    .iter()
                    .flat_map(|u| u.videos.iter().map(String::as_str)),
            )
            .collect()
    }

    pub fn approved_reading_ids(&self) -> BTreeSet<&str> {
        self.reading_materials
            .iter()
            .filter(|r| r.course == self.course.id && r.is_countable())
            .map(|r| r.id.as_str())
            .collect()
    }

    pub fn quiz_ids(&self) -> BTreeSet<&str> {
        self.quiz_units().into_keys().collect()
    }

    /// quiz id -> owning unit id
    pub fn quiz_units(&self) -> BTreeMap<&str, &str> {
        let mut map = BTreeMap::new();
        for quiz in &self.quizzes {
            if let Some(unit) = &quiz.unit {
                map.insert(quiz.id.as_str(), unit.as_str());
            }
        }
        // the unit's own list wins over the quiz's back reference
        for unit in &self.units {
            for quiz in &unit.quizzes {
                map.insert(quiz.as_str(), unit.id.as_str());
            }
        }
        map
    }

    pub fn total_quizzes(&self) -> usize {
        self.quizzes
            .iter()
            .map(|q| q.id.as_str())
            .chain(self.quiz_units().into_keys())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// One student's standing in one course.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseResult {
    pub content: ContentCompletion,
    pub quiz: QuizPerformance,
    pub strategy: BlendStrategy,
    pub progress: f64,
    pub progress_color: ProgressColor,
}

/// Runs both aggregators and blends them. A missing progress record is zero progress.
pub fn evaluate(
    content: &CourseContent,
    student: &Student,
    progress: Option<&StudentProgress>,
    attempts: &[QuizAttempt],
    strategy: BlendStrategy,
) -> StudentCourseResult {
    let completion = completion(content, student, progress);
    let quiz = quiz_performance(content, progress, attempts);
    let overall = strategy.blend(&completion, &quiz);
    StudentCourseResult {
        content: completion,
        quiz,
        strategy,
        progress: overall,
        progress_color: ProgressColor::from_percent(overall),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::*;

    pub fn course(id: &str) -> Course {
        Course {
            id: id.into(),
            title: format!("Course {id}"),
            course_code: None,
            department: Some("d1".into()),
            units: vec![],
            coordinators: vec![],
        }
    }

    pub fn unit(id: &str, course: &str, order: u32, videos: &[&str], quizzes: &[&str]) -> Unit {
        Unit {
            id: id.into(),
            course: course.into(),
            title: format!("Unit {id}"),
            order,
            videos: videos.iter().map(|s| s.to_string()).collect(),
            quizzes: quizzes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn video(id: &str, course: &str, unit: Option<&str>) -> Video {
        Video {
            id: id.into(),
            course: course.into(),
            unit: unit.map(Into::into),
            title: id.into(),
            duration: 600.0,
        }
    }

    pub fn reading(id: &str, course: &str, approved: Option<bool>) -> ReadingMaterial {
        ReadingMaterial {
            id: id.into(),
            course: course.into(),
            unit: None,
            title: id.into(),
            is_approved: approved,
            approval_status: None,
        }
    }

    pub fn quiz(id: &str, course: &str, unit: Option<&str>) -> Quiz {
        Quiz {
            id: id.into(),
            course: course.into(),
            unit: unit.map(Into::into),
            title: format!("Quiz {id}"),
            passing_score: 50.0,
            questions: vec![],
        }
    }

    pub fn student(id: &str, history: &[(&str, f64)]) -> Student {
        Student {
            id: id.into(),
            name: format!("Student {id}"),
            registration_no: format!("REG-{id}"),
            school: None,
            department: None,
            sections: vec![],
            watch_history: history
                .iter()
                .map(|(v, t)| WatchEntry {
                    video: v.to_string(),
                    time_spent: *t,
                })
                .collect(),
        }
    }

    pub fn summary(quiz: &str, percentage: f64, passed: bool) -> AttemptSummary {
        AttemptSummary {
            quiz: quiz.into(),
            attempt_id: None,
            score: percentage / 10.0,
            percentage,
            passed,
        }
    }

    pub fn attempt(id: &str, student: &str, quiz: &str, percentage: f64, passed: bool) -> QuizAttempt {
        QuizAttempt {
            id: id.into(),
            student: student.into(),
            quiz: quiz.into(),
            course: "c1".into(),
            unit: None,
            answers: vec![],
            score: percentage / 10.0,
            max_score: 10.0,
            percentage,
            passed,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn progress(student: &str, course: &str, units: Vec<UnitProgress>) -> StudentProgress {
        StudentProgress {
            id: format!("{student}-{course}"),
            student: student.into(),
            course: course.into(),
            units,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::model::{UnitProgress, WatchEntry};

    #[test]
    fn video_ids_cover_course_and_units() {
        let content = CourseContent::new(
            course("c1"),
            vec![unit("u1", "c1", 1, &["v2", "v3"], &[])],
            vec![video("v1", "c1", None), video("v2", "c1", Some("u1"))],
            vec![],
            vec![],
        );
        assert_eq!(
            content.video_ids().into_iter().collect::<Vec<_>>(),
            ["v1", "v2", "v3"]
        );
    }

    #[test]
    fn units_sorted_by_order() {
        let content = CourseContent::new(
            course("c1"),
            vec![unit("u2", "c1", 2, &[], &[]), unit("u1", "c1", 1, &[], &[])],
            vec![],
            vec![],
            vec![],
        );
        assert_eq!(content.units[0].id, "u1");
    }

    #[test]
    fn evaluate_blends_content_and_average_score() {
        let content = CourseContent::new(
            course("c1"),
            vec![unit("u1", "c1", 1, &["v1", "v2"], &["q1"])],
            vec![],
            vec![],
            vec![quiz("q1", "c1", Some("u1"))],
        );
        let progress = progress(
            "s1",
            "c1",
            vec![UnitProgress {
                unit_id: "u1".into(),
                videos_watched: vec![WatchEntry {
                    video: "v1".into(),
                    time_spent: 30.0,
                }],
                reading_materials_completed: vec![],
                quiz_attempts: vec![summary("q1", 80.0, true)],
            }],
        );
        let result = evaluate(
            &content,
            &student("s1", &[]),
            Some(&progress),
            &[],
            BlendStrategy::ContentPlusAverageScore,
        );
        // 0.6 * 50 + 0.4 * 80
        assert_eq!(result.progress, 62.0);
        assert_eq!(result.progress_color, ProgressColor::Yellow);
    }

    #[test]
    fn missing_progress_is_zero() {
        let content = CourseContent::new(
            course("c1"),
            vec![unit("u1", "c1", 1, &["v1"], &["q1"])],
            vec![],
            vec![reading("r1", "c1", None)],
            vec![],
        );
        let result = evaluate(
            &content,
            &student("s1", &[]),
            None,
            &[],
            BlendStrategy::ContentPlusAttemptRate,
        );
        assert_eq!(result.progress, 0.0);
        assert_eq!(result.progress_color, ProgressColor::Red);
        assert_eq!(result.content.total_content, 2);
    }
}
