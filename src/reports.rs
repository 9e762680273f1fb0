//! Report assembly: reads through [`Store`], runs the pure aggregators and builds the
//! view models the HTTP layer serializes.

pub mod course;
pub mod department;
pub mod page;
pub mod quiz_export;
pub mod school;
pub mod student;

use std::future::Future;

use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::{
    analytics::{BlendStrategy, CourseContent, StudentCourseResult, evaluate},
    config::AnalyticsConfig,
    error::{Error, Result},
    model::{
        Course, Department, Quiz, QuizAttempt, ReadingMaterial, Role, Section, Student,
        StudentProgress, TeacherAssignment, Unit, User, Video,
    },
    scope::{Anchor, Caller, Scope, ScopeInputs, resolve_scope},
    store::Store,
};

/// Maps `f` over `items` with at most `limit` futures in flight, keeping input order.
/// The first error fails the whole map.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Result<Vec<R>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .try_collect()
        .await
}

/// Request scoped context: who is asking and what they may see.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: Caller,
    pub scope: Scope,
    /// courses of the scope
    pub courses: Vec<Course>,
    /// sections of the scope
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Analytics {
    store: Store,
    config: AnalyticsConfig,
}

impl Analytics {
    pub fn new(store: Store, config: AnalyticsConfig) -> Self {
        Self { store, config }
    }

    /// Resolve the scope of `caller` acting as `role`.
    pub async fn context(&self, caller: Caller, role: Role) -> Result<RequestContext> {
        let department = match (role, &caller.department) {
            (Role::Hod, Some(id)) => self.store.get::<Department>(id).await?,
            _ => None,
        };
        let anchor = Anchor::resolve(&caller, role, department.as_ref())?;

        let mut departments = Vec::new();
        let mut assignments = Vec::new();
        let (courses, sections) = match &anchor {
            Anchor::Institution => (
                self.store.all::<Course>().await?,
                self.store.all::<Section>().await?,
            ),
            Anchor::Department { department, school } => (
                self.store.find::<Course>("department", department).await?,
                self.store.find::<Section>("school", school).await?,
            ),
            Anchor::School { school } => {
                departments = self.store.find::<Department>("school", school).await?;
                let ids: Vec<String> = departments.iter().map(|d| d.id.clone()).collect();
                (
                    self.store.find_in::<Course>("department", &ids).await?,
                    self.store.find::<Section>("school", school).await?,
                )
            }
            Anchor::Teacher { teacher } => {
                assignments = self
                    .store
                    .find::<TeacherAssignment>("teacher", teacher)
                    .await?;
                let course_ids: Vec<String> = assignments.iter().map(|a| a.course.clone()).collect();
                let section_ids: Vec<String> =
                    assignments.iter().map(|a| a.section.clone()).collect();
                (
                    self.store.get_many::<Course>(&course_ids).await?,
                    self.store.get_many::<Section>(&section_ids).await?,
                )
            }
        };

        let scope = resolve_scope(
            anchor,
            ScopeInputs {
                courses: &courses,
                sections: &sections,
                departments: &departments,
                assignments: &assignments,
            },
        );
        debug!(
            "scope of {} as {:?}: {} courses, {} sections, {} students",
            caller.id,
            role,
            scope.courses.len(),
            scope.sections.len(),
            scope.students.len()
        );
        let courses = courses
            .into_iter()
            .filter(|c| scope.contains_course(&c.id))
            .collect();
        let sections = sections
            .into_iter()
            .filter(|s| scope.contains_section(&s.id))
            .collect();
        Ok(RequestContext {
            caller,
            scope,
            courses,
            sections,
        })
    }

    pub async fn course_content(&self, course: Course) -> Result<CourseContent> {
        let units = self.store.find::<Unit>("course", &course.id).await?;
        let mut videos = self.store.find::<Video>("course", &course.id).await?;
        // unit lists may reference videos filed under another course id
        let missing: Vec<String> = units
            .iter()
            .flat_map(|u| u.videos.iter())
            .filter(|id| !videos.iter().any(|v| &v.id == *id))
            .cloned()
            .collect();
        videos.extend(self.store.get_many::<Video>(&missing).await?);
        let reading = self
            .store
            .find::<ReadingMaterial>("course", &course.id)
            .await?;
        let quizzes = self.store.find::<Quiz>("course", &course.id).await?;
        Ok(CourseContent::new(course, units, videos, reading, quizzes))
    }

    /// Progress of one student in one course. Reads the progress record and the
    /// student's raw attempts, then runs the pure aggregation.
    ///
    /// An unreadable progress record or attempt list counts as missing, so one broken
    /// document costs that student their progress, not the whole report. Store failures
    /// still fail.
    pub async fn student_result(
        &self,
        content: &CourseContent,
        student: &Student,
        strategy: BlendStrategy,
    ) -> Result<StudentCourseResult> {
        let progress = match self
            .store
            .find_where::<StudentProgress>(&[
                ("student", student.id.as_str()),
                ("course", content.course.id.as_str()),
            ])
            .await
        {
            Ok(records) => records.into_iter().next(),
            Err(Error::Decode(e)) => {
                warn!(
                    "unreadable progress of {} in {}, counted as none: {}",
                    student.id, content.course.id, e
                );
                None
            }
            Err(e) => return Err(e),
        };
        let attempts = match self.store.find::<QuizAttempt>("student", &student.id).await {
            Ok(attempts) => attempts,
            Err(Error::Decode(e)) => {
                warn!(
                    "unreadable quiz attempts of {}, counted as none: {}",
                    student.id, e
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let quiz_ids = content.quiz_ids();
        let attempts: Vec<QuizAttempt> = attempts
            .into_iter()
            .filter(|a| a.course == content.course.id || quiz_ids.contains(a.quiz.as_str()))
            .collect();
        Ok(evaluate(
            content,
            student,
            progress.as_ref(),
            &attempts,
            strategy,
        ))
    }

    pub async fn evaluate_students(
        &self,
        content: &CourseContent,
        students: Vec<Student>,
        strategy: BlendStrategy,
    ) -> Result<Vec<(Student, StudentCourseResult)>> {
        fan_out(students, self.config.fan_out_limit, |student| async move {
            let result = self.student_result(content, &student, strategy).await?;
            Ok((student, result))
        })
        .await
    }

    pub(crate) async fn user_refs(&self, ids: &[String]) -> Result<Vec<NamedRef>> {
        Ok(self
            .store
            .get_many::<User>(ids)
            .await?
            .into_iter()
            .map(|u| NamedRef {
                id: u.id,
                name: u.name,
            })
            .collect())
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fan_out_keeps_order_and_fails_fast() {
        let doubled = fan_out(vec![3u64, 1, 2], 2, |n| async move {
            tokio::time::sleep(std::time::Duration::from_millis(n * 5)).await;
            Ok(n * 2)
        })
        .await
        .unwrap();
        assert_eq!(doubled, [6, 2, 4]);

        let failed = fan_out(vec![1, 2, 3], 0, |n| async move {
            if n == 2 {
                Err(Error::NotFound(format!("student {n}")))
            } else {
                Ok(n)
            }
        })
        .await;
        assert!(matches!(failed, Err(Error::NotFound(_))));
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[70.0, 90.0]), 80.0);
    }
}
