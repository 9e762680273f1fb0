use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{Analytics, RequestContext, mean, page::sort_by_name};
use crate::{
    analytics::{BlendStrategy, ContentCompletion, ProgressColor, QuizPerformance},
    error::{Error, Result},
    model::{Course, Section, Student},
    utils::{format_watch_time, round2},
};

pub const STUDENT_BLEND: BlendStrategy = BlendStrategy::ContentPlusAverageScore;

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentReportQuery {
    /// Registration number of the student
    #[serde(rename = "regNo")]
    pub reg_no: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub id: String,
    pub name: String,
    pub registration_no: String,
    pub school: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseReport {
    pub course_id: String,
    pub course_title: String,
    pub course_code: Option<String>,
    pub watch_time_formatted: String,
    pub content: ContentCompletion,
    pub quiz: QuizPerformance,
    pub progress: f64,
    pub progress_color: ProgressColor,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: StudentInfo,
    pub total_courses: usize,
    pub overall_progress: f64,
    pub progress_color: ProgressColor,
    pub courses: Vec<StudentCourseReport>,
}

impl Analytics {
    /// Every course the student is enrolled in through a section, with progress.
    pub async fn student_report(
        &self,
        ctx: &RequestContext,
        query: &StudentReportQuery,
    ) -> Result<StudentReport> {
        let reg_no = query
            .reg_no
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| Error::Validation("regNo is required".to_string()))?;
        let student = self
            .store
            .find_one::<Student>("registrationNo", reg_no)
            .await?
            .ok_or_else(|| Error::NotFound(format!("student with registration number {reg_no}")))?;
        if !ctx.scope.contains_student(&student.id) {
            return Err(Error::Forbidden(format!(
                "student {reg_no} is outside your scope"
            )));
        }

        let mut sections = self
            .store
            .find_containing::<Section>("students", &student.id)
            .await?;
        let known: BTreeSet<String> = sections.iter().map(|s| s.id.clone()).collect();
        let listed: Vec<String> = student
            .sections
            .iter()
            .filter(|id| !known.contains(*id))
            .cloned()
            .collect();
        sections.extend(self.store.get_many::<Section>(&listed).await?);

        let course_ids: Vec<String> = sections
            .iter()
            .flat_map(|s| s.courses.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut courses: Vec<Course> = self
            .store
            .get_many::<Course>(&course_ids)
            .await?
            .into_iter()
            .filter(|c| ctx.scope.contains_course(&c.id))
            .collect();
        sort_by_name(&mut courses, |c| &c.title);

        let mut reports = Vec::with_capacity(courses.len());
        for course in courses {
            let content = self.course_content(course).await?;
            let result = self.student_result(&content, &student, STUDENT_BLEND).await?;
            reports.push(StudentCourseReport {
                course_id: content.course.id.clone(),
                course_title: content.course.title.clone(),
                course_code: content.course.course_code.clone(),
                watch_time_formatted: format_watch_time(result.content.watch_time_seconds),
                content: result.content,
                quiz: result.quiz,
                progress: result.progress,
                progress_color: result.progress_color,
            });
        }
        let progress: Vec<f64> = reports.iter().map(|r| r.progress).collect();
        let overall_progress = round2(mean(&progress));
        info!(
            "student report {} for {}: {} courses",
            student.registration_no,
            ctx.caller.id,
            reports.len()
        );

        Ok(StudentReport {
            student: StudentInfo {
                id: student.id,
                name: student.name,
                registration_no: student.registration_no,
                school: student.school,
                department: student.department,
            },
            total_courses: reports.len(),
            overall_progress,
            progress_color: ProgressColor::from_percent(overall_progress),
            courses: reports,
        })
    }
}
