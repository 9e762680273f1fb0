use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{
    Analytics, NamedRef, RequestContext,
    page::{PageRequest, Pagination, paginate, sort_by_name},
};
use crate::{
    analytics::{BlendStrategy, ProgressColor, UnitMark},
    error::{Error, Result},
    model::{Course, Section, Student},
    utils::format_watch_time,
};

/// Course analytics blend quiz results in as the average best score.
pub const COURSE_BLEND: BlendStrategy = BlendStrategy::ContentPlusAverageScore;

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CourseAnalyticsQuery {
    pub course_id: Option<String>,
    /// Restrict to one section of the course
    pub section_id: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseInfo {
    pub id: String,
    pub title: String,
    pub course_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitInfo {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub total_videos: usize,
    pub total_quizzes: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub student_id: String,
    pub student_name: String,
    pub registration_no: String,
    /// seconds
    pub watch_time: f64,
    pub watch_time_formatted: String,
    pub content_progress: f64,
    pub progress: f64,
    pub progress_color: ProgressColor,
    pub unit_marks: Vec<UnitMark>,
    pub course_marks: f64,
    pub total_quizzes_taken: usize,
    pub total_quizzes: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseAnalytics {
    pub course: CourseInfo,
    pub sections: Vec<NamedRef>,
    pub units: Vec<UnitInfo>,
    pub total_students: usize,
    pub blend: BlendStrategy,
    pub students: Vec<StudentRow>,
    pub pagination: Pagination,
}

impl Analytics {
    pub async fn course_analytics(
        &self,
        ctx: &RequestContext,
        query: &CourseAnalyticsQuery,
    ) -> Result<CourseAnalytics> {
        let course_id = query
            .course_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::Validation("courseId is required".to_string()))?;
        let page = PageRequest::new(query.page, query.limit, &self.config)?;

        let course = self
            .store
            .get::<Course>(course_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("course {course_id}")))?;
        if !ctx.scope.contains_course(&course.id) {
            return Err(Error::Forbidden(format!("course {course_id} is outside your scope")));
        }

        let mut sections: Vec<&Section> = ctx
            .sections
            .iter()
            .filter(|s| ctx.scope.covers(s, &course.id))
            .collect();
        if let Some(section_id) = query.section_id.as_deref().filter(|s| !s.is_empty()) {
            sections.retain(|s| s.id == section_id);
            if sections.is_empty() {
                return match self.store.get::<Section>(section_id).await? {
                    Some(_) => Err(Error::Forbidden(format!(
                        "section {section_id} is outside your scope for course {course_id}"
                    ))),
                    None => Err(Error::NotFound(format!("section {section_id}"))),
                };
            }
        }
        let mut section_refs: Vec<NamedRef> = sections
            .iter()
            .map(|s| NamedRef {
                id: s.id.clone(),
                name: s.name.clone(),
            })
            .collect();
        sort_by_name(&mut section_refs, |s| &s.name);

        let student_ids: Vec<String> = sections
            .iter()
            .flat_map(|s| s.students.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let students = self.store.get_many::<Student>(&student_ids).await?;

        let content = self.course_content(course).await?;
        let units = content
            .units
            .iter()
            .map(|u| UnitInfo {
                id: u.id.clone(),
                title: u.title.clone(),
                order: u.order,
                total_videos: u.videos.len(),
                total_quizzes: u.quizzes.len(),
            })
            .collect();

        let results = self
            .evaluate_students(&content, students, COURSE_BLEND)
            .await?;
        let mut rows: Vec<StudentRow> = results
            .into_iter()
            .map(|(student, result)| StudentRow {
                student_id: student.id,
                student_name: student.name,
                registration_no: student.registration_no,
                watch_time: result.content.watch_time_seconds,
                watch_time_formatted: format_watch_time(result.content.watch_time_seconds),
                content_progress: result.content.display_percent(),
                progress: result.progress,
                progress_color: result.progress_color,
                course_marks: result.quiz.course_marks,
                total_quizzes_taken: result.quiz.total_taken,
                total_quizzes: result.quiz.total_quizzes,
                unit_marks: result.quiz.unit_marks,
            })
            .collect();
        sort_by_name(&mut rows, |r| &r.student_name);
        let total_students = rows.len();
        let (students, pagination) = paginate(rows, page);

        Ok(CourseAnalytics {
            course: CourseInfo {
                id: content.course.id.clone(),
                title: content.course.title.clone(),
                course_code: content.course.course_code.clone(),
            },
            sections: section_refs,
            units,
            total_students,
            blend: COURSE_BLEND,
            students,
            pagination,
        })
    }
}
