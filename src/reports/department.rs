use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use super::{Analytics, NamedRef, RequestContext, mean, page::sort_by_name};
use crate::{
    analytics::{BlendStrategy, ProgressColor},
    error::{Error, Result},
    model::{Course, Department, Student, TeacherAssignment, User},
    scope::Anchor,
    utils::round2,
};

/// Department overview uses the attempt-rate blend: quiz progress is the share of
/// quiz units a student has attempted.
pub const DEPARTMENT_BLEND: BlendStrategy = BlendStrategy::ContentPlusAttemptRate;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseOverview {
    pub course_id: String,
    pub course_title: String,
    pub course_code: Option<String>,
    pub coordinator: Option<NamedRef>,
    pub sections: Vec<NamedRef>,
    pub total_students: usize,
    pub teachers: Vec<NamedRef>,
    pub total_videos: usize,
    pub total_reading_materials: usize,
    pub total_quizzes: usize,
    pub average_progress: f64,
    pub progress_color: ProgressColor,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentOverview {
    pub department: NamedRef,
    pub total_courses: usize,
    pub courses: Vec<CourseOverview>,
}

/// A course overview plus what the school roll-up needs from it.
pub(crate) struct CourseSummary {
    pub overview: CourseOverview,
    pub students: BTreeSet<String>,
    pub progress: Vec<f64>,
}

impl Analytics {
    pub async fn department_overview(&self, ctx: &RequestContext) -> Result<DepartmentOverview> {
        let Anchor::Department { department, .. } = &ctx.scope.anchor else {
            return Err(Error::Forbidden(
                "department analytics need a department scope".to_string(),
            ));
        };
        let department = self
            .store
            .get::<Department>(department)
            .await?
            .ok_or_else(|| Error::ScopeNotFound(format!("department {department} not found")))?;

        let mut courses = ctx.courses.clone();
        sort_by_name(&mut courses, |c| &c.title);
        let mut overviews = Vec::with_capacity(courses.len());
        for course in courses {
            overviews.push(self.course_summary(ctx, course).await?.overview);
        }
        info!(
            "department overview of {} for {}: {} courses",
            department.id,
            ctx.caller.id,
            overviews.len()
        );
        Ok(DepartmentOverview {
            department: NamedRef {
                id: department.id,
                name: department.name,
            },
            total_courses: overviews.len(),
            courses: overviews,
        })
    }

    pub(crate) async fn course_summary(
        &self,
        ctx: &RequestContext,
        course: Course,
    ) -> Result<CourseSummary> {
        let sections: Vec<_> = ctx
            .sections
            .iter()
            .filter(|s| ctx.scope.covers(s, &course.id))
            .collect();
        let section_ids: BTreeSet<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        let student_ids: BTreeSet<String> = sections
            .iter()
            .flat_map(|s| s.students.iter().cloned())
            .collect();

        let teacher_ids: Vec<String> = self
            .store
            .find::<TeacherAssignment>("course", &course.id)
            .await?
            .into_iter()
            .filter(|a| section_ids.contains(a.section.as_str()))
            .map(|a| a.teacher)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut teachers = self.user_refs(&teacher_ids).await?;
        sort_by_name(&mut teachers, |t| &t.name);

        let coordinator = match course.coordinators.first() {
            Some(id) => self.store.get::<User>(id).await?.map(|u| NamedRef {
                id: u.id,
                name: u.name,
            }),
            None => None,
        };

        let ids: Vec<String> = student_ids.iter().cloned().collect();
        let students = self.store.get_many::<Student>(&ids).await?;
        let content = self.course_content(course).await?;
        let results = self
            .evaluate_students(&content, students, DEPARTMENT_BLEND)
            .await?;
        let progress: Vec<f64> = results.iter().map(|(_, r)| r.progress).collect();
        let average_progress = round2(mean(&progress));

        let overview = CourseOverview {
            course_id: content.course.id.clone(),
            course_title: content.course.title.clone(),
            course_code: content.course.course_code.clone(),
            coordinator,
            sections: sections
                .iter()
                .map(|s| NamedRef {
                    id: s.id.clone(),
                    name: s.name.clone(),
                })
                .collect(),
            total_students: student_ids.len(),
            teachers,
            total_videos: content.video_ids().len(),
            total_reading_materials: content.approved_reading_ids().len(),
            total_quizzes: content.total_quizzes(),
            average_progress,
            progress_color: ProgressColor::from_percent(average_progress),
        };
        Ok(CourseSummary {
            overview,
            students: student_ids,
            progress,
        })
    }
}
