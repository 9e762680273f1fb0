use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use super::{
    Analytics, NamedRef, RequestContext, department::CourseOverview, mean, page::sort_by_name,
};
use crate::{
    analytics::ProgressColor,
    error::{Error, Result},
    model::{Department, School},
    scope::Anchor,
    utils::round2,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub department_id: String,
    pub department_name: String,
    pub total_courses: usize,
    pub total_students: usize,
    /// Mean over every (student, course) pair of the department
    pub average_progress: f64,
    pub progress_color: ProgressColor,
    pub courses: Vec<CourseOverview>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchoolOverview {
    pub school: NamedRef,
    pub total_departments: usize,
    pub departments: Vec<DepartmentSummary>,
}

impl Analytics {
    /// Dean's roll-up of every department of the school.
    pub async fn school_overview(&self, ctx: &RequestContext) -> Result<SchoolOverview> {
        let Anchor::School { school } = &ctx.scope.anchor else {
            return Err(Error::Forbidden(
                "school analytics need a school scope".to_string(),
            ));
        };
        let school = self
            .store
            .get::<School>(school)
            .await?
            .ok_or_else(|| Error::ScopeNotFound(format!("school {school} not found")))?;

        let mut departments = self.store.find::<Department>("school", &school.id).await?;
        sort_by_name(&mut departments, |d| &d.name);
        let mut summaries = Vec::with_capacity(departments.len());
        for department in departments {
            let mut courses: Vec<_> = ctx
                .courses
                .iter()
                .filter(|c| c.department.as_deref() == Some(department.id.as_str()))
                .cloned()
                .collect();
            sort_by_name(&mut courses, |c| &c.title);

            let mut students = BTreeSet::new();
            let mut progress = Vec::new();
            let mut overviews = Vec::with_capacity(courses.len());
            for course in courses {
                let summary = self.course_summary(ctx, course).await?;
                students.extend(summary.students);
                progress.extend(summary.progress);
                overviews.push(summary.overview);
            }
            let average_progress = round2(mean(&progress));
            summaries.push(DepartmentSummary {
                department_id: department.id,
                department_name: department.name,
                total_courses: overviews.len(),
                total_students: students.len(),
                average_progress,
                progress_color: ProgressColor::from_percent(average_progress),
                courses: overviews,
            });
        }
        Ok(SchoolOverview {
            school: NamedRef {
                id: school.id,
                name: school.name,
            },
            total_departments: summaries.len(),
            departments: summaries,
        })
    }
}
