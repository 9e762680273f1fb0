use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    cache::{CachedJson, ReportKey},
    error::Result,
    model::Role,
    reports::{
        course::{CourseAnalytics, CourseAnalyticsQuery},
        student::{StudentReport, StudentReportQuery},
    },
    scope::Caller,
    server::AppState,
};

#[utoipa::path(
    context_path = "/api/admin",
    path = "/student-progress",
    method(get),
    params(StudentReportQuery),
    responses(
        (status = 200, description = "Progress of one student in every enrolled course", body = StudentReport),
        (status = 400, description = "Missing regNo"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No student with that registration number")
    )
)]
pub async fn student_progress(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<StudentReportQuery>,
) -> Result<CachedJson> {
    let key = ReportKey::new("admin/student-progress", &caller.id, &query)?;
    state
        .report(caller, Role::Admin, key, |analytics, ctx| async move {
            analytics.student_report(&ctx, &query).await
        })
        .await
}

#[utoipa::path(
    context_path = "/api/admin",
    path = "/course-analytics",
    method(get),
    params(CourseAnalyticsQuery),
    responses(
        (status = 200, description = "Per student progress in one course", body = CourseAnalytics),
        (status = 400, description = "Missing courseId or bad paging"),
        (status = 404, description = "Course or section not found")
    )
)]
pub async fn course_analytics(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<CourseAnalyticsQuery>,
) -> Result<CachedJson> {
    let key = ReportKey::new("admin/course-analytics", &caller.id, &query)?;
    state
        .report(caller, Role::Admin, key, |analytics, ctx| async move {
            analytics.course_analytics(&ctx, &query).await
        })
        .await
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/student-progress", get(student_progress))
            .route("/course-analytics", get(course_analytics)),
    )
}
