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
    reports::course::{CourseAnalytics, CourseAnalyticsQuery},
    scope::Caller,
    server::AppState,
};

#[utoipa::path(
    context_path = "/api/teacher",
    path = "/course-analytics",
    method(get),
    params(CourseAnalyticsQuery),
    responses(
        (status = 200, description = "Progress of the students in the teacher's sections", body = CourseAnalytics),
        (status = 400, description = "Missing courseId or bad paging"),
        (status = 403, description = "Course or section not assigned to the teacher"),
        (status = 404, description = "Course or section not found")
    )
)]
pub async fn course_analytics(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<CourseAnalyticsQuery>,
) -> Result<CachedJson> {
    let key = ReportKey::new("teacher/course-analytics", &caller.id, &query)?;
    state
        .report(caller, Role::Teacher, key, |analytics, ctx| async move {
            analytics.course_analytics(&ctx, &query).await
        })
        .await
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/teacher",
        Router::new().route("/course-analytics", get(course_analytics)),
    )
}
