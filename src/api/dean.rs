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
        school::SchoolOverview,
    },
    scope::Caller,
    server::AppState,
};

#[utoipa::path(
    context_path = "/api/dean",
    path = "/analytics/school",
    method(get),
    responses(
        (status = 200, description = "Per department roll-up of the dean's school", body = SchoolOverview),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a dean"),
        (status = 404, description = "Dean has no school")
    )
)]
pub async fn school_analytics(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<CachedJson> {
    let key = ReportKey::new("dean/analytics/school", &caller.id, &())?;
    state
        .report(caller, Role::Dean, key, |analytics, ctx| async move {
            analytics.school_overview(&ctx).await
        })
        .await
}

#[utoipa::path(
    context_path = "/api/dean",
    path = "/course-analytics",
    method(get),
    params(CourseAnalyticsQuery),
    responses(
        (status = 200, description = "Per student progress in one course", body = CourseAnalytics),
        (status = 400, description = "Missing courseId or bad paging"),
        (status = 403, description = "Course outside the school"),
        (status = 404, description = "Course or section not found")
    )
)]
pub async fn course_analytics(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<CourseAnalyticsQuery>,
) -> Result<CachedJson> {
    let key = ReportKey::new("dean/course-analytics", &caller.id, &query)?;
    state
        .report(caller, Role::Dean, key, |analytics, ctx| async move {
            analytics.course_analytics(&ctx, &query).await
        })
        .await
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/dean",
        Router::new()
            .route("/analytics/school", get(school_analytics))
            .route("/course-analytics", get(course_analytics)),
    )
}
