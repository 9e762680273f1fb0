use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    cache::{CachedJson, ReportKey},
    error::{Error, Result},
    model::Role,
    reports::{
        course::{CourseAnalytics, CourseAnalyticsQuery},
        department::DepartmentOverview,
    },
    scope::{Caller, has_role},
    server::AppState,
};

#[utoipa::path(
    context_path = "/api/hod",
    path = "/analytics/department",
    method(get),
    responses(
        (status = 200, description = "Per course overview of the HOD's department", body = DepartmentOverview),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an HOD"),
        (status = 404, description = "HOD has no department")
    )
)]
pub async fn department_analytics(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<CachedJson> {
    let key = ReportKey::new("hod/analytics/department", &caller.id, &())?;
    state
        .report(caller, Role::Hod, key, |analytics, ctx| async move {
            analytics.department_overview(&ctx).await
        })
        .await
}

#[utoipa::path(
    context_path = "/api/hod",
    path = "/course-analytics",
    method(get),
    params(CourseAnalyticsQuery),
    responses(
        (status = 200, description = "Per student progress in one course", body = CourseAnalytics),
        (status = 400, description = "Missing courseId or bad paging"),
        (status = 403, description = "Course or section outside the department"),
        (status = 404, description = "Course or section not found")
    )
)]
pub async fn course_analytics(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<CourseAnalyticsQuery>,
) -> Result<CachedJson> {
    let key = ReportKey::new("hod/course-analytics", &caller.id, &query)?;
    state
        .report(caller, Role::Hod, key, |analytics, ctx| async move {
            analytics.course_analytics(&ctx, &query).await
        })
        .await
}

#[utoipa::path(
    context_path = "/api/hod",
    path = "/quiz-report/export/{attempt_id}",
    method(get),
    params(("attempt_id" = String, Path, description = "Quiz attempt id")),
    responses(
        (status = 200, description = "CSV report of one attempt", content_type = "text/csv", body = String),
        (status = 403, description = "Attempt outside the department"),
        (status = 404, description = "Attempt not found")
    )
)]
pub async fn export_quiz_report(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(attempt_id): Path<String>,
) -> Result<Response> {
    if !has_role(&caller, Role::Hod) {
        return Err(Error::Forbidden(format!(
            "user {} is not an HOD",
            caller.id
        )));
    }
    let ctx = state.analytics.context(caller, Role::Hod).await?;
    let report = state.analytics.quiz_report(&ctx, &attempt_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.file_name),
            ),
        ],
        report.body,
    )
        .into_response())
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/hod",
        Router::new()
            .route("/analytics/department", get(department_analytics))
            .route("/course-analytics", get(course_analytics))
            .route("/quiz-report/export/{attempt_id}", get(export_quiz_report)),
    )
}
