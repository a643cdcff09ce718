//! HTTP endpoint handlers. These are thin wrappers that resolve the caller
//! from the credential boundary and forward to the engines.
//!
//! Authentication is opaque here: the identity provider in front of this
//! service has already validated the credential, and `x-user-id` names the
//! principal. An unknown or missing header means an anonymous caller.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::{CourseStatus, User};
use crate::error::ApiError;
use crate::protocol::*;
use crate::state::AppState;
use crate::{access, content, progress, users};

async fn maybe_authenticate(state: &AppState, headers: &HeaderMap) -> Option<User> {
  let id = headers.get("x-user-id")?.to_str().ok()?;
  state.find_user(id).await
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
  maybe_authenticate(state, headers)
    .await
    .ok_or_else(|| ApiError::Forbidden("authentication required".into()))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

// ---- Users ----

#[instrument(level = "info", skip(state, body))]
pub async fn http_register(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RegisterIn>,
) -> Result<Json<User>, ApiError> {
  let user = users::register(&state, body).await?;
  Ok(Json(user))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_list_users(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<Vec<User>>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(users::list_users(&state, &caller).await?))
}

#[instrument(level = "info", skip(state, headers), fields(%user_id))]
pub async fn http_change_role(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  headers: HeaderMap,
  Json(body): Json<RoleUpdateIn>,
) -> Result<Json<User>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(users::change_role(&state, &caller, &user_id, body.role).await?))
}

#[instrument(level = "info", skip(state, headers), fields(%user_id))]
pub async fn http_delete_user(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<DeletedOut>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  users::delete_user(&state, &caller, &user_id).await?;
  Ok(Json(DeletedOut { deleted: true }))
}

// ---- Courses ----

#[instrument(level = "info", skip(state, headers))]
pub async fn http_list_courses(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<Vec<PublicCourseOut>>, ApiError> {
  let caller = maybe_authenticate(&state, &headers).await;
  let courses = state
    .list_courses()
    .await
    .into_iter()
    .filter(|c| {
      c.status == CourseStatus::Published
        || caller.as_ref().map(|u| access::is_instructor(u, c)).unwrap_or(false)
    })
    .map(|c| to_public(&c))
    .collect();
  Ok(Json(courses))
}

#[instrument(level = "info", skip(state, headers, body))]
pub async fn http_create_course(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<CourseIn>,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(content::create_course(&state, &caller, body).await?))
}

/// Full course for the instructor/enrolled/admin; the public projection
/// for everyone else. Degrading is intentional and not an error.
#[instrument(level = "info", skip(state, headers), fields(%course_id))]
pub async fn http_get_course(
  State(state): State<Arc<AppState>>,
  Path(course_id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<CourseViewOut>, ApiError> {
  let caller = maybe_authenticate(&state, &headers).await;
  let course = state
    .find_course(&course_id)
    .await
    .ok_or_else(|| ApiError::not_found("course"))?;
  let view = if access::can_view_full(caller.as_ref(), &course) {
    CourseViewOut::Full(course)
  } else {
    info!(target: "course", id = %course_id, "Serving public projection");
    CourseViewOut::Public(to_public(&course))
  };
  Ok(Json(view))
}

#[instrument(level = "info", skip(state, headers, body), fields(%course_id))]
pub async fn http_update_course(
  State(state): State<Arc<AppState>>,
  Path(course_id): Path<String>,
  headers: HeaderMap,
  Json(body): Json<CourseUpdateIn>,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(content::update_course_metadata(&state, &caller, &course_id, body).await?))
}

#[instrument(level = "info", skip(state, headers), fields(%course_id))]
pub async fn http_publish_course(
  State(state): State<Arc<AppState>>,
  Path(course_id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(content::publish_course(&state, &caller, &course_id).await?))
}

#[instrument(level = "info", skip(state, headers), fields(%course_id))]
pub async fn http_enroll(
  State(state): State<Arc<AppState>>,
  Path(course_id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(users::enroll(&state, &caller, &course_id).await?))
}

// ---- Sections & content ----

#[instrument(level = "info", skip(state, headers, body), fields(%course_id))]
pub async fn http_add_section(
  State(state): State<Arc<AppState>>,
  Path(course_id): Path<String>,
  headers: HeaderMap,
  Json(body): Json<SectionIn>,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(content::add_section(&state, &caller, &course_id, body).await?))
}

#[instrument(level = "info", skip(state, headers, body), fields(%course_id, sections = body.len()))]
pub async fn http_update_sections(
  State(state): State<Arc<AppState>>,
  Path(course_id): Path<String>,
  headers: HeaderMap,
  Json(body): Json<Vec<SectionIn>>,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(content::update_sections(&state, &caller, &course_id, body).await?))
}

#[instrument(level = "info", skip(state, headers, body), fields(%course_id, %section_id))]
pub async fn http_update_section(
  State(state): State<Arc<AppState>>,
  Path((course_id, section_id)): Path<(String, String)>,
  headers: HeaderMap,
  Json(body): Json<SectionUpdateIn>,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(content::update_section(&state, &caller, &course_id, &section_id, body).await?))
}

#[instrument(level = "info", skip(state, headers), fields(%course_id, %section_id))]
pub async fn http_delete_section(
  State(state): State<Arc<AppState>>,
  Path((course_id, section_id)): Path<(String, String)>,
  headers: HeaderMap,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(content::delete_section(&state, &caller, &course_id, &section_id).await?))
}

#[instrument(level = "info", skip(state, headers, body), fields(%course_id, %section_id))]
pub async fn http_add_content(
  State(state): State<Arc<AppState>>,
  Path((course_id, section_id)): Path<(String, String)>,
  headers: HeaderMap,
  Json(body): Json<ContentItemIn>,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(content::add_content_to_section(&state, &caller, &course_id, &section_id, body).await?))
}

#[instrument(level = "info", skip(state, headers, body), fields(%course_id, %section_id, %content_id))]
pub async fn http_update_content(
  State(state): State<Arc<AppState>>,
  Path((course_id, section_id, content_id)): Path<(String, String, String)>,
  headers: HeaderMap,
  Json(body): Json<ContentItemIn>,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(
    content::update_content_in_section(&state, &caller, &course_id, &section_id, &content_id, body).await?,
  ))
}

#[instrument(level = "info", skip(state, headers), fields(%course_id, %section_id, %content_id))]
pub async fn http_delete_content(
  State(state): State<Arc<AppState>>,
  Path((course_id, section_id, content_id)): Path<(String, String, String)>,
  headers: HeaderMap,
) -> Result<Json<crate::domain::Course>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(
    content::delete_content_from_section(&state, &caller, &course_id, &section_id, &content_id).await?,
  ))
}

// ---- Progress & analytics ----

#[instrument(level = "info", skip(state, headers, body), fields(%course_id, %section_id, %content_id))]
pub async fn http_submit_progress(
  State(state): State<Arc<AppState>>,
  Path((course_id, section_id, content_id)): Path<(String, String, String)>,
  headers: HeaderMap,
  body: Option<Json<SubmitProgressIn>>,
) -> Result<Json<crate::domain::ProgressRecord>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  let input = body.map(|Json(b)| b).unwrap_or_default();
  let record = progress::submit_progress(
    &state,
    &caller,
    &course_id,
    Some(&section_id),
    &content_id,
    input.answer.as_ref(),
  )
  .await?;
  Ok(Json(record))
}

/// Legacy single-level route kept for the old frontend: no section id, and
/// the content id may arrive as the literal placeholder "undefined".
#[instrument(level = "info", skip(state, headers, body), fields(%course_id, %content_id))]
pub async fn http_submit_progress_legacy(
  State(state): State<Arc<AppState>>,
  Path((course_id, content_id)): Path<(String, String)>,
  headers: HeaderMap,
  body: Option<Json<SubmitProgressIn>>,
) -> Result<Json<crate::domain::ProgressRecord>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  let input = body.map(|Json(b)| b).unwrap_or_default();
  let record =
    progress::submit_progress(&state, &caller, &course_id, None, &content_id, input.answer.as_ref()).await?;
  Ok(Json(record))
}

#[instrument(level = "info", skip(state, headers), fields(%course_id))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(course_id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<ProgressOut>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(progress::get_progress(&state, &caller, &course_id).await?))
}

#[instrument(level = "info", skip(state, headers), fields(%course_id))]
pub async fn http_get_analytics(
  State(state): State<Arc<AppState>>,
  Path(course_id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<AnalyticsOut>, ApiError> {
  let caller = authenticate(&state, &headers).await?;
  Ok(Json(progress::get_course_analytics(&state, &caller, &course_id).await?))
}
