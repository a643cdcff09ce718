//! User operations: registration, enrollment, and the admin management
//! surface. Admin accounts are immune to demotion and deletion.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::access;
use crate::domain::{CourseStatus, Role, User};
use crate::error::ApiError;
use crate::protocol::RegisterIn;
use crate::state::AppState;

/// Create an account. Admins cannot be self-registered; they come from the
/// bootstrap bank or promotion by an existing admin.
#[instrument(level = "info", skip(state, input))]
pub async fn register(state: &AppState, input: RegisterIn) -> Result<User, ApiError> {
  let full_name = input.full_name.trim().to_string();
  if full_name.is_empty() {
    return Err(ApiError::invalid("full name is required"));
  }
  let role = input.role.unwrap_or_default();
  if role == Role::Admin {
    return Err(ApiError::invalid("cannot register an admin account"));
  }
  let user = User {
    id: Uuid::new_v4().to_string(),
    role,
    full_name,
    enrolled_courses: Vec::new(),
  };
  state.save_user(user.clone()).await;
  info!(target: "learnhub_backend", id = %user.id, role = ?user.role, "User registered");
  Ok(user)
}

/// Enroll the caller in a published course. Idempotent: enrolling twice
/// leaves a single entry.
#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id, %course_id))]
pub async fn enroll(state: &AppState, caller: &User, course_id: &str) -> Result<User, ApiError> {
  let course = state
    .find_course(course_id)
    .await
    .ok_or_else(|| ApiError::not_found("course"))?;
  if course.status != CourseStatus::Published {
    return Err(ApiError::invalid("cannot enroll in an unpublished course"));
  }
  let mut user = state
    .find_user(&caller.id)
    .await
    .ok_or_else(|| ApiError::not_found("user"))?;
  if !user.enrolled_courses.iter().any(|c| c == course_id) {
    user.enrolled_courses.push(course_id.to_string());
    state.save_user(user.clone()).await;
    info!(target: "learnhub_backend", user = %user.id, course = %course_id, "User enrolled");
  }
  Ok(user)
}

#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id))]
pub async fn list_users(state: &AppState, caller: &User) -> Result<Vec<User>, ApiError> {
  if !access::is_admin(caller) {
    return Err(ApiError::forbidden("admin"));
  }
  Ok(state.list_users().await)
}

/// Change a user's role. Admin only; existing admins can never be demoted.
#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id, %user_id, ?role))]
pub async fn change_role(state: &AppState, caller: &User, user_id: &str, role: Role) -> Result<User, ApiError> {
  if !access::is_admin(caller) {
    return Err(ApiError::forbidden("admin"));
  }
  let mut target = state
    .find_user(user_id)
    .await
    .ok_or_else(|| ApiError::not_found("user"))?;
  if target.role == Role::Admin && role != Role::Admin {
    return Err(ApiError::Forbidden("admin accounts cannot be demoted".into()));
  }
  target.role = role;
  state.save_user(target.clone()).await;
  info!(target: "learnhub_backend", user = %target.id, role = ?target.role, "Role changed");
  Ok(target)
}

/// Delete an account. Admin only; admin accounts can never be deleted.
#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id, %user_id))]
pub async fn delete_user(state: &AppState, caller: &User, user_id: &str) -> Result<(), ApiError> {
  if !access::is_admin(caller) {
    return Err(ApiError::forbidden("admin"));
  }
  let target = state
    .find_user(user_id)
    .await
    .ok_or_else(|| ApiError::not_found("user"))?;
  if target.role == Role::Admin {
    return Err(ApiError::Forbidden("admin accounts cannot be deleted".into()));
  }
  state.remove_user(user_id).await;
  info!(target: "learnhub_backend", user = %user_id, "User deleted");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::content::{add_section, create_course, publish_course};
  use crate::protocol::{ContentItemIn, CourseIn, SectionIn};

  fn user(id: &str, name: &str, role: Role) -> User {
    User { id: id.into(), role, full_name: name.into(), enrolled_courses: vec![] }
  }

  #[tokio::test]
  async fn register_rejects_admin_and_blank_names() {
    let state = AppState::from_config(None);
    let err = register(&state, RegisterIn { full_name: "  ".into(), role: None }).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = register(&state, RegisterIn { full_name: "Eve".into(), role: Some(Role::Admin) })
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let u = register(&state, RegisterIn { full_name: "Eve".into(), role: Some(Role::Instructor) })
      .await
      .unwrap();
    assert_eq!(u.role, Role::Instructor);
    assert!(state.find_user(&u.id).await.is_some());
  }

  #[tokio::test]
  async fn enrollment_requires_a_published_course_and_is_idempotent() {
    let state = AppState::from_config(None);
    let instructor = user("ins-1", "Grace Hopper", Role::Instructor);
    let student = user("stu-1", "Ada Byron", Role::Student);
    state.save_user(instructor.clone()).await;
    state.save_user(student.clone()).await;

    let course = create_course(
      &state,
      &instructor,
      CourseIn { title: Some("Rust 101".into()), description: None, markdown_description: None, price: None, duration: None },
    )
    .await
    .unwrap();

    let err = enroll(&state, &student, &course.id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let section = SectionIn {
      title: Some("Intro".into()),
      content: vec![ContentItemIn {
        title: Some("Welcome".into()),
        kind: Some("video".into()),
        video_url: Some("https://x".into()),
        ..ContentItemIn::default()
      }],
      ..SectionIn::default()
    };
    add_section(&state, &instructor, &course.id, section).await.unwrap();
    publish_course(&state, &instructor, &course.id).await.unwrap();

    let enrolled = enroll(&state, &student, &course.id).await.unwrap();
    let again = enroll(&state, &enrolled, &course.id).await.unwrap();
    assert_eq!(again.enrolled_courses.iter().filter(|c| *c == &course.id).count(), 1);
  }

  #[tokio::test]
  async fn admin_accounts_are_immune() {
    let state = AppState::from_config(None);
    let admin = user("adm-1", "Root", Role::Admin);
    let other_admin = user("adm-2", "Root Two", Role::Admin);
    let student = user("stu-1", "Ada Byron", Role::Student);
    state.save_user(admin.clone()).await;
    state.save_user(other_admin.clone()).await;
    state.save_user(student.clone()).await;

    // Non-admin callers are rejected outright.
    let err = change_role(&state, &student, &admin.id, Role::Student).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // Admins cannot demote or delete each other.
    let err = change_role(&state, &admin, &other_admin.id, Role::Student).await.unwrap_err();
    assert_eq!(err, ApiError::Forbidden("admin accounts cannot be demoted".into()));
    let err = delete_user(&state, &admin, &other_admin.id).await.unwrap_err();
    assert_eq!(err, ApiError::Forbidden("admin accounts cannot be deleted".into()));

    // Ordinary users can be promoted and deleted.
    let promoted = change_role(&state, &admin, &student.id, Role::Instructor).await.unwrap();
    assert_eq!(promoted.role, Role::Instructor);
    delete_user(&state, &admin, &student.id).await.unwrap();
    assert!(state.find_user(&student.id).await.is_none());
  }
}
