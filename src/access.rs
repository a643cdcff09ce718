//! Pure authorization predicates and the capability contracts built from
//! them. No storage access here: callers resolve the user and course first.

use crate::domain::{Course, Role, User};

/// Per-course instructor relation. Legacy courses record the owner by
/// display name, newer ones by id; both comparisons must be attempted.
pub fn is_instructor(user: &User, course: &Course) -> bool {
  course.owner == user.full_name || course.owner == user.id
}

pub fn is_enrolled(user: &User, course: &Course) -> bool {
  user.enrolled_courses.iter().any(|id| id == &course.id)
}

pub fn is_admin(user: &User) -> bool {
  user.role == Role::Admin
}

/// View the full course tree (sections + content). Anonymous callers and
/// strangers get the public projection instead of a failure.
pub fn can_view_full(user: Option<&User>, course: &Course) -> bool {
  match user {
    Some(u) => is_instructor(u, course) || is_enrolled(u, course) || is_admin(u),
    None => false,
  }
}

/// Add/update/delete sections or content items.
pub fn can_mutate(user: &User, course: &Course) -> bool {
  is_instructor(user, course) || is_admin(user)
}

/// View or submit progress. Admin is deliberately NOT granted: admins
/// manage users and content, not personal progress.
pub fn can_track_progress(user: &User, course: &Course) -> bool {
  is_enrolled(user, course) || is_instructor(user, course)
}

/// Per-course analytics. The instructor comparison is against the caller
/// themselves, so an unrelated instructor is rejected here.
pub fn can_view_analytics(user: &User, course: &Course) -> bool {
  is_instructor(user, course) || is_admin(user)
}
