//! Progress & scoring engine: completion upserts with type-dependent
//! answer validation, aggregate percentage, and per-course analytics.

use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::access;
use crate::domain::{ContentBody, ContentItem, Course, ProgressRecord, User};
use crate::error::ApiError;
use crate::protocol::{AnalyticsOut, ProgressOut, QuizStatOut};
use crate::state::AppState;

/// Literal the legacy single-level frontend route sends when it has no
/// content id. Gets its own message instead of the generic format error.
const LEGACY_CONTENT_PLACEHOLDER: &str = "undefined";

const MAX_ANSWER_CHARS: usize = 500;

fn is_well_formed_id(s: &str) -> bool {
  Uuid::parse_str(s).is_ok()
}

fn round2(x: f64) -> f64 {
  (x * 100.0).round() / 100.0
}

fn find_content<'a>(course: &'a Course, section_id: Option<&str>, content_id: &str) -> Result<&'a ContentItem, ApiError> {
  match section_id {
    Some(sid) => {
      let section = course
        .sections
        .iter()
        .find(|s| s.id == sid)
        .ok_or_else(|| ApiError::not_found("section"))?;
      section
        .content
        .iter()
        .find(|c| c.id == content_id)
        .ok_or_else(|| ApiError::not_found("content item"))
    }
    // Legacy single-level route: search everywhere, flat list included.
    None => course
      .all_content()
      .find(|c| c.id == content_id)
      .ok_or_else(|| ApiError::not_found("content item")),
  }
}

/// Coerce a multiple-choice answer to an option index. Accepts a JSON
/// integer or a numeric string; anything else fails.
fn coerce_option_index(answer: &Value) -> Option<i64> {
  let n = match answer {
    Value::Number(n) => n.as_i64()?,
    Value::String(s) => s.trim().parse::<i64>().ok()?,
    _ => return None,
  };
  (0..=3).contains(&n).then_some(n)
}

/// Raw textual form of the submitted answer, stored alongside the record.
fn answer_as_string(answer: &Value) -> String {
  match answer {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Record completion of a content item, validating and scoring the answer
/// per the item's type. Resubmission upserts under the natural key.
#[instrument(level = "info", skip(state, caller, answer), fields(caller = %caller.id, %course_id, %content_id))]
pub async fn submit_progress(
  state: &AppState,
  caller: &User,
  course_id: &str,
  section_id: Option<&str>,
  content_id: &str,
  answer: Option<&Value>,
) -> Result<ProgressRecord, ApiError> {
  // 1. Id well-formedness, each field with its own message.
  if !is_well_formed_id(course_id) {
    return Err(ApiError::invalid("invalid course id format"));
  }
  if let Some(sid) = section_id {
    if !is_well_formed_id(sid) {
      return Err(ApiError::invalid("invalid section id format"));
    }
  }
  if content_id == LEGACY_CONTENT_PLACEHOLDER {
    return Err(ApiError::invalid("content id is missing (legacy route placeholder received)"));
  }
  if !is_well_formed_id(content_id) {
    return Err(ApiError::invalid("invalid content id format"));
  }

  // 2. Existence, scoped per entity.
  let course = state
    .find_course(course_id)
    .await
    .ok_or_else(|| ApiError::not_found("course"))?;
  let item = find_content(&course, section_id, content_id)?;

  // 3. Enrolled student or the course's own instructor; admin excluded.
  if !access::can_track_progress(caller, &course) {
    return Err(ApiError::forbidden("enrolled student or course instructor"));
  }

  // 4–6. Type-dependent answer handling.
  let (stored_answer, score) = match &item.body {
    ContentBody::MultipleChoice { correct_option, .. } => {
      let chosen = answer
        .and_then(coerce_option_index)
        .ok_or_else(|| ApiError::invalid("multiple choice answer must be an integer between 0 and 3"))?;
      let score = if chosen == *correct_option as i64 { 1.0 } else { 0.0 };
      (Some(answer.map(answer_as_string).unwrap_or_default()), score)
    }
    ContentBody::Quiz { .. } => {
      // Validate the trimmed view; store the string form as submitted.
      let raw = answer.and_then(|a| a.as_str()).unwrap_or("");
      let trimmed = raw.trim();
      if trimmed.is_empty() || trimmed.chars().count() > MAX_ANSWER_CHARS {
        return Err(ApiError::invalid(format!(
          "quiz answer must be a non-empty string of at most {} characters",
          MAX_ANSWER_CHARS
        )));
      }
      (Some(raw.to_string()), 0.0)
    }
    _ => (answer.map(answer_as_string), 0.0),
  };

  // 7. Upsert: last writer wins under the natural key.
  let record = ProgressRecord {
    user_id: caller.id.clone(),
    course_id: course_id.to_string(),
    section_id: section_id.map(str::to_string),
    content_id: content_id.to_string(),
    completed: true,
    completed_at: Some(Utc::now()),
    answer: stored_answer,
    score,
  };
  let record = state.upsert_progress(record).await;
  info!(target: "progress", user = %caller.id, course = %course_id, content = %content_id, score = record.score, "Progress recorded");
  Ok(record)
}

/// The caller's progress records for a course plus the completion
/// percentage. Both fields are always present, even with zero records.
#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id, %course_id))]
pub async fn get_progress(state: &AppState, caller: &User, course_id: &str) -> Result<ProgressOut, ApiError> {
  let course = state
    .find_course(course_id)
    .await
    .ok_or_else(|| ApiError::not_found("course"))?;
  if !access::can_track_progress(caller, &course) {
    return Err(ApiError::forbidden("enrolled student or course instructor"));
  }

  let records = state.progress_for_user_course(&caller.id, course_id).await;
  let total = course.content_item_count();
  let completed = records.iter().filter(|r| r.completed).count();
  let progress_percentage = if total == 0 {
    0.0
  } else {
    round2(completed as f64 / total as f64 * 100.0)
  };
  Ok(ProgressOut { records, progress_percentage })
}

/// Per-course analytics for the owning instructor or an admin.
#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id, %course_id))]
pub async fn get_course_analytics(
  state: &AppState,
  caller: &User,
  course_id: &str,
) -> Result<AnalyticsOut, ApiError> {
  let course = state
    .find_course(course_id)
    .await
    .ok_or_else(|| ApiError::not_found("course"))?;
  if !access::can_view_analytics(caller, &course) {
    return Err(ApiError::forbidden("course instructor or admin"));
  }

  let enrolled = state.enrolled_user_ids(course_id).await;
  let records = state.progress_for_course(course_id).await;

  let cutoff = Utc::now() - Duration::days(30);
  let mut active: Vec<&str> = records
    .iter()
    .filter(|r| r.completed_at.map(|t| t >= cutoff).unwrap_or(false))
    .map(|r| r.user_id.as_str())
    .collect();
  active.sort_unstable();
  active.dedup();

  // Completion rate is over enrolled students, not over everyone who ever
  // wrote a record (orphaned records are tolerated, not counted).
  let completers = enrolled
    .iter()
    .filter(|uid| records.iter().any(|r| &r.user_id == *uid && r.completed))
    .count();
  let completion_rate = if enrolled.is_empty() {
    0.0
  } else {
    round2(completers as f64 / enrolled.len() as f64 * 100.0)
  };

  let quiz_stats = course
    .all_content()
    .filter(|item| item.body.is_scored())
    .map(|item| {
      let scores: Vec<f64> = records
        .iter()
        .filter(|r| r.content_id == item.id)
        .map(|r| r.score)
        .collect();
      let average_score = if scores.is_empty() {
        0.0
      } else {
        round2(scores.iter().sum::<f64>() / scores.len() as f64)
      };
      QuizStatOut {
        content_id: item.id.clone(),
        title: item.title.clone(),
        submissions: scores.len(),
        average_score,
      }
    })
    .collect();

  Ok(AnalyticsOut {
    total_enrolled_students: enrolled.len(),
    active_students_last_30_days: active.len(),
    completion_rate,
    quiz_stats,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::content::{add_section, create_course, publish_course};
  use crate::domain::{CourseStatus, Role};
  use crate::protocol::{ContentItemIn, CourseIn, SectionIn};
  use crate::users::enroll;
  use serde_json::json;

  fn user(id: &str, name: &str, role: Role) -> User {
    User { id: id.into(), role, full_name: name.into(), enrolled_courses: vec![] }
  }

  fn video_in(title: &str) -> ContentItemIn {
    ContentItemIn {
      title: Some(title.into()),
      kind: Some("video".into()),
      video_url: Some("https://x".into()),
      ..ContentItemIn::default()
    }
  }

  fn quiz_in(title: &str) -> ContentItemIn {
    ContentItemIn {
      title: Some(title.into()),
      kind: Some("quiz".into()),
      content: Some("write something".into()),
      ..ContentItemIn::default()
    }
  }

  fn mc_in(title: &str, correct: i64) -> ContentItemIn {
    ContentItemIn {
      title: Some(title.into()),
      kind: Some("multipleChoice".into()),
      question: Some("pick one".into()),
      options: Some(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
      correct_option: Some(correct),
      ..ContentItemIn::default()
    }
  }

  /// Published course with one section: [video, multipleChoice(correct=2), quiz].
  async fn setup() -> (AppState, User, User, Course) {
    let state = AppState::from_config(None);
    let instructor = user("ins-1", "Grace Hopper", Role::Instructor);
    let student = user("stu-1", "Ada Byron", Role::Student);
    state.save_user(instructor.clone()).await;
    state.save_user(student.clone()).await;

    let course_in = CourseIn {
      title: Some("Rust 101".into()),
      description: None,
      markdown_description: None,
      price: None,
      duration: None,
    };
    let course = create_course(&state, &instructor, course_in).await.unwrap();
    let section = SectionIn {
      title: Some("Intro".into()),
      content: vec![video_in("Welcome"), mc_in("Checkpoint", 2), quiz_in("Essay")],
      ..SectionIn::default()
    };
    add_section(&state, &instructor, &course.id, section).await.unwrap();
    publish_course(&state, &instructor, &course.id).await.unwrap();
    let student = enroll(&state, &student, &course.id).await.unwrap();
    let course = state.find_course(&course.id).await.unwrap();
    (state, instructor, student, course)
  }

  fn ids(course: &Course) -> (String, String, String, String) {
    let s = &course.sections[0];
    (s.id.clone(), s.content[0].id.clone(), s.content[1].id.clone(), s.content[2].id.clone())
  }

  #[tokio::test]
  async fn multiple_choice_scoring() {
    let (state, _, student, course) = setup().await;
    let (sid, _, mc_id, _) = ids(&course);

    let right = json!(2);
    let rec = submit_progress(&state, &student, &course.id, Some(&sid), &mc_id, Some(&right))
      .await
      .unwrap();
    assert!(rec.completed);
    assert_eq!(rec.score, 1.0);
    assert_eq!(rec.answer.as_deref(), Some("2"));

    let wrong = json!("1");
    let rec = submit_progress(&state, &student, &course.id, Some(&sid), &mc_id, Some(&wrong))
      .await
      .unwrap();
    assert!(rec.completed);
    assert_eq!(rec.score, 0.0);
    assert_eq!(rec.answer.as_deref(), Some("1"));

    // Out-of-range and non-numeric answers are rejected without a write.
    for bad in [json!(5), json!("abc"), json!(true)] {
      let err = submit_progress(&state, &student, &course.id, Some(&sid), &mc_id, Some(&bad))
        .await
        .unwrap_err();
      assert!(matches!(err, ApiError::InvalidInput(_)));
    }
    let records = state.progress_for_user_course(&student.id, &course.id).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].answer.as_deref(), Some("1"));
  }

  #[tokio::test]
  async fn resubmission_upserts_a_single_record() {
    let (state, _, student, course) = setup().await;
    let (sid, _, mc_id, _) = ids(&course);

    let a = json!(1);
    submit_progress(&state, &student, &course.id, Some(&sid), &mc_id, Some(&a)).await.unwrap();
    let b = json!(2);
    let rec = submit_progress(&state, &student, &course.id, Some(&sid), &mc_id, Some(&b)).await.unwrap();

    let records = state.progress_for_user_course(&student.id, &course.id).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].answer.as_deref(), Some("2"));
    assert_eq!(records[0].score, 1.0);
    assert_eq!(records[0].key(), rec.key());
  }

  #[tokio::test]
  async fn quiz_answers_are_bounded_free_text() {
    let (state, _, student, course) = setup().await;
    let (sid, _, _, quiz_id) = ids(&course);

    let empty = json!("   ");
    let err = submit_progress(&state, &student, &course.id, Some(&sid), &quiz_id, Some(&empty))
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let too_long = json!("x".repeat(501));
    let err = submit_progress(&state, &student, &course.id, Some(&sid), &quiz_id, Some(&too_long))
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let fine = json!("a thoughtful essay");
    let rec = submit_progress(&state, &student, &course.id, Some(&sid), &quiz_id, Some(&fine))
      .await
      .unwrap();
    assert_eq!(rec.score, 0.0);
    assert_eq!(rec.answer.as_deref(), Some("a thoughtful essay"));

    // Surrounding whitespace passes validation and is stored as submitted.
    let padded = json!("  a thoughtful essay  ");
    let rec = submit_progress(&state, &student, &course.id, Some(&sid), &quiz_id, Some(&padded))
      .await
      .unwrap();
    assert_eq!(rec.answer.as_deref(), Some("  a thoughtful essay  "));
  }

  #[tokio::test]
  async fn id_format_errors_are_field_scoped() {
    let (state, _, student, course) = setup().await;
    let (sid, video_id, _, _) = ids(&course);

    let err = submit_progress(&state, &student, "nope", Some(&sid), &video_id, None).await.unwrap_err();
    assert_eq!(err, ApiError::invalid("invalid course id format"));

    let err = submit_progress(&state, &student, &course.id, Some("nope"), &video_id, None).await.unwrap_err();
    assert_eq!(err, ApiError::invalid("invalid section id format"));

    let err = submit_progress(&state, &student, &course.id, Some(&sid), "nope", None).await.unwrap_err();
    assert_eq!(err, ApiError::invalid("invalid content id format"));

    // The legacy placeholder gets its own message.
    let err = submit_progress(&state, &student, &course.id, Some(&sid), "undefined", None).await.unwrap_err();
    assert_eq!(err, ApiError::invalid("content id is missing (legacy route placeholder received)"));
  }

  #[tokio::test]
  async fn admin_is_not_granted_progress_access() {
    let (state, _, _, course) = setup().await;
    let admin = user("adm-1", "Root", Role::Admin);
    state.save_user(admin.clone()).await;
    let (sid, video_id, _, _) = ids(&course);

    let err = submit_progress(&state, &admin, &course.id, Some(&sid), &video_id, None).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let err = get_progress(&state, &admin, &course.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
  }

  #[tokio::test]
  async fn percentage_boundaries() {
    let (state, instructor, student, course) = setup().await;
    let (sid, video_id, mc_id, quiz_id) = ids(&course);

    // No records yet: 0 percent, empty (but present) list.
    let out = get_progress(&state, &student, &course.id).await.unwrap();
    assert!(out.records.is_empty());
    assert_eq!(out.progress_percentage, 0.0);

    // 1 of 3: 33.33 after rounding.
    submit_progress(&state, &student, &course.id, Some(&sid), &video_id, None).await.unwrap();
    let out = get_progress(&state, &student, &course.id).await.unwrap();
    assert_eq!(out.progress_percentage, 33.33);

    // 3 of 3: 100.
    let a = json!(2);
    submit_progress(&state, &student, &course.id, Some(&sid), &mc_id, Some(&a)).await.unwrap();
    let essay = json!("done");
    submit_progress(&state, &student, &course.id, Some(&sid), &quiz_id, Some(&essay)).await.unwrap();
    let out = get_progress(&state, &student, &course.id).await.unwrap();
    assert_eq!(out.progress_percentage, 100.0);
    assert_eq!(out.records.len(), 3);

    // 2 of 4 lands exactly on 50.00. The instructor tracks their own
    // course without an explicit enrollment.
    let four = create_course(
      &state,
      &instructor,
      CourseIn { title: Some("Four videos".into()), description: None, markdown_description: None, price: None, duration: None },
    )
    .await
    .unwrap();
    let four = add_section(
      &state,
      &instructor,
      &four.id,
      SectionIn {
        title: Some("All of it".into()),
        content: vec![video_in("a"), video_in("b"), video_in("c"), video_in("d")],
        ..SectionIn::default()
      },
    )
    .await
    .unwrap();
    let fsid = four.sections[0].id.clone();
    for item in &four.sections[0].content[..2] {
      submit_progress(&state, &instructor, &four.id, Some(&fsid), &item.id, None).await.unwrap();
    }
    let out = get_progress(&state, &instructor, &four.id).await.unwrap();
    assert_eq!(out.progress_percentage, 50.0);

    // A course with zero content items never divides by zero.
    let empty = create_course(
      &state,
      &instructor,
      CourseIn { title: Some("Empty".into()), description: None, markdown_description: None, price: None, duration: None },
    )
    .await
    .unwrap();
    let out = get_progress(&state, &instructor, &empty.id).await.unwrap();
    assert_eq!(out.progress_percentage, 0.0);
  }

  #[tokio::test]
  async fn analytics_counts_enrollment_activity_and_quiz_averages() {
    let (state, instructor, student, course) = setup().await;
    let (sid, _, mc_id, quiz_id) = ids(&course);

    // A second student enrolls but never submits anything.
    let idle = user("stu-2", "Idle Ivy", Role::Student);
    state.save_user(idle.clone()).await;
    enroll(&state, &idle, &course.id).await.unwrap();

    let wrong = json!(0);
    submit_progress(&state, &student, &course.id, Some(&sid), &mc_id, Some(&wrong)).await.unwrap();
    let essay = json!("notes");
    submit_progress(&state, &student, &course.id, Some(&sid), &quiz_id, Some(&essay)).await.unwrap();

    let out = get_course_analytics(&state, &instructor, &course.id).await.unwrap();
    // Instructor is auto-enrolled on publish, plus two students.
    assert_eq!(out.total_enrolled_students, 3);
    assert_eq!(out.active_students_last_30_days, 1);
    // 1 of 3 enrolled users has a completed record.
    assert_eq!(out.completion_rate, 33.33);

    let mc_stat = out.quiz_stats.iter().find(|s| s.content_id == mc_id).unwrap();
    assert_eq!(mc_stat.submissions, 1);
    assert_eq!(mc_stat.average_score, 0.0);
    let quiz_stat = out.quiz_stats.iter().find(|s| s.content_id == quiz_id).unwrap();
    assert_eq!(quiz_stat.submissions, 1);

    // An unrelated instructor is rejected even though they hold the role.
    let other = user("ins-2", "Alan Turing", Role::Instructor);
    state.save_user(other.clone()).await;
    let err = get_course_analytics(&state, &other, &course.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
  }

  /// End-to-end: author, publish, enroll, watch the single video, 100%.
  #[tokio::test]
  async fn full_course_lifecycle() {
    let state = AppState::from_config(None);
    let instructor = user("ins-9", "Grace Hopper", Role::Instructor);
    let student = user("stu-9", "Ada Byron", Role::Student);
    state.save_user(instructor.clone()).await;
    state.save_user(student.clone()).await;

    let course = create_course(
      &state,
      &instructor,
      CourseIn { title: Some("One-video course".into()), description: None, markdown_description: None, price: None, duration: None },
    )
    .await
    .unwrap();
    let course = add_section(
      &state,
      &instructor,
      &course.id,
      SectionIn { title: Some("Intro".into()), content: vec![video_in("Welcome")], ..SectionIn::default() },
    )
    .await
    .unwrap();
    let course = publish_course(&state, &instructor, &course.id).await.unwrap();
    assert_eq!(course.status, CourseStatus::Published);

    let student = enroll(&state, &student, &course.id).await.unwrap();
    let sid = course.sections[0].id.clone();
    let vid = course.sections[0].content[0].id.clone();

    let rec = submit_progress(&state, &student, &course.id, Some(&sid), &vid, None).await.unwrap();
    assert!(rec.completed);
    assert_eq!(rec.score, 0.0);

    let out = get_progress(&state, &student, &course.id).await.unwrap();
    assert_eq!(out.progress_percentage, 100.0);
  }
}
