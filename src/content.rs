//! Content mutation engine: course creation and metadata, publishing, and
//! the section/content tree with identity-preserving bulk updates.
//!
//! Every operation resolves the course first (not-found beats forbidden,
//! kept for behavioral compatibility with the existing frontend), then
//! checks the mutate capability, then validates before any write.

use std::collections::HashSet;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::access;
use crate::domain::{ContentBody, ContentItem, Course, CourseStatus, Role, Section, User};
use crate::error::ApiError;
use crate::protocol::{ContentItemIn, CourseIn, CourseUpdateIn, SectionIn, SectionUpdateIn};
use crate::state::AppState;

const CONTENT_TYPES: [&str; 5] = ["video", "markdown", "quiz", "multipleChoice", "document"];

/// Validate a draft item. Type membership fires first, then the common
/// title rule, then type-specific field rules. The returned error says
/// what is wrong with this single item.
pub fn validate_content_item(item: &ContentItemIn) -> Result<(), ApiError> {
  let kind = item.kind.as_deref().unwrap_or("");
  if !CONTENT_TYPES.contains(&kind) {
    return Err(ApiError::invalid(format!("invalid content type: '{}'", kind)));
  }
  if item.title.as_deref().map(str::trim).unwrap_or("").is_empty() {
    return Err(ApiError::invalid("content item title is required"));
  }
  match kind {
    "markdown" => {
      if item.content.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(ApiError::invalid("markdown content is required"));
      }
    }
    "multipleChoice" => {
      let question_ok = !item.question.as_deref().map(str::trim).unwrap_or("").is_empty();
      let options_ok = item.options.as_ref().map(|o| o.len() == 4).unwrap_or(false);
      let correct_ok = matches!(item.correct_option, Some(0..=3));
      if !(question_ok && options_ok && correct_ok) {
        return Err(ApiError::invalid(
          "invalid multiple choice fields: a question, exactly 4 options and a correctOption between 0 and 3 are required",
        ));
      }
    }
    _ => {}
  }
  Ok(())
}

/// Validate a draft and materialize it. A carried id is preserved; a
/// missing one gets a fresh identity.
pub fn build_content_item(item: ContentItemIn) -> Result<ContentItem, ApiError> {
  validate_content_item(&item)?;
  let body = match item.kind.as_deref().unwrap_or("") {
    "video" => ContentBody::Video { video_url: item.video_url.unwrap_or_default() },
    "markdown" => ContentBody::Markdown { content: item.content.unwrap_or_default() },
    "quiz" => ContentBody::Quiz { content: item.content.unwrap_or_default() },
    "multipleChoice" => ContentBody::MultipleChoice {
      question: item.question.unwrap_or_default(),
      options: item.options.unwrap_or_default(),
      correct_option: item.correct_option.unwrap_or_default() as u32,
    },
    "document" => ContentBody::Document { document_url: item.document_url.unwrap_or_default() },
    other => return Err(ApiError::invalid(format!("invalid content type: '{}'", other))),
  };
  Ok(ContentItem {
    id: item.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
    title: item.title.unwrap_or_default(),
    body,
  })
}

fn validate_section_title(title: Option<&str>) -> Result<String, ApiError> {
  match title.map(str::trim) {
    Some(t) if !t.is_empty() => Ok(t.to_string()),
    _ => Err(ApiError::invalid("section title is required")),
  }
}

async fn resolve_course(state: &AppState, course_id: &str) -> Result<Course, ApiError> {
  state
    .find_course(course_id)
    .await
    .ok_or_else(|| ApiError::not_found("course"))
}

async fn resolve_for_mutation(state: &AppState, caller: &User, course_id: &str) -> Result<Course, ApiError> {
  let course = resolve_course(state, course_id).await?;
  if !access::can_mutate(caller, &course) {
    return Err(ApiError::forbidden("instructor or admin"));
  }
  Ok(course)
}

fn find_section_mut<'a>(course: &'a mut Course, section_id: &str) -> Result<&'a mut Section, ApiError> {
  course
    .sections
    .iter_mut()
    .find(|s| s.id == section_id)
    .ok_or_else(|| ApiError::not_found("section"))
}

/// Create a draft course owned by the caller. Any status supplied by the
/// client is ignored: new courses are always drafts, and the owner is
/// fixed here once and never reassigned by updates.
#[instrument(level = "info", skip(state, caller, input), fields(caller = %caller.id))]
pub async fn create_course(state: &AppState, caller: &User, input: CourseIn) -> Result<Course, ApiError> {
  if caller.role != Role::Instructor && caller.role != Role::Admin {
    return Err(ApiError::forbidden("instructor"));
  }
  let title = match input.title.as_deref().map(str::trim) {
    Some(t) if !t.is_empty() => t.to_string(),
    _ => return Err(ApiError::invalid("course title is required")),
  };
  let course = Course {
    id: Uuid::new_v4().to_string(),
    title,
    description: input.description.unwrap_or_default(),
    markdown_description: input.markdown_description,
    price: input.price.unwrap_or(0.0),
    owner: caller.id.clone(),
    duration: input.duration,
    status: CourseStatus::Draft,
    sections: Vec::new(),
    content: Vec::new(),
  };
  state.insert_course(course.clone()).await;
  info!(target: "course", id = %course.id, owner = %course.owner, "Course created (draft)");
  Ok(course)
}

/// Metadata-only update. Owner and status are untouchable here.
#[instrument(level = "info", skip(state, caller, patch), fields(caller = %caller.id, %course_id))]
pub async fn update_course_metadata(
  state: &AppState,
  caller: &User,
  course_id: &str,
  patch: CourseUpdateIn,
) -> Result<Course, ApiError> {
  let mut course = resolve_for_mutation(state, caller, course_id).await?;
  if let Some(title) = patch.title {
    let t = title.trim().to_string();
    if t.is_empty() {
      return Err(ApiError::invalid("course title is required"));
    }
    course.title = t;
  }
  if let Some(description) = patch.description {
    course.description = description;
  }
  if patch.markdown_description.is_some() {
    course.markdown_description = patch.markdown_description;
  }
  if let Some(price) = patch.price {
    course.price = price;
  }
  if patch.duration.is_some() {
    course.duration = patch.duration;
  }
  state.save_course(course).await
}

/// Publish a draft. Instructor only (admin may mutate content but not
/// publish). Requires at least one content item anywhere in the course,
/// and enrolls the instructor in their own course as a side effect.
#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id, %course_id))]
pub async fn publish_course(state: &AppState, caller: &User, course_id: &str) -> Result<Course, ApiError> {
  let mut course = resolve_course(state, course_id).await?;
  if !access::is_instructor(caller, &course) {
    return Err(ApiError::forbidden("course instructor"));
  }
  if course.status == CourseStatus::Published {
    return Err(ApiError::invalid("course is already published"));
  }
  if course.content_item_count() == 0 {
    return Err(ApiError::invalid("course must contain at least one content item before publishing"));
  }
  course.status = CourseStatus::Published;
  let course = state.save_course(course).await?;

  // Auto-enroll the publishing instructor. Re-read the user so a stale
  // principal cannot clobber a concurrent enrollment list change.
  if let Some(mut owner) = state.find_user(&caller.id).await {
    if !owner.enrolled_courses.iter().any(|c| c == &course.id) {
      owner.enrolled_courses.push(course.id.clone());
      state.save_user(owner).await;
    }
  }
  info!(target: "course", id = %course.id, "Course published");
  Ok(course)
}

/// Append a new section. The whole content array is validated before the
/// section is created.
#[instrument(level = "info", skip(state, caller, input), fields(caller = %caller.id, %course_id))]
pub async fn add_section(
  state: &AppState,
  caller: &User,
  course_id: &str,
  input: SectionIn,
) -> Result<Course, ApiError> {
  let mut course = resolve_for_mutation(state, caller, course_id).await?;
  let title = validate_section_title(input.title.as_deref())?;
  let mut content = Vec::with_capacity(input.content.len());
  for item in input.content {
    content.push(build_content_item(item)?);
  }
  let section = Section {
    id: Uuid::new_v4().to_string(),
    title,
    description: input.description,
    order: input.order,
    content,
  };
  info!(target: "course", id = %course.id, section = %section.id, items = section.content.len(), "Section added");
  course.sections.push(section);
  state.save_course(course).await
}

/// Bulk replace of the section tree with identity reconciliation, applied
/// recursively one level down:
///   - an incoming section whose id matches an existing one keeps that id,
///     and its items keep ids that match items already in that section;
///   - any unmatched id (section or item) is treated as new and replaced by
///     a fresh repository-assigned identity.
/// Old sections and items not referenced by the payload are dropped. The
/// whole payload is validated before any write (all-or-nothing), and a
/// carried id may appear at most once.
#[instrument(level = "info", skip(state, caller, incoming), fields(caller = %caller.id, %course_id, sections = incoming.len()))]
pub async fn update_sections(
  state: &AppState,
  caller: &User,
  course_id: &str,
  incoming: Vec<SectionIn>,
) -> Result<Course, ApiError> {
  let mut course = resolve_for_mutation(state, caller, course_id).await?;

  let mut seen_section_ids: HashSet<&str> = HashSet::new();
  for section in &incoming {
    validate_section_title(section.title.as_deref())?;
    if let Some(id) = section.id.as_deref() {
      if !seen_section_ids.insert(id) {
        return Err(ApiError::invalid(format!("duplicate section id '{}' in payload", id)));
      }
    }
    let mut seen_item_ids: HashSet<&str> = HashSet::new();
    for item in &section.content {
      validate_content_item(item)?;
      if let Some(id) = item.id.as_deref() {
        if !seen_item_ids.insert(id) {
          return Err(ApiError::invalid(format!("duplicate content id '{}' in payload", id)));
        }
      }
    }
  }

  let existing_ids: HashSet<String> = course.sections.iter().map(|s| s.id.clone()).collect();
  let mut next = Vec::with_capacity(incoming.len());
  for section in incoming {
    let matched_id = section.id.clone().filter(|id| existing_ids.contains(id));
    // Item ids only survive when they match an item in the matched section.
    let existing_item_ids: HashSet<&str> = matched_id
      .as_ref()
      .and_then(|id| course.sections.iter().find(|s| &s.id == id))
      .map(|s| s.content.iter().map(|c| c.id.as_str()).collect())
      .unwrap_or_default();
    let mut content = Vec::with_capacity(section.content.len());
    for mut item in section.content {
      item.id = item.id.filter(|id| existing_item_ids.contains(id.as_str()));
      content.push(build_content_item(item)?);
    }
    next.push(Section {
      id: matched_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
      title: section.title.unwrap_or_default(),
      description: section.description,
      order: section.order,
      content,
    });
  }
  course.sections = next;
  info!(target: "course", id = %course.id, sections = course.sections.len(), "Sections replaced");
  state.save_course(course).await
}

/// Partial field update on one section. Title stays required.
#[instrument(level = "info", skip(state, caller, patch), fields(caller = %caller.id, %course_id, %section_id))]
pub async fn update_section(
  state: &AppState,
  caller: &User,
  course_id: &str,
  section_id: &str,
  patch: SectionUpdateIn,
) -> Result<Course, ApiError> {
  let mut course = resolve_for_mutation(state, caller, course_id).await?;
  let title = validate_section_title(patch.title.as_deref())?;
  let section = find_section_mut(&mut course, section_id)?;
  section.title = title;
  if patch.description.is_some() {
    section.description = patch.description;
  }
  if patch.order.is_some() {
    section.order = patch.order;
  }
  state.save_course(course).await
}

/// Remove one section and everything in it.
#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id, %course_id, %section_id))]
pub async fn delete_section(
  state: &AppState,
  caller: &User,
  course_id: &str,
  section_id: &str,
) -> Result<Course, ApiError> {
  let mut course = resolve_for_mutation(state, caller, course_id).await?;
  let pos = course
    .sections
    .iter()
    .position(|s| s.id == section_id)
    .ok_or_else(|| ApiError::not_found("section"))?;
  course.sections.remove(pos);
  info!(target: "course", id = %course.id, section = %section_id, "Section deleted");
  state.save_course(course).await
}

#[instrument(level = "info", skip(state, caller, item), fields(caller = %caller.id, %course_id, %section_id))]
pub async fn add_content_to_section(
  state: &AppState,
  caller: &User,
  course_id: &str,
  section_id: &str,
  item: ContentItemIn,
) -> Result<Course, ApiError> {
  let mut course = resolve_for_mutation(state, caller, course_id).await?;
  let built = build_content_item(item)?;
  let section = find_section_mut(&mut course, section_id)?;
  info!(target: "course", id = %course_id, section = %section_id, content = %built.id, kind = built.body.type_name(), "Content item added");
  section.content.push(built);
  state.save_course(course).await
}

/// Merge a patch into an existing item: patch fields overwrite, unspecified
/// fields persist (including across a type change), and the merged result
/// is validated as a full item of its resulting type. Identity never moves.
#[instrument(level = "info", skip(state, caller, patch), fields(caller = %caller.id, %course_id, %section_id, %content_id))]
pub async fn update_content_in_section(
  state: &AppState,
  caller: &User,
  course_id: &str,
  section_id: &str,
  content_id: &str,
  patch: ContentItemIn,
) -> Result<Course, ApiError> {
  let mut course = resolve_for_mutation(state, caller, course_id).await?;
  let section = find_section_mut(&mut course, section_id)?;
  let pos = section
    .content
    .iter()
    .position(|c| c.id == content_id)
    .ok_or_else(|| ApiError::not_found("content item"))?;

  let merged = ContentItemIn::from(&section.content[pos]).overlay(patch);
  let mut built = build_content_item(merged)?;
  built.id = content_id.to_string();
  section.content[pos] = built;
  state.save_course(course).await
}

#[instrument(level = "info", skip(state, caller), fields(caller = %caller.id, %course_id, %section_id, %content_id))]
pub async fn delete_content_from_section(
  state: &AppState,
  caller: &User,
  course_id: &str,
  section_id: &str,
  content_id: &str,
) -> Result<Course, ApiError> {
  let mut course = resolve_for_mutation(state, caller, course_id).await?;
  let section = find_section_mut(&mut course, section_id)?;
  let pos = section
    .content
    .iter()
    .position(|c| c.id == content_id)
    .ok_or_else(|| ApiError::not_found("content item"))?;
  section.content.remove(pos);
  info!(target: "course", id = %course.id, section = %section_id, content = %content_id, "Content item deleted");
  state.save_course(course).await
}
