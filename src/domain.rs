//! Domain models: users and roles, courses with sections and content items,
//! and per-user progress records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global account role. The per-course instructor relation is separate:
/// see `access::is_instructor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Student,
  Instructor,
  Admin,
}
impl Default for Role {
  fn default() -> Self { Role::Student }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub role: Role,
  pub full_name: String,
  #[serde(default)] pub enrolled_courses: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
  Draft,
  Published,
}

/// Core course structure persisted in-memory.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub markdown_description: Option<String>,
  #[serde(default)] pub price: f64,
  /// Owning instructor. Legacy records store the display name; courses
  /// created through the API store the creator's id. Both forms are
  /// honored by the access checks.
  pub owner: String,
  #[serde(default)] pub duration: Option<String>,
  pub status: CourseStatus,
  #[serde(default)] pub sections: Vec<Section>,
  /// Legacy flat content list, for courses that predate sections.
  #[serde(default)] pub content: Vec<ContentItem>,
}

impl Course {
  /// Total content items across all sections plus the legacy flat list.
  pub fn content_item_count(&self) -> usize {
    self.sections.iter().map(|s| s.content.len()).sum::<usize>() + self.content.len()
  }

  /// Iterate every content item the course owns, sections first.
  pub fn all_content(&self) -> impl Iterator<Item = &ContentItem> {
    self.sections.iter().flat_map(|s| s.content.iter()).chain(self.content.iter())
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: Option<String>,
  #[serde(default)] pub order: Option<i32>,
  #[serde(default)] pub content: Vec<ContentItem>,
}

/// An addressable leaf unit of course material.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
  pub id: String,
  pub title: String,
  #[serde(flatten)] pub body: ContentBody,
}

/// Type-specific payload of a content item, tagged by `type` on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBody {
  #[serde(rename_all = "camelCase")]
  Video { video_url: String },
  Markdown { content: String },
  Quiz {
    #[serde(default)] content: String,
  },
  #[serde(rename_all = "camelCase")]
  MultipleChoice {
    question: String,
    options: Vec<String>,
    correct_option: u32,
  },
  #[serde(rename_all = "camelCase")]
  Document { document_url: String },
}

impl ContentBody {
  pub fn type_name(&self) -> &'static str {
    match self {
      ContentBody::Video { .. } => "video",
      ContentBody::Markdown { .. } => "markdown",
      ContentBody::Quiz { .. } => "quiz",
      ContentBody::MultipleChoice { .. } => "multipleChoice",
      ContentBody::Document { .. } => "document",
    }
  }

  /// Types that carry answers and show up in quiz analytics.
  pub fn is_scored(&self) -> bool {
    matches!(self, ContentBody::Quiz { .. } | ContentBody::MultipleChoice { .. })
  }
}

/// Natural key of a progress record. At most one record exists per key;
/// resubmission overwrites under this key rather than duplicating.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgressKey {
  pub user_id: String,
  pub course_id: String,
  pub section_id: Option<String>,
  pub content_id: String,
}

/// The durable fact that a user completed (and possibly answered) a
/// content item within a course.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
  pub user_id: String,
  pub course_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub section_id: Option<String>,
  pub content_id: String,
  pub completed: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub answer: Option<String>,
  pub score: f64,
}

impl ProgressRecord {
  pub fn key(&self) -> ProgressKey {
    ProgressKey {
      user_id: self.user_id.clone(),
      course_id: self.course_id.clone(),
      section_id: self.section_id.clone(),
      content_id: self.content_id.clone(),
    }
  }
}
