//! Public request/response structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ContentBody, ContentItem, Course, CourseStatus, ProgressRecord, Role};

//
// Incoming content items arrive as a flat draft: every type-specific field
// is optional here and the mutation engine validates the combination against
// the declared `type`. The same shape doubles as the patch form.
//

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItemIn {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_option: Option<i64>,
    #[serde(default)]
    pub document_url: Option<String>,
}

impl ContentItemIn {
    /// Overlay `patch` on top of `self`: patch fields overwrite, unspecified
    /// fields persist. Used by updateContentInSection.
    pub fn overlay(mut self, patch: ContentItemIn) -> ContentItemIn {
        if patch.id.is_some() { self.id = patch.id; }
        if patch.title.is_some() { self.title = patch.title; }
        if patch.kind.is_some() { self.kind = patch.kind; }
        if patch.video_url.is_some() { self.video_url = patch.video_url; }
        if patch.content.is_some() { self.content = patch.content; }
        if patch.question.is_some() { self.question = patch.question; }
        if patch.options.is_some() { self.options = patch.options; }
        if patch.correct_option.is_some() { self.correct_option = patch.correct_option; }
        if patch.document_url.is_some() { self.document_url = patch.document_url; }
        self
    }
}

/// Flatten a stored item back into draft form so a patch can be merged
/// field-by-field before re-validation.
impl From<&ContentItem> for ContentItemIn {
    fn from(item: &ContentItem) -> Self {
        let mut draft = ContentItemIn {
            id: Some(item.id.clone()),
            title: Some(item.title.clone()),
            kind: Some(item.body.type_name().to_string()),
            ..ContentItemIn::default()
        };
        match &item.body {
            ContentBody::Video { video_url } => draft.video_url = Some(video_url.clone()),
            ContentBody::Markdown { content } => draft.content = Some(content.clone()),
            ContentBody::Quiz { content } => draft.content = Some(content.clone()),
            ContentBody::MultipleChoice { question, options, correct_option } => {
                draft.question = Some(question.clone());
                draft.options = Some(options.clone());
                draft.correct_option = Some(*correct_option as i64);
            }
            ContentBody::Document { document_url } => draft.document_url = Some(document_url.clone()),
        }
        draft
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionIn {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub content: Vec<ContentItemIn>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionUpdateIn {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: Option<i32>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseIn {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub markdown_description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Metadata patch. Owner and status are deliberately absent: neither is
/// reachable through update operations.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdateIn {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub markdown_description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIn {
    pub full_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdateIn {
    pub role: Role,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProgressIn {
    /// Free-form on the wire: multiple-choice coerces it to an option
    /// index, quiz requires a non-empty string, other types store it as-is.
    #[serde(default)]
    pub answer: Option<Value>,
}

//
// Outgoing DTOs
//

/// Reduced projection served to callers without view-full capability:
/// no sections, no content.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCourseOut {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_description: Option<String>,
    pub price: f64,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub status: CourseStatus,
}

/// Convert a full `Course` (internal) to the public projection.
pub fn to_public(c: &Course) -> PublicCourseOut {
    PublicCourseOut {
        id: c.id.clone(),
        title: c.title.clone(),
        description: c.description.clone(),
        markdown_description: c.markdown_description.clone(),
        price: c.price,
        owner: c.owner.clone(),
        duration: c.duration.clone(),
        status: c.status,
    }
}

/// Either the full course or the public projection, decided per caller.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CourseViewOut {
    Full(Course),
    Public(PublicCourseOut),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOut {
    /// Always present, even when empty.
    pub records: Vec<ProgressRecord>,
    /// Rounded to 2 decimals; 0 when the course has no content items.
    pub progress_percentage: f64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizStatOut {
    pub content_id: String,
    pub title: String,
    pub submissions: usize,
    pub average_score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOut {
    pub total_enrolled_students: usize,
    pub active_students_last_30_days: usize,
    pub completion_rate: f64,
    pub quiz_stats: Vec<QuizStatOut>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct DeletedOut {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Section;

    #[test]
    fn public_projection_carries_no_content_fields() {
        let course = Course {
            id: "c-1".into(),
            title: "Rust 101".into(),
            description: "intro".into(),
            markdown_description: None,
            price: 10.0,
            owner: "Grace Hopper".into(),
            duration: None,
            status: CourseStatus::Published,
            sections: vec![Section {
                id: "s-1".into(),
                title: "Intro".into(),
                description: None,
                order: None,
                content: vec![ContentItem {
                    id: "i-1".into(),
                    title: "Welcome".into(),
                    body: ContentBody::Video { video_url: "https://x".into() },
                }],
            }],
            content: vec![],
        };

        let value = serde_json::to_value(to_public(&course)).unwrap();
        assert!(value.get("sections").is_none());
        assert!(value.get("content").is_none());
        assert_eq!(value["status"], "published");
        assert_eq!(value["owner"], "Grace Hopper");

        // The full view keeps the tree, with the type tag inline.
        let full = serde_json::to_value(CourseViewOut::Full(course)).unwrap();
        assert_eq!(full["sections"][0]["content"][0]["type"], "video");
        assert_eq!(full["sections"][0]["content"][0]["videoUrl"], "https://x");
    }

    #[test]
    fn content_draft_roundtrips_through_overlay() {
        let item = ContentItem {
            id: "i-1".into(),
            title: "Checkpoint".into(),
            body: ContentBody::MultipleChoice {
                question: "pick one".into(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_option: 2,
            },
        };
        let draft = ContentItemIn::from(&item);
        assert_eq!(draft.kind.as_deref(), Some("multipleChoice"));
        assert_eq!(draft.correct_option, Some(2));

        let patched = draft.overlay(ContentItemIn {
            correct_option: Some(3),
            ..ContentItemIn::default()
        });
        assert_eq!(patched.correct_option, Some(3));
        assert_eq!(patched.question.as_deref(), Some("pick one"));
    }
}
