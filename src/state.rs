//! Application state: in-memory repositories for users, courses and
//! progress records.
//!
//! This module owns:
//!   - the user store (by id)
//!   - the course store (by id)
//!   - the progress store, keyed by the natural (user, course, section,
//!     content) key so duplicates are impossible by construction
//!
//! Engines receive `&AppState` explicitly; there is no module-level
//! mutable state anywhere in this crate.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::{load_platform_config_from_env, PlatformConfig};
use crate::content::build_content_item;
use crate::domain::{Course, CourseStatus, ProgressKey, ProgressRecord, Role, User};
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<RwLock<HashMap<String, User>>>,
    pub courses: Arc<RwLock<HashMap<String, Course>>>,
    pub progress: Arc<RwLock<HashMap<ProgressKey, ProgressRecord>>>,
}

impl AppState {
    /// Build state from env: load the TOML bank if configured.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_platform_config_from_env())
    }

    /// Build state from an explicit (possibly absent) bank. Invalid bank
    /// entries are skipped with an error log, never a panic.
    pub fn from_config(cfg: Option<PlatformConfig>) -> Self {
        let mut user_map = HashMap::<String, User>::new();
        let mut course_map = HashMap::<String, Course>::new();

        if let Some(cfg) = cfg {
            for uc in cfg.users {
                let id = uc.id.unwrap_or_else(|| Uuid::new_v4().to_string());
                user_map.insert(
                    id.clone(),
                    User {
                        id,
                        role: uc.role.unwrap_or_default(),
                        full_name: uc.full_name,
                        enrolled_courses: uc.enrolled_courses,
                    },
                );
            }

            'courses: for cc in cfg.courses {
                let id = cc.id.unwrap_or_else(|| Uuid::new_v4().to_string());
                let mut content = Vec::with_capacity(cc.content.len());
                for item in cc.content {
                    match build_content_item(item) {
                        Ok(built) => content.push(built),
                        Err(e) => {
                            error!(target: "course", %id, error = %e, "Skipping bank course: invalid content item");
                            continue 'courses;
                        }
                    }
                }
                course_map.insert(
                    id.clone(),
                    Course {
                        id,
                        title: cc.title,
                        description: cc.description.unwrap_or_default(),
                        markdown_description: None,
                        price: cc.price.unwrap_or(0.0),
                        owner: cc.owner,
                        duration: cc.duration,
                        status: if cc.published { CourseStatus::Published } else { CourseStatus::Draft },
                        sections: Vec::new(),
                        content,
                    },
                );
            }
        }

        // Startup inventory by role/status.
        let mut by_role = (0usize, 0usize, 0usize);
        for u in user_map.values() {
            match u.role {
                Role::Student => by_role.0 += 1,
                Role::Instructor => by_role.1 += 1,
                Role::Admin => by_role.2 += 1,
            }
        }
        let published = course_map.values().filter(|c| c.status == CourseStatus::Published).count();
        info!(
            target: "learnhub_backend",
            students = by_role.0,
            instructors = by_role.1,
            admins = by_role.2,
            courses = course_map.len(),
            published,
            "Startup inventory"
        );

        Self {
            users: Arc::new(RwLock::new(user_map)),
            courses: Arc::new(RwLock::new(course_map)),
            progress: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // ---- User repository ----

    pub async fn find_user(&self, id: &str) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    pub async fn save_user(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn remove_user(&self, id: &str) -> Option<User> {
        self.users.write().await.remove(id)
    }

    pub async fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        users
    }

    /// Ids of users whose enrollment list contains this course.
    pub async fn enrolled_user_ids(&self, course_id: &str) -> Vec<String> {
        self.users
            .read()
            .await
            .values()
            .filter(|u| u.enrolled_courses.iter().any(|c| c == course_id))
            .map(|u| u.id.clone())
            .collect()
    }

    // ---- Course repository ----

    pub async fn find_course(&self, id: &str) -> Option<Course> {
        self.courses.read().await.get(id).cloned()
    }

    pub async fn insert_course(&self, course: Course) {
        self.courses.write().await.insert(course.id.clone(), course);
    }

    /// Persist an updated course. The id must already exist; a vanished id
    /// means the storage invariant broke mid-request.
    pub async fn save_course(&self, course: Course) -> Result<Course, ApiError> {
        let mut courses = self.courses.write().await;
        if !courses.contains_key(&course.id) {
            error!(target: "course", id = %course.id, "save_course: id vanished from store");
            return Err(ApiError::Internal);
        }
        courses.insert(course.id.clone(), course.clone());
        Ok(course)
    }

    pub async fn list_courses(&self) -> Vec<Course> {
        let mut courses: Vec<Course> = self.courses.read().await.values().cloned().collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        courses
    }

    // ---- Progress store ----

    /// Upsert under the natural key: a single insert while holding the
    /// write lock, so concurrent resubmissions serialize to one surviving
    /// record (last writer wins) and duplicates cannot exist.
    pub async fn upsert_progress(&self, record: ProgressRecord) -> ProgressRecord {
        self.progress.write().await.insert(record.key(), record.clone());
        record
    }

    pub async fn progress_for_user_course(&self, user_id: &str, course_id: &str) -> Vec<ProgressRecord> {
        self.progress
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id && r.course_id == course_id)
            .cloned()
            .collect()
    }

    pub async fn progress_for_course(&self, course_id: &str) -> Vec<ProgressRecord> {
        self.progress
            .read()
            .await
            .values()
            .filter(|r| r.course_id == course_id)
            .cloned()
            .collect()
    }
}
