// src/store/mod.rs

//! Persistence seams. Aggregates are documents; the class document is the
//! unit of read-modify-write for every quiz action.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        class::{Class, ClassStatus},
        lesson::Lesson,
        user::User,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A mutation applied to a class inside [`ClassStore::update`].
pub type ClassMutation<'a> = dyn FnMut(&mut Class) -> Result<(), AppError> + Send + 'a;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Fails with `Conflict` when the username is taken.
    async fn insert(&self, user: &User) -> Result<(), AppError>;
}

#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn insert(&self, lesson: &Lesson) -> Result<(), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Lesson>, AppError>;

    /// Overwrites a stored lesson. `NotFound` when it does not exist.
    async fn replace(&self, lesson: &Lesson) -> Result<(), AppError>;
}

#[async_trait]
pub trait ClassStore: Send + Sync {
    async fn insert(&self, class: &Class) -> Result<(), AppError>;

    /// Latest committed snapshot, with its `version`.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Class>, AppError>;

    /// Loads the class, applies `mutation` and writes it back as one atomic step.
    ///
    /// Concurrent updates of the same class are serialized. If the mutation
    /// fails nothing is written. A write that loses a version race fails with
    /// [`AppError::StaleWrite`]. Returns the class as stored.
    async fn update(&self, id: Uuid, mutation: &mut ClassMutation<'_>) -> Result<Class, AppError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// A page of classes, newest first, and the total number of matches.
    async fn list(&self, filter: &ClassFilter) -> Result<(Vec<Class>, i64), AppError>;

    /// Classes of some groups in a time window, earliest first.
    async fn schedule(&self, filter: &ScheduleFilter) -> Result<Vec<Class>, AppError>;
}

/// Normalized class listing filter. Text filters are case-insensitive
/// substring matches.
#[derive(Debug, Clone, Default)]
pub struct ClassFilter {
    pub title: Option<String>,
    pub short_title: Option<String>,
    pub group: Option<String>,
    pub lesson_id: Option<Uuid>,
    pub status: Option<ClassStatus>,
    pub begin_from: Option<DateTime<Utc>>,
    pub offset: i64,
    pub limit: i64,
}

fn contains_ignore_case(haystack: &str, needle: &Option<String>) -> bool {
    needle
        .as_ref()
        .is_none_or(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
}

impl ClassFilter {
    pub fn matches(&self, class: &Class) -> bool {
        contains_ignore_case(&class.title, &self.title)
            && contains_ignore_case(&class.short_title, &self.short_title)
            && contains_ignore_case(&class.group, &self.group)
            && self.lesson_id.is_none_or(|id| class.lesson.id == id)
            && self.status.is_none_or(|s| class.status == s)
            && self.begin_from.is_none_or(|from| class.begin_at >= from)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleFilter {
    /// Lower-cased group names. `None` means every group.
    pub groups: Option<Vec<String>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ScheduleFilter {
    pub fn matches(&self, class: &Class) -> bool {
        self.groups
            .as_ref()
            .is_none_or(|groups| groups.contains(&class.group.to_lowercase()))
            && self.from.is_none_or(|from| class.begin_at >= from)
            && self.to.is_none_or(|to| class.begin_at <= to)
    }
}

/// Every store the application needs, behind trait objects.
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserStore>,
    pub lessons: Arc<dyn LessonStore>,
    pub classes: Arc<dyn ClassStore>,
}

impl Store {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Store {
            users: store.clone(),
            lessons: store.clone(),
            classes: store,
        }
    }

    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Store {
            users: store.clone(),
            lessons: store.clone(),
            classes: store,
        }
    }
}
