// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, CLASS_NOT_FOUND, LESSON_NOT_FOUND},
    models::{class::Class, lesson::Lesson, user::User},
    store::{ClassFilter, ClassMutation, ClassStore, LessonStore, ScheduleFilter, UserStore},
};

/// Process-local store. Each collection sits behind one async mutex, which
/// serializes every update of a class.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    lessons: Mutex<HashMap<Uuid, Lesson>>,
    classes: Mutex<HashMap<Uuid, Class>>,
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.lock().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl LessonStore for MemoryStore {
    async fn insert(&self, lesson: &Lesson) -> Result<(), AppError> {
        self.lessons.lock().await.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Lesson>, AppError> {
        Ok(self.lessons.lock().await.get(&id).cloned())
    }

    async fn replace(&self, lesson: &Lesson) -> Result<(), AppError> {
        let mut lessons = self.lessons.lock().await;
        let slot = lessons
            .get_mut(&lesson.id)
            .ok_or_else(|| AppError::not_found(LESSON_NOT_FOUND))?;
        *slot = lesson.clone();
        Ok(())
    }
}

#[async_trait]
impl ClassStore for MemoryStore {
    async fn insert(&self, class: &Class) -> Result<(), AppError> {
        let mut stored = class.clone();
        stored.version = 0;
        self.classes.lock().await.insert(class.id, stored);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Class>, AppError> {
        Ok(self.classes.lock().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, mutation: &mut ClassMutation<'_>) -> Result<Class, AppError> {
        let mut classes = self.classes.lock().await;
        let current = classes
            .get(&id)
            .ok_or_else(|| AppError::not_found(CLASS_NOT_FOUND))?;

        // Work on a copy so a failing mutation leaves the stored class as it was.
        let mut draft = current.clone();
        mutation(&mut draft)?;
        draft.version = current.version + 1;

        classes.insert(id, draft.clone());
        Ok(draft)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.classes.lock().await.remove(&id).is_some())
    }

    async fn list(&self, filter: &ClassFilter) -> Result<(Vec<Class>, i64), AppError> {
        let classes = self.classes.lock().await;
        let mut matching: Vec<&Class> = classes.values().filter(|c| filter.matches(c)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn schedule(&self, filter: &ScheduleFilter) -> Result<Vec<Class>, AppError> {
        let classes = self.classes.lock().await;
        let mut matching: Vec<Class> = classes
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.begin_at.cmp(&b.begin_at));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{class::ClassStatus, lesson::empty_document};
    use chrono::{Duration, Utc};

    fn class(group: &str, title: &str, offset_hours: i64) -> Class {
        let now = Utc::now();
        Class {
            id: Uuid::new_v4(),
            group: group.to_string(),
            title: title.to_string(),
            short_title: title.chars().take(3).collect(),
            begin_at: now + Duration::hours(offset_hours),
            status: ClassStatus::Opened,
            lesson: Lesson {
                id: Uuid::new_v4(),
                topic: "Topic".to_string(),
                hours: 1.0,
                subject_id: "subject".to_string(),
                content: empty_document(),
                quizzes: vec![],
                created_at: now,
                updated_at: now,
            },
            quiz_results: vec![],
            created_at: now + Duration::seconds(offset_hours),
            updated_at: now,
            version: 0,
        }
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let store = MemoryStore::default();
        let c = class("7a", "History", 0);
        ClassStore::insert(&store, &c).await.unwrap();

        let updated = store
            .update(c.id, &mut |class: &mut Class| {
                class.title = "Modern History".to_string();
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.version, 1);

        let stored = ClassStore::find_by_id(&store, c.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Modern History");
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn failed_mutation_writes_nothing() {
        let store = MemoryStore::default();
        let c = class("7a", "History", 0);
        ClassStore::insert(&store, &c).await.unwrap();

        let err = store
            .update(c.id, &mut |class: &mut Class| {
                class.title = "half-done".to_string();
                Err(AppError::conflict("nope"))
            })
            .await
            .unwrap_err();
        assert_eq!(err, AppError::conflict("nope"));

        let stored = ClassStore::find_by_id(&store, c.id).await.unwrap().unwrap();
        assert_eq!(stored, c);
    }

    #[tokio::test]
    async fn update_of_missing_class_is_not_found() {
        let store = MemoryStore::default();
        let err = store
            .update(Uuid::new_v4(), &mut |_: &mut Class| Ok(()))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::not_found(CLASS_NOT_FOUND));
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let store = MemoryStore::default();
        for (i, title) in ["Algebra", "Geometry", "algebra II"].iter().enumerate() {
            ClassStore::insert(&store, &class("7a", title, i as i64)).await.unwrap();
        }

        let filter = ClassFilter {
            title: Some("ALGEBRA".to_string()),
            limit: 1,
            ..Default::default()
        };
        let (page, total) = store.list(&filter).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "algebra II");
    }

    #[tokio::test]
    async fn schedule_is_sorted_and_scoped_to_groups() {
        let store = MemoryStore::default();
        ClassStore::insert(&store, &class("7A", "Late", 5)).await.unwrap();
        ClassStore::insert(&store, &class("7a", "Early", 1)).await.unwrap();
        ClassStore::insert(&store, &class("8b", "Other", 2)).await.unwrap();

        let filter = ScheduleFilter {
            groups: Some(vec!["7a".to_string()]),
            ..Default::default()
        };
        let titles: Vec<String> = store
            .schedule(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["Early".to_string(), "Late".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryStore::default();
        let user = User {
            id: Uuid::new_v4(),
            username: "ivan".to_string(),
            password: "hash".to_string(),
            role: crate::models::user::Role::Student,
            group: None,
            created_at: Utc::now(),
        };
        UserStore::insert(&store, &user).await.unwrap();
        let twin = User { id: Uuid::new_v4(), ..user };
        assert!(matches!(
            UserStore::insert(&store, &twin).await,
            Err(AppError::Conflict(_))
        ));
    }
}
