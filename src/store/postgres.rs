// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::{
    error::{AppError, CLASS_NOT_FOUND, LESSON_NOT_FOUND},
    models::{class::Class, lesson::Lesson, user::User},
    store::{ClassFilter, ClassMutation, ClassStore, LessonStore, ScheduleFilter, UserStore},
};

/// PostgreSQL-backed store. Lessons and classes are JSONB documents; the
/// columns next to `body` only exist for filtering and ordering.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Helper struct for reading the 'users' table.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password: String,
    role: String,
    group_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            password: row.password,
            role: row.role.parse().map_err(AppError::InternalServerError)?,
            group: row.group_name,
            created_at: row.created_at,
        })
    }
}

type ClassRow = (i64, Json<Class>);

fn into_class((version, Json(mut class)): ClassRow) -> Class {
    class.version = version;
    class
}

/// `%needle%` with LIKE wildcards in the needle escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_class_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ClassFilter) {
    qb.push(" WHERE TRUE");
    if let Some(title) = &filter.title {
        qb.push(" AND title ILIKE ").push_bind(like_pattern(title));
    }
    if let Some(short_title) = &filter.short_title {
        qb.push(" AND short_title ILIKE ").push_bind(like_pattern(short_title));
    }
    if let Some(group) = &filter.group {
        qb.push(" AND group_name ILIKE ").push_bind(like_pattern(group));
    }
    if let Some(lesson_id) = filter.lesson_id {
        qb.push(" AND lesson_id = ").push_bind(lesson_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.begin_from {
        qb.push(" AND begin_at >= ").push_bind(from);
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password, role, group_name, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch user: {:?}", e);
            AppError::from(e)
        })?;

        row.map(User::try_from).transpose()
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password, role, group_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.role.as_str())
        .bind(&user.group)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                AppError::Conflict(format!("Username '{}' already exists", user.username))
            } else {
                tracing::error!("Failed to insert user: {:?}", e);
                AppError::from(e)
            }
        })?;
        Ok(())
    }
}

#[async_trait]
impl LessonStore for PgStore {
    async fn insert(&self, lesson: &Lesson) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO lessons (id, subject_id, topic, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(lesson.id)
        .bind(&lesson.subject_id)
        .bind(&lesson.topic)
        .bind(Json(lesson))
        .bind(lesson.created_at)
        .bind(lesson.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert lesson: {:?}", e);
            AppError::from(e)
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Lesson>, AppError> {
        let row: Option<(Json<Lesson>,)> =
            sqlx::query_as("SELECT body FROM lessons WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(lesson),)| lesson))
    }

    async fn replace(&self, lesson: &Lesson) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE lessons
            SET subject_id = $2, topic = $3, body = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(lesson.id)
        .bind(&lesson.subject_id)
        .bind(&lesson.topic)
        .bind(Json(lesson))
        .bind(lesson.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update lesson: {:?}", e);
            AppError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(LESSON_NOT_FOUND));
        }
        Ok(())
    }
}

#[async_trait]
impl ClassStore for PgStore {
    async fn insert(&self, class: &Class) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO classes
            (id, version, lesson_id, group_name, title, short_title, status, begin_at, created_at, updated_at, body)
            VALUES ($1, 0, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(class.id)
        .bind(class.lesson.id)
        .bind(&class.group)
        .bind(&class.title)
        .bind(&class.short_title)
        .bind(class.status.as_str())
        .bind(class.begin_at)
        .bind(class.created_at)
        .bind(class.updated_at)
        .bind(Json(class))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert class: {:?}", e);
            AppError::from(e)
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Class>, AppError> {
        let row: Option<ClassRow> = sqlx::query_as("SELECT version, body FROM classes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_class))
    }

    async fn update(&self, id: Uuid, mutation: &mut ClassMutation<'_>) -> Result<Class, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent updates of this class queue up behind us.
        let row: Option<ClassRow> =
            sqlx::query_as("SELECT version, body FROM classes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let mut class = row
            .map(into_class)
            .ok_or_else(|| AppError::not_found(CLASS_NOT_FOUND))?;
        let expected_version = class.version;

        // Dropping `tx` on error rolls back.
        mutation(&mut class)?;

        let result = sqlx::query(
            r#"
            UPDATE classes
            SET version = version + 1,
                lesson_id = $3, group_name = $4, title = $5, short_title = $6,
                status = $7, begin_at = $8, updated_at = $9, body = $10
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(class.lesson.id)
        .bind(&class.group)
        .bind(&class.title)
        .bind(&class.short_title)
        .bind(class.status.as_str())
        .bind(class.begin_at)
        .bind(class.updated_at)
        .bind(Json(&class))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save class {}: {:?}", id, e);
            AppError::from(e)
        })?;

        if result.rows_affected() == 0 {
            tracing::warn!("Class {} changed concurrently (version {})", id, expected_version);
            return Err(AppError::StaleWrite);
        }

        tx.commit().await?;
        class.version = expected_version + 1;
        Ok(class)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete class: {:?}", e);
                AppError::from(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &ClassFilter) -> Result<(Vec<Class>, i64), AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM classes");
        push_class_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut page_query = QueryBuilder::<Postgres>::new("SELECT version, body FROM classes");
        push_class_filters(&mut page_query, filter);
        page_query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows: Vec<ClassRow> = page_query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list classes: {:?}", e);
                AppError::from(e)
            })?;

        Ok((rows.into_iter().map(into_class).collect(), total))
    }

    async fn schedule(&self, filter: &ScheduleFilter) -> Result<Vec<Class>, AppError> {
        let rows: Vec<ClassRow> = sqlx::query_as(
            r#"
            SELECT version, body
            FROM classes
            WHERE ($1::TEXT[] IS NULL OR lower(group_name) = ANY($1))
              AND ($2::TIMESTAMPTZ IS NULL OR begin_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR begin_at <= $3)
            ORDER BY begin_at ASC
            "#,
        )
        .bind(&filter.groups)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch schedule: {:?}", e);
            AppError::from(e)
        })?;

        Ok(rows.into_iter().map(into_class).collect())
    }
}
