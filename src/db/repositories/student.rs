use crate::db::Session;
use crate::entities::{prelude::*, students};
use crate::models::{Student, StudentInput};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{NotSet, Set, Unchanged},
    ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, SqlErr,
};

/// Student queries scoped to one [`Session`].
pub struct StudentRepository<'a> {
    session: &'a Session,
}

impl<'a> StudentRepository<'a> {
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    // ========================================================================
    // Row Mapping
    // ========================================================================

    fn new_row(input: StudentInput, now: DateTime<Utc>) -> students::ActiveModel {
        let stamp = format_timestamp(now);
        students::ActiveModel {
            id: NotSet,
            name: Set(input.name),
            email: Set(input.email),
            course: Set(input.course),
            age: Set(input.age),
            created_at: Set(stamp.clone()),
            updated_at: Set(stamp),
        }
    }

    fn replacement_row(
        id: i32,
        input: StudentInput,
        updated_at: DateTime<Utc>,
    ) -> students::ActiveModel {
        students::ActiveModel {
            id: Unchanged(id),
            name: Set(input.name),
            email: Set(input.email),
            course: Set(input.course),
            age: Set(input.age),
            created_at: NotSet,
            updated_at: Set(format_timestamp(updated_at)),
        }
    }

    fn map_row(row: students::Model) -> Result<Student> {
        Ok(Student {
            created_at: parse_timestamp(&row.created_at)
                .with_context(|| format!("Corrupt created_at on student {}", row.id))?,
            updated_at: parse_timestamp(&row.updated_at)
                .with_context(|| format!("Corrupt updated_at on student {}", row.id))?,
            id: row.id,
            name: row.name,
            email: row.email,
            course: row.course,
            age: row.age,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, id: i32) -> Result<Option<Student>> {
        let row = Students::find_by_id(id)
            .one(self.session.connection())
            .await
            .context("Failed to query student by id")?;

        row.map(Self::map_row).transpose()
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<Student>> {
        let row = Students::find()
            .filter(students::Column::Email.eq(email))
            .one(self.session.connection())
            .await
            .context("Failed to query student by email")?;

        row.map(Self::map_row).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<Student>> {
        let rows = Students::find()
            .order_by_asc(students::Column::Id)
            .all(self.session.connection())
            .await
            .context("Failed to list students")?;

        rows.into_iter().map(Self::map_row).collect()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn insert(&self, input: StudentInput, now: DateTime<Utc>) -> Result<Student> {
        let row = Self::new_row(input, now)
            .insert(self.session.connection())
            .await
            .context("Failed to insert student")?;

        Self::map_row(row)
    }

    /// Overwrites the client-supplied fields of student `id`.
    ///
    /// Returns `None` if the row no longer exists.
    pub async fn replace(
        &self,
        id: i32,
        input: StudentInput,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Student>> {
        match Self::replacement_row(id, input, updated_at)
            .update(self.session.connection())
            .await
        {
            Ok(row) => Self::map_row(row).map(Some),
            Err(DbErr::RecordNotUpdated | DbErr::RecordNotFound(_)) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to update student")),
        }
    }

    pub async fn remove(&self, id: i32) -> Result<bool> {
        let result = Students::delete_by_id(id)
            .exec(self.session.connection())
            .await
            .context("Failed to delete student")?;

        Ok(result.rows_affected > 0)
    }
}

/// Whether `err` was caused by the store rejecting a duplicate unique key.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<DbErr>().and_then(|db| db.sql_err()),
            Some(SqlErr::UniqueConstraintViolation(_))
        )
    })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}
