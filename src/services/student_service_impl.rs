//! `SeaORM` implementation of the `StudentService` trait.

use crate::db::repositories::student::is_unique_violation;
use crate::db::{Store, StudentRepository};
use crate::models::student::{next_updated_at, timestamp_now};
use crate::models::{Student, StudentInput};
use crate::services::student_service::{StudentError, StudentService};
use async_trait::async_trait;
use tracing::{debug, info};

pub struct SeaOrmStudentService {
    store: Store,
}

impl SeaOrmStudentService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    fn write_error(err: anyhow::Error, email: String) -> StudentError {
        if is_unique_violation(&err) {
            StudentError::EmailTaken(email)
        } else {
            StudentError::from(err)
        }
    }
}

#[async_trait]
impl StudentService for SeaOrmStudentService {
    async fn create(&self, input: StudentInput) -> Result<Student, StudentError> {
        let session = self.store.open_session().await?;
        let repo = StudentRepository::new(&session);

        if repo.get_by_email(&input.email).await?.is_some() {
            return Err(StudentError::EmailTaken(input.email));
        }

        // A concurrent create can still win between the check and the insert;
        // the unique index turns that into EmailTaken as well.
        let email = input.email.clone();
        let student = repo
            .insert(input, timestamp_now())
            .await
            .map_err(|e| Self::write_error(e, email.clone()))?;

        session
            .commit()
            .await
            .map_err(|e| Self::write_error(e, email))?;

        info!(student_id = student.id, "Created student");
        Ok(student)
    }

    async fn list(&self) -> Result<Vec<Student>, StudentError> {
        let session = self.store.open_session().await?;
        let students = StudentRepository::new(&session).list_all().await?;
        session.close().await?;

        debug!(count = students.len(), "Listed students");
        Ok(students)
    }

    async fn get(&self, id: i32) -> Result<Student, StudentError> {
        let session = self.store.open_session().await?;
        let student = StudentRepository::new(&session).get(id).await?;
        session.close().await?;

        student.ok_or(StudentError::NotFound(id))
    }

    async fn update(&self, id: i32, input: StudentInput) -> Result<Student, StudentError> {
        let session = self.store.open_session().await?;
        let repo = StudentRepository::new(&session);

        let existing = repo.get(id).await?.ok_or(StudentError::NotFound(id))?;
        let updated_at = next_updated_at(existing.updated_at, timestamp_now());

        let email = input.email.clone();
        let student = repo
            .replace(id, input, updated_at)
            .await
            .map_err(|e| Self::write_error(e, email.clone()))?
            .ok_or(StudentError::NotFound(id))?;

        session
            .commit()
            .await
            .map_err(|e| Self::write_error(e, email))?;

        info!(student_id = id, "Updated student");
        Ok(student)
    }

    async fn delete(&self, id: i32) -> Result<(), StudentError> {
        let session = self.store.open_session().await?;

        if !StudentRepository::new(&session).remove(id).await? {
            return Err(StudentError::NotFound(id));
        }

        session.commit().await?;

        info!(student_id = id, "Deleted student");
        Ok(())
    }
}
