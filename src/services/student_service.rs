//! Domain service for student records.
//!
//! Handlers talk to this trait only, so the HTTP layer can be exercised
//! against any implementation.

use crate::models::{Student, StudentInput};
use thiserror::Error;

/// Errors from student operations.
#[derive(Debug, Error)]
pub enum StudentError {
    #[error("Student not found: {0}")]
    NotFound(i32),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for StudentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Domain service trait for student records.
///
/// Every call runs in its own database session; mutations are committed
/// before the call returns.
#[async_trait::async_trait]
pub trait StudentService: Send + Sync {
    /// Registers a new student.
    ///
    /// # Errors
    /// Returns [`StudentError::EmailTaken`] if another student already uses the email.
    async fn create(&self, input: StudentInput) -> Result<Student, StudentError>;

    /// Lists every student, ordered by id.
    async fn list(&self) -> Result<Vec<Student>, StudentError>;

    /// # Errors
    /// Returns [`StudentError::NotFound`] if no student has this id.
    async fn get(&self, id: i32) -> Result<Student, StudentError>;

    /// Replaces all client-supplied fields of a student and refreshes `updated_at`.
    ///
    /// # Errors
    /// Returns [`StudentError::NotFound`] if no student has this id, or
    /// [`StudentError::EmailTaken`] if the new email belongs to someone else.
    async fn update(&self, id: i32, input: StudentInput) -> Result<Student, StudentError>;

    /// # Errors
    /// Returns [`StudentError::NotFound`] if no student has this id.
    async fn delete(&self, id: i32) -> Result<(), StudentError>;
}
