//! Student CRUD endpoints.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use std::sync::Arc;

use super::observability;
use super::validation::validate_student_input;
use super::{ApiError, AppState, MessageResponse, StudentDto};
use crate::models::StudentInput;
use crate::services::StudentError;

impl From<StudentError> for ApiError {
    fn from(err: StudentError) -> Self {
        match err {
            StudentError::NotFound(_) => Self::student_not_found(),
            StudentError::EmailTaken(_) => Self::email_taken(),
            StudentError::Database(msg) => Self::DatabaseError(msg),
            StudentError::Internal(msg) => Self::internal(msg),
        }
    }
}

/// `POST /students`
pub async fn create_student(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StudentInput>, JsonRejection>,
) -> Result<Json<StudentDto>, ApiError> {
    let Json(input) = payload?;
    validate_student_input(&input)?;

    let student = state.students().create(input).await?;
    observability::record_created_student(student.id);
    Ok(Json(StudentDto::from(student)))
}

/// `GET /students` (also answers `HEAD`)
pub async fn list_students(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StudentDto>>, ApiError> {
    let students = state.students().list().await?;
    Ok(Json(students.into_iter().map(StudentDto::from).collect()))
}

/// `GET /students/{id}`
pub async fn get_student(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<StudentDto>, ApiError> {
    let Path(id) = id?;
    let student = state.students().get(id).await?;
    Ok(Json(StudentDto::from(student)))
}

/// `PUT /students/{id}`
///
/// Full replacement: all four client fields are overwritten.
pub async fn update_student(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<StudentInput>, JsonRejection>,
) -> Result<Json<StudentDto>, ApiError> {
    let Path(id) = id?;
    let Json(input) = payload?;
    validate_student_input(&input)?;

    let student = state.students().update(id, input).await?;
    Ok(Json(StudentDto::from(student)))
}

/// `DELETE /students/{id}`
pub async fn delete_student(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = id?;
    state.students().delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Student deleted successfully",
    }))
}
