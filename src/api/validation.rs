use regex::Regex;
use std::sync::OnceLock;

use super::{ApiError, FieldError};
use crate::models::StudentInput;

/// Width of the text columns in the `students` table.
pub const MAX_TEXT_LEN: usize = 255;

const MAX_LOCAL_PART_LEN: usize = 64;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~.-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*\.[A-Za-z]{2,63}$",
        )
        .expect("Invalid regex")
    })
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().count() > MAX_TEXT_LEN || !email_regex().is_match(email) {
        return false;
    }

    let Some((local, _)) = email.rsplit_once('@') else {
        return false;
    };

    local.len() <= MAX_LOCAL_PART_LEN
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
}

fn check_text(field: &str, value: &str, errors: &mut Vec<FieldError>) {
    if value.is_empty() {
        errors.push(FieldError::new(field, format!("{field} cannot be empty")));
    } else if value.chars().count() > MAX_TEXT_LEN {
        errors.push(FieldError::new(
            field,
            format!("{field} must be {MAX_TEXT_LEN} characters or less"),
        ));
    }
}

/// Checks a create/update payload, reporting every offending field at once.
pub fn validate_student_input(input: &StudentInput) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    check_text("name", &input.name, &mut errors);

    if !is_valid_email(&input.email) {
        errors.push(FieldError::new(
            "email",
            "value is not a valid email address",
        ));
    }

    check_text("course", &input.course, &mut errors);

    if input.age < 0 {
        errors.push(FieldError::new(
            "age",
            format!("Invalid age: {}. Age must be greater than or equal to 0", input.age),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationError(errors))
    }
}
