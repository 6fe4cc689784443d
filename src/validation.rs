use validator::Validate;

use crate::error::AppError;

/// Runs `validator` constraint checks and folds the first failure into a
/// 400-mapped validation error with the field's message.
pub trait ValidateExt: Sized {
    fn validate_custom(self) -> Result<Self, AppError>;
}

impl<T: Validate> ValidateExt for T {
    fn validate_custom(self) -> Result<Self, AppError> {
        match self.validate() {
            Ok(()) => Ok(self),
            Err(errors) => Err(AppError::Validation(first_error_message(&errors))),
        }
    }
}

fn first_error_message(errors: &validator::ValidationErrors) -> String {
    for (field, field_errors) in errors.field_errors() {
        if let Some(error) = field_errors.first() {
            return error
                .message
                .clone()
                .unwrap_or_else(|| format!("Invalid value for {}", field).into())
                .to_string();
        }
    }

    "Validation failed".to_string()
}
