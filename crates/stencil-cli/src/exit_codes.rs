//! Exit codes for the `stencil` binary.

use stencil_core::StencilError;

pub const SUCCESS: i32 = 0;
pub const USER_ERROR: i32 = 1; // Validation, render or lookup failure
pub const AUTH_ERROR: i32 = 2; // Grading service rejected the credentials
pub const REMOTE_ERROR: i32 = 3; // Grading service, timeout or cancellation
pub const INTERNAL_ERROR: i32 = 4; // Storage, IO or configuration

pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<StencilError>() {
        Some(e) => e.exit_code(),
        None => INTERNAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::ValidationError;

    #[test]
    fn maps_core_errors() {
        let err = anyhow::Error::new(StencilError::from(ValidationError::new("name", "bad")));
        assert_eq!(for_error(&err), USER_ERROR);
        assert_eq!(for_error(&anyhow::anyhow!("other")), INTERNAL_ERROR);
        assert_eq!(
            for_error(&anyhow::Error::new(StencilError::Canceled)),
            REMOTE_ERROR
        );
    }

    #[test]
    fn codes_line_up_with_core() {
        let err = StencilError::from(stencil_core::GradingError::Authentication {
            message: "x".into(),
        });
        assert_eq!(err.exit_code(), AUTH_ERROR);
    }
}
