//! Exit codes for the CLI

use convoy_core::error::{ConvoyError, WorkflowError};

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Git error
pub const GIT_ERROR: i32 = 3;

/// Version error
pub const VERSION_ERROR: i32 = 4;

/// Validation error
pub const VALIDATION_ERROR: i32 = 5;

/// Publish error
pub const PUBLISH_ERROR: i32 = 6;

/// User cancelled
pub const CANCELLED: i32 = 130;

/// Exit code for a failed run
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ConvoyError>() {
        Some(ConvoyError::Config(_)) => CONFIG_ERROR,
        Some(ConvoyError::Git(_)) => GIT_ERROR,
        Some(ConvoyError::Version(_)) => VERSION_ERROR,
        Some(ConvoyError::Registry(_)) => PUBLISH_ERROR,
        Some(ConvoyError::Workflow(WorkflowError::PublishAborted { .. })) => PUBLISH_ERROR,
        Some(ConvoyError::Workflow(WorkflowError::Cancelled)) => CANCELLED,
        Some(ConvoyError::Workflow(_)) => VALIDATION_ERROR,
        _ => ERROR,
    }
}
