//! Unified error handling for the order desk.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::drafts::DraftError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend call failed.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// Draft operation failed.
    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),
}

impl AppError {
    /// Whether the failure is ours or the backend's rather than the user's.
    #[must_use]
    pub const fn is_server_side(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Api(e) | Self::Draft(DraftError::Api(e)) => api_error_is_server_side(e),
            Self::Draft(_) => false,
        }
    }

    /// Log the error and, for server-side failures, send it to Sentry.
    pub fn report(&self) {
        if self.is_server_side() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Order desk error"
            );
        } else {
            tracing::warn!(error = %self, "Order desk request refused");
        }
    }

    /// Message safe to show to staff.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) => "The order desk is misconfigured".to_string(),
            Self::Api(e) | Self::Draft(DraftError::Api(e)) if e.is_retryable() => {
                "The server could not be reached, please try again".to_string()
            }
            _ => self.to_string(),
        }
    }
}

const fn api_error_is_server_side(err: &ApiError) -> bool {
    match err {
        ApiError::Network(_) | ApiError::Timeout(_) | ApiError::Decode(_) => true,
        ApiError::Rejected { status, .. } => *status >= 500,
        ApiError::Unauthorized(_) | ApiError::NotFound(_) | ApiError::RateLimited(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::DraftRequirement;

    #[test]
    fn test_app_error_display() {
        let err = AppError::from(ApiError::NotFound("order 123".to_string()));
        assert_eq!(err.to_string(), "Backend error: Not found: order 123");

        let err = AppError::from(DraftError::CapacityExceeded { max: 10 });
        assert_eq!(err.to_string(), "Draft error: cannot open more than 10 drafts");
    }

    #[test]
    fn test_server_side_classification() {
        assert!(AppError::from(ConfigError::MissingEnvVar("BACKOFFICE_API_URL".to_string()))
            .is_server_side());
        assert!(AppError::from(ApiError::Timeout("30s".to_string())).is_server_side());
        assert!(
            AppError::from(DraftError::Api(ApiError::Rejected {
                status: 502,
                message: String::new()
            }))
            .is_server_side()
        );

        assert!(
            !AppError::from(ApiError::Rejected {
                status: 409,
                message: "already cancelled".to_string()
            })
            .is_server_side()
        );
        assert!(
            !AppError::from(DraftError::Validation(vec![DraftRequirement::LineItems]))
                .is_server_side()
        );
    }

    #[test]
    fn test_user_message_hides_transport_details() {
        let err = AppError::from(ApiError::Network("connection refused".to_string()));
        assert_eq!(
            err.user_message(),
            "The server could not be reached, please try again"
        );

        let err = AppError::from(DraftError::VoucherRejected("expired".to_string()));
        assert_eq!(err.user_message(), "Draft error: voucher rejected: expired");
    }
}
