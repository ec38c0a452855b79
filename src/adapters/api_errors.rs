use crate::domain::error::PromoError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Newtype over the domain error so the HTTP mapping lives in the adapter
/// layer and handlers can use `?`.
pub struct ApiError(pub PromoError);

impl From<PromoError> for ApiError {
    fn from(err: PromoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, detail) = match &self.0 {
            PromoError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "validation_failed",
                self.0.to_string(),
                Some(serde_json::json!({ "fields": fields })),
            ),
            PromoError::NotEligible(reason) => (
                StatusCode::FORBIDDEN,
                "not_eligible",
                reason.clone(),
                None,
            ),
            PromoError::Conflict => (
                StatusCode::CONFLICT,
                "duplicate_discount",
                self.0.to_string(),
                None,
            ),
            PromoError::QuotaExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                self.0.to_string(),
                None,
            ),
            // Two collisions in a row means the regeneration retry is spent.
            PromoError::ConflictCode => {
                tracing::error!("code collision survived regeneration");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                    None,
                )
            }
            PromoError::ExternalRejected(errors) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "platform_rejected",
                self.0.to_string(),
                Some(serde_json::json!({ "platform_errors": errors })),
            ),
            PromoError::ExternalUnavailable(reason) => {
                tracing::warn!("platform unavailable: {reason}");
                (
                    StatusCode::BAD_GATEWAY,
                    "platform_unavailable",
                    "the commerce platform did not accept the request".to_string(),
                    None,
                )
            }
            PromoError::Unauthorized(reason) => {
                tracing::warn!("webhook rejected: {reason}");
                (
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "invalid webhook signature".to_string(),
                    None,
                )
            }
            PromoError::NotFound(what) => {
                (StatusCode::NOT_FOUND, "not_found", what.clone(), None)
            }
            PromoError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                    None,
                )
            }
            PromoError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                    None,
                )
            }
        };

        let mut body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });
        if let (Some(obj), Some(serde_json::Value::Object(extra))) = (body.as_object_mut(), detail)
        {
            obj.extend(extra);
        }

        (status, Json(body)).into_response()
    }
}
