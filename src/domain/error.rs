use {
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

/// One violated field from payload validation. Every violation is collected
/// so a bulk caller can fix a whole row at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Field-level rejection reported by the platform's discount mutation.
/// Surfaced verbatim to the caller; retrying the same payload won't help.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUserError {
    #[serde(default)]
    pub field: Vec<String>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum PromoError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("not eligible: {0}")]
    NotEligible(String),

    #[error("an active discount already exists for this user")]
    Conflict,

    #[error("shop discount quota exhausted")]
    QuotaExceeded,

    #[error("generated code already exists in the ledger")]
    ConflictCode,

    #[error("platform rejected the discount ({} error(s))", .0.len())]
    ExternalRejected(Vec<PlatformUserError>),

    #[error("platform unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("webhook signature: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
