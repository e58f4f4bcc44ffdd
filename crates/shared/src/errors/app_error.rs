use super::DomainError;
use thiserror::Error;

/// Application-level errors (includes infrastructure)
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Domain(e) => match e {
                DomainError::ProjectNotFound(_)
                | DomainError::CalendarNotFound(_)
                | DomainError::ConnectionNotFound(_)
                | DomainError::EventNotFound(_)
                | DomainError::EntryNotFound(_)
                | DomainError::RuleNotFound(_)
                | DomainError::BillingPeriodNotFound(_)
                | DomainError::InvoiceNotFound(_)
                | DomainError::UserNotFound(_) => 404,
                DomainError::EmailAlreadyExists
                | DomainError::DuplicateProjectName(_)
                | DomainError::DuplicateShortCode(_)
                | DomainError::DuplicateInvoiceNumber(_)
                | DomainError::BillingPeriodOverlap
                | DomainError::InvoicePeriodOverlap
                | DomainError::InvoiceLocked
                | DomainError::EntryLocked
                | DomainError::ProjectArchived
                | DomainError::CalendarQuarantined
                | DomainError::InvalidStateTransition(_) => 409,
                DomainError::InvalidCredentials
                | DomainError::InvalidToken
                | DomainError::TokenExpired
                | DomainError::NeedsReauth => 401,
                _ => 400,
            },
            AppError::Database(_) | AppError::Internal(_) => 500,
            AppError::ExternalApi(_) => 503,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 422,
            AppError::Timeout => 504,
            AppError::RateLimited => 429,
        }
    }

    /// Get a machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Domain(e) => match e {
                DomainError::ProjectNotFound(_) => "project_not_found",
                DomainError::CalendarNotFound(_) => "calendar_not_found",
                DomainError::ConnectionNotFound(_) => "connection_not_found",
                DomainError::EventNotFound(_) => "event_not_found",
                DomainError::EntryNotFound(_) => "entry_not_found",
                DomainError::RuleNotFound(_) => "rule_not_found",
                DomainError::BillingPeriodNotFound(_) => "billing_period_not_found",
                DomainError::InvoiceNotFound(_) => "invoice_not_found",
                DomainError::UserNotFound(_) => "user_not_found",
                DomainError::EmailAlreadyExists => "email_exists",
                DomainError::DuplicateProjectName(_) => "duplicate_project_name",
                DomainError::DuplicateShortCode(_) => "duplicate_short_code",
                DomainError::DuplicateInvoiceNumber(_) => "duplicate_invoice_number",
                DomainError::UnknownField(_) => "unknown_field",
                DomainError::BadQuery(_) => "bad_query",
                DomainError::ClassifyTargetConflict => "classify_target_conflict",
                DomainError::ProjectArchived => "project_archived",
                DomainError::BillingPeriodOverlap => "billing_period_overlap",
                DomainError::InvoicePeriodOverlap => "invoice_period_overlap",
                DomainError::MissingBillingRate(_) => "missing_billing_rate",
                DomainError::InvoiceLocked => "invoice_locked",
                DomainError::EntryLocked => "entry_locked",
                DomainError::InvalidDateRange(_) => "invalid_date_range",
                DomainError::InvalidStateTransition(_) => "invalid_state_transition",
                DomainError::CalendarQuarantined => "calendar_quarantined",
                DomainError::InvalidCredentials => "invalid_credentials",
                DomainError::InvalidToken => "invalid_token",
                DomainError::TokenExpired => "token_expired",
                DomainError::NeedsReauth => "needs_reauth",
            },
            AppError::Database(_) => "database_error",
            AppError::ExternalApi(_) => "external_api_error",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::Internal(_) => "internal_error",
            AppError::Timeout => "timeout",
            AppError::RateLimited => "rate_limited",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // Log the actual error but don't expose details
        tracing::error!("Database error: {:?}", err);
        AppError::Database(err.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
