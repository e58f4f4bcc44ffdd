use chrono::NaiveDate;
use thiserror::Error;

/// Domain-level errors representing business logic violations
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Calendar connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Calendar event not found: {0}")]
    EventNotFound(String),

    #[error("Time entry not found: {0}")]
    EntryNotFound(String),

    #[error("Classification rule not found: {0}")]
    RuleNotFound(String),

    #[error("Billing period not found: {0}")]
    BillingPeriodNotFound(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Project name already exists: {0}")]
    DuplicateProjectName(String),

    #[error("Project short code already exists: {0}")]
    DuplicateShortCode(String),

    #[error("Invoice number already exists: {0}")]
    DuplicateInvoiceNumber(String),

    #[error("Unknown query field: {0}")]
    UnknownField(String),

    #[error("Malformed query: {0}")]
    BadQuery(String),

    #[error("Rule must target exactly one of project or attendance")]
    ClassifyTargetConflict,

    #[error("Project is archived and cannot accept classifications")]
    ProjectArchived,

    #[error("Billing period overlaps an existing period for this project")]
    BillingPeriodOverlap,

    #[error("Invoice period overlaps an existing invoice for this project")]
    InvoicePeriodOverlap,

    #[error("No billing rate covers {0}")]
    MissingBillingRate(NaiveDate),

    #[error("Invoice is not in draft status")]
    InvoiceLocked,

    #[error("Time entry is locked by an invoice")]
    EntryLocked,

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Calendar is quarantined and requires re-authorization")]
    CalendarQuarantined,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Calendar provider connection requires re-authorization")]
    NeedsReauth,
}
