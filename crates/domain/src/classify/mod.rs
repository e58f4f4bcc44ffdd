//! Classification engine: query language and rule evaluation.
//!
//! Everything in this module is pure. Rules and events come in as plain
//! values; the evaluator performs no I/O and is fully deterministic.

mod evaluator;
mod query;

pub use evaluator::{
    classify_event, synthesize_fingerprint_rules, ClassificationOutcome, ProjectFingerprints,
    RuleCandidate, RuleOrigin, RuleTarget,
};
pub use query::{CmpOp, Field, Query, QueryError};

use chrono::{DateTime, Utc};

/// The event attributes the query language can match against
#[derive(Debug, Clone, Default)]
pub struct EventFacts {
    pub title: String,
    pub description: Option<String>,
    pub attendee_emails: Vec<String>,
    pub organizer_email: Option<String>,
    pub response_status: Option<String>,
    pub is_recurring: bool,
    pub transparency: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}
