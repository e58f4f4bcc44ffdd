use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use shared::types::{BillingPeriodId, ProjectId, UserId};

/// An hourly-rate interval for one project.
///
/// Periods never overlap; an open-ended period (`ends_on` null) extends to
/// infinity and therefore excludes any later period.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub id: BillingPeriodId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub hourly_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillingPeriod {
    /// Whether this period covers a given day
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.starts_on <= day && self.ends_on.map(|end| day <= end).unwrap_or(true)
    }
}

/// Input for creating a billing period
#[derive(Debug, Clone)]
pub struct CreateBillingPeriod {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub hourly_rate: Decimal,
}
