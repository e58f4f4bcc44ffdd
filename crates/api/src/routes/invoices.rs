//! Invoice engine: snapshot-priced, locked invoices over a project range.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use db::models::{CreateInvoice, CreateLineItem, Invoice, InvoiceLineItem, InvoiceStatus};
use db::{BillingPeriodRepository, InvoiceRepository, ProjectRepository, TimeEntryRepository, UserRepository};
use shared::types::ProjectId;
use shared::{AppError, DateRange, DomainError};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    metrics,
    state::AppState,
    timesheet,
};

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: String,
    pub project_id: String,
    pub billing_period_id: Option<String>,
    pub invoice_number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub invoice_date: NaiveDate,
    pub status: String,
    pub total_hours: Decimal,
    pub total_amount: Decimal,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id.to_string(),
            project_id: invoice.project_id.to_string(),
            billing_period_id: invoice.billing_period_id.map(|id| id.to_string()),
            invoice_number: invoice.invoice_number,
            period_start: invoice.period_start,
            period_end: invoice.period_end,
            invoice_date: invoice.invoice_date,
            status: invoice.status.to_string(),
            total_hours: invoice.total_hours,
            total_amount: invoice.total_amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub id: String,
    pub time_entry_id: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    pub amount: Decimal,
}

impl From<InvoiceLineItem> for LineItemResponse {
    fn from(line: InvoiceLineItem) -> Self {
        Self {
            id: line.id.to_string(),
            time_entry_id: line.time_entry_id.to_string(),
            date: line.date,
            description: line.description,
            hours: line.hours,
            hourly_rate: line.hourly_rate,
            amount: line.amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceWithLines {
    pub invoice: InvoiceResponse,
    pub line_items: Vec<LineItemResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub project_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
}

fn line_amount(hours: Decimal, rate: Decimal) -> Decimal {
    (hours * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Create a draft invoice: materialize every day in range (0h placeholders
/// included), snapshot hours and the billing rate per day into line items,
/// and lock the entries. Fails when any day lacks a rate or the range
/// overlaps an existing invoice for the project.
pub async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<Json<InvoiceWithLines>> {
    let project_id: ProjectId = req
        .project_id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid project ID".to_string())))?;

    let range = DateRange::new(req.period_start, req.period_end)
        .map_err(|e| ApiError::from(DomainError::InvalidDateRange(e.to_string())))?;

    if req.invoice_number.trim().is_empty() {
        return Err(ApiError::from(AppError::Validation(
            "Invoice number must not be empty".to_string(),
        )));
    }

    ProjectRepository::find_by_id(&state.pool, auth.user_id, project_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::ProjectNotFound(req.project_id.clone())))?;

    let user = UserRepository::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::UserNotFound(auth.user_id.to_string())))?;

    let projects = ProjectRepository::list_by_user(&state.pool, auth.user_id, true).await?;
    let periods =
        BillingPeriodRepository::list_by_project(&state.pool, auth.user_id, project_id).await?;

    // Every day needs a rate before anything is written
    let mut rates: Vec<(NaiveDate, Decimal)> = Vec::new();
    for date in range.days() {
        let rate = periods
            .iter()
            .find(|p| p.covers(date))
            .map(|p| p.hourly_rate)
            .ok_or_else(|| ApiError::from(DomainError::MissingBillingRate(date)))?;
        rates.push((date, rate));
    }

    // When one period covers the whole range, reference it on the invoice
    let billing_period_id = periods
        .iter()
        .find(|p| p.covers(range.start) && p.covers(range.end))
        .map(|p| p.id);

    let mut tx = state.pool.begin().await?;

    if InvoiceRepository::overlap_exists(&mut tx, auth.user_id, project_id, range.start, range.end)
        .await?
    {
        return Err(ApiError::from(DomainError::InvoicePeriodOverlap));
    }

    let entries =
        timesheet::materialize_range_for_invoice(&mut tx, &user, project_id, range, &projects)
            .await?;

    let mut total_hours = Decimal::ZERO;
    let mut total_amount = Decimal::ZERO;
    let mut lines = Vec::with_capacity(entries.len());

    for entry in &entries {
        let (_, rate) = rates
            .iter()
            .find(|(date, _)| *date == entry.date)
            .expect("every day in range has a rate");
        let amount = line_amount(entry.hours, *rate);

        total_hours += entry.hours;
        total_amount += amount;

        lines.push(CreateLineItem {
            time_entry_id: entry.id,
            date: entry.date,
            description: entry.description.clone().or_else(|| entry.title.clone()),
            hours: entry.hours,
            hourly_rate: *rate,
            amount,
        });
    }

    let invoice = InvoiceRepository::insert(
        &mut tx,
        CreateInvoice {
            user_id: auth.user_id,
            project_id,
            billing_period_id,
            invoice_number: req.invoice_number.clone(),
            period_start: range.start,
            period_end: range.end,
            invoice_date: req.invoice_date,
            total_hours,
            total_amount,
        },
    )
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.constraint() == Some("invoices_user_id_invoice_number_key") {
                return ApiError::from(DomainError::DuplicateInvoiceNumber(
                    req.invoice_number.clone(),
                ));
            }
        }
        ApiError::from(e)
    })?;

    let mut line_items = Vec::with_capacity(lines.len());
    for line in lines {
        let entry_id = line.time_entry_id;
        let item = InvoiceRepository::insert_line_item(&mut tx, invoice.id, line).await?;
        TimeEntryRepository::attach_invoice(&mut tx, entry_id, invoice.id).await?;
        line_items.push(item);
    }

    tx.commit().await?;
    metrics::record_invoice_created();

    Ok(Json(InvoiceWithLines {
        invoice: invoice.into(),
        line_items: line_items.into_iter().map(LineItemResponse::from).collect(),
    }))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<InvoiceResponse>>> {
    let invoices = InvoiceRepository::list_by_user(&state.pool, auth.user_id).await?;
    Ok(Json(invoices.into_iter().map(InvoiceResponse::from).collect()))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceWithLines>> {
    let invoice_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid invoice ID".to_string())))?;

    let invoice = InvoiceRepository::find_by_id(&state.pool, auth.user_id, invoice_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::InvoiceNotFound(id)))?;

    let line_items = InvoiceRepository::list_line_items(&state.pool, invoice.id).await?;

    Ok(Json(InvoiceWithLines {
        invoice: invoice.into(),
        line_items: line_items.into_iter().map(LineItemResponse::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: InvoiceStatus,
}

/// Move an invoice along draft -> sent -> paid (sent -> draft allowed)
pub async fn update_invoice_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<InvoiceResponse>> {
    let invoice_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid invoice ID".to_string())))?;

    let invoice = InvoiceRepository::find_by_id(&state.pool, auth.user_id, invoice_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::InvoiceNotFound(id)))?;

    if !invoice.status.can_transition_to(req.status) {
        return Err(ApiError::from(DomainError::InvalidStateTransition(format!(
            "{} -> {}",
            invoice.status, req.status
        ))));
    }

    let updated = InvoiceRepository::update_status(&state.pool, auth.user_id, invoice.id, req.status)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::InvoiceNotFound(invoice.id.to_string())))?;

    Ok(Json(updated.into()))
}

/// Delete a draft invoice; line items cascade and its entries unlock.
/// Sent and paid invoices cannot be deleted.
pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let invoice_id = id
        .parse()
        .map_err(|_| ApiError::from(AppError::Validation("Invalid invoice ID".to_string())))?;

    let invoice = InvoiceRepository::find_by_id(&state.pool, auth.user_id, invoice_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::InvoiceNotFound(id)))?;

    if invoice.status != InvoiceStatus::Draft {
        return Err(ApiError::from(DomainError::InvoiceLocked));
    }

    let mut tx = state.pool.begin().await?;
    TimeEntryRepository::detach_invoice(&mut tx, invoice.id).await?;
    InvoiceRepository::delete(&mut tx, auth.user_id, invoice.id).await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
