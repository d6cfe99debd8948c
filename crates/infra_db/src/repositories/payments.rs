//! Payment repository
//!
//! Payments, their applications, and pending allocations. The critical path
//! is `record_allocation`: applications, mutated quota balances, and the
//! pending surplus commit in one transaction, so a crash mid-allocation
//! never leaves a payment half-applied. The unique (payment, quota) pair is
//! the storage-level guard against double application.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{Currency, Money, PaymentId};
use domain_payment::{
    AllocationOutcome, AllocationStatus, Payment, PaymentApplication, PaymentMethod,
    PaymentPendingAllocation, PaymentStatus,
};
use domain_quota::Quota;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

fn payment_status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::PendingVerification => "pending_verification",
        PaymentStatus::Verified => "verified",
        PaymentStatus::Rejected => "rejected",
        PaymentStatus::Refunded => "refunded",
    }
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus, DatabaseError> {
    match s {
        "pending_verification" => Ok(PaymentStatus::PendingVerification),
        "verified" => Ok(PaymentStatus::Verified),
        "rejected" => Ok(PaymentStatus::Rejected),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(DatabaseError::Mapping(format!(
            "unknown payment status {other:?}"
        ))),
    }
}

fn method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Transfer => "transfer",
        PaymentMethod::Cash => "cash",
        PaymentMethod::Card => "card",
        PaymentMethod::Gateway => "gateway",
    }
}

fn parse_method(s: &str) -> Result<PaymentMethod, DatabaseError> {
    match s {
        "transfer" => Ok(PaymentMethod::Transfer),
        "cash" => Ok(PaymentMethod::Cash),
        "card" => Ok(PaymentMethod::Card),
        "gateway" => Ok(PaymentMethod::Gateway),
        other => Err(DatabaseError::Mapping(format!(
            "unknown payment method {other:?}"
        ))),
    }
}

fn allocation_status_str(status: AllocationStatus) -> &'static str {
    match status {
        AllocationStatus::Pending => "pending",
        AllocationStatus::Allocated => "allocated",
        AllocationStatus::Refunded => "refunded",
    }
}

fn parse_allocation_status(s: &str) -> Result<AllocationStatus, DatabaseError> {
    match s {
        "pending" => Ok(AllocationStatus::Pending),
        "allocated" => Ok(AllocationStatus::Allocated),
        "refunded" => Ok(AllocationStatus::Refunded),
        other => Err(DatabaseError::Mapping(format!(
            "unknown allocation status {other:?}"
        ))),
    }
}

fn currency_from(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_code(code).map_err(|e| DatabaseError::Mapping(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    condominium_id: Uuid,
    unit_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    payment_date: NaiveDate,
    method: String,
    reference: Option<String>,
    receipt_url: Option<String>,
    registered_by: Option<Uuid>,
    verified_by: Option<Uuid>,
    rejection_reason: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> Result<Payment, DatabaseError> {
        Ok(Payment::restore(
            self.payment_id.into(),
            self.condominium_id.into(),
            self.unit_id.map(Into::into),
            Money::new(self.amount, currency_from(&self.currency)?),
            self.payment_date,
            parse_method(&self.method)?,
            self.reference,
            self.receipt_url,
            self.registered_by.map(Into::into),
            self.verified_by.map(Into::into),
            self.rejection_reason,
            parse_payment_status(&self.status)?,
            self.created_at,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    application_id: Uuid,
    payment_id: Uuid,
    quota_id: Uuid,
    applied_to_principal: Decimal,
    applied_to_interest: Decimal,
    quota_currency: String,
    amount_in_payment_currency: Decimal,
    payment_currency: String,
    exchange_rate_used: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_domain(self) -> Result<PaymentApplication, DatabaseError> {
        let quota_ccy = currency_from(&self.quota_currency)?;
        let payment_ccy = currency_from(&self.payment_currency)?;
        let rate = self
            .exchange_rate_used
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
        let mut application = PaymentApplication::new(
            self.payment_id.into(),
            self.quota_id.into(),
            Money::new(self.applied_to_principal, quota_ccy),
            Money::new(self.applied_to_interest, quota_ccy),
            Money::new(self.amount_in_payment_currency, payment_ccy),
            rate,
        );
        application.id = self.application_id.into();
        application.created_at = self.created_at;
        Ok(application)
    }
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    pending_id: Uuid,
    payment_id: Uuid,
    amount: Decimal,
    currency: String,
    status: String,
    allocated_to: Option<Uuid>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl PendingRow {
    fn into_domain(self) -> Result<PaymentPendingAllocation, DatabaseError> {
        Ok(PaymentPendingAllocation::restore(
            self.pending_id.into(),
            self.payment_id.into(),
            Money::new(self.amount, currency_from(&self.currency)?),
            parse_allocation_status(&self.status)?,
            self.allocated_to.map(Into::into),
            self.resolved_at,
            self.created_at,
        ))
    }
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, payment: &Payment) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id, condominium_id, unit_id, amount, currency,
                payment_date, method, reference, receipt_url,
                registered_by, verified_by, rejection_reason, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(Uuid::from(payment.id))
        .bind(Uuid::from(payment.condominium_id))
        .bind(payment.unit_id.map(Uuid::from))
        .bind(payment.amount.amount())
        .bind(payment.amount.currency().code())
        .bind(payment.payment_date)
        .bind(method_str(payment.method))
        .bind(&payment.reference)
        .bind(&payment.receipt_url)
        .bind(payment.registered_by.map(Uuid::from))
        .bind(payment.verified_by.map(Uuid::from))
        .bind(&payment.rejection_reason)
        .bind(payment_status_str(payment.status()))
        .bind(payment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    pub async fn find(&self, id: PaymentId) -> Result<Payment, DatabaseError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT payment_id, condominium_id, unit_id, amount, currency,
                   payment_date, method, reference, receipt_url,
                   registered_by, verified_by, rejection_reason, status, created_at
            FROM payments
            WHERE payment_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        row.ok_or_else(|| DatabaseError::not_found("payment", id))?
            .into_domain()
    }

    /// Writes back a verification decision (or refund).
    pub async fn update_status(&self, payment: &Payment) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, verified_by = $3, rejection_reason = $4
            WHERE payment_id = $1
            "#,
        )
        .bind(Uuid::from(payment.id))
        .bind(payment_status_str(payment.status()))
        .bind(payment.verified_by.map(Uuid::from))
        .bind(&payment.rejection_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("payment", payment.id));
        }
        Ok(())
    }

    /// Persists an allocation run atomically: every application, every
    /// touched quota's balance columns, and the pending surplus if any.
    pub async fn record_allocation(
        &self,
        payment: &Payment,
        outcome: &AllocationOutcome,
        quotas: &[Quota],
    ) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        for application in &outcome.applications {
            Self::insert_application(&mut tx, application).await?;
            let quota = quotas
                .iter()
                .find(|q| q.id == application.quota_id)
                .ok_or_else(|| {
                    DatabaseError::Mapping(format!(
                        "quota {} of application {} not provided",
                        application.quota_id, application.id
                    ))
                })?;
            Self::update_quota_balance(&mut tx, quota).await?;
        }

        if let Some(pending) = &outcome.pending {
            Self::insert_pending(&mut tx, pending).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        info!(
            payment = %payment.id,
            applications = outcome.applications.len(),
            pending = outcome.pending.is_some(),
            "allocation persisted"
        );
        Ok(())
    }

    /// Persists a refund: the payment's terminal status and the restored
    /// quota balances, in one transaction. Applications stay on disk as the
    /// audit trail of what was reversed.
    pub async fn record_refund(
        &self,
        payment: &Payment,
        quotas: &[Quota],
        pending: Option<&PaymentPendingAllocation>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        sqlx::query("UPDATE payments SET status = $2 WHERE payment_id = $1")
            .bind(Uuid::from(payment.id))
            .bind(payment_status_str(payment.status()))
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from(&e))?;

        for quota in quotas {
            Self::update_quota_balance(&mut tx, quota).await?;
        }

        if let Some(pending) = pending {
            Self::update_pending(&mut tx, pending).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    pub async fn applications_for(
        &self,
        payment: PaymentId,
    ) -> Result<Vec<PaymentApplication>, DatabaseError> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(
            r#"
            SELECT application_id, payment_id, quota_id,
                   applied_to_principal, applied_to_interest, quota_currency,
                   amount_in_payment_currency, payment_currency,
                   exchange_rate_used, created_at
            FROM payment_applications
            WHERE payment_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(Uuid::from(payment))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter().map(ApplicationRow::into_domain).collect()
    }

    pub async fn pending_for_payment(
        &self,
        payment: PaymentId,
    ) -> Result<Vec<PaymentPendingAllocation>, DatabaseError> {
        let rows: Vec<PendingRow> = sqlx::query_as(
            r#"
            SELECT pending_id, payment_id, amount, currency, status,
                   allocated_to, resolved_at, created_at
            FROM payment_pending_allocations
            WHERE payment_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(Uuid::from(payment))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter().map(PendingRow::into_domain).collect()
    }

    /// Writes back a resolved pending allocation.
    pub async fn resolve_pending(
        &self,
        pending: &PaymentPendingAllocation,
    ) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Self::update_pending(&mut tx, pending).await?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    async fn insert_application(
        tx: &mut Transaction<'_, Postgres>,
        application: &PaymentApplication,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payment_applications (
                application_id, payment_id, quota_id, applied_amount,
                applied_to_principal, applied_to_interest, quota_currency,
                amount_in_payment_currency, payment_currency,
                exchange_rate_used, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(Uuid::from(application.id))
        .bind(Uuid::from(application.payment_id))
        .bind(Uuid::from(application.quota_id))
        .bind(application.applied_amount.amount())
        .bind(application.applied_to_principal.amount())
        .bind(application.applied_to_interest.amount())
        .bind(application.applied_amount.currency().code())
        .bind(application.amount_in_payment_currency.amount())
        .bind(application.amount_in_payment_currency.currency().code())
        .bind(
            application
                .exchange_rate_used
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| DatabaseError::Mapping(e.to_string()))?,
        )
        .bind(application.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        debug!(
            payment = %application.payment_id,
            quota = %application.quota_id,
            amount = %application.applied_amount,
            "application persisted"
        );
        Ok(())
    }

    async fn update_quota_balance(
        tx: &mut Transaction<'_, Postgres>,
        quota: &Quota,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE quotas
            SET paid_amount = $2, interest_paid = $3, status = $4
            WHERE quota_id = $1
            "#,
        )
        .bind(Uuid::from(quota.id))
        .bind(quota.paid_amount().amount())
        .bind(quota.interest_paid().amount())
        .bind(super::quotas::quota_status_str(quota.status()))
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("quota", quota.id));
        }
        Ok(())
    }

    async fn update_pending(
        tx: &mut Transaction<'_, Postgres>,
        pending: &PaymentPendingAllocation,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE payment_pending_allocations
            SET status = $2, allocated_to = $3, resolved_at = $4
            WHERE pending_id = $1
            "#,
        )
        .bind(Uuid::from(pending.id))
        .bind(allocation_status_str(pending.status()))
        .bind(pending.allocated_to.map(Uuid::from))
        .bind(pending.resolved_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    async fn insert_pending(
        tx: &mut Transaction<'_, Postgres>,
        pending: &PaymentPendingAllocation,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payment_pending_allocations (
                pending_id, payment_id, amount, currency, status,
                allocated_to, resolved_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(pending.id))
        .bind(Uuid::from(pending.payment_id))
        .bind(pending.amount.amount())
        .bind(pending.amount.currency().code())
        .bind(allocation_status_str(pending.status()))
        .bind(pending.allocated_to.map(Uuid::from))
        .bind(pending.resolved_at)
        .bind(pending.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }
}
