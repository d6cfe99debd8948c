//! Payment applications
//!
//! One row per (payment, quota) pair: how much landed on the quota, split
//! into principal and interest, plus the rate used when the payment and the
//! quota are denominated differently. Applications are the audit trail the
//! ledger invariants are checked against.

use chrono::{DateTime, Utc};
use core_kernel::{ApplicationId, Money, PaymentId, QuotaId};
use domain_currency::ResolvedRate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentApplication {
    pub id: ApplicationId,
    pub payment_id: PaymentId,
    pub quota_id: QuotaId,
    /// Amount credited to the quota, in the quota's currency.
    pub applied_amount: Money,
    pub applied_to_principal: Money,
    pub applied_to_interest: Money,
    /// What the application cost in the payment's currency.
    pub amount_in_payment_currency: Money,
    /// Present when a conversion happened; frozen for reproducibility.
    pub exchange_rate_used: Option<ResolvedRate>,
    pub created_at: DateTime<Utc>,
}

impl PaymentApplication {
    pub fn new(
        payment_id: PaymentId,
        quota_id: QuotaId,
        applied_to_principal: Money,
        applied_to_interest: Money,
        amount_in_payment_currency: Money,
        exchange_rate_used: Option<ResolvedRate>,
    ) -> Self {
        Self {
            id: ApplicationId::new(),
            payment_id,
            quota_id,
            applied_amount: applied_to_principal + applied_to_interest,
            applied_to_principal,
            applied_to_interest,
            amount_in_payment_currency,
            exchange_rate_used,
            created_at: Utc::now(),
        }
    }
}
