//! Payment domain errors

use chrono::NaiveDate;
use core_kernel::{Currency, MoneyError, PaymentId, PendingAllocationId, QuotaId};
use domain_currency::CurrencyError;
use domain_quota::QuotaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// The allocation arithmetic tried to spend more than the payment
    /// carries. A defect, never a user error; the transaction must abort.
    #[error("Allocation for payment {payment} exceeds the payment amount")]
    AllocationExceedsPaymentAmount { payment: PaymentId },

    /// No rate between the payment's and the quota's currency on the
    /// payment date. The quota is skipped and retried once a rate exists.
    #[error("No conversion from {from} to {to} available on {as_of}")]
    CurrencyConversionUnavailable {
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    },

    #[error("Payment {payment}: invalid transition from {from}")]
    InvalidTransition { payment: PaymentId, from: String },

    /// Only verified payments are allocated.
    #[error("Payment {0} is not verified")]
    PaymentNotVerified(PaymentId),

    /// A payment may touch a quota at most once.
    #[error("Payment {payment} already applied to quota {quota}")]
    DuplicateApplication { payment: PaymentId, quota: QuotaId },

    /// Pending allocations resolve exactly once.
    #[error("Pending allocation {0} is already resolved")]
    PendingAlreadyResolved(PendingAllocationId),

    /// A cross-cutting ledger check failed. Fatal.
    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Currency(#[from] CurrencyError),

    #[error(transparent)]
    Quota(#[from] QuotaError),
}
