//! Pending allocations
//!
//! A payment's surplus after allocation is parked here instead of being
//! discarded or over-applied. A pending allocation resolves exactly once:
//! to a quota (a later allocation run) or to a refund. Resolution is
//! terminal.

use chrono::{DateTime, Utc};
use core_kernel::{Money, PaymentId, PendingAllocationId, QuotaId};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Pending,
    Allocated,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPendingAllocation {
    pub id: PendingAllocationId,
    pub payment_id: PaymentId,
    /// Surplus in the payment's currency.
    pub amount: Money,
    status: AllocationStatus,
    /// Set when resolved to a quota.
    pub allocated_to: Option<QuotaId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentPendingAllocation {
    pub fn new(payment_id: PaymentId, amount: Money) -> Self {
        Self {
            id: PendingAllocationId::new(),
            payment_id,
            amount,
            status: AllocationStatus::Pending,
            allocated_to: None,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    /// Rehydrates a persisted pending allocation.
    pub fn restore(
        id: PendingAllocationId,
        payment_id: PaymentId,
        amount: Money,
        status: AllocationStatus,
        allocated_to: Option<QuotaId>,
        resolved_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payment_id,
            amount,
            status,
            allocated_to,
            resolved_at,
            created_at,
        }
    }

    pub fn status(&self) -> AllocationStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == AllocationStatus::Pending
    }

    pub fn resolve_to_quota(&mut self, quota: QuotaId) -> Result<(), PaymentError> {
        self.transition(AllocationStatus::Allocated)?;
        self.allocated_to = Some(quota);
        Ok(())
    }

    pub fn resolve_refunded(&mut self) -> Result<(), PaymentError> {
        self.transition(AllocationStatus::Refunded)
    }

    fn transition(&mut self, to: AllocationStatus) -> Result<(), PaymentError> {
        if self.status != AllocationStatus::Pending {
            return Err(PaymentError::PendingAlreadyResolved(self.id));
        }
        self.status = to;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}
