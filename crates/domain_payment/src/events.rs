//! Domain events emitted by the payment side of the ledger

use core_kernel::{Money, PaymentId, PendingAllocationId, QuotaId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum PaymentEvent {
    PaymentVerified {
        payment_id: PaymentId,
    },
    PaymentRejected {
        payment_id: PaymentId,
        reason: String,
    },
    PaymentApplied {
        payment_id: PaymentId,
        quota_id: QuotaId,
        amount: Money,
    },
    PaymentRefunded {
        payment_id: PaymentId,
    },
    PendingAllocationCreated {
        pending_id: PendingAllocationId,
        payment_id: PaymentId,
        amount: Money,
    },
    PendingAllocationResolved {
        pending_id: PendingAllocationId,
    },
}
