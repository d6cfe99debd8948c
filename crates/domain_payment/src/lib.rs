//! Payment Domain - Registration, Verification, and Allocation
//!
//! A payment is reported, verified (or rejected), and then allocated
//! against outstanding quotas. Allocation is deterministic and auditable:
//! oldest quota first, interest before principal, one application row per
//! (payment, quota) pair, and any surplus becomes a pending allocation
//! rather than disappearing. Refunds reverse the applications they undo.

pub mod payment;
pub mod application;
pub mod pending;
pub mod allocation;
pub mod invariants;
pub mod events;
pub mod error;

pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use application::PaymentApplication;
pub use pending::{AllocationStatus, PaymentPendingAllocation};
pub use allocation::{AllocationEngine, AllocationOutcome, SkippedQuota, SkipReason};
pub use invariants::LedgerInvariants;
pub use events::PaymentEvent;
pub use error::PaymentError;
