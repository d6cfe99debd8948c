//! Domain events emitted by the quota side of the ledger
//!
//! The engine never sends notifications itself; it hands these to whatever
//! downstream consumer is wired up.

use chrono::NaiveDate;
use core_kernel::{BillingPeriod, ConceptId, GenerationLogId, Money, QuotaId, UnitId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum QuotaEvent {
    QuotaGenerated {
        quota_id: QuotaId,
        unit_id: UnitId,
        concept_id: ConceptId,
        period: BillingPeriod,
        amount: Money,
        due_date: NaiveDate,
    },
    GenerationCompleted {
        log_id: GenerationLogId,
        concept_id: ConceptId,
        period: BillingPeriod,
        quotas_created: u32,
        quotas_failed: u32,
    },
    InterestAccrued {
        quota_id: QuotaId,
        amount: Money,
        accrued_through: NaiveDate,
    },
    QuotaOverdue {
        quota_id: QuotaId,
        as_of: NaiveDate,
    },
}
