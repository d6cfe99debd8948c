//! Quota domain errors
//!
//! The taxonomy follows how failures are handled, not where they occur:
//! configuration errors are collected per unit inside a generation run, data
//! errors block one operation and are retried after the missing data shows
//! up, and invariant violations are defects that abort the transaction.

use core_kernel::{ConceptId, MoneyError, QuotaId, TemporalError, UnitId};
use domain_currency::CurrencyError;
use domain_directory::DirectoryError;
use thiserror::Error;

use crate::expr::ExprError;

#[derive(Debug, Error)]
pub enum QuotaError {
    /// No generation rule is effective for the concept on the given date.
    /// Recorded in the generation log, never thrown out of a run.
    #[error("No active generation rule for concept {concept} as of {as_of}")]
    NoActiveRule {
        concept: ConceptId,
        as_of: chrono::NaiveDate,
    },

    /// A per-unit formula has no entry for this unit. The unit is skipped
    /// and logged as a failure, never defaulted to zero.
    #[error("Formula has no amount for unit {0}")]
    MissingUnitAmount(UnitId),

    #[error("Formula evaluation failed: {0}")]
    FormulaEvaluation(#[from] ExprError),

    /// A quota for this (unit, concept, period) already exists.
    #[error("Quota already generated for unit {unit} and period {period}")]
    AlreadyGenerated { unit: UnitId, period: String },

    /// Rejected at configuration time, before any run.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid concept configuration: {0}")]
    InvalidConcept(String),

    /// Two generation rules for the same concept overlap in time.
    #[error("Generation rule window overlaps an existing rule for concept {0}")]
    OverlappingRules(ConceptId),

    /// A manual adjustment must change the amount.
    #[error("Adjustment for quota {0} does not change the amount")]
    AdjustmentWithoutChange(QuotaId),

    #[error("Quota {quota}: invalid transition from {from}")]
    InvalidTransition { quota: QuotaId, from: String },

    /// Applying or reversing more than the quota carries. A defect in the
    /// allocation arithmetic, not a user error.
    #[error("Quota {quota}: application of {amount} exceeds outstanding balance")]
    ApplicationExceedsBalance { quota: QuotaId, amount: String },

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Temporal(#[from] TemporalError),

    #[error(transparent)]
    Currency(#[from] CurrencyError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
