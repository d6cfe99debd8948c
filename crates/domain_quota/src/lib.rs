//! Quota Domain - Recurring Charge Generation and Accrual
//!
//! This crate owns the write side of the charge ledger: payment concepts and
//! their formulas, the generation rules and schedules that decide when and
//! how much to charge, the materialized `Quota` rows, and the calculators
//! that accrue interest and late/early adjustments on them.
//!
//! Quotas are never deleted and their balance arithmetic is private: the
//! only mutations are payment application, interest posting, manual audited
//! adjustment, and cancellation.

pub mod concept;
pub mod formula;
pub mod expr;
pub mod rule;
pub mod schedule;
pub mod quota;
pub mod interest;
pub mod adjustment;
pub mod generation;
pub mod events;
pub mod error;

pub use concept::{ConceptType, PaymentConcept, Recurrence};
pub use formula::{EvaluationContext, FormulaKind, QuotaFormula};
pub use expr::{ExprError, Expression};
pub use rule::{GenerationRule, RuleSet};
pub use schedule::{Frequency, GenerationSchedule};
pub use quota::{Quota, QuotaAdjustment, QuotaStatus};
pub use interest::{
    accrue_interest, select_interest_config, CalculationPeriod, InterestAccrual,
    InterestConfiguration, InterestScope, InterestType,
};
pub use adjustment::{adjustment_for, early_discount, late_surcharge, Adjustment, AdjustmentPolicy, AdjustmentValue};
pub use generation::{
    GenerationFailure, GenerationLog, GenerationMethod, GenerationOutcome, GenerationStatus,
    QuotaGenerator,
};
pub use events::QuotaEvent;
pub use error::QuotaError;
