//! Core Kernel - Foundational types for the condominium ledger
//!
//! This crate provides the building blocks shared by every domain module:
//! - Money types with precise decimal arithmetic
//! - Billing periods and effectivity windows
//! - Strongly-typed identifiers
//! - The expense-category hierarchy arena

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod hierarchy;
pub mod error;

pub use money::{Money, Currency, Rate, MoneyError};
pub use temporal::{BillingPeriod, EffectiveWindow, Timezone, TemporalError, clamp_to_month};
pub use identifiers::{
    CondominiumId, BuildingId, UnitId, ConceptId, FormulaId, RuleId, ScheduleId,
    GenerationLogId, QuotaId, AdjustmentId, InterestConfigId, PaymentId,
    ApplicationId, PendingAllocationId, CategoryId, UserId,
};
pub use hierarchy::{CategoryArena, HierarchyError};
pub use error::CoreError;
