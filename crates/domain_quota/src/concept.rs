//! Payment concepts
//!
//! A concept is the template a quota is generated from: the monthly
//! maintenance fee, an extraordinary assessment, a fine. It fixes the
//! currency, the recurrence, whether partial payments are accepted, and the
//! late/early adjustment policy.

use core_kernel::{BuildingId, CategoryId, ConceptId, CondominiumId, Currency, UserId};
use serde::{Deserialize, Serialize};

use crate::adjustment::AdjustmentPolicy;
use crate::error::QuotaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptType {
    Maintenance,
    CondominiumFee,
    Extraordinary,
    Fine,
}

/// How often a concept charges. `OneOff` concepts are generated manually,
/// the rest through a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    OneOff,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl Recurrence {
    /// Months covered by one period. `None` for one-off charges.
    pub fn months(&self) -> Option<u32> {
        match self {
            Recurrence::OneOff => None,
            Recurrence::Monthly => Some(1),
            Recurrence::Quarterly => Some(3),
            Recurrence::SemiAnnual => Some(6),
            Recurrence::Annual => Some(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConcept {
    pub id: ConceptId,
    pub condominium_id: CondominiumId,
    /// When present, the concept only charges units of this building.
    pub building_id: Option<BuildingId>,
    pub name: String,
    pub concept_type: ConceptType,
    pub currency: Currency,
    pub recurrence: Recurrence,
    pub allow_partial_payment: bool,
    pub adjustments: AdjustmentPolicy,
    /// Default day-of-month quotas are issued; clamped to short months.
    pub issue_day: u32,
    /// Default day-of-month quotas fall due.
    pub due_day: u32,
    pub category: Option<CategoryId>,
    pub created_by: Option<UserId>,
    pub is_active: bool,
}

impl PaymentConcept {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        condominium_id: CondominiumId,
        name: impl Into<String>,
        concept_type: ConceptType,
        currency: Currency,
        recurrence: Recurrence,
        issue_day: u32,
        due_day: u32,
    ) -> Result<Self, QuotaError> {
        if !(1..=31).contains(&issue_day) || !(1..=31).contains(&due_day) {
            return Err(QuotaError::InvalidConcept(format!(
                "issue/due day must be 1..=31, got {issue_day}/{due_day}"
            )));
        }
        Ok(Self {
            id: ConceptId::new(),
            condominium_id,
            building_id: None,
            name: name.into(),
            concept_type,
            currency,
            recurrence,
            allow_partial_payment: true,
            adjustments: AdjustmentPolicy::none(),
            issue_day,
            due_day,
            category: None,
            created_by: None,
            is_active: true,
        })
    }

    pub fn for_building(mut self, building: BuildingId) -> Self {
        self.building_id = Some(building);
        self
    }

    pub fn with_adjustments(mut self, adjustments: AdjustmentPolicy) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn disallow_partial_payment(mut self) -> Self {
        self.allow_partial_payment = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_days() {
        let condo = CondominiumId::new();
        assert!(PaymentConcept::new(
            condo,
            "Maintenance",
            ConceptType::Maintenance,
            Currency::USD,
            Recurrence::Monthly,
            0,
            15,
        )
        .is_err());
        assert!(PaymentConcept::new(
            condo,
            "Maintenance",
            ConceptType::Maintenance,
            Currency::USD,
            Recurrence::Monthly,
            1,
            32,
        )
        .is_err());
    }
}
