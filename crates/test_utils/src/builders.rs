//! Test Data Builders
//!
//! Builders with sensible defaults so tests only spell out the fields they
//! care about. Defaults line up with the fixtures: March 2024, 100.00 USD,
//! due on the 15th.

use chrono::NaiveDate;
use core_kernel::{BillingPeriod, BuildingId, ConceptId, CondominiumId, Currency, Money, UnitId};
use domain_payment::{Payment, PaymentMethod};
use domain_quota::{AdjustmentPolicy, ConceptType, PaymentConcept, Quota, Recurrence};
use rust_decimal_macros::dec;

use crate::fixtures::TemporalFixtures;

/// Builder for payment concepts
pub struct ConceptBuilder {
    condominium_id: CondominiumId,
    building_id: Option<BuildingId>,
    name: String,
    concept_type: ConceptType,
    currency: Currency,
    recurrence: Recurrence,
    allow_partial: bool,
    adjustments: AdjustmentPolicy,
    issue_day: u32,
    due_day: u32,
}

impl ConceptBuilder {
    pub fn new(condominium_id: CondominiumId) -> Self {
        Self {
            condominium_id,
            building_id: None,
            name: "Maintenance".to_string(),
            concept_type: ConceptType::Maintenance,
            currency: Currency::USD,
            recurrence: Recurrence::Monthly,
            allow_partial: true,
            adjustments: AdjustmentPolicy::none(),
            issue_day: 1,
            due_day: 15,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn of_type(mut self, concept_type: ConceptType) -> Self {
        self.concept_type = concept_type;
        self
    }

    pub fn in_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn recurring(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn for_building(mut self, building: BuildingId) -> Self {
        self.building_id = Some(building);
        self
    }

    pub fn disallow_partial(mut self) -> Self {
        self.allow_partial = false;
        self
    }

    pub fn with_adjustments(mut self, adjustments: AdjustmentPolicy) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn issue_due(mut self, issue_day: u32, due_day: u32) -> Self {
        self.issue_day = issue_day;
        self.due_day = due_day;
        self
    }

    pub fn build(self) -> PaymentConcept {
        let mut concept = PaymentConcept::new(
            self.condominium_id,
            self.name,
            self.concept_type,
            self.currency,
            self.recurrence,
            self.issue_day,
            self.due_day,
        )
        .expect("builder days are valid")
        .with_adjustments(self.adjustments);
        if let Some(building) = self.building_id {
            concept = concept.for_building(building);
        }
        if !self.allow_partial {
            concept = concept.disallow_partial_payment();
        }
        concept
    }
}

/// Builder for quotas
pub struct QuotaBuilder {
    condominium_id: CondominiumId,
    unit_id: UnitId,
    concept_id: ConceptId,
    period: BillingPeriod,
    base: Money,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    interest: Option<(Money, NaiveDate)>,
}

impl Default for QuotaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaBuilder {
    pub fn new() -> Self {
        Self {
            condominium_id: CondominiumId::new(),
            unit_id: UnitId::new(),
            concept_id: ConceptId::new(),
            period: TemporalFixtures::march_2024(),
            base: Money::new(dec!(100.00), Currency::USD),
            issue_date: TemporalFixtures::issue_date(),
            due_date: TemporalFixtures::due_date(),
            interest: None,
        }
    }

    pub fn for_unit(mut self, unit: UnitId) -> Self {
        self.unit_id = unit;
        self
    }

    pub fn for_concept(mut self, concept: ConceptId) -> Self {
        self.concept_id = concept;
        self
    }

    pub fn in_condominium(mut self, condominium: CondominiumId) -> Self {
        self.condominium_id = condominium;
        self
    }

    pub fn charging(mut self, base: Money) -> Self {
        self.base = base;
        self
    }

    pub fn for_period(mut self, period: BillingPeriod) -> Self {
        self.period = period;
        self
    }

    pub fn due_on(mut self, due: NaiveDate) -> Self {
        self.due_date = due;
        self
    }

    /// Posts accrued interest on the built quota.
    pub fn with_interest(mut self, amount: Money, through: NaiveDate) -> Self {
        self.interest = Some((amount, through));
        self
    }

    pub fn build(self) -> Quota {
        let mut quota = Quota::new(
            self.condominium_id,
            self.unit_id,
            self.concept_id,
            self.period,
            self.base,
            self.issue_date,
            self.due_date,
        );
        if let Some((amount, through)) = self.interest {
            quota
                .post_interest(amount, through)
                .expect("open quota accepts interest");
        }
        quota
    }
}

/// Builder for payments
pub struct PaymentBuilder {
    condominium_id: CondominiumId,
    unit_id: Option<UnitId>,
    amount: Money,
    payment_date: NaiveDate,
    method: PaymentMethod,
    verified: bool,
}

impl Default for PaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentBuilder {
    pub fn new() -> Self {
        Self {
            condominium_id: CondominiumId::new(),
            unit_id: None,
            amount: Money::new(dec!(100.00), Currency::USD),
            payment_date: TemporalFixtures::date(2024, 3, 10),
            method: PaymentMethod::Transfer,
            verified: true,
        }
    }

    pub fn in_condominium(mut self, condominium: CondominiumId) -> Self {
        self.condominium_id = condominium;
        self
    }

    pub fn from_unit(mut self, unit: UnitId) -> Self {
        self.unit_id = Some(unit);
        self
    }

    pub fn of(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.payment_date = date;
        self
    }

    pub fn via(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    /// Leaves the payment unverified; the default builds a verified one.
    pub fn unverified(mut self) -> Self {
        self.verified = false;
        self
    }

    pub fn build(self) -> Payment {
        let mut payment = Payment::report(
            self.condominium_id,
            self.unit_id,
            self.amount,
            self.payment_date,
            self.method,
        );
        if self.verified {
            payment.verify(None).expect("fresh payment verifies");
        }
        payment
    }
}
