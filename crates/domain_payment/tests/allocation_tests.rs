//! Allocation engine behavior, covering the collections workflows end to end

use chrono::NaiveDate;
use core_kernel::{BillingPeriod, ConceptId, CondominiumId, Currency, Money, UnitId};
use domain_currency::{ExchangeRate, RateBook};
use domain_payment::{
    AllocationEngine, LedgerInvariants, Payment, PaymentMethod, SkipReason,
};
use domain_quota::{ConceptType, PaymentConcept, Quota, QuotaStatus, Recurrence};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn quota_for(
    condo: CondominiumId,
    unit: UnitId,
    concept: ConceptId,
    base: Decimal,
    currency: Currency,
    due: NaiveDate,
) -> Quota {
    Quota::new(
        condo,
        unit,
        concept,
        BillingPeriod::of_date(due),
        Money::new(base, currency),
        due,
        due,
    )
}

fn verified_payment(
    condo: CondominiumId,
    unit: UnitId,
    amount: Decimal,
    currency: Currency,
    on: NaiveDate,
) -> Payment {
    let mut p = Payment::report(condo, Some(unit), Money::new(amount, currency), on, PaymentMethod::Transfer);
    p.verify(None).unwrap();
    p
}

#[test]
fn partial_payment_leaves_no_pending_allocation() {
    // Balance 100, payment 60: one application, status partial, no surplus.
    let condo = CondominiumId::new();
    let unit = UnitId::new();
    let concept = ConceptId::new();
    let mut quotas = vec![quota_for(condo, unit, concept, dec!(100.00), Currency::USD, date(2024, 3, 15))];
    let payment = verified_payment(condo, unit, dec!(60.00), Currency::USD, date(2024, 3, 10));

    let rates = RateBook::new();
    let engine = AllocationEngine { rates: &rates };
    let outcome = engine.allocate(&payment, &mut quotas, &HashMap::new()).unwrap();

    assert_eq!(outcome.applications.len(), 1);
    assert_eq!(outcome.applications[0].applied_amount.amount(), dec!(60.00));
    assert_eq!(quotas[0].status(), QuotaStatus::Partial);
    assert_eq!(quotas[0].balance().amount(), dec!(40.00));
    assert!(outcome.pending.is_none());
    assert!(outcome.skipped.is_empty());
}

#[test]
fn surplus_becomes_a_pending_allocation() {
    // Balance 40, payment 100: quota paid in full, 60 parked as pending.
    let condo = CondominiumId::new();
    let unit = UnitId::new();
    let concept = ConceptId::new();
    let mut quotas = vec![quota_for(condo, unit, concept, dec!(40.00), Currency::USD, date(2024, 3, 15))];
    let payment = verified_payment(condo, unit, dec!(100.00), Currency::USD, date(2024, 3, 10));

    let rates = RateBook::new();
    let engine = AllocationEngine { rates: &rates };
    let outcome = engine.allocate(&payment, &mut quotas, &HashMap::new()).unwrap();

    assert_eq!(outcome.applications.len(), 1);
    assert_eq!(outcome.applications[0].applied_amount.amount(), dec!(40.00));
    assert_eq!(quotas[0].status(), QuotaStatus::Paid);

    let pending = outcome.pending.expect("surplus must be parked");
    assert_eq!(pending.amount.amount(), dec!(60.00));
    assert!(pending.is_pending());
}

#[test]
fn missing_rate_skips_quota_and_parks_nothing() {
    // A VES-denominated quota with no VES rate: the allocation is skipped,
    // the money remains unallocated (no pending row) until a rate exists.
    let condo = CondominiumId::new();
    let unit = UnitId::new();
    let concept = ConceptId::new();
    let mut quotas = vec![quota_for(condo, unit, concept, dec!(3650.00), Currency::VES, date(2024, 3, 15))];
    let payment = verified_payment(condo, unit, dec!(100.00), Currency::USD, date(2024, 3, 10));

    let rates = RateBook::new();
    let engine = AllocationEngine { rates: &rates };
    let outcome = engine.allocate(&payment, &mut quotas, &HashMap::new()).unwrap();

    assert!(outcome.applications.is_empty());
    assert_eq!(outcome.skipped.len(), 1);
    assert!(matches!(
        outcome.skipped[0].reason,
        SkipReason::ConversionUnavailable { from: Currency::USD, to: Currency::VES }
    ));
    assert!(outcome.pending.is_none());
    assert_eq!(quotas[0].balance().amount(), dec!(3650.00));

    // Once the rate is published, the retry settles the quota.
    let mut rates = RateBook::new();
    rates
        .publish(ExchangeRate::new(Currency::USD, Currency::VES, dec!(36.50), date(2024, 3, 1)).unwrap())
        .unwrap();
    let engine = AllocationEngine { rates: &rates };
    let outcome = engine.allocate(&payment, &mut quotas, &HashMap::new()).unwrap();
    assert_eq!(outcome.applications.len(), 1);
    assert_eq!(quotas[0].status(), QuotaStatus::Paid);
    let application = &outcome.applications[0];
    assert_eq!(application.applied_amount.amount(), dec!(3650.00));
    assert_eq!(application.amount_in_payment_currency.amount(), dec!(100.00));
    assert!(application.exchange_rate_used.is_some());
}

#[test]
fn oldest_quota_settles_first_with_interest_before_principal() {
    let condo = CondominiumId::new();
    let unit = UnitId::new();
    let concept = ConceptId::new();

    let mut january = quota_for(condo, unit, concept, dec!(100.00), Currency::USD, date(2024, 1, 15));
    january
        .post_interest(Money::new(dec!(10.00), Currency::USD), date(2024, 3, 1))
        .unwrap();
    let february = quota_for(condo, unit, concept, dec!(100.00), Currency::USD, date(2024, 2, 15));
    // Shuffle the input order; the engine sorts by due date.
    let mut quotas = vec![february, january];

    let payment = verified_payment(condo, unit, dec!(150.00), Currency::USD, date(2024, 3, 10));
    let rates = RateBook::new();
    let engine = AllocationEngine { rates: &rates };
    let outcome = engine.allocate(&payment, &mut quotas, &HashMap::new()).unwrap();

    assert_eq!(outcome.applications.len(), 2);
    // January (due first) absorbed 110: 10 interest + 100 principal.
    let first = &outcome.applications[0];
    assert_eq!(first.applied_amount.amount(), dec!(110.00));
    assert_eq!(first.applied_to_interest.amount(), dec!(10.00));
    assert_eq!(first.applied_to_principal.amount(), dec!(100.00));
    // February got the remaining 40.
    let second = &outcome.applications[1];
    assert_eq!(second.applied_amount.amount(), dec!(40.00));

    assert_eq!(quotas[1].status(), QuotaStatus::Paid);
    assert_eq!(quotas[0].balance().amount(), dec!(60.00));
    assert!(outcome.pending.is_none());
}

#[test]
fn partial_disallowed_concept_is_skipped_until_coverable() {
    let condo = CondominiumId::new();
    let unit = UnitId::new();
    let strict_concept = PaymentConcept::new(
        condo,
        "Extraordinary assessment",
        ConceptType::Extraordinary,
        Currency::USD,
        Recurrence::OneOff,
        1,
        15,
    )
    .unwrap()
    .disallow_partial_payment();

    let mut quotas = vec![
        quota_for(condo, unit, strict_concept.id, dec!(200.00), Currency::USD, date(2024, 1, 15)),
        quota_for(condo, unit, ConceptId::new(), dec!(50.00), Currency::USD, date(2024, 2, 15)),
    ];
    let mut concepts = HashMap::new();
    concepts.insert(strict_concept.id, strict_concept);

    // 100 cannot cover the strict quota's 200, so it skips to the newer one.
    let payment = verified_payment(condo, unit, dec!(100.00), Currency::USD, date(2024, 3, 10));
    let rates = RateBook::new();
    let engine = AllocationEngine { rates: &rates };
    let outcome = engine.allocate(&payment, &mut quotas, &concepts).unwrap();

    assert_eq!(outcome.applications.len(), 1);
    assert_eq!(outcome.applications[0].quota_id, quotas[1].id);
    assert_eq!(quotas[0].balance().amount(), dec!(200.00));
    assert!(matches!(outcome.skipped[0].reason, SkipReason::PartialPaymentDisallowed));
    // The leftover 50 is genuinely unallocatable, so it parks as pending.
    assert_eq!(outcome.pending.as_ref().unwrap().amount.amount(), dec!(50.00));
}

#[test]
fn explicit_targets_apply_in_caller_order() {
    let condo = CondominiumId::new();
    let unit = UnitId::new();
    let concept = ConceptId::new();
    let mut quotas = vec![
        quota_for(condo, unit, concept, dec!(100.00), Currency::USD, date(2024, 1, 15)),
        quota_for(condo, unit, concept, dec!(100.00), Currency::USD, date(2024, 2, 15)),
    ];
    let newer = quotas[1].id;
    let older = quotas[0].id;

    let payment = verified_payment(condo, unit, dec!(120.00), Currency::USD, date(2024, 3, 10));
    let rates = RateBook::new();
    let engine = AllocationEngine { rates: &rates };
    // Caller chooses the newer quota first, against the default ordering.
    let outcome = engine
        .allocate_targeted(&payment, &mut quotas, &[newer, older])
        .unwrap();

    assert_eq!(outcome.applications[0].quota_id, newer);
    assert_eq!(outcome.applications[0].applied_amount.amount(), dec!(100.00));
    assert_eq!(outcome.applications[1].quota_id, older);
    assert_eq!(outcome.applications[1].applied_amount.amount(), dec!(20.00));
}

#[test]
fn unverified_payment_is_refused() {
    let condo = CondominiumId::new();
    let unit = UnitId::new();
    let mut quotas = vec![quota_for(condo, unit, ConceptId::new(), dec!(100.00), Currency::USD, date(2024, 3, 15))];
    let payment = Payment::report(
        condo,
        Some(unit),
        Money::new(dec!(100.00), Currency::USD),
        date(2024, 3, 10),
        PaymentMethod::Cash,
    );

    let rates = RateBook::new();
    let engine = AllocationEngine { rates: &rates };
    assert!(engine.allocate(&payment, &mut quotas, &HashMap::new()).is_err());
}

#[test]
fn refund_reverses_applications_and_reopens_quotas() {
    let condo = CondominiumId::new();
    let unit = UnitId::new();
    let concept = ConceptId::new();
    let mut quotas = vec![quota_for(condo, unit, concept, dec!(100.00), Currency::USD, date(2024, 3, 15))];
    let mut payment = verified_payment(condo, unit, dec!(100.00), Currency::USD, date(2024, 3, 10));

    let rates = RateBook::new();
    let engine = AllocationEngine { rates: &rates };
    let outcome = engine.allocate(&payment, &mut quotas, &HashMap::new()).unwrap();
    assert_eq!(quotas[0].status(), QuotaStatus::Paid);

    payment.refund().unwrap();
    engine
        .reverse(&payment, &outcome.applications, &mut quotas)
        .unwrap();
    assert_eq!(quotas[0].balance().amount(), dec!(100.00));
    assert_eq!(quotas[0].status(), QuotaStatus::Pending);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// However balances and the payment amount fall, the applications
        /// never spend more than the payment, quota balances stay
        /// non-negative, and the invariant checker agrees.
        #[test]
        fn allocation_never_overspends(
            payment_cents in 1i64..500_000i64,
            balances in proptest::collection::vec(1i64..200_000i64, 1..6),
        ) {
            let condo = CondominiumId::new();
            let unit = UnitId::new();
            let concept = ConceptId::new();

            let mut quotas: Vec<Quota> = balances
                .iter()
                .enumerate()
                .map(|(i, cents)| {
                    quota_for(
                        condo,
                        unit,
                        concept,
                        Decimal::new(*cents, 2),
                        Currency::USD,
                        date(2024, 1 + (i as u32 % 12), 15),
                    )
                })
                .collect();

            let payment = verified_payment(
                condo,
                unit,
                Decimal::new(payment_cents, 2),
                Currency::USD,
                date(2024, 6, 10),
            );

            let rates = RateBook::new();
            let engine = AllocationEngine { rates: &rates };
            let outcome = engine.allocate(&payment, &mut quotas, &HashMap::new()).unwrap();

            let spent = outcome.total_allocated(Currency::USD);
            prop_assert!(spent.amount() <= payment.amount.amount());
            for quota in &quotas {
                prop_assert!(!quota.balance().is_negative());
                LedgerInvariants::check_quota(quota, &outcome.applications).unwrap();
            }
            LedgerInvariants::check_payment(&payment, &outcome.applications).unwrap();

            // Conservation: spent + pending surplus equals the payment.
            let surplus = outcome.pending.as_ref().map_or(Decimal::ZERO, |p| p.amount.amount());
            prop_assert_eq!(spent.amount() + surplus, payment.amount.amount());
        }
    }
}
