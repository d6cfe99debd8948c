//! End-to-end generation runs against an in-memory directory

use chrono::NaiveDate;
use core_kernel::{BillingPeriod, ConceptId, Currency, EffectiveWindow, Money, Timezone, UnitId};
use domain_currency::{ExchangeRate, RateBook};
use domain_directory::{Building, Condominium, InMemoryDirectory, Unit, UnitDirectory};
use domain_quota::{
    ConceptType, EvaluationContext, GenerationMethod, GenerationRule, GenerationSchedule,
    GenerationStatus, PaymentConcept, Quota, QuotaFormula, QuotaStatus, Recurrence, RuleSet,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Fixture {
    directory: InMemoryDirectory,
    condo: core_kernel::CondominiumId,
    concept: PaymentConcept,
    rules: RuleSet,
    formulas: HashMap<core_kernel::FormulaId, QuotaFormula>,
    rates: RateBook,
    schedule: GenerationSchedule,
}

/// Three units, a monthly fixed-fee concept issued on the 1st, due the 15th.
fn fixture(unit_count: usize, formula: impl FnOnce(core_kernel::CondominiumId) -> QuotaFormula) -> Fixture {
    let mut directory = InMemoryDirectory::new();
    let condominium = Condominium::new("Los Samanes", Currency::USD, Timezone::default());
    let condo = condominium.id;
    directory.add_condominium(condominium);
    let building = Building::new(condo, "Torre Unica");
    let building_id = building.id;
    directory.add_building(building).unwrap();
    for i in 0..unit_count {
        directory
            .add_unit(Unit::new(condo, building_id, format!("{}-A", i + 1), dec!(33.33)).unwrap())
            .unwrap();
    }

    let concept = PaymentConcept::new(
        condo,
        "Monthly maintenance",
        ConceptType::Maintenance,
        Currency::USD,
        Recurrence::Monthly,
        1,
        15,
    )
    .unwrap();

    let formula = formula(condo);
    let mut formulas = HashMap::new();
    let formula_id = formula.id;
    formulas.insert(formula_id, formula);

    let mut rules = RuleSet::new();
    rules
        .add(GenerationRule::new(
            concept.id,
            formula_id,
            EffectiveWindow::open_from(date(2024, 1, 1)),
        ))
        .unwrap();

    let schedule = GenerationSchedule::for_concept(&concept, 1, 0).unwrap();

    Fixture {
        directory,
        condo,
        concept,
        rules,
        formulas,
        rates: RateBook::new(),
        schedule,
    }
}

#[test]
fn fixed_monthly_run_creates_one_quota_per_unit() {
    let mut fx = fixture(3, |condo| {
        QuotaFormula::fixed(condo, "Flat 50", Money::new(dec!(50.00), Currency::USD))
    });
    let generator = domain_quota::QuotaGenerator {
        directory: &fx.directory,
        rules: &fx.rules,
        formulas: &fx.formulas,
        rates: &fx.rates,
    };

    let outcome = generator.run(
        &mut fx.schedule,
        &fx.concept,
        &EvaluationContext::new(),
        &HashSet::new(),
        date(2024, 3, 1),
        GenerationMethod::Automatic,
        None,
    );

    assert_eq!(outcome.log.status, GenerationStatus::Completed);
    assert_eq!(outcome.log.quotas_created, 3);
    assert_eq!(outcome.log.quotas_failed, 0);
    assert_eq!(outcome.quotas.len(), 3);
    for quota in &outcome.quotas {
        assert_eq!(quota.base_amount().amount(), dec!(50.00));
        assert_eq!(quota.issue_date, date(2024, 3, 1));
        assert_eq!(quota.due_date, date(2024, 3, 15));
        assert_eq!(quota.period, BillingPeriod::monthly(2024, 3).unwrap());
        assert_eq!(quota.status(), QuotaStatus::Pending);
        assert_eq!(quota.generation_log_id, Some(outcome.log.id));
    }
    assert_eq!(outcome.log.total_amount.unwrap().amount(), dec!(150.00));
    assert_eq!(fx.schedule.last_generated_period, Some(outcome.log.period));
    assert_eq!(fx.schedule.next_generation_date, Some(date(2024, 4, 1)));
}

#[test]
fn second_run_for_same_period_skips_existing_quotas() {
    let mut fx = fixture(3, |condo| {
        QuotaFormula::fixed(condo, "Flat 50", Money::new(dec!(50.00), Currency::USD))
    });
    let generator = domain_quota::QuotaGenerator {
        directory: &fx.directory,
        rules: &fx.rules,
        formulas: &fx.formulas,
        rates: &fx.rates,
    };

    let first = generator.run(
        &mut fx.schedule,
        &fx.concept,
        &EvaluationContext::new(),
        &HashSet::new(),
        date(2024, 3, 1),
        GenerationMethod::Automatic,
        None,
    );

    let existing: HashSet<(UnitId, ConceptId, BillingPeriod)> = first
        .quotas
        .iter()
        .map(|q| (q.unit_id, q.concept_id, q.period))
        .collect();

    // Same period again: everything is already generated, nothing fails.
    fx.schedule.next_generation_date = Some(date(2024, 3, 1));
    fx.schedule.last_generated_period = None;
    let second = generator.run(
        &mut fx.schedule,
        &fx.concept,
        &EvaluationContext::new(),
        &existing,
        date(2024, 3, 1),
        GenerationMethod::Manual,
        None,
    );

    assert_eq!(second.log.status, GenerationStatus::Completed);
    assert_eq!(second.log.quotas_created, 0);
    assert_eq!(second.log.quotas_skipped, 3);
    assert!(second.quotas.is_empty());
}

#[test]
fn per_unit_formula_with_gaps_yields_partial_run() {
    let mut fx = fixture(3, |condo| {
        // Table built before the units exist, so it will miss all of them;
        // replaced below with a two-entry table.
        QuotaFormula::fixed(condo, "placeholder", Money::new(dec!(1), Currency::USD))
    });

    // Rebuild the formula with amounts for only two of the three units.
    let units = fx.directory.active_units(fx.condo);
    let mut amounts = HashMap::new();
    amounts.insert(units[0].id, Money::new(dec!(80.00), Currency::USD));
    amounts.insert(units[1].id, Money::new(dec!(95.00), Currency::USD));
    let formula = QuotaFormula::per_unit(fx.condo, "Table", amounts).unwrap();
    let formula_id = formula.id;
    fx.formulas.clear();
    fx.formulas.insert(formula_id, formula);
    fx.rules = RuleSet::new();
    fx.rules
        .add(GenerationRule::new(
            fx.concept.id,
            formula_id,
            EffectiveWindow::open_from(date(2024, 1, 1)),
        ))
        .unwrap();

    let generator = domain_quota::QuotaGenerator {
        directory: &fx.directory,
        rules: &fx.rules,
        formulas: &fx.formulas,
        rates: &fx.rates,
    };
    let outcome = generator.run(
        &mut fx.schedule,
        &fx.concept,
        &EvaluationContext::new(),
        &HashSet::new(),
        date(2024, 3, 1),
        GenerationMethod::Automatic,
        None,
    );

    assert_eq!(outcome.log.status, GenerationStatus::Partial);
    assert_eq!(outcome.log.quotas_created, 2);
    assert_eq!(outcome.log.quotas_failed, 1);
    assert_eq!(outcome.log.failures.len(), 1);
    // Partial success still advances the cursor.
    assert!(fx.schedule.last_generated_period.is_some());
}

#[test]
fn missing_rule_fails_the_run_without_advancing() {
    let mut fx = fixture(2, |condo| {
        QuotaFormula::fixed(condo, "Flat", Money::new(dec!(50.00), Currency::USD))
    });
    fx.rules = RuleSet::new(); // no rule at all

    let generator = domain_quota::QuotaGenerator {
        directory: &fx.directory,
        rules: &fx.rules,
        formulas: &fx.formulas,
        rates: &fx.rates,
    };
    let outcome = generator.run(
        &mut fx.schedule,
        &fx.concept,
        &EvaluationContext::new(),
        &HashSet::new(),
        date(2024, 3, 1),
        GenerationMethod::Automatic,
        None,
    );

    assert_eq!(outcome.log.status, GenerationStatus::Failed);
    assert!(outcome.quotas.is_empty());
    assert!(outcome.log.failures[0].reason.contains("No active generation rule"));
    assert!(fx.schedule.last_generated_period.is_none());
    assert!(fx.schedule.next_generation_date.is_none());
}

#[test]
fn foreign_currency_quota_freezes_base_amount() {
    let mut fx = fixture(1, |condo| {
        QuotaFormula::fixed(condo, "VES fee", Money::new(dec!(3650.00), Currency::VES))
    });
    fx.rates
        .publish(
            ExchangeRate::new(Currency::VES, Currency::USD, dec!(0.0274), date(2024, 2, 20))
                .unwrap(),
        )
        .unwrap();

    let generator = domain_quota::QuotaGenerator {
        directory: &fx.directory,
        rules: &fx.rules,
        formulas: &fx.formulas,
        rates: &fx.rates,
    };
    let outcome = generator.run(
        &mut fx.schedule,
        &fx.concept,
        &EvaluationContext::new(),
        &HashSet::new(),
        date(2024, 3, 1),
        GenerationMethod::Automatic,
        None,
    );

    assert_eq!(outcome.log.quotas_created, 1);
    let quota = &outcome.quotas[0];
    let frozen = quota.amount_in_base_currency.unwrap();
    assert_eq!(frozen.currency(), Currency::USD);
    assert_eq!(frozen.amount(), dec!(100.01));
    let used = quota.exchange_rate_used.unwrap();
    assert_eq!(used.effective_date, date(2024, 2, 20));
    assert!(!used.inverted);
}

#[test]
fn missing_rate_fails_only_the_foreign_currency_unit() {
    let mut fx = fixture(2, |condo| {
        QuotaFormula::fixed(condo, "VES fee", Money::new(dec!(1000.00), Currency::VES))
    });
    // No VES->USD rate published.
    let generator = domain_quota::QuotaGenerator {
        directory: &fx.directory,
        rules: &fx.rules,
        formulas: &fx.formulas,
        rates: &fx.rates,
    };
    let outcome = generator.run(
        &mut fx.schedule,
        &fx.concept,
        &EvaluationContext::new(),
        &HashSet::new(),
        date(2024, 3, 1),
        GenerationMethod::Automatic,
        None,
    );

    assert_eq!(outcome.log.status, GenerationStatus::Failed);
    assert_eq!(outcome.log.quotas_failed, 2);
    assert!(outcome.log.failures[0].reason.contains("No exchange rate"));
}

#[test]
fn expression_formula_charges_by_aliquot() {
    let mut fx = fixture(3, |condo| {
        QuotaFormula::expression(
            condo,
            "Aliquot share",
            "total_amount * aliquot / 100",
            &["total_amount".to_string(), "aliquot".to_string()],
            Currency::USD,
        )
        .unwrap()
    });

    let generator = domain_quota::QuotaGenerator {
        directory: &fx.directory,
        rules: &fx.rules,
        formulas: &fx.formulas,
        rates: &fx.rates,
    };
    let context = EvaluationContext::new().with_total_amount(dec!(9000));
    let outcome = generator.run(
        &mut fx.schedule,
        &fx.concept,
        &context,
        &HashSet::new(),
        date(2024, 3, 1),
        GenerationMethod::Automatic,
        None,
    );

    assert_eq!(outcome.log.quotas_created, 3);
    for quota in &outcome.quotas {
        // 9000 * 33.33 / 100
        assert_eq!(quota.base_amount().amount(), dec!(2999.70));
    }
}

proptest! {
    // The balance identity holds at every point of an apply/reverse pair,
    // for any in-bounds split of the payment.
    #[test]
    fn balance_identity_holds_across_apply_and_reverse(
        base_cents in 100i64..10_000_000i64,
        interest_cents in 0i64..1_000_000i64,
        principal_pct in 0u32..=100u32,
        interest_pct in 0u32..=100u32,
    ) {
        let base = Money::new(Decimal::new(base_cents, 2), Currency::USD);
        let interest = Money::new(Decimal::new(interest_cents, 2), Currency::USD);
        let mut quota = Quota::new(
            core_kernel::CondominiumId::new(),
            UnitId::new(),
            ConceptId::new(),
            BillingPeriod::monthly(2024, 3).unwrap(),
            base,
            date(2024, 3, 1),
            date(2024, 3, 15),
        );
        if !interest.is_zero() {
            quota.post_interest(interest, date(2024, 4, 1)).unwrap();
        }

        let hundred = Decimal::from(100u32);
        let to_principal = Money::new(
            (base.amount() * Decimal::from(principal_pct) / hundred).round_dp(2),
            Currency::USD,
        );
        let to_interest = Money::new(
            (interest.amount() * Decimal::from(interest_pct) / hundred).round_dp(2),
            Currency::USD,
        );
        let as_of = date(2024, 4, 10);
        quota.apply_payment(to_principal, to_interest, as_of).unwrap();

        let identity = quota.base_amount().amount() + quota.interest_amount().amount()
            - quota.paid_amount().amount();
        prop_assert_eq!(quota.balance().amount(), identity);
        prop_assert!(!quota.balance().is_negative());

        quota.reverse_payment(to_principal, to_interest, as_of).unwrap();
        prop_assert_eq!(
            quota.balance().amount(),
            base.amount() + interest.amount()
        );
    }
}
