//! Pre-built Test Fixtures
//!
//! Ready-to-use test data shared across the ledger test suites. Fixtures
//! are deterministic: the same directory shape, the same dates, the same
//! rates, so test expectations stay readable.

use chrono::NaiveDate;
use core_kernel::{BillingPeriod, BuildingId, CondominiumId, Currency, Money, Timezone, UnitId};
use domain_currency::{ExchangeRate, RateBook};
use domain_directory::{Building, Condominium, InMemoryDirectory, Unit};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    /// The standard monthly maintenance charge in most scenarios.
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }

    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }

    pub fn ves(amount: Decimal) -> Money {
        Money::new(amount, Currency::VES)
    }

    /// 3650.00 VES, which is 100.01 USD at the standard fixture rate.
    pub fn ves_3650() -> Money {
        Money::new(dec!(3650.00), Currency::VES)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The billing period most scenarios charge for.
    pub fn march_2024() -> BillingPeriod {
        BillingPeriod::monthly(2024, 3).unwrap()
    }

    /// Standard issue date (Mar 1, 2024).
    pub fn issue_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    /// Standard due date (Mar 15, 2024).
    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    /// A date safely past the due date and any grace window.
    pub fn well_overdue() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
}

/// A seeded directory plus the identifiers tests need to reference it.
pub struct SeededDirectory {
    pub directory: InMemoryDirectory,
    pub condominium_id: CondominiumId,
    pub building_id: BuildingId,
    /// Unit ids in unit-number order ("1-A", "2-B", "3-C").
    pub unit_ids: Vec<UnitId>,
}

/// Fixture for directory test data
pub struct DirectoryFixtures;

impl DirectoryFixtures {
    /// One condominium, one building, three active units whose aliquots
    /// sum to exactly 100 (33.33 / 33.33 / 33.34).
    pub fn three_unit_tower(base_currency: Currency) -> SeededDirectory {
        let mut directory = InMemoryDirectory::new();
        let condominium = Condominium::new("Residencias El Parque", base_currency, Timezone::default());
        let condominium_id = condominium.id;
        directory.add_condominium(condominium);

        let building = Building::new(condominium_id, "Torre Norte");
        let building_id = building.id;
        directory.add_building(building).unwrap();

        let mut unit_ids = Vec::new();
        for (number, aliquot) in [("1-A", dec!(33.33)), ("2-B", dec!(33.33)), ("3-C", dec!(33.34))] {
            let unit = Unit::new(condominium_id, building_id, number, aliquot).unwrap();
            unit_ids.push(unit.id);
            directory.add_unit(unit).unwrap();
        }

        SeededDirectory {
            directory,
            condominium_id,
            building_id,
            unit_ids,
        }
    }
}

/// Fixture for exchange-rate test data
pub struct RateFixtures;

impl RateFixtures {
    /// The standard VES→USD rate used across scenarios.
    pub fn ves_usd_rate() -> Decimal {
        dec!(0.0274)
    }

    /// A book holding VES→USD 0.0274 effective Mar 1, 2024.
    pub fn ves_usd_book() -> RateBook {
        let mut book = RateBook::new();
        book.publish(
            ExchangeRate::new(
                Currency::VES,
                Currency::USD,
                Self::ves_usd_rate(),
                TemporalFixtures::issue_date(),
            )
            .unwrap(),
        )
        .unwrap();
        book
    }

    /// An empty book, for conversion-unavailable scenarios.
    pub fn empty_book() -> RateBook {
        RateBook::new()
    }
}
