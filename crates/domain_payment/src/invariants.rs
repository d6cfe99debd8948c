//! Cross-cutting ledger invariant checks
//!
//! Run at the boundary of any mutation, before commit. A violation here is
//! a defect in the allocation arithmetic, so every check returns the fatal
//! `InvariantViolation` (or its specific cousins), never a user error.

use core_kernel::Money;
use domain_quota::Quota;
use std::collections::HashSet;

use crate::application::PaymentApplication;
use crate::error::PaymentError;
use crate::payment::Payment;

pub struct LedgerInvariants;

impl LedgerInvariants {
    /// A payment's applications must not exceed its amount, and must touch
    /// each quota at most once.
    pub fn check_payment(
        payment: &Payment,
        applications: &[PaymentApplication],
    ) -> Result<(), PaymentError> {
        let mut seen = HashSet::new();
        for application in applications {
            if application.payment_id != payment.id {
                return Err(PaymentError::InvariantViolation(format!(
                    "application {} belongs to another payment",
                    application.id
                )));
            }
            if !seen.insert(application.quota_id) {
                return Err(PaymentError::DuplicateApplication {
                    payment: payment.id,
                    quota: application.quota_id,
                });
            }
        }

        let total = applications.iter().try_fold(
            Money::zero(payment.amount.currency()),
            |acc, a| acc.checked_add(&a.amount_in_payment_currency),
        )?;
        if total.amount() > payment.amount.amount() {
            return Err(PaymentError::AllocationExceedsPaymentAmount {
                payment: payment.id,
            });
        }
        Ok(())
    }

    /// A quota's balance identity must hold and its applications must not
    /// exceed what it ever owed.
    pub fn check_quota(
        quota: &Quota,
        applications: &[PaymentApplication],
    ) -> Result<(), PaymentError> {
        if quota.balance().is_negative() {
            return Err(PaymentError::InvariantViolation(format!(
                "quota {} has negative balance {}",
                quota.id,
                quota.balance()
            )));
        }

        let expected = quota.base_amount() + quota.interest_amount() - quota.paid_amount();
        if expected != quota.balance() {
            return Err(PaymentError::InvariantViolation(format!(
                "quota {} balance drifted from base + interest - paid",
                quota.id
            )));
        }

        let owed = quota.base_amount().checked_add(&quota.interest_amount())?;
        let applied = applications
            .iter()
            .filter(|a| a.quota_id == quota.id)
            .try_fold(Money::zero(owed.currency()), |acc, a| {
                acc.checked_add(&a.applied_amount)
            })?;
        if applied.amount() > owed.amount() {
            return Err(PaymentError::InvariantViolation(format!(
                "quota {} applications exceed base + interest",
                quota.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentMethod;
    use chrono::NaiveDate;
    use core_kernel::{CondominiumId, Currency, PaymentId, QuotaId, UnitId};
    use domain_currency::RateBook;
    use rust_decimal_macros::dec;

    fn verified_payment(amount: rust_decimal::Decimal) -> Payment {
        let mut p = Payment::report(
            CondominiumId::new(),
            Some(UnitId::new()),
            Money::new(amount, Currency::USD),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            PaymentMethod::Transfer,
        );
        p.verify(None).unwrap();
        p
    }

    fn application(payment: PaymentId, amount: rust_decimal::Decimal) -> PaymentApplication {
        PaymentApplication::new(
            payment,
            QuotaId::new(),
            Money::new(amount, Currency::USD),
            Money::zero(Currency::USD),
            Money::new(amount, Currency::USD),
            None,
        )
    }

    #[test]
    fn applications_within_payment_amount_pass() {
        let payment = verified_payment(dec!(100.00));
        let apps = vec![
            application(payment.id, dec!(60.00)),
            application(payment.id, dec!(40.00)),
        ];
        assert!(LedgerInvariants::check_payment(&payment, &apps).is_ok());
    }

    #[test]
    fn oversubscribed_payment_is_fatal() {
        let payment = verified_payment(dec!(100.00));
        let apps = vec![
            application(payment.id, dec!(60.00)),
            application(payment.id, dec!(40.01)),
        ];
        assert!(matches!(
            LedgerInvariants::check_payment(&payment, &apps),
            Err(PaymentError::AllocationExceedsPaymentAmount { .. })
        ));
    }

    #[test]
    fn duplicate_quota_pair_is_fatal() {
        let payment = verified_payment(dec!(100.00));
        let mut first = application(payment.id, dec!(30.00));
        let second = application(payment.id, dec!(30.00));
        first.quota_id = second.quota_id;
        assert!(matches!(
            LedgerInvariants::check_payment(&payment, &[first, second]),
            Err(PaymentError::DuplicateApplication { .. })
        ));
    }

    #[test]
    fn quota_checks_pass_after_engine_allocation() {
        use core_kernel::{BillingPeriod, ConceptId};
        use domain_quota::Quota;

        let mut quota = Quota::new(
            CondominiumId::new(),
            UnitId::new(),
            ConceptId::new(),
            BillingPeriod::monthly(2024, 3).unwrap(),
            Money::new(dec!(100.00), Currency::USD),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        );
        let mut payment = verified_payment(dec!(60.00));
        payment.unit_id = Some(quota.unit_id);

        let rates = RateBook::new();
        let engine = crate::allocation::AllocationEngine { rates: &rates };
        let outcome = engine
            .allocate(&payment, std::slice::from_mut(&mut quota), &Default::default())
            .unwrap();

        LedgerInvariants::check_payment(&payment, &outcome.applications).unwrap();
        LedgerInvariants::check_quota(&quota, &outcome.applications).unwrap();
    }
}
