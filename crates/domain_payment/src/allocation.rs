//! The payment allocation engine
//!
//! Distributes a verified payment across outstanding quotas. Two modes:
//! explicit targets applied in caller order, or automatic selection of the
//! unit's open quotas oldest-due-first. Within a quota, interest settles
//! before principal. All remaining-amount arithmetic happens in the
//! payment's currency; per-quota conversions freeze the rate used.
//!
//! A quota whose currency cannot be converted on the payment date is
//! skipped and retried after a rate is published; in that case no pending
//! allocation is created for the leftover, since it is still spoken for.

use core_kernel::{ConceptId, Currency, Money, QuotaId};
use domain_currency::{CurrencyError, RateBook, ResolvedRate};
use domain_quota::{PaymentConcept, Quota};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::application::PaymentApplication;
use crate::error::PaymentError;
use crate::events::PaymentEvent;
use crate::payment::Payment;
use crate::pending::PaymentPendingAllocation;

/// Why a quota received nothing in this run.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Retryable: no rate between the currencies on the payment date.
    ConversionUnavailable { from: Currency, to: Currency },
    /// The concept disallows partial payment and the remainder cannot
    /// cover the full balance.
    PartialPaymentDisallowed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedQuota {
    pub quota_id: QuotaId,
    pub reason: SkipReason,
}

/// Everything one allocation run produced. The caller persists the
/// applications, the mutated quotas, and the pending allocation in one
/// transaction.
#[derive(Debug)]
pub struct AllocationOutcome {
    pub applications: Vec<PaymentApplication>,
    pub pending: Option<PaymentPendingAllocation>,
    pub skipped: Vec<SkippedQuota>,
    pub events: Vec<PaymentEvent>,
}

impl AllocationOutcome {
    /// Total spent, in the payment's currency.
    pub fn total_allocated(&self, currency: Currency) -> Money {
        self.applications
            .iter()
            .fold(Money::zero(currency), |acc, a| {
                acc + a.amount_in_payment_currency
            })
    }
}

enum Step {
    Applied {
        application: PaymentApplication,
        spent: Money,
    },
    Skipped(SkipReason),
    Nothing,
}

pub struct AllocationEngine<'a> {
    pub rates: &'a RateBook,
}

impl AllocationEngine<'_> {
    /// Automatic allocation: the payment unit's open quotas, oldest due
    /// date first, honoring each concept's partial-payment flag.
    pub fn allocate(
        &self,
        payment: &Payment,
        quotas: &mut [Quota],
        concepts: &HashMap<ConceptId, PaymentConcept>,
    ) -> Result<AllocationOutcome, PaymentError> {
        if !payment.is_verified() {
            return Err(PaymentError::PaymentNotVerified(payment.id));
        }

        let mut order: Vec<usize> = (0..quotas.len())
            .filter(|&i| {
                let q = &quotas[i];
                q.is_open() && payment.unit_id.map_or(true, |u| q.unit_id == u)
            })
            .collect();
        order.sort_by_key(|&i| (quotas[i].due_date, quotas[i].created_at));

        self.run(payment, quotas, &order, |quota| {
            concepts
                .get(&quota.concept_id)
                .map_or(false, |c| !c.allow_partial_payment)
        })
    }

    /// Explicit allocation: the given quotas in the given order, each
    /// partial-paid up to its remaining balance.
    pub fn allocate_targeted(
        &self,
        payment: &Payment,
        quotas: &mut [Quota],
        targets: &[QuotaId],
    ) -> Result<AllocationOutcome, PaymentError> {
        if !payment.is_verified() {
            return Err(PaymentError::PaymentNotVerified(payment.id));
        }

        let mut order = Vec::with_capacity(targets.len());
        for target in targets {
            let idx = quotas
                .iter()
                .position(|q| q.id == *target)
                .ok_or_else(|| {
                    PaymentError::InvariantViolation(format!("target quota {target} not loaded"))
                })?;
            order.push(idx);
        }

        self.run(payment, quotas, &order, |_| false)
    }

    /// Undoes a refunded payment's applications, restoring quota balances.
    pub fn reverse(
        &self,
        payment: &Payment,
        applications: &[PaymentApplication],
        quotas: &mut [Quota],
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        for application in applications {
            let quota = quotas
                .iter_mut()
                .find(|q| q.id == application.quota_id)
                .ok_or_else(|| {
                    PaymentError::InvariantViolation(format!(
                        "quota {} for application {} not loaded",
                        application.quota_id, application.id
                    ))
                })?;
            quota.reverse_payment(
                application.applied_to_principal,
                application.applied_to_interest,
                payment.payment_date,
            )?;
            debug!(payment = %payment.id, quota = %quota.id, "application reversed");
        }
        info!(payment = %payment.id, count = applications.len(), "payment reversed");
        Ok(vec![PaymentEvent::PaymentRefunded {
            payment_id: payment.id,
        }])
    }

    fn run(
        &self,
        payment: &Payment,
        quotas: &mut [Quota],
        order: &[usize],
        require_full: impl Fn(&Quota) -> bool,
    ) -> Result<AllocationOutcome, PaymentError> {
        let mut remaining = payment.amount;
        let mut applications = Vec::new();
        let mut skipped = Vec::new();
        let mut events = Vec::new();

        for &idx in order {
            if remaining.is_zero() {
                break;
            }
            let quota = &mut quotas[idx];
            if applications
                .iter()
                .any(|a: &PaymentApplication| a.quota_id == quota.id)
            {
                return Err(PaymentError::DuplicateApplication {
                    payment: payment.id,
                    quota: quota.id,
                });
            }
            match self.try_apply(payment, quota, remaining, require_full(quota))? {
                Step::Applied { application, spent } => {
                    remaining = remaining.checked_sub(&spent).map_err(|_| {
                        PaymentError::AllocationExceedsPaymentAmount {
                            payment: payment.id,
                        }
                    })?;
                    if remaining.is_negative() {
                        return Err(PaymentError::AllocationExceedsPaymentAmount {
                            payment: payment.id,
                        });
                    }
                    events.push(PaymentEvent::PaymentApplied {
                        payment_id: payment.id,
                        quota_id: application.quota_id,
                        amount: application.applied_amount,
                    });
                    applications.push(application);
                }
                Step::Skipped(reason) => {
                    skipped.push(SkippedQuota {
                        quota_id: quota.id,
                        reason,
                    });
                }
                Step::Nothing => {}
            }
        }

        // Leftover becomes a pending allocation, unless part of the run was
        // blocked on a missing rate; those quotas still claim the funds.
        let blocked_on_rate = skipped
            .iter()
            .any(|s| matches!(s.reason, SkipReason::ConversionUnavailable { .. }));
        let pending = if remaining.is_positive() && !blocked_on_rate {
            let pending = PaymentPendingAllocation::new(payment.id, remaining);
            events.push(PaymentEvent::PendingAllocationCreated {
                pending_id: pending.id,
                payment_id: payment.id,
                amount: remaining,
            });
            Some(pending)
        } else {
            None
        };

        info!(
            payment = %payment.id,
            applications = applications.len(),
            skipped = skipped.len(),
            %remaining,
            "allocation run finished"
        );

        Ok(AllocationOutcome {
            applications,
            pending,
            skipped,
            events,
        })
    }

    /// Applies as much of `remaining` as this quota takes.
    fn try_apply(
        &self,
        payment: &Payment,
        quota: &mut Quota,
        remaining: Money,
        require_full: bool,
    ) -> Result<Step, PaymentError> {
        if !quota.is_open() {
            return Ok(Step::Nothing);
        }
        let balance_q = quota.balance();
        let payment_ccy = payment.amount.currency();
        let quota_ccy = balance_q.currency();

        // Rate from payment currency to quota currency, as of payment date.
        let rate: Option<ResolvedRate> = if payment_ccy == quota_ccy {
            None
        } else {
            match self
                .rates
                .resolve(payment_ccy, quota_ccy, payment.payment_date)
            {
                Ok(resolved) => Some(resolved),
                Err(CurrencyError::RateUnavailable { .. }) => {
                    warn!(
                        payment = %payment.id,
                        quota = %quota.id,
                        %payment_ccy,
                        %quota_ccy,
                        "no rate on payment date, quota skipped"
                    );
                    return Ok(Step::Skipped(SkipReason::ConversionUnavailable {
                        from: payment_ccy,
                        to: quota_ccy,
                    }));
                }
                Err(err) => return Err(err.into()),
            }
        };

        // The quota's balance expressed in the payment's currency. Rates
        // are strictly positive, so the division cannot fail.
        let balance_p = match rate {
            Some(r) => Money::new(balance_q.amount() / r.rate, payment_ccy),
            None => balance_q,
        };

        if require_full && remaining.amount() < balance_p.amount() {
            return Ok(Step::Skipped(SkipReason::PartialPaymentDisallowed));
        }

        let spend_p = if remaining.amount() <= balance_p.amount() {
            remaining
        } else {
            balance_p
        };
        if !spend_p.is_positive() {
            return Ok(Step::Nothing);
        }

        // Full settles use the exact quota balance so conversion rounding
        // never leaves a cent behind.
        let applied_q = if spend_p == balance_p {
            balance_q
        } else {
            match rate {
                Some(r) => {
                    let converted = spend_p.convert(r.rate, quota_ccy).round_to_currency();
                    converted.min(balance_q)?
                }
                None => spend_p,
            }
        };

        // Interest first, then principal.
        let to_interest = quota.outstanding_interest().min(applied_q)?;
        let to_principal = applied_q.checked_sub(&to_interest)?;
        quota.apply_payment(to_principal, to_interest, payment.payment_date)?;

        Ok(Step::Applied {
            application: PaymentApplication::new(
                payment.id,
                quota.id,
                to_principal,
                to_interest,
                spend_p,
                rate,
            ),
            spent: spend_p,
        })
    }
}
