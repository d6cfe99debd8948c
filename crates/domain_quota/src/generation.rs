//! The generation run
//!
//! One run materializes quotas for one schedule and one target period.
//! Per-unit failures are collected, not thrown: the run finishes, writes an
//! immutable `GenerationLog`, and advances the schedule cursors unless
//! nothing at all could be generated. Re-running for the same period skips
//! units that already have a quota.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{
    BillingPeriod, ConceptId, FormulaId, GenerationLogId, Money, RuleId, ScheduleId, UnitId,
    UserId,
};
use domain_currency::RateBook;
use domain_directory::UnitDirectory;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::concept::PaymentConcept;
use crate::error::QuotaError;
use crate::events::QuotaEvent;
use crate::formula::{EvaluationContext, QuotaFormula};
use crate::quota::Quota;
use crate::rule::RuleSet;
use crate::schedule::GenerationSchedule;

/// Who pulled the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Completed,
    Partial,
    Failed,
}

/// One failure inside a run. `unit_id` is `None` for run-level failures
/// such as a missing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub unit_id: Option<UnitId>,
    pub unit_number: Option<String>,
    pub reason: String,
}

/// Immutable audit record of one run. Failures are recorded here for
/// manual remediation, never retried destructively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationLog {
    pub id: GenerationLogId,
    pub schedule_id: ScheduleId,
    pub concept_id: ConceptId,
    pub rule_id: Option<RuleId>,
    pub formula_id: Option<FormulaId>,
    /// The formula as it was at run time; the formula row may be retired
    /// later.
    pub formula_snapshot: Option<serde_json::Value>,
    pub period: BillingPeriod,
    pub quotas_created: u32,
    pub quotas_failed: u32,
    /// Units skipped because a quota already existed for the period.
    pub quotas_skipped: u32,
    pub total_amount: Option<Money>,
    pub units_affected: u32,
    pub failures: Vec<GenerationFailure>,
    pub status: GenerationStatus,
    pub method: GenerationMethod,
    pub triggered_by: Option<UserId>,
    pub executed_at: DateTime<Utc>,
}

/// Everything a run produced. The caller persists quotas and the log in
/// one transaction, then publishes the events.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub quotas: Vec<Quota>,
    pub log: GenerationLog,
    pub events: Vec<QuotaEvent>,
}

/// Runs generation against read-only views of the directory, the rule set,
/// the formula catalog, and the rate book.
pub struct QuotaGenerator<'a> {
    pub directory: &'a dyn UnitDirectory,
    pub rules: &'a RuleSet,
    pub formulas: &'a HashMap<FormulaId, QuotaFormula>,
    pub rates: &'a RateBook,
}

impl QuotaGenerator<'_> {
    /// Executes one run for `schedule` as of `today`.
    ///
    /// `existing` holds the (unit, concept, period) keys already
    /// materialized; matching units are skipped and reported as already
    /// generated. The schedule advances unless the run failed outright.
    pub fn run(
        &self,
        schedule: &mut GenerationSchedule,
        concept: &PaymentConcept,
        context: &EvaluationContext,
        existing: &HashSet<(UnitId, ConceptId, BillingPeriod)>,
        today: NaiveDate,
        method: GenerationMethod,
        triggered_by: Option<UserId>,
    ) -> GenerationOutcome {
        let period = schedule.target_period(today);
        let issue_date = schedule.issue_date(period, concept);
        let due_date = schedule.due_date(period, concept);
        let log_id = GenerationLogId::new();

        let Some(rule) = self.rules.active_rule_for(concept.id, issue_date) else {
            warn!(concept = %concept.id, %issue_date, "no active generation rule");
            return self.failed_outcome(
                log_id,
                schedule,
                concept,
                period,
                None,
                None,
                QuotaError::NoActiveRule {
                    concept: concept.id,
                    as_of: issue_date,
                },
                method,
                triggered_by,
            );
        };

        let Some(formula) = self.formulas.get(&rule.formula_id) else {
            return self.failed_outcome(
                log_id,
                schedule,
                concept,
                period,
                Some(rule.id),
                Some(rule.formula_id),
                QuotaError::InvalidConcept(format!(
                    "rule {} references unknown formula {}",
                    rule.id, rule.formula_id
                )),
                method,
                triggered_by,
            );
        };

        let units: Vec<_> = self
            .directory
            .active_units(concept.condominium_id)
            .into_iter()
            .filter(|u| concept.building_id.map_or(true, |b| u.building_id == b))
            .collect();

        let base_currency = self
            .directory
            .condominium(concept.condominium_id)
            .map(|c| c.base_currency)
            .ok();

        let mut quotas = Vec::new();
        let mut events = Vec::new();
        let mut failures = Vec::new();
        let mut skipped = 0u32;
        let mut total: Option<Money> = None;

        for unit in &units {
            if existing.contains(&(unit.id, concept.id, period)) {
                skipped += 1;
                continue;
            }

            let amount = match formula.evaluate(unit, context) {
                Ok(amount) => amount,
                Err(err) => {
                    failures.push(GenerationFailure {
                        unit_id: Some(unit.id),
                        unit_number: Some(unit.unit_number.clone()),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let mut quota = Quota::new(
                concept.condominium_id,
                unit.id,
                concept.id,
                period,
                amount,
                issue_date,
                due_date,
            )
            .from_generation(log_id);

            // Freeze the base-currency figure at issue time. A missing rate
            // fails this unit; the run continues.
            if let Some(base) = base_currency {
                if base != amount.currency() {
                    match self.rates.resolve(amount.currency(), base, issue_date) {
                        Ok(resolved) => {
                            let converted =
                                amount.convert(resolved.rate, base).round_to_currency();
                            quota = quota.with_base_currency_amount(converted, resolved);
                        }
                        Err(err) => {
                            failures.push(GenerationFailure {
                                unit_id: Some(unit.id),
                                unit_number: Some(unit.unit_number.clone()),
                                reason: err.to_string(),
                            });
                            continue;
                        }
                    }
                }
            }

            total = Some(match total {
                Some(t) => t + amount,
                None => amount,
            });
            events.push(QuotaEvent::QuotaGenerated {
                quota_id: quota.id,
                unit_id: unit.id,
                concept_id: concept.id,
                period,
                amount,
                due_date,
            });
            quotas.push(quota);
        }

        let created = quotas.len() as u32;
        let failed = failures.len() as u32;
        let status = if created == 0 && failed > 0 {
            GenerationStatus::Failed
        } else if failed > 0 {
            GenerationStatus::Partial
        } else {
            GenerationStatus::Completed
        };

        let log = GenerationLog {
            id: log_id,
            schedule_id: schedule.id,
            concept_id: concept.id,
            rule_id: Some(rule.id),
            formula_id: Some(formula.id),
            formula_snapshot: Some(formula.snapshot()),
            period,
            quotas_created: created,
            quotas_failed: failed,
            quotas_skipped: skipped,
            total_amount: total,
            units_affected: created,
            failures,
            status,
            method,
            triggered_by,
            executed_at: Utc::now(),
        };

        if status != GenerationStatus::Failed {
            schedule.advance(period, today);
        }

        events.push(QuotaEvent::GenerationCompleted {
            log_id,
            concept_id: concept.id,
            period,
            quotas_created: created,
            quotas_failed: failed,
        });

        info!(
            concept = %concept.id,
            %period,
            created,
            failed,
            skipped,
            ?status,
            "generation run finished"
        );

        GenerationOutcome {
            quotas,
            log,
            events,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn failed_outcome(
        &self,
        log_id: GenerationLogId,
        schedule: &GenerationSchedule,
        concept: &PaymentConcept,
        period: BillingPeriod,
        rule_id: Option<RuleId>,
        formula_id: Option<FormulaId>,
        error: QuotaError,
        method: GenerationMethod,
        triggered_by: Option<UserId>,
    ) -> GenerationOutcome {
        let log = GenerationLog {
            id: log_id,
            schedule_id: schedule.id,
            concept_id: concept.id,
            rule_id,
            formula_id,
            formula_snapshot: None,
            period,
            quotas_created: 0,
            quotas_failed: 0,
            quotas_skipped: 0,
            total_amount: None,
            units_affected: 0,
            failures: vec![GenerationFailure {
                unit_id: None,
                unit_number: None,
                reason: error.to_string(),
            }],
            status: GenerationStatus::Failed,
            method,
            triggered_by,
            executed_at: Utc::now(),
        };
        GenerationOutcome {
            quotas: Vec::new(),
            log,
            events: Vec::new(),
        }
    }
}
