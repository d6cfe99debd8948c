//! Quota repository
//!
//! Owns the generation reference data (concepts, formulas, rules, interest
//! configurations) and the quota rows themselves. `record_run` is the write
//! path of a generation run: quotas and the log commit in one transaction,
//! with `ON CONFLICT DO NOTHING` on the (unit, concept, period) key so a
//! concurrent duplicate run degrades to skips instead of double-charging.
//!
//! Rehydration goes through the domain `restore` constructors, so a row
//! that violates the balance identity is rejected at load time.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{
    BillingPeriod, ConceptId, CondominiumId, Currency, EffectiveWindow, Money, UnitId,
};
use domain_quota::{
    AdjustmentPolicy, CalculationPeriod, ConceptType, GenerationOutcome, GenerationRule,
    InterestConfiguration, InterestScope, InterestType, PaymentConcept, Quota, QuotaAdjustment,
    QuotaFormula, QuotaStatus, Recurrence, RuleSet,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct QuotaRepository {
    pool: PgPool,
}

pub(crate) fn quota_status_str(status: QuotaStatus) -> &'static str {
    match status {
        QuotaStatus::Pending => "pending",
        QuotaStatus::Partial => "partial",
        QuotaStatus::Paid => "paid",
        QuotaStatus::Overdue => "overdue",
        QuotaStatus::Cancelled => "cancelled",
    }
}

fn parse_quota_status(s: &str) -> Result<QuotaStatus, DatabaseError> {
    match s {
        "pending" => Ok(QuotaStatus::Pending),
        "partial" => Ok(QuotaStatus::Partial),
        "paid" => Ok(QuotaStatus::Paid),
        "overdue" => Ok(QuotaStatus::Overdue),
        "cancelled" => Ok(QuotaStatus::Cancelled),
        other => Err(DatabaseError::Mapping(format!(
            "unknown quota status {other:?}"
        ))),
    }
}

fn concept_type_str(t: ConceptType) -> &'static str {
    match t {
        ConceptType::Maintenance => "maintenance",
        ConceptType::CondominiumFee => "condominium_fee",
        ConceptType::Extraordinary => "extraordinary",
        ConceptType::Fine => "fine",
    }
}

fn parse_concept_type(s: &str) -> Result<ConceptType, DatabaseError> {
    match s {
        "maintenance" => Ok(ConceptType::Maintenance),
        "condominium_fee" => Ok(ConceptType::CondominiumFee),
        "extraordinary" => Ok(ConceptType::Extraordinary),
        "fine" => Ok(ConceptType::Fine),
        other => Err(DatabaseError::Mapping(format!(
            "unknown concept type {other:?}"
        ))),
    }
}

fn recurrence_str(r: Recurrence) -> &'static str {
    match r {
        Recurrence::OneOff => "one_off",
        Recurrence::Monthly => "monthly",
        Recurrence::Quarterly => "quarterly",
        Recurrence::SemiAnnual => "semi_annual",
        Recurrence::Annual => "annual",
    }
}

fn parse_recurrence(s: &str) -> Result<Recurrence, DatabaseError> {
    match s {
        "one_off" => Ok(Recurrence::OneOff),
        "monthly" => Ok(Recurrence::Monthly),
        "quarterly" => Ok(Recurrence::Quarterly),
        "semi_annual" => Ok(Recurrence::SemiAnnual),
        "annual" => Ok(Recurrence::Annual),
        other => Err(DatabaseError::Mapping(format!(
            "unknown recurrence {other:?}"
        ))),
    }
}

fn period_columns(period: BillingPeriod) -> (i32, Option<i32>) {
    (period.year, period.month.map(|m| m as i32))
}

fn period_from_columns(year: i32, month: Option<i32>) -> Result<BillingPeriod, DatabaseError> {
    match month {
        Some(m) => BillingPeriod::monthly(year, m as u32)
            .map_err(|e| DatabaseError::Mapping(e.to_string())),
        None => Ok(BillingPeriod::yearly(year)),
    }
}

fn currency_from(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_code(code).map_err(|e| DatabaseError::Mapping(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DatabaseError> {
    serde_json::to_value(value).map_err(|e| DatabaseError::Mapping(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, DatabaseError> {
    serde_json::from_value(value).map_err(|e| DatabaseError::Mapping(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct QuotaRow {
    quota_id: Uuid,
    condominium_id: Uuid,
    unit_id: Uuid,
    concept_id: Uuid,
    period_year: i32,
    period_month: Option<i32>,
    description: String,
    base_amount: Decimal,
    interest_amount: Decimal,
    paid_amount: Decimal,
    interest_paid: Decimal,
    currency: String,
    amount_in_base_currency: Option<Decimal>,
    base_currency: Option<String>,
    exchange_rate_used: Option<serde_json::Value>,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    interest_accrued_through: Option<NaiveDate>,
    status: String,
    generation_log_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl QuotaRow {
    fn into_domain(self) -> Result<Quota, DatabaseError> {
        let currency = currency_from(&self.currency)?;
        let period = period_from_columns(self.period_year, self.period_month)?;
        let in_base = match (self.amount_in_base_currency, self.base_currency.as_deref()) {
            (Some(amount), Some(code)) => Some(Money::new(amount, currency_from(code)?)),
            _ => None,
        };
        let rate_used = self.exchange_rate_used.map(from_json).transpose()?;
        Quota::restore(
            self.quota_id.into(),
            self.condominium_id.into(),
            self.unit_id.into(),
            self.concept_id.into(),
            period,
            self.description,
            Money::new(self.base_amount, currency),
            Money::new(self.interest_amount, currency),
            Money::new(self.paid_amount, currency),
            Money::new(self.interest_paid, currency),
            in_base,
            rate_used,
            self.issue_date,
            self.due_date,
            self.interest_accrued_through,
            parse_quota_status(&self.status)?,
            self.generation_log_id.map(Into::into),
            self.created_at,
        )
        .map_err(|e| DatabaseError::Mapping(e.to_string()))
    }
}

#[derive(sqlx::FromRow)]
struct ConceptRow {
    concept_id: Uuid,
    condominium_id: Uuid,
    building_id: Option<Uuid>,
    name: String,
    concept_type: String,
    currency: String,
    recurrence: String,
    allow_partial_payment: bool,
    adjustments: serde_json::Value,
    issue_day: i32,
    due_day: i32,
    category_id: Option<Uuid>,
    created_by: Option<Uuid>,
    is_active: bool,
}

impl ConceptRow {
    fn into_domain(self) -> Result<PaymentConcept, DatabaseError> {
        let adjustments: AdjustmentPolicy = from_json(self.adjustments)?;
        Ok(PaymentConcept {
            id: self.concept_id.into(),
            condominium_id: self.condominium_id.into(),
            building_id: self.building_id.map(Into::into),
            name: self.name,
            concept_type: parse_concept_type(&self.concept_type)?,
            currency: currency_from(&self.currency)?,
            recurrence: parse_recurrence(&self.recurrence)?,
            allow_partial_payment: self.allow_partial_payment,
            adjustments,
            issue_day: self.issue_day as u32,
            due_day: self.due_day as u32,
            category: self.category_id.map(Into::into),
            created_by: self.created_by.map(Into::into),
            is_active: self.is_active,
        })
    }
}

impl QuotaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_concept(&self, concept: &PaymentConcept) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payment_concepts (
                concept_id, condominium_id, building_id, name, concept_type,
                currency, recurrence, allow_partial_payment, adjustments,
                issue_day, due_day, category_id, created_by, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(Uuid::from(concept.id))
        .bind(Uuid::from(concept.condominium_id))
        .bind(concept.building_id.map(Uuid::from))
        .bind(&concept.name)
        .bind(concept_type_str(concept.concept_type))
        .bind(concept.currency.code())
        .bind(recurrence_str(concept.recurrence))
        .bind(concept.allow_partial_payment)
        .bind(to_json(&concept.adjustments)?)
        .bind(concept.issue_day as i32)
        .bind(concept.due_day as i32)
        .bind(concept.category.map(Uuid::from))
        .bind(concept.created_by.map(Uuid::from))
        .bind(concept.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    pub async fn concepts(
        &self,
        condominium: CondominiumId,
    ) -> Result<Vec<PaymentConcept>, DatabaseError> {
        let rows: Vec<ConceptRow> = sqlx::query_as(
            r#"
            SELECT concept_id, condominium_id, building_id, name, concept_type,
                   currency, recurrence, allow_partial_payment, adjustments,
                   issue_day, due_day, category_id, created_by, is_active
            FROM payment_concepts
            WHERE condominium_id = $1
            ORDER BY name
            "#,
        )
        .bind(Uuid::from(condominium))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter().map(ConceptRow::into_domain).collect()
    }

    pub async fn insert_formula(&self, formula: &QuotaFormula) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO quota_formulas (
                formula_id, condominium_id, name, kind, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(formula.id))
        .bind(Uuid::from(formula.condominium_id))
        .bind(&formula.name)
        .bind(to_json(&formula.kind)?)
        .bind(formula.is_active)
        .bind(formula.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    /// The active formula catalog of a condominium, keyed for the generator.
    ///
    /// Deserializing `kind` re-parses expression formulas, so a formula that
    /// no longer passes validation fails here instead of mid-run.
    pub async fn load_formulas(
        &self,
        condominium: CondominiumId,
    ) -> Result<HashMap<core_kernel::FormulaId, QuotaFormula>, DatabaseError> {
        let rows: Vec<(Uuid, Uuid, String, serde_json::Value, bool, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT formula_id, condominium_id, name, kind, is_active, created_at
                FROM quota_formulas
                WHERE condominium_id = $1 AND is_active
                "#,
            )
            .bind(Uuid::from(condominium))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e))?;

        let mut formulas = HashMap::with_capacity(rows.len());
        for (id, condo, name, kind, is_active, created_at) in rows {
            let formula = QuotaFormula {
                id: id.into(),
                condominium_id: condo.into(),
                name,
                kind: from_json(kind)?,
                is_active,
                created_at,
            };
            formulas.insert(formula.id, formula);
        }
        Ok(formulas)
    }

    /// Inserts a generation rule.
    ///
    /// # Errors
    ///
    /// `DatabaseError::RuleOverlap` when the rule's window overlaps an
    /// existing rule of the same concept; the exclusion constraint is the
    /// arbiter under concurrency.
    pub async fn insert_rule(&self, rule: &GenerationRule) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO generation_rules (
                rule_id, concept_id, formula_id, effective_from, effective_to,
                created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(rule.id))
        .bind(Uuid::from(rule.concept_id))
        .bind(Uuid::from(rule.formula_id))
        .bind(rule.window.from)
        .bind(rule.window.to)
        .bind(rule.created_by.map(Uuid::from))
        .bind(rule.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    pub async fn load_rules(&self, condominium: CondominiumId) -> Result<RuleSet, DatabaseError> {
        let rows: Vec<(Uuid, Uuid, Uuid, NaiveDate, Option<NaiveDate>, Option<Uuid>, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT r.rule_id, r.concept_id, r.formula_id, r.effective_from,
                       r.effective_to, r.created_by, r.created_at
                FROM generation_rules r
                JOIN payment_concepts c ON c.concept_id = r.concept_id
                WHERE c.condominium_id = $1
                ORDER BY r.effective_from
                "#,
            )
            .bind(Uuid::from(condominium))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e))?;

        let mut rules = RuleSet::new();
        for (id, concept, formula, from, to, created_by, created_at) in rows {
            let window = EffectiveWindow::new(from, to)
                .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
            let rule = GenerationRule {
                id: id.into(),
                concept_id: concept.into(),
                formula_id: formula.into(),
                window,
                created_by: created_by.map(Into::into),
                created_at,
            };
            // The exclusion constraint makes overlap impossible on disk.
            rules
                .add(rule)
                .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
        }
        Ok(rules)
    }

    pub async fn insert_interest_config(
        &self,
        config: &InterestConfiguration,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO interest_configurations (
                config_id, scope, interest_type, rate, calculation_period,
                grace_days, effective_from, effective_to, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::from(config.id))
        .bind(to_json(&config.scope)?)
        .bind(match config.interest_type {
            InterestType::Simple => "simple",
            InterestType::Compound => "compound",
        })
        .bind(config.rate)
        .bind(match config.calculation_period {
            CalculationPeriod::Daily => "daily",
            CalculationPeriod::Monthly => "monthly",
        })
        .bind(config.grace_days as i32)
        .bind(config.window.from)
        .bind(config.window.to)
        .bind(config.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    pub async fn active_interest_configs(
        &self,
    ) -> Result<Vec<InterestConfiguration>, DatabaseError> {
        let rows: Vec<(
            Uuid,
            serde_json::Value,
            String,
            Decimal,
            String,
            i32,
            NaiveDate,
            Option<NaiveDate>,
            bool,
        )> = sqlx::query_as(
            r#"
            SELECT config_id, scope, interest_type, rate, calculation_period,
                   grace_days, effective_from, effective_to, is_active
            FROM interest_configurations
            WHERE is_active
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        let mut configs = Vec::with_capacity(rows.len());
        for (id, scope, itype, rate, period, grace, from, to, is_active) in rows {
            let scope: InterestScope = from_json(scope)?;
            let interest_type = match itype.as_str() {
                "simple" => InterestType::Simple,
                "compound" => InterestType::Compound,
                other => {
                    return Err(DatabaseError::Mapping(format!(
                        "unknown interest type {other:?}"
                    )))
                }
            };
            let calculation_period = match period.as_str() {
                "daily" => CalculationPeriod::Daily,
                "monthly" => CalculationPeriod::Monthly,
                other => {
                    return Err(DatabaseError::Mapping(format!(
                        "unknown calculation period {other:?}"
                    )))
                }
            };
            let window = EffectiveWindow::new(from, to)
                .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
            configs.push(InterestConfiguration {
                id: id.into(),
                scope,
                interest_type,
                rate,
                calculation_period,
                grace_days: grace as u32,
                window,
                is_active,
            });
        }
        Ok(configs)
    }

    /// The (unit, concept, period) keys already materialized for a concept
    /// and period, fed to the generator's skip check.
    pub async fn existing_keys(
        &self,
        concept: ConceptId,
        period: BillingPeriod,
    ) -> Result<HashSet<(UnitId, ConceptId, BillingPeriod)>, DatabaseError> {
        let (year, month) = period_columns(period);
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT unit_id
            FROM quotas
            WHERE concept_id = $1
              AND period_year = $2
              AND COALESCE(period_month, 0) = COALESCE($3, 0)
              AND status <> 'cancelled'
            "#,
        )
        .bind(Uuid::from(concept))
        .bind(year)
        .bind(month)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        Ok(rows
            .into_iter()
            .map(|(unit,)| (UnitId::from(unit), concept, period))
            .collect())
    }

    /// Persists a generation run: every quota plus the log, atomically.
    ///
    /// Returns how many quota rows were actually inserted. A row that lost
    /// the race to a concurrent run hits `ON CONFLICT DO NOTHING` and is
    /// simply not counted; the log keeps the run's own view.
    pub async fn record_run(&self, outcome: &GenerationOutcome) -> Result<u64, DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let mut inserted = 0u64;
        for quota in &outcome.quotas {
            let (year, month) = period_columns(quota.period);
            let result = sqlx::query(
                r#"
                INSERT INTO quotas (
                    quota_id, condominium_id, unit_id, concept_id,
                    period_year, period_month, description,
                    base_amount, interest_amount, paid_amount, interest_paid,
                    currency, amount_in_base_currency, base_currency,
                    exchange_rate_used, issue_date, due_date,
                    interest_accrued_through, status, generation_log_id, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                          $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
                ON CONFLICT (unit_id, concept_id, period_year, COALESCE(period_month, 0))
                    WHERE status <> 'cancelled'
                    DO NOTHING
                "#,
            )
            .bind(Uuid::from(quota.id))
            .bind(Uuid::from(quota.condominium_id))
            .bind(Uuid::from(quota.unit_id))
            .bind(Uuid::from(quota.concept_id))
            .bind(year)
            .bind(month)
            .bind(&quota.description)
            .bind(quota.base_amount().amount())
            .bind(quota.interest_amount().amount())
            .bind(quota.paid_amount().amount())
            .bind(quota.interest_paid().amount())
            .bind(quota.base_amount().currency().code())
            .bind(quota.amount_in_base_currency.map(|m| m.amount()))
            .bind(quota.amount_in_base_currency.map(|m| m.currency().code()))
            .bind(
                quota
                    .exchange_rate_used
                    .as_ref()
                    .map(to_json)
                    .transpose()?,
            )
            .bind(quota.issue_date)
            .bind(quota.due_date)
            .bind(quota.interest_accrued_through)
            .bind(quota_status_str(quota.status()))
            .bind(quota.generation_log_id.map(Uuid::from))
            .bind(quota.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from(&e))?;
            inserted += result.rows_affected();
        }

        let log = &outcome.log;
        let (year, month) = period_columns(log.period);
        sqlx::query(
            r#"
            INSERT INTO generation_logs (
                log_id, schedule_id, concept_id, rule_id, formula_id,
                formula_snapshot, period_year, period_month,
                quotas_created, quotas_failed, quotas_skipped,
                total_amount, total_currency, units_affected, failures,
                status, method, triggered_by, executed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                      $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(Uuid::from(log.id))
        .bind(Uuid::from(log.schedule_id))
        .bind(Uuid::from(log.concept_id))
        .bind(log.rule_id.map(Uuid::from))
        .bind(log.formula_id.map(Uuid::from))
        .bind(&log.formula_snapshot)
        .bind(year)
        .bind(month)
        .bind(log.quotas_created as i32)
        .bind(log.quotas_failed as i32)
        .bind(log.quotas_skipped as i32)
        .bind(log.total_amount.map(|m| m.amount()))
        .bind(log.total_amount.map(|m| m.currency().code()))
        .bind(log.units_affected as i32)
        .bind(to_json(&log.failures)?)
        .bind(match log.status {
            domain_quota::GenerationStatus::Completed => "completed",
            domain_quota::GenerationStatus::Partial => "partial",
            domain_quota::GenerationStatus::Failed => "failed",
        })
        .bind(match log.method {
            domain_quota::GenerationMethod::Automatic => "automatic",
            domain_quota::GenerationMethod::Manual => "manual",
        })
        .bind(log.triggered_by.map(Uuid::from))
        .bind(log.executed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        info!(
            log = %log.id,
            created = log.quotas_created,
            inserted,
            "generation run persisted"
        );
        Ok(inserted)
    }

    /// A unit's open quotas, oldest due date first, ready for allocation.
    pub async fn open_quotas_for_unit(&self, unit: UnitId) -> Result<Vec<Quota>, DatabaseError> {
        let rows: Vec<QuotaRow> = sqlx::query_as(
            r#"
            SELECT quota_id, condominium_id, unit_id, concept_id,
                   period_year, period_month, description,
                   base_amount, interest_amount, paid_amount, interest_paid,
                   currency, amount_in_base_currency, base_currency,
                   exchange_rate_used, issue_date, due_date,
                   interest_accrued_through, status, generation_log_id, created_at
            FROM quotas
            WHERE unit_id = $1 AND status IN ('pending', 'partial', 'overdue')
            ORDER BY due_date, created_at
            "#,
        )
        .bind(Uuid::from(unit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter().map(QuotaRow::into_domain).collect()
    }

    pub async fn find(&self, id: core_kernel::QuotaId) -> Result<Quota, DatabaseError> {
        let row: Option<QuotaRow> = sqlx::query_as(
            r#"
            SELECT quota_id, condominium_id, unit_id, concept_id,
                   period_year, period_month, description,
                   base_amount, interest_amount, paid_amount, interest_paid,
                   currency, amount_in_base_currency, base_currency,
                   exchange_rate_used, issue_date, due_date,
                   interest_accrued_through, status, generation_log_id, created_at
            FROM quotas
            WHERE quota_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        row.ok_or_else(|| DatabaseError::not_found("quota", id))?
            .into_domain()
    }

    /// Writes back a mutated quota's balance columns and status.
    pub async fn save(&self, quota: &Quota) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE quotas
            SET base_amount = $2,
                interest_amount = $3,
                paid_amount = $4,
                interest_paid = $5,
                interest_accrued_through = $6,
                status = $7
            WHERE quota_id = $1
            "#,
        )
        .bind(Uuid::from(quota.id))
        .bind(quota.base_amount().amount())
        .bind(quota.interest_amount().amount())
        .bind(quota.paid_amount().amount())
        .bind(quota.interest_paid().amount())
        .bind(quota.interest_accrued_through)
        .bind(quota_status_str(quota.status()))
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("quota", quota.id));
        }
        debug!(quota = %quota.id, status = ?quota.status(), "quota saved");
        Ok(())
    }

    /// Persists a manual adjustment together with the adjusted quota.
    pub async fn record_adjustment(
        &self,
        quota: &Quota,
        adjustment: &QuotaAdjustment,
    ) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO quota_adjustments (
                adjustment_id, quota_id, previous_amount, new_amount,
                reason, adjusted_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(adjustment.id))
        .bind(Uuid::from(adjustment.quota_id))
        .bind(adjustment.previous_amount.amount())
        .bind(adjustment.new_amount.amount())
        .bind(&adjustment.reason)
        .bind(adjustment.adjusted_by.map(Uuid::from))
        .bind(adjustment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        sqlx::query(
            r#"
            UPDATE quotas
            SET base_amount = $2, status = $3
            WHERE quota_id = $1
            "#,
        )
        .bind(Uuid::from(quota.id))
        .bind(quota.base_amount().amount())
        .bind(quota_status_str(quota.status()))
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_status_round_trips_through_text() {
        for status in [
            QuotaStatus::Pending,
            QuotaStatus::Partial,
            QuotaStatus::Paid,
            QuotaStatus::Overdue,
            QuotaStatus::Cancelled,
        ] {
            assert_eq!(parse_quota_status(quota_status_str(status)).unwrap(), status);
        }
        assert!(parse_quota_status("open").is_err());
    }

    #[test]
    fn period_columns_round_trip() {
        let monthly = BillingPeriod::monthly(2024, 3).unwrap();
        let (year, month) = period_columns(monthly);
        assert_eq!(period_from_columns(year, month).unwrap(), monthly);

        let yearly = BillingPeriod::yearly(2024);
        let (year, month) = period_columns(yearly);
        assert_eq!(month, None);
        assert_eq!(period_from_columns(year, month).unwrap(), yearly);
    }

    #[test]
    fn corrupt_quota_row_is_rejected_at_load() {
        use rust_decimal_macros::dec;
        let row = QuotaRow {
            quota_id: Uuid::new_v4(),
            condominium_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            concept_id: Uuid::new_v4(),
            period_year: 2024,
            period_month: Some(3),
            description: "March 2024".to_string(),
            base_amount: dec!(100.00),
            interest_amount: dec!(0.00),
            // paid more than charged: the balance identity fails
            paid_amount: dec!(150.00),
            interest_paid: dec!(0.00),
            currency: "USD".to_string(),
            amount_in_base_currency: None,
            base_currency: None,
            exchange_rate_used: None,
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            interest_accrued_through: None,
            status: "partial".to_string(),
            generation_log_id: None,
            created_at: Utc::now(),
        };
        assert!(matches!(row.into_domain(), Err(DatabaseError::Mapping(_))));
    }
}
