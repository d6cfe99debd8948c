//! Quota formulas
//!
//! A formula turns a unit into a charge amount. Three kinds exist: a flat
//! amount, an explicit unit-to-amount table, and a parametric expression
//! over named variables such as the unit's aliquot. Formulas referenced by
//! a generation log are immutable: corrections are new formulas.

use chrono::{DateTime, Utc};
use core_kernel::{CondominiumId, Currency, FormulaId, Money, UnitId};
use domain_directory::Unit;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::QuotaError;
use crate::expr::Expression;

/// Variable names the generator always binds for expression formulas.
pub const VAR_ALIQUOT: &str = "aliquot";
pub const VAR_UNIT_COUNT: &str = "unit_count";
pub const VAR_TOTAL_AMOUNT: &str = "total_amount";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FormulaKind {
    Fixed {
        amount: Money,
    },
    /// Explicit unit→amount table. A missing unit is a per-unit generation
    /// failure, never a zero charge.
    PerUnit {
        amounts: HashMap<UnitId, Money>,
    },
    Expression {
        expression: Expression,
        currency: Currency,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaFormula {
    pub id: FormulaId,
    pub condominium_id: CondominiumId,
    pub name: String,
    pub kind: FormulaKind,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Condominium-level figures bound into expression formulas, built once per
/// generation run and shared across units.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    bindings: HashMap<String, Decimal>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: Decimal) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn with_unit_count(self, count: usize) -> Self {
        self.bind(VAR_UNIT_COUNT, Decimal::from(count as u64))
    }

    pub fn with_total_amount(self, total: Decimal) -> Self {
        self.bind(VAR_TOTAL_AMOUNT, total)
    }
}

impl QuotaFormula {
    pub fn fixed(
        condominium_id: CondominiumId,
        name: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            id: FormulaId::new(),
            condominium_id,
            name: name.into(),
            kind: FormulaKind::Fixed { amount },
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// All table amounts must share one currency.
    pub fn per_unit(
        condominium_id: CondominiumId,
        name: impl Into<String>,
        amounts: HashMap<UnitId, Money>,
    ) -> Result<Self, QuotaError> {
        let mut currencies = amounts.values().map(Money::currency);
        if let Some(first) = currencies.next() {
            if currencies.any(|c| c != first) {
                return Err(QuotaError::InvalidConcept(
                    "per-unit amounts must share one currency".to_string(),
                ));
            }
        }
        Ok(Self {
            id: FormulaId::new(),
            condominium_id,
            name: name.into(),
            kind: FormulaKind::PerUnit { amounts },
            is_active: true,
            created_at: Utc::now(),
        })
    }

    /// Parses and validates the expression up front; a malformed formula
    /// never reaches a generation run.
    pub fn expression(
        condominium_id: CondominiumId,
        name: impl Into<String>,
        source: &str,
        variables: &[String],
        currency: Currency,
    ) -> Result<Self, QuotaError> {
        let expression = Expression::parse(source, variables)?;
        Ok(Self {
            id: FormulaId::new(),
            condominium_id,
            name: name.into(),
            kind: FormulaKind::Expression {
                expression,
                currency,
            },
            is_active: true,
            created_at: Utc::now(),
        })
    }

    /// The currency amounts come out in.
    pub fn currency(&self) -> Option<Currency> {
        match &self.kind {
            FormulaKind::Fixed { amount } => Some(amount.currency()),
            FormulaKind::PerUnit { amounts } => amounts.values().next().map(Money::currency),
            FormulaKind::Expression { currency, .. } => Some(*currency),
        }
    }

    /// Computes the charge for one unit.
    pub fn evaluate(&self, unit: &Unit, context: &EvaluationContext) -> Result<Money, QuotaError> {
        match &self.kind {
            FormulaKind::Fixed { amount } => Ok(*amount),
            FormulaKind::PerUnit { amounts } => amounts
                .get(&unit.id)
                .copied()
                .ok_or(QuotaError::MissingUnitAmount(unit.id)),
            FormulaKind::Expression {
                expression,
                currency,
            } => {
                let mut bindings = context.bindings.clone();
                bindings.insert(VAR_ALIQUOT.to_string(), unit.aliquot_percentage);
                let value = expression.evaluate(&bindings)?;
                Ok(Money::new(value, *currency).round_to_currency())
            }
        }
    }

    /// Snapshot stored on generation logs so a run stays auditable even if
    /// the formula is later retired.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "formula_id": self.id,
            "name": self.name,
            "kind": self.kind,
        })
    }
}

/// Splits a total across units in proportion to their aliquots, the last
/// unit absorbing the rounding remainder.
pub fn distribute_by_aliquot(
    total: Money,
    units: &[&Unit],
) -> Result<Vec<(UnitId, Money)>, QuotaError> {
    let weights: Vec<Decimal> = units.iter().map(|u| u.aliquot_percentage).collect();
    let shares = total.allocate_by_weights(&weights)?;
    Ok(units
        .iter()
        .zip(shares)
        .map(|(unit, share)| (unit.id, share))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::BuildingId;
    use rust_decimal_macros::dec;

    fn unit(aliquot: Decimal) -> Unit {
        Unit::new(CondominiumId::new(), BuildingId::new(), "1-A", aliquot).unwrap()
    }

    #[test]
    fn fixed_returns_amount_unchanged() {
        let condo = CondominiumId::new();
        let formula = QuotaFormula::fixed(condo, "Flat fee", Money::new(dec!(50.00), Currency::USD));
        let charged = formula.evaluate(&unit(dec!(3.5)), &EvaluationContext::new()).unwrap();
        assert_eq!(charged.amount(), dec!(50.00));
    }

    #[test]
    fn per_unit_missing_entry_fails() {
        let condo = CondominiumId::new();
        let known = unit(dec!(3.5));
        let mut amounts = HashMap::new();
        amounts.insert(known.id, Money::new(dec!(80.00), Currency::USD));
        let formula = QuotaFormula::per_unit(condo, "Table", amounts).unwrap();

        assert_eq!(
            formula.evaluate(&known, &EvaluationContext::new()).unwrap().amount(),
            dec!(80.00)
        );
        let stranger = unit(dec!(2.0));
        assert!(matches!(
            formula.evaluate(&stranger, &EvaluationContext::new()),
            Err(QuotaError::MissingUnitAmount(_))
        ));
    }

    #[test]
    fn per_unit_rejects_mixed_currencies() {
        let condo = CondominiumId::new();
        let mut amounts = HashMap::new();
        amounts.insert(UnitId::new(), Money::new(dec!(80.00), Currency::USD));
        amounts.insert(UnitId::new(), Money::new(dec!(80.00), Currency::VES));
        assert!(QuotaFormula::per_unit(condo, "Mixed", amounts).is_err());
    }

    #[test]
    fn expression_binds_aliquot_per_unit() {
        let condo = CondominiumId::new();
        let formula = QuotaFormula::expression(
            condo,
            "Aliquot share",
            "total_amount * aliquot / 100",
            &[VAR_TOTAL_AMOUNT.to_string(), VAR_ALIQUOT.to_string()],
            Currency::USD,
        )
        .unwrap();

        let context = EvaluationContext::new().with_total_amount(dec!(10000));
        let charged = formula.evaluate(&unit(dec!(3.5)), &context).unwrap();
        assert_eq!(charged.amount(), dec!(350.00));
    }

    #[test]
    fn malformed_expression_rejected_at_configuration() {
        let condo = CondominiumId::new();
        assert!(QuotaFormula::expression(
            condo,
            "Broken",
            "total_amount *",
            &[VAR_TOTAL_AMOUNT.to_string()],
            Currency::USD,
        )
        .is_err());
    }

    #[test]
    fn aliquot_distribution_sums_to_total() {
        let units: Vec<Unit> = [dec!(33.33), dec!(33.33), dec!(33.34)]
            .iter()
            .enumerate()
            .map(|(i, aliquot)| {
                Unit::new(
                    CondominiumId::new(),
                    BuildingId::new(),
                    format!("{i}"),
                    *aliquot,
                )
                .unwrap()
            })
            .collect();
        let refs: Vec<&Unit> = units.iter().collect();
        let total = Money::new(dec!(1000.00), Currency::USD);
        let shares = distribute_by_aliquot(total, &refs).unwrap();
        let sum = shares
            .iter()
            .fold(Money::zero(Currency::USD), |acc, (_, s)| acc + *s);
        assert_eq!(sum, total);
    }
}
