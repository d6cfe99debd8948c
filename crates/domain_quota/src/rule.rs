//! Generation rules
//!
//! A rule binds a formula to a concept for an effectivity window. Several
//! rules may exist over a concept's lifetime, but their windows must not
//! overlap, so at most one is active on any date.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{ConceptId, EffectiveWindow, FormulaId, RuleId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::QuotaError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRule {
    pub id: RuleId,
    pub concept_id: ConceptId,
    pub formula_id: FormulaId,
    pub window: EffectiveWindow,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl GenerationRule {
    pub fn new(concept_id: ConceptId, formula_id: FormulaId, window: EffectiveWindow) -> Self {
        Self {
            id: RuleId::new(),
            concept_id,
            formula_id,
            window,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn created_by(mut self, user: UserId) -> Self {
        self.created_by = Some(user);
        self
    }
}

/// The rules of one condominium, grouped by concept.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    by_concept: HashMap<ConceptId, Vec<GenerationRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, rejecting any window overlap with the concept's
    /// existing rules. To replace an open-ended rule, close its window
    /// first (`EffectiveWindow::close_before`), then add the successor.
    pub fn add(&mut self, rule: GenerationRule) -> Result<(), QuotaError> {
        let rules = self.by_concept.entry(rule.concept_id).or_default();
        if rules.iter().any(|r| r.window.overlaps(&rule.window)) {
            return Err(QuotaError::OverlappingRules(rule.concept_id));
        }
        rules.push(rule);
        Ok(())
    }

    /// The rule in force for a concept on a date, if any. Non-overlap makes
    /// the answer unique.
    pub fn active_rule_for(&self, concept: ConceptId, date: NaiveDate) -> Option<&GenerationRule> {
        self.by_concept
            .get(&concept)?
            .iter()
            .find(|r| r.window.contains(date))
    }

    pub fn rules_for(&self, concept: ConceptId) -> &[GenerationRule] {
        self.by_concept
            .get(&concept)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
