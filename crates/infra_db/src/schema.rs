//! Ledger schema
//!
//! The constraints here are load-bearing, not decorative: the partial
//! unique index on quotas makes generation idempotent per (unit, concept,
//! period); the unique pair on payment_applications prevents
//! double-application; the exclusion constraint keeps generation-rule
//! windows disjoint so "the active rule" is always unique; and the check
//! constraints refuse a negative balance at the storage layer even if the
//! domain guard were bypassed.

use sqlx::PgPool;

use crate::error::DatabaseError;

pub const SCHEMA: &str = r#"
CREATE EXTENSION IF NOT EXISTS btree_gist;

CREATE TABLE IF NOT EXISTS exchange_rates (
    rate_id UUID PRIMARY KEY,
    from_currency TEXT NOT NULL,
    to_currency TEXT NOT NULL,
    rate NUMERIC(20, 10) NOT NULL CHECK (rate > 0),
    effective_date DATE NOT NULL,
    source TEXT,
    registered_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (from_currency <> to_currency),
    UNIQUE (from_currency, to_currency, effective_date)
);

CREATE TABLE IF NOT EXISTS payment_concepts (
    concept_id UUID PRIMARY KEY,
    condominium_id UUID NOT NULL,
    building_id UUID,
    name TEXT NOT NULL,
    concept_type TEXT NOT NULL,
    currency TEXT NOT NULL,
    recurrence TEXT NOT NULL,
    allow_partial_payment BOOLEAN NOT NULL DEFAULT TRUE,
    adjustments JSONB NOT NULL,
    issue_day INT NOT NULL CHECK (issue_day BETWEEN 1 AND 31),
    due_day INT NOT NULL CHECK (due_day BETWEEN 1 AND 31),
    category_id UUID,
    created_by UUID,
    is_active BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS quota_formulas (
    formula_id UUID PRIMARY KEY,
    condominium_id UUID NOT NULL,
    name TEXT NOT NULL,
    kind JSONB NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS generation_rules (
    rule_id UUID PRIMARY KEY,
    concept_id UUID NOT NULL REFERENCES payment_concepts (concept_id),
    formula_id UUID NOT NULL REFERENCES quota_formulas (formula_id),
    effective_from DATE NOT NULL,
    effective_to DATE,
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (effective_to IS NULL OR effective_from <= effective_to),
    EXCLUDE USING gist (
        concept_id WITH =,
        daterange(effective_from, COALESCE(effective_to, 'infinity'::date), '[]') WITH &&
    )
);

CREATE TABLE IF NOT EXISTS generation_schedules (
    schedule_id UUID PRIMARY KEY,
    concept_id UUID NOT NULL REFERENCES payment_concepts (concept_id),
    frequency JSONB NOT NULL,
    generation_day INT NOT NULL CHECK (generation_day BETWEEN 1 AND 31),
    periods_in_advance INT NOT NULL DEFAULT 0,
    issue_day INT,
    due_day INT,
    last_generated_year INT,
    last_generated_month INT,
    next_generation_date DATE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS generation_logs (
    log_id UUID PRIMARY KEY,
    schedule_id UUID NOT NULL,
    concept_id UUID NOT NULL,
    rule_id UUID,
    formula_id UUID,
    formula_snapshot JSONB,
    period_year INT NOT NULL,
    period_month INT,
    quotas_created INT NOT NULL,
    quotas_failed INT NOT NULL,
    quotas_skipped INT NOT NULL,
    total_amount NUMERIC(20, 4),
    total_currency TEXT,
    units_affected INT NOT NULL,
    failures JSONB NOT NULL DEFAULT '[]'::jsonb,
    status TEXT NOT NULL,
    method TEXT NOT NULL,
    triggered_by UUID,
    executed_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS quotas (
    quota_id UUID PRIMARY KEY,
    condominium_id UUID NOT NULL,
    unit_id UUID NOT NULL,
    concept_id UUID NOT NULL REFERENCES payment_concepts (concept_id),
    period_year INT NOT NULL,
    period_month INT,
    description TEXT NOT NULL,
    base_amount NUMERIC(20, 4) NOT NULL,
    interest_amount NUMERIC(20, 4) NOT NULL DEFAULT 0,
    paid_amount NUMERIC(20, 4) NOT NULL DEFAULT 0,
    interest_paid NUMERIC(20, 4) NOT NULL DEFAULT 0,
    currency TEXT NOT NULL,
    amount_in_base_currency NUMERIC(20, 4),
    base_currency TEXT,
    exchange_rate_used JSONB,
    issue_date DATE NOT NULL,
    due_date DATE NOT NULL,
    interest_accrued_through DATE,
    status TEXT NOT NULL,
    generation_log_id UUID,
    created_at TIMESTAMPTZ NOT NULL,
    CHECK (base_amount + interest_amount - paid_amount >= 0),
    CHECK (interest_paid <= paid_amount)
);

CREATE UNIQUE INDEX IF NOT EXISTS quotas_unit_concept_period_uniq
    ON quotas (unit_id, concept_id, period_year, COALESCE(period_month, 0))
    WHERE status <> 'cancelled';

CREATE INDEX IF NOT EXISTS quotas_open_by_unit
    ON quotas (unit_id, due_date)
    WHERE status IN ('pending', 'partial', 'overdue');

CREATE TABLE IF NOT EXISTS quota_adjustments (
    adjustment_id UUID PRIMARY KEY,
    quota_id UUID NOT NULL REFERENCES quotas (quota_id),
    previous_amount NUMERIC(20, 4) NOT NULL,
    new_amount NUMERIC(20, 4) NOT NULL,
    reason TEXT NOT NULL,
    adjusted_by UUID,
    created_at TIMESTAMPTZ NOT NULL,
    CHECK (previous_amount <> new_amount)
);

CREATE TABLE IF NOT EXISTS interest_configurations (
    config_id UUID PRIMARY KEY,
    scope JSONB NOT NULL,
    interest_type TEXT NOT NULL,
    rate NUMERIC(10, 6) NOT NULL,
    calculation_period TEXT NOT NULL,
    grace_days INT NOT NULL DEFAULT 0,
    effective_from DATE NOT NULL,
    effective_to DATE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS payments (
    payment_id UUID PRIMARY KEY,
    condominium_id UUID NOT NULL,
    unit_id UUID,
    amount NUMERIC(20, 4) NOT NULL CHECK (amount > 0),
    currency TEXT NOT NULL,
    payment_date DATE NOT NULL,
    method TEXT NOT NULL,
    reference TEXT,
    receipt_url TEXT,
    registered_by UUID,
    verified_by UUID,
    rejection_reason TEXT,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS payment_applications (
    application_id UUID PRIMARY KEY,
    payment_id UUID NOT NULL REFERENCES payments (payment_id),
    quota_id UUID NOT NULL REFERENCES quotas (quota_id),
    applied_amount NUMERIC(20, 4) NOT NULL CHECK (applied_amount > 0),
    applied_to_principal NUMERIC(20, 4) NOT NULL,
    applied_to_interest NUMERIC(20, 4) NOT NULL,
    quota_currency TEXT NOT NULL,
    amount_in_payment_currency NUMERIC(20, 4) NOT NULL,
    payment_currency TEXT NOT NULL,
    exchange_rate_used JSONB,
    created_at TIMESTAMPTZ NOT NULL,
    UNIQUE (payment_id, quota_id)
);

CREATE TABLE IF NOT EXISTS payment_pending_allocations (
    pending_id UUID PRIMARY KEY,
    payment_id UUID NOT NULL REFERENCES payments (payment_id),
    amount NUMERIC(20, 4) NOT NULL CHECK (amount > 0),
    currency TEXT NOT NULL,
    status TEXT NOT NULL,
    allocated_to UUID,
    resolved_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL
);
"#;

/// Applies the full schema. Statements are idempotent, so re-running on an
/// initialized database is a no-op.
pub async fn apply_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
    Ok(())
}
