//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the condominium ledger, following the
//! repository pattern: each repository encapsulates the SQL for one
//! aggregate and maps rows to domain types.
//!
//! The storage layer is also where the ledger's concurrency rules live:
//! unique indexes make generation idempotent per (unit, concept, period),
//! an exclusion constraint keeps generation-rule windows from overlapping,
//! and every allocation batch commits in a single transaction so a quota is
//! never half-applied.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, QuotaRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/condoledger")).await?;
//! let quotas = QuotaRepository::new(pool.clone());
//! ```

pub mod pool;
pub mod error;
pub mod schema;
pub mod repositories;

pub use pool::{create_pool, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use schema::apply_schema;
pub use repositories::{
    ExchangeRateRepository, PaymentRepository, QuotaRepository, ScheduleRepository,
};
