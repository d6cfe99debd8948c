//! Repository implementations for ledger aggregates
//!
//! Each repository encapsulates the SQL for one aggregate and maps between
//! rows and domain types. Batch mutations (a generation run, an allocation
//! run) commit in a single transaction; the schema's unique and exclusion
//! constraints back up the domain-level idempotency checks against
//! concurrent writers.

pub mod rates;
pub mod quotas;
pub mod payments;
pub mod schedules;

pub use rates::ExchangeRateRepository;
pub use quotas::QuotaRepository;
pub use payments::PaymentRepository;
pub use schedules::ScheduleRepository;
