//! Condominium entity

use chrono::{DateTime, Utc};
use core_kernel::{CondominiumId, Currency, Timezone};
use serde::{Deserialize, Serialize};

/// The tenant boundary. Every quota, payment, and configuration row belongs
/// to exactly one condominium, and queries never cross this line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condominium {
    pub id: CondominiumId,
    pub name: String,
    /// Currency quotas are denominated in unless a concept overrides it.
    pub base_currency: Currency,
    /// Local timezone used to resolve "today" for schedules and due dates.
    pub timezone: Timezone,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Condominium {
    pub fn new(name: impl Into<String>, base_currency: Currency, timezone: Timezone) -> Self {
        Self {
            id: CondominiumId::new(),
            name: name.into(),
            base_currency,
            timezone,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
