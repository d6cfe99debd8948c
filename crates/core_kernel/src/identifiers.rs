//! Strongly-typed identifiers for ledger entities
//!
//! Newtype wrappers around UUIDs keep a `QuotaId` from ever being passed
//! where a `PaymentId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Directory identifiers
define_id!(CondominiumId, "CND");
define_id!(BuildingId, "BLD");
define_id!(UnitId, "UNT");

// Quota generation identifiers
define_id!(ConceptId, "CPT");
define_id!(FormulaId, "FRM");
define_id!(RuleId, "RUL");
define_id!(ScheduleId, "SCH");
define_id!(GenerationLogId, "GEN");
define_id!(QuotaId, "QTA");
define_id!(AdjustmentId, "ADJ");
define_id!(InterestConfigId, "INT");

// Payment identifiers
define_id!(PaymentId, "PAY");
define_id!(ApplicationId, "APP");
define_id!(PendingAllocationId, "PND");

// Shared identifiers
define_id!(CategoryId, "CAT");
define_id!(UserId, "USR");
