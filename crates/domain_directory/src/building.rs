//! Building entity

use core_kernel::{BuildingId, CondominiumId};
use serde::{Deserialize, Serialize};

/// A building (or tower) inside a condominium. Interest configurations can
/// be scoped to a building, overriding the condominium-wide default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub condominium_id: CondominiumId,
    pub name: String,
    pub is_active: bool,
}

impl Building {
    pub fn new(condominium_id: CondominiumId, name: impl Into<String>) -> Self {
        Self {
            id: BuildingId::new(),
            condominium_id,
            name: name.into(),
            is_active: true,
        }
    }
}
