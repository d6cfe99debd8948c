//! Unit entity

use core_kernel::{BuildingId, CondominiumId, UnitId, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// An individually-billed property: an apartment, office, or parking space.
///
/// The aliquot percentage is the unit's share of common expenses as written
/// in the condominium document, expressed as a percentage (3.5 means 3.5%).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub condominium_id: CondominiumId,
    pub building_id: BuildingId,
    pub unit_number: String,
    pub aliquot_percentage: Decimal,
    pub owner: Option<UserId>,
    pub is_active: bool,
}

impl Unit {
    pub fn new(
        condominium_id: CondominiumId,
        building_id: BuildingId,
        unit_number: impl Into<String>,
        aliquot_percentage: Decimal,
    ) -> Result<Self, DirectoryError> {
        let unit_number = unit_number.into();
        if aliquot_percentage <= Decimal::ZERO || aliquot_percentage > dec!(100) {
            return Err(DirectoryError::InvalidAliquot {
                unit_number,
                value: aliquot_percentage.to_string(),
            });
        }
        Ok(Self {
            id: UnitId::new(),
            condominium_id,
            building_id,
            unit_number,
            aliquot_percentage,
            owner: None,
            is_active: true,
        })
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }
}
