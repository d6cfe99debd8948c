//! Directory domain errors

use core_kernel::{BuildingId, CondominiumId, UnitId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Condominium not found: {0}")]
    CondominiumNotFound(CondominiumId),

    #[error("Building not found: {0}")]
    BuildingNotFound(BuildingId),

    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Aliquot percentages are strictly positive and at most 100.
    #[error("Invalid aliquot percentage for unit {unit_number}: {value}")]
    InvalidAliquot { unit_number: String, value: String },

    /// Unit numbers are unique within a building.
    #[error("Unit number {unit_number} already exists in building {building}")]
    DuplicateUnitNumber {
        building: BuildingId,
        unit_number: String,
    },
}
