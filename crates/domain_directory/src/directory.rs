//! Directory lookup port
//!
//! The quota generator and the allocation engine only need read access to
//! the directory, so they depend on this trait rather than on a concrete
//! store. `InMemoryDirectory` backs the domain tests; the database-backed
//! implementation lives in the infrastructure crate.

use core_kernel::{BuildingId, CondominiumId, UnitId};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::warn;

use crate::building::Building;
use crate::condominium::Condominium;
use crate::error::DirectoryError;
use crate::unit::Unit;

/// Read access to the organizational structure.
pub trait UnitDirectory {
    fn condominium(&self, id: CondominiumId) -> Result<&Condominium, DirectoryError>;
    fn building(&self, id: BuildingId) -> Result<&Building, DirectoryError>;
    fn unit(&self, id: UnitId) -> Result<&Unit, DirectoryError>;
    /// Active units of a condominium, ordered by unit number.
    fn active_units(&self, condominium: CondominiumId) -> Vec<&Unit>;
}

/// Hash-map backed directory used by domain services and tests.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    condominiums: HashMap<CondominiumId, Condominium>,
    buildings: HashMap<BuildingId, Building>,
    units: HashMap<UnitId, Unit>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_condominium(&mut self, condominium: Condominium) {
        self.condominiums.insert(condominium.id, condominium);
    }

    pub fn add_building(&mut self, building: Building) -> Result<(), DirectoryError> {
        if !self.condominiums.contains_key(&building.condominium_id) {
            return Err(DirectoryError::CondominiumNotFound(building.condominium_id));
        }
        self.buildings.insert(building.id, building);
        Ok(())
    }

    pub fn add_unit(&mut self, unit: Unit) -> Result<(), DirectoryError> {
        if !self.buildings.contains_key(&unit.building_id) {
            return Err(DirectoryError::BuildingNotFound(unit.building_id));
        }
        let duplicate = self.units.values().any(|u| {
            u.building_id == unit.building_id && u.unit_number == unit.unit_number
        });
        if duplicate {
            return Err(DirectoryError::DuplicateUnitNumber {
                building: unit.building_id,
                unit_number: unit.unit_number.clone(),
            });
        }
        self.units.insert(unit.id, unit);
        Ok(())
    }

    /// Sums active-unit aliquots for a condominium. Logs when the total
    /// drifts from 100, since per-unit distributions normalize by this sum
    /// rather than assuming it.
    pub fn aliquot_total(&self, condominium: CondominiumId) -> Decimal {
        let total: Decimal = self
            .active_units(condominium)
            .iter()
            .map(|u| u.aliquot_percentage)
            .sum();
        if total != Decimal::from(100) {
            warn!(%condominium, %total, "aliquot percentages do not sum to 100");
        }
        total
    }
}

impl UnitDirectory for InMemoryDirectory {
    fn condominium(&self, id: CondominiumId) -> Result<&Condominium, DirectoryError> {
        self.condominiums
            .get(&id)
            .ok_or(DirectoryError::CondominiumNotFound(id))
    }

    fn building(&self, id: BuildingId) -> Result<&Building, DirectoryError> {
        self.buildings
            .get(&id)
            .ok_or(DirectoryError::BuildingNotFound(id))
    }

    fn unit(&self, id: UnitId) -> Result<&Unit, DirectoryError> {
        self.units.get(&id).ok_or(DirectoryError::UnitNotFound(id))
    }

    fn active_units(&self, condominium: CondominiumId) -> Vec<&Unit> {
        let mut units: Vec<&Unit> = self
            .units
            .values()
            .filter(|u| u.condominium_id == condominium && u.is_active)
            .collect();
        units.sort_by(|a, b| a.unit_number.cmp(&b.unit_number));
        units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, Timezone};
    use rust_decimal_macros::dec;

    fn seeded() -> (InMemoryDirectory, CondominiumId, BuildingId) {
        let mut dir = InMemoryDirectory::new();
        let condo = Condominium::new("Las Mercedes", Currency::USD, Timezone::default());
        let condo_id = condo.id;
        dir.add_condominium(condo);
        let building = Building::new(condo_id, "Torre A");
        let building_id = building.id;
        dir.add_building(building).unwrap();
        (dir, condo_id, building_id)
    }

    #[test]
    fn duplicate_unit_number_in_building_rejected() {
        let (mut dir, condo, building) = seeded();
        dir.add_unit(Unit::new(condo, building, "1-A", dec!(50)).unwrap())
            .unwrap();
        let err = dir
            .add_unit(Unit::new(condo, building, "1-A", dec!(50)).unwrap())
            .unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateUnitNumber { .. }));
    }

    #[test]
    fn active_units_sorted_and_filtered() {
        let (mut dir, condo, building) = seeded();
        dir.add_unit(Unit::new(condo, building, "2-B", dec!(30)).unwrap())
            .unwrap();
        dir.add_unit(Unit::new(condo, building, "1-A", dec!(30)).unwrap())
            .unwrap();
        let mut retired = Unit::new(condo, building, "3-C", dec!(40)).unwrap();
        retired.is_active = false;
        dir.add_unit(retired).unwrap();

        let units = dir.active_units(condo);
        let numbers: Vec<&str> = units.iter().map(|u| u.unit_number.as_str()).collect();
        assert_eq!(numbers, vec!["1-A", "2-B"]);
    }

    #[test]
    fn unit_requires_existing_building() {
        let (mut dir, condo, _) = seeded();
        let orphan = Unit::new(condo, BuildingId::new(), "9-Z", dec!(10)).unwrap();
        assert!(matches!(
            dir.add_unit(orphan),
            Err(DirectoryError::BuildingNotFound(_))
        ));
    }
}
