//! Directory Domain - Condominiums, Buildings, and Units
//!
//! The directory is the organizational backbone the billing modules charge
//! against: a condominium owns buildings, a building owns units, and every
//! unit carries the aliquot percentage used to distribute shared expenses.

pub mod condominium;
pub mod building;
pub mod unit;
pub mod directory;
pub mod error;

pub use condominium::Condominium;
pub use building::Building;
pub use unit::Unit;
pub use directory::{InMemoryDirectory, UnitDirectory};
pub use error::DirectoryError;
