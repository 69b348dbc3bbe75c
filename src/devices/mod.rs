//! Physical models of one sensor node's energy components.

/// Lithium-ion battery with capacity fade.
pub mod battery;
/// Duty-cycled sensor workload.
pub mod sensor;
/// Photovoltaic harvester.
pub mod solar;
/// Supercapacitor buffer.
pub mod supercap;
pub mod types;

// Re-export the main types for convenience
pub use battery::{Battery, FadeModel, OcvCurve};
pub use sensor::SensorLoad;
pub use solar::SolarHarvester;
pub use supercap::SuperCapacitor;
pub use types::{BatteryState, ChargeState, Device, DeviceContext, StorageDevice};
