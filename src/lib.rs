//! Energy simulator for solar-harvesting wireless sensor networks.

pub mod config;
pub mod devices;
pub mod error;
/// Synthetic irradiance and event inputs.
pub mod inputs;
pub mod io;
pub mod network;
/// Scenario assembly and end-to-end runs.
pub mod runner;
/// Node energy systems, simulators and the multi-node orchestrator.
pub mod sim;

pub use error::{SimError, SimResult};
