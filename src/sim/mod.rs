/// Simulation clock for timestep management.
pub mod clock;
pub mod kpi;
/// Energy management policies.
pub mod manager;
pub mod node;
/// Concurrent execution of every node over a shared graph.
pub mod orchestrator;
/// Per-node timeline driver.
pub mod simulator;
pub mod types;

pub use manager::{AdaptiveParams, Allocation, EnergyPolicy, ManagerInput};
pub use node::NodeEnergySystem;
pub use orchestrator::{MultiNodeOrchestrator, NetworkRunResult};
pub use simulator::{NodeSimulator, RelayCharge};
pub use types::{CommunicationEvent, SimConfig, SimulationResult, StepRecord, Termination};
