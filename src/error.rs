//! Fatal simulation errors.
//!
//! Physical infeasibility (negative discriminants, exhausted storage) is never
//! reported here; those resolve to safe fallbacks inside the device models.

use thiserror::Error;

use crate::config::ConfigError;
use crate::network::NodeId;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid configuration: {}", join_config_errors(.0))]
    Config(Vec<ConfigError>),

    #[error("unknown energy management policy id {0} (expected 1-6)")]
    UnknownPolicy(u8),

    #[error("node {0} has no event series")]
    MissingEventSeries(NodeId),

    #[error("node {0} has no energy system")]
    MissingEnergySystem(NodeId),

    #[error("event series for node {node} has {len} steps, expected {expected}")]
    EventSeriesLength {
        node: NodeId,
        len: usize,
        expected: usize,
    },

    #[error("irradiance series has {len} samples, expected at least {expected}")]
    IrradianceLength { len: usize, expected: usize },

    #[error("node {0} is not part of the network graph")]
    UnknownNode(NodeId),

    #[error("node {0} is the sink and cannot carry an energy system")]
    SinkEnergySystem(NodeId),

    #[error("invalid network graph: {0}")]
    Graph(String),

    #[error("topology generation gave up after {attempts} placement attempts")]
    Placement { attempts: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<ConfigError>> for SimError {
    fn from(errors: Vec<ConfigError>) -> Self {
        SimError::Config(errors)
    }
}
