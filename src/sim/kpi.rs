//! Post-hoc lifetime metrics from per-node simulation results.

use std::collections::BTreeMap;
use std::fmt;

use crate::network::NodeId;

use super::types::SimulationResult;

/// Battery SOC at or below which a node counts as failed.
pub const DEFAULT_FAILURE_THRESHOLD: f64 = 0.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Lifetime of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLifetime {
    pub node: NodeId,
    /// Time until the first recorded step at or below the failure threshold,
    /// or the recorded length if the node never failed (days).
    pub lifetime_days: f64,
    pub failed: bool,
}

/// Fleet-level lifetime and wear indicators for one run.
///
/// Nodes without any recorded step count towards the fleet size but have
/// no lifetime of their own.
#[derive(Debug, Clone)]
pub struct LifetimeReport {
    pub nodes: Vec<NodeLifetime>,
    /// Share of the fleet that failed (%).
    pub failure_rate_pct: f64,
    /// Mean lifetime over nodes with records (days).
    pub mean_lifetime_days: f64,
    /// Mean end-of-run capacity loss.
    pub capacity_loss_mean: f64,
    /// Population standard deviation of end-of-run capacity loss.
    pub capacity_loss_std: f64,
    /// Mean end-of-run battery SOC.
    pub soc_mean: f64,
    /// Population standard deviation of end-of-run battery SOC.
    pub soc_std: f64,
}

impl LifetimeReport {
    /// Computes the report from a run's per-node results.
    ///
    /// # Arguments
    ///
    /// * `results` - Per-node results of one run
    /// * `dt_s` - Step length in seconds
    /// * `failure_threshold` - Battery SOC at or below which a node failed
    pub fn from_results(
        results: &BTreeMap<NodeId, SimulationResult>,
        dt_s: f64,
        failure_threshold: f64,
    ) -> Self {
        let mut nodes = Vec::new();
        let mut final_loss = Vec::new();
        let mut final_soc = Vec::new();

        for (&node, result) in results {
            let Some(last) = result.last() else {
                continue;
            };
            final_loss.push(last.capacity_loss);
            final_soc.push(last.battery_soc);

            let failed_at = result
                .records
                .iter()
                .position(|r| r.battery_soc <= failure_threshold);
            let steps = failed_at.unwrap_or(result.records.len());
            nodes.push(NodeLifetime {
                node,
                lifetime_days: steps as f64 * dt_s / SECONDS_PER_DAY,
                failed: failed_at.is_some(),
            });
        }

        let failed = nodes.iter().filter(|n| n.failed).count();
        let failure_rate_pct = if results.is_empty() {
            0.0
        } else {
            100.0 * failed as f64 / results.len() as f64
        };
        let lifetimes: Vec<f64> = nodes.iter().map(|n| n.lifetime_days).collect();
        let (capacity_loss_mean, capacity_loss_std) = mean_std(&final_loss);
        let (soc_mean, soc_std) = mean_std(&final_soc);

        Self {
            nodes,
            failure_rate_pct,
            mean_lifetime_days: mean_std(&lifetimes).0,
            capacity_loss_mean,
            capacity_loss_std,
            soc_mean,
            soc_std,
        }
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

impl fmt::Display for LifetimeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Lifetime Report ---")?;
        writeln!(f, "Nodes with data:       {}", self.nodes.len())?;
        writeln!(f, "Node failure rate:     {:.2}%", self.failure_rate_pct)?;
        writeln!(f, "Average lifetime:      {:.3} days", self.mean_lifetime_days)?;
        writeln!(
            f,
            "Capacity loss:         {:.3e} ± {:.3e}",
            self.capacity_loss_mean, self.capacity_loss_std
        )?;
        write!(
            f,
            "Final battery SoC:     {:.2}% ± {:.2}%",
            self.soc_mean * 100.0,
            self.soc_std * 100.0
        )
    }
}
