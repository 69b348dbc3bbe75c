//! Core simulation types: run configuration, per-step records and results.

use std::fmt;

use crate::network::NodeId;

/// Capacity loss above which a node's run is stopped early.
pub const DEFAULT_DEGRADATION_LIMIT: f64 = 0.45;

/// Timing of a run shared by every node.
///
/// # Examples
///
/// ```
/// use wsn_energy_sim::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(1.0, 86_400);
/// assert_eq!(cfg.duration_s(), 86_400.0);
/// assert_eq!(cfg.degradation_limit, 0.45);
/// ```
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Duration of one step (s).
    pub dt_s: f64,
    /// Number of steps to simulate.
    pub num_steps: usize,
    /// Capacity loss at which a node stops early.
    pub degradation_limit: f64,
    /// Whether forwarding costs are drawn from the relaying node's storage.
    pub charge_relays: bool,
}

impl SimConfig {
    /// Creates a run configuration with the default degradation limit.
    ///
    /// # Panics
    ///
    /// Panics if `dt_s` is not positive.
    pub fn new(dt_s: f64, num_steps: usize) -> Self {
        assert!(dt_s > 0.0, "dt must be > 0");
        Self {
            dt_s,
            num_steps,
            degradation_limit: DEFAULT_DEGRADATION_LIMIT,
            charge_relays: true,
        }
    }

    /// Builds the configuration for `days` whole days at `dt_s` resolution.
    pub fn for_days(dt_s: f64, days: usize) -> Self {
        let num_steps = (days as f64 * 86_400.0 / dt_s) as usize;
        Self::new(dt_s, num_steps)
    }

    /// Sets the early-stop capacity-loss threshold.
    pub fn with_degradation_limit(mut self, limit: f64) -> Self {
        self.degradation_limit = limit;
        self
    }

    /// Enables or disables drawing forwarding costs from relay storage.
    pub fn with_relay_charging(mut self, enabled: bool) -> Self {
        self.charge_relays = enabled;
        self
    }

    /// Simulated duration (s).
    pub fn duration_s(&self) -> f64 {
        self.num_steps as f64 * self.dt_s
    }
}

/// Overall node state derived from its two storage devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Normal,
    /// Battery and supercapacitor are both empty.
    Empty,
    /// Battery reached end of life; absorbing.
    Dead,
}

/// Instantaneous power vector of one step (W).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    pub demand_w: f64,
    pub sensor_w: f64,
    pub solar_w: f64,
    pub sc_w: f64,
    pub battery_w: f64,
}

/// State variables recorded after one step of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Step index.
    pub step: usize,
    /// Capacity loss accumulated since the start of the run.
    pub capacity_loss: f64,
    /// Battery open-circuit voltage (V).
    pub battery_voc: f64,
    pub battery_soc: f64,
    /// Battery current (A); negative while discharging.
    pub battery_current_a: f64,
    pub sc_soc: f64,
    /// Battery charging efficiency factor in force.
    pub efficiency: f64,
    pub battery_w: f64,
    pub sc_w: f64,
    pub demand_w: f64,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>6} | demand={:>8.4} W  bat={:>8.4} W  sc={:>8.4} W | \
             SoC={:.2}%  Voc={:.3} V  I={:.4} A  loss={:.3e} | SC={:.1}%  eta={:.3}",
            self.step,
            self.demand_w,
            self.battery_w,
            self.sc_w,
            self.battery_soc * 100.0,
            self.battery_voc,
            self.battery_current_a,
            self.capacity_loss,
            self.sc_soc * 100.0,
            self.efficiency,
        )
    }
}

/// Why a node's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All steps ran.
    Completed,
    /// The energy system died; the series stops before the first refused step.
    Dead,
    /// Capacity loss crossed the degradation limit.
    DegradationLimit,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::Completed => "completed",
            Termination::Dead => "dead",
            Termination::DegradationLimit => "degradation limit",
        };
        f.pad(s)
    }
}

/// One routed message from a source node to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunicationEvent {
    pub step: usize,
    /// Node ids from source to sink.
    pub path: Vec<NodeId>,
    /// Sum of hop weights (J).
    pub total_cost: f64,
}

impl CommunicationEvent {
    /// Node that raised the event.
    pub fn source(&self) -> Option<NodeId> {
        self.path.first().copied()
    }
}

/// Everything recorded for one node over a run.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub node: NodeId,
    /// One record per completed step; no entries past an early stop.
    pub records: Vec<StepRecord>,
    /// Net energy drawn from storage (J); harvest surplus counts negative.
    pub energy_consumed_j: f64,
    /// Simulated time covered by `records` (s).
    pub runtime_s: f64,
    /// Messages this node originated.
    pub communication_log: Vec<CommunicationEvent>,
    /// Energy attributed to this node for forwarding hops (J).
    pub communication_energy_j: f64,
    /// Changes of serving source between consecutive steps.
    pub switch_count: usize,
    pub termination: Termination,
}

impl SimulationResult {
    /// Creates an empty result for `node`.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            records: Vec::new(),
            energy_consumed_j: 0.0,
            runtime_s: 0.0,
            communication_log: Vec::new(),
            communication_energy_j: 0.0,
            switch_count: 0,
            termination: Termination::Completed,
        }
    }

    /// Last recorded step, if any.
    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_config_basic() {
        let cfg = SimConfig::new(2.0, 10);
        assert_eq!(cfg.dt_s, 2.0);
        assert_eq!(cfg.num_steps, 10);
        assert_eq!(cfg.duration_s(), 20.0);
        assert!(cfg.charge_relays);
        assert!(!cfg.with_relay_charging(false).charge_relays);
    }

    #[test]
    fn sim_config_for_days() {
        let cfg = SimConfig::for_days(60.0, 2);
        assert_eq!(cfg.num_steps, 2 * 1440);
    }

    #[test]
    #[should_panic]
    fn sim_config_zero_dt_panics() {
        SimConfig::new(0.0, 10);
    }

    #[test]
    fn step_record_display_does_not_panic() {
        let r = StepRecord {
            step: 3,
            capacity_loss: 1e-6,
            battery_voc: 3.7,
            battery_soc: 0.75,
            battery_current_a: -0.01,
            sc_soc: 0.74,
            efficiency: 1.0,
            battery_w: 0.011,
            sc_w: 0.0,
            demand_w: 0.011,
        };
        let s = format!("{r}");
        assert!(s.contains("t="));
    }

    #[test]
    fn communication_event_source_is_first_hop() {
        let ev = CommunicationEvent {
            step: 2,
            path: vec![NodeId(0), NodeId(2)],
            total_cost: 10.0,
        };
        assert_eq!(ev.source(), Some(NodeId(0)));
    }
}
